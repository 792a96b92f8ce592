//! gzip 압축 계층.
//!
//! 코덱의 가장 바깥 계층. 해제 크기는 [`MAX_DECOMPRESSED_BYTES`]로 제한한다.

use flate2::read::{GzDecoder, GzEncoder};
use flate2::Compression;
use std::io::Read;
use telemon_core::error::CoreError;

/// 해제 후 허용되는 최대 크기
pub const MAX_DECOMPRESSED_BYTES: u64 = 32 * 1024 * 1024;

/// gzip 압축
pub fn compress(data: &[u8]) -> Result<Vec<u8>, CoreError> {
    let mut encoder = GzEncoder::new(data, Compression::default());
    let mut compressed = Vec::new();
    encoder
        .read_to_end(&mut compressed)
        .map_err(|e| CoreError::Compression(format!("gzip 압축 실패: {e}")))?;
    Ok(compressed)
}

/// gzip 해제
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, CoreError> {
    let mut decoder = GzDecoder::new(data).take(MAX_DECOMPRESSED_BYTES + 1);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| CoreError::Compression(format!("gzip 해제 실패: {e}")))?;
    if decompressed.len() as u64 > MAX_DECOMPRESSED_BYTES {
        return Err(CoreError::Compression(format!(
            "해제 크기 한도 초과: {MAX_DECOMPRESSED_BYTES} bytes"
        )));
    }
    Ok(decompressed)
}
