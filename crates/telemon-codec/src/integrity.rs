//! HMAC-SHA256 무결성 태그.
//!
//! 태그는 압축/암호화 이전의 평문 JSON에 대해 계산하고 hex로 전송 헤더에 싣는다.

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use telemon_core::error::CoreError;

type HmacSha256 = Hmac<Sha256>;

/// 무결성 키
#[derive(Clone)]
pub struct IntegrityKey(Vec<u8>);

impl IntegrityKey {
    /// 빈 키는 "키 없음"으로 취급한다
    pub fn new(key: impl AsRef<[u8]>) -> Option<Self> {
        let key = key.as_ref();
        (!key.is_empty()).then(|| Self(key.to_vec()))
    }

    fn mac(&self) -> Result<HmacSha256, CoreError> {
        HmacSha256::new_from_slice(&self.0)
            .map_err(|e| CoreError::Internal(format!("HMAC 초기화 실패: {e}")))
    }

    /// hex 인코딩된 태그 계산
    pub fn sign(&self, payload: &[u8]) -> Result<String, CoreError> {
        let mut mac = self.mac()?;
        mac.update(payload);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// 태그를 상수 시간으로 비교
    pub fn verify(&self, payload: &[u8], tag_hex: &str) -> Result<(), CoreError> {
        let expected = hex::decode(tag_hex.trim())
            .map_err(|e| CoreError::Integrity(format!("해시 헤더 hex 디코딩 실패: {e}")))?;
        let mut mac = self.mac()?;
        mac.update(payload);
        mac.verify_slice(&expected)
            .map_err(|_| CoreError::Integrity("HashSHA256 불일치".to_string()))
    }
}

impl fmt::Debug for IntegrityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("IntegrityKey(***)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn known_vector() {
        // RFC 4231 test case 2
        let key = IntegrityKey::new("Jefe").unwrap();
        let tag = key.sign(b"what do ya want for nothing?").unwrap();
        assert_eq!(
            tag,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn verify_accepts_own_tag_and_rejects_others() {
        let key = IntegrityKey::new("secret").unwrap();
        let payload = br#"[{"id":"a","type":"counter","delta":1}]"#;
        let tag = key.sign(payload).unwrap();
        assert!(key.verify(payload, &tag).is_ok());

        let other = IntegrityKey::new("other").unwrap();
        assert_matches!(other.verify(payload, &tag), Err(CoreError::Integrity(_)));
        assert_matches!(key.verify(b"tampered", &tag), Err(CoreError::Integrity(_)));
        assert_matches!(key.verify(payload, "zz-not-hex"), Err(CoreError::Integrity(_)));
    }

    #[test]
    fn empty_key_means_disabled() {
        assert!(IntegrityKey::new("").is_none());
        assert!(format!("{:?}", IntegrityKey::new("k").unwrap()).contains("***"));
    }
}
