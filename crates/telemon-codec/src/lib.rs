//! # telemon-codec
//!
//! 에이전트와 수집 서버가 대칭으로 쓰는 와이어 보안 코덱.
//!
//! 인코딩 순서: JSON 직렬화 → HMAC 태그(헤더) → 하이브리드 암호화(선택) → gzip.
//! 디코딩은 정확히 역순이다.
//!
//! - [`compression`]: gzip 계층
//! - [`integrity`]: HMAC-SHA256 태그
//! - [`envelope`]: RSA/AES-GCM 봉투
//! - [`keys`]: PEM 키 로드

pub mod compression;
pub mod envelope;
pub mod integrity;
pub mod keys;

use std::fmt;
use std::sync::Arc;

use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::de::DeserializeOwned;
use serde::Serialize;
use telemon_core::error::CoreError;
use tracing::{debug, Span};

use crate::envelope::{KeyUnwrapper, KeyWrapper};
use crate::integrity::IntegrityKey;

/// `Content-Type` 헤더
pub const HEADER_CONTENT_TYPE: &str = "Content-Type";
/// `Content-Encoding` 헤더
pub const HEADER_CONTENT_ENCODING: &str = "Content-Encoding";
/// 암호화 표시 헤더
pub const HEADER_ENCRYPTED: &str = "X-Encrypted";
/// 무결성 태그 헤더
pub const HEADER_HASH: &str = "HashSHA256";

/// 평문 JSON 본문
pub const CONTENT_TYPE_JSON: &str = "application/json";
/// 암호화된 본문
pub const CONTENT_TYPE_OCTET_STREAM: &str = "application/octet-stream";

/// 전송 헤더로 표현되는 코덱 메타데이터
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WireHeaders {
    /// gzip 적용 여부
    pub gzip: bool,
    /// 봉투 적용 여부
    pub encrypted: bool,
    /// hex HMAC 태그
    pub hash: Option<String>,
}

impl WireHeaders {
    /// 헤더 조회 함수로부터 구성 (HTTP 프레임워크에 독립적)
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            gzip: lookup(HEADER_CONTENT_ENCODING)
                .map(|v| v.to_ascii_lowercase().contains("gzip"))
                .unwrap_or(false),
            encrypted: lookup(HEADER_ENCRYPTED)
                .map(|v| v.trim().eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            hash: lookup(HEADER_HASH).filter(|v| !v.is_empty()),
        }
    }

    /// 요청에 실을 헤더 목록
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let content_type = if self.encrypted {
            CONTENT_TYPE_OCTET_STREAM
        } else {
            CONTENT_TYPE_JSON
        };
        let mut pairs = vec![(HEADER_CONTENT_TYPE, content_type.to_string())];
        if self.gzip {
            pairs.push((HEADER_CONTENT_ENCODING, "gzip".to_string()));
        }
        if self.encrypted {
            pairs.push((HEADER_ENCRYPTED, "true".to_string()));
        }
        if let Some(hash) = &self.hash {
            pairs.push((HEADER_HASH, hash.clone()));
        }
        pairs
    }
}

/// 인코딩 결과
#[derive(Debug, Clone)]
pub struct EncodedBody {
    /// 최종 본문
    pub body: Vec<u8>,
    /// 함께 보낼 헤더
    pub headers: WireHeaders,
}

/// 보안 코덱.
///
/// 각 계층은 키 유무로 독립적으로 켜진다. 상태는 설정뿐이다.
#[derive(Clone)]
pub struct SecurityCodec {
    integrity: Option<IntegrityKey>,
    wrapper: Option<Arc<dyn KeyWrapper>>,
    unwrapper: Option<Arc<dyn KeyUnwrapper>>,
    compression: bool,
    span: Span,
}

impl SecurityCodec {
    /// 압축만 켜진 코덱
    pub fn new() -> Self {
        Self {
            integrity: None,
            wrapper: None,
            unwrapper: None,
            compression: true,
            span: Span::none(),
        }
    }

    /// HMAC 키 설정. 빈 문자열이면 무결성 계층을 끈다
    pub fn with_integrity_key(mut self, key: impl AsRef<[u8]>) -> Self {
        self.integrity = IntegrityKey::new(key);
        self
    }

    /// 송신 측 공개 키
    pub fn with_public_key(self, key: RsaPublicKey) -> Self {
        self.with_key_wrapper(Arc::new(key))
    }

    /// 수신 측 개인 키
    pub fn with_private_key(self, key: RsaPrivateKey) -> Self {
        self.with_key_unwrapper(Arc::new(key))
    }

    /// 대칭 키 암호화기 직접 주입
    pub fn with_key_wrapper(mut self, wrapper: Arc<dyn KeyWrapper>) -> Self {
        self.wrapper = Some(wrapper);
        self
    }

    /// 대칭 키 복호화기 직접 주입
    pub fn with_key_unwrapper(mut self, unwrapper: Arc<dyn KeyUnwrapper>) -> Self {
        self.unwrapper = Some(unwrapper);
        self
    }

    /// gzip 계층 on/off
    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compression = enabled;
        self
    }

    /// 로그를 남길 span 주입
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// 무결성 키 설정 여부
    pub fn has_integrity_key(&self) -> bool {
        self.integrity.is_some()
    }

    /// 평문에 대한 hex 태그. 키가 없으면 `None`
    pub fn sign(&self, payload: &[u8]) -> Result<Option<String>, CoreError> {
        self.integrity
            .as_ref()
            .map(|key| key.sign(payload))
            .transpose()
    }

    /// 값을 와이어 표현으로 인코딩
    pub fn encode<T: Serialize + ?Sized>(&self, payload: &T) -> Result<EncodedBody, CoreError> {
        let plaintext = serde_json::to_vec(payload)?;
        self.encode_bytes(&plaintext)
    }

    /// 직렬화된 평문을 인코딩
    pub fn encode_bytes(&self, plaintext: &[u8]) -> Result<EncodedBody, CoreError> {
        let hash = self.sign(plaintext)?;

        let (sealed, encrypted) = match &self.wrapper {
            Some(wrapper) => (envelope::seal(plaintext, wrapper.as_ref())?, true),
            None => (plaintext.to_vec(), false),
        };

        let body = if self.compression {
            compression::compress(&sealed)?
        } else {
            sealed
        };

        debug!(
            parent: &self.span,
            plaintext = plaintext.len(),
            body = body.len(),
            encrypted,
            "본문 인코딩"
        );

        Ok(EncodedBody {
            body,
            headers: WireHeaders {
                gzip: self.compression,
                encrypted,
                hash,
            },
        })
    }

    /// 와이어 본문을 디코딩해 값으로 파싱
    pub fn decode<T: DeserializeOwned>(
        &self,
        body: &[u8],
        headers: &WireHeaders,
    ) -> Result<T, CoreError> {
        let plaintext = self.decode_bytes(body, headers)?;
        Ok(serde_json::from_slice(&plaintext)?)
    }

    /// 와이어 본문을 평문 JSON 바이트로 복원
    pub fn decode_bytes(&self, body: &[u8], headers: &WireHeaders) -> Result<Vec<u8>, CoreError> {
        let sealed = if headers.gzip {
            compression::decompress(body)?
        } else {
            body.to_vec()
        };

        let plaintext = match (headers.encrypted, &self.unwrapper) {
            (true, Some(unwrapper)) => envelope::open(&sealed, unwrapper.as_ref())?,
            (true, None) => {
                return Err(CoreError::Crypto(
                    "암호화된 본문이지만 개인 키가 없음".to_string(),
                ));
            }
            (false, Some(_)) => {
                return Err(CoreError::Crypto(
                    "개인 키가 설정되어 평문 본문을 거부".to_string(),
                ));
            }
            (false, None) => sealed,
        };

        if let (Some(key), Some(tag)) = (&self.integrity, &headers.hash) {
            key.verify(&plaintext, tag)?;
        }

        debug!(
            parent: &self.span,
            body = body.len(),
            plaintext = plaintext.len(),
            "본문 디코딩"
        );
        Ok(plaintext)
    }
}

impl Default for SecurityCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SecurityCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityCodec")
            .field("integrity", &self.integrity.is_some())
            .field("encrypt", &self.wrapper.is_some())
            .field("decrypt", &self.unwrapper.is_some())
            .field("compression", &self.compression)
            .finish()
    }
}
