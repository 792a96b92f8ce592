//! 하이브리드 암호 봉투.
//!
//! 프레임: `keySize(u32 BE) | RSA로 감싼 AES-256 키 | nonce(12) ‖ ciphertext+tag`.
//! 길이 필드가 실제 프레임과 맞지 않으면 암호 연산을 시도하기 전에
//! [`CoreError::Envelope`]로 거부한다.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use telemon_core::error::CoreError;

/// AES-GCM nonce 길이
pub const NONCE_SIZE: usize = 12;

/// AES-256 키 길이
pub const SYMMETRIC_KEY_SIZE: usize = 32;

const KEY_SIZE_PREFIX: usize = 4;

/// 대칭 키를 수신자 공개 키로 감싼다
pub trait KeyWrapper: Send + Sync {
    /// 대칭 키 암호화
    fn wrap_key(&self, key: &[u8]) -> Result<Vec<u8>, CoreError>;
}

/// 감싼 대칭 키를 개인 키로 푼다
pub trait KeyUnwrapper: Send + Sync {
    /// 대칭 키 복호화
    fn unwrap_key(&self, wrapped: &[u8]) -> Result<Vec<u8>, CoreError>;
}

impl KeyWrapper for RsaPublicKey {
    fn wrap_key(&self, key: &[u8]) -> Result<Vec<u8>, CoreError> {
        self.encrypt(&mut OsRng, Pkcs1v15Encrypt, key)
            .map_err(|e| CoreError::Crypto(format!("RSA 키 암호화 실패: {e}")))
    }
}

impl KeyUnwrapper for RsaPrivateKey {
    fn unwrap_key(&self, wrapped: &[u8]) -> Result<Vec<u8>, CoreError> {
        self.decrypt(Pkcs1v15Encrypt, wrapped)
            .map_err(|e| CoreError::Crypto(format!("RSA 키 복호화 실패: {e}")))
    }
}

/// 파싱된 봉투. 원본 프레임을 빌려 쓴다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecureEnvelope<'a> {
    /// RSA로 감싼 대칭 키
    pub wrapped_key: &'a [u8],
    /// AES-GCM nonce
    pub nonce: &'a [u8],
    /// 암호문 + 인증 태그
    pub ciphertext: &'a [u8],
}

impl<'a> SecureEnvelope<'a> {
    /// 프레임 구조만 검증한다. 암호 연산은 하지 않는다.
    pub fn parse(frame: &'a [u8]) -> Result<Self, CoreError> {
        if frame.len() < KEY_SIZE_PREFIX {
            return Err(CoreError::Envelope(format!(
                "프레임이 너무 짧음: {} bytes",
                frame.len()
            )));
        }
        let (prefix, rest) = frame.split_at(KEY_SIZE_PREFIX);
        let key_size = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
        if key_size == 0 {
            return Err(CoreError::Envelope("keySize가 0".to_string()));
        }

        let required = key_size.checked_add(NONCE_SIZE).ok_or_else(|| {
            CoreError::Envelope(format!("keySize 범위 초과: {key_size}"))
        })?;
        if rest.len() < required {
            return Err(CoreError::Envelope(format!(
                "keySize {key_size}와 프레임 길이 {} 불일치",
                frame.len()
            )));
        }

        let (wrapped_key, rest) = rest.split_at(key_size);
        let (nonce, ciphertext) = rest.split_at(NONCE_SIZE);
        Ok(Self {
            wrapped_key,
            nonce,
            ciphertext,
        })
    }

    /// 와이어 프레임으로 직렬화
    pub fn to_bytes(&self) -> Result<Vec<u8>, CoreError> {
        let key_size = u32::try_from(self.wrapped_key.len())
            .map_err(|_| CoreError::Envelope("감싼 키가 너무 큼".to_string()))?;
        let mut frame = Vec::with_capacity(
            KEY_SIZE_PREFIX + self.wrapped_key.len() + self.nonce.len() + self.ciphertext.len(),
        );
        frame.extend_from_slice(&key_size.to_be_bytes());
        frame.extend_from_slice(self.wrapped_key);
        frame.extend_from_slice(self.nonce);
        frame.extend_from_slice(self.ciphertext);
        Ok(frame)
    }
}

/// 평문을 일회용 AES-256-GCM 키로 암호화하고 키는 `wrapper`로 감싼다
pub fn seal(plaintext: &[u8], wrapper: &dyn KeyWrapper) -> Result<Vec<u8>, CoreError> {
    let key = Aes256Gcm::generate_key(&mut OsRng);
    let cipher = Aes256Gcm::new(&key);
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| CoreError::Crypto("AES-GCM 암호화 실패".to_string()))?;
    let wrapped_key = wrapper.wrap_key(key.as_slice())?;

    SecureEnvelope {
        wrapped_key: &wrapped_key,
        nonce: nonce.as_slice(),
        ciphertext: &ciphertext,
    }
    .to_bytes()
}

/// 봉투를 검증하고 복호화한다
pub fn open(frame: &[u8], unwrapper: &dyn KeyUnwrapper) -> Result<Vec<u8>, CoreError> {
    let envelope = SecureEnvelope::parse(frame)?;
    let key = unwrapper.unwrap_key(envelope.wrapped_key)?;
    if key.len() != SYMMETRIC_KEY_SIZE {
        return Err(CoreError::Crypto(format!(
            "대칭 키 길이 오류: {} bytes",
            key.len()
        )));
    }
    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|e| CoreError::Crypto(format!("AES 키 초기화 실패: {e}")))?;
    cipher
        .decrypt(Nonce::from_slice(envelope.nonce), envelope.ciphertext)
        .map_err(|_| CoreError::Crypto("AES-GCM 인증 실패".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_keys::private_key;
    use assert_matches::assert_matches;
    use rsa::traits::PublicKeyParts;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 호출 횟수만 세고 실제 복호화는 위임하는 unwrapper
    struct CountingUnwrapper {
        inner: RsaPrivateKey,
        calls: AtomicUsize,
    }

    impl KeyUnwrapper for CountingUnwrapper {
        fn unwrap_key(&self, wrapped: &[u8]) -> Result<Vec<u8>, CoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.unwrap_key(wrapped)
        }
    }

    fn counting() -> CountingUnwrapper {
        CountingUnwrapper {
            inner: private_key().clone(),
            calls: AtomicUsize::new(0),
        }
    }

    #[test]
    fn seal_open_roundtrip() {
        let key = private_key();
        let public = RsaPublicKey::from(key);
        let plaintext = br#"[{"id":"RandomValue","type":"gauge","value":0.42}]"#;

        let frame = seal(plaintext, &public).unwrap();
        let parsed = SecureEnvelope::parse(&frame).unwrap();
        assert_eq!(parsed.wrapped_key.len(), public.size());
        assert_eq!(parsed.nonce.len(), NONCE_SIZE);

        assert_eq!(open(&frame, key).unwrap(), plaintext.to_vec());
    }

    #[test]
    fn inconsistent_key_size_rejected_before_crypto() {
        let unwrapper = counting();
        let public = RsaPublicKey::from(private_key());
        let frame = seal(b"payload", &public).unwrap();

        // keySize를 실제 남은 길이보다 크게 조작
        let mut oversized = frame.clone();
        oversized[..4].copy_from_slice(&(frame.len() as u32).to_be_bytes());
        assert_matches!(open(&oversized, &unwrapper), Err(CoreError::Envelope(_)));

        // nonce를 담을 공간이 없는 프레임
        let key_size = public.size();
        let truncated = &frame[..4 + key_size + NONCE_SIZE - 1];
        assert_matches!(open(truncated, &unwrapper), Err(CoreError::Envelope(_)));

        assert_matches!(open(&[0, 0], &unwrapper), Err(CoreError::Envelope(_)));
        assert_matches!(
            open(&[0, 0, 0, 0, 1, 2, 3], &unwrapper),
            Err(CoreError::Envelope(_))
        );
        assert_matches!(
            open(&[0xff, 0xff, 0xff, 0xff], &unwrapper),
            Err(CoreError::Envelope(_))
        );

        assert_eq!(unwrapper.calls.load(Ordering::SeqCst), 0);

        // 정상 프레임에서는 한 번 호출된다
        assert!(open(&frame, &unwrapper).is_ok());
        assert_eq!(unwrapper.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn tampered_ciphertext_is_crypto_error() {
        let public = RsaPublicKey::from(private_key());
        let mut frame = seal(b"payload bytes", &public).unwrap();
        let last = frame.len() - 1;
        frame[last] ^= 0x01;
        assert_matches!(open(&frame, private_key()), Err(CoreError::Crypto(_)));
    }

    #[test]
    fn tampered_wrapped_key_is_crypto_error() {
        let public = RsaPublicKey::from(private_key());
        let mut frame = seal(b"payload bytes", &public).unwrap();
        frame[10] ^= 0x80;
        assert_matches!(open(&frame, private_key()), Err(CoreError::Crypto(_)));
    }

    #[test]
    fn envelope_to_bytes_layout() {
        let envelope = SecureEnvelope {
            wrapped_key: &[0xaa; 3],
            nonce: &[0x11; NONCE_SIZE],
            ciphertext: &[0x22; 5],
        };
        let frame = envelope.to_bytes().unwrap();
        assert_eq!(&frame[..4], &[0, 0, 0, 3]);
        assert_eq!(frame.len(), 4 + 3 + NONCE_SIZE + 5);
        assert_eq!(SecureEnvelope::parse(&frame).unwrap(), envelope);
    }
}
