//! RSA 키 로드 (PEM).
//!
//! PKCS#8(`PUBLIC KEY`, `PRIVATE KEY`)과 PKCS#1(`RSA PUBLIC KEY`, `RSA PRIVATE KEY`) 모두 허용한다.

use std::path::Path;

use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use telemon_core::error::CoreError;
use tracing::debug;

/// PEM 문자열에서 공개 키 파싱
pub fn parse_public_key_pem(pem: &str) -> Result<RsaPublicKey, CoreError> {
    RsaPublicKey::from_public_key_pem(pem)
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
        .map_err(|e| CoreError::Config(format!("공개 키 파싱 실패: {e}")))
}

/// PEM 문자열에서 개인 키 파싱
pub fn parse_private_key_pem(pem: &str) -> Result<RsaPrivateKey, CoreError> {
    RsaPrivateKey::from_pkcs8_pem(pem)
        .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
        .map_err(|e| CoreError::Config(format!("개인 키 파싱 실패: {e}")))
}

/// 파일에서 공개 키 로드
pub fn load_public_key(path: &Path) -> Result<RsaPublicKey, CoreError> {
    let pem = std::fs::read_to_string(path).map_err(|e| {
        CoreError::Config(format!("공개 키 파일 읽기 실패 ({}): {e}", path.display()))
    })?;
    let key = parse_public_key_pem(&pem)?;
    debug!("공개 키 로드: {}", path.display());
    Ok(key)
}

/// 파일에서 개인 키 로드
pub fn load_private_key(path: &Path) -> Result<RsaPrivateKey, CoreError> {
    let pem = std::fs::read_to_string(path).map_err(|e| {
        CoreError::Config(format!("개인 키 파일 읽기 실패 ({}): {e}", path.display()))
    })?;
    let key = parse_private_key_pem(&pem)?;
    debug!("개인 키 로드: {}", path.display());
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_keys::private_key;
    use rsa::pkcs1::{EncodeRsaPrivateKey, EncodeRsaPublicKey};
    use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};

    #[test]
    fn parses_pkcs8_and_pkcs1_forms() {
        let private = private_key();
        let public = RsaPublicKey::from(private);

        let pkcs8_pub = public.to_public_key_pem(LineEnding::LF).unwrap();
        let pkcs1_pub = public.to_pkcs1_pem(LineEnding::LF).unwrap();
        assert_eq!(parse_public_key_pem(&pkcs8_pub).unwrap(), public);
        assert_eq!(parse_public_key_pem(&pkcs1_pub).unwrap(), public);

        let pkcs8_priv = private.to_pkcs8_pem(LineEnding::LF).unwrap();
        let pkcs1_priv = private.to_pkcs1_pem(LineEnding::LF).unwrap();
        assert_eq!(&parse_private_key_pem(&pkcs8_priv).unwrap(), private);
        assert_eq!(&parse_private_key_pem(&pkcs1_priv).unwrap(), private);
    }

    #[test]
    fn load_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let private = private_key();
        let pub_path = dir.path().join("public.pem");
        let priv_path = dir.path().join("private.pem");
        std::fs::write(
            &pub_path,
            RsaPublicKey::from(private)
                .to_public_key_pem(LineEnding::LF)
                .unwrap(),
        )
        .unwrap();
        std::fs::write(
            &priv_path,
            private.to_pkcs8_pem(LineEnding::LF).unwrap().as_bytes(),
        )
        .unwrap();

        assert!(load_public_key(&pub_path).is_ok());
        assert!(load_private_key(&priv_path).is_ok());
    }

    #[test]
    fn missing_or_garbage_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.pem");
        assert!(matches!(load_public_key(&missing), Err(CoreError::Config(_))));
        assert!(matches!(
            parse_private_key_pem("-----BEGIN NOTHING-----"),
            Err(CoreError::Config(_))
        ));
    }
}
