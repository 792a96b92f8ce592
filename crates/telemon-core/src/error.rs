//! telemon 핵심 에러 타입.
//!
//! 전송, 봉투(envelope), 암호, 무결성, 프로토콜 에러는 서로 다른 variant로 유지한다.

use thiserror::Error;

/// 코어 레이어 에러.
#[derive(Debug, Error)]
pub enum CoreError {
    /// JSON 직렬화/역직렬화 실패
    #[error("직렬화 에러: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 설정값 오류
    #[error("설정 에러: {0}")]
    Config(String),

    /// 네트워크 에러 (연결 실패, 타임아웃)
    #[error("네트워크 에러: {0}")]
    Network(String),

    /// 서버 에러 (5xx), 재시도 대상
    #[error("서버 에러 ({status}): {body}")]
    ServerError {
        /// HTTP 상태 코드
        status: u16,
        /// 응답 본문
        body: String,
    },

    /// 200이 아닌 그 외 응답
    #[error("예상치 못한 응답 ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP 상태 코드
        status: u16,
        /// 응답 본문
        body: String,
    },

    /// 재시도 한도 소진
    #[error("재시도 {attempts}회 모두 실패")]
    RetriesExhausted {
        /// 수행한 시도 횟수
        attempts: u32,
    },

    /// 종료 신호로 재시도 중단
    #[error("종료 신호로 취소됨")]
    Cancelled,

    /// 보안 봉투 프레이밍 오류 (암호 연산 이전에 거부)
    #[error("잘못된 봉투: {0}")]
    Envelope(String),

    /// 복호화/인증 실패
    #[error("암호 에러: {0}")]
    Crypto(String),

    /// HMAC 불일치
    #[error("무결성 검증 실패: {0}")]
    Integrity(String),

    /// MetricDto 불변식 위반
    #[error("프로토콜 위반: {0}")]
    Protocol(String),

    /// gzip 압축/해제 실패
    #[error("압축 에러: {0}")]
    Compression(String),

    /// 리소스를 찾을 수 없음
    #[error("{resource_type} 미발견: {id}")]
    NotFound {
        /// 리소스 종류 (예: "gauge", "counter")
        resource_type: String,
        /// 리소스 식별자
        id: String,
    },

    /// 저장소 에러
    #[error("저장소 에러: {0}")]
    Storage(String),

    /// I/O 에러
    #[error("I/O 에러: {0}")]
    Io(#[from] std::io::Error),

    /// 내부 에러 (예상치 못한 상황)
    #[error("내부 에러: {0}")]
    Internal(String),
}

impl CoreError {
    /// 수신 측에서 4xx로 거부해야 하는 디코드 경계 에러인지 여부
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            CoreError::Envelope(_)
                | CoreError::Crypto(_)
                | CoreError::Integrity(_)
                | CoreError::Protocol(_)
                | CoreError::Compression(_)
                | CoreError::Serialization(_)
        )
    }

    /// 전송 계층 에러인지 여부
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            CoreError::Network(_)
                | CoreError::ServerError { .. }
                | CoreError::UnexpectedStatus { .. }
                | CoreError::RetriesExhausted { .. }
                | CoreError::Cancelled
        )
    }
}
