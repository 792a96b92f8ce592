//! 메트릭 도메인 모델.
//!
//! 샘플러가 만드는 [`MetricSample`]과 와이어 형식 [`MetricDto`]를 정의한다.
//! 값은 닫힌 두 variant의 [`MetricValue`]로만 표현된다.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// 메트릭 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// 절대값 (마지막 값이 유지됨)
    Gauge,
    /// 증분 (수신 측에서 합산)
    Counter,
}

impl MetricKind {
    /// 와이어 표기
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Gauge => "gauge",
            MetricKind::Counter => "counter",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gauge" => Ok(MetricKind::Gauge),
            "counter" => Ok(MetricKind::Counter),
            other => Err(CoreError::Protocol(format!("알 수 없는 메트릭 타입: {other}"))),
        }
    }
}

/// 메트릭 값
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    /// 게이지 절대값
    Gauge(f64),
    /// 카운터 증분
    Counter(i64),
}

impl MetricValue {
    /// 값의 종류
    pub fn kind(&self) -> MetricKind {
        match self {
            MetricValue::Gauge(_) => MetricKind::Gauge,
            MetricValue::Counter(_) => MetricKind::Counter,
        }
    }

    /// 텍스트 표현을 종류에 맞게 파싱
    pub fn parse(kind: MetricKind, raw: &str) -> Result<Self, CoreError> {
        match kind {
            MetricKind::Gauge => {
                let v = raw
                    .parse::<f64>()
                    .map_err(|e| CoreError::Protocol(format!("잘못된 게이지 값 '{raw}': {e}")))?;
                finite_gauge(raw, v).map(MetricValue::Gauge)
            }
            MetricKind::Counter => raw
                .parse::<i64>()
                .map(MetricValue::Counter)
                .map_err(|e| CoreError::Protocol(format!("잘못된 카운터 값 '{raw}': {e}"))),
        }
    }
}

/// 게이지는 유한값만 허용 (NaN/inf는 JSON 스냅샷에 null로 기록됨)
fn finite_gauge(label: &str, v: f64) -> Result<f64, CoreError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(CoreError::Protocol(format!("유한하지 않은 게이지 값 '{label}': {v}")))
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Gauge(v) => write!(f, "{v}"),
            MetricValue::Counter(d) => write!(f, "{d}"),
        }
    }
}

/// 샘플러가 생성하는 단일 측정값. 생성 후 변경되지 않는다.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    /// 메트릭 이름
    pub name: String,
    /// 측정값
    pub value: MetricValue,
}

impl MetricSample {
    /// 게이지 샘플 생성
    pub fn gauge(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value: MetricValue::Gauge(value),
        }
    }

    /// 카운터 샘플 생성
    pub fn counter(name: impl Into<String>, delta: i64) -> Self {
        Self {
            name: name.into(),
            value: MetricValue::Counter(delta),
        }
    }

    /// 샘플 종류
    pub fn kind(&self) -> MetricKind {
        self.value.kind()
    }
}

/// 와이어 형식 메트릭.
///
/// `type = "gauge"`이면 `value`만, `type = "counter"`이면 `delta`만 존재해야 한다.
/// 값 조회 요청(`/value/`)에서는 둘 다 비어 있을 수 있다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDto {
    /// 메트릭 이름
    pub id: String,
    /// 메트릭 종류
    #[serde(rename = "type")]
    pub kind: MetricKind,
    /// 게이지 값
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    /// 카운터 증분
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<i64>,
}

impl MetricDto {
    /// 값 없는 조회용 DTO
    pub fn query(id: impl Into<String>, kind: MetricKind) -> Self {
        Self {
            id: id.into(),
            kind,
            value: None,
            delta: None,
        }
    }

    /// value/delta 불변식 검증
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.id.is_empty() {
            return Err(CoreError::Protocol("메트릭 id 누락".to_string()));
        }
        match (self.kind, self.value, self.delta) {
            (MetricKind::Gauge, Some(v), None) => finite_gauge(&self.id, v).map(|_| ()),
            (MetricKind::Counter, None, Some(_)) => Ok(()),
            (MetricKind::Gauge, _, _) => Err(CoreError::Protocol(format!(
                "게이지 '{}'는 value만 가져야 함",
                self.id
            ))),
            (MetricKind::Counter, _, _) => Err(CoreError::Protocol(format!(
                "카운터 '{}'는 delta만 가져야 함",
                self.id
            ))),
        }
    }
}

impl From<&MetricSample> for MetricDto {
    fn from(sample: &MetricSample) -> Self {
        let (value, delta) = match sample.value {
            MetricValue::Gauge(v) => (Some(v), None),
            MetricValue::Counter(d) => (None, Some(d)),
        };
        Self {
            id: sample.name.clone(),
            kind: sample.kind(),
            value,
            delta,
        }
    }
}

impl From<MetricSample> for MetricDto {
    fn from(sample: MetricSample) -> Self {
        MetricDto::from(&sample)
    }
}

impl TryFrom<&MetricDto> for MetricSample {
    type Error = CoreError;

    fn try_from(dto: &MetricDto) -> Result<Self, Self::Error> {
        dto.validate()?;
        let value = match (dto.value, dto.delta) {
            (Some(v), _) => MetricValue::Gauge(v),
            (_, Some(d)) => MetricValue::Counter(d),
            (None, None) => {
                return Err(CoreError::Protocol(format!("'{}' 값 누락", dto.id)));
            }
        };
        Ok(Self {
            name: dto.id.clone(),
            value,
        })
    }
}

/// 한 번의 윈도우 플러시로 전송되는 메트릭 묶음 (배열 순서대로 적용)
pub type Batch = Vec<MetricDto>;

/// 배치 전체를 검증해 샘플로 변환한다. 하나라도 위반하면 아무것도 반환하지 않는다.
pub fn samples_from_batch(batch: &[MetricDto]) -> Result<Vec<MetricSample>, CoreError> {
    batch.iter().map(MetricSample::try_from).collect()
}
