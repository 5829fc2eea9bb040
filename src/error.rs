use crate::config_loader::ConfigError;
use thiserror::Error;

/// 가격 소스 등 외부 협력자가 돌려주는 불투명 오류
pub type FetchError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// 분석 파이프라인에서 발생하는 모든 오류
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// 요청에 해당하는 후보가 없음 (등록된 후보 이름 목록 포함)
    #[error("요청과 일치하는 핸들러가 없습니다. 등록된 후보: [{}]", .candidates.join(", "))]
    NoMatchingHandler { candidates: Vec<String> },

    /// 선언된 출력 형태와 실제 결과 형태가 다름
    #[error("결과 형태 불일치: 선언={declared}, 실제={actual}")]
    TypeMismatch {
        declared: &'static str,
        actual: &'static str,
    },

    /// 협력적 취소가 루프 중간에 감지됨
    #[error("취소됨: {0}")]
    Cancelled(String),

    /// 가격 조회 실패 (원본 오류를 그대로 전달)
    #[error("가격 조회 실패: {0}")]
    Fetch(#[source] FetchError),

    /// 잘못된 분석 파라미터
    #[error("잘못된 파라미터: {0}")]
    InvalidParameters(String),
}

impl AnalysisError {
    /// 취소로 인한 오류인지 확인
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AnalysisError::Cancelled(_))
    }
}

impl From<ConfigError> for AnalysisError {
    fn from(err: ConfigError) -> Self {
        AnalysisError::InvalidParameters(err.to_string())
    }
}

/// 분석 결과 타입
pub type AnalysisResult<T> = Result<T, AnalysisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_matching_handler_lists_candidates() {
        let err = AnalysisError::NoMatchingHandler {
            candidates: vec!["ema".to_string(), "key_levels".to_string()],
        };
        let message = err.to_string();
        assert!(message.contains("ema, key_levels"));
    }

    #[test]
    fn test_fetch_error_keeps_source() {
        let io = std::io::Error::other("connection reset");
        let err = AnalysisError::Fetch(Box::new(io));
        assert!(err.to_string().contains("connection reset"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_config_error_conversion() {
        let err: AnalysisError = ConfigError::ValidationError("period".to_string()).into();
        assert!(matches!(err, AnalysisError::InvalidParameters(_)));
    }
}
