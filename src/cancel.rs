use crate::error::{AnalysisError, AnalysisResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// 협력적 취소 토큰
///
/// 복제본은 같은 플래그를 공유하므로, 한 곳에서 `cancel`하면 모든 복제본에서 관측됩니다.
/// 분석 루프는 반복마다 `check`를 호출해 취소 시 즉시 중단합니다.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// 취소 요청
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// 취소되었으면 `Cancelled` 오류 반환
    ///
    /// # Arguments
    /// * `stage` - 오류 메시지에 남길 단계 이름
    pub fn check(&self, stage: &str) -> AnalysisResult<()> {
        if self.is_cancelled() {
            log::debug!("취소 감지: {stage}");
            return Err(AnalysisError::Cancelled(stage.to_string()));
        }
        Ok(())
    }
}
