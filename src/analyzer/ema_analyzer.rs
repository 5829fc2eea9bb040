use crate::analyzer::{Analysis, AnalysisOutput};
use crate::cancel::CancelToken;
use crate::config_loader::{ConfigError, ConfigResult, ConfigValidation};
use crate::error::AnalysisResult;
use crate::model::{AlgorithmKind, AnnotatedCandle, Candle};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// EMA 분석 파라미터
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmaParams {
    /// EMA 계산 기간
    pub period: usize,
}

impl Default for EmaParams {
    fn default() -> Self {
        EmaParams { period: 10 }
    }
}

impl ConfigValidation for EmaParams {
    fn validate(&self) -> ConfigResult<()> {
        if self.period == 0 {
            return Err(ConfigError::ValidationError(
                "EMA 기간은 0보다 커야 합니다".to_string(),
            ));
        }
        Ok(())
    }
}

/// 지수이동평균(EMA) 분석기
///
/// `multiplier = 2 / (period + 1)`, 첫 값은 첫 종가이며 이후
/// `ema[i] = (close[i] - ema[i-1]) * multiplier + ema[i-1]` 점화식을 따릅니다.
#[derive(Debug, Clone)]
pub struct EmaAnalyzer {
    params: EmaParams,
    multiplier: f64,
}

impl Display for EmaAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EmaAnalyzer(period={})", self.params.period)
    }
}

impl EmaAnalyzer {
    /// 새 EMA 분석기 생성
    ///
    /// # Arguments
    /// * `params` - EMA 파라미터
    ///
    /// # Returns
    /// * `AnalysisResult<EmaAnalyzer>` - 파라미터가 유효하지 않으면 `InvalidParameters`
    pub fn new(params: EmaParams) -> AnalysisResult<Self> {
        params.validate()?;
        log::debug!("EMA 분석기 생성: period={}", params.period);

        Ok(EmaAnalyzer {
            params,
            multiplier: 2.0 / (params.period as f64 + 1.0),
        })
    }

    pub fn params(&self) -> &EmaParams {
        &self.params
    }

    /// 평활화 계수
    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    /// EMA 계산
    ///
    /// 입력과 같은 길이/순서의 새 시퀀스를 반환하며 빈 입력이면 빈 결과를 반환합니다.
    /// 인덱스 1부터 매 반복마다 취소 여부를 확인하고, 취소되면 부분 결과 없이 중단합니다.
    pub fn run(
        &self,
        candles: &[Candle],
        cancel: &CancelToken,
    ) -> AnalysisResult<Vec<AnnotatedCandle>> {
        let Some(first) = candles.first() else {
            log::debug!("EMA: 입력 캔들 없음");
            return Ok(Vec::new());
        };

        let mut result = Vec::with_capacity(candles.len());
        let mut ema = first.close;
        result.push(AnnotatedCandle::new(*first).with_ema(ema));

        for candle in &candles[1..] {
            cancel.check("EMA 계산 중 취소")?;
            ema = (candle.close - ema) * self.multiplier + ema;
            result.push(AnnotatedCandle::new(*candle).with_ema(ema));
        }

        log::trace!("EMA 계산 완료: {}개, 마지막 값={:.4}", result.len(), ema);
        Ok(result)
    }
}

impl Analysis for EmaAnalyzer {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::Ema
    }

    fn analyze(&self, candles: &[Candle], cancel: &CancelToken) -> AnalysisResult<AnalysisOutput> {
        self.run(candles, cancel).map(AnalysisOutput::Candles)
    }
}
