use crate::analyzer::key_level_analyzer::KeyLevelAnalyzer;
use crate::analyzer::{Analysis, AnalysisOutput};
use crate::cancel::CancelToken;
use crate::config_loader::{ConfigError, ConfigResult, ConfigValidation};
use crate::error::AnalysisResult;
use crate::model::{AlgorithmKind, AnnotatedCandle, Candle, Pivot, TrendSignal};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::sync::Arc;

/// 지지/저항 구간을 만들 때 사용할 피벗 가격
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZonePrice {
    /// 피벗 캔들의 종가
    #[default]
    Close,
    /// 저항은 피벗 고가, 지지는 피벗 저가
    Extreme,
}

/// 돌파 검출 파라미터
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakoutParams {
    /// 현재 캔들 이전에 살펴볼 캔들 수
    pub back_candles: usize,
    /// 구간 양끝 여유 캔들 수
    pub window: usize,
    /// 평평한 구간으로 인정할 피벗 개수
    pub num_candles_for_breakout: usize,
    /// 구간 폭 (절대 가격 단위)
    pub zone_width: f64,
    /// 구간 가격 기준
    pub zone_price: ZonePrice,
}

impl Default for BreakoutParams {
    fn default() -> Self {
        BreakoutParams {
            back_candles: 30,
            window: 30,
            num_candles_for_breakout: 10,
            zone_width: 0.0002,
            zone_price: ZonePrice::Close,
        }
    }
}

impl ConfigValidation for BreakoutParams {
    fn validate(&self) -> ConfigResult<()> {
        if self.back_candles == 0 || self.window == 0 {
            return Err(ConfigError::ValidationError(
                "back_candles와 window는 0보다 커야 합니다".to_string(),
            ));
        }
        if self.num_candles_for_breakout == 0 {
            return Err(ConfigError::ValidationError(
                "돌파 판정 피벗 개수는 0보다 커야 합니다".to_string(),
            ));
        }
        let reach = self
            .back_candles
            .checked_add(self.window)
            .and_then(|n| n.checked_add(self.window));
        if reach.is_none() {
            return Err(ConfigError::ValidationError(format!(
                "back_candles와 window가 너무 큽니다: back={}, window={}",
                self.back_candles, self.window
            )));
        }
        if !self.zone_width.is_finite() || self.zone_width < 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "구간 폭은 0 이상의 유한한 값이어야 합니다: {}",
                self.zone_width
            )));
        }
        Ok(())
    }
}

/// 값들이 모두 평균에서 `zone_width` 이내인 평평한 구간이면 평균 반환
///
/// 값의 개수가 정확히 `count`가 아니면 `None`.
pub fn flat_zone_average(values: &[f64], count: usize, zone_width: f64) -> Option<f64> {
    if values.len() != count || count == 0 {
        return None;
    }

    let average = values.iter().sum::<f64>() / count as f64;
    values
        .iter()
        .all(|v| (average - v).abs() <= zone_width)
        .then_some(average)
}

/// 수평 지지/저항 돌파 분석기
///
/// 키 레벨 분석기로 피벗을 먼저 분류한 뒤, 최근 피벗들이 평평한 구간을 이루고
/// 현재 종가가 그 구간을 `zone_width` 넘게 벗어난 캔들을 표시합니다.
///
/// 지지 이탈(Bearish)과 저항 돌파(Bullish)는 독립적으로 판정하며,
/// 둘 다 해당하면 저항 돌파가 나중에 판정되어 Bullish가 됩니다.
/// 분석 루프 안에서는 취소를 확인하지 않고, 앞선 피벗 분류 단계에서만 확인합니다.
#[derive(Debug, Clone)]
pub struct BreakoutAnalyzer {
    params: BreakoutParams,
    key_levels: Arc<KeyLevelAnalyzer>,
}

impl Display for BreakoutAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "BreakoutAnalyzer(back={}, window={}, count={}, zone={})",
            self.params.back_candles,
            self.params.window,
            self.params.num_candles_for_breakout,
            self.params.zone_width
        )
    }
}

impl BreakoutAnalyzer {
    /// 새 돌파 분석기 생성
    ///
    /// # Arguments
    /// * `params` - 돌파 검출 파라미터
    /// * `key_levels` - 피벗 분류에 사용할 키 레벨 분석기
    ///
    /// # Returns
    /// * `AnalysisResult<BreakoutAnalyzer>` - 파라미터가 유효하지 않으면 `InvalidParameters`
    pub fn new(params: BreakoutParams, key_levels: Arc<KeyLevelAnalyzer>) -> AnalysisResult<Self> {
        params.validate()?;
        log::debug!(
            "돌파 분석기 생성: back={}, window={}, count={}, zone={}, price={:?}",
            params.back_candles,
            params.window,
            params.num_candles_for_breakout,
            params.zone_width,
            params.zone_price
        );
        Ok(BreakoutAnalyzer { params, key_levels })
    }

    pub fn params(&self) -> &BreakoutParams {
        &self.params
    }

    /// 피벗 분류 후 돌파 검출
    pub fn run(
        &self,
        candles: &[Candle],
        cancel: &CancelToken,
    ) -> AnalysisResult<Vec<AnnotatedCandle>> {
        let classified = self.key_levels.run(candles, cancel)?;
        Ok(self.run_on_pivots(&classified.candles))
    }

    /// 이미 피벗이 분류된 캔들로 돌파 검출
    ///
    /// 결과 캔들은 피벗과 돌파 신호를 가지며 EMA는 0입니다.
    pub fn run_on_pivots(&self, candles: &[AnnotatedCandle]) -> Vec<AnnotatedCandle> {
        let result: Vec<AnnotatedCandle> = (0..candles.len())
            .map(|index| {
                let signal = self.classify(candles, index);
                AnnotatedCandle::new(candles[index].candle)
                    .with_pivot(candles[index].pivot)
                    .with_breakout(signal)
            })
            .collect();

        let bullish = result
            .iter()
            .filter(|c| c.breakout_signal == TrendSignal::Bullish)
            .count();
        let bearish = result
            .iter()
            .filter(|c| c.breakout_signal == TrendSignal::Bearish)
            .count();
        log::debug!(
            "돌파 검출 완료: 캔들={}, Bullish={}, Bearish={}",
            result.len(),
            bullish,
            bearish
        );
        result
    }

    /// `index` 캔들의 돌파 신호 판정
    ///
    /// 판정 구간은 `index - back - window`에서 시작해 `len - index - window`개 캔들입니다.
    pub fn classify(&self, candles: &[AnnotatedCandle], index: usize) -> TrendSignal {
        let BreakoutParams {
            back_candles,
            window,
            num_candles_for_breakout: count,
            zone_width,
            zone_price,
        } = self.params;
        let len = candles.len();

        if index <= back_candles.saturating_add(window) || index.saturating_add(window) > len {
            return TrendSignal::NoChange;
        }

        let start = index - back_candles - window;
        let end = (start + (len - index - window)).min(len);
        let zone = &candles[start..end];

        let highs = last_pivot_prices(zone, Pivot::High, zone_price, count);
        let lows = last_pivot_prices(zone, Pivot::Low, zone_price, count);
        let close = candles[index].close();

        let mut signal = TrendSignal::NoChange;

        if let Some(support) = flat_zone_average(&lows, count, zone_width) {
            if support - close > zone_width {
                signal = TrendSignal::Bearish;
            }
        }

        if let Some(resistance) = flat_zone_average(&highs, count, zone_width) {
            if close - resistance > zone_width {
                signal = TrendSignal::Bullish;
            }
        }

        if signal != TrendSignal::NoChange {
            log::trace!("돌파 신호: index={index}, close={close}, signal={signal:?}");
        }
        signal
    }
}

/// 구간에서 `pivot` 종류 피벗의 가격을 최근 `count`개까지 시간순으로 추출
fn last_pivot_prices(
    zone: &[AnnotatedCandle],
    pivot: Pivot,
    price: ZonePrice,
    count: usize,
) -> Vec<f64> {
    let prices: Vec<f64> = zone
        .iter()
        .filter(|c| c.pivot == pivot)
        .map(|c| match (price, pivot) {
            (ZonePrice::Extreme, Pivot::High) => c.candle.high,
            (ZonePrice::Extreme, Pivot::Low) => c.candle.low,
            _ => c.candle.close,
        })
        .collect();

    let skip = prices.len().saturating_sub(count);
    prices[skip..].to_vec()
}

impl Analysis for BreakoutAnalyzer {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::BreakoutDetection
    }

    fn analyze(&self, candles: &[Candle], cancel: &CancelToken) -> AnalysisResult<AnalysisOutput> {
        self.run(candles, cancel).map(AnalysisOutput::Candles)
    }
}
