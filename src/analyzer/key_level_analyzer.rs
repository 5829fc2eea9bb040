use crate::analyzer::{Analysis, AnalysisOutput};
use crate::cancel::CancelToken;
use crate::config_loader::{ConfigError, ConfigResult, ConfigValidation};
use crate::error::AnalysisResult;
use crate::model::{AlgorithmKind, AnnotatedCandle, Candle, KeyLevelResult, Pivot};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// 키 레벨 분석 파라미터
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyLevelParams {
    /// 피벗 판정 시 양쪽으로 살펴볼 캔들 수
    pub neighbor_window: usize,
    /// 같은 레벨로 볼 상대 허용 오차 (0.005 = 0.5%)
    pub epsilon: f64,
}

impl Default for KeyLevelParams {
    fn default() -> Self {
        KeyLevelParams {
            neighbor_window: 3,
            epsilon: 0.005,
        }
    }
}

impl ConfigValidation for KeyLevelParams {
    fn validate(&self) -> ConfigResult<()> {
        if self.neighbor_window == 0 {
            return Err(ConfigError::ValidationError(
                "이웃 캔들 수는 0보다 커야 합니다".to_string(),
            ));
        }
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "epsilon은 0 이상의 유한한 값이어야 합니다: {}",
                self.epsilon
            )));
        }
        Ok(())
    }
}

/// 키 레벨(지지/저항) 분석기
///
/// 캔들마다 피벗을 분류하고, 피벗 가격을 두 단계로 중복 제거/병합해 레벨 목록을 만듭니다.
#[derive(Debug, Clone)]
pub struct KeyLevelAnalyzer {
    params: KeyLevelParams,
}

impl Display for KeyLevelAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "KeyLevelAnalyzer(window={}, epsilon={})",
            self.params.neighbor_window, self.params.epsilon
        )
    }
}

/// 레벨 `level` 기준 ±`level * tolerance` 범위 안에 `value`가 있는지 확인
fn within_band(level: f64, value: f64, tolerance: f64) -> bool {
    level + level * tolerance >= value && value >= level - level * tolerance
}

/// 1단계: 발견 순서를 유지하며, 이미 채택된 레벨의 허용 범위에 들지 않는 레벨만 채택
pub fn dedup_levels(raw: &[f64], epsilon: f64) -> Vec<f64> {
    let mut distinct: Vec<f64> = Vec::new();
    for &level in raw {
        if !distinct.iter().any(|&d| within_band(d, level, epsilon)) {
            distinct.push(level);
        }
    }
    distinct
}

/// 2단계: 앞쪽 레벨부터 기준으로 삼아 뒤쪽 레벨과 순서대로 비교하고,
/// `3 * epsilon` 범위 안이면 평균으로 합친 뒤 뒤쪽 레벨을 제거합니다.
///
/// 기준 값은 병합할 때마다 갱신되고 이후 비교에 바로 쓰이므로 결과는 평가 순서에 의존합니다.
/// 남은 레벨은 원래 순서를 유지한 채 다음 기준 후보가 됩니다.
pub fn merge_levels(distinct: &[f64], epsilon: f64) -> Vec<f64> {
    let tolerance = 3.0 * epsilon;
    let mut merged = Vec::with_capacity(distinct.len());
    let mut remaining = distinct.to_vec();

    while !remaining.is_empty() {
        let mut anchor = remaining[0];
        let mut survivors = Vec::with_capacity(remaining.len());

        for &candidate in &remaining[1..] {
            if within_band(candidate, anchor, tolerance) {
                anchor = (anchor + candidate) / 2.0;
            } else {
                survivors.push(candidate);
            }
        }

        merged.push(anchor);
        remaining = survivors;
    }

    merged
}

impl KeyLevelAnalyzer {
    /// 새 키 레벨 분석기 생성
    ///
    /// # Returns
    /// * `AnalysisResult<KeyLevelAnalyzer>` - 파라미터가 유효하지 않으면 `InvalidParameters`
    pub fn new(params: KeyLevelParams) -> AnalysisResult<Self> {
        params.validate()?;
        log::debug!(
            "키 레벨 분석기 생성: window={}, epsilon={}",
            params.neighbor_window,
            params.epsilon
        );
        Ok(KeyLevelAnalyzer { params })
    }

    pub fn params(&self) -> &KeyLevelParams {
        &self.params
    }

    /// `index` 캔들의 피벗 분류
    ///
    /// 양쪽에 이웃 캔들이 부족하면 `Unchanged`. `[index - n, index + n)` 구간에서
    /// 더 낮은 저가가 없으면 Low 후보, 더 높은 고가가 없으면 High 후보이며,
    /// 둘 다 해당하면 모호하므로 `Unchanged`입니다.
    pub fn pivot_at(&self, candles: &[Candle], index: usize) -> Pivot {
        let n = self.params.neighbor_window;
        if index < n || index.saturating_add(n) >= candles.len() {
            return Pivot::Unchanged;
        }

        let current = &candles[index];
        let window = &candles[index - n..index + n];
        let is_low = !window.iter().any(|c| current.low > c.low);
        let is_high = !window.iter().any(|c| current.high < c.high);

        match (is_low, is_high) {
            (true, false) => Pivot::Low,
            (false, true) => Pivot::High,
            _ => Pivot::Unchanged,
        }
    }

    /// 피벗 분류와 키 레벨 계산
    ///
    /// 피벗 탐색 반복마다 취소 여부를 확인하고, 취소되면 부분 결과 없이 중단합니다.
    pub fn run(&self, candles: &[Candle], cancel: &CancelToken) -> AnalysisResult<KeyLevelResult> {
        let mut annotated = Vec::with_capacity(candles.len());
        let mut raw_levels = Vec::new();

        for (index, candle) in candles.iter().enumerate() {
            cancel.check("키 레벨 검출 중 취소")?;

            let pivot = self.pivot_at(candles, index);
            match pivot {
                Pivot::High => raw_levels.push(candle.high),
                Pivot::Low => raw_levels.push(candle.low),
                Pivot::Unchanged => {}
            }
            annotated.push(AnnotatedCandle::new(*candle).with_pivot(pivot));
        }

        let distinct = dedup_levels(&raw_levels, self.params.epsilon);
        let levels = merge_levels(&distinct, self.params.epsilon);

        log::debug!(
            "키 레벨 검출 완료: 캔들={}, 피벗={}, 중복 제거 후={}, 병합 후={}",
            candles.len(),
            raw_levels.len(),
            distinct.len(),
            levels.len()
        );
        Ok(KeyLevelResult::new(annotated, levels))
    }
}

impl Analysis for KeyLevelAnalyzer {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::KeyLevels
    }

    fn analyze(&self, candles: &[Candle], cancel: &CancelToken) -> AnalysisResult<AnalysisOutput> {
        self.run(candles, cancel).map(AnalysisOutput::KeyLevels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalysisError;
    use chrono::{DateTime, Utc};

    fn candles_from_lows(lows: &[f64]) -> Vec<Candle> {
        let time = DateTime::<Utc>::UNIX_EPOCH;
        lows.iter()
            .map(|&l| Candle::new(time, l + 0.5, l + 1.0, l, l + 0.5, 1000.0))
            .collect()
    }

    #[test]
    fn test_v_shape_low_pivot() {
        let analyzer = KeyLevelAnalyzer::new(KeyLevelParams::default()).unwrap();
        let candles = candles_from_lows(&[5.0, 4.0, 3.0, 2.0, 1.0, 2.0, 3.0, 4.0, 5.0]);

        assert_eq!(analyzer.pivot_at(&candles, 4), Pivot::Low);
        // 이웃이 부족한 가장자리
        assert_eq!(analyzer.pivot_at(&candles, 2), Pivot::Unchanged);
        assert_eq!(analyzer.pivot_at(&candles, 6), Pivot::Unchanged);
    }

    #[test]
    fn test_inverted_v_high_pivot() {
        let analyzer = KeyLevelAnalyzer::new(KeyLevelParams::default()).unwrap();
        let candles = candles_from_lows(&[1.0, 2.0, 3.0, 4.0, 5.0, 4.0, 3.0, 2.0, 1.0]);
        assert_eq!(analyzer.pivot_at(&candles, 4), Pivot::High);
    }

    #[test]
    fn test_flat_window_is_ambiguous() {
        let analyzer = KeyLevelAnalyzer::new(KeyLevelParams::default()).unwrap();
        let candles = candles_from_lows(&[3.0; 9]);
        assert_eq!(analyzer.pivot_at(&candles, 4), Pivot::Unchanged);
    }

    #[test]
    fn test_dedup_then_merge() {
        let distinct = dedup_levels(&[100.0, 100.2, 150.0], 0.005);
        assert_eq!(distinct, vec![100.0, 150.0]);

        let merged = merge_levels(&distinct, 0.005);
        assert_eq!(merged, vec![100.0, 150.0]);
    }

    #[test]
    fn test_merge_uses_running_average() {
        // 100과 101은 1.5% 이내라 100.5로 합쳐지고, 102는 갱신된 100.5 기준으로 다시 비교
        let merged = merge_levels(&[100.0, 101.0, 102.0, 200.0], 0.005);
        assert_eq!(merged, vec![101.25, 200.0]);
    }

    #[test]
    fn test_merge_keeps_survivor_order() {
        let merged = merge_levels(&[100.0, 200.0, 101.0, 201.0], 0.005);
        assert_eq!(merged, vec![100.5, 200.5]);
    }

    #[test]
    fn test_run_collects_levels() {
        let analyzer = KeyLevelAnalyzer::new(KeyLevelParams::default()).unwrap();
        let candles = candles_from_lows(&[5.0, 4.0, 3.0, 2.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        let result = analyzer.run(&candles, &CancelToken::new()).unwrap();

        assert_eq!(result.candles.len(), candles.len());
        assert_eq!(result.candles[4].pivot, Pivot::Low);
        assert_eq!(result.levels, vec![1.0]);
    }

    #[test]
    fn test_cancelled() {
        let analyzer = KeyLevelAnalyzer::new(KeyLevelParams::default()).unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();

        let result = analyzer.run(&candles_from_lows(&[1.0, 2.0]), &cancel);
        assert!(matches!(result, Err(AnalysisError::Cancelled(_))));
    }

    #[test]
    fn test_invalid_params() {
        let result = KeyLevelAnalyzer::new(KeyLevelParams {
            neighbor_window: 3,
            epsilon: f64::NAN,
        });
        assert!(matches!(result, Err(AnalysisError::InvalidParameters(_))));
    }

    #[test]
    fn test_window_larger_than_series() {
        let analyzer = KeyLevelAnalyzer::new(KeyLevelParams {
            neighbor_window: usize::MAX,
            epsilon: 0.005,
        })
        .unwrap();
        let candles = candles_from_lows(&[5.0, 4.0, 3.0, 2.0, 1.0, 2.0, 3.0, 4.0, 5.0]);

        assert_eq!(analyzer.pivot_at(&candles, 4), Pivot::Unchanged);
        assert_eq!(analyzer.pivot_at(&candles, usize::MAX), Pivot::Unchanged);

        let result = analyzer.run(&candles, &CancelToken::new()).unwrap();
        assert!(result.levels.is_empty());
        assert!(result.candles.iter().all(|c| c.pivot == Pivot::Unchanged));
    }
}
