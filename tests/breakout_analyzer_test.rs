use common_test_utils::*;

use price_analytics::analyzer::{BreakoutAnalyzer, BreakoutParams, KeyLevelAnalyzer, KeyLevelParams};
use price_analytics::cancel::CancelToken;
use price_analytics::model::{AnnotatedCandle, Pivot, TrendSignal};
use std::sync::Arc;

fn analyzer(params: BreakoutParams) -> BreakoutAnalyzer {
    let key_levels = Arc::new(KeyLevelAnalyzer::new(KeyLevelParams::default()).unwrap());
    BreakoutAnalyzer::new(params, key_levels).unwrap()
}

fn signals(result: &[AnnotatedCandle], signal: TrendSignal) -> Vec<usize> {
    (0..result.len())
        .filter(|&i| result[i].breakout_signal == signal)
        .collect()
}

#[test]
fn test_breakout_above_flat_top() {
    let candles = uptrend_then_flat_top();
    let result = analyzer(BreakoutParams::default())
        .run(&candles, &CancelToken::new())
        .unwrap();

    assert_eq!(result.len(), candles.len());
    let expected: Vec<usize> = (100..=121).collect();
    assert_eq!(signals(&result, TrendSignal::Bullish), expected);
    assert!(signals(&result, TrendSignal::Bearish).is_empty());

    // 첫 돌파 캔들은 평평한 고점 평균(100.02)보다 확실히 위에서 마감
    let first = &result[100];
    let zone_width = BreakoutParams::default().zone_width;
    assert!(first.close() - 100.02 > zone_width);
    // 평평한 구간 안에서는 신호 없음
    assert!(
        result[60..100]
            .iter()
            .all(|c| c.breakout_signal == TrendSignal::NoChange)
    );
}

#[test]
fn test_breakout_output_carries_pivots() {
    let candles = uptrend_then_flat_top();
    let result = analyzer(BreakoutParams::default())
        .run(&candles, &CancelToken::new())
        .unwrap();

    assert_eq!(result[61].pivot, Pivot::High);
    assert_eq!(result[63].pivot, Pivot::Low);
    assert!(result.iter().all(|c| c.ema == 0.0));
}

#[test]
fn test_short_series_is_no_change() {
    let candles = create_uptrend_candles(90, 100.0, 1.0);
    let result = analyzer(BreakoutParams::default())
        .run(&candles, &CancelToken::new())
        .unwrap();

    assert!(
        result
            .iter()
            .all(|c| c.breakout_signal == TrendSignal::NoChange)
    );
}

#[test]
fn test_flat_support_breakdown_on_classified_input() {
    let params = BreakoutParams {
        back_candles: 2,
        window: 1,
        ..Default::default()
    };
    let analyzer = analyzer(params);

    let build = |current: f64| -> Vec<AnnotatedCandle> {
        (0..20)
            .map(|i| {
                let (close, pivot) = match i {
                    4 => (current, Pivot::Unchanged),
                    5..=14 => (50.0, Pivot::Low),
                    _ => (60.0, Pivot::Unchanged),
                };
                AnnotatedCandle::new(candle(i, close, 1.0)).with_pivot(pivot)
            })
            .collect()
    };

    let result = analyzer.run_on_pivots(&build(49.9990));
    assert_eq!(result[4].breakout_signal, TrendSignal::Bearish);
    assert_eq!(signals(&result, TrendSignal::Bearish), vec![4]);

    let result = analyzer.run_on_pivots(&build(50.0005));
    assert_eq!(result[4].breakout_signal, TrendSignal::NoChange);
}
