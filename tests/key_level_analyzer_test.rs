use common_test_utils::*;

use price_analytics::analyzer::key_level_analyzer::{dedup_levels, merge_levels};
use price_analytics::analyzer::{KeyLevelAnalyzer, KeyLevelParams};
use price_analytics::cancel::CancelToken;
use price_analytics::model::Pivot;

fn analyzer() -> KeyLevelAnalyzer {
    KeyLevelAnalyzer::new(KeyLevelParams::default()).unwrap()
}

#[test]
fn test_v_shape_classifies_low() {
    let mut candles = candles_from_closes(&[5.0, 4.0, 3.0, 2.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
    // 고가/저가를 종가와 다르게 두어 High 후보가 되지 않게 함
    for c in candles.iter_mut() {
        c.high = c.close + 0.5;
        c.low = c.close - 0.5;
    }

    let result = analyzer().run(&candles, &CancelToken::new()).unwrap();
    let pivots: Vec<Pivot> = result.candles.iter().map(|c| c.pivot).collect();

    assert_eq!(pivots[4], Pivot::Low);
    assert_eq!(pivots.iter().filter(|p| **p != Pivot::Unchanged).count(), 1);
    assert_eq!(result.levels, vec![0.5]);
}

#[test]
fn test_dedup_and_merge_passes() {
    let distinct = dedup_levels(&[100.0, 100.2, 150.0], 0.005);
    assert_eq!(distinct, vec![100.0, 150.0]);
    assert_eq!(merge_levels(&distinct, 0.005), vec![100.0, 150.0]);
}

#[test]
fn test_merge_is_order_dependent() {
    // 세 레벨 모두 1단계(0.5%)는 통과하지만 2단계(1.5%)에서는 순서대로 병합됨
    let distinct = dedup_levels(&[100.0, 101.0, 102.0], 0.005);
    assert_eq!(distinct, vec![100.0, 101.0, 102.0]);
    assert_eq!(merge_levels(&distinct, 0.005), vec![101.25]);

    // 같은 레벨이라도 102가 먼저 비교되면 100과 떨어져 있어 따로 남음
    let distinct = dedup_levels(&[100.0, 102.0, 101.0], 0.005);
    assert_eq!(merge_levels(&distinct, 0.005), vec![100.5, 102.0]);
}

#[test]
fn test_flat_top_produces_single_level() {
    let candles = uptrend_then_flat_top();
    let result = analyzer().run(&candles, &CancelToken::new()).unwrap();

    let highs: Vec<usize> = (0..candles.len())
        .filter(|&i| result.candles[i].pivot == Pivot::High)
        .collect();
    let lows: Vec<usize> = (0..candles.len())
        .filter(|&i| result.candles[i].pivot == Pivot::Low)
        .collect();

    assert_eq!(highs, (61..=97).step_by(4).collect::<Vec<_>>());
    assert_eq!(lows, (63..=99).step_by(4).collect::<Vec<_>>());

    assert_eq!(result.levels.len(), 1);
    assert!((result.levels[0] - 100.07).abs() < 1e-6);
}

#[test]
fn test_closest_level_to_last_close() {
    let candles = uptrend_then_flat_top();
    let result = analyzer().run(&candles[..100], &CancelToken::new()).unwrap();

    let (levels, percentage) = result.closest_to_last(10, 1);
    assert_eq!(levels.len(), 1);
    assert_eq!(percentage, 1);
}

#[test]
fn test_short_input_has_no_pivots() {
    let candles = candles_from_closes(&[1.0, 2.0, 3.0]);
    let result = analyzer().run(&candles, &CancelToken::new()).unwrap();
    assert!(result.levels.is_empty());
    assert!(result.candles.iter().all(|c| c.pivot == Pivot::Unchanged));

    let result = analyzer().run(&[], &CancelToken::new()).unwrap();
    assert!(result.candles.is_empty());
}
