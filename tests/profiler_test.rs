/*!
 * Profiler Tests
 * Pattern analysis, prediction, metrics and pool heuristics
 */

use pretty_assertions::assert_eq;
use simalloc::profiler::HotSpot;
use simalloc::{PerformanceMetrics, Profiler, Strategy};
use std::time::Duration;

#[test]
fn test_common_sizes_ordered_by_frequency() {
    let mut profiler = Profiler::new();
    for i in 0..5 {
        profiler.record_allocation(64, i * 64, 0);
    }
    for i in 0..3 {
        profiler.record_allocation(128, 1000 + i * 128, 0);
    }
    profiler.record_allocation(256, 5000, 0);

    let pattern = profiler.analyze_patterns();
    assert_eq!(pattern.common_sizes, vec![64, 128, 256]);
    assert!((pattern.size_distribution[&64] - 5.0 / 9.0).abs() < 1e-9);
    assert!((pattern.size_distribution[&128] - 3.0 / 9.0).abs() < 1e-9);
    assert!((pattern.size_distribution[&256] - 1.0 / 9.0).abs() < 1e-9);
}

#[test]
fn test_hot_spots_bucket_by_4k_region() {
    let mut profiler = Profiler::new();
    for _ in 0..3 {
        profiler.record_allocation(16, 100, 0);
    }
    for _ in 0..2 {
        profiler.record_allocation(16, 5 * 4096 + 8, 0);
    }
    profiler.record_allocation(16, 9 * 4096, 0);

    let pattern = profiler.analyze_patterns();
    assert_eq!(
        pattern.hot_spots,
        vec![
            HotSpot { region: 0, count: 3 },
            HotSpot { region: 5, count: 2 },
            HotSpot { region: 9, count: 1 },
        ]
    );
}

#[test]
fn test_history_is_bounded() {
    let mut profiler = Profiler::new();
    for i in 0..10_050u64 {
        profiler.record_allocation(8, i * 8, 0);
    }
    assert_eq!(profiler.total_observations(), 10_000);
}

#[test]
fn test_lifetime_tracking() {
    let mut profiler = Profiler::new();
    profiler.record_allocation(64, 0, 0);
    std::thread::sleep(Duration::from_millis(10));
    profiler.record_deallocation(0);

    let pattern = profiler.analyze_patterns();
    assert!(pattern.average_lifetime_ms >= 5.0);
}

#[test]
fn test_empty_history_prediction_defaults() {
    let profiler = Profiler::new();
    let prediction = profiler.predict_next_allocation();

    assert_eq!(prediction.next_likely_size, 0);
    assert_eq!(prediction.recommended_strategy, Strategy::FirstFit);
    assert!(prediction.recommended_pool_sizes.is_empty());
    assert_eq!(prediction.confidence, 0.0);
}

#[test]
fn test_uniform_sizes_recommend_best_fit() {
    let mut profiler = Profiler::new();
    for i in 0..200u64 {
        profiler.record_allocation(64, i * 64, 0);
    }

    let prediction = profiler.predict_next_allocation();
    assert_eq!(prediction.next_likely_size, 64);
    assert_eq!(prediction.recommended_strategy, Strategy::BestFit);
    assert_eq!(prediction.recommended_pool_sizes, vec![64]);
    assert_eq!(prediction.confidence, 1.0);
}

#[test]
fn test_scattered_sizes_recommend_first_fit() {
    let mut profiler = Profiler::new();
    for i in 0..10u64 {
        profiler.record_allocation(8, i * 8, 0);
    }
    for i in 0..5u64 {
        profiler.record_allocation(2000, 10_000 + i * 2000, 0);
    }

    let prediction = profiler.predict_next_allocation();
    assert_eq!(prediction.next_likely_size, 8);
    assert_eq!(prediction.recommended_strategy, Strategy::FirstFit);
}

#[test]
fn test_pool_threshold_scales_with_distribution() {
    let mut profiler = Profiler::new();
    for i in 0..100u64 {
        profiler.record_allocation(64, i * 64, 0);
    }

    assert!(profiler.should_create_pool_for_size(64, 100));
    assert!(!profiler.should_create_pool_for_size(64, 101));
    assert!(!profiler.should_create_pool_for_size(128, 1));
}

#[test]
fn test_metrics_over_success_stream() {
    let mut profiler = Profiler::new();
    for i in 0..50u64 {
        profiler.record_allocation(32, i * 32, 0);
    }
    for i in 0..10u64 {
        profiler.record_deallocation(i * 32);
    }

    let metrics = profiler.performance_metrics(0.25);
    assert_eq!(metrics.fragmentation_ratio, 0.25);
    assert_eq!(metrics.hit_rate, 1.0);
    assert_eq!(metrics.failed_allocations, 0);
    assert!(metrics.average_allocation_time_us >= 0.0);
    assert!(metrics.strategy_efficiency.is_empty());
}

#[test]
fn test_strategy_efficiency_from_recorded_metrics() {
    let mut profiler = Profiler::new();
    profiler.record_allocation(64, 0, 0);
    profiler.record_strategy_metrics(
        Strategy::FirstFit,
        PerformanceMetrics {
            fragmentation_ratio: 0.0,
            average_allocation_time_us: 0.0,
            hit_rate: 1.0,
            failed_allocations: 0,
            strategy_efficiency: Default::default(),
        },
    );

    let metrics = profiler.performance_metrics(0.0);
    let efficiency = metrics
        .strategy_efficiency
        .get(&Strategy::FirstFit)
        .copied()
        .unwrap();
    // 0.4 * hit + 0.4 * (1 - frag) + 0.2 / (1 + time)
    assert!((efficiency - 1.0).abs() < 1e-9);
}

#[test]
fn test_pool_recommendation_groups_by_power_of_two() {
    let mut profiler = Profiler::new();
    for i in 0..60u64 {
        profiler.record_allocation(48, i * 48, 0);
    }
    for i in 0..40u64 {
        profiler.record_allocation(100, 10_000 + i * 100, 0);
    }

    let recommendation = profiler.recommend_pool_configuration(0.4);
    assert_eq!(recommendation.optimal_sizes, vec![64, 128]);
    assert_eq!(recommendation.counts, vec![60, 40]);
    assert!((recommendation.expected_improvement - 30.0).abs() < 1e-6);
}

#[test]
fn test_pool_recommendation_without_fragmentation() {
    let profiler = Profiler::new();
    let recommendation = profiler.recommend_pool_configuration(0.0);

    assert!(recommendation.optimal_sizes.is_empty());
    assert_eq!(recommendation.expected_improvement, 0.0);
}

#[test]
fn test_deallocation_of_unknown_address_is_ignored() {
    let mut profiler = Profiler::new();
    profiler.record_allocation(64, 0, 0);
    profiler.record_deallocation(999);

    let metrics = profiler.performance_metrics(0.0);
    assert_eq!(metrics.hit_rate, 1.0);
}
