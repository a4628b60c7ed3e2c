/*!
 * Allocation Profiler
 *
 * Keeps a bounded rolling history of allocation records and derives
 * size-frequency distributions, lifetime statistics, hot-region analysis,
 * predictions and strategy recommendations from it.
 */

pub mod types;

pub use types::{
    AllocationPattern, AllocationRecord, HotSpot, PerformanceMetrics, PoolRecommendation,
    Prediction,
};

use crate::core::types::{Address, Size};
use crate::memory::types::Strategy;
use ahash::RandomState;
use log::debug;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Instant;

/// Rolling history bound; oldest records are evicted first
const MAX_HISTORY: usize = 10_000;

/// Hot-region bucket width in bytes
const REGION_SIZE: u64 = 4096;

/// How many top sizes the pattern analysis reports
const TOP_COMMON_SIZES: usize = 5;

/// How many hot regions the pattern analysis reports
const MAX_HOT_SPOTS: usize = 10;

/// Allocation pattern profiler
#[derive(Debug, Default)]
pub struct Profiler {
    history: VecDeque<AllocationRecord>,
    size_frequency: BTreeMap<Size, u64>,
    lifetimes_ms: BTreeMap<Size, Vec<f64>>,
    strategy_metrics: HashMap<Strategy, PerformanceMetrics, RandomState>,
}

impl Profiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an active record; evicts the oldest past the history bound
    pub fn record_allocation(&mut self, size: Size, address: Address, pool_id: u64) {
        self.history.push_back(AllocationRecord {
            size,
            address,
            allocated_at: Instant::now(),
            deallocated_at: None,
            active: true,
            pool_id,
        });
        *self.size_frequency.entry(size).or_insert(0) += 1;

        if self.history.len() > MAX_HISTORY {
            self.history.pop_front();
        }
    }

    /// Close the first active record matching `address` and fold its
    /// lifetime into the per-size distribution
    pub fn record_deallocation(&mut self, address: Address) {
        let now = Instant::now();
        if let Some(record) = self
            .history
            .iter_mut()
            .find(|r| r.address == address && r.active)
        {
            record.active = false;
            record.deallocated_at = Some(now);
            let lifetime_ms = now.duration_since(record.allocated_at).as_secs_f64() * 1_000.0;
            self.lifetimes_ms
                .entry(record.size)
                .or_default()
                .push(lifetime_ms);
        }
    }

    /// Number of records currently held
    pub fn total_observations(&self) -> usize {
        self.history.len()
    }

    /// Derive the size, lifetime and hot-region view of the history
    pub fn analyze_patterns(&self) -> AllocationPattern {
        let mut by_frequency: Vec<(Size, u64)> = self
            .size_frequency
            .iter()
            .map(|(&size, &freq)| (size, freq))
            .collect();
        // Stable sort over the size-ordered map: ties stay in size order
        by_frequency.sort_by(|a, b| b.1.cmp(&a.1));

        let common_sizes = by_frequency
            .iter()
            .take(TOP_COMMON_SIZES)
            .map(|&(size, _)| size)
            .collect();

        let mut total_lifetime = 0.0;
        let mut samples = 0usize;
        for lifetimes in self.lifetimes_ms.values() {
            total_lifetime += lifetimes.iter().sum::<f64>();
            samples += lifetimes.len();
        }
        let average_lifetime_ms = if samples > 0 {
            total_lifetime / samples as f64
        } else {
            0.0
        };

        let total: u64 = by_frequency.iter().map(|&(_, freq)| freq).sum();
        let size_distribution = if total > 0 {
            by_frequency
                .iter()
                .map(|&(size, freq)| (size, freq as f64 / total as f64))
                .collect()
        } else {
            BTreeMap::new()
        };

        AllocationPattern {
            common_sizes,
            average_lifetime_ms,
            size_distribution,
            hot_spots: self.identify_hot_spots(),
        }
    }

    /// Count allocations per 4KB region and keep the hottest ones
    fn identify_hot_spots(&self) -> Vec<HotSpot> {
        let mut region_frequency: BTreeMap<u64, u64> = BTreeMap::new();
        for record in &self.history {
            *region_frequency
                .entry(record.address / REGION_SIZE)
                .or_insert(0) += 1;
        }

        let mut hot_spots: Vec<HotSpot> = region_frequency
            .into_iter()
            .map(|(region, count)| HotSpot { region, count })
            .collect();
        hot_spots.sort_by(|a, b| b.count.cmp(&a.count));
        hot_spots.truncate(MAX_HOT_SPOTS);
        hot_spots
    }

    /// Forecast the next allocation from the observed pattern
    pub fn predict_next_allocation(&self) -> Prediction {
        let pattern = self.analyze_patterns();

        let Some(&mode) = pattern.common_sizes.first() else {
            // Empty history: nothing to predict
            return Prediction {
                next_likely_size: 0,
                recommended_strategy: Strategy::FirstFit,
                recommended_pool_sizes: Vec::new(),
                confidence: 0.0,
            };
        };

        let recommended_pool_sizes = pattern
            .size_distribution
            .iter()
            .filter(|&(_, &fraction)| fraction > 0.1)
            .map(|(&size, _)| size)
            .collect();

        Prediction {
            next_likely_size: mode,
            recommended_strategy: self.determine_optimal_strategy(&pattern, mode),
            recommended_pool_sizes,
            confidence: self.pattern_confidence(&pattern.common_sizes),
        }
    }

    /// Score the three placement strategies against the observed pattern.
    /// Ties resolve first-fit, then best-fit, then worst-fit.
    fn determine_optimal_strategy(&self, pattern: &AllocationPattern, mode: Size) -> Strategy {
        let mut first_fit = 0.0;
        let mut best_fit = 0.0;
        let mut worst_fit = 0.0;

        let size_variance: f64 = pattern
            .size_distribution
            .iter()
            .map(|(&size, &fraction)| (size as f64 - mode as f64).powi(2) * fraction)
            .sum();

        if size_variance < 1_000.0 {
            best_fit += 0.5; // consistent sizes pack tightly
        } else {
            first_fit += 0.3;
        }

        if pattern.hot_spots.len() > 5 {
            worst_fit += 0.4;
        }

        if pattern.average_lifetime_ms < 1_000.0 {
            first_fit += 0.4; // short-lived allocations churn fast
        } else {
            best_fit += 0.3;
        }

        if first_fit >= best_fit && first_fit >= worst_fit {
            Strategy::FirstFit
        } else if best_fit >= worst_fit {
            Strategy::BestFit
        } else {
            Strategy::WorstFit
        }
    }

    /// Share of all observations covered by `sizes`
    fn pattern_confidence(&self, sizes: &[Size]) -> f64 {
        let total: u64 = self.size_frequency.values().sum();
        if total == 0 {
            return 0.0;
        }
        let common: u64 = sizes
            .iter()
            .filter_map(|size| self.size_frequency.get(size))
            .sum();
        common as f64 / total as f64
    }

    /// Aggregate metrics; the fragmentation ratio comes from the allocator
    /// the history was recorded against
    pub fn performance_metrics(&self, fragmentation_ratio: f64) -> PerformanceMetrics {
        let deltas_us: Vec<f64> = self
            .history
            .iter()
            .zip(self.history.iter().skip(1))
            .map(|(prev, next)| {
                next.allocated_at
                    .duration_since(prev.allocated_at)
                    .as_secs_f64()
                    * 1_000_000.0
            })
            .collect();
        let average_allocation_time_us = if deltas_us.is_empty() {
            0.0
        } else {
            deltas_us.iter().sum::<f64>() / deltas_us.len() as f64
        };

        let successful = self
            .history
            .iter()
            .filter(|r| r.active || r.deallocated_at.is_some())
            .count();
        let hit_rate = if self.history.is_empty() {
            1.0
        } else {
            successful as f64 / self.history.len() as f64
        };

        let strategy_efficiency = self
            .strategy_metrics
            .iter()
            .map(|(&strategy, metrics)| {
                let efficiency = metrics.hit_rate * 0.4
                    + (1.0 - metrics.fragmentation_ratio) * 0.4
                    + 1.0 / (1.0 + metrics.average_allocation_time_us) * 0.2;
                (strategy, efficiency)
            })
            .collect();

        PerformanceMetrics {
            fragmentation_ratio,
            average_allocation_time_us,
            hit_rate,
            failed_allocations: self.history.len() - successful,
            strategy_efficiency,
        }
    }

    /// Store a metrics snapshot for `strategy`, feeding the efficiency
    /// scores of later `performance_metrics` calls
    pub fn record_strategy_metrics(&mut self, strategy: Strategy, metrics: PerformanceMetrics) {
        debug!(
            "Recorded metrics for {}: hit rate {:.2}, fragmentation {:.2}",
            strategy, metrics.hit_rate, metrics.fragmentation_ratio
        );
        self.strategy_metrics.insert(strategy, metrics);
    }

    /// True when `size` has been observed at least `threshold` times,
    /// weighted by its share of the distribution
    pub fn should_create_pool_for_size(&self, size: Size, threshold: u64) -> bool {
        let pattern = self.analyze_patterns();
        let total = self.total_observations() as f64;
        match pattern.size_distribution.get(&size) {
            Some(&fraction) => (fraction * total) as u64 >= threshold,
            None => false,
        }
    }

    /// Suggest pool sizes by grouping the distribution into power-of-two
    /// classes; classes holding at least 5% of observations qualify
    pub fn recommend_pool_configuration(&self, fragmentation_ratio: f64) -> PoolRecommendation {
        let pattern = self.analyze_patterns();

        let mut size_groups: BTreeMap<Size, f64> = BTreeMap::new();
        for (&size, &fraction) in &pattern.size_distribution {
            *size_groups.entry(size.next_power_of_two()).or_insert(0.0) += fraction * 100.0;
        }

        let mut optimal_sizes = Vec::new();
        let mut counts = Vec::new();
        for (size, weight) in size_groups {
            if weight >= 5.0 {
                optimal_sizes.push(size);
                counts.push(weight as u64);
            }
        }

        // Pools typically reclaim around 30% of current fragmentation
        let expected_improvement = if fragmentation_ratio > 0.0 {
            (fragmentation_ratio - fragmentation_ratio * 0.7) / fragmentation_ratio * 100.0
        } else {
            0.0
        };

        PoolRecommendation {
            optimal_sizes,
            counts,
            expected_improvement,
        }
    }
}
