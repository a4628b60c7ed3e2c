/*!
 * Leak Detection
 *
 * Ledger of outstanding allocations, fed by the adaptive supervisor on
 * every allocation and deallocation. A detector can be shared between
 * supervisors; entries are keyed by address alone, so two supervisors
 * handing out the same offset will collide in the ledger.
 */

use crate::core::types::{Address, Size};
use ahash::RandomState;
use log::warn;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

/// Process-wide default detector (optional integration point)
static GLOBAL_DETECTOR: OnceLock<Arc<LeakDetector>> = OnceLock::new();

/// Details of one tracked allocation
#[derive(Debug, Clone)]
pub struct AllocationInfo {
    pub size: Size,
    pub allocated_at: Instant,
    pub site: String,
}

#[derive(Debug, Default)]
struct Ledger {
    active: HashMap<Address, AllocationInfo, RandomState>,
    history: Vec<(Address, AllocationInfo)>,
}

/// Ledger of outstanding allocations
#[derive(Debug, Default)]
pub struct LeakDetector {
    ledger: Mutex<Ledger>,
}

impl LeakDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide default detector, lazily initialized on first use
    pub fn global() -> &'static Arc<LeakDetector> {
        GLOBAL_DETECTOR.get_or_init(|| Arc::new(LeakDetector::new()))
    }

    pub fn on_allocate(&self, address: Address, size: Size, site: &str) {
        let info = AllocationInfo {
            size,
            allocated_at: Instant::now(),
            site: site.to_string(),
        };
        let mut ledger = self.ledger.lock();
        ledger.active.insert(address, info.clone());
        ledger.history.push((address, info));
    }

    pub fn on_deallocate(&self, address: Address) {
        let mut ledger = self.ledger.lock();
        if ledger.active.remove(&address).is_none() {
            warn!("Deallocation of untracked address 0x{:x}", address);
        }
    }

    pub fn has_leaks(&self) -> bool {
        !self.ledger.lock().active.is_empty()
    }

    /// Snapshot of all outstanding allocations
    pub fn leak_report(&self) -> LeakReport {
        let now = Instant::now();
        let ledger = self.ledger.lock();

        let mut leaks: Vec<Leak> = ledger
            .active
            .iter()
            .map(|(&address, info)| Leak {
                address,
                size: info.size,
                site: info.site.clone(),
                age_ms: now.duration_since(info.allocated_at).as_millis() as u64,
            })
            .collect();
        leaks.sort_by_key(|leak| leak.address);

        let total_leaked = leaks.iter().map(|leak| leak.size).sum();
        LeakReport {
            leaks,
            total_leaked,
        }
    }

    /// Count of every allocation ever observed
    pub fn total_allocations(&self) -> usize {
        self.ledger.lock().history.len()
    }

    /// Sum of outstanding allocation sizes
    pub fn currently_allocated(&self) -> Size {
        self.ledger.lock().active.values().map(|info| info.size).sum()
    }

    /// Append-only observation history, oldest first
    pub fn history(&self) -> Vec<(Address, AllocationInfo)> {
        self.ledger.lock().history.clone()
    }

    pub fn reset(&self) {
        let mut ledger = self.ledger.lock();
        ledger.active.clear();
        ledger.history.clear();
    }
}

/// One outstanding allocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Leak {
    pub address: Address,
    pub size: Size,
    pub site: String,
    pub age_ms: u64,
}

/// Human-readable summary of outstanding allocations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeakReport {
    pub leaks: Vec<Leak>,
    pub total_leaked: Size,
}

impl std::fmt::Display for LeakReport {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        if self.leaks.is_empty() {
            return writeln!(f, "No memory leaks detected.");
        }

        writeln!(f, "Memory leaks detected: {}", self.leaks.len())?;
        for leak in &self.leaks {
            writeln!(
                f,
                "  0x{:x}: {} from {} ({}ms ago)",
                leak.address,
                format_bytes(leak.size),
                leak.site,
                leak.age_ms
            )?;
        }
        writeln!(f, "Total memory leaked: {}", format_bytes(self.total_leaked))
    }
}

fn format_bytes(bytes: Size) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", size, UNITS[unit])
}
