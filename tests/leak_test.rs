/*!
 * Leak Detector Tests
 * Ledger behavior and the process-wide default instance
 */

use pretty_assertions::assert_eq;
use serial_test::serial;
use simalloc::{AdaptiveAllocator, Allocator, LeakDetector};
use std::sync::Arc;

#[test]
fn test_ledger_tracks_outstanding_allocations() {
    let detector = LeakDetector::new();
    detector.on_allocate(0, 100, "test");
    detector.on_allocate(256, 50, "test");
    detector.on_deallocate(0);

    assert!(detector.has_leaks());
    assert_eq!(detector.currently_allocated(), 50);
    assert_eq!(detector.total_allocations(), 2);

    detector.on_deallocate(256);
    assert!(!detector.has_leaks());
}

#[test]
fn test_report_lists_leaks_with_sites() {
    let detector = LeakDetector::new();
    detector.on_allocate(0x1000, 2048, "worker");

    let report = detector.leak_report();
    assert_eq!(report.leaks.len(), 1);
    assert_eq!(report.leaks[0].site, "worker");
    assert_eq!(report.total_leaked, 2048);

    let rendered = report.to_string();
    assert!(rendered.contains("0x1000"));
    assert!(rendered.contains("2.00 KB"));
}

#[test]
fn test_empty_report_rendering() {
    let detector = LeakDetector::new();
    assert_eq!(detector.leak_report().to_string(), "No memory leaks detected.\n");
}

#[test]
fn test_reset_clears_ledger_and_history() {
    let detector = LeakDetector::new();
    detector.on_allocate(0, 64, "test");
    detector.reset();

    assert!(!detector.has_leaks());
    assert_eq!(detector.total_allocations(), 0);
    assert!(detector.history().is_empty());
}

#[test]
#[serial]
fn test_global_detector_is_shared() {
    let first = Arc::clone(LeakDetector::global());
    let second = Arc::clone(LeakDetector::global());
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
#[serial]
fn test_supervisors_share_the_global_detector() {
    let detector = Arc::clone(LeakDetector::global());
    detector.reset();

    let mut supervisor = AdaptiveAllocator::new(4096)
        .with_leak_detector(Arc::clone(&detector))
        .with_name("shared");
    let addr = supervisor.allocate(128).unwrap();

    assert!(detector.has_leaks());
    assert_eq!(detector.leak_report().leaks[0].site, "shared");

    supervisor.deallocate(addr).unwrap();
    assert!(!detector.has_leaks());
    detector.reset();
}
