//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod mock_helpers;

use std::time::{Duration, Instant};

/// Upper bound for anything a test waits on
pub fn test_timeout() -> Duration {
    Duration::from_secs(10)
}

/// Poll `condition` until it holds or the test timeout elapses
pub fn wait_until(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + test_timeout();
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    condition()
}

/// Assert that ids run 1, 2, 3, ... without gaps
pub fn assert_gap_free(ids: &[u64]) {
    for (index, id) in ids.iter().enumerate() {
        assert_eq!(
            *id,
            index as u64 + 1,
            "Expected id {} at position {}, found {}",
            index + 1,
            index,
            id
        );
    }
}
