//! Deterministic failure simulation for lookups

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::error::SupervisorError;
use crate::lookup::Lookup;
use crate::Result;

/// Decides whether the next call to a lookup should fail.
pub trait FailureInjector: Send + Sync {
    fn should_fail(&self, lookup: &str) -> bool;
}

pub struct FailAlways;

impl FailureInjector for FailAlways {
    fn should_fail(&self, _lookup: &str) -> bool {
        true
    }
}

/// Fails the first `n` calls, then succeeds.
pub struct FailFirst {
    remaining: AtomicU32,
}

impl FailFirst {
    pub fn new(n: u32) -> Self {
        Self {
            remaining: AtomicU32::new(n),
        }
    }
}

impl FailureInjector for FailFirst {
    fn should_fail(&self, _lookup: &str) -> bool {
        self.remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// Fails calls 1, 3, 5, ...
#[derive(Default)]
pub struct FailEveryOther {
    calls: AtomicU32,
}

impl FailureInjector for FailEveryOther {
    fn should_fail(&self, _lookup: &str) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst) % 2 == 0
    }
}

/// Lookup wrapper that fails when its injector says so
pub struct FlakyLookup {
    inner: Arc<dyn Lookup>,
    injector: Arc<dyn FailureInjector>,
}

impl FlakyLookup {
    pub fn new(inner: Arc<dyn Lookup>, injector: Arc<dyn FailureInjector>) -> Self {
        Self { inner, injector }
    }
}

#[async_trait]
impl Lookup for FlakyLookup {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn lookup(&self, place: &str) -> Result<String> {
        if self.injector.should_fail(self.inner.name()) {
            debug!(lookup = self.inner.name(), "Injecting simulated failure");
            return Err(SupervisorError::lookup(
                self.inner.name(),
                "simulated failure",
            ));
        }
        self.inner.lookup(place).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fail_first() {
        let injector = FailFirst::new(2);
        let pattern: Vec<bool> = (0..4).map(|_| injector.should_fail("x")).collect();
        assert_eq!(pattern, vec![true, true, false, false]);
    }

    #[test]
    fn test_fail_every_other() {
        let injector = FailEveryOther::default();
        let pattern: Vec<bool> = (0..4).map(|_| injector.should_fail("x")).collect();
        assert_eq!(pattern, vec![true, false, true, false]);
    }
}
