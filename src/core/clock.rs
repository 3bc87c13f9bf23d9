//! Wall-clock abstraction.
//!
//! The scheduler reads the current time and sleeps until the next due time
//! through a [`Clock`], so tests can drive it with a manual clock instead of
//! waiting in real time.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Source of the current time and of sleeps.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Current wall-clock time.
    fn now(&self) -> DateTime<Utc>;

    /// Suspend until `deadline`. Returns immediately if it has already passed.
    async fn sleep_until(&self, deadline: DateTime<Utc>);
}

/// The system wall clock, sleeping on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep_until(&self, deadline: DateTime<Utc>) {
        // A negative remainder means the deadline already passed.
        if let Ok(wait) = (deadline - self.now()).to_std() {
            tokio::time::sleep(wait).await;
        }
    }
}
