// src/session/countdown.rs

use std::{future::Future, time::Duration};

use tokio::{task::JoinHandle, time::Instant};

/// A countdown that runs `on_expire` once its deadline passes.
///
/// Remaining time is read off the deadline, so a stalled runtime cannot
/// stretch the limit. Dropping the countdown aborts the task, so storing it
/// next to the state it guards ties the timer to that state's lifetime.
pub struct Countdown {
    deadline: Instant,
    handle: Option<JoinHandle<()>>,
}

impl Countdown {
    pub fn start<F, Fut>(total: Duration, on_expire: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let deadline = Instant::now() + total;

        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            tracing::debug!("Countdown expired");
            on_expire().await;
        });

        Self {
            deadline,
            handle: Some(handle),
        }
    }

    /// Whole seconds left, rounded up.
    pub fn remaining_secs(&self) -> u64 {
        let left = self.deadline.saturating_duration_since(Instant::now());
        (left.as_millis() as u64).div_ceil(1000)
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Lets go of the task without aborting it. Used from inside the expiry
    /// hook, where aborting would cancel the hook itself.
    pub fn detach(mut self) {
        self.handle = None;
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
