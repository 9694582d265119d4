use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{RecorderError, Result};

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Fixed-period scheduler owned by the session controller.
///
/// Every tick runs `on_tick` on one task, so two ticks never overlap.
/// [`Ticker::stop`] cancels the loop and joins the task: once it returns,
/// no further `on_tick` call can happen.
pub struct Ticker {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
    ticks_fired: Arc<AtomicU64>,
}

impl Ticker {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
            ticks_fired: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Ticks fired since the last `start`
    pub fn ticks_fired(&self) -> u64 {
        self.ticks_fired.load(Ordering::Acquire)
    }

    /// Must be called from within a tokio runtime.
    pub fn start<F>(&mut self, interval: Duration, on_tick: F) -> Result<()>
    where
        F: FnMut() + Send + 'static,
    {
        if self.handle.is_some() {
            return Err(RecorderError::AlreadyRunning);
        }
        if interval.is_zero() {
            return Err(RecorderError::Config("tick interval must be non-zero".to_string()));
        }

        self.ticks_fired.store(0, Ordering::Release);
        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(tick_loop(
            interval,
            on_tick,
            cancel_token.clone(),
            self.ticks_fired.clone(),
        ));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        debug!("ticker started with interval {:?}", interval);
        Ok(())
    }

    /// Cancel and drain. No-op when not running.
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        handle
            .await
            .map_err(|e| RecorderError::Internal(format!("ticker task failed to join: {e}")))?;
        info!("ticker stopped after {} ticks", self.ticks_fired());
        Ok(())
    }
}

impl Default for Ticker {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        // Without an await point the best we can do is stop scheduling new ticks.
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
    }
}

async fn tick_loop<F>(
    period: Duration,
    mut on_tick: F,
    cancel_token: CancellationToken,
    ticks_fired: Arc<AtomicU64>,
) where
    F: FnMut(),
{
    // First tick lands one period after start, not immediately.
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                debug!("tick loop shutting down");
                break;
            }
            _ = interval.tick() => {
                on_tick();
                ticks_fired.fetch_add(1, Ordering::AcqRel);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[tokio::test(start_paused = true)]
    async fn test_ticks_fire_at_interval() {
        let count = Arc::new(AtomicU64::new(0));
        let mut ticker = Ticker::new();
        {
            let count = count.clone();
            ticker
                .start(Duration::from_millis(100), move || {
                    count.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }

        // nothing fires before the first period elapses
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(460)).await;
        ticker.stop().await.unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 5);
        assert_eq!(ticker.ticks_fired(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice_is_rejected() {
        let mut ticker = Ticker::new();
        ticker.start(Duration::from_millis(10), || {}).unwrap();
        let err = ticker.start(Duration::from_millis(10), || {}).unwrap_err();
        assert!(matches!(err, RecorderError::AlreadyRunning));
        ticker.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_zero_interval_is_rejected() {
        let mut ticker = Ticker::new();
        assert!(ticker.start(Duration::ZERO, || {}).is_err());
        assert!(!ticker.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent_and_final() {
        let ticks = Arc::new(Mutex::new(Vec::new()));
        let mut ticker = Ticker::new();
        {
            let ticks = ticks.clone();
            ticker
                .start(Duration::from_millis(10), move || {
                    ticks.lock().unwrap().push(Instant::now());
                })
                .unwrap();
        }

        tokio::time::sleep(Duration::from_millis(35)).await;
        ticker.stop().await.unwrap();
        ticker.stop().await.unwrap();
        assert!(!ticker.is_running());

        let after_stop = ticks.lock().unwrap().len();
        assert_eq!(after_stop, 3);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(ticks.lock().unwrap().len(), after_stop);
    }

    #[tokio::test]
    async fn test_stop_when_never_started_is_noop() {
        let mut ticker = Ticker::new();
        ticker.stop().await.unwrap();
        assert_eq!(ticker.ticks_fired(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_stop() {
        let count = Arc::new(AtomicU64::new(0));
        let mut ticker = Ticker::new();

        for _ in 0..2 {
            let count = count.clone();
            ticker
                .start(Duration::from_millis(10), move || {
                    count.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
            tokio::time::sleep(Duration::from_millis(25)).await;
            ticker.stop().await.unwrap();
            assert_eq!(ticker.ticks_fired(), 2);
        }

        assert_eq!(count.load(Ordering::SeqCst), 4);
    }
}
