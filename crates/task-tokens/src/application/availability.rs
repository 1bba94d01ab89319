//! # Availability Monitor
//!
//! Background task polling the signing service until it answers. Stops on
//! the first success, on `cancel()` or when the monitor is dropped. A check
//! in flight at cancellation is discarded.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::domain::Network;
use crate::ports::SigningService;

/// Last known reachability of the signing service.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AvailabilityStatus {
    /// No answer yet.
    Checking,
    /// Last check failed.
    Unavailable,
    /// Service answered; polling stopped.
    Available(Network),
    /// Polling stopped before the service answered.
    Cancelled,
}

/// Handle to the polling task.
pub struct AvailabilityMonitor {
    status: watch::Receiver<AvailabilityStatus>,
    cancel: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl AvailabilityMonitor {
    /// Start polling `service` every `period`. The first check runs
    /// immediately.
    pub fn spawn<W>(service: Arc<W>, period: Duration) -> Self
    where
        W: SigningService + 'static,
    {
        let (status_tx, status_rx) = watch::channel(AvailabilityStatus::Checking);
        let (cancel_tx, cancel_rx) = watch::channel(false);

        let handle = tokio::spawn(poll(service, period, status_tx, cancel_rx));

        Self {
            status: status_rx,
            cancel: cancel_tx,
            handle,
        }
    }

    /// Current status.
    pub fn status(&self) -> AvailabilityStatus {
        *self.status.borrow()
    }

    /// Receiver for status changes.
    pub fn subscribe(&self) -> watch::Receiver<AvailabilityStatus> {
        self.status.clone()
    }

    /// Wait until the service answers. `None` if polling stopped first.
    pub async fn wait_available(&self) -> Option<Network> {
        let mut rx = self.status.clone();
        loop {
            match *rx.borrow_and_update() {
                AvailabilityStatus::Available(network) => return Some(network),
                AvailabilityStatus::Cancelled => return None,
                AvailabilityStatus::Checking | AvailabilityStatus::Unavailable => {}
            }
            if rx.changed().await.is_err() {
                return match *rx.borrow() {
                    AvailabilityStatus::Available(network) => Some(network),
                    _ => None,
                };
            }
        }
    }

    /// Stop polling.
    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
    }

    /// True once the polling task has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for AvailabilityMonitor {
    fn drop(&mut self) {
        let _ = self.cancel.send(true);
        self.handle.abort();
    }
}

async fn poll<W: SigningService>(
    service: Arc<W>,
    period: Duration,
    status: watch::Sender<AvailabilityStatus>,
    mut cancel: watch::Receiver<bool>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.changed() => break,
            _ = ticker.tick() => {}
        }

        tokio::select! {
            _ = cancel.changed() => break,
            result = service.get_network() => match result {
                Ok(network) => {
                    info!(network = %network, "Signing service available");
                    let _ = status.send(AvailabilityStatus::Available(network));
                    return;
                }
                Err(e) => {
                    debug!(error = %e, "Signing service not available yet");
                    let _ = status.send(AvailabilityStatus::Unavailable);
                }
            }
        }
    }

    debug!("Availability polling cancelled");
    let _ = status.send(AvailabilityStatus::Cancelled);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::LocalSigningService;

    #[tokio::test(start_paused = true)]
    async fn test_stops_on_first_success() {
        let wallet = Arc::new(LocalSigningService::for_testing());
        let monitor = AvailabilityMonitor::spawn(Arc::clone(&wallet), Duration::from_millis(100));

        assert_eq!(monitor.wait_available().await, Some(Network::Testnet));
        tokio::task::yield_now().await;
        assert!(monitor.is_finished());
        assert_eq!(wallet.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keeps_polling_until_available() {
        let wallet = Arc::new(LocalSigningService::for_testing());
        wallet.set_available(false);
        let monitor = AvailabilityMonitor::spawn(Arc::clone(&wallet), Duration::from_millis(100));

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(monitor.status(), AvailabilityStatus::Unavailable);
        assert!(wallet.call_count() >= 3);

        wallet.set_available(true);
        assert_eq!(monitor.wait_available().await, Some(Network::Testnet));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_polling() {
        let wallet = Arc::new(LocalSigningService::for_testing());
        wallet.set_available(false);
        let monitor = AvailabilityMonitor::spawn(Arc::clone(&wallet), Duration::from_millis(100));

        tokio::time::sleep(Duration::from_millis(150)).await;
        monitor.cancel();
        assert_eq!(monitor.wait_available().await, None);
        assert_eq!(monitor.status(), AvailabilityStatus::Cancelled);

        let calls = wallet.call_count();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(wallet.call_count(), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_aborts_task() {
        let wallet = Arc::new(LocalSigningService::for_testing());
        wallet.set_available(false);
        let monitor = AvailabilityMonitor::spawn(Arc::clone(&wallet), Duration::from_millis(100));
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(monitor);

        let calls = wallet.call_count();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(wallet.call_count(), calls);
    }
}
