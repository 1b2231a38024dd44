//! One-shot protocol timers.
//!
//! Every machine timer is a one-shot with a reset operation; expiry is
//! delivered as an ordinary event on the owning actor's inbox, so the
//! machine rulesets treat timer expiry and external events uniformly.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Transmit interval while the partner asks for fast rate.
pub const FAST_PERIODIC: Duration = Duration::from_secs(1);

/// Transmit interval while the partner asks for slow rate.
pub const SLOW_PERIODIC: Duration = Duration::from_secs(30);

/// current_while with the short timeout: 3x the fast periodic interval.
pub const SHORT_TIMEOUT: Duration = Duration::from_secs(3);

/// current_while with the long timeout: 3x the slow periodic interval.
pub const LONG_TIMEOUT: Duration = Duration::from_secs(90);

/// Delay in WAITING before attaching, letting sibling ports catch up.
pub const WAIT_WHILE: Duration = Duration::from_secs(2);

/// How long actor/partner may stay out of sync before churn is declared.
pub const CHURN_DETECTION: Duration = Duration::from_secs(60);

/// Transmit token restore interval: three LACPDUs per fast interval.
pub const TX_TICK: Duration = Duration::from_millis(333);

/// The per-port timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    CurrentWhile,
    Periodic,
    WaitWhile,
    ActorChurn,
    PartnerChurn,
    TxTick,
}

/// A set of named one-shot timers feeding one event channel.
///
/// Starting a timer that is already running resets it. Dropping the set
/// stops everything, which is how the kill path cancels outstanding timers.
pub struct TimerSet<K, E> {
    tx: mpsc::UnboundedSender<E>,
    make_event: fn(K) -> E,
    active: HashMap<K, JoinHandle<()>>,
}

impl<K, E> TimerSet<K, E>
where
    K: Copy + Eq + Hash + Send + 'static,
    E: Send + 'static,
{
    pub fn new(tx: mpsc::UnboundedSender<E>, make_event: fn(K) -> E) -> Self {
        TimerSet {
            tx,
            make_event,
            active: HashMap::new(),
        }
    }

    /// Starts (or restarts) the `kind` timer to fire after `after`.
    pub fn start(&mut self, kind: K, after: Duration) {
        self.stop(kind);
        let tx = self.tx.clone();
        let make_event = self.make_event;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = tx.send(make_event(kind));
        });
        self.active.insert(kind, handle);
    }

    /// Stops the `kind` timer if it is pending. Stopping an expired or
    /// never-started timer is a no-op.
    pub fn stop(&mut self, kind: K) {
        if let Some(handle) = self.active.remove(&kind) {
            handle.abort();
        }
    }

    pub fn stop_all(&mut self) {
        for (_, handle) in self.active.drain() {
            handle.abort();
        }
    }
}

impl<K, E> Drop for TimerSet<K, E> {
    fn drop(&mut self) {
        for (_, handle) in self.active.drain() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Eq)]
    struct Fired(TimerKind);

    #[tokio::test(start_paused = true)]
    async fn test_one_shot_fires_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timers = TimerSet::new(tx, Fired);

        timers.start(TimerKind::WaitWhile, WAIT_WHILE);
        tokio::time::sleep(WAIT_WHILE + Duration::from_millis(1)).await;

        assert_eq!(rx.recv().await, Some(Fired(TimerKind::WaitWhile)));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_resets_deadline() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timers = TimerSet::new(tx, Fired);

        timers.start(TimerKind::CurrentWhile, Duration::from_secs(3));
        tokio::time::sleep(Duration::from_secs(2)).await;
        timers.start(TimerKind::CurrentWhile, Duration::from_secs(3));
        tokio::time::sleep(Duration::from_secs(2)).await;

        // without the reset this would have fired at t=3s
        assert!(rx.try_recv().is_err());
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(rx.recv().await, Some(Fired(TimerKind::CurrentWhile)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timers = TimerSet::new(tx, Fired);

        timers.start(TimerKind::Periodic, Duration::from_secs(1));
        timers.stop(TimerKind::Periodic);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_independent_kinds() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timers = TimerSet::new(tx, Fired);

        timers.start(TimerKind::Periodic, Duration::from_secs(1));
        timers.start(TimerKind::CurrentWhile, Duration::from_secs(3));
        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert_eq!(rx.recv().await, Some(Fired(TimerKind::Periodic)));
        assert!(rx.try_recv().is_err());
    }
}
