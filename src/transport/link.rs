//! Network link state published by the network bring-up collaborator

use anyhow::{anyhow, Result};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Whether the node currently has a usable network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Up,
    Down,
}

/// Publishes link transitions to the listener and the active session
pub struct LinkMonitor {
    tx: watch::Sender<LinkState>,
}

impl LinkMonitor {
    pub fn new(initial: LinkState) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<LinkState> {
        self.tx.subscribe()
    }

    /// Record a link transition; repeated states are not re-announced
    pub fn set(&self, state: LinkState) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        });

        if changed {
            match state {
                LinkState::Up => info!("Network link up"),
                LinkState::Down => warn!("Network link down"),
            }
        }
    }
}

/// Derives the link state from whether the listen address is assigned
///
/// An unspecified address is always up. A specific address is up while a
/// socket can be bound to it on this host.
pub struct AddressWatch {
    ip: IpAddr,
    period: Duration,
    monitor: LinkMonitor,
}

impl AddressWatch {
    pub fn new(ip: IpAddr, period: Duration, monitor: LinkMonitor) -> Self {
        Self {
            ip,
            period,
            monitor,
        }
    }

    /// Check the address once
    pub async fn check(&self) -> LinkState {
        if self.ip.is_unspecified() {
            return LinkState::Up;
        }
        match UdpSocket::bind(SocketAddr::new(self.ip, 0)).await {
            Ok(_) => LinkState::Up,
            Err(e) => {
                debug!("[LINK] {} not available: {}", self.ip, e);
                LinkState::Down
            }
        }
    }

    /// Start watching in a background task
    pub fn start(self) -> AddressWatchHandle {
        let task = tokio::spawn(self.run());
        AddressWatchHandle { task }
    }

    async fn run(self) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("[LINK] Watching {} every {:?}", self.ip, self.period);

        loop {
            ticker.tick().await;
            let state = self.check().await;
            self.monitor.set(state);
        }
    }
}

/// Handle to the address watch task
pub struct AddressWatchHandle {
    task: tokio::task::JoinHandle<()>,
}

impl AddressWatchHandle {
    /// Stop watching; subscribers see the monitor close
    pub fn stop(self) {
        self.task.abort();
    }
}

/// Wait until the link is up
///
/// Fails if the monitor goes away while the link is down.
pub async fn wait_for_link_up(link: &mut watch::Receiver<LinkState>) -> Result<()> {
    link.wait_for(|state| *state == LinkState::Up)
        .await
        .map(|_| ())
        .map_err(|_| anyhow!("Link monitor closed while link was down"))
}

/// Resolve when the link goes down
///
/// Never resolves once the monitor has gone away, since the state can no
/// longer change.
pub async fn wait_for_link_down(link: &mut watch::Receiver<LinkState>) {
    if link
        .wait_for(|state| *state == LinkState::Down)
        .await
        .is_err()
    {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_wait_for_up_after_down() {
        let monitor = LinkMonitor::new(LinkState::Down);
        let mut link = monitor.subscribe();

        let waiter = tokio::spawn(async move { wait_for_link_up(&mut link).await });
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        monitor.set(LinkState::Up);
        timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter did not wake")
            .unwrap()
            .unwrap();
        assert_eq!(*monitor.subscribe().borrow(), LinkState::Up);
    }

    #[tokio::test]
    async fn test_repeated_state_is_not_announced() {
        let monitor = LinkMonitor::new(LinkState::Up);
        let link = monitor.subscribe();

        monitor.set(LinkState::Up);
        assert!(!link.has_changed().unwrap());

        monitor.set(LinkState::Down);
        assert!(link.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_address_check() {
        let address = |ip: &str| {
            AddressWatch::new(
                ip.parse().unwrap(),
                Duration::from_millis(10),
                LinkMonitor::new(LinkState::Down),
            )
        };

        assert_eq!(address("0.0.0.0").check().await, LinkState::Up);
        assert_eq!(address("127.0.0.1").check().await, LinkState::Up);
        // Documentation range, never assigned to a test host
        assert_eq!(address("192.0.2.77").check().await, LinkState::Down);
    }

    #[tokio::test]
    async fn test_watch_brings_link_up() {
        let monitor = LinkMonitor::new(LinkState::Down);
        let mut link = monitor.subscribe();
        let handle = AddressWatch::new(
            "127.0.0.1".parse().unwrap(),
            Duration::from_millis(10),
            monitor,
        )
        .start();

        timeout(Duration::from_secs(1), wait_for_link_up(&mut link))
            .await
            .expect("watch never reported up")
            .unwrap();
        handle.stop();
    }

    #[tokio::test]
    async fn test_stopped_watch_closes_monitor() {
        let monitor = LinkMonitor::new(LinkState::Down);
        let mut link = monitor.subscribe();
        let handle = AddressWatch::new(
            "192.0.2.77".parse().unwrap(),
            Duration::from_millis(10),
            monitor,
        )
        .start();

        handle.stop();
        let result = timeout(Duration::from_secs(1), wait_for_link_up(&mut link))
            .await
            .expect("waiter did not observe the closed monitor");
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_closed_monitor_fails_up_wait() {
        let monitor = LinkMonitor::new(LinkState::Down);
        let mut link = monitor.subscribe();
        drop(monitor);

        assert!(wait_for_link_up(&mut link).await.is_err());
    }

    #[tokio::test]
    async fn test_down_wait_pends_after_monitor_closes() {
        let monitor = LinkMonitor::new(LinkState::Up);
        let mut link = monitor.subscribe();
        drop(monitor);

        let result = timeout(Duration::from_millis(50), wait_for_link_down(&mut link)).await;
        assert!(result.is_err());
    }
}
