//! TCP listener serving one client session at a time

use super::keepalive::{apply_keepalive, KeepaliveConfig};
use super::link::{wait_for_link_down, wait_for_link_up, LinkState};
use crate::command::CommandExecutor;
use crate::connection::{ConnectionRegistry, Session, SessionConfig, SessionEnd};
use actuator_shared::protocol;
use anyhow::{Context, Result};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::watch;
use tracing::{info, warn};

/// Configuration for the control listener
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Address to bind
    pub addr: SocketAddr,
    /// Pending connections queued while a session is active
    pub backlog: u32,
    /// Keep-alive applied to every accepted socket
    pub keepalive: KeepaliveConfig,
    /// Per-session loop parameters
    pub session: SessionConfig,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, protocol::CONTROL_PORT)),
            backlog: protocol::LISTEN_BACKLOG,
            keepalive: KeepaliveConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

/// Accepts clients and runs their sessions strictly one after another
pub struct Listener {
    inner: TcpListener,
    config: ListenerConfig,
}

impl Listener {
    /// Bind and listen; failure here is fatal to the service
    pub fn bind(config: ListenerConfig) -> Result<Self> {
        let socket = match config.addr {
            SocketAddr::V4(_) => TcpSocket::new_v4(),
            SocketAddr::V6(_) => TcpSocket::new_v6(),
        }
        .context("Unable to create socket")?;

        socket.set_reuseaddr(true)?;
        socket
            .bind(config.addr)
            .with_context(|| format!("Socket unable to bind {}", config.addr))?;
        let inner = socket
            .listen(config.backlog)
            .context("Error occurred during listen")?;

        let listener = Self { inner, config };
        info!("Socket bound, listening on {}", listener.local_addr()?);
        Ok(listener)
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.inner.local_addr()?)
    }

    /// Wait for the next client and prepare its socket
    ///
    /// The returned stream is non-blocking with keep-alive enabled. A socket
    /// whose keep-alive cannot be set is still served.
    pub async fn accept_next(&self) -> Result<(TcpStream, SocketAddr)> {
        let (stream, peer) = self
            .inner
            .accept()
            .await
            .context("Unable to accept connection")?;

        if let Err(e) = apply_keepalive(&stream, &self.config.keepalive) {
            warn!("Keep-alive setup failed for {}: {}", peer, e);
        }

        info!("Socket accepted ip address: {}", peer);
        Ok((stream, peer))
    }

    /// Accept and serve clients until accept fails or the link monitor closes
    ///
    /// Call once the link is up. Sessions never overlap: the next accept only
    /// happens after the previous session has cleared the registry and closed
    /// its socket. While the link is down nothing is accepted; connections
    /// queued in the backlog meanwhile are served once it returns.
    pub async fn serve(
        self,
        executor: &mut CommandExecutor,
        registry: Arc<ConnectionRegistry>,
        mut link: watch::Receiver<LinkState>,
    ) -> Result<()> {
        loop {
            info!("Socket listening");
            let accepted = tokio::select! {
                biased;

                _ = wait_for_link_down(&mut link) => None,
                accepted = self.accept_next() => Some(accepted.context("Listener stopped")?),
            };

            if let Some((stream, peer)) = accepted {
                let session = Session::new(stream, peer, self.config.session.clone());
                match session.run(executor, &registry, &mut link).await {
                    SessionEnd::PeerClosed => info!("Session with {} ended: peer closed", peer),
                    end => warn!("Session with {} ended: {}", peer, end),
                }
            }

            if *link.borrow() == LinkState::Down {
                info!("Waiting for network link before accepting");
                wait_for_link_up(&mut link).await?;
            }
        }
    }
}
