//! One accepted client connection, from accept to teardown

use super::registry::ConnectionRegistry;
use crate::command::{CommandExecutor, CommandResult};
use crate::transport::{wait_for_link_down, LinkState};
use actuator_shared::protocol;
use bytes::Bytes;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Session loop parameters
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Receive attempt cadence
    pub tick: Duration,
    /// Receive buffer size; one byte is kept spare
    pub rx_buffer: usize,
    /// Pushed lines queued for the socket before the poller's sends are dropped
    pub outbound_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(protocol::SESSION_TICK_MS),
            rx_buffer: protocol::RX_BUFFER_LEN,
            outbound_capacity: 8,
        }
    }
}

/// Why a session ended
#[derive(Debug)]
pub enum SessionEnd {
    /// Orderly close by the peer (zero-length read)
    PeerClosed,
    /// Receive failed with something other than would-block
    ReadError(io::Error),
    /// Sending a reply or a pushed line failed
    WriteError(io::Error),
    /// The network link went down
    LinkLost,
}

impl std::fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionEnd::PeerClosed => write!(f, "connection closed by peer"),
            SessionEnd::ReadError(e) => write!(f, "receive error: {}", e),
            SessionEnd::WriteError(e) => write!(f, "send error: {}", e),
            SessionEnd::LinkLost => write!(f, "network link lost"),
        }
    }
}

/// Active client session
///
/// Owns the socket for its whole life. The registry only ever sees the
/// sending side of the session's outbound queue, so pushed lines are written
/// here, never by the poller.
pub struct Session {
    stream: TcpStream,
    peer: SocketAddr,
    config: SessionConfig,
}

impl Session {
    pub fn new(stream: TcpStream, peer: SocketAddr, config: SessionConfig) -> Self {
        Self {
            stream,
            peer,
            config,
        }
    }

    /// Run until the peer closes, an I/O error occurs, or the link drops
    ///
    /// Every exit path clears the registry before the socket is shut down.
    /// If this future is dropped early the outbound receiver goes with it, so
    /// the registry's sender can no longer deliver anything.
    pub async fn run(
        mut self,
        executor: &mut CommandExecutor,
        registry: &ConnectionRegistry,
        link: &mut watch::Receiver<LinkState>,
    ) -> SessionEnd {
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<Bytes>(self.config.outbound_capacity);
        let id = registry.publish(self.peer, outbound_tx).await;

        let end = self.serve(executor, &mut outbound_rx, link).await;

        registry.clear(id).await;
        drop(outbound_rx);

        info!("Shutting down socket {} ({})", self.peer, end);
        if let Err(e) = self.stream.shutdown().await {
            debug!("Shutdown of {} failed: {}", self.peer, e);
        }

        end
    }

    async fn serve(
        &mut self,
        executor: &mut CommandExecutor,
        outbound_rx: &mut mpsc::Receiver<Bytes>,
        link: &mut watch::Receiver<LinkState>,
    ) -> SessionEnd {
        let mut ticker = interval(self.config.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut buf = vec![0u8; self.config.rx_buffer.max(2)];
        let limit = buf.len() - 1;

        loop {
            tokio::select! {
                _ = wait_for_link_down(link) => {
                    warn!("Link down, dropping client {}", self.peer);
                    return SessionEnd::LinkLost;
                }

                // Lines pushed through the registry
                Some(line) = outbound_rx.recv() => {
                    if let Err(e) = self.stream.write_all(&line).await {
                        return SessionEnd::WriteError(e);
                    }
                }

                _ = ticker.tick() => {
                    match self.stream.try_read(&mut buf[..limit]) {
                        Ok(0) => return SessionEnd::PeerClosed,
                        Ok(n) => {
                            let data = &buf[..n];
                            debug!(
                                "Received {} bytes from {}: {}",
                                n,
                                self.peer,
                                String::from_utf8_lossy(data).trim_end()
                            );

                            match executor.execute(data).await {
                                CommandResult::Completed(reply) => {
                                    if let Err(e) = self.stream.write_all(&reply.to_line()).await {
                                        return SessionEnd::WriteError(e);
                                    }
                                }
                                CommandResult::Ignored => {}
                                CommandResult::Failed { message } => {
                                    warn!("No reply sent to {}: {}", self.peer, message);
                                }
                            }
                        }
                        Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                            // No data this tick
                        }
                        Err(e) => return SessionEnd::ReadError(e),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::{Actuators, PinMap, PulseTiming, SimulatedGpio};
    use crate::transport::LinkMonitor;
    use actuator_shared::Reply;
    use socket2::SockRef;
    use std::sync::Arc;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    async fn connected_pair() -> (TcpStream, SocketAddr, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, peer) = listener.accept().await.unwrap();
        (server, peer, client)
    }

    fn executor_with_blink(led_blink: Duration) -> CommandExecutor {
        let timing = PulseTiming {
            led_blink,
            feedback: Duration::from_millis(1),
            ready_flash: Duration::from_millis(1),
        };
        let mut actuators = Actuators::new(Arc::new(SimulatedGpio::new()), PinMap::default(), timing);
        actuators.configure().unwrap();
        CommandExecutor::new(actuators)
    }

    fn spawn_session(
        server: TcpStream,
        peer: SocketAddr,
        registry: Arc<ConnectionRegistry>,
        monitor: &LinkMonitor,
    ) -> tokio::task::JoinHandle<SessionEnd> {
        spawn_session_with(server, peer, registry, monitor, executor_with_blink(Duration::from_millis(1)))
    }

    fn spawn_session_with(
        server: TcpStream,
        peer: SocketAddr,
        registry: Arc<ConnectionRegistry>,
        monitor: &LinkMonitor,
        mut executor: CommandExecutor,
    ) -> tokio::task::JoinHandle<SessionEnd> {
        let mut link = monitor.subscribe();
        tokio::spawn(async move {
            Session::new(server, peer, SessionConfig::default())
                .run(&mut executor, &registry, &mut link)
                .await
        })
    }

    async fn wait_for_publish(registry: &ConnectionRegistry) {
        timeout(Duration::from_secs(2), async {
            while registry.current_peer().await.is_none() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("session never published");
    }

    async fn read_line(client: &mut TcpStream) -> String {
        let mut buf = vec![0u8; 64];
        let n = timeout(Duration::from_secs(2), client.read(&mut buf))
            .await
            .expect("no reply")
            .unwrap();
        String::from_utf8_lossy(&buf[..n]).into_owned()
    }

    #[tokio::test]
    async fn test_command_reply_and_pushed_line() {
        let (server, peer, mut client) = connected_pair().await;
        let registry = Arc::new(ConnectionRegistry::new());
        let monitor = LinkMonitor::new(LinkState::Up);
        let handle = spawn_session(server, peer, registry.clone(), &monitor);
        wait_for_publish(&registry).await;

        client.write_all(b"S").await.unwrap();
        assert_eq!(read_line(&mut client).await, "Motor Stopped\n");

        assert!(registry.try_send(Reply::ButtonPressed.to_line()).await);
        assert_eq!(read_line(&mut client).await, "Button Pressed!\n");

        drop(client);
        let end = timeout(Duration::from_secs(2), handle).await.unwrap().unwrap();
        assert!(matches!(end, SessionEnd::PeerClosed));
    }

    #[tokio::test]
    async fn test_registry_cleared_after_peer_close() {
        let (server, peer, client) = connected_pair().await;
        let registry = Arc::new(ConnectionRegistry::new());
        let monitor = LinkMonitor::new(LinkState::Up);
        let handle = spawn_session(server, peer, registry.clone(), &monitor);
        wait_for_publish(&registry).await;

        drop(client);
        timeout(Duration::from_secs(2), handle).await.unwrap().unwrap();

        assert!(registry.current_peer().await.is_none());
        assert!(!registry.try_send(Reply::ButtonPressed.to_line()).await);
    }

    /// Close with RST instead of FIN
    fn reset(client: TcpStream) {
        SockRef::from(&client)
            .set_linger(Some(Duration::ZERO))
            .unwrap();
        drop(client);
    }

    #[tokio::test]
    async fn test_connection_reset_is_read_error() {
        let (server, peer, client) = connected_pair().await;
        let registry = Arc::new(ConnectionRegistry::new());
        let monitor = LinkMonitor::new(LinkState::Up);
        let handle = spawn_session(server, peer, registry.clone(), &monitor);
        wait_for_publish(&registry).await;

        reset(client);
        let end = timeout(Duration::from_secs(2), handle).await.unwrap().unwrap();
        assert!(matches!(end, SessionEnd::ReadError(_)), "ended with {end}");
        assert!(registry.current_peer().await.is_none());
        assert!(!registry.try_send(Reply::ButtonPressed.to_line()).await);
    }

    #[tokio::test]
    async fn test_reply_to_reset_peer_is_write_error() {
        let (server, peer, mut client) = connected_pair().await;
        let registry = Arc::new(ConnectionRegistry::new());
        let monitor = LinkMonitor::new(LinkState::Up);
        let executor = executor_with_blink(Duration::from_millis(300));
        let handle = spawn_session_with(server, peer, registry.clone(), &monitor, executor);
        wait_for_publish(&registry).await;

        // The session is holding the LED when the peer goes away
        client.write_all(b"L").await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        reset(client);

        let end = timeout(Duration::from_secs(2), handle).await.unwrap().unwrap();
        assert!(matches!(end, SessionEnd::WriteError(_)), "ended with {end}");
        assert!(registry.current_peer().await.is_none());
    }

    #[tokio::test]
    async fn test_link_loss_tears_session_down() {
        let (server, peer, mut client) = connected_pair().await;
        let registry = Arc::new(ConnectionRegistry::new());
        let monitor = LinkMonitor::new(LinkState::Up);
        let handle = spawn_session(server, peer, registry.clone(), &monitor);
        wait_for_publish(&registry).await;

        monitor.set(LinkState::Down);
        let end = timeout(Duration::from_secs(2), handle).await.unwrap().unwrap();
        assert!(matches!(end, SessionEnd::LinkLost));
        assert!(registry.current_peer().await.is_none());

        // Server side shut down its half: client sees EOF
        let mut buf = [0u8; 8];
        let n = timeout(Duration::from_secs(2), client.read(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(n, 0);
    }
}
