// UDP listener - Receives JSON telemetry datagrams and hands them to the ingest boundary
use crate::application::ingress::{DecodeError, TelemetryIngest};
use crate::infrastructure::config::IngressSettings;
use crate::infrastructure::json_codec;
use std::io;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::task::JoinHandle;

const SOURCE: &str = "udp";

#[derive(Debug, Error)]
pub enum IngressError {
    #[error("failed to bind telemetry socket on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub struct UdpListener {
    socket: UdpSocket,
    forward: Option<(UdpSocket, SocketAddr)>,
    ingest: TelemetryIngest,
    max_datagram_bytes: usize,
}

impl UdpListener {
    pub async fn bind(settings: &IngressSettings, ingest: TelemetryIngest) -> Result<Self, IngressError> {
        let socket = bind_socket(settings.bind_addr, settings.fallback_to_ephemeral).await?;
        tracing::info!("UDP telemetry listener bound to {}", socket.local_addr()?);

        let forward = match settings.forward_addr {
            Some(target) => {
                let local: SocketAddr = if target.is_ipv4() {
                    SocketAddr::from(([0, 0, 0, 0], 0))
                } else {
                    SocketAddr::from(([0u16; 8], 0))
                };
                let forward_socket = UdpSocket::bind(local)
                    .await
                    .map_err(|source| IngressError::Bind { addr: local, source })?;
                tracing::info!("forwarding raw datagrams to {}", target);
                Some((forward_socket, target))
            }
            None => None,
        };

        Ok(Self {
            socket,
            forward,
            ingest,
            max_datagram_bytes: settings.max_datagram_bytes,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Receive loop. Suspends only on the socket receive and returns once
    /// `shutdown` flips to true or its sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!("UDP telemetry listener started");

        // One spare byte detects datagrams larger than the ceiling instead of
        // silently accepting a truncated payload.
        let mut buffer = vec![0u8; self.max_datagram_bytes + 1];

        while !*shutdown.borrow() {
            let received = tokio::select! {
                _ = shutdown.changed() => break,
                received = self.socket.recv_from(&mut buffer) => received,
            };

            let (len, src) = match received {
                Ok(received) => received,
                Err(e) => {
                    self.ingest.stats().record_receive_error();
                    tracing::error!("UDP recv error: {}", e);
                    continue;
                }
            };

            tracing::trace!("received {} bytes from {}", len, src);
            let datagram = &buffer[..len];
            if len > self.max_datagram_bytes {
                let oversized = DecodeError::Oversized {
                    len,
                    limit: self.max_datagram_bytes,
                };
                self.ingest.accept(Err(oversized), SOURCE);
                continue;
            }

            // Only whole datagrams are relayed downstream.
            self.forward_datagram(datagram).await;
            self.ingest.accept(json_codec::decode_datagram(datagram), SOURCE);
        }

        tracing::info!("UDP telemetry listener stopped");
    }

    async fn forward_datagram(&self, datagram: &[u8]) {
        if let Some((socket, target)) = &self.forward {
            match socket.send_to(datagram, target).await {
                Ok(_) => self.ingest.stats().record_forwarded(),
                Err(e) => tracing::warn!("failed to forward datagram to {}: {}", target, e),
            }
        }
    }
}

/// Binds `addr`, or an OS-assigned port on the same interface when the
/// address is taken and `fallback_to_ephemeral` is set.
async fn bind_socket(addr: SocketAddr, fallback_to_ephemeral: bool) -> Result<UdpSocket, IngressError> {
    match UdpSocket::bind(addr).await {
        Ok(socket) => Ok(socket),
        Err(e) if e.kind() == io::ErrorKind::AddrInUse && fallback_to_ephemeral => {
            let ephemeral = SocketAddr::new(addr.ip(), 0);
            let socket = UdpSocket::bind(ephemeral)
                .await
                .map_err(|source| IngressError::Bind { addr: ephemeral, source })?;
            tracing::warn!(
                "telemetry port {} is in use, listening on {} instead",
                addr,
                socket.local_addr()?
            );
            Ok(socket)
        }
        Err(source) => Err(IngressError::Bind { addr, source }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ingress::IngressStats;
    use crate::application::telemetry_store::TelemetryStore;
    use crate::domain::telemetry::Position;
    use std::sync::Arc;
    use std::time::Duration;

    const GOOD: &[u8] =
        br#"{"position":{"x":1,"y":2},"heading":90,"battery_level":50,"ultrasound_distance":1.2}"#;

    fn loopback_settings() -> IngressSettings {
        IngressSettings {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            max_datagram_bytes: 256,
            ..IngressSettings::default()
        }
    }

    fn parts() -> (TelemetryIngest, Arc<TelemetryStore>, Arc<IngressStats>) {
        let store = Arc::new(TelemetryStore::default());
        let stats = Arc::new(IngressStats::default());
        (TelemetryIngest::new(store.clone(), stats.clone()), store, stats)
    }

    async fn wait_for(mut condition: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn test_malformed_then_valid_datagram() {
        let (ingest, store, stats) = parts();
        let listener = UdpListener::bind(&loopback_settings(), ingest).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = listener.spawn(shutdown_rx);

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.send_to(b"{\"position\": oops", addr).await.unwrap();
        sender.send_to(GOOD, addr).await.unwrap();

        wait_for(|| stats.counters().received == 2).await;
        assert_eq!(store.publish_count(), 1);
        assert_eq!(store.read_latest().unwrap().record.position, Position::new(1.0, 2.0));
        assert_eq!(stats.counters().decode_failures, 1);

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_oversized_datagram_is_discarded() {
        let (ingest, store, stats) = parts();
        let listener = UdpListener::bind(&loopback_settings(), ingest).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let _handle = listener.spawn(shutdown_rx);

        let mut padded = GOOD.to_vec();
        padded.extend(std::iter::repeat_n(b' ', 300));
        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.send_to(&padded, addr).await.unwrap();

        wait_for(|| stats.counters().decode_failures == 1).await;
        assert_eq!(store.publish_count(), 0);
    }

    #[tokio::test]
    async fn test_datagrams_are_forwarded() {
        let (ingest, store, stats) = parts();
        let downstream = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let settings = IngressSettings {
            forward_addr: Some(downstream.local_addr().unwrap()),
            ..loopback_settings()
        };
        let listener = UdpListener::bind(&settings, ingest).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let _handle = listener.spawn(shutdown_rx);

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.send_to(GOOD, addr).await.unwrap();

        let mut buf = [0u8; 512];
        let (len, _) = tokio::time::timeout(Duration::from_secs(5), downstream.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buf[..len], GOOD);
        wait_for(|| store.publish_count() == 1).await;
        assert_eq!(stats.counters().forwarded, 1);
    }

    #[tokio::test]
    async fn test_oversized_datagrams_are_not_forwarded() {
        let (ingest, store, stats) = parts();
        let downstream = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let settings = IngressSettings {
            forward_addr: Some(downstream.local_addr().unwrap()),
            ..loopback_settings()
        };
        let listener = UdpListener::bind(&settings, ingest).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let _handle = listener.spawn(shutdown_rx);

        let mut padded = GOOD.to_vec();
        padded.extend(std::iter::repeat_n(b' ', 300));
        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.send_to(&padded, addr).await.unwrap();
        sender.send_to(GOOD, addr).await.unwrap();

        // The first datagram to arrive downstream is the one within the ceiling.
        let mut buf = [0u8; 1024];
        let (len, _) = tokio::time::timeout(Duration::from_secs(5), downstream.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buf[..len], GOOD);

        wait_for(|| store.publish_count() == 1).await;
        let counters = stats.counters();
        assert_eq!(counters.decode_failures, 1);
        assert_eq!(counters.forwarded, 1);
    }

    #[tokio::test]
    async fn test_address_in_use_is_fatal_without_fallback() {
        let taken = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let (ingest, _, _) = parts();
        let settings = IngressSettings {
            bind_addr: taken.local_addr().unwrap(),
            ..loopback_settings()
        };

        let err = UdpListener::bind(&settings, ingest).await.err().unwrap();
        assert!(matches!(err, IngressError::Bind { addr, .. } if addr == settings.bind_addr));
    }

    #[tokio::test]
    async fn test_address_in_use_falls_back_to_ephemeral_port() {
        let taken = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let (ingest, _, _) = parts();
        let settings = IngressSettings {
            bind_addr: taken.local_addr().unwrap(),
            fallback_to_ephemeral: true,
            ..loopback_settings()
        };

        let listener = UdpListener::bind(&settings, ingest).await.unwrap();
        let actual = listener.local_addr().unwrap();
        assert_ne!(actual, settings.bind_addr);
        assert_eq!(actual.ip(), settings.bind_addr.ip());
    }

    #[tokio::test]
    async fn test_dropping_shutdown_sender_stops_listener() {
        let (ingest, _, _) = parts();
        let listener = UdpListener::bind(&loopback_settings(), ingest).await.unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = listener.spawn(shutdown_rx);

        drop(shutdown_tx);
        tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    }
}
