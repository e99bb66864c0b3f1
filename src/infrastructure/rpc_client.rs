// Streaming RPC telemetry client - Consumes StreamTelemetry and publishes each message
use crate::application::frame_cache::FrameCache;
use crate::application::ingress::{DecodeError, TelemetryIngest};
use crate::infrastructure::proto_codec::{self, EmptyRequest, TelemetryData};
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use prost::Message;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;

const SOURCE: &str = "rpc";

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("stream I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// One message failed to decode; the stream itself is still usable.
    #[error("message decode error: {0}")]
    Decode(#[from] prost::DecodeError),
}

pub type TelemetryStream = BoxStream<'static, Result<TelemetryData, RpcError>>;

/// Opens `StreamTelemetry` calls against some transport.
#[async_trait]
pub trait TelemetryStreamClient: Send + Sync {
    async fn stream_telemetry(&self) -> Result<TelemetryStream, RpcError>;
}

/// Length-prefixed protobuf over a plain TCP connection.
#[derive(Debug, Clone)]
pub struct TcpTelemetryClient {
    endpoint: String,
    max_frame_bytes: usize,
}

impl TcpTelemetryClient {
    pub fn new(endpoint: String, max_frame_bytes: usize) -> Self {
        Self {
            endpoint,
            max_frame_bytes,
        }
    }
}

#[async_trait]
impl TelemetryStreamClient for TcpTelemetryClient {
    async fn stream_telemetry(&self) -> Result<TelemetryStream, RpcError> {
        let mut socket = TcpStream::connect(&self.endpoint)
            .await
            .map_err(|source| RpcError::Connect {
                endpoint: self.endpoint.clone(),
                source,
            })?;
        socket.write_all(&proto_codec::encode_frame(&EmptyRequest {})).await?;

        let max_frame_bytes = self.max_frame_bytes;
        let stream = async_stream::stream! {
            loop {
                match proto_codec::read_frame(&mut socket, max_frame_bytes).await {
                    Ok(Some(frame)) => yield TelemetryData::decode(frame).map_err(RpcError::from),
                    Ok(None) => break,
                    Err(e) => {
                        yield Err(RpcError::Io(e));
                        break;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Keeps one telemetry stream open for the life of the process, reconnecting
/// after a fixed delay whenever it ends or fails.
pub struct RpcIngress<C> {
    client: C,
    ingest: TelemetryIngest,
    frames: Arc<FrameCache>,
    reconnect_interval: Duration,
}

impl<C: TelemetryStreamClient + 'static> RpcIngress<C> {
    pub fn new(
        client: C,
        ingest: TelemetryIngest,
        frames: Arc<FrameCache>,
        reconnect_interval: Duration,
    ) -> Self {
        Self {
            client,
            ingest,
            frames,
            reconnect_interval,
        }
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!("RPC telemetry client started");

        while !*shutdown.borrow() {
            tokio::select! {
                _ = shutdown.changed() => break,
                result = self.consume_stream() => match result {
                    Ok(()) => tracing::warn!("telemetry stream ended"),
                    Err(e) => {
                        self.ingest.stats().record_receive_error();
                        tracing::error!("telemetry stream failed: {}", e);
                    }
                },
            }

            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(self.reconnect_interval) => {
                    tracing::info!("reconnecting telemetry stream");
                }
            }
        }

        tracing::info!("RPC telemetry client stopped");
    }

    async fn consume_stream(&self) -> Result<(), RpcError> {
        let mut stream = self.client.stream_telemetry().await?;
        tracing::info!("telemetry stream open");

        while let Some(item) = stream.next().await {
            match item {
                Ok(msg) => self.handle_message(msg),
                Err(RpcError::Decode(e)) => {
                    self.ingest.accept(Err(DecodeError::from(e)), SOURCE);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }

    fn handle_message(&self, msg: TelemetryData) {
        match proto_codec::into_readings(msg) {
            Ok((readings, frame)) => {
                if let Some(frame) = frame {
                    self.frames.store(frame);
                }
                self.ingest.accept(Ok(readings), SOURCE);
            }
            Err(e) => {
                self.ingest.accept(Err(e), SOURCE);
            }
        }
    }
}
