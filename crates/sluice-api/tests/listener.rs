use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Result, anyhow};
use sluice_api::{ApiServer, ListenerLimits};
use sluice_core::{RequestGate, admission_queue};
use sluice_telemetry::Metrics;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout};
use tokio_util::sync::CancellationToken;

const PATIENCE: Duration = Duration::from_secs(5);
const HEALTH: &[u8] = b"GET /health HTTP/1.1\r\nHost: localhost\r\n\r\n";

struct Listening {
    addr: SocketAddr,
    stop: oneshot::Sender<()>,
    task: JoinHandle<sluice_api::ApiServerResult<()>>,
}

impl Listening {
    async fn start(limits: ListenerLimits) -> Result<Self> {
        let (queue, _receiver) = admission_queue(4, Metrics::new()?);
        let gate = RequestGate::new(queue, CancellationToken::new(), PATIENCE);
        let server = ApiServer::new(gate, Metrics::new()?, 1).with_listener_limits(limits);

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (stop, stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(server.serve_listener(listener, async move {
            let _ = stopped.await;
        }));
        Ok(Self { addr, stop, task })
    }

    async fn stop(self) -> Result<()> {
        let _ = self.stop.send(());
        timeout(PATIENCE, self.task).await???;
        Ok(())
    }
}

fn limits(header_read_timeout: Duration, idle_timeout: Duration) -> ListenerLimits {
    ListenerLimits {
        header_read_timeout,
        idle_timeout,
        max_header_bytes: 8 * 1024,
    }
}

/// Read until the peer closes. A reset counts as closed.
async fn read_to_close(stream: &mut TcpStream) -> Result<Vec<u8>> {
    let mut received = Vec::new();
    let mut buf = [0_u8; 4096];
    loop {
        match timeout(PATIENCE, stream.read(&mut buf)).await {
            Err(_) => return Err(anyhow!("connection still open after {PATIENCE:?}")),
            Ok(Ok(0)) => return Ok(received),
            Ok(Ok(read)) => received.extend_from_slice(&buf[..read]),
            Ok(Err(err)) if err.kind() == std::io::ErrorKind::ConnectionReset => {
                return Ok(received);
            }
            Ok(Err(err)) => return Err(err.into()),
        }
    }
}

#[tokio::test]
async fn idle_keep_alive_connections_are_closed() -> Result<()> {
    let server =
        Listening::start(limits(Duration::from_secs(10), Duration::from_millis(200))).await?;
    let mut stream = TcpStream::connect(server.addr).await?;
    stream.write_all(HEALTH).await?;

    let started = Instant::now();
    let received = read_to_close(&mut stream).await?;
    let text = String::from_utf8_lossy(&received);
    assert!(text.starts_with("HTTP/1.1 200"), "{text}");
    assert!(started.elapsed() < PATIENCE);

    server.stop().await
}

#[tokio::test]
async fn slow_request_heads_are_cut_off() -> Result<()> {
    let server =
        Listening::start(limits(Duration::from_millis(200), Duration::from_secs(10))).await?;
    let mut stream = TcpStream::connect(server.addr).await?;
    stream.write_all(b"GET /health HTTP/1.1\r\nHost: local").await?;

    let received = read_to_close(&mut stream).await?;
    let text = String::from_utf8_lossy(&received);
    assert!(!text.contains("200 OK"), "{text}");

    server.stop().await
}

#[tokio::test]
async fn oversized_request_heads_are_refused() -> Result<()> {
    let server =
        Listening::start(limits(Duration::from_secs(10), Duration::from_secs(10))).await?;
    let mut stream = TcpStream::connect(server.addr).await?;
    let padding = "a".repeat(20 * 1024);
    let head = format!("GET /health HTTP/1.1\r\nHost: localhost\r\nX-Padding: {padding}\r\n\r\n");
    // The server may hang up before the whole head is written.
    let _ = stream.write_all(head.as_bytes()).await;

    let received = read_to_close(&mut stream).await?;
    let text = String::from_utf8_lossy(&received);
    assert!(
        received.is_empty() || text.starts_with("HTTP/1.1 431"),
        "{text}"
    );

    let mut fresh = TcpStream::connect(server.addr).await?;
    fresh
        .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await?;
    let received = read_to_close(&mut fresh).await?;
    let text = String::from_utf8_lossy(&received);
    assert!(text.starts_with("HTTP/1.1 200"), "{text}");

    server.stop().await
}
