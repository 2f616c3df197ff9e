//! TCP accept loop and per-connection request handling

use std::future::Future;
use std::time::Duration;

use anyhow::{anyhow, bail, ensure, Result};
use bytes::BytesMut;
use lemcache::MemoryStore;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, warn};

use crate::handler::CommandHandler;
use crate::resp::Frame;

/// Accept connections until `shutdown` resolves
///
/// Each connection runs on its own task; connections already open when
/// shutdown fires are left to finish on their own.
pub async fn serve(
    listener: TcpListener,
    store: MemoryStore,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested, no longer accepting connections");
                return Ok(());
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    info!("New connection from {}", addr);
                    let handler = CommandHandler::new(store.clone());

                    tokio::spawn(async move {
                        if let Err(e) = handle_client(stream, handler).await {
                            error!("Error handling client {}: {}", addr, e);
                        }
                        info!("Connection closed: {}", addr);
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                }
            }
        }
    }
}

/// Serve one client until it disconnects
///
/// Pipelined commands are answered in a single write per read.
pub async fn handle_client(mut stream: TcpStream, handler: CommandHandler) -> Result<()> {
    let mut input = BytesMut::with_capacity(4096);
    let mut output = BytesMut::with_capacity(4096);

    loop {
        if stream.read_buf(&mut input).await? == 0 {
            return Ok(());
        }

        loop {
            match Frame::parse(&mut input) {
                Ok(Some(frame)) => handler.handle(frame).encode(&mut output),
                Ok(None) => break,
                Err(e) => {
                    warn!("Parse error: {}", e);
                    Frame::error(format!("ERR {}", e)).encode(&mut output);
                    input.clear();
                    break;
                }
            }
        }

        if !output.is_empty() {
            stream.write_all(&output).await?;
            output.clear();
        }
    }
}

/// Check that the server at `addr` answers `PING` with `PONG` within `timeout`
pub async fn ping(addr: &str, timeout: Duration) -> Result<()> {
    tokio::time::timeout(timeout, ping_once(addr))
        .await
        .map_err(|_| anyhow!("no PING reply from {} within {:?}", addr, timeout))?
}

async fn ping_once(addr: &str) -> Result<()> {
    let mut stream = TcpStream::connect(addr).await?;
    let request = Frame::Array(Some(vec![Frame::bulk("PING")]));
    stream.write_all(&request.to_bytes()).await?;

    let mut reply = BytesMut::with_capacity(64);
    loop {
        if let Some(frame) = Frame::parse(&mut reply)? {
            ensure!(
                frame == Frame::Simple("PONG".to_string()),
                "unexpected reply to PING: {:?}",
                frame
            );
            return Ok(());
        }
        if stream.read_buf(&mut reply).await? == 0 {
            bail!("connection closed before PING reply");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use tokio::sync::oneshot;

    async fn start() -> (SocketAddr, MemoryStore, oneshot::Sender<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let store = MemoryStore::new();
        let (stop, stopped) = oneshot::channel::<()>();

        let server_store = store.clone();
        tokio::spawn(async move {
            serve(listener, server_store, async {
                let _ = stopped.await;
            })
            .await
            .unwrap();
        });

        (addr, store, stop)
    }

    async fn roundtrip(stream: &mut TcpStream, request: &[u8], expected_len: usize) -> Vec<u8> {
        stream.write_all(request).await.unwrap();

        let mut reply = vec![0u8; expected_len];
        stream.read_exact(&mut reply).await.unwrap();
        reply
    }

    #[tokio::test]
    async fn test_ping_over_tcp() {
        let (addr, _store, _stop) = start().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        let reply = roundtrip(&mut stream, b"*1\r\n$4\r\nPING\r\n", 7).await;
        assert_eq!(reply, b"+PONG\r\n");
    }

    #[tokio::test]
    async fn test_pipelined_set_get() {
        let (addr, store, _stop) = start().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        let request = b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n*2\r\n$3\r\nGET\r\n$1\r\nk\r\n";
        let reply = roundtrip(&mut stream, request, 12).await;

        assert_eq!(reply, b"+OK\r\n$1\r\nv\r\n");
        assert_eq!(store.lookup("k"), Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn test_split_frame() {
        let (addr, _store, _stop) = start().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        stream.write_all(b"*2\r\n$4\r\nECHO\r\n$5\r\nhel").await.unwrap();
        stream.flush().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let reply = roundtrip(&mut stream, b"lo\r\n", 11).await;
        assert_eq!(reply, b"$5\r\nhello\r\n");
    }

    #[tokio::test]
    async fn test_protocol_error_keeps_connection() {
        let (addr, _store, _stop) = start().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        let expected = b"-ERR Protocol error: unknown frame type '?'\r\n";
        let reply = roundtrip(&mut stream, b"?bogus\r\n", expected.len()).await;
        assert_eq!(reply, expected);

        let reply = roundtrip(&mut stream, b"*1\r\n$4\r\nPING\r\n", 7).await;
        assert_eq!(reply, b"+PONG\r\n");
    }

    #[tokio::test]
    async fn test_shutdown_stops_accepting() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (stop, stopped) = oneshot::channel::<()>();

        let server = tokio::spawn(serve(listener, MemoryStore::new(), async {
            let _ = stopped.await;
        }));

        stop.send(()).unwrap();
        server.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_health_ping() {
        let (addr, _store, _stop) = start().await;
        ping(&addr.to_string(), Duration::from_secs(2)).await.unwrap();
    }

    #[tokio::test]
    async fn test_health_ping_rejects_other_protocols() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let _ = stream.write_all(b"HTTP/1.1 400 Bad Request\r\n\r\n").await;
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        assert!(ping(&addr.to_string(), Duration::from_secs(2)).await.is_err());
    }

    #[tokio::test]
    async fn test_health_ping_times_out_on_silence() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let result = ping(&addr.to_string(), Duration::from_millis(200)).await;
        assert!(result.unwrap_err().to_string().contains("no PING reply"));
    }
}
