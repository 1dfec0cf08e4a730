//! HTTP accept loop and connection handling.
//!
//! Both the client-facing API and the Raft RPC endpoint run on this loop; they
//! differ only in the handler they pass to [`serve`].

use crate::error::ClusterResult;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Pause after a failed accept, e.g. when out of file descriptors.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Bind a listener on `addr` (`host:port`, port 0 picks a free one).
pub async fn bind(addr: &str) -> ClusterResult<TcpListener> {
    Ok(TcpListener::bind(addr).await?)
}

/// A running server.
///
/// Dropping the handle stops the accept loop.
#[derive(Debug)]
pub struct ServerHandle {
    name: &'static str,
    local_addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ServerHandle {
    /// Address the server is listening on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections and wait for the accept loop to exit.
    ///
    /// Connections already being served finish on their own tasks.
    pub async fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(server = self.name, error = %e, "server task failed");
            }
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Wait out `backoff`, returning `true` if shutdown was requested meanwhile.
async fn accept_backoff(shutdown_rx: &mut oneshot::Receiver<()>, backoff: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(backoff) => false,
        _ = shutdown_rx => true,
    }
}

/// Serve `handler` on `listener` until the returned handle is shut down.
pub fn serve<H, Fut>(name: &'static str, listener: TcpListener, handler: H) -> ClusterResult<ServerHandle>
where
    H: Fn(Request<Incoming>) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Response<Full<Bytes>>> + Send + 'static,
{
    let local_addr = listener.local_addr()?;
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

    tracing::info!(server = name, addr = %local_addr, "server started");

    let task = tokio::spawn(async move {
        loop {
            tokio::select! {
                result = listener.accept() => {
                    let (stream, remote_addr) = match result {
                        Ok(conn) => conn,
                        Err(e) => {
                            tracing::warn!(server = name, error = %e, "accept failed");
                            if accept_backoff(&mut shutdown_rx, ACCEPT_BACKOFF).await {
                                break;
                            }
                            continue;
                        }
                    };

                    let io = TokioIo::new(stream);
                    let handler = handler.clone();

                    tokio::spawn(async move {
                        let service = service_fn(move |req| {
                            let handler = handler.clone();
                            async move { Ok::<_, Infallible>(handler(req).await) }
                        });

                        if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                            if !e.is_incomplete_message() {
                                tracing::warn!(
                                    server = name,
                                    remote = %remote_addr,
                                    error = %e,
                                    "HTTP connection error"
                                );
                            }
                        }
                    });
                }
                _ = &mut shutdown_rx => {
                    tracing::info!(server = name, "server shutting down");
                    break;
                }
            }
        }
    });

    Ok(ServerHandle {
        name,
        local_addr,
        shutdown_tx: Some(shutdown_tx),
        task: Some(task),
    })
}
