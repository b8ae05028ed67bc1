//! Single-shot result listener
//!
//! The listener is bound before the runner is launched and hands exactly one
//! accepted request back to the caller, then shuts down. Any method and any
//! path is accepted. When a secret is set, requests must carry it in the
//! `X-Runner-Secret` header or as a top-level `secret` field of a JSON body;
//! requests without it are answered with 401 and do not count as the result.

use crate::error::{OrchestratorError, OrchestratorResult};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::Router;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Header a runner may use to present the per-run secret.
pub const SECRET_HEADER: &str = "x-runner-secret";

/// Top-level body field a runner may use to present the per-run secret.
pub const SECRET_FIELD: &str = "secret";

/// Body returned to an accepted runner.
pub const ACKNOWLEDGEMENT: &str = "OK";

/// How long to let the server drain after the result arrived.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Structured result document delivered by a runner.
pub type ResultPayload = serde_json::Value;

/// The request a runner delivered
#[derive(Debug, Clone)]
pub struct CallbackRequest {
    pub method: String,
    pub path: String,
    pub body: Bytes,
}

impl CallbackRequest {
    /// Parse the body as a JSON document.
    pub fn json(&self) -> OrchestratorResult<ResultPayload> {
        serde_json::from_slice(&self.body)
            .map_err(|e| OrchestratorError::InvalidPayload(e.to_string()))
    }
}

#[derive(Clone)]
struct CallbackState {
    slot: Arc<Mutex<Option<oneshot::Sender<CallbackRequest>>>>,
    secret: Option<Arc<str>>,
}

/// Bound listener waiting for one runner callback
pub struct ResultRendezvous {
    listener: TcpListener,
    secret: Option<String>,
}

impl ResultRendezvous {
    /// Bind the callback port. Done before launch so an early callback is
    /// not refused.
    pub async fn bind(addr: SocketAddr) -> OrchestratorResult<Self> {
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            OrchestratorError::Rendezvous(format!("failed to bind {}: {}", addr, e))
        })?;
        debug!("Result listener bound on {}", addr);
        Ok(Self {
            listener,
            secret: None,
        })
    }

    /// Only accept requests presenting `secret`.
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub fn local_addr(&self) -> OrchestratorResult<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| OrchestratorError::Rendezvous(e.to_string()))
    }

    /// Block until one request is accepted, then stop listening.
    ///
    /// With `wait` unset this waits forever.
    pub async fn receive(self, wait: Option<Duration>) -> OrchestratorResult<CallbackRequest> {
        let addr = self.local_addr()?;
        let (result_tx, result_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let state = CallbackState {
            slot: Arc::new(Mutex::new(Some(result_tx))),
            secret: self.secret.map(Arc::from),
        };
        let router = Router::new().fallback(capture).with_state(state);

        let server = tokio::spawn(async move {
            axum::serve(self.listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        info!("Waiting for runner result on {}", addr);
        let received = match wait {
            Some(limit) => match tokio::time::timeout(limit, result_rx).await {
                Ok(received) => received,
                Err(_) => {
                    let _ = shutdown_tx.send(());
                    warn!("No runner result after {:?}", limit);
                    return Err(OrchestratorError::RendezvousTimeout(limit));
                }
            },
            None => result_rx.await,
        };

        let _ = shutdown_tx.send(());
        match tokio::time::timeout(SHUTDOWN_GRACE, server).await {
            Ok(Ok(Ok(()))) => debug!("Result listener on {} closed", addr),
            Ok(Ok(Err(e))) => warn!("Result listener error: {}", e),
            Ok(Err(e)) => warn!("Result listener task failed: {}", e),
            Err(_) => warn!("Result listener did not drain within {:?}", SHUTDOWN_GRACE),
        }

        received.map_err(|_| {
            OrchestratorError::Rendezvous("listener stopped before a result arrived".to_string())
        })
    }
}

async fn capture(
    State(state): State<CallbackState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, &'static str) {
    if let Some(secret) = &state.secret {
        if !presents_secret(&headers, &body, secret) {
            warn!("Rejected callback {} {} without a valid secret", method, uri.path());
            return (StatusCode::UNAUTHORIZED, "invalid secret");
        }
    }

    let Some(sender) = state.slot.lock().take() else {
        debug!("Ignoring extra callback {} {}", method, uri.path());
        return (StatusCode::CONFLICT, "result already received");
    };

    info!("Received runner callback {} {} ({} bytes)", method, uri.path(), body.len());
    let _ = sender.send(CallbackRequest {
        method: method.to_string(),
        path: uri.path().to_string(),
        body,
    });
    (StatusCode::OK, ACKNOWLEDGEMENT)
}

fn presents_secret(headers: &HeaderMap, body: &[u8], secret: &str) -> bool {
    let in_header = headers
        .get(SECRET_HEADER)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == secret);
    if in_header {
        return true;
    }

    serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|doc| doc.get(SECRET_FIELD).and_then(|v| v.as_str()).map(|v| v == secret))
        .unwrap_or(false)
}
