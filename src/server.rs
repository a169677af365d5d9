use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{Extension, Router, routing::get};
use log::debug;
use tokio::{
    sync::{Mutex, oneshot},
    task::JoinHandle,
};

use crate::{api, error::AuthError, spotify::auth::Authenticator, types::Token};

/// State shared with the `/callback` handler.
pub struct CallbackState {
    pub authenticator: Authenticator,
    pub state: String,
    /// Single-fire handoff to the waiting flow; taken by the first callback
    /// that produces a result.
    pub sender: Mutex<Option<oneshot::Sender<Result<Token, AuthError>>>>,
}

pub fn router(state: Arc<CallbackState>) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/callback", get(api::callback).layer(Extension(state)))
}

/// A local listener that receives exactly one OAuth redirect.
///
/// Dropping the server without calling [`CallbackServer::wait_for_token`]
/// aborts the listener task.
pub struct CallbackServer {
    local_addr: SocketAddr,
    receiver: oneshot::Receiver<Result<Token, AuthError>>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<std::io::Result<()>>>,
}

impl CallbackServer {
    pub async fn start(
        addr: SocketAddr,
        authenticator: Authenticator,
        state: String,
    ) -> Result<Self, AuthError> {
        let (sender, receiver) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let shared = Arc::new(CallbackState {
            authenticator,
            state,
            sender: Mutex::new(Some(sender)),
        });

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| AuthError::Server(format!("cannot bind {}: {}", addr, e)))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| AuthError::Server(e.to_string()))?;
        debug!("callback listener on {}", local_addr);

        let app = router(shared);
        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        Ok(Self {
            local_addr,
            receiver,
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Waits for the callback result, then shuts the listener down whatever
    /// the outcome.
    pub async fn wait_for_token(mut self, timeout: Duration) -> Result<Token, AuthError> {
        let outcome = match tokio::time::timeout(timeout, &mut self.receiver).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(AuthError::Server("callback handler went away".to_string())),
            Err(_) => Err(AuthError::Timeout(timeout)),
        };

        self.shutdown().await;
        outcome
    }

    async fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            match handle.await {
                Ok(Ok(())) => debug!("callback listener stopped"),
                Ok(Err(e)) => debug!("callback listener stopped with error: {}", e),
                Err(e) => debug!("callback listener task failed: {}", e),
            }
        }
    }
}

impl Drop for CallbackServer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
