use std::sync::Arc;

use axum::{Extension, extract::Query, http::StatusCode, response::Html};
use log::warn;

use crate::{server::CallbackState, types::CallbackParams, warning};

pub async fn callback(
    Query(params): Query<CallbackParams>,
    Extension(shared): Extension<Arc<CallbackState>>,
) -> (StatusCode, Html<&'static str>) {
    // forged or stale redirect, keep waiting for the real one
    if params.state.as_deref() != Some(shared.state.as_str()) {
        warn!(
            "ignoring callback with unexpected state {:?}",
            params.state.as_deref().unwrap_or_default()
        );
        return (StatusCode::NOT_FOUND, Html("<h4>Not Found</h4>"));
    }

    // held across the exchange so a duplicate redirect never reaches the token endpoint
    let mut sender = shared.sender.lock().await;
    let Some(tx) = sender.take() else {
        return (StatusCode::GONE, Html("<h4>Login already completed.</h4>"));
    };

    let result = shared
        .authenticator
        .complete_exchange(&shared.state, &params)
        .await;

    let response = match &result {
        Ok(_) => (StatusCode::OK, Html("<h2>Login Completed!</h2><p>Close browser window.</p>")),
        Err(e) => {
            warning!("Token exchange failed: {}", e);
            (StatusCode::FORBIDDEN, Html("Couldn't get token."))
        }
    };

    let _ = tx.send(result);
    response
}
