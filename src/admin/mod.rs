//! Admin API for dashboards and operators.
//!
//! ```text
//! GET  /admin/status                 service version and remote count
//! GET  /admin/remotes                status of every remote
//! GET  /admin/remotes/{name}         status of one remote
//! POST /admin/remotes/{name}/check   HEAD the remote through its guard
//! ```

pub mod auth;
pub mod handlers;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::client::registry::GuardRegistry;
use crate::config::AdminConfig;

use self::auth::admin_auth_middleware;
use self::handlers::*;

#[derive(Clone)]
pub struct AdminState {
    pub registry: Arc<GuardRegistry>,
    pub api_key: Arc<str>,
}

#[allow(deprecated)]
pub fn setup_admin_router(registry: Arc<GuardRegistry>, config: &AdminConfig) -> Router {
    let state = AdminState {
        registry,
        api_key: Arc::from(config.api_key.as_str()),
    };

    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/remotes", get(list_remotes))
        .route("/admin/remotes/{name}", get(get_remote))
        .route("/admin/remotes/{name}/check", post(check_remote))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs))),
        )
        .with_state(state)
}
