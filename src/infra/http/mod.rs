mod content;
mod handler;
mod middleware;

pub use content::{X_CACHE_STATUS, serve_content};
pub use middleware::{RequestContext, X_REQUEST_ID};

use std::time::Duration;

use axum::{
    Router, middleware as axum_middleware,
    routing::{any, get},
};

use crate::application::orchestrator::CacheAsideService;

use handler::{RouteState, health, serve_object};
use middleware::{log_responses, set_request_context};

pub const HEALTH_PATH: &str = "/_health";
const ROOT_MOUNT: &str = "/";

/// Build the public router: one cache-aside service per mount, `/` as the fallback.
pub fn build_router(services: Vec<CacheAsideService>, request_timeout: Duration) -> Router {
    let mut router = Router::new().route(HEALTH_PATH, get(health));

    for service in services {
        let mount = service.route().mount.clone();
        let state = RouteState {
            service,
            request_timeout,
        };

        let mounted = if mount == ROOT_MOUNT {
            Router::new().fallback(serve_object).with_state(state)
        } else {
            Router::new()
                .route(&mount, any(serve_object))
                .route(&format!("{mount}/"), any(serve_object))
                .route(&format!("{mount}/{{*path}}"), any(serve_object))
                .with_state(state)
        };
        router = router.merge(mounted);
    }

    router
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
