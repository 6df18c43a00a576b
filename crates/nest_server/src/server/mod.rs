pub(crate) mod endpoint;
pub mod state;
#[cfg(test)]
pub(crate) mod testing;

use axum::Router;
use nest_store::Store;
use tower_http::trace::TraceLayer;

use endpoint::Endpoint;
use state::AppState;

///Builds the full application. Which frame ingestion route exists depends on the configured mode.
pub fn router<S: Store>(state: AppState<S>) -> Router {
    let endpoints = [
        Some(Endpoint::Readings),
        Some(Endpoint::Video),
        Endpoint::ingest(state.ingest),
    ];
    endpoints
        .into_iter()
        .flatten()
        .fold(Router::new(), |router, endpoint| endpoint.apply(router))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
