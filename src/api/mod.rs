pub mod handlers;
pub mod middleware;
pub mod state;

use axum::{
    routing::{get, post},
    Router,
};

use state::AppState;

/// JSON endpoints, mounted under `/api`.
pub fn create_api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/token", post(handlers::tokens::obtain))
        .route("/token/refresh", post(handlers::tokens::refresh))
        .route("/validate-iban", get(handlers::iban::validate))
        .nest("/refunds", refund_routes(state))
}

fn refund_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::refunds::list).post(handlers::refunds::create))
        .route(
            "/:id",
            get(handlers::refunds::get)
                .put(handlers::refunds::replace)
                .patch(handlers::refunds::patch)
                .delete(handlers::refunds::delete),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth::require_api_auth,
        ))
}
