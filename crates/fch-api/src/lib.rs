pub mod handlers;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

pub use handlers::ApiState;

pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::query::handle_query))
        .route("/routers.json", get(handlers::routers::handle_routers))
        .route("/routerlist.json", get(handlers::routers::handle_router_list))
        .route("/robots.txt", get(handlers::routers::handle_robots))
        .with_state(state)
        .layer(cors)
}

pub async fn serve(state: ApiState, listen: &str, port: u16) -> anyhow::Result<()> {
    let listener = TcpListener::bind((listen, port)).await?;
    tracing::info!(listen, port, "API listening");
    serve_on(listener, state).await
}

/// Serve on an already bound listener.
pub async fn serve_on(listener: TcpListener, state: ApiState) -> anyhow::Result<()> {
    axum::serve(listener, router(state)).await?;
    Ok(())
}
