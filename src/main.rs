//! Server entry point: wire configuration, database, routes, and middleware.

use std::sync::Arc;

use axum::middleware;
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use weblog::models::{Blog, Comment, User};
use weblog::orm::Catalog;
use weblog::web::PlainTemplates;
use weblog::{into_router, log_requests, route_table, session_middleware, AppState, Config, Db, Store};

const MAX_BODY_BYTES: usize = 1024 * 1024;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("weblog=info")),
        )
        .init();

    let config = Config::from_env();
    let db = Db::connect(&config.db).await?;
    let catalog = Catalog::builder()
        .entity::<User>()?
        .entity::<Blog>()?
        .entity::<Comment>()?
        .finish();
    let store = Store::new(db, Arc::new(catalog));
    store.create_all_tables().await?;

    let state = AppState {
        store,
        session_secret: config.session_secret.clone(),
    };
    let table = route_table()?;
    let app = into_router(table, state.clone(), Arc::new(PlainTemplates))
        .nest_service("/static", ServeDir::new(&config.static_dir))
        .layer(middleware::from_fn_with_state(state, session_middleware))
        .layer(middleware::from_fn(log_requests))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES));

    let listener = TcpListener::bind(config.listen).await?;
    tracing::info!("server started at http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
