use backend::store::TodoStore;
use backend::{app, AppState};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("backend=info")),
        )
        .init();

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:todos.db".to_string());
    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

    let store = TodoStore::connect(&database_url)
        .await
        .expect("failed to open todo database");
    let state = AppState::new(store);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("failed to bind address");
    tracing::info!("listening on http://{bind_addr}");
    tracing::info!("database: {database_url}");
    axum::serve(listener, app(state)).await.unwrap();
}
