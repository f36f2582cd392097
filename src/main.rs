//src/main.rs

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use certify::{config::AppState, routes::build_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    let app_state = AppState::new().await?;

    // Faz o app rodar as migrações do SQLx na inicialização
    sqlx::migrate!().run(&app_state.db_pool).await?;
    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    // LISTEN/NOTIFY -> ChangeFeed
    let listener_repo = app_state.shipment_repo.clone();
    tokio::spawn(async move {
        if let Err(e) = listener_repo.run_change_listener().await {
            tracing::error!("🔥 Listener de mudanças encerrado: {}", e);
        }
    });

    let bind_addr = app_state.config.bind_addr.clone();
    let app = build_router(app_state);

    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
