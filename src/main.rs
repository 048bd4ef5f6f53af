use warden::config::Config;
use warden::server::Server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Config::load()?;
    tracing::info!(
        root = %cfg.resources.root.display(),
        pool_size = cfg.server.pool_size,
        "Starting server"
    );

    let server = Server::bind(&cfg).await?;

    let interrupted = tokio::select! {
        res = server.run() => {
            res?;
            false
        }

        _ = tokio::signal::ctrl_c() => true,
    };

    if interrupted {
        tracing::info!("Shutdown signal received");
        server.shutdown();
    }

    Ok(())
}
