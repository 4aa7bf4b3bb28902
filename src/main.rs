use clap::Parser;
use doc_converter::config::ConverterConfig;
use doc_converter::services::janitor::Janitor;
use doc_converter::{AppState, create_app};
use dotenvy::dotenv;
use std::net::{IpAddr, SocketAddr};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use validator::Validate;

#[derive(Parser, Debug)]
#[command(author, version, about = "Document conversion HTTP API", long_about = None)]
struct Args {
    /// Address to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 5000)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();

    // Initialize tracing with EnvFilter
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "doc_converter=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Starting Document Converter API...");

    let config = ConverterConfig::from_env();
    config.validate()?;
    config.ensure_dirs()?;
    info!(
        "📁 Staging: {}, Output: {}",
        config.staging_dir.display(),
        config.output_dir.display()
    );
    info!(
        "⚙️  Max Size={}MB, Office={}, Timeout={}s, Retention={}s",
        config.max_file_size / 1024 / 1024,
        config.office_binary,
        config.office_timeout_secs,
        config.retention_secs
    );

    let state = AppState::new(config.clone());

    if state.converters.office.health_check().await {
        info!("✅ Office suite available ({})", config.office_binary);
    } else {
        warn!(
            "⚠️  {} not found - Word to PDF conversion will fail until it is installed",
            config.office_binary
        );
    }

    // Setup Shutdown Channel
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let janitor = Janitor::new(&config, shutdown_rx);
    tokio::spawn(async move {
        janitor.run().await;
    });

    let app = create_app(state);

    let addr = SocketAddr::new(args.host, args.port);
    info!("✅ Server ready at http://{}", addr);
    info!("📖 Swagger UI: http://{}/swagger-ui", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = shutdown_tx.send(true);
        })
        .await?;

    info!("🛑 Server shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, starting graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, starting graceful shutdown...");
        },
    }
}
