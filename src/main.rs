use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use barcode_service::barcode::{BarcodeService, CodeGenerator};
use barcode_service::config::{self, Config, LogFormat};
use barcode_service::store::{self, MemoryStore, RedisStore, TtlStore};
use barcode_service::{api, AppState};

mod cli;

/// How often `serve --memory` sweeps expired keys.
const MEMORY_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = config::load()?;
    init_tracing(&cfg)?;

    let args = cli::Cli::parse();

    let result = match args.command {
        Some(cli::Commands::Serve { port, memory }) => {
            let port = port.unwrap_or(cfg.port);
            run_server(cfg, port, memory).await
        }
        Some(cli::Commands::Code { command }) => {
            let store = RedisStore::connect(&cfg.redis_url).await?;
            let service = BarcodeService::new(Arc::new(store), CodeGenerator::new());
            handle_code_command(command, &service).await
        }
        None => {
            let port = cfg.port;
            run_server(cfg, port, false).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

fn init_tracing(cfg: &Config) -> anyhow::Result<()> {
    // Export spans over OTLP only when a collector is configured.
    use opentelemetry::KeyValue;
    use opentelemetry_sdk::{trace as sdktrace, Resource};

    let telemetry_layer = if std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok() {
        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(opentelemetry_otlp::new_exporter().tonic())
            .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
                KeyValue::new("service.name", "barcode-service"),
            ])))
            .install_batch(opentelemetry_sdk::runtime::Tokio)
            .context("failed to install OpenTelemetry tracer")?;
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    let json = cfg.log_format == LogFormat::Json;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "barcode=debug,barcode_service=debug,tower_http=debug".into()),
        ))
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .with(telemetry_layer)
        .init();

    Ok(())
}

async fn run_server(cfg: Config, port: u16, memory: bool) -> anyhow::Result<()> {
    let store: Arc<dyn TtlStore> = if memory {
        if cfg.is_production() {
            anyhow::bail!("--memory is not allowed when BARCODE_ENV=production");
        }
        tracing::warn!("Using in-process store; barcodes are lost on restart");
        let memory_store = MemoryStore::new();
        store::spawn_sweeper(memory_store.clone(), MEMORY_SWEEP_INTERVAL);
        Arc::new(memory_store)
    } else {
        tracing::info!("Connecting to Redis...");
        Arc::new(RedisStore::connect(&cfg.redis_url).await?)
    };

    let state = Arc::new(AppState {
        barcodes: BarcodeService::new(store, CodeGenerator::new()),
    });

    let app = api::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("Barcode service listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn handle_code_command(
    cmd: cli::CodeCommands,
    service: &BarcodeService,
) -> anyhow::Result<()> {
    match cmd {
        cli::CodeCommands::Generate { user_id } => {
            let barcode = service.generate(&user_id).await?;
            println!("{}", serde_json::to_string_pretty(&barcode)?);
        }
        cli::CodeCommands::Get { code } => match service.fetch(&code).await? {
            Some(barcode) => println!("{}", serde_json::to_string_pretty(&barcode)?),
            None => println!("Barcode not found."),
        },
        cli::CodeCommands::Redeem { code } => {
            service.redeem(&code).await?;
            println!("Barcode {} marked as used.", code);
        }
        cli::CodeCommands::Check { code } => {
            let valid = service.is_valid(&code).await?;
            println!("{}", if valid { "valid" } else { "invalid" });
        }
    }
    Ok(())
}
