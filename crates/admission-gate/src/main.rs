//! Binary entry point: reads CLI flags, loads an optional config-file
//! override, and serves the admission-gated router. Grounded on
//! `examples/axum-resilient-kv-store`'s `#[tokio::main]`/`tracing_subscriber`/
//! `axum::serve` shape.

use clap::Parser;
use tokio::net::TcpListener;

use admission_core::MetricsBus;
use admission_gate::{AdmissionPipeline, Cli, GateConfig, GateConfigFile};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .unwrap_or_else(|err| panic!("failed to read config file {}: {err}", path.display()));
            let file: GateConfigFile = serde_json::from_str(&contents)
                .unwrap_or_else(|err| panic!("failed to parse config file {}: {err}", path.display()));
            file.into_gate_config()
        }
        None => GateConfig::builder().build(),
    };
    config.listen_addr = cli.listen;

    let metrics = MetricsBus::new();
    let listen_addr = config.listen_addr;
    let pipeline = std::sync::Arc::new(AdmissionPipeline::new(config, metrics));
    tokio::spawn(std::sync::Arc::clone(&pipeline).run_rate_limit_janitor());
    let router = admission_gate::build_router(pipeline);

    let listener = TcpListener::bind(listen_addr)
        .await
        .unwrap_or_else(|err| panic!("failed to bind {listen_addr}: {err}"));

    tracing::info!("admission-gate listening on http://{listen_addr}");

    axum::serve(listener, router.into_make_service())
        .await
        .expect("server error");
}
