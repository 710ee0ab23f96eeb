use std::{error::Error, process::ExitCode, sync::Arc};

use classify_serve::{
    api::{HealthReport, PredictionBackend},
    cli::ClassifydArgs,
    config::{BackendKind, ServiceConfig},
    mock::MockPredictor,
    predictor::Predictor,
    providers::onnx::{OnnxClassifierConfig, OnnxLoader},
    server::{ServerSettings, router},
    telemetry,
};
use ortho_config::OrthoConfig;
use tracing::{error, info, warn};

fn main() -> Result<ExitCode, Box<dyn Error>> {
    // CLI flags override environment variables, which override the config file.
    let args = ClassifydArgs::load()?;
    let config = args.to_config()?;
    telemetry::init_tracing(&config.log_level);
    info!(backend = %config.backend, environment = ?config.server.environment, "starting classifyd");

    match config.backend {
        BackendKind::Onnx => {
            let loader = OnnxLoader::new(OnnxClassifierConfig::default());
            launch(Predictor::from_config(loader, &config), &config, args.check)
        }
        BackendKind::Mock => launch(MockPredictor::from_config(&config), &config, args.check),
    }
}

fn launch<B: PredictionBackend>(
    backend: B,
    config: &ServiceConfig,
    check: bool,
) -> Result<ExitCode, Box<dyn Error>> {
    if let Err(err) = backend.initialize() {
        error!(error = %err, "backend failed to initialise, serving degraded");
    }

    if check {
        let report = HealthReport::new(
            backend.is_initialized(),
            config.server.service_version.clone(),
        );
        println!("{}", serde_json::to_string(&report)?);
        return Ok(if report.model_loaded {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.server.workers)
        .enable_all()
        .build()?;
    runtime.block_on(serve(Arc::new(backend), config))?;
    Ok(ExitCode::SUCCESS)
}

async fn serve<B: PredictionBackend>(
    backend: Arc<B>,
    config: &ServiceConfig,
) -> Result<(), Box<dyn Error>> {
    let app = router(backend, ServerSettings::from_config(config));
    let listener =
        tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port)).await?;
    info!(address = %listener.local_addr()?, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
