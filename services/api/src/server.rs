use crate::cli::ServeArgs;
use crate::infra::{default_collaborators, AppState, InMemoryCalendar, InMemoryRunRepository};
use crate::routes::with_recruitment_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use talent_flow::config::AppConfig;
use talent_flow::error::AppError;
use talent_flow::telemetry;
use talent_flow::workflows::recruitment::WorkflowOrchestrator;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let repository = Arc::new(InMemoryRunRepository::default());
    let calendar = Arc::new(InMemoryCalendar::default());
    let orchestrator = Arc::new(WorkflowOrchestrator::new(
        repository,
        default_collaborators(calendar),
        config.workflow.clone(),
    ));

    let app = with_recruitment_routes(orchestrator)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "recruitment workflow orchestrator ready");

    axum::serve(listener, app).await?;
    Ok(())
}
