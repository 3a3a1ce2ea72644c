use crate::cli::ServeArgs;
use crate::infra::{spawn_event_dispatcher, AppState, ApplicationStore, ChannelEventPublisher};
use crate::routes::with_application_routes;
use authors::applications::AuthorApplicationService;
use authors::config::AppConfig;
use authors::error::AppError;
use authors::telemetry;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
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

    let repository = Arc::new(ApplicationStore::open(&config.storage)?);
    let (publisher, receiver) = ChannelEventPublisher::new(config.events.buffer);
    let dispatcher = spawn_event_dispatcher(receiver, config.events.topic.clone());
    let application_service = Arc::new(AuthorApplicationService::with_policy(
        repository,
        Arc::new(publisher),
        config.workflow,
    ));

    let app = with_application_routes(application_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        topic = %config.events.topic,
        policy = ?config.workflow,
        "author application service ready"
    );

    axum::serve(listener, app).await?;

    dispatcher.abort();
    Ok(())
}
