use crate::cli::ServeArgs;
use crate::infra::{seed_store, AppState, LoggingChannel};
use crate::routes::with_donation_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use chrono::Local;
use donor_engine::config::{AppConfig, AppEnvironment};
use donor_engine::error::AppError;
use donor_engine::telemetry;
use donor_engine::workflows::campaign::{
    AppointmentAnnouncer, CampaignDispatcher, ReminderScheduler,
};
use donor_engine::workflows::donation::{DonationPolicy, DonationService, InMemoryDonationStore};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{info, warn};

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

    let store = Arc::new(InMemoryDonationStore::default());
    if config.environment == AppEnvironment::Development || args.seed {
        let catalog = seed_store(&store, Local::now().date_naive())
            .map_err(|err| AppError::Lifecycle(err.into()))?;
        info!(
            donors = catalog.donors.len(),
            appointments = catalog.appointments.len(),
            "seeded in-memory store"
        );
    }

    let service = Arc::new(DonationService::new(
        store.clone(),
        DonationPolicy::default(),
    ));
    let dispatcher = CampaignDispatcher::new(config.campaign.delivery_timeout());
    let channel = Arc::new(LoggingChannel);
    let announcer = Arc::new(AppointmentAnnouncer::new(
        service.clone(),
        dispatcher,
        channel.clone(),
    ));
    let scheduler = ReminderScheduler::new(
        store,
        dispatcher,
        channel,
        &config.campaign.reminder_leads,
    );

    let (stop_scheduler, scheduler_stopped) = oneshot::channel::<()>();
    let tick = config.campaign.scheduler_tick();
    let scheduler_task = tokio::spawn(async move {
        scheduler
            .run(tick, async move {
                let _ = scheduler_stopped.await;
            })
            .await;
    });

    let app = with_donation_routes(service, announcer)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "donor engine ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = stop_scheduler.send(());
    if let Err(err) = scheduler_task.await {
        warn!(%err, "reminder scheduler task ended abnormally");
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(%err, "unable to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
