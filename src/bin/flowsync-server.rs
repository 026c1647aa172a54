//! Flowsync API server.
//!
//! Wires the orchestrator, event publisher, and webhook relay behind the
//! axum surface. With `DATABASE_URL` set, executions and the webhook queue
//! are Postgres-backed; otherwise everything runs on in-memory stores
//! (useful for local development, nothing survives a restart).

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use flowsync_core::config::FlowsyncConfig;
use flowsync_core::events::EventPublisher;
use flowsync_core::logging::init_structured_logging;
use flowsync_core::orchestration::WorkflowOrchestrator;
use flowsync_core::persistence::{
    ExecutionStore, MemoryExecutionStore, MemoryWorkflowStore, PostgresExecutionStore,
    PostgresWorkflowStore, WorkflowStore,
};
use flowsync_core::sources::{ProcessOutcome, SourceCallError, SourceFetcher, SourceKind};
use flowsync_core::web::{create_router, AppState};
use flowsync_core::webhook::{
    HandlerError, MemoryQueueBackend, PostgresQueueBackend, QueueBackend, WebhookHandler,
    WebhookRelay,
};
use flowsync_core::models::WebhookQueueItem;

/// Placeholder source connector. Real ads/POS connectors implement
/// [`SourceFetcher`] against the vendor APIs and are registered here.
struct NullFetcher(SourceKind);

#[async_trait]
impl SourceFetcher for NullFetcher {
    fn kind(&self) -> SourceKind {
        self.0
    }

    async fn fetch(&self, day: chrono::NaiveDate) -> Result<Vec<Value>, SourceCallError> {
        warn!(source = %self.0, %day, "no connector registered, returning no records");
        Ok(Vec::new())
    }

    async fn process(
        &self,
        _day: chrono::NaiveDate,
        records: Vec<Value>,
    ) -> Result<ProcessOutcome, SourceCallError> {
        Ok(ProcessOutcome {
            count: records.len() as u64,
        })
    }
}

/// Default webhook handler: logs and acknowledges. Deployments plug their
/// own [`WebhookHandler`] in before going live.
struct LoggingWebhookHandler;

#[async_trait]
impl WebhookHandler for LoggingWebhookHandler {
    async fn handle(&self, item: &WebhookQueueItem) -> Result<(), HandlerError> {
        info!(item_id = %item.id, tenant_id = %item.tenant_id, "webhook received");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_structured_logging();

    let config = FlowsyncConfig::from_env().context("loading configuration")?;

    let (workflows, executions, queue_backend): (
        Arc<dyn WorkflowStore>,
        Arc<dyn ExecutionStore>,
        Arc<dyn QueueBackend>,
    ) = match &config.database_url {
        Some(url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(10)
                .connect(url)
                .await
                .context("connecting to postgres")?;
            flowsync_core::persistence::postgres::ensure_schema(&pool)
                .await
                .context("creating execution tables")?;
            let queue = PostgresQueueBackend::new(pool.clone());
            queue
                .ensure_schema()
                .await
                .context("creating webhook queue table")?;
            info!("using postgres-backed stores");
            (
                Arc::new(PostgresWorkflowStore::new(pool.clone())),
                Arc::new(PostgresExecutionStore::new(pool)),
                Arc::new(queue),
            )
        }
        None => {
            warn!("DATABASE_URL not set, using in-memory stores");
            (
                Arc::new(MemoryWorkflowStore::new()),
                Arc::new(MemoryExecutionStore::new()),
                Arc::new(MemoryQueueBackend::new()),
            )
        }
    };

    let publisher = EventPublisher::new(config.event_channel_capacity);
    let orchestrator = Arc::new(WorkflowOrchestrator::new(
        workflows,
        executions,
        publisher,
        Arc::new(NullFetcher(SourceKind::Ads)),
        Arc::new(NullFetcher(SourceKind::Pos)),
        config.clone(),
    ));

    let relay = Arc::new(WebhookRelay::new(
        queue_backend,
        Arc::new(LoggingWebhookHandler),
        config.relay.clone(),
    )?);

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let worker_relay = relay.clone();
    let worker = tokio::spawn(async move {
        worker_relay.run_worker(shutdown_rx).await;
    });

    let state = AppState::new(orchestrator, relay);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("binding {}", config.bind_address))?;
    info!(bind_address = %config.bind_address, "flowsync server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await
        .context("serving")?;

    let _ = shutdown_tx.send(true);
    let _ = worker.await;
    Ok(())
}
