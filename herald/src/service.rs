//! Service lifecycle: wiring, readiness, graceful shutdown.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use herald_common::audit::{SharedAuditSink, TracingAuditSink};
use herald_common::{Signal, internal, logging};
use herald_dispatch::{
    DeadLetterQueue, EmailHandlerService, HandlerEnv, MemoryQueue, NotificationQueue,
    SmsHandlerService,
};
use herald_health::{HealthChecker, HealthServer};
use herald_provider::{EmailTransport, SmsTransport};
use herald_status::{MemoryStatusStore, StatusStore};
use herald_subscriber::{MemorySubscriberStore, SubscriberStore};
use tokio::sync::broadcast;

use crate::config::HeraldConfig;
use crate::dispatcher::Dispatcher;

/// Broadcast used to fan the shutdown signal out to every component.
pub static SHUTDOWN_BROADCAST: LazyLock<broadcast::Sender<Signal>> = LazyLock::new(|| {
    let (sender, _receiver) = broadcast::channel(64);
    sender
});

async fn shutdown() -> anyhow::Result<()> {
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            internal!("CTRL+C entered -- Enter it again to force shutdown");
        }
        _ = terminate.recv() => {
            internal!("Terminate Signal received, shutting down");
        }
    }

    SHUTDOWN_BROADCAST
        .send(Signal::Shutdown)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Interrupted, e.to_string()))?;

    Ok(())
}

/// The assembled herald service.
pub struct Herald {
    config: HeraldConfig,
}

impl Herald {
    #[must_use]
    pub const fn new(config: HeraldConfig) -> Self {
        Self { config }
    }

    /// Run the service until a shutdown signal arrives.
    ///
    /// Wire transports are injected so deployments pick their provider
    /// bindings and tests run against the in-memory ones.
    ///
    /// # Errors
    ///
    /// Configuration and startup failures abort the run; runtime component
    /// errors are logged and surface through the readiness probe.
    pub async fn run(
        self,
        email_transport: Arc<dyn EmailTransport>,
        sms_transport: Arc<dyn SmsTransport>,
    ) -> anyhow::Result<()> {
        logging::init();
        self.config.validate()?;

        internal!("Herald starting");

        let audit: SharedAuditSink = Arc::new(TracingAuditSink::new(self.config.audit.clone()));
        let subscribers: Arc<dyn SubscriberStore> = Arc::new(
            MemorySubscriberStore::new()
                .with_audit(Arc::clone(&audit), self.config.environment.clone()),
        );
        let status_store: Arc<dyn StatusStore> = Arc::new(MemoryStatusStore::new());
        let dead_letters = Arc::new(DeadLetterQueue::new());
        let queue: Arc<dyn NotificationQueue> = Arc::new(MemoryQueue::new());

        let env = HandlerEnv {
            status_store: Arc::clone(&status_store),
            dead_letters: Arc::clone(&dead_letters),
            audit: Some(Arc::clone(&audit)),
            environment: self.config.environment.clone(),
        };

        let email = Arc::new(
            EmailHandlerService::start(
                self.config.email.channel.clone(),
                self.config.email.provider.clone(),
                email_transport,
                Arc::clone(&queue),
                env.clone(),
            )
            .await?,
        );
        let sms = Arc::new(
            SmsHandlerService::start(
                self.config.sms.channel.clone(),
                self.config.sms.provider.clone(),
                sms_transport,
                Arc::clone(&queue),
                env,
            )
            .await?,
        );

        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&subscribers),
            Arc::clone(&queue),
            self.config.email.channel.queue_name.clone(),
            self.config.sms.channel.queue_name.clone(),
            self.config.environment.clone(),
        ));

        let checker = Arc::new(HealthChecker::new(self.config.health.max_queue_size));
        tokio::spawn(readiness_loop(
            Arc::clone(&checker),
            Arc::clone(&subscribers),
            Arc::clone(&status_store),
            Arc::clone(&email),
            Arc::clone(&sms),
            self.config.health.probe_interval(),
            SHUTDOWN_BROADCAST.subscribe(),
        ));

        let flush_interval = Duration::from_secs(self.config.flush_interval_secs);

        let ret = if self.config.health.enabled {
            let health_server =
                HealthServer::new(self.config.health.clone(), Arc::clone(&checker)).await?;
            tokio::select! {
                r = Arc::clone(&dispatcher).serve(SHUTDOWN_BROADCAST.subscribe(), flush_interval) => {
                    r.map_err(anyhow::Error::from)
                }
                r = health_server.serve(SHUTDOWN_BROADCAST.subscribe()) => {
                    r.map_err(anyhow::Error::from)
                }
                r = shutdown() => r,
            }
        } else {
            tokio::select! {
                r = Arc::clone(&dispatcher).serve(SHUTDOWN_BROADCAST.subscribe(), flush_interval) => {
                    r.map_err(anyhow::Error::from)
                }
                r = shutdown() => r,
            }
        };

        internal!("Shutting down...");

        email.stop().await?;
        sms.stop().await?;

        internal!("Herald stopped");
        ret
    }
}

/// Periodically refresh the readiness flags from component probes.
async fn readiness_loop(
    checker: Arc<HealthChecker>,
    subscribers: Arc<dyn SubscriberStore>,
    status_store: Arc<dyn StatusStore>,
    email: Arc<EmailHandlerService>,
    sms: Arc<SmsHandlerService>,
    probe_interval: Duration,
    mut shutdown: broadcast::Receiver<Signal>,
) {
    let mut timer = tokio::time::interval(probe_interval);

    loop {
        tokio::select! {
            _ = timer.tick() => {
                checker.set_subscribers_ready(subscribers.health_check().await.is_ok());
                checker.set_status_store_ready(status_store.health_check().await.is_ok());

                let email_health = email.health().await;
                checker.set_email_ready(email_health.is_healthy());

                let sms_health = sms.health().await;
                checker.set_sms_ready(sms_health.is_healthy());
            }
            sig = shutdown.recv() => {
                match sig {
                    Ok(Signal::Shutdown | Signal::Finalised) | Err(_) => break,
                }
            }
        }
    }
}
