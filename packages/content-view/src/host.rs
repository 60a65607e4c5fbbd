//! Process-level wiring
//!
//! The host owns the report service and the change subscriber. The entry
//! point calls `start` once at startup and `shutdown` before exit.

use std::sync::Arc;

use content_store::{ContentRepository, ListenerInfo};
use tracing::{info, warn};

use crate::config::ViewConfig;
use crate::error::Result;
use crate::service::ReportService;
use crate::subscriber::{ChangeSubscriber, SubscriberState};

pub struct ContentViewHost {
    config: ViewConfig,
    service: Arc<ReportService>,
    subscriber: ChangeSubscriber,
}

impl ContentViewHost {
    pub fn new(repository: Arc<dyn ContentRepository>, config: ViewConfig) -> Self {
        let service = Arc::new(ReportService::new(repository.clone(), &config));
        let subscriber = ChangeSubscriber::new(repository, config.credentials.credentials());
        Self {
            config,
            service,
            subscriber,
        }
    }

    /// Subscribe to changes under the configured root
    pub fn start(&self) -> Result<()> {
        let subscription = &self.config.subscription;
        self.subscriber.subscribe(
            &subscription.root_path,
            subscription.event_types,
            subscription.deep,
            subscription.no_local,
        )?;
        info!(root_path = %subscription.root_path, "Content view host started");
        Ok(())
    }

    pub fn shutdown(&self) {
        if self.subscriber.state() != SubscriberState::Subscribed {
            warn!(state = %self.subscriber.state(), "Shutting down without an active subscription");
        }
        self.subscriber.unsubscribe();
        info!("Content view host stopped");
    }

    pub fn service(&self) -> Arc<ReportService> {
        Arc::clone(&self.service)
    }

    pub fn subscriber(&self) -> &ChangeSubscriber {
        &self.subscriber
    }

    pub fn list_active_subscriptions(&self) -> Result<Vec<ListenerInfo>> {
        self.subscriber.list_active_subscriptions()
    }
}
