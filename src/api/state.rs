use std::sync::Arc;

use crate::config::Config;
use crate::observability::Metrics;
use crate::pipeline::{ClientHub, ClientRateLimiter, ContentCache, JobBroker};
use crate::profiles::ProfileRegistry;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub profiles: Arc<ProfileRegistry>,
    pub cache: Arc<ContentCache>,
    pub limiter: Arc<ClientRateLimiter>,
    pub hub: Arc<ClientHub>,
    pub broker: Arc<JobBroker>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<Config>,
        profiles: Arc<ProfileRegistry>,
        cache: Arc<ContentCache>,
        limiter: Arc<ClientRateLimiter>,
        hub: Arc<ClientHub>,
        broker: Arc<JobBroker>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            config,
            profiles,
            cache,
            limiter,
            hub,
            broker,
            metrics,
        }
    }
}
