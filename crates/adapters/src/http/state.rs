use std::sync::Arc;
use std::time::Instant;

use application::audit_service_impl::AuditAppService;
use application::config_service_impl::ConfigAppService;
use application::policy_service_impl::PolicyAppService;
use application::propagator::ChangePropagator;
use application::ratelimit_service_impl::RateLimitAppService;
use application::rotation_service_impl::RotationAppService;
use application::secrets_service_impl::SecretsAppService;
use infrastructure::metrics::AgentMetrics;
use ports::secondary::auth_provider::AuthProvider;
use tokio::sync::RwLock;

/// Shared application state for the REST API server.
///
/// Passed to Axum handlers via `State(Arc<AppState>)`.
pub struct AppState {
    pub metrics: Arc<AgentMetrics>,
    pub start_time: Instant,
    pub version: &'static str,
    pub config_service: Arc<RwLock<ConfigAppService>>,
    pub secrets_service: Arc<RwLock<SecretsAppService>>,
    pub rotation_service: Arc<RwLock<RotationAppService>>,
    pub ratelimit_service: Arc<RwLock<RateLimitAppService>>,
    pub policy_service: Arc<RwLock<PolicyAppService>>,
    pub audit_service: Arc<AuditAppService>,
    pub propagator: ChangePropagator,
    pub auth_provider: Option<Arc<dyn AuthProvider>>,
    pub metrics_auth_required: bool,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        metrics: Arc<AgentMetrics>,
        config_service: Arc<RwLock<ConfigAppService>>,
        secrets_service: Arc<RwLock<SecretsAppService>>,
        rotation_service: Arc<RwLock<RotationAppService>>,
        ratelimit_service: Arc<RwLock<RateLimitAppService>>,
        policy_service: Arc<RwLock<PolicyAppService>>,
        audit_service: Arc<AuditAppService>,
        propagator: ChangePropagator,
    ) -> Self {
        Self {
            metrics,
            start_time: Instant::now(),
            version: env!("CARGO_PKG_VERSION"),
            config_service,
            secrets_service,
            rotation_service,
            ratelimit_service,
            policy_service,
            audit_service,
            propagator,
            auth_provider: None,
            metrics_auth_required: false,
        }
    }

    /// Attach a JWT auth provider and configure metrics auth.
    #[must_use]
    pub fn with_auth_provider(
        mut self,
        provider: Arc<dyn AuthProvider>,
        metrics_auth_required: bool,
    ) -> Self {
        self.auth_provider = Some(provider);
        self.metrics_auth_required = metrics_auth_required;
        self
    }
}
