use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use adapters::auth::jwt_provider::JwtAuthProvider;
use adapters::coordination::memory_lease_store::MemoryLeaseStore;
use adapters::counter::memory_counter_store::MemoryCounterStore;
use adapters::crypto::envelope_cipher::EnvelopeCipher;
use adapters::crypto::local_key_provider::LocalKeyProvider;
use adapters::http::server::run_http_server;
use adapters::http::state::AppState;
use adapters::storage::redb_access_log_store::RedbAccessLogStore;
use adapters::storage::redb_change_log_store::RedbChangeLogStore;
use adapters::storage::redb_config_store::RedbConfigStore;
use adapters::storage::redb_policy_store::RedbPolicyStore;
use adapters::storage::redb_secret_store::RedbSecretStore;
use application::audit_service_impl::AuditAppService;
use application::config_service_impl::ConfigAppService;
use application::policy_service_impl::PolicyAppService;
use application::propagator::{ChangePropagator, PropagatorConfig};
use application::ratelimit_service_impl::RateLimitAppService;
use application::retry::RetryConfig;
use application::rotation_service_impl::RotationAppService;
use application::secrets_service_impl::SecretsAppService;
use domain::config::engine::ConfigEngine;
use domain::policy::engine::PolicyEngine;
use domain::ratelimit::engine::RateLimitEngine;
use domain::rotation::engine::RotationEngine;
use domain::secrets::engine::VaultEngine;
use infrastructure::config::StewardConfig;
use infrastructure::constants::GRACEFUL_SHUTDOWN_TIMEOUT;
use infrastructure::logging::init_logging;
use infrastructure::metrics::AgentMetrics;
use ports::secondary::access_log_store::AccessLogStore;
use ports::secondary::auth_provider::AuthProvider;
use ports::secondary::change_log_store::ChangeLogStore;
use ports::secondary::config_entry_store::ConfigEntryStore;
use ports::secondary::counter_store::CounterStore;
use ports::secondary::key_provider::KeyProvider;
use ports::secondary::lease_store::LeaseStore;
use ports::secondary::metrics_port::MetricsPort;
use ports::secondary::policy_store::PolicyStore;
use ports::secondary::secret_cipher::SecretCipher;
use ports::secondary::secret_store::SecretStore;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::cli::Cli;
use crate::rotation_loop::run_rotation_loop;
use crate::shutdown::create_shutdown_token;

/// Run the daemon startup sequence and block until shutdown.
#[allow(clippy::too_many_lines)] // startup is inherently sequential and long
pub async fn run(cli: &Cli) -> anyhow::Result<()> {
    // ── 1. Load config ──────────────────────────────────────────────
    let config = StewardConfig::load(Path::new(&cli.config))?;

    // ── 2. Initialize logging ───────────────────────────────────────
    // CLI flags take precedence over config file
    let log_level = cli.log_level.map_or(config.agent.log_level, Into::into);
    let log_format = cli.log_format.map_or(config.agent.log_format, Into::into);
    init_logging(log_level, log_format)?;

    // Service root span — fields appear in every subsequent log entry
    let _root_span = tracing::span!(
        tracing::Level::INFO,
        "service",
        service.name = "steward",
        service.version = env!("CARGO_PKG_VERSION"),
    )
    .entered();

    info!(
        config_path = %cli.config,
        log_level = log_level.as_str(),
        instance = %config.agent.name,
        "steward control plane starting"
    );

    let metrics = Arc::new(AgentMetrics::new());
    let metrics_port: Arc<dyn MetricsPort> = Arc::clone(&metrics) as Arc<dyn MetricsPort>;
    let shutdown = create_shutdown_token();

    // ── 3. Open persistent stores ───────────────────────────────────
    let data_dir = Path::new(&config.agent.data_dir);
    std::fs::create_dir_all(data_dir)?;

    let config_store: Arc<dyn ConfigEntryStore> =
        Arc::new(RedbConfigStore::open(&data_dir.join("config.redb"))?);
    let secret_store: Arc<dyn SecretStore> =
        Arc::new(RedbSecretStore::open(&data_dir.join("secrets.redb"))?);
    let access_log: Arc<dyn AccessLogStore> = Arc::new(RedbAccessLogStore::open(
        &data_dir.join("secret_access.redb"),
        config.secrets.access_log_max_entries,
    )?);
    let policy_store: Arc<dyn PolicyStore> =
        Arc::new(RedbPolicyStore::open(&data_dir.join("policies.redb"))?);
    let change_log: Arc<dyn ChangeLogStore> = Arc::new(RedbChangeLogStore::open(
        &data_dir.join("change_log.redb"),
        config.audit.max_entries,
    )?);
    info!(data_dir = %data_dir.display(), "persistent stores opened");

    // ── 4. Change propagator ────────────────────────────────────────
    let propagator = ChangePropagator::new(
        PropagatorConfig {
            queue_capacity: config.propagation.queue_capacity,
            replay_capacity: config.propagation.replay_capacity,
            subscriber_buffer: config.propagation.subscriber_buffer,
            retry: RetryConfig::default(),
        },
        Arc::clone(&metrics_port),
        shutdown.clone(),
    );

    // ── 5. Config store service ─────────────────────────────────────
    let mut config_service = ConfigAppService::new(ConfigEngine::new(), Arc::clone(&metrics_port))
        .with_store(Arc::clone(&config_store))
        .with_propagator(propagator.clone());
    config_service.hydrate()?;
    info!(entries = config_service.entry_count(), "config store hydrated");

    // ── 6. Secrets vault ────────────────────────────────────────────
    let key_provider: Arc<dyn KeyProvider> = Arc::new(LocalKeyProvider::open(Path::new(
        &config.secrets.master_key_path,
    ))?);
    info!(key_id = %key_provider.key_id(), "master key loaded");
    let cipher: Arc<dyn SecretCipher> = Arc::new(EnvelopeCipher::new(key_provider));

    let mut secrets_service = SecretsAppService::new(
        VaultEngine::new(),
        cipher,
        Arc::clone(&access_log),
        Arc::clone(&metrics_port),
    )
    .with_store(Arc::clone(&secret_store))
    .with_propagator(propagator.clone())
    .with_read_timeout(Duration::from_secs(config.secrets.read_timeout_secs));
    secrets_service.hydrate()?;
    info!(secrets = secrets_service.secret_count(), "secrets vault hydrated");

    // ── 7. Rotation scheduler service ───────────────────────────────
    let mut rotation_service =
        RotationAppService::new(RotationEngine::new(), Arc::clone(&metrics_port))
            .with_store(Arc::clone(&secret_store));
    rotation_service.hydrate()?;
    for policy_config in &config.rotation.policies {
        let policy = policy_config.to_domain();
        match rotation_service.add_policy(policy) {
            Ok(()) => info!(secret = %policy_config.secret_name, "rotation policy seeded from config"),
            // Already hydrated from the store; config is not authoritative.
            Err(domain::common::error::DomainError::DuplicateEntry(_)) => {}
            Err(e) => warn!(secret = %policy_config.secret_name, error = %e, "failed to seed rotation policy"),
        }
    }

    // ── 8. Rate limiter ─────────────────────────────────────────────
    let counter_store: Arc<dyn CounterStore> = Arc::new(MemoryCounterStore::new());
    let mut ratelimit_service = RateLimitAppService::new(
        RateLimitEngine::new(),
        counter_store,
        Arc::clone(&metrics_port),
    );
    ratelimit_service.set_enabled(config.ratelimit.enabled);
    let seeded_rules: Vec<_> = config.ratelimit.rules.iter().map(|r| r.to_domain()).collect();
    if !seeded_rules.is_empty() {
        ratelimit_service.reload_rules(seeded_rules)?;
        info!(rules = ratelimit_service.rule_count(), "rate limit rules seeded from config");
    }

    // ── 9. Policy engine ────────────────────────────────────────────
    let mut policy_service = PolicyAppService::new(PolicyEngine::new(), Arc::clone(&metrics_port))
        .with_store(Arc::clone(&policy_store))
        .with_propagator(propagator.clone());
    policy_service.hydrate()?;
    info!(policies = policy_service.policy_count(), "policy engine hydrated");

    // ── 10. Audit trail ─────────────────────────────────────────────
    let audit_service = Arc::new(AuditAppService::new(change_log));

    // ── 11. Wrap services for shared access ─────────────────────────
    let config_service = Arc::new(RwLock::new(config_service));
    let secrets_service = Arc::new(RwLock::new(secrets_service));
    let rotation_service = Arc::new(RwLock::new(rotation_service));
    let ratelimit_service = Arc::new(RwLock::new(ratelimit_service));
    let policy_service = Arc::new(RwLock::new(policy_service));

    // ── 12. Rotation scheduler loop ─────────────────────────────────
    let lease_store: Arc<dyn LeaseStore> = Arc::new(MemoryLeaseStore::new());
    let rotation_handle = if config.rotation.enabled {
        Some(tokio::spawn(run_rotation_loop(
            Arc::clone(&secrets_service),
            Arc::clone(&rotation_service),
            lease_store,
            config.agent.name.clone(),
            Duration::from_secs(config.rotation.tick_secs),
            shutdown.clone(),
        )))
    } else {
        info!("rotation scheduler disabled by config");
        None
    };

    // ── 13. Audit retention sweep ───────────────────────────────────
    if config.audit.enabled {
        let audit = Arc::clone(&audit_service);
        let access_log_sweep = Arc::clone(&access_log);
        let retention_ms = u64::from(config.audit.retention_days) * 86_400_000;
        let sweep_shutdown = shutdown.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(3600));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    () = sweep_shutdown.cancelled() => break,
                }
                let cutoff = application::clock::now_ms().saturating_sub(retention_ms);
                match audit.cleanup_expired(cutoff) {
                    Ok(removed) if removed > 0 => {
                        info!(removed, "expired change records swept");
                    }
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "change record sweep failed"),
                }
                match access_log_sweep.cleanup_expired(cutoff) {
                    Ok(removed) if removed > 0 => {
                        info!(removed, "expired access records swept");
                    }
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "access record sweep failed"),
                }
            }
        });
    }

    // ── 14. HTTP API ────────────────────────────────────────────────
    let mut state = AppState::new(
        Arc::clone(&metrics),
        config_service,
        secrets_service,
        rotation_service,
        ratelimit_service,
        policy_service,
        audit_service,
        propagator,
    );
    if config.auth.enabled {
        let provider: Arc<dyn AuthProvider> = Arc::new(JwtAuthProvider::new(
            config.auth.jwt_secret.as_bytes(),
            config.auth.issuer.as_deref(),
        ));
        state = state.with_auth_provider(provider, config.auth.metrics_auth_required);
        info!("API authentication enabled");
    }

    let http_shutdown = shutdown.clone();
    run_http_server(
        Arc::new(state),
        "0.0.0.0",
        config.agent.http_port,
        config.agent.swagger_ui,
        async move { http_shutdown.cancelled().await },
    )
    .await?;

    // ── 15. Drain background tasks ──────────────────────────────────
    info!("HTTP server stopped, draining background tasks");
    if let Some(handle) = rotation_handle {
        if tokio::time::timeout(GRACEFUL_SHUTDOWN_TIMEOUT, handle)
            .await
            .is_err()
        {
            warn!("rotation loop did not stop within the shutdown timeout");
        }
    }

    info!("steward control plane stopped");
    Ok(())
}
