use utoipa::OpenApi;

use super::agent_handler;
use super::audit_handler;
use super::config_handler;
use super::health_handler;
use super::metrics_handler;
use super::policy_handler;
use super::ratelimit_handler;
use super::rotation_handler;
use super::secrets_handler;
use super::subscribe_handler;

/// OpenAPI document for the REST API, served by Swagger UI when enabled.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "steward REST API",
        description = "Configuration & policy control plane: versioned config, \
                       encrypted secrets with rotation, distributed rate limiting, \
                       and deterministic policy evaluation.",
    ),
    paths(
        health_handler::healthz,
        health_handler::readyz,
        metrics_handler::metrics,
        agent_handler::agent_status,
        config_handler::get_config_entry,
        config_handler::put_config_entry,
        config_handler::delete_config_entry,
        config_handler::get_config_history,
        secrets_handler::create_secret,
        secrets_handler::read_secret,
        secrets_handler::secret_metadata,
        secrets_handler::rotate_secret,
        secrets_handler::revoke_secret,
        secrets_handler::list_secrets,
        rotation_handler::list_rotation_policies,
        rotation_handler::get_rotation_policy,
        rotation_handler::create_rotation_policy,
        rotation_handler::delete_rotation_policy,
        ratelimit_handler::check_ratelimit,
        ratelimit_handler::list_ratelimit_rules,
        ratelimit_handler::create_ratelimit_rule,
        ratelimit_handler::delete_ratelimit_rule,
        policy_handler::list_policies,
        policy_handler::get_policy,
        policy_handler::put_policy,
        policy_handler::evaluate_policy,
        subscribe_handler::subscribe,
        audit_handler::list_changes,
        audit_handler::list_secret_access,
    ),
    tags(
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Config", description = "Versioned configuration store"),
        (name = "Secrets", description = "Encrypted secrets vault"),
        (name = "Rotation", description = "Secret rotation scheduling"),
        (name = "Rate Limiting", description = "Admission control"),
        (name = "Policies", description = "Policy evaluation"),
        (name = "Change Propagation", description = "Ordered change streams"),
        (name = "Audit", description = "Audit trails"),
    )
)]
pub struct ApiDoc;
