use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Extension;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use domain::audit::entity::{ChangeActor, ChangeOp};
use domain::auth::entity::JwtClaims;
use domain::common::entity::{EntityKind, RuleId};
use domain::policy::entity::{
    Effect, EvalContext, Policy, PolicyId, PolicyRule, Predicate,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::error::{ApiError, ErrorBody};
use super::middleware::rbac::require_write_access;
use super::state::AppState;
use super::validation::{MAX_ID_LENGTH, validate_string_length};

// ── Request / Response DTOs ─────────────────────────────────────────

#[derive(Deserialize, ToSchema)]
pub struct PutPolicyRequest {
    pub rules: Vec<PolicyRuleRequest>,
}

#[derive(Deserialize, ToSchema)]
pub struct PolicyRuleRequest {
    pub id: String,
    pub priority: u32,
    /// `allow` or `deny`.
    pub effect: String,
    /// Structural predicate, tagged by `type`.
    #[schema(value_type = Object)]
    pub predicate: Predicate,
}

#[derive(Deserialize, ToSchema)]
pub struct EvaluateRequest {
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Minutes since UTC midnight; defaults to the server clock.
    #[serde(default)]
    pub minute_of_day: Option<u16>,
    /// Pin a specific policy version; defaults to the latest.
    #[serde(default)]
    pub version: Option<u64>,
}

#[derive(Serialize, ToSchema)]
pub struct EvaluateResponse {
    pub decision: String,
    pub matched_rule_id: Option<String>,
    pub policy_version: u64,
    pub trace: Vec<TraceStepResponse>,
}

#[derive(Serialize, ToSchema)]
pub struct TraceStepResponse {
    pub rule_id: String,
    pub matched: bool,
}

#[derive(Serialize, ToSchema)]
pub struct PolicyResponse {
    pub id: String,
    pub version: u64,
    pub rules: Vec<PolicyRuleResponse>,
    pub created_at_ms: u64,
}

#[derive(Serialize, ToSchema)]
pub struct PolicyRuleResponse {
    pub id: String,
    pub priority: u32,
    pub effect: String,
    #[schema(value_type = Object)]
    pub predicate: Predicate,
}

impl PolicyResponse {
    fn from_policy(policy: &Policy) -> Self {
        Self {
            id: policy.id.0.clone(),
            version: policy.version,
            rules: policy
                .rules
                .iter()
                .map(|r| PolicyRuleResponse {
                    id: r.id.0.clone(),
                    priority: r.priority,
                    effect: match r.effect {
                        Effect::Allow => "allow".to_string(),
                        Effect::Deny => "deny".to_string(),
                    },
                    predicate: r.predicate.clone(),
                })
                .collect(),
            created_at_ms: policy.created_at_ms,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct PutPolicyResponse {
    pub id: String,
    pub version: u64,
}

// ── Handlers ────────────────────────────────────────────────────────

/// `GET /api/v1/policies` — latest version of every policy.
#[utoipa::path(
    get, path = "/api/v1/policies",
    tag = "Policies",
    responses((status = 200, description = "All policies", body = Vec<PolicyResponse>))
)]
pub async fn list_policies(State(state): State<Arc<AppState>>) -> Json<Vec<PolicyResponse>> {
    let svc = state.policy_service.read().await;
    Json(svc.policies().map(PolicyResponse::from_policy).collect())
}

/// `GET /api/v1/policies/{id}` — latest version of one policy.
#[utoipa::path(
    get, path = "/api/v1/policies/{id}",
    tag = "Policies",
    params(("id" = String, Path, description = "Policy identifier")),
    responses(
        (status = 200, description = "Policy", body = PolicyResponse),
        (status = 404, description = "Policy not found", body = ErrorBody),
    )
)]
pub async fn get_policy(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<PolicyResponse>, ApiError> {
    validate_string_length("id", &id, MAX_ID_LENGTH)?;
    let svc = state.policy_service.read().await;
    let policy = svc.get(&PolicyId(id))?;
    Ok(Json(PolicyResponse::from_policy(policy)))
}

/// `PUT /api/v1/policies/{id}` — store a new policy version guarded by
/// `If-Match` (0 creates).
#[utoipa::path(
    put, path = "/api/v1/policies/{id}",
    tag = "Policies",
    params(
        ("id" = String, Path, description = "Policy identifier"),
        ("If-Match" = u64, Header, description = "Expected current version (0 to create)"),
    ),
    request_body = PutPolicyRequest,
    responses(
        (status = 200, description = "Version stored", body = PutPolicyResponse),
        (status = 400, description = "Validation error", body = ErrorBody),
        (status = 409, description = "Version conflict", body = ErrorBody),
    )
)]
pub async fn put_policy(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    claims: Option<Extension<JwtClaims>>,
    Json(req): Json<PutPolicyRequest>,
) -> Result<Json<PutPolicyResponse>, ApiError> {
    if let Some(Extension(ref claims)) = claims {
        require_write_access(claims)?;
    }
    validate_string_length("id", &id, MAX_ID_LENGTH)?;
    let expected_version = parse_if_match(&headers)?;
    let principal = principal_name(&claims);
    let rules = parse_rules(req.rules)?;
    let policy_id = PolicyId(id.clone());

    let before = {
        let svc = state.policy_service.read().await;
        svc.get(&policy_id)
            .ok()
            .and_then(|p| serde_json::to_string(p).ok())
    };

    let mut svc = state.policy_service.write().await;
    let version = svc.put_policy(policy_id.clone(), rules, expected_version)?;
    let after = svc
        .get(&policy_id)
        .ok()
        .and_then(|p| serde_json::to_string(p).ok());
    drop(svc);

    tracing::info!(policy = %id, version, "policy version stored via API");

    state.audit_service.record_change(
        EntityKind::Policy,
        &id,
        version,
        if expected_version == 0 {
            ChangeOp::Created
        } else {
            ChangeOp::Updated
        },
        ChangeActor::Api,
        &principal,
        before,
        after,
    );

    Ok(Json(PutPolicyResponse { id, version }))
}

/// `POST /api/v1/policies/{id}/evaluate` — deterministic evaluation
/// against a pinned snapshot.
#[utoipa::path(
    post, path = "/api/v1/policies/{id}/evaluate",
    tag = "Policies",
    params(("id" = String, Path, description = "Policy identifier")),
    request_body = EvaluateRequest,
    responses(
        (status = 200, description = "Evaluation result", body = EvaluateResponse),
        (status = 404, description = "Policy not found", body = ErrorBody),
    )
)]
pub async fn evaluate_policy(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<EvaluateRequest>,
) -> Result<Json<EvaluateResponse>, ApiError> {
    validate_string_length("id", &id, MAX_ID_LENGTH)?;
    let context = EvalContext {
        attributes: req.context,
        minute_of_day: req
            .minute_of_day
            .unwrap_or_else(|| application::clock::minute_of_day(application::clock::now_ms())),
    };

    let svc = state.policy_service.read().await;
    let result = svc.evaluate(&PolicyId(id), req.version, &context)?;

    Ok(Json(EvaluateResponse {
        decision: result.decision.as_str().to_string(),
        matched_rule_id: result.matched_rule_id,
        policy_version: result.policy_version,
        trace: result
            .trace
            .into_iter()
            .map(|step| TraceStepResponse {
                rule_id: step.rule_id,
                matched: step.matched,
            })
            .collect(),
    }))
}

// ── Request parsing ─────────────────────────────────────────────────

fn parse_rules(rules: Vec<PolicyRuleRequest>) -> Result<Vec<PolicyRule>, ApiError> {
    rules
        .into_iter()
        .map(|rule| {
            validate_string_length("rule id", &rule.id, MAX_ID_LENGTH)?;
            let effect = match rule.effect.to_lowercase().as_str() {
                "allow" => Effect::Allow,
                "deny" => Effect::Deny,
                other => {
                    return Err(ApiError::BadRequest {
                        code: "VALIDATION_ERROR",
                        message: format!("invalid effect '{other}': expected allow or deny"),
                    });
                }
            };
            Ok(PolicyRule {
                id: RuleId(rule.id),
                priority: rule.priority,
                effect,
                predicate: rule.predicate,
            })
        })
        .collect()
}

fn parse_if_match(headers: &HeaderMap) -> Result<u64, ApiError> {
    let value = headers
        .get(axum::http::header::IF_MATCH)
        .ok_or_else(|| ApiError::BadRequest {
            code: "VALIDATION_ERROR",
            message: "If-Match header is required (use 0 to create)".to_string(),
        })?
        .to_str()
        .map_err(|_| ApiError::BadRequest {
            code: "VALIDATION_ERROR",
            message: "If-Match header is not valid ASCII".to_string(),
        })?;

    value
        .trim_matches('"')
        .parse::<u64>()
        .map_err(|_| ApiError::BadRequest {
            code: "VALIDATION_ERROR",
            message: format!("If-Match header '{value}' is not a version number"),
        })
}

fn principal_name(claims: &Option<Extension<JwtClaims>>) -> String {
    claims
        .as_ref()
        .map_or_else(|| "anonymous".to_string(), |Extension(c)| c.sub.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::state::test_support::make_test_state;
    use axum::http::header::IF_MATCH;

    fn if_match(version: u64) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(IF_MATCH, version.to_string().parse().unwrap());
        headers
    }

    fn rule_req(id: &str, priority: u32, effect: &str, key: &str, value: &str) -> PolicyRuleRequest {
        PolicyRuleRequest {
            id: id.to_string(),
            priority,
            effect: effect.to_string(),
            predicate: Predicate::AttributeEquals {
                key: key.to_string(),
                value: value.to_string(),
            },
        }
    }

    fn eval_req(pairs: &[(&str, &str)], version: Option<u64>) -> EvaluateRequest {
        EvaluateRequest {
            context: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            minute_of_day: Some(600),
            version,
        }
    }

    #[tokio::test]
    async fn put_and_evaluate() {
        let state = make_test_state();

        let resp = put_policy(
            State(Arc::clone(&state)),
            Path("access".to_string()),
            if_match(0),
            None,
            Json(PutPolicyRequest {
                rules: vec![rule_req("admins", 10, "allow", "role", "admin")],
            }),
        )
        .await
        .unwrap();
        assert_eq!(resp.0.version, 1);

        let result = evaluate_policy(
            State(state),
            Path("access".to_string()),
            Json(eval_req(&[("role", "admin")], None)),
        )
        .await
        .unwrap();
        assert_eq!(result.0.decision, "allow");
        assert_eq!(result.0.matched_rule_id.as_deref(), Some("admins"));
        assert_eq!(result.0.trace.len(), 1);
    }

    #[tokio::test]
    async fn no_match_denies() {
        let state = make_test_state();
        put_policy(
            State(Arc::clone(&state)),
            Path("access".to_string()),
            if_match(0),
            None,
            Json(PutPolicyRequest {
                rules: vec![rule_req("admins", 10, "allow", "role", "admin")],
            }),
        )
        .await
        .unwrap();

        let result = evaluate_policy(
            State(state),
            Path("access".to_string()),
            Json(eval_req(&[("role", "viewer")], None)),
        )
        .await
        .unwrap();
        assert_eq!(result.0.decision, "deny");
        assert!(result.0.matched_rule_id.is_none());
    }

    #[tokio::test]
    async fn pinned_version_evaluates_old_snapshot() {
        let state = make_test_state();
        put_policy(
            State(Arc::clone(&state)),
            Path("access".to_string()),
            if_match(0),
            None,
            Json(PutPolicyRequest {
                rules: vec![rule_req("r", 10, "allow", "role", "admin")],
            }),
        )
        .await
        .unwrap();
        put_policy(
            State(Arc::clone(&state)),
            Path("access".to_string()),
            if_match(1),
            None,
            Json(PutPolicyRequest {
                rules: vec![rule_req("r", 10, "deny", "role", "admin")],
            }),
        )
        .await
        .unwrap();

        let pinned = evaluate_policy(
            State(Arc::clone(&state)),
            Path("access".to_string()),
            Json(eval_req(&[("role", "admin")], Some(1))),
        )
        .await
        .unwrap();
        assert_eq!(pinned.0.decision, "allow");
        assert_eq!(pinned.0.policy_version, 1);

        let latest = evaluate_policy(
            State(state),
            Path("access".to_string()),
            Json(eval_req(&[("role", "admin")], None)),
        )
        .await
        .unwrap();
        assert_eq!(latest.0.decision, "deny");
    }

    #[tokio::test]
    async fn stale_if_match_conflicts() {
        let state = make_test_state();
        put_policy(
            State(Arc::clone(&state)),
            Path("access".to_string()),
            if_match(0),
            None,
            Json(PutPolicyRequest { rules: vec![] }),
        )
        .await
        .unwrap();

        let err = put_policy(
            State(state),
            Path("access".to_string()),
            if_match(0),
            None,
            Json(PutPolicyRequest { rules: vec![] }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Conflict { .. }));
    }

    #[tokio::test]
    async fn invalid_effect_rejected() {
        let state = make_test_state();
        let err = put_policy(
            State(state),
            Path("access".to_string()),
            if_match(0),
            None,
            Json(PutPolicyRequest {
                rules: vec![rule_req("r", 10, "maybe", "role", "admin")],
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest { .. }));
    }

    #[tokio::test]
    async fn evaluate_missing_policy_not_found() {
        let state = make_test_state();
        let err = evaluate_policy(
            State(state),
            Path("ghost".to_string()),
            Json(eval_req(&[], None)),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::NotFound { .. }));
    }
}
