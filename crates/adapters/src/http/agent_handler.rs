use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;
use utoipa::ToSchema;

use super::state::AppState;

#[derive(Serialize, ToSchema)]
pub struct AgentStatusResponse {
    pub version: String,
    pub uptime_seconds: u64,
    pub config_entries: usize,
    pub secrets: usize,
    pub rotation_policies: usize,
    pub ratelimit_rules: usize,
    pub policies: usize,
}

/// `GET /api/v1/agent/status` — daemon version, uptime, and store sizes.
#[utoipa::path(
    get, path = "/api/v1/agent/status",
    tag = "Agent",
    responses((status = 200, description = "Agent status", body = AgentStatusResponse))
)]
pub async fn agent_status(State(state): State<Arc<AppState>>) -> Json<AgentStatusResponse> {
    Json(AgentStatusResponse {
        version: state.version.to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        config_entries: state.config_service.read().await.entry_count(),
        secrets: state.secrets_service.read().await.secret_count(),
        rotation_policies: state.rotation_service.read().await.policy_count(),
        ratelimit_rules: state.ratelimit_service.read().await.rule_count(),
        policies: state.policy_service.read().await.policy_count(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::state::test_support::make_test_state;

    #[tokio::test]
    async fn status_reports_counts() {
        let state = make_test_state();
        let resp = agent_status(State(state)).await;
        assert!(!resp.0.version.is_empty());
        assert_eq!(resp.0.config_entries, 0);
        assert_eq!(resp.0.ratelimit_rules, 0);
    }
}
