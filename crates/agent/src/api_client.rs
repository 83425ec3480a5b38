use std::time::Duration;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};

/// HTTP client for the steward REST API.
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

// ── Response DTOs ──────────────────────────────────────────────────────

#[derive(Deserialize, Serialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Deserialize, Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub config_entries: usize,
    pub secrets: usize,
    pub policies: usize,
}

#[derive(Deserialize, Serialize)]
pub struct AgentStatusResponse {
    pub version: String,
    pub uptime_seconds: u64,
    pub config_entries: usize,
    pub secrets: usize,
    pub rotation_policies: usize,
    pub ratelimit_rules: usize,
    pub policies: usize,
}

#[derive(Deserialize, Serialize)]
pub struct ConfigEntryResponse {
    pub key: String,
    pub environment: String,
    pub value: String,
    pub version: u64,
    pub updated_at_ms: u64,
    pub updated_by: String,
}

#[derive(Deserialize, Serialize)]
pub struct PutConfigResponse {
    pub key: String,
    pub environment: String,
    pub version: u64,
}

#[derive(Deserialize, Serialize)]
pub struct ConfigChangeResponse {
    pub version: u64,
    pub value: String,
    pub changed_by: String,
    pub changed_at_ms: u64,
    pub deleted: bool,
}

#[derive(Deserialize, Serialize)]
pub struct SecretVersionResponse {
    pub version: u64,
    pub status: String,
    pub created_at_ms: u64,
    pub deprecated_expires_at_ms: Option<u64>,
}

#[derive(Deserialize, Serialize)]
pub struct SecretMetadataResponse {
    pub name: String,
    pub versions: Vec<SecretVersionResponse>,
    pub access_count: u64,
}

#[derive(Deserialize, Serialize)]
pub struct SecretValueResponse {
    pub name: String,
    pub version: u64,
    pub value: String,
}

#[derive(Deserialize, Serialize)]
pub struct RotateSecretResponse {
    pub name: String,
    pub new_version: u64,
}

#[derive(Deserialize, Serialize)]
pub struct RotationPolicyResponse {
    pub secret_name: String,
    pub interval_secs: u64,
    pub grace_period_secs: u64,
    pub last_rotated_at_ms: Option<u64>,
    pub next_rotation_at_ms: u64,
    pub run_state: Option<String>,
}

#[derive(Deserialize, Serialize)]
pub struct RateLimitRuleResponse {
    pub id: String,
    pub scope: String,
    pub algorithm: String,
    pub limit: u64,
    pub window_secs: u64,
    pub burst_capacity: u64,
    pub enabled: bool,
}

#[derive(Deserialize, Serialize)]
pub struct CheckResponse {
    pub allowed: bool,
    pub retry_after_secs: u64,
}

#[derive(Deserialize, Serialize)]
pub struct PolicyResponse {
    pub id: String,
    pub version: u64,
    pub rules: Vec<serde_json::Value>,
}

#[derive(Deserialize, Serialize)]
pub struct PutPolicyResponse {
    pub id: String,
    pub version: u64,
}

#[derive(Deserialize, Serialize)]
pub struct EvaluateResponse {
    pub decision: String,
    pub matched_rule_id: Option<String>,
    pub policy_version: u64,
    pub trace: Vec<serde_json::Value>,
}

#[derive(Deserialize, Serialize)]
pub struct ChangeRecordResponse {
    pub kind: String,
    pub entity_key: String,
    pub version: u64,
    pub timestamp_ms: u64,
    pub op: String,
    pub actor: String,
    pub principal: String,
}

#[derive(Deserialize, Serialize)]
pub struct AccessRecordResponse {
    pub secret_name: String,
    pub version: u64,
    pub accessed_by: String,
    pub accessed_at_ms: u64,
    pub success: bool,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    code: String,
    message: String,
}

// ── Client ─────────────────────────────────────────────────────────────

impl ApiClient {
    pub fn new(host: &str, port: u16, token: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            base_url: format!("http://{host}:{port}"),
            token,
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut req = self
            .client
            .request(method, format!("{}{path}", self.base_url));
        if let Some(ref token) = self.token {
            req = req.bearer_auth(token);
        }
        req
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> anyhow::Result<T> {
        let resp = self
            .request(reqwest::Method::GET, path)
            .send()
            .await
            .map_err(|e| connection_error(&self.base_url, &e))?;
        handle_response(resp).await
    }

    // ── Health / status ─────────────────────────────────────────────

    pub async fn healthz(&self) -> anyhow::Result<HealthResponse> {
        self.get_json("/healthz").await
    }

    pub async fn readyz(&self) -> anyhow::Result<ReadyResponse> {
        self.get_json("/readyz").await
    }

    pub async fn get_status(&self) -> anyhow::Result<AgentStatusResponse> {
        self.get_json("/api/v1/agent/status").await
    }

    pub async fn metrics(&self) -> anyhow::Result<String> {
        let resp = self
            .request(reqwest::Method::GET, "/metrics")
            .send()
            .await
            .map_err(|e| connection_error(&self.base_url, &e))?;
        if !resp.status().is_success() {
            bail!("metrics request failed with status {}", resp.status());
        }
        resp.text().await.context("failed to read metrics body")
    }

    // ── Config ──────────────────────────────────────────────────────

    pub async fn get_config(
        &self,
        key: &str,
        environment: Option<&str>,
    ) -> anyhow::Result<ConfigEntryResponse> {
        self.get_json(&with_environment(&format!("/api/v1/config/{key}"), environment))
            .await
    }

    pub async fn put_config(
        &self,
        key: &str,
        value: &str,
        environment: Option<&str>,
        if_match: u64,
    ) -> anyhow::Result<PutConfigResponse> {
        let mut body = serde_json::json!({ "value": value });
        if let Some(env) = environment {
            body["environment"] = serde_json::Value::String(env.to_string());
        }
        let resp = self
            .request(reqwest::Method::PUT, &format!("/api/v1/config/{key}"))
            .header(reqwest::header::IF_MATCH, if_match.to_string())
            .json(&body)
            .send()
            .await
            .map_err(|e| connection_error(&self.base_url, &e))?;
        handle_response(resp).await
    }

    pub async fn config_history(
        &self,
        key: &str,
        environment: Option<&str>,
    ) -> anyhow::Result<Vec<ConfigChangeResponse>> {
        self.get_json(&with_environment(
            &format!("/api/v1/config/{key}/history"),
            environment,
        ))
        .await
    }

    // ── Secrets ─────────────────────────────────────────────────────

    pub async fn list_secrets(&self) -> anyhow::Result<Vec<SecretMetadataResponse>> {
        self.get_json("/api/v1/secrets").await
    }

    pub async fn create_secret(
        &self,
        name: &str,
        value: &str,
    ) -> anyhow::Result<SecretMetadataResponse> {
        let resp = self
            .request(reqwest::Method::POST, "/api/v1/secrets")
            .json(&serde_json::json!({ "name": name, "value": value }))
            .send()
            .await
            .map_err(|e| connection_error(&self.base_url, &e))?;
        handle_response(resp).await
    }

    pub async fn read_secret(
        &self,
        name: &str,
        version: Option<u64>,
    ) -> anyhow::Result<SecretValueResponse> {
        let path = match version {
            Some(v) => format!("/api/v1/secrets/{name}?version={v}"),
            None => format!("/api/v1/secrets/{name}"),
        };
        self.get_json(&path).await
    }

    pub async fn rotate_secret(
        &self,
        name: &str,
        immediate: bool,
    ) -> anyhow::Result<RotateSecretResponse> {
        let resp = self
            .request(
                reqwest::Method::POST,
                &format!("/api/v1/secrets/{name}/rotate?immediate={immediate}"),
            )
            .send()
            .await
            .map_err(|e| connection_error(&self.base_url, &e))?;
        handle_response(resp).await
    }

    // ── Rotation ────────────────────────────────────────────────────

    pub async fn list_rotation_policies(&self) -> anyhow::Result<Vec<RotationPolicyResponse>> {
        self.get_json("/api/v1/rotation/policies").await
    }

    pub async fn create_rotation_policy(
        &self,
        secret_name: &str,
        interval_secs: u64,
        grace_period_secs: u64,
    ) -> anyhow::Result<RotationPolicyResponse> {
        let resp = self
            .request(reqwest::Method::POST, "/api/v1/rotation/policies")
            .json(&serde_json::json!({
                "secret_name": secret_name,
                "interval_secs": interval_secs,
                "grace_period_secs": grace_period_secs,
            }))
            .send()
            .await
            .map_err(|e| connection_error(&self.base_url, &e))?;
        handle_response(resp).await
    }

    pub async fn delete_rotation_policy(&self, secret_name: &str) -> anyhow::Result<()> {
        let resp = self
            .request(
                reqwest::Method::DELETE,
                &format!("/api/v1/rotation/policies/{secret_name}"),
            )
            .send()
            .await
            .map_err(|e| connection_error(&self.base_url, &e))?;
        handle_delete(resp).await
    }

    // ── Rate limiting ───────────────────────────────────────────────

    pub async fn list_ratelimit_rules(&self) -> anyhow::Result<Vec<RateLimitRuleResponse>> {
        self.get_json("/api/v1/ratelimit/rules").await
    }

    pub async fn create_ratelimit_rule(
        &self,
        rule_json: &serde_json::Value,
    ) -> anyhow::Result<RateLimitRuleResponse> {
        let resp = self
            .request(reqwest::Method::POST, "/api/v1/ratelimit/rules")
            .json(rule_json)
            .send()
            .await
            .map_err(|e| connection_error(&self.base_url, &e))?;
        handle_response(resp).await
    }

    pub async fn delete_ratelimit_rule(&self, id: &str) -> anyhow::Result<()> {
        let resp = self
            .request(
                reqwest::Method::DELETE,
                &format!("/api/v1/ratelimit/rules/{id}"),
            )
            .send()
            .await
            .map_err(|e| connection_error(&self.base_url, &e))?;
        handle_delete(resp).await
    }

    pub async fn check_ratelimit(
        &self,
        rule_id: &str,
        identity: &str,
    ) -> anyhow::Result<CheckResponse> {
        let resp = self
            .request(reqwest::Method::POST, "/api/v1/ratelimit/check")
            .json(&serde_json::json!({ "rule_id": rule_id, "identity": identity }))
            .send()
            .await
            .map_err(|e| connection_error(&self.base_url, &e))?;
        handle_response(resp).await
    }

    // ── Policies ────────────────────────────────────────────────────

    pub async fn list_policies(&self) -> anyhow::Result<Vec<PolicyResponse>> {
        self.get_json("/api/v1/policies").await
    }

    pub async fn put_policy(
        &self,
        id: &str,
        rules: &serde_json::Value,
        if_match: u64,
    ) -> anyhow::Result<PutPolicyResponse> {
        let resp = self
            .request(reqwest::Method::PUT, &format!("/api/v1/policies/{id}"))
            .header(reqwest::header::IF_MATCH, if_match.to_string())
            .json(&serde_json::json!({ "rules": rules }))
            .send()
            .await
            .map_err(|e| connection_error(&self.base_url, &e))?;
        handle_response(resp).await
    }

    pub async fn evaluate_policy(
        &self,
        id: &str,
        request: &serde_json::Value,
    ) -> anyhow::Result<EvaluateResponse> {
        let resp = self
            .request(
                reqwest::Method::POST,
                &format!("/api/v1/policies/{id}/evaluate"),
            )
            .json(request)
            .send()
            .await
            .map_err(|e| connection_error(&self.base_url, &e))?;
        handle_response(resp).await
    }

    // ── Audit ───────────────────────────────────────────────────────

    pub async fn list_changes(
        &self,
        kind: Option<&str>,
        entity_key: Option<&str>,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> anyhow::Result<Vec<ChangeRecordResponse>> {
        let mut params = Vec::new();
        if let Some(kind) = kind {
            params.push(format!("kind={kind}"));
        }
        if let Some(key) = entity_key {
            params.push(format!("entity_key={key}"));
        }
        if let Some(limit) = limit {
            params.push(format!("limit={limit}"));
        }
        if let Some(offset) = offset {
            params.push(format!("offset={offset}"));
        }
        let path = if params.is_empty() {
            "/api/v1/audit/changes".to_string()
        } else {
            format!("/api/v1/audit/changes?{}", params.join("&"))
        };
        self.get_json(&path).await
    }

    pub async fn list_secret_access(
        &self,
        secret_name: Option<&str>,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> anyhow::Result<Vec<AccessRecordResponse>> {
        let mut params = Vec::new();
        if let Some(name) = secret_name {
            params.push(format!("secret_name={name}"));
        }
        if let Some(limit) = limit {
            params.push(format!("limit={limit}"));
        }
        if let Some(offset) = offset {
            params.push(format!("offset={offset}"));
        }
        let path = if params.is_empty() {
            "/api/v1/audit/secret-access".to_string()
        } else {
            format!("/api/v1/audit/secret-access?{}", params.join("&"))
        };
        self.get_json(&path).await
    }
}

fn with_environment(path: &str, environment: Option<&str>) -> String {
    match environment {
        Some(env) => format!("{path}?environment={env}"),
        None => path.to_string(),
    }
}

fn connection_error(base_url: &str, err: &reqwest::Error) -> anyhow::Error {
    if err.is_connect() {
        anyhow::anyhow!("cannot connect to steward at {base_url} — is the daemon running?")
    } else if err.is_timeout() {
        anyhow::anyhow!("connection to steward at {base_url} timed out")
    } else {
        anyhow::anyhow!("request to steward failed: {err}")
    }
}

async fn handle_response<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> anyhow::Result<T> {
    if resp.status().is_success() {
        return resp
            .json::<T>()
            .await
            .context("failed to parse response body");
    }
    let status = resp.status();
    if let Ok(body) = resp.json::<ApiErrorBody>().await {
        bail!("{} ({}): {}", body.error.message, body.error.code, status);
    }
    bail!("request failed with status {status}");
}

async fn handle_delete(resp: reqwest::Response) -> anyhow::Result<()> {
    if resp.status().is_success() {
        return Ok(());
    }
    let status = resp.status();
    if let Ok(body) = resp.json::<ApiErrorBody>().await {
        bail!("{} ({}): {}", body.error.message, body.error.code, status);
    }
    bail!("request failed with status {status}");
}
