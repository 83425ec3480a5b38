use anyhow::Result;

use crate::api_client::ApiClient;
use crate::cli::OutputFormat;

// ── Health ──────────────────────────────────────────────────────────────

pub async fn cmd_health(client: &ApiClient, output: OutputFormat) -> Result<()> {
    let health = client.healthz().await?;
    let ready = client.readyz().await?;

    if output == OutputFormat::Json {
        let combined = serde_json::json!({
            "health": health,
            "ready": ready,
        });
        println!("{}", serde_json::to_string_pretty(&combined)?);
        return Ok(());
    }

    println!("Health:         {}", health.status);
    println!("Ready:          {}", ready.status);
    println!("Config entries: {}", ready.config_entries);
    println!("Secrets:        {}", ready.secrets);
    println!("Policies:       {}", ready.policies);
    Ok(())
}

// ── Metrics ─────────────────────────────────────────────────────────────

pub async fn cmd_metrics(client: &ApiClient) -> Result<()> {
    let text = client.metrics().await?;
    print!("{text}");
    Ok(())
}

// ── Daemon status ───────────────────────────────────────────────────────

pub async fn cmd_status(client: &ApiClient, output: OutputFormat) -> Result<()> {
    let status = client.get_status().await?;

    if output == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("steward Control Plane Status");
    println!("  Version:           {}", status.version);
    println!("  Uptime:            {}", format_uptime(status.uptime_seconds));
    println!("  Config entries:    {}", status.config_entries);
    println!("  Secrets:           {}", status.secrets);
    println!("  Rotation policies: {}", status.rotation_policies);
    println!("  Ratelimit rules:   {}", status.ratelimit_rules);
    println!("  Policies:          {}", status.policies);
    Ok(())
}

// ── Config ──────────────────────────────────────────────────────────────

pub async fn cmd_config_get(
    client: &ApiClient,
    key: &str,
    environment: Option<&str>,
    output: OutputFormat,
) -> Result<()> {
    let entry = client.get_config(key, environment).await?;

    if output == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
        return Ok(());
    }

    println!("{}/{} (v{})", entry.environment, entry.key, entry.version);
    println!("  Value:      {}", entry.value);
    println!("  Updated by: {}", entry.updated_by);
    Ok(())
}

pub async fn cmd_config_put(
    client: &ApiClient,
    key: &str,
    value: &str,
    environment: Option<&str>,
    if_match: u64,
    output: OutputFormat,
) -> Result<()> {
    let resp = client.put_config(key, value, environment, if_match).await?;

    if output == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&resp)?);
        return Ok(());
    }

    println!("Wrote {}/{} at v{}", resp.environment, resp.key, resp.version);
    Ok(())
}

pub async fn cmd_config_history(
    client: &ApiClient,
    key: &str,
    environment: Option<&str>,
    output: OutputFormat,
) -> Result<()> {
    let history = client.config_history(key, environment).await?;

    if output == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&history)?);
        return Ok(());
    }

    println!("{:<8} {:<24} {:<10} {}", "VERSION", "CHANGED BY", "DELETED", "VALUE");
    for change in &history {
        println!(
            "{:<8} {:<24} {:<10} {}",
            change.version,
            change.changed_by,
            if change.deleted { "yes" } else { "" },
            change.value,
        );
    }
    Ok(())
}

// ── Secrets ─────────────────────────────────────────────────────────────

pub async fn cmd_secrets_list(client: &ApiClient, output: OutputFormat) -> Result<()> {
    let secrets = client.list_secrets().await?;

    if output == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&secrets)?);
        return Ok(());
    }

    if secrets.is_empty() {
        println!("No secrets stored.");
        return Ok(());
    }

    println!("{:<32} {:>8} {:>12} {}", "NAME", "VERSIONS", "READS", "STATUSES");
    for secret in &secrets {
        let statuses: Vec<&str> = secret.versions.iter().map(|v| v.status.as_str()).collect();
        println!(
            "{:<32} {:>8} {:>12} {}",
            secret.name,
            secret.versions.len(),
            secret.access_count,
            statuses.join(","),
        );
    }
    Ok(())
}

pub async fn cmd_secrets_create(
    client: &ApiClient,
    name: &str,
    value: &str,
    output: OutputFormat,
) -> Result<()> {
    let secret = client.create_secret(name, value).await?;

    if output == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&secret)?);
        return Ok(());
    }

    println!("Created secret '{}' at v1", secret.name);
    Ok(())
}

pub async fn cmd_secrets_read(
    client: &ApiClient,
    name: &str,
    version: Option<u64>,
    output: OutputFormat,
) -> Result<()> {
    let secret = client.read_secret(name, version).await?;

    if output == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&secret)?);
        return Ok(());
    }

    // Plaintext only; suitable for shell substitution.
    println!("{}", secret.value);
    Ok(())
}

pub async fn cmd_secrets_rotate(
    client: &ApiClient,
    name: &str,
    immediate: bool,
    output: OutputFormat,
) -> Result<()> {
    let resp = client.rotate_secret(name, immediate).await?;

    if output == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&resp)?);
        return Ok(());
    }

    println!("Rotated '{}' to v{}", resp.name, resp.new_version);
    Ok(())
}

// ── Rotation ────────────────────────────────────────────────────────────

pub async fn cmd_rotation_list(client: &ApiClient, output: OutputFormat) -> Result<()> {
    let policies = client.list_rotation_policies().await?;

    if output == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&policies)?);
        return Ok(());
    }

    if policies.is_empty() {
        println!("No rotation policies configured.");
        return Ok(());
    }

    println!(
        "{:<32} {:>12} {:>10} {:<14} {}",
        "SECRET", "INTERVAL(s)", "GRACE(s)", "STATE", "NEXT ROTATION (ms)"
    );
    for policy in &policies {
        println!(
            "{:<32} {:>12} {:>10} {:<14} {}",
            policy.secret_name,
            policy.interval_secs,
            policy.grace_period_secs,
            policy.run_state.as_deref().unwrap_or("-"),
            policy.next_rotation_at_ms,
        );
    }
    Ok(())
}

pub async fn cmd_rotation_add(
    client: &ApiClient,
    secret_name: &str,
    interval_secs: u64,
    grace_period_secs: u64,
    output: OutputFormat,
) -> Result<()> {
    let policy = client
        .create_rotation_policy(secret_name, interval_secs, grace_period_secs)
        .await?;

    if output == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&policy)?);
        return Ok(());
    }

    println!(
        "Registered rotation for '{}' every {}s (grace {}s)",
        policy.secret_name, policy.interval_secs, policy.grace_period_secs
    );
    Ok(())
}

pub async fn cmd_rotation_delete(client: &ApiClient, secret_name: &str) -> Result<()> {
    client.delete_rotation_policy(secret_name).await?;
    println!("Removed rotation policy for '{secret_name}'");
    Ok(())
}

// ── Rate limiting ───────────────────────────────────────────────────────

pub async fn cmd_ratelimit_list(client: &ApiClient, output: OutputFormat) -> Result<()> {
    let rules = client.list_ratelimit_rules().await?;

    if output == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&rules)?);
        return Ok(());
    }

    if rules.is_empty() {
        println!("No rate limit rules configured.");
        return Ok(());
    }

    println!(
        "{:<24} {:<10} {:<16} {:>8} {:>10} {:>8} {:<8}",
        "ID", "SCOPE", "ALGORITHM", "LIMIT", "WINDOW(s)", "BURST", "ENABLED"
    );
    for rule in &rules {
        println!(
            "{:<24} {:<10} {:<16} {:>8} {:>10} {:>8} {:<8}",
            rule.id,
            rule.scope,
            rule.algorithm,
            rule.limit,
            rule.window_secs,
            rule.burst_capacity,
            if rule.enabled { "yes" } else { "no" },
        );
    }
    Ok(())
}

pub async fn cmd_ratelimit_add(
    client: &ApiClient,
    json: &str,
    output: OutputFormat,
) -> Result<()> {
    let rule_json: serde_json::Value =
        serde_json::from_str(json).map_err(|e| anyhow::anyhow!("invalid rule JSON: {e}"))?;
    let rule = client.create_ratelimit_rule(&rule_json).await?;

    if output == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&rule)?);
        return Ok(());
    }

    println!("Created rate limit rule '{}'", rule.id);
    Ok(())
}

pub async fn cmd_ratelimit_delete(client: &ApiClient, id: &str) -> Result<()> {
    client.delete_ratelimit_rule(id).await?;
    println!("Deleted rate limit rule '{id}'");
    Ok(())
}

pub async fn cmd_ratelimit_check(
    client: &ApiClient,
    rule_id: &str,
    identity: &str,
    output: OutputFormat,
) -> Result<()> {
    let decision = client.check_ratelimit(rule_id, identity).await?;

    if output == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&decision)?);
        return Ok(());
    }

    if decision.allowed {
        println!("allowed");
    } else {
        println!("denied (retry after {}s)", decision.retry_after_secs);
    }
    Ok(())
}

// ── Policies ────────────────────────────────────────────────────────────

pub async fn cmd_policies_list(client: &ApiClient, output: OutputFormat) -> Result<()> {
    let policies = client.list_policies().await?;

    if output == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&policies)?);
        return Ok(());
    }

    if policies.is_empty() {
        println!("No policies stored.");
        return Ok(());
    }

    println!("{:<32} {:>8} {:>8}", "ID", "VERSION", "RULES");
    for policy in &policies {
        println!(
            "{:<32} {:>8} {:>8}",
            policy.id,
            policy.version,
            policy.rules.len()
        );
    }
    Ok(())
}

pub async fn cmd_policies_put(
    client: &ApiClient,
    id: &str,
    json: &str,
    if_match: u64,
    output: OutputFormat,
) -> Result<()> {
    let rules: serde_json::Value =
        serde_json::from_str(json).map_err(|e| anyhow::anyhow!("invalid rules JSON: {e}"))?;
    let resp = client.put_policy(id, &rules, if_match).await?;

    if output == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&resp)?);
        return Ok(());
    }

    println!("Stored policy '{}' at v{}", resp.id, resp.version);
    Ok(())
}

pub async fn cmd_policies_evaluate(
    client: &ApiClient,
    id: &str,
    json: &str,
    output: OutputFormat,
) -> Result<()> {
    let request: serde_json::Value =
        serde_json::from_str(json).map_err(|e| anyhow::anyhow!("invalid context JSON: {e}"))?;
    let result = client.evaluate_policy(id, &request).await?;

    if output == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("Decision: {}", result.decision);
    match &result.matched_rule_id {
        Some(rule) => println!("Matched:  {rule} (policy v{})", result.policy_version),
        None => println!("Matched:  none (default deny, policy v{})", result.policy_version),
    }
    Ok(())
}

// ── Audit ───────────────────────────────────────────────────────────────

pub async fn cmd_audit_changes(
    client: &ApiClient,
    kind: Option<&str>,
    entity_key: Option<&str>,
    limit: Option<usize>,
    offset: Option<usize>,
    output: OutputFormat,
) -> Result<()> {
    let records = client.list_changes(kind, entity_key, limit, offset).await?;

    if output == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No matching change records.");
        return Ok(());
    }

    println!(
        "{:<16} {:<8} {:<32} {:>8} {:<10} {:<10} {}",
        "TIMESTAMP(ms)", "KIND", "ENTITY", "VERSION", "OP", "ACTOR", "PRINCIPAL"
    );
    for record in &records {
        println!(
            "{:<16} {:<8} {:<32} {:>8} {:<10} {:<10} {}",
            record.timestamp_ms,
            record.kind,
            record.entity_key,
            record.version,
            record.op,
            record.actor,
            record.principal,
        );
    }
    Ok(())
}

pub async fn cmd_audit_secret_access(
    client: &ApiClient,
    secret_name: Option<&str>,
    limit: Option<usize>,
    offset: Option<usize>,
    output: OutputFormat,
) -> Result<()> {
    let records = client.list_secret_access(secret_name, limit, offset).await?;

    if output == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No matching access records.");
        return Ok(());
    }

    println!(
        "{:<16} {:<32} {:>8} {:<24} {}",
        "TIMESTAMP(ms)", "SECRET", "VERSION", "ACCESSED BY", "SUCCESS"
    );
    for record in &records {
        println!(
            "{:<16} {:<32} {:>8} {:<24} {}",
            record.accessed_at_ms,
            record.secret_name,
            record.version,
            record.accessed_by,
            if record.success { "yes" } else { "no" },
        );
    }
    Ok(())
}

// ── Helpers ─────────────────────────────────────────────────────────────

fn format_uptime(total_seconds: u64) -> String {
    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3_600;
    let minutes = (total_seconds % 3_600) / 60;
    let seconds = total_seconds % 60;
    if days > 0 {
        format!("{days}d {hours}h {minutes}m {seconds}s")
    } else if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}
