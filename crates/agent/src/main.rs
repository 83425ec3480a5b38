#![forbid(unsafe_code)]

mod api_client;
mod cli;
mod commands;
mod rotation_loop;
mod shutdown;
mod startup;

use anyhow::Result;

use api_client::ApiClient;
use cli::{
    AuditCommand, Command, ConfigCommand, PoliciesCommand, RatelimitCommand, RotationCommand,
    SecretsCommand,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::parse();
    let output = cli.output;

    match cli.command {
        Some(Command::Version) => {
            println!("steward {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }

        Some(Command::Status { conn }) => {
            let client = ApiClient::new(&conn.host, conn.port, cli.token);
            commands::cmd_status(&client, output).await
        }

        Some(Command::Health { conn }) => {
            let client = ApiClient::new(&conn.host, conn.port, cli.token);
            commands::cmd_health(&client, output).await
        }

        Some(Command::Metrics { conn }) => {
            let client = ApiClient::new(&conn.host, conn.port, cli.token);
            commands::cmd_metrics(&client).await
        }

        Some(Command::Config(args)) => {
            let client = ApiClient::new(&args.conn.host, args.conn.port, cli.token);
            match args.command {
                ConfigCommand::Get { key, environment } => {
                    commands::cmd_config_get(&client, &key, environment.as_deref(), output).await
                }
                ConfigCommand::Put {
                    key,
                    value,
                    environment,
                    if_match,
                } => {
                    commands::cmd_config_put(
                        &client,
                        &key,
                        &value,
                        environment.as_deref(),
                        if_match,
                        output,
                    )
                    .await
                }
                ConfigCommand::History { key, environment } => {
                    commands::cmd_config_history(&client, &key, environment.as_deref(), output)
                        .await
                }
            }
        }

        Some(Command::Secrets(args)) => {
            let client = ApiClient::new(&args.conn.host, args.conn.port, cli.token);
            match args.command {
                SecretsCommand::List => commands::cmd_secrets_list(&client, output).await,
                SecretsCommand::Create { name, value } => {
                    commands::cmd_secrets_create(&client, &name, &value, output).await
                }
                SecretsCommand::Read { name, version } => {
                    commands::cmd_secrets_read(&client, &name, version, output).await
                }
                SecretsCommand::Rotate { name, immediate } => {
                    commands::cmd_secrets_rotate(&client, &name, immediate, output).await
                }
            }
        }

        Some(Command::Rotation(args)) => {
            let client = ApiClient::new(&args.conn.host, args.conn.port, cli.token);
            match args.command {
                RotationCommand::List => commands::cmd_rotation_list(&client, output).await,
                RotationCommand::Add {
                    secret_name,
                    interval_secs,
                    grace_period_secs,
                } => {
                    commands::cmd_rotation_add(
                        &client,
                        &secret_name,
                        interval_secs,
                        grace_period_secs,
                        output,
                    )
                    .await
                }
                RotationCommand::Delete { secret_name } => {
                    commands::cmd_rotation_delete(&client, &secret_name).await
                }
            }
        }

        Some(Command::Ratelimit(args)) => {
            let client = ApiClient::new(&args.conn.host, args.conn.port, cli.token);
            match args.command {
                RatelimitCommand::List => commands::cmd_ratelimit_list(&client, output).await,
                RatelimitCommand::Add { json } => {
                    commands::cmd_ratelimit_add(&client, &json, output).await
                }
                RatelimitCommand::Delete { id } => {
                    commands::cmd_ratelimit_delete(&client, &id).await
                }
                RatelimitCommand::Check { rule_id, identity } => {
                    commands::cmd_ratelimit_check(&client, &rule_id, &identity, output).await
                }
            }
        }

        Some(Command::Policies(args)) => {
            let client = ApiClient::new(&args.conn.host, args.conn.port, cli.token);
            match args.command {
                PoliciesCommand::List => commands::cmd_policies_list(&client, output).await,
                PoliciesCommand::Put { id, json, if_match } => {
                    commands::cmd_policies_put(&client, &id, &json, if_match, output).await
                }
                PoliciesCommand::Evaluate { id, json } => {
                    commands::cmd_policies_evaluate(&client, &id, &json, output).await
                }
            }
        }

        Some(Command::Audit(args)) => {
            let client = ApiClient::new(&args.conn.host, args.conn.port, cli.token);
            match args.command {
                AuditCommand::Changes {
                    kind,
                    entity_key,
                    limit,
                    offset,
                } => {
                    commands::cmd_audit_changes(
                        &client,
                        kind.as_deref(),
                        entity_key.as_deref(),
                        limit,
                        offset,
                        output,
                    )
                    .await
                }
                AuditCommand::SecretAccess {
                    secret_name,
                    limit,
                    offset,
                } => {
                    commands::cmd_audit_secret_access(
                        &client,
                        secret_name.as_deref(),
                        limit,
                        offset,
                        output,
                    )
                    .await
                }
            }
        }

        // No subcommand = run the control plane daemon
        None => startup::run(&cli).await,
    }
}
