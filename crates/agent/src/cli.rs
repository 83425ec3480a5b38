use clap::{Args, Parser, Subcommand, ValueEnum};
use infrastructure::config::{LogFormat, LogLevel};
use infrastructure::constants::{DEFAULT_CONFIG_PATH, DEFAULT_HTTP_PORT};

#[derive(Parser, Debug)]
#[command(
    name = "steward",
    about = "steward configuration & policy control plane",
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,

    /// Log level override (takes precedence over config file)
    #[arg(short, long)]
    pub log_level: Option<LogLevelArg>,

    /// Log format: json (production) or text (development)
    #[arg(long)]
    pub log_format: Option<LogFormatArg>,

    /// Bearer token for authenticated API requests
    #[arg(long, env = "STEWARD_TOKEN", global = true)]
    pub token: Option<String>,

    /// Output format
    #[arg(short, long, default_value = "table", global = true)]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Option<Command>,
}

pub fn parse() -> Cli {
    Cli::parse()
}

/// Output format for CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table (default)
    Table,
    /// Raw JSON from the API
    Json,
}

/// clap-facing mirror of the config-file log level.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevelArg> for LogLevel {
    fn from(arg: LogLevelArg) -> Self {
        match arg {
            LogLevelArg::Error => Self::Error,
            LogLevelArg::Warn => Self::Warn,
            LogLevelArg::Info => Self::Info,
            LogLevelArg::Debug => Self::Debug,
            LogLevelArg::Trace => Self::Trace,
        }
    }
}

/// clap-facing mirror of the config-file log format.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Json,
    Text,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Json => Self::Json,
            LogFormatArg::Text => Self::Text,
        }
    }
}

/// Connection parameters for reaching a running daemon.
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// Daemon API host
    #[arg(long, default_value = "127.0.0.1", env = "STEWARD_HOST")]
    pub host: String,

    /// Daemon API port
    #[arg(long, default_value_t = DEFAULT_HTTP_PORT, env = "STEWARD_PORT")]
    pub port: u16,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Display version and build information
    Version,

    /// Query running daemon status
    Status {
        #[command(flatten)]
        conn: ConnectionArgs,
    },

    /// Check daemon liveness and readiness
    Health {
        #[command(flatten)]
        conn: ConnectionArgs,
    },

    /// Display Prometheus metrics
    Metrics {
        #[command(flatten)]
        conn: ConnectionArgs,
    },

    /// Read and write versioned configuration
    Config(DomainArgs<ConfigCommand>),

    /// Manage secrets
    Secrets(DomainArgs<SecretsCommand>),

    /// Manage rotation schedules
    Rotation(DomainArgs<RotationCommand>),

    /// Manage rate limiting rules and run checks
    Ratelimit(DomainArgs<RatelimitCommand>),

    /// Manage and evaluate policies
    Policies(DomainArgs<PoliciesCommand>),

    /// View audit trails
    Audit(DomainArgs<AuditCommand>),
}

/// Generic domain args: connection + subcommand.
#[derive(Args, Debug)]
pub struct DomainArgs<T: Subcommand> {
    #[command(flatten)]
    pub conn: ConnectionArgs,

    #[command(subcommand)]
    pub command: T,
}

// ── Config ──────────────────────────────────────────────────────────────

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Resolve a config entry (with environment inheritance)
    Get {
        key: String,
        #[arg(long)]
        environment: Option<String>,
    },
    /// Write a config entry guarded by its expected version
    Put {
        key: String,
        value: String,
        #[arg(long)]
        environment: Option<String>,
        /// Expected current version (0 to create)
        #[arg(long, default_value_t = 0)]
        if_match: u64,
    },
    /// Show the full change history of an entry
    History {
        key: String,
        #[arg(long)]
        environment: Option<String>,
    },
}

// ── Secrets ─────────────────────────────────────────────────────────────

#[derive(Subcommand, Debug)]
pub enum SecretsCommand {
    /// List secret metadata
    List,
    /// Create a secret
    Create { name: String, value: String },
    /// Read a secret's plaintext (audited)
    Read {
        name: String,
        /// Pin a specific version
        #[arg(long)]
        version: Option<u64>,
    },
    /// Rotate a secret out of schedule
    Rotate {
        name: String,
        /// Revoke the previous version immediately (no grace overlap)
        #[arg(long)]
        immediate: bool,
    },
}

// ── Rotation ────────────────────────────────────────────────────────────

#[derive(Subcommand, Debug)]
pub enum RotationCommand {
    /// List rotation policies and their run states
    List,
    /// Register a rotation schedule for a secret
    Add {
        secret_name: String,
        #[arg(long)]
        interval_secs: u64,
        #[arg(long, default_value_t = 0)]
        grace_period_secs: u64,
    },
    /// Remove a rotation schedule
    Delete { secret_name: String },
}

// ── Rate limiting ───────────────────────────────────────────────────────

#[derive(Subcommand, Debug)]
pub enum RatelimitCommand {
    /// List rate limit rules
    List,
    /// Add a rule from a JSON document
    Add { json: String },
    /// Delete a rule
    Delete { id: String },
    /// Run an admission check
    Check {
        rule_id: String,
        /// Caller identity the rule's scope keys on
        #[arg(long)]
        identity: String,
    },
}

// ── Policies ────────────────────────────────────────────────────────────

#[derive(Subcommand, Debug)]
pub enum PoliciesCommand {
    /// List policies (latest versions)
    List,
    /// Store a policy version from a JSON rule list
    Put {
        id: String,
        json: String,
        /// Expected current version (0 to create)
        #[arg(long, default_value_t = 0)]
        if_match: u64,
    },
    /// Evaluate a policy against a JSON context
    Evaluate { id: String, json: String },
}

// ── Audit ───────────────────────────────────────────────────────────────

#[derive(Subcommand, Debug)]
pub enum AuditCommand {
    /// List control-plane mutations
    Changes {
        #[arg(long)]
        kind: Option<String>,
        #[arg(long)]
        entity_key: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        offset: Option<usize>,
    },
    /// List secret access records
    SecretAccess {
        #[arg(long)]
        secret_name: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        offset: Option<usize>,
    },
}
