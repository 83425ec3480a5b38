pub mod redb_access_log_store;
pub mod redb_change_log_store;
pub mod redb_config_store;
pub mod redb_policy_store;
pub mod redb_secret_store;
