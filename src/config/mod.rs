pub mod toml_config;

use crate::core::fetcher::DatasetSource;
use crate::domain::model::Namespace;
use crate::utils::error::Result;
use crate::utils::validation::{self, validate_required_field, Validate};
use clap::{Args, Parser};
use std::fmt;
use std::path::PathBuf;
use toml_config::{DatasetFile, DatasetSpec};

pub const DEFAULT_POSTS_URL: &str = "https://jsonplaceholder.typicode.com/posts";
pub const DEFAULT_COMMENTS_URL: &str = "https://jsonplaceholder.typicode.com/comments";

pub const POSTS_TABLE: &str = "POSTS";
pub const COMMENTS_TABLE: &str = "COMMENTS";

#[derive(Debug, Clone, Parser)]
#[command(name = "warehouse-ingest")]
#[command(about = "Load JSONPlaceholder posts and comments into Snowflake")]
pub struct CliConfig {
    #[arg(long, env = "INGEST_POSTS_URL", default_value = DEFAULT_POSTS_URL)]
    pub posts_url: String,

    #[arg(long, env = "INGEST_COMMENTS_URL", default_value = DEFAULT_COMMENTS_URL)]
    pub comments_url: String,

    /// TOML file listing [[dataset]] entries; replaces the posts/comments defaults
    #[arg(long, value_name = "FILE")]
    pub datasets: Option<PathBuf>,

    #[command(flatten)]
    pub snowflake: SnowflakeConfig,

    /// Fetch and plan the load against an in-memory warehouse instead of Snowflake
    #[arg(long)]
    pub dry_run: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,
}

impl CliConfig {
    /// Datasets to ingest, in load order.
    pub fn dataset_specs(&self) -> Result<Vec<DatasetSpec>> {
        match &self.datasets {
            Some(path) => Ok(DatasetFile::from_file(path)?.dataset),
            None => Ok(vec![
                DatasetSpec {
                    name: "posts".to_string(),
                    endpoint: self.posts_url.clone(),
                    table: POSTS_TABLE.to_string(),
                },
                DatasetSpec {
                    name: "comments".to_string(),
                    endpoint: self.comments_url.clone(),
                    table: COMMENTS_TABLE.to_string(),
                },
            ]),
        }
    }

    pub fn dataset_sources(&self) -> Result<Vec<DatasetSource>> {
        let specs = self.dataset_specs()?;
        DatasetFile::validate_specs(&specs)?;
        specs.iter().map(DatasetSpec::resolve).collect()
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        if self.datasets.is_none() {
            validation::validate_url("posts_url", &self.posts_url)?;
            validation::validate_url("comments_url", &self.comments_url)?;
        }

        if let Some(host) = &self.snowflake.host {
            validation::validate_url("SNOWFLAKE_HOST", host)?;
        }

        Ok(())
    }
}

/// Snowflake connection settings. Every field is optional at parse time; the
/// required ones are checked when the connection is opened.
#[derive(Clone, Default, Args)]
pub struct SnowflakeConfig {
    #[arg(long = "snowflake-user", env = "SNOWFLAKE_USER")]
    pub user: Option<String>,

    #[arg(long = "snowflake-password", env = "SNOWFLAKE_PASSWORD", hide_env_values = true, hide = true)]
    pub password: Option<String>,

    #[arg(long = "snowflake-account", env = "SNOWFLAKE_ACCOUNT")]
    pub account: Option<String>,

    #[arg(long = "snowflake-warehouse", env = "SNOWFLAKE_WAREHOUSE")]
    pub warehouse: Option<String>,

    #[arg(long = "snowflake-database", env = "SNOWFLAKE_DATABASE")]
    pub database: Option<String>,

    #[arg(long = "snowflake-schema", env = "SNOWFLAKE_SCHEMA")]
    pub schema: Option<String>,

    #[arg(long = "snowflake-role", env = "SNOWFLAKE_ROLE")]
    pub role: Option<String>,

    /// Overrides https://<account>.snowflakecomputing.com
    #[arg(long = "snowflake-host", env = "SNOWFLAKE_HOST")]
    pub host: Option<String>,
}

#[derive(Clone)]
pub struct SnowflakeCredentials {
    pub user: String,
    pub password: String,
    pub account: String,
    pub warehouse: String,
    pub namespace: Namespace,
    pub role: Option<String>,
    pub base_url: String,
}

impl SnowflakeConfig {
    pub fn credentials(&self) -> Result<SnowflakeCredentials> {
        let user = validate_required_field("SNOWFLAKE_USER", &self.user)?;
        let password = validate_required_field("SNOWFLAKE_PASSWORD", &self.password)?;
        let account = validate_required_field("SNOWFLAKE_ACCOUNT", &self.account)?;
        let warehouse = validate_required_field("SNOWFLAKE_WAREHOUSE", &self.warehouse)?;
        let database = validate_required_field("SNOWFLAKE_DATABASE", &self.database)?;
        let schema = validate_required_field("SNOWFLAKE_SCHEMA", &self.schema)?;

        validation::validate_non_empty_string("SNOWFLAKE_ACCOUNT", account)?;
        let namespace = Namespace::new(database, schema)?;

        let base_url = match &self.host {
            Some(host) => host.trim_end_matches('/').to_string(),
            None => format!("https://{}.snowflakecomputing.com", account),
        };

        Ok(SnowflakeCredentials {
            user: user.clone(),
            password: password.clone(),
            account: account.clone(),
            warehouse: warehouse.clone(),
            namespace,
            role: self.role.clone(),
            base_url,
        })
    }
}

impl SnowflakeCredentials {
    /// The login payload wants the bare account locator, without region or cloud suffix.
    pub fn account_name(&self) -> String {
        self.account
            .split('.')
            .next()
            .unwrap_or(self.account.as_str())
            .to_ascii_uppercase()
    }
}

impl fmt::Debug for SnowflakeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnowflakeConfig")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("account", &self.account)
            .field("warehouse", &self.warehouse)
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("role", &self.role)
            .field("host", &self.host)
            .finish()
    }
}

impl fmt::Debug for SnowflakeCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnowflakeCredentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("account", &self.account)
            .field("warehouse", &self.warehouse)
            .field("namespace", &self.namespace)
            .field("role", &self.role)
            .field("base_url", &self.base_url)
            .finish()
    }
}
