use anyhow::{Context, Result, bail};
use clap::Parser;
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use std::{env, fmt, net::SocketAddr, path::PathBuf, str::FromStr};

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DB_PORT: u16 = 5432;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_STORAGE_DIR: &str = "./data/objects";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;
const DEFAULT_LOG_MAX_SIZE_MB: u64 = 5;
const DEFAULT_LOG_MAX_FILES: usize = 5;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database: DatabaseConfig,
    pub object_store: ObjectStoreConfig,
    pub max_upload_bytes: usize,
    pub environment: Environment,
    pub log_format: LogFormat,
    pub log_file: Option<LogFileConfig>,
    pub metrics_port: Option<u16>,
}

/// Deployment environment, from `APP_ENV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    /// Build everything but never bind the listener.
    Test,
    Production,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Size-rotated JSON log file, from `LOG_FILE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFileConfig {
    pub path: PathBuf,
    /// Rotate once the active file reaches this many megabytes.
    pub max_size_mb: u64,
    /// Rotated files kept next to the active one.
    pub max_files: usize,
}

/// Postgres connection settings: either a full URL or discrete parts.
#[derive(Clone)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub ssl: bool,
    pub max_connections: u32,
}

/// Where uploaded payloads live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectStoreConfig {
    S3 {
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
        force_path_style: bool,
    },
    Local {
        dir: PathBuf,
    },
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "File upload and metadata API")]
pub struct Args {
    /// Host to bind to (overrides HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// S3 bucket for uploads (overrides S3_BUCKET)
    #[arg(long)]
    pub s3_bucket: Option<String>,

    /// Directory for the local object store (overrides STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        let cfg = Self::resolve(args, |key| env::var(key).ok())?;
        Ok((cfg, migrate))
    }

    /// Merge CLI arguments over values from `lookup`. Empty values count as unset.
    pub fn resolve(args: Args, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let environment = match var("APP_ENV").as_deref().map(str::to_ascii_lowercase) {
            None => Environment::Development,
            Some(value) => match value.as_str() {
                "test" => Environment::Test,
                "production" | "prod" => Environment::Production,
                "development" | "dev" => Environment::Development,
                other => bail!("unknown APP_ENV `{}`", other),
            },
        };

        let log_format = match var("LOG_FORMAT").as_deref().map(str::to_ascii_lowercase) {
            Some(value) if value == "json" => LogFormat::Json,
            Some(value) if value == "pretty" => LogFormat::Pretty,
            Some(value) => bail!("unknown LOG_FORMAT `{}`", value),
            None if environment == Environment::Production => LogFormat::Json,
            None => LogFormat::Pretty,
        };

        let log_file = match var("LOG_FILE") {
            Some(path) => Some(LogFileConfig {
                path: path.into(),
                max_size_mb: parse_var(&var, "LOG_MAX_SIZE_MB", DEFAULT_LOG_MAX_SIZE_MB)?,
                max_files: parse_var(&var, "LOG_MAX_FILES", DEFAULT_LOG_MAX_FILES)?,
            }),
            None => None,
        };

        // --- Database ---
        let database = DatabaseConfig {
            url: args.database_url.or_else(|| var("DATABASE_URL")),
            host: var("DB_HOST").unwrap_or_else(|| "localhost".into()),
            port: parse_var(&var, "DB_PORT", DEFAULT_DB_PORT)?,
            user: var("DB_USER").unwrap_or_else(|| "postgres".into()),
            password: var("DB_PASSWORD").unwrap_or_default(),
            name: var("DB_NAME").unwrap_or_else(|| "postgres".into()),
            ssl: match var("DB_SSL") {
                Some(value) => parse_bool(&value).context("parsing DB_SSL")?,
                None => true,
            },
            max_connections: parse_var(&var, "DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS)?,
        };

        // --- Object store ---
        let object_store = match args.s3_bucket.or_else(|| var("S3_BUCKET")) {
            Some(bucket) => ObjectStoreConfig::S3 {
                bucket,
                region: var("AWS_REGION").unwrap_or_else(|| DEFAULT_REGION.into()),
                endpoint_url: var("S3_ENDPOINT_URL"),
                force_path_style: match var("S3_FORCE_PATH_STYLE") {
                    Some(value) => parse_bool(&value).context("parsing S3_FORCE_PATH_STYLE")?,
                    None => false,
                },
            },
            None => ObjectStoreConfig::Local {
                dir: args
                    .storage_dir
                    .or_else(|| var("STORAGE_DIR"))
                    .unwrap_or_else(|| DEFAULT_STORAGE_DIR.into())
                    .into(),
            },
        };

        let metrics_port = match var("METRICS_PORT") {
            Some(value) => Some(
                value
                    .parse::<u16>()
                    .with_context(|| format!("parsing METRICS_PORT value `{}`", value))?,
            ),
            None => None,
        };

        Ok(Self {
            host: args
                .host
                .or_else(|| var("HOST"))
                .unwrap_or_else(|| "0.0.0.0".into()),
            port: match args.port {
                Some(port) => port,
                None => parse_var(&var, "PORT", DEFAULT_PORT)?,
            },
            database,
            object_store,
            max_upload_bytes: parse_var(&var, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            environment,
            log_format,
            log_file,
            metrics_port,
        })
    }

    /// Production with a log file writes to the file only.
    pub fn log_to_console(&self) -> bool {
        self.log_file.is_none() || self.environment != Environment::Production
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn metrics_addr(&self) -> Option<SocketAddr> {
        self.metrics_port
            .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    }
}

impl DatabaseConfig {
    /// Connection options for sqlx. A URL wins over discrete settings.
    pub fn connect_options(&self) -> Result<PgConnectOptions> {
        if let Some(url) = &self.url {
            return PgConnectOptions::from_str(url).context("parsing DATABASE_URL");
        }

        let ssl_mode = if self.ssl {
            PgSslMode::Require
        } else {
            PgSslMode::Prefer
        };

        Ok(PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.name)
            .ssl_mode(ssl_mode))
    }
}

// Credentials stay out of the startup log.
impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &self.url.as_ref().map(|_| "<redacted>"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("name", &self.name)
            .field("ssl", &self.ssl)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

fn parse_var<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", key, value)),
        None => Ok(default),
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("expected a boolean, got `{}`", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn resolve(args: &[&str], vars: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let mut argv = vec!["file-service"];
        argv.extend_from_slice(args);
        AppConfig::resolve(Args::parse_from(argv), |key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let cfg = resolve(&[], &[]).unwrap();
        assert_eq!(cfg.addr(), "0.0.0.0:8080");
        assert_eq!(cfg.environment, Environment::Development);
        assert_eq!(cfg.log_format, LogFormat::Pretty);
        assert_eq!(
            cfg.object_store,
            ObjectStoreConfig::Local {
                dir: PathBuf::from("./data/objects")
            }
        );
        assert!(cfg.database.ssl);
        assert_eq!(cfg.database.port, 5432);
        assert_eq!(cfg.max_upload_bytes, 25 * 1024 * 1024);
        assert!(cfg.metrics_addr().is_none());
        assert!(cfg.log_file.is_none());
        assert!(cfg.log_to_console());
    }

    #[test]
    fn log_file_rotation_settings() {
        let cfg = resolve(&[], &[("LOG_FILE", "/var/log/file-service.log")]).unwrap();
        assert_eq!(
            cfg.log_file,
            Some(LogFileConfig {
                path: PathBuf::from("/var/log/file-service.log"),
                max_size_mb: 5,
                max_files: 5,
            })
        );
        assert!(cfg.log_to_console());

        let cfg = resolve(
            &[],
            &[
                ("APP_ENV", "production"),
                ("LOG_FILE", "app.log"),
                ("LOG_MAX_SIZE_MB", "20"),
                ("LOG_MAX_FILES", "2"),
            ],
        )
        .unwrap();
        let log_file = cfg.log_file.clone().unwrap();
        assert_eq!((log_file.max_size_mb, log_file.max_files), (20, 2));
        assert!(!cfg.log_to_console());
    }

    #[test]
    fn bucket_selects_s3_backend() {
        let cfg = resolve(
            &[],
            &[
                ("S3_BUCKET", "uploads"),
                ("AWS_REGION", "eu-west-1"),
                ("S3_FORCE_PATH_STYLE", "true"),
            ],
        )
        .unwrap();
        assert_eq!(
            cfg.object_store,
            ObjectStoreConfig::S3 {
                bucket: "uploads".into(),
                region: "eu-west-1".into(),
                endpoint_url: None,
                force_path_style: true,
            }
        );
    }

    #[test]
    fn cli_overrides_environment() {
        let cfg = resolve(
            &["--port", "9000", "--storage-dir", "/tmp/blobs"],
            &[("PORT", "7000"), ("STORAGE_DIR", "/srv/blobs")],
        )
        .unwrap();
        assert_eq!(cfg.port, 9000);
        assert_eq!(
            cfg.object_store,
            ObjectStoreConfig::Local {
                dir: PathBuf::from("/tmp/blobs")
            }
        );
    }

    #[test]
    fn discrete_database_settings() {
        let cfg = resolve(
            &[],
            &[
                ("DB_HOST", "db.internal"),
                ("DB_PORT", "6543"),
                ("DB_USER", "app"),
                ("DB_PASSWORD", "secret"),
                ("DB_NAME", "files"),
                ("DB_SSL", "false"),
            ],
        )
        .unwrap();
        assert!(!cfg.database.ssl);
        assert_eq!(cfg.database.port, 6543);

        let options = cfg.database.connect_options().unwrap();
        assert_eq!(options.get_host(), "db.internal");
        assert_eq!(options.get_port(), 6543);
        assert_eq!(options.get_username(), "app");
        assert_eq!(options.get_database(), Some("files"));

        let debug = format!("{:?}", cfg.database);
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn production_defaults_to_json_logs() {
        let cfg = resolve(&[], &[("APP_ENV", "production")]).unwrap();
        assert_eq!(cfg.log_format, LogFormat::Json);

        let cfg = resolve(&[], &[("APP_ENV", "test"), ("LOG_FORMAT", "pretty")]).unwrap();
        assert_eq!(cfg.environment, Environment::Test);
        assert_eq!(cfg.log_format, LogFormat::Pretty);
    }

    #[test]
    fn empty_values_are_ignored() {
        let cfg = resolve(&[], &[("S3_BUCKET", ""), ("PORT", " ")]).unwrap();
        assert!(matches!(cfg.object_store, ObjectStoreConfig::Local { .. }));
        assert_eq!(cfg.port, 8080);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(resolve(&[], &[("PORT", "eighty")]).is_err());
        assert!(resolve(&[], &[("DB_SSL", "maybe")]).is_err());
        assert!(resolve(&[], &[("APP_ENV", "staging")]).is_err());
    }
}
