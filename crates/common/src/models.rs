use conflux_error::{ConfluxError, ErrorCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

/// Backend families a connector can serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSourceKind {
    #[serde(alias = "postgres")]
    PostgreSql,
    ClickHouse,
    MySql,
    MongoDb,
}

impl DataSourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PostgreSql => "postgresql",
            Self::ClickHouse => "clickhouse",
            Self::MySql => "mysql",
            Self::MongoDb => "mongodb",
        }
    }
}

impl fmt::Display for DataSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataSourceKind {
    type Err = ConfluxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgresql" | "postgres" => Ok(Self::PostgreSql),
            "clickhouse" => Ok(Self::ClickHouse),
            "mysql" => Ok(Self::MySql),
            "mongodb" => Ok(Self::MongoDb),
            other => Err(ConfluxError::new(
                ErrorCode::UnsupportedSourceType,
                format!("unknown data source kind '{}'", other),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Endpoint {
    #[validate(length(min = 1))]
    pub host: String,
    #[validate(range(min = 1))]
    pub port: u16,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    #[serde(serialize_with = "serialize_redacted")]
    pub password: String,
}

fn serialize_redacted<S>(secret: &str, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    if secret.is_empty() {
        serializer.serialize_str("")
    } else {
        serializer.serialize_str("[REDACTED]")
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Everything needed to reach one external database.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DataSourceInstance {
    pub kind: DataSourceKind,
    #[validate(nested)]
    pub endpoint: Endpoint,
    #[validate(length(min = 1))]
    pub database: String,
    #[serde(default)]
    pub credentials: Credentials,
    #[serde(default)]
    pub use_tls: bool,
    /// Namespace for table lookups. Backends without schemas ignore it.
    #[serde(default)]
    pub schema: Option<String>,
}
