use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::infra::workbook::ConfigError;

pub const EX_USAGE: u8 = 64;
pub const EX_UNAVAILABLE: u8 = 69;
pub const EX_CANTCREAT: u8 = 73;
pub const EX_CONFIG: u8 = 78;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum DatabaseKind {
    Postgres,
    Mysql,
}

impl DatabaseKind {
    pub fn profile_key(&self) -> &'static str {
        match self {
            DatabaseKind::Postgres => "postgres",
            DatabaseKind::Mysql => "mysql",
        }
    }
}

/// `SimpleDataMiner.json` 中的一个连接配置
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionProfile {
    pub connection_string: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub server: Option<String>,
    pub database_name: Option<String>,
}

/// 命令行给出的连接参数，优先于配置文件
#[derive(Debug, Clone, Default)]
pub struct ConnectionOverrides {
    pub username: Option<String>,
    pub password: Option<String>,
    pub server: Option<String>,
    pub database_name: Option<String>,
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("missing definition for \"{0}\"")]
    Missing(&'static str),

    #[error("configuration file {} failed to load: {source}", path.display())]
    ReadProfiles {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration file {} is not valid: {source}", path.display())]
    ParseProfiles {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("database type {0} not found in the configuration file")]
    Profile(&'static str),

    #[error("cannot create log file {}: {source}", path.display())]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("connection error for database {database}: {source}")]
    Connect {
        database: String,
        #[source]
        source: sqlx::Error,
    },

    #[error(transparent)]
    Workbook(#[from] ConfigError),
}

impl StartupError {
    /// 对应的 sysexits 退出码
    pub fn exit_code(&self) -> u8 {
        match self {
            StartupError::Missing(_) => EX_USAGE,
            StartupError::ReadProfiles { .. }
            | StartupError::ParseProfiles { .. }
            | StartupError::Profile(_) => EX_CONFIG,
            StartupError::LogFile { .. } => EX_CANTCREAT,
            // 服务器已应答，说明是配置有误
            StartupError::Connect {
                source: sqlx::Error::Database(_),
                ..
            } => EX_CONFIG,
            StartupError::Connect { .. } => EX_UNAVAILABLE,
            StartupError::Workbook(ConfigError::Metadata(_)) => EX_UNAVAILABLE,
            StartupError::Workbook(_) => EX_CONFIG,
        }
    }
}

pub fn load_profiles(path: &Path) -> Result<HashMap<String, ConnectionProfile>, StartupError> {
    let raw = std::fs::read_to_string(path).map_err(|source| StartupError::ReadProfiles {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| StartupError::ParseProfiles {
        path: path.to_path_buf(),
        source,
    })
}

/// 应用覆盖参数后的数据库名和连接 URL
pub fn resolve(
    kind: DatabaseKind,
    profiles: &HashMap<String, ConnectionProfile>,
    overrides: ConnectionOverrides,
) -> Result<(String, String), StartupError> {
    let key = kind.profile_key();
    let profile = profiles.get(key).ok_or(StartupError::Profile(key))?;

    let username = overrides
        .username
        .or_else(|| profile.username.clone())
        .ok_or(StartupError::Missing("username"))?;
    let password = overrides
        .password
        .or_else(|| profile.password.clone())
        .ok_or(StartupError::Missing("password"))?;
    let server = overrides
        .server
        .or_else(|| profile.server.clone())
        .ok_or(StartupError::Missing("server"))?;
    let database_name = overrides
        .database_name
        .or_else(|| profile.database_name.clone())
        .ok_or(StartupError::Missing("databaseName"))?;

    let url = profile
        .connection_string
        .replace("{username}", &username)
        .replace("{password}", &password)
        .replace("{server}", &server)
        .replace("{databaseName}", &database_name);
    Ok((database_name, url))
}
