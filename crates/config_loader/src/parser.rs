//! 配置解析
//!
//! TOML 为主，JSON 可选。类型解析之后再检查键名：`[receivers]` 拼错会让
//! 所有 sink 静默关闭，所以未知的顶层段和 receiver 名直接报错。

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use contracts::{CollectorConfig, ContractError};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Deserialize;

/// Top-level keys of `CollectorConfig`
const SECTIONS: &[&str] = &[
    "log",
    "controller",
    "receivers",
    "leader_election",
    "observability",
];

/// Receiver names understood by the sink registry
const RECEIVERS: &[&str] = &["loki", "stdout"];

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// 从扩展名推断格式（大小写不敏感）
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    /// Format of a config file, judged by its extension
    pub fn from_path(path: &Path) -> Result<Self, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse(format!(
                "cannot determine config format of {}",
                path.display()
            ))
        })?;
        Self::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    /// 该格式的标准扩展名
    pub fn extension(self) -> &'static str {
        match self {
            Self::Toml => "toml",
            Self::Json => "json",
        }
    }

    fn decode<T: DeserializeOwned>(self, content: &str) -> Result<T, ContractError> {
        match self {
            Self::Toml => toml::from_str(content).map_err(|e| self.error(e)),
            Self::Json => serde_json::from_str(content).map_err(|e| self.error(e)),
        }
    }

    fn error<E>(self, e: E) -> ContractError
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ContractError::ConfigParse {
            message: format!("{self} parse error: {e}"),
            source: Some(Box::new(e)),
        }
    }
}

impl fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Toml => "TOML",
            Self::Json => "JSON",
        })
    }
}

/// Keys of a document with values skipped
type Keys = BTreeMap<String, IgnoredAny>;

#[derive(Deserialize)]
struct ReceiverNames {
    #[serde(default)]
    receivers: Keys,
}

fn reject_unknown<'a>(
    scope: &str,
    keys: impl IntoIterator<Item = &'a String>,
    known: &[&str],
) -> Result<(), ContractError> {
    match keys.into_iter().find(|k| !known.contains(&k.as_str())) {
        Some(key) => Err(ContractError::config_parse(format!(
            "unknown key '{key}' in {scope}, expected one of: {}",
            known.join(", ")
        ))),
        None => Ok(()),
    }
}

/// 解析配置并拒绝未知的段名
pub fn parse(content: &str, format: ConfigFormat) -> Result<CollectorConfig, ContractError> {
    let config: CollectorConfig = format.decode(content)?;

    let sections: Keys = format.decode(content)?;
    reject_unknown("config", sections.keys(), SECTIONS)?;
    let names: ReceiverNames = format.decode(content)?;
    reject_unknown("[receivers]", names.receivers.keys(), RECEIVERS)?;

    Ok(config)
}
