//! 配置校验模块
//!
//! 校验规则：
//! - 字段级规则由 `validator` derive 声明 (workers 范围, URL 格式, 选举时长顺序)
//! - Loki URL 必须为 http/https
//! - 静态标签可解析

use std::borrow::Cow;

use contracts::{CollectorConfig, ContractError};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// 校验 CollectorConfig 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &CollectorConfig) -> Result<(), ContractError> {
    if let Err(errors) = config.validate() {
        return Err(first_violation(&errors, ""));
    }
    validate_loki_scheme(config)?;
    Ok(())
}

/// 校验 Loki URL 协议
fn validate_loki_scheme(config: &CollectorConfig) -> Result<(), ContractError> {
    if let Some(loki) = &config.receivers.loki {
        let lower = loki.url.to_ascii_lowercase();
        if !lower.starts_with("http://") && !lower.starts_with("https://") {
            return Err(ContractError::config_validation(
                "receivers.loki.url",
                format!("unsupported scheme in '{}', expected http or https", loki.url),
            ));
        }
    }
    Ok(())
}

/// 将嵌套的 ValidationErrors 展开为第一条带路径的错误
fn first_violation(errors: &ValidationErrors, prefix: &str) -> ContractError {
    let mut fields: Vec<_> = errors.errors().iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));

    for (field, kind) in fields {
        let path = join_path(prefix, field);
        match kind {
            ValidationErrorsKind::Field(list) => {
                if let Some(error) = list.first() {
                    let message = error
                        .message
                        .clone()
                        .unwrap_or_else(|| Cow::Owned(format!("failed '{}' rule", error.code)));
                    return ContractError::config_validation(path, message);
                }
            }
            ValidationErrorsKind::Struct(nested) => return first_violation(nested, &path),
            ValidationErrorsKind::List(items) => {
                if let Some((idx, nested)) = items.iter().next() {
                    return first_violation(nested, &format!("{path}[{idx}]"));
                }
            }
        }
    }
    ContractError::config_validation(prefix, "invalid configuration")
}

fn join_path(prefix: &str, field: &str) -> String {
    match (prefix.is_empty(), field) {
        (true, _) => field.to_string(),
        (false, "__all__") => prefix.to_string(),
        (false, _) => format!("{prefix}.{field}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::LokiConfig;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&CollectorConfig::default()).is_ok());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = CollectorConfig::default();
        config.controller.workers = 0;
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("controller.workers"), "{err}");
    }

    #[test]
    fn test_non_http_loki_url_rejected() {
        let mut config = CollectorConfig::default();
        config.receivers.loki = Some(LokiConfig::new("ftp://loki:3100/push"));
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("unsupported scheme"), "{err}");
    }

    #[test]
    fn test_bad_labels_rejected() {
        let mut config = CollectorConfig::default();
        let mut loki = LokiConfig::new("http://loki:3100/loki/api/v1/push");
        loki.labels = "{cluster=dev}".to_string();
        config.receivers.loki = Some(loki);
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("receivers.loki.labels"), "{err}");
    }

    #[test]
    fn test_election_schema_error_reports_section() {
        let mut config = CollectorConfig::default();
        config.leader_election.renew_deadline_secs = 20;
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("leader_election"), "{err}");
    }
}
