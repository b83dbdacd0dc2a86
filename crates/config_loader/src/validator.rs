//! 配置校验模块
//!
//! 校验规则：
//! - derive 规则 (retry_limit >= 1, event_log_capacity >= 1,
//!   keep_history >= 0, relaxation ∈ [0, 1])
//! - 日志级别可识别 (支持 `info,sync_engine=debug` 形式)
//! - metrics 端口非 0

use contracts::{EngineSettings, LinkError};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// 可识别的日志级别
const KNOWN_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

/// 校验 EngineSettings 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(settings: &EngineSettings) -> Result<(), LinkError> {
    validate_rules(settings)?;
    validate_log_level(settings)?;
    validate_metrics_port(settings)?;
    Ok(())
}

/// derive 规则校验，错误映射为字段路径
fn validate_rules(settings: &EngineSettings) -> Result<(), LinkError> {
    match settings.validate() {
        Ok(()) => Ok(()),
        Err(errors) => {
            let (field, message) = first_error("", &errors)
                .unwrap_or_else(|| (String::from("settings"), errors.to_string()));
            Err(LinkError::config_validation(field, message))
        }
    }
}

/// 按字段名排序后取第一个错误，保证报错稳定
fn first_error(prefix: &str, errors: &ValidationErrors) -> Option<(String, String)> {
    let mut fields: Vec<_> = errors.errors().iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));

    for (name, kind) in fields {
        let path = if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{prefix}.{name}")
        };
        let found = match kind {
            ValidationErrorsKind::Field(list) => list.first().map(|e| {
                let message = e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("rule '{}' violated", e.code));
                (path.clone(), message)
            }),
            ValidationErrorsKind::Struct(inner) => first_error(&path, inner),
            ValidationErrorsKind::List(items) => items
                .iter()
                .find_map(|(idx, inner)| first_error(&format!("{path}[{idx}]"), inner)),
        };
        if found.is_some() {
            return found;
        }
    }
    None
}

/// 校验日志级别 (EnvFilter 指令中的级别部分)
fn validate_log_level(settings: &EngineSettings) -> Result<(), LinkError> {
    let level = settings.logging.level.trim();
    if level.is_empty() {
        return Err(LinkError::config_validation(
            "logging.level",
            "log level cannot be empty",
        ));
    }

    for directive in level.split(',').map(str::trim).filter(|d| !d.is_empty()) {
        let level_part = directive.rsplit('=').next().unwrap_or(directive);
        if !KNOWN_LEVELS.contains(&level_part.to_lowercase().as_str()) {
            return Err(LinkError::config_validation(
                "logging.level",
                format!("unknown log level '{level_part}'"),
            ));
        }
    }
    Ok(())
}

/// 校验 metrics 端口
fn validate_metrics_port(settings: &EngineSettings) -> Result<(), LinkError> {
    if settings.logging.metrics_port == Some(0) {
        return Err(LinkError::config_validation(
            "logging.metrics_port",
            "metrics_port must be > 0",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::ExtrapolationPolicy;

    fn field_of(err: LinkError) -> String {
        match err {
            LinkError::ConfigValidation { field, .. } => field,
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&EngineSettings::default()).is_ok());
    }

    #[test]
    fn test_zero_retry_limit() {
        let mut settings = EngineSettings::default();
        settings.engine.retry_limit = 0;
        let err = validate(&settings).unwrap_err();
        assert_eq!(field_of(err), "engine.retry_limit");
    }

    #[test]
    fn test_zero_event_log_capacity() {
        let mut settings = EngineSettings::default();
        settings.engine.event_log_capacity = 0;
        let err = validate(&settings).unwrap_err();
        assert_eq!(field_of(err), "engine.event_log_capacity");
    }

    #[test]
    fn test_negative_keep_history() {
        let mut settings = EngineSettings::default();
        settings.engine.cache.keep_history = Some(-1.0);
        let err = validate(&settings).unwrap_err();
        assert_eq!(field_of(err), "engine.cache.keep_history");
    }

    #[test]
    fn test_relaxation_out_of_range() {
        let mut settings = EngineSettings::default();
        settings.engine.cache.extrapolation = ExtrapolationPolicy::Linear { relaxation: 2.0 };
        let err = validate(&settings).unwrap_err();
        assert_eq!(field_of(err), "engine.cache.extrapolation");
    }

    #[test]
    fn test_unknown_log_level() {
        let mut settings = EngineSettings::default();
        settings.logging.level = "verbose".into();
        let err = validate(&settings).unwrap_err().to_string();
        assert!(err.contains("unknown log level"), "got: {err}");
    }

    #[test]
    fn test_filter_directives_accepted() {
        let mut settings = EngineSettings::default();
        settings.logging.level = "info,sync_engine=debug".into();
        assert!(validate(&settings).is_ok());
    }

    #[test]
    fn test_zero_metrics_port() {
        let mut settings = EngineSettings::default();
        settings.logging.metrics_port = Some(0);
        let err = validate(&settings).unwrap_err();
        assert_eq!(field_of(err), "logging.metrics_port");
    }
}
