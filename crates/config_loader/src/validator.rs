//! Config validation
//!
//! Rules:
//! - field ranges declared on the contract types (`validator` derive)
//! - fail_after <= count
//! - finite base_value / step

use contracts::{ContractError, StreamConfig};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// Validate a StreamConfig
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(config: &StreamConfig) -> Result<(), ContractError> {
    config.validate().map_err(first_violation)?;
    validate_sources(config)?;
    Ok(())
}

/// Cross-field checks the derive cannot express
fn validate_sources(config: &StreamConfig) -> Result<(), ContractError> {
    for (idx, source) in config.sources.iter().enumerate() {
        if let Some(fail_after) = source.fail_after {
            if fail_after > source.count {
                return Err(ContractError::config_validation(
                    format!("sources[{idx}].fail_after"),
                    format!(
                        "fail_after ({fail_after}) must be <= count ({})",
                        source.count
                    ),
                ));
            }
        }
        if !source.base_value.is_finite() || !source.step.is_finite() {
            return Err(ContractError::config_validation(
                format!("sources[{idx}]"),
                "base_value and step must be finite",
            ));
        }
    }
    Ok(())
}

/// Flatten nested validator errors into the first `path: message` pair
fn first_violation(errors: ValidationErrors) -> ContractError {
    let (field, message) = walk(&errors, String::new())
        .unwrap_or_else(|| ("config".to_string(), errors.to_string()));
    ContractError::config_validation(field, message)
}

/// Fields are visited in name order so the reported violation is stable
fn walk(errors: &ValidationErrors, prefix: String) -> Option<(String, String)> {
    let mut fields: Vec<_> = errors.errors().iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));

    for (field, kind) in fields {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                if let Some(err) = list.first() {
                    let message = err
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| err.code.to_string());
                    return Some((path, message));
                }
            }
            ValidationErrorsKind::Struct(inner) => {
                if let Some(found) = walk(inner, path) {
                    return Some(found);
                }
            }
            ValidationErrorsKind::List(items) => {
                for (idx, inner) in items {
                    if let Some(found) = walk(inner, format!("{path}[{idx}]")) {
                        return Some(found);
                    }
                }
            }
        }
    }
    None
}
