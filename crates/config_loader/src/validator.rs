//! Settings validation
//!
//! Rules:
//! - field ranges declared on the settings types (`validator` derive)
//! - frame-aligned flushes need a frame no longer than the poll interval

use contracts::{FlushMode, ObserverError, ObserverSettings};
use validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};

/// Validate settings
///
/// Returns the first violation (ordered by field path), or Ok(()).
pub fn validate(settings: &ObserverSettings) -> Result<(), ObserverError> {
    validate_fields(settings)?;
    validate_frame_interval(settings)?;
    Ok(())
}

fn validate_fields(settings: &ObserverSettings) -> Result<(), ObserverError> {
    let Err(errors) = settings.validate() else {
        return Ok(());
    };

    let mut violations = Vec::new();
    flatten("", &errors, &mut violations);
    violations.sort();

    match violations.into_iter().next() {
        Some((field, message)) => Err(ObserverError::config_validation(field, message)),
        None => Err(ObserverError::config_validation("settings", errors.to_string())),
    }
}

fn validate_frame_interval(settings: &ObserverSettings) -> Result<(), ObserverError> {
    let engine = &settings.engine;
    if engine.flush_mode == FlushMode::Frame && engine.frame_interval_ms > engine.poll_interval_ms {
        return Err(ObserverError::config_validation(
            "engine.frame_interval_ms",
            format!(
                "frame_interval_ms ({}) must be <= poll_interval_ms ({}) when flush_mode is frame",
                engine.frame_interval_ms, engine.poll_interval_ms
            ),
        ));
    }
    Ok(())
}

/// Collect `(field path, message)` pairs from nested validation errors
fn flatten(prefix: &str, errors: &ValidationErrors, out: &mut Vec<(String, String)>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };

        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                out.extend(field_errors.iter().map(|e| (path.clone(), describe(e))));
            }
            ValidationErrorsKind::Struct(nested) => flatten(&path, nested, out),
            ValidationErrorsKind::List(items) => {
                for (idx, nested) in items {
                    flatten(&format!("{path}[{idx}]"), nested, out);
                }
            }
        }
    }
}

fn describe(error: &ValidationError) -> String {
    if let Some(message) = &error.message {
        return message.to_string();
    }

    let mut params: Vec<String> = error
        .params
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect();
    params.sort();

    if params.is_empty() {
        format!("failed '{}' check", error.code)
    } else {
        format!("failed '{}' check ({})", error.code, params.join(", "))
    }
}
