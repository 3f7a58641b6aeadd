//! Configuration validation.
//!
//! Checks the environment file before any series is read.

use crate::domain::error::AlphaError;
use crate::ports::config_port::ConfigPort;

pub const ENVIRONMENT_SECTION: &str = "environment";
pub const DATA_PREFIX: &str = "data.";
pub const OPERATOR_PREFIX: &str = "operator.";

/// A constraint key in an `[operator.<name>]` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKey {
    Dimension(usize),
    Value(usize),
}

/// Parse `argN.dimension` or `argN.value`.
pub fn parse_constraint_key(key: &str) -> Option<ConstraintKey> {
    let (arg, kind) = key.split_once('.')?;
    let index: usize = arg.strip_prefix("arg")?.parse().ok()?;
    match kind {
        "dimension" => Some(ConstraintKey::Dimension(index)),
        "value" => Some(ConstraintKey::Value(index)),
        _ => None,
    }
}

pub fn validate_environment_config(config: &dyn ConfigPort) -> Result<(), AlphaError> {
    validate_data_dir(config)?;
    validate_operator_set(config)?;
    validate_universe(config)?;
    validate_data_sections(config)?;
    validate_calendar(config)?;
    validate_operator_sections(config)?;
    Ok(())
}

fn validate_data_dir(config: &dyn ConfigPort) -> Result<(), AlphaError> {
    match config.get_string(ENVIRONMENT_SECTION, "data_dir") {
        Some(s) if !s.trim().is_empty() => Ok(()),
        Some(_) => Err(AlphaError::ConfigInvalid {
            section: ENVIRONMENT_SECTION.to_string(),
            key: "data_dir".to_string(),
            reason: "data_dir must not be empty".to_string(),
        }),
        None => Err(AlphaError::ConfigMissing {
            section: ENVIRONMENT_SECTION.to_string(),
            key: "data_dir".to_string(),
        }),
    }
}

fn validate_operator_set(config: &dyn ConfigPort) -> Result<(), AlphaError> {
    match config.get_string(ENVIRONMENT_SECTION, "operators").as_deref() {
        None | Some("default") | Some("none") => Ok(()),
        Some(other) => Err(AlphaError::ConfigInvalid {
            section: ENVIRONMENT_SECTION.to_string(),
            key: "operators".to_string(),
            reason: format!("expected 'default' or 'none', got '{}'", other),
        }),
    }
}

fn validate_universe(config: &dyn ConfigPort) -> Result<(), AlphaError> {
    match config.get_list(ENVIRONMENT_SECTION, "universe") {
        Some(list) if list.is_empty() => Err(AlphaError::ConfigInvalid {
            section: ENVIRONMENT_SECTION.to_string(),
            key: "universe".to_string(),
            reason: "universe must name at least one instrument".to_string(),
        }),
        _ => Ok(()),
    }
}

/// Series names declared by `[data.<name>]` sections.
pub fn data_names(config: &dyn ConfigPort) -> Vec<String> {
    config
        .sections()
        .iter()
        .filter_map(|s| s.strip_prefix(DATA_PREFIX))
        .map(String::from)
        .collect()
}

fn validate_data_sections(config: &dyn ConfigPort) -> Result<(), AlphaError> {
    let names = data_names(config);
    if names.is_empty() {
        return Err(AlphaError::ConfigMissing {
            section: format!("{}<name>", DATA_PREFIX),
            key: "dimension".to_string(),
        });
    }
    if let Some(name) = names.iter().find(|n| n.trim().is_empty()) {
        return Err(AlphaError::ConfigInvalid {
            section: format!("{}{}", DATA_PREFIX, name),
            key: String::new(),
            reason: "series name must not be empty".to_string(),
        });
    }
    Ok(())
}

fn validate_calendar(config: &dyn ConfigPort) -> Result<(), AlphaError> {
    let Some(calendar) = config.get_string(ENVIRONMENT_SECTION, "calendar") else {
        return Ok(());
    };
    if data_names(config).iter().any(|name| *name == calendar) {
        Ok(())
    } else {
        Err(AlphaError::ConfigInvalid {
            section: ENVIRONMENT_SECTION.to_string(),
            key: "calendar".to_string(),
            reason: format!("'{}' is not a declared data series", calendar),
        })
    }
}

fn validate_operator_sections(config: &dyn ConfigPort) -> Result<(), AlphaError> {
    for section in config.sections() {
        if !section.starts_with(OPERATOR_PREFIX) {
            continue;
        }
        for key in config.keys(&section) {
            if parse_constraint_key(&key).is_none() {
                return Err(AlphaError::ConfigInvalid {
                    section: section.clone(),
                    key,
                    reason: "expected argN.dimension or argN.value".to_string(),
                });
            }
        }
    }
    Ok(())
}
