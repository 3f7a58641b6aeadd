//! Environment assembly from configuration and a series source.

use crate::domain::catalog::OperatorCatalog;
use crate::domain::config_validation::{
    ConstraintKey, DATA_PREFIX, ENVIRONMENT_SECTION, OPERATOR_PREFIX, data_names,
    parse_constraint_key, validate_environment_config,
};
use crate::domain::dimension::Dimension;
use crate::domain::environment::Environment;
use crate::domain::error::AlphaError;
use crate::domain::frame::Frame;
use crate::domain::node::ArgConstraint;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::SeriesPort;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

/// A `[data.<name>]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesSpec {
    pub name: String,
    pub source: String,
    pub dimension: Dimension,
}

pub fn series_specs(config: &dyn ConfigPort) -> Vec<SeriesSpec> {
    data_names(config)
        .into_iter()
        .map(|name| {
            let section = format!("{}{}", DATA_PREFIX, name);
            let source = config
                .get_string(&section, "series")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| name.clone());
            let dimension = config
                .get_string(&section, "dimension")
                .map(|text| Dimension::parse(&text))
                .unwrap_or_default();
            SeriesSpec {
                name,
                source,
                dimension,
            }
        })
        .collect()
}

/// Series the source offers that no `[data.<name>]` section reads.
pub fn undeclared_series(
    config: &dyn ConfigPort,
    source: &dyn SeriesPort,
) -> Result<Vec<String>, AlphaError> {
    let declared: BTreeSet<String> = series_specs(config)
        .into_iter()
        .map(|spec| spec.source)
        .collect();
    Ok(source
        .list_series()?
        .into_iter()
        .filter(|name| !declared.contains(name))
        .collect())
}

/// Union of the dates of every series.
pub fn build_unified_calendar(frames: &[Frame]) -> Vec<NaiveDate> {
    let unique_dates: BTreeSet<NaiveDate> = frames
        .iter()
        .flat_map(|frame| frame.dates().iter().copied())
        .collect();
    unique_dates.into_iter().collect()
}

/// Per-argument constraints from one `[operator.<name>]` section.
fn section_constraints(
    config: &dyn ConfigPort,
    section: &str,
) -> Result<BTreeMap<usize, ArgConstraint>, AlphaError> {
    let mut constraints: BTreeMap<usize, ArgConstraint> = BTreeMap::new();
    for key in config.keys(section) {
        let parsed = parse_constraint_key(&key).ok_or_else(|| AlphaError::ConfigInvalid {
            section: section.to_string(),
            key: key.clone(),
            reason: "expected argN.dimension or argN.value".to_string(),
        })?;
        let value = config.get_string(section, &key).unwrap_or_default();
        match parsed {
            ConstraintKey::Dimension(index) => {
                constraints.entry(index).or_default().dimension = Some(Dimension::parse(&value));
            }
            ConstraintKey::Value(index) => {
                constraints.entry(index).or_default().values =
                    Some(ArgConstraint::parse_values(&value));
            }
        }
    }
    Ok(constraints)
}

/// Build an environment from a validated configuration and a series source.
///
/// Constraints in `[operator.<name>]` sections replace the library's
/// constraint on the arguments they name.
pub fn build_environment(
    config: &dyn ConfigPort,
    source: &dyn SeriesPort,
) -> Result<Environment, AlphaError> {
    validate_environment_config(config)?;

    let specs = series_specs(config);
    let frames = specs
        .iter()
        .map(|spec| source.load_series(&spec.source))
        .collect::<Result<Vec<Frame>, _>>()?;

    let universe = match config.get_list(ENVIRONMENT_SECTION, "universe") {
        Some(universe) => universe,
        None => frames
            .first()
            .map(|frame| frame.columns().to_vec())
            .unwrap_or_default(),
    };
    let frames = frames
        .iter()
        .zip(&specs)
        .map(|(frame, spec)| {
            frame.select(&universe).map_err(|e| AlphaError::Data {
                reason: format!("series '{}': {}", spec.name, e),
            })
        })
        .collect::<Result<Vec<Frame>, _>>()?;

    let calendar = match config.get_string(ENVIRONMENT_SECTION, "calendar") {
        Some(name) => specs
            .iter()
            .position(|spec| spec.name == name)
            .map(|i| frames[i].dates().to_vec())
            .ok_or_else(|| AlphaError::ConfigInvalid {
                section: ENVIRONMENT_SECTION.to_string(),
                key: "calendar".to_string(),
                reason: format!("'{}' is not a declared data series", name),
            })?,
        None => build_unified_calendar(&frames),
    };

    let operators = match config.get_string(ENVIRONMENT_SECTION, "operators").as_deref() {
        Some("none") => OperatorCatalog::new(),
        _ => OperatorCatalog::with_defaults(),
    };

    let mut env = Environment::new(calendar, universe, operators);
    for (spec, frame) in specs.into_iter().zip(frames) {
        env.add_data(&spec.name, frame, spec.dimension)?;
    }

    for section in config.sections() {
        let Some(name) = section.strip_prefix(OPERATOR_PREFIX) else {
            continue;
        };
        if !env.operators().contains(name) {
            warn!(operator = name, "skipping constraints for an operator that is not in the catalog");
            continue;
        }
        for (index, constraint) in section_constraints(config, &section)? {
            env.constrain(name, index, constraint)?;
        }
    }

    info!(
        series = env.data_names().count(),
        operators = env.operators().len(),
        instruments = env.universe().len(),
        first = ?env.calendar().first(),
        last = ?env.calendar().last(),
        "environment ready"
    );
    Ok(env)
}
