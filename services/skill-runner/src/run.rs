//! Build inputs from configuration, match, and assess skill.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use comparison::metrics::parse_metric_list;
use comparison::{match_many, ComparerCollection, GroupBy, MatchOptions, Metric, SkillTable};
use model_result::{ModelResult, PointModelResult, TrackModelResult};
use timeseries::{Observation, PointObservation, SeriesReader, TrackObservation};
use tracing::info;

use crate::config::{EntryKind, ModelEntry, ObservationEntry, RunnerConfig};

/// What to compute and where to write it.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Overrides the configured metrics.
    pub metrics: Option<Vec<Metric>>,
    pub by: Option<Vec<GroupBy>>,
    /// Skill table CSV.
    pub output: Option<PathBuf>,
    /// Directory for one JSON file per comparer.
    pub save_dir: Option<PathBuf>,
}

pub fn build_observation(key: &str, entry: &ObservationEntry, reader: &dyn SeriesReader) -> Result<Observation> {
    let source = &entry.source;
    let table = reader
        .read(Path::new(&source.filename))
        .with_context(|| format!("Failed to read observation '{key}'"))?;
    let name = source.name.clone().unwrap_or_else(|| key.to_string());
    let keep_duplicates = entry.keep_duplicates.as_ref().map(|k| k.to_policy()).transpose()?;

    let observation: Observation = match source.kind {
        EntryKind::Point => {
            let mut builder = PointObservation::builder(table)
                .name(name)
                .position(source.x, source.y, source.z)
                .aux_items(source.aux_items.clone());
            if let Some(item) = &source.item {
                builder = builder.item(item.clone());
            }
            if let Some(quantity) = &source.quantity {
                builder = builder.quantity(quantity.clone());
            }
            if let Some(policy) = keep_duplicates {
                builder = builder.keep_duplicates(policy);
            }
            if let Some(weight) = entry.weight {
                builder = builder.weight(weight);
            }
            builder.build()?.into()
        }
        EntryKind::Track => {
            let mut builder = TrackObservation::builder(table)
                .name(name)
                .aux_items(source.aux_items.clone());
            if let Some(item) = &source.item {
                builder = builder.item(item.clone());
            }
            if let Some(x_item) = &source.x_item {
                builder = builder.x_item(x_item.clone());
            }
            if let Some(y_item) = &source.y_item {
                builder = builder.y_item(y_item.clone());
            }
            if let Some(quantity) = &source.quantity {
                builder = builder.quantity(quantity.clone());
            }
            if let Some(policy) = keep_duplicates {
                builder = builder.keep_duplicates(policy);
            }
            if let Some(weight) = entry.weight {
                builder = builder.weight(weight);
            }
            builder.build()?.into()
        }
    };
    info!(observation = %observation.name(), n_points = observation.n_points(), "Loaded observation");
    Ok(observation)
}

pub fn build_model(key: &str, entry: &ModelEntry, reader: &dyn SeriesReader) -> Result<ModelResult> {
    let source = &entry.source;
    let table = reader
        .read(Path::new(&source.filename))
        .with_context(|| format!("Failed to read model result '{key}'"))?;
    let name = source.name.clone().unwrap_or_else(|| key.to_string());

    let model: ModelResult = match source.kind {
        EntryKind::Point => {
            let mut builder = PointModelResult::from_table(table)
                .name(name)
                .position(source.x, source.y, source.z)
                .aux_items(source.aux_items.clone());
            if let Some(item) = &source.item {
                builder = builder.item(item.clone());
            }
            if let Some(quantity) = &source.quantity {
                builder = builder.quantity(quantity.clone());
            }
            builder.build()?.into()
        }
        EntryKind::Track => {
            let mut builder = TrackModelResult::from_table(table)
                .name(name)
                .aux_items(source.aux_items.clone());
            if let Some(item) = &source.item {
                builder = builder.item(item.clone());
            }
            if let Some(x_item) = &source.x_item {
                builder = builder.x_item(x_item.clone());
            }
            if let Some(y_item) = &source.y_item {
                builder = builder.y_item(y_item.clone());
            }
            if let Some(quantity) = &source.quantity {
                builder = builder.quantity(quantity.clone());
            }
            builder.build()?.into()
        }
    };
    info!(model = %model.name(), "Loaded model result");
    Ok(model)
}

/// Read every included entry and match all observations with all models.
pub fn match_from_config(config: &RunnerConfig, reader: &dyn SeriesReader) -> Result<ComparerCollection> {
    let models = config
        .included_models()
        .map(|(key, entry)| build_model(key, entry, reader))
        .collect::<Result<Vec<_>>>()?;
    let observations = config
        .included_observations()
        .map(|(key, entry)| build_observation(key, entry, reader))
        .collect::<Result<Vec<_>>>()?;

    let mut options = MatchOptions::default();
    if let Some(gap) = config.max_model_gap {
        options = options.with_max_model_gap_secs(gap)?;
    }

    let cc = match_many(&observations, &models, &options)?;
    info!(
        comparers = cc.len(),
        models = models.len(),
        n_points = cc.n_points(),
        "Matched observations with model results"
    );
    Ok(cc)
}

/// Match, compute the skill table, and write the requested outputs.
pub fn run(config: &RunnerConfig, reader: &dyn SeriesReader, options: &RunOptions) -> Result<SkillTable> {
    let cc = match_from_config(config, reader)?;
    anyhow::ensure!(!cc.is_empty(), "No observation overlaps any model result");

    let metrics = match (&options.metrics, &config.metrics) {
        (Some(m), _) => Some(m.clone()),
        (None, Some(names)) => Some(parse_metric_list(&names.join(","))?),
        (None, None) => None,
    };
    let table = cc.skill(options.by.as_deref(), metrics.as_deref())?;

    if let Some(path) = &options.output {
        let file = fs::File::create(path).with_context(|| format!("Failed to create {path:?}"))?;
        table.write_csv(file)?;
        info!(path = %path.display(), rows = table.len(), "Wrote skill table");
    }

    if let Some(dir) = &options.save_dir {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {dir:?}"))?;
        for cmp in &cc {
            cmp.save(dir.join(format!("{}.json", cmp.name())))?;
        }
    }

    Ok(table)
}
