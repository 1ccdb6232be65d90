//! Normalisation of tabular input into point and track series.
//!
//! Shared by observations and model results:
//! 1. synonym columns are renamed (`lon` -> `x`, `date` -> `time`, ...)
//! 2. the time axis is extracted and rounded to 100 µs
//! 3. value, position and auxiliary items are resolved by name or index
//! 4. repeated timestamps are resolved with the duplicate policy
//! 5. for observations, rows without a value are dropped

use chrono::NaiveDateTime;
use skill_common::{ItemRef, Quantity, SkillError, SkillResult};

use crate::coords::Coordinates;
use crate::duplicates::{resolve_duplicates, DuplicatePolicy};
use crate::series::TimeSeries;
use crate::synonyms::{canonical_name, reconcile_names};
use crate::table::{Column, DataTable};
use crate::variable::{VarKind, Variable};

/// Options for building a fixed-position series.
#[derive(Debug, Clone, Default)]
pub struct PointInput {
    pub item: Option<ItemRef>,
    pub aux_items: Vec<ItemRef>,
    pub name: Option<String>,
    pub quantity: Option<Quantity>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
    pub keep_duplicates: DuplicatePolicy,
}

/// Options for building a moving-position series.
#[derive(Debug, Clone, Default)]
pub struct TrackInput {
    pub item: Option<ItemRef>,
    pub aux_items: Vec<ItemRef>,
    pub name: Option<String>,
    pub quantity: Option<Quantity>,
    /// Defaults to the `x` column if present, otherwise the first column.
    pub x_item: Option<ItemRef>,
    /// Defaults to the `y` column if present, otherwise the second column.
    pub y_item: Option<ItemRef>,
    pub keep_duplicates: DuplicatePolicy,
}

struct Prepared {
    time: Vec<NaiveDateTime>,
    columns: Vec<Column>,
}

impl Prepared {
    fn new(mut table: DataTable) -> SkillResult<Self> {
        reconcile_names(table.columns_mut());
        let (time, columns) = table.into_time_indexed()?;
        Ok(Self { time, columns })
    }

    fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Resolve an item, also accepting the pre-rename name of a synonym column.
    fn resolve(&self, item: &ItemRef) -> SkillResult<usize> {
        match item.resolve(&self.names()) {
            Err(SkillError::NotFound(msg)) => match item {
                ItemRef::Name(name) => canonical_name(name)
                    .and_then(|c| self.position(c))
                    .ok_or(SkillError::NotFound(msg)),
                ItemRef::Index(_) => Err(SkillError::NotFound(msg)),
            },
            other => other,
        }
    }

    fn resolve_unique(&self, items: &[ItemRef]) -> SkillResult<Vec<usize>> {
        let mut resolved = Vec::with_capacity(items.len());
        for item in items {
            let idx = self.resolve(item)?;
            if resolved.contains(&idx) {
                return Err(SkillError::invalid_value(format!(
                    "item '{}' is selected more than once",
                    self.columns[idx].name
                )));
            }
            resolved.push(idx);
        }
        Ok(resolved)
    }

    fn float(&self, idx: usize) -> SkillResult<&[f64]> {
        let col = &self.columns[idx];
        col.data.as_float().ok_or_else(|| {
            SkillError::invalid_type(format!(
                "item '{}' must be numeric, got {}",
                col.name,
                col.data.type_name()
            ))
        })
    }

    /// Resolve the value item, or pick the only remaining numeric column.
    fn value_index(&self, item: Option<&ItemRef>, excluded: &[usize]) -> SkillResult<usize> {
        if let Some(item) = item {
            let idx = self.resolve(item)?;
            if excluded.contains(&idx) {
                return Err(SkillError::invalid_value(format!(
                    "item '{}' is already used as a position or auxiliary item",
                    self.columns[idx].name
                )));
            }
            return Ok(idx);
        }
        let candidates: Vec<usize> = (0..self.columns.len())
            .filter(|i| !excluded.contains(i) && self.columns[*i].data.as_float().is_some())
            .collect();
        match candidates.as_slice() {
            [only] => Ok(*only),
            _ => {
                let names: Vec<&str> = candidates.iter().map(|&i| self.columns[i].name.as_str()).collect();
                Err(SkillError::invalid_value(format!(
                    "item must be given when the input has {} candidate items: {names:?}",
                    names.len()
                )))
            }
        }
    }

    fn build(
        &self,
        value_idx: usize,
        aux_idx: &[usize],
        name: Option<&String>,
        quantity: Option<&Quantity>,
        kind: VarKind,
        policy: DuplicatePolicy,
        coords: Coordinates,
    ) -> SkillResult<TimeSeries> {
        let value_col = &self.columns[value_idx];
        let name = name.cloned().unwrap_or_else(|| value_col.name.clone());
        let quantity = quantity
            .cloned()
            .or_else(|| value_col.quantity.clone())
            .unwrap_or_default();

        let mut variables = vec![Variable::new(name.clone(), kind, self.float(value_idx)?.to_vec())];
        for &i in aux_idx {
            variables.push(Variable::new(
                self.columns[i].name.clone(),
                VarKind::Auxiliary,
                self.float(i)?.to_vec(),
            ));
        }

        let resolved = resolve_duplicates(&self.time, policy)?;
        if resolved.n_removed > 0 {
            tracing::warn!(
                name = %name,
                removed = resolved.n_removed,
                "Removed {} duplicate timestamps with keep_duplicates={}",
                resolved.n_removed,
                policy
            );
        } else if matches!(policy, DuplicatePolicy::Offset(_)) && resolved.time != self.time {
            tracing::warn!(name = %name, "Shifted repeated timestamps by the duplicate offset");
        }

        let variables = variables.iter().map(|v| v.take(&resolved.rows)).collect();
        let coords = coords.take(&resolved.rows);
        TimeSeries::new(name, resolved.time, variables, coords, quantity)
    }
}

impl PointInput {
    /// Build a point series whose primary variable has the given kind.
    pub fn parse(&self, table: DataTable, kind: VarKind) -> SkillResult<TimeSeries> {
        let prepared = Prepared::new(table)?;
        let aux_idx = prepared.resolve_unique(&self.aux_items)?;

        let mut excluded = aux_idx.clone();
        if self.item.is_none() {
            excluded.extend(["x", "y", "z"].iter().filter_map(|n| prepared.position(n)));
        }
        let value_idx = prepared.value_index(self.item.as_ref(), &excluded)?;

        let coords = Coordinates::fixed(self.x, self.y, self.z);
        let series = prepared.build(
            value_idx,
            &aux_idx,
            self.name.as_ref(),
            self.quantity.as_ref(),
            kind,
            self.keep_duplicates,
            coords,
        )?;
        Ok(drop_missing(series, kind))
    }
}

impl TrackInput {
    /// Build a track series whose primary variable has the given kind.
    pub fn parse(&self, table: DataTable, kind: VarKind) -> SkillResult<TimeSeries> {
        let prepared = Prepared::new(table)?;
        let names = prepared.names();

        let x_idx = match &self.x_item {
            Some(item) => prepared.resolve(item)?,
            None => prepared.position("x").map_or_else(|| ItemRef::Index(0).resolve(&names), Ok)?,
        };
        let y_idx = match &self.y_item {
            Some(item) => prepared.resolve(item)?,
            None => prepared.position("y").map_or_else(|| ItemRef::Index(1).resolve(&names), Ok)?,
        };
        if x_idx == y_idx {
            return Err(SkillError::invalid_value(format!(
                "x_item and y_item both refer to '{}'",
                names[x_idx]
            )));
        }

        let aux_idx = prepared.resolve_unique(&self.aux_items)?;
        if aux_idx.iter().any(|i| *i == x_idx || *i == y_idx) {
            return Err(SkillError::invalid_value("auxiliary items cannot be position items"));
        }
        let mut excluded = vec![x_idx, y_idx];
        excluded.extend(&aux_idx);
        let value_idx = prepared.value_index(self.item.as_ref(), &excluded)?;

        let coords = Coordinates::moving(prepared.float(x_idx)?.to_vec(), prepared.float(y_idx)?.to_vec())?;
        let series = prepared.build(
            value_idx,
            &aux_idx,
            self.name.as_ref(),
            self.quantity.as_ref(),
            kind,
            self.keep_duplicates,
            coords,
        )?;

        // positions are required for every track row
        let n = series.n_points();
        let (x, y) = (series.coords().x_values(n), series.coords().y_values(n));
        let mask: Vec<bool> = x.iter().zip(&y).map(|(a, b)| !a.is_nan() && !b.is_nan()).collect();
        let series = if mask.iter().all(|m| *m) { series } else { series.filter(&mask) };
        Ok(drop_missing(series, kind))
    }
}

fn drop_missing(series: TimeSeries, kind: VarKind) -> TimeSeries {
    if kind != VarKind::Observation {
        return series;
    }
    let before = series.n_points();
    let series = series.dropna();
    if series.n_points() < before {
        tracing::debug!(
            name = %series.name(),
            dropped = before - series.n_points(),
            "dropped rows without observed value"
        );
    }
    series
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::TableIndex;
    use test_utils::daily_times;

    fn three_columns() -> DataTable {
        DataTable::with_time_index(
            daily_times("2019-01-01", 3),
            vec![
                Column::float("lon", vec![10.0, 10.1, 10.2]),
                Column::float("lat", vec![55.0, 55.1, 55.2]),
                Column::float("Hm0", vec![1.0, f64::NAN, 1.2]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_track_defaults_use_synonyms() {
        let series = TrackInput::default().parse(three_columns(), VarKind::Observation).unwrap();
        assert_eq!(series.name(), "Hm0");
        assert_eq!(series.n_points(), 2);
        assert_eq!(series.coords().x_values(0), vec![10.0, 10.2]);
    }

    #[test]
    fn test_original_synonym_names_still_resolve() {
        let input = TrackInput {
            x_item: Some("lon".into()),
            y_item: Some("lat".into()),
            item: Some("Hm0".into()),
            ..Default::default()
        };
        let series = input.parse(three_columns(), VarKind::Observation).unwrap();
        assert_eq!(series.coords().y_values(2), vec![55.0, 55.2]);
    }

    #[test]
    fn test_model_rows_keep_missing_values() {
        let series = TrackInput::default().parse(three_columns(), VarKind::Model).unwrap();
        assert_eq!(series.n_points(), 3);
    }

    #[test]
    fn test_point_ambiguous_item() {
        let table = DataTable::with_time_index(
            daily_times("2019-01-01", 2),
            vec![Column::float("a", vec![1.0, 2.0]), Column::float("b", vec![1.0, 2.0])],
        )
        .unwrap();
        let err = PointInput::default().parse(table.clone(), VarKind::Observation).unwrap_err();
        assert!(matches!(err, SkillError::InvalidValue(_)));

        let input = PointInput {
            item: Some(ItemRef::from(-1)),
            ..Default::default()
        };
        assert_eq!(input.parse(table, VarKind::Observation).unwrap().name(), "b");
    }

    #[test]
    fn test_point_text_item_is_type_error() {
        let table = DataTable::new(
            TableIndex::Range(1),
            vec![Column::text("time", vec!["2019-01-01".into()]), Column::text("wl", vec!["high".into()])],
        )
        .unwrap();
        let input = PointInput {
            item: Some("wl".into()),
            ..Default::default()
        };
        assert!(matches!(input.parse(table, VarKind::Observation), Err(SkillError::InvalidType(_))));
    }
}
