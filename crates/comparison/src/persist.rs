//! JSON persistence of comparers and collections.
//!
//! A comparer is stored as a self-describing dataset:
//!
//! ```text
//! {
//!   "attrs":     { "name": "HKNA", "gtype": "point", "weight": 1.0, ... },
//!   "coords":    { "time": { "type": "time", "values": [...] },
//!                  "x": { "type": "scalar", "value": 4.2 }, ... },
//!   "data_vars": [ { "name": "Observation", "dims": "time",
//!                    "kind": "observation", "values": [1.0, null] }, ... ]
//! }
//! ```
//!
//! Point comparers also keep the raw model series as `_raw_<model>` on the
//! `_time_raw_<model>` coordinate. Track raw data equals the matched data
//! and is not stored.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use skill_common::{Attrs, GeometryType, Quantity, SkillError, SkillResult};
use timeseries::{Coordinates, TimeSeries, VarKind, Variable, DEFAULT_OBS_COLOR};
use tracing::info;

use crate::collection::ComparerCollection;
use crate::comparer::Comparer;

const TIME: &str = "time";
const RAW_PREFIX: &str = "_raw_";
const RAW_TIME_PREFIX: &str = "_time_raw_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum CoordData {
    Time { values: Vec<NaiveDateTime> },
    Scalar { value: Option<f64> },
    Float { dims: String, values: Vec<Option<f64>> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct DataVar {
    name: String,
    dims: String,
    kind: VarKind,
    values: Vec<Option<f64>>,
}

fn default_weight() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct DocAttrs {
    name: String,
    gtype: GeometryType,
    #[serde(default = "default_weight")]
    weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    quantity: Option<Quantity>,
    #[serde(flatten)]
    user: Attrs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct ComparerDocument {
    attrs: DocAttrs,
    coords: BTreeMap<String, CoordData>,
    data_vars: Vec<DataVar>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CollectionDocument {
    comparers: Vec<ComparerDocument>,
}

fn to_optional(values: &[f64]) -> Vec<Option<f64>> {
    values.iter().map(|v| (!v.is_nan()).then_some(*v)).collect()
}

fn from_optional(values: &[Option<f64>]) -> Vec<f64> {
    values.iter().map(|v| v.unwrap_or(f64::NAN)).collect()
}

pub(crate) fn to_document(cmp: &Comparer) -> ComparerDocument {
    let data = cmp.data();
    let mut coords = BTreeMap::new();
    coords.insert(
        TIME.to_string(),
        CoordData::Time {
            values: data.time().to_vec(),
        },
    );
    match data.coords() {
        Coordinates::Fixed { x, y, z } => {
            coords.insert("x".to_string(), CoordData::Scalar { value: *x });
            coords.insert("y".to_string(), CoordData::Scalar { value: *y });
            coords.insert("z".to_string(), CoordData::Scalar { value: *z });
        }
        Coordinates::Moving { x, y } => {
            for (axis, values) in [("x", x), ("y", y)] {
                coords.insert(
                    axis.to_string(),
                    CoordData::Float {
                        dims: TIME.to_string(),
                        values: to_optional(values),
                    },
                );
            }
        }
    }

    let mut data_vars: Vec<DataVar> = data
        .variables()
        .iter()
        .map(|v| DataVar {
            name: v.name.clone(),
            dims: TIME.to_string(),
            kind: v.kind,
            values: to_optional(&v.values),
        })
        .collect();

    if cmp.gtype() == GeometryType::Point {
        for (name, raw) in cmp.raw_mod_data() {
            let dim = format!("{RAW_TIME_PREFIX}{name}");
            coords.insert(
                dim.clone(),
                CoordData::Time {
                    values: raw.time().to_vec(),
                },
            );
            data_vars.push(DataVar {
                name: format!("{RAW_PREFIX}{name}"),
                dims: dim,
                kind: VarKind::Model,
                values: to_optional(raw.values()),
            });
        }
    }

    ComparerDocument {
        attrs: DocAttrs {
            name: cmp.name().to_string(),
            gtype: cmp.gtype(),
            weight: cmp.weight(),
            color: Some(cmp.color().to_string()),
            quantity: Some(cmp.quantity().clone()),
            user: cmp.attrs().clone(),
        },
        coords,
        data_vars,
    }
}

fn time_coord<'a>(coords: &'a BTreeMap<String, CoordData>, name: &str) -> SkillResult<&'a [NaiveDateTime]> {
    match coords.get(name) {
        Some(CoordData::Time { values }) => Ok(values),
        Some(_) => Err(SkillError::persistence(format!("coordinate '{name}' is not a time axis"))),
        None => Err(SkillError::persistence(format!("missing coordinate '{name}'"))),
    }
}

fn scalar_coord(coords: &BTreeMap<String, CoordData>, name: &str) -> SkillResult<Option<f64>> {
    match coords.get(name) {
        Some(CoordData::Scalar { value }) => Ok(*value),
        None => Ok(None),
        Some(_) => Err(SkillError::persistence(format!("coordinate '{name}' must be a scalar for point data"))),
    }
}

fn float_coord(coords: &BTreeMap<String, CoordData>, name: &str) -> SkillResult<Vec<f64>> {
    match coords.get(name) {
        Some(CoordData::Float { values, .. }) => Ok(from_optional(values)),
        _ => Err(SkillError::persistence(format!("track data needs a '{name}' coordinate along time"))),
    }
}

pub(crate) fn from_document(doc: ComparerDocument) -> SkillResult<Comparer> {
    let ComparerDocument { attrs, coords, data_vars } = doc;
    let time = time_coord(&coords, TIME)?.to_vec();
    let quantity = attrs.quantity.unwrap_or_default();

    let geometry = match attrs.gtype {
        GeometryType::Point => Coordinates::fixed(
            scalar_coord(&coords, "x")?,
            scalar_coord(&coords, "y")?,
            scalar_coord(&coords, "z")?,
        ),
        GeometryType::Track => Coordinates::moving(float_coord(&coords, "x")?, float_coord(&coords, "y")?)?,
        other => {
            return Err(SkillError::persistence(format!(
                "gtype must be point or track, got '{other}'"
            )))
        }
    };

    let mut variables = Vec::new();
    let mut raw_mod_data = Vec::new();
    for var in data_vars {
        if var.dims == TIME {
            variables.push(Variable::new(var.name, var.kind, from_optional(&var.values)));
            continue;
        }
        let Some(model) = var.name.strip_prefix(RAW_PREFIX) else {
            return Err(SkillError::persistence(format!(
                "variable '{}' has unknown dimension '{}'",
                var.name, var.dims
            )));
        };
        let raw_time = time_coord(&coords, &var.dims)?.to_vec();
        let series = TimeSeries::new(
            model,
            raw_time,
            vec![Variable::new(model, VarKind::Model, from_optional(&var.values))],
            geometry.clone(),
            quantity.clone(),
        )?;
        raw_mod_data.push((model.to_string(), series));
    }

    let data = TimeSeries::new(attrs.name, time, variables, geometry, quantity)?;
    let color = attrs.color.unwrap_or_else(|| DEFAULT_OBS_COLOR.to_string());
    Comparer::new(data, raw_mod_data, attrs.weight, &color, attrs.user)
}

fn write_json<T: Serialize>(value: &T, path: &Path) -> SkillResult<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> SkillResult<T> {
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str(&text)
        .map_err(|e| SkillError::persistence(format!("failed to read {}: {e}", path.display())))
}

pub(crate) fn save_comparer(cmp: &Comparer, path: &Path) -> SkillResult<()> {
    write_json(&to_document(cmp), path)?;
    info!(comparer = %cmp.name(), path = %path.display(), "saved comparer");
    Ok(())
}

pub(crate) fn load_comparer(path: &Path) -> SkillResult<Comparer> {
    from_document(read_json(path)?)
}

pub(crate) fn save_collection(cc: &ComparerCollection, path: &Path) -> SkillResult<()> {
    let doc = CollectionDocument {
        comparers: cc.iter().map(to_document).collect(),
    };
    write_json(&doc, path)?;
    info!(comparers = cc.len(), path = %path.display(), "saved comparer collection");
    Ok(())
}

pub(crate) fn load_collection(path: &Path) -> SkillResult<ComparerCollection> {
    let doc: CollectionDocument = read_json(path)?;
    let comparers = doc
        .comparers
        .into_iter()
        .map(from_document)
        .collect::<SkillResult<Vec<_>>>()?;
    ComparerCollection::new(comparers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use skill_common::AttrValue;
    use test_utils::daily_times;

    fn point_comparer() -> Comparer {
        let data = TimeSeries::new(
            "HKNA",
            daily_times("2019-01-02", 2),
            vec![
                Variable::new("Observation", VarKind::Observation, vec![1.0, 2.0]),
                Variable::new("m1", VarKind::Model, vec![1.5, 2.5]),
                Variable::new("wind", VarKind::Auxiliary, vec![f64::NAN, 3.0]),
            ],
            Coordinates::fixed(Some(4.2), Some(52.7), None),
            Quantity::new("Water Level", "m"),
        )
        .unwrap();
        let raw = TimeSeries::new(
            "m1",
            daily_times("2019-01-01", 4),
            vec![Variable::new("m1", VarKind::Model, vec![0.5, 1.5, 2.5, 3.5])],
            Coordinates::fixed(Some(4.2), Some(52.7), None),
            Quantity::new("Water Level", "m"),
        )
        .unwrap();
        let mut attrs = Attrs::new();
        attrs.insert("station".to_string(), AttrValue::from("Hoek"));
        Comparer::new(data, vec![("m1".to_string(), raw)], 2.0, "blue", attrs).unwrap()
    }

    #[test]
    fn test_document_layout() {
        let doc = to_document(&point_comparer());
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["attrs"]["name"], "HKNA");
        assert_eq!(json["attrs"]["gtype"], "point");
        assert_eq!(json["attrs"]["weight"], 2.0);
        assert_eq!(json["attrs"]["station"], "Hoek");
        assert_eq!(json["coords"]["x"]["type"], "scalar");
        assert_eq!(json["coords"]["_time_raw_m1"]["values"].as_array().unwrap().len(), 4);
        assert_eq!(json["data_vars"][2]["values"][0], serde_json::Value::Null);
        assert_eq!(json["data_vars"][3]["name"], "_raw_m1");
    }

    #[test]
    fn test_round_trip_keeps_raw_data() {
        let cmp = point_comparer();
        let back = from_document(to_document(&cmp)).unwrap();
        assert_eq!(back.name(), "HKNA");
        assert_eq!(back.weight(), 2.0);
        assert_eq!(back.raw_mod_data()[0].1.n_points(), 4);
        assert!(back.data().variable("wind").unwrap().values[0].is_nan());
        assert_eq!(back.attrs(), cmp.attrs());
    }

    #[test]
    fn test_missing_weight_defaults_to_one() {
        let mut json = serde_json::to_value(to_document(&point_comparer())).unwrap();
        json["attrs"].as_object_mut().unwrap().remove("weight");
        let doc: ComparerDocument = serde_json::from_value(json).unwrap();
        assert_eq!(from_document(doc).unwrap().weight(), 1.0);
    }

    #[test]
    fn test_rejects_grid_gtype() {
        let mut json = serde_json::to_value(to_document(&point_comparer())).unwrap();
        json["attrs"]["gtype"] = serde_json::Value::from("grid");
        let doc: ComparerDocument = serde_json::from_value(json).unwrap();
        assert!(matches!(from_document(doc), Err(SkillError::Persistence(_))));
    }
}
