//! Grouped skill assessment and the resulting skill table.

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::str::FromStr;

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Serialize, Serializer};
use skill_common::time::start_of_day;
use skill_common::{Frequency, SkillError, SkillResult};

use crate::long_table::LongTable;
use crate::metrics::Metric;

/// Calendar attribute used as a grouping key, written `dt:<attr>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeAttr {
    Year,
    Quarter,
    Month,
    Day,
    Hour,
    DayOfYear,
    Weekday,
}

impl TimeAttr {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeAttr::Year => "year",
            TimeAttr::Quarter => "quarter",
            TimeAttr::Month => "month",
            TimeAttr::Day => "day",
            TimeAttr::Hour => "hour",
            TimeAttr::DayOfYear => "dayofyear",
            TimeAttr::Weekday => "weekday",
        }
    }

    fn value(&self, t: &NaiveDateTime) -> i64 {
        match self {
            TimeAttr::Year => t.year() as i64,
            TimeAttr::Quarter => (t.month0() / 3 + 1) as i64,
            TimeAttr::Month => t.month() as i64,
            TimeAttr::Day => t.day() as i64,
            TimeAttr::Hour => t.hour() as i64,
            TimeAttr::DayOfYear => t.ordinal() as i64,
            TimeAttr::Weekday => t.weekday().num_days_from_monday() as i64,
        }
    }
}

impl FromStr for TimeAttr {
    type Err = SkillError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "year" => TimeAttr::Year,
            "quarter" => TimeAttr::Quarter,
            "month" => TimeAttr::Month,
            "day" => TimeAttr::Day,
            "hour" => TimeAttr::Hour,
            "dayofyear" => TimeAttr::DayOfYear,
            "weekday" | "dayofweek" => TimeAttr::Weekday,
            _ => return Err(SkillError::invalid_value(format!("unknown time attribute 'dt:{s}'"))),
        })
    }
}

/// One grouping dimension of a skill assessment.
///
/// Parsed from strings: `model`, `observation`, `freq:<alias>` (time bucket,
/// e.g. `freq:D`), `dt:<attr>` (calendar attribute, e.g. `dt:month`), or the
/// name of an auxiliary column.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupBy {
    Model,
    Observation,
    Freq(Frequency),
    Time(TimeAttr),
    Column(String),
}

impl GroupBy {
    /// Column name of this key in a skill table.
    pub fn name(&self) -> String {
        match self {
            GroupBy::Model => "model".to_string(),
            GroupBy::Observation => "observation".to_string(),
            GroupBy::Freq(_) => "time".to_string(),
            GroupBy::Time(attr) => attr.as_str().to_string(),
            GroupBy::Column(name) => name.clone(),
        }
    }

    /// Parse a comma separated list such as "model,freq:D".
    pub fn parse_list(s: &str) -> SkillResult<Vec<GroupBy>> {
        s.split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(GroupBy::from_str)
            .collect()
    }
}

impl FromStr for GroupBy {
    type Err = SkillError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(SkillError::invalid_value("empty group-by key"));
        }
        Ok(match s {
            "model" | "mod" => GroupBy::Model,
            "observation" | "obs" => GroupBy::Observation,
            _ => {
                if let Some(alias) = s.strip_prefix("freq:") {
                    GroupBy::Freq(alias.parse()?)
                } else if let Some(attr) = s.strip_prefix("dt:") {
                    GroupBy::Time(attr.parse()?)
                } else {
                    GroupBy::Column(s.to_string())
                }
            }
        })
    }
}

impl fmt::Display for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupBy::Freq(freq) => write!(f, "freq:{freq}"),
            GroupBy::Time(attr) => write!(f, "dt:{}", attr.as_str()),
            other => f.write_str(&other.name()),
        }
    }
}

/// Grouping used when none is given: by model when there are several
/// models, by observation when there are several observations.
pub fn default_group_by(n_models: usize, n_obs: usize) -> Vec<GroupBy> {
    let mut by = Vec::new();
    if n_models > 1 {
        by.push(GroupBy::Model);
    }
    if n_obs > 1 {
        by.push(GroupBy::Observation);
    }
    if by.is_empty() {
        by.push(GroupBy::Model);
    }
    by
}

/// Value of a grouping key.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyValue {
    Label(String),
    Time(NaiveDateTime),
    Int(i64),
    Float(f64),
}

impl KeyValue {
    pub fn as_label(&self) -> Option<&str> {
        match self {
            KeyValue::Label(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Label(s) => f.write_str(s),
            KeyValue::Time(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S")),
            KeyValue::Int(v) => write!(f, "{v}"),
            KeyValue::Float(v) => write!(f, "{v}"),
        }
    }
}

impl Serialize for KeyValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            KeyValue::Label(s) => serializer.serialize_str(s),
            KeyValue::Time(t) => t.serialize(serializer),
            KeyValue::Int(v) => serializer.serialize_i64(*v),
            KeyValue::Float(v) => serializer.serialize_f64(*v),
        }
    }
}

impl From<&KeyValue> for serde_json::Value {
    fn from(k: &KeyValue) -> Self {
        match k {
            KeyValue::Label(s) => serde_json::Value::from(s.as_str()),
            KeyValue::Time(t) => serde_json::Value::from(t.format("%Y-%m-%dT%H:%M:%S").to_string()),
            KeyValue::Int(v) => serde_json::Value::from(*v),
            KeyValue::Float(v) => serde_json::Value::from(*v),
        }
    }
}

/// Sort key: labels sort by first appearance, everything else by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum OrdKey {
    Rank(usize),
    Time(NaiveDateTime),
    Int(i64),
    Float(i64),
}

fn float_order(v: f64) -> i64 {
    let bits = v.to_bits() as i64;
    bits ^ ((((bits >> 63) as u64) >> 1) as i64)
}

/// Rows of a long table split by group keys, sorted by key.
pub(crate) struct Grouping {
    pub names: Vec<String>,
    pub groups: Vec<(Vec<KeyValue>, Vec<usize>)>,
}

/// Rows whose key in an auxiliary column is missing belong to no group.
pub(crate) fn group_rows(table: &LongTable, by: &[GroupBy]) -> SkillResult<Grouping> {
    let n = table.len();
    let origin = table.time.iter().min().copied().map(start_of_day);
    let mut columns: Vec<Vec<(OrdKey, KeyValue)>> = Vec::with_capacity(by.len());
    let mut missing_key = vec![false; n];

    for key in by {
        let column = match key {
            GroupBy::Model => label_column(&table.model, &table.model_names()),
            GroupBy::Observation => label_column(&table.observation, &table.observation_names()),
            GroupBy::Freq(freq) => {
                let origin = origin.unwrap_or_default();
                table
                    .time
                    .iter()
                    .map(|t| {
                        let b = freq.bucket(*t, origin);
                        (OrdKey::Time(b), KeyValue::Time(b))
                    })
                    .collect()
            }
            GroupBy::Time(attr) => table
                .time
                .iter()
                .map(|t| {
                    let v = attr.value(t);
                    (OrdKey::Int(v), KeyValue::Int(v))
                })
                .collect(),
            GroupBy::Column(name) => {
                let values = table
                    .aux_column(name)
                    .ok_or_else(|| SkillError::not_found(format!("cannot group by '{name}': no such column")))?;
                for (missing, v) in missing_key.iter_mut().zip(values) {
                    *missing |= v.is_nan();
                }
                values
                    .iter()
                    .map(|v| (OrdKey::Float(float_order(*v)), KeyValue::Float(*v)))
                    .collect()
            }
        };
        columns.push(column);
    }

    let mut index: BTreeMap<Vec<OrdKey>, (Vec<KeyValue>, Vec<usize>)> = BTreeMap::new();
    for row in (0..n).filter(|&r| !missing_key[r]) {
        let ord: Vec<OrdKey> = columns.iter().map(|c| c[row].0).collect();
        index
            .entry(ord)
            .or_insert_with(|| (columns.iter().map(|c| c[row].1.clone()).collect(), Vec::new()))
            .1
            .push(row);
    }

    Ok(Grouping {
        names: by.iter().map(GroupBy::name).collect(),
        groups: index.into_values().collect(),
    })
}

fn label_column(values: &[String], order: &[String]) -> Vec<(OrdKey, KeyValue)> {
    values
        .iter()
        .map(|v| {
            let rank = order.iter().position(|o| o == v).unwrap_or(usize::MAX);
            (OrdKey::Rank(rank), KeyValue::Label(v.clone()))
        })
        .collect()
}

/// Compute metrics for rows of a long table.
pub(crate) fn metric_values(table: &LongTable, rows: &[usize], metrics: &[Metric]) -> Vec<f64> {
    let obs: Vec<f64> = rows.iter().map(|&i| table.obs_val[i]).collect();
    let model: Vec<f64> = rows.iter().map(|&i| table.mod_val[i]).collect();
    metrics.iter().map(|m| m.compute(&obs, &model)).collect()
}

/// Skill of every group present in the table.
///
/// `n_models` decides whether a single model name is surfaced as a
/// constant column; observation names always are when unique.
pub(crate) fn compute_skill(
    table: &LongTable,
    by: &[GroupBy],
    metrics: &[Metric],
    n_models: usize,
) -> SkillResult<SkillTable> {
    if table.is_empty() {
        return Err(SkillError::no_data("No data selected for skill assessment"));
    }
    let grouping = group_rows(table, by)?;
    if grouping.groups.is_empty() {
        return Err(SkillError::no_data("No rows with a complete group key"));
    }
    let rows = grouping
        .groups
        .into_iter()
        .map(|(keys, rows)| SkillRow {
            keys,
            n: rows.len(),
            values: metric_values(table, &rows, metrics),
            x: table.x[rows[0]],
            y: table.y[rows[0]],
        })
        .collect();

    let mut constants = Vec::new();
    if n_models > 1 && !grouping.names.iter().any(|n| n == "model") {
        if let [only] = table.model_names().as_slice() {
            constants.push(("model".to_string(), only.clone()));
        }
    }
    if !grouping.names.iter().any(|n| n == "observation") {
        if let [only] = table.observation_names().as_slice() {
            constants.push(("observation".to_string(), only.clone()));
        }
    }

    Ok(SkillTable {
        by: grouping.names,
        metrics: metrics.iter().map(|m| m.name().to_string()).collect(),
        constants,
        rows,
    })
}

/// One group of a skill table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkillRow {
    pub keys: Vec<KeyValue>,
    pub n: usize,
    pub values: Vec<f64>,
    /// First x position in the group.
    pub x: f64,
    /// First y position in the group.
    pub y: f64,
}

/// Skill metrics per group.
///
/// Columns are the group keys, any constant model/observation fields, `n`,
/// the metrics, then `x` and `y`.
#[derive(Debug, Clone, PartialEq)]
pub struct SkillTable {
    by: Vec<String>,
    metrics: Vec<String>,
    constants: Vec<(String, String)>,
    rows: Vec<SkillRow>,
}

impl SkillTable {
    pub(crate) fn from_parts(
        by: Vec<String>,
        metrics: Vec<String>,
        constants: Vec<(String, String)>,
        rows: Vec<SkillRow>,
    ) -> Self {
        Self {
            by,
            metrics,
            constants,
            rows,
        }
    }

    pub fn by(&self) -> &[String] {
        &self.by
    }

    pub fn metrics(&self) -> &[String] {
        &self.metrics
    }

    /// Fields that have a single value across the table and are not keys.
    pub fn constants(&self) -> &[(String, String)] {
        &self.constants
    }

    pub fn rows(&self) -> &[SkillRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn metric_index(&self, name: &str) -> SkillResult<usize> {
        self.metrics
            .iter()
            .position(|m| m == name)
            .ok_or_else(|| SkillError::not_found(format!("metric '{name}' is not in the skill table")))
    }

    /// Values of one metric, one per row.
    pub fn metric(&self, name: &str) -> SkillResult<Vec<f64>> {
        let j = self.metric_index(name)?;
        Ok(self.rows.iter().map(|r| r.values[j]).collect())
    }

    /// Group counts, one per row.
    pub fn n(&self) -> Vec<usize> {
        self.rows.iter().map(|r| r.n).collect()
    }

    pub fn x(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.x).collect()
    }

    pub fn y(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.y).collect()
    }

    /// Key values of one key column, one per row.
    pub fn key(&self, name: &str) -> SkillResult<Vec<KeyValue>> {
        let j = self
            .by
            .iter()
            .position(|b| b == name)
            .ok_or_else(|| SkillError::not_found(format!("'{name}' is not a key of the skill table")))?;
        Ok(self.rows.iter().map(|r| r.keys[j].clone()).collect())
    }

    /// Value of `metric` in the row whose `field` key equals `label`.
    pub fn get(&self, field: &str, label: &str, metric: &str) -> SkillResult<f64> {
        let m = self.metric_index(metric)?;
        let keys = self.key(field)?;
        keys.iter()
            .position(|k| k.as_label() == Some(label))
            .map(|i| self.rows[i].values[m])
            .ok_or_else(|| SkillError::not_found(format!("no row with {field} = '{label}'")))
    }

    /// Rows sorted by a metric. NaN sorts last.
    pub fn sort_by(&self, metric: &str, ascending: bool) -> SkillResult<SkillTable> {
        let j = self.metric_index(metric)?;
        let mut rows = self.rows.clone();
        rows.sort_by(|a, b| {
            let (va, vb) = (a.values[j], b.values[j]);
            match (va.is_nan(), vb.is_nan()) {
                (true, true) => std::cmp::Ordering::Equal,
                (true, false) => std::cmp::Ordering::Greater,
                (false, true) => std::cmp::Ordering::Less,
                _ if ascending => va.total_cmp(&vb),
                _ => vb.total_cmp(&va),
            }
        });
        Ok(SkillTable { rows, ..self.clone() })
    }

    /// Rows where the key `field` equals `value`.
    ///
    /// The key column is dropped and reported as a constant. Selecting on a
    /// constant field keeps everything or nothing.
    pub fn sel(&self, field: &str, value: &str) -> SkillResult<SkillTable> {
        if let Some(j) = self.by.iter().position(|b| b == field) {
            let rows: Vec<SkillRow> = self
                .rows
                .iter()
                .filter(|r| r.keys[j].as_label() == Some(value))
                .map(|r| {
                    let mut r = r.clone();
                    r.keys.remove(j);
                    r
                })
                .collect();
            let mut by = self.by.clone();
            by.remove(j);
            let mut constants = self.constants.clone();
            constants.push((field.to_string(), value.to_string()));
            return Ok(SkillTable {
                by,
                metrics: self.metrics.clone(),
                constants,
                rows,
            });
        }
        if let Some((_, v)) = self.constants.iter().find(|(c, _)| c == field) {
            let rows = if v == value { self.rows.clone() } else { Vec::new() };
            return Ok(SkillTable { rows, ..self.clone() });
        }
        Err(SkillError::not_found(format!("skill table has no field '{field}'")))
    }

    pub fn sel_model(&self, model: &str) -> SkillResult<SkillTable> {
        self.sel("model", model)
    }

    pub fn sel_observation(&self, observation: &str) -> SkillResult<SkillTable> {
        self.sel("observation", observation)
    }

    /// Keep only the given metrics.
    pub fn select_metrics(&self, names: &[&str]) -> SkillResult<SkillTable> {
        let idx: Vec<usize> = names.iter().map(|n| self.metric_index(n)).collect::<SkillResult<_>>()?;
        let rows = self
            .rows
            .iter()
            .map(|r| SkillRow {
                values: idx.iter().map(|&j| r.values[j]).collect(),
                ..r.clone()
            })
            .collect();
        Ok(SkillTable {
            metrics: names.iter().map(|n| n.to_string()).collect(),
            rows,
            ..self.clone()
        })
    }

    /// Round metric values and positions to `decimals` places.
    pub fn round(&self, decimals: u32) -> SkillTable {
        let scale = 10f64.powi(decimals as i32);
        let round = |v: f64| (v * scale).round() / scale;
        let rows = self
            .rows
            .iter()
            .map(|r| SkillRow {
                values: r.values.iter().map(|v| round(*v)).collect(),
                x: round(r.x),
                y: round(r.y),
                ..r.clone()
            })
            .collect();
        SkillTable { rows, ..self.clone() }
    }

    /// Column names in output order.
    pub fn columns(&self) -> Vec<String> {
        let mut cols = self.by.clone();
        cols.extend(self.constants.iter().map(|(c, _)| c.clone()));
        cols.push("n".to_string());
        cols.extend(self.metrics.iter().cloned());
        cols.push("x".to_string());
        cols.push("y".to_string());
        cols
    }

    /// Plain rows keyed by column name. NaN becomes null.
    pub fn to_rows(&self) -> Vec<serde_json::Map<String, serde_json::Value>> {
        self.rows
            .iter()
            .map(|r| {
                let mut map = serde_json::Map::new();
                for (name, key) in self.by.iter().zip(&r.keys) {
                    map.insert(name.clone(), key.into());
                }
                for (name, value) in &self.constants {
                    map.insert(name.clone(), serde_json::Value::from(value.as_str()));
                }
                map.insert("n".to_string(), serde_json::Value::from(r.n));
                for (name, v) in self.metrics.iter().zip(&r.values) {
                    map.insert(name.clone(), serde_json::Value::from(*v));
                }
                map.insert("x".to_string(), serde_json::Value::from(r.x));
                map.insert("y".to_string(), serde_json::Value::from(r.y));
                map
            })
            .collect()
    }

    pub fn to_json(&self) -> SkillResult<String> {
        Ok(serde_json::to_string_pretty(&self.to_rows())?)
    }

    fn record(&self, r: &SkillRow) -> Vec<String> {
        let mut rec: Vec<String> = r.keys.iter().map(|k| k.to_string()).collect();
        rec.extend(self.constants.iter().map(|(_, v)| v.clone()));
        rec.push(r.n.to_string());
        rec.extend(r.values.iter().map(|v| format_float(*v)));
        rec.push(format_float(r.x));
        rec.push(format_float(r.y));
        rec
    }

    /// Write as CSV with a header row. NaN is written as an empty field.
    pub fn write_csv<W: io::Write>(&self, writer: W) -> SkillResult<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        let to_err = |e: csv::Error| SkillError::persistence(format!("failed to write skill table: {e}"));
        wtr.write_record(self.columns()).map_err(to_err)?;
        for r in &self.rows {
            wtr.write_record(self.record(r)).map_err(to_err)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn to_csv_string(&self) -> SkillResult<String> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        String::from_utf8(buf).map_err(|e| SkillError::persistence(e.to_string()))
    }
}

fn format_float(v: f64) -> String {
    if v.is_nan() {
        String::new()
    } else {
        v.to_string()
    }
}

impl fmt::Display for SkillTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header = self.columns();
        let body: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|r| {
                let mut rec: Vec<String> = r.keys.iter().map(|k| k.to_string()).collect();
                rec.extend(self.constants.iter().map(|(_, v)| v.clone()));
                rec.push(r.n.to_string());
                rec.extend(r.values.iter().map(|v| format!("{v:.3}")));
                rec.push(format!("{:.3}", r.x));
                rec.push(format!("{:.3}", r.y));
                rec
            })
            .collect();
        let widths: Vec<usize> = (0..header.len())
            .map(|j| {
                body.iter()
                    .map(|rec| rec[j].len())
                    .chain(std::iter::once(header[j].len()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();
        let line = |rec: &[String]| -> String {
            rec.iter()
                .zip(&widths)
                .map(|(s, w)| format!("{s:>w$}"))
                .collect::<Vec<_>>()
                .join("  ")
        };
        writeln!(f, "{}", line(&header))?;
        for rec in &body {
            writeln!(f, "{}", line(rec))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{assert_approx_eq, daily_times, hourly_times};

    fn table() -> LongTable {
        let time = daily_times("2019-01-01", 3);
        let mut t = LongTable {
            model: vec!["m1".to_string(); 3],
            observation: vec!["obs".to_string(); 3],
            time: time.clone(),
            x: vec![1.0, 2.0, 3.0],
            y: vec![4.0, 5.0, 6.0],
            obs_val: vec![1.0, 2.0, 3.0],
            mod_val: vec![1.5, 2.5, 3.5],
            aux: vec![],
        };
        t.extend(LongTable {
            model: vec!["m0".to_string(); 3],
            observation: vec!["obs".to_string(); 3],
            time,
            x: vec![1.0, 2.0, 3.0],
            y: vec![4.0, 5.0, 6.0],
            obs_val: vec![1.0, 2.0, 3.0],
            mod_val: vec![0.0, 2.0, 3.0],
            aux: vec![],
        });
        t
    }

    fn metrics(names: &[&str]) -> Vec<Metric> {
        names.iter().map(|n| Metric::from_name(n).unwrap()).collect()
    }

    #[test]
    fn test_parse_group_by() {
        let by = GroupBy::parse_list("model, freq:D, dt:month, wind").unwrap();
        assert_eq!(by[0], GroupBy::Model);
        assert_eq!(by[1], GroupBy::Freq("D".parse().unwrap()));
        assert_eq!(by[2], GroupBy::Time(TimeAttr::Month));
        assert_eq!(by[3], GroupBy::Column("wind".to_string()));
        assert!("freq:XYZ".parse::<GroupBy>().is_err());
        assert_eq!(by[1].to_string(), "freq:D");
    }

    #[test]
    fn test_models_keep_appearance_order() {
        let st = compute_skill(&table(), &[GroupBy::Model], &metrics(&["bias"]), 2).unwrap();
        let models: Vec<String> = st.key("model").unwrap().iter().map(|k| k.to_string()).collect();
        assert_eq!(models, vec!["m1", "m0"]);
        assert_eq!(st.constants(), &[("observation".to_string(), "obs".to_string())]);
        assert_approx_eq!(st.get("model", "m1", "bias").unwrap(), 0.5, 1e-12);
        assert_eq!(st.n(), vec![3, 3]);
        assert_eq!(st.x(), vec![1.0, 1.0]);
    }

    #[test]
    fn test_freq_groups_only_present_buckets() {
        let mut t = table().take(&[0, 2]);
        t.time = hourly_times("2019-01-01", 1)
            .into_iter()
            .chain(daily_times("2019-01-03", 1))
            .collect();
        let st = compute_skill(&t, &["freq:D".parse().unwrap()], &metrics(&["rmse"]), 1).unwrap();
        assert_eq!(st.len(), 2);
        assert_eq!(st.by(), &["time".to_string()]);
    }

    #[test]
    fn test_missing_aux_key_rows_are_not_grouped() {
        let mut t = table();
        t.aux = vec![("wind".to_string(), vec![5.0, f64::NAN, 5.0, 7.0, f64::NAN, 7.0])];
        let by = GroupBy::parse_list("wind").unwrap();
        let st = compute_skill(&t, &by, &metrics(&["bias"]), 2).unwrap();
        assert_eq!(st.key("wind").unwrap(), vec![KeyValue::Float(5.0), KeyValue::Float(7.0)]);
        assert_eq!(st.n(), vec![2, 2]);

        t.aux = vec![("wind".to_string(), vec![f64::NAN; 6])];
        assert!(matches!(compute_skill(&t, &by, &metrics(&["bias"]), 2), Err(SkillError::NoData(_))));
    }

    #[test]
    fn test_empty_table_is_error() {
        let err = compute_skill(&LongTable::default(), &[GroupBy::Model], &metrics(&["rmse"]), 1).unwrap_err();
        assert!(matches!(err, SkillError::NoData(_)));
    }

    #[test]
    fn test_sort_sel_round() {
        let st = compute_skill(&table(), &[GroupBy::Model], &metrics(&["bias", "rmse"]), 2).unwrap();
        let sorted = st.sort_by("rmse", true).unwrap();
        assert_eq!(sorted.key("model").unwrap()[0], KeyValue::Label("m0".to_string()));

        let m0 = st.sel_model("m0").unwrap();
        assert_eq!(m0.len(), 1);
        assert!(m0.by().is_empty());
        assert!(m0.constants().contains(&("model".to_string(), "m0".to_string())));
        assert!(st.sel_observation("other").unwrap().is_empty());

        let rounded = st.round(1);
        assert_eq!(rounded.metric("bias").unwrap()[0], 0.5);
        assert!(st.metric("kge").is_err());
    }

    #[test]
    fn test_csv_and_rows() {
        let st = compute_skill(&table(), &[GroupBy::Model], &metrics(&["bias"]), 2).unwrap();
        let csv = st.to_csv_string().unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("model,observation,n,bias,x,y"));
        assert!(lines.next().unwrap().starts_with("m1,obs,3,0.5"));

        let rows = st.to_rows();
        assert_eq!(rows[1]["model"], serde_json::Value::from("m0"));
        assert_eq!(rows[1]["n"], serde_json::Value::from(3));
        assert!(st.to_string().contains("bias"));
    }

    #[test]
    fn test_group_by_aux_column() {
        let mut t = table();
        t.aux.push(("wind".to_string(), vec![1.0, 2.0, 1.0, 1.0, 2.0, 1.0]));
        let st = compute_skill(&t, &[GroupBy::Column("wind".to_string())], &metrics(&["bias"]), 2).unwrap();
        assert_eq!(st.n(), vec![4, 2]);
        assert!(compute_skill(&t, &[GroupBy::Column("nope".to_string())], &metrics(&["bias"]), 2).is_err());
    }
}
