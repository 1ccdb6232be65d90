//! The core time series container.

use std::fmt;

use chrono::NaiveDateTime;
use skill_common::time::Period;
use skill_common::{GeometryType, Quantity, SkillError, SkillResult};

use crate::coords::Coordinates;
use crate::variable::{VarKind, Variable};

/// A named, time-indexed collection of variables.
///
/// Invariants:
/// - `time` is strictly increasing
/// - every variable has one value per timestamp
/// - variable names are unique
/// - moving coordinates have one position per timestamp
///
/// The first variable is the primary one: the observed or modelled values.
/// Any further variables are auxiliary.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    name: String,
    time: Vec<NaiveDateTime>,
    variables: Vec<Variable>,
    coords: Coordinates,
    quantity: Quantity,
}

impl TimeSeries {
    pub fn new(
        name: impl Into<String>,
        time: Vec<NaiveDateTime>,
        variables: Vec<Variable>,
        coords: Coordinates,
        quantity: Quantity,
    ) -> SkillResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(SkillError::invalid_value("series name must not be empty"));
        }
        if variables.is_empty() {
            return Err(SkillError::invalid_value(format!("series '{name}' has no variables")));
        }
        if let Some(w) = time.windows(2).find(|w| w[1] <= w[0]) {
            return Err(SkillError::invalid_value(format!(
                "time of '{name}' must be strictly increasing, found {} followed by {}",
                w[0], w[1]
            )));
        }
        for (i, var) in variables.iter().enumerate() {
            if var.values.len() != time.len() {
                return Err(SkillError::invalid_value(format!(
                    "variable '{}' has {} values but the time axis has {}",
                    var.name,
                    var.values.len(),
                    time.len()
                )));
            }
            if variables[..i].iter().any(|v| v.name == var.name) {
                return Err(SkillError::name_collision(format!(
                    "variable '{}' appears more than once in '{name}'",
                    var.name
                )));
            }
        }
        coords.check_len(time.len())?;
        Ok(Self {
            name,
            time,
            variables,
            coords,
            quantity,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn time(&self) -> &[NaiveDateTime] {
        &self.time
    }

    pub fn n_points(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn variable_names(&self) -> Vec<&str> {
        self.variables.iter().map(|v| v.name.as_str()).collect()
    }

    /// The primary variable.
    pub fn primary(&self) -> &Variable {
        &self.variables[0]
    }

    /// Values of the primary variable.
    pub fn values(&self) -> &[f64] {
        &self.variables[0].values
    }

    /// Names of the auxiliary variables.
    pub fn aux_names(&self) -> Vec<&str> {
        self.variables
            .iter()
            .filter(|v| v.kind == VarKind::Auxiliary)
            .map(|v| v.name.as_str())
            .collect()
    }

    pub fn coords(&self) -> &Coordinates {
        &self.coords
    }

    pub fn gtype(&self) -> GeometryType {
        self.coords.gtype()
    }

    pub fn quantity(&self) -> &Quantity {
        &self.quantity
    }

    pub fn start_time(&self) -> Option<NaiveDateTime> {
        self.time.first().copied()
    }

    pub fn end_time(&self) -> Option<NaiveDateTime> {
        self.time.last().copied()
    }

    pub fn period(&self) -> Option<Period> {
        Period::of_sorted(&self.time)
    }

    /// Rename the series. The primary variable follows when it carries the series name.
    pub fn set_name(&mut self, name: impl Into<String>) -> SkillResult<()> {
        let name = name.into();
        if name.is_empty() {
            return Err(SkillError::invalid_value("series name must not be empty"));
        }
        if self.variables[0].name == self.name {
            self.variables[0].name = name.clone();
        }
        self.name = name;
        Ok(())
    }

    pub fn set_quantity(&mut self, quantity: Quantity) {
        self.quantity = quantity;
    }

    /// Rename one variable, keeping names unique.
    pub fn rename_variable(&mut self, old: &str, new: &str) -> SkillResult<()> {
        if old == new {
            return Ok(());
        }
        if self.variable(new).is_some() {
            return Err(SkillError::name_collision(format!(
                "cannot rename '{old}' to '{new}': '{new}' already exists"
            )));
        }
        let var = self
            .variables
            .iter_mut()
            .find(|v| v.name == old)
            .ok_or_else(|| SkillError::not_found(format!("variable '{old}'")))?;
        var.name = new.to_string();
        Ok(())
    }

    /// Change the kind of the primary variable.
    pub fn set_primary_kind(&mut self, kind: VarKind) {
        self.variables[0].kind = kind;
    }

    /// Rows at the given positions, which must be increasing.
    pub fn take(&self, rows: &[usize]) -> TimeSeries {
        TimeSeries {
            name: self.name.clone(),
            time: rows.iter().map(|&i| self.time[i]).collect(),
            variables: self.variables.iter().map(|v| v.take(rows)).collect(),
            coords: self.coords.take(rows),
            quantity: self.quantity.clone(),
        }
    }

    /// Rows where `mask` is true.
    pub fn filter(&self, mask: &[bool]) -> TimeSeries {
        let rows: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter_map(|(i, &keep)| keep.then_some(i))
            .collect();
        self.take(&rows)
    }

    /// Rows with `start <= t <= end`.
    pub fn trim(&self, start: NaiveDateTime, end: NaiveDateTime) -> TimeSeries {
        let lo = self.time.partition_point(|t| *t < start);
        let hi = self.time.partition_point(|t| *t <= end).max(lo);
        let rows: Vec<usize> = (lo..hi).collect();
        self.take(&rows)
    }

    /// Drop rows where the primary variable is missing.
    pub fn dropna(&self) -> TimeSeries {
        let mask: Vec<bool> = self.values().iter().map(|v| !v.is_nan()).collect();
        self.filter(&mask)
    }

    /// Keep only the named variables, in the given order.
    pub fn select_variables(&self, names: &[&str]) -> SkillResult<TimeSeries> {
        let mut variables = Vec::with_capacity(names.len());
        for name in names {
            let var = self
                .variable(name)
                .ok_or_else(|| SkillError::not_found(format!("variable '{name}' in '{}'", self.name)))?;
            variables.push(var.clone());
        }
        TimeSeries::new(
            self.name.clone(),
            self.time.clone(),
            variables,
            self.coords.clone(),
            self.quantity.clone(),
        )
    }

    /// Take ownership of the parts.
    pub fn into_parts(self) -> (String, Vec<NaiveDateTime>, Vec<Variable>, Coordinates, Quantity) {
        (self.name, self.time, self.variables, self.coords, self.quantity)
    }
}

impl fmt::Display for TimeSeries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "<{} series> {}", self.gtype(), self.name)?;
        match (self.start_time(), self.end_time()) {
            (Some(start), Some(end)) => writeln!(f, "Time: {start} - {end}")?,
            _ => writeln!(f, "Time: (empty)")?,
        }
        if let Coordinates::Fixed { x, y, .. } = &self.coords {
            if let (Some(x), Some(y)) = (x, y) {
                writeln!(f, "Location: {x}, {y}")?;
            }
        }
        write!(f, "Quantity: {}", self.quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{daily_times, ts};

    fn sample() -> TimeSeries {
        TimeSeries::new(
            "HKNA",
            daily_times("2019-01-01", 4),
            vec![
                Variable::new("HKNA", VarKind::Observation, vec![1.0, f64::NAN, 3.0, 4.0]),
                Variable::new("wind", VarKind::Auxiliary, vec![5.0, 6.0, f64::NAN, 8.0]),
            ],
            Coordinates::fixed(Some(4.2), Some(52.7), None),
            Quantity::new("Water Level", "m"),
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_unsorted_time() {
        let time = vec![ts("2019-01-02"), ts("2019-01-01")];
        let err = TimeSeries::new(
            "a",
            time,
            vec![Variable::new("a", VarKind::Observation, vec![1.0, 2.0])],
            Coordinates::unknown(),
            Quantity::undefined(),
        )
        .unwrap_err();
        assert!(matches!(err, SkillError::InvalidValue(_)));
    }

    #[test]
    fn test_rejects_duplicate_variable() {
        let err = TimeSeries::new(
            "a",
            daily_times("2019-01-01", 1),
            vec![
                Variable::new("a", VarKind::Observation, vec![1.0]),
                Variable::new("a", VarKind::Auxiliary, vec![1.0]),
            ],
            Coordinates::unknown(),
            Quantity::undefined(),
        )
        .unwrap_err();
        assert!(matches!(err, SkillError::NameCollision(_)));
    }

    #[test]
    fn test_trim_is_inclusive() {
        let s = sample().trim(ts("2019-01-02"), ts("2019-01-03"));
        assert_eq!(s.time(), &[ts("2019-01-02"), ts("2019-01-03")]);
        let empty = sample().trim(ts("2020-01-01"), ts("2020-02-01"));
        assert!(empty.is_empty());
    }

    #[test]
    fn test_dropna_checks_primary_only() {
        assert_eq!(sample().dropna().n_points(), 3);
    }

    #[test]
    fn test_set_name_renames_primary() {
        let mut s = sample();
        s.set_name("Hoek").unwrap();
        assert_eq!(s.primary().name, "Hoek");
        assert_eq!(s.aux_names(), vec!["wind"]);
    }
}
