//! Matched data in long format: one row per model and timestamp.

use chrono::NaiveDateTime;

/// Column-oriented long table of matched data.
///
/// Rows are grouped by model in the order models appear. Auxiliary columns
/// missing from some comparers are filled with NaN.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LongTable {
    pub model: Vec<String>,
    pub observation: Vec<String>,
    pub time: Vec<NaiveDateTime>,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub obs_val: Vec<f64>,
    pub mod_val: Vec<f64>,
    pub aux: Vec<(String, Vec<f64>)>,
}

impl LongTable {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn aux_column(&self, name: &str) -> Option<&[f64]> {
        self.aux.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_slice())
    }

    /// Distinct model names in order of appearance.
    pub fn model_names(&self) -> Vec<String> {
        unique_in_order(&self.model)
    }

    /// Distinct observation names in order of appearance.
    pub fn observation_names(&self) -> Vec<String> {
        unique_in_order(&self.observation)
    }

    /// Append the rows of `other`.
    pub fn extend(&mut self, other: LongTable) {
        let n_before = self.len();
        let n_other = other.len();
        for (name, _) in &other.aux {
            if self.aux_column(name).is_none() {
                self.aux.push((name.clone(), vec![f64::NAN; n_before]));
            }
        }
        for (name, values) in self.aux.iter_mut() {
            match other.aux.iter().find(|(n, _)| n == name) {
                Some((_, theirs)) => values.extend_from_slice(theirs),
                None => values.extend(std::iter::repeat(f64::NAN).take(n_other)),
            }
        }
        self.model.extend(other.model);
        self.observation.extend(other.observation);
        self.time.extend(other.time);
        self.x.extend(other.x);
        self.y.extend(other.y);
        self.obs_val.extend(other.obs_val);
        self.mod_val.extend(other.mod_val);
    }

    /// Rows at the given positions.
    pub fn take(&self, rows: &[usize]) -> LongTable {
        let pick_str = |v: &[String]| -> Vec<String> { rows.iter().map(|&i| v[i].clone()).collect() };
        let pick = |v: &[f64]| -> Vec<f64> { rows.iter().map(|&i| v[i]).collect() };
        LongTable {
            model: pick_str(&self.model),
            observation: pick_str(&self.observation),
            time: rows.iter().map(|&i| self.time[i]).collect(),
            x: pick(&self.x),
            y: pick(&self.y),
            obs_val: pick(&self.obs_val),
            mod_val: pick(&self.mod_val),
            aux: self.aux.iter().map(|(n, v)| (n.clone(), pick(v))).collect(),
        }
    }
}

fn unique_in_order(values: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for v in values {
        if !out.contains(v) {
            out.push(v.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::daily_times;

    fn table(model: &str, aux: Option<&str>) -> LongTable {
        let time = daily_times("2019-01-01", 2);
        LongTable {
            model: vec![model.to_string(); 2],
            observation: vec!["obs".to_string(); 2],
            time,
            x: vec![0.0; 2],
            y: vec![0.0; 2],
            obs_val: vec![1.0, 2.0],
            mod_val: vec![1.5, 2.5],
            aux: aux.map(|a| vec![(a.to_string(), vec![9.0, 9.0])]).unwrap_or_default(),
        }
    }

    #[test]
    fn test_extend_fills_missing_aux() {
        let mut a = table("m1", Some("wind"));
        a.extend(table("m2", None));
        assert_eq!(a.len(), 4);
        assert_eq!(a.model_names(), vec!["m1", "m2"]);
        let wind = a.aux_column("wind").unwrap();
        assert_eq!(wind[..2], [9.0, 9.0]);
        assert!(wind[2].is_nan() && wind[3].is_nan());
    }

    #[test]
    fn test_take() {
        let t = table("m1", None).take(&[1]);
        assert_eq!(t.obs_val, vec![2.0]);
        assert_eq!(t.len(), 1);
    }
}
