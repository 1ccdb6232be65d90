//! Resolution of repeated timestamps.

use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDateTime};
use skill_common::time::duration_from_secs_f64;
use skill_common::{SkillError, SkillResult};

/// Default shift between repeated timestamps for [`DuplicatePolicy::Offset`].
pub const DEFAULT_DUPLICATE_OFFSET_SECS: f64 = 0.001;

/// What to do with rows sharing a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    #[default]
    KeepFirst,
    KeepLast,
    /// Remove every row of a repeated timestamp.
    DropAll,
    /// Keep all rows, shifting the k-th repeat by k × offset.
    Offset(Duration),
}

impl DuplicatePolicy {
    /// Offset policy with the default shift of 1 ms.
    pub fn offset_default() -> Self {
        DuplicatePolicy::Offset(Duration::milliseconds(1))
    }

    pub fn offset_secs(secs: f64) -> SkillResult<Self> {
        let offset = duration_from_secs_f64(secs)?;
        if offset <= Duration::zero() {
            return Err(SkillError::invalid_value(format!("duplicate offset must be positive, got {secs}")));
        }
        Ok(DuplicatePolicy::Offset(offset))
    }
}

impl FromStr for DuplicatePolicy {
    type Err = SkillError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first" => Ok(DuplicatePolicy::KeepFirst),
            "last" => Ok(DuplicatePolicy::KeepLast),
            "false" | "drop" | "none" => Ok(DuplicatePolicy::DropAll),
            "offset" => Ok(DuplicatePolicy::offset_default()),
            other => Err(SkillError::invalid_value(format!(
                "keep_duplicates must be one of first, last, offset or false, got '{other}'"
            ))),
        }
    }
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicatePolicy::KeepFirst => f.write_str("first"),
            DuplicatePolicy::KeepLast => f.write_str("last"),
            DuplicatePolicy::DropAll => f.write_str("false"),
            DuplicatePolicy::Offset(d) => write!(f, "offset({}s)", d.num_microseconds().unwrap_or(0) as f64 / 1e6),
        }
    }
}

/// Rows kept after resolving duplicates, and their (possibly shifted) times.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub rows: Vec<usize>,
    pub time: Vec<NaiveDateTime>,
    pub n_removed: usize,
}

/// Apply a duplicate policy to a non-decreasing time axis.
///
/// The result is strictly increasing. An offset that pushes a repeat onto or
/// past the next distinct timestamp cannot be resolved and is an error.
pub fn resolve_duplicates(time: &[NaiveDateTime], policy: DuplicatePolicy) -> SkillResult<Resolved> {
    if let Some(w) = time.windows(2).find(|w| w[1] < w[0]) {
        return Err(SkillError::invalid_value(format!(
            "time must be increasing, found {} followed by {}",
            w[0], w[1]
        )));
    }

    let mut rows = Vec::with_capacity(time.len());
    let mut out = Vec::with_capacity(time.len());
    let mut start = 0;
    while start < time.len() {
        let mut end = start + 1;
        while end < time.len() && time[end] == time[start] {
            end += 1;
        }
        let group = start..end;
        let repeated = group.len() > 1;
        match policy {
            _ if !repeated => {
                rows.push(start);
                out.push(time[start]);
            }
            DuplicatePolicy::KeepFirst => {
                rows.push(start);
                out.push(time[start]);
            }
            DuplicatePolicy::KeepLast => {
                rows.push(end - 1);
                out.push(time[start]);
            }
            DuplicatePolicy::DropAll => {}
            DuplicatePolicy::Offset(offset) => {
                for (k, row) in group.enumerate() {
                    rows.push(row);
                    out.push(time[row] + offset * k as i32);
                }
            }
        }
        start = end;
    }

    if let Some(w) = out.windows(2).find(|w| w[1] <= w[0]) {
        return Err(SkillError::invalid_value(format!(
            "duplicate timestamps cannot be resolved with {policy}: {} collides with {}",
            w[0], w[1]
        )));
    }

    Ok(Resolved {
        n_removed: time.len() - rows.len(),
        rows,
        time: out,
    })
}
