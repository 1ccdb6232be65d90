//! Column-name synonyms for positions and time.

use crate::table::Column;

const X_SYNONYMS: [&str; 6] = ["x", "lon", "long", "longitude", "east", "easting"];
const Y_SYNONYMS: [&str; 5] = ["y", "lat", "latitude", "north", "northing"];
const Z_SYNONYMS: [&str; 1] = ["z"];
const TIME_SYNONYMS: [&str; 5] = ["time", "t", "date", "datetime", "timestamp"];

/// Canonical name for a column name, if it is a known synonym (case-insensitive).
pub fn canonical_name(name: &str) -> Option<&'static str> {
    let lower = name.to_ascii_lowercase();
    let groups: [(&'static str, &[&str]); 4] = [
        ("x", &X_SYNONYMS),
        ("y", &Y_SYNONYMS),
        ("z", &Z_SYNONYMS),
        ("time", &TIME_SYNONYMS),
    ];
    groups
        .iter()
        .find(|(_, names)| names.contains(&lower.as_str()))
        .map(|(canonical, _)| *canonical)
}

/// Rename synonym columns to their canonical names.
///
/// A column is left alone when its canonical name is already taken.
pub fn reconcile_names(columns: &mut [Column]) {
    for i in 0..columns.len() {
        let Some(canonical) = canonical_name(&columns[i].name) else {
            continue;
        };
        if columns[i].name == canonical || columns.iter().any(|c| c.name == canonical) {
            continue;
        }
        tracing::debug!(from = %columns[i].name, to = canonical, "renamed column");
        columns[i].name = canonical.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_names() {
        assert_eq!(canonical_name("Longitude"), Some("x"));
        assert_eq!(canonical_name("LAT"), Some("y"));
        assert_eq!(canonical_name("Date"), Some("time"));
        assert_eq!(canonical_name("Hm0"), None);
    }

    #[test]
    fn test_existing_canonical_wins() {
        let mut cols = vec![Column::float("x", vec![]), Column::float("lon", vec![])];
        reconcile_names(&mut cols);
        assert_eq!(cols[0].name, "x");
        assert_eq!(cols[1].name, "lon");
    }
}
