//! Common test fixtures: the reference matched table, areas and stations.

/// The six-row daily reference table used across comparer tests.
///
/// The last observation is missing, so matching keeps five rows.
pub mod matched {
    pub const START: &str = "2019-01-01";
    pub const N_ROWS: usize = 6;
    pub const OBSERVATION: [f64; 6] = [1.0, 2.0, 3.0, 4.0, 5.0, f64::NAN];
    pub const X: [f64; 6] = [10.1, 10.2, 10.3, 10.4, 10.5, 10.6];
    pub const Y: [f64; 6] = [55.1, 55.2, 55.3, 55.4, 55.5, 55.6];
    pub const M1: [f64; 6] = [1.5, 2.4, 3.6, 4.9, 5.6, 6.4];
    pub const M2: [f64; 6] = [1.1, 2.2, 3.1, 4.2, 4.9, 6.2];

    /// Fixed position of the point variant of the reference table.
    pub const POINT_XY: (f64, f64) = (10.0, 55.0);

    /// RMSE of m1 against the five valid observations.
    pub const RMSE_M1: f64 = 0.622_896_460_095_897_5;
    /// RMSE of m2 against the five valid observations.
    pub const RMSE_M2: f64 = 0.148_323_969_741_913_34;
}

/// Selection areas as (x0, y0, x1, y1) or flat polygon vertices.
pub mod areas {
    /// Keeps the first two rows of the reference track.
    pub const BBOX_FIRST_TWO: [f64; 4] = [9.9, 54.9, 10.25, 55.25];

    /// Same region as [`BBOX_FIRST_TWO`] given as polygon vertices.
    pub const POLYGON_FIRST_TWO: [f64; 8] = [9.9, 54.9, 10.25, 54.9, 10.25, 55.25, 9.9, 55.25];

    /// Region far from the reference data.
    pub const NOWHERE: [f64; 4] = [-10.0, -10.0, -9.0, -9.0];
}

/// Named station positions.
pub mod stations {
    pub const HKNA: (f64, f64) = (4.242, 52.6887);
    pub const EPL: (f64, f64) = (3.276, 51.998);
}

#[cfg(test)]
mod tests {
    use super::matched;

    #[test]
    fn test_reference_rmse_constants() {
        let rmse = |m: &[f64; 6]| {
            let sum: f64 = (0..5).map(|i| (m[i] - matched::OBSERVATION[i]).powi(2)).sum();
            (sum / 5.0).sqrt()
        };
        assert!((rmse(&matched::M1) - matched::RMSE_M1).abs() < 1e-12);
        assert!((rmse(&matched::M2) - matched::RMSE_M2).abs() < 1e-12);
    }
}
