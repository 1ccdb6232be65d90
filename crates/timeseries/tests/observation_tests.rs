//! Integration tests for building observations from tables.

use chrono::Duration;
use skill_common::{GeometryType, ItemRef, Quantity, SkillError};
use test_utils::{assert_approx_eq, daily_times, ts};
use timeseries::{
    Column, DataTable, DuplicatePolicy, Observation, PointObservation, TableIndex, TrackObservation,
};

fn altimetry_table() -> DataTable {
    // two repeated timestamps in a five row track
    let time = vec![
        ts("2017-10-26T04:37:37"),
        ts("2017-10-26T04:37:37"),
        ts("2017-10-26T04:37:54"),
        ts("2017-10-26T04:38:11"),
        ts("2017-10-26T04:38:11"),
    ];
    DataTable::with_time_index(
        time,
        vec![
            Column::float("lon", vec![2.1, 2.2, 2.3, 2.4, 2.5]),
            Column::float("lat", vec![51.1, 51.2, 51.3, 51.4, 51.5]),
            Column::float("swh", vec![1.1, 1.2, 1.3, 1.4, 1.5]),
            Column::float("wind_speed", vec![5.0, 6.0, 7.0, 8.0, 9.0]),
        ],
    )
    .unwrap()
}

// ============================================================================
// Track observations and duplicate timestamps
// ============================================================================

#[test]
fn test_track_keep_first_by_default() {
    let obs = TrackObservation::builder(altimetry_table())
        .item("swh")
        .build()
        .unwrap();
    assert_eq!(obs.n_points(), 3);
    assert_eq!(obs.values(), &[1.1, 1.3, 1.4]);
    assert_eq!(obs.x(), vec![2.1, 2.3, 2.4]);
}

#[test]
fn test_track_keep_last() {
    let obs = TrackObservation::builder(altimetry_table())
        .item("swh")
        .keep_duplicates(DuplicatePolicy::KeepLast)
        .build()
        .unwrap();
    assert_eq!(obs.values(), &[1.2, 1.3, 1.5]);
}

#[test]
fn test_track_drop_all_duplicates() {
    let obs = TrackObservation::builder(altimetry_table())
        .item("swh")
        .keep_duplicates(DuplicatePolicy::DropAll)
        .build()
        .unwrap();
    assert_eq!(obs.values(), &[1.3]);
}

#[test]
fn test_track_offset_shifts_each_repeat() {
    let obs = TrackObservation::builder(altimetry_table())
        .item("swh")
        .keep_duplicates(DuplicatePolicy::offset_default())
        .build()
        .unwrap();
    assert_eq!(obs.n_points(), 5);
    let t = obs.time();
    assert_eq!(t[1] - t[0], Duration::milliseconds(1));
    assert_eq!(t[4] - t[3], Duration::milliseconds(1));
    assert!(t.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_track_aux_items_and_explicit_positions() {
    let obs = TrackObservation::builder(altimetry_table())
        .x_item(0)
        .y_item(1)
        .item(2)
        .aux_items(["wind_speed"])
        .name("c2")
        .build()
        .unwrap();
    assert_eq!(obs.name(), "c2");
    assert_eq!(obs.series().aux_names(), vec!["wind_speed"]);
}

#[test]
fn test_track_without_item_is_ambiguous_with_two_value_columns() {
    let err = TrackObservation::builder(altimetry_table()).build().unwrap_err();
    assert!(matches!(err, SkillError::InvalidValue(_)));
}

// ============================================================================
// Point observations
// ============================================================================

#[test]
fn test_point_time_rounded_to_100us() {
    let time = vec![ts("2019-01-01T00:00:00") + Duration::microseconds(30), ts("2019-01-02")];
    let table = DataTable::from_series("WL", time, vec![1.0, 2.0]).unwrap();
    let obs = PointObservation::builder(table).x(1.0).y(2.0).build().unwrap();
    assert_eq!(obs.time()[0], ts("2019-01-01"));
}

#[test]
fn test_point_with_time_column_and_quantity() {
    let table = DataTable::new(
        TableIndex::Range(3),
        vec![
            Column::time("Date", daily_times("2019-01-01", 3)),
            Column::float("Hm0", vec![0.5, 0.6, 0.7]).with_quantity(Quantity::new("Significant wave height", "m")),
        ],
    )
    .unwrap();
    let obs = PointObservation::builder(table).build().unwrap();
    assert_eq!(obs.quantity().name, "Significant wave height");
    assert_eq!(obs.time()[2], ts("2019-01-03"));
}

#[test]
fn test_point_non_datetime_index_rejected() {
    let table = DataTable::new(TableIndex::Range(2), vec![Column::float("WL", vec![1.0, 2.0])]).unwrap();
    let err = PointObservation::builder(table).build().unwrap_err();
    assert!(matches!(err, SkillError::InvalidType(_)));
}

#[test]
fn test_point_unknown_item() {
    let table = DataTable::from_series("WL", daily_times("2019-01-01", 2), vec![1.0, 2.0]).unwrap();
    let err = PointObservation::builder(table).item("Hm0").build().unwrap_err();
    assert!(matches!(err, SkillError::NotFound(_)));
}

#[test]
fn test_point_index_out_of_range() {
    let table = DataTable::from_series("WL", daily_times("2019-01-01", 2), vec![1.0, 2.0]).unwrap();
    let err = PointObservation::builder(table).item(ItemRef::Index(3)).build().unwrap_err();
    assert!(matches!(err, SkillError::IndexOutOfRange { .. }));
}

#[test]
fn test_observation_enum_trim() {
    let table = DataTable::from_series("WL", daily_times("2019-01-01", 5), vec![1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
    let obs: Observation = PointObservation::builder(table)
        .weight(2.5)
        .build()
        .unwrap()
        .into();
    let trimmed = obs.trim(ts("2019-01-02"), ts("2019-01-04"));
    assert_eq!(trimmed.n_points(), 3);
    assert_eq!(trimmed.gtype(), GeometryType::Point);
    assert_approx_eq!(trimmed.weight(), 2.5, 1e-12);
}
