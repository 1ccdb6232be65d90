//! End-to-end runs over the bundled test configuration.

use std::path::PathBuf;

use comparison::{Comparer, GroupBy, Metric};
use skill_runner::{load_config, match_from_config, run, CsvReader, RunOptions};
use test_utils::fixtures::stations;
use test_utils::{assert_approx_eq, assert_coords_approx_eq, find_test_file, require_test_file, service_testdata_dir, temp_test_dir, write_test_file};

fn config_path() -> PathBuf {
    find_test_file("config.yml").unwrap()
}

#[test]
fn test_load_config_resolves_relative_paths() {
    let path = require_test_file!("config.yml");
    let config = load_config(path, false).unwrap();
    let hd = &config.modelresults[0].1.source.filename;
    assert!(hd.ends_with("testdata/model/hd.csv"), "{hd}");
    assert!(PathBuf::from(hd).is_absolute());

    let names: Vec<&str> = config.included_observations().map(|(k, _)| k).collect();
    assert_eq!(names, vec!["HKNA", "EPL"]);
}

#[test]
fn test_match_from_config() {
    let config = load_config(config_path(), false).unwrap();
    let cc = match_from_config(&config, &CsvReader::new()).unwrap();

    assert_eq!(cc.names(), vec!["HKNA", "EPL"]);
    assert_eq!(cc.mod_names(), vec!["HD", "SW"]);
    // EPL: the empty cell is dropped and 2019-01-06 is past the model period
    assert_eq!(cc.get("EPL").unwrap().n_points(), 2);
    assert_eq!(cc.get("HKNA").unwrap().n_points(), 5);
    assert_eq!(cc.get("EPL").unwrap().weight(), 2.0);
}

#[test]
fn test_run_writes_table_and_comparers() {
    let config = load_config(config_path(), false).unwrap();
    let out = tempfile::tempdir().unwrap();
    let options = RunOptions {
        output: Some(out.path().join("skill.csv")),
        save_dir: Some(out.path().join("comparers")),
        ..Default::default()
    };

    let table = run(&config, &CsvReader::new(), &options).unwrap();
    assert_eq!(table.len(), 4);
    assert_eq!(table.metrics(), ["bias", "rmse"]);

    let hd_hkna = table.sel_model("HD").unwrap().sel_observation("HKNA").unwrap();
    assert_eq!(hd_hkna.n(), vec![5]);
    assert_approx_eq!(hd_hkna.metric("bias").unwrap()[0], 0.5, 1e-12);
    assert_approx_eq!(hd_hkna.metric("rmse").unwrap()[0], 0.5, 1e-12);

    let sw_epl = table.sel_model("SW").unwrap().sel_observation("EPL").unwrap();
    assert_eq!(sw_epl.n(), vec![2]);
    assert_approx_eq!(sw_epl.metric("bias").unwrap()[0], 0.0, 1e-12);

    let csv = std::fs::read_to_string(out.path().join("skill.csv")).unwrap();
    let header = csv.lines().next().unwrap();
    assert!(header.starts_with("model,observation"), "{header}");
    assert!(header.contains("n,bias,rmse,x,y"), "{header}");
    assert_eq!(csv.lines().count(), 5);

    let hkna = Comparer::load(out.path().join("comparers/HKNA.json")).unwrap();
    assert_eq!(hkna.n_points(), 5);
    assert_eq!(hkna.mod_names(), vec!["HD", "SW"]);
    assert!(out.path().join("comparers/EPL.json").exists());
}

#[test]
fn test_cli_options_override_config() {
    let config = load_config(config_path(), false).unwrap();
    let options = RunOptions {
        metrics: Some(vec![Metric::from_name("mae").unwrap()]),
        by: Some(vec![GroupBy::Model]),
        ..Default::default()
    };
    let table = run(&config, &CsvReader::new(), &options).unwrap();
    assert_eq!(table.metrics(), ["mae"]);
    assert_eq!(table.len(), 2);
    assert_eq!(table.sel_model("SW").unwrap().n(), vec![7]);
}

#[test]
fn test_missing_input_file_fails() {
    let mut config = load_config(config_path(), false).unwrap();
    config.observations[0].1.source.filename = "/nonexistent/hkna.csv".to_string();
    let err = run(&config, &CsvReader::new(), &RunOptions::default()).unwrap_err();
    assert!(format!("{err:#}").contains("HKNA"));
}

#[test]
fn test_absolute_paths_config_from_elsewhere() {
    let data = service_testdata_dir("skill-runner");
    let dir = temp_test_dir();
    let text = format!(
        "modelresults:\n  HD:\n    filename: {}\nobservations:\n  HKNA:\n    filename: {}\n    x: {}\n    y: {}\nrelative_path: false\n",
        data.join("model/hd.csv").display(),
        data.join("obs/hkna.csv").display(),
        stations::HKNA.0,
        stations::HKNA.1,
    );
    let path = write_test_file(dir.path(), "skill.yml", &text);

    let config = load_config(&path, false).unwrap();
    let table = run(&config, &CsvReader::new(), &RunOptions::default()).unwrap();
    // a single model and observation group by model only
    assert_eq!(table.by(), ["model"]);
    assert_eq!(table.n(), vec![5]);
    assert_coords_approx_eq!((table.x()[0], table.y()[0]), (stations::HKNA.0, stations::HKNA.1), 1e-12);
}
