// tests/log_dir.rs

use std::fs;

use chrono::{Local, TimeZone};
use tempfile::TempDir;

use scatter::engine::log_dir::{copy_source_config, create_run_dir, node_log_path};

#[test]
fn run_dirs_are_named_by_timestamp_and_never_reused() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("logs");
    let started = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();

    let first = create_run_dir(&root, started).unwrap();
    let second = create_run_dir(&root, started).unwrap();
    let third = create_run_dir(&root, started).unwrap();

    assert_eq!(first, root.join("20240309_140507"));
    assert_eq!(second, root.join("20240309_140507_2"));
    assert_eq!(third, root.join("20240309_140507_3"));
    assert!(first.is_dir() && second.is_dir() && third.is_dir());
}

#[test]
fn source_config_is_copied_under_its_own_name() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("prod.toml");
    fs::write(&source, "[[nodes]]\n").unwrap();
    let run_dir = create_run_dir(&tmp.path().join("logs"), Local::now()).unwrap();

    copy_source_config(&run_dir, &source);
    assert_eq!(fs::read_to_string(run_dir.join("prod.toml")).unwrap(), "[[nodes]]\n");

    // A missing source is skipped quietly.
    copy_source_config(&run_dir, &tmp.path().join("gone.toml"));
    assert!(!run_dir.join("gone.toml").exists());

    assert_eq!(node_log_path(&run_dir, "web-1"), run_dir.join("web-1.log"));
}
