use docquery::logger::{build_config, parse_level};
use log::LevelFilter;

#[test]
fn level_names() {
    assert_eq!(parse_level(Some("DEBUG")), LevelFilter::Debug);
    assert_eq!(parse_level(Some("warn")), LevelFilter::Warn);
    assert_eq!(parse_level(Some("bogus")), LevelFilter::Info);
    assert_eq!(parse_level(None), LevelFilter::Info);
}

#[test]
fn rolling_files_are_created_in_the_log_dir() {
    let dir = tempfile::tempdir().unwrap();
    let logs = dir.path().join("logs");
    let config = build_config(Some(&logs), Some("debug"), Some(3)).unwrap();
    assert_eq!(config.root().level(), LevelFilter::Debug);
    assert!(logs.join("docquery.log").exists());
    assert!(logs.join("exec.log").exists());
    let names: Vec<&str> = config.loggers().iter().map(|l| l.name()).collect();
    assert!(names.contains(&"docquery::exec"));
    assert!(names.contains(&"docquery::stream"));
}
