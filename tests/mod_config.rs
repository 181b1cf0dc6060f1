use bson::doc;
use docquery::{Context, ErrorKind, MemoryBackend, QueryConfig};
use std::io::Write;

#[test]
fn defaults() {
    let cfg = QueryConfig::default();
    assert!(cfg.safe_writes);
    assert!(cfg.default_options.is_empty());
    assert_eq!(cfg.stream_buffer, 16);
    assert!(!cfg.verbose);
}

#[test]
fn parses_toml() {
    let cfg = QueryConfig::from_toml_str(
        r#"
safe_writes = false
stream_buffer = 4
verbose = true

[default_options]
write_concern = "majority"
"#,
    )
    .unwrap();
    assert!(!cfg.safe_writes);
    assert_eq!(cfg.stream_buffer, 4);
    assert!(cfg.verbose);
    assert_eq!(cfg.default_options.get_str("write_concern").unwrap(), "majority");
    assert_eq!(cfg.base_options(), doc! { "safe": false, "write_concern": "majority" });
}

#[test]
fn invalid_toml_is_a_configuration_error() {
    let err = QueryConfig::from_toml_str("stream_buffer = \"many\"").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn loads_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "stream_buffer = 32").unwrap();
    let cfg = QueryConfig::load(file.path()).unwrap();
    assert_eq!(cfg.stream_buffer, 32);
    assert!(cfg.safe_writes);

    let err = QueryConfig::load(&file.path().with_extension("missing")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
}

#[test]
fn environment_overlays_defaults() {
    // SAFETY: this is the only test in the binary touching these variables.
    unsafe {
        std::env::set_var("DOCQUERY_SAFE_WRITES", "false");
        std::env::set_var("DOCQUERY_STREAM_BUFFER", "8");
        std::env::set_var("DOCQUERY_VERBOSE", "not-a-bool");
    }
    let cfg = QueryConfig::from_env();
    assert!(!cfg.safe_writes);
    assert_eq!(cfg.stream_buffer, 8);
    assert!(!cfg.verbose);
    unsafe {
        std::env::remove_var("DOCQUERY_SAFE_WRITES");
        std::env::remove_var("DOCQUERY_STREAM_BUFFER");
        std::env::remove_var("DOCQUERY_VERBOSE");
    }
}

#[test]
fn context_applies_config_to_new_queries() {
    let cfg = QueryConfig { safe_writes: false, ..QueryConfig::default() };
    let ctx = Context::new(MemoryBackend::default()).with_config(cfg.clone());
    assert_eq!(ctx.config(), &cfg);
    assert_eq!(ctx.collection("users").state().options, doc! { "safe": false });
}
