use super::*;
use crate::fs::MemoryFileSystem;

#[test]
fn test_defaults_when_file_missing() {
    let fs = MemoryFileSystem::new();
    let config = AnalyzerConfig::load(&fs, Path::new("/project")).unwrap();
    assert_eq!(config, AnalyzerConfig::default());
    assert!(config.disk_cache);
    assert!(config.report_unused);
}

#[test]
fn test_partial_file_keeps_other_defaults() {
    let config = AnalyzerConfig::parse("disk_cache = false\n").unwrap();
    assert!(!config.disk_cache);
    assert!(config.use_pythonpath);
    assert!(config.search_paths.is_empty());
}

#[test]
fn test_relative_search_paths_resolve_against_root() {
    let fs = MemoryFileSystem::new().with_file(
        "/project/pyinfer.toml",
        "search_paths = [\"lib\", \"/opt/py\"]\nreport_unused = false\n",
    );
    let config = AnalyzerConfig::load(&fs, Path::new("/project")).unwrap();
    assert_eq!(
        config.search_paths,
        vec![PathBuf::from("/project/lib"), PathBuf::from("/opt/py")]
    );
    assert!(!config.report_unused);
}

#[test]
fn test_invalid_file_is_an_error() {
    let fs = MemoryFileSystem::new().with_file("/project/pyinfer.toml", "disk_cache = \"yes\"\n");
    let err = AnalyzerConfig::load(&fs, Path::new("/project")).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
    assert!(err.to_string().starts_with("invalid pyinfer.toml"));
}

#[test]
fn test_hermetic_disables_outside_state() {
    let config = AnalyzerConfig::hermetic();
    assert!(!config.disk_cache);
    assert!(!config.use_pythonpath);
}

#[test]
fn test_toml_round_trip() {
    let config = AnalyzerConfig {
        cache_dir: Some(PathBuf::from("/tmp/c")),
        quiet: true,
        ..AnalyzerConfig::default()
    };
    let text = config.to_toml().unwrap();
    assert_eq!(AnalyzerConfig::parse(&text).unwrap(), config);
}
