use super::analyze_cmd::run_with;
use super::*;
use crate::fs::MemoryFileSystem;

fn project() -> MemoryFileSystem {
    MemoryFileSystem::new()
        .with_current_dir("/work")
        .with_file("/work/app/main.py", "import helpers\nn = helpers.count()\nprint(nope)\n")
        .with_file("/work/app/helpers.py", "def count():\n    return 1\n")
}

fn options(path: &str) -> AnalyzeOptions {
    AnalyzeOptions {
        path: PathBuf::from(path),
        no_cache: true,
        quiet: true,
        ..AnalyzeOptions::default()
    }
}

fn run_to_string(fs: MemoryFileSystem, options: &AnalyzeOptions) -> (bool, String) {
    let mut out = Vec::new();
    let ok = run_with(Box::new(fs), options, &mut out).unwrap();
    (ok, String::from_utf8(out).unwrap())
}

#[test]
fn test_parse_analyze_flags() {
    let cli = Cli::try_parse_from([
        "pyinfer", "analyze", "src", "--path", "vendor", "--path", "lib", "--json", "--no-cache",
        "--bindings",
    ])
    .unwrap();
    assert!(cli.json);
    let Command::Analyze {
        path,
        search_paths,
        no_cache,
        clear_cache,
        bindings,
    } = cli.command;
    assert_eq!(path, PathBuf::from("src"));
    assert_eq!(search_paths, vec![PathBuf::from("vendor"), PathBuf::from("lib")]);
    assert!(no_cache);
    assert!(!clear_cache);
    assert!(bindings);
}

#[test]
fn test_quiet_and_verbose_conflict() {
    assert!(Cli::try_parse_from(["pyinfer", "-q", "-v", "analyze", "."]).is_err());
}

#[test]
fn test_log_level_follows_flags() {
    let quiet = Cli::try_parse_from(["pyinfer", "-q", "analyze", "."]).unwrap();
    let verbose = Cli::try_parse_from(["pyinfer", "analyze", ".", "--verbose"]).unwrap();
    let default = Cli::try_parse_from(["pyinfer", "analyze", "."]).unwrap();
    assert_eq!(quiet.log_level(), log::LevelFilter::Warn);
    assert_eq!(verbose.log_level(), log::LevelFilter::Debug);
    assert_eq!(default.log_level(), log::LevelFilter::Info);
}

#[test]
fn test_text_report_lists_diagnostics() {
    let (ok, output) = run_to_string(project(), &options("app"));
    assert!(ok);
    assert!(output.contains("error[E1002]: unresolved name: nope"));
    assert!(output.contains("/work/app/main.py:3:7"));
    assert!(!output.contains("analysis summary"));
}

#[test]
fn test_binding_table_and_summary() {
    let mut options = options("app");
    options.bindings = true;
    options.quiet = false;
    let (_, output) = run_to_string(project(), &options);
    assert!(output.contains("main.n: int (0 refs)"));
    assert!(output.contains("helpers.count: def count -> int (1 refs)"));
    assert!(output.contains("analysis summary"));
}

#[test]
fn test_json_report() {
    let mut options = options("app");
    options.json = true;
    let (_, output) = run_to_string(project(), &options);
    let report: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(report["stats"]["modules_loaded"], 2);
    let codes: Vec<&str> = report["diagnostics"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|d| d["code"].as_str())
        .collect();
    assert!(codes.contains(&"E1002"));
    assert!(report.get("bindings").is_none());
}

#[test]
fn test_parse_failure_fails_the_run() {
    let fs = project().with_file("/work/app/broken.py", "class :\n");
    let (ok, output) = run_to_string(fs, &options("app"));
    assert!(!ok);
    assert!(output.contains("broken.py"));
}

#[test]
fn test_config_file_search_paths() {
    let fs = MemoryFileSystem::new()
        .with_current_dir("/work")
        .with_file("/work/app/pyinfer.toml", "search_paths = [\"../vendor\"]\n")
        .with_file("/work/app/main.py", "import extlib\nx = extlib.VERSION\n")
        .with_file("/work/vendor/extlib.py", "VERSION = \"1.0\"\n");
    let mut options = options("app");
    options.bindings = true;
    let (_, output) = run_to_string(fs, &options);
    assert!(!output.contains("module not found"));
    assert!(output.contains("main.x: str"));
}
