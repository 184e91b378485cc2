//! End-to-end analysis tests through the public API
//!
//! The binding dump is snapshotted so changes to inference results show up
//! as a reviewable diff.

use std::path::Path;

use pyinfer::prelude::*;

const SHAPES: &str = "\
class Square:
    def __init__(self, side):
        self.side = side

    def area(self):
        return self.side * self.side

s = Square(2)
a = s.area()
";

fn dump(analyzer: &Analyzer) -> String {
    analyzer
        .bindings()
        .iter()
        .map(|b| {
            format!(
                "{}:{} {} {}: {}",
                b.node.start_line,
                b.node.start_col,
                b.kind,
                b.name,
                analyzer.describe(&b.ty)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[test]
fn test_binding_dump() {
    let fs = MemoryFileSystem::new().with_file("/proj/shapes.py", SHAPES);
    let mut analyzer = Analyzer::new(Box::new(fs), AnalyzerConfig::hermetic()).unwrap();
    analyzer.analyze(Path::new("/proj"));
    analyzer.finish();

    insta::assert_snapshot!(dump(&analyzer), @r"
    1:7 class Square: class Square
    2:9 function __init__: def __init__ -> None
    2:18 parameter self: Square
    2:24 parameter side: int
    3:14 attribute side: int
    5:9 function area: def area -> int
    5:14 parameter self: Square
    8:1 variable s: Square
    9:1 variable a: int
    ");
}

#[test]
fn test_summary_counters() {
    let fs = MemoryFileSystem::new().with_file("/proj/shapes.py", SHAPES);
    let mut analyzer = Analyzer::new(Box::new(fs), AnalyzerConfig::hermetic()).unwrap();
    analyzer.analyze(Path::new("/proj"));
    analyzer.finish();

    insta::assert_snapshot!(analyzer.stats().to_string(), @r"
    - modules loaded: 1
    - semantic problems: 1
    - failed to parse: 0
    - number of definitions: 9
    - number of cross references: 9
    - number of references: 9
    - resolved names: 6
    - unresolved names: 0
    - name resolve rate: 100%
    ");
}

#[test]
fn test_disk_cache_survives_between_runs() {
    let project = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    std::fs::write(project.path().join("shapes.py"), SHAPES).unwrap();

    let config = AnalyzerConfig {
        cache_dir: Some(cache.path().to_path_buf()),
        use_pythonpath: false,
        ..AnalyzerConfig::default()
    };

    let mut first = Analyzer::new(Box::new(OsFileSystem), config.clone()).unwrap();
    first.analyze(project.path());
    first.finish();
    assert_eq!(first.cache_stats().parses, 1);
    first.close();

    let mut second = Analyzer::new(Box::new(OsFileSystem), config).unwrap();
    second.analyze(project.path());
    second.finish();
    assert_eq!(second.cache_stats().parses, 0);
    assert_eq!(second.cache_stats().disk_hits, 1);
    assert_eq!(dump(&first), dump(&second));
}
