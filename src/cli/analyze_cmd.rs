//! Handler for the `pyinfer analyze` subcommand.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::analysis::{Analyzer, BindingKind};
use crate::config::AnalyzerConfig;
use crate::diagnostics::Diagnostic;
use crate::fs::{FileSystem, OsFileSystem};

/// Settings for one `analyze` run, after flag parsing
#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    pub path: PathBuf,
    pub search_paths: Vec<PathBuf>,
    pub json: bool,
    pub no_cache: bool,
    pub clear_cache: bool,
    pub bindings: bool,
    pub quiet: bool,
}

/// One row of the binding table
#[derive(Debug, Serialize)]
struct BindingRow {
    name: String,
    qname: String,
    kind: BindingKind,
    #[serde(rename = "type")]
    ty: String,
    file: PathBuf,
    line: usize,
    col: usize,
    refs: usize,
}

#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    diagnostics: Vec<&'a Diagnostic>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bindings: Option<Vec<BindingRow>>,
    stats: crate::analysis::AnalysisStats,
}

pub(crate) fn run_analyze(
    options: &AnalyzeOptions,
    out: &mut dyn Write,
) -> Result<bool, Box<dyn std::error::Error>> {
    run_with(Box::new(OsFileSystem), options, out)
}

/// Analyze with an explicit file system, writing the report to `out`
pub(crate) fn run_with(
    fs: Box<dyn FileSystem>,
    options: &AnalyzeOptions,
    out: &mut dyn Write,
) -> Result<bool, Box<dyn std::error::Error>> {
    let root = fs.full_path(&options.path);
    let project = if fs.dir_exists(&root) {
        root.clone()
    } else {
        root.parent().map(Path::to_path_buf).unwrap_or_else(|| root.clone())
    };

    // flags override pyinfer.toml
    let mut config = AnalyzerConfig::load(fs.as_ref(), &project)?;
    config
        .search_paths
        .extend(options.search_paths.iter().map(|p| fs.full_path(p)));
    if options.no_cache {
        config.disk_cache = false;
    }
    config.quiet |= options.quiet;

    let mut analyzer = Analyzer::new(fs, config)?;
    if options.clear_cache {
        analyzer.clear_cache()?;
    }
    analyzer.analyze(&root);
    analyzer.finish();

    if options.json {
        write_json(&analyzer, options, out)?;
    } else {
        write_text(&analyzer, options, out)?;
    }
    analyzer.close();
    Ok(analyzer.failed_to_parse().is_empty())
}

/// Parse errors first, then semantic problems, file by file
fn all_diagnostics(analyzer: &Analyzer) -> Vec<&Diagnostic> {
    analyzer
        .parse_errors()
        .values()
        .chain(analyzer.semantic_errors().values())
        .flatten()
        .collect()
}

fn binding_rows(analyzer: &Analyzer) -> Vec<BindingRow> {
    analyzer
        .bindings()
        .into_iter()
        .map(|b| BindingRow {
            name: b.name.clone(),
            qname: b.qname.clone(),
            kind: b.kind,
            ty: analyzer.describe(&b.ty),
            file: b.node.file.clone(),
            line: b.node.start_line,
            col: b.node.start_col,
            refs: b.refs.len(),
        })
        .collect()
}

fn write_json(
    analyzer: &Analyzer,
    options: &AnalyzeOptions,
    out: &mut dyn Write,
) -> Result<(), Box<dyn std::error::Error>> {
    let report = JsonReport {
        diagnostics: all_diagnostics(analyzer),
        bindings: options.bindings.then(|| binding_rows(analyzer)),
        stats: analyzer.stats(),
    };
    serde_json::to_writer_pretty(&mut *out, &report)?;
    writeln!(out)?;
    Ok(())
}

fn write_text(
    analyzer: &Analyzer,
    options: &AnalyzeOptions,
    out: &mut dyn Write,
) -> Result<(), Box<dyn std::error::Error>> {
    for diagnostic in all_diagnostics(analyzer) {
        let source = analyzer
            .file_system()
            .read_to_string(&diagnostic.span.file)
            .unwrap_or_default();
        writeln!(out, "{}", diagnostic.to_human_readable(&source))?;
    }

    if options.bindings {
        for row in binding_rows(analyzer) {
            writeln!(
                out,
                "{}:{}:{} {} {}: {} ({} refs)",
                row.file.display(),
                row.line,
                row.col,
                row.kind,
                row.qname,
                row.ty,
                row.refs
            )?;
        }
    }

    if !options.quiet {
        writeln!(out, "{}", analyzer.analysis_summary())?;
    }
    Ok(())
}
