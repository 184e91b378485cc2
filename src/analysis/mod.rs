//! Whole-program type inference by abstract interpretation
//!
//! The [`Analyzer`] is the context of one run. It owns the scope and type
//! arenas, the reference table, the per-file diagnostics and the load and
//! call stacks; the loader, the statement transformer and the expression
//! evaluator are all methods on it.
//!
//! A run is `analyze(root)` (walk and load every source file), then
//! `finish()` (apply the functions no call site reached, then report
//! unresolved names and unused bindings).

pub mod binding;
pub mod builtins;
mod error;
mod expr;
mod loader;
pub mod scope;
mod transform;
pub mod types;

pub use binding::{Binding, BindingId, BindingKind};
pub use builtins::Builtins;
pub use error::AnalyzerError;
pub use scope::{Inserted, Scope, ScopeId, ScopeKind, ScopeTable};
pub use types::{ClassId, FunId, ModuleId, Prim, SiteType, Type, TypeStore};

use crate::cache::{AstCache, CacheStats};
use crate::config::AnalyzerConfig;
use crate::diagnostics::{error_codes, Diagnostic, Span};
use crate::fs::FileSystem;
use crate::parser::{PythonParser, SourceParser};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Return types collected while a function body is interpreted
#[derive(Debug, Default)]
struct Frame {
    ret: Option<Type>,
}

/// Counters reported at the end of a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnalysisStats {
    pub modules_loaded: usize,
    pub semantic_problems: usize,
    pub failed_to_parse: usize,
    pub definitions: usize,
    pub cross_references: usize,
    pub references: usize,
    pub resolved_names: usize,
    pub unresolved_names: usize,
    pub functions_called: usize,
}

impl AnalysisStats {
    /// Share of looked-up names that resolved, as a percentage
    pub fn resolve_rate(&self) -> String {
        let total = self.resolved_names + self.unresolved_names;
        if total == 0 {
            "100%".to_string()
        } else {
            format!("{}%", self.resolved_names * 100 / total)
        }
    }
}

impl fmt::Display for AnalysisStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "- modules loaded: {}", self.modules_loaded)?;
        writeln!(f, "- semantic problems: {}", self.semantic_problems)?;
        writeln!(f, "- failed to parse: {}", self.failed_to_parse)?;
        writeln!(f, "- number of definitions: {}", self.definitions)?;
        writeln!(f, "- number of cross references: {}", self.cross_references)?;
        writeln!(f, "- number of references: {}", self.references)?;
        writeln!(f, "- resolved names: {}", self.resolved_names)?;
        writeln!(f, "- unresolved names: {}", self.unresolved_names)?;
        write!(f, "- name resolve rate: {}", self.resolve_rate())
    }
}

/// State of one analysis run
pub struct Analyzer {
    fs: Box<dyn FileSystem>,
    config: AnalyzerConfig,
    ast_cache: AstCache,
    scopes: ScopeTable,
    types: TypeStore,
    builtins: Builtins,
    /// Loaded modules by qualified name
    modules: HashMap<String, ModuleId>,
    /// Node → bindings it refers to
    references: HashMap<Span, Vec<BindingId>>,
    semantic_errors: BTreeMap<PathBuf, Vec<Diagnostic>>,
    parse_errors: BTreeMap<PathBuf, Vec<Diagnostic>>,
    uncalled: BTreeSet<FunId>,
    /// Definition site and parameter signature of every application in progress
    call_stack: HashSet<(Span, Vec<SiteType>)>,
    import_stack: HashSet<PathBuf>,
    frames: Vec<Frame>,
    loaded_files: Vec<PathBuf>,
    failed_to_parse: BTreeSet<PathBuf>,
    resolved: HashSet<Span>,
    unresolved: HashMap<Span, String>,
    /// Directory of the file being interpreted
    cwd: Option<PathBuf>,
    project_dir: Option<PathBuf>,
    n_called: usize,
    finished: bool,
    start_time: Instant,
}

impl Analyzer {
    /// Create an analyzer using the bundled parser
    pub fn new(fs: Box<dyn FileSystem>, config: AnalyzerConfig) -> Result<Self, AnalyzerError> {
        Self::with_parser(fs, config, Box::new(PythonParser))
    }

    /// Create an analyzer for `root`, reading `pyinfer.toml` from the project directory
    pub fn for_project(fs: Box<dyn FileSystem>, root: &Path) -> Result<Self, AnalyzerError> {
        let root = fs.full_path(root);
        let project = if fs.dir_exists(&root) {
            root
        } else {
            root.parent().map(Path::to_path_buf).unwrap_or(root)
        };
        let config = AnalyzerConfig::load(fs.as_ref(), &project)?;
        Self::new(fs, config)
    }

    /// Create an analyzer with a custom front end
    ///
    /// Fails only when the on-disk cache directory cannot be created.
    pub fn with_parser(
        fs: Box<dyn FileSystem>,
        config: AnalyzerConfig,
        parser: Box<dyn SourceParser>,
    ) -> Result<Self, AnalyzerError> {
        let cache_dir = if config.disk_cache {
            let dir = match &config.cache_dir {
                Some(dir) => fs.full_path(dir),
                None => fs.temp_dir().join("pyinfer").join("ast_cache"),
            };
            fs.create_dir_all(&dir)
                .map_err(|source| AnalyzerError::CacheDirectory {
                    path: dir.clone(),
                    source,
                })?;
            log::info!("AST cache is at: {}", dir.display());
            Some(dir)
        } else {
            None
        };

        let mut scopes = ScopeTable::new();
        let mut types = TypeStore::new();
        let builtins = Builtins::install(&mut scopes, &mut types);

        Ok(Self {
            fs,
            config,
            ast_cache: AstCache::new(parser, cache_dir),
            scopes,
            types,
            builtins,
            modules: HashMap::new(),
            references: HashMap::new(),
            semantic_errors: BTreeMap::new(),
            parse_errors: BTreeMap::new(),
            uncalled: BTreeSet::new(),
            call_stack: HashSet::new(),
            import_stack: HashSet::new(),
            frames: Vec::new(),
            loaded_files: Vec::new(),
            failed_to_parse: BTreeSet::new(),
            resolved: HashSet::new(),
            unresolved: HashMap::new(),
            cwd: None,
            project_dir: None,
            n_called: 0,
            finished: false,
            start_time: Instant::now(),
        })
    }

    pub fn file_system(&self) -> &dyn FileSystem {
        self.fs.as_ref()
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn scopes(&self) -> &ScopeTable {
        &self.scopes
    }

    pub fn types(&self) -> &TypeStore {
        &self.types
    }

    pub fn builtins(&self) -> &Builtins {
        &self.builtins
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.ast_cache.stats()
    }

    /// Node → bindings table
    pub fn references(&self) -> &HashMap<Span, Vec<BindingId>> {
        &self.references
    }

    pub fn semantic_errors(&self) -> &BTreeMap<PathBuf, Vec<Diagnostic>> {
        &self.semantic_errors
    }

    pub fn parse_errors(&self) -> &BTreeMap<PathBuf, Vec<Diagnostic>> {
        &self.parse_errors
    }

    pub fn failed_to_parse(&self) -> &BTreeSet<PathBuf> {
        &self.failed_to_parse
    }

    /// Semantic diagnostics of one file
    pub fn diagnostics_for_file(&self, file: &Path) -> &[Diagnostic] {
        self.semantic_errors
            .get(file)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Source files loaded so far, in load order
    pub fn loaded_files(&self) -> Vec<&Path> {
        self.loaded_files
            .iter()
            .filter(|f| f.extension().is_some_and(|ext| ext == "py"))
            .map(PathBuf::as_path)
            .collect()
    }

    /// Bindings defined in source files, sorted by location
    pub fn bindings(&self) -> Vec<&Binding> {
        let mut bindings: Vec<&Binding> = self
            .scopes
            .bindings()
            .map(|(_, b)| b)
            .filter(|b| !b.is_builtin())
            .collect();
        bindings.sort_by(|a, b| a.node.cmp(&b.node).then_with(|| a.name.cmp(&b.name)));
        bindings
    }

    /// Render a type as text
    pub fn describe(&self, ty: &Type) -> String {
        self.types.describe(ty)
    }

    /// Loaded module of a source file
    pub fn module_for_file(&self, file: &Path) -> Option<ModuleId> {
        let qname = self.module_qname(&self.fs.full_path(file));
        self.modules.get(&qname).copied()
    }

    /// Merged type of a top-level name of a loaded file
    pub fn lookup_in_file(&self, file: &Path, name: &str) -> Option<Type> {
        let module = self.module_for_file(file)?;
        let scope = self.types.module(module).scope;
        self.scopes
            .lookup_local(scope, name)
            .map(|ids| Type::union(ids.iter().map(|&id| self.scopes.binding(id).ty.clone())))
    }

    /// Functions that no call site has applied yet
    pub fn uncalled(&self) -> &BTreeSet<FunId> {
        &self.uncalled
    }

    /// Apply uncalled functions, then report unresolved names and unused bindings
    pub fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        log::info!(
            "Finished loading files. {} functions were called.",
            self.n_called
        );
        log::info!("Analyzing uncalled functions");
        self.apply_uncalled();

        self.report_unresolved();
        if self.config.report_unused {
            self.report_unused();
        }
        for diagnostics in self.semantic_errors.values_mut() {
            diagnostics.sort_by(|a, b| a.span.cmp(&b.span).then_with(|| a.code.cmp(&b.code)));
        }
        log::info!("{}", self.analysis_summary());
    }

    /// Drop the in-memory parse trees
    pub fn close(&mut self) {
        self.ast_cache.close();
    }

    /// Remove every cached parse tree, on disk included
    pub fn clear_cache(&mut self) -> Result<(), AnalyzerError> {
        self.ast_cache.clear(self.fs.as_ref())?;
        Ok(())
    }

    pub fn stats(&self) -> AnalysisStats {
        let mut definitions = 0;
        let mut cross_references = 0;
        for (_, binding) in self.scopes.bindings() {
            if !binding.is_builtin() {
                definitions += 1;
                cross_references += binding.refs.len();
            }
        }
        AnalysisStats {
            modules_loaded: self.loaded_files.len(),
            semantic_problems: self.semantic_errors.values().map(Vec::len).sum(),
            failed_to_parse: self.failed_to_parse.len(),
            definitions,
            cross_references,
            references: self.references.len(),
            resolved_names: self.resolved.len(),
            unresolved_names: self
                .unresolved
                .keys()
                .filter(|site| !self.resolved.contains(*site))
                .count(),
            functions_called: self.n_called,
        }
    }

    pub fn analysis_summary(&self) -> String {
        format!(
            "\n{}\n- total time: {}\n{}",
            banner("analysis summary"),
            format_time(self.start_time.elapsed()),
            self.stats()
        )
    }

    /// Record that `node` refers to `bindings`
    pub(crate) fn put_ref(&mut self, node: &Span, bindings: &[BindingId]) {
        if node.is_synthetic() {
            return;
        }
        let entry = self.references.entry(node.clone()).or_default();
        for &id in bindings {
            if !entry.contains(&id) {
                entry.push(id);
            }
            self.scopes.binding_mut(id).add_ref(node.clone());
        }
    }

    /// File a semantic diagnostic under the file its span points into
    pub(crate) fn put_problem(&mut self, diagnostic: Diagnostic) {
        if diagnostic.span.is_synthetic() {
            return;
        }
        self.semantic_errors
            .entry(diagnostic.span.file.clone())
            .or_default()
            .push(diagnostic);
    }

    /// Insert into the scope table; a merging re-definition counts as a reference
    pub(crate) fn bind(
        &mut self,
        scope: ScopeId,
        name: &str,
        node: &Span,
        ty: Type,
        kind: BindingKind,
    ) -> BindingId {
        let inserted = self.scopes.insert(scope, name, node.clone(), ty, kind);
        if let Inserted::Merged(id) = inserted {
            if self.scopes.binding(id).node != *node {
                self.put_ref(node, &[id]);
            }
        }
        inserted.id()
    }

    pub(crate) fn add_uncalled(&mut self, fun: FunId) {
        if !self.types.fun(fun).called {
            self.uncalled.insert(fun);
        }
    }

    pub(crate) fn remove_uncalled(&mut self, fun: FunId) {
        self.uncalled.remove(&fun);
    }

    /// Apply every uncalled function with placeholder arguments until none remain
    ///
    /// Each definition site is applied at most once, so the loop ends even
    /// though applying a function can define further functions.
    fn apply_uncalled(&mut self) {
        let mut applied_sites: HashSet<Span> = HashSet::new();
        let mut pass = 0;
        while !self.uncalled.is_empty() {
            pass += 1;
            let batch = std::mem::take(&mut self.uncalled);
            log::debug!("uncalled pass {}: {} functions", pass, batch.len());
            for fun in batch {
                let site = match self.types.fun(fun).source() {
                    Some(def) if !self.types.fun(fun).called => def.span.clone(),
                    _ => continue,
                };
                if applied_sites.insert(site) {
                    self.apply_placeholder(fun);
                }
            }
        }
    }

    fn report_unresolved(&mut self) {
        let mut sites: Vec<(Span, String)> = self
            .unresolved
            .iter()
            .filter(|(site, _)| !self.resolved.contains(*site))
            .map(|(site, name)| (site.clone(), name.clone()))
            .collect();
        sites.sort();
        for (site, name) in sites {
            self.put_problem(
                Diagnostic::error(error_codes::inference::UNRESOLVED_NAME)
                    .message(format!("unresolved name: {}", name))
                    .span(site)
                    .build(),
            );
        }
    }

    /// Warn once per definition site whose bindings were never referenced
    fn report_unused(&mut self) {
        let mut sites: BTreeMap<(Span, String), bool> = BTreeMap::new();
        for (_, binding) in self.scopes.bindings() {
            if binding.is_builtin()
                || binding.name.starts_with('_')
                || binding.ty.is_declaration()
                || binding.kind == BindingKind::Module
            {
                continue;
            }
            if binding.kind == BindingKind::Parameter
                && (binding.name == "self" || binding.name == "cls")
            {
                continue;
            }
            *sites
                .entry((binding.node.clone(), binding.name.clone()))
                .or_insert(false) |= binding.is_referenced();
        }
        for ((node, name), used) in sites {
            if !used {
                self.put_problem(
                    Diagnostic::warning(error_codes::warnings::UNUSED_VARIABLE)
                        .message(format!("unused variable: {}", name))
                        .span(node)
                        .build(),
                );
            }
        }
    }
}

impl fmt::Display for Analyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(analyzer: [{} bindings] [{} refs] [{} files])",
            self.scopes.binding_count(),
            self.references.len(),
            self.loaded_files.len()
        )
    }
}

fn banner(message: &str) -> String {
    format!("---------------- {} ----------------", message)
}

fn format_time(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60)
}

#[cfg(test)]
mod tests;
