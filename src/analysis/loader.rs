//! Module resolution and loading for the analyzer.

use std::path::{Path, PathBuf};

use crate::cache::AstCacheError;
use crate::diagnostics::{error_codes, Diagnostic, Span};
use crate::parser::ast::{dotted_name, Ident};

use super::binding::BindingKind;
use super::scope::{ScopeId, ScopeKind};
use super::types::{ModuleId, ModuleType, Type};
use super::Analyzer;

const SUFFIX: &str = ".py";
const PACKAGE_INIT: &str = "__init__.py";

/// Why an import produced no module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoadFailure {
    /// Nothing on the load path matches
    NotFound,
    /// The module is still being loaded further up the import chain
    Cycle,
    /// The file exists but could not be read or parsed
    Unparsable,
}

impl Analyzer {
    /// Load every source file under `path` (or `path` itself when it is a file)
    pub fn analyze(&mut self, path: &Path) {
        let full = self.fs.full_path(path);
        if self.project_dir.is_none() {
            let project = if self.fs.dir_exists(&full) {
                full.clone()
            } else {
                full.parent().map(Path::to_path_buf).unwrap_or_else(|| full.clone())
            };
            self.project_dir = Some(project);
        }
        let count = self.count_files_recursive(&full);
        log::info!("Loading {} files under {}", count, full.display());
        self.load_file_recursive(&full);
    }

    /// Load a file, or every source file below a directory
    pub fn load_file_recursive(&mut self, path: &Path) {
        if self.fs.dir_exists(path) {
            match self.fs.read_dir(path) {
                Ok(entries) => {
                    for entry in entries {
                        self.load_file_recursive(&entry);
                    }
                }
                Err(e) => log::warn!("cannot list {}: {}", path.display(), e),
            }
        } else if is_source_file(path) {
            self.load_file(path);
        }
    }

    fn count_files_recursive(&self, path: &Path) -> usize {
        if self.fs.dir_exists(path) {
            self.fs
                .read_dir(path)
                .map(|entries| {
                    entries
                        .iter()
                        .map(|e| self.count_files_recursive(e))
                        .sum()
                })
                .unwrap_or(0)
        } else {
            usize::from(is_source_file(path))
        }
    }

    /// Load and interpret one source file, returning its module type
    ///
    /// Returns `None` for missing or unparsable files and for a file that is
    /// already being loaded further up the import chain.
    pub fn load_file(&mut self, path: &Path) -> Option<Type> {
        self.try_load_file(path).ok()
    }

    pub(crate) fn try_load_file(&mut self, path: &Path) -> Result<Type, LoadFailure> {
        let full = self.fs.full_path(path);
        if !self.fs.file_exists(&full) {
            log::warn!("file not found: {}", full.display());
            return Err(LoadFailure::NotFound);
        }

        let qname = self.module_qname(&full);
        if let Some(&id) = self.modules.get(&qname) {
            return Ok(Type::Module(id));
        }
        if self.failed_to_parse.contains(&full) {
            return Err(LoadFailure::Unparsable);
        }
        if self.import_stack.contains(&full) {
            log::debug!("import cycle through {}", full.display());
            return Err(LoadFailure::Cycle);
        }

        self.import_stack.insert(full.clone());
        let saved_cwd = self.cwd.replace(parent_dir(&full));
        let result = self.parse_and_visit(&full, &qname);
        self.cwd = saved_cwd;
        self.import_stack.remove(&full);

        if let Ok(Type::Module(id)) = &result {
            self.bind_in_parent_package(&full, *id);
        }
        result
    }

    fn parse_and_visit(&mut self, file: &Path, qname: &str) -> Result<Type, LoadFailure> {
        log::debug!("loading {}", file.display());
        let module = match self.ast_cache.get_ast(self.fs.as_ref(), file) {
            Ok(module) => module,
            Err(AstCacheError::Parse { diagnostics, .. }) => {
                log::warn!(
                    "failed to parse {}: {} syntax error(s)",
                    file.display(),
                    diagnostics.len()
                );
                self.failed_to_parse.insert(file.to_path_buf());
                self.parse_errors
                    .insert(file.to_path_buf(), diagnostics.take());
                return Err(LoadFailure::Unparsable);
            }
            Err(err @ AstCacheError::Io { .. }) => {
                log::warn!("{}", err);
                self.failed_to_parse.insert(file.to_path_buf());
                self.parse_errors.insert(
                    file.to_path_buf(),
                    vec![Diagnostic::error(error_codes::syntax::UNREADABLE_FILE)
                        .message(err.to_string())
                        .span(Span::file(file))
                        .build()],
                );
                return Err(LoadFailure::Unparsable);
            }
        };

        let scope = self
            .scopes
            .new_scope(ScopeKind::Module, ScopeId::GLOBAL, qname.to_string());
        let id = self.types.add_module(ModuleType {
            name: module_name(file),
            qname: qname.to_string(),
            file: Some(file.to_path_buf()),
            scope,
        });
        self.visit_module(&module, scope);

        self.loaded_files.push(file.to_path_buf());
        self.modules.insert(qname.to_string(), id);
        Ok(Type::Module(id))
    }

    /// Make a finished submodule a member of its package
    fn bind_in_parent_package(&mut self, file: &Path, module: ModuleId) {
        let dir = if file.file_name().is_some_and(|n| n == PACKAGE_INIT) {
            file.parent().and_then(Path::parent)
        } else {
            file.parent()
        };
        let Some(init) = dir.map(|d| d.join(PACKAGE_INIT)) else {
            return;
        };
        if init == file || !self.fs.file_exists(&init) {
            return;
        }
        if let Some(Type::Module(parent)) = self.load_file(&init) {
            let scope = self.types.module(parent).scope;
            let name = self.types.module(module).name.clone();
            self.bind(
                scope,
                &name,
                &Span::file(file),
                Type::Module(module),
                BindingKind::Module,
            );
        }
    }

    /// Canonical dotted name of a source file, the module memoization key
    pub fn module_qname(&self, file: &Path) -> String {
        let text = file.to_string_lossy();
        let stem = if let Some(dir) = text.strip_suffix(PACKAGE_INIT) {
            dir.trim_end_matches(['/', '\\'])
        } else {
            text.strip_suffix(SUFFIX).unwrap_or(&text[..])
        };
        stem.replace('.', "%20")
            .replace(['/', '\\'], ".")
            .trim_start_matches('.')
            .to_string()
    }

    /// Ordered directories searched for absolute imports
    pub fn load_path(&self) -> Vec<PathBuf> {
        let mut path: Vec<PathBuf> = Vec::new();
        let mut push = |dir: PathBuf| {
            if !path.contains(&dir) {
                path.push(dir);
            }
        };
        if let Some(cwd) = &self.cwd {
            push(cwd.clone());
        }
        if let Some(project) = &self.project_dir {
            push(project.clone());
        }
        for dir in &self.config.search_paths {
            push(self.fs.full_path(dir));
        }
        if self.config.use_pythonpath {
            if let Some(pythonpath) = self.fs.env_var("PYTHONPATH") {
                for entry in pythonpath.split(':').filter(|e| !e.is_empty()) {
                    push(self.fs.full_path(Path::new(entry)));
                }
            }
        }
        path
    }

    /// First load-path directory holding a package or module named `head`
    fn locate_module(&self, head: &str) -> Option<PathBuf> {
        self.load_path().into_iter().find(|dir| {
            self.fs.file_exists(&dir.join(head).join(PACKAGE_INIT))
                || self.fs.file_exists(&dir.join(format!("{}{}", head, SUFFIX)))
        })
    }

    /// Resolve an absolute dotted import
    ///
    /// When `bind_scope` is given the first segment is bound there, as
    /// `import a.b` does. Each later segment is bound in its package.
    pub(crate) fn load_module(
        &mut self,
        names: &[Ident],
        bind_scope: Option<ScopeId>,
    ) -> Result<Type, LoadFailure> {
        let head = names.first().ok_or(LoadFailure::NotFound)?;
        let qname = dotted_name(names);

        if let Some(id) = self.builtins.module(&qname) {
            if let Some(scope) = bind_scope {
                let top = self.builtins.module(&head.name).unwrap_or(id);
                let node = Span::library(&self.types.module(top).qname);
                let binding =
                    self.bind(scope, &head.name, &node, Type::Module(top), BindingKind::Module);
                self.put_ref(&head.span, &[binding]);
            }
            return Ok(Type::Module(id));
        }

        let start = self
            .locate_module(&head.name)
            .ok_or(LoadFailure::NotFound)?;
        self.load_segments(start, names, bind_scope)
    }

    /// Load `names` segment by segment starting from directory `start`
    pub(crate) fn load_segments(
        &mut self,
        start: PathBuf,
        names: &[Ident],
        bind_scope: Option<ScopeId>,
    ) -> Result<Type, LoadFailure> {
        let mut path = start;
        let mut prev: Option<Type> = None;
        for (i, segment) in names.iter().enumerate() {
            path = path.join(&segment.name);
            let init = path.join(PACKAGE_INIT);
            let file = if self.fs.file_exists(&init) {
                init
            } else if i == names.len() - 1 {
                let file = path.with_file_name(format!("{}{}", segment.name, SUFFIX));
                if !self.fs.file_exists(&file) {
                    return Err(LoadFailure::NotFound);
                }
                file
            } else if self.fs.dir_exists(&path) {
                // namespace package
                continue;
            } else {
                return Err(LoadFailure::NotFound);
            };

            let module = self.try_load_file(&file)?;
            let target = match &prev {
                Some(Type::Module(parent)) => Some(self.types.module(*parent).scope),
                _ => bind_scope,
            };
            if let Some(scope) = target {
                let binding = self.bind(
                    scope,
                    &segment.name,
                    &segment.span,
                    module.clone(),
                    BindingKind::Module,
                );
                self.put_ref(&segment.span, &[binding]);
            }
            prev = Some(module);
        }
        prev.ok_or(LoadFailure::NotFound)
    }

    /// Load `name` as a submodule of the package in `dir`
    pub(crate) fn load_submodule(&mut self, dir: &Path, name: &str) -> Result<Type, LoadFailure> {
        let init = dir.join(name).join(PACKAGE_INIT);
        let file = dir.join(format!("{}{}", name, SUFFIX));
        if self.fs.file_exists(&init) {
            self.try_load_file(&init)
        } else if self.fs.file_exists(&file) {
            self.try_load_file(&file)
        } else {
            Err(LoadFailure::NotFound)
        }
    }

    /// The package whose `__init__.py` lives in `dir`, for `from . import x`
    pub(crate) fn load_package(&mut self, dir: &Path) -> Result<Type, LoadFailure> {
        let init = dir.join(PACKAGE_INIT);
        if self.fs.file_exists(&init) {
            self.try_load_file(&init)
        } else {
            Err(LoadFailure::NotFound)
        }
    }

    /// Directory a relative import of `level` dots starts from
    pub(crate) fn relative_base(&self, level: usize) -> Option<PathBuf> {
        let mut dir = self.cwd.clone()?;
        for _ in 1..level {
            dir = dir.parent()?.to_path_buf();
        }
        Some(dir)
    }

    /// Directory holding a package module's submodules
    pub(crate) fn package_dir(&self, module: &Type) -> Option<PathBuf> {
        let Type::Module(id) = module else {
            return None;
        };
        let file = self.types.module(*id).file.as_ref()?;
        if file.file_name().is_some_and(|n| n == PACKAGE_INIT) {
            file.parent().map(Path::to_path_buf)
        } else {
            None
        }
    }
}

/// Short module name: file stem, or the package directory for `__init__.py`
pub fn module_name(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if file_name == PACKAGE_INIT {
        path.parent()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or(file_name)
    } else if let Some(stem) = file_name.strip_suffix(SUFFIX) {
        stem.to_string()
    } else {
        file_name
    }
}

fn is_source_file(path: &Path) -> bool {
    path.to_string_lossy().ends_with(SUFFIX)
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}
