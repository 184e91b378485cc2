//! Parsed-module cache for the analyzer.
//!
//! Syntax trees are keyed by file path plus a SHA-256 of the file content, so
//! an edited file is re-parsed and an unchanged one is not. Trees live in
//! memory for the duration of a run and, when a cache directory is given, are
//! also written as JSON to `<cache_dir>/<hash(path)>.<hash(content)>.json` so
//! later runs can skip parsing.

use crate::diagnostics::DiagnosticBag;
use crate::fs::{file_key, FileSystem};
use crate::parser::{Module, SourceParser};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use thiserror::Error;

/// Why a file could not produce a syntax tree
#[derive(Debug, Error)]
pub enum AstCacheError {
    #[error("{}: {} syntax error(s)", .path.display(), .diagnostics.len())]
    Parse {
        path: PathBuf,
        diagnostics: DiagnosticBag,
    },

    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Cache activity counters
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Files actually handed to the parser
    pub parses: usize,
    pub memory_hits: usize,
    pub disk_hits: usize,
}

/// Content-addressed store of parsed modules
pub struct AstCache {
    parser: Box<dyn SourceParser>,
    cache_dir: Option<PathBuf>,
    entries: HashMap<PathBuf, (String, Rc<Module>)>,
    stats: CacheStats,
}

impl AstCache {
    /// Create a cache; `cache_dir` enables the on-disk layer
    pub fn new(parser: Box<dyn SourceParser>, cache_dir: Option<PathBuf>) -> Self {
        Self {
            parser,
            cache_dir,
            entries: HashMap::new(),
            stats: CacheStats::default(),
        }
    }

    pub fn cache_dir(&self) -> Option<&Path> {
        self.cache_dir.as_deref()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Syntax tree of `path`, parsing only when no cached tree matches its content
    pub fn get_ast(
        &mut self,
        fs: &dyn FileSystem,
        path: &Path,
    ) -> Result<Rc<Module>, AstCacheError> {
        let content = fs.read_to_string(path).map_err(|source| AstCacheError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let key = file_key(path, &content);

        if let Some((cached_key, module)) = self.entries.get(path) {
            if *cached_key == key {
                self.stats.memory_hits += 1;
                return Ok(Rc::clone(module));
            }
        }

        let module = match self.load_from_disk(fs, &key) {
            Some(module) => {
                log::debug!("ast cache hit for {}", path.display());
                self.stats.disk_hits += 1;
                module
            }
            None => {
                self.stats.parses += 1;
                let module = self.parser.parse(&content, path).map_err(|diagnostics| {
                    AstCacheError::Parse {
                        path: path.to_path_buf(),
                        diagnostics,
                    }
                })?;
                self.store_on_disk(fs, &key, &module);
                module
            }
        };

        let module = Rc::new(module);
        self.entries
            .insert(path.to_path_buf(), (key, Rc::clone(&module)));
        Ok(module)
    }

    fn entry_path(&self, key: &str) -> Option<PathBuf> {
        self.cache_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.json", key)))
    }

    fn load_from_disk(&self, fs: &dyn FileSystem, key: &str) -> Option<Module> {
        let entry = self.entry_path(key)?;
        if !fs.file_exists(&entry) {
            return None;
        }
        let json = fs.read_to_string(&entry).ok()?;
        match serde_json::from_str(&json) {
            Ok(module) => Some(module),
            Err(e) => {
                log::warn!("ignoring corrupt cache entry {}: {}", entry.display(), e);
                None
            }
        }
    }

    fn store_on_disk(&self, fs: &dyn FileSystem, key: &str, module: &Module) {
        let Some(entry) = self.entry_path(key) else {
            return;
        };
        let result = serde_json::to_string(module)
            .map_err(io::Error::from)
            .and_then(|json| fs.write_file(&entry, &json));
        if let Err(e) = result {
            log::warn!("failed to write cache entry {}: {}", entry.display(), e);
        }
    }

    /// Drop the in-memory trees
    pub fn close(&mut self) {
        self.entries.clear();
    }

    /// Drop all cached trees, including the on-disk directory
    pub fn clear(&mut self, fs: &dyn FileSystem) -> io::Result<()> {
        self.entries.clear();
        if let Some(dir) = &self.cache_dir {
            fs.remove_dir_all(dir)?;
            fs.create_dir_all(dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
