//! File system access for the analyzer
//!
//! The analyzer never touches `std::fs` directly. Everything goes through
//! [`FileSystem`], with [`OsFileSystem`] for real runs and
//! [`MemoryFileSystem`] for hermetic tests.

use sha2::{Digest, Sha256};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Component, Path, PathBuf};

/// The file system operations the analyzer needs
pub trait FileSystem {
    /// Directory relative paths are resolved against
    fn current_dir(&self) -> PathBuf;

    fn file_exists(&self, path: &Path) -> bool;

    fn dir_exists(&self, path: &Path) -> bool;

    /// Entries of a directory, sorted by path
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;

    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    fn write_file(&self, path: &Path, contents: &str) -> io::Result<()>;

    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Remove a directory and everything below it; a missing directory is not an error
    fn remove_dir_all(&self, path: &Path) -> io::Result<()>;

    fn temp_dir(&self) -> PathBuf;

    fn env_var(&self, name: &str) -> Option<String>;

    /// Absolute, lexically normalized form of `path`
    fn full_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            normalize(path)
        } else {
            normalize(&self.current_dir().join(path))
        }
    }
}

/// Resolve `.` and `..` components without touching the disk
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// SHA-256 of `bytes`, hex encoded
pub fn content_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    format!("{:x}", digest)
}

/// Cache key of a file: hash of its path, then hash of its content
pub fn file_key(path: &Path, content: &str) -> String {
    format!(
        "{}.{}",
        content_hash(path.to_string_lossy().as_bytes()),
        content_hash(content.as_bytes())
    )
}

/// The real file system
#[derive(Debug, Default, Clone, Copy)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn current_dir(&self) -> PathBuf {
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"))
    }

    fn file_exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn dir_exists(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let mut entries = std::fs::read_dir(path)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<io::Result<Vec<_>>>()?;
        entries.sort();
        Ok(entries)
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn write_file(&self, path: &Path, contents: &str) -> io::Result<()> {
        std::fs::write(path, contents)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        match std::fs::remove_dir_all(path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    fn temp_dir(&self) -> PathBuf {
        std::env::temp_dir()
    }

    fn env_var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// An in-memory file system rooted at `/`
#[derive(Debug)]
pub struct MemoryFileSystem {
    files: RefCell<BTreeMap<PathBuf, String>>,
    dirs: RefCell<BTreeSet<PathBuf>>,
    env: BTreeMap<String, String>,
    cwd: PathBuf,
}

impl Default for MemoryFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        let mut dirs = BTreeSet::new();
        dirs.insert(PathBuf::from("/"));
        Self {
            files: RefCell::new(BTreeMap::new()),
            dirs: RefCell::new(dirs),
            env: BTreeMap::new(),
            cwd: PathBuf::from("/"),
        }
    }

    /// Add a file, creating its parent directories
    pub fn add_file(&self, path: impl AsRef<Path>, contents: &str) {
        let path = self.full_path(path.as_ref());
        if let Some(parent) = path.parent() {
            self.add_dirs(parent);
        }
        self.files.borrow_mut().insert(path, contents.to_string());
    }

    /// Builder form of [`add_file`](Self::add_file)
    pub fn with_file(self, path: impl AsRef<Path>, contents: &str) -> Self {
        self.add_file(path, contents);
        self
    }

    pub fn with_env(mut self, name: &str, value: &str) -> Self {
        self.env.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = dir.into();
        self
    }

    /// Number of files currently stored
    pub fn file_count(&self) -> usize {
        self.files.borrow().len()
    }

    fn add_dirs(&self, dir: &Path) {
        let mut dirs = self.dirs.borrow_mut();
        for ancestor in dir.ancestors() {
            if !dirs.insert(ancestor.to_path_buf()) {
                break;
            }
        }
    }

    fn not_found(path: &Path) -> io::Error {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("{}: no such file or directory", path.display()),
        )
    }
}

impl FileSystem for MemoryFileSystem {
    fn current_dir(&self) -> PathBuf {
        self.cwd.clone()
    }

    fn file_exists(&self, path: &Path) -> bool {
        self.files.borrow().contains_key(&self.full_path(path))
    }

    fn dir_exists(&self, path: &Path) -> bool {
        self.dirs.borrow().contains(&self.full_path(path))
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let dir = self.full_path(path);
        if !self.dirs.borrow().contains(&dir) {
            return Err(Self::not_found(&dir));
        }
        let is_child = |p: &&PathBuf| p.parent() == Some(dir.as_path()) && **p != dir;
        let mut entries: Vec<PathBuf> = self
            .files
            .borrow()
            .keys()
            .filter(is_child)
            .cloned()
            .collect();
        entries.extend(self.dirs.borrow().iter().filter(is_child).cloned());
        entries.sort();
        Ok(entries)
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        let path = self.full_path(path);
        self.files
            .borrow()
            .get(&path)
            .cloned()
            .ok_or_else(|| Self::not_found(&path))
    }

    fn write_file(&self, path: &Path, contents: &str) -> io::Result<()> {
        let path = self.full_path(path);
        match path.parent() {
            Some(parent) if self.dirs.borrow().contains(parent) => {}
            Some(parent) => return Err(Self::not_found(parent)),
            None => return Err(Self::not_found(&path)),
        }
        self.files.borrow_mut().insert(path, contents.to_string());
        Ok(())
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        let path = self.full_path(path);
        if self.files.borrow().contains_key(&path) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} is a file", path.display()),
            ));
        }
        self.add_dirs(&path);
        Ok(())
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        let path = self.full_path(path);
        self.files.borrow_mut().retain(|p, _| !p.starts_with(&path));
        self.dirs.borrow_mut().retain(|p| !p.starts_with(&path));
        Ok(())
    }

    fn temp_dir(&self) -> PathBuf {
        PathBuf::from("/tmp")
    }

    fn env_var(&self, name: &str) -> Option<String> {
        self.env.get(name).cloned()
    }
}

#[cfg(test)]
#[path = "fs_tests.rs"]
mod tests;
