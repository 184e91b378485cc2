use super::*;
use tempfile::TempDir;

#[test]
fn test_normalize_resolves_dots() {
    assert_eq!(
        normalize(Path::new("/a/b/../c/./d.py")),
        PathBuf::from("/a/c/d.py")
    );
    assert_eq!(normalize(Path::new("/a/..")), PathBuf::from("/"));
}

#[test]
fn test_content_hash_is_sha256_hex() {
    assert_eq!(
        content_hash(b""),
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );
}

#[test]
fn test_file_key_depends_on_path_and_content() {
    let a = file_key(Path::new("/a.py"), "x = 1");
    let b = file_key(Path::new("/b.py"), "x = 1");
    let c = file_key(Path::new("/a.py"), "x = 2");
    assert_ne!(a, b);
    assert_ne!(a, c);
    assert_eq!(a, file_key(Path::new("/a.py"), "x = 1"));
    assert!(a.contains('.'));
}

#[test]
fn test_memory_fs_files_and_dirs() {
    let fs = MemoryFileSystem::new()
        .with_file("/project/pkg/__init__.py", "")
        .with_file("/project/pkg/mod.py", "x = 1");

    assert!(fs.file_exists(Path::new("/project/pkg/mod.py")));
    assert!(fs.dir_exists(Path::new("/project/pkg")));
    assert!(fs.dir_exists(Path::new("/project")));
    assert!(!fs.file_exists(Path::new("/project/pkg")));
    assert_eq!(
        fs.read_to_string(Path::new("/project/pkg/mod.py")).unwrap(),
        "x = 1"
    );
}

#[test]
fn test_memory_fs_read_dir_is_sorted_and_shallow() {
    let fs = MemoryFileSystem::new()
        .with_file("/p/b.py", "")
        .with_file("/p/a.py", "")
        .with_file("/p/sub/c.py", "");

    let entries = fs.read_dir(Path::new("/p")).unwrap();
    assert_eq!(
        entries,
        vec![
            PathBuf::from("/p/a.py"),
            PathBuf::from("/p/b.py"),
            PathBuf::from("/p/sub"),
        ]
    );
    assert!(fs.read_dir(Path::new("/missing")).is_err());
}

#[test]
fn test_memory_fs_relative_paths_use_current_dir() {
    let fs = MemoryFileSystem::new()
        .with_current_dir("/work")
        .with_file("m.py", "pass");
    assert!(fs.file_exists(Path::new("/work/m.py")));
    assert_eq!(fs.full_path(Path::new("../x")), PathBuf::from("/x"));
}

#[test]
fn test_memory_fs_write_requires_parent() {
    let fs = MemoryFileSystem::new();
    assert!(fs.write_file(Path::new("/cache/k.json"), "{}").is_err());
    fs.create_dir_all(Path::new("/cache")).unwrap();
    fs.write_file(Path::new("/cache/k.json"), "{}").unwrap();
    assert_eq!(fs.file_count(), 1);

    fs.remove_dir_all(Path::new("/cache")).unwrap();
    assert_eq!(fs.file_count(), 0);
    assert!(!fs.dir_exists(Path::new("/cache")));
}

#[test]
fn test_memory_fs_env() {
    let fs = MemoryFileSystem::new().with_env("PYTHONPATH", "/lib");
    assert_eq!(fs.env_var("PYTHONPATH").as_deref(), Some("/lib"));
    assert_eq!(fs.env_var("HOME"), None);
}

#[test]
fn test_os_fs_round_trip() {
    let dir = TempDir::new().unwrap();
    let fs = OsFileSystem;
    let nested = dir.path().join("a/b");
    fs.create_dir_all(&nested).unwrap();
    fs.write_file(&nested.join("f.py"), "y = 2").unwrap();

    assert!(fs.dir_exists(&nested));
    assert_eq!(fs.read_to_string(&nested.join("f.py")).unwrap(), "y = 2");
    assert_eq!(fs.read_dir(&nested).unwrap(), vec![nested.join("f.py")]);

    fs.remove_dir_all(&dir.path().join("a")).unwrap();
    assert!(!fs.dir_exists(&nested));
    fs.remove_dir_all(&dir.path().join("a")).unwrap();
}
