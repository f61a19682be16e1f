//! Input/output paths and atomic writes

use anyhow::{Context, Result};
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

const DOCUMENT_EXTENSION: &str = "json";

/// Whether `path` names a JSON document rather than an animation file
pub fn is_document(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(DOCUMENT_EXTENSION))
        .unwrap_or(false)
}

fn with_document_extension(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(DOCUMENT_EXTENSION);
    PathBuf::from(name)
}

/// Where a conversion of `input` is written
///
/// `anim.json` becomes `anim` and `anim` becomes `anim.json`. An explicit
/// output wins, except that decoded documents always end in `.json`.
pub fn output_path(input: &Path, output: Option<&Path>) -> PathBuf {
    let decoding = !is_document(input);
    match output {
        Some(path) if decoding && !is_document(path) => with_document_extension(path),
        Some(path) => path.to_path_buf(),
        None if decoding => with_document_extension(input),
        None => input.with_extension(""),
    }
}

pub fn read_input(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Write through a temp file in the destination directory, replacing `path` only on success
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
    temp.write_all(contents)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    temp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_document() {
        assert!(is_document(Path::new("anim.json")));
        assert!(is_document(Path::new("dir/ANIM.JSON")));
        assert!(!is_document(Path::new("anim")));
        assert!(!is_document(Path::new("anim.bin")));
        assert!(!is_document(Path::new("json")));
    }

    #[test]
    fn test_default_output_paths() {
        assert_eq!(output_path(Path::new("anim.json"), None), PathBuf::from("anim"));
        assert_eq!(
            output_path(Path::new("dir/anim.bin.json"), None),
            PathBuf::from("dir/anim.bin")
        );
        assert_eq!(output_path(Path::new("anim"), None), PathBuf::from("anim.json"));
        assert_eq!(
            output_path(Path::new("anim.bin"), None),
            PathBuf::from("anim.bin.json")
        );
    }

    #[test]
    fn test_explicit_output_paths() {
        let out = Path::new("out/result");
        assert_eq!(output_path(Path::new("anim.json"), Some(out)), out);
        assert_eq!(
            output_path(Path::new("anim"), Some(out)),
            PathBuf::from("out/result.json")
        );
        assert_eq!(
            output_path(Path::new("anim"), Some(Path::new("x.json"))),
            PathBuf::from("x.json")
        );
    }

    #[test]
    fn test_write_atomic_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        fs::write(&path, b"old contents").unwrap();

        write_atomic(&path, b"new").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"new");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_write_atomic_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.bin");
        assert!(write_atomic(&path, b"data").is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_read_input_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_input(&dir.path().join("nope")).unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }
}
