use glob::{glob, Pattern, PatternError};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid file pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: PatternError,
    },
}

/// Collect the log files named by `root`.
///
/// `root` may be a single file, a directory (walked recursively) or a path
/// whose last component contains `*` wildcards, e.g. `/var/solr/logs/solr.log*`.
/// In the wildcard form the pattern is applied to file names at every level
/// below the parent directory. The result is sorted by path.
pub fn discover_files(root: &Path) -> Result<Vec<PathBuf>, DiscoveryError> {
    let name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let (dir, name_pattern) = if name.contains('*') {
        let dir = match root.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        (dir, wildcard(&name))
    } else {
        (root.to_path_buf(), "*".to_string())
    };

    let metadata = fs::metadata(&dir).map_err(|source| DiscoveryError::Io {
        path: dir.clone(),
        source,
    })?;
    if metadata.is_file() {
        return Ok(vec![dir]);
    }

    let pattern = format!(
        "{}/**/{}",
        Pattern::escape(&dir.to_string_lossy()),
        name_pattern
    );
    debug!(pattern = %pattern, "Discovering log files");

    let mut files: Vec<PathBuf> = glob(&pattern)
        .map_err(|source| DiscoveryError::Pattern {
            pattern: pattern.clone(),
            source,
        })?
        .filter_map(Result::ok)
        .filter(|path| path.is_file())
        .collect();

    files.sort();
    Ok(files)
}

/// Only `*` is a wildcard in a file name; every other glob metacharacter
/// is matched literally.
fn wildcard(name: &str) -> String {
    name.split('*')
        .map(Pattern::escape)
        .collect::<Vec<_>>()
        .join("*")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, "x\n").unwrap();
        path
    }

    #[test]
    fn test_single_file() {
        let dir = TempDir::new().unwrap();
        let file = touch(dir.path(), "solr.log");

        assert_eq!(discover_files(&file).unwrap(), vec![file]);
    }

    #[test]
    fn test_directory_is_walked_recursively() {
        let dir = TempDir::new().unwrap();
        let a = touch(dir.path(), "solr.log");
        let b = touch(dir.path(), "nested/solr.log.1");

        let files = discover_files(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.contains(&a));
        assert!(files.contains(&b));
    }

    #[test]
    fn test_wildcard_filters_file_names() {
        let dir = TempDir::new().unwrap();
        let a = touch(dir.path(), "solr.log");
        let b = touch(dir.path(), "solr.log.2");
        touch(dir.path(), "gc.log");
        touch(dir.path(), "solr_log.txt");

        let files = discover_files(&dir.path().join("solr.log*")).unwrap();
        assert_eq!(files, vec![a, b]);
    }

    #[test]
    fn test_wildcard_reaches_nested_directories() {
        let dir = TempDir::new().unwrap();
        let a = touch(dir.path(), "solr.log");
        let b = touch(dir.path(), "host2/solr.log.1");
        touch(dir.path(), "host2/gc.log");

        let files = discover_files(&dir.path().join("solr.log*")).unwrap();
        assert_eq!(files, vec![b, a]);
    }

    #[test]
    fn test_other_glob_characters_are_literal() {
        let dir = TempDir::new().unwrap();
        let a = touch(dir.path(), "solr[1].log");
        touch(dir.path(), "solr1.log");

        let files = discover_files(&dir.path().join("solr[1]*")).unwrap();
        assert_eq!(files, vec![a]);
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = discover_files(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, DiscoveryError::Io { .. }));
    }
}
