//! Suite file discovery and loading.

use crate::model::SuiteDoc;
use crate::schema::SchemaRegistry;
use crate::sequence::TestSequence;
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Load a single suite file and resolve it against `schema`.
pub fn load_suite(path: &Path, schema: &dyn SchemaRegistry) -> Result<TestSequence> {
    debug!("loading suite file: {}", path.display());
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read suite file: {}", path.display()))?;
    let doc = SuiteDoc::from_yaml(&text)
        .with_context(|| format!("failed to parse suite file: {}", path.display()))?;
    TestSequence::from_doc(doc, schema)
        .with_context(|| format!("invalid suite: {}", path.display()))
}

/// Collect the suite files under `path`, which may be a single
/// file or a directory. Directories are scanned one level deep for
/// `.yaml`/`.yml` entries, sorted by file name so run order is
/// stable across platforms.
pub fn discover_suite_files(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        bail!("no such file or directory: {}", path.display());
    }

    let mut files = Vec::new();
    let entries = std::fs::read_dir(path)
        .with_context(|| format!("failed to read directory: {}", path.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to scan: {}", path.display()))?;
        let entry_path = entry.path();
        if !entry_path.is_file() {
            continue;
        }
        match entry_path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => files.push(entry_path),
            _ => {}
        }
    }
    files.sort();

    if files.is_empty() {
        bail!("no suite files (.yaml/.yml) found under: {}", path.display());
    }
    Ok(files)
}

/// Load every suite reachable from `path`. A single explicit file
/// fails hard; inside a directory scan, unloadable files are
/// logged and skipped so one broken suite does not hide the rest.
pub fn load_suites(path: &Path, schema: &dyn SchemaRegistry) -> Result<Vec<TestSequence>> {
    if path.is_file() {
        return Ok(vec![load_suite(path, schema)?]);
    }

    let mut suites = Vec::new();
    for file in discover_suite_files(path)? {
        match load_suite(&file, schema) {
            Ok(suite) => suites.push(suite),
            Err(e) => warn!("skipping {}: {:#}", file.display(), e),
        }
    }
    if suites.is_empty() {
        bail!("no loadable suites under: {}", path.display());
    }
    Ok(suites)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::EmptySchemaRegistry;
    use std::fs;

    const MINIMAL_SUITE: &str = "name: minimal\ntests:\n  - label: only step\n";

    #[test]
    fn loads_a_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("suite.yaml");
        fs::write(&path, MINIMAL_SUITE).unwrap();

        let suite = load_suite(&path, &EmptySchemaRegistry).unwrap();
        assert_eq!(suite.name, "minimal");
        assert_eq!(suite.len(), 1);
    }

    #[test]
    fn discovers_yaml_files_in_sorted_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.yaml"), MINIMAL_SUITE).unwrap();
        fs::write(dir.path().join("a.yml"), MINIMAL_SUITE).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let files = discover_suite_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.yml", "b.yaml"]);
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover_suite_files(dir.path()).is_err());
    }

    #[test]
    fn missing_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover_suite_files(&dir.path().join("nope")).is_err());
    }

    #[test]
    fn directory_scan_skips_broken_suites() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("good.yaml"), MINIMAL_SUITE).unwrap();
        fs::write(dir.path().join("broken.yaml"), "name: [unclosed").unwrap();

        let suites = load_suites(dir.path(), &EmptySchemaRegistry).unwrap();
        assert_eq!(suites.len(), 1);
        assert_eq!(suites[0].name, "minimal");
    }

    #[test]
    fn malformed_yaml_reports_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        fs::write(&path, "name: [unclosed").unwrap();

        let err = load_suite(&path, &EmptySchemaRegistry).unwrap_err();
        assert!(err.to_string().contains("bad.yaml"));
    }
}
