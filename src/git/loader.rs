use anyhow::{Context, Result};
use std::path::Path;
use walkdir::WalkDir;

use crate::models::CodeDocument;

/// Which files to read from a working tree.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Lowercase extensions without the dot
    pub extensions: Vec<String>,
    /// Skip files that fail to read instead of aborting
    pub skip_unreadable: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            extensions: vec!["py".to_string()],
            skip_unreadable: true,
        }
    }
}

/// Documents read from a tree, plus the files that had to be skipped.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub documents: Vec<CodeDocument>,
    pub skipped: usize,
}

/// Walk `root` and read every source file with a recognised extension.
///
/// Files that cannot be read as UTF-8 are counted in `skipped` (or abort the
/// load when `skip_unreadable` is off). An empty result is not an error.
pub fn load_documents(root: &Path, options: &LoadOptions) -> Result<LoadReport> {
    let mut report = LoadReport::default();

    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || e.file_name() != ".git")
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if !has_source_extension(path, &options.extensions) {
            continue;
        }

        let relative = path
            .strip_prefix(root)
            .unwrap_or(path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        match std::fs::read_to_string(path) {
            Ok(content) => report.documents.push(CodeDocument {
                content,
                source: relative,
            }),
            Err(e) if options.skip_unreadable => {
                tracing::debug!("Skipping unreadable file {relative}: {e}");
                report.skipped += 1;
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {relative}"));
            }
        }
    }

    tracing::info!(
        "Loaded {} source files from {} ({} skipped)",
        report.documents.len(),
        root.display(),
        report.skipped
    );
    Ok(report)
}

fn has_source_extension(path: &Path, extensions: &[String]) -> bool {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    !ext.is_empty() && extensions.iter().any(|e| *e == ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, rel: &str, content: &[u8]) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_loads_only_matching_extensions() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "app.py", b"print('hi')");
        write(dir.path(), "pkg/util.py", b"def f(): pass");
        write(dir.path(), "README.md", b"# readme");
        write(dir.path(), "main.rs", b"fn main() {}");

        let report = load_documents(dir.path(), &LoadOptions::default()).unwrap();
        let sources: Vec<&str> = report.documents.iter().map(|d| d.source.as_str()).collect();
        assert_eq!(sources, vec!["app.py", "pkg/util.py"]);
        assert_eq!(report.skipped, 0);
    }

    #[test]
    fn test_skips_git_directory() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), ".git/hooks/hook.py", b"x = 1");
        write(dir.path(), "real.py", b"y = 2");

        let report = load_documents(dir.path(), &LoadOptions::default()).unwrap();
        assert_eq!(report.documents.len(), 1);
        assert_eq!(report.documents[0].source, "real.py");
    }

    #[test]
    fn test_non_utf8_file_is_skipped_and_counted() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "good.py", b"ok = True");
        write(dir.path(), "bad.py", &[0xff, 0xfe, 0x00, 0x80]);

        let report = load_documents(dir.path(), &LoadOptions::default()).unwrap();
        assert_eq!(report.documents.len(), 1);
        assert_eq!(report.documents[0].content, "ok = True");
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn test_non_utf8_file_fails_when_skipping_disabled() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "bad.py", &[0xff, 0xfe]);

        let options = LoadOptions {
            skip_unreadable: false,
            ..LoadOptions::default()
        };
        let err = load_documents(dir.path(), &options).unwrap_err();
        assert!(format!("{err:#}").contains("bad.py"));
    }

    #[test]
    fn test_empty_tree_yields_no_documents() {
        let dir = tempfile::tempdir().unwrap();
        let report = load_documents(dir.path(), &LoadOptions::default()).unwrap();
        assert!(report.documents.is_empty());
    }

    #[test]
    fn test_extension_match_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "Script.PY", b"pass");
        let report = load_documents(dir.path(), &LoadOptions::default()).unwrap();
        assert_eq!(report.documents.len(), 1);
    }
}
