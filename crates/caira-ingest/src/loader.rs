//! Loading the incident, runbook and log corpus from disk.

use std::path::{Path, PathBuf};

use caira_core::{CairaError, Document, DocumentMetadata};

/// Corpus categories, each a subdirectory of the data directory.
pub const DEFAULT_CATEGORIES: [&str; 3] = ["incidents", "runbooks", "logs"];

/// File extensions accepted as documents, compared case-insensitively.
const SUPPORTED_EXTENSIONS: [&str; 2] = ["txt", "md"];

/// A source of documents to index.
pub trait DocumentSource {
    /// Load every available document.
    ///
    /// # Errors
    ///
    /// Implementations return an error only for failures that affect
    /// correctness; skippable files are logged and left out.
    fn load_all(&self) -> Result<Vec<Document>, CairaError>;

    /// Directories this source reads, for error messages.
    fn describe(&self) -> Vec<PathBuf> {
        Vec::new()
    }
}

/// Reads `<data_dir>/<category>/*.{txt,md}` for each category.
///
/// Category directories are read non-recursively and the category name
/// becomes the document's `doc_type`.
///
/// # Examples
///
/// ```
/// use caira_ingest::loader::{DirectoryLoader, DocumentSource};
///
/// let dir = tempfile::tempdir().unwrap();
/// std::fs::create_dir_all(dir.path().join("runbooks")).unwrap();
/// std::fs::write(dir.path().join("runbooks/db.md"), "Restart postgres.").unwrap();
///
/// let docs = DirectoryLoader::new(dir.path()).load_all().unwrap();
/// assert_eq!(docs.len(), 1);
/// assert_eq!(docs[0].metadata.doc_type, "runbooks");
/// ```
#[derive(Debug, Clone)]
pub struct DirectoryLoader {
    data_dir: PathBuf,
    categories: Vec<String>,
}

impl DirectoryLoader {
    /// Loader over the default categories.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            categories: DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// Replace the category list.
    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    /// Root data directory.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn load_category(&self, category: &str) -> Vec<Document> {
        let dir = self.data_dir.join(category);
        if !dir.is_dir() {
            tracing::warn!(dir = %dir.display(), "category directory not found, skipping");
            return Vec::new();
        }

        let walker = ignore::WalkBuilder::new(&dir)
            .max_depth(Some(1))
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        let mut documents = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to read directory entry");
                    continue;
                }
            };

            let Some(file_type) = entry.file_type() else {
                continue;
            };
            if !file_type.is_file() {
                if entry.depth() > 0 {
                    tracing::debug!(path = %entry.path().display(), "skipping subdirectory");
                }
                continue;
            }

            let path = entry.path();
            if !is_supported(path) {
                tracing::debug!(path = %path.display(), "skipping unsupported file");
                continue;
            }

            match load_file(path, category) {
                Ok(doc) => documents.push(doc),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable file");
                }
            }
        }

        tracing::info!(category, count = documents.len(), "loaded documents");
        documents
    }
}

impl DocumentSource for DirectoryLoader {
    fn load_all(&self) -> Result<Vec<Document>, CairaError> {
        let mut documents = Vec::new();
        for category in &self.categories {
            documents.extend(self.load_category(category));
        }
        tracing::info!(total = documents.len(), "loaded corpus");
        Ok(documents)
    }

    fn describe(&self) -> Vec<PathBuf> {
        self.categories
            .iter()
            .map(|c| self.data_dir.join(c))
            .collect()
    }
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|s| s.eq_ignore_ascii_case(ext))
        })
}

/// Load a single file as a document of the given type.
///
/// # Errors
///
/// Returns [`CairaError::Io`] if the file cannot be read, or
/// [`CairaError::InvalidInput`] if it is not valid UTF-8.
///
/// # Examples
///
/// ```
/// use caira_ingest::loader::load_file;
///
/// let dir = tempfile::tempdir().unwrap();
/// let path = dir.path().join("inc-42.txt");
/// std::fs::write(&path, "API latency spike traced to cache eviction.").unwrap();
///
/// let doc = load_file(&path, "incidents").unwrap();
/// assert_eq!(doc.metadata.filename, "inc-42.txt");
/// assert_eq!(doc.metadata.size, 43);
/// ```
pub fn load_file(path: &Path, doc_type: &str) -> Result<Document, CairaError> {
    let bytes = std::fs::read(path)?;
    let content = String::from_utf8(bytes)
        .map_err(|_| CairaError::InvalidInput(format!("{} is not valid UTF-8", path.display())))?;

    let fs_meta = std::fs::metadata(path)?;
    let modified_time = fs_meta
        .modified()
        .map(|t| chrono::DateTime::<chrono::Utc>::from(t).to_rfc3339())
        .unwrap_or_default();

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(Document {
        content,
        metadata: DocumentMetadata {
            source_path: path.to_path_buf(),
            filename,
            doc_type: doc_type.to_string(),
            size: fs_meta.len(),
            modified_time,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn make_corpus() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        fs::create_dir_all(root.join("incidents")).unwrap();
        fs::create_dir_all(root.join("runbooks/archive")).unwrap();
        fs::create_dir_all(root.join("logs")).unwrap();

        fs::write(root.join("incidents/inc-002.md"), "Payment gateway timeout.").unwrap();
        fs::write(root.join("incidents/inc-001.txt"), "Disk full on db-01.").unwrap();
        fs::write(root.join("incidents/notes.csv"), "a,b").unwrap();
        fs::write(root.join("runbooks/DB-RESTART.MD"), "Drain, then restart.").unwrap();
        fs::write(root.join("runbooks/archive/old.md"), "Outdated.").unwrap();
        fs::write(root.join("logs/app.txt"), "ERROR pool exhausted").unwrap();
        fs::write(root.join("logs/binary.txt"), [0xff, 0xfe, 0x00, 0x80]).unwrap();

        dir
    }

    #[test]
    fn loads_supported_files_per_category() {
        let dir = make_corpus();
        let docs = DirectoryLoader::new(dir.path()).load_all().unwrap();

        let names: Vec<(&str, &str)> = docs
            .iter()
            .map(|d| (d.metadata.doc_type.as_str(), d.metadata.filename.as_str()))
            .collect();
        assert_eq!(
            names,
            vec![
                ("incidents", "inc-001.txt"),
                ("incidents", "inc-002.md"),
                ("runbooks", "DB-RESTART.MD"),
                ("logs", "app.txt"),
            ]
        );
    }

    #[test]
    fn does_not_descend_into_subdirectories() {
        let dir = make_corpus();
        let docs = DirectoryLoader::new(dir.path()).load_all().unwrap();
        assert!(docs.iter().all(|d| d.metadata.filename != "old.md"));
    }

    #[test]
    fn missing_category_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("runbooks")).unwrap();
        fs::write(dir.path().join("runbooks/a.md"), "content").unwrap();

        let docs = DirectoryLoader::new(dir.path()).load_all().unwrap();
        assert_eq!(docs.len(), 1);
    }

    #[test]
    fn empty_data_dir_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(DirectoryLoader::new(dir.path()).load_all().unwrap().is_empty());
    }

    #[test]
    fn custom_categories() {
        let dir = make_corpus();
        let loader = DirectoryLoader::new(dir.path()).with_categories(["logs"]);
        let docs = loader.load_all().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].metadata.doc_type, "logs");
        assert_eq!(loader.describe(), vec![dir.path().join("logs")]);
    }

    #[test]
    fn load_file_fills_metadata() {
        let dir = make_corpus();
        let path = dir.path().join("incidents/inc-001.txt");
        let doc = load_file(&path, "incidents").unwrap();
        assert_eq!(doc.content, "Disk full on db-01.");
        assert_eq!(doc.metadata.source_path, path);
        assert_eq!(doc.metadata.size, 19);
        assert!(chrono::DateTime::parse_from_rfc3339(&doc.metadata.modified_time).is_ok());
    }

    #[test]
    fn load_file_rejects_invalid_utf8() {
        let dir = make_corpus();
        let err = load_file(&dir.path().join("logs/binary.txt"), "logs").unwrap_err();
        assert!(matches!(err, CairaError::InvalidInput(_)));
    }

    #[test]
    fn load_file_missing_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_file(&dir.path().join("nope.md"), "runbooks").unwrap_err();
        assert!(matches!(err, CairaError::Io(_)));
    }
}
