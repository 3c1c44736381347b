use codeatlas_core::{
    CodeAtlasError, CreateGraphRequest, GraphId, RepositorySource, Result,
};
use async_trait::async_trait;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// [`RepositorySource`] over a checked-out working tree on local disk.
pub struct LocalRepositorySource {
    root: PathBuf,
}

impl LocalRepositorySource {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl RepositorySource for LocalRepositorySource {
    async fn list_files(&self) -> Result<Vec<String>> {
        let root = self.root.clone();
        let files = tokio::task::spawn_blocking(move || {
            let mut files = Vec::new();
            let walker = WalkBuilder::new(&root)
                .hidden(false)
                .git_ignore(false)
                .git_global(false)
                .git_exclude(false)
                .filter_entry(|entry| entry.file_name() != ".git")
                .build();
            for entry in walker {
                let entry = entry.map_err(|e| CodeAtlasError::Io(std::io::Error::other(e)))?;
                if entry.file_type().is_some_and(|t| t.is_file()) {
                    if let Ok(relative) = entry.path().strip_prefix(&root) {
                        files.push(relative.to_string_lossy().replace('\\', "/"));
                    }
                }
            }
            files.sort();
            Ok::<_, CodeAtlasError>(files)
        })
        .await
        .map_err(|e| CodeAtlasError::Io(std::io::Error::other(e)))??;
        Ok(files)
    }

    async fn read_file(&self, relative_path: &str) -> Result<String> {
        let path = self.root.join(relative_path);
        Ok(tokio::fs::read_to_string(path).await?)
    }
}

/// Produces a readable checkout for a freshly requested graph.
#[async_trait]
pub trait SourceOpener: Send + Sync {
    async fn open(
        &self,
        graph_id: GraphId,
        request: &CreateGraphRequest,
    ) -> Result<Arc<dyn RepositorySource>>;
}

/// Clones the origin repository at the requested branch into a per-graph
/// directory and serves it as a [`LocalRepositorySource`].
pub struct GitSourceOpener {
    checkout_root: PathBuf,
}

impl GitSourceOpener {
    pub fn new<P: Into<PathBuf>>(checkout_root: P) -> Self {
        Self {
            checkout_root: checkout_root.into(),
        }
    }
}

#[async_trait]
impl SourceOpener for GitSourceOpener {
    async fn open(
        &self,
        graph_id: GraphId,
        request: &CreateGraphRequest,
    ) -> Result<Arc<dyn RepositorySource>> {
        let target = self.checkout_root.join(graph_id.to_string());
        let url = request.origin_url.clone();
        let branch = request.branch.clone();
        info!(%url, %branch, target = %target.display(), "cloning repository");

        let clone_dir = target.clone();
        tokio::task::spawn_blocking(move || {
            git2::build::RepoBuilder::new()
                .branch(&branch)
                .clone(&url, &clone_dir)
                .map(|_| ())
                .map_err(|e| CodeAtlasError::Network(e.to_string()))
        })
        .await
        .map_err(|e| CodeAtlasError::Io(std::io::Error::other(e)))??;

        let mut root: PathBuf = target;
        if let Some(sub_folder) = request.sub_folder.as_deref().filter(|s| !s.is_empty()) {
            root = root.join(sub_folder);
        }
        Ok(Arc::new(LocalRepositorySource::new(root)))
    }
}

/// Keeps `full_path` out of directories the source tree uses for tests.
pub fn is_test_path(full_path: &str) -> bool {
    full_path
        .split('/')
        .any(|segment| segment == "test" || segment == "tests")
}

/// Helper used by the coordinator to narrow an enumerated file list to what
/// should be tracked: the optional glob first, then the test exclusion.
pub fn filter_files(files: Vec<String>, file_filter: Option<&str>) -> Result<Vec<String>> {
    let glob = match file_filter.filter(|f| !f.is_empty()) {
        Some(pattern) => Some(
            globset::Glob::new(pattern)
                .map_err(|e| CodeAtlasError::InvalidOperation(format!("bad file filter: {}", e)))?
                .compile_matcher(),
        ),
        None => None,
    };

    Ok(files
        .into_iter()
        .filter(|file| {
            if is_test_path(file) {
                return false;
            }
            glob.as_ref()
                .map(|matcher| matcher.is_match(Path::new(file)))
                .unwrap_or(true)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_source_lists_and_reads_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src/util")).unwrap();
        std::fs::write(dir.path().join("README.md"), "# hi").unwrap();
        std::fs::write(dir.path().join("src/util/text.js"), "function t() {}").unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join(".git/config"), "").unwrap();

        let source = LocalRepositorySource::new(dir.path());
        let files = source.list_files().await.unwrap();
        assert_eq!(files, vec!["README.md", "src/util/text.js"]);

        let content = source.read_file("src/util/text.js").await.unwrap();
        assert_eq!(content, "function t() {}");
    }

    #[test]
    fn test_directories_are_excluded() {
        let files = vec![
            "src/main/App.java".to_string(),
            "src/test/AppTest.java".to_string(),
            "tests/integration.rs".to_string(),
            "attestation/sign.rs".to_string(),
        ];
        let kept = filter_files(files, None).unwrap();
        assert_eq!(kept, vec!["src/main/App.java", "attestation/sign.rs"]);
    }

    #[test]
    fn glob_filter_narrows_the_listing() {
        let files = vec![
            "src/a.java".to_string(),
            "src/deep/b.java".to_string(),
            "src/deep/b.js".to_string(),
        ];
        let kept = filter_files(files, Some("**/*.java")).unwrap();
        assert_eq!(kept, vec!["src/a.java", "src/deep/b.java"]);

        assert!(filter_files(Vec::new(), Some("[bad")).is_err());
    }
}
