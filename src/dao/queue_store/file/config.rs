use std::path::PathBuf;

/// Where pending scores are kept on disk.
#[derive(Debug, Clone)]
pub struct FileStoreConfig {
    pub root: PathBuf,
}

impl FileStoreConfig {
    /// Construct a configuration rooted at an explicit directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}
