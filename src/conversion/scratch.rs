//! Per-call scratch directories.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::ConversionError;

/// A freshly created directory owned by one conversion call.
///
/// Directories are left in place when the call ends.
#[derive(Debug, Clone)]
pub struct ScratchSpace {
    id: Uuid,
    path: PathBuf,
}

impl ScratchSpace {
    /// Create `<root>/<uuid>`.
    pub async fn prepare(root: &Path) -> Result<Self, ConversionError> {
        let id = Uuid::new_v4();
        let path = root.join(id.to_string());

        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|source| ConversionError::Scratch {
                path: path.clone(),
                source,
            })?;

        tracing::debug!(scratch = %path.display(), "Prepared scratch space");
        Ok(Self { id, path })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_two_preparations_are_distinct() {
        let root = tempfile::tempdir().unwrap();

        let a = ScratchSpace::prepare(root.path()).await.unwrap();
        let b = ScratchSpace::prepare(root.path()).await.unwrap();

        assert_ne!(a.id(), b.id());
        assert_ne!(a.path(), b.path());
        assert!(a.path().is_dir());
        assert!(b.path().is_dir());
        assert_eq!(a.path().parent(), Some(root.path()));
    }

    #[tokio::test]
    async fn test_missing_root_is_created() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("work").join("tmp");

        let scratch = ScratchSpace::prepare(&nested).await.unwrap();
        assert!(scratch.path().starts_with(&nested));
    }

    #[tokio::test]
    async fn test_unusable_root_fails() {
        let root = tempfile::tempdir().unwrap();
        let file = root.path().join("not-a-dir");
        std::fs::write(&file, b"x").unwrap();

        let err = ScratchSpace::prepare(&file).await.unwrap_err();
        assert!(matches!(err, ConversionError::Scratch { .. }));
    }
}
