//! Output collection for download-style conversions.

use std::path::{Path, PathBuf};

use crate::error::ConversionError;

/// The single artifact a download converter leaves behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducedFile {
    pub path: PathBuf,
}

impl ProducedFile {
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }
}

/// Return the only entry in `dir`.
///
/// Zero entries, or more than one, is an error naming what was found; the
/// caller never gets to pick among candidates.
pub async fn collect_single_output_file(dir: &Path) -> Result<ProducedFile, ConversionError> {
    let listing_error = |source: std::io::Error| ConversionError::OutputListing {
        dir: dir.to_path_buf(),
        source,
    };

    // read_dir never yields `.` or `..`.
    let mut reader = tokio::fs::read_dir(dir).await.map_err(listing_error)?;
    let mut paths = Vec::new();
    while let Some(entry) = reader.next_entry().await.map_err(listing_error)? {
        paths.push(entry.path());
    }

    if paths.len() == 1 {
        return Ok(ProducedFile {
            path: paths.remove(0),
        });
    }

    // Names are only rendered for the error; the path above is kept as is.
    let mut entries: Vec<String> = paths
        .iter()
        .filter_map(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .collect();
    entries.sort();

    tracing::warn!(dir = %dir.display(), ?entries, "Converter output is ambiguous");
    Err(ConversionError::UnexpectedOutput {
        dir: dir.to_path_buf(),
        entries,
    })
}
