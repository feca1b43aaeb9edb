//! Project tree walk for `Init` (spec.md §4.6 step 5): applies excludes, a
//! language filter, and file-count/byte-size ceilings.

use super::ParserRegistry;
use crate::error::ServiceError;
use std::path::{Path, PathBuf};

pub struct WalkedFile {
    pub path: PathBuf,
    pub language: String,
}

pub struct WalkedProject {
    pub files: Vec<WalkedFile>,
}

pub fn walk_project(
    root: &Path,
    languages: &[String],
    excludes: &[String],
    parsers: &ParserRegistry,
    max_files: usize,
    max_bytes: u64,
) -> Result<WalkedProject, ServiceError> {
    let patterns: Vec<glob::Pattern> = excludes
        .iter()
        .filter_map(|p| glob::Pattern::new(p).ok())
        .collect();

    let mut files = Vec::new();
    let mut total_bytes: u64 = 0;

    for entry in ignore::WalkBuilder::new(root).hidden(false).build() {
        let entry = entry.map_err(|e| ServiceError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        if patterns.iter().any(|pat| pat.matches_path(relative)) {
            continue;
        }

        let ext = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => ext,
            None => continue,
        };
        let Some(language) = parsers.language_for_extension(ext) else {
            continue;
        };
        if !languages.is_empty() && !languages.iter().any(|l| l == language) {
            continue;
        }

        let metadata = entry.metadata().map_err(|e| ServiceError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
        total_bytes += metadata.len();
        if total_bytes > max_bytes {
            return Err(ServiceError::ProjectTooLarge {
                reason: format!("project exceeds max_project_bytes ({max_bytes})"),
            });
        }

        files.push(WalkedFile {
            path: path.to_path_buf(),
            language: language.to_string(),
        });
        if files.len() > max_files {
            return Err(ServiceError::ProjectTooLarge {
                reason: format!("project exceeds max_project_files ({max_files})"),
            });
        }
    }

    Ok(WalkedProject { files })
}
