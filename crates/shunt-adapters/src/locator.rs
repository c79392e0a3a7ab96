//! Project discovery on the local filesystem.

use std::path::{Path, PathBuf};

use shunt_core::{
    application::{ApplicationError, SHUNTFILE_NAME, ports::ProjectLocator},
    error::ShuntResult,
};
use tracing::{debug, instrument, warn};
use walkdir::WalkDir;

/// Finds Shuntfiles and template folders by walking real directories.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalProjectLocator;

impl LocalProjectLocator {
    pub fn new() -> Self {
        Self
    }
}

impl ProjectLocator for LocalProjectLocator {
    #[instrument(skip(self))]
    fn find_root(&self, start: &Path) -> ShuntResult<(PathBuf, PathBuf)> {
        let absolute = start
            .canonicalize()
            .map_err(|e| ApplicationError::FilesystemError {
                path: start.to_path_buf(),
                reason: e.to_string(),
            })?;

        let first = if absolute.is_file() {
            absolute.parent().map(Path::to_path_buf).unwrap_or_default()
        } else {
            absolute
        };

        for dir in first.ancestors() {
            let candidate = dir.join(SHUNTFILE_NAME);
            if candidate.is_file() {
                debug!(root = %dir.display(), "found project root");
                return Ok((dir.to_path_buf(), candidate));
            }
        }

        Err(ApplicationError::ShuntfileNotFound {
            start: start.to_path_buf(),
        }
        .into())
    }

    #[instrument(skip(self))]
    fn template_dirs(&self, root: &Path, folder_name: &str) -> ShuntResult<Vec<PathBuf>> {
        let mut found = Vec::new();
        let mut walker = WalkDir::new(root)
            .min_depth(1)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter();

        while let Some(entry) = walker.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_dir() {
                continue;
            }
            let name = entry.file_name();
            if name == folder_name {
                found.push(entry.into_path());
                walker.skip_current_dir();
            } else if name.to_string_lossy().starts_with('.') {
                walker.skip_current_dir();
            }
        }

        debug!(count = found.len(), "template directories");
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shunt_core::error::ShuntError;
    use std::fs;

    #[test]
    fn find_root_walks_up_to_the_nearest_shuntfile() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        fs::write(root.join(SHUNTFILE_NAME), "views: []\n").unwrap();
        fs::create_dir_all(root.join("a/b")).unwrap();
        fs::write(root.join("a/b/notes.txt"), "").unwrap();

        let locator = LocalProjectLocator::new();
        let (found, shuntfile) = locator.find_root(&root.join("a/b")).unwrap();
        assert_eq!(found, root);
        assert_eq!(shuntfile, root.join(SHUNTFILE_NAME));

        let (from_file, _) = locator.find_root(&root.join("a/b/notes.txt")).unwrap();
        assert_eq!(from_file, root);
    }

    #[test]
    fn find_root_prefers_the_closest_project() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        fs::write(root.join(SHUNTFILE_NAME), "").unwrap();
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("sub").join(SHUNTFILE_NAME), "").unwrap();

        let (found, _) = LocalProjectLocator.find_root(&root.join("sub")).unwrap();
        assert_eq!(found, root.join("sub"));
    }

    #[test]
    fn missing_start_is_a_filesystem_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = LocalProjectLocator
            .find_root(&dir.path().join("nope"))
            .unwrap_err();
        assert!(matches!(
            err,
            ShuntError::Application(ApplicationError::FilesystemError { .. })
        ));
    }

    #[test]
    fn template_dirs_are_sorted_and_not_nested() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for path in ["b/shunts/shunts", "a/shunts", "shunts", ".git/shunts", "c/d"] {
            fs::create_dir_all(root.join(path)).unwrap();
        }

        let found = LocalProjectLocator.template_dirs(root, "shunts").unwrap();
        let relative: Vec<_> = found
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            relative,
            vec![
                PathBuf::from("a/shunts"),
                PathBuf::from("b/shunts"),
                PathBuf::from("shunts"),
            ]
        );
    }
}
