//! Guarded recursive delete.
//!
//! `delete_tree` removes one selected directory depth-first, best-effort,
//! and reports partial failure instead of aborting. `delete_selected` runs it
//! over every configured path and classifies each result.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use foldersweep_core::DeletionOutcome;
use walkdir::WalkDir;

use crate::protected::ProtectedPathSet;

/// Why a single tree could not be (fully) deleted.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DeleteError {
    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("{} is a protected path", .0.display())]
    ProtectedPath(PathBuf),

    /// Some entries under the tree could not be removed.
    #[error("{}: {failed} entries could not be removed (first: {first_error})", .path.display())]
    PartialDelete {
        path: PathBuf,
        removed: usize,
        failed: usize,
        first_error: String,
    },
}

/// Deletes directories, refusing anything the protected set covers.
#[derive(Debug, Clone)]
pub struct DeletionGuard {
    protected: ProtectedPathSet,
}

impl DeletionGuard {
    pub fn new(protected: ProtectedPathSet) -> Self {
        Self { protected }
    }

    pub fn protected(&self) -> &ProtectedPathSet {
        &self.protected
    }

    pub fn is_protected(&self, path: &Path) -> bool {
        self.protected.is_protected(path)
    }

    /// Delete `path` and everything under it.
    ///
    /// A missing path counts as success. Protection is checked before the
    /// filesystem is touched. Protected entries inside the tree are left in
    /// place and reported as failures. Symlinks are never followed: a
    /// symlinked root is `NotADirectory`, symlinks inside the tree are
    /// unlinked, and the walk does not cross into other mounted filesystems.
    pub fn delete_tree(&self, path: &Path) -> Result<(), DeleteError> {
        if self.is_protected(path) {
            return Err(DeleteError::ProtectedPath(path.to_path_buf()));
        }

        let meta = match std::fs::symlink_metadata(path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("Already gone: {}", path.display());
                return Ok(());
            }
            Err(e) => {
                return Err(DeleteError::PartialDelete {
                    path: path.to_path_buf(),
                    removed: 0,
                    failed: 1,
                    first_error: e.to_string(),
                });
            }
        };
        if !meta.is_dir() {
            return Err(DeleteError::NotADirectory(path.to_path_buf()));
        }

        let mut removed = 0usize;
        let mut failed = 0usize;
        let mut first_error: Option<String> = None;
        let mut note_failure = |p: &Path, err: String| {
            tracing::debug!("Could not remove {}: {err}", p.display());
            failed += 1;
            first_error.get_or_insert_with(|| format!("{}: {err}", p.display()));
        };

        // Pre-order walk so protected directories are pruned before descent,
        // then removal in reverse: children always go before their parent.
        let mut shielded: Vec<PathBuf> = Vec::new();
        let mut entries = Vec::new();
        let walk = WalkDir::new(path)
            .follow_links(false)
            .same_file_system(true)
            .into_iter()
            .filter_entry(|entry| {
                let keep = entry.depth() == 0 || !self.protected.is_protected(entry.path());
                if !keep {
                    shielded.push(entry.path().to_path_buf());
                }
                keep
            });
        for entry in walk {
            match entry {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    let p = e.path().unwrap_or(path).to_path_buf();
                    note_failure(&p, e.to_string());
                }
            }
        }

        for p in &shielded {
            tracing::warn!("🛡️ Kept protected entry {}", p.display());
            note_failure(p, "protected path".into());
        }

        for entry in entries.iter().rev() {
            let p = entry.path();
            let result = if entry.file_type().is_dir() {
                std::fs::remove_dir(p)
            } else {
                std::fs::remove_file(p)
            };
            match result {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => note_failure(p, e.to_string()),
            }
        }

        if failed == 0 {
            tracing::info!("🗑️ Deleted {} ({} entries)", path.display(), removed);
            Ok(())
        } else {
            Err(DeleteError::PartialDelete {
                path: path.to_path_buf(),
                removed,
                failed,
                first_error: first_error.unwrap_or_default(),
            })
        }
    }

    /// Delete every selected path. Never stops early: each path is attempted
    /// and lands in exactly one of succeeded / failed / skipped_protected.
    pub fn delete_selected<'a, I>(&self, paths: I) -> DeletionOutcome
    where
        I: IntoIterator<Item = &'a PathBuf>,
    {
        let mut outcome = DeletionOutcome::default();

        for path in paths {
            outcome.attempted.insert(path.clone());
            match self.delete_tree(path) {
                Ok(()) => outcome.record_success(path.clone()),
                Err(DeleteError::ProtectedPath(_)) => {
                    tracing::warn!("🛡️ Skipping protected path: {}", path.display());
                    outcome.record_protected(path.clone());
                }
                Err(e) => {
                    tracing::warn!("⚠️ Delete failed: {e}");
                    outcome.record_failure(path.clone(), e.to_string());
                }
            }
        }

        tracing::info!("Deletion pass finished: {}", outcome.summary());
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protected::ProtectedRule;
    use std::fs;

    fn guard() -> DeletionGuard {
        DeletionGuard::new(ProtectedPathSet::from_rules(vec![
            ProtectedRule::Exact("/".into()),
            ProtectedRule::Subtree("/system".into()),
            ProtectedRule::Subtree("/proc".into()),
        ]))
    }

    fn populate(root: &Path) {
        fs::create_dir_all(root.join("a/b/c")).unwrap();
        fs::write(root.join("top.txt"), b"x").unwrap();
        fs::write(root.join("a/one.bin"), vec![0u8; 1024]).unwrap();
        fs::write(root.join("a/b/c/deep.log"), b"deep").unwrap();
    }

    #[test]
    fn test_delete_tree_removes_everything() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("cache");
        populate(&target);

        guard().delete_tree(&target).unwrap();
        assert!(!target.exists());
        assert!(tmp.path().exists());
    }

    #[test]
    fn test_delete_tree_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("gone");
        assert_eq!(guard().delete_tree(&target), Ok(()));
        assert_eq!(guard().delete_tree(&target), Ok(()));
    }

    #[test]
    fn test_delete_tree_rejects_file() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("plain.txt");
        fs::write(&file, b"keep me").unwrap();
        assert_eq!(
            guard().delete_tree(&file),
            Err(DeleteError::NotADirectory(file.clone()))
        );
        assert!(file.exists());
    }

    #[test]
    fn test_delete_tree_refuses_protected_without_touching_fs() {
        // /system does not exist on most test hosts; protection must win anyway.
        assert_eq!(
            guard().delete_tree(Path::new("/system")),
            Err(DeleteError::ProtectedPath("/system".into()))
        );
        assert!(matches!(
            guard().delete_tree(Path::new("/proc/self")),
            Err(DeleteError::ProtectedPath(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_inside_tree_is_unlinked_not_followed() {
        let tmp = tempfile::tempdir().unwrap();
        let outside = tmp.path().join("outside");
        fs::create_dir_all(&outside).unwrap();
        fs::write(outside.join("precious.txt"), b"keep").unwrap();

        let target = tmp.path().join("target");
        fs::create_dir_all(&target).unwrap();
        std::os::unix::fs::symlink(&outside, target.join("link")).unwrap();

        guard().delete_tree(&target).unwrap();
        assert!(!target.exists());
        assert!(outside.join("precious.txt").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_root_is_not_a_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let real = tmp.path().join("real");
        fs::create_dir_all(&real).unwrap();
        let link = tmp.path().join("link");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        assert!(matches!(
            guard().delete_tree(&link),
            Err(DeleteError::NotADirectory(_))
        ));
        assert!(real.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_permission_denied_reports_partial_delete() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("target");
        let locked = target.join("locked");
        fs::create_dir_all(&locked).unwrap();
        fs::write(locked.join("inner.txt"), b"x").unwrap();
        fs::write(target.join("free.txt"), b"x").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o500)).unwrap();

        // Root ignores directory permissions; nothing to assert there.
        let probe = locked.join("probe");
        if fs::write(&probe, b"").is_ok() {
            fs::remove_file(&probe).ok();
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o700)).unwrap();
            return;
        }

        let result = guard().delete_tree(&target);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o700)).unwrap();

        match result {
            Err(DeleteError::PartialDelete { failed, .. }) => assert!(failed >= 1),
            other => panic!("expected PartialDelete, got {other:?}"),
        }
        // Best-effort: the sibling outside the locked directory is still removed.
        assert!(!target.join("free.txt").exists());
    }

    #[test]
    fn test_protected_subtree_inside_selection_survives() {
        let tmp = tempfile::tempdir().unwrap();
        let parent = tmp.path().join("parent");
        let keep = parent.join("keep");
        populate(&parent);
        fs::create_dir_all(&keep).unwrap();
        fs::write(keep.join("precious.txt"), b"keep").unwrap();
        let guard = DeletionGuard::new(ProtectedPathSet::from_rules(vec![
            ProtectedRule::Exact("/".into()),
            ProtectedRule::Subtree(keep.clone()),
        ]));

        match guard.delete_tree(&parent) {
            Err(DeleteError::PartialDelete {
                failed,
                first_error,
                ..
            }) => {
                assert!(failed >= 1);
                assert!(first_error.contains("protected"));
            }
            other => panic!("expected PartialDelete, got {other:?}"),
        }
        assert!(keep.join("precious.txt").exists());
        assert!(!parent.join("top.txt").exists());
        assert!(!parent.join("a").exists());

        let outcome = guard.delete_selected(std::slice::from_ref(&parent));
        assert!(outcome.failed.contains(&parent));
        assert!(keep.join("precious.txt").exists());
    }

    #[test]
    fn test_delete_selected_never_aborts_early() {
        let tmp = tempfile::tempdir().unwrap();
        let first = tmp.path().join("first");
        let third = tmp.path().join("third");
        populate(&first);
        populate(&third);
        let paths = vec![first.clone(), PathBuf::from("/system"), third.clone()];

        let outcome = guard().delete_selected(&paths);
        assert_eq!(outcome.attempted.len(), 3);
        assert_eq!(outcome.succeeded.len(), 2);
        assert_eq!(outcome.skipped_protected.len(), 1);
        assert!(outcome.skipped_protected.contains(Path::new("/system")));
        assert!(outcome.failed.is_empty());
        assert!(!outcome.is_success());
        assert!(!first.exists() && !third.exists());
    }

    #[test]
    fn test_delete_selected_mixed_results() {
        let tmp = tempfile::tempdir().unwrap();
        let tmp_dir = tmp.path().join("Download/tmp");
        populate(&tmp_dir);
        let not_dir = tmp.path().join("notes.txt");
        fs::write(&not_dir, b"x").unwrap();

        let paths = vec![tmp_dir.clone(), PathBuf::from("/system"), not_dir.clone()];
        let outcome = guard().delete_selected(&paths);

        assert!(outcome.succeeded.contains(&tmp_dir));
        assert!(outcome.skipped_protected.contains(Path::new("/system")));
        assert!(outcome.failed.contains(&not_dir));
        assert_eq!(outcome.failures.len(), 2);
        assert!(!outcome.is_success());
    }
}
