//! The class-file manager capability and the delete-immediately policy.

use crate::error::ClassfileError;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Scoped owner of the emitted-artifact lifecycle for one compile run (C4).
///
/// The external compiler writes artifacts through [`generated`], the
/// invalidation engine prunes through [`delete`], and the driver closes the
/// scope with [`complete`]. The compile step is parallel, so implementations
/// must tolerate concurrent calls; operations take `&self` and guard state
/// internally.
///
/// [`generated`]: ClassFileManager::generated
/// [`delete`]: ClassFileManager::delete
/// [`complete`]: ClassFileManager::complete
pub trait ClassFileManager: Send + Sync {
    /// Records artifacts newly written by the compiler.
    fn generated(&self, classes: &[PathBuf]) -> Result<(), ClassfileError>;

    /// Deletes (or stages for deletion) the given artifacts.
    fn delete(&self, classes: &[PathBuf]) -> Result<(), ClassfileError>;

    /// Closes the scope. With `success = false` the on-disk output set must
    /// equal the set observed at manager creation when this returns.
    fn complete(&self, success: bool) -> Result<(), ClassfileError>;

    /// All artifacts currently tracked as live outputs of this run.
    fn tracked(&self) -> BTreeSet<PathBuf>;

    /// Notification that the compiler finished its dependency phase.
    fn dependency_phase_completed(&self) {}

    /// Notification that the compiler finished its API phase.
    fn api_phase_completed(&self) {}

    /// Artifacts packaged into an output jar, if the manager targets one.
    fn classes_in_output_jar(&self) -> Vec<PathBuf> {
        Vec::new()
    }
}

/// Manager policy that unlinks on `delete` and ignores `complete`.
///
/// No rollback: a failed run leaves whatever the compiler had produced so
/// far. Chosen when `transactional` is off.
#[derive(Default)]
pub struct DeleteImmediatelyManager {
    generated: Mutex<BTreeSet<PathBuf>>,
}

impl DeleteImmediatelyManager {
    /// Creates a new manager.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClassFileManager for DeleteImmediatelyManager {
    fn generated(&self, classes: &[PathBuf]) -> Result<(), ClassfileError> {
        let mut generated = self.generated.lock().unwrap();
        for class in classes {
            generated.insert(class.clone());
        }
        Ok(())
    }

    fn delete(&self, classes: &[PathBuf]) -> Result<(), ClassfileError> {
        let mut generated = self.generated.lock().unwrap();
        for class in classes {
            generated.remove(class);
            remove_if_exists(class)?;
        }
        Ok(())
    }

    fn complete(&self, _success: bool) -> Result<(), ClassfileError> {
        Ok(())
    }

    fn tracked(&self) -> BTreeSet<PathBuf> {
        self.generated.lock().unwrap().clone()
    }
}

pub(crate) fn remove_if_exists(path: &Path) -> Result<(), ClassfileError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ClassfileError::io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delete_unlinks_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let class = dir.path().join("A.class");
        std::fs::write(&class, b"bytecode").unwrap();

        let manager = DeleteImmediatelyManager::new();
        manager.delete(&[class.clone()]).unwrap();
        assert!(!class.exists());
    }

    #[test]
    fn delete_missing_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let manager = DeleteImmediatelyManager::new();
        manager.delete(&[dir.path().join("gone.class")]).unwrap();
    }

    #[test]
    fn generated_then_deleted_is_untracked() {
        let dir = tempfile::tempdir().unwrap();
        let class = dir.path().join("A.class");
        std::fs::write(&class, b"bytecode").unwrap();

        let manager = DeleteImmediatelyManager::new();
        manager.generated(&[class.clone()]).unwrap();
        assert_eq!(manager.tracked().len(), 1);
        manager.delete(&[class]).unwrap();
        assert!(manager.tracked().is_empty());
    }

    #[test]
    fn complete_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let class = dir.path().join("A.class");
        std::fs::write(&class, b"bytecode").unwrap();

        let manager = DeleteImmediatelyManager::new();
        manager.generated(&[class.clone()]).unwrap();
        manager.complete(false).unwrap();
        // Delete-immediately has no rollback: the artifact stays.
        assert!(class.exists());
    }

    #[test]
    fn concurrent_generated_calls() {
        use std::sync::Arc;
        use std::thread;

        let manager = Arc::new(DeleteImmediatelyManager::new());
        let mut handles = Vec::new();
        for i in 0..8 {
            let manager = Arc::clone(&manager);
            handles.push(thread::spawn(move || {
                manager
                    .generated(&[PathBuf::from(format!("out/C{i}.class"))])
                    .unwrap();
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(manager.tracked().len(), 8);
    }
}
