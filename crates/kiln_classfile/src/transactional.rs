//! The transactional class-file manager.

use crate::error::ClassfileError;
use crate::manager::{remove_if_exists, ClassFileManager};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Name of the staging ledger inside the staging directory.
const LEDGER_FILE: &str = "ledger.json";

/// One artifact moved into the staging area.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct StagedEntry {
    /// Where the artifact lived before staging.
    original: PathBuf,
    /// File name inside the staging directory.
    staged_name: String,
}

/// On-disk record of a run's staged deletions and new outputs.
///
/// Rewritten on every mutation so that a crashed run can be rolled back by
/// the next startup.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct Ledger {
    staged: Vec<StagedEntry>,
    generated: Vec<PathBuf>,
}

#[derive(Default)]
struct TxState {
    ledger: Ledger,
    tracked: BTreeSet<PathBuf>,
    next_seq: u64,
    completed: bool,
}

/// Manager policy that stages deletions and can restore the pre-run output
/// set on failure.
///
/// `delete` moves artifacts into the staging directory instead of unlinking;
/// `complete(true)` discards the staging area; `complete(false)` unlinks the
/// run's new outputs and moves every staged artifact back. If a run crashes
/// without completing, [`TransactionalManager::new`] on the same staging
/// directory rolls the leftover run back before starting the new one.
pub struct TransactionalManager {
    staging_dir: PathBuf,
    state: Mutex<TxState>,
}

impl TransactionalManager {
    /// Creates a manager staging into `staging_dir`, rolling back any
    /// leftover staging area from a crashed earlier run first.
    pub fn new(staging_dir: impl Into<PathBuf>) -> Result<Self, ClassfileError> {
        let staging_dir = staging_dir.into();
        if let Some(ledger) = read_ledger(&staging_dir)? {
            warn!(
                staging_dir = %staging_dir.display(),
                staged = ledger.staged.len(),
                "found leftover staging area; rolling back crashed run"
            );
            restore(&staging_dir, &ledger)?;
            clear_staging(&staging_dir)?;
        }
        Ok(Self {
            staging_dir,
            state: Mutex::new(TxState::default()),
        })
    }

    fn write_ledger(&self, ledger: &Ledger) -> Result<(), ClassfileError> {
        std::fs::create_dir_all(&self.staging_dir)
            .map_err(|e| ClassfileError::io(&self.staging_dir, e))?;
        let path = self.staging_dir.join(LEDGER_FILE);
        let json = serde_json::to_string_pretty(ledger).map_err(|e| ClassfileError::Ledger {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        std::fs::write(&path, json).map_err(|e| ClassfileError::io(path, e))
    }
}

impl ClassFileManager for TransactionalManager {
    fn generated(&self, classes: &[PathBuf]) -> Result<(), ClassfileError> {
        let mut state = self.state.lock().unwrap();
        for class in classes {
            state.tracked.insert(class.clone());
            state.ledger.generated.push(class.clone());
        }
        // Written under the lock so concurrent mutations cannot persist a
        // stale ledger.
        self.write_ledger(&state.ledger)
    }

    fn delete(&self, classes: &[PathBuf]) -> Result<(), ClassfileError> {
        let mut state = self.state.lock().unwrap();
        for class in classes {
            state.tracked.remove(class);
            if !class.exists() {
                continue;
            }
            let file_name = class
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "artifact".to_string());
            let staged_name = format!("{:06}-{file_name}", state.next_seq);
            state.next_seq += 1;

            std::fs::create_dir_all(&self.staging_dir)
                .map_err(|e| ClassfileError::io(&self.staging_dir, e))?;
            let staged_path = self.staging_dir.join(&staged_name);
            std::fs::rename(class, &staged_path).map_err(|e| ClassfileError::io(class, e))?;
            debug!(class = %class.display(), "staged deleted artifact");
            state.ledger.staged.push(StagedEntry {
                original: class.clone(),
                staged_name,
            });
        }
        self.write_ledger(&state.ledger)
    }

    fn complete(&self, success: bool) -> Result<(), ClassfileError> {
        let mut state = self.state.lock().unwrap();
        if state.completed {
            return Ok(());
        }
        state.completed = true;

        if !success {
            restore(&self.staging_dir, &state.ledger)?;
        }
        clear_staging(&self.staging_dir)
    }

    fn tracked(&self) -> BTreeSet<PathBuf> {
        self.state.lock().unwrap().tracked.clone()
    }
}

fn read_ledger(staging_dir: &Path) -> Result<Option<Ledger>, ClassfileError> {
    let path = staging_dir.join(LEDGER_FILE);
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(ClassfileError::io(path, e)),
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| ClassfileError::Ledger {
            path,
            reason: e.to_string(),
        })
}

/// Restores the output set observed before the run: unlinks the run's new
/// outputs, then moves staged artifacts back to their original paths.
///
/// Staged entries restore newest-first so that when the same path was
/// deleted more than once during the run, the oldest (pre-run) version wins.
/// Idempotent: missing staged files and already-removed outputs are skipped.
fn restore(staging_dir: &Path, ledger: &Ledger) -> Result<(), ClassfileError> {
    for generated in &ledger.generated {
        remove_if_exists(generated)?;
    }
    for entry in ledger.staged.iter().rev() {
        let staged_path = staging_dir.join(&entry.staged_name);
        if !staged_path.exists() {
            continue;
        }
        if let Some(parent) = entry.original.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ClassfileError::io(parent, e))?;
        }
        std::fs::rename(&staged_path, &entry.original)
            .map_err(|e| ClassfileError::io(&entry.original, e))?;
        debug!(class = %entry.original.display(), "restored staged artifact");
    }
    Ok(())
}

fn clear_staging(staging_dir: &Path) -> Result<(), ClassfileError> {
    match std::fs::remove_dir_all(staging_dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ClassfileError::io(staging_dir, e)),
    }
}
