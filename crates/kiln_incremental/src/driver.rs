//! The driver gluing change detection, the invalidation loop, and the
//! class-file manager scope together (C8).

use crate::cycle::CycleRunner;
use crate::error::IncError;
use crate::external::{Compiler, Lookup, PreviousAnalysis};
use crate::options::IncOptions;
use kiln_analysis::Analysis;
use kiln_classfile::{ClassFileManager, DeleteImmediatelyManager, TransactionalManager};
use kiln_vfs::{FileConverter, StampOracle, VirtualFile};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{info, warn};

/// The outcome of an incremental compilation run.
#[derive(Clone, Debug)]
pub struct CompileResult {
    /// Whether anything was recompiled or pruned.
    pub changed: bool,
    /// The analysis after the run; the previous analysis when nothing
    /// changed or the run was cancelled.
    pub analysis: Analysis,
    /// How many compile cycles ran.
    pub cycles: u32,
}

/// Runs one incremental compilation to completion.
///
/// Opens the class-file manager scope, detects initial changes, and drives
/// the invalidation loop. On success the manager commits; on any failure it
/// rolls back, so the on-disk output set is what it was before the run.
/// Cancellation is not a failure: it rolls back and reports
/// `(changed = false, previous analysis)`.
#[allow(clippy::too_many_arguments)]
pub fn compile_incremental(
    sources: &[VirtualFile],
    previous: PreviousAnalysis,
    compiler: &dyn Compiler,
    lookup: Arc<dyn Lookup>,
    converter: Arc<FileConverter>,
    staging_dir: &Path,
    options: &IncOptions,
    cancel: Arc<AtomicBool>,
) -> Result<CompileResult, IncError> {
    let manager: Arc<dyn ClassFileManager> = if options.transactional {
        Arc::new(TransactionalManager::new(staging_dir)?)
    } else {
        Arc::new(DeleteImmediatelyManager::new())
    };
    let oracle = Arc::new(StampOracle::new(Arc::clone(&converter)));

    let previous_analysis = match previous.get() {
        Some(analysis) => analysis.clone(),
        None => Analysis::empty(),
    };

    let runner = CycleRunner {
        sources,
        converter: &converter,
        oracle: &oracle,
        lookup: &lookup,
        compiler,
        manager: &manager,
        options,
        cancel: &cancel,
    };

    match runner.run(&previous_analysis) {
        Ok((changed, analysis, cycles)) => {
            manager.complete(true)?;
            Ok(CompileResult {
                changed,
                analysis,
                cycles,
            })
        }
        Err(IncError::Cancelled) => {
            if let Err(rollback) = manager.complete(false) {
                warn!(error = %rollback, "rollback after cancellation failed");
            }
            info!("compilation cancelled; keeping previous analysis");
            Ok(CompileResult {
                changed: false,
                analysis: previous_analysis,
                cycles: 0,
            })
        }
        Err(error) => {
            if let Err(rollback) = manager.complete(false) {
                warn!(error = %rollback, "rollback after failure failed");
            }
            Err(error)
        }
    }
}
