//! On-demand, memoized stamping of sources, products, and libraries.

use crate::converter::FileConverter;
use crate::file::{VirtualFile, VirtualFileRef};
use crate::stamp::{Stamp, StampError};
use kiln_common::ContentHash;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::UNIX_EPOCH;

/// The category a stamp was requested for.
///
/// A file can legitimately be stamped in more than one role (a classpath
/// entry that is also a product), so the cache keys on (kind, file).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
enum StampKind {
    Source,
    Product,
    Library,
}

/// Memoized stamp oracle for one compilation run (C1).
///
/// Sources and libraries stamp by content hash; products stamp by
/// last-modified nanoseconds. Stamps are computed on first request and cached
/// for the life of the oracle. The callback stamps from compiler threads, so
/// the cache sits behind a mutex.
pub struct StampOracle {
    converter: Arc<FileConverter>,
    cache: Mutex<HashMap<(StampKind, VirtualFileRef), Stamp>>,
}

impl StampOracle {
    /// Creates a fresh oracle with an empty cache.
    pub fn new(converter: Arc<FileConverter>) -> Self {
        Self {
            converter,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Stamps a source file by content hash, degrading to
    /// [`Stamp::Empty`] if the file cannot be read.
    pub fn source(&self, file: &VirtualFile) -> Stamp {
        self.cached(StampKind::Source, file.vref(), || {
            hash_stamp(file.path()).unwrap_or(Stamp::Empty)
        })
    }

    /// Stamps a source file, surfacing the read failure instead of degrading.
    pub fn try_source(&self, file: &VirtualFile) -> Result<Stamp, StampError> {
        match self.source(file) {
            Stamp::Empty => Err(unavailable(file.path())),
            stamp => Ok(stamp),
        }
    }

    /// Stamps a product by last-modified time; a missing product stamps
    /// [`Stamp::Empty`], which the engine reads as "removed".
    pub fn product(&self, path: &Path) -> Stamp {
        let vref = self.converter.to_ref(path);
        self.cached(StampKind::Product, vref, || {
            modified_stamp(path).unwrap_or(Stamp::Empty)
        })
    }

    /// Stamps a library (classpath entry) by content hash; an unresolvable
    /// library stamps [`Stamp::Empty`], which the engine reads as "removed".
    pub fn library(&self, file: &VirtualFile) -> Stamp {
        self.cached(StampKind::Library, file.vref(), || {
            hash_stamp(file.path()).unwrap_or(Stamp::Empty)
        })
    }

    /// Restamps a product that was rewritten during this run, replacing any
    /// cached observation. Products are pruned and regenerated inside one
    /// run, so their first stamp can go stale; sources and libraries cannot.
    pub fn refresh_product(&self, path: &Path) -> Stamp {
        let vref = self.converter.to_ref(path);
        let stamp = modified_stamp(path).unwrap_or(Stamp::Empty);
        self.cache
            .lock()
            .unwrap()
            .insert((StampKind::Product, vref), stamp);
        stamp
    }

    fn cached(&self, kind: StampKind, vref: VirtualFileRef, compute: impl FnOnce() -> Stamp) -> Stamp {
        let mut cache = self.cache.lock().unwrap();
        *cache.entry((kind, vref)).or_insert_with(compute)
    }
}

fn hash_stamp(path: &Path) -> Result<Stamp, StampError> {
    let content = std::fs::read(path).map_err(|e| unavailable_io(path, e))?;
    Ok(Stamp::Hash(ContentHash::from_bytes(&content)))
}

fn modified_stamp(path: &Path) -> Result<Stamp, StampError> {
    let meta = std::fs::metadata(path).map_err(|e| unavailable_io(path, e))?;
    let modified = meta.modified().map_err(|e| unavailable_io(path, e))?;
    let ns = modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    Ok(Stamp::LastModified(ns))
}

fn unavailable(path: &Path) -> StampError {
    unavailable_io(
        path,
        std::io::Error::new(std::io::ErrorKind::NotFound, "file not readable"),
    )
}

fn unavailable_io(path: &Path, source: std::io::Error) -> StampError {
    StampError::Unavailable {
        path: path.to_path_buf(),
        source,
    }
}
