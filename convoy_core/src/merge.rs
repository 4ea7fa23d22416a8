use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MergeError {
    #[error("merge I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for MergeError {
    fn from(err: std::io::Error) -> Self {
        MergeError::Io(err.to_string())
    }
}

/// A candidate file with its size. Ordered by size first so seed lists sort
/// smallest-first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SizedFile {
    pub size: u64,
    pub path: PathBuf,
}

/// Recursively list all regular files below `dir`. A missing directory is
/// an empty listing, not an error; engines create their queues lazily.
pub fn sized_files_from_dir(dir: &Path) -> Result<Vec<SizedFile>, MergeError> {
    let mut files = Vec::new();
    if !dir.is_dir() {
        return Ok(files);
    }
    collect_files(dir, &mut files)?;
    Ok(files)
}

fn collect_files(dir: &Path, out: &mut Vec<SizedFile>) -> Result<(), MergeError> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else if path.is_file() {
            let size = entry.metadata()?.len();
            out.push(SizedFile { size, path });
        }
    }
    Ok(())
}

/// Result of a novelty-merge pass.
#[derive(Debug, Default)]
pub struct MergeOutcome {
    /// The subset of offered files worth keeping, in preference order.
    pub files: Vec<PathBuf>,
    /// Features first seen during the pass.
    pub new_features: BTreeSet<u32>,
    /// PC-table indices first covered during the pass.
    pub new_cov: BTreeSet<usize>,
}

/// The crash-resistant "merge an input set for novelty" primitive, consumed
/// as a black box.
///
/// Contract: the implementation may execute each offered file at most once,
/// must tolerate crashing inputs by resuming from `control_file`, and
/// returns the files that contribute features or coverage not already in
/// `known_features` / `known_cov`. It never mutates the offered files.
pub trait NoveltyMerge: Send {
    fn merge(
        &mut self,
        seed_files: &[SizedFile],
        known_features: &BTreeSet<u32>,
        known_cov: &BTreeSet<usize>,
        control_file: &Path,
    ) -> Result<MergeOutcome, MergeError>;
}

/// Pass-through implementation: keeps every offered file and claims no new
/// state. Bootstrap replay re-derives the real feature sets anyway.
#[derive(Default, Debug)]
pub struct KeepAllMerge;

impl NoveltyMerge for KeepAllMerge {
    fn merge(
        &mut self,
        seed_files: &[SizedFile],
        _known_features: &BTreeSet<u32>,
        _known_cov: &BTreeSet<usize>,
        _control_file: &Path,
    ) -> Result<MergeOutcome, MergeError> {
        Ok(MergeOutcome {
            files: seed_files.iter().map(|file| file.path.clone()).collect(),
            ..MergeOutcome::default()
        })
    }
}
