use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Feature ids live in `[0, 2^21)`; anything wider is folded in.
pub const FEATURE_SET_SIZE: usize = 1 << 21;

/// One corpus input on disk plus everything the selectors need to know
/// about it.
///
/// Entries are never physically removed: a seed whose every feature has been
/// taken over by a smaller input is deleted *logically* (`live = false`, file
/// unlinked) so that slot numbers stay stable for the feature index.
#[derive(Debug, Clone)]
pub struct SeedEntry {
    /// Corpus file name (content hash).
    pub file_name: String,
    /// Full path of the on-disk input.
    pub file_path: PathBuf,
    /// Input size in bytes.
    pub size: u32,
    /// Wall-clock cost of one execution of this input.
    pub time_of_unit: Duration,
    /// Function-entry PCs this seed touches.
    pub seed_funcs: Vec<u64>,
    /// PC-table indices this seed touches.
    pub seed_pcs: Vec<usize>,
    /// Feature ids this seed owned when it was admitted.
    pub feature_set: Vec<u32>,
    /// How many features this seed currently owns exclusively. The entry
    /// dies when this reaches zero.
    pub num_features: usize,
    pub live: bool,
    /// Owned by a running job; not selectable.
    pub locked: bool,
    pub selections: u64,
    pub energy: f64,
    pub ucb1_score: f64,
}

/// The process-wide feature index: for every feature ever observed, the size
/// of the smallest input that exhibited it and the corpus slot owning that
/// input, plus a saturating hit-frequency counter.
struct FeatureIndex {
    smallest_size_per_feature: Box<[u32]>,
    owner_slot_per_feature: Box<[u32]>,
    global_feature_freq: Box<[u16]>,
    num_added_features: usize,
    num_updated_features: usize,
}

impl FeatureIndex {
    fn new() -> Self {
        Self {
            smallest_size_per_feature: vec![0u32; FEATURE_SET_SIZE].into_boxed_slice(),
            owner_slot_per_feature: vec![0u32; FEATURE_SET_SIZE].into_boxed_slice(),
            global_feature_freq: vec![0u16; FEATURE_SET_SIZE].into_boxed_slice(),
            num_added_features: 0,
            num_updated_features: 0,
        }
    }
}

/// Append-only table of seed entries together with the feature index that
/// assigns each feature to its smallest exemplar.
///
/// The index references entries by slot number; slots are handed out in
/// admission order and never reused, so the two structures need no
/// back-pointers.
pub struct CorpusStore {
    entries: Vec<SeedEntry>,
    deleted: usize,
    index: FeatureIndex,
    corpus_dir: PathBuf,
}

impl CorpusStore {
    pub fn new(corpus_dir: PathBuf) -> Self {
        Self {
            entries: Vec::new(),
            deleted: 0,
            index: FeatureIndex::new(),
            corpus_dir,
        }
    }

    pub fn corpus_dir(&self) -> &PathBuf {
        &self.corpus_dir
    }

    /// Total number of slots ever handed out, dead ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of live (not logically deleted) entries.
    pub fn live_size(&self) -> usize {
        self.entries.len() - self.deleted
    }

    /// Count of ownership changes: first sightings plus every time a smaller
    /// input took a feature over.
    pub fn num_feature_updates(&self) -> usize {
        self.index.num_updated_features
    }

    /// Count of features seen at least once.
    pub fn num_features_owned(&self) -> usize {
        self.index.num_added_features
    }

    pub fn seed(&self, slot: usize) -> &SeedEntry {
        &self.entries[slot]
    }

    pub fn seed_mut(&mut self, slot: usize) -> &mut SeedEntry {
        &mut self.entries[slot]
    }

    pub fn live_slots(&self) -> Vec<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.live)
            .map(|(slot, _)| slot)
            .collect()
    }

    /// Offer a feature exhibited by an input of `new_size` bytes. Returns
    /// true when the caller's input now owns the feature.
    ///
    /// Smallest exemplar wins: a first sighting takes ownership outright and
    /// is recorded in `first_sightings`; a strictly smaller input displaces
    /// the previous owner, whose exclusive-feature count is decremented and
    /// which dies (file unlinked) when that count reaches zero. Ties keep
    /// the incumbent.
    ///
    /// Ownership is recorded against the *next* slot (`len()`), so the
    /// winning entry must be admitted with `add_to_corpus` immediately after
    /// its feature batch.
    pub fn add_feature(
        &mut self,
        feature: u32,
        new_size: u32,
        first_sightings: &mut BTreeSet<u32>,
    ) -> bool {
        debug_assert!(new_size > 0, "zero-sized inputs cannot own features");
        let idx = feature as usize % FEATURE_SET_SIZE;
        let old_size = self.index.smallest_size_per_feature[idx];
        if old_size == 0 || old_size > new_size {
            if old_size > 0 {
                let owner = self.index.owner_slot_per_feature[idx] as usize;
                let entry = &mut self.entries[owner];
                debug_assert!(entry.num_features > 0);
                entry.num_features -= 1;
                if entry.num_features == 0 {
                    self.delete(owner);
                }
            } else {
                self.index.num_added_features += 1;
                first_sightings.insert(idx as u32);
            }
            self.index.num_updated_features += 1;
            self.index.owner_slot_per_feature[idx] = self.entries.len() as u32;
            self.index.smallest_size_per_feature[idx] = new_size;
            return true;
        }
        false
    }

    /// Saturating increment of the feature's global hit counter.
    pub fn update_feature_frequency(&mut self, feature: u32) {
        let idx = feature as usize % FEATURE_SET_SIZE;
        let freq = &mut self.index.global_feature_freq[idx];
        *freq = freq.saturating_add(1);
    }

    pub fn feature_frequency(&self, feature: u32) -> u16 {
        self.index.global_feature_freq[feature as usize % FEATURE_SET_SIZE]
    }

    /// Size of the smallest input that ever exhibited `feature`, 0 if the
    /// feature was never seen.
    pub fn smallest_input_size_for(&self, feature: u32) -> u32 {
        self.index.smallest_size_per_feature[feature as usize % FEATURE_SET_SIZE]
    }

    /// Slot currently owning `feature`. Only meaningful while
    /// `smallest_input_size_for` is nonzero.
    pub fn owner_slot_for(&self, feature: u32) -> usize {
        self.index.owner_slot_per_feature[feature as usize % FEATURE_SET_SIZE] as usize
    }

    /// Admit a new entry and return its slot. Must directly follow the
    /// `add_feature` batch that won it its features.
    #[allow(clippy::too_many_arguments)]
    pub fn add_to_corpus(
        &mut self,
        file_name: String,
        file_path: PathBuf,
        size: u32,
        num_features: usize,
        time_of_unit: Duration,
        feature_set: Vec<u32>,
        seed_pcs: Vec<usize>,
        seed_funcs: Vec<u64>,
    ) -> usize {
        debug_assert!(self.entries.len() < u32::MAX as usize);
        let slot = self.entries.len();
        self.entries.push(SeedEntry {
            file_name,
            file_path,
            size,
            time_of_unit,
            seed_funcs,
            seed_pcs,
            feature_set,
            num_features,
            live: true,
            locked: false,
            selections: 0,
            energy: 1.0,
            ucb1_score: 0.0,
        });
        slot
    }

    /// Logically delete a slot: unlink its file, mark it dead and clear the
    /// selector state so nothing keeps steering toward it.
    pub fn delete(&mut self, slot: usize) {
        let entry = &mut self.entries[slot];
        if !entry.live {
            return;
        }
        let _ = fs::remove_file(&entry.file_path);
        entry.live = false;
        entry.locked = false;
        entry.energy = 0.0;
        entry.ucb1_score = 0.0;
        entry.seed_funcs.clear();
        entry.seed_pcs.clear();
        entry.feature_set.clear();
        self.deleted += 1;
    }

    /// Release the given slots at the end of a job. Dead slots were already
    /// unlocked by deletion.
    pub fn unlock(&mut self, slots: &[usize]) {
        for &slot in slots {
            if let Some(entry) = self.entries.get_mut(slot) {
                if entry.live {
                    entry.locked = false;
                }
            }
        }
    }
}
