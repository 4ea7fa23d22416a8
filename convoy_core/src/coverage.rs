use std::collections::{BTreeSet, HashMap};

/// In-process test callback. Returns 0 when the input was consumed and -1
/// when the target rejected it; any other value is a harness bug.
pub type TestOneInput = Box<dyn FnMut(&[u8]) -> i32 + Send>;

/// One entry of the instrumentation PC table. The low flag bit marks a
/// function entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcTableEntry {
    pub pc: u64,
    pub flags: u64,
}

impl PcTableEntry {
    pub fn is_func_entry(&self) -> bool {
        self.flags & 1 != 0
    }
}

/// Per-function coverage accounting. `uncover_size + covered_size` is the
/// function's static PC count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncInfo {
    /// PC of the function entry.
    pub id: u64,
    /// Cumulative hits across all jobs.
    pub hits: u64,
    /// PCs of the function not yet observed.
    pub uncover_size: usize,
    /// PCs of the function observed so far.
    pub covered_size: usize,
}

impl FuncInfo {
    /// Steering weight of the function: rarely-hit functions with uncovered
    /// territory are worth much more than saturated ones. Functions that
    /// were never hit weigh 0 here; seed weighting substitutes its own
    /// fallback for those.
    pub fn weight(&self, global_average_hits: u64) -> f64 {
        if self.hits == 0 {
            return 0.0;
        }
        let sqrt_hits = (self.hits as f64).sqrt();
        let relative_frequency = if global_average_hits > 0 {
            sqrt_hits / global_average_hits as f64
        } else {
            0.0
        };
        let low_frequency_threshold = global_average_hits as f64 * 0.5;
        if self.uncover_size > 0 {
            let frequency_penalty = 1.0 / (1.0 + (1.0 + relative_frequency).ln());
            if sqrt_hits > low_frequency_threshold {
                4.0 * self.uncover_size as f64 * frequency_penalty
            } else {
                40.0 * self.uncover_size as f64 * frequency_penalty
            }
        } else {
            2.0
        }
    }
}

/// Coverage observed under one engine's jobs (or globally, for the slot
/// named "Global"). PCs are referenced by their stable PC-table index.
#[derive(Debug, Clone, Default)]
pub struct CoverageInfo {
    pub engine: String,
    pub observed_pcs: BTreeSet<usize>,
    /// Function entry PC => cumulative hit counter.
    pub observed_funcs: HashMap<u64, u64>,
    pub funcs_info: Vec<FuncInfo>,
    /// Average of per-function sqrt(hits), refreshed by `value_funcs_list`.
    pub funcs_average_hits: u64,
}

impl CoverageInfo {
    pub fn new(engine: impl Into<String>) -> Self {
        Self {
            engine: engine.into(),
            ..Self::default()
        }
    }
}

pub const GLOBAL_COVERAGE: &str = "Global";

/// Index of the engine's own `CoverageInfo`, falling back to the global
/// slot (index 0) for names that have no slot of their own.
pub fn coverage_index_for(infos: &[CoverageInfo], engine: &str) -> usize {
    infos
        .iter()
        .position(|info| info.engine == engine)
        .unwrap_or(0)
}

/// Average of sqrt(hits) over all functions the given info has seen at least
/// once, truncated to an integer.
pub fn average_sqrt_hits(info: &CoverageInfo) -> u64 {
    let mut total = 0.0f64;
    let mut count = 0u64;
    for func in &info.funcs_info {
        if func.hits > 0 {
            total += (func.hits as f64).sqrt();
            count += 1;
        }
    }
    if count > 0 {
        (total / count as f64) as u64
    } else {
        0
    }
}

/// The value-function list for an engine: functions the engine hits rarely
/// (sqrt(hits) at or below the average), plus every globally-known function the
/// engine has never observed at all. The latter contribute as fully
/// uncovered. Refreshes the info's cached average as a side effect.
pub fn value_funcs_list(infos: &mut [CoverageInfo], engine: &str) -> Vec<FuncInfo> {
    let idx = coverage_index_for(infos, engine);
    let average = average_sqrt_hits(&infos[idx]);
    infos[idx].funcs_average_hits = average;

    let mut value_funcs: Vec<FuncInfo> = infos[idx]
        .funcs_info
        .iter()
        .filter(|func| func.hits > 0 && (func.hits as f64).sqrt() <= average as f64)
        .cloned()
        .collect();

    if idx != 0 {
        for func in &infos[0].funcs_info {
            if !infos[idx].funcs_info.iter().any(|own| own.id == func.id) {
                value_funcs.push(FuncInfo {
                    id: func.id,
                    hits: 0,
                    uncover_size: func.uncover_size + func.covered_size,
                    covered_size: 0,
                });
            }
        }
    }
    value_funcs
}

/// Source files whose coverage is worth steering toward. Runtime support
/// code and system headers are not.
pub fn is_interesting_coverage_file(file_name: &str) -> bool {
    if file_name.contains("compiler-rt/lib/") {
        return false;
    }
    if file_name.contains("/usr/lib/") || file_name.contains("/usr/include/") {
        return false;
    }
    if file_name == "<null>" {
        return false;
    }
    true
}

/// Interface to the coverage instrumentation runtime. The orchestrator
/// replays inputs through the test callback and queries the runtime for the
/// features and PCs the execution touched; it never looks inside counter
/// regions itself.
///
/// All observed-PC enumeration works in stable PC-table indices so the
/// scheduler can hold references without pinning runtime memory.
pub trait CoverageRuntime: Send {
    /// Clear the per-execution counter and value-profile state.
    fn reset_maps(&mut self);

    /// Emit every feature id the last execution produced.
    fn collect_features(&mut self, emit: &mut dyn FnMut(u32));

    /// Fold the last execution's observed PCs into `info`, bumping the
    /// per-function hit counters.
    fn update_observed_pcs(&mut self, info: &mut CoverageInfo);

    /// Visit each PC-table index observed by the last execution.
    fn for_each_current_observed_pc(&mut self, visit: &mut dyn FnMut(usize));

    fn pc_table_entry_by_idx(&self, idx: usize) -> Option<PcTableEntry>;

    fn pc_is_func_entry(&self, idx: usize) -> bool {
        self.pc_table_entry_by_idx(idx)
            .is_some_and(|entry| entry.is_func_entry())
    }

    /// The PC actually inside the function body for a function-entry PC.
    fn next_instruction_pc(&self, pc: u64) -> u64;

    /// Recompute `info.funcs_info` (hit counts, uncovered sizes) from the
    /// PCs and function counters accumulated in `info`.
    fn func_freqs_uncovered_info(&self, info: &mut CoverageInfo);

    /// Source file containing `pc`, for the interesting-coverage filter.
    fn pc_source_file(&self, pc: u64) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn func(id: u64, hits: u64, uncover: usize, covered: usize) -> FuncInfo {
        FuncInfo {
            id,
            hits,
            uncover_size: uncover,
            covered_size: covered,
        }
    }

    #[test]
    fn weight_is_zero_for_unseen_functions() {
        assert_eq!(func(1, 0, 10, 0).weight(5), 0.0);
    }

    #[test]
    fn weight_is_flat_for_fully_covered_functions() {
        assert_eq!(func(1, 100, 0, 12).weight(5), 2.0);
    }

    #[test]
    fn weight_boosts_low_frequency_functions_tenfold() {
        // sqrt(hits) = 2 against an average of 10: below the 0.5 threshold.
        let cold = func(1, 4, 8, 2).weight(10);
        // sqrt(hits) = 9 against the same average: above the threshold.
        let warm = func(2, 81, 8, 2).weight(10);
        assert!(cold > warm, "cold {cold} should outweigh warm {warm}");
        let penalty_cold = 1.0 / (1.0 + (1.0 + 0.2f64).ln());
        assert!((cold - 40.0 * 8.0 * penalty_cold).abs() < 1e-9);
    }

    #[test]
    fn average_sqrt_hits_ignores_unseen_functions() {
        let mut info = CoverageInfo::new(GLOBAL_COVERAGE);
        info.funcs_info = vec![func(1, 16, 0, 4), func(2, 0, 7, 0), func(3, 4, 1, 1)];
        // (4 + 2) / 2
        assert_eq!(average_sqrt_hits(&info), 3);
    }

    #[test]
    fn value_funcs_include_globally_known_but_unobserved_functions() {
        let mut global = CoverageInfo::new(GLOBAL_COVERAGE);
        global.funcs_info = vec![func(1, 100, 2, 8), func(2, 1, 5, 1)];
        let mut engine = CoverageInfo::new("aflplusplus");
        engine.funcs_info = vec![func(1, 100, 2, 8)];
        let mut infos = vec![global, engine];

        let list = value_funcs_list(&mut infos, "aflplusplus");
        // func 1 is the engine's only observed function, so its sqrt(hits) equals
        // the average and it stays; func 2 arrives as fully uncovered.
        assert_eq!(list.len(), 2);
        let unseen = list.iter().find(|f| f.id == 2).expect("func 2 missing");
        assert_eq!(unseen.hits, 0);
        assert_eq!(unseen.uncover_size, 6);
        assert_eq!(unseen.covered_size, 0);
    }

    #[test]
    fn unknown_engine_falls_back_to_global_slot() {
        let mut global = CoverageInfo::new(GLOBAL_COVERAGE);
        global.funcs_info = vec![func(1, 4, 3, 1)];
        let mut infos = vec![global];
        assert_eq!(coverage_index_for(&infos, "no-such-engine"), 0);
        let list = value_funcs_list(&mut infos, "no-such-engine");
        assert_eq!(list.len(), 1);
        assert_eq!(infos[0].funcs_average_hits, 2);
    }

    #[test]
    fn coverage_file_filter_rejects_runtime_and_system_paths() {
        assert!(is_interesting_coverage_file("src/parser.c"));
        assert!(!is_interesting_coverage_file("<null>"));
        assert!(!is_interesting_coverage_file("/usr/include/stdlib.h"));
        assert!(!is_interesting_coverage_file(
            "llvm/compiler-rt/lib/fuzzer/FuzzerLoop.cpp"
        ));
    }
}

#[cfg(test)]
pub(crate) mod test_utils {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Scriptable coverage runtime: maps input bytes to a fixed trace of
    /// features and PC-table indices. The companion callback records the
    /// last executed input so the runtime knows which trace is "current".
    pub struct MockRuntime {
        pub pc_table: Vec<PcTableEntry>,
        pub features: HashMap<Vec<u8>, Vec<u32>>,
        pub pcs: HashMap<Vec<u8>, Vec<usize>>,
        pub func_sizes: HashMap<u64, usize>,
        pub sources: HashMap<u64, String>,
        pub last_input: Arc<Mutex<Vec<u8>>>,
    }

    impl MockRuntime {
        pub fn new(pc_table: Vec<PcTableEntry>, last_input: Arc<Mutex<Vec<u8>>>) -> Self {
            Self {
                pc_table,
                features: HashMap::new(),
                pcs: HashMap::new(),
                func_sizes: HashMap::new(),
                sources: HashMap::new(),
                last_input,
            }
        }

        pub fn script(&mut self, input: &[u8], features: Vec<u32>, pcs: Vec<usize>) {
            self.features.insert(input.to_vec(), features);
            self.pcs.insert(input.to_vec(), pcs);
        }

        /// Function entry PC owning the table entry at `idx`: the nearest
        /// func-entry at or before it, mirroring a linker-ordered table.
        fn func_of(&self, idx: usize) -> Option<u64> {
            self.pc_table[..=idx]
                .iter()
                .rev()
                .find(|entry| entry.is_func_entry())
                .map(|entry| entry.pc + 1)
        }

        fn current(&self) -> Vec<u8> {
            self.last_input.lock().unwrap().clone()
        }
    }

    impl CoverageRuntime for MockRuntime {
        fn reset_maps(&mut self) {}

        fn collect_features(&mut self, emit: &mut dyn FnMut(u32)) {
            if let Some(features) = self.features.get(&self.current()) {
                for &feature in features {
                    emit(feature);
                }
            }
        }

        fn update_observed_pcs(&mut self, info: &mut CoverageInfo) {
            if let Some(pcs) = self.pcs.get(&self.current()) {
                for &idx in pcs {
                    info.observed_pcs.insert(idx);
                    let entry = self.pc_table[idx];
                    if entry.is_func_entry() {
                        *info.observed_funcs.entry(entry.pc + 1).or_insert(0) += 1;
                    }
                }
            }
        }

        fn for_each_current_observed_pc(&mut self, visit: &mut dyn FnMut(usize)) {
            if let Some(pcs) = self.pcs.get(&self.current()) {
                for &idx in pcs {
                    visit(idx);
                }
            }
        }

        fn pc_table_entry_by_idx(&self, idx: usize) -> Option<PcTableEntry> {
            self.pc_table.get(idx).copied()
        }

        fn next_instruction_pc(&self, pc: u64) -> u64 {
            pc + 1
        }

        fn func_freqs_uncovered_info(&self, info: &mut CoverageInfo) {
            let mut covered: HashMap<u64, usize> = HashMap::new();
            for &idx in &info.observed_pcs {
                if let Some(func) = self.func_of(idx) {
                    *covered.entry(func).or_insert(0) += 1;
                }
            }
            info.funcs_info = info
                .observed_funcs
                .iter()
                .map(|(&id, &hits)| {
                    let covered_size = covered.get(&id).copied().unwrap_or(0);
                    let total = self.func_sizes.get(&id).copied().unwrap_or(covered_size);
                    FuncInfo {
                        id,
                        hits,
                        uncover_size: total.saturating_sub(covered_size),
                        covered_size,
                    }
                })
                .collect();
        }

        fn pc_source_file(&self, pc: u64) -> String {
            self.sources
                .get(&pc)
                .cloned()
                .unwrap_or_else(|| "target.c".to_string())
        }
    }

    /// Callback half of the mock: remembers the last input and accepts it.
    pub fn recording_callback(last_input: &Arc<Mutex<Vec<u8>>>) -> TestOneInput {
        let slot = Arc::clone(last_input);
        Box::new(move |data: &[u8]| {
            *slot.lock().unwrap() = data.to_vec();
            0
        })
    }
}
