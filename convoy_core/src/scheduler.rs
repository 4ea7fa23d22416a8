use crate::corpus::CorpusStore;
use crate::coverage::{
    coverage_index_for, is_interesting_coverage_file, value_funcs_list, CoverageInfo,
    CoverageRuntime, FuncInfo,
};
use crate::job::append_event;
use rand_core::RngCore;
use std::collections::HashMap;
use std::path::Path;

/// Jobs per engine that score a fixed warm-up bonus instead of computed
/// feedback.
pub const WARM_UP_JOBS: u64 = 8;

/// Warm-up score awarded per merge during an engine's first jobs.
pub const WARM_UP_SCORE: f64 = 10.0;

/// Exploration constant for the seed-level UCB1 score.
pub const SEED_EXPLORE: f64 = 1.0;

/// Selection state of one external engine.
#[derive(Debug, Clone)]
pub struct EngineStatus {
    pub name: String,
    pub selections: u64,
    /// Cumulative job feedback.
    pub score: f64,
    /// Seconds of fuzzing budget handed to this engine so far.
    pub used_budget: f64,
    pub covered_branches: usize,
}

impl EngineStatus {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            selections: 0,
            score: 0.0,
            used_budget: 0.0,
            covered_branches: 0,
        }
    }

    pub fn find_mut<'a>(
        statuses: &'a mut [EngineStatus],
        name: &str,
    ) -> Option<&'a mut EngineStatus> {
        statuses.iter_mut().find(|status| status.name == name)
    }
}

/// Uniform f64 in [0, 1).
fn next_unit(rng: &mut dyn RngCore) -> f64 {
    (rng.next_u64() >> 11) as f64 / (1u64 << 53) as f64
}

/// UCB1 engine selection. Engines that were never tried are picked first,
/// in listed order; afterwards the UCB1 scores are normalised into a
/// probability vector and sampled. Each UCB1 round dumps every engine's
/// status to the event log.
pub fn pick_engine(
    statuses: &[EngineStatus],
    job_id: u64,
    rng: &mut dyn RngCore,
    event_log: Option<&Path>,
) -> String {
    if statuses.is_empty() {
        return "entropic".to_string();
    }
    if let Some(untried) = statuses.iter().find(|status| status.selections == 0) {
        return untried.name.clone();
    }

    let scores: Vec<f64> = statuses
        .iter()
        .map(|status| {
            status.score / status.selections as f64
                + 2.0 * ((job_id as f64).ln() / status.selections as f64).sqrt()
        })
        .collect();
    let total: f64 = scores.iter().sum();

    for (status, ucb1) in statuses.iter().zip(&scores) {
        let line = format!(
            "\tFuzzerStatus: Name: {}, TotalScore: {}, Selections: {}, UCB1Score: {}, CoveredBranches: {}, UsedBudget: {}",
            status.name,
            status.score,
            status.selections,
            ucb1,
            status.covered_branches,
            status.used_budget
        );
        println!("{line}");
        if let Some(log) = event_log {
            append_event(log, &line);
        }
    }

    if total <= 0.0 {
        let idx = rng.next_u64() as usize % statuses.len();
        return statuses[idx].name.clone();
    }
    let mut roll = next_unit(rng) * total;
    for (status, score) in statuses.iter().zip(&scores) {
        if roll < *score {
            return status.name.clone();
        }
        roll -= score;
    }
    statuses
        .last()
        .map(|status| status.name.clone())
        .unwrap_or_else(|| "entropic".to_string())
}

/// Draw an index in `[0, n)` with probability proportional to `index + 1`,
/// biasing toward the end of a sorted list.
pub fn skew_towards_last(rng: &mut dyn RngCore, n: usize) -> usize {
    debug_assert!(n > 0);
    let total = n * (n + 1) / 2;
    let mut roll = rng.next_u64() as usize % total;
    for idx in 0..n {
        let weight = idx + 1;
        if roll < weight {
            return idx;
        }
        roll -= weight;
    }
    n - 1
}

/// How many seeds a job gets.
pub fn seed_quota(live: usize) -> usize {
    live.min(10 * ((live + 2) as f64).sqrt() as usize)
}

/// Recompute every live seed's energy: the sum of its functions' weights,
/// restricted to functions in interesting source files. A function absent
/// from the value list contributes nothing; a value-list function whose
/// weight collapses to zero (never hit by this engine) falls back to 1000.
pub fn calculate_seed_energy(
    corpus: &mut CorpusStore,
    value_funcs: &[FuncInfo],
    average_hits: u64,
    runtime: &dyn CoverageRuntime,
) {
    let mut weights: HashMap<u64, f64> = HashMap::new();
    for func in value_funcs {
        let weight = func.weight(average_hits);
        weights.insert(func.id, if weight > 0.0 { weight } else { 1000.0 });
    }
    for slot in 0..corpus.len() {
        if !corpus.seed(slot).live {
            continue;
        }
        let mut energy = 0.0;
        for &func in &corpus.seed(slot).seed_funcs {
            if !is_interesting_coverage_file(&runtime.pc_source_file(func)) {
                continue;
            }
            energy += weights.get(&func).copied().unwrap_or(0.0);
        }
        corpus.seed_mut(slot).energy = energy;
    }
}

/// Recompute every live seed's UCB1 score from its energy and selection
/// count. Seeds with few selections are boosted outright instead of relying
/// on the confidence term.
pub fn calculate_seed_scores(corpus: &mut CorpusStore, explore: f64) {
    let mut total_selections = 0u64;
    for slot in 0..corpus.len() {
        if corpus.seed(slot).live {
            total_selections += corpus.seed(slot).selections;
        }
    }
    for slot in 0..corpus.len() {
        let entry = corpus.seed_mut(slot);
        if !entry.live {
            continue;
        }
        entry.ucb1_score = if entry.selections > 3 {
            entry.energy
                + explore * (2.0 * (total_selections as f64).ln() / entry.selections as f64).sqrt()
        } else {
            entry.energy * (5 - entry.selections) as f64
        };
    }
}

/// Select, lock and return up to `quota` seed slots for a job of the given
/// engine.
///
/// Live seeds are scored, sorted ascending, and sampled with the skewed
/// distribution so high scores are preferred; locked seeds are skipped.
/// After `3 * live` fruitless attempts the primary loop gives up, and if
/// fewer than two seeds were collected the quota is filled with
/// unconditional skewed samples (which may lock a seed twice over).
pub fn get_job_seeds(
    corpus: &mut CorpusStore,
    quota: usize,
    engine: &str,
    rng: &mut dyn RngCore,
    coverage: &mut [CoverageInfo],
    runtime: &dyn CoverageRuntime,
    explore: f64,
) -> Vec<usize> {
    let value_funcs = value_funcs_list(coverage, engine);
    let average_hits = coverage[coverage_index_for(coverage, engine)].funcs_average_hits;
    calculate_seed_energy(corpus, &value_funcs, average_hits, runtime);
    calculate_seed_scores(corpus, explore);

    let mut sorted = corpus.live_slots();
    if sorted.is_empty() {
        return Vec::new();
    }
    sorted.sort_by(|&a, &b| {
        corpus
            .seed(a)
            .ucb1_score
            .partial_cmp(&corpus.seed(b).ucb1_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut picked = Vec::new();
    let mut attempts = 0usize;
    while picked.len() < quota {
        attempts += 1;
        if attempts > 3 * sorted.len() {
            break;
        }
        let slot = sorted[skew_towards_last(rng, sorted.len())];
        if corpus.seed(slot).locked {
            continue;
        }
        let entry = corpus.seed_mut(slot);
        entry.selections += 1;
        entry.locked = true;
        picked.push(slot);
    }
    if picked.len() <= 1 {
        log::debug!("seed sampling starved, falling back to unconditional draws");
        for _ in 0..quota {
            let slot = sorted[skew_towards_last(rng, sorted.len())];
            let entry = corpus.seed_mut(slot);
            entry.selections += 1;
            entry.locked = true;
            picked.push(slot);
        }
    }
    picked
}
