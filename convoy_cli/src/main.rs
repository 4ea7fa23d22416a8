use clap::Parser;
use convoy_core::config::{ConvoyConfig, CorpusConfig, EnginesConfig};
use convoy_core::coverage::{CoverageInfo, CoverageRuntime, FuncInfo, PcTableEntry, TestOneInput};
use convoy_core::merge::KeepAllMerge;
use convoy_core::orchestrator::Orchestrator;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[clap(short, long, value_parser)]
    config_file: Option<PathBuf>,
    /// Number of worker slots (overrides the config file).
    #[clap(short, long)]
    jobs: Option<usize>,
    /// Wall-clock budget in seconds (overrides the config file).
    #[clap(long)]
    max_total_time: Option<u64>,
    /// Executed-unit budget (overrides the config file).
    #[clap(long)]
    max_runs: Option<u64>,
    /// Comma-separated engine names (overrides the config file).
    #[clap(long, value_delimiter = ',')]
    engines: Option<Vec<String>>,
    /// Seed corpus directories (overrides the config file).
    #[clap(long)]
    corpus: Option<Vec<PathBuf>>,
}

/// Demonstration coverage runtime: derives a synthetic PC trace and feature
/// set from the input bytes, so the scheduler has something to steer by
/// without linked-in instrumentation. Every eighth PC-table entry is a
/// function entry.
struct DemoRuntime {
    pc_table: Vec<PcTableEntry>,
    last_input: Arc<Mutex<Vec<u8>>>,
}

const DEMO_PCS: usize = 64;
const DEMO_FUNC_SPAN: usize = 8;

impl DemoRuntime {
    fn new(last_input: Arc<Mutex<Vec<u8>>>) -> Self {
        let pc_table = (0..DEMO_PCS)
            .map(|idx| PcTableEntry {
                pc: 0x4000 + (idx as u64) * 8,
                flags: u64::from(idx % DEMO_FUNC_SPAN == 0),
            })
            .collect();
        Self {
            pc_table,
            last_input,
        }
    }

    fn trace(&self) -> Vec<usize> {
        let input = self.last_input.lock().unwrap().clone();
        let mut pcs: Vec<usize> = input
            .iter()
            .map(|&byte| byte as usize % DEMO_PCS)
            .collect();
        pcs.sort_unstable();
        pcs.dedup();
        pcs
    }

    fn func_of(&self, idx: usize) -> u64 {
        self.pc_table[idx - idx % DEMO_FUNC_SPAN].pc + 1
    }
}

impl CoverageRuntime for DemoRuntime {
    fn reset_maps(&mut self) {}

    fn collect_features(&mut self, emit: &mut dyn FnMut(u32)) {
        let input = self.last_input.lock().unwrap().clone();
        for window in input.windows(2) {
            emit(((u32::from(window[0]) << 8) | u32::from(window[1])) % (1 << 21));
        }
        if let Some(&first) = input.first() {
            emit(u32::from(first));
        }
    }

    fn update_observed_pcs(&mut self, info: &mut CoverageInfo) {
        for idx in self.trace() {
            info.observed_pcs.insert(idx);
            if self.pc_table[idx].is_func_entry() {
                let func = self.func_of(idx);
                *info.observed_funcs.entry(func).or_insert(0) += 1;
            }
        }
    }

    fn for_each_current_observed_pc(&mut self, visit: &mut dyn FnMut(usize)) {
        for idx in self.trace() {
            visit(idx);
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
            *covered.entry(self.func_of(idx)).or_insert(0) += 1;
        }
        info.funcs_info = info
            .observed_funcs
            .iter()
            .map(|(&id, &hits)| {
                let covered_size = covered.get(&id).copied().unwrap_or(0);
                FuncInfo {
                    id,
                    hits,
                    uncover_size: DEMO_FUNC_SPAN.saturating_sub(covered_size),
                    covered_size,
                }
            })
            .collect();
    }

    fn pc_source_file(&self, _pc: u64) -> String {
        "demo_target.c".to_string()
    }
}

/// Demonstration harness: records the input for the runtime and rejects
/// inputs led by 0xFF, the way a parser would reject a bad magic number.
fn demo_callback(last_input: &Arc<Mutex<Vec<u8>>>) -> TestOneInput {
    let slot = Arc::clone(last_input);
    Box::new(move |data: &[u8]| {
        *slot.lock().unwrap() = data.to_vec();
        if data.first() == Some(&0xFF) {
            -1
        } else {
            0
        }
    })
}

fn main() -> Result<(), anyhow::Error> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = match cli.config_file {
        Some(config_path) => {
            println!("Loading configuration from specified path: {config_path:?}");
            ConvoyConfig::load_from_file(&config_path)?
        }
        None => {
            let default_config_path = PathBuf::from("config.toml");
            if default_config_path.exists() {
                println!(
                    "No config file specified via CLI, loading default: {default_config_path:?}"
                );
                ConvoyConfig::load_from_file(&default_config_path)?
            } else {
                println!(
                    "No config file specified and default 'config.toml' not found, using built-in defaults."
                );
                ConvoyConfig::default()
            }
        }
    };

    let settings = config.orchestrator.get_or_insert_with(Default::default);
    if let Some(jobs) = cli.jobs {
        settings.jobs = jobs;
    }
    if let Some(max_total_time) = cli.max_total_time {
        settings.max_total_time_secs = max_total_time;
    }
    if let Some(max_runs) = cli.max_runs {
        settings.max_runs = max_runs;
    }
    if let Some(engines) = cli.engines {
        config.engines = EnginesConfig { names: engines };
    }
    if let Some(corpus_dirs) = cli.corpus {
        config.corpus = Some(CorpusConfig { dirs: corpus_dirs });
    }
    config.validate()?;

    println!("Effective configuration: {config:#?}");

    let last_input = Arc::new(Mutex::new(Vec::new()));
    let runtime = DemoRuntime::new(Arc::clone(&last_input));
    let callback = demo_callback(&last_input);

    let orchestrator = Orchestrator::new(&config, runtime, callback, Box::new(KeepAllMerge))?;
    let exit_code = orchestrator.run()?;
    std::process::exit(exit_code);
}
