use serde::Deserialize;
use std::path::PathBuf;

use crate::engine::known_engine;

/// Orchestrator-level knobs: worker count, budgets and shutdown behaviour.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct OrchestratorSettings {
    /// Worker threads, each running one engine child at a time.
    #[serde(default = "default_jobs")]
    pub jobs: usize,
    /// Total fuzzing wall-clock budget in seconds; 0 means unlimited.
    #[serde(default)]
    pub max_total_time_secs: u64,
    /// Total executed-unit budget across all engines.
    #[serde(default = "default_max_runs")]
    pub max_runs: u64,
    /// Skip the bootstrap novelty-merge pass and keep every seed.
    #[serde(default)]
    pub keep_seed: bool,
    /// Keep the bootstrap seed list ordered by input size.
    #[serde(default)]
    pub fork_corpus_groups: bool,
    /// Grace period between the stop signal and the final merge, so engines
    /// can observe the stop file.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
    /// Scratch directory; a process-unique directory under the system temp
    /// dir when absent.
    pub work_dir: Option<PathBuf>,
    /// Event log path; `Log.txt` next to the executable when absent.
    pub event_log: Option<PathBuf>,
}

fn default_jobs() -> usize {
    4
}
fn default_max_runs() -> u64 {
    u64::MAX
}
fn default_shutdown_grace_secs() -> u64 {
    10
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            jobs: default_jobs(),
            max_total_time_secs: 0,
            max_runs: default_max_runs(),
            keep_seed: false,
            fork_corpus_groups: false,
            shutdown_grace_secs: default_shutdown_grace_secs(),
            work_dir: None,
            event_log: None,
        }
    }
}

/// The target under test: its path plus the base argv handed to
/// libFuzzer-family engines (after flag surgery).
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    pub args: Vec<String>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct EnginesConfig {
    pub names: Vec<String>,
}

impl Default for EnginesConfig {
    fn default() -> Self {
        Self {
            names: vec!["entropic".to_string()],
        }
    }
}

/// Exit-code taxonomy for engine children.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct ExitCodes {
    #[serde(default = "default_timeout_exit_code")]
    pub timeout: i32,
    #[serde(default = "default_oom_exit_code")]
    pub oom: i32,
    #[serde(default = "default_interrupt_exit_code")]
    pub interrupt: i32,
    #[serde(default = "default_true")]
    pub ignore_timeouts: bool,
    #[serde(default = "default_true")]
    pub ignore_ooms: bool,
    #[serde(default)]
    pub ignore_crashes: bool,
}

fn default_timeout_exit_code() -> i32 {
    70
}
fn default_oom_exit_code() -> i32 {
    71
}
fn default_interrupt_exit_code() -> i32 {
    72
}
fn default_true() -> bool {
    true
}

impl Default for ExitCodes {
    fn default() -> Self {
        Self {
            timeout: default_timeout_exit_code(),
            oom: default_oom_exit_code(),
            interrupt: default_interrupt_exit_code(),
            ignore_timeouts: true,
            ignore_ooms: true,
            ignore_crashes: false,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct CorpusConfig {
    /// Seed directories; the first doubles as the main corpus directory.
    #[serde(default)]
    pub dirs: Vec<PathBuf>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct ConvoyConfig {
    pub orchestrator: Option<OrchestratorSettings>,
    pub target: TargetConfig,
    #[serde(default)]
    pub engines: EnginesConfig,
    pub exit_codes: Option<ExitCodes>,
    pub corpus: Option<CorpusConfig>,
}

impl ConvoyConfig {
    pub fn load_from_file(path: &PathBuf) -> Result<Self, anyhow::Error> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file at {:?}: {}", path, e))?;

        let config: ConvoyConfig = toml::from_str(&content).map_err(|e| {
            anyhow::anyhow!("Failed to parse TOML from config file {:?}: {}", path, e)
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the orchestrator could only fail on later:
    /// unknown engine names would silently produce jobs whose output is
    /// never assimilated.
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.target.args.is_empty() {
            return Err(anyhow::anyhow!("target.args must name the target binary"));
        }
        for name in &self.engines.names {
            if !known_engine(name) {
                return Err(anyhow::anyhow!("unknown engine '{}' in engines.names", name));
            }
        }
        if let Some(settings) = &self.orchestrator {
            if settings.jobs == 0 {
                return Err(anyhow::anyhow!("orchestrator.jobs must be at least 1"));
            }
        }
        Ok(())
    }

    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        self.orchestrator.clone().unwrap_or_default()
    }

    pub fn exit_codes(&self) -> ExitCodes {
        self.exit_codes.clone().unwrap_or_default()
    }

    pub fn corpus_dirs(&self) -> Vec<PathBuf> {
        self.corpus.as_ref().map(|c| c.dirs.clone()).unwrap_or_default()
    }
}

impl Default for ConvoyConfig {
    fn default() -> Self {
        Self {
            orchestrator: Some(OrchestratorSettings::default()),
            target: TargetConfig {
                args: vec!["./target".to_string()],
            },
            engines: EnginesConfig::default(),
            exit_codes: Some(ExitCodes::default()),
            corpus: Some(CorpusConfig::default()),
        }
    }
}
