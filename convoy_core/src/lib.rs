pub mod config;
pub mod corpus;
pub mod coverage;
pub mod engine;
pub mod job;
pub mod merge;
pub mod orchestrator;
pub mod scheduler;

pub use config::{ConvoyConfig, ExitCodes, OrchestratorSettings};
pub use corpus::{CorpusStore, SeedEntry, FEATURE_SET_SIZE};
pub use coverage::{
    CoverageInfo, CoverageRuntime, FuncInfo, PcTableEntry, TestOneInput, GLOBAL_COVERAGE,
};
pub use engine::{EngineError, EngineRegistry, JobCommand, QueueLayout};
pub use job::{FinalStats, FuzzJob, JobQueue};
pub use merge::{KeepAllMerge, MergeError, MergeOutcome, NoveltyMerge, SizedFile};
pub use orchestrator::{Orchestrator, OrchestratorError};
pub use scheduler::EngineStatus;
