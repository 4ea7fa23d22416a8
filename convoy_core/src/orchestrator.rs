use crate::config::{ConvoyConfig, ExitCodes, OrchestratorSettings};
use crate::corpus::CorpusStore;
use crate::coverage::{
    average_sqrt_hits, coverage_index_for, is_interesting_coverage_file, CoverageInfo,
    CoverageRuntime, TestOneInput, GLOBAL_COVERAGE,
};
use crate::engine::{CommandRequest, EngineRegistry};
use crate::job::{
    append_event, execute_job, job_budget_secs, parse_final_stats, populate_input_dir,
    scan_log_for_errors, FuzzJob, JobQueue,
};
use crate::merge::{sized_files_from_dir, MergeError, NoveltyMerge};
use crate::scheduler::{
    get_job_seeds, pick_engine, seed_quota, EngineStatus, SEED_EXPLORE, WARM_UP_JOBS,
    WARM_UP_SCORE,
};
use rand_chacha::ChaCha8Rng;
use rand_core::SeedableRng;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("orchestrator I/O error: {0}")]
    Io(String),

    #[error(transparent)]
    Engine(#[from] crate::engine::EngineError),

    #[error(transparent)]
    Job(#[from] crate::job::JobError),

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error("worker thread failed to start: {0}")]
    Thread(String),
}

impl From<std::io::Error> for OrchestratorError {
    fn from(err: std::io::Error) -> Self {
        OrchestratorError::Io(err.to_string())
    }
}

/// One engine-produced file on its way into the shared corpus.
#[derive(Debug, Clone)]
pub struct MergeCandidate {
    pub file_path: PathBuf,
    pub size: u64,
    pub features: Vec<u32>,
    pub seed_funcs: Vec<u64>,
    pub seed_pcs: Vec<usize>,
    pub time_of_unit: Duration,
    /// Weight-sum of the candidate's functions; assimilation order key.
    pub sorted_weight: f64,
}

/// How a child's exit code is to be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitDisposition {
    Clean,
    Interrupt,
    IgnoredTimeout,
    IgnoredOom,
    IgnoredCrash,
    FatalCrash,
}

pub fn classify_exit(code: i32, codes: &ExitCodes) -> ExitDisposition {
    if code == codes.interrupt {
        return ExitDisposition::Interrupt;
    }
    if codes.ignore_timeouts && code == codes.timeout {
        return ExitDisposition::IgnoredTimeout;
    }
    if codes.ignore_ooms && code == codes.oom {
        return ExitDisposition::IgnoredOom;
    }
    if code != 0 {
        if codes.ignore_crashes {
            ExitDisposition::IgnoredCrash
        } else {
            ExitDisposition::FatalCrash
        }
    } else {
        ExitDisposition::Clean
    }
}

/// Per-job feedback: the weight-sum over all candidate functions in
/// interesting source files, divided by the number of functions the global
/// map knew about. Functions the map has never seen score a flat 100
/// without counting as contributors. Stamps each candidate's
/// `sorted_weight` along the way.
pub fn job_feedback(
    candidates: &mut [MergeCandidate],
    global: &CoverageInfo,
    runtime: &dyn CoverageRuntime,
) -> f64 {
    let average_hits = average_sqrt_hits(global);
    let weights: HashMap<u64, f64> = global
        .funcs_info
        .iter()
        .map(|func| (func.id, func.weight(average_hits)))
        .collect();
    let mut total = 0.0;
    let mut contributors = 0usize;
    for candidate in candidates.iter_mut() {
        let mut weight = 0.0;
        for func in &candidate.seed_funcs {
            if !is_interesting_coverage_file(&runtime.pc_source_file(*func)) {
                continue;
            }
            match weights.get(func) {
                Some(known) => {
                    total += known;
                    weight += known;
                    contributors += 1;
                }
                None => {
                    total += 100.0;
                    weight += 100.0;
                }
            }
        }
        candidate.sorted_weight = weight;
    }
    if contributors > 0 {
        total / contributors as f64
    } else {
        0.0
    }
}

/// All shared mutable state, guarded by one coarse mutex. Merge-side
/// critical sections are long (they replay inputs through the callback) but
/// rare next to worker-side child waits, and feature ownership must update
/// all at once.
struct World<R> {
    corpus: CorpusStore,
    /// Slot 0 is the global view; one slot per configured engine follows.
    coverage: Vec<CoverageInfo>,
    engines: Vec<EngineStatus>,
    runtime: R,
    callback: TestOneInput,
    rng: ChaCha8Rng,
    /// Feature ids seen at least once.
    features: BTreeSet<u32>,
    /// PC-table indices covered at least once.
    cov: BTreeSet<usize>,
    /// Function entry PCs covered at least once.
    funcs: BTreeSet<u64>,
    num_runs: u64,
    num_timeouts: usize,
    num_ooms: usize,
    num_crashes: usize,
}

struct Inner<R> {
    settings: OrchestratorSettings,
    exit_codes: ExitCodes,
    registry: EngineRegistry,
    corpus_dirs: Vec<PathBuf>,
    world: Mutex<World<R>>,
    merger: Mutex<Box<dyn NoveltyMerge>>,
    fuzz_queue: JobQueue,
    merge_queue: JobQueue,
    next_job_id: AtomicU64,
    temp_dir: PathBuf,
    main_corpus_dir: PathBuf,
    event_log: PathBuf,
    start: Instant,
}

/// The fork-mode ensemble orchestrator: bootstraps the corpus, keeps N
/// engine children busy, and folds their findings back into the shared
/// coverage-indexed corpus.
pub struct Orchestrator<R: CoverageRuntime + 'static> {
    inner: Arc<Inner<R>>,
}

impl<R: CoverageRuntime + 'static> Orchestrator<R> {
    pub fn new(
        config: &ConvoyConfig,
        runtime: R,
        callback: TestOneInput,
        merger: Box<dyn NoveltyMerge>,
    ) -> Result<Self, OrchestratorError> {
        let settings = config.orchestrator_settings();
        let exit_codes = config.exit_codes();
        let corpus_dirs = config.corpus_dirs();

        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."));
        let target_program = Path::new(&config.target.args[0])
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| config.target.args[0].clone());

        let registry = EngineRegistry::new(
            exe_dir.clone(),
            target_program,
            config.target.args.clone(),
            corpus_dirs.clone(),
        );

        let temp_dir = settings.work_dir.clone().unwrap_or_else(|| {
            std::env::temp_dir().join(format!("convoy-{}.dir", process::id()))
        });
        let main_corpus_dir = corpus_dirs
            .first()
            .cloned()
            .unwrap_or_else(|| temp_dir.join("C"));
        let event_log = settings
            .event_log
            .clone()
            .unwrap_or_else(|| exe_dir.join("Log.txt"));

        let mut coverage = vec![CoverageInfo::new(GLOBAL_COVERAGE)];
        let mut engines = Vec::new();
        for name in &config.engines.names {
            coverage.push(CoverageInfo::new(name.clone()));
            engines.push(EngineStatus::new(name.clone()));
        }

        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64;
        let world = World {
            corpus: CorpusStore::new(main_corpus_dir.clone()),
            coverage,
            engines,
            runtime,
            callback,
            rng: ChaCha8Rng::seed_from_u64(nanos ^ u64::from(process::id())),
            features: BTreeSet::new(),
            cov: BTreeSet::new(),
            funcs: BTreeSet::new(),
            num_runs: 0,
            num_timeouts: 0,
            num_ooms: 0,
            num_crashes: 0,
        };

        Ok(Self {
            inner: Arc::new(Inner {
                settings,
                exit_codes,
                registry,
                corpus_dirs,
                world: Mutex::new(world),
                merger: Mutex::new(merger),
                fuzz_queue: JobQueue::new(),
                merge_queue: JobQueue::new(),
                next_job_id: AtomicU64::new(1),
                temp_dir,
                main_corpus_dir,
                event_log,
                start: Instant::now(),
            }),
        })
    }

    /// Run the full orchestration loop. Returns the exit code of the last
    /// child observed at shutdown; the caller owns process exit.
    pub fn run(&self) -> Result<i32, OrchestratorError> {
        let inner = &self.inner;
        let _ = fs::remove_dir_all(&inner.temp_dir);
        fs::create_dir_all(&inner.temp_dir)?;
        let seed_count = inner.bootstrap()?;
        println!(
            "INFO: -fork={}: {} seed inputs, starting to fuzz in {}",
            inner.settings.jobs,
            seed_count,
            inner.temp_dir.display()
        );

        let mut workers = Vec::new();
        for t in 0..inner.settings.jobs {
            let worker = Arc::clone(inner);
            workers.push(
                thread::Builder::new()
                    .name(format!("convoy-worker-{t}"))
                    .spawn(move || worker.worker_loop())
                    .map_err(|err| OrchestratorError::Thread(err.to_string()))?,
            );
        }
        for _ in 0..inner.settings.jobs {
            let job_id = inner.next_job_id.fetch_add(1, Ordering::SeqCst);
            match inner.create_new_job(job_id) {
                Ok(job) => inner.fuzz_queue.push(Some(job)),
                Err(err) => log::warn!("creating job {job_id} failed: {err}"),
            }
        }

        let mut exit_code = 0;
        loop {
            let Some(mut job) = inner.merge_queue.pop() else {
                break;
            };
            exit_code = job.exit_code;
            match classify_exit(exit_code, &inner.exit_codes) {
                ExitDisposition::Interrupt => {
                    println!("INFO: a child was interrupted; exiting");
                    inner.stop_jobs();
                    break;
                }
                ExitDisposition::IgnoredTimeout => {
                    inner.world.lock().unwrap().num_timeouts += 1;
                }
                ExitDisposition::IgnoredOom => {
                    inner.world.lock().unwrap().num_ooms += 1;
                }
                ExitDisposition::IgnoredCrash => {
                    inner.world.lock().unwrap().num_crashes += 1;
                    for line in scan_log_for_errors(&job.log_path) {
                        println!("{line}");
                    }
                }
                ExitDisposition::FatalCrash => {
                    inner.world.lock().unwrap().num_crashes += 1;
                    println!(
                        "INFO: log from the inner process:\n{}",
                        fs::read_to_string(&job.log_path).unwrap_or_default()
                    );
                    inner.stop_jobs();
                    break;
                }
                ExitDisposition::Clean => {}
            }

            if inner.settings.max_total_time_secs > 0
                && inner.seconds_since_start() >= inner.settings.max_total_time_secs
            {
                println!(
                    "INFO: fuzzed for {} seconds, wrapping up soon",
                    inner.seconds_since_start()
                );
                inner.stop_jobs();
                // Give engines a chance to observe the stop file before the
                // final merge collects what they wrote.
                thread::sleep(Duration::from_secs(inner.settings.shutdown_grace_secs));
                inner.run_one_merge_job(&mut job);
                break;
            }
            let num_runs = inner.world.lock().unwrap().num_runs;
            if num_runs >= inner.settings.max_runs {
                println!("INFO: fuzzed for {num_runs} iterations, wrapping up soon");
                inner.stop_jobs();
                break;
            }

            let merger = Arc::clone(inner);
            thread::spawn(move || {
                let mut job = job;
                merger.run_one_merge_job(&mut job);
            });
            let creator = Arc::clone(inner);
            thread::spawn(move || {
                let job_id = creator.next_job_id.fetch_add(1, Ordering::SeqCst);
                match creator.create_new_job(job_id) {
                    Ok(job) => creator.fuzz_queue.push(Some(job)),
                    Err(err) => log::warn!("creating job {job_id} failed: {err}"),
                }
            });
        }

        for worker in workers {
            let _ = worker.join();
        }
        let _ = fs::remove_dir_all(&inner.temp_dir);
        println!(
            "INFO: exiting: {} time: {}s",
            exit_code,
            inner.seconds_since_start()
        );
        Ok(exit_code)
    }
}

impl<R: CoverageRuntime + 'static> Inner<R> {
    fn stop_file(&self) -> PathBuf {
        self.temp_dir.join("STOP")
    }

    fn seconds_since_start(&self) -> u64 {
        self.start.elapsed().as_secs()
    }

    fn worker_loop(&self) {
        while let Some(mut job) = self.fuzz_queue.pop() {
            job.exit_code = execute_job(&job);
            self.merge_queue.push(Some(job));
        }
    }

    /// Signal every worker and the orchestrator to wind down, and tell
    /// running engines to stop via the sentinel file.
    fn stop_jobs(&self) {
        for _ in 0..self.settings.jobs {
            self.fuzz_queue.push(None);
        }
        self.merge_queue.push(None);
        if let Err(err) = fs::write(self.stop_file(), [1u8]) {
            log::warn!("failed to write stop file: {err}");
        }
    }

    /// Enumerate seed files, optionally novelty-merge them, and replay the
    /// survivors to seed the coverage index, corpus and global coverage
    /// view. Returns the number of files replayed.
    fn bootstrap(&self) -> Result<usize, OrchestratorError> {
        fs::create_dir_all(&self.main_corpus_dir)?;
        let mut seed_files = Vec::new();
        for dir in &self.corpus_dirs {
            seed_files.extend(sized_files_from_dir(dir)?);
        }
        seed_files.sort();

        let files: Vec<PathBuf> = if self.settings.keep_seed {
            seed_files.iter().map(|file| file.path.clone()).collect()
        } else {
            let control_file = self.temp_dir.join("merge.txt");
            let (known_features, known_cov) = {
                let world = self.world.lock().unwrap();
                (world.features.clone(), world.cov.clone())
            };
            let outcome = self.merger.lock().unwrap().merge(
                &seed_files,
                &known_features,
                &known_cov,
                &control_file,
            )?;
            let _ = fs::remove_file(&control_file);
            outcome.files
        };

        for path in &files {
            let Ok(bytes) = fs::read(path) else {
                continue;
            };
            if bytes.is_empty() {
                continue;
            }
            self.replay_bootstrap_file(&bytes);
        }
        Ok(files.len())
    }

    /// Replay one bootstrap input exactly the way the merge phase replays a
    /// candidate, against the global coverage view only.
    fn replay_bootstrap_file(&self, bytes: &[u8]) {
        let world = &mut *self.world.lock().unwrap();
        world.runtime.reset_maps();
        let unit_start = Instant::now();
        let result = (world.callback)(bytes);
        let time_of_unit = unit_start.elapsed();
        debug_assert!(result == 0 || result == -1);

        let mut collected = Vec::new();
        world
            .runtime
            .collect_features(&mut |feature| collected.push(feature));
        let updates_before = world.corpus.num_feature_updates();
        let mut owned = Vec::new();
        for &feature in &collected {
            if world
                .corpus
                .add_feature(feature, bytes.len() as u32, &mut world.features)
            {
                owned.push(feature);
            }
            world.corpus.update_feature_frequency(feature);
        }
        let num_new_features = world.corpus.num_feature_updates() - updates_before;
        world.runtime.update_observed_pcs(&mut world.coverage[0]);
        world.runtime.func_freqs_uncovered_info(&mut world.coverage[0]);

        if num_new_features > 0 {
            let file_name = format!("{:x}", md5::compute(bytes));
            let file_path = self.main_corpus_dir.join(&file_name);
            if let Err(err) = fs::write(&file_path, bytes) {
                log::warn!("failed to store bootstrap seed {file_name}: {err}");
            }
            let mut current = Vec::new();
            world
                .runtime
                .for_each_current_observed_pc(&mut |idx| current.push(idx));
            let mut seed_pcs = Vec::new();
            let mut seed_funcs = Vec::new();
            for idx in current {
                seed_pcs.push(idx);
                world.cov.insert(idx);
                if world.runtime.pc_is_func_entry(idx) {
                    if let Some(entry) = world.runtime.pc_table_entry_by_idx(idx) {
                        let func = world.runtime.next_instruction_pc(entry.pc);
                        seed_funcs.push(func);
                        world.funcs.insert(func);
                    }
                }
            }
            world.corpus.add_to_corpus(
                file_name,
                file_path,
                bytes.len() as u32,
                num_new_features,
                time_of_unit,
                owned,
                seed_pcs,
                seed_funcs,
            );
        }
    }

    /// Build the next job: pick an engine, lock a seed subset, materialise
    /// the job directories and compile the engine command.
    fn create_new_job(&self, job_id: u64) -> Result<Box<FuzzJob>, OrchestratorError> {
        let mut job = Box::new(FuzzJob::default());
        job.job_id = job_id;

        {
            let world = &mut *self.world.lock().unwrap();
            let name = pick_engine(
                &world.engines,
                job_id,
                &mut world.rng,
                Some(&self.event_log),
            );
            if let Some(status) = EngineStatus::find_mut(&mut world.engines, &name) {
                status.selections += 1;
            }
            job.engine_name = name;
        }
        job.budget_secs = job_budget_secs(job_id);

        {
            let world = &mut *self.world.lock().unwrap();
            let quota = seed_quota(world.corpus.live_size());
            let slots = get_job_seeds(
                &mut world.corpus,
                quota,
                &job.engine_name,
                &mut world.rng,
                &mut world.coverage,
                &world.runtime,
                SEED_EXPLORE,
            );
            job.seed_files = slots
                .iter()
                .filter(|&&slot| world.corpus.seed(slot).live)
                .map(|&slot| {
                    let entry = world.corpus.seed(slot);
                    (entry.file_name.clone(), entry.file_path.clone())
                })
                .collect();
            job.seed_slots = slots;
        }

        job.log_path = self.temp_dir.join(format!("{job_id}.log"));
        job.corpus_dir = self.temp_dir.join(format!("C{job_id}"));
        job.input_dir = self.temp_dir.join(format!("I{job_id}"));
        job.features_dir = self.temp_dir.join(format!("F{job_id}"));
        job.cf_path = self.temp_dir.join(format!("{job_id}.merge"));
        job.stop_file = self.stop_file();
        for dir in [&job.corpus_dir, &job.features_dir, &job.input_dir] {
            let _ = fs::remove_dir_all(dir);
            fs::create_dir_all(dir)?;
        }
        {
            let world = &mut *self.world.lock().unwrap();
            populate_input_dir(&job.input_dir, &job.seed_files, &mut world.rng)?;
        }

        let seed_paths: Vec<PathBuf> = job
            .seed_files
            .iter()
            .map(|(_, path)| path.clone())
            .collect();
        let built = self.registry.build_command(&CommandRequest {
            engine: &job.engine_name,
            job_id,
            budget_secs: job.budget_secs,
            input_dir: &job.input_dir,
            corpus_dir: &job.corpus_dir,
            features_dir: &job.features_dir,
            stop_file: &job.stop_file,
            log_path: &job.log_path,
            seed_files: &seed_paths,
            temp_dir: &self.temp_dir,
        })?;
        job.cmd = built.cmd;
        job.log_path = built.log_path;
        job.seed_list_path = built.seed_list_path;

        let line = format!(
            "\tCreateNewJob Done: JobId: {}, FuzzerName: {}, JobSeedsNum: {}, JobBudget: {}, JobInput: {}, JobCorpus: {}",
            job_id,
            job.engine_name,
            job.seed_slots.len(),
            job.budget_secs,
            job.input_dir.display(),
            job.corpus_dir.display()
        );
        println!("{line}");
        append_event(&self.event_log, &line);
        log::debug!("job {job_id} command: {}", job.cmd.command_line());
        Ok(job)
    }

    /// Merge one finished job: account its run count, replay its queue
    /// files, assimilate the worthwhile ones into the shared corpus, update
    /// the engine's standing and release the job's seeds.
    fn run_one_merge_job(&self, job: &mut FuzzJob) {
        {
            let mut world = self.world.lock().unwrap();
            let stats = parse_final_stats(&job.log_path);
            world.num_runs += stats.number_of_executed_units;
        }

        let local_files = match self.registry.queue_dir(&job.engine_name, &job.corpus_dir) {
            Some(queue_dir) => sized_files_from_dir(&queue_dir).unwrap_or_default(),
            None => Vec::new(),
        };

        let mut candidates = Vec::new();
        let feedback;
        {
            let world = &mut *self.world.lock().unwrap();
            let engine_idx = coverage_index_for(&world.coverage, &job.engine_name);
            for file in &local_files {
                if file.size == 0 {
                    continue;
                }
                let Ok(bytes) = fs::read(&file.path) else {
                    continue;
                };
                world.runtime.reset_maps();
                let unit_start = Instant::now();
                let result = (world.callback)(&bytes);
                let time_of_unit = unit_start.elapsed();
                debug_assert!(result == 0 || result == -1);

                let mut features = Vec::new();
                world
                    .runtime
                    .collect_features(&mut |feature| features.push(feature));
                world
                    .runtime
                    .update_observed_pcs(&mut world.coverage[engine_idx]);
                if engine_idx != 0 {
                    world.runtime.update_observed_pcs(&mut world.coverage[0]);
                }

                let mut current = Vec::new();
                world
                    .runtime
                    .for_each_current_observed_pc(&mut |idx| current.push(idx));
                let mut seed_pcs = Vec::new();
                let mut seed_funcs = Vec::new();
                for idx in current {
                    seed_pcs.push(idx);
                    if world.runtime.pc_is_func_entry(idx) {
                        if let Some(entry) = world.runtime.pc_table_entry_by_idx(idx) {
                            let func = world.runtime.next_instruction_pc(entry.pc);
                            seed_funcs.push(func);
                            if world.funcs.insert(func) {
                                job.new_funcs.push(func);
                            }
                        }
                    }
                    if world.cov.insert(idx) {
                        job.new_cov.push(idx);
                    }
                }
                candidates.push(MergeCandidate {
                    file_path: file.path.clone(),
                    size: file.size,
                    features,
                    seed_funcs,
                    seed_pcs,
                    time_of_unit,
                    sorted_weight: 0.0,
                });
            }
            world.runtime.func_freqs_uncovered_info(&mut world.coverage[0]);
            if engine_idx != 0 {
                world
                    .runtime
                    .func_freqs_uncovered_info(&mut world.coverage[engine_idx]);
            }
            feedback = job_feedback(&mut candidates, &world.coverage[0], &world.runtime);
        }

        candidates.sort_by(|a, b| {
            b.sorted_weight
                .partial_cmp(&a.sorted_weight)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        {
            let world = &mut *self.world.lock().unwrap();
            for candidate in &candidates {
                let Ok(bytes) = fs::read(&candidate.file_path) else {
                    continue;
                };
                let file_name = format!("{:x}", md5::compute(&bytes));
                let file_path = self.main_corpus_dir.join(&file_name);
                let updates_before = world.corpus.num_feature_updates();
                let mut owned = Vec::new();
                for &feature in &candidate.features {
                    if world
                        .corpus
                        .add_feature(feature, candidate.size as u32, &mut world.features)
                    {
                        owned.push(feature);
                    }
                    world.corpus.update_feature_frequency(feature);
                }
                let num_new_features = world.corpus.num_feature_updates() - updates_before;
                if num_new_features > 0 {
                    if let Err(err) = fs::write(&file_path, &bytes) {
                        log::warn!("failed to store corpus file {file_name}: {err}");
                    }
                    world.corpus.add_to_corpus(
                        file_name,
                        file_path,
                        candidate.size as u32,
                        num_new_features,
                        candidate.time_of_unit,
                        owned,
                        candidate.seed_pcs.clone(),
                        candidate.seed_funcs.clone(),
                    );
                }
            }
        }

        {
            let world = &mut *self.world.lock().unwrap();
            if let Some(status) = EngineStatus::find_mut(&mut world.engines, &job.engine_name) {
                if status.selections <= WARM_UP_JOBS {
                    status.score += WARM_UP_SCORE;
                } else {
                    status.score += feedback;
                }
                status.covered_branches += job.new_cov.len();
                status.used_budget += job.budget_secs as f64;
            }
            world.corpus.unlock(&job.seed_slots);

            let line = format!(
                "\tMergeJob Done: JobId: {}, FuzzerName: {}, JobFeedback: {}, NumRuns: {}, Cov: {}, Features: {}, Seeds: {}",
                job.job_id,
                job.engine_name,
                feedback,
                world.num_runs,
                world.cov.len(),
                world.features.len(),
                world.corpus.live_size()
            );
            println!("{line}");
            append_event(&self.event_log, &line);

            for &idx in &job.new_cov {
                if world.runtime.pc_is_func_entry(idx) {
                    if let Some(entry) = world.runtime.pc_table_entry_by_idx(idx) {
                        let func = world.runtime.next_instruction_pc(entry.pc);
                        println!(
                            "  NEW_FUNC: {:#x} {}",
                            func,
                            world.runtime.pc_source_file(func)
                        );
                    }
                }
            }
        }
    }
}
