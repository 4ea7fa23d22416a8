use crate::engine::JobCommand;
use rand_core::RngCore;
use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Condvar, Mutex};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum JobError {
    #[error("job I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for JobError {
    fn from(err: std::io::Error) -> Self {
        JobError::Io(err.to_string())
    }
}

/// One invocation of one engine on one seed subset for a bounded time.
///
/// Created under the scheduler lock, executed on a worker thread, merged on
/// a detached thread, then dropped; dropping removes the job's scratch
/// files.
#[derive(Debug, Default)]
pub struct FuzzJob {
    pub job_id: u64,
    pub engine_name: String,
    /// Slots of the seeds locked for this job.
    pub seed_slots: Vec<usize>,
    /// (base name, path) of every seed copied into `input_dir`.
    pub seed_files: Vec<(String, PathBuf)>,
    pub budget_secs: u64,
    pub input_dir: PathBuf,
    pub corpus_dir: PathBuf,
    pub features_dir: PathBuf,
    pub log_path: PathBuf,
    /// Novelty-merge control file.
    pub cf_path: PathBuf,
    pub seed_list_path: Option<PathBuf>,
    pub stop_file: PathBuf,
    pub cmd: JobCommand,
    pub exit_code: i32,
    /// PC-table indices first covered by this job.
    pub new_cov: Vec<usize>,
    /// Function entry PCs first covered by this job.
    pub new_funcs: Vec<u64>,
}

impl Drop for FuzzJob {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.cf_path);
        if let Some(list) = &self.seed_list_path {
            let _ = fs::remove_file(list);
        }
        let _ = fs::remove_dir_all(&self.features_dir);
    }
}

/// Run the job's child process to completion, combining its stdout and
/// stderr into the command's output file. A child that cannot be spawned
/// reports exit code 127, which flows through the regular crash taxonomy.
pub fn execute_job(job: &FuzzJob) -> i32 {
    let argv = &job.cmd.argv;
    if argv.is_empty() {
        return 127;
    }
    let mut command = Command::new(&argv[0]);
    command.args(&argv[1..]).stdin(Stdio::null());
    for (key, value) in &job.cmd.env {
        command.env(key, value);
    }
    match &job.cmd.output_file {
        Some(path) => match File::create(path) {
            Ok(out) => {
                let err = out.try_clone().map(Stdio::from).unwrap_or(Stdio::null());
                command.stdout(Stdio::from(out)).stderr(err);
            }
            Err(error) => {
                log::warn!("cannot open job log {}: {error}", path.display());
                command.stdout(Stdio::null()).stderr(Stdio::null());
            }
        },
        None => {
            command.stdout(Stdio::null()).stderr(Stdio::null());
        }
    }
    match command.status() {
        Ok(status) => status.code().unwrap_or(-1),
        Err(error) => {
            log::warn!(
                "failed to spawn engine '{}' for job {}: {error}",
                job.engine_name,
                job.job_id
            );
            127
        }
    }
}

/// Condition-variable guarded FIFO of jobs. A `None` sentinel terminates
/// the consumer.
pub struct JobQueue {
    queue: Mutex<VecDeque<Option<Box<FuzzJob>>>>,
    ready: Condvar,
}

impl JobQueue {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            ready: Condvar::new(),
        }
    }

    pub fn push(&self, job: Option<Box<FuzzJob>>) {
        self.queue.lock().unwrap().push_back(job);
        self.ready.notify_one();
    }

    /// Block until an item is available.
    pub fn pop(&self) -> Option<Box<FuzzJob>> {
        let mut queue = self.queue.lock().unwrap();
        loop {
            if let Some(job) = queue.pop_front() {
                return job;
            }
            queue = self.ready.wait(queue).unwrap();
        }
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Final statistics an engine prints on exit.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FinalStats {
    pub number_of_executed_units: u64,
    pub peak_rss_mb: u64,
    pub average_exec_per_sec: u64,
}

/// Parse `stat::` lines from an engine log. Unreadable logs and unknown
/// keys yield zeros; engines that never print stats are common.
pub fn parse_final_stats(log_path: &Path) -> FinalStats {
    let mut stats = FinalStats::default();
    let Ok(content) = fs::read_to_string(log_path) else {
        return stats;
    };
    for line in content.lines() {
        if !line.starts_with("stat::") {
            continue;
        }
        let mut parts = line.split_whitespace();
        let (Some(name), Some(value)) = (parts.next(), parts.next()) else {
            continue;
        };
        let Ok(value) = value.parse::<u64>() else {
            continue;
        };
        match name {
            "stat::number_of_executed_units:" => stats.number_of_executed_units = value,
            "stat::peak_rss_mb:" => stats.peak_rss_mb = value,
            "stat::average_exec_per_sec:" => stats.average_exec_per_sec = value,
            _ => {}
        }
    }
    stats
}

/// Append one event line to the orchestrator log. The file is reopened per
/// write and failures are swallowed; the log is an audit aid, not state.
pub fn append_event(log_path: &Path, line: &str) {
    if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(log_path) {
        let _ = writeln!(file, "{line}");
    }
}

/// Copy a seed into a job input directory. Refuses missing or empty
/// sources and never overwrites an existing destination.
fn copy_seed(src: &Path, dst: &Path) -> bool {
    let Ok(meta) = fs::metadata(src) else {
        return false;
    };
    if meta.len() == 0 || dst.exists() {
        return false;
    }
    fs::copy(src, dst).is_ok()
}

/// Materialise a job's input directory: copy every selected seed in by its
/// base name, or create two placeholder inputs when the corpus had nothing
/// to offer.
pub fn populate_input_dir(
    input_dir: &Path,
    seed_files: &[(String, PathBuf)],
    rng: &mut dyn RngCore,
) -> Result<(), JobError> {
    if seed_files.is_empty() {
        for i in 0..2 {
            let path = input_dir.join(format!("nullseed{i}"));
            fs::write(&path, format!("0x{}", rng.next_u32()))?;
        }
        return Ok(());
    }
    for (name, src) in seed_files {
        let dst = input_dir.join(name);
        if !copy_seed(src, &dst) {
            log::debug!("skipped seed copy {} -> {}", src.display(), dst.display());
        }
    }
    Ok(())
}

/// Scan an engine log for sanitizer report lines.
pub fn scan_log_for_errors(log_path: &Path) -> Vec<String> {
    let Ok(content) = fs::read_to_string(log_path) else {
        return Vec::new();
    };
    content
        .lines()
        .filter(|line| line.contains("ERROR:") || line.contains("runtime error:"))
        .map(str::to_string)
        .collect()
}

/// Budget for a job: starts short and grows with the job id, capped at an
/// hour.
pub fn job_budget_secs(job_id: u64) -> u64 {
    (job_id * 20).min(3600)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha8Rng;
    use rand_core::SeedableRng;
    use std::sync::Arc;
    use std::thread;
    use tempfile::tempdir;

    #[test]
    fn queue_delivers_jobs_in_order_and_sentinel_terminates() {
        let queue = Arc::new(JobQueue::new());
        let producer = Arc::clone(&queue);
        let handle = thread::spawn(move || {
            for id in 1..=3u64 {
                let mut job = Box::new(FuzzJob::default());
                job.job_id = id;
                producer.push(Some(job));
            }
            producer.push(None);
        });
        let mut seen = Vec::new();
        while let Some(job) = queue.pop() {
            seen.push(job.job_id);
        }
        handle.join().unwrap();
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn final_stats_parser_reads_only_known_keys() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("7.log");
        fs::write(
            &log,
            "INFO: Seed: 12345\n\
             stat::number_of_executed_units: 5000\n\
             stat::peak_rss_mb: 128\n\
             stat::average_exec_per_sec: 250\n\
             stat::unknown_counter: 9\n\
             garbage line\n",
        )
        .unwrap();
        let stats = parse_final_stats(&log);
        assert_eq!(stats.number_of_executed_units, 5000);
        assert_eq!(stats.peak_rss_mb, 128);
        assert_eq!(stats.average_exec_per_sec, 250);
    }

    #[test]
    fn final_stats_parser_tolerates_missing_log() {
        let stats = parse_final_stats(Path::new("/no/such/log"));
        assert_eq!(stats, FinalStats::default());
    }

    #[test]
    fn empty_seed_set_yields_two_placeholder_inputs() {
        let dir = tempdir().unwrap();
        let mut rng = ChaCha8Rng::from_seed([7; 32]);
        populate_input_dir(dir.path(), &[], &mut rng).unwrap();
        let mut names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        assert_eq!(names, vec!["nullseed0", "nullseed1"]);
        let content = fs::read_to_string(dir.path().join("nullseed0")).unwrap();
        assert!(content.starts_with("0x"));
    }

    #[test]
    fn seed_copies_keep_base_names_and_skip_empty_sources() {
        let dir = tempdir().unwrap();
        let corpus = dir.path().join("corpus");
        let input = dir.path().join("I1");
        fs::create_dir_all(&corpus).unwrap();
        fs::create_dir_all(&input).unwrap();
        fs::write(corpus.join("abc123"), b"data").unwrap();
        fs::write(corpus.join("empty"), b"").unwrap();

        let mut rng = ChaCha8Rng::from_seed([1; 32]);
        let seeds = vec![
            ("abc123".to_string(), corpus.join("abc123")),
            ("empty".to_string(), corpus.join("empty")),
            ("missing".to_string(), corpus.join("missing")),
        ];
        populate_input_dir(&input, &seeds, &mut rng).unwrap();
        assert!(input.join("abc123").exists());
        assert!(!input.join("empty").exists());
        assert!(!input.join("missing").exists());
    }

    #[test]
    fn error_scan_finds_sanitizer_lines() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("x.log");
        fs::write(
            &log,
            "all fine\n\
             ==123== ERROR: AddressSanitizer: heap-buffer-overflow\n\
             foo.c:3:1: runtime error: signed integer overflow\n\
             bye\n",
        )
        .unwrap();
        let lines = scan_log_for_errors(&log);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("ERROR:"));
        assert!(lines[1].contains("runtime error:"));
    }

    #[test]
    fn job_budget_grows_then_saturates() {
        assert_eq!(job_budget_secs(1), 20);
        assert_eq!(job_budget_secs(10), 200);
        assert_eq!(job_budget_secs(180), 3600);
        assert_eq!(job_budget_secs(10_000), 3600);
    }

    #[test]
    fn event_log_appends_across_reopens() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("Log.txt");
        append_event(&log, "\tCreateNewJob Done: JobId: 1");
        append_event(&log, "\tMergeJob Done: JobId: 1");
        let content = fs::read_to_string(&log).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("CreateNewJob"));
        assert!(lines[1].contains("MergeJob"));
    }

    #[test]
    fn dropping_a_job_removes_its_scratch_files() {
        let dir = tempdir().unwrap();
        let features_dir = dir.path().join("F9");
        fs::create_dir_all(&features_dir).unwrap();
        let cf_path = dir.path().join("9.merge");
        let seed_list = dir.path().join("9.seeds");
        fs::write(&cf_path, b"").unwrap();
        fs::write(&seed_list, b"a,b").unwrap();
        {
            let mut _job = FuzzJob::default();
            _job.job_id = 9;
            _job.features_dir = features_dir.clone();
            _job.cf_path = cf_path.clone();
            _job.seed_list_path = Some(seed_list.clone());
        }
        assert!(!features_dir.exists());
        assert!(!cf_path.exists());
        assert!(!seed_list.exists());
    }
}
