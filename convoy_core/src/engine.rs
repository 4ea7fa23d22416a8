use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("unknown engine '{0}'")]
    UnknownEngine(String),

    #[error("engine I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Io(err.to_string())
    }
}

/// Where an engine writes the inputs it considers interesting, relative to
/// the job's corpus directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueLayout {
    /// Directly into `<corpus_dir>`.
    CorpusDir,
    /// Into `<corpus_dir>/default/queue`.
    DefaultQueue,
    /// Into `<corpus_dir>/queue`.
    Queue,
}

impl QueueLayout {
    pub fn queue_dir(&self, corpus_dir: &Path) -> PathBuf {
        match self {
            QueueLayout::CorpusDir => corpus_dir.to_path_buf(),
            QueueLayout::DefaultQueue => corpus_dir.join("default").join("queue"),
            QueueLayout::Queue => corpus_dir.join("queue"),
        }
    }
}

/// How a command line is assembled for an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineFamily {
    /// In-process libFuzzer-style runners driven by `-flag=value` options.
    LibFuzzer,
    /// afl-fuzz derivatives driven by `-i <in> -o <out>`.
    Afl,
    Honggfuzz,
    Ankou,
}

/// One engine as data: an argv template plus the tags that drive command
/// assembly and queue discovery. Cmplog and dictionary extras are baked
/// into the template at registry construction.
#[derive(Debug, Clone)]
pub struct EngineSpec {
    pub family: EngineFamily,
    pub layout: Option<QueueLayout>,
    /// Full argv template for externally-launched families; libFuzzer-family
    /// engines start from the caller's own argv instead.
    pub argv: Vec<String>,
    /// Additional `-k=v` flags (libFuzzer family only).
    pub extra_flags: Vec<(&'static str, &'static str)>,
    /// Replace argv[0] with `<exe_dir>/<engine>/<target>` (libFuzzer family).
    pub own_binary: bool,
    /// Append `-V <budget>` (AFL family; aflfast and aflgo refuse it).
    pub budget_flag: bool,
}

/// A fully assembled child-process invocation: argv, environment overrides
/// and the file receiving the child's combined stdout+stderr.
#[derive(Debug, Clone, Default)]
pub struct JobCommand {
    pub argv: Vec<String>,
    pub env: Vec<(String, String)>,
    pub output_file: Option<PathBuf>,
}

impl JobCommand {
    pub fn new(argv: Vec<String>) -> Self {
        Self {
            argv,
            env: Vec::new(),
            output_file: None,
        }
    }

    /// Drop every `-name=value` occurrence of the flag.
    pub fn remove_flag(&mut self, name: &str) {
        let prefix = format!("-{name}=");
        self.argv.retain(|arg| !arg.starts_with(&prefix));
    }

    pub fn add_flag(&mut self, name: &str, value: &str) {
        self.argv.push(format!("-{name}={value}"));
    }

    pub fn remove_argument(&mut self, arg: &str) {
        self.argv.retain(|a| a != arg);
    }

    pub fn add_argument(&mut self, arg: impl Into<String>) {
        self.argv.push(arg.into());
    }

    pub fn set_output_file(&mut self, path: PathBuf) {
        self.output_file = Some(path);
    }

    pub fn command_line(&self) -> String {
        self.argv.join(" ")
    }
}

/// Everything command assembly needs to know about one job.
pub struct CommandRequest<'a> {
    pub engine: &'a str,
    pub job_id: u64,
    pub budget_secs: u64,
    pub input_dir: &'a Path,
    pub corpus_dir: &'a Path,
    pub features_dir: &'a Path,
    pub stop_file: &'a Path,
    /// Default log target (`<tempdir>/<id>.log`).
    pub log_path: &'a Path,
    pub seed_files: &'a [PathBuf],
    pub temp_dir: &'a Path,
}

/// Assembly result. `log_path` is wherever the command actually redirects
/// to, so the stats parser reads the right file.
#[derive(Debug)]
pub struct BuiltCommand {
    pub cmd: JobCommand,
    pub log_path: PathBuf,
    pub seed_list_path: Option<PathBuf>,
}

const ENGINE_NAMES: &[&str] = &[
    "libfuzzer",
    "entropic",
    "wingfuzz",
    "honggfuzz",
    "aflplusplus",
    "symcc",
    "radamsa",
    "mopt",
    "lafintel",
    "redqueen",
    "hastefuzz",
    "afl",
    "aflfast",
    "aflgo",
    "fairfuzz",
    "darwin",
    "ecofuzz",
    "fafuzz",
    "moptbk",
    "weizz",
    "ankou",
];

pub fn known_engine(name: &str) -> bool {
    ENGINE_NAMES.contains(&name)
}

/// Static mapping from engine name to its command template and queue
/// convention, resolved against the orchestrator's executable directory.
pub struct EngineRegistry {
    exe_dir: PathBuf,
    target_program: String,
    /// The orchestrator's own argv, reused by libFuzzer-family engines.
    base_args: Vec<String>,
    /// Caller corpus directories, stripped from libFuzzer-family argv.
    corpus_dirs: Vec<PathBuf>,
    specs: HashMap<&'static str, EngineSpec>,
}

impl EngineRegistry {
    pub fn new(
        exe_dir: PathBuf,
        target_program: String,
        base_args: Vec<String>,
        corpus_dirs: Vec<PathBuf>,
    ) -> Self {
        let mut specs = HashMap::new();
        for &name in ENGINE_NAMES {
            specs.insert(name, Self::spec_for(name, &exe_dir, &target_program));
        }
        Self {
            exe_dir,
            target_program,
            base_args,
            corpus_dirs,
            specs,
        }
    }

    pub fn is_known(&self, name: &str) -> bool {
        self.specs.contains_key(name)
    }

    /// The directory this engine's queue ends up in, or `None` for engines
    /// without a known layout (no candidates will be assimilated).
    pub fn queue_dir(&self, engine: &str, corpus_dir: &Path) -> Option<PathBuf> {
        match self.specs.get(engine).and_then(|spec| spec.layout) {
            Some(layout) => Some(layout.queue_dir(corpus_dir)),
            None => {
                log::warn!("unknown queue layout for engine '{engine}'");
                None
            }
        }
    }

    fn tool(exe_dir: &Path, engine: &str, binary: &str) -> String {
        exe_dir.join(engine).join(binary).display().to_string()
    }

    fn cmplog(exe_dir: &Path, engine: &str, target: &str) -> String {
        exe_dir
            .join(engine)
            .join("cmplog")
            .join(target)
            .display()
            .to_string()
    }

    fn spec_for(name: &str, exe: &Path, target: &str) -> EngineSpec {
        use EngineFamily::*;
        use QueueLayout::*;
        let afl = |argv: Vec<String>, layout, budget_flag| EngineSpec {
            family: Afl,
            layout: Some(layout),
            argv,
            extra_flags: Vec::new(),
            own_binary: false,
            budget_flag,
        };
        let libfuzzer = |extra_flags, own_binary| EngineSpec {
            family: LibFuzzer,
            layout: Some(CorpusDir),
            argv: Vec::new(),
            extra_flags,
            own_binary,
            budget_flag: false,
        };
        let strs = |args: &[&str]| args.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let plusplus = |engine: &str, extra: &[&str]| {
            let mut argv = vec![
                Self::tool(exe, engine, "afl-fuzz"),
                "-p".into(),
                "explore".into(),
                "-t".into(),
                "1000+".into(),
            ];
            argv.extend(strs(extra));
            argv
        };
        match name {
            "libfuzzer" => libfuzzer(vec![], true),
            "entropic" => libfuzzer(vec![("entropic", "1")], false),
            "wingfuzz" => libfuzzer(vec![], true),
            "honggfuzz" => EngineSpec {
                family: Honggfuzz,
                layout: Some(CorpusDir),
                argv: vec![
                    Self::tool(exe, "honggfuzz", "honggfuzz"),
                    "--persistent".into(),
                    "--rlimit_rss".into(),
                    "2048".into(),
                    "--sanitizers_del_report=true".into(),
                    "--".into(),
                ],
                extra_flags: Vec::new(),
                own_binary: false,
                budget_flag: false,
            },
            "ankou" => EngineSpec {
                family: Ankou,
                // No published queue convention; nothing is assimilated.
                layout: None,
                argv: vec![
                    Self::tool(exe, "ankou", "ankou"),
                    "-args".into(),
                    "'@@'".into(),
                    "-select".into(),
                    "WMO".into(),
                    "-app".into(),
                ],
                extra_flags: Vec::new(),
                own_binary: false,
                budget_flag: false,
            },
            "aflplusplus" => afl(
                plusplus(
                    "aflplusplus",
                    &["-L", "-1", "-c", &Self::cmplog(exe, "aflplusplus", target), "-l", "2AT"],
                ),
                DefaultQueue,
                true,
            ),
            "symcc" => afl(
                plusplus(
                    "symcc",
                    &["-L", "-1", "-c", &Self::cmplog(exe, "aflplusplus", target), "-l", "2AT"],
                ),
                DefaultQueue,
                true,
            ),
            "redqueen" => afl(
                plusplus(
                    "aflplusplus",
                    &["-c", &Self::cmplog(exe, "aflplusplus", target), "-l", "1AT"],
                ),
                DefaultQueue,
                true,
            ),
            "lafintel" => afl(
                plusplus("aflplusplus", &["-l", "2AT"]),
                DefaultQueue,
                true,
            ),
            "mopt" => afl(
                plusplus(
                    "aflplusplus",
                    &["-L", "0", "-c", &Self::cmplog(exe, "aflplusplus", target), "-l", "2AT"],
                ),
                DefaultQueue,
                true,
            ),
            "radamsa" => afl(
                plusplus(
                    "radamsa",
                    &["-L", "-1", "-c", &Self::cmplog(exe, "aflplusplus", target), "-l", "2AT"],
                ),
                DefaultQueue,
                true,
            ),
            "hastefuzz" => afl(
                vec![
                    Self::tool(exe, "hastefuzz", "afl-fuzz"),
                    "-p".into(),
                    "fast".into(),
                    "-L".into(),
                    "0".into(),
                    "-t".into(),
                    "1000+".into(),
                    "-x".into(),
                    Self::tool(exe, "hastefuzz", "afl++.dict"),
                    "-c".into(),
                    Self::cmplog(exe, "hastefuzz", target),
                    "-l".into(),
                    "2".into(),
                    "-u".into(),
                    "0".into(),
                ],
                DefaultQueue,
                true,
            ),
            "afl" => afl(
                {
                    let mut argv = vec![Self::tool(exe, "afl", "afl-fuzz")];
                    argv.extend(strs(&["-m", "none", "-t", "1000+", "-d", "--"]));
                    argv
                },
                Queue,
                true,
            ),
            "aflgo" => afl(
                {
                    let mut argv = vec![Self::tool(exe, "aflgo", "afl-fuzz")];
                    argv.extend(strs(&["-m", "none", "-z", "exp", "-c", "45m", "-t", "1000+"]));
                    argv
                },
                Queue,
                false,
            ),
            "aflfast" => afl(
                {
                    let mut argv = vec![Self::tool(exe, "aflfast", "afl-fuzz")];
                    argv.extend(strs(&["-m", "none", "-d", "-t", "1000+"]));
                    argv
                },
                Queue,
                false,
            ),
            "fairfuzz" => afl(
                {
                    let mut argv = vec![Self::tool(exe, "fairfuzz", "afl-fuzz")];
                    argv.extend(strs(&["-m", "none", "-d", "-t", "1000+"]));
                    argv
                },
                Queue,
                true,
            ),
            "darwin" => afl(
                {
                    let mut argv = vec![Self::tool(exe, "darwin", "afl-fuzz")];
                    argv.extend(strs(&["-m", "none", "-t", "1000+"]));
                    argv
                },
                Queue,
                true,
            ),
            "ecofuzz" => afl(
                {
                    let mut argv = vec![Self::tool(exe, "ecofuzz", "afl-fuzz")];
                    argv.extend(strs(&["-m", "none", "-t", "1000+", "-d"]));
                    argv
                },
                Queue,
                true,
            ),
            "fafuzz" => afl(
                {
                    let mut argv = vec![Self::tool(exe, "fafuzz", "afl-fuzz")];
                    argv.extend(strs(&["-m", "none", "-t", "1000+", "-d"]));
                    argv
                },
                Queue,
                true,
            ),
            "moptbk" => afl(
                {
                    let mut argv = vec![Self::tool(exe, "mopt", "afl-fuzz")];
                    argv.extend(strs(&["-m", "none", "-d", "-t", "1000+", "-L", "0"]));
                    argv
                },
                Queue,
                true,
            ),
            "weizz" => afl(
                {
                    let mut argv = vec![Self::tool(exe, "weizz", "weizz")];
                    argv.extend(strs(&["-m", "none", "-d", "-t", "1000+", "-F", "-c", "-A"]));
                    argv
                },
                Queue,
                true,
            ),
            other => unreachable!("no spec for engine '{other}'"),
        }
    }

    /// Assemble the child command for one job by applying the engine's
    /// template to the request.
    pub fn build_command(&self, req: &CommandRequest) -> Result<BuiltCommand, EngineError> {
        let spec = self
            .specs
            .get(req.engine)
            .ok_or_else(|| EngineError::UnknownEngine(req.engine.to_string()))?;
        let target_path = Self::tool(&self.exe_dir, req.engine, &self.target_program);
        match spec.family {
            EngineFamily::LibFuzzer => self.build_libfuzzer(spec, req, target_path),
            EngineFamily::Afl => Ok(self.build_afl(spec, req, target_path)),
            EngineFamily::Honggfuzz => Ok(self.build_honggfuzz(spec, req, target_path)),
            EngineFamily::Ankou => Ok(self.build_ankou(spec, req, target_path)),
        }
    }

    fn build_libfuzzer(
        &self,
        spec: &EngineSpec,
        req: &CommandRequest,
        target_path: String,
    ) -> Result<BuiltCommand, EngineError> {
        let mut cmd = JobCommand::new(self.base_args.clone());
        if spec.own_binary && !cmd.argv.is_empty() {
            cmd.argv[0] = target_path;
        }
        cmd.remove_flag("fork");
        cmd.remove_flag("runs");
        for dir in &self.corpus_dirs {
            cmd.remove_argument(&dir.display().to_string());
        }
        cmd.add_flag("reload", "0");
        cmd.add_flag("print_final_stats", "1");
        cmd.add_flag("verbosity", "2");
        cmd.add_flag("print_funcs", "0");
        cmd.add_flag("max_total_time", &req.budget_secs.to_string());
        cmd.add_flag("stop_file", &req.stop_file.display().to_string());
        for (name, value) in &spec.extra_flags {
            cmd.add_flag(name, value);
        }

        let mut seed_list_path = None;
        if !req.seed_files.is_empty() {
            let joined = req
                .seed_files
                .iter()
                .map(|path| path.display().to_string())
                .collect::<Vec<_>>()
                .join(",");
            let list_path = req.temp_dir.join(format!("{}.seeds", req.job_id));
            fs::write(&list_path, joined)?;
            cmd.add_flag("seed_inputs", &format!("@{}", list_path.display()));
            seed_list_path = Some(list_path);
        }

        let output = req.corpus_dir.join("output");
        let crash = req.corpus_dir.join("crash");
        fs::create_dir_all(&output)?;
        fs::create_dir_all(&crash)?;
        cmd.add_argument(output.display().to_string());
        cmd.add_argument(format!("-artifact_prefix={}/", crash.display()));
        cmd.add_flag("features_dir", &req.features_dir.display().to_string());

        let log_path = req.corpus_dir.join("libfuzzer.log");
        cmd.set_output_file(log_path.clone());
        Ok(BuiltCommand {
            cmd,
            log_path,
            seed_list_path,
        })
    }

    fn build_afl(
        &self,
        spec: &EngineSpec,
        req: &CommandRequest,
        target_path: String,
    ) -> BuiltCommand {
        let mut argv = spec.argv.clone();
        let mut head = vec![
            "-i".to_string(),
            req.input_dir.display().to_string(),
            "-o".to_string(),
            req.corpus_dir.display().to_string(),
        ];
        if spec.budget_flag {
            head.push("-V".to_string());
            head.push(req.budget_secs.to_string());
        }
        argv.splice(1..1, head);
        argv.push(target_path);
        argv.push("2147483647".to_string());
        let mut cmd = JobCommand::new(argv);
        cmd.set_output_file(req.log_path.to_path_buf());
        BuiltCommand {
            cmd,
            log_path: req.log_path.to_path_buf(),
            seed_list_path: None,
        }
    }

    fn build_honggfuzz(
        &self,
        spec: &EngineSpec,
        req: &CommandRequest,
        target_path: String,
    ) -> BuiltCommand {
        let mut argv = spec.argv.clone();
        argv.splice(
            1..1,
            vec![
                "-f".to_string(),
                req.input_dir.display().to_string(),
                "-W".to_string(),
                req.corpus_dir.display().to_string(),
                "--run_time".to_string(),
                req.budget_secs.to_string(),
            ],
        );
        argv.push(target_path);
        let mut cmd = JobCommand::new(argv);
        cmd.set_output_file(req.log_path.to_path_buf());
        BuiltCommand {
            cmd,
            log_path: req.log_path.to_path_buf(),
            seed_list_path: None,
        }
    }

    fn build_ankou(
        &self,
        spec: &EngineSpec,
        req: &CommandRequest,
        target_path: String,
    ) -> BuiltCommand {
        let mut argv = spec.argv.clone();
        argv.splice(
            1..1,
            vec![
                "-i".to_string(),
                req.input_dir.display().to_string(),
                "-o".to_string(),
                req.corpus_dir.display().to_string(),
                "-dur".to_string(),
                req.budget_secs.to_string(),
            ],
        );
        argv.push(target_path);
        let mut cmd = JobCommand::new(argv);
        cmd.set_output_file(req.log_path.to_path_buf());
        BuiltCommand {
            cmd,
            log_path: req.log_path.to_path_buf(),
            seed_list_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn registry(base_args: Vec<String>, corpus_dirs: Vec<PathBuf>) -> EngineRegistry {
        EngineRegistry::new(
            PathBuf::from("/opt/bank"),
            "target_app".to_string(),
            base_args,
            corpus_dirs,
        )
    }

    fn request<'a>(
        engine: &'a str,
        dirs: &'a (PathBuf, PathBuf, PathBuf, PathBuf, PathBuf),
        seeds: &'a [PathBuf],
    ) -> CommandRequest<'a> {
        CommandRequest {
            engine,
            job_id: 3,
            budget_secs: 60,
            input_dir: &dirs.0,
            corpus_dir: &dirs.1,
            features_dir: &dirs.2,
            stop_file: &dirs.3,
            log_path: &dirs.4,
            seed_files: seeds,
            temp_dir: dirs.3.parent().unwrap(),
        }
    }

    fn job_dirs(root: &Path) -> (PathBuf, PathBuf, PathBuf, PathBuf, PathBuf) {
        let dirs = (
            root.join("I3"),
            root.join("C3"),
            root.join("F3"),
            root.join("STOP"),
            root.join("3.log"),
        );
        fs::create_dir_all(&dirs.0).unwrap();
        fs::create_dir_all(&dirs.1).unwrap();
        fs::create_dir_all(&dirs.2).unwrap();
        dirs
    }

    #[test]
    fn queue_layouts_match_engine_conventions() {
        let reg = registry(vec![], vec![]);
        let corpus = PathBuf::from("/tmp/work/C7");
        for name in ["libfuzzer", "entropic", "wingfuzz", "honggfuzz"] {
            assert_eq!(reg.queue_dir(name, &corpus), Some(corpus.clone()), "{name}");
        }
        for name in [
            "aflplusplus",
            "symcc",
            "radamsa",
            "mopt",
            "lafintel",
            "redqueen",
            "hastefuzz",
        ] {
            assert_eq!(
                reg.queue_dir(name, &corpus),
                Some(corpus.join("default").join("queue")),
                "{name}"
            );
        }
        for name in [
            "afl", "aflfast", "aflgo", "fairfuzz", "darwin", "ecofuzz", "fafuzz", "moptbk",
            "weizz",
        ] {
            assert_eq!(
                reg.queue_dir(name, &corpus),
                Some(corpus.join("queue")),
                "{name}"
            );
        }
        assert_eq!(reg.queue_dir("ankou", &corpus), None);
        assert_eq!(reg.queue_dir("no-such-engine", &corpus), None);
    }

    #[test]
    fn libfuzzer_command_strips_caller_flags_and_adds_job_flags() {
        let tmp = tempdir().unwrap();
        let dirs = job_dirs(tmp.path());
        let corpus_dir = PathBuf::from("/corpora/app");
        let reg = registry(
            vec![
                "./target_app".to_string(),
                "-fork=4".to_string(),
                "-runs=100000".to_string(),
                corpus_dir.display().to_string(),
            ],
            vec![corpus_dir.clone()],
        );
        let seeds = vec![tmp.path().join("s1"), tmp.path().join("s2")];
        let built = reg.build_command(&request("entropic", &dirs, &seeds)).unwrap();

        let argv = &built.cmd.argv;
        assert_eq!(argv[0], "./target_app", "entropic reuses the caller binary");
        assert!(!argv.iter().any(|a| a.starts_with("-fork=")));
        assert!(!argv.iter().any(|a| a.starts_with("-runs=")));
        assert!(!argv.iter().any(|a| a == &corpus_dir.display().to_string()));
        for expected in [
            "-reload=0",
            "-print_final_stats=1",
            "-verbosity=2",
            "-print_funcs=0",
            "-max_total_time=60",
            "-entropic=1",
        ] {
            assert!(argv.contains(&expected.to_string()), "missing {expected}");
        }
        assert!(argv.iter().any(|a| a.starts_with("-stop_file=")));
        assert!(argv.iter().any(|a| a.starts_with("-features_dir=")));
        let seed_flag = argv
            .iter()
            .find(|a| a.starts_with("-seed_inputs=@"))
            .expect("seed_inputs flag");
        let list_path = built.seed_list_path.as_ref().unwrap();
        assert!(seed_flag.ends_with(&list_path.display().to_string()));
        let list = fs::read_to_string(list_path).unwrap();
        assert_eq!(list.matches(',').count(), 1, "two seeds, one comma");

        let output_positional = dirs.1.join("output").display().to_string();
        assert!(argv.contains(&output_positional));
        assert!(dirs.1.join("output").is_dir());
        assert!(dirs.1.join("crash").is_dir());
        assert!(argv.iter().any(|a| a.starts_with("-artifact_prefix=")));
        assert_eq!(built.log_path, dirs.1.join("libfuzzer.log"));
        assert_eq!(built.cmd.output_file.as_ref().unwrap(), &built.log_path);
    }

    #[test]
    fn libfuzzer_without_seeds_omits_the_seed_list() {
        let tmp = tempdir().unwrap();
        let dirs = job_dirs(tmp.path());
        let reg = registry(vec!["./target_app".to_string()], vec![]);
        let built = reg.build_command(&request("libfuzzer", &dirs, &[])).unwrap();
        assert!(built.seed_list_path.is_none());
        assert!(!built.cmd.argv.iter().any(|a| a.starts_with("-seed_inputs=")));
        assert_eq!(
            built.cmd.argv[0],
            "/opt/bank/libfuzzer/target_app",
            "libfuzzer runs its own build of the target"
        );
    }

    #[test]
    fn afl_family_inserts_io_dirs_budget_and_sentinel() {
        let tmp = tempdir().unwrap();
        let dirs = job_dirs(tmp.path());
        let reg = registry(vec![], vec![]);
        let built = reg
            .build_command(&request("aflplusplus", &dirs, &[]))
            .unwrap();
        let argv = &built.cmd.argv;
        assert_eq!(argv[0], "/opt/bank/aflplusplus/afl-fuzz");
        assert_eq!(argv[1], "-i");
        assert_eq!(argv[2], dirs.0.display().to_string());
        assert_eq!(argv[3], "-o");
        assert_eq!(argv[4], dirs.1.display().to_string());
        assert_eq!(argv[5], "-V");
        assert_eq!(argv[6], "60");
        assert!(argv.contains(&"/opt/bank/aflplusplus/cmplog/target_app".to_string()));
        assert_eq!(argv[argv.len() - 2], "/opt/bank/aflplusplus/target_app");
        assert_eq!(argv[argv.len() - 1], "2147483647");
        assert_eq!(built.log_path, dirs.4);
    }

    #[test]
    fn aflfast_and_aflgo_never_get_the_budget_flag() {
        let tmp = tempdir().unwrap();
        let dirs = job_dirs(tmp.path());
        let reg = registry(vec![], vec![]);
        for name in ["aflfast", "aflgo"] {
            let built = reg.build_command(&request(name, &dirs, &[])).unwrap();
            assert!(
                !built.cmd.argv.contains(&"-V".to_string()),
                "{name} must not receive -V"
            );
        }
    }

    #[test]
    fn honggfuzz_uses_its_own_directory_flags() {
        let tmp = tempdir().unwrap();
        let dirs = job_dirs(tmp.path());
        let reg = registry(vec![], vec![]);
        let built = reg.build_command(&request("honggfuzz", &dirs, &[])).unwrap();
        let argv = &built.cmd.argv;
        assert_eq!(argv[1], "-f");
        assert_eq!(argv[3], "-W");
        assert_eq!(argv[5], "--run_time");
        assert_eq!(argv[6], "60");
        assert_eq!(argv.last().unwrap(), "/opt/bank/honggfuzz/target_app");
    }

    #[test]
    fn ankou_uses_duration_flag_and_unknown_engines_fail() {
        let tmp = tempdir().unwrap();
        let dirs = job_dirs(tmp.path());
        let reg = registry(vec![], vec![]);
        let built = reg.build_command(&request("ankou", &dirs, &[])).unwrap();
        let argv = &built.cmd.argv;
        assert_eq!(argv[5], "-dur");
        assert_eq!(argv[6], "60");

        let err = reg
            .build_command(&request("no-such-engine", &dirs, &[]))
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownEngine(_)));
    }
}
