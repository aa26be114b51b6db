use std::{fs::File, io::BufReader, path::PathBuf, time::Duration};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use rand::{SeedableRng as _, rngs::StdRng};
use tracing_subscriber::EnvFilter;

use paperpan::{
    CommandLauncher, CpuRenderer, RunConfig, SupervisorOutcome, SupervisorPolicy, run_worker,
    supervise,
};

#[derive(Parser, Debug)]
#[command(name = "paperpan", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one worker pass: enumerate, render, checkpoint. Exits 0 on a
    /// full traversal (or when the item limit is reached).
    Worker(RunArgs),
    /// Run the supervisor: launch the worker and restart it on any
    /// non-zero exit, bounded by --max-retries (unbounded when unset).
    Supervise(RunArgs),
}

#[derive(Parser, Clone, Debug)]
struct RunArgs {
    /// JSON run configuration; flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Root of the scanned-document tree.
    #[arg(long = "in")]
    input_root: Option<PathBuf>,

    /// Root for rendered frames and the checkpoint log.
    #[arg(long = "out")]
    output_root: Option<PathBuf>,

    /// Anchor path segment for group keys.
    #[arg(long)]
    anchor: Option<String>,

    /// Source image extension (case-insensitive).
    #[arg(long)]
    ext: Option<String>,

    /// Stop after this many completed items.
    #[arg(long)]
    limit: Option<u64>,

    /// Seconds to wait between worker restarts.
    #[arg(long)]
    restart_delay_secs: Option<u64>,

    /// Maximum worker launch attempts.
    #[arg(long)]
    max_retries: Option<u32>,
}

impl RunArgs {
    fn resolve(&self) -> anyhow::Result<RunConfig> {
        let mut cfg = match &self.config {
            Some(path) => {
                let f = File::open(path)
                    .with_context(|| format!("open config '{}'", path.display()))?;
                serde_json::from_reader(BufReader::new(f))
                    .with_context(|| format!("parse config '{}'", path.display()))?
            }
            None => RunConfig::default(),
        };

        if let Some(input_root) = &self.input_root {
            cfg.input_root = input_root.clone();
        }
        if let Some(output_root) = &self.output_root {
            cfg.output_root = output_root.clone();
        }
        if let Some(anchor) = &self.anchor {
            cfg.anchor_segment = anchor.clone();
        }
        if let Some(ext) = &self.ext {
            cfg.image_ext = ext.clone();
        }
        if let Some(limit) = self.limit {
            cfg.limit = Some(limit);
        }
        if let Some(delay) = self.restart_delay_secs {
            cfg.restart_delay_secs = delay;
        }
        if let Some(max) = self.max_retries {
            cfg.max_retries = Some(max);
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Flags to hand an inner `worker` invocation, mirroring exactly what
    /// was passed to `supervise`.
    fn to_worker_args(&self) -> Vec<String> {
        let mut args = vec!["worker".to_string()];
        let mut push = |flag: &str, value: String| {
            args.push(flag.to_string());
            args.push(value);
        };
        if let Some(config) = &self.config {
            push("--config", config.display().to_string());
        }
        if let Some(input_root) = &self.input_root {
            push("--in", input_root.display().to_string());
        }
        if let Some(output_root) = &self.output_root {
            push("--out", output_root.display().to_string());
        }
        if let Some(anchor) = &self.anchor {
            push("--anchor", anchor.clone());
        }
        if let Some(ext) = &self.ext {
            push("--ext", ext.clone());
        }
        if let Some(limit) = self.limit {
            push("--limit", limit.to_string());
        }
        args
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Worker(args) => cmd_worker(args),
        Command::Supervise(args) => cmd_supervise(args),
    }
}

fn cmd_worker(args: RunArgs) -> anyhow::Result<()> {
    let cfg = args.resolve()?;
    let mut renderer = CpuRenderer::new();
    let mut rng = StdRng::from_os_rng();
    let completed = run_worker(&cfg, &mut renderer, &mut rng)?;
    eprintln!("completed {completed} items");
    Ok(())
}

fn cmd_supervise(args: RunArgs) -> anyhow::Result<()> {
    let cfg = args.resolve()?;
    let mut launcher = CommandLauncher::current_exe(args.to_worker_args())?;
    let policy = SupervisorPolicy {
        restart_delay: Duration::from_secs(cfg.restart_delay_secs),
        max_retries: cfg.max_retries,
    };

    match supervise(&mut launcher, policy) {
        SupervisorOutcome::Succeeded { attempts } => {
            eprintln!("worker succeeded after {attempts} attempt(s)");
            Ok(())
        }
        SupervisorOutcome::GaveUp { attempts } => {
            anyhow::bail!("gave up after {attempts} attempt(s)")
        }
    }
}
