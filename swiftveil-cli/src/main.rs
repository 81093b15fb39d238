//! SwiftVeil CLI
//!
//! Command-line interface for obfuscating Swift application projects.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use swiftveil_core::{
    scan, Anchor, Pipeline, PipelineConfig, PipelineReport, ProgressSink, Stage, CONFIG_FILE_NAME,
};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "swiftveil")]
#[command(about = "Swift project obfuscator")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Obfuscate a project into a new directory
    Obfuscate {
        /// Project directory to read (left untouched)
        input: PathBuf,

        /// Directory to write the obfuscated copy to
        #[arg(short, long)]
        output: PathBuf,

        /// Config file (default: swiftveil.toml in the input directory)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Noise files to generate per source file
        #[arg(long)]
        noise: Option<usize>,

        /// Rename files along with their types
        #[arg(long)]
        rename_files: bool,

        /// Seed for reproducible output
        #[arg(long)]
        seed: Option<u64>,

        /// Worker threads (default: CPU count)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Write a JSON run report to this path
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// List the constructs of one kind found in a Swift file
    Scan {
        /// Swift source file
        file: PathBuf,

        /// Construct kind to look for
        #[arg(short, long, value_enum, default_value = "function")]
        kind: ScanKind,
    },

    /// Write a default swiftveil.toml
    InitConfig {
        /// Directory to write into (default: current directory)
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum ScanKind {
    Function,
    Guard,
    ForLoop,
    Type,
}

impl ScanKind {
    fn anchor(self) -> &'static Anchor {
        match self {
            ScanKind::Function => Anchor::function(),
            ScanKind::Guard => Anchor::guard(),
            ScanKind::ForLoop => Anchor::for_loop(),
            ScanKind::Type => Anchor::type_decl(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("swiftveil=info".parse().unwrap())
                .add_directive("swiftveil_core=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Obfuscate {
            input,
            output,
            config,
            noise,
            rename_files,
            seed,
            workers,
            report,
        } => {
            let options = ObfuscateOptions {
                noise,
                rename_files,
                seed,
                workers,
            };
            cmd_obfuscate(input, output, config, options, report).await?;
        }
        Commands::Scan { file, kind } => {
            cmd_scan(file, kind)?;
        }
        Commands::InitConfig { path, force } => {
            cmd_init_config(path, force)?;
        }
    }

    Ok(())
}

/// Command-line overrides applied on top of the config file
struct ObfuscateOptions {
    noise: Option<usize>,
    rename_files: bool,
    seed: Option<u64>,
    workers: Option<usize>,
}

impl ObfuscateOptions {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(noise) = self.noise {
            config.noise_file_count = noise;
        }
        if self.rename_files {
            config.file_renaming = true;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if self.workers.is_some() {
            config.workers = self.workers;
        }
    }
}

/// Prints stage progress and reports the job dead once Ctrl-C was pressed
struct CliProgress {
    alive: Arc<AtomicBool>,
    total: usize,
    done: std::sync::atomic::AtomicUsize,
}

impl ProgressSink for CliProgress {
    fn report(&self, job_id: &str, stage: Stage) {
        let n = self.done.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(job = job_id, "Stage {:?}", stage);
        println!("[{}/{}] {}...", n, self.total, stage.label());
    }

    fn is_alive(&self, _job_id: &str) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

/// Copy every file under `from` into `to`, creating directories
fn copy_tree(from: &Path, to: &Path) -> Result<usize> {
    let mut copied = 0;
    for entry in WalkDir::new(from) {
        let entry = entry.context("Failed to walk input directory")?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .context("Walked outside the input directory")?;
        let target = to.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("Failed to create {}", target.display()))?;
        } else if entry.file_type().is_file() {
            fs::copy(entry.path(), &target)
                .with_context(|| format!("Failed to copy {}", entry.path().display()))?;
            copied += 1;
        }
    }
    Ok(copied)
}

fn load_config(input: &Path, config: Option<PathBuf>) -> Result<PipelineConfig> {
    let config = match config {
        Some(path) => PipelineConfig::from_config_file(&path)?,
        None => PipelineConfig::from_dir(input)?,
    };
    Ok(config)
}

/// Obfuscate `input` into `output`
async fn cmd_obfuscate(
    input: PathBuf,
    output: PathBuf,
    config: Option<PathBuf>,
    options: ObfuscateOptions,
    report_path: Option<PathBuf>,
) -> Result<()> {
    if !input.is_dir() {
        bail!("Input {} is not a directory", input.display());
    }
    if output.exists() && fs::read_dir(&output)?.next().is_some() {
        bail!("Output directory {} is not empty", output.display());
    }

    let mut config = load_config(&input, config)?;
    options.apply(&mut config);

    let copied = copy_tree(&input, &output)?;
    tracing::info!("Copied {} files to {}", copied, output.display());

    // the config file itself is not part of the shipped project
    let _ = fs::remove_file(output.join(CONFIG_FILE_NAME));

    let job_id = uuid::Uuid::new_v4().to_string();
    let alive = Arc::new(AtomicBool::new(true));
    {
        let alive = alive.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                println!("\nCancelling after the current stage...");
                alive.store(false, Ordering::SeqCst);
            }
        });
    }

    let pipeline = Pipeline::new(config);
    let total = pipeline.stages()?.len();
    let progress = Arc::new(CliProgress {
        alive,
        total,
        done: std::sync::atomic::AtomicUsize::new(0),
    });
    let pipeline = pipeline.with_progress(progress);

    println!("Obfuscating {} -> {} (job {})", input.display(), output.display(), job_id);
    let dir = output.clone();
    let id = job_id.clone();
    let result = tokio::task::spawn_blocking(move || pipeline.run_on_directory(&dir, &id))
        .await
        .context("Pipeline task panicked")?;

    let report = match result {
        Ok(Some(report)) => report,
        Ok(None) => {
            fs::remove_dir_all(&output).context("Failed to remove partial output")?;
            println!("Cancelled; no output written");
            return Ok(());
        }
        Err(e) => {
            let _ = fs::remove_dir_all(&output);
            return Err(e).context("Obfuscation failed");
        }
    };

    print_report(&report);
    if let Some(path) = report_path {
        let json = serde_json::to_string_pretty(&report)?;
        fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Report written to {}", path.display());
    }
    Ok(())
}

fn print_report(report: &PipelineReport) {
    println!("\nObfuscation complete ({} files, seed {})", report.files, report.seed);
    for stage in &report.stages {
        println!("  {:<26} {:>6}  ({} ms)", stage.stage.label(), stage.count, stage.elapsed_ms);
    }
}

/// List constructs found in one file
fn cmd_scan(file: PathBuf, kind: ScanKind) -> Result<()> {
    let text = fs::read_to_string(&file).with_context(|| format!("Failed to read {}", file.display()))?;
    let mut found = 0;
    for construct in scan(&text, kind.anchor()) {
        found += 1;
        let line = text[..construct.start].matches('\n').count() + 1;
        let header: String = construct.header.split_whitespace().collect::<Vec<_>>().join(" ");
        println!("{:>5}  {:>6}..{:<6} {}", line, construct.start, construct.end, header);
    }
    println!("\n{} {:?} construct(s) in {}", found, kind, file.display());
    Ok(())
}

/// Write a default config file
fn cmd_init_config(path: Option<PathBuf>, force: bool) -> Result<()> {
    let dir = match path {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };
    let config_path = dir.join(CONFIG_FILE_NAME);
    if config_path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", config_path.display());
    }
    let content = toml::to_string_pretty(&PipelineConfig::default())?;
    fs::create_dir_all(&dir).context("Failed to create config directory")?;
    fs::write(&config_path, content).with_context(|| format!("Failed to write {}", config_path.display()))?;
    println!("Wrote default configuration to {}", config_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_copy_tree() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        fs::create_dir_all(src.path().join("App/Assets.xcassets/icon.imageset")).unwrap();
        fs::write(src.path().join("App/Main.swift"), "let a = 1").unwrap();
        fs::write(src.path().join("App/Assets.xcassets/icon.imageset/icon.png"), [1u8, 2, 3]).unwrap();

        let out = dst.path().join("out");
        let copied = copy_tree(src.path(), &out).unwrap();
        assert_eq!(copied, 2);
        assert_eq!(fs::read_to_string(out.join("App/Main.swift")).unwrap(), "let a = 1");
        assert!(out.join("App/Assets.xcassets/icon.imageset/icon.png").exists());
    }

    #[test]
    fn test_options_override_config() {
        let mut config = PipelineConfig::default();
        let options = ObfuscateOptions {
            noise: Some(3),
            rename_files: true,
            seed: Some(11),
            workers: None,
        };
        options.apply(&mut config);
        assert_eq!(config.noise_file_count, 3);
        assert!(config.file_renaming);
        assert_eq!(config.seed, Some(11));
        assert_eq!(config.workers, None);
    }
}
