use clap::{Parser, Subcommand};
use color_eyre::eyre::{bail, WrapErr};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use testlens_core::tree::{suite_id, test_id};
use testlens_core::{Config, NodeKind, RunMode, Scanner, TestController, TestRun, TestState, Workspace};

#[derive(Parser)]
#[command(name = "testlens")]
#[command(about = "Discover and run mocha tests across a workspace", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the folder and suite tree
    Discover {
        /// Workspace root
        #[arg(long, default_value = ".")]
        root: PathBuf,
        /// Scan every suite for its tests
        #[arg(long)]
        expand: bool,
        /// Print the tree as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the test declarations in a file
    Scan {
        file: PathBuf,
    },
    /// Run a folder, a file or a single named test
    Run {
        file: PathBuf,
        /// Name of the test or group to run
        #[arg(long)]
        name: Option<String>,
        /// folder, file or suite
        #[arg(long)]
        mode: Option<RunMode>,
        /// Workspace root
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
    /// Print the default configuration
    Config,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Discover { root, expand, json } => discover(&root, expand, json).await,
        Commands::Scan { file } => scan(&file),
        Commands::Run { file, name, mode, root } => run(&root, &file, name, mode).await,
        Commands::Config => {
            print!("{}", Config::default_config_string());
            Ok(())
        }
    }
}

fn open_workspace(root: &Path) -> color_eyre::Result<Workspace> {
    let root = root
        .canonicalize()
        .wrap_err_with(|| format!("Workspace root not found: {}", root.display()))?;
    Ok(Workspace::init(root)?)
}

fn spinner(message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

async fn discover(root: &Path, expand: bool, json: bool) -> color_eyre::Result<()> {
    let mut controller = TestController::new(open_workspace(root)?);

    let pb = spinner("Searching for tests...");
    let stats = controller.refresh().await;
    if expand {
        pb.set_message("Scanning suites...");
        controller.resolve_all().await;
    }
    pb.finish_and_clear();

    if json {
        let roots: Vec<_> = controller.tree().roots().collect();
        println!("{}", serde_json::to_string_pretty(&roots)?);
        return Ok(());
    }

    for (depth, node) in controller.tree().walk() {
        let indent = "  ".repeat(depth);
        match (node.kind, node.range) {
            (NodeKind::Test, Some(range)) => println!("{}{} (line {})", indent, node.label, range.start.line + 1),
            _ => println!("{}{}", indent, node.label),
        }
    }
    println!();
    println!("{} test files in {} folders", stats.files, stats.folders);
    Ok(())
}

fn scan(file: &Path) -> color_eyre::Result<()> {
    let text = std::fs::read_to_string(file).wrap_err_with(|| format!("Failed to read {}", file.display()))?;
    for declaration in Scanner::for_path(file).scan(&text)? {
        println!(
            "{}:{} {}",
            declaration.location.line, declaration.location.column, declaration.name
        );
    }
    Ok(())
}

async fn run(root: &Path, file: &Path, name: Option<String>, mode: Option<RunMode>) -> color_eyre::Result<()> {
    let workspace = open_workspace(root)?;
    let file = file
        .canonicalize()
        .wrap_err_with(|| format!("Path not found: {}", file.display()))?;
    let mode = mode.unwrap_or(if name.is_some() { RunMode::Suite } else { RunMode::File });

    let mut controller = TestController::new(workspace);
    let pb = spinner("Searching for tests...");
    controller.refresh().await;
    if mode != RunMode::Folder {
        if let Err(e) = controller.resolve(&suite_id(&file)).await {
            tracing::warn!(error = %e, "could not scan file");
        }
    }
    pb.finish_and_clear();

    let id = match (mode, &name) {
        (RunMode::Suite, Some(name)) => Some(test_id(&file, name)),
        (RunMode::Suite, None) => bail!("--name is required to run a single test"),
        (RunMode::File, _) => Some(suite_id(&file)),
        (RunMode::Folder, _) => controller
            .tree()
            .parent_of(&suite_id(&file))
            .or_else(|| controller.tree().roots().find(|r| r.uri == file))
            .map(|folder| folder.id.clone()),
    };

    match id.filter(|id| controller.tree().contains(id)) {
        Some(id) => {
            let run = controller.execute(&[id], false).await?;
            print_run(&run);
            if run.summary().failed > 0 {
                std::process::exit(1);
            }
        }
        None => {
            let label = name.unwrap_or_else(|| controller.workspace().folder_label(&file));
            let succeeded = controller.run_test(&file, &label, mode).await?;
            println!("{}: {}", label, if succeeded { "passed" } else { "failed" });
            if !succeeded {
                std::process::exit(1);
            }
        }
    }
    Ok(())
}

fn print_run(run: &TestRun) {
    for (id, state) in run.states() {
        let detail = match &state {
            TestState::Passed { duration: Some(d) } => format!(" ({:.3}s)", d.as_secs_f64()),
            TestState::Failed { message, .. } if !message.is_empty() => format!(": {}", message),
            _ => String::new(),
        };
        println!("{:>8}  {}{}", state.label(), id, detail);
    }
    let summary = run.summary();
    println!();
    println!(
        "{} passed, {} failed, {} skipped, {} pending",
        summary.passed, summary.failed, summary.skipped, summary.pending
    );
}
