use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

use camino::Utf8PathBuf;
use clap::error::ErrorKind;
use clap::{ArgAction, Parser};
use miette::IntoDiagnostic;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use kira_provision::app::{Provisioner, RunInputs, RunOptions};
use kira_provision::config::{ANNOTATION_URL_ENV, ConfigLoader};
use kira_provision::domain::{Action, Task};
use kira_provision::fetch::{HttpTransport, RemoteFetcher};
use kira_provision::layout::Layout;
use kira_provision::output::{ConsoleOutput, JsonOutput, OutputMode};
use kira_provision::tools::{SystemAnnotationTool, SystemStats};

const TASKS_HELP: &str = "Tasks:
  all            tools_install, tools_setup, db_install, db_setup, ref, example (default)
  tools_install  install the variant caller and the annotation tool
  tools_setup    download the annotation tool's datasets
  db_install     download variant, hotspot and interaction databases
  db_setup       build gene-set databases (requires -m)
  ref            download chromosome, genome and mappability references
  example        download capture regions and example input data";

#[derive(Parser)]
#[command(name = "kira-provision")]
#[command(about = "Provision tools, databases and references for the variant pipeline")]
#[command(version, author, disable_help_flag = true, after_help = TASKS_HELP)]
struct Cli {
    #[arg(short = 't', long, value_parser = Task::from_str, default_value_t = Task::All)]
    task: Task,

    /// Hallmarks gene-set file consumed by db_setup
    #[arg(short = 'm', long = "hallmarks", value_name = "PATH")]
    hallmarks: Option<PathBuf>,

    /// Patient directory (accepted, unused)
    #[arg(short = 'd', long = "patient-dir", value_name = "PATH")]
    patient_dir: Option<PathBuf>,

    /// Download link for the annotation tool archive
    #[arg(long, env = ANNOTATION_URL_ENV, value_name = "URL")]
    annotation_url: Option<String>,

    /// Layout root (defaults to KIRA_PROVISION_ROOT, then the executable's directory)
    #[arg(long, value_name = "DIR")]
    root: Option<String>,

    /// JSON manifest overriding the built-in resource list
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    #[arg(long)]
    dry_run: bool,

    #[arg(long)]
    non_interactive: bool,

    #[arg(short = 'h', long, action = ArgAction::Help, help = "Print help")]
    help: Option<bool>,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(1),
            };
        }
    };

    if let Err(report) = run(cli) {
        eprintln!("{report:?}");
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn run(cli: Cli) -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };
    if let Some(dir) = &cli.patient_dir {
        warn!(path = %dir.display(), "-d is accepted for compatibility and ignored");
    }

    let layout = Layout::resolve(cli.root.map(Utf8PathBuf::from))?;
    let config = ConfigLoader::resolve(cli.config.as_deref(), layout.root())?;
    let transport = HttpTransport::new()?;

    let mut inputs = RunInputs {
        annotation_url: cli.annotation_url,
        gene_set: cli.hallmarks,
    };
    let needs_url = cli.task.actions().contains(&Action::InstallAnnotationTool);
    if needs_url
        && inputs.annotation_url.is_none()
        && config.annotation.url.is_none()
        && matches!(output_mode, OutputMode::Interactive)
        && !cli.dry_run
        && io::stdin().is_terminal()
    {
        inputs.annotation_url = prompt_line("Annotation tool (ANNOVAR) download link: ")
            .into_diagnostic()?;
    }

    let stats = SystemStats::new(config.stats_interpreter.clone());
    let app = Provisioner::new(
        layout,
        config,
        RemoteFetcher::new(transport),
        SystemAnnotationTool::new(),
        stats,
    );
    let options = RunOptions {
        dry_run: cli.dry_run,
    };

    match output_mode {
        OutputMode::NonInteractive => {
            let report = app.run(cli.task, &inputs, options, &JsonOutput)?;
            JsonOutput::print_report(&report).into_diagnostic()?;
        }
        OutputMode::Interactive => {
            let report = app.run(cli.task, &inputs, options, &ConsoleOutput)?;
            ConsoleOutput::print_summary(&report).into_diagnostic()?;
        }
    }
    Ok(())
}

fn prompt_line(prompt: &str) -> io::Result<Option<String>> {
    let mut stderr = io::stderr();
    stderr.write_all(prompt.as_bytes())?;
    stderr.flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let line = line.trim();
    Ok((!line.is_empty()).then(|| line.to_string()))
}
