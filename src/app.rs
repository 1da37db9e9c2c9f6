use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use camino::Utf8PathBuf;
use serde::Serialize;
use tracing::{info, warn};

use crate::archive;
use crate::config::ResolvedConfig;
use crate::domain::{Action, LayoutDir, Resource, Task};
use crate::error::ProvisionError;
use crate::fetch::Fetcher;
use crate::layout::Layout;
use crate::tools::{AnnotationTool, StatsEnvironment};

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RunInputs {
    pub annotation_url: Option<String>,
    pub gene_set: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub task: Task,
    pub started_at: String,
    pub dry_run: bool,
    pub actions: Vec<ActionReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionReport {
    pub action: Action,
    pub items: Vec<String>,
    pub elapsed_ms: u128,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

pub struct Provisioner<F: Fetcher, A: AnnotationTool, S: StatsEnvironment> {
    layout: Layout,
    config: ResolvedConfig,
    fetcher: F,
    annotation: A,
    stats: S,
}

impl<F: Fetcher, A: AnnotationTool, S: StatsEnvironment> Provisioner<F, A, S> {
    pub fn new(
        layout: Layout,
        config: ResolvedConfig,
        fetcher: F,
        annotation: A,
        stats: S,
    ) -> Self {
        Self {
            layout,
            config,
            fetcher,
            annotation,
            stats,
        }
    }

    pub fn run(
        &self,
        task: Task,
        inputs: &RunInputs,
        options: RunOptions,
        sink: &dyn ProgressSink,
    ) -> Result<RunReport, ProvisionError> {
        let started_at = chrono::Utc::now().to_rfc3339();
        let actions = task.actions();
        self.preflight(&actions, inputs)?;

        let mut reports = Vec::with_capacity(actions.len());
        for action in actions {
            let started = Instant::now();
            sink.event(ProgressEvent {
                message: format!("phase=Start; task={task} action={action}"),
                elapsed: None,
            });
            let items = if options.dry_run {
                self.describe(action)
            } else {
                self.run_action(action, inputs, sink)?
            };
            let elapsed = started.elapsed();
            sink.event(ProgressEvent {
                message: format!("phase=Done; action={action}"),
                elapsed: Some(elapsed),
            });
            reports.push(ActionReport {
                action,
                items,
                elapsed_ms: elapsed.as_millis(),
            });
        }

        Ok(RunReport {
            task,
            started_at,
            dry_run: options.dry_run,
            actions: reports,
        })
    }

    /// Checks every operator input and layout directory the plan will need, before any
    /// action has side effects.
    pub fn preflight(&self, actions: &[Action], inputs: &RunInputs) -> Result<(), ProvisionError> {
        for action in actions {
            match action {
                Action::InstallPrimaryTool | Action::SetupAnnotationTool => {
                    self.layout.require_dir(LayoutDir::Tools)?;
                }
                Action::InstallAnnotationTool => {
                    self.annotation_url(inputs)?;
                    self.layout.require_dir(LayoutDir::Tools)?;
                }
                Action::InstallDatabases => self.require_dirs(&self.config.databases)?,
                Action::SetupDatabases => {
                    require_gene_set(inputs.gene_set.as_deref())?;
                }
                Action::InstallReferences => self.require_dirs(&self.config.references)?,
                Action::InstallExamples => self.require_dirs(&self.config.examples)?,
            }
        }
        Ok(())
    }

    fn run_action(
        &self,
        action: Action,
        inputs: &RunInputs,
        sink: &dyn ProgressSink,
    ) -> Result<Vec<String>, ProvisionError> {
        match action {
            Action::InstallPrimaryTool => self.install_primary_tool(sink),
            Action::InstallAnnotationTool => {
                let url = self.annotation_url(inputs)?;
                self.install_annotation_tool(&url, sink)
            }
            Action::SetupAnnotationTool => self.setup_annotation_tool(sink),
            Action::InstallDatabases => self.install_databases(sink),
            Action::SetupDatabases => self.setup_databases(inputs.gene_set.as_deref(), sink),
            Action::InstallReferences => self.install_references(sink),
            Action::InstallExamples => self.install_examples(sink),
        }
    }

    fn describe(&self, action: Action) -> Vec<String> {
        match action {
            Action::InstallPrimaryTool => {
                self.describe_resources(std::slice::from_ref(&self.config.primary_tool))
            }
            Action::InstallAnnotationTool => vec![format!(
                "{} -> {}",
                self.config.annotation.file_name,
                self.annotation_dir()
            )],
            Action::SetupAnnotationTool => self
                .config
                .annotation
                .datasets
                .iter()
                .map(|dataset| format!("{} ({})", dataset.name, self.config.annotation.build))
                .collect(),
            Action::InstallDatabases => self.describe_resources(&self.config.databases),
            Action::SetupDatabases => vec![format!(
                "{} {}",
                self.config.stats_interpreter,
                self.stats_script()
            )],
            Action::InstallReferences => self.describe_resources(&self.config.references),
            Action::InstallExamples => self.describe_resources(&self.config.examples),
        }
    }

    fn describe_resources(&self, resources: &[Resource]) -> Vec<String> {
        resources
            .iter()
            .map(|resource| {
                format!(
                    "{} -> {}",
                    resource.source,
                    self.layout.resource_path(resource)
                )
            })
            .collect()
    }

    pub fn install_primary_tool(
        &self,
        sink: &dyn ProgressSink,
    ) -> Result<Vec<String>, ProvisionError> {
        let installed = self.provision(&self.config.primary_tool, sink)?;
        Ok(vec![installed])
    }

    pub fn install_annotation_tool(
        &self,
        url: &str,
        sink: &dyn ProgressSink,
    ) -> Result<Vec<String>, ProvisionError> {
        let resource = self.config.annotation.resource(url);
        let installed = self.provision(&resource, sink)?;
        Ok(vec![installed])
    }

    pub fn setup_annotation_tool(
        &self,
        sink: &dyn ProgressSink,
    ) -> Result<Vec<String>, ProvisionError> {
        let tool_dir = self.annotation_dir();
        if !tool_dir.as_std_path().is_dir() {
            return Err(ProvisionError::MissingTool(format!(
                "annotation tool not installed at {tool_dir}"
            )));
        }
        let build = self.config.annotation.build.as_str();
        let mut done = Vec::new();
        for dataset in &self.config.annotation.datasets {
            sink.event(ProgressEvent {
                message: format!("phase=Annotate; dataset {}", dataset.name),
                elapsed: None,
            });
            self.annotation
                .download_dataset(tool_dir.as_std_path(), build, dataset)?;
            done.push(dataset.name.clone());
        }
        Ok(done)
    }

    pub fn install_databases(
        &self,
        sink: &dyn ProgressSink,
    ) -> Result<Vec<String>, ProvisionError> {
        self.provision_all(&self.config.databases, sink)
    }

    // gene-set before interpreter lookup
    pub fn setup_databases(
        &self,
        gene_set: Option<&Path>,
        sink: &dyn ProgressSink,
    ) -> Result<Vec<String>, ProvisionError> {
        let gene_set = require_gene_set(gene_set)?;
        let interpreter = self.stats.locate_interpreter()?;
        let script = self.stats_script();
        if !script.as_std_path().is_file() {
            return Err(ProvisionError::MissingTool(format!(
                "statistics script {script}"
            )));
        }
        sink.event(ProgressEvent {
            message: format!("phase=Configure; {} {}", script, gene_set.display()),
            elapsed: None,
        });
        self.stats
            .run_script(&interpreter, script.as_std_path(), gene_set)?;
        Ok(vec![script.to_string()])
    }

    pub fn install_references(
        &self,
        sink: &dyn ProgressSink,
    ) -> Result<Vec<String>, ProvisionError> {
        self.provision_all(&self.config.references, sink)
    }

    pub fn install_examples(
        &self,
        sink: &dyn ProgressSink,
    ) -> Result<Vec<String>, ProvisionError> {
        self.provision_all(&self.config.examples, sink)
    }

    fn provision_all(
        &self,
        resources: &[Resource],
        sink: &dyn ProgressSink,
    ) -> Result<Vec<String>, ProvisionError> {
        resources
            .iter()
            .map(|resource| self.provision(resource, sink))
            .collect()
    }

    fn provision(
        &self,
        resource: &Resource,
        sink: &dyn ProgressSink,
    ) -> Result<String, ProvisionError> {
        let dir = self.layout.require_dir(resource.dir)?;
        let destination = dir.join(&resource.file_name);

        sink.event(ProgressEvent {
            message: format!("phase=Fetch; {}", resource.source),
            elapsed: None,
        });
        let started = Instant::now();
        let bytes = self
            .fetcher
            .fetch(&resource.source, destination.as_std_path())?;
        info!(file = %destination, bytes, "fetched");
        sink.event(ProgressEvent {
            message: format!("phase=Fetch; {} ({bytes} bytes)", resource.file_name),
            elapsed: Some(started.elapsed()),
        });

        let Some(format) = resource.format else {
            return Ok(destination.to_string());
        };
        sink.event(ProgressEvent {
            message: format!("phase=Extract; {} into {dir}", resource.file_name),
            elapsed: None,
        });
        let outcome = archive::install_archive(
            destination.as_std_path(),
            format,
            dir.as_std_path(),
            resource.normalize.as_ref(),
        )?;
        Ok(match outcome.normalized {
            Some(path) => path.display().to_string(),
            None => outcome.target_dir.display().to_string(),
        })
    }

    fn require_dirs(&self, resources: &[Resource]) -> Result<(), ProvisionError> {
        for resource in resources {
            self.layout.require_dir(resource.dir)?;
        }
        Ok(())
    }

    fn annotation_url(&self, inputs: &RunInputs) -> Result<String, ProvisionError> {
        inputs
            .annotation_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_string)
            .or_else(|| self.config.annotation.url.clone())
            .ok_or(ProvisionError::MissingAnnotationUrl)
    }

    fn annotation_dir(&self) -> Utf8PathBuf {
        self.layout
            .dir(LayoutDir::Tools)
            .join(&self.config.annotation.dir_name)
    }

    fn stats_script(&self) -> Utf8PathBuf {
        if self.config.stats_script.is_absolute() {
            self.config.stats_script.clone()
        } else {
            self.layout.root().join(&self.config.stats_script)
        }
    }
}

pub fn require_gene_set(gene_set: Option<&Path>) -> Result<&Path, ProvisionError> {
    let path = gene_set
        .filter(|path| !path.as_os_str().is_empty())
        .ok_or(ProvisionError::MissingGeneSet)?;
    if !path.is_file() {
        warn!(path = %path.display(), "gene-set file missing");
        return Err(ProvisionError::GeneSetNotFound(path.to_path_buf()));
    }
    Ok(path)
}
