use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ProvisionError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationDataset {
    pub name: String,
    #[serde(default)]
    pub webfrom: Option<String>,
}

pub trait AnnotationTool {
    fn download_dataset(
        &self,
        tool_dir: &Path,
        build: &str,
        dataset: &AnnotationDataset,
    ) -> Result<(), ProvisionError>;
}

pub trait StatsEnvironment {
    fn locate_interpreter(&self) -> Result<PathBuf, ProvisionError>;
    fn run_script(
        &self,
        interpreter: &Path,
        script: &Path,
        gene_set: &Path,
    ) -> Result<(), ProvisionError>;
}

#[derive(Debug, Clone)]
pub struct SystemAnnotationTool {
    perl: Option<PathBuf>,
    script: String,
}

impl SystemAnnotationTool {
    pub fn new() -> Self {
        Self {
            perl: which::which("perl").ok(),
            script: "annotate_variation.pl".to_string(),
        }
    }

    fn require_perl(&self) -> Result<&PathBuf, ProvisionError> {
        self.perl
            .as_ref()
            .ok_or_else(|| ProvisionError::MissingTool("perl".to_string()))
    }
}

impl Default for SystemAnnotationTool {
    fn default() -> Self {
        Self::new()
    }
}

impl AnnotationTool for SystemAnnotationTool {
    fn download_dataset(
        &self,
        tool_dir: &Path,
        build: &str,
        dataset: &AnnotationDataset,
    ) -> Result<(), ProvisionError> {
        let perl = self.require_perl()?;
        let script = tool_dir.join(&self.script);
        if !script.is_file() {
            return Err(ProvisionError::MissingTool(script.display().to_string()));
        }
        info!(dataset = %dataset.name, build, "downloading annotation dataset");
        let args = annotation_args(Path::new(&self.script), build, dataset);
        run_cmd(perl, &args, Some(tool_dir))
    }
}

pub fn annotation_args(script: &Path, build: &str, dataset: &AnnotationDataset) -> Vec<String> {
    let mut args = vec![
        script.to_string_lossy().to_string(),
        "-buildver".to_string(),
        build.to_string(),
        "-downdb".to_string(),
    ];
    if let Some(source) = &dataset.webfrom {
        args.push("-webfrom".to_string());
        args.push(source.clone());
    }
    args.push(dataset.name.clone());
    args.push("humandb/".to_string());
    args
}

#[derive(Debug, Clone)]
pub struct SystemStats {
    program: String,
}

impl SystemStats {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for SystemStats {
    fn default() -> Self {
        Self::new("Rscript")
    }
}

impl StatsEnvironment for SystemStats {
    fn locate_interpreter(&self) -> Result<PathBuf, ProvisionError> {
        which::which(&self.program).map_err(|_| ProvisionError::MissingTool(self.program.clone()))
    }

    fn run_script(
        &self,
        interpreter: &Path,
        script: &Path,
        gene_set: &Path,
    ) -> Result<(), ProvisionError> {
        info!(
            script = %script.display(),
            gene_set = %gene_set.display(),
            "running statistics script"
        );
        let args = vec![
            script.to_string_lossy().to_string(),
            gene_set.to_string_lossy().to_string(),
        ];
        run_cmd(interpreter, &args, None)
    }
}

fn run_cmd(program: &Path, args: &[String], cwd: Option<&Path>) -> Result<(), ProvisionError> {
    debug!(program = %program.display(), ?args, "spawning");
    let mut cmd = Command::new(program);
    cmd.args(args);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    let output = cmd.output().map_err(|err| ProvisionError::CommandFailed {
        program: program.display().to_string(),
        message: err.to_string(),
    })?;
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let message = if stderr.is_empty() {
        format!("exited with {}", output.status)
    } else {
        stderr
    };
    Err(ProvisionError::CommandFailed {
        program: program.display().to_string(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn annotation_args_with_webfrom() {
        let dataset = AnnotationDataset {
            name: "refGene".to_string(),
            webfrom: Some("annovar".to_string()),
        };
        let args = annotation_args(Path::new("annotate_variation.pl"), "hg38", &dataset);
        assert_eq!(
            args,
            vec![
                "annotate_variation.pl",
                "-buildver",
                "hg38",
                "-downdb",
                "-webfrom",
                "annovar",
                "refGene",
                "humandb/"
            ]
        );
    }

    #[test]
    fn annotation_args_without_webfrom() {
        let dataset = AnnotationDataset {
            name: "cytoBand".to_string(),
            webfrom: None,
        };
        let args = annotation_args(Path::new("annotate_variation.pl"), "hg38", &dataset);
        assert!(!args.iter().any(|arg| arg == "-webfrom"));
        assert_eq!(args[args.len() - 2], "cytoBand");
    }
}
