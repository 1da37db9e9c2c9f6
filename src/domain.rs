use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProvisionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    #[default]
    All,
    DbInstall,
    DbSetup,
    ToolsInstall,
    ToolsSetup,
    Ref,
    Example,
}

impl Task {
    /// Order in which `all` runs the individual tasks.
    pub const SEQUENCE: [Task; 6] = [
        Task::ToolsInstall,
        Task::ToolsSetup,
        Task::DbInstall,
        Task::DbSetup,
        Task::Ref,
        Task::Example,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Task::All => "all",
            Task::DbInstall => "db_install",
            Task::DbSetup => "db_setup",
            Task::ToolsInstall => "tools_install",
            Task::ToolsSetup => "tools_setup",
            Task::Ref => "ref",
            Task::Example => "example",
        }
    }

    pub fn actions(&self) -> Vec<Action> {
        match self {
            Task::All => Self::SEQUENCE
                .iter()
                .flat_map(|task| task.actions())
                .collect(),
            Task::ToolsInstall => vec![Action::InstallPrimaryTool, Action::InstallAnnotationTool],
            Task::ToolsSetup => vec![Action::SetupAnnotationTool],
            Task::DbInstall => vec![Action::InstallDatabases],
            Task::DbSetup => vec![Action::SetupDatabases],
            Task::Ref => vec![Action::InstallReferences],
            Task::Example => vec![Action::InstallExamples],
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Task {
    type Err = ProvisionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "all" => Ok(Task::All),
            "db_install" => Ok(Task::DbInstall),
            "db_setup" => Ok(Task::DbSetup),
            "tools_install" => Ok(Task::ToolsInstall),
            "tools_setup" => Ok(Task::ToolsSetup),
            "ref" => Ok(Task::Ref),
            "example" => Ok(Task::Example),
            _ => Err(ProvisionError::InvalidTask(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    InstallPrimaryTool,
    InstallAnnotationTool,
    SetupAnnotationTool,
    InstallDatabases,
    SetupDatabases,
    InstallReferences,
    InstallExamples,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::InstallPrimaryTool => "install_primary_tool",
            Action::InstallAnnotationTool => "install_annotation_tool",
            Action::SetupAnnotationTool => "setup_annotation_tool",
            Action::InstallDatabases => "install_databases",
            Action::SetupDatabases => "setup_databases",
            Action::InstallReferences => "install_references",
            Action::InstallExamples => "install_examples",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArchiveFormat {
    #[serde(rename = "tar.gz")]
    TarGz,
    #[serde(rename = "tar.bz2")]
    TarBz2,
    #[serde(rename = "zip")]
    Zip,
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveFormat::TarGz => write!(f, "tar.gz"),
            ArchiveFormat::TarBz2 => write!(f, "tar.bz2"),
            ArchiveFormat::Zip => write!(f, "zip"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutDir {
    Tools,
    Databases,
    Input,
    References,
    Sequencing,
    Mappability,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteSource {
    Url(String),
    // file id on a host that answers large downloads with a confirmation page
    ConfirmId(String),
}

impl fmt::Display for RemoteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteSource::Url(url) => write!(f, "{url}"),
            RemoteSource::ConfirmId(id) => write!(f, "confirm-id:{id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeRule {
    pub prefix: String,
    pub canonical: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub source: RemoteSource,
    pub file_name: String,
    pub dir: LayoutDir,
    #[serde(default)]
    pub format: Option<ArchiveFormat>,
    #[serde(default)]
    pub normalize: Option<NormalizeRule>,
}

impl Resource {
    pub fn validate(&self) -> Result<(), ProvisionError> {
        let name = self.file_name.as_str();
        if !is_plain_name(name) {
            return Err(ProvisionError::InvalidResource(format!(
                "file name must be a plain file name: {name:?}"
            )));
        }
        let source_empty = match &self.source {
            RemoteSource::Url(url) => url.trim().is_empty(),
            RemoteSource::ConfirmId(id) => id.trim().is_empty(),
        };
        if source_empty {
            return Err(ProvisionError::InvalidResource(format!(
                "empty source for {name}"
            )));
        }
        if let Some(rule) = &self.normalize {
            if rule.prefix.is_empty() || !is_plain_name(&rule.canonical) {
                return Err(ProvisionError::InvalidResource(format!(
                    "invalid normalize rule for {name}"
                )));
            }
        }
        Ok(())
    }
}

pub fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains('/') && !name.contains('\\')
}
