use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ProvisionError {
    #[error("invalid task: {0} (expected one of: all, db_install, db_setup, tools_install, tools_setup, ref, example)")]
    InvalidTask(String),

    #[error("missing gene-set file: db_setup requires -m <hallmarks file>")]
    #[diagnostic(help("pass the MSigDB hallmarks gene-set file with -m"))]
    MissingGeneSet,

    #[error("gene-set file not found: {0}")]
    GeneSetNotFound(PathBuf),

    #[error("missing annotation tool download URL")]
    #[diagnostic(help(
        "pass --annotation-url, set KIRA_ANNOTATION_URL, or add annotation_tool.url to the manifest"
    ))]
    MissingAnnotationUrl,

    #[error("required tool not found: {0}")]
    MissingTool(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid resource in manifest: {0}")]
    InvalidResource(String),

    #[error("layout directory does not exist: {0}")]
    MissingLayoutDir(PathBuf),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("{url} returned status {status}")]
    HttpStatus { status: u16, url: String },

    #[error("truncated transfer for {url}: expected {expected} bytes, received {received}")]
    TruncatedTransfer {
        url: String,
        expected: u64,
        received: u64,
    },

    #[error("no confirmation token in response for file id {0}")]
    MissingConfirmToken(String),

    #[error("failed to extract {archive}: {message}")]
    Extraction { archive: PathBuf, message: String },

    #[error("command failed: {program}: {message}")]
    CommandFailed { program: String, message: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
