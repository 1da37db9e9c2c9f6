use std::fs;
use std::io;
use std::path::Path;

use camino::{Utf8Path, Utf8PathBuf};

use crate::domain::{LayoutDir, Resource};
use crate::error::ProvisionError;

pub const ROOT_ENV: &str = "KIRA_PROVISION_ROOT";

#[derive(Debug, Clone)]
pub struct Layout {
    root: Utf8PathBuf,
}

impl Layout {
    pub fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    pub fn resolve(explicit: Option<Utf8PathBuf>) -> Result<Self, ProvisionError> {
        if let Some(root) = explicit {
            return Ok(Self::new(root));
        }
        if let Ok(root) = std::env::var(ROOT_ENV) {
            if !root.trim().is_empty() {
                return Ok(Self::new(Utf8PathBuf::from(root.trim())));
            }
        }
        let exe =
            std::env::current_exe().map_err(|err| ProvisionError::Filesystem(err.to_string()))?;
        let dir = exe
            .parent()
            .ok_or_else(|| ProvisionError::Filesystem("executable has no parent".to_string()))?;
        let root = Utf8PathBuf::from_path_buf(dir.to_path_buf())
            .map_err(|_| ProvisionError::Filesystem("invalid root path".to_string()))?;
        Ok(Self::new(root))
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn dir(&self, dir: LayoutDir) -> Utf8PathBuf {
        match dir {
            LayoutDir::Tools => self.root.join("tools"),
            LayoutDir::Databases => self.root.join("databases"),
            LayoutDir::Input => self.root.join("assets").join("input"),
            LayoutDir::References => self.root.join("assets").join("references"),
            LayoutDir::Sequencing => self
                .root
                .join("assets")
                .join("references")
                .join("sequencing"),
            LayoutDir::Mappability => self
                .root
                .join("assets")
                .join("references")
                .join("mappability"),
        }
    }

    pub fn resource_path(&self, resource: &Resource) -> Utf8PathBuf {
        self.dir(resource.dir).join(&resource.file_name)
    }

    pub fn require_dir(&self, dir: LayoutDir) -> Result<Utf8PathBuf, ProvisionError> {
        let path = self.dir(dir);
        if !path.as_std_path().is_dir() {
            return Err(ProvisionError::MissingLayoutDir(path.into_std_path_buf()));
        }
        Ok(path)
    }
}

/// Moves `source` to `dest`. An absent or empty `dest` is replaced; a populated one receives
/// the source's contents (files overwrite). `source` is gone afterwards.
pub fn reconcile_dir(source: &Path, dest: &Path) -> io::Result<()> {
    if dest.is_dir() {
        if is_empty_dir(dest)? {
            fs::remove_dir(dest)?;
            return fs::rename(source, dest);
        }
        merge_dir(source, dest)?;
        return fs::remove_dir_all(source);
    }
    if dest.exists() {
        fs::remove_file(dest)?;
    }
    fs::rename(source, dest)
}

fn merge_dir(source: &Path, dest: &Path) -> io::Result<()> {
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let from = entry.path();
        let to = dest.join(entry.file_name());
        if from.is_dir() {
            if to.is_dir() {
                merge_dir(&from, &to)?;
                continue;
            }
            if to.exists() {
                fs::remove_file(&to)?;
            }
            fs::rename(&from, &to)?;
        } else {
            if to.is_dir() {
                fs::remove_dir_all(&to)?;
            } else if to.exists() {
                fs::remove_file(&to)?;
            }
            fs::rename(&from, &to)?;
        }
    }
    Ok(())
}

fn is_empty_dir(path: &Path) -> io::Result<bool> {
    Ok(fs::read_dir(path)?.next().is_none())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths() {
        let layout = Layout::new(Utf8PathBuf::from("/opt/pipeline"));
        assert!(layout.dir(LayoutDir::Tools).ends_with("pipeline/tools"));
        assert!(
            layout
                .dir(LayoutDir::Sequencing)
                .ends_with("assets/references/sequencing")
        );
        assert!(
            layout
                .dir(LayoutDir::Mappability)
                .ends_with("assets/references/mappability")
        );
        assert!(layout.dir(LayoutDir::Input).ends_with("assets/input"));
    }

    #[test]
    fn reconcile_into_missing_dest_renames() {
        let temp = tempfile::tempdir().unwrap();
        let source = temp.path().join("tool-1.2.3");
        fs::create_dir_all(source.join("bin")).unwrap();
        fs::write(source.join("bin").join("run"), b"x").unwrap();
        let dest = temp.path().join("tool");

        reconcile_dir(&source, &dest).unwrap();

        assert!(dest.join("bin").join("run").is_file());
        assert!(!source.exists());
    }
}
