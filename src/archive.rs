use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use tracing::{debug, info};
use zip::ZipArchive;

use crate::domain::{ArchiveFormat, NormalizeRule};
use crate::error::ProvisionError;
use crate::layout::reconcile_dir;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    pub target_dir: PathBuf,
    pub normalized: Option<PathBuf>,
}

/// Extracts `archive` into `target_dir`, applies `normalize`, then deletes the archive.
/// On any failure the archive is left in place.
pub fn install_archive(
    archive: &Path,
    format: ArchiveFormat,
    target_dir: &Path,
    normalize: Option<&NormalizeRule>,
) -> Result<InstallOutcome, ProvisionError> {
    info!(archive = %archive.display(), %format, target = %target_dir.display(), "extracting");
    let roots = extract(archive, format, target_dir)?;

    let normalized = match normalize {
        Some(rule) => Some(normalize_dir(target_dir, rule, &roots)?),
        None => None,
    };

    fs::remove_file(archive).map_err(|err| {
        ProvisionError::Filesystem(format!("remove {}: {err}", archive.display()))
    })?;
    Ok(InstallOutcome {
        target_dir: target_dir.to_path_buf(),
        normalized,
    })
}

/// Unpacks `archive` into `target_dir` and returns the top-level names it created. Any entry
/// that is absolute or climbs with `..` fails the whole extraction.
pub fn extract(
    archive: &Path,
    format: ArchiveFormat,
    target_dir: &Path,
) -> Result<BTreeSet<String>, ProvisionError> {
    let file = fs::File::open(archive).map_err(|err| extraction_error(archive, err))?;
    match format {
        ArchiveFormat::TarGz => unpack_tar(GzDecoder::new(file), archive, target_dir),
        ArchiveFormat::TarBz2 => unpack_tar(BzDecoder::new(file), archive, target_dir),
        ArchiveFormat::Zip => unpack_zip(file, archive, target_dir),
    }
}

fn unpack_tar<R: Read>(
    reader: R,
    archive: &Path,
    target_dir: &Path,
) -> Result<BTreeSet<String>, ProvisionError> {
    let mut tar = tar::Archive::new(reader);
    tar.set_overwrite(true);
    let mut roots = BTreeSet::new();

    let entries = tar.entries().map_err(|err| extraction_error(archive, err))?;
    for entry in entries {
        let mut entry = entry.map_err(|err| extraction_error(archive, err))?;
        let relative = entry
            .path()
            .map_err(|err| extraction_error(archive, err))?
            .into_owned();
        if let Some(root) = entry_root(archive, &relative)? {
            roots.insert(root);
        }
        entry
            .unpack_in(target_dir)
            .map_err(|err| extraction_error(archive, err))?;
    }
    Ok(roots)
}

fn unpack_zip(
    file: fs::File,
    archive: &Path,
    target_dir: &Path,
) -> Result<BTreeSet<String>, ProvisionError> {
    let mut zip = ZipArchive::new(file).map_err(|err| extraction_error(archive, err))?;
    let mut roots = BTreeSet::new();

    for i in 0..zip.len() {
        let mut entry = zip
            .by_index(i)
            .map_err(|err| extraction_error(archive, err))?;
        let relative = entry.enclosed_name().ok_or_else(|| {
            extraction_error(archive, format!("entry escapes target: {}", entry.name()))
        })?;
        if let Some(root) = entry_root(archive, &relative)? {
            roots.insert(root);
        }
        let entry_path = target_dir.join(&relative);

        if entry.is_dir() {
            fs::create_dir_all(&entry_path).map_err(|err| extraction_error(archive, err))?;
            continue;
        }
        if let Some(parent) = entry_path.parent() {
            fs::create_dir_all(parent).map_err(|err| extraction_error(archive, err))?;
        }
        let mut outfile =
            fs::File::create(&entry_path).map_err(|err| extraction_error(archive, err))?;
        io::copy(&mut entry, &mut outfile).map_err(|err| extraction_error(archive, err))?;
    }
    Ok(roots)
}

fn entry_root(archive: &Path, relative: &Path) -> Result<Option<String>, ProvisionError> {
    let mut root = None;
    for component in relative.components() {
        match component {
            Component::CurDir => {}
            Component::Normal(name) => {
                if root.is_none() {
                    root = Some(name.to_string_lossy().to_string());
                }
            }
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(extraction_error(
                    archive,
                    format!("entry escapes target: {}", relative.display()),
                ));
            }
        }
    }
    Ok(root)
}

pub fn normalize_dir(
    target_dir: &Path,
    rule: &NormalizeRule,
    extracted: &BTreeSet<String>,
) -> Result<PathBuf, ProvisionError> {
    let canonical = target_dir.join(&rule.canonical);
    // only what this archive produced; siblings sharing the prefix stay untouched
    let versioned = extracted
        .iter()
        .filter(|name| **name != rule.canonical && name.starts_with(&rule.prefix))
        .map(|name| target_dir.join(name))
        .filter(|path| path.is_dir())
        .collect::<Vec<_>>();

    for source in versioned {
        debug!(from = %source.display(), to = %canonical.display(), "normalizing tool directory");
        reconcile_dir(&source, &canonical).map_err(|err| {
            ProvisionError::Filesystem(format!(
                "normalize {} -> {}: {err}",
                source.display(),
                canonical.display()
            ))
        })?;
    }

    if !canonical.is_dir() {
        return Err(ProvisionError::Filesystem(format!(
            "no directory matching {}* in {}",
            rule.prefix,
            target_dir.display()
        )));
    }
    Ok(canonical)
}

fn extraction_error(archive: &Path, err: impl std::fmt::Display) -> ProvisionError {
    ProvisionError::Extraction {
        archive: archive.to_path_buf(),
        message: err.to_string(),
    }
}
