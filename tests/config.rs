use std::fs;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use kira_provision::config::{Config, ConfigLoader, MANIFEST_FILE, default_references};
use kira_provision::domain::{ArchiveFormat, LayoutDir, RemoteSource};
use kira_provision::error::ProvisionError;

#[test]
fn defaults_cover_every_section() {
    let resolved = ConfigLoader::resolve_config(Config::default(), None).unwrap();
    assert_eq!(resolved.primary_tool.format, Some(ArchiveFormat::TarBz2));
    assert_eq!(
        resolved.primary_tool.normalize.as_ref().map(|rule| rule.canonical.as_str()),
        Some("strelka")
    );
    assert_eq!(resolved.annotation.dir_name, "annovar");
    assert!(!resolved.annotation.datasets.is_empty());
    assert!(resolved.databases.iter().all(|db| db.dir == LayoutDir::Databases));
    assert!(resolved.databases.iter().all(|db| db.format.is_none()));
    assert_eq!(resolved.stats_interpreter, "Rscript");

    let dirs = default_references()
        .iter()
        .map(|resource| resource.dir)
        .collect::<Vec<_>>();
    assert_eq!(
        dirs,
        vec![LayoutDir::Sequencing, LayoutDir::Sequencing, LayoutDir::Mappability]
    );
}

#[test]
fn manifest_in_root_overrides_sections() {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    fs::write(
        temp.path().join(MANIFEST_FILE),
        r#"{
            "annotation_tool": { "url": "https://mirror.example.org/annovar.latest.tar.gz" },
            "references": [
                {
                    "source": { "confirm_id": "abc123" },
                    "file_name": "genome.tar.gz",
                    "dir": "sequencing",
                    "format": "tar.gz"
                }
            ]
        }"#,
    )
    .unwrap();

    let resolved = ConfigLoader::resolve(None, &root).unwrap();

    assert_eq!(
        resolved.annotation.url.as_deref(),
        Some("https://mirror.example.org/annovar.latest.tar.gz")
    );
    assert_eq!(resolved.references.len(), 1);
    assert_eq!(
        resolved.references[0].source,
        RemoteSource::ConfirmId("abc123".to_string())
    );
    assert_eq!(resolved.examples.len(), 2);
    assert!(resolved.source.is_some());
}

#[test]
fn missing_explicit_manifest_is_an_error() {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    let missing = temp.path().join("nope.json");
    let err = ConfigLoader::resolve(Some(missing.as_path()), &root).unwrap_err();
    assert_matches!(err, ProvisionError::ConfigRead(_));
}

#[test]
fn manifest_escaping_the_layout_is_rejected() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("manifest.json");
    fs::write(
        &path,
        r#"{ "databases": [ { "source": { "url": "https://example.org/x" }, "file_name": "../../x", "dir": "databases" } ] }"#,
    )
    .unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    let err = ConfigLoader::resolve(Some(path.as_path()), &root).unwrap_err();
    assert_matches!(err, ProvisionError::InvalidResource(_));
}

#[test]
fn malformed_manifest_reports_parse_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("manifest.json");
    fs::write(&path, "{ not json").unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    assert_matches!(
        ConfigLoader::resolve(Some(path.as_path()), &root),
        Err(ProvisionError::ConfigParse(_))
    );
}
