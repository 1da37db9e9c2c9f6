use std::fs;
use std::path::{Path, PathBuf};

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::domain::{ArchiveFormat, LayoutDir, NormalizeRule, RemoteSource, Resource, is_plain_name};
use crate::error::ProvisionError;
use crate::tools::AnnotationDataset;

pub const MANIFEST_FILE: &str = "kira-provision.json";
pub const ANNOTATION_URL_ENV: &str = "KIRA_ANNOTATION_URL";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub primary_tool: Option<Resource>,
    #[serde(default)]
    pub annotation_tool: Option<AnnotationToolEntry>,
    #[serde(default)]
    pub databases: Option<Vec<Resource>>,
    #[serde(default)]
    pub references: Option<Vec<Resource>>,
    #[serde(default)]
    pub examples: Option<Vec<Resource>>,
    #[serde(default)]
    pub stats: Option<StatsEntry>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct AnnotationToolEntry {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub format: Option<ArchiveFormat>,
    #[serde(default)]
    pub dir_name: Option<String>,
    #[serde(default)]
    pub build: Option<String>,
    #[serde(default)]
    pub datasets: Option<Vec<AnnotationDataset>>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct StatsEntry {
    #[serde(default)]
    pub interpreter: Option<String>,
    #[serde(default)]
    pub script: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AnnotationSettings {
    pub url: Option<String>,
    pub file_name: String,
    pub format: ArchiveFormat,
    pub dir_name: String,
    pub build: String,
    pub datasets: Vec<AnnotationDataset>,
}

impl AnnotationSettings {
    pub fn resource(&self, url: &str) -> Resource {
        Resource {
            source: RemoteSource::Url(url.to_string()),
            file_name: self.file_name.clone(),
            dir: LayoutDir::Tools,
            format: Some(self.format),
            normalize: Some(NormalizeRule {
                prefix: self.dir_name.clone(),
                canonical: self.dir_name.clone(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub source: Option<PathBuf>,
    pub primary_tool: Resource,
    pub annotation: AnnotationSettings,
    pub databases: Vec<Resource>,
    pub references: Vec<Resource>,
    pub examples: Vec<Resource>,
    pub stats_interpreter: String,
    /// Relative paths resolve against the layout root.
    pub stats_script: Utf8PathBuf,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&Path>, root: &Utf8Path) -> Result<ResolvedConfig, ProvisionError> {
        let config_path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => {
                let candidate = root.join(MANIFEST_FILE).into_std_path_buf();
                candidate.exists().then_some(candidate)
            }
        };

        let Some(config_path) = config_path else {
            return Self::resolve_config(Config::default(), None);
        };
        let content = fs::read_to_string(&config_path)
            .map_err(|_| ProvisionError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| ProvisionError::ConfigParse(err.to_string()))?;
        Self::resolve_config(config, Some(config_path))
    }

    pub fn resolve_config(
        config: Config,
        source: Option<PathBuf>,
    ) -> Result<ResolvedConfig, ProvisionError> {
        let schema_version = config.schema_version.unwrap_or(1);
        let annotation_entry = config.annotation_tool.unwrap_or_default();
        let annotation = AnnotationSettings {
            url: annotation_entry
                .url
                .filter(|url| !url.trim().is_empty()),
            file_name: annotation_entry
                .file_name
                .unwrap_or_else(|| "annovar.latest.tar.gz".to_string()),
            format: annotation_entry.format.unwrap_or(ArchiveFormat::TarGz),
            dir_name: annotation_entry
                .dir_name
                .unwrap_or_else(|| "annovar".to_string()),
            build: annotation_entry.build.unwrap_or_else(|| "hg38".to_string()),
            datasets: annotation_entry
                .datasets
                .unwrap_or_else(default_annotation_datasets),
        };
        let stats = config.stats.unwrap_or_default();

        let resolved = ResolvedConfig {
            schema_version,
            source,
            primary_tool: config.primary_tool.unwrap_or_else(default_primary_tool),
            annotation,
            databases: config.databases.unwrap_or_else(default_databases),
            references: config.references.unwrap_or_else(default_references),
            examples: config.examples.unwrap_or_else(default_examples),
            stats_interpreter: stats.interpreter.unwrap_or_else(|| "Rscript".to_string()),
            stats_script: Utf8PathBuf::from(
                stats
                    .script
                    .unwrap_or_else(|| "scripts/setup_databases.R".to_string()),
            ),
        };
        resolved.validate()?;
        Ok(resolved)
    }
}

impl ResolvedConfig {
    fn validate(&self) -> Result<(), ProvisionError> {
        self.primary_tool.validate()?;
        for name in [&self.annotation.file_name, &self.annotation.dir_name] {
            if !is_plain_name(name) {
                return Err(ProvisionError::InvalidResource(format!(
                    "annotation tool names must be plain file names: {name:?}"
                )));
            }
        }
        for resource in self
            .databases
            .iter()
            .chain(&self.references)
            .chain(&self.examples)
        {
            resource.validate()?;
        }
        if self.annotation.datasets.iter().any(|d| d.name.trim().is_empty()) {
            return Err(ProvisionError::InvalidResource(
                "annotation dataset with empty name".to_string(),
            ));
        }
        Ok(())
    }
}

fn url_resource(
    url: &str,
    dir: LayoutDir,
    format: Option<ArchiveFormat>,
    normalize: Option<NormalizeRule>,
) -> Resource {
    let file_name = url.rsplit('/').next().unwrap_or(url).to_string();
    Resource {
        source: RemoteSource::Url(url.to_string()),
        file_name,
        dir,
        format,
        normalize,
    }
}

fn confirm_resource(id: &str, file_name: &str, dir: LayoutDir, format: ArchiveFormat) -> Resource {
    Resource {
        source: RemoteSource::ConfirmId(id.to_string()),
        file_name: file_name.to_string(),
        dir,
        format: Some(format),
        normalize: None,
    }
}

pub fn default_primary_tool() -> Resource {
    url_resource(
        "https://github.com/Illumina/strelka/releases/download/v2.9.10/strelka-2.9.10.centos6_x86_64.tar.bz2",
        LayoutDir::Tools,
        Some(ArchiveFormat::TarBz2),
        Some(NormalizeRule {
            prefix: "strelka-".to_string(),
            canonical: "strelka".to_string(),
        }),
    )
}

pub fn default_annotation_datasets() -> Vec<AnnotationDataset> {
    let annovar = |name: &str| AnnotationDataset {
        name: name.to_string(),
        webfrom: Some("annovar".to_string()),
    };
    vec![
        annovar("refGene"),
        AnnotationDataset {
            name: "cytoBand".to_string(),
            webfrom: None,
        },
        annovar("avsnp150"),
        annovar("gnomad30_genome"),
        annovar("clinvar_20221231"),
        annovar("cosmic70"),
        annovar("dbnsfp42c"),
    ]
}

pub fn default_databases() -> Vec<Resource> {
    vec![
        url_resource(
            "https://ftp.ncbi.nih.gov/snp/organisms/human_9606_b151_GRCh38p7/VCF/common_all_20180418.vcf.gz",
            LayoutDir::Databases,
            None,
            None,
        ),
        url_resource(
            "https://ftp.ncbi.nih.gov/snp/organisms/human_9606_b151_GRCh38p7/VCF/common_all_20180418.vcf.gz.tbi",
            LayoutDir::Databases,
            None,
            None,
        ),
        url_resource(
            "https://www.cancerhotspots.org/files/hotspots_v2.xls",
            LayoutDir::Databases,
            None,
            None,
        ),
        url_resource(
            "https://www.dgidb.org/data/monthly_tsvs/2022-Feb/interactions.tsv",
            LayoutDir::Databases,
            None,
            None,
        ),
    ]
}

pub fn default_references() -> Vec<Resource> {
    vec![
        url_resource(
            "https://hgdownload.soe.ucsc.edu/goldenPath/hg38/bigZips/hg38.chromFa.tar.gz",
            LayoutDir::Sequencing,
            Some(ArchiveFormat::TarGz),
            None,
        ),
        confirm_resource(
            "1Z2TtV4vhSjHqRaDuZw6bUQxQGbzhqg6Z",
            "hg38_genome.tar.gz",
            LayoutDir::Sequencing,
            ArchiveFormat::TarGz,
        ),
        confirm_resource(
            "1ZRiYwhpfXr8XUJEEqFsu5zsqbT_wfs9v",
            "hg38_mappability.tar.gz",
            LayoutDir::Mappability,
            ArchiveFormat::TarGz,
        ),
    ]
}

pub fn default_examples() -> Vec<Resource> {
    vec![
        confirm_resource(
            "1W3aL2Tz0D9tc6c0uTqkMrq5J9xd8MqjF",
            "capture_regions.tar.gz",
            LayoutDir::References,
            ArchiveFormat::TarGz,
        ),
        confirm_resource(
            "1dA4cWjNY7R4kj3nV0j2xLbE8rp5vKqTg",
            "example_input.tar.gz",
            LayoutDir::Input,
            ArchiveFormat::TarGz,
        ),
    ]
}
