#![allow(dead_code)]

use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;

use camino::Utf8PathBuf;
use flate2::Compression;
use flate2::write::GzEncoder;

use kira_provision::domain::LayoutDir;
use kira_provision::layout::Layout;

pub fn tar_entries<W: Write>(writer: W, entries: &[(&str, &[u8])]) -> W {
    let mut builder = tar::Builder::new(writer);
    for (name, data) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder.append_data(&mut header, name, *data).unwrap();
    }
    builder.into_inner().unwrap()
}

/// Writes the entry name straight into the header, so names `append_data` refuses (like `..`)
/// still land in the archive.
pub fn tar_gz_raw_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (name, data) in entries {
        let mut header = tar::Header::new_gnu();
        header.as_old_mut().name[..name.len()].copy_from_slice(name.as_bytes());
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append(&header, *data).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

pub fn tar_gz_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let encoder = tar_entries(GzEncoder::new(Vec::new(), Compression::default()), entries);
    encoder.finish().unwrap()
}

pub fn tar_bz2_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let encoder = tar_entries(
        bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default()),
        entries,
    );
    encoder.finish().unwrap()
}

pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in entries {
        writer
            .start_file(*name, zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Creates the full provisioning tree under `root`.
pub fn layout_in(root: &Path) -> Layout {
    let layout = Layout::new(Utf8PathBuf::from_path_buf(root.to_path_buf()).unwrap());
    for dir in [
        LayoutDir::Tools,
        LayoutDir::Databases,
        LayoutDir::Input,
        LayoutDir::References,
        LayoutDir::Sequencing,
        LayoutDir::Mappability,
    ] {
        fs::create_dir_all(layout.dir(dir).as_std_path()).unwrap();
    }
    layout
}

pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
        .collect::<Vec<_>>();
    names.sort();
    names
}
