//! JSON dataset files

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use super::model::PuzzleDataset;
use crate::error::{Error, Result};

pub fn read_dataset(path: &Path) -> Result<PuzzleDataset> {
    let file = File::open(path)
        .map_err(|e| Error::Dataset(format!("cannot open {}: {e}", path.display())))?;
    let dataset: PuzzleDataset = serde_json::from_reader(BufReader::new(file))?;
    info!(path = %path.display(), puzzles = dataset.len(), "loaded puzzle dataset");
    Ok(dataset)
}

/// Writes pretty-printed JSON through a sibling temp file, so readers never
/// see a half-written dataset.
pub fn write_dataset(path: &Path, dataset: &PuzzleDataset) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let tmp = temp_path(path);
    {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        serde_json::to_writer_pretty(&mut writer, dataset)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
    }
    fs::rename(&tmp, path)?;

    info!(path = %path.display(), puzzles = dataset.len(), "wrote puzzle dataset");
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
