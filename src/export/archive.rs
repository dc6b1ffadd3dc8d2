//! Zip archiving for export artifacts.

use eyre::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::ZipWriter;

/// Deflate one file into `{input}.zip` (or `dest` when given).
///
/// The archive holds exactly one entry, named after the input file.
pub fn zip_single_file(input: &Path, dest: Option<PathBuf>) -> Result<PathBuf> {
    let entry_name = input
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| eyre::eyre!("Input path has no usable file name: {}", input.display()))?
        .to_string();

    let zip_path = dest.unwrap_or_else(|| {
        let mut os = input.as_os_str().to_os_string();
        os.push(".zip");
        PathBuf::from(os)
    });

    let bytes = std::fs::read(input)
        .with_context(|| format!("Failed to read file for zipping: {}", input.display()))?;

    let file = std::fs::File::create(&zip_path)
        .with_context(|| format!("Failed to create archive: {}", zip_path.display()))?;
    let mut zip = ZipWriter::new(file);
    let options = zip::write::FileOptions::<()>::default()
        .compression_method(zip::CompressionMethod::Deflated);

    zip.start_file(entry_name.as_str(), options)?;
    zip.write_all(&bytes)?;
    zip.finish()?;

    log::info!("Zipped file at: {}", zip_path.display());
    Ok(zip_path)
}
