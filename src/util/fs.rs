use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir_exists(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Create (or truncate) an output file, creating parent directories as needed.
pub fn create_output_file(path: &Path) -> std::io::Result<BufWriter<File>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_dir_exists(parent)?;
        }
    }

    let file = File::create(path).map_err(|e| {
        std::io::Error::new(
            e.kind(),
            format!("Failed to create {}: {}", path.display(), e),
        )
    })?;
    Ok(BufWriter::new(file))
}
