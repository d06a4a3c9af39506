//! Rename audit CSV.

use std::io::Write;
use std::path::Path;

use crate::error::{PrepError, Result};
use crate::naming::RenameMap;

use super::create_artifact;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Write the pairs of `map` whose name changed, under an `original,mplus` header.
///
/// The file starts with a UTF-8 byte order mark so spreadsheet programs
/// detect the encoding of non-ASCII originals.
pub fn write_rename_audit(map: &RenameMap, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let mut file = create_artifact(path)?;
    file.write_all(UTF8_BOM).map_err(|e| PrepError::io(path, e))?;

    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(["original", "mplus"])?;
    for (original, generated) in map.changed() {
        writer.write_record([original, generated])?;
    }
    writer.flush().map_err(|e| PrepError::io(path, e))?;

    tracing::debug!(
        path = %path.display(),
        renamed = map.changed().count(),
        "wrote rename audit"
    );
    Ok(())
}
