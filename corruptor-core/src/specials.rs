use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::{CorruptorError, Result};

/// Parse a list of linedef specials, one number per line. Blank lines and
/// lines starting with `#` are skipped.
pub fn parse_special_pool(text: &str) -> Result<Vec<u16>> {
    let mut pool = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let special = line.parse::<u16>().map_err(|_| {
            CorruptorError::Config(format!(
                "line {}: {line:?} is not a linedef special (expected 0-65535)",
                line_no + 1
            ))
        })?;
        pool.push(special);
    }
    Ok(pool)
}

pub fn load_special_pool(path: impl AsRef<Path>) -> Result<Vec<u16>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => CorruptorError::SpecialsNotFound {
            path: path.to_path_buf(),
        },
        _ => CorruptorError::Io(e),
    })?;
    parse_special_pool(&text)
}
