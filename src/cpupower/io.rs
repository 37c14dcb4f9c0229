// Small helpers for integer sysfs attributes.

use std::fs;
use std::io;
use std::path::Path;

use super::error::PowerError;

pub fn read_int(path: &Path) -> Result<u64, PowerError> {
    let data = fs::read_to_string(path).map_err(|e| PowerError::io(path, e))?;
    parse_int(path, data.trim())
}

/// Reads a whitespace separated list of integers. A missing file yields `None`.
pub fn read_ints(path: &Path) -> Result<Option<Vec<u64>>, PowerError> {
    let Some(data) = read_optional(path)? else {
        return Ok(None);
    };
    data.split_whitespace()
        .map(|v| parse_int(path, v))
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

/// Reads a file, trimmed. A missing file yields `None`.
pub fn read_optional(path: &Path) -> Result<Option<String>, PowerError> {
    match fs::read_to_string(path) {
        Ok(data) => Ok(Some(data.trim().to_string())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(PowerError::io(path, e)),
    }
}

pub fn write_int(path: &Path, val: u64) -> Result<(), PowerError> {
    fs::write(path, val.to_string()).map_err(|e| PowerError::io(path, e))
}

fn parse_int(path: &Path, v: &str) -> Result<u64, PowerError> {
    v.parse().map_err(|_| PowerError::Parse {
        path: path.to_path_buf(),
        value: v.to_string(),
    })
}
