//! Directory-of-files configuration loading (§6, §10.3).
//!
//! Each on-disk directory (`epggrab/opentv/dict`, `epggrab/opentv/prov`)
//! holds one file per id; each file is a sequence of `key = value` lines,
//! in the same spirit as the teacher's `conf::vdr` line-oriented parser:
//! blank lines and `#`-prefixed comments are skipped, and parsing never
//! reaches for `serde`.

use std::{
    collections::BTreeMap,
    fs,
    path::Path,
};

use crate::error::ConfigError;

/// A single parsed `key = value` record, as read from one file in a
/// config directory.
#[derive(Debug, Default, Clone)]
pub struct RecordFields {
    fields: BTreeMap<String, String>,
}

impl RecordFields {
    pub fn parse(contents: &str) -> RecordFields {
        let mut fields = BTreeMap::new();
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                fields.insert(key.trim().to_string(), value.trim().to_string());
            }
        }
        RecordFields { fields }
    }

    pub fn get(&self, key: &'static str) -> Result<&str, ConfigError> {
        self.fields
            .get(key)
            .map(String::as_str)
            .ok_or(ConfigError::MissingField(key))
    }

    pub fn get_u16(&self, key: &'static str) -> Result<u16, ConfigError> {
        self.get(key)?
            .parse()
            .map_err(|source| ConfigError::InvalidNumber { field: key, source })
    }

    /// A comma-separated list of PIDs, e.g. `channel = 1000,1001,1002`.
    pub fn get_pid_list(&self, key: &'static str) -> Result<Vec<u16>, ConfigError> {
        self.get(key)?
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<u16>().map_err(ConfigError::InvalidPidList))
            .collect()
    }
}

/// One entry read from a dictionary description file: a bitstring code
/// mapped to the hex-encoded byte sequence it produces, e.g.
/// `0110 = 48656c6c6f20`.
pub fn parse_dict_file(contents: &str) -> Result<Vec<(String, Vec<u8>)>, ConfigError> {
    let mut entries = Vec::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((code, hex)) = line.split_once('=') else {
            continue;
        };
        let code = code.trim().to_string();
        let bytes = decode_hex(hex.trim())
            .map_err(|source| ConfigError::InvalidNumber { field: "dict code bytes", source })?;
        entries.push((code, bytes));
    }
    Ok(entries)
}

fn decode_hex(s: &str) -> Result<Vec<u8>, std::num::ParseIntError> {
    let mut out = Vec::with_capacity(s.len() / 2);
    let chars: Vec<char> = s.chars().collect();
    for pair in chars.chunks(2) {
        let hex: String = pair.iter().collect();
        out.push(u8::from_str_radix(&hex, 16)?);
    }
    Ok(out)
}

/// Read every regular file directly inside `dir`, yielding `(id, contents)`
/// pairs keyed by file name. Missing directories yield an empty list
/// rather than an error — a fresh install simply has no providers yet.
pub fn read_record_dir(dir: &Path) -> Result<Vec<(String, String)>, ConfigError> {
    let mut out = Vec::new();
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
        Err(e) => return Err(ConfigError::Io(e)),
    };
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let id = entry.file_name().to_string_lossy().into_owned();
        let contents = fs::read_to_string(entry.path())?;
        out.push((id, contents));
    }
    out.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(out)
}
