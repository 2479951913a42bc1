use std::num::ParseIntError;

use thiserror::Error;

//
// -----

/// Raised while loading a single dictionary or provider record from
/// `epggrab/opentv/{dict,prov}`. The loader logs and skips the offending
/// record rather than propagating this out of `load_dir`.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field '{0}'")]
    MissingField(&'static str),
    #[error("dictionary '{0}' not found in registry")]
    UnknownDictionary(String),
    #[error("invalid PID in list: {0}")]
    InvalidPidList(ParseIntError),
    #[error("invalid numeric field '{field}': {source}")]
    InvalidNumber {
        field: &'static str,
        source: ParseIntError,
    },
    #[error("I/O error reading configuration: {0}")]
    Io(#[from] std::io::Error),
}

//
// -----

/// Raised by [`crate::huffman::HuffmanTree::build`] when a code collides
/// with an already-inserted non-terminal path.
#[derive(Error, Debug)]
pub enum HuffmanBuildError {
    #[error("code '{0}' collides with an existing non-terminal path")]
    CodeCollision(String),
}
