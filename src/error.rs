use std::path::PathBuf;

use thiserror::Error;

use crate::model::HostId;

/// Failures while loading or validating a topology model.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to read model file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid model JSON")]
    Parse(#[from] serde_json::Error),

    #[error("host {0} appears more than once in the model")]
    DuplicateHost(HostId),
}

/// Fatal configuration errors for the source-target matrix engine.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MatrixError {
    #[error("{grid} grid is not square ({rows} rows, row {row} has {len} columns)")]
    NotSquare {
        grid: &'static str,
        rows: usize,
        row: usize,
        len: usize,
    },

    #[error("baseline grid is {baseline}x{baseline} but query grid is {query}x{query}")]
    SizeMismatch { baseline: usize, query: usize },

    #[error("matrix has {size} rows but {hosts} host ids were supplied")]
    HostCount { size: usize, hosts: usize },
}

/// A reply arrived for a known request but its payload had the wrong shape.
#[derive(Debug, Error)]
#[error("reply payload for {purpose} has unexpected shape")]
pub struct ReplyError {
    pub purpose: &'static str,
    #[source]
    pub source: serde_json::Error,
}

/// Malformed attack-path trace strings.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TraceError {
    #[error("empty attack-path trace")]
    Empty,

    #[error("trace step {step:?} does not have the form priv@host#cve#priv@host")]
    Step { step: String },

    #[error("host {value:?} in trace step is not a number")]
    Host { value: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON in {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
