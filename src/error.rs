use thiserror::Error;

/// Structural failures while reading a FIGS tree dump.
///
/// Any of these means the whole dump is rejected; no partial forest is
/// ever returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("No trees found in input")]
    EmptyInput,

    /// A decision node is missing its true or false branch (truncated dump
    /// or an indentation mismatch).
    #[error("Invalid tree structure at condition: {condition}")]
    InvalidStructure { condition: String },

    #[error("Invalid leaf value: {line}")]
    InvalidLeaf { line: String },

    /// Lines remain after the root of a tree was fully parsed.
    #[error("Unexpected line after tree #{tree_index} was complete: {line}")]
    TrailingLines { tree_index: usize, line: String },
}

/// Failure to load an [`EngineConfig`](crate::EngineConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Invalid configuration value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
