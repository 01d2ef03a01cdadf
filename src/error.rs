//! Custom error types for DOMDIFF.

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Failed to read file {path}: {source}")]
    ReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Markup in {path} is not valid UTF-8: {source}")]
    InvalidEncoding {
        path: String,
        #[source]
        source: std::str::Utf8Error,
    },

    #[error("Markup in {path} contains binary content at byte {offset}")]
    BinaryContent { path: String, offset: usize },

    #[error("Document in {path} is nested deeper than {limit} levels")]
    TooDeep { path: String, limit: usize },

    #[error("Invalid JSON in {path}: {source}")]
    JsonError {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid YAML in {path}: {source}")]
    YamlError {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid TOML in {path}: {source}")]
    TomlError {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Could not detect file format for {path}")]
    UnknownFormat { path: String },
}

/// Sample metadata failed validation at the report boundary.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Missing required metadata field: {field}")]
    MissingField { field: &'static str },

    #[error("Invalid timestamp {value:?} (expected RFC 3339): {source}")]
    InvalidTimestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectorError {
    #[error("Empty selector")]
    Empty,

    #[error("Invalid selector {selector:?}: {message}")]
    Invalid { selector: String, message: String },

    #[error("Unexpected {found:?} at position {position} in selector {selector:?}")]
    Unexpected {
        selector: String,
        position: usize,
        found: char,
    },

    #[error("Unterminated {what} in selector {selector:?}")]
    Unterminated {
        selector: String,
        what: &'static str,
    },

    #[error("Invalid position {value:?} in selector {selector:?}")]
    InvalidPosition { selector: String, value: String },
}

/// The screenshot collaborator could not deliver an artifact.
#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    #[error("Screenshot collaborator unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("No screenshot artifact at {path}")]
    MissingArtifact { path: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApplyError {
    #[error("No node at path {path} while replaying edit script")]
    UnknownPath { path: String },

    #[error("Index {index} out of bounds under {parent} (has {len} children)")]
    IndexOutOfBounds {
        parent: String,
        index: usize,
        len: usize,
    },

    #[error("Cannot detach the root node")]
    RootDetached,
}

#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("Unknown output format: {format}")]
    UnknownFormat { format: String },

    #[error("Failed to serialize to JSON: {source}")]
    JsonSerializationError {
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum DomDiffError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Output(#[from] OutputError),

    #[error(transparent)]
    Selector(#[from] SelectorError),

    #[error("Invalid configuration: {message}")]
    ConfigError { message: String },
}

impl ParseError {
    pub fn file_not_found(path: impl Into<String>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    pub fn read_error(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::ReadError {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_encoding(path: impl Into<String>, source: std::str::Utf8Error) -> Self {
        Self::InvalidEncoding {
            path: path.into(),
            source,
        }
    }

    pub fn json_error(path: impl Into<String>, source: serde_json::Error) -> Self {
        Self::JsonError {
            path: path.into(),
            source,
        }
    }

    pub fn yaml_error(path: impl Into<String>, source: serde_yaml::Error) -> Self {
        Self::YamlError {
            path: path.into(),
            source,
        }
    }

    pub fn toml_error(path: impl Into<String>, source: toml::de::Error) -> Self {
        Self::TomlError {
            path: path.into(),
            source,
        }
    }

    pub fn unknown_format(path: impl Into<String>) -> Self {
        Self::UnknownFormat { path: path.into() }
    }
}

impl DomDiffError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::file_not_found("before.html");
        assert_eq!(err.to_string(), "File not found: before.html");
    }

    #[test]
    fn test_binary_content_error() {
        let err = ParseError::BinaryContent {
            path: "<input>".to_string(),
            offset: 12,
        };
        assert!(err.to_string().contains("binary content"));
        assert!(err.to_string().contains("12"));
    }

    #[test]
    fn test_schema_error_display() {
        let err = SchemaError::MissingField { field: "sample_id" };
        assert_eq!(
            err.to_string(),
            "Missing required metadata field: sample_id"
        );
    }

    #[test]
    fn test_domdiff_error_from_parse_error() {
        let parse_err = ParseError::file_not_found("before.html");
        let err: DomDiffError = parse_err.into();
        assert!(matches!(err, DomDiffError::Parse(_)));
    }

    #[test]
    fn test_config_error() {
        let err = DomDiffError::config("min_confidence out of range");
        assert!(err.to_string().contains("Invalid configuration"));
    }
}
