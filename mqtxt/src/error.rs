use crate::FeatureKind;
use std::path::PathBuf;

/// Errors that can occur while reading MaxQuant output or maintaining counts
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Expected output file is absent from a sample folder
    #[error("File not found: {}", .path.display())]
    NotFound { path: PathBuf },

    /// A declared column holds a value that cannot be cast to its type
    #[error("{}:{line}: column '{column}' cannot hold value '{value}'", .path.display())]
    SchemaMismatch {
        path: PathBuf,
        column: String,
        line: usize,
        value: String,
    },

    /// A column needed for feature selection is not part of the table
    #[error("{}: missing required column '{column}'", .path.display())]
    MissingColumn { path: PathBuf, column: String },

    /// Requested top-level section is not present in a parameter file
    #[error("{}: no section named '{section}'", .path.display())]
    MissingSection { path: PathBuf, section: String },

    /// Eligible folder name without an entry in the folder-path registry
    #[error("Folder '{0}' is not listed in the folder registry")]
    UnknownFolder(String),

    /// Folder or sample id that cannot name a dump file inside the dump directory
    #[error("Invalid folder id '{0}'")]
    InvalidFolderId(String),

    /// Persisted state was written for another feature kind
    #[error("{}: state holds {found} counts, expected {expected}", .path.display())]
    KindMismatch {
        path: PathBuf,
        expected: FeatureKind,
        found: FeatureKind,
    },

    /// Renaming dump keys on a counter that resumed from persisted state
    #[error("Renaming dumps requires a counter created in overwrite mode")]
    RenameWithoutOverwrite,

    /// A persisted feature key could not be parsed back
    #[error("Invalid feature key: {0}")]
    InvalidKey(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("XML attribute error: {0}")]
    XmlAttribute(#[from] quick_xml::events::attributes::AttrError),

    #[error("Failed to persist {}: {}", .0.file.path().display(), .0.error)]
    Persist(#[from] tempfile::PersistError),
}

impl Error {
    /// Per-folder failures skip the folder instead of aborting a run
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::NotFound { .. }
                | Error::SchemaMismatch { .. }
                | Error::MissingColumn { .. }
                | Error::InvalidFolderId(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
