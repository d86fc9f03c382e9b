use std::path::PathBuf;
use thiserror::Error;

/// Fatal conditions. Anything that only deserves a log line never reaches
/// this type.
#[derive(Debug, Error)]
pub enum ShufflerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("settings file could not be parsed: {0}")]
    Settings(#[from] serde_json::Error),

    #[error("resource catalog not found: {}", .0.display())]
    CatalogMissing(PathBuf),

    #[error("no regions found in {}", .0.display())]
    NoRegions(PathBuf),

    #[error("region {0} is declared more than once")]
    DuplicateRegion(String),

    #[error("no static resources found in {}", .0.display())]
    NoStaticResources(PathBuf),

    #[error("no dynamic resources found in {}", .0.display())]
    NoDynamicResources(PathBuf),

    #[error("{}:{line}: building \"{building}\" is not followed by a level line", .file.display())]
    MissingHistoryLevel {
        file: PathBuf,
        line: usize,
        building: String,
    },

    #[error("{}:{line}: company requirement has no candidate regions", .file.display())]
    CompanyWithoutRegions { file: PathBuf, line: usize },

    #[error("{}:{line}: company requirement has no candidate resources", .file.display())]
    CompanyWithoutResources { file: PathBuf, line: usize },

    #[error("version '{0}' has no saved resource list")]
    MissingVersion(String),

    #[error("invalid version name '{0}'")]
    InvalidVersionName(String),
}

pub type Result<T> = std::result::Result<T, ShufflerError>;
