use thiserror::Error;

/// Application-level errors using thiserror for structured error handling.
///
/// These errors represent domain-specific failures that can occur during
/// operation. They provide context and can be chained with anyhow.

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("No displays found")]
    NoDisplays,

    #[error("Failed to enumerate monitors")]
    MonitorEnumeration(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Region origin ({x}, {y}) is outside every display")]
    RegionOffScreen { x: i32, y: i32 },

    #[error("Region [{x}, {y}, {width}, {height}] exceeds the bounds of its display")]
    RegionOutOfBounds {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    },

    #[error("Failed to capture screen")]
    CaptureFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
}

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Failed to read template directory: {path}")]
    DirectoryUnreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode template image: {path}")]
    DecodeFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration from {path}")]
    LoadFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to save configuration to {path}")]
    SaveFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Could not determine the executable directory")]
    NoExeDir,
}

/// Type alias for application Results using anyhow for context chaining
pub type AppResult<T> = anyhow::Result<T>;
