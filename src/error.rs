//! Error types for the audit feedback tracker

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Connection, query or write failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Excel error: {0}")]
    Excel(#[from] rust_xlsxwriter::XlsxError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Nothing stored for the requested audit numbers. Not a hard failure.
    #[error("No data: {0}")]
    NoData(String),

    /// Logo or chart font that could not be loaded
    #[error("Asset {path} unavailable: {reason}")]
    Asset { path: PathBuf, reason: String },

    #[error("Render error: {0}")]
    Render(String),
}

impl Error {
    pub fn is_no_data(&self) -> bool {
        matches!(self, Error::NoData(_))
    }
}
