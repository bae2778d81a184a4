use plotters::drawing::DrawingAreaErrorKind;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading, segmenting, or plotting the glucose series
#[derive(Error, Debug)]
pub enum GlucoseError {
    /// The input file could not be opened or read
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse csv: {0}")]
    Csv(#[from] csv::Error),

    /// The file ends before the header line
    #[error("no header line found in {0}")]
    MissingHeader(PathBuf),

    #[error("column not found in header: {0}")]
    MissingColumn(String),

    /// Any error reported by the plotting backend
    #[error("failed to draw chart: {0}")]
    Render(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl<E> From<DrawingAreaErrorKind<E>> for GlucoseError
where
    E: std::error::Error + Send + Sync,
{
    fn from(e: DrawingAreaErrorKind<E>) -> Self {
        GlucoseError::Render(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GlucoseError>;
