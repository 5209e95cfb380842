use std::path::PathBuf;

/// Coarse classification of a [`HeatmapError`].
///
/// The pipeline uses it to decide whether a failure is reported on the
/// console and swallowed, or propagated to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Input unreadable, non-numeric, or not rectangular.
    Parse,
    /// No rows or cells after parsing.
    EmptyData,
    /// Required header columns are missing.
    Schema,
    /// A required value could not be read as a number.
    Coercion,
    /// The data parsed but cannot be rendered (every cell missing).
    Invalid,
    /// Drawing, encoding, or writing the output failed.
    Render,
    /// A scene or style document is unreadable or invalid.
    Config,
}

#[derive(Debug, thiserror::Error)]
pub enum HeatmapError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("line {line}: could not convert {value:?} to a number")]
    NotNumeric { line: u64, value: String },

    #[error("line {line}: expected {expected} columns, found {found}")]
    Ragged {
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("no data was loaded from the CSV file")]
    Empty,

    #[error("missing required columns {missing:?}; detected columns: {found:?}")]
    MissingColumns {
        missing: Vec<String>,
        found: Vec<String>,
    },

    #[error("line {line}: column {column} holds {value:?}, which is not a valid number")]
    Coercion {
        line: u64,
        column: String,
        value: String,
    },

    #[error("every cell of the grid is missing; nothing to draw")]
    AllMissing,

    #[error("a {rows}x{cols} grid exceeds the limit of {max} cells")]
    TooLarge { rows: usize, cols: usize, max: usize },

    #[error("render error: {0}")]
    Render(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("failed to export {}: {source}", path.display())]
    Export {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("invalid JSON document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid scene: {0}")]
    Scene(String),
}

impl HeatmapError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HeatmapError::Read { .. }
            | HeatmapError::Csv(_)
            | HeatmapError::NotNumeric { .. }
            | HeatmapError::Ragged { .. } => ErrorKind::Parse,
            HeatmapError::Empty => ErrorKind::EmptyData,
            HeatmapError::MissingColumns { .. } => ErrorKind::Schema,
            HeatmapError::Coercion { .. } => ErrorKind::Coercion,
            HeatmapError::AllMissing | HeatmapError::TooLarge { .. } => ErrorKind::Invalid,
            HeatmapError::Write { .. }
            | HeatmapError::Render(_)
            | HeatmapError::Image(_)
            | HeatmapError::Export { .. } => ErrorKind::Render,
            HeatmapError::Json(_) | HeatmapError::Scene(_) => ErrorKind::Config,
        }
    }

    /// True for failures the pipeline reports on the console and then
    /// returns from without producing an image.
    pub fn is_reportable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Parse | ErrorKind::EmptyData | ErrorKind::Schema | ErrorKind::Invalid
        )
    }
}

/// Maps any displayable drawing error to [`HeatmapError::Render`].
pub(crate) fn render_error<E: std::fmt::Display>(e: E) -> HeatmapError {
    HeatmapError::Render(e.to_string())
}
