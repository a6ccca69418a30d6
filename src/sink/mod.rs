// Output collaborators fed from the book's read side
use thiserror::Error;

pub mod csv_sink;   // top-of-book rows for the live plot
pub mod depth_json; // atomic depth.json dumps

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type SinkResult<T> = Result<T, SinkError>;
