pub mod config;
pub mod engine;
pub mod market_data;
pub mod sink;
pub mod telemetry;

pub use engine::{BookError, BookState, BookView, DepthSnapshot, Level, LevelUpdate, SharedBook, Side};
