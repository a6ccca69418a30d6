// Order book reconstruction core: no I/O, no async
pub mod types;      // sides, levels, depth snapshot, errors
pub mod levels;     // one side: price -> size
pub mod book;       // both sides + cached best prices
pub mod view;       // read-only queries
pub mod shared;     // lock-wrapped book for multi-task use

pub use book::BookState;
pub use levels::PriceLevelMap;
pub use shared::SharedBook;
pub use types::{BookError, BookResult, DepthSnapshot, Level, LevelUpdate, Side, TopOfBook};
pub use view::BookView;
