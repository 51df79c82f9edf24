//! SQLite driver.
//!
//! - [`SqliteReader`]: source introspection and batched row streaming

mod reader;

pub use reader::SqliteReader;
