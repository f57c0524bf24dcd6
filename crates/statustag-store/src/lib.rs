//! # statustag-store
//!
//! Where devices find their active image.
//!
//! - [`SqliteImageSource`]: `devices` + `images` tables behind [`Database`]
//! - [`MemoryImageSource`]: in-process maps for tests and ephemeral servers

pub mod database;
pub mod devices;
pub mod error;
pub mod images;
pub mod memory;
pub mod schema;
pub mod source;

pub use database::Database;
pub use error::StoreError;
pub use memory::MemoryImageSource;
pub use source::SqliteImageSource;
