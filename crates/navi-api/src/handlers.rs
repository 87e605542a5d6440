//! Request handlers.

pub mod health;
pub mod ingest;
pub mod sessions;
pub mod summary;

pub use health::*;
pub use ingest::*;
pub use sessions::*;
pub use summary::*;
