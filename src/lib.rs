//! Per-person task scores kept in a JSON sheet under the user data directory.

pub mod backup;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod storage;

pub use error::SheetError;
pub use models::{Record, SearchHit, Sheet, TaskMap};
pub use storage::{SheetStore, WriteOptions};
