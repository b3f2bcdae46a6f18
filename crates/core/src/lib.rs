#![forbid(unsafe_code)]

pub mod catalog;
pub mod error;
pub mod merge;
pub mod model;
pub mod time;

pub use catalog::TenseCatalog;
pub use error::Error;
pub use time::Clock;
