//! Synthetic-data benchmark comparing two denormalization layouts in a document store.
//!
//! Persons and companies are generated with `fake`, stored either person-centric
//! (company embedded in every person) or company-centric (employees embedded in
//! every company), and four canned operations are timed against each layout.

pub mod bench;
pub mod config;
pub mod errors;
pub mod generate;
pub mod layout;
pub mod logger;
pub mod model;
pub mod query;
pub mod store;
pub mod utils;
pub mod verify;

pub use bench::{BenchReport, LayoutReport, QueryTiming, RunOptions};
pub use config::{Backend, BenchConfig};
pub use errors::BenchError;
pub use layout::{Layout, QueryKind};
pub use store::{DocumentStore, MemoryStore, MongoStore};

#[doc(hidden)]
pub mod __private {
    pub use log;
    pub use serde_json;
}
