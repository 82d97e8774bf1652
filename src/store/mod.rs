//! Document stores the benchmark can run against.

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

use crate::config::{Backend, BenchConfig};
use crate::errors::BenchError;
use crate::query::{Operation, Outcome};
use mongodb::bson::{Document, doc};

/// The operations the benchmark needs from a document database.
pub trait DocumentStore {
    fn backend_name(&self) -> &'static str;

    /// Drop a collection. Dropping a missing collection is not an error.
    fn drop_collection(&self, collection: &str) -> Result<(), BenchError>;

    /// Insert documents, assigning `_id` where missing. Returns the number inserted.
    fn insert_many(&self, collection: &str, docs: Vec<Document>) -> Result<u64, BenchError>;

    fn count_documents(&self, collection: &str) -> Result<u64, BenchError>;

    /// Run a declarative operation. Reads drain the full result set.
    fn execute(&self, collection: &str, op: &Operation) -> Result<Outcome, BenchError>;

    /// Every document in the collection.
    fn find_all(&self, collection: &str) -> Result<Vec<Document>, BenchError> {
        let op = Operation::Find { filter: doc! {}, projection: None };
        match self.execute(collection, &op)? {
            Outcome::Documents(d) => Ok(d),
            Outcome::Updated(_) => Err(BenchError::Query("find returned an update report".into())),
        }
    }
}

/// Open the store selected by `cfg.backend`.
///
/// # Errors
/// Returns an error if the MongoDB server cannot be reached.
pub fn open_store(cfg: &BenchConfig) -> Result<Box<dyn DocumentStore>, BenchError> {
    match cfg.backend {
        Backend::Mongodb => {
            let uri = cfg.connection.uri();
            log::info!("connecting to {uri} (database {})", cfg.database.name);
            Ok(Box::new(MongoStore::connect(&uri, &cfg.database.name)?))
        }
        Backend::Memory => {
            log::info!("using in-process memory store");
            Ok(Box::new(MemoryStore::new()))
        }
    }
}
