use super::DocumentStore;
use crate::errors::BenchError;
use crate::query::{Operation, Outcome, Update, UpdateReport};
use mongodb::bson::{Document, doc};
use mongodb::sync::{Client, Collection, Database};

/// MongoDB over the wire protocol, through the driver's blocking API.
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    /// Connect and ping the server so a bad address fails here rather than mid-run.
    ///
    /// # Errors
    /// Returns an error if the URI is invalid or the server does not answer.
    pub fn connect(uri: &str, database: &str) -> Result<Self, BenchError> {
        let client = Client::with_uri_str(uri)?;
        let db = client.database(database);
        db.run_command(doc! {"ping": 1}).run()?;
        Ok(Self { db })
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.db.collection::<Document>(name)
    }
}

impl DocumentStore for MongoStore {
    fn backend_name(&self) -> &'static str {
        "mongodb"
    }

    fn drop_collection(&self, collection: &str) -> Result<(), BenchError> {
        self.collection(collection).drop().run()?;
        Ok(())
    }

    fn insert_many(&self, collection: &str, docs: Vec<Document>) -> Result<u64, BenchError> {
        if docs.is_empty() {
            return Ok(0);
        }
        let res = self.collection(collection).insert_many(docs).run()?;
        Ok(res.inserted_ids.len() as u64)
    }

    fn count_documents(&self, collection: &str) -> Result<u64, BenchError> {
        Ok(self.collection(collection).count_documents(doc! {}).run()?)
    }

    fn execute(&self, collection: &str, op: &Operation) -> Result<Outcome, BenchError> {
        let col = self.collection(collection);
        match op {
            Operation::Find { filter, projection } => {
                let mut find = col.find(filter.clone());
                if let Some(p) = projection {
                    find = find.projection(p.clone());
                }
                let docs = find.run()?.collect::<Result<Vec<_>, _>>()?;
                Ok(Outcome::Documents(docs))
            }
            Operation::Aggregate { pipeline } => {
                let docs = col.aggregate(pipeline.clone()).run()?.collect::<Result<Vec<_>, _>>()?;
                Ok(Outcome::Documents(docs))
            }
            Operation::UpdateMany { filter, update } => {
                let res = match update {
                    Update::Operators(u) => col.update_many(filter.clone(), u.clone()).run()?,
                    Update::Pipeline(p) => col.update_many(filter.clone(), p.clone()).run()?,
                };
                Ok(Outcome::Updated(UpdateReport {
                    matched: res.matched_count,
                    modified: res.modified_count,
                }))
            }
        }
    }
}
