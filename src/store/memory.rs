use super::DocumentStore;
use crate::errors::BenchError;
use crate::query::{self, Operation, Outcome};
use mongodb::bson::{Bson, Document, oid::ObjectId};
use parking_lot::RwLock;
use std::collections::HashMap;

/// In-process store. Collections are plain vectors in insertion order; the
/// query module evaluates operations against them. Nothing is persisted.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn list_collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.read().keys().cloned().collect();
        names.sort();
        names
    }
}

fn with_id(doc: Document) -> Document {
    if doc.contains_key("_id") {
        return doc;
    }
    let mut out = Document::new();
    out.insert("_id", Bson::ObjectId(ObjectId::new()));
    for (k, v) in doc {
        out.insert(k, v);
    }
    out
}

impl DocumentStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn drop_collection(&self, collection: &str) -> Result<(), BenchError> {
        self.collections.write().remove(collection);
        Ok(())
    }

    fn insert_many(&self, collection: &str, docs: Vec<Document>) -> Result<u64, BenchError> {
        let n = docs.len() as u64;
        let mut cols = self.collections.write();
        cols.entry(collection.to_string()).or_default().extend(docs.into_iter().map(with_id));
        Ok(n)
    }

    fn count_documents(&self, collection: &str) -> Result<u64, BenchError> {
        Ok(self.collections.read().get(collection).map_or(0, |c| c.len() as u64))
    }

    fn execute(&self, collection: &str, op: &Operation) -> Result<Outcome, BenchError> {
        match op {
            Operation::Find { filter, projection } => {
                let filter = query::parse_filter(filter)?;
                let projection = projection.as_ref().map(query::parse_find_projection).transpose()?;
                let cols = self.collections.read();
                let docs = cols.get(collection).map_or(&[][..], Vec::as_slice);
                Ok(Outcome::Documents(query::find_docs(docs, &filter, projection.as_ref())?))
            }
            Operation::Aggregate { pipeline } => {
                let stages = query::parse_pipeline(pipeline)?;
                let cols = self.collections.read();
                let docs = cols.get(collection).map_or(&[][..], Vec::as_slice);
                Ok(Outcome::Documents(query::aggregate(docs, &stages)?))
            }
            Operation::UpdateMany { filter, update } => {
                let filter = query::parse_filter(filter)?;
                let update = query::parse_update(update)?;
                let mut cols = self.collections.write();
                let report = match cols.get_mut(collection) {
                    Some(docs) => query::update_many(docs, &filter, &update)?,
                    None => query::UpdateReport::default(),
                };
                Ok(Outcome::Updated(report))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Update;
    use mongodb::bson::doc;

    #[test]
    fn insert_assigns_ids_and_drop_clears() {
        let s = MemoryStore::new();
        assert_eq!(s.insert_many("c", vec![doc! {"a": 1}, doc! {"_id": 7, "a": 2}]).unwrap(), 2);
        let all = s.find_all("c").unwrap();
        assert!(matches!(all[0].get("_id"), Some(Bson::ObjectId(_))));
        assert_eq!(all[0].keys().next().map(String::as_str), Some("_id"));
        assert_eq!(all[1].get_i32("_id").unwrap(), 7);
        s.drop_collection("c").unwrap();
        assert_eq!(s.count_documents("c").unwrap(), 0);
        assert!(s.list_collection_names().is_empty());
    }

    #[test]
    fn missing_collection_reads_empty_and_updates_nothing() {
        let s = MemoryStore::new();
        assert!(s.find_all("nope").unwrap().is_empty());
        let op = Operation::UpdateMany { filter: doc! {}, update: Update::Operators(doc! {"$set": {"a": 1}}) };
        assert_eq!(s.execute("nope", &op).unwrap().affected(), 0);
    }

    #[test]
    fn bad_operator_surfaces_as_query_error() {
        let s = MemoryStore::new();
        s.insert_many("c", vec![doc! {"a": 1}]).unwrap();
        let op = Operation::Aggregate { pipeline: vec![doc! {"$lookup": {}}] };
        assert!(matches!(s.execute("c", &op), Err(BenchError::Query(_))));
    }
}
