//! Typed records for both layouts.

use crate::errors::BenchError;
use mongodb::bson::{self, Document};
use serde::{Deserialize, Serialize};

/// A person as stored in an employee array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub first_name: String,
    pub last_name: String,
    pub birth_year: i32,
    pub age: i32,
}

impl Person {
    #[must_use]
    pub fn new(first_name: String, last_name: String, birth_year: i32, reference_year: i32) -> Self {
        Self { first_name, last_name, birth_year, age: reference_year - birth_year }
    }

    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Company data embedded by value into person-centric records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyRef {
    pub name: String,
}

/// Person-centric document: one per person, company embedded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonRecord {
    #[serde(flatten)]
    pub person: Person,
    pub company: CompanyRef,
}

/// Company-centric document: one per company, employees embedded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyRecord {
    pub name: String,
    pub employees: Vec<Person>,
}

/// Serialize a slice of records into BSON documents.
///
/// # Errors
/// Returns an error if a record does not serialize to a BSON document.
pub fn to_documents<T: Serialize>(records: &[T]) -> Result<Vec<Document>, BenchError> {
    records.iter().map(|r| bson::to_document(r).map_err(BenchError::from)).collect()
}

/// Deserialize a stored document, ignoring fields such as `_id`.
///
/// # Errors
/// Returns an error if the document does not have the record's shape.
pub fn from_document<T: for<'de> Deserialize<'de>>(doc: Document) -> Result<T, BenchError> {
    Ok(bson::from_document(doc)?)
}
