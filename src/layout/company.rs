use super::QueryKind;
use crate::config::QueriesConfig;
use crate::query::{Operation, Update};
use mongodb::bson::doc;

// Employees live in an array, so Q1 unwinds it and Q3 rewrites it element by element.
pub(super) fn operation(kind: QueryKind, q: &QueriesConfig) -> Operation {
    match kind {
        QueryKind::FullNames => Operation::Aggregate {
            pipeline: vec![
                doc! {"$unwind": "$employees"},
                doc! {"$project": {
                    "_id": 0,
                    "full_name": {"$concat": ["$employees.first_name", " ", "$employees.last_name"]},
                    "company_name": "$name",
                }},
            ],
        },
        QueryKind::EmployeeCounts => Operation::Aggregate {
            pipeline: vec![doc! {"$project": {
                "_id": 0,
                "company_name": "$name",
                "num_employees": {"$size": "$employees"},
            }}],
        },
        QueryKind::AgeUpdate => Operation::UpdateMany {
            filter: doc! {},
            update: Update::Pipeline(vec![doc! {"$set": {"employees": {"$map": {
                "input": "$employees",
                "as": "e",
                "in": {
                    "first_name": "$$e.first_name",
                    "last_name": "$$e.last_name",
                    "birth_year": "$$e.birth_year",
                    "age": {"$cond": [{"$lt": ["$$e.birth_year", q.age_threshold_year]}, q.fixed_age, "$$e.age"]},
                },
            }}}}]),
        },
        QueryKind::CompanyRename => Operation::UpdateMany {
            filter: doc! {},
            update: Update::Pipeline(vec![doc! {
                "$set": {"name": {"$concat": ["$name", q.company_suffix.as_str()]}}
            }]),
        },
    }
}
