use super::QueryKind;
use crate::config::QueriesConfig;
use crate::query::{Operation, Update};
use mongodb::bson::doc;

// Company data is embedded, so Q1 needs no join and Q2 groups by the embedded name.
pub(super) fn operation(kind: QueryKind, q: &QueriesConfig) -> Operation {
    match kind {
        QueryKind::FullNames => Operation::Find {
            filter: doc! {},
            projection: Some(doc! {
                "_id": 0,
                "full_name": {"$concat": ["$first_name", " ", "$last_name"]},
                "company.name": 1,
            }),
        },
        QueryKind::EmployeeCounts => Operation::Aggregate {
            pipeline: vec![
                doc! {"$group": {"_id": "$company.name", "num_employees": {"$sum": 1}}},
                doc! {"$project": {"_id": 0, "company_name": "$_id", "num_employees": 1}},
            ],
        },
        QueryKind::AgeUpdate => Operation::UpdateMany {
            filter: doc! {"birth_year": {"$lt": q.age_threshold_year}},
            update: Update::Operators(doc! {"$set": {"age": q.fixed_age}}),
        },
        QueryKind::CompanyRename => Operation::UpdateMany {
            filter: doc! {},
            update: Update::Pipeline(vec![doc! {
                "$set": {"company.name": {"$concat": ["$company.name", q.company_suffix.as_str()]}}
            }]),
        },
    }
}
