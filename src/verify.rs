//! Post-run checks of the properties each layout must satisfy.

use crate::config::{DataConfig, QueriesConfig};
use crate::errors::BenchError;
use crate::layout::Layout;
use crate::model::{self, CompanyRecord, Person, PersonRecord};
use crate::store::DocumentStore;
use mongodb::bson::{Bson, Document};
use std::collections::HashMap;

fn fail(msg: impl Into<String>) -> BenchError {
    BenchError::Verification(msg.into())
}

/// One stored document reduced to its company name and persons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flattened {
    pub id: String,
    pub company: String,
    pub persons: Vec<Person>,
}

/// Decode stored documents of `layout`.
///
/// # Errors
/// Returns an error if a document does not have the layout's shape.
pub fn flatten(layout: Layout, docs: &[Document]) -> Result<Vec<Flattened>, BenchError> {
    docs.iter()
        .map(|d| {
            let id = d.get("_id").map_or_else(String::new, Bson::to_string);
            Ok(match layout {
                Layout::PersonCentric => {
                    let r: PersonRecord = model::from_document(d.clone())?;
                    Flattened { id, company: r.company.name, persons: vec![r.person] }
                }
                Layout::CompanyCentric => {
                    let r: CompanyRecord = model::from_document(d.clone())?;
                    Flattened { id, company: r.name, persons: r.employees }
                }
            })
        })
        .collect()
}

/// Check the collection right after the bulk insert.
///
/// # Errors
/// Returns `BenchError::Verification` describing the first violated property.
pub fn check_loaded(
    store: &dyn DocumentStore,
    collection: &str,
    layout: Layout,
    data: &DataConfig,
) -> Result<(), BenchError> {
    let expected = (match layout {
        Layout::PersonCentric => data.total_persons(),
        Layout::CompanyCentric => data.num_companies,
    }) as u64;
    let count = store.count_documents(collection)?;
    if count != expected {
        return Err(fail(format!("{collection}: expected {expected} documents, found {count}")));
    }
    for f in flatten(layout, &store.find_all(collection)?)? {
        if f.company.is_empty() {
            return Err(fail(format!("{collection}: document {} has an empty company name", f.id)));
        }
        if layout == Layout::CompanyCentric && f.persons.len() != data.num_persons_per_company {
            return Err(fail(format!(
                "{collection}: company {} has {} employees, expected {}",
                f.company,
                f.persons.len(),
                data.num_persons_per_company
            )));
        }
        if let Some(p) = f.persons.iter().find(|p| p.age != data.reference_year - p.birth_year) {
            return Err(fail(format!("{collection}: {} has age {} for birth year {}", p.full_name(), p.age, p.birth_year)));
        }
    }
    Ok(())
}

/// Q1 yields one non-empty full name per person.
///
/// # Errors
/// Returns `BenchError::Verification` if the row count or a row is off.
pub fn check_full_names(rows: &[Document], data: &DataConfig) -> Result<(), BenchError> {
    if rows.len() != data.total_persons() {
        return Err(fail(format!("Q1 returned {} rows, expected {}", rows.len(), data.total_persons())));
    }
    match rows.iter().find(|r| r.get_str("full_name").map_or(true, |s| s.trim().is_empty())) {
        Some(bad) => Err(fail(format!("Q1 row without a full name: {bad}"))),
        None => Ok(()),
    }
}

fn as_count(v: Option<&Bson>) -> Option<i64> {
    match v {
        Some(Bson::Int32(n)) => Some(i64::from(*n)),
        Some(Bson::Int64(n)) => Some(*n),
        _ => None,
    }
}

/// Q2 yields one group per company, each the size of a company.
///
/// # Errors
/// Returns `BenchError::Verification` if the groups do not add up.
pub fn check_employee_counts(rows: &[Document], data: &DataConfig) -> Result<(), BenchError> {
    if rows.len() != data.num_companies {
        return Err(fail(format!("Q2 returned {} groups, expected {}", rows.len(), data.num_companies)));
    }
    let per = i64::try_from(data.num_persons_per_company).map_err(|e| fail(e.to_string()))?;
    let mut total = 0i64;
    for r in rows {
        let n = as_count(r.get("num_employees")).ok_or_else(|| fail(format!("Q2 row without a count: {r}")))?;
        if n != per {
            return Err(fail(format!("Q2 group {r} has {n} employees, expected {per}")));
        }
        total += n;
    }
    let expected = i64::try_from(data.total_persons()).map_err(|e| fail(e.to_string()))?;
    if total != expected {
        return Err(fail(format!("Q2 counts sum to {total}, expected {expected}")));
    }
    Ok(())
}

/// Compare the collection before Q3/Q4 with the collection after them.
///
/// # Errors
/// Returns `BenchError::Verification` describing the first violated property.
pub fn check_after_run(
    layout: Layout,
    before: &[Document],
    after: &[Document],
    q: &QueriesConfig,
) -> Result<(), BenchError> {
    let before: HashMap<String, Flattened> =
        flatten(layout, before)?.into_iter().map(|f| (f.id.clone(), f)).collect();
    let after = flatten(layout, after)?;
    if after.len() != before.len() {
        return Err(fail(format!("document count changed from {} to {}", before.len(), after.len())));
    }
    for a in &after {
        let b = before.get(&a.id).ok_or_else(|| fail(format!("document {} appeared during the run", a.id)))?;
        if a.company.strip_suffix(q.company_suffix.as_str()) != Some(b.company.as_str()) {
            return Err(fail(format!(
                "company {:?} should be {:?} with one {:?} appended",
                a.company, b.company, q.company_suffix
            )));
        }
        if a.persons.len() != b.persons.len() {
            return Err(fail(format!("company {} lost or gained employees", a.company)));
        }
        for (pa, pb) in a.persons.iter().zip(&b.persons) {
            if pa.birth_year != pb.birth_year || pa.first_name != pb.first_name || pa.last_name != pb.last_name {
                return Err(fail(format!("{} changed identity during the run", pb.full_name())));
            }
            let want = if pa.birth_year < q.age_threshold_year { q.fixed_age } else { pb.age };
            if pa.age != want {
                return Err(fail(format!(
                    "{} (born {}) has age {}, expected {want}",
                    pa.full_name(),
                    pa.birth_year,
                    pa.age
                )));
            }
        }
    }
    Ok(())
}
