use crate::errors::BenchError;
use mongodb::bson::{Bson, Document};
use std::collections::HashMap;

use super::eval::{Vars, eval_expr, eval_filter, get_path, set_path, take_path};
use super::parse::CompiledUpdate;
use super::types::{
    Accumulator, Expr, Filter, ProjectField, Projection, Stage, UpdateDoc, UpdateReport,
};

/// Documents matching `filter`, projected if a projection is given.
///
/// # Errors
/// Returns an error if a computed projection field fails to evaluate.
pub fn find_docs(
    docs: &[Document],
    filter: &Filter,
    projection: Option<&Projection>,
) -> Result<Vec<Document>, BenchError> {
    let matched = docs.iter().filter(|d| eval_filter(d, filter));
    match projection {
        Some(p) => matched.map(|d| project(d, p)).collect(),
        None => Ok(matched.cloned().collect()),
    }
}

/// Run a parsed pipeline over a snapshot of the collection.
///
/// # Errors
/// Returns an error if any stage fails to evaluate.
pub fn aggregate(docs: &[Document], stages: &[Stage]) -> Result<Vec<Document>, BenchError> {
    let (mut cur, rest) = match stages.split_first() {
        Some((Stage::Match(f), rest)) => (docs.iter().filter(|d| eval_filter(d, f)).cloned().collect(), rest),
        _ => (docs.to_vec(), stages),
    };
    for stage in rest {
        cur = run_stage(cur, stage)?;
    }
    Ok(cur)
}

fn run_stage(docs: Vec<Document>, stage: &Stage) -> Result<Vec<Document>, BenchError> {
    match stage {
        Stage::Match(f) => Ok(docs.into_iter().filter(|d| eval_filter(d, f)).collect()),
        Stage::Unwind(path) => Ok(unwind(docs, path)),
        Stage::Group { id, fields } => group(&docs, id, fields),
        Stage::Project(p) => docs.iter().map(|d| project(d, p)).collect(),
        Stage::Set(fields) => docs.into_iter().map(|d| set_fields(d, fields)).collect(),
        Stage::Unset(paths) => Ok(docs
            .into_iter()
            .map(|mut d| {
                for p in paths {
                    take_path(&mut d, p);
                }
                d
            })
            .collect()),
    }
}

fn unwind(docs: Vec<Document>, path: &str) -> Vec<Document> {
    let mut out = Vec::with_capacity(docs.len());
    for mut doc in docs {
        match take_path(&mut doc, path) {
            Some(Bson::Array(items)) => {
                for item in items {
                    let mut d = doc.clone();
                    set_path(&mut d, path, item);
                    out.push(d);
                }
            }
            None | Some(Bson::Null) => {}
            Some(other) => {
                set_path(&mut doc, path, other);
                out.push(doc);
            }
        }
    }
    out
}

#[derive(Debug, Clone, Copy)]
enum Sum {
    Int(i64),
    Double(f64),
}

impl Sum {
    #[allow(clippy::cast_precision_loss)]
    fn add(self, v: &Bson) -> Self {
        match (self, v) {
            (Self::Int(a), Bson::Int32(b)) => a.checked_add(i64::from(*b)).map_or(Self::Double(a as f64 + f64::from(*b)), Self::Int),
            (Self::Int(a), Bson::Int64(b)) => a.checked_add(*b).map_or(Self::Double(a as f64 + *b as f64), Self::Int),
            (Self::Int(a), Bson::Double(b)) => Self::Double(a as f64 + b),
            (Self::Double(a), Bson::Int32(b)) => Self::Double(a + f64::from(*b)),
            (Self::Double(a), Bson::Int64(b)) => Self::Double(a + *b as f64),
            (Self::Double(a), Bson::Double(b)) => Self::Double(a + b),
            (s, _) => s,
        }
    }

    fn into_bson(self) -> Bson {
        match self {
            Self::Int(n) => i32::try_from(n).map_or(Bson::Int64(n), Bson::Int32),
            Self::Double(f) => Bson::Double(f),
        }
    }
}

/// Hash key for a group id. Numerically equal values share one group.
fn group_key(key: &Bson) -> String {
    match key {
        Bson::Int32(n) => format!("num:{n}"),
        Bson::Int64(n) => format!("num:{n}"),
        #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
        Bson::Double(d) if d.fract() == 0.0 && d.abs() < 9.0e15 => format!("num:{}", *d as i64),
        Bson::Double(d) => format!("num:{d:?}"),
        Bson::Array(items) => format!("[{}]", items.iter().map(group_key).collect::<Vec<_>>().join(",")),
        Bson::Document(d) => format!(
            "{{{}}}",
            d.iter().map(|(k, v)| format!("{k:?}:{}", group_key(v))).collect::<Vec<_>>().join(",")
        ),
        other => format!("{other:?}"),
    }
}

/// `$group`; groups are emitted in first-seen order.
fn group(
    docs: &[Document],
    id: &Expr,
    fields: &[(String, Accumulator)],
) -> Result<Vec<Document>, BenchError> {
    let vars = Vars::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(Bson, Vec<Sum>)> = Vec::new();
    for doc in docs {
        let key = eval_expr(id, doc, &vars)?.unwrap_or(Bson::Null);
        let slot = *index.entry(group_key(&key)).or_insert_with(|| {
            groups.push((key.clone(), vec![Sum::Int(0); fields.len()]));
            groups.len() - 1
        });
        for (i, (_, acc)) in fields.iter().enumerate() {
            let Accumulator::Sum(e) = acc;
            if let Some(v) = eval_expr(e, doc, &vars)? {
                groups[slot].1[i] = groups[slot].1[i].add(&v);
            }
        }
    }
    Ok(groups
        .into_iter()
        .map(|(key, sums)| {
            let mut out = Document::new();
            out.insert("_id", key);
            for ((name, _), s) in fields.iter().zip(sums) {
                out.insert(name.clone(), s.into_bson());
            }
            out
        })
        .collect())
}

/// Apply a projection to one document.
///
/// # Errors
/// Returns an error if a computed field fails to evaluate.
pub fn project(doc: &Document, p: &Projection) -> Result<Document, BenchError> {
    let inclusion = p.fields.iter().any(|(_, f)| !matches!(f, ProjectField::Exclude));
    let id_excluded = p.fields.iter().any(|(k, f)| k == "_id" && matches!(f, ProjectField::Exclude));
    if !inclusion {
        let mut out = doc.clone();
        for (k, _) in &p.fields {
            take_path(&mut out, k);
        }
        return Ok(out);
    }
    let vars = Vars::new();
    let mut out = Document::new();
    if !id_excluded
        && !p.fields.iter().any(|(k, _)| k == "_id")
        && let Some(id) = doc.get("_id")
    {
        out.insert("_id", id.clone());
    }
    for (k, f) in &p.fields {
        match f {
            ProjectField::Exclude => {}
            ProjectField::Include => {
                if let Some(v) = get_path(doc, k) {
                    set_path(&mut out, k, v);
                }
            }
            ProjectField::Computed(e) => {
                if let Some(v) = eval_expr(e, doc, &vars)? {
                    set_path(&mut out, k, v);
                }
            }
        }
    }
    Ok(out)
}

fn set_fields(mut doc: Document, fields: &[(String, Expr)]) -> Result<Document, BenchError> {
    let vars = Vars::new();
    // all expressions see the document as it was before the stage
    let values = fields
        .iter()
        .map(|(k, e)| Ok((k, eval_expr(e, &doc, &vars)?)))
        .collect::<Result<Vec<_>, BenchError>>()?;
    for (k, v) in values {
        match v {
            Some(v) => {
                set_path(&mut doc, k, v);
            }
            None => {
                take_path(&mut doc, k);
            }
        }
    }
    Ok(doc)
}

#[allow(clippy::cast_precision_loss)]
fn add_numbers(cur: Option<&Bson>, by: &Bson) -> Bson {
    match (cur, by) {
        (None | Some(Bson::Null), b) => b.clone(),
        (Some(Bson::Int32(a)), Bson::Int32(b)) => a.checked_add(*b).map_or(Bson::Int64(i64::from(*a) + i64::from(*b)), Bson::Int32),
        (Some(a), b) => match (a, b) {
            (Bson::Int32(_) | Bson::Int64(_), Bson::Int32(_) | Bson::Int64(_)) => {
                let x = if let Bson::Int32(i) = a { i64::from(*i) } else { a.as_i64().unwrap_or(0) };
                let y = if let Bson::Int32(i) = b { i64::from(*i) } else { b.as_i64().unwrap_or(0) };
                Bson::Int64(x.saturating_add(y))
            }
            _ => {
                let f = |v: &Bson| match v {
                    Bson::Int32(i) => f64::from(*i),
                    Bson::Int64(i) => *i as f64,
                    Bson::Double(d) => *d,
                    _ => 0.0,
                };
                Bson::Double(f(a) + f(b))
            }
        },
    }
}

/// Apply a parsed operator update. Returns whether the document changed.
pub fn apply_update(doc: &mut Document, upd: &UpdateDoc) -> bool {
    let mut changed = false;
    for (k, v) in &upd.set {
        if set_path(doc, k, v.clone()) {
            changed = true;
        }
    }
    for (k, by) in &upd.inc {
        let next = add_numbers(get_path(doc, k).as_ref(), by);
        if set_path(doc, k, next) {
            changed = true;
        }
    }
    for k in &upd.unset {
        if take_path(doc, k).is_some() {
            changed = true;
        }
    }
    changed
}

fn apply_pipeline(doc: &Document, stages: &[Stage]) -> Result<Document, BenchError> {
    let mut cur = doc.clone();
    for stage in stages {
        cur = match stage {
            Stage::Set(fields) => set_fields(cur, fields)?,
            Stage::Project(p) => project(&cur, p)?,
            Stage::Unset(paths) => {
                for p in paths {
                    take_path(&mut cur, p);
                }
                cur
            }
            other => return Err(BenchError::Query(format!("stage not allowed in an update pipeline: {other:?}"))),
        };
    }
    // _id is immutable
    if let Some(id) = doc.get("_id") {
        cur.insert("_id", id.clone());
    }
    Ok(cur)
}

/// Update every document matching `filter` in place.
///
/// # Errors
/// Returns an error if a pipeline update fails to evaluate; documents already
/// updated stay updated.
pub fn update_many(
    docs: &mut [Document],
    filter: &Filter,
    update: &CompiledUpdate,
) -> Result<UpdateReport, BenchError> {
    let mut report = UpdateReport::default();
    for doc in docs.iter_mut().filter(|d| eval_filter(d, filter)) {
        report.matched += 1;
        let changed = match update {
            CompiledUpdate::Operators(u) => apply_update(doc, u),
            CompiledUpdate::Pipeline(stages) => {
                let next = apply_pipeline(doc, stages)?;
                let changed = next != *doc;
                *doc = next;
                changed
            }
        };
        if changed {
            report.modified += 1;
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parse::{parse_filter, parse_find_projection, parse_pipeline, parse_update};
    use crate::query::types::Update;
    use mongodb::bson::doc;

    fn people() -> Vec<Document> {
        vec![
            doc! {"_id": 1, "first_name": "A", "last_name": "One", "birth_year": 1970, "age": 54, "company": {"name": "X"}},
            doc! {"_id": 2, "first_name": "B", "last_name": "Two", "birth_year": 1990, "age": 34, "company": {"name": "Y"}},
            doc! {"_id": 3, "first_name": "C", "last_name": "Three", "birth_year": 1987, "age": 37, "company": {"name": "X"}},
        ]
    }

    #[test]
    fn find_with_computed_and_nested_projection() {
        let p = parse_find_projection(&doc! {
            "_id": 0,
            "full_name": {"$concat": ["$first_name", " ", "$last_name"]},
            "company.name": 1,
        })
        .unwrap();
        let out = find_docs(&people(), &Filter::True, Some(&p)).unwrap();
        assert_eq!(out[0], doc! {"full_name": "A One", "company": {"name": "X"}});
    }

    #[test]
    fn exclusion_projection_keeps_the_rest() {
        let p = parse_find_projection(&doc! {"company": 0, "age": 0}).unwrap();
        let out = find_docs(&people(), &Filter::True, Some(&p)).unwrap();
        assert!(out[0].get("company").is_none());
        assert!(out[0].get("_id").is_some());
    }

    #[test]
    fn group_counts_in_first_seen_order() {
        let stages = parse_pipeline(&[
            doc! {"$group": {"_id": "$company.name", "num_employees": {"$sum": 1}}},
            doc! {"$project": {"_id": 0, "company_name": "$_id", "num_employees": 1}},
        ])
        .unwrap();
        let out = aggregate(&people(), &stages).unwrap();
        assert_eq!(
            out,
            vec![
                doc! {"company_name": "X", "num_employees": 2},
                doc! {"company_name": "Y", "num_employees": 1},
            ]
        );
    }

    #[test]
    fn group_merges_numerically_equal_keys() {
        let docs = vec![doc! {"k": 1_i32}, doc! {"k": 1_i64}, doc! {"k": 1.0}, doc! {"k": 1.5}, doc! {"k": "1"}];
        let stages = parse_pipeline(&[doc! {"$group": {"_id": "$k", "n": {"$sum": 1}}}]).unwrap();
        let out = aggregate(&docs, &stages).unwrap();
        assert_eq!(
            out,
            vec![
                doc! {"_id": 1_i32, "n": 3},
                doc! {"_id": 1.5, "n": 1},
                doc! {"_id": "1", "n": 1},
            ]
        );
    }

    #[test]
    fn unwind_flattens_and_skips_empty() {
        let docs = vec![
            doc! {"name": "X", "employees": [{"n": 1}, {"n": 2}]},
            doc! {"name": "Y", "employees": []},
            doc! {"name": "Z"},
        ];
        let stages = parse_pipeline(&[
            doc! {"$unwind": "$employees"},
            doc! {"$project": {"_id": 0, "n": "$employees.n", "company_name": "$name"}},
        ])
        .unwrap();
        let out = aggregate(&docs, &stages).unwrap();
        assert_eq!(out, vec![doc! {"n": 1, "company_name": "X"}, doc! {"n": 2, "company_name": "X"}]);
    }

    #[test]
    fn operator_update_reports_matched_and_modified() {
        let mut docs = people();
        let f = parse_filter(&doc! {"birth_year": {"$lt": 1988}}).unwrap();
        let u = parse_update(&Update::Operators(doc! {"$set": {"age": 30}})).unwrap();
        let r = update_many(&mut docs, &f, &u).unwrap();
        assert_eq!(r, UpdateReport { matched: 2, modified: 2 });
        assert_eq!(docs[0].get_i32("age").unwrap(), 30);
        assert_eq!(docs[1].get_i32("age").unwrap(), 34);
        let again = update_many(&mut docs, &f, &u).unwrap();
        assert_eq!(again, UpdateReport { matched: 2, modified: 0 });
    }

    #[test]
    fn pipeline_update_appends_to_nested_field() {
        let mut docs = people();
        let u = parse_update(&Update::Pipeline(vec![
            doc! {"$set": {"company.name": {"$concat": ["$company.name", " Company"]}}},
        ]))
        .unwrap();
        let r = update_many(&mut docs, &Filter::True, &u).unwrap();
        assert_eq!(r.modified, 3);
        assert_eq!(docs[1].get_document("company").unwrap().get_str("name").unwrap(), "Y Company");
        assert_eq!(docs[1].get_i32("_id").unwrap(), 2);
    }

    #[test]
    fn inc_keeps_integer_type() {
        let mut d = doc! {"n": 1};
        let u = UpdateDoc { inc: vec![("n".into(), Bson::Int32(2)), ("m".into(), Bson::Double(0.5))], ..UpdateDoc::default() };
        assert!(apply_update(&mut d, &u));
        assert_eq!(d.get_i32("n").unwrap(), 3);
        assert_eq!(d.get_f64("m").unwrap(), 0.5);
    }
}
