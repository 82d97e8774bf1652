use crate::errors::BenchError;
use mongodb::bson::{Bson, Document};
use std::cmp::Ordering;

use super::types::{CmpOp, Expr, Filter, MAX_PATH_DEPTH};

/// Variable bindings visible to an expression; later entries shadow earlier ones.
pub type Vars<'a> = Vec<(&'a str, Bson)>;

pub fn eval_filter(doc: &Document, filter: &Filter) -> bool {
    match filter {
        Filter::True => true,
        Filter::And(fs) => fs.iter().all(|f| eval_filter(doc, f)),
        Filter::Or(fs) => fs.iter().any(|f| eval_filter(doc, f)),
        Filter::Exists { path, exists } => get_path(doc, path).is_some() == *exists,
        Filter::In { path, values } => {
            get_path(doc, path).is_some_and(|v| any_element(&v, |x| values.iter().any(|s| bson_eq(x, s))))
        }
        Filter::Cmp { path, op, value } => match get_path(doc, path) {
            Some(v) if *op == CmpOp::Ne => !any_element(&v, |x| bson_eq(x, value)),
            Some(v) => any_element(&v, |x| {
                comparable(x, value, *op) && cmp_matches(*op, compare_bson(x, value))
            }),
            None => *op == CmpOp::Ne || (*op == CmpOp::Eq && *value == Bson::Null),
        },
    }
}

/// A field resolved through an array matches if any element matches.
fn any_element(v: &Bson, pred: impl Fn(&Bson) -> bool) -> bool {
    match v {
        Bson::Array(items) => pred(v) || items.iter().any(&pred),
        other => pred(other),
    }
}

/// Range operators only match values of the same type class.
fn comparable(a: &Bson, b: &Bson, op: CmpOp) -> bool {
    matches!(op, CmpOp::Eq | CmpOp::Ne) || (is_num(a) && is_num(b)) || type_rank(a) == type_rank(b)
}

const fn cmp_matches(op: CmpOp, ord: Ordering) -> bool {
    match op {
        CmpOp::Eq => matches!(ord, Ordering::Equal),
        CmpOp::Ne => !matches!(ord, Ordering::Equal),
        CmpOp::Gt => matches!(ord, Ordering::Greater),
        CmpOp::Gte => !matches!(ord, Ordering::Less),
        CmpOp::Lt => matches!(ord, Ordering::Less),
        CmpOp::Lte => !matches!(ord, Ordering::Greater),
    }
}

fn bson_eq(a: &Bson, b: &Bson) -> bool {
    compare_bson(a, b) == Ordering::Equal
}

fn lookup(value: &Bson, segs: &[&str]) -> Option<Bson> {
    let Some((head, rest)) = segs.split_first() else {
        return Some(value.clone());
    };
    match value {
        Bson::Document(d) => lookup(d.get(*head)?, rest),
        Bson::Array(items) => {
            let found: Vec<Bson> = items.iter().filter_map(|it| match it {
                Bson::Document(_) => lookup(it, segs),
                _ => None,
            }).collect();
            Some(Bson::Array(found))
        }
        _ => None,
    }
}

/// Resolve a dotted path. Traversing an array collects the path from each element.
#[must_use]
pub fn get_path(doc: &Document, path: &str) -> Option<Bson> {
    if path.is_empty() || path.len() > 1024 {
        return None;
    }
    let segs: Vec<&str> = path.split('.').collect();
    if segs.len() > MAX_PATH_DEPTH {
        return None;
    }
    let (head, rest) = segs.split_first()?;
    lookup(doc.get(*head)?, rest)
}

fn ensure_subdoc<'a>(root: &'a mut Document, key: &str) -> &'a mut Document {
    if !matches!(root.get(key), Some(Bson::Document(_))) {
        root.insert(key.to_string(), Bson::Document(Document::new()));
    }
    match root.get_mut(key) {
        Some(Bson::Document(d)) => d,
        _ => unreachable!("subdocument inserted above"),
    }
}

fn traverse_to_parent<'a>(root: &'a mut Document, path: &str) -> (&'a mut Document, String) {
    let mut cur = root;
    let mut iter = path.split('.').peekable();
    let mut last = String::new();
    while let Some(seg) = iter.next() {
        if iter.peek().is_none() {
            last = seg.to_string();
            break;
        }
        cur = ensure_subdoc(cur, seg);
    }
    (cur, last)
}

/// Set a dotted path, creating intermediate documents. Returns whether the value changed.
pub fn set_path(root: &mut Document, path: &str, value: Bson) -> bool {
    let (parent, last) = traverse_to_parent(root, path);
    let changed = parent.get(&last) != Some(&value);
    parent.insert(last, value);
    changed
}

/// Remove a dotted path, returning the removed value.
pub fn take_path(root: &mut Document, path: &str) -> Option<Bson> {
    let mut cur = root;
    let mut iter = path.split('.').peekable();
    while let Some(seg) = iter.next() {
        if iter.peek().is_none() {
            return cur.remove(seg);
        }
        match cur.get_mut(seg) {
            Some(Bson::Document(d)) => cur = d,
            _ => return None,
        }
    }
    None
}

const fn is_num(x: &Bson) -> bool {
    matches!(x, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_))
}

#[allow(clippy::cast_precision_loss)]
fn as_f64_num(x: &Bson) -> f64 {
    match x {
        Bson::Int32(i) => f64::from(*i),
        Bson::Int64(i) => *i as f64,
        Bson::Double(f) => *f,
        _ => f64::NAN,
    }
}

pub fn compare_bson(a: &Bson, b: &Bson) -> Ordering {
    if let (Some(x), Some(y)) = (as_i64(a), as_i64(b)) {
        return x.cmp(&y);
    }
    if is_num(a) && is_num(b) {
        return as_f64_num(a).total_cmp(&as_f64_num(b));
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => x.cmp(y),
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
        _ if type_rank(a) == type_rank(b) => {
            if a == b { Ordering::Equal } else { a.to_string().cmp(&b.to_string()) }
        }
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

const fn as_i64(x: &Bson) -> Option<i64> {
    match x {
        Bson::Int32(i) => Some(*i as i64),
        Bson::Int64(i) => Some(*i),
        _ => None,
    }
}

/// Canonical cross-type ordering; numbers share one class.
const fn type_rank(v: &Bson) -> u8 {
    match v {
        Bson::MinKey => 0,
        Bson::Undefined | Bson::Null => 1,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => 2,
        Bson::Symbol(_) | Bson::String(_) => 3,
        Bson::Document(_) => 4,
        Bson::Array(_) => 5,
        Bson::Binary(_) => 6,
        Bson::ObjectId(_) => 7,
        Bson::Boolean(_) => 8,
        Bson::DateTime(_) => 9,
        Bson::Timestamp(_) => 10,
        Bson::RegularExpression(_) => 11,
        Bson::DbPointer(_) => 12,
        Bson::JavaScriptCode(_) | Bson::JavaScriptCodeWithScope(_) => 13,
        Bson::MaxKey => 255,
    }
}

fn expr_err(msg: impl Into<String>) -> BenchError {
    BenchError::Query(msg.into())
}

fn resolve_var(name: &str, root: &Document, vars: &Vars<'_>) -> Result<Bson, BenchError> {
    if name == "ROOT" || name == "CURRENT" {
        return Ok(Bson::Document(root.clone()));
    }
    vars.iter()
        .rev()
        .find(|(n, _)| *n == name)
        .map(|(_, v)| v.clone())
        .ok_or_else(|| expr_err(format!("undefined variable $${name}")))
}

/// Evaluate an expression. `Ok(None)` means the value is missing.
///
/// # Errors
/// Returns an error when an operator receives an operand of the wrong type.
pub fn eval_expr(expr: &Expr, root: &Document, vars: &Vars<'_>) -> Result<Option<Bson>, BenchError> {
    match expr {
        Expr::Literal(b) => Ok(Some(b.clone())),
        Expr::Field(path) => Ok(get_path(root, path)),
        Expr::Var { name, path } => {
            let v = resolve_var(name, root, vars)?;
            Ok(match path {
                None => Some(v),
                Some(p) => {
                    let segs: Vec<&str> = p.split('.').collect();
                    lookup(&v, &segs)
                }
            })
        }
        Expr::Object(fields) => {
            let mut out = Document::new();
            for (k, e) in fields {
                if let Some(v) = eval_expr(e, root, vars)? {
                    out.insert(k.clone(), v);
                }
            }
            Ok(Some(Bson::Document(out)))
        }
        Expr::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for e in items {
                out.push(eval_expr(e, root, vars)?.unwrap_or(Bson::Null));
            }
            Ok(Some(Bson::Array(out)))
        }
        Expr::Concat(parts) => {
            let mut s = String::new();
            for p in parts {
                match eval_expr(p, root, vars)? {
                    None | Some(Bson::Null | Bson::Undefined) => return Ok(Some(Bson::Null)),
                    Some(Bson::String(piece)) => s.push_str(&piece),
                    Some(other) => {
                        return Err(expr_err(format!("$concat only supports strings, got {other}")));
                    }
                }
            }
            Ok(Some(Bson::String(s)))
        }
        Expr::Size(inner) => match eval_expr(inner, root, vars)? {
            Some(Bson::Array(items)) => {
                let n = i32::try_from(items.len()).map_err(|_| expr_err("$size overflow"))?;
                Ok(Some(Bson::Int32(n)))
            }
            other => Err(expr_err(format!("$size requires an array, got {other:?}"))),
        },
        Expr::Map { input, var, body } => match eval_expr(input, root, vars)? {
            None | Some(Bson::Null) => Ok(Some(Bson::Null)),
            Some(Bson::Array(items)) => {
                let mut scope = vars.clone();
                scope.push((var.as_str(), Bson::Null));
                let slot = scope.len() - 1;
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    scope[slot].1 = item;
                    out.push(eval_expr(body, root, &scope)?.unwrap_or(Bson::Null));
                }
                Ok(Some(Bson::Array(out)))
            }
            Some(other) => Err(expr_err(format!("$map input must be an array, got {other}"))),
        },
        Expr::Cond { cond, then, otherwise } => {
            let c = eval_expr(cond, root, vars)?;
            if truthy(c.as_ref()) { eval_expr(then, root, vars) } else { eval_expr(otherwise, root, vars) }
        }
        Expr::Cmp { op, lhs, rhs } => {
            let a = eval_expr(lhs, root, vars)?.unwrap_or(Bson::Null);
            let b = eval_expr(rhs, root, vars)?.unwrap_or(Bson::Null);
            Ok(Some(Bson::Boolean(cmp_matches(*op, compare_bson(&a, &b)))))
        }
    }
}

fn truthy(v: Option<&Bson>) -> bool {
    match v {
        None | Some(Bson::Null | Bson::Undefined | Bson::Boolean(false)) => false,
        Some(Bson::Int32(0) | Bson::Int64(0)) => false,
        Some(Bson::Double(d)) => *d != 0.0,
        Some(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parse::parse_expr;
    use mongodb::bson::doc;

    fn eval(e: Bson, root: &Document) -> Option<Bson> {
        eval_expr(&parse_expr(&e).unwrap(), root, &Vars::new()).unwrap()
    }

    #[test]
    fn nested_path_and_array_traversal() {
        let d = doc! {"company": {"name": "Acme"}, "employees": [{"age": 1}, {"age": 2}]};
        assert_eq!(get_path(&d, "company.name"), Some(Bson::String("Acme".into())));
        assert_eq!(get_path(&d, "employees.age"), Some(Bson::Array(vec![1.into(), 2.into()])));
        assert_eq!(get_path(&d, "company.missing"), None);
    }

    #[test]
    fn filter_lt_and_mixed_numeric_types() {
        let d = doc! {"birth_year": 1980_i64};
        let f = Filter::Cmp { path: "birth_year".into(), op: CmpOp::Lt, value: Bson::Int32(1988) };
        assert!(eval_filter(&d, &f));
        let f = Filter::Cmp { path: "birth_year".into(), op: CmpOp::Lt, value: Bson::String("1988".into()) };
        assert!(!eval_filter(&d, &f));
    }

    #[test]
    fn filter_matches_any_array_element() {
        let d = doc! {"employees": [{"birth_year": 1990}, {"birth_year": 1970}]};
        let f = Filter::Cmp { path: "employees.birth_year".into(), op: CmpOp::Lt, value: Bson::Int32(1988) };
        assert!(eval_filter(&d, &f));
    }

    #[test]
    fn concat_null_propagation_and_type_error() {
        let d = doc! {"a": "x", "n": 1};
        assert_eq!(eval(Bson::Document(doc! {"$concat": ["$a", "-", "$a"]}), &d), Some(Bson::String("x-x".into())));
        assert_eq!(eval(Bson::Document(doc! {"$concat": ["$a", "$missing"]}), &d), Some(Bson::Null));
        let e = parse_expr(&Bson::Document(doc! {"$concat": ["$a", "$n"]})).unwrap();
        assert!(eval_expr(&e, &d, &Vars::new()).is_err());
    }

    #[test]
    fn map_with_cond_rewrites_elements() {
        let d = doc! {"xs": [{"y": 1980, "v": 44}, {"y": 1995, "v": 29}]};
        let e = Bson::Document(doc! {"$map": {
            "input": "$xs", "as": "e",
            "in": {"y": "$$e.y", "v": {"$cond": [{"$lt": ["$$e.y", 1988]}, 30, "$$e.v"]}}
        }});
        assert_eq!(
            eval(e, &d),
            Some(Bson::Array(vec![
                Bson::Document(doc! {"y": 1980, "v": 30}),
                Bson::Document(doc! {"y": 1995, "v": 29}),
            ]))
        );
    }

    #[test]
    fn size_requires_array() {
        let d = doc! {"xs": [1, 2, 3], "s": "abc"};
        assert_eq!(eval(Bson::Document(doc! {"$size": "$xs"}), &d), Some(Bson::Int32(3)));
        let e = parse_expr(&Bson::Document(doc! {"$size": "$s"})).unwrap();
        assert!(eval_expr(&e, &d, &Vars::new()).is_err());
    }

    #[test]
    fn set_and_take_nested_paths() {
        let mut d = doc! {"company": {"name": "Acme"}};
        assert!(set_path(&mut d, "company.name", "Acme Company".into()));
        assert!(!set_path(&mut d, "company.name", "Acme Company".into()));
        assert!(set_path(&mut d, "meta.tag", 1.into()));
        assert_eq!(take_path(&mut d, "meta.tag"), Some(Bson::Int32(1)));
        assert_eq!(d.get_document("company").unwrap().get_str("name").unwrap(), "Acme Company");
    }
}
