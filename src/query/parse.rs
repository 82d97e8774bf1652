use crate::errors::BenchError;
use mongodb::bson::{Bson, Document};

use super::types::{
    Accumulator, CmpOp, Expr, Filter, ProjectField, Projection, Stage, Update, UpdateDoc,
};

fn query_err(msg: impl Into<String>) -> BenchError {
    BenchError::Query(msg.into())
}

fn is_operator_doc(d: &Document) -> bool {
    d.keys().next().is_some_and(|k| k.starts_with('$'))
}

/// Parse a filter document such as `{"birth_year": {"$lt": 1988}}`.
///
/// # Errors
/// Returns an error on unknown operators or ill-typed operands.
pub fn parse_filter(doc: &Document) -> Result<Filter, BenchError> {
    let mut clauses = Vec::new();
    for (key, value) in doc {
        match key.as_str() {
            "$and" | "$or" => {
                let Bson::Array(items) = value else {
                    return Err(query_err(format!("{key} requires an array")));
                };
                let parts = items
                    .iter()
                    .map(|b| match b {
                        Bson::Document(d) => parse_filter(d),
                        _ => Err(query_err(format!("{key} elements must be documents"))),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                clauses.push(if key == "$and" { Filter::And(parts) } else { Filter::Or(parts) });
            }
            k if k.starts_with('$') => return Err(query_err(format!("unsupported filter operator {k}"))),
            path => match value {
                Bson::Document(ops) if is_operator_doc(ops) => {
                    for (op, operand) in ops {
                        clauses.push(parse_field_op(path, op, operand)?);
                    }
                }
                other => {
                    clauses.push(Filter::Cmp { path: path.to_string(), op: CmpOp::Eq, value: other.clone() });
                }
            },
        }
    }
    Ok(match clauses.len() {
        0 => Filter::True,
        1 => clauses.remove(0),
        _ => Filter::And(clauses),
    })
}

fn parse_field_op(path: &str, op: &str, operand: &Bson) -> Result<Filter, BenchError> {
    if let Some(cmp) = CmpOp::from_operator(op) {
        return Ok(Filter::Cmp { path: path.to_string(), op: cmp, value: operand.clone() });
    }
    match (op, operand) {
        ("$in", Bson::Array(values)) => Ok(Filter::In { path: path.to_string(), values: values.clone() }),
        ("$exists", Bson::Boolean(exists)) => Ok(Filter::Exists { path: path.to_string(), exists: *exists }),
        ("$in" | "$exists", _) => Err(query_err(format!("ill-typed operand for {op}"))),
        _ => Err(query_err(format!("unsupported filter operator {op}"))),
    }
}

/// Parse an operator update document (`$set`, `$inc`, `$unset`).
///
/// # Errors
/// Returns an error on unknown operators or non-numeric `$inc` operands.
pub fn parse_update_doc(doc: &Document) -> Result<UpdateDoc, BenchError> {
    let mut out = UpdateDoc::default();
    for (op, body) in doc {
        let Bson::Document(fields) = body else {
            return Err(query_err(format!("{op} requires a document")));
        };
        match op.as_str() {
            "$set" => out.set.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone()))),
            "$inc" => {
                for (k, v) in fields {
                    if !matches!(v, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_)) {
                        return Err(query_err("$inc requires numeric"));
                    }
                    out.inc.push((k.clone(), v.clone()));
                }
            }
            "$unset" => out.unset.extend(fields.keys().cloned()),
            other => return Err(query_err(format!("unsupported update operator {other}"))),
        }
    }
    Ok(out)
}

/// Parse an aggregation expression.
///
/// # Errors
/// Returns an error on unknown operators or wrong arity.
pub fn parse_expr(value: &Bson) -> Result<Expr, BenchError> {
    match value {
        Bson::String(s) if s.starts_with("$$") => {
            let rest = &s[2..];
            let (name, path) = match rest.split_once('.') {
                Some((n, p)) => (n.to_string(), Some(p.to_string())),
                None => (rest.to_string(), None),
            };
            if name.is_empty() {
                return Err(query_err("empty variable name"));
            }
            Ok(Expr::Var { name, path })
        }
        Bson::String(s) if s.starts_with('$') => Ok(Expr::Field(s[1..].to_string())),
        Bson::Array(items) => Ok(Expr::Array(items.iter().map(parse_expr).collect::<Result<_, _>>()?)),
        Bson::Document(d) if is_operator_doc(d) => {
            if d.len() != 1 {
                return Err(query_err("expression object must have exactly one operator"));
            }
            let Some((op, arg)) = d.iter().next() else {
                return Err(query_err("empty expression"));
            };
            parse_operator(op, arg)
        }
        Bson::Document(d) => Ok(Expr::Object(
            d.iter().map(|(k, v)| Ok((k.clone(), parse_expr(v)?))).collect::<Result<_, BenchError>>()?,
        )),
        other => Ok(Expr::Literal(other.clone())),
    }
}

fn args(op: &str, arg: &Bson, n: usize) -> Result<Vec<Expr>, BenchError> {
    let Bson::Array(items) = arg else {
        return Err(query_err(format!("{op} requires an array of {n}")));
    };
    if items.len() != n {
        return Err(query_err(format!("{op} takes {n} arguments, got {}", items.len())));
    }
    items.iter().map(parse_expr).collect()
}

fn parse_operator(op: &str, arg: &Bson) -> Result<Expr, BenchError> {
    if let Some(cmp) = CmpOp::from_operator(op) {
        let mut a = args(op, arg, 2)?;
        let rhs = a.pop().map(Box::new);
        let lhs = a.pop().map(Box::new);
        return match (lhs, rhs) {
            (Some(lhs), Some(rhs)) => Ok(Expr::Cmp { op: cmp, lhs, rhs }),
            _ => Err(query_err(format!("{op} takes 2 arguments"))),
        };
    }
    match op {
        "$literal" => Ok(Expr::Literal(arg.clone())),
        "$concat" => match arg {
            Bson::Array(items) => Ok(Expr::Concat(items.iter().map(parse_expr).collect::<Result<_, _>>()?)),
            single => Ok(Expr::Concat(vec![parse_expr(single)?])),
        },
        "$size" => {
            let inner = match arg {
                Bson::Array(items) if items.len() == 1 => parse_expr(&items[0])?,
                other => parse_expr(other)?,
            };
            Ok(Expr::Size(Box::new(inner)))
        }
        "$map" => {
            let Bson::Document(spec) = arg else {
                return Err(query_err("$map requires a document"));
            };
            let input = spec.get("input").ok_or_else(|| query_err("$map requires input"))?;
            let body = spec.get("in").ok_or_else(|| query_err("$map requires in"))?;
            let var = match spec.get("as") {
                Some(Bson::String(s)) => s.clone(),
                Some(_) => return Err(query_err("$map as must be a string")),
                None => "this".to_string(),
            };
            Ok(Expr::Map { input: Box::new(parse_expr(input)?), var, body: Box::new(parse_expr(body)?) })
        }
        "$cond" => {
            let (c, t, e) = match arg {
                Bson::Array(_) => {
                    let mut a = args(op, arg, 3)?.into_iter();
                    match (a.next(), a.next(), a.next()) {
                        (Some(c), Some(t), Some(e)) => (c, t, e),
                        _ => return Err(query_err("$cond takes 3 arguments")),
                    }
                }
                Bson::Document(spec) => {
                    let get = |k: &str| {
                        spec.get(k).ok_or_else(|| query_err(format!("$cond requires {k}"))).and_then(parse_expr)
                    };
                    (get("if")?, get("then")?, get("else")?)
                }
                _ => return Err(query_err("$cond requires an array or document")),
            };
            Ok(Expr::Cond { cond: Box::new(c), then: Box::new(t), otherwise: Box::new(e) })
        }
        other => Err(query_err(format!("unsupported expression operator {other}"))),
    }
}

fn parse_projection(spec: &Document) -> Result<Projection, BenchError> {
    let mut fields = Vec::with_capacity(spec.len());
    for (k, v) in spec {
        let f = match v {
            Bson::Boolean(true) => ProjectField::Include,
            Bson::Boolean(false) => ProjectField::Exclude,
            Bson::Int32(0) | Bson::Int64(0) => ProjectField::Exclude,
            Bson::Int32(_) | Bson::Int64(_) => ProjectField::Include,
            Bson::Double(d) if *d == 0.0 => ProjectField::Exclude,
            Bson::Double(_) => ProjectField::Include,
            other => ProjectField::Computed(parse_expr(other)?),
        };
        fields.push((k.clone(), f));
    }
    let includes = fields.iter().any(|(_, f)| !matches!(f, ProjectField::Exclude));
    if includes && fields.iter().any(|(k, f)| k != "_id" && matches!(f, ProjectField::Exclude)) {
        return Err(query_err("cannot mix inclusion and exclusion in a projection"));
    }
    Ok(Projection { fields })
}

/// Parse a `find` projection document.
///
/// # Errors
/// Returns an error on ill-formed projections.
pub fn parse_find_projection(spec: &Document) -> Result<Projection, BenchError> {
    parse_projection(spec)
}

fn field_path(op: &str, v: &Bson) -> Result<String, BenchError> {
    match v {
        Bson::String(s) if s.starts_with('$') && !s.starts_with("$$") => Ok(s[1..].to_string()),
        Bson::Document(d) => match d.get("path") {
            Some(p) => field_path(op, p),
            None => Err(query_err(format!("{op} requires path"))),
        },
        _ => Err(query_err(format!("{op} requires a field path"))),
    }
}

fn parse_stage(stage: &Document) -> Result<Stage, BenchError> {
    if stage.len() != 1 {
        return Err(query_err("a pipeline stage must have exactly one key"));
    }
    let Some((name, body)) = stage.iter().next() else {
        return Err(query_err("empty pipeline stage"));
    };
    let as_doc = |b: &Bson| match b {
        Bson::Document(d) => Ok(d.clone()),
        _ => Err(query_err(format!("{name} requires a document"))),
    };
    match name.as_str() {
        "$match" => Ok(Stage::Match(parse_filter(&as_doc(body)?)?)),
        "$unwind" => Ok(Stage::Unwind(field_path(name, body)?)),
        "$group" => {
            let spec = as_doc(body)?;
            let id = spec.get("_id").ok_or_else(|| query_err("$group requires _id"))?;
            let mut fields = Vec::new();
            for (k, v) in spec.iter().filter(|(k, _)| k.as_str() != "_id") {
                let acc = match v {
                    Bson::Document(a) if a.len() == 1 => match a.get("$sum") {
                        Some(e) => Accumulator::Sum(parse_expr(e)?),
                        None => return Err(query_err(format!("unsupported accumulator for {k}"))),
                    },
                    _ => return Err(query_err(format!("{k} must be an accumulator object"))),
                };
                fields.push((k.clone(), acc));
            }
            Ok(Stage::Group { id: parse_expr(id)?, fields })
        }
        "$project" => Ok(Stage::Project(parse_projection(&as_doc(body)?)?)),
        "$set" | "$addFields" => {
            let spec = as_doc(body)?;
            Ok(Stage::Set(spec.iter().map(|(k, v)| Ok((k.clone(), parse_expr(v)?))).collect::<Result<_, BenchError>>()?))
        }
        "$unset" => match body {
            Bson::String(s) => Ok(Stage::Unset(vec![s.clone()])),
            Bson::Array(items) => Ok(Stage::Unset(
                items
                    .iter()
                    .map(|b| b.as_str().map(str::to_string).ok_or_else(|| query_err("$unset takes field names")))
                    .collect::<Result<_, _>>()?,
            )),
            _ => Err(query_err("$unset takes field names")),
        },
        other => Err(query_err(format!("unsupported pipeline stage {other}"))),
    }
}

/// Parse an aggregation pipeline.
///
/// # Errors
/// Returns an error on the first stage that cannot be parsed.
pub fn parse_pipeline(pipeline: &[Document]) -> Result<Vec<Stage>, BenchError> {
    pipeline.iter().map(parse_stage).collect()
}

/// Compiled form of [`Update`].
#[derive(Debug, Clone, PartialEq)]
pub enum CompiledUpdate {
    Operators(UpdateDoc),
    Pipeline(Vec<Stage>),
}

/// Parse an update, rejecting pipeline stages that do not map one document to one document.
///
/// # Errors
/// Returns an error if the update cannot be parsed.
pub fn parse_update(update: &Update) -> Result<CompiledUpdate, BenchError> {
    match update {
        Update::Operators(d) => Ok(CompiledUpdate::Operators(parse_update_doc(d)?)),
        Update::Pipeline(p) => {
            let stages = parse_pipeline(p)?;
            if let Some(bad) = stages
                .iter()
                .find(|s| !matches!(s, Stage::Set(_) | Stage::Unset(_) | Stage::Project(_)))
            {
                return Err(query_err(format!("stage not allowed in an update pipeline: {bad:?}")));
            }
            Ok(CompiledUpdate::Pipeline(stages))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    #[test]
    fn empty_filter_is_true() {
        assert_eq!(parse_filter(&doc! {}).unwrap(), Filter::True);
    }

    #[test]
    fn lt_filter() {
        let f = parse_filter(&doc! {"birth_year": {"$lt": 1988}}).unwrap();
        assert_eq!(f, Filter::Cmp { path: "birth_year".into(), op: CmpOp::Lt, value: Bson::Int32(1988) });
    }

    #[test]
    fn implicit_eq_and_multiple_ops_become_and() {
        let f = parse_filter(&doc! {"a": 1, "b": {"$gte": 2, "$lte": 5}}).unwrap();
        assert!(matches!(f, Filter::And(ref v) if v.len() == 3));
    }

    #[test]
    fn unknown_filter_operator_rejected() {
        assert!(parse_filter(&doc! {"a": {"$near": 1}}).is_err());
        assert!(parse_filter(&doc! {"$where": "x"}).is_err());
    }

    #[test]
    fn variables_and_fields() {
        assert_eq!(parse_expr(&Bson::String("$name".into())).unwrap(), Expr::Field("name".into()));
        assert_eq!(
            parse_expr(&Bson::String("$$e.age".into())).unwrap(),
            Expr::Var { name: "e".into(), path: Some("age".into()) }
        );
    }

    #[test]
    fn cond_both_forms() {
        let a = parse_expr(&Bson::Document(doc! {"$cond": [true, 1, 2]})).unwrap();
        let b = parse_expr(&Bson::Document(doc! {"$cond": {"if": true, "then": 1, "else": 2}})).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn projection_mixing_is_rejected() {
        assert!(parse_find_projection(&doc! {"a": 1, "b": 0}).is_err());
        assert!(parse_find_projection(&doc! {"_id": 0, "a": 1}).is_ok());
    }

    #[test]
    fn group_requires_id_and_sum() {
        assert!(parse_pipeline(&[doc! {"$group": {"n": {"$sum": 1}}}]).is_err());
        assert!(parse_pipeline(&[doc! {"$group": {"_id": "$x", "n": {"$avg": 1}}}]).is_err());
        assert!(parse_pipeline(&[doc! {"$group": {"_id": "$x", "n": {"$sum": 1}}}]).is_ok());
    }

    #[test]
    fn update_pipeline_rejects_unwind() {
        let u = Update::Pipeline(vec![doc! {"$unwind": "$x"}]);
        assert!(parse_update(&u).is_err());
    }

    #[test]
    fn inc_requires_number() {
        assert!(parse_update_doc(&doc! {"$inc": {"a": "x"}}).is_err());
        let u = parse_update_doc(&doc! {"$set": {"age": 30}, "$unset": {"tmp": ""}}).unwrap();
        assert_eq!(u.set, vec![("age".to_string(), Bson::Int32(30))]);
        assert_eq!(u.unset, vec!["tmp".to_string()]);
    }
}
