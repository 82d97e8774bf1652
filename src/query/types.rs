use mongodb::bson::{Bson, Document};

pub(crate) const MAX_PATH_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CmpOp {
    #[must_use]
    pub fn from_operator(op: &str) -> Option<Self> {
        Some(match op {
            "$eq" => Self::Eq,
            "$ne" => Self::Ne,
            "$gt" => Self::Gt,
            "$gte" => Self::Gte,
            "$lt" => Self::Lt,
            "$lte" => Self::Lte,
            _ => return None,
        })
    }
}

/// Parsed query filter.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    True,
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Exists { path: String, exists: bool },
    In { path: String, values: Vec<Bson> },
    Cmp { path: String, op: CmpOp, value: Bson },
}

/// Parsed update-operator document (`$set`, `$inc`, `$unset`).
#[derive(Debug, Default, Clone, PartialEq)]
pub struct UpdateDoc {
    pub set: Vec<(String, Bson)>,
    pub inc: Vec<(String, Bson)>,
    pub unset: Vec<String>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UpdateReport {
    pub matched: u64,
    pub modified: u64,
}

/// Aggregation expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Bson),
    /// `"$a.b"`, resolved against the current document.
    Field(String),
    /// `"$$name.a.b"`.
    Var { name: String, path: Option<String> },
    Object(Vec<(String, Expr)>),
    Array(Vec<Expr>),
    Concat(Vec<Expr>),
    Size(Box<Expr>),
    Map { input: Box<Expr>, var: String, body: Box<Expr> },
    Cond { cond: Box<Expr>, then: Box<Expr>, otherwise: Box<Expr> },
    Cmp { op: CmpOp, lhs: Box<Expr>, rhs: Box<Expr> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Accumulator {
    Sum(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProjectField {
    Include,
    Exclude,
    Computed(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub fields: Vec<(String, ProjectField)>,
}

/// Parsed aggregation stage.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Match(Filter),
    Unwind(String),
    Group { id: Expr, fields: Vec<(String, Accumulator)> },
    Project(Projection),
    Set(Vec<(String, Expr)>),
    Unset(Vec<String>),
}

/// Right-hand side of an `update_many`.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// Operator document such as `{"$set": {...}}`.
    Operators(Document),
    /// Aggregation-pipeline update.
    Pipeline(Vec<Document>),
}

/// A declarative database operation, executable by any [`crate::store::DocumentStore`].
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Find { filter: Document, projection: Option<Document> },
    Aggregate { pipeline: Vec<Document> },
    UpdateMany { filter: Document, update: Update },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Documents(Vec<Document>),
    Updated(UpdateReport),
}

impl Outcome {
    /// Rows returned for reads, documents modified for updates.
    #[must_use]
    pub fn affected(&self) -> u64 {
        match self {
            Self::Documents(d) => d.len() as u64,
            Self::Updated(r) => r.modified,
        }
    }

    #[must_use]
    pub fn documents(&self) -> &[Document] {
        match self {
            Self::Documents(d) => d,
            Self::Updated(_) => &[],
        }
    }
}
