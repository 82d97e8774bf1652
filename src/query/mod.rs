//! Declarative operations and the in-process evaluator that runs them
//! without a database server.

mod eval;
mod exec;
mod parse;
mod types;

pub use eval::{Vars, compare_bson, eval_expr, eval_filter, get_path, set_path};
pub use exec::{aggregate, apply_update, find_docs, project, update_many};
pub use parse::{
    CompiledUpdate, parse_expr, parse_filter, parse_find_projection, parse_pipeline, parse_update,
    parse_update_doc,
};
pub use types::{
    Accumulator, CmpOp, Expr, Filter, Operation, Outcome, ProjectField, Projection, Stage, Update,
    UpdateDoc, UpdateReport,
};
