//! The benchmark runner: generate, load, then time Q1..Q4 per layout.

use crate::config::BenchConfig;
use crate::errors::BenchError;
use crate::generate::Generator;
use crate::layout::{Layout, QueryKind};
use crate::query::Outcome;
use crate::store::{self, DocumentStore};
use crate::verify;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use std::time::Instant;

#[derive(Debug, Clone, Serialize)]
pub struct QueryTiming {
    pub query: QueryKind,
    pub label: &'static str,
    pub seconds: f64,
    /// Rows returned by a read, documents modified by an update.
    pub affected: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LayoutReport {
    pub layout: Layout,
    pub collection: String,
    pub backend: &'static str,
    pub documents: u64,
    pub generate_seconds: f64,
    pub insert_seconds: f64,
    pub queries: Vec<QueryTiming>,
    pub verified: bool,
}

impl LayoutReport {
    #[must_use]
    pub fn timing(&self, kind: QueryKind) -> Option<&QueryTiming> {
        self.queries.iter().find(|t| t.query == kind)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BenchReport {
    pub when: String,
    pub database: String,
    pub num_companies: usize,
    pub num_persons_per_company: usize,
    pub seed: Option<u64>,
    pub layouts: Vec<LayoutReport>,
}

impl BenchReport {
    /// Write the report as pretty JSON, creating parent directories.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), BenchError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }
}

/// Options for one invocation.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub layouts: Vec<Layout>,
    pub verify: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self { layouts: Layout::ALL.to_vec(), verify: false }
    }
}

/// Run one layout end to end against `store`, printing timings to `out`.
///
/// # Errors
/// Returns the first store, generation, output or verification error.
pub fn run_layout(
    store: &dyn DocumentStore,
    cfg: &BenchConfig,
    layout: Layout,
    verify: bool,
    out: &mut dyn Write,
) -> Result<LayoutReport, BenchError> {
    let collection = layout.collection(&cfg.collections).to_string();
    writeln!(out, "== {} -> {collection} [{}]", layout.label(), store.backend_name())?;

    let start = Instant::now();
    let mut generator = Generator::from_config(&cfg.data);
    let docs = layout.documents(&mut generator)?;
    let generate_seconds = start.elapsed().as_secs_f64();
    log::info!("generated {} {collection} documents in {generate_seconds:.4}s", docs.len());

    store.drop_collection(&collection)?;
    let start = Instant::now();
    let documents = store.insert_many(&collection, docs)?;
    let insert_seconds = start.elapsed().as_secs_f64();
    writeln!(out, "Inserted {documents} documents in {insert_seconds:.4}s")?;
    crate::bench_event!({
        "bench": "load",
        "layout": layout,
        "collection": collection,
        "documents": documents,
        "generate_seconds": generate_seconds,
        "insert_seconds": insert_seconds,
    });

    let before = if verify {
        verify::check_loaded(store, &collection, layout, &cfg.data)?;
        Some(store.find_all(&collection)?)
    } else {
        None
    };

    let mut queries = Vec::with_capacity(QueryKind::ALL.len());
    for kind in QueryKind::ALL {
        let op = layout.operation(kind, &cfg.queries);
        let start = Instant::now();
        let outcome = store.execute(&collection, &op)?;
        let seconds = start.elapsed().as_secs_f64();
        writeln!(out, "{} execution time: {seconds:.4}s", kind.label())?;
        log::debug!("{} ({}) on {collection}: {outcome:?}", kind.label(), kind.description());
        crate::bench_event!({
            "bench": "query",
            "layout": layout,
            "op": kind.label(),
            "collection": collection,
            "seconds": seconds,
            "affected": outcome.affected(),
        });
        if verify {
            check_outcome(kind, &outcome, cfg)?;
        }
        queries.push(QueryTiming { query: kind, label: kind.label(), seconds, affected: outcome.affected() });
    }

    if let Some(before) = before {
        let after = store.find_all(&collection)?;
        verify::check_after_run(layout, &before, &after, &cfg.queries)?;
        writeln!(out, "Verification passed")?;
    }

    Ok(LayoutReport {
        layout,
        collection,
        backend: store.backend_name(),
        documents,
        generate_seconds,
        insert_seconds,
        queries,
        verified: verify,
    })
}

fn check_outcome(kind: QueryKind, outcome: &Outcome, cfg: &BenchConfig) -> Result<(), BenchError> {
    match kind {
        QueryKind::FullNames => verify::check_full_names(outcome.documents(), &cfg.data),
        QueryKind::EmployeeCounts => verify::check_employee_counts(outcome.documents(), &cfg.data),
        QueryKind::AgeUpdate | QueryKind::CompanyRename => match outcome {
            Outcome::Updated(_) => Ok(()),
            Outcome::Documents(_) => {
                Err(BenchError::Verification(format!("{} returned documents", kind.label())))
            }
        },
    }
}

/// Run the selected layouts against an already opened store. The config is
/// validated here, before any collection is touched.
///
/// # Errors
/// Returns `BenchError::Config` for an invalid config, otherwise the first
/// error from any layout.
pub fn run_with_store(
    store: &dyn DocumentStore,
    cfg: &BenchConfig,
    opts: &RunOptions,
    out: &mut dyn Write,
) -> Result<BenchReport, BenchError> {
    cfg.validate()?;
    let mut layouts = Vec::with_capacity(opts.layouts.len());
    for layout in &opts.layouts {
        layouts.push(run_layout(store, cfg, *layout, opts.verify, out)?);
    }
    Ok(BenchReport {
        when: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        database: cfg.database.name.clone(),
        num_companies: cfg.data.num_companies,
        num_persons_per_company: cfg.data.num_persons_per_company,
        seed: cfg.data.seed,
        layouts,
    })
}

/// Open the configured store and run.
///
/// # Errors
/// Returns an error if the store cannot be opened or any layout fails.
pub fn run(cfg: &BenchConfig, opts: &RunOptions, out: &mut dyn Write) -> Result<BenchReport, BenchError> {
    let store = store::open_store(cfg)?;
    run_with_store(store.as_ref(), cfg, opts, out)
}
