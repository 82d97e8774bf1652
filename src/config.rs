//! Layered benchmark configuration.
//!
//! Precedence: CLI > env > config file > defaults. The binary applies CLI
//! overrides on top of [`BenchConfig::load`].

use crate::errors::BenchError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Which store executes the queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Mongodb,
    Memory,
}

impl std::str::FromStr for Backend {
    type Err = BenchError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mongodb" | "mongo" => Ok(Self::Mongodb),
            "memory" | "mem" => Ok(Self::Memory),
            other => Err(BenchError::Config(format!("unknown backend: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self { host: "localhost".into(), port: 27017 }
    }
}

impl ConnectionConfig {
    #[must_use]
    pub fn uri(&self) -> String {
        format!("mongodb://{}:{}/", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub name: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { name: "lab2_db".into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionsConfig {
    pub person_centric: String,
    pub company_centric: String,
}

impl Default for CollectionsConfig {
    fn default() -> Self {
        Self { person_centric: "persons_m2".into(), company_centric: "companies_m3".into() }
    }
}

/// Dataset shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub num_companies: usize,
    pub num_persons_per_company: usize,
    pub reference_year: i32,
    pub birth_year_min: i32,
    pub birth_year_max: i32,
    pub seed: Option<u64>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            num_companies: 100,
            num_persons_per_company: 1000,
            reference_year: 2024,
            birth_year_min: 1950,
            birth_year_max: 2000,
            seed: None,
        }
    }
}

impl DataConfig {
    #[must_use]
    pub const fn total_persons(&self) -> usize {
        self.num_companies.saturating_mul(self.num_persons_per_company)
    }
}

/// Constants baked into Q3 and Q4.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueriesConfig {
    pub age_threshold_year: i32,
    pub fixed_age: i32,
    pub company_suffix: String,
}

impl Default for QueriesConfig {
    fn default() -> Self {
        Self { age_threshold_year: 1988, fixed_age: 30, company_suffix: " Company".into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: Option<PathBuf>,
    pub level: String,
    pub retention: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { dir: None, level: "info".into(), retention: 7 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BenchConfig {
    pub backend: Backend,
    pub connection: ConnectionConfig,
    pub database: DatabaseConfig,
    pub collections: CollectionsConfig,
    pub data: DataConfig,
    pub queries: QueriesConfig,
    pub logging: LoggingConfig,
}

impl BenchConfig {
    /// Resolve configuration from the first config file found, then the environment.
    /// Returns the file that was used, if any.
    ///
    /// # Errors
    /// Returns an error if a config file exists but cannot be read or parsed,
    /// or if an environment override is malformed.
    pub fn load(cli_cfg: Option<&Path>) -> Result<(Self, Option<PathBuf>), BenchError> {
        let source = find_config_paths(cli_cfg).into_iter().find(|p| p.exists());
        let mut cfg = match &source {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        cfg.apply_env()?;
        Ok((cfg, source))
    }

    /// Parse a config file. `.json` files are read as JSON, anything else as TOML.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, BenchError> {
        let s = std::fs::read_to_string(path)
            .map_err(|e| BenchError::Config(format!("{}: {e}", path.display())))?;
        if path.extension().is_some_and(|e| e.eq_ignore_ascii_case("json")) {
            Ok(serde_json::from_str(&s)?)
        } else {
            Ok(toml::from_str(&s)?)
        }
    }

    /// Apply `DOCBENCH_*` environment overrides.
    ///
    /// # Errors
    /// Returns an error if `DOCBENCH_PORT` or `DOCBENCH_BACKEND` is malformed.
    pub fn apply_env(&mut self) -> Result<(), BenchError> {
        self.apply_vars(|k| std::env::var(k).ok())
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), BenchError> {
        if let Some(h) = var("DOCBENCH_HOST") {
            self.connection.host = h;
        }
        if let Some(p) = var("DOCBENCH_PORT") {
            self.connection.port =
                p.parse().map_err(|_| BenchError::Config(format!("DOCBENCH_PORT: {p}")))?;
        }
        if let Some(db) = var("DOCBENCH_DB") {
            self.database.name = db;
        }
        if let Some(b) = var("DOCBENCH_BACKEND") {
            self.backend = b.parse()?;
        }
        Ok(())
    }

    /// # Errors
    /// Returns `BenchError::Config` naming the first invalid setting.
    pub fn validate(&self) -> Result<(), BenchError> {
        let d = &self.data;
        if d.num_companies == 0 || d.num_persons_per_company == 0 {
            return Err(BenchError::Config("dataset sizes must be non-zero".into()));
        }
        if d.num_companies.checked_mul(d.num_persons_per_company).is_none() {
            return Err(BenchError::Config(format!(
                "{} companies x {} persons overflows the person count",
                d.num_companies, d.num_persons_per_company
            )));
        }
        if d.birth_year_min > d.birth_year_max {
            return Err(BenchError::Config(format!(
                "empty birth year range {}..={}",
                d.birth_year_min, d.birth_year_max
            )));
        }
        if d.reference_year < d.birth_year_max {
            return Err(BenchError::Config(format!(
                "reference_year {} precedes birth_year_max {}",
                d.reference_year, d.birth_year_max
            )));
        }
        if self.collections.person_centric == self.collections.company_centric {
            return Err(BenchError::Config("layouts need distinct collection names".into()));
        }
        Ok(())
    }

    /// # Errors
    /// Returns an error if the config cannot be serialized.
    pub fn to_toml(&self) -> Result<String, BenchError> {
        toml::to_string_pretty(self).map_err(|e| BenchError::Config(e.to_string()))
    }
}

/// Candidate config files in precedence order.
#[must_use]
pub fn find_config_paths(cli_cfg: Option<&Path>) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = vec![];
    if let Some(p) = cli_cfg {
        paths.push(p.to_path_buf());
    }
    if let Ok(p) = std::env::var("DOCBENCH_CONFIG") {
        paths.push(PathBuf::from(p));
    }
    if let Some(dir) = dirs_next::config_dir() {
        paths.push(dir.join("docbench.toml"));
    }
    if let Ok(cur) = std::env::current_dir() {
        paths.push(cur.join("docbench.toml"));
        paths.push(cur.join("config.json"));
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_lab_setup() {
        let c = BenchConfig::default();
        assert_eq!(c.connection.uri(), "mongodb://localhost:27017/");
        assert_eq!(c.database.name, "lab2_db");
        assert_eq!(c.data.total_persons(), 100_000);
        assert_eq!(c.queries.company_suffix, " Company");
        assert!(c.validate().is_ok());
    }

    #[test]
    fn env_overrides_apply() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("DOCBENCH_HOST", "db.internal"),
            ("DOCBENCH_PORT", "27018"),
            ("DOCBENCH_BACKEND", "memory"),
        ]);
        let mut c = BenchConfig::default();
        c.apply_vars(|k| vars.get(k).map(|v| (*v).to_string())).unwrap();
        assert_eq!(c.connection.host, "db.internal");
        assert_eq!(c.connection.port, 27018);
        assert_eq!(c.backend, Backend::Memory);
        assert_eq!(c.database.name, "lab2_db");
    }

    #[test]
    fn bad_port_is_rejected() {
        let mut c = BenchConfig::default();
        let err = c.apply_vars(|k| (k == "DOCBENCH_PORT").then(|| "nope".to_string()));
        assert!(matches!(err, Err(BenchError::Config(_))));
    }

    #[test]
    fn validate_rejects_inverted_years() {
        let mut c = BenchConfig::default();
        c.data.birth_year_min = 2001;
        assert!(c.validate().is_err());
        let mut c = BenchConfig::default();
        c.data.reference_year = 1990;
        assert!(c.validate().is_err());
        let mut c = BenchConfig::default();
        c.data.num_companies = 0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn oversized_dataset_is_rejected() {
        let mut c = BenchConfig::default();
        c.data.num_companies = usize::MAX / 2;
        c.data.num_persons_per_company = 4;
        assert!(matches!(c.validate(), Err(BenchError::Config(_))));
        assert_eq!(c.data.total_persons(), usize::MAX);
    }
}
