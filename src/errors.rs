use thiserror::Error;

#[derive(Debug, Error)]
pub enum BenchError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("MongoDB: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("BSON: {0}")]
    Bson(String),

    #[error("Serde JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Verification failed: {0}")]
    Verification(String),

    #[error("Logging error: {0}")]
    Logging(String),
}

impl From<std::io::Error> for BenchError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<mongodb::bson::ser::Error> for BenchError {
    fn from(e: mongodb::bson::ser::Error) -> Self {
        Self::Bson(e.to_string())
    }
}

impl From<mongodb::bson::de::Error> for BenchError {
    fn from(e: mongodb::bson::de::Error) -> Self {
        Self::Bson(e.to_string())
    }
}

impl From<mongodb::bson::document::ValueAccessError> for BenchError {
    fn from(e: mongodb::bson::document::ValueAccessError) -> Self {
        Self::Bson(e.to_string())
    }
}

impl From<toml::de::Error> for BenchError {
    fn from(e: toml::de::Error) -> Self {
        Self::Config(e.to_string())
    }
}
