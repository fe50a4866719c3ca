use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("duckdb error: {0}")]
    DuckDb(#[from] duckdb::Error),
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("fetch failed after {attempts} attempt(s): {message}")]
    FetchExhausted { attempts: u32, message: String },
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("geometry conversion error: {0}")]
    Geometry(#[from] geojson::Error),
    #[error("row decode error: {0}")]
    Decode(String),
    #[error("internal error: {0}")]
    Internal(String),
}
