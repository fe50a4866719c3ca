//! Seam to the external analytical engine.
//!
//! The engine accepts SQL text over a connection handle and returns
//! text-encoded rows; geometry and other nested structures are decoded by
//! the caller per field. A connection is checked out per logical unit of
//! work and returned when the unit completes.

pub mod connection;
pub mod factory;
pub mod rows;

pub use connection::EngineConnection;
pub use factory::EnginePool;
pub use rows::Row;

use duckdb::types::Value;

use crate::error::AppError;

/// Open-capable handle to the analytical engine.
pub trait SqlEngine: Send + Sync + 'static {
    type Conn: SqlConnection;

    /// Opens a connection for one logical unit of work; dropping the
    /// connection closes it.
    fn connect(&self) -> Result<Self::Conn, AppError>;
}

/// A single engine connection. All statements take their user-derived
/// values as bound parameters, never spliced into the SQL text.
pub trait SqlConnection {
    /// Executes a query and collects its result rows.
    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>, AppError>;

    /// Executes a single non-query statement, returning the affected count.
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<usize, AppError>;

    /// Executes a multi-statement script with no parameters.
    fn execute_batch(&mut self, sql: &str) -> Result<(), AppError>;
}
