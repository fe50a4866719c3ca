//! Checked-out DuckDB connection with text-row execution methods.

use std::sync::Arc;

use duckdb::types::Value;
use duckdb::{params_from_iter, DuckdbConnectionManager};
use r2d2::PooledConnection;
use tracing::debug;

use crate::engine::rows::{value_to_text, Row};
use crate::engine::SqlConnection;
use crate::error::AppError;

pub struct EngineConnection {
    conn: PooledConnection<DuckdbConnectionManager>,
}

impl EngineConnection {
    pub(crate) fn new(conn: PooledConnection<DuckdbConnectionManager>) -> Self {
        Self { conn }
    }
}

impl SqlConnection for EngineConnection {
    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>, AppError> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut raw = if params.is_empty() {
            stmt.query([])?
        } else {
            stmt.query(params_from_iter(params.iter()))?
        };

        // Collect values first: Rows holds a mutable borrow on the
        // statement, and column names are only available after execution.
        let mut collected: Vec<Vec<Option<String>>> = Vec::new();
        while let Some(row) = raw.next()? {
            let mut values = Vec::new();
            for idx in 0.. {
                match row.get_ref(idx) {
                    Ok(value) => values.push(value_to_text(value)),
                    Err(_) => break,
                }
            }
            collected.push(values);
        }
        drop(raw);

        let columns: Arc<[String]> = stmt.column_names().into();
        debug!(rows = collected.len(), "executed query");
        Ok(collected
            .into_iter()
            .map(|values| Row::new(Arc::clone(&columns), values))
            .collect())
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<usize, AppError> {
        let mut stmt = self.conn.prepare(sql)?;
        let affected = if params.is_empty() {
            stmt.execute([])?
        } else {
            stmt.execute(params_from_iter(params.iter()))?
        };
        debug!(affected, "executed statement");
        Ok(affected)
    }

    fn execute_batch(&mut self, sql: &str) -> Result<(), AppError> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use duckdb::types::Value;

    use super::*;
    use crate::engine::SqlEngine;
    use crate::testing::plain_pool;

    #[test]
    fn rows_come_back_text_encoded_with_column_names() {
        let pool = plain_pool();
        let mut conn = pool.connect().unwrap();
        conn.execute_batch(
            "CREATE TABLE sample (name TEXT, pop DOUBLE); \
             INSERT INTO sample VALUES ('Japan', 126476461.0), ('Fiji', NULL);",
        )
        .unwrap();

        let rows = conn
            .query("SELECT name, pop FROM sample ORDER BY name;", &[])
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].columns(), ["name", "pop"]);
        assert_eq!(rows[0].get("name"), Some("Fiji"));
        assert_eq!(rows[0].get("pop"), None);
        assert_eq!(rows[1].get("name"), Some("Japan"));
        assert!(rows[1].require_f64("pop").is_ok());
    }

    #[test]
    fn parameters_are_bound_not_spliced() {
        let pool = plain_pool();
        let mut conn = pool.connect().unwrap();
        conn.execute_batch("CREATE TABLE names (name TEXT);").unwrap();
        let inserted = conn
            .execute(
                "INSERT INTO names VALUES (?);",
                &[Value::Text("Cote d'Ivoire".to_string())],
            )
            .unwrap();
        assert_eq!(inserted, 1);

        let rows = conn
            .query(
                "SELECT name FROM names WHERE name = ?;",
                &[Value::Text("Cote d'Ivoire".to_string())],
            )
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name"), Some("Cote d'Ivoire"));
    }

    #[test]
    fn serialized_json_column_parses_into_valid_geometry() {
        let pool = plain_pool();
        let mut conn = pool.connect().unwrap();
        let rows = conn
            .query(
                r#"SELECT '{"type":"Point","coordinates":[135.5,34.7]}' AS geom;"#,
                &[],
            )
            .unwrap();
        let geometry = rows[0].require_geometry("geom").unwrap();
        assert_eq!(
            geometry.value,
            geojson::Value::Point(vec![135.5, 34.7])
        );
    }

    #[test]
    fn threshold_filter_is_strict_and_monotone() {
        let pool = plain_pool();
        let mut conn = pool.connect().unwrap();
        conn.execute_batch(
            "CREATE TABLE pop (name TEXT, pop_est BIGINT); \
             INSERT INTO pop VALUES \
             ('A', 1000), ('B', 2000), ('C', 2000), ('D', 5000);",
        )
        .unwrap();

        let count_over = |conn: &mut EngineConnection, threshold: i64| {
            conn.query(
                "SELECT name FROM pop WHERE pop_est > ?;",
                &[Value::BigInt(threshold)],
            )
            .unwrap()
            .len()
        };

        // Strictly greater: rows equal to the threshold are excluded.
        assert_eq!(count_over(&mut conn, 2000), 1);
        // Raising the threshold never grows the result set.
        let mut previous = usize::MAX;
        for threshold in [0, 1000, 2000, 5000, 1_600_000_000] {
            let current = count_over(&mut conn, threshold);
            assert!(current <= previous);
            previous = current;
        }
        assert_eq!(previous, 0);
    }
}
