//! Shared test doubles and fixtures.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use duckdb::types::Value;

use crate::config::AppConfig;
use crate::engine::rows::Row;
use crate::engine::{EnginePool, SqlConnection, SqlEngine};
use crate::error::AppError;
use crate::overpass::OsmFetcher;

/// Real in-memory engine without any loadable extensions, for tests that
/// exercise plain SQL through the actual DuckDB stack.
pub fn plain_pool() -> EnginePool {
    let config = AppConfig {
        pool_size: 2,
        extensions: Vec::new(),
        ..AppConfig::default()
    };
    EnginePool::new(&config).expect("in-memory pool should build")
}

pub fn row(columns: &[&str], values: &[Option<&str>]) -> Row {
    let columns: Arc<[String]> = columns.iter().map(|c| c.to_string()).collect();
    Row::new(
        columns,
        values.iter().map(|v| v.map(str::to_string)).collect(),
    )
}

/// One statement observed by the fake engine.
#[derive(Debug, Clone)]
pub struct FakeCall {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Scripted stand-in for the analytical engine. Responses are matched by a
/// substring of the SQL text; per needle they are consumed in order, with
/// the last one reused for any further matches. Unscripted queries return
/// zero rows.
#[derive(Clone, Default)]
pub struct FakeEngine {
    inner: Arc<Mutex<FakeState>>,
}

#[derive(Default)]
struct FakeState {
    scripts: Vec<Script>,
    calls: Vec<FakeCall>,
}

struct Script {
    needle: String,
    outcomes: VecDeque<Result<Vec<Row>, String>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, needle: &str, rows: Vec<Row>) {
        self.push(needle, Ok(rows));
    }

    pub fn fail(&self, needle: &str, message: &str) {
        self.push(needle, Err(message.to_string()));
    }

    fn push(&self, needle: &str, outcome: Result<Vec<Row>, String>) {
        let mut state = self.inner.lock().expect("fake engine mutex poisoned");
        if let Some(script) = state.scripts.iter_mut().find(|s| s.needle == needle) {
            script.outcomes.push_back(outcome);
        } else {
            state.scripts.push(Script {
                needle: needle.to_string(),
                outcomes: VecDeque::from([outcome]),
            });
        }
    }

    pub fn calls(&self) -> Vec<FakeCall> {
        self.inner
            .lock()
            .expect("fake engine mutex poisoned")
            .calls
            .clone()
    }

    pub fn call_count(&self, needle: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.sql.contains(needle))
            .count()
    }

    fn dispatch(&self, sql: &str, params: &[Value]) -> Option<Result<Vec<Row>, String>> {
        let mut state = self.inner.lock().expect("fake engine mutex poisoned");
        state.calls.push(FakeCall {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        let script = state.scripts.iter_mut().find(|s| sql.contains(&s.needle))?;
        if script.outcomes.len() > 1 {
            script.outcomes.pop_front()
        } else {
            script.outcomes.front().cloned()
        }
    }
}

impl SqlEngine for FakeEngine {
    type Conn = FakeConnection;

    fn connect(&self) -> Result<FakeConnection, AppError> {
        Ok(FakeConnection {
            engine: self.clone(),
        })
    }
}

pub struct FakeConnection {
    engine: FakeEngine,
}

impl SqlConnection for FakeConnection {
    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>, AppError> {
        match self.engine.dispatch(sql, params) {
            Some(Ok(rows)) => Ok(rows),
            Some(Err(message)) => Err(AppError::Internal(message)),
            None => Ok(Vec::new()),
        }
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<usize, AppError> {
        match self.engine.dispatch(sql, params) {
            Some(Ok(_)) | None => Ok(1),
            Some(Err(message)) => Err(AppError::Internal(message)),
        }
    }

    fn execute_batch(&mut self, sql: &str) -> Result<(), AppError> {
        match self.engine.dispatch(sql, &[]) {
            Some(Err(message)) => Err(AppError::Internal(message)),
            _ => Ok(()),
        }
    }
}

/// Scripted stand-in for the Overpass service, matched by a substring of
/// the Overpass QL text.
#[derive(Clone, Default)]
pub struct FakeOverpass {
    responses: Arc<Mutex<Vec<(String, Result<serde_json::Value, String>)>>>,
}

impl FakeOverpass {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, needle: &str, payload: serde_json::Value) {
        self.responses
            .lock()
            .expect("fake overpass mutex poisoned")
            .push((needle.to_string(), Ok(payload)));
    }

    pub fn fail(&self, needle: &str, message: &str) {
        self.responses
            .lock()
            .expect("fake overpass mutex poisoned")
            .push((needle.to_string(), Err(message.to_string())));
    }
}

impl OsmFetcher for FakeOverpass {
    async fn fetch(&self, ql: &str) -> Result<serde_json::Value, AppError> {
        let responses = self
            .responses
            .lock()
            .expect("fake overpass mutex poisoned");
        match responses.iter().find(|(needle, _)| ql.contains(needle)) {
            Some((_, Ok(payload))) => Ok(payload.clone()),
            Some((_, Err(message))) => Err(AppError::FetchExhausted {
                attempts: 1,
                message: message.clone(),
            }),
            None => Err(AppError::Internal(format!(
                "unscripted overpass query: {ql}"
            ))),
        }
    }
}
