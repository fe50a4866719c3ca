//! Query panels.
//!
//! Each panel owns its own result state and issues its queries over its own
//! engine connections; no panel observes another's in-flight state, and a
//! failure in one panel never affects the others. A panel's query text is a
//! pure function of its current parameters, executed with bound values.

pub mod choropleth;
pub mod count;
pub mod largest;
pub mod lookup;
pub mod population;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use duckdb::types::Value;
use tracing::debug;

use crate::engine::{Row, SqlConnection, SqlEngine};
use crate::error::AppError;

/// Render state of one panel.
#[derive(Debug, Clone, PartialEq)]
pub enum PanelState<T> {
    /// No completed query yet, or gated on an unfinished upstream load.
    Loading,
    Ready(T),
    /// A completed query returned zero rows.
    NoResult,
    Failed(String),
}

impl<T> PanelState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, PanelState::Loading)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, PanelState::Ready(_))
    }
}

/// Ticket for one query issuance, ordered per panel.
#[derive(Debug)]
pub struct QueryTicket(u64);

/// Holds the latest panel result, tagged with the sequence number of the
/// query that produced it. A completion carrying a superseded ticket is
/// discarded, so a slow response for abandoned parameters never overwrites
/// a newer result.
pub struct ResultSlot<T> {
    issued: AtomicU64,
    inner: Mutex<SlotInner<T>>,
}

struct SlotInner<T> {
    applied: u64,
    state: PanelState<T>,
}

impl<T: Clone> ResultSlot<T> {
    pub fn new() -> Self {
        Self {
            issued: AtomicU64::new(0),
            inner: Mutex::new(SlotInner {
                applied: 0,
                state: PanelState::Loading,
            }),
        }
    }

    pub fn begin(&self) -> QueryTicket {
        QueryTicket(self.issued.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Applies `state` unless a later query has already completed.
    pub fn complete(&self, ticket: QueryTicket, state: PanelState<T>) -> bool {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if ticket.0 < inner.applied {
            debug!(
                ticket = ticket.0,
                applied = inner.applied,
                "discarding stale query result"
            );
            return false;
        }
        inner.applied = ticket.0;
        inner.state = state;
        true
    }

    pub fn state(&self) -> PanelState<T> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .state
            .clone()
    }
}

impl<T: Clone> Default for ResultSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs one query over a fresh connection on the blocking pool.
pub(crate) async fn run_query<E: SqlEngine>(
    engine: Arc<E>,
    sql: String,
    params: Vec<Value>,
) -> Result<Vec<Row>, AppError> {
    tokio::task::spawn_blocking(move || {
        let mut conn = engine.connect()?;
        conn.query(&sql, &params)
    })
    .await
    .map_err(|err| AppError::Internal(format!("query task failed: {err}")))?
}
