//! Cursor pagination shared by list endpoints.

use std::collections::HashSet;

use notion2sql_core::Result;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

/// One page of a Notion list response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaginatedList {
    #[serde(default)]
    pub results: Vec<Value>,
    #[serde(default)]
    pub next_cursor: Option<String>,
    #[serde(default)]
    pub has_more: bool,
}

impl PaginatedList {
    pub fn from_json(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

/// Fetch pages until `has_more` is false or `limit` results were collected.
///
/// `fetch` receives the cursor of the page to load, `None` for the first.
/// A cursor that was already followed ends the loop.
pub fn collect_all<F>(mut fetch: F, limit: Option<usize>) -> Result<Vec<Value>>
where
    F: FnMut(Option<&str>) -> Result<PaginatedList>,
{
    let mut results = Vec::new();
    let mut cursor: Option<String> = None;
    let mut seen = HashSet::new();
    let mut pages = 0usize;

    loop {
        let page = fetch(cursor.as_deref())?;
        pages += 1;
        results.extend(page.results);

        if let Some(limit) = limit {
            if results.len() >= limit {
                results.truncate(limit);
                break;
            }
        }

        match page.next_cursor {
            Some(next) if page.has_more => {
                if !seen.insert(next.clone()) {
                    warn!(cursor = %next, pages, "cursor repeated, stopping pagination");
                    break;
                }
                cursor = Some(next);
            }
            _ => break,
        }
    }

    debug!(pages, results = results.len(), "pagination finished");
    Ok(results)
}
