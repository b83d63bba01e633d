// ABOUTME: Operator view of stored witness state: latest checkpoint per log in the region.
// ABOUTME: Fans blocking store reads out over tokio's blocking pool, one task per log.

use std::fmt;

use anyhow::{Context, Result};
use tokio::task::JoinSet;
use witness_store::{LogState, Store};

/// What the store holds for one log.
#[derive(Debug)]
pub struct LogSummary {
    pub log_id: String,
    pub state: Option<LogState>,
}

impl fmt::Display for LogSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            None => write!(f, "{}  no checkpoint", self.log_id),
            Some(state) => write!(
                f,
                "{}  checkpoint={}B range={}B origin={}",
                self.log_id,
                state.checkpoint.len(),
                state.range.len(),
                origin(&state.checkpoint).unwrap_or("-"),
            ),
        }
    }
}

/// First line of a signed-note checkpoint, which names the log's origin.
/// `None` if the checkpoint is empty or not UTF-8.
fn origin(checkpoint: &[u8]) -> Option<&str> {
    let text = std::str::from_utf8(checkpoint).ok()?;
    text.lines().next().filter(|line| !line.is_empty())
}

/// Collect summaries for `only`, or for every log in the store's region,
/// sorted by log id.
pub async fn collect(store: Store, only: Option<String>) -> Result<Vec<LogSummary>> {
    let log_ids: Vec<String> = match only {
        Some(log_id) => vec![log_id],
        None => {
            let store = store.clone();
            tokio::task::spawn_blocking(move || store.logs())
                .await
                .context("log listing task panicked")??
                .into_iter()
                .collect()
        }
    };

    let mut tasks = JoinSet::new();
    for log_id in log_ids {
        let store = store.clone();
        tasks.spawn_blocking(move || {
            let state = match store.read_ops(&log_id).get_latest() {
                Ok(state) => Some(state),
                Err(e) if e.is_not_found() => None,
                Err(e) => return Err(e),
            };
            Ok(LogSummary { log_id, state })
        });
    }

    let mut summaries = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        summaries.push(joined.context("status task panicked")??);
    }
    summaries.sort_by(|a, b| a.log_id.cmp(&b.log_id));
    Ok(summaries)
}
