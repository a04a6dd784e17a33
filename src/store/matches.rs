//! Persisting finished matches

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::ws::protocol::{EndReason, MatchSummary};

use super::supabase::{SupabaseClient, SupabaseError};

/// Row in the `matches` table
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MatchRow {
    pub id: Uuid,
    pub winner_user_id: Option<Uuid>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_secs: u32,
    pub end_reason: EndReason,
}

/// Row in the `match_players` table
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MatchPlayerRow {
    pub match_id: Uuid,
    pub user_id: Uuid,
    pub bombs_placed: u32,
    pub players_killed: u32,
    pub is_winner: bool,
}

impl From<&MatchSummary> for MatchRow {
    fn from(summary: &MatchSummary) -> Self {
        Self {
            id: summary.session_id,
            winner_user_id: summary.winner,
            started_at: summary.started_at,
            ended_at: summary.ended_at,
            duration_secs: summary.duration_secs,
            end_reason: summary.reason,
        }
    }
}

pub fn player_rows(summary: &MatchSummary) -> Vec<MatchPlayerRow> {
    summary
        .players
        .iter()
        .map(|p| MatchPlayerRow {
            match_id: summary.session_id,
            user_id: p.user_id,
            bombs_placed: p.bombs_placed,
            players_killed: p.players_killed,
            is_winner: p.is_winner,
        })
        .collect()
}

/// Exponential backoff schedule
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 4,
            base_delay: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Run `op` until it succeeds or the policy runs out of attempts
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    what: &str,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.attempts => {
                let delay = policy.delay_after(attempt);
                warn!(what, attempt, delay_ms = delay.as_millis() as u64, error = %e, "Retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Writes terminal match summaries to Supabase
#[derive(Clone)]
pub struct MatchRecorder {
    client: SupabaseClient,
    policy: RetryPolicy,
}

impl MatchRecorder {
    pub fn new(client: SupabaseClient, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    pub async fn record(&self, summary: &MatchSummary) -> Result<(), SupabaseError> {
        let row = [MatchRow::from(summary)];
        retry_with_backoff(&self.policy, "insert match", || {
            self.client.upsert("matches", &row, "id")
        })
        .await?;

        let players = player_rows(summary);
        retry_with_backoff(&self.policy, "insert match players", || {
            self.client.upsert("match_players", &players, "match_id,user_id")
        })
        .await
    }

    /// Persist summaries as sessions finish. Failures are logged; they
    /// never reach the players, who already saw the result.
    pub async fn run(self, mut summaries: mpsc::UnboundedReceiver<MatchSummary>) {
        while let Some(summary) = summaries.recv().await {
            match self.record(&summary).await {
                Ok(()) => info!(session_id = %summary.session_id, "Match recorded"),
                Err(e) => error!(
                    session_id = %summary.session_id,
                    error = %e,
                    "Failed to persist match summary"
                ),
            }
        }
    }
}
