//! Background maintenance.
//!
//! One task releases registration holds whose payment never arrived,
//! persists lapsed memberships as `expired` and drops expired job postings
//! from the search index.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

use crate::errors::AppError;
use crate::mail::{self, send_best_effort};
use crate::search;
use crate::AppState;

/// How often the sweeper runs.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Counts from one sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub released_holds: usize,
    pub expired_members: u64,
    pub reindexed: bool,
}

/// Run one sweep at `now`.
pub async fn sweep(state: &AppState, now: DateTime<Utc>) -> Result<SweepReport, AppError> {
    let released = state.repo.expire_stale_holds(now).await?;
    for registration in &released {
        tracing::info!(
            registration_id = %registration.id,
            event_id = %registration.event_id,
            "Released unpaid registration hold"
        );
        if let Ok(Some(event)) = state.repo.get_event(&registration.event_id).await {
            send_best_effort(
                state.mailer.as_ref(),
                mail::registration_cancelled(registration, &event),
            )
            .await;
        }
    }

    let expired_members = state.repo.expire_lapsed_memberships(now).await?;
    if expired_members > 0 {
        tracing::info!(count = expired_members, "Marked lapsed memberships expired");
    }

    let reindexed = state.search.is_stale(now).await;
    if reindexed {
        let indexed = search::reindex(&state.repo, &state.search, now).await?;
        tracing::info!(documents = indexed, "Refreshed search index");
    }

    Ok(SweepReport {
        released_holds: released.len(),
        expired_members,
        reindexed,
    })
}

/// Start the periodic sweeper.
pub fn spawn_sweeper(state: AppState, every: Duration) -> JoinHandle<()> {
    tracing::info!("Started sweeper with interval {:?}", every);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(e) = sweep(&state, Utc::now()).await {
                tracing::error!("Sweeper run failed: {}", e);
            }
        }
    })
}
