//! Sync command.

use remodelcal_core::{ConflictPolicy, SyncStatus};

use super::{Context, local_time, print_json};
use crate::error::CliResult;

/// Runs one pass and prints the resulting status.
pub async fn run(
    context: &Context,
    user_id: &str,
    policy: Option<ConflictPolicy>,
    json: bool,
) -> CliResult<()> {
    let engine = context.engine(policy);
    let status = engine.perform_full_sync(user_id).await?;
    if json {
        print_json(&status)
    } else {
        print!("{}", render_status(&status, context));
        Ok(())
    }
}

pub(crate) fn render_status(status: &SyncStatus, context: &Context) -> String {
    let tz = context.time_zone();
    let mut out = format!("sync {} for {}\n", status.state.as_str(), status.user_id);
    out.push_str(&format!("  started:   {}\n", local_time(status.started_at, tz)));
    if let Some(finished) = status.finished_at {
        out.push_str(&format!("  finished:  {}\n", local_time(finished, tz)));
    }
    out.push_str(&format!(
        "  synced:    {} (pulled {}, pushed {}, local updates {}, remote updates {})\n",
        status.events_synced,
        status.pulled,
        status.pushed,
        status.updated_local,
        status.updated_remote
    ));
    out.push_str(&format!(
        "  conflicts: {} detected, {} resolved\n",
        status.conflicts_detected, status.conflicts_resolved
    ));
    for failure in &status.failures {
        out.push_str(&format!(
            "  failed:    {} [{}] {}\n",
            failure.provider, failure.code, failure.message
        ));
    }
    if let Some(ref message) = status.message {
        out.push_str(&format!("  message:   {}\n", message));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use remodelcal_core::{ProviderKind, SyncState};

    #[test]
    fn renders_counts_and_failures() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = crate::config::AppConfig::default();
        config.store.path = Some(dir.path().join("store.json"));
        let context = Context::open(&config).unwrap();

        let started = Utc.with_ymd_and_hms(2026, 11, 2, 15, 0, 0).unwrap();
        let mut status = SyncStatus::started("user-1", started);
        status.pulled = 2;
        status.pushed = 1;
        status.events_synced = 3;
        status.record_failure(ProviderKind::Outlook, "authentication_failed", "token expired");
        status.finish(SyncState::Partial, started + chrono::Duration::seconds(4));

        let text = render_status(&status, &context);
        assert!(text.starts_with("sync partial for user-1\n"));
        assert!(text.contains("synced:    3 (pulled 2, pushed 1"));
        assert!(text.contains("failed:    outlook [authentication_failed] token expired"));
        assert!(text.contains("finished:  Mon 2026-11-02 15:00 UTC"));
    }
}
