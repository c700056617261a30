use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::engine::Engine;

/// Background task that moves elapsed BOOKED bookings to COMPLETED.
pub async fn run_completer(engine: Arc<Engine>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        let now = chrono::Utc::now().timestamp_millis();
        match engine.complete_elapsed(now).await {
            Ok(0) => {}
            Ok(n) => debug!("completion sweep marked {n} bookings"),
            Err(e) => warn!("completion sweep failed: {e}"),
        }
    }
}

/// Background task that compacts the WAL once enough appends pile up.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(60));
    loop {
        interval.tick().await;
        let appends = engine.wal_appends_since_compact().await;
        if appends < threshold {
            continue;
        }
        match engine.compact_wal().await {
            Ok(()) => info!("compacted WAL after {appends} appends"),
            Err(e) => warn!("WAL compaction failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Caller, CourtDraft};
    use crate::model::*;
    use std::path::PathBuf;

    fn test_wal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("padelbook_test_reaper");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    #[tokio::test]
    async fn completer_sweeps_elapsed_bookings() {
        let engine = Arc::new(Engine::new(test_wal_path("completer.wal")).unwrap());
        let admin = Caller::from(&engine.ensure_admin("admin@padel.test", "Admin").await.unwrap());
        let court = engine
            .create_court(
                &admin,
                CourtDraft {
                    name: "Pista".into(),
                    address: "Calle 1".into(),
                    location: None,
                    price_cents: 1000,
                    owner_id: None,
                },
            )
            .await
            .unwrap();

        let now = chrono::Utc::now().timestamp_millis();
        let past = engine
            .create_booking(&admin, court.id, now - 2 * 3_600_000, now - 3_600_000)
            .await
            .unwrap();

        let task = tokio::spawn(run_completer(engine.clone(), Duration::from_millis(10)));
        let mut status = BookingStatus::Booked;
        for _ in 0..100 {
            status = engine.get_booking(&admin, past.id).await.unwrap().status;
            if status == BookingStatus::Completed {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        task.abort();
        assert_eq!(status, BookingStatus::Completed);
    }
}
