use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::pipeline::Notifier;

// ---------------------------------------------------------------------------
// Clock trait + implementations
// ---------------------------------------------------------------------------

/// Source of the current instant, swappable in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
pub struct FakeClock {
    time: std::sync::RwLock<DateTime<Utc>>,
}

impl FakeClock {
    pub fn new(time: DateTime<Utc>) -> Self {
        Self {
            time: std::sync::RwLock::new(time),
        }
    }

    pub fn set(&self, time: DateTime<Utc>) {
        if let Ok(mut t) = self.time.write() {
            *t = time;
        }
    }
}

impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        self.time.read().map(|t| *t).unwrap_or_else(|e| *e.into_inner())
    }
}

// ---------------------------------------------------------------------------
// compute_next_run
// ---------------------------------------------------------------------------

/// Next occurrence of `schedule` strictly after `after`.
///
/// With a `timezone`, the expression is evaluated in that IANA zone and the
/// result converted back to UTC.
pub fn compute_next_run(
    schedule: &str,
    timezone: Option<&str>,
    after: DateTime<Utc>,
) -> Result<DateTime<Utc>> {
    use std::str::FromStr;
    let cron = croner::Cron::from_str(schedule)
        .map_err(|e| anyhow::anyhow!("Invalid cron expression '{}': {}", schedule, e))?;

    match timezone {
        Some(tz_str) => {
            let tz: chrono_tz::Tz = tz_str
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid timezone '{}': {}", tz_str, e))?;
            let local_after = after.with_timezone(&tz);
            let next_local = cron
                .find_next_occurrence(&local_after, false)
                .map_err(|e| anyhow::anyhow!("Cron next occurrence error: {}", e))?;
            Ok(next_local.with_timezone(&Utc))
        }
        None => cron
            .find_next_occurrence(&after, false)
            .map_err(|e| anyhow::anyhow!("Cron next occurrence error: {}", e)),
    }
}

// ---------------------------------------------------------------------------
// SweepScheduler
// ---------------------------------------------------------------------------

/// Long-lived task that runs the notification sweep for every saved search
/// on a cron schedule.
pub struct SweepScheduler {
    notifier: Notifier,
    schedule: String,
    timezone: Option<String>,
    clock: Arc<dyn Clock>,
}

impl SweepScheduler {
    pub fn new(
        notifier: Notifier,
        schedule: &str,
        timezone: Option<&str>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            notifier,
            schedule: schedule.to_string(),
            timezone: timezone.map(String::from),
            clock,
        }
    }

    /// Sleep duration until the next sweep, measured from the clock's now.
    pub fn time_until_next(&self) -> Result<(DateTime<Utc>, Duration)> {
        let now = self.clock.now();
        let next = compute_next_run(&self.schedule, self.timezone.as_deref(), now)?;
        Ok((next, (next - now).to_std().unwrap_or(Duration::ZERO)))
    }

    /// Run one sweep and log its outcome.
    pub async fn tick(&self) {
        match self.notifier.run_all().await {
            Ok(summary) => tracing::info!(
                "Scheduled sweep: {} searches, {} failed",
                summary.ran,
                summary.failed
            ),
            Err(e) => tracing::error!("Scheduled sweep failed: {}", e),
        }
    }

    /// Main loop. Runs until `shutdown` fires.
    pub async fn run(&self, mut shutdown: tokio::sync::watch::Receiver<()>) -> Result<()> {
        loop {
            let (next, sleep_for) = self.time_until_next()?;
            tracing::debug!("Next sweep at {}", next);

            tokio::select! {
                _ = tokio::time::sleep(sleep_for) => {
                    self.tick().await;
                }
                _ = shutdown.changed() => {
                    tracing::info!("Sweep scheduler stopping");
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailer::LogMailer;
    use crate::pipeline::{Ingestor, SearchRegistry, SeenTracker};
    use crate::storage::MemoryStore;
    use chrono::TimeZone;

    fn notifier() -> Notifier {
        let store = Arc::new(MemoryStore::new());
        let registry = SearchRegistry::new(store.clone());
        let tracker = SeenTracker::new(store.clone(), registry.clone());
        let ingestor = Ingestor::new(store, Vec::new());
        Notifier::new(registry, tracker, ingestor, Arc::new(LogMailer))
    }

    #[test]
    fn test_next_run_daily_morning() {
        let after = Utc.with_ymd_and_hms(2025, 6, 15, 9, 30, 0).unwrap();
        let next = compute_next_run("0 8 * * *", None, after).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 6, 16, 8, 0, 0).unwrap());
    }

    #[test]
    fn test_next_run_is_exclusive() {
        let after = Utc.with_ymd_and_hms(2025, 6, 15, 10, 0, 0).unwrap();
        let next = compute_next_run("0 * * * *", None, after).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 6, 15, 11, 0, 0).unwrap());
    }

    #[test]
    fn test_next_run_in_timezone() {
        // 08:00 in London during BST is 07:00 UTC.
        let after = Utc.with_ymd_and_hms(2025, 6, 15, 0, 0, 0).unwrap();
        let next = compute_next_run("0 8 * * *", Some("Europe/London"), after).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 6, 15, 7, 0, 0).unwrap());
    }

    #[test]
    fn test_next_run_rejects_bad_input() {
        let now = Utc::now();
        assert!(compute_next_run("nope", None, now).is_err());
        assert!(compute_next_run("0 8 * * *", Some("Nowhere/City"), now).is_err());
    }

    #[test]
    fn test_time_until_next_uses_clock() {
        let clock = Arc::new(FakeClock::new(
            Utc.with_ymd_and_hms(2025, 1, 1, 7, 59, 0).unwrap(),
        ));
        let scheduler = SweepScheduler::new(notifier(), "0 8 * * *", None, clock.clone());
        let (_, wait) = scheduler.time_until_next().unwrap();
        assert_eq!(wait, Duration::from_secs(60));

        clock.set(Utc.with_ymd_and_hms(2025, 1, 1, 7, 0, 0).unwrap());
        let (_, wait) = scheduler.time_until_next().unwrap();
        assert_eq!(wait, Duration::from_secs(3600));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let scheduler = SweepScheduler::new(
            notifier(),
            "0 8 * * *",
            None,
            Arc::new(SystemClock),
        );
        let (tx, rx) = tokio::sync::watch::channel(());
        let handle = tokio::spawn(async move { scheduler.run(rx).await });
        tx.send(()).expect("send shutdown");
        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("scheduler should stop")
            .expect("join");
        assert!(result.is_ok());
    }
}
