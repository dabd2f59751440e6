use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Source of wall-clock time for boundary alignment
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Work executed at every refresh boundary
#[async_trait]
pub trait RefreshJob: Send + Sync {
    async fn refresh(&self, boundary: DateTime<Utc>) -> Result<()>;
}

/// First instant strictly after `now` whose minute is a multiple of `interval_minutes`
///
/// Boundaries are counted from the Unix epoch, so any interval that divides an
/// hour lands on :00/:15/:30/:45-style marks.
pub fn next_boundary(now: DateTime<Utc>, interval_minutes: u32) -> DateTime<Utc> {
    let interval_secs = i64::from(interval_minutes.max(1)) * 60;
    let secs = now.timestamp();
    let next = secs - secs.rem_euclid(interval_secs) + interval_secs;
    DateTime::from_timestamp(next, 0)
        .unwrap_or_else(|| now + chrono::Duration::seconds(interval_secs))
}

pub fn delay_until_next_boundary(now: DateTime<Utc>, interval_minutes: u32) -> Duration {
    (next_boundary(now, interval_minutes) - now)
        .to_std()
        .unwrap_or(Duration::ZERO)
}

/// Task status tracking
#[derive(Debug, Clone, Default)]
pub struct TaskStatus {
    pub last_run: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub run_count: u64,
    pub success_count: u64,
    pub error_count: u64,
}

/// Runs a job at every wall-clock aligned boundary
///
/// After each run the delay to the following boundary is recomputed from the
/// clock's current time, so a slow job or a late timer never shifts later runs.
/// Each boundary fires at most once, even when the clock reads slightly behind it.
pub struct RefreshScheduler {
    job: Arc<dyn RefreshJob>,
    clock: Arc<dyn Clock>,
    interval_minutes: u32,
    status: Arc<RwLock<TaskStatus>>,
}

impl RefreshScheduler {
    pub fn new(job: Arc<dyn RefreshJob>, interval_minutes: u32) -> Self {
        Self::with_clock(job, Arc::new(SystemClock), interval_minutes)
    }

    pub fn with_clock(job: Arc<dyn RefreshJob>, clock: Arc<dyn Clock>, interval_minutes: u32) -> Self {
        Self {
            job,
            clock,
            interval_minutes: interval_minutes.max(1),
            status: Arc::new(RwLock::new(TaskStatus::default())),
        }
    }

    /// Spawn the loop on the current tokio runtime
    pub fn start(self) -> RefreshHandle {
        let token = CancellationToken::new();
        let status = self.status.clone();
        let task = tokio::spawn(self.run(token.clone()));
        RefreshHandle {
            token,
            task: Some(task),
            status,
        }
    }

    async fn run(self, token: CancellationToken) {
        info!(interval_minutes = self.interval_minutes, "refresh scheduler started");

        let mut last_boundary: Option<DateTime<Utc>> = None;

        loop {
            let now = self.clock.now();
            // A wall clock lagging the timer must not land before the boundary just served
            let reference = last_boundary.map_or(now, |last| now.max(last));
            let boundary = next_boundary(reference, self.interval_minutes);
            let delay = (boundary - now).to_std().unwrap_or(Duration::ZERO);

            info!(
                "Next refresh scheduled for {} (in {} seconds)",
                boundary.format("%Y-%m-%d %H:%M:%S"),
                delay.as_secs()
            );

            tokio::select! {
                _ = token.cancelled() => break,
                _ = sleep(delay) => {}
            }

            let started = Utc::now();
            {
                let mut status = self.status.write().await;
                status.last_run = Some(started);
                status.run_count += 1;
            }

            last_boundary = Some(boundary);

            let outcome = tokio::select! {
                _ = token.cancelled() => break,
                outcome = self.job.refresh(boundary) => outcome,
            };

            let mut status = self.status.write().await;
            match outcome {
                Ok(()) => {
                    status.last_success = Some(started);
                    status.success_count += 1;
                    status.last_error = None;
                }
                Err(e) => {
                    status.error_count += 1;
                    status.last_error = Some(e.to_string());
                    error!(error = %e, %boundary, "refresh failed");
                }
            }
        }

        info!("refresh scheduler stopped");
    }
}

/// Owner of a running scheduler; dropping it cancels the pending timer
pub struct RefreshHandle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
    status: Arc<RwLock<TaskStatus>>,
}

impl RefreshHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub async fn status(&self) -> TaskStatus {
        self.status.read().await.clone()
    }

    /// Cancel and wait for the loop to exit
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!(error = %e, "refresh task ended abnormally");
            }
        }
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use parking_lot::Mutex;
    use rstest::rstest;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, h, m, s).unwrap()
    }

    #[rstest]
    #[case(at(12, 0, 0), at(12, 15, 0))]
    #[case(at(12, 0, 1), at(12, 15, 0))]
    #[case(at(12, 14, 59), at(12, 15, 0))]
    #[case(at(12, 15, 0), at(12, 30, 0))]
    #[case(at(12, 44, 30), at(12, 45, 0))]
    #[case(at(23, 50, 0), Utc.with_ymd_and_hms(2024, 6, 2, 0, 0, 0).unwrap())]
    fn test_next_quarter_hour(#[case] now: DateTime<Utc>, #[case] expected: DateTime<Utc>) {
        assert_eq!(next_boundary(now, 15), expected);
    }

    #[test]
    fn test_boundary_sub_second() {
        let now = at(12, 14, 59) + chrono::Duration::milliseconds(750);
        assert_eq!(next_boundary(now, 15), at(12, 15, 0));
        assert_eq!(delay_until_next_boundary(now, 15), Duration::from_millis(250));
    }

    #[test]
    fn test_other_intervals() {
        assert_eq!(next_boundary(at(12, 7, 0), 5), at(12, 10, 0));
        assert_eq!(next_boundary(at(12, 59, 0), 60), at(13, 0, 0));
        // zero is treated as one minute
        assert_eq!(next_boundary(at(12, 7, 30), 0), at(12, 8, 0));
    }

    #[test]
    fn test_delay_never_exceeds_interval() {
        let delay = delay_until_next_boundary(at(12, 0, 0), 15);
        assert_eq!(delay, Duration::from_secs(15 * 60));
    }

    /// Replays a fixed sequence of instants, repeating the last one
    struct ScriptedClock {
        times: Mutex<Vec<DateTime<Utc>>>,
    }

    impl ScriptedClock {
        fn new(mut times: Vec<DateTime<Utc>>) -> Self {
            times.reverse();
            Self {
                times: Mutex::new(times),
            }
        }
    }

    impl Clock for ScriptedClock {
        fn now(&self) -> DateTime<Utc> {
            let mut times = self.times.lock();
            if times.len() > 1 {
                times.pop().unwrap()
            } else {
                times[0]
            }
        }
    }

    struct RecordingJob {
        tx: mpsc::UnboundedSender<DateTime<Utc>>,
        fail: bool,
    }

    #[async_trait]
    impl RefreshJob for RecordingJob {
        async fn refresh(&self, boundary: DateTime<Utc>) -> Result<()> {
            let _ = self.tx.send(boundary);
            if self.fail {
                anyhow::bail!("upstream fetch failed");
            }
            Ok(())
        }
    }

    fn just_before(h: u32, m: u32) -> DateTime<Utc> {
        at(h, m, 0) - chrono::Duration::milliseconds(10)
    }

    #[tokio::test]
    async fn test_reschedules_from_current_time() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let clock = ScriptedClock::new(vec![
            just_before(12, 15),
            // the clock jumped: the next boundary follows the actual time
            just_before(13, 0),
            just_before(13, 15),
        ]);
        let handle = RefreshScheduler::with_clock(
            Arc::new(RecordingJob { tx, fail: false }),
            Arc::new(clock),
            15,
        )
        .start();

        let mut seen = Vec::new();
        for _ in 0..3 {
            let boundary = timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("refresh fired")
                .expect("channel open");
            seen.push(boundary);
        }
        assert_eq!(seen, vec![at(12, 15, 0), at(13, 0, 0), at(13, 15, 0)]);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_lagging_clock_does_not_refire_boundary() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let clock = ScriptedClock::new(vec![
            just_before(12, 15),
            // woke on time but the wall clock still reads before 12:15
            at(12, 14, 59) + chrono::Duration::milliseconds(995),
            at(12, 15, 1),
        ]);
        let handle = RefreshScheduler::with_clock(
            Arc::new(RecordingJob { tx, fail: false }),
            Arc::new(clock),
            15,
        )
        .start();

        let first = rx.recv().await.expect("first refresh");
        let second = rx.recv().await.expect("second refresh");
        assert_eq!(first, at(12, 15, 0));
        assert_eq!(second, at(12, 30, 0));

        let status = handle.status().await;
        assert_eq!(status.run_count, 2);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_cancel_releases_pending_timer() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let clock = ScriptedClock::new(vec![at(12, 0, 0)]);
        let handle = RefreshScheduler::with_clock(
            Arc::new(RecordingJob { tx, fail: false }),
            Arc::new(clock),
            15,
        )
        .start();

        handle.cancel();
        assert!(handle.is_cancelled());
        let status = handle.status().await;
        timeout(Duration::from_secs(1), handle.shutdown())
            .await
            .expect("scheduler stops without waiting for the boundary");

        assert_eq!(status.run_count, 0);
        // the job (and its sender) is gone once the loop exits
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_job_errors_do_not_stop_the_loop() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let clock = ScriptedClock::new(vec![just_before(12, 15), just_before(12, 30)]);
        let handle = RefreshScheduler::with_clock(
            Arc::new(RecordingJob { tx, fail: true }),
            Arc::new(clock),
            15,
        )
        .start();

        for _ in 0..2 {
            timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("refresh fired")
                .expect("channel open");
        }

        let status = handle.status().await;
        assert!(status.run_count >= 2);
        assert!(status.error_count >= 1);
        assert_eq!(status.success_count, 0);
        assert_eq!(status.last_error.as_deref(), Some("upstream fetch failed"));

        handle.shutdown().await;
    }
}
