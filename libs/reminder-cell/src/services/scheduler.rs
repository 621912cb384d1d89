use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, TimeZone, Utc};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use shared_config::AppConfig;

use crate::models::{ReminderError, SweepKind};
use crate::services::clock::{until, Clock};
use crate::services::immediate::ImmediateReminderScheduler;
use crate::services::sweeper::ReminderSweeper;

/// First daily time strictly after `now`, reading `times` as wall-clock
/// times at `offset`.
pub fn next_fire(now: DateTime<Utc>, times: &[NaiveTime], offset: FixedOffset) -> Option<DateTime<Utc>> {
    let today = now.with_timezone(&offset).date_naive();

    let mut sorted = times.to_vec();
    sorted.sort();

    [today, today + Duration::days(1)]
        .into_iter()
        .flat_map(|day| {
            sorted
                .iter()
                .filter_map(move |t| offset.from_local_datetime(&day.and_time(*t)).single())
        })
        .map(|local| local.with_timezone(&Utc))
        .find(|at| *at > now)
}

struct Running {
    shutdown: watch::Sender<bool>,
    loops: Vec<JoinHandle<()>>,
}

/// Owns the recurring sweeps and the immediate reminder timers for the
/// process. Only one instance per deployment may run the sweeps.
pub struct ReminderScheduler {
    sweeper: Arc<ReminderSweeper>,
    immediate: ImmediateReminderScheduler,
    offset: FixedOffset,
    day_ahead_times: Vec<NaiveTime>,
    same_day_times: Vec<NaiveTime>,
    running: Mutex<Option<Running>>,
}

impl ReminderScheduler {
    pub fn new(
        config: &AppConfig,
        sweeper: Arc<ReminderSweeper>,
        immediate: ImmediateReminderScheduler,
    ) -> Self {
        Self {
            sweeper,
            immediate,
            offset: config.clinic_offset(),
            day_ahead_times: config.day_ahead_reminder_times.clone(),
            same_day_times: config.same_day_reminder_times.clone(),
            running: Mutex::new(None),
        }
    }

    pub fn immediate(&self) -> &ImmediateReminderScheduler {
        &self.immediate
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Re-arms pending immediate reminders, then spawns the day-ahead and
    /// same-day loops.
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<(), ReminderError> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(ReminderError::AlreadyRunning);
        }
        if self.day_ahead_times.is_empty() {
            return Err(ReminderError::EmptySchedule(SweepKind::DayAhead));
        }
        if self.same_day_times.is_empty() {
            return Err(ReminderError::EmptySchedule(SweepKind::SameDay));
        }

        if let Err(e) = self.immediate.rearm(self.sweeper.today()).await {
            // Sweeps still run; only restart recovery is lost.
            error!("Failed to re-arm immediate reminders: {}", e);
        }

        let (shutdown, receiver) = watch::channel(false);
        let loops = vec![
            self.spawn_loop(SweepKind::DayAhead, self.day_ahead_times.clone(), receiver.clone()),
            self.spawn_loop(SweepKind::SameDay, self.same_day_times.clone(), receiver),
        ];

        info!(
            "Reminder scheduler started (day-ahead at {:?}, same-day at {:?})",
            self.day_ahead_times, self.same_day_times
        );
        *running = Some(Running { shutdown, loops });
        Ok(())
    }

    /// Stops both loops and waits for them. Safe to call more than once.
    pub async fn stop(&self) {
        let Some(running) = self.running.lock().await.take() else {
            return;
        };

        let _ = running.shutdown.send(true);
        for result in futures::future::join_all(running.loops).await {
            if let Err(e) = result {
                if !e.is_cancelled() {
                    error!("Reminder loop ended abnormally: {}", e);
                }
            }
        }

        self.immediate.cancel_all();
        info!("Reminder scheduler stopped");
    }

    fn spawn_loop(
        &self,
        kind: SweepKind,
        times: Vec<NaiveTime>,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let sweeper = Arc::clone(&self.sweeper);
        let clock: Arc<dyn Clock> = sweeper.clock();
        let offset = self.offset;

        tokio::spawn(async move {
            loop {
                if *shutdown.borrow() {
                    break;
                }

                let now = clock.now();
                let Some(next) = next_fire(now, &times, offset) else {
                    warn!("No upcoming {} reminder time, loop exiting", kind);
                    break;
                };

                tokio::select! {
                    _ = tokio::time::sleep(until(now, next)) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                        continue;
                    }
                }

                match sweeper.run(kind).await {
                    Ok(report) => info!(
                        "{} sweep at {}: examined {}, sent {}, failed {}",
                        kind, next, report.examined, report.sent, report.failed
                    ),
                    Err(e) => error!("{} sweep at {} failed: {}", kind, next, e),
                }
            }

            info!("{} reminder loop stopped", kind);
        })
    }
}
