use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, FixedOffset, NaiveDate};
use tracing::{debug, error, info, instrument, warn};

use appointment_cell::services::visit::visit_details;
use appointment_cell::{Appointment, AppointmentStatus, AppointmentStore, UserDirectory};
use notification_cell::services::templates;
use notification_cell::{Notification, Notifier, VisitDetails};
use shared_config::AppConfig;

use crate::models::{ReminderError, SweepKind, SweepReport};
use crate::services::clock::Clock;
use crate::services::participants::{doctor_of, patient_of};

/// Same-day reminders go out for visits starting in `(90, 150]` minutes.
const SAME_DAY_WINDOW_OPEN_MINUTES: i64 = 90;
const SAME_DAY_WINDOW_CLOSE_MINUTES: i64 = 150;

/// Batch reminder waves. Each row is sent at most once per wave thanks to
/// the persisted flags; a failed send leaves the flag unset for the next run.
pub struct ReminderSweeper {
    store: Arc<dyn AppointmentStore>,
    directory: Arc<dyn UserDirectory>,
    notifier: Notifier,
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
    video_base_url: String,
    throttle: Duration,
}

impl ReminderSweeper {
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn AppointmentStore>,
        directory: Arc<dyn UserDirectory>,
        notifier: Notifier,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            directory,
            notifier,
            clock,
            offset: config.clinic_offset(),
            video_base_url: config.video_base_url.clone(),
            throttle: Duration::from_millis(config.reminder_throttle_ms),
        }
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.now().with_timezone(&self.offset).date_naive()
    }

    pub async fn run(&self, kind: SweepKind) -> Result<SweepReport, ReminderError> {
        match kind {
            SweepKind::DayAhead => self.run_day_ahead().await,
            SweepKind::SameDay => self.run_same_day().await,
        }
    }

    /// Reminds patients of tomorrow's visits.
    #[instrument(skip(self))]
    pub async fn run_day_ahead(&self) -> Result<SweepReport, ReminderError> {
        let today = self.today();
        let Some(tomorrow) = today.succ_opt() else {
            return Ok(SweepReport::default());
        };

        let due: Vec<Appointment> = self
            .store
            .find_by_day(tomorrow, &AppointmentStatus::UPCOMING)
            .await?
            .into_iter()
            .filter(|a| !a.follow_up_notification_sent)
            .collect();

        info!("Day-ahead sweep: {} appointments on {} to remind", due.len(), tomorrow);
        let report = self
            .send_wave(SweepKind::DayAhead, &due, templates::day_ahead_reminder)
            .await;

        info!(
            "Day-ahead sweep finished: {} sent, {} failed",
            report.sent, report.failed
        );
        Ok(report)
    }

    /// Reminds patients of visits starting in roughly two hours.
    #[instrument(skip(self))]
    pub async fn run_same_day(&self) -> Result<SweepReport, ReminderError> {
        let now = self.clock.now();
        let today = now.with_timezone(&self.offset).date_naive();

        let candidates: Vec<Appointment> = self
            .store
            .find_by_day(today, &AppointmentStatus::UPCOMING)
            .await?
            .into_iter()
            .filter(|a| !a.same_day_reminder_sent)
            .collect();

        let open = ChronoDuration::minutes(SAME_DAY_WINDOW_OPEN_MINUTES);
        let close = ChronoDuration::minutes(SAME_DAY_WINDOW_CLOSE_MINUTES);

        let due: Vec<Appointment> = candidates
            .iter()
            .filter(|a| match a.starts_at(self.offset) {
                Some(start) => {
                    let lead = start - now;
                    lead > open && lead <= close
                }
                None => false,
            })
            .cloned()
            .collect();

        debug!(
            "Same-day sweep: {} of {} appointments today inside the window",
            due.len(),
            candidates.len()
        );

        let mut report = self
            .send_wave(SweepKind::SameDay, &due, templates::same_day_reminder)
            .await;
        report.examined = candidates.len();

        info!(
            "Same-day sweep finished: {} sent, {} failed",
            report.sent, report.failed
        );
        Ok(report)
    }

    async fn send_wave<F>(&self, kind: SweepKind, due: &[Appointment], render: F) -> SweepReport
    where
        F: Fn(&VisitDetails) -> Notification,
    {
        let mut report = SweepReport {
            examined: due.len(),
            ..SweepReport::default()
        };

        for (index, appointment) in due.iter().enumerate() {
            if index > 0 && !self.throttle.is_zero() {
                tokio::time::sleep(self.throttle).await;
            }

            match self.remind(kind, appointment, &render).await {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    report.failed += 1;
                    error!("{} reminder for {} failed: {}", kind, appointment.id, e);
                }
            }
        }

        report
    }

    async fn remind<F>(&self, kind: SweepKind, appointment: &Appointment, render: &F) -> Result<(), ReminderError>
    where
        F: Fn(&VisitDetails) -> Notification,
    {
        let patient = patient_of(self.directory.as_ref(), appointment).await?;
        let doctor = doctor_of(self.directory.as_ref(), appointment).await?;
        let visit = visit_details(appointment, &patient, &doctor, &self.video_base_url);

        let channel = self.notifier.deliver(&patient.contact, &render(&visit)).await?;

        let flagged = match kind {
            SweepKind::DayAhead => self.store.mark_follow_up_notified(appointment.id).await,
            SweepKind::SameDay => self.store.mark_same_day_notified(appointment.id).await,
        };
        if let Err(e) = flagged {
            // Already delivered; the next run may send it again.
            warn!("Sent {} reminder for {} but could not flag it: {}", kind, appointment.id, e);
        }

        info!("{} reminder for {} sent by {}", kind, appointment.id, channel);
        Ok(())
    }
}
