use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use tokio::task::AbortHandle;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use appointment_cell::services::visit::visit_details;
use appointment_cell::{reminder_due, Appointment, AppointmentEvents, AppointmentStore, UserDirectory};
use notification_cell::services::templates;
use notification_cell::Notifier;
use shared_config::AppConfig;

use crate::models::ReminderError;
use crate::services::clock::{until, Clock};
use crate::services::participants::{doctor_of, patient_of};

struct Timer {
    generation: u64,
    handle: AbortHandle,
}

struct Inner {
    store: Arc<dyn AppointmentStore>,
    directory: Arc<dyn UserDirectory>,
    notifier: Notifier,
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
    video_base_url: String,
    timers: Mutex<HashMap<Uuid, Timer>>,
    next_generation: Mutex<u64>,
}

/// One in-process timer per appointment, firing five minutes before the
/// start. Timers are cancelled when the appointment is withdrawn and
/// re-armed from `reminder_due_at` after a restart.
#[derive(Clone)]
pub struct ImmediateReminderScheduler {
    inner: Arc<Inner>,
}

impl ImmediateReminderScheduler {
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn AppointmentStore>,
        directory: Arc<dyn UserDirectory>,
        notifier: Notifier,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                directory,
                notifier,
                clock,
                offset: config.clinic_offset(),
                video_base_url: config.video_base_url.clone(),
                timers: Mutex::new(HashMap::new()),
                next_generation: Mutex::new(0),
            }),
        }
    }

    fn due_at(&self, appointment: &Appointment) -> Option<DateTime<Utc>> {
        appointment
            .reminder_due_at
            .or_else(|| appointment.starts_at(self.inner.offset).map(reminder_due))
    }

    /// Arms the reminder. Returns false when the reminder time has already
    /// passed (or the appointment is no longer upcoming) and nothing was armed.
    pub fn schedule(&self, appointment: &Appointment) -> bool {
        if !appointment.status.is_upcoming() {
            return false;
        }

        let Some(due) = self.due_at(appointment) else {
            warn!("Appointment {} has no valid start time", appointment.id);
            return false;
        };

        let now = self.inner.clock.now();
        if due <= now {
            debug!("Reminder for {} due at {} already passed, skipping", appointment.id, due);
            return false;
        }

        let generation = match self.inner.next_generation.lock() {
            Ok(mut next) => {
                *next += 1;
                *next
            }
            Err(e) => {
                error!("Reminder timer registry poisoned: {}", e);
                return false;
            }
        };

        let id = appointment.id;
        let wait = until(now, due);
        let inner = Arc::clone(&self.inner);

        // Held across the spawn so the entry exists before the task can
        // finish and try to remove it.
        let mut timers = match self.inner.timers.lock() {
            Ok(timers) => timers,
            Err(e) => {
                error!("Reminder timer registry poisoned: {}", e);
                return false;
            }
        };

        let task = tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            fire(&inner, id).await;
            if let Ok(mut timers) = inner.timers.lock() {
                if timers.get(&id).is_some_and(|t| t.generation == generation) {
                    timers.remove(&id);
                }
            }
        });

        let timer = Timer {
            generation,
            handle: task.abort_handle(),
        };
        if let Some(previous) = timers.insert(id, timer) {
            previous.handle.abort();
        }
        drop(timers);

        info!("Immediate reminder for {} armed for {}", id, due);
        true
    }

    /// Aborts a pending reminder. Returns whether one was pending.
    pub fn cancel(&self, appointment_id: Uuid) -> bool {
        let removed = self
            .inner
            .timers
            .lock()
            .ok()
            .and_then(|mut timers| timers.remove(&appointment_id));

        match removed {
            Some(timer) => {
                timer.handle.abort();
                debug!("Immediate reminder for {} cancelled", appointment_id);
                true
            }
            None => false,
        }
    }

    pub fn pending(&self) -> usize {
        self.inner.timers.lock().map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_pending(&self, appointment_id: Uuid) -> bool {
        self.inner
            .timers
            .lock()
            .map(|t| t.contains_key(&appointment_id))
            .unwrap_or(false)
    }

    /// Re-arms timers for upcoming appointments from `from_day` on. Returns
    /// how many were armed.
    #[instrument(skip(self))]
    pub async fn rearm(&self, from_day: NaiveDate) -> Result<usize, ReminderError> {
        let upcoming = self.inner.store.find_upcoming(from_day).await?;
        let armed = upcoming.iter().filter(|a| self.schedule(a)).count();
        info!("Re-armed {} of {} upcoming reminders", armed, upcoming.len());
        Ok(armed)
    }

    /// Aborts every pending timer.
    pub fn cancel_all(&self) {
        if let Ok(mut timers) = self.inner.timers.lock() {
            for (_, timer) in timers.drain() {
                timer.handle.abort();
            }
        }
    }
}

async fn fire(inner: &Inner, appointment_id: Uuid) {
    let appointment = match inner.store.get(appointment_id).await {
        Ok(Some(a)) if a.status.is_upcoming() => a,
        Ok(Some(a)) => {
            debug!("Appointment {} is {}, reminder dropped", appointment_id, a.status);
            return;
        }
        Ok(None) => {
            debug!("Appointment {} no longer exists, reminder dropped", appointment_id);
            return;
        }
        Err(e) => {
            error!("Failed to load appointment {} for reminder: {}", appointment_id, e);
            return;
        }
    };

    let (patient, doctor) = match (
        patient_of(inner.directory.as_ref(), &appointment).await,
        doctor_of(inner.directory.as_ref(), &appointment).await,
    ) {
        (Ok(p), Ok(d)) => (p, d),
        (Err(e), _) | (_, Err(e)) => {
            error!("Cannot send reminder for {}: {}", appointment_id, e);
            return;
        }
    };

    let visit = visit_details(&appointment, &patient, &doctor, &inner.video_base_url);

    // Each recipient independently; one failure must not stop the other.
    for recipient in [&patient, &doctor] {
        let notice = templates::imminent_reminder(&visit, &recipient.display_name());
        match inner.notifier.deliver(&recipient.contact, &notice).await {
            Ok(channel) => info!("Reminder for {} sent to {} by {}", appointment_id, recipient.id, channel),
            Err(e) => error!("Reminder for {} to {} failed: {}", appointment_id, recipient.id, e),
        }
    }
}

#[async_trait]
impl AppointmentEvents for ImmediateReminderScheduler {
    async fn appointment_booked(&self, appointment: &Appointment) {
        self.schedule(appointment);
    }

    async fn appointment_withdrawn(&self, appointment_id: Uuid) {
        self.cancel(appointment_id);
    }
}
