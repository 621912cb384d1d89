#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use uuid::Uuid;

use appointment_cell::{
    Appointment, AppointmentBookingService, AppointmentStatus, AppointmentStore,
    BookAppointmentRequest, Caller, InMemoryAppointmentStore, InMemoryUserDirectory, SlotPolicy,
};
use notification_cell::{NotificationGateway, Notifier, RecordingGateway};
use reminder_cell::{Clock, ImmediateReminderScheduler, ReminderScheduler, ReminderSweeper, VirtualClock};
use shared_config::AppConfig;
use shared_models::auth::{UserProfile, UserRole};
use shared_models::contact::Contact;
use shared_utils::test_utils::TestConfig;

pub fn ist() -> FixedOffset {
    FixedOffset::east_opt(330 * 60).unwrap()
}

/// 2030-01-15 at the given clinic wall-clock time.
pub fn clinic_time(h: u32, m: u32) -> DateTime<Utc> {
    ist().with_ymd_and_hms(2030, 1, 15, h, m, 0).unwrap().with_timezone(&Utc)
}

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 1, 15).unwrap()
}

pub fn tomorrow() -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 1, 16).unwrap()
}

/// Lets spawned timer tasks run after a `tokio::time::advance`.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

pub struct Fixture {
    pub config: Arc<AppConfig>,
    pub clock: Arc<VirtualClock>,
    pub store: Arc<InMemoryAppointmentStore>,
    pub directory: Arc<InMemoryUserDirectory>,
    pub gateway: Arc<RecordingGateway>,
    pub immediate: ImmediateReminderScheduler,
    pub sweeper: Arc<ReminderSweeper>,
    pub booking: AppointmentBookingService,
}

impl Fixture {
    /// Must be called inside a tokio runtime; tests that advance time pause it.
    pub fn starting_at(origin: DateTime<Utc>) -> Self {
        let gateway = Arc::new(RecordingGateway::new());
        Self::with_gateway(origin, gateway.clone(), gateway)
    }

    /// `reminders` receives the reminder traffic; `gateway` the booking
    /// confirmations.
    pub fn with_gateway(
        origin: DateTime<Utc>,
        gateway: Arc<RecordingGateway>,
        reminders: Arc<dyn NotificationGateway>,
    ) -> Self {
        let config = TestConfig::default().to_arc();
        let clock = Arc::new(VirtualClock::starting_at(origin));
        let store = Arc::new(InMemoryAppointmentStore::new());
        let directory = Arc::new(InMemoryUserDirectory::new());
        let reminder_notifier = Notifier::new(reminders, config.sms_country_code.clone());

        let immediate = ImmediateReminderScheduler::new(
            &config,
            store.clone(),
            directory.clone(),
            reminder_notifier.clone(),
            clock.clone(),
        );
        let sweeper = Arc::new(ReminderSweeper::new(
            &config,
            store.clone(),
            directory.clone(),
            reminder_notifier,
            clock.clone(),
        ));
        let booking = AppointmentBookingService::new(
            &config,
            store.clone(),
            directory.clone(),
            Notifier::new(gateway.clone(), config.sms_country_code.clone()),
            Arc::new(immediate.clone()),
        )
        .with_slot_policy(SlotPolicy::ActiveOnly);

        Self {
            config,
            clock,
            store,
            directory,
            gateway,
            immediate,
            sweeper,
            booking,
        }
    }

    pub fn scheduler(&self) -> ReminderScheduler {
        ReminderScheduler::new(&self.config, self.sweeper.clone(), self.immediate.clone())
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub async fn user(&self, name: &str, role: UserRole, contact: &str) -> Caller {
        let id = Uuid::new_v4();
        self.directory
            .insert(UserProfile {
                id,
                name: name.to_string(),
                role,
                contact: Contact::parse(contact).unwrap(),
                speciality: None,
            })
            .await;
        Caller::new(id, role)
    }

    pub async fn patient(&self, name: &str) -> Caller {
        self.user(name, UserRole::Patient, &format!("{}@example.com", name.to_lowercase()))
            .await
    }

    pub async fn doctor(&self, name: &str) -> Caller {
        self.user(name, UserRole::Doctor, &format!("{}@clinic.example.com", name.to_lowercase()))
            .await
    }

    /// Books through the service (arming the immediate reminder) and clears
    /// the confirmation traffic.
    pub async fn book(&self, patient: Caller, doctor: Caller, day: NaiveDate, time: &str) -> Appointment {
        let appointment = self
            .booking
            .book(
                patient,
                BookAppointmentRequest {
                    doctor_id: Some(doctor.id.to_string()),
                    day: Some(day.to_string()),
                    time: Some(time.to_string()),
                    description: Some("Checkup".to_string()),
                    symptoms: None,
                },
            )
            .await
            .unwrap();
        self.gateway.clear();
        appointment
    }

    /// Writes a row straight into the store, bypassing timers.
    pub async fn insert(
        &self,
        patient: Caller,
        doctor: Caller,
        day: NaiveDate,
        time: &str,
        status: AppointmentStatus,
    ) -> Appointment {
        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: patient.id,
            doctor_id: doctor.id,
            day,
            time: NaiveTime::parse_from_str(time, "%H:%M").unwrap(),
            description: "Checkup".to_string(),
            symptoms: None,
            room_id: "abcdefghijkl".to_string(),
            status,
            follow_up_notification_sent: false,
            same_day_reminder_sent: false,
            follow_up_instructions: None,
            follow_up_of: None,
            reminder_due_at: None,
            created_at: now,
            updated_at: now,
        };
        self.store
            .insert_if_free(appointment, SlotPolicy::AnyStatus)
            .await
            .unwrap()
    }

    pub async fn reload(&self, id: Uuid) -> Appointment {
        self.store.get(id).await.unwrap().unwrap()
    }
}
