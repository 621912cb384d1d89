#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use appointment_cell::{
    Appointment, AppointmentBookingService, AppointmentEvents, BookAppointmentRequest, Caller,
    InMemoryAppointmentStore, InMemoryUserDirectory, SlotPolicy,
};
use notification_cell::{Notifier, RecordingGateway};
use shared_config::AppConfig;
use shared_models::auth::{UserProfile, UserRole};
use shared_models::contact::Contact;
use shared_utils::test_utils::TestConfig;

pub const FAR_DAY: &str = "2030-01-15";

#[derive(Default)]
pub struct RecordingEvents {
    pub booked: Mutex<Vec<Uuid>>,
    pub withdrawn: Mutex<Vec<Uuid>>,
}

impl RecordingEvents {
    pub fn booked(&self) -> Vec<Uuid> {
        self.booked.lock().unwrap().clone()
    }

    pub fn withdrawn(&self) -> Vec<Uuid> {
        self.withdrawn.lock().unwrap().clone()
    }
}

#[async_trait]
impl AppointmentEvents for RecordingEvents {
    async fn appointment_booked(&self, appointment: &Appointment) {
        self.booked.lock().unwrap().push(appointment.id);
    }

    async fn appointment_withdrawn(&self, appointment_id: Uuid) {
        self.withdrawn.lock().unwrap().push(appointment_id);
    }
}

pub struct Fixture {
    pub config: Arc<AppConfig>,
    pub store: Arc<InMemoryAppointmentStore>,
    pub directory: Arc<InMemoryUserDirectory>,
    pub gateway: Arc<RecordingGateway>,
    pub events: Arc<RecordingEvents>,
    pub service: Arc<AppointmentBookingService>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_policy(SlotPolicy::ActiveOnly)
    }

    pub fn with_policy(policy: SlotPolicy) -> Self {
        Self::with_config(TestConfig::default().to_arc(), policy)
    }

    pub fn with_config(config: Arc<AppConfig>, policy: SlotPolicy) -> Self {
        let store = Arc::new(InMemoryAppointmentStore::new());
        let directory = Arc::new(InMemoryUserDirectory::new());
        let gateway = Arc::new(RecordingGateway::new());
        let events = Arc::new(RecordingEvents::default());

        let service = AppointmentBookingService::new(
            &config,
            store.clone(),
            directory.clone(),
            Notifier::new(gateway.clone(), config.sms_country_code.clone()),
            events.clone(),
        )
        .with_slot_policy(policy);

        Self {
            config,
            store,
            directory,
            gateway,
            events,
            service: Arc::new(service),
        }
    }

    pub async fn add_user(&self, name: &str, role: UserRole, contact: &str) -> Caller {
        self.add_user_with_id(Uuid::new_v4(), name, role, contact).await
    }

    pub async fn add_user_with_id(&self, id: Uuid, name: &str, role: UserRole, contact: &str) -> Caller {
        let speciality = (role == UserRole::Doctor).then(|| "General Practice".to_string());
        self.directory
            .insert(UserProfile {
                id,
                name: name.to_string(),
                role,
                contact: Contact::parse(contact).unwrap(),
                speciality,
            })
            .await;
        Caller::new(id, role)
    }

    pub async fn patient(&self, name: &str) -> Caller {
        self.add_user(name, UserRole::Patient, &format!("{}@example.com", name.to_lowercase()))
            .await
    }

    pub async fn doctor(&self, name: &str) -> Caller {
        self.add_user(name, UserRole::Doctor, &format!("{}@clinic.example.com", name.to_lowercase()))
            .await
    }
}

pub fn booking(doctor: &Caller, day: &str, time: &str) -> BookAppointmentRequest {
    BookAppointmentRequest {
        doctor_id: Some(doctor.id.to_string()),
        day: Some(day.to_string()),
        time: Some(time.to_string()),
        description: Some("Persistent cough".to_string()),
        symptoms: Some("Fever".to_string()),
    }
}
