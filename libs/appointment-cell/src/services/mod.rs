// libs/appointment-cell/src/services/mod.rs
pub mod booking;
pub mod directory;
pub mod events;
pub mod room;
pub mod slots;
pub mod store;
pub mod supabase_store;
pub mod visit;

pub use booking::{AppointmentBookingService, Caller};
pub use directory::{InMemoryUserDirectory, SupabaseUserDirectory, UserDirectory};
pub use events::{AppointmentEvents, NoopEvents};
pub use slots::{BusinessHours, SlotAllocator};
pub use store::{AppointmentStore, InMemoryAppointmentStore};
pub use supabase_store::SupabaseAppointmentStore;
