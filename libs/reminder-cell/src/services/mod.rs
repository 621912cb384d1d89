pub mod clock;
pub mod immediate;
pub mod participants;
pub mod scheduler;
pub mod sweeper;

pub use clock::{Clock, SystemClock, VirtualClock};
pub use immediate::ImmediateReminderScheduler;
pub use scheduler::{next_fire, ReminderScheduler};
pub use sweeper::ReminderSweeper;
