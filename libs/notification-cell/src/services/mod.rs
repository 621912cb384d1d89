pub mod gateway;
pub mod notifier;
pub mod recording;
pub mod templates;

pub use gateway::*;
pub use notifier::*;
pub use recording::*;
