pub mod bus;
pub mod schema;

// Re-export the essential types
pub use bus::{EventBus, EventHandler, Subscription};
pub use schema::{EventKind, HostEvent};
