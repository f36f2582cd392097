pub mod offline_queue;
pub mod session;
pub mod store;
pub mod tracked;

#[cfg(test)]
pub(crate) mod memory;

pub use offline_queue::{FileOfflineQueue, OfflineQueue};
pub use session::{Diagnostics, Identity, ReplayReport, SessionError, ShipmentSession};
pub use store::ShipmentStore;
