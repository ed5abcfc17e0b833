//! Session module: the in-process cache and the state-machine coordinator.

mod cache;
mod coordinator;


pub use cache::SessionCache;
pub use coordinator::{PairingTicket, SearchStart, SessionCoordinator};
