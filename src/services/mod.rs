pub mod network_service;
pub mod scheduler;
pub mod state;

pub use network_service::*;
pub use scheduler::*;
pub use state::*;
