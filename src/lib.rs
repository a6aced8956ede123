pub mod audit;
pub mod catalog;
pub mod config;
pub mod control_plane;
pub mod coordination;
pub mod coordinator;
pub mod error;
pub mod id;
pub mod job;
pub mod record;
pub mod tls;

pub use control_plane::ControlPlane;
pub use coordinator::{JobCoordinator, MutationOutcome};
pub use error::{CronError, Result};
