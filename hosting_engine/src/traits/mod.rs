pub mod data_objects;
mod lifecycle_database;

pub use data_objects::{PaidOutcome, PaymentFacts, ResolutionError, ResolutionStrategy, StatusChange};
pub use lifecycle_database::{LifecycleDatabase, LifecycleError};
