use std::fmt::Display;

use chrono::{DateTime, Utc};
use hpg_common::MinorUnits;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::{Invoice, Order, ServiceStatus};

//--------------------------------------  Resolution chain  ----------------------------------------------------------
/// One step in the ordered identifier-resolution chain. Identifiers arrive from heterogeneous
/// sources (structured ids, legacy numeric ids, free-text references), so lookups try each
/// strategy in order and record every attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionStrategy {
    /// Exact match on the primary identifier.
    ExactId,
    /// Match on a secondary `id`/`number` field, coerced to string equality.
    SecondaryId,
    /// Fuzzy match by name pattern or sharing token. Containers only.
    NameOrToken,
}

impl Display for ResolutionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolutionStrategy::ExactId => write!(f, "exact id"),
            ResolutionStrategy::SecondaryId => write!(f, "secondary id/number"),
            ResolutionStrategy::NameOrToken => write!(f, "name or sharing token"),
        }
    }
}

/// Returned when every strategy in a resolution chain has failed. A silent miss would cause a
/// payment to be dropped, so the error names the subject, the identifier and each strategy tried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub struct ResolutionError {
    pub subject: String,
    pub identifier: String,
    pub attempted: Vec<ResolutionStrategy>,
}

impl ResolutionError {
    pub fn new(subject: &str, identifier: &str, attempted: Vec<ResolutionStrategy>) -> Self {
        Self { subject: subject.to_string(), identifier: identifier.to_string(), attempted }
    }
}

impl Display for ResolutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tried = self.attempted.iter().map(|s| s.to_string()).collect::<Vec<_>>().join(", ");
        write!(f, "No {} matches '{}'. Strategies tried: {tried}", self.subject, self.identifier)
    }
}

//--------------------------------------   Payment facts    ----------------------------------------------------------
/// The facts a verified payment event supplies to the invoice sub-transition. The gateway adapter
/// only reports these; interpreting them is the Lifecycle Controller's job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentFacts {
    pub amount: MinorUnits,
    pub method: String,
    pub reference: String,
    pub paid_at: DateTime<Utc>,
}

/// Result of the idempotent `unpaid → paid` invoice sub-transition.
#[derive(Debug, Clone, PartialEq)]
pub enum PaidOutcome {
    /// The invoice was unpaid and has now been marked paid.
    Applied(Invoice),
    /// The invoice was already paid. Amount fields are untouched.
    AlreadyPaid(Invoice),
    /// The gateway session id has been processed before. Nothing was looked up or written.
    DuplicateSession,
}

//--------------------------------------   Status change    ----------------------------------------------------------
/// The before/after pair returned by a successful service-status transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChange {
    pub order: Order,
    pub old_status: ServiceStatus,
    pub new_status: ServiceStatus,
}
