//! Error kinds surfaced by the booking core.

use std::{io, path::PathBuf};

use thiserror::Error;

/// Reasons a booking request is rejected before any state is touched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Passenger name was blank.
    #[error("Passenger name cannot be empty.")]
    EmptyName,
    /// Age outside the accepted 1..=120 range.
    #[error("Age must be between 1 and 120 (got {0}).")]
    AgeOutOfRange(u32),
    /// Gender was not one of M/F/Male/Female.
    #[error("Gender must be M/F or Male/Female (got '{0}').")]
    InvalidGender(String),
    /// Train number was blank.
    #[error("Train number cannot be empty.")]
    EmptyTrainNumber,
    /// A seat count of zero was requested for a class.
    #[error("Seat count must be at least 1 (got {0}).")]
    InvalidSeatCount(u32),
}

/// Failures reported by booking, cancellation and lookup operations.
#[derive(Error, Debug)]
pub enum BookingError {
    /// Input failed validation.
    #[error("{0}")]
    Validation(#[from] ValidationError),
    /// No train is registered under the identifier.
    #[error("Train with number '{0}' not found.")]
    TrainNotFound(String),
    /// No booking is stored under the PNR.
    #[error("Passenger with PNR '{0}' not found.")]
    BookingNotFound(String),
    /// Class name is not part of the configured class set.
    #[error("Invalid class type '{class}'. Valid types are: {valid}")]
    InvalidClassType {
        /// Class name as supplied.
        class: String,
        /// Comma separated list of configured classes.
        valid: String,
    },
    /// The train has no seats configured for the class.
    #[error("Train '{train}' has no '{class}' class.")]
    ClassNotFound {
        /// Train identifier.
        train: String,
        /// Class name.
        class: String,
    },
    /// Seat totals cannot change while the class has passengers.
    #[error("Class '{class}' on train '{train}' has {booked} booked seat(s) and {waitlisted} waitlisted passenger(s).")]
    ClassInUse {
        /// Train identifier.
        train: String,
        /// Class name.
        class: String,
        /// Seats currently occupied.
        booked: u32,
        /// Waitlist length.
        waitlisted: usize,
    },
    /// Seat counters disagree with the bookings that reference them.
    #[error("Seat accounting error on train '{train}' class '{class}': {detail}")]
    SeatAccounting {
        /// Train identifier.
        train: String,
        /// Class name.
        class: String,
        /// What was found to be inconsistent.
        detail: String,
    },
    /// Loading or saving state failed.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Failures while reading or writing the on-disk snapshot.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Filesystem access failed.
    #[error("failed to {action} {}: {source}", path.display())]
    Io {
        /// What was being attempted (read, write, ...).
        action: &'static str,
        /// Path involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// Snapshot could not be encoded or decoded.
    #[error("failed to parse snapshot {}: {source}", path.display())]
    Format {
        /// Snapshot path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
    /// Snapshot decoded but describes an impossible state.
    #[error("snapshot is inconsistent: {0}")]
    Corrupt(String),
}

impl PersistenceError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }
}

/// Convenience alias used throughout the core.
pub type Result<T, E = BookingError> = std::result::Result<T, E>;
