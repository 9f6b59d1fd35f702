#![warn(clippy::all, missing_docs)]

//! Core booking logic for the railway reservation system.
//!
//! This crate hosts the train and booking models, the booking engine with
//! waitlist promotion, configuration handling, and snapshot persistence used
//! by the terminal UI and any future frontends.

pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod registry;
pub mod reservations;
pub mod save;
pub mod train;

pub use config::AppConfig;
pub use engine::{
    Availability, BookingEngine, BookingOutcome, BookingRequest, BookingResult,
    CancellationOutcome, CancellationResult,
};
pub use error::{BookingError, PersistenceError, ValidationError};
pub use models::{Booking, BookingStatistics, BookingStatus, Gender};
pub use registry::{BookingRegistry, TrainRegistry};
pub use reservations::{Reservations, StartupSource};
pub use save::{Persistence, SaveManager};
pub use train::{ClassSpec, Occupancy, SeatClassState, Train};
