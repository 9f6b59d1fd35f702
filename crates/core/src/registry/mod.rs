//! Owned collections of trains and bookings.

/// PNR issuance, lookup and search.
pub mod bookings;
/// Train lifecycle and class-set validation.
pub mod trains;

pub use bookings::{is_well_formed_pnr, normalize_pnr, BookingRegistry};
pub use trains::TrainRegistry;
