//! Shared domain models.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Lifecycle state of a booking.
///
/// The seat label lives inside [`BookingStatus::Confirmed`], so a waitlisted or
/// cancelled booking can never carry one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingStatus {
    /// Holds an allocated seat.
    Confirmed {
        /// Seat label such as `A03`.
        seat: String,
    },
    /// Queued for the next freed seat in its class.
    Waitlisted,
    /// Terminal; holds nothing.
    Cancelled,
}

impl BookingStatus {
    /// Upper-case label used in listings.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Confirmed { .. } => "CONFIRMED",
            Self::Waitlisted => "WAITLISTED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Passenger gender as accepted at booking time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    /// Entered as `M` or `Male`.
    Male,
    /// Entered as `F` or `Female`.
    Female,
}

impl FromStr for Gender {
    type Err = ValidationError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "m" | "male" => Ok(Self::Male),
            "f" | "female" => Ok(Self::Female),
            _ => Err(ValidationError::InvalidGender(input.trim().to_string())),
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Male => f.pad("Male"),
            Self::Female => f.pad("Female"),
        }
    }
}

/// One passenger's ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    /// Passenger Name Record, unique across the registry.
    pub pnr: String,
    /// Passenger name as entered.
    pub name: String,
    /// Age in years, 1..=120.
    pub age: u32,
    /// Passenger gender.
    pub gender: Gender,
    /// Identifier of the booked train.
    pub train: String,
    /// Canonical class name (`AC`, `Sleeper`, ...).
    pub class: String,
    /// Current lifecycle state.
    pub status: BookingStatus,
    /// When the booking was first recorded.
    pub booked_at: DateTime<Utc>,
}

impl Booking {
    /// Create a provisional booking in [`BookingStatus::Waitlisted`].
    pub fn new(
        pnr: String,
        name: String,
        age: u32,
        gender: Gender,
        train: String,
        class: String,
    ) -> Self {
        Self {
            pnr,
            name,
            age,
            gender,
            train,
            class,
            status: BookingStatus::Waitlisted,
            booked_at: Utc::now(),
        }
    }

    /// Seat label, present only while confirmed.
    pub fn seat(&self) -> Option<&str> {
        match &self.status {
            BookingStatus::Confirmed { seat } => Some(seat),
            _ => None,
        }
    }

    /// Whether the booking currently holds a seat.
    pub fn is_confirmed(&self) -> bool {
        matches!(self.status, BookingStatus::Confirmed { .. })
    }

    /// Whether the booking is queued for a seat.
    pub fn is_waitlisted(&self) -> bool {
        self.status == BookingStatus::Waitlisted
    }

    /// Whether the booking has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.status == BookingStatus::Cancelled
    }

    /// Move a waitlisted booking onto a seat. Returns `false` (and changes
    /// nothing) unless the booking is currently waitlisted.
    pub fn confirm(&mut self, seat: String) -> bool {
        if !self.is_waitlisted() {
            return false;
        }
        self.status = BookingStatus::Confirmed { seat };
        true
    }

    /// Mark the booking cancelled, dropping any seat label.
    pub fn cancel(&mut self) {
        self.status = BookingStatus::Cancelled;
    }
}

/// Counts of bookings per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingStatistics {
    /// Every booking ever made.
    pub total: usize,
    /// Bookings holding a seat.
    pub confirmed: usize,
    /// Bookings queued for a seat.
    pub waitlisted: usize,
    /// Cancelled bookings.
    pub cancelled: usize,
}

impl fmt::Display for BookingStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Total Bookings: {} | Confirmed: {} | Waitlisted: {} | Cancelled: {}",
            self.total, self.confirmed, self.waitlisted, self.cancelled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Booking {
        Booking::new(
            "PNR1234567".to_string(),
            "Asha".to_string(),
            34,
            Gender::Female,
            "12345".to_string(),
            "AC".to_string(),
        )
    }

    #[test]
    fn gender_accepts_short_and_long_forms() {
        for (raw, expected) in [
            ("m", Gender::Male),
            ("MALE", Gender::Male),
            (" F ", Gender::Female),
            ("female", Gender::Female),
        ] {
            assert_eq!(raw.parse::<Gender>().unwrap(), expected);
        }
        assert_eq!(
            "x".parse::<Gender>(),
            Err(ValidationError::InvalidGender("x".to_string()))
        );
    }

    #[test]
    fn seat_follows_status() {
        let mut booking = sample();
        assert!(booking.is_waitlisted());
        assert_eq!(booking.seat(), None);

        assert!(booking.confirm("A00".to_string()));
        assert_eq!(booking.seat(), Some("A00"));

        booking.cancel();
        assert!(booking.is_cancelled());
        assert_eq!(booking.seat(), None);
    }

    #[test]
    fn cancelled_booking_cannot_be_confirmed() {
        let mut booking = sample();
        booking.cancel();
        assert!(!booking.confirm("A01".to_string()));
        assert!(booking.is_cancelled());
    }
}
