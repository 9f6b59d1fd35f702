//! Trains and their per-class seat state.

mod seats;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{BookingError, Result, ValidationError};

pub use seats::{NothingBooked, Occupancy, SeatClassState};

/// Canonical name of the air-conditioned class.
pub const AC_CLASS: &str = "AC";
/// Canonical name of the sleeper class.
pub const SLEEPER_CLASS: &str = "Sleeper";

/// Class name paired with its seat count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSpec {
    /// Class name as shown to passengers.
    pub name: String,
    /// Number of seats in the class.
    pub seats: u32,
}

impl ClassSpec {
    /// Build a spec from a name and seat count.
    pub fn new(name: impl Into<String>, seats: u32) -> Self {
        Self {
            name: name.into(),
            seats,
        }
    }

    /// `AC` = 20, `Sleeper` = 50.
    pub fn defaults() -> Vec<Self> {
        vec![Self::new(AC_CLASS, 20), Self::new(SLEEPER_CLASS, 50)]
    }
}

/// A train with one [`SeatClassState`] per class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Train {
    /// Unique train number.
    pub number: String,
    /// Display name.
    pub name: String,
    classes: BTreeMap<String, SeatClassState>,
}

impl Train {
    /// Create a train with every seat of every class free.
    pub fn new(number: impl Into<String>, name: impl Into<String>, classes: &[ClassSpec]) -> Self {
        Self {
            number: number.into(),
            name: name.into(),
            classes: classes
                .iter()
                .map(|spec| (spec.name.clone(), SeatClassState::new(spec.seats)))
                .collect(),
        }
    }

    /// Seat state for a class.
    pub fn seat_class(&self, class: &str) -> Result<&SeatClassState> {
        self.classes
            .get(class)
            .ok_or_else(|| self.class_not_found(class))
    }

    fn seat_class_mut(&mut self, class: &str) -> Result<&mut SeatClassState> {
        let number = &self.number;
        self.classes
            .get_mut(class)
            .ok_or_else(|| BookingError::ClassNotFound {
                train: number.clone(),
                class: class.to_string(),
            })
    }

    /// Class names configured on this train.
    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }

    /// Take a free seat in the class; `false` means the class is full.
    pub fn book_seat(&mut self, class: &str) -> Result<bool> {
        Ok(self.seat_class_mut(class)?.book())
    }

    /// Release one seat, returning the PNR promoted from the waitlist.
    pub fn cancel_seat(&mut self, class: &str) -> Result<Option<String>> {
        let number = self.number.clone();
        self.seat_class_mut(class)?
            .release()
            .map_err(|NothingBooked| BookingError::SeatAccounting {
                train: number,
                class: class.to_string(),
                detail: "released a seat while none were booked".to_string(),
            })
    }

    /// Queue a PNR and return its 1-based waitlist position.
    pub fn add_to_waitlist(&mut self, pnr: String, class: &str) -> Result<usize> {
        Ok(self.seat_class_mut(class)?.enqueue_waitlist(pnr))
    }

    /// Drop a PNR from the class waitlist.
    pub fn withdraw_from_waitlist(&mut self, pnr: &str, class: &str) -> Result<bool> {
        Ok(self.seat_class_mut(class)?.withdraw(pnr))
    }

    /// Counters for one class.
    pub fn occupancy(&self, class: &str) -> Result<Occupancy> {
        Ok(self.seat_class(class)?.occupancy())
    }

    /// Counters for every class, in class-name order.
    pub fn occupancies(&self) -> impl Iterator<Item = (&str, Occupancy)> {
        self.classes
            .iter()
            .map(|(name, state)| (name.as_str(), state.occupancy()))
    }

    /// Label for the seat most recently taken in `class`.
    ///
    /// The index is the number of seats booked before this one, so the first
    /// confirmed AC booking is `A00`.
    pub fn current_seat_label(&self, class: &str) -> Result<String> {
        let booked = self.seat_class(class)?.booked();
        Ok(seat_label(class, booked.saturating_sub(1)))
    }

    /// Set the seat total for a class, adding the class if it is new.
    ///
    /// Refused while the class has booked seats or waitlisted passengers.
    pub fn configure_class(&mut self, class: &str, total: u32) -> Result<()> {
        if total == 0 {
            return Err(ValidationError::InvalidSeatCount(total).into());
        }
        if let Some(state) = self.classes.get(class) {
            if state.booked() > 0 || state.waitlist_len() > 0 {
                return Err(BookingError::ClassInUse {
                    train: self.number.clone(),
                    class: class.to_string(),
                    booked: state.booked(),
                    waitlisted: state.waitlist_len(),
                });
            }
        }
        self.classes
            .entry(class.to_string())
            .or_insert_with(|| SeatClassState::new(total))
            .reconfigure(total);
        info!(train = %self.number, class, total, "Seat class configured");
        Ok(())
    }

    /// All classes satisfy `available <= total`.
    pub(crate) fn is_consistent(&self) -> bool {
        self.classes.values().all(SeatClassState::is_consistent)
    }

    fn class_not_found(&self, class: &str) -> BookingError {
        BookingError::ClassNotFound {
            train: self.number.clone(),
            class: class.to_string(),
        }
    }
}

/// Seat label: upper-cased first letter of the class plus a two-digit index.
pub fn seat_label(class: &str, index: u32) -> String {
    let prefix = class
        .chars()
        .next()
        .map(|ch| ch.to_ascii_uppercase())
        .unwrap_or('X');
    format!("{prefix}{index:02}")
}
