//! Booking and cancellation on top of the train and booking registries.
//!
//! [`BookingEngine`] holds only borrows of the two registries. Every operation
//! validates and resolves everything it needs before the first mutation, so a
//! returned error means nothing changed.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    error::{BookingError, Result, ValidationError},
    models::{Booking, Gender},
    registry::{normalize_pnr, BookingRegistry, TrainRegistry},
};

const MIN_AGE: u32 = 1;
const MAX_AGE: u32 = 120;

/// Raw passenger input for a booking.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    /// Passenger name.
    pub name: String,
    /// Age in years.
    pub age: u32,
    /// `M`, `F`, `Male` or `Female`, any case.
    pub gender: String,
    /// Train number.
    pub train: String,
    /// Class name, matched case-insensitively.
    pub class: String,
}

/// Whether a booking got a seat or a waitlist slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingOutcome {
    /// Seat allocated.
    Confirmed {
        /// Assigned seat label.
        seat: String,
    },
    /// Queued behind `position - 1` other bookings.
    Waitlisted {
        /// 1-based waitlist position right after queueing.
        position: usize,
    },
}

/// Result of [`BookingEngine::book`].
#[derive(Debug, Clone)]
pub struct BookingResult {
    /// The stored booking.
    pub booking: Booking,
    /// Seat or waitlist slot obtained.
    pub outcome: BookingOutcome,
    /// Message for the passenger, including the PNR.
    pub message: String,
}

impl BookingResult {
    /// Whether a seat was allocated.
    pub fn is_confirmed(&self) -> bool {
        matches!(self.outcome, BookingOutcome::Confirmed { .. })
    }
}

/// Whether a cancellation changed anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancellationOutcome {
    /// The booking moved to cancelled.
    Cancelled,
    /// The booking was already cancelled; nothing changed.
    AlreadyCancelled,
}

/// Result of [`BookingEngine::cancel`].
#[derive(Debug, Clone)]
pub struct CancellationResult {
    /// The booking after the operation.
    pub booking: Booking,
    /// Waitlisted booking that took over the freed seat.
    pub promoted: Option<Booking>,
    /// What happened.
    pub outcome: CancellationOutcome,
    /// Message for the passenger.
    pub message: String,
}

/// Seat counters for one class of one train.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    /// Train number.
    pub train: String,
    /// Train display name.
    pub train_name: String,
    /// Canonical class name.
    pub class: String,
    /// Configured seats.
    pub total: u32,
    /// Seats held by confirmed bookings.
    pub booked: u32,
    /// Free seats.
    pub available: u32,
    /// Waitlist length.
    pub waitlisted: usize,
}

/// Orchestrates booking, cancellation and waitlist promotion.
pub struct BookingEngine<'a> {
    trains: &'a mut TrainRegistry,
    bookings: &'a mut BookingRegistry,
}

impl<'a> BookingEngine<'a> {
    /// Borrow both registries for the duration of one or more operations.
    pub fn new(trains: &'a mut TrainRegistry, bookings: &'a mut BookingRegistry) -> Self {
        Self { trains, bookings }
    }

    /// Book a seat, or queue on the class waitlist when the class is full.
    pub fn book(&mut self, request: &BookingRequest) -> Result<BookingResult> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if !(MIN_AGE..=MAX_AGE).contains(&request.age) {
            return Err(ValidationError::AgeOutOfRange(request.age).into());
        }
        let gender: Gender = request.gender.parse()?;
        let number = request.train.trim();
        if number.is_empty() {
            return Err(ValidationError::EmptyTrainNumber.into());
        }
        self.trains.get(number)?;
        let class = self.trains.resolve_class(&request.class)?;
        let train = self.trains.get_mut(number)?;
        train.seat_class(&class)?;

        let pnr = self.bookings.next_pnr();
        let mut booking = Booking::new(
            pnr.clone(),
            name.to_string(),
            request.age,
            gender,
            train.number.clone(),
            class.clone(),
        );

        let (outcome, message) = if train.book_seat(&class)? {
            let seat = train.current_seat_label(&class)?;
            booking.confirm(seat.clone());
            info!(pnr = %pnr, train = %train.number, class = %class, seat = %seat, "Booking confirmed");
            (
                BookingOutcome::Confirmed { seat },
                format!("Booking confirmed! Your PNR: {pnr}"),
            )
        } else {
            let position = train.add_to_waitlist(pnr.clone(), &class)?;
            info!(pnr = %pnr, train = %train.number, class = %class, position, "Booking waitlisted");
            (
                BookingOutcome::Waitlisted { position },
                format!("Added to waitlist. Your PNR: {pnr}. Waitlist position: {position}"),
            )
        };

        let inserted = self.bookings.insert(booking.clone());
        debug_assert!(inserted, "next_pnr issued a PNR that is already stored");

        Ok(BookingResult {
            booking,
            outcome,
            message,
        })
    }

    /// Cancel a booking, promoting the head of the waitlist into a freed seat.
    pub fn cancel(&mut self, pnr: &str) -> Result<CancellationResult> {
        let pnr = normalize_pnr(pnr);
        let booking = self.bookings.get(&pnr)?.clone();
        if booking.is_cancelled() {
            return Ok(CancellationResult {
                booking,
                promoted: None,
                outcome: CancellationOutcome::AlreadyCancelled,
                message: "Ticket is already cancelled.".to_string(),
            });
        }

        let train = self.trains.get_mut(&booking.train)?;
        let class = booking.class.as_str();
        let mut promoted = None;
        let mut message = "Ticket cancelled successfully.".to_string();

        if booking.is_confirmed() {
            if let Some(head) = train.seat_class(class)?.waitlist_head() {
                let queued = self.bookings.get(head).map(Booking::is_waitlisted);
                if !matches!(queued, Ok(true)) {
                    return Err(BookingError::SeatAccounting {
                        train: train.number.clone(),
                        class: class.to_string(),
                        detail: format!("waitlist head {head} is not a waitlisted booking"),
                    });
                }
            }

            if let Some(next) = train.cancel_seat(class)? {
                let mut next_booking = self.bookings.get(&next)?.clone();
                let seat = train.current_seat_label(class)?;
                next_booking.confirm(seat.clone());
                info!(pnr = %next, train = %train.number, class, seat = %seat, "Promoted from waitlist");
                message.push_str(&format!(
                    " Passenger {} (PNR: {}) has been promoted from waitlist.",
                    next_booking.name, next_booking.pnr
                ));
                self.bookings.update(next_booking.clone());
                promoted = Some(next_booking);
            }
        } else if !train.withdraw_from_waitlist(&pnr, class)? {
            warn!(pnr = %pnr, train = %train.number, class, "Waitlisted booking missing from queue");
        }

        let mut cancelled = booking;
        cancelled.cancel();
        self.bookings.update(cancelled.clone());
        info!(pnr = %pnr, "Booking cancelled");

        Ok(CancellationResult {
            booking: cancelled,
            promoted,
            outcome: CancellationOutcome::Cancelled,
            message,
        })
    }

    /// Seat counters for a train and class.
    pub fn check_availability(&self, train: &str, class: &str) -> Result<Availability> {
        let class = self.trains.resolve_class(class)?;
        let train = self.trains.get(train)?;
        let occupancy = train.occupancy(&class)?;
        Ok(Availability {
            train: train.number.clone(),
            train_name: train.name.clone(),
            class,
            total: occupancy.total,
            booked: occupancy.booked,
            available: occupancy.available,
            waitlisted: occupancy.waitlisted,
        })
    }

    /// Booking for a user-typed PNR.
    pub fn lookup(&self, pnr: &str) -> Result<&Booking> {
        self.bookings.get(&normalize_pnr(pnr))
    }

    /// Current 1-based waitlist position of a waitlisted booking.
    pub fn waitlist_position(&self, pnr: &str) -> Result<Option<usize>> {
        let booking = self.lookup(pnr)?;
        if !booking.is_waitlisted() {
            return Ok(None);
        }
        Ok(self
            .trains
            .get(&booking.train)?
            .seat_class(&booking.class)?
            .waitlist_position(&booking.pnr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::BookingStatus,
        train::{ClassSpec, AC_CLASS, SLEEPER_CLASS},
    };

    fn registries(ac: u32, sleeper: u32) -> (TrainRegistry, BookingRegistry) {
        let mut trains = TrainRegistry::new(ClassSpec::defaults());
        trains.add(
            "T1",
            "Test Express",
            &[ClassSpec::new(AC_CLASS, ac), ClassSpec::new(SLEEPER_CLASS, sleeper)],
        );
        (trains, BookingRegistry::with_seed(11))
    }

    fn request(name: &str, class: &str) -> BookingRequest {
        BookingRequest {
            name: name.to_string(),
            age: 30,
            gender: "F".to_string(),
            train: "T1".to_string(),
            class: class.to_string(),
        }
    }

    fn assert_invariants(trains: &TrainRegistry, bookings: &BookingRegistry) {
        for train in trains.all() {
            for (class, occupancy) in train.occupancies() {
                assert!(occupancy.available <= occupancy.total);
                assert_eq!(occupancy.booked + occupancy.available, occupancy.total);
                let confirmed = bookings
                    .all()
                    .filter(|b| b.train == train.number && b.class == class && b.is_confirmed())
                    .count();
                assert_eq!(confirmed as u32, occupancy.booked, "{} {class}", train.number);
            }
        }
        for booking in bookings.all() {
            assert_eq!(booking.is_confirmed(), booking.seat().is_some());
        }
    }

    #[test]
    fn scenario_single_seat_promotion() -> anyhow::Result<()> {
        let (mut trains, mut bookings) = registries(1, 5);
        let mut engine = BookingEngine::new(&mut trains, &mut bookings);

        let x = engine.book(&request("Xavier", "AC"))?;
        assert_eq!(
            x.outcome,
            BookingOutcome::Confirmed {
                seat: "A00".to_string()
            }
        );
        assert!(x.message.contains(&x.booking.pnr));
        assert_eq!(engine.check_availability("T1", "AC")?.available, 0);

        let y = engine.book(&request("Yasmin", "AC"))?;
        assert_eq!(y.outcome, BookingOutcome::Waitlisted { position: 1 });
        assert!(y.message.contains("Waitlist position: 1"));
        assert_eq!(y.booking.seat(), None);

        let cancelled = engine.cancel(&x.booking.pnr)?;
        assert_eq!(cancelled.outcome, CancellationOutcome::Cancelled);
        assert!(cancelled.booking.is_cancelled());
        let promoted = cancelled.promoted.expect("Yasmin should be promoted");
        assert_eq!(promoted.pnr, y.booking.pnr);
        assert_eq!(promoted.seat(), Some("A00"));
        assert!(cancelled.message.contains(&y.booking.pnr));

        let availability = engine.check_availability("T1", "AC")?;
        assert_eq!(availability.available, 0);
        assert_eq!(availability.waitlisted, 0);
        assert_eq!(engine.lookup(&y.booking.pnr)?.seat(), Some("A00"));

        assert_invariants(&trains, &bookings);
        Ok(())
    }

    #[test]
    fn invalid_age_is_rejected_without_side_effects() {
        let (mut trains, mut bookings) = registries(1, 1);
        let before_trains = trains.get("T1").unwrap().clone();
        let mut engine = BookingEngine::new(&mut trains, &mut bookings);

        for age in [0, 121] {
            let mut req = request("Old", "AC");
            req.age = age;
            assert!(matches!(
                engine.book(&req),
                Err(BookingError::Validation(ValidationError::AgeOutOfRange(a))) if a == age
            ));
        }

        assert!(bookings.is_empty());
        assert_eq!(trains.get("T1").unwrap(), &before_trains);
    }

    #[test]
    fn rejects_bad_name_gender_train_and_class() {
        let (mut trains, mut bookings) = registries(1, 1);
        let mut engine = BookingEngine::new(&mut trains, &mut bookings);

        let blank = request("   ", "AC");
        assert!(matches!(
            engine.book(&blank),
            Err(BookingError::Validation(ValidationError::EmptyName))
        ));

        let mut gender = request("Ann", "AC");
        gender.gender = "X".to_string();
        assert!(matches!(
            engine.book(&gender),
            Err(BookingError::Validation(ValidationError::InvalidGender(_)))
        ));

        let mut train = request("Ann", "AC");
        train.train = "nope".to_string();
        assert!(matches!(
            engine.book(&train),
            Err(BookingError::TrainNotFound(_))
        ));

        assert!(matches!(
            engine.book(&request("Ann", "First")),
            Err(BookingError::InvalidClassType { .. })
        ));

        assert!(bookings.is_empty());
    }

    #[test]
    fn availability_on_unknown_train() {
        let (mut trains, mut bookings) = registries(1, 1);
        let engine = BookingEngine::new(&mut trains, &mut bookings);
        assert!(matches!(
            engine.check_availability("00000", "AC"),
            Err(BookingError::TrainNotFound(_))
        ));
        assert!(matches!(
            engine.check_availability("T1", "Chair"),
            Err(BookingError::InvalidClassType { .. })
        ));
    }

    #[test]
    fn cancel_unknown_pnr() {
        let (mut trains, mut bookings) = registries(1, 1);
        let mut engine = BookingEngine::new(&mut trains, &mut bookings);
        assert!(matches!(
            engine.cancel("PNR9999999"),
            Err(BookingError::BookingNotFound(pnr)) if pnr == "PNR9999999"
        ));
    }

    #[test]
    fn waitlist_positions_grow_after_capacity() -> anyhow::Result<()> {
        let (mut trains, mut bookings) = registries(5, 2);
        let mut engine = BookingEngine::new(&mut trains, &mut bookings);

        let first = engine.book(&request("One", "Sleeper"))?;
        let second = engine.book(&request("Two", "sleeper"))?;
        assert_eq!(first.booking.seat(), Some("S00"));
        assert_eq!(second.booking.seat(), Some("S01"));

        let third = engine.book(&request("Three", "Sleeper"))?;
        let fourth = engine.book(&request("Four", "Sleeper"))?;
        assert_eq!(third.outcome, BookingOutcome::Waitlisted { position: 1 });
        assert_eq!(fourth.outcome, BookingOutcome::Waitlisted { position: 2 });
        assert_eq!(engine.waitlist_position(&fourth.booking.pnr)?, Some(2));

        assert_invariants(&trains, &bookings);
        Ok(())
    }

    #[test]
    fn second_cancel_is_a_no_op() -> anyhow::Result<()> {
        let (mut trains, mut bookings) = registries(1, 1);
        let mut engine = BookingEngine::new(&mut trains, &mut bookings);

        let booked = engine.book(&request("Once", "AC"))?;
        engine.cancel(&booked.booking.pnr)?;
        let availability = engine.check_availability("T1", "AC")?;

        for _ in 0..2 {
            let again = engine.cancel(&booked.booking.pnr.to_lowercase())?;
            assert_eq!(again.outcome, CancellationOutcome::AlreadyCancelled);
            assert_eq!(again.message, "Ticket is already cancelled.");
            assert!(again.promoted.is_none());
        }
        assert_eq!(engine.check_availability("T1", "AC")?, availability);
        assert_eq!(bookings.statistics().cancelled, 1);
        Ok(())
    }

    #[test]
    fn promotions_follow_fifo_order() -> anyhow::Result<()> {
        let (mut trains, mut bookings) = registries(2, 1);
        let mut engine = BookingEngine::new(&mut trains, &mut bookings);

        let seated: Vec<_> = ["A", "B"]
            .iter()
            .map(|name| engine.book(&request(name, "AC")))
            .collect::<Result<_>>()?;
        let queued: Vec<_> = ["C", "D", "E"]
            .iter()
            .map(|name| engine.book(&request(name, "AC")))
            .collect::<Result<_>>()?;

        let mut promoted = Vec::new();
        for result in seated.iter().chain(queued.iter().take(1)) {
            let cancelled = engine.cancel(&result.booking.pnr)?;
            promoted.extend(cancelled.promoted.map(|booking| booking.name));
        }
        assert_eq!(promoted, vec!["C", "D", "E"]);
        assert_eq!(engine.check_availability("T1", "AC")?.available, 0);

        assert_invariants(&trains, &bookings);
        Ok(())
    }

    #[test]
    fn cancelling_waitlisted_booking_frees_nothing_and_leaves_queue() -> anyhow::Result<()> {
        let (mut trains, mut bookings) = registries(1, 1);
        let mut engine = BookingEngine::new(&mut trains, &mut bookings);

        let seated = engine.book(&request("Seated", "AC"))?;
        let first = engine.book(&request("First", "AC"))?;
        let second = engine.book(&request("Second", "AC"))?;

        let cancelled = engine.cancel(&first.booking.pnr)?;
        assert!(cancelled.promoted.is_none());
        assert_eq!(cancelled.booking.status, BookingStatus::Cancelled);
        assert_eq!(engine.waitlist_position(&second.booking.pnr)?, Some(1));

        let availability = engine.check_availability("T1", "AC")?;
        assert_eq!((availability.available, availability.waitlisted), (0, 1));

        let released = engine.cancel(&seated.booking.pnr)?;
        let promoted = released.promoted.expect("second should be promoted");
        assert_eq!(promoted.pnr, second.booking.pnr);
        assert!(engine.lookup(&first.booking.pnr)?.is_cancelled());

        assert_invariants(&trains, &bookings);
        Ok(())
    }

    #[test]
    fn cancel_without_waitlist_frees_the_seat() -> anyhow::Result<()> {
        let (mut trains, mut bookings) = registries(3, 1);
        let mut engine = BookingEngine::new(&mut trains, &mut bookings);

        let booked = engine.book(&request("Solo", "AC"))?;
        assert_eq!(engine.check_availability("T1", "AC")?.available, 2);
        let cancelled = engine.cancel(&booked.booking.pnr)?;
        assert!(cancelled.promoted.is_none());
        assert_eq!(cancelled.message, "Ticket cancelled successfully.");
        assert_eq!(engine.check_availability("T1", "AC")?.available, 3);
        Ok(())
    }

    #[test]
    fn class_missing_on_train_is_rejected_without_side_effects() {
        let mut classes = ClassSpec::defaults();
        classes.push(ClassSpec::new("Chair", 10));
        let mut trains = TrainRegistry::new(classes);
        trains.add(
            "T1",
            "Test Express",
            &[ClassSpec::new(AC_CLASS, 1), ClassSpec::new(SLEEPER_CLASS, 1)],
        );
        let mut bookings = BookingRegistry::with_seed(11);
        let before_train = trains.get("T1").unwrap().clone();
        let mut untouched = bookings.clone();

        let mut engine = BookingEngine::new(&mut trains, &mut bookings);
        assert!(matches!(
            engine.book(&request("Ann", "chair")),
            Err(BookingError::ClassNotFound { train, class }) if train == "T1" && class == "Chair"
        ));

        assert!(bookings.is_empty());
        assert_eq!(bookings.next_pnr(), untouched.next_pnr());
        assert_eq!(trains.get("T1").unwrap(), &before_train);
    }
}
