//! Owned system state: both registries plus load/save wiring.

use std::collections::HashMap;

use tracing::{error, info, warn};

use crate::{
    engine::BookingEngine,
    error::PersistenceError,
    models::{BookingStatistics, BookingStatus},
    registry::{BookingRegistry, TrainRegistry},
    save::Persistence,
    train::ClassSpec,
};

/// Where the in-memory state came from at startup.
#[derive(Debug)]
pub enum StartupSource {
    /// Restored from a saved snapshot.
    Restored,
    /// No snapshot existed; seeded defaults.
    Fresh,
    /// The snapshot could not be loaded; seeded defaults.
    Recovered(PersistenceError),
}

/// The train and booking registries of a running system.
#[derive(Debug, Clone)]
pub struct Reservations {
    trains: TrainRegistry,
    bookings: BookingRegistry,
}

impl Reservations {
    /// Wrap existing registries.
    pub fn new(trains: TrainRegistry, bookings: BookingRegistry) -> Self {
        Self { trains, bookings }
    }

    /// Stock trains and no bookings.
    pub fn seeded(classes: Vec<ClassSpec>) -> Self {
        Self::new(TrainRegistry::seeded(classes), BookingRegistry::new())
    }

    /// Load the saved snapshot, falling back to seeded defaults.
    ///
    /// A restored registry adopts the configured `classes`.
    pub fn load_or_seed(store: &impl Persistence, classes: Vec<ClassSpec>) -> (Self, StartupSource) {
        match store.load_all() {
            Ok(Some((mut trains, bookings))) => {
                if let Err(err) = trains.merge_classes(&classes) {
                    warn!(%err, "Configured classes not applied; keeping saved class set");
                }
                info!(
                    trains = trains.len(),
                    bookings = bookings.len(),
                    "Restored saved reservations"
                );
                (Self::new(trains, bookings), StartupSource::Restored)
            }
            Ok(None) => {
                info!("No saved reservations; starting with default trains");
                (Self::seeded(classes), StartupSource::Fresh)
            }
            Err(err) => {
                error!(%err, "Failed to load saved reservations; starting with default trains");
                (Self::seeded(classes), StartupSource::Recovered(err))
            }
        }
    }

    /// Replace the current state with the saved snapshot. On failure or when
    /// nothing is saved the current state is kept and `false`/the error is
    /// returned.
    pub fn reload(&mut self, store: &impl Persistence) -> Result<bool, PersistenceError> {
        match store.load_all()? {
            Some((trains, bookings)) => {
                self.trains = trains;
                self.bookings = bookings;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Write both registries through the persistence collaborator.
    pub fn save(&self, store: &impl Persistence) -> Result<(), PersistenceError> {
        store.save_all(&self.trains, &self.bookings)
    }

    /// Engine borrowing both registries.
    pub fn engine(&mut self) -> BookingEngine<'_> {
        BookingEngine::new(&mut self.trains, &mut self.bookings)
    }

    /// Read access to trains.
    pub fn trains(&self) -> &TrainRegistry {
        &self.trains
    }

    /// Mutable access to trains, for adding trains and configuring seats.
    pub fn trains_mut(&mut self) -> &mut TrainRegistry {
        &mut self.trains
    }

    /// Read access to bookings.
    pub fn bookings(&self) -> &BookingRegistry {
        &self.bookings
    }

    /// Per-status booking counts.
    pub fn statistics(&self) -> BookingStatistics {
        self.bookings.statistics()
    }

    /// Check that trains and bookings describe the same occupancy.
    pub fn audit(&self) -> Result<(), String> {
        audit(&self.trains, &self.bookings)
    }
}

/// Cross-check seat counters and waitlists against booking records.
pub fn audit(trains: &TrainRegistry, bookings: &BookingRegistry) -> Result<(), String> {
    let mut confirmed: HashMap<(&str, &str), u32> = HashMap::new();
    for booking in bookings.all() {
        let train = trains
            .get(&booking.train)
            .map_err(|_| format!("booking {} references unknown train {}", booking.pnr, booking.train))?;
        train.seat_class(&booking.class).map_err(|_| {
            format!(
                "booking {} references unknown class {} on train {}",
                booking.pnr, booking.class, booking.train
            )
        })?;
        if let BookingStatus::Confirmed { .. } = booking.status {
            *confirmed
                .entry((booking.train.as_str(), booking.class.as_str()))
                .or_default() += 1;
        }
    }

    for train in trains.all() {
        if !train.is_consistent() {
            return Err(format!("train {} has more free seats than seats", train.number));
        }
        for (class, occupancy) in train.occupancies() {
            let held = confirmed
                .get(&(train.number.as_str(), class))
                .copied()
                .unwrap_or(0);
            if held != occupancy.booked {
                return Err(format!(
                    "train {} class {class}: {} seat(s) booked but {held} confirmed booking(s)",
                    train.number, occupancy.booked
                ));
            }
            for pnr in train.seat_class(class).map_err(|err| err.to_string())?.waitlist() {
                let queued = bookings
                    .get(pnr)
                    .map_err(|_| format!("waitlist of train {} references unknown {pnr}", train.number))?;
                if !queued.is_waitlisted() || queued.train != train.number || queued.class != class {
                    return Err(format!(
                        "waitlist of train {} class {class} holds {pnr} which is not waitlisted there",
                        train.number
                    ));
                }
            }
        }
    }
    Ok(())
}
