use std::collections::HashMap;

use once_cell::sync::Lazy;
use rand::{rngs::StdRng, Rng, SeedableRng};
use regex::Regex;

use crate::{
    error::{BookingError, Result},
    models::{Booking, BookingStatistics, BookingStatus},
};

const PNR_PREFIX: &str = "PNR";

static PNR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^PNR[1-9]\d{6}$").expect("failed to compile PNR regex"));

/// Trim and upper-case a user-typed PNR.
pub fn normalize_pnr(input: &str) -> String {
    input.trim().to_ascii_uppercase()
}

/// Whether `pnr` has the `PNR` + 7 digit shape issued by the registry.
pub fn is_well_formed_pnr(pnr: &str) -> bool {
    PNR_RE.is_match(pnr)
}

/// Bookings keyed by PNR. Listing follows insertion order.
#[derive(Debug, Clone)]
pub struct BookingRegistry {
    records: HashMap<String, Booking>,
    order: Vec<String>,
    rng: StdRng,
}

impl Default for BookingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BookingRegistry {
    /// Empty registry with an entropy-seeded PNR generator.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Empty registry with a deterministic PNR generator.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            records: HashMap::new(),
            order: Vec::new(),
            rng,
        }
    }

    /// Rebuild from persisted bookings. Later duplicates of a PNR replace
    /// earlier ones.
    pub fn from_bookings(bookings: impl IntoIterator<Item = Booking>) -> Self {
        let mut registry = Self::new();
        for booking in bookings {
            registry.update(booking);
        }
        registry
    }

    /// Issue a PNR not used by any stored booking.
    pub fn next_pnr(&mut self) -> String {
        loop {
            let number: u32 = self.rng.gen_range(1_000_000..10_000_000);
            let pnr = format!("{PNR_PREFIX}{number}");
            if !self.records.contains_key(&pnr) {
                return pnr;
            }
        }
    }

    /// Store a new booking. Returns `false` if the PNR already exists.
    pub fn insert(&mut self, booking: Booking) -> bool {
        if self.records.contains_key(&booking.pnr) {
            return false;
        }
        self.order.push(booking.pnr.clone());
        self.records.insert(booking.pnr.clone(), booking);
        true
    }

    /// Insert or replace by PNR.
    pub fn update(&mut self, booking: Booking) {
        if !self.records.contains_key(&booking.pnr) {
            self.order.push(booking.pnr.clone());
        }
        self.records.insert(booking.pnr.clone(), booking);
    }

    /// Look up a booking by PNR.
    pub fn get(&self, pnr: &str) -> Result<&Booking> {
        self.records
            .get(pnr)
            .ok_or_else(|| BookingError::BookingNotFound(pnr.to_string()))
    }

    /// Whether a booking exists for the PNR.
    pub fn contains(&self, pnr: &str) -> bool {
        self.records.contains_key(pnr)
    }

    /// Non-cancelled bookings whose name contains `query`.
    pub fn search_by_name(&self, query: &str, case_insensitive: bool) -> Vec<&Booking> {
        let query = query.trim();
        let needle = if case_insensitive {
            query.to_lowercase()
        } else {
            query.to_string()
        };
        self.all_active()
            .filter(|booking| {
                if case_insensitive {
                    booking.name.to_lowercase().contains(&needle)
                } else {
                    booking.name.contains(&needle)
                }
            })
            .collect()
    }

    /// Every booking that is not cancelled, in insertion order.
    pub fn all_active(&self) -> impl Iterator<Item = &Booking> {
        self.all().filter(|booking| !booking.is_cancelled())
    }

    /// Every booking including cancelled ones, in insertion order.
    pub fn all(&self) -> impl Iterator<Item = &Booking> {
        self.order.iter().filter_map(|pnr| self.records.get(pnr))
    }

    /// Number of stored bookings.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Per-status counts.
    pub fn statistics(&self) -> BookingStatistics {
        self.records.values().fold(
            BookingStatistics {
                total: self.records.len(),
                ..Default::default()
            },
            |mut stats, booking| {
                match booking.status {
                    BookingStatus::Confirmed { .. } => stats.confirmed += 1,
                    BookingStatus::Waitlisted => stats.waitlisted += 1,
                    BookingStatus::Cancelled => stats.cancelled += 1,
                }
                stats
            },
        )
    }
}
