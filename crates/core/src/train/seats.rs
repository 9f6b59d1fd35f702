//! Per-class seat counters and waitlist.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Returned by [`SeatClassState::release`] when no seat is booked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NothingBooked;

/// Point-in-time counters for one class of one train.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occupancy {
    /// Configured seat count.
    pub total: u32,
    /// Seats still free.
    pub available: u32,
    /// Seats held by confirmed bookings.
    pub booked: u32,
    /// Bookings queued for a seat.
    pub waitlisted: usize,
}

/// Seat counters and FIFO waitlist for a single class of a train.
///
/// Waitlist entries are PNRs; the booking records themselves live in the
/// booking registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatClassState {
    total: u32,
    available: u32,
    #[serde(default)]
    waitlist: VecDeque<String>,
}

impl SeatClassState {
    /// Fresh class with every seat free.
    pub fn new(total: u32) -> Self {
        Self {
            total,
            available: total,
            waitlist: VecDeque::new(),
        }
    }

    /// Take a free seat. Returns `false` when the class is full.
    pub fn book(&mut self) -> bool {
        if self.available == 0 {
            return false;
        }
        self.available -= 1;
        true
    }

    /// Free one seat and hand it to the head of the waitlist, if any.
    ///
    /// When a PNR is promoted the freed seat is immediately re-occupied, so
    /// `available` ends where it started.
    pub fn release(&mut self) -> Result<Option<String>, NothingBooked> {
        if self.available >= self.total {
            return Err(NothingBooked);
        }
        match self.waitlist.pop_front() {
            Some(pnr) => Ok(Some(pnr)),
            None => {
                self.available += 1;
                Ok(None)
            }
        }
    }

    /// Append to the tail of the waitlist and return the 1-based position.
    pub fn enqueue_waitlist(&mut self, pnr: String) -> usize {
        self.waitlist.push_back(pnr);
        self.waitlist.len()
    }

    /// Remove a PNR from anywhere in the waitlist.
    pub fn withdraw(&mut self, pnr: &str) -> bool {
        match self.waitlist.iter().position(|entry| entry == pnr) {
            Some(index) => {
                self.waitlist.remove(index);
                true
            }
            None => false,
        }
    }

    /// PNR that would be promoted by the next release.
    pub fn waitlist_head(&self) -> Option<&str> {
        self.waitlist.front().map(String::as_str)
    }

    /// 1-based position of a PNR in the waitlist.
    pub fn waitlist_position(&self, pnr: &str) -> Option<usize> {
        self.waitlist
            .iter()
            .position(|entry| entry == pnr)
            .map(|index| index + 1)
    }

    /// Waitlisted PNRs in promotion order.
    pub fn waitlist(&self) -> impl Iterator<Item = &str> {
        self.waitlist.iter().map(String::as_str)
    }

    /// Number of queued PNRs.
    pub fn waitlist_len(&self) -> usize {
        self.waitlist.len()
    }

    /// Configured seat count.
    pub fn total(&self) -> u32 {
        self.total
    }

    /// Seats still free.
    pub fn available(&self) -> u32 {
        self.available
    }

    /// Seats held by confirmed bookings.
    pub fn booked(&self) -> u32 {
        self.total.saturating_sub(self.available)
    }

    /// Snapshot of every counter.
    pub fn occupancy(&self) -> Occupancy {
        Occupancy {
            total: self.total,
            available: self.available,
            booked: self.booked(),
            waitlisted: self.waitlist.len(),
        }
    }

    /// Replace the seat total, freeing every seat and clearing the waitlist.
    pub(crate) fn reconfigure(&mut self, total: u32) {
        self.total = total;
        self.available = total;
        self.waitlist.clear();
    }

    /// Counters obey `available <= total`.
    pub(crate) fn is_consistent(&self) -> bool {
        self.available <= self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn books_until_full() {
        let mut class = SeatClassState::new(2);
        assert!(class.book());
        assert!(class.book());
        assert!(!class.book());
        assert_eq!(class.available(), 0);
        assert_eq!(class.booked(), 2);
    }

    #[test]
    fn release_without_waitlist_frees_seat() {
        let mut class = SeatClassState::new(2);
        class.book();
        assert_eq!(class.release(), Ok(None));
        assert_eq!(class.available(), 2);
    }

    #[test]
    fn release_promotes_head_and_keeps_seat_taken() {
        let mut class = SeatClassState::new(1);
        class.book();
        assert_eq!(class.enqueue_waitlist("PNR1000001".to_string()), 1);
        assert_eq!(class.enqueue_waitlist("PNR1000002".to_string()), 2);

        assert_eq!(class.release(), Ok(Some("PNR1000001".to_string())));
        assert_eq!(class.available(), 0);
        assert_eq!(class.waitlist_head(), Some("PNR1000002"));
    }

    #[test]
    fn release_on_idle_class_is_rejected() {
        let mut class = SeatClassState::new(3);
        assert_eq!(class.release(), Err(NothingBooked));
        assert_eq!(class.available(), 3);
    }

    #[test]
    fn withdraw_keeps_order_of_others() {
        let mut class = SeatClassState::new(0);
        for pnr in ["PNR1000001", "PNR1000002", "PNR1000003"] {
            class.enqueue_waitlist(pnr.to_string());
        }
        assert!(class.withdraw("PNR1000002"));
        assert!(!class.withdraw("PNR1000002"));
        assert_eq!(
            class.waitlist().collect::<Vec<_>>(),
            vec!["PNR1000001", "PNR1000003"]
        );
        assert_eq!(class.waitlist_position("PNR1000003"), Some(2));
    }

    #[test]
    fn occupancy_snapshot() {
        let mut class = SeatClassState::new(5);
        class.book();
        class.book();
        assert_eq!(
            class.occupancy(),
            Occupancy {
                total: 5,
                available: 3,
                booked: 2,
                waitlisted: 0,
            }
        );
    }
}
