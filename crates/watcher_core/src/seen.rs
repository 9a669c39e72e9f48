use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::{CanonicalKey, JobId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reservation {
    InFlight(JobId),
    Delivered(JobId),
}

impl Reservation {
    fn job_id(self) -> JobId {
        match self {
            Reservation::InFlight(id) | Reservation::Delivered(id) => id,
        }
    }
}

/// Ledger of resources already handed off for download.
///
/// Every entry remembers which job reserved it, so a late failure report from
/// an older job cannot reopen a key that a newer job now owns.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SeenSet {
    entries: HashMap<CanonicalKey, Reservation>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check-and-insert in one step. `true` means the caller owns the key and
    /// must dispatch `job_id` for it.
    pub fn try_reserve(&mut self, key: &CanonicalKey, job_id: JobId) -> bool {
        match self.entries.entry(key.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Reservation::InFlight(job_id));
                true
            }
        }
    }

    /// Reopens `key` for detection if it is still held by `job_id`.
    pub fn release(&mut self, key: &CanonicalKey, job_id: JobId) -> bool {
        match self.entries.get(key) {
            Some(reservation) if reservation.job_id() == job_id => {
                self.entries.remove(key);
                true
            }
            _ => false,
        }
    }

    /// Records a successful download; the key then stays reserved permanently.
    pub fn mark_delivered(&mut self, key: &CanonicalKey, job_id: JobId) -> bool {
        match self.entries.get_mut(key) {
            Some(reservation) if *reservation == Reservation::InFlight(job_id) => {
                *reservation = Reservation::Delivered(job_id);
                true
            }
            _ => false,
        }
    }

    pub fn contains(&self, key: &CanonicalKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Drops every delivered entry and returns how many went. In-flight
    /// reservations stay, so a running job keeps sole ownership of its key.
    pub fn forget_delivered(&mut self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, reservation| matches!(reservation, Reservation::InFlight(_)));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn in_flight(&self) -> usize {
        self.entries
            .values()
            .filter(|r| matches!(r, Reservation::InFlight(_)))
            .count()
    }

    pub fn delivered(&self) -> usize {
        self.entries
            .values()
            .filter(|r| matches!(r, Reservation::Delivered(_)))
            .count()
    }
}
