use std::collections::BTreeMap;

use crate::types::ReasonCode;

/// Lifecycle of one reason's reconnect entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GatePhase {
    /// Waiting for the debounce delay; may still be cancelled.
    Scheduled,
    /// The attempt is talking to the service and runs to completion.
    Running,
}

/// Proof that a reason was admitted through the gate.
///
/// The generation lets the gate reject debounce expiries that belong to an
/// entry which was cancelled and later rescheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub reason: ReasonCode,
    pub generation: u64,
}

#[derive(Debug, Clone, Copy)]
struct GateEntry {
    generation: u64,
    phase: GatePhase,
}

/// Per-reason single-flight guard.
///
/// At most one entry exists per reason. Requests for a reason that already
/// has a scheduled or running attempt are coalesced into it.
#[derive(Debug, Default, Clone)]
pub struct ReasonGate {
    entries: BTreeMap<ReasonCode, GateEntry>,
    next_generation: u64,
}

impl ReasonGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit `reason` unless an attempt for it is already pending.
    pub fn try_schedule(&mut self, reason: ReasonCode) -> Option<Ticket> {
        if self.entries.contains_key(&reason) {
            return None;
        }

        self.next_generation = self.next_generation.wrapping_add(1);
        let generation = self.next_generation;
        self.entries.insert(
            reason,
            GateEntry {
                generation,
                phase: GatePhase::Scheduled,
            },
        );

        Some(Ticket { reason, generation })
    }

    /// Move a scheduled entry to running. Returns `false` for stale tickets.
    pub fn begin(&mut self, ticket: Ticket) -> bool {
        match self.entries.get_mut(&ticket.reason) {
            Some(entry)
                if entry.generation == ticket.generation
                    && entry.phase == GatePhase::Scheduled =>
            {
                entry.phase = GatePhase::Running;
                true
            }
            _ => false,
        }
    }

    /// Release the entry for `ticket` once its attempt settled.
    ///
    /// Returns `false` if the entry was already replaced or removed.
    pub fn finish(&mut self, ticket: Ticket) -> bool {
        match self.entries.get(&ticket.reason) {
            Some(entry) if entry.generation == ticket.generation => {
                self.entries.remove(&ticket.reason);
                true
            }
            _ => false,
        }
    }

    /// Drop every entry that has not started yet. Running attempts are kept.
    pub fn cancel_scheduled(&mut self) -> Vec<Ticket> {
        let cancelled: Vec<Ticket> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.phase == GatePhase::Scheduled)
            .map(|(reason, entry)| Ticket {
                reason: *reason,
                generation: entry.generation,
            })
            .collect();

        for ticket in &cancelled {
            self.entries.remove(&ticket.reason);
        }

        cancelled
    }

    /// Reasons with an entry, in stable order.
    pub fn pending(&self) -> Vec<ReasonCode> {
        self.entries.keys().copied().collect()
    }

    pub fn is_idle(&self) -> bool {
        self.entries.is_empty()
    }
}
