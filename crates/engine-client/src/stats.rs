//! Response-stream tallies.

use std::fmt;

use engine_codec::Event;

use crate::session::Incoming;

/// Counters accumulated while a scenario drains the response stream.
///
/// Each tally only ever grows during a run; the driver resets the
/// whole struct at run start.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScenarioStats {
    pub acks: u64,
    pub cancel_acks: u64,
    pub trades: u64,
    pub tob: u64,
    pub rejects: u64,
    pub parse_errors: u64,
}

impl ScenarioStats {
    pub fn record(&mut self, incoming: &Incoming) {
        match incoming {
            Incoming::Event(Event::Ack(_)) => self.acks += 1,
            Incoming::Event(Event::CancelAck(_)) => self.cancel_acks += 1,
            Incoming::Event(Event::Trade(_)) => self.trades += 1,
            Incoming::Event(Event::TopOfBook(_)) => self.tob += 1,
            Incoming::Event(Event::Reject(_)) | Incoming::Event(Event::CancelReject(_)) => {
                self.rejects += 1
            }
            Incoming::Malformed(_) => self.parse_errors += 1,
        }
    }

    pub fn total_events(&self) -> u64 {
        self.acks + self.cancel_acks + self.trades + self.tob + self.rejects
    }
}

impl fmt::Display for ScenarioStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "acks={} cancel_acks={} trades={} tob={} rejects={} parse_errors={}",
            self.acks, self.cancel_acks, self.trades, self.tob, self.rejects, self.parse_errors
        )
    }
}
