//! Engine session: a transport, a codec and a small state machine.
//!
//! The session tracks which wire dialect the peer speaks. It starts
//! `Unknown`; [`Session::detect`] probes the peer and settles on
//! `Binary` or `Csv` exactly once. [`Session::set_protocol`] is the
//! only other transition and may overwrite a detected value.

use std::time::{Duration, Instant};

use anyhow::Result;
use engine_codec::{binary, csv, decode_event_auto, CodecError, Event, Request, Side};
use engine_transport::Transport;
use tracing::{debug, info};

/// Wire dialect used for outbound requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Unknown,
    Binary,
    Csv,
}

/// A payload that arrived but failed to decode.
///
/// Decode failures never close the session; they are reported inline
/// so the scenario driver can tally them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedPayload {
    pub kind: CodecError,
    pub raw: Vec<u8>,
}

/// One received payload: either a whole decoded event or a malformed
/// report. There are no partial events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    Event(Event),
    Malformed(MalformedPayload),
}

/// How long `detect` waits for a reply to each probe.
const PROBE_WAIT: Duration = Duration::from_millis(500);

/// Post-classification drain window inside `detect`.
const PROBE_SETTLE: Duration = Duration::from_millis(100);

/// Probe identity: deliberately far outside any real user/order space.
const PROBE_USER: u32 = 999_999;
const PROBE_SYMBOL: &str = "PROBE";
const PROBE_ORDER_BINARY: u32 = 999_999;
const PROBE_ORDER_CSV: u32 = 1_000_000;

/// Poll width used by [`Session::drain`].
const DRAIN_POLL: Duration = Duration::from_millis(100);

/// Consecutive empty polls after which `drain` gives up early.
const MAX_EMPTY_POLLS: u32 = 100;

pub struct Session {
    transport: Box<dyn Transport>,
    detected: Protocol,
    next_order_id: u32,
}

impl Session {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            detected: Protocol::Unknown,
            next_order_id: 1,
        }
    }

    pub fn protocol(&self) -> Protocol {
        self.detected
    }

    /// Manual protocol override. Replaces any detected value.
    pub fn set_protocol(&mut self, protocol: Protocol) {
        self.detected = protocol;
    }

    pub fn connected(&self) -> bool {
        self.transport.connected()
    }

    /// Allocate the next send-side order id. Strictly increasing; ids
    /// are never reused within a session.
    pub fn next_order_id(&mut self) -> u32 {
        let id = self.next_order_id;
        self.next_order_id += 1;
        id
    }

    /// Reset the send-side sequence counter (scenario prologue).
    pub fn reset_order_ids(&mut self) {
        self.next_order_id = 1;
    }

    /// Probe the peer to find out which dialect it speaks.
    ///
    /// 1. Send a binary `NewOrder` probe and wait up to 500 ms.
    /// 2. A reply starting with the magic byte settles on `Binary`
    ///    (the probe order is withdrawn with a matching cancel); any
    ///    other reply settles on `Csv`.
    /// 3. With no reply, repeat with a CSV probe; still nothing means
    ///    the engine is quiet on acks and we default to `Binary`.
    pub async fn detect(&mut self) -> Result<Protocol> {
        let probe = Request::new_order(
            PROBE_USER,
            PROBE_SYMBOL,
            1,
            1,
            Side::Buy,
            PROBE_ORDER_BINARY,
        );

        self.transport.send(&binary::encode_request(&probe)?).await?;

        match self.transport.recv(PROBE_WAIT).await? {
            Some(payload) => {
                self.classify_probe_reply(&payload, PROBE_ORDER_BINARY).await;
            }
            None => {
                debug!("no reply to binary probe, trying CSV");
                let csv_probe = Request::new_order(
                    PROBE_USER,
                    PROBE_SYMBOL,
                    1,
                    1,
                    Side::Buy,
                    PROBE_ORDER_CSV,
                );
                self.transport
                    .send(csv::encode_request(&csv_probe).as_bytes())
                    .await?;

                match self.transport.recv(PROBE_WAIT).await? {
                    Some(payload) => {
                        self.classify_probe_reply(&payload, PROBE_ORDER_CSV).await;
                    }
                    None => {
                        debug!("engine silent on both probes, defaulting to binary");
                        self.detected = Protocol::Binary;
                    }
                }
            }
        }

        info!("detected protocol: {:?}", self.detected);
        Ok(self.detected)
    }

    async fn classify_probe_reply(&mut self, payload: &[u8], probe_order_id: u32) {
        if payload.first() == Some(&engine_codec::wire_types::MAGIC) {
            self.detected = Protocol::Binary;
        } else {
            self.detected = Protocol::Csv;
        }

        // Withdraw the probe order in whichever dialect we settled on,
        // then swallow whatever the engine says about it.
        let cancel = Request::cancel(PROBE_USER, PROBE_SYMBOL, probe_order_id);
        let _ = self.send_request(&cancel).await;
        let _ = self.drain(PROBE_SETTLE).await;
    }

    /// Encode `req` in the detected dialect (binary while `Unknown`)
    /// and hand it to the transport.
    pub async fn send_request(&mut self, req: &Request) -> Result<()> {
        match self.detected {
            Protocol::Binary | Protocol::Unknown => {
                self.transport.send(&binary::encode_request(req)?).await?;
            }
            Protocol::Csv => {
                self.transport.send(csv::encode_request(req).as_bytes()).await?;
            }
        }
        Ok(())
    }

    /// Receive one payload with the given deadline.
    ///
    /// `Ok(None)` on deadline. Decode failures come back as
    /// [`Incoming::Malformed`]; the session stays usable.
    pub async fn recv(&mut self, deadline: Duration) -> Result<Option<Incoming>> {
        match self.transport.recv(deadline).await? {
            None => Ok(None),
            Some(payload) => match decode_event_auto(&payload) {
                Ok(event) => Ok(Some(Incoming::Event(event))),
                Err(kind) => Ok(Some(Incoming::Malformed(MalformedPayload {
                    kind,
                    raw: payload,
                }))),
            },
        }
    }

    /// Consume queued events until `budget` elapses or the stream has
    /// been quiet for [`MAX_EMPTY_POLLS`] consecutive polls.
    pub async fn drain(&mut self, budget: Duration) -> Result<Vec<Incoming>> {
        let deadline = Instant::now() + budget;
        let mut out = Vec::new();
        let mut empty_polls = 0u32;

        loop {
            let now = Instant::now();
            if now >= deadline || empty_polls >= MAX_EMPTY_POLLS {
                break;
            }
            let poll = DRAIN_POLL.min(deadline - now);

            match self.recv(poll).await? {
                Some(incoming) => {
                    empty_polls = 0;
                    out.push(incoming);
                }
                None => empty_polls += 1,
            }
        }

        Ok(out)
    }

    pub async fn close(&mut self) {
        self.transport.close().await;
    }
}
