//! Logical message types exchanged with the matching engine.
//!
//! These are **transport-agnostic** messages:
//! - [`Request`]: what a client sends to the engine.
//! - [`Event`]: what the engine emits back.
//!
//! Every event carries its symbol directly so downstream consumers
//! (scenario stats, the relay fan-out) can route and log without extra
//! context. Binary / CSV encoders live in the sibling [`crate::binary`]
//! and [`crate::csv`] modules; this module is purely logical.

use std::fmt;
use std::str::FromStr;

/// Buy or sell side of an order or a top-of-book level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Single-character wire form (`'B'` / `'S'`), shared by the binary
    /// and CSV dialects.
    pub fn wire_char(self) -> char {
        match self {
            Side::Buy => 'B',
            Side::Sell => 'S',
        }
    }

    pub fn from_wire_byte(b: u8) -> Option<Self> {
        match b {
            b'B' => Some(Side::Buy),
            b'S' => Some(Side::Sell),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// A request into the matching engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Place a new limit order.
    NewOrder(NewOrder),

    /// Cancel an existing order by `(user_id, symbol, user_order_id)`.
    Cancel(Cancel),

    /// Flush all books and engine state.
    Flush,
}

/// An event emitted by the matching engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Acknowledgement of a new order.
    Ack(Ack),

    /// Acknowledgement of a cancel request.
    CancelAck(CancelAck),

    /// New order rejected.
    Reject(Reject),

    /// Cancel request rejected.
    CancelReject(CancelReject),

    /// Trade between a buyer and a seller.
    Trade(Trade),

    /// Top-of-book change or snapshot.
    TopOfBook(TopOfBook),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Ack(_) => EventKind::Ack,
            Event::CancelAck(_) => EventKind::CancelAck,
            Event::Reject(_) => EventKind::Reject,
            Event::CancelReject(_) => EventKind::CancelReject,
            Event::Trade(_) => EventKind::Trade,
            Event::TopOfBook(_) => EventKind::TopOfBook,
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            Event::Ack(a) => &a.symbol,
            Event::CancelAck(c) => &c.symbol,
            Event::Reject(r) => &r.symbol,
            Event::CancelReject(r) => &r.symbol,
            Event::Trade(t) => &t.symbol,
            Event::TopOfBook(t) => &t.symbol,
        }
    }
}

/// Discriminant-only view of [`Event`], used by the relay filter set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Ack,
    CancelAck,
    Reject,
    CancelReject,
    Trade,
    TopOfBook,
}

impl EventKind {
    pub const ALL: [EventKind; 6] = [
        EventKind::Ack,
        EventKind::CancelAck,
        EventKind::Reject,
        EventKind::CancelReject,
        EventKind::Trade,
        EventKind::TopOfBook,
    ];

    /// Kebab-case name, as used in the relay's outbound JSON and its
    /// `--filter` option.
    pub fn name(self) -> &'static str {
        match self {
            EventKind::Ack => "ack",
            EventKind::CancelAck => "cancel-ack",
            EventKind::Reject => "reject",
            EventKind::CancelReject => "cancel-reject",
            EventKind::Trade => "trade",
            EventKind::TopOfBook => "top-of-book",
        }
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "ack" => Ok(EventKind::Ack),
            "cancel-ack" => Ok(EventKind::CancelAck),
            "reject" => Ok(EventKind::Reject),
            "cancel-reject" => Ok(EventKind::CancelReject),
            "trade" => Ok(EventKind::Trade),
            "top-of-book" => Ok(EventKind::TopOfBook),
            other => Err(format!("unknown event kind: {other:?}")),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// New order request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    /// User identifier (logical session / account).
    pub user_id: u32,

    /// Instrument symbol, up to 8 ASCII characters (e.g. `"IBM"`).
    pub symbol: String,

    /// Limit price in the smallest quotable unit (cents).
    pub price: u32,

    /// Order quantity.
    pub quantity: u32,

    pub side: Side,

    /// User-local order identifier (for canceling later).
    pub user_order_id: u32,
}

/// Cancel request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cancel {
    pub user_id: u32,
    pub symbol: String,
    pub user_order_id: u32,
}

/// Acknowledgement of a new order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub symbol: String,
    pub user_id: u32,
    pub user_order_id: u32,
}

/// Acknowledgement of a cancel request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelAck {
    pub symbol: String,
    pub user_id: u32,
    pub user_order_id: u32,
}

/// New order rejected by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reject {
    pub symbol: String,
    pub user_id: u32,
    pub user_order_id: u32,

    /// Engine-defined reason code.
    pub reason: u8,
}

/// Cancel request rejected by the engine.
///
/// Not part of either wire dialect (the engine reuses the `R` record for
/// both reject flavors); the variant exists so the relay filter set and
/// downstream consumers can speak about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelReject {
    pub symbol: String,
    pub user_id: u32,
    pub user_order_id: u32,
    pub reason: u8,
}

/// Trade event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trade {
    pub symbol: String,

    pub user_id_buy: u32,
    pub user_order_id_buy: u32,

    pub user_id_sell: u32,
    pub user_order_id_sell: u32,

    pub price: u32,
    pub quantity: u32,
}

/// Top-of-book event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopOfBook {
    pub symbol: String,

    /// Side this event refers to.
    pub side: Side,

    /// Best price; `0` together with `total_quantity == 0` means the
    /// side has been eliminated.
    pub price: u32,

    /// Total quantity at the best price.
    pub total_quantity: u32,
}

impl TopOfBook {
    /// A level is eliminated when both price and quantity are zero.
    pub fn eliminated(&self) -> bool {
        self.price == 0 && self.total_quantity == 0
    }
}

// -----------------------------------------------------------------------------
// Convenience constructors
// -----------------------------------------------------------------------------

impl Request {
    pub fn new_order(
        user_id: u32,
        symbol: impl Into<String>,
        price: u32,
        quantity: u32,
        side: Side,
        user_order_id: u32,
    ) -> Self {
        Request::NewOrder(NewOrder {
            user_id,
            symbol: symbol.into(),
            price,
            quantity,
            side,
            user_order_id,
        })
    }

    pub fn cancel(user_id: u32, symbol: impl Into<String>, user_order_id: u32) -> Self {
        Request::Cancel(Cancel {
            user_id,
            symbol: symbol.into(),
            user_order_id,
        })
    }
}

impl Event {
    pub fn ack(symbol: impl Into<String>, user_id: u32, user_order_id: u32) -> Self {
        Event::Ack(Ack {
            symbol: symbol.into(),
            user_id,
            user_order_id,
        })
    }

    pub fn cancel_ack(symbol: impl Into<String>, user_id: u32, user_order_id: u32) -> Self {
        Event::CancelAck(CancelAck {
            symbol: symbol.into(),
            user_id,
            user_order_id,
        })
    }

    pub fn trade(
        symbol: impl Into<String>,
        user_id_buy: u32,
        user_order_id_buy: u32,
        user_id_sell: u32,
        user_order_id_sell: u32,
        price: u32,
        quantity: u32,
    ) -> Self {
        Event::Trade(Trade {
            symbol: symbol.into(),
            user_id_buy,
            user_order_id_buy,
            user_id_sell,
            user_order_id_sell,
            price,
            quantity,
        })
    }

    pub fn top_of_book(
        symbol: impl Into<String>,
        side: Side,
        price: u32,
        total_quantity: u32,
    ) -> Self {
        Event::TopOfBook(TopOfBook {
            symbol: symbol.into(),
            side,
            price,
            total_quantity,
        })
    }
}
