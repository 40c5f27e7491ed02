//! Binary wire protocol.
//!
//! This module converts between raw binary frames (`&[u8]`) and the
//! logical [`Request`] / [`Event`] types.
//!
//! Framing model (single-message buffer, all integers u32 big-endian,
//! symbol is a fixed 8-byte field padded per [`crate::wire_types`]):
//!
//! ```text
//! Request (client → engine)
//! -------------------------
//! NewOrder (27 bytes):
//!   [0]      'M'
//!   [1]      'N'
//!   [2..6]   user_id
//!   [6..14]  symbol
//!   [14..18] price
//!   [18..22] quantity
//!   [22]     side ('B' / 'S')
//!   [23..27] user_order_id
//!
//! Cancel (18 bytes):
//!   [0] 'M'  [1] 'C'  [2..6] user_id  [6..14] symbol  [14..18] user_order_id
//!
//! Flush (2 bytes):
//!   [0] 'M'  [1] 'F'
//!
//! Event (engine → client)
//! -----------------------
//! Ack / CancelAck (18 bytes, type 'A' / 'X'):
//!   [2..10] symbol  [10..14] user_id  [14..18] user_order_id
//!
//! Trade (34 bytes, type 'T'):
//!   [2..10] symbol  [10..14] buy_user  [14..18] buy_order
//!   [18..22] sell_user  [22..26] sell_order  [26..30] price  [30..34] qty
//!
//! TopOfBook (20 bytes, type 'B'):
//!   [2..10] symbol  [10] side  [11..15] price  [15..19] qty  [19] pad
//!   (pad byte consumed, not validated; price = qty = 0 means the side
//!   has been eliminated)
//!
//! Reject (19 bytes, type 'R'):
//!   [2..10] symbol  [10..14] user_id  [14..18] user_order_id  [18] reason
//! ```
//!
//! NOTE: one message per buffer. The stream transport provides its own
//! length-prefix framing around these payloads.

use crate::error::CodecError;
use crate::messages::{
    Ack, Cancel, CancelAck, Event, NewOrder, Reject, Request, Side, TopOfBook, Trade,
};
use crate::wire_types::{
    decode_symbol, encode_symbol, read_u32_be, ACK_FRAME_LEN, CANCEL_FRAME_LEN, FLUSH_FRAME_LEN,
    MAGIC, NEW_ORDER_FRAME_LEN, REJECT_FRAME_LEN, SYMBOL_WIDTH, TOP_OF_BOOK_FRAME_LEN,
    TRADE_FRAME_LEN, TYPE_ACK, TYPE_CANCEL, TYPE_CANCEL_ACK, TYPE_FLUSH, TYPE_NEW_ORDER,
    TYPE_REJECT, TYPE_TOP_OF_BOOK, TYPE_TRADE,
};

// ============================================================================
// Requests: encode (client side) and decode (test engines)
// ============================================================================

/// Encode a single request into a binary frame.
pub fn encode_request(req: &Request) -> Result<Vec<u8>, CodecError> {
    match req {
        Request::NewOrder(n) => encode_new_order(n),
        Request::Cancel(c) => encode_cancel(c),
        Request::Flush => Ok(vec![MAGIC, TYPE_FLUSH]),
    }
}

fn encode_new_order(n: &NewOrder) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::with_capacity(NEW_ORDER_FRAME_LEN);
    out.push(MAGIC);
    out.push(TYPE_NEW_ORDER);
    out.extend_from_slice(&n.user_id.to_be_bytes());
    out.extend_from_slice(&encode_symbol(&n.symbol)?);
    out.extend_from_slice(&n.price.to_be_bytes());
    out.extend_from_slice(&n.quantity.to_be_bytes());
    out.push(n.side.wire_char() as u8);
    out.extend_from_slice(&n.user_order_id.to_be_bytes());
    Ok(out)
}

fn encode_cancel(c: &Cancel) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::with_capacity(CANCEL_FRAME_LEN);
    out.push(MAGIC);
    out.push(TYPE_CANCEL);
    out.extend_from_slice(&c.user_id.to_be_bytes());
    out.extend_from_slice(&encode_symbol(&c.symbol)?);
    out.extend_from_slice(&c.user_order_id.to_be_bytes());
    Ok(out)
}

/// Decode a single request from a binary frame.
///
/// Used on the receiving side of the protocol, i.e. by the stub engines
/// the test suite runs scenarios against.
pub fn decode_request(buf: &[u8]) -> Result<Request, CodecError> {
    if buf.is_empty() {
        return Err(CodecError::Truncated);
    }
    if buf[0] != MAGIC {
        return Err(CodecError::BadMagic(buf[0]));
    }
    if buf.len() < FLUSH_FRAME_LEN {
        return Err(CodecError::Truncated);
    }

    match buf[1] {
        TYPE_NEW_ORDER => {
            if buf.len() < NEW_ORDER_FRAME_LEN {
                return Err(CodecError::Truncated);
            }
            let side = Side::from_wire_byte(buf[22]).ok_or(CodecError::UnknownSide(buf[22]))?;
            Ok(Request::NewOrder(NewOrder {
                user_id: read_u32_be(&buf[2..6]),
                symbol: decode_symbol(&buf[6..6 + SYMBOL_WIDTH])?,
                price: read_u32_be(&buf[14..18]),
                quantity: read_u32_be(&buf[18..22]),
                side,
                user_order_id: read_u32_be(&buf[23..27]),
            }))
        }
        TYPE_CANCEL => {
            if buf.len() < CANCEL_FRAME_LEN {
                return Err(CodecError::Truncated);
            }
            Ok(Request::Cancel(Cancel {
                user_id: read_u32_be(&buf[2..6]),
                symbol: decode_symbol(&buf[6..6 + SYMBOL_WIDTH])?,
                user_order_id: read_u32_be(&buf[14..18]),
            }))
        }
        TYPE_FLUSH => Ok(Request::Flush),
        other => Err(CodecError::UnknownType(other)),
    }
}

// ============================================================================
// Events: decode (client side) and encode (test engines)
// ============================================================================

/// Decode a single event from a binary frame.
pub fn decode_event(buf: &[u8]) -> Result<Event, CodecError> {
    if buf.is_empty() {
        return Err(CodecError::Truncated);
    }
    if buf[0] != MAGIC {
        return Err(CodecError::BadMagic(buf[0]));
    }
    if buf.len() < 2 {
        return Err(CodecError::Truncated);
    }

    match buf[1] {
        TYPE_ACK => {
            let (symbol, user_id, user_order_id) = decode_sym_user_order(buf, ACK_FRAME_LEN)?;
            Ok(Event::Ack(Ack {
                symbol,
                user_id,
                user_order_id,
            }))
        }
        TYPE_CANCEL_ACK => {
            let (symbol, user_id, user_order_id) = decode_sym_user_order(buf, ACK_FRAME_LEN)?;
            Ok(Event::CancelAck(CancelAck {
                symbol,
                user_id,
                user_order_id,
            }))
        }
        TYPE_TRADE => {
            if buf.len() < TRADE_FRAME_LEN {
                return Err(CodecError::Truncated);
            }
            Ok(Event::Trade(Trade {
                symbol: decode_symbol(&buf[2..2 + SYMBOL_WIDTH])?,
                user_id_buy: read_u32_be(&buf[10..14]),
                user_order_id_buy: read_u32_be(&buf[14..18]),
                user_id_sell: read_u32_be(&buf[18..22]),
                user_order_id_sell: read_u32_be(&buf[22..26]),
                price: read_u32_be(&buf[26..30]),
                quantity: read_u32_be(&buf[30..34]),
            }))
        }
        TYPE_TOP_OF_BOOK => {
            if buf.len() < TOP_OF_BOOK_FRAME_LEN {
                return Err(CodecError::Truncated);
            }
            let side = Side::from_wire_byte(buf[10]).ok_or(CodecError::UnknownSide(buf[10]))?;
            // buf[19] is the pad byte: consumed, never validated.
            Ok(Event::TopOfBook(TopOfBook {
                symbol: decode_symbol(&buf[2..2 + SYMBOL_WIDTH])?,
                side,
                price: read_u32_be(&buf[11..15]),
                total_quantity: read_u32_be(&buf[15..19]),
            }))
        }
        TYPE_REJECT => {
            if buf.len() < REJECT_FRAME_LEN {
                return Err(CodecError::Truncated);
            }
            Ok(Event::Reject(Reject {
                symbol: decode_symbol(&buf[2..2 + SYMBOL_WIDTH])?,
                user_id: read_u32_be(&buf[10..14]),
                user_order_id: read_u32_be(&buf[14..18]),
                reason: buf[18],
            }))
        }
        other => Err(CodecError::UnknownType(other)),
    }
}

fn decode_sym_user_order(buf: &[u8], frame_len: usize) -> Result<(String, u32, u32), CodecError> {
    if buf.len() < frame_len {
        return Err(CodecError::Truncated);
    }
    Ok((
        decode_symbol(&buf[2..2 + SYMBOL_WIDTH])?,
        read_u32_be(&buf[10..14]),
        read_u32_be(&buf[14..18]),
    ))
}

/// Encode a single event into a binary frame.
///
/// Mirror of [`decode_event`], used by stub engines and round-trip
/// tests. [`crate::messages::CancelReject`] has no wire type of its own
/// and cannot be encoded.
pub fn encode_event(event: &Event) -> Result<Vec<u8>, CodecError> {
    match event {
        Event::Ack(a) => encode_sym_user_order(TYPE_ACK, &a.symbol, a.user_id, a.user_order_id),
        Event::CancelAck(c) => {
            encode_sym_user_order(TYPE_CANCEL_ACK, &c.symbol, c.user_id, c.user_order_id)
        }
        Event::Trade(t) => {
            let mut out = Vec::with_capacity(TRADE_FRAME_LEN);
            out.push(MAGIC);
            out.push(TYPE_TRADE);
            out.extend_from_slice(&encode_symbol(&t.symbol)?);
            out.extend_from_slice(&t.user_id_buy.to_be_bytes());
            out.extend_from_slice(&t.user_order_id_buy.to_be_bytes());
            out.extend_from_slice(&t.user_id_sell.to_be_bytes());
            out.extend_from_slice(&t.user_order_id_sell.to_be_bytes());
            out.extend_from_slice(&t.price.to_be_bytes());
            out.extend_from_slice(&t.quantity.to_be_bytes());
            Ok(out)
        }
        Event::TopOfBook(t) => {
            let mut out = Vec::with_capacity(TOP_OF_BOOK_FRAME_LEN);
            out.push(MAGIC);
            out.push(TYPE_TOP_OF_BOOK);
            out.extend_from_slice(&encode_symbol(&t.symbol)?);
            out.push(t.side.wire_char() as u8);
            out.extend_from_slice(&t.price.to_be_bytes());
            out.extend_from_slice(&t.total_quantity.to_be_bytes());
            out.push(0x00); // trailing pad
            Ok(out)
        }
        Event::Reject(r) => {
            let mut out = Vec::with_capacity(REJECT_FRAME_LEN);
            out.push(MAGIC);
            out.push(TYPE_REJECT);
            out.extend_from_slice(&encode_symbol(&r.symbol)?);
            out.extend_from_slice(&r.user_id.to_be_bytes());
            out.extend_from_slice(&r.user_order_id.to_be_bytes());
            out.push(r.reason);
            Ok(out)
        }
        Event::CancelReject(_) => Err(CodecError::UnknownType(0)),
    }
}

fn encode_sym_user_order(
    type_byte: u8,
    symbol: &str,
    user_id: u32,
    user_order_id: u32,
) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::with_capacity(ACK_FRAME_LEN);
    out.push(MAGIC);
    out.push(type_byte);
    out.extend_from_slice(&encode_symbol(symbol)?);
    out.extend_from_slice(&user_id.to_be_bytes());
    out.extend_from_slice(&user_order_id.to_be_bytes());
    Ok(out)
}
