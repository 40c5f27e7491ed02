//! CSV compatibility codec.
//!
//! Line-oriented text dialect of the wire protocol. One record per
//! line, fields comma-separated, LF-terminated, whitespace around
//! fields tolerated on decode.
//!
//! Requests (client → engine):
//!
//! - New order: `N, user, symbol, price, qty, side(B/S), userOrderId`
//! - Cancel:    `C, user, symbol, userOrderId`
//! - Flush:     `F`
//!
//! Events (engine → client):
//!
//! - Ack:        `A, symbol, user, userOrderId`
//! - CancelAck:  `X, symbol, user, userOrderId`
//! - Trade:      `T, symbol, userBuy, orderBuy, userSell, orderSell, price, qty`
//! - TopOfBook:  `B, symbol, side(B/S), price, qty`
//!   (eliminated levels arrive as `-, -` or `0, 0`; we always emit `0, 0`)
//! - Reject:     `R, symbol, user, userOrderId, reason`

use crate::error::CodecError;
use crate::messages::{
    Ack, Cancel, CancelAck, Event, NewOrder, Reject, Request, Side, TopOfBook, Trade,
};

/// Format a request as a CSV line, trailing `\n` included.
pub fn encode_request(req: &Request) -> String {
    match req {
        Request::NewOrder(n) => format!(
            "N,{},{},{},{},{},{}\n",
            n.user_id,
            n.symbol,
            n.price,
            n.quantity,
            n.side.wire_char(),
            n.user_order_id
        ),
        Request::Cancel(c) => format!("C,{},{},{}\n", c.user_id, c.symbol, c.user_order_id),
        Request::Flush => "F\n".to_string(),
    }
}

/// Format an event as a CSV line, trailing `\n` included.
///
/// [`crate::messages::CancelReject`] has no record tag of its own and
/// cannot be encoded.
pub fn encode_event(event: &Event) -> Result<String, CodecError> {
    Ok(match event {
        Event::Ack(a) => format!("A,{},{},{}\n", a.symbol, a.user_id, a.user_order_id),
        Event::CancelAck(c) => format!("X,{},{},{}\n", c.symbol, c.user_id, c.user_order_id),
        Event::Trade(t) => format!(
            "T,{},{},{},{},{},{},{}\n",
            t.symbol,
            t.user_id_buy,
            t.user_order_id_buy,
            t.user_id_sell,
            t.user_order_id_sell,
            t.price,
            t.quantity
        ),
        Event::TopOfBook(t) => format!(
            "B,{},{},{},{}\n",
            t.symbol,
            t.side.wire_char(),
            t.price,
            t.total_quantity
        ),
        Event::Reject(r) => format!(
            "R,{},{},{},{}\n",
            r.symbol, r.user_id, r.user_order_id, r.reason
        ),
        Event::CancelReject(_) => return Err(CodecError::UnknownType(0)),
    })
}

/// Parse a single CSV line into a [`Request`].
pub fn decode_request(line: &str) -> Result<Request, CodecError> {
    let tokens = split_and_trim(line);
    let tag = record_tag(&tokens)?;

    match tag {
        b'N' => {
            expect_fields(&tokens, 7)?;
            Ok(Request::NewOrder(NewOrder {
                user_id: parse_u32(&tokens[1], "user")?,
                symbol: parse_symbol(&tokens[2])?,
                price: parse_u32(&tokens[3], "price")?,
                quantity: parse_u32(&tokens[4], "quantity")?,
                side: parse_side(&tokens[5])?,
                user_order_id: parse_u32(&tokens[6], "user_order_id")?,
            }))
        }
        b'C' => {
            expect_fields(&tokens, 4)?;
            Ok(Request::Cancel(Cancel {
                user_id: parse_u32(&tokens[1], "user")?,
                symbol: parse_symbol(&tokens[2])?,
                user_order_id: parse_u32(&tokens[3], "user_order_id")?,
            }))
        }
        b'F' => {
            expect_fields(&tokens, 1)?;
            Ok(Request::Flush)
        }
        other => Err(CodecError::UnknownType(other)),
    }
}

/// Parse a single CSV line into an [`Event`].
pub fn decode_event(line: &str) -> Result<Event, CodecError> {
    let tokens = split_and_trim(line);
    let tag = record_tag(&tokens)?;

    match tag {
        b'A' => {
            expect_fields(&tokens, 4)?;
            Ok(Event::Ack(Ack {
                symbol: parse_symbol(&tokens[1])?,
                user_id: parse_u32(&tokens[2], "user")?,
                user_order_id: parse_u32(&tokens[3], "user_order_id")?,
            }))
        }
        b'X' => {
            expect_fields(&tokens, 4)?;
            Ok(Event::CancelAck(CancelAck {
                symbol: parse_symbol(&tokens[1])?,
                user_id: parse_u32(&tokens[2], "user")?,
                user_order_id: parse_u32(&tokens[3], "user_order_id")?,
            }))
        }
        b'T' => {
            expect_fields(&tokens, 8)?;
            Ok(Event::Trade(Trade {
                symbol: parse_symbol(&tokens[1])?,
                user_id_buy: parse_u32(&tokens[2], "buy_user")?,
                user_order_id_buy: parse_u32(&tokens[3], "buy_order")?,
                user_id_sell: parse_u32(&tokens[4], "sell_user")?,
                user_order_id_sell: parse_u32(&tokens[5], "sell_order")?,
                price: parse_u32(&tokens[6], "price")?,
                quantity: parse_u32(&tokens[7], "quantity")?,
            }))
        }
        b'B' => {
            expect_fields(&tokens, 5)?;
            Ok(Event::TopOfBook(TopOfBook {
                symbol: parse_symbol(&tokens[1])?,
                side: parse_side(&tokens[2])?,
                price: parse_u32_or_dash(&tokens[3], "price")?,
                total_quantity: parse_u32_or_dash(&tokens[4], "quantity")?,
            }))
        }
        b'R' => {
            expect_fields(&tokens, 5)?;
            Ok(Event::Reject(Reject {
                symbol: parse_symbol(&tokens[1])?,
                user_id: parse_u32(&tokens[2], "user")?,
                user_order_id: parse_u32(&tokens[3], "user_order_id")?,
                reason: parse_u32(&tokens[4], "reason")? as u8,
            }))
        }
        other => Err(CodecError::UnknownType(other)),
    }
}

// -----------------------------------------------------------------------------
// Helpers
// -----------------------------------------------------------------------------

fn split_and_trim(line: &str) -> Vec<&str> {
    line.trim().split(',').map(str::trim).collect()
}

fn record_tag(tokens: &[&str]) -> Result<u8, CodecError> {
    let first = tokens.first().copied().unwrap_or("");
    if first.len() != 1 {
        return Err(CodecError::Truncated);
    }
    Ok(first.as_bytes()[0])
}

fn expect_fields(tokens: &[&str], n: usize) -> Result<(), CodecError> {
    if tokens.len() < n {
        Err(CodecError::Truncated)
    } else {
        Ok(())
    }
}

fn parse_u32(s: &str, field: &'static str) -> Result<u32, CodecError> {
    s.parse::<u32>().map_err(|_| CodecError::ParseField(field))
}

/// `-` denotes an eliminated top-of-book field and reads as 0.
fn parse_u32_or_dash(s: &str, field: &'static str) -> Result<u32, CodecError> {
    if s == "-" {
        Ok(0)
    } else {
        parse_u32(s, field)
    }
}

fn parse_side(s: &str) -> Result<Side, CodecError> {
    let b = if s.len() == 1 { s.as_bytes()[0] } else { 0 };
    Side::from_wire_byte(b).ok_or(CodecError::UnknownSide(b))
}

fn parse_symbol(s: &str) -> Result<String, CodecError> {
    if s.is_empty() || s.len() > crate::wire_types::SYMBOL_WIDTH || !s.is_ascii() {
        return Err(CodecError::ParseField("symbol"));
    }
    Ok(s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trade_line_decodes() {
        let event = decode_event("T,GOOG,1,11,2,22,2500,10").unwrap();
        assert_eq!(event, Event::trade("GOOG", 1, 11, 2, 22, 2500, 10));
    }

    #[test]
    fn whitespace_around_fields_tolerated() {
        let event = decode_event(" A , IBM , 1 , 7 ").unwrap();
        assert_eq!(event, Event::ack("IBM", 1, 7));
    }

    #[test]
    fn eliminated_tob_dash_form() {
        let event = decode_event("B,IBM,B,-,-").unwrap();
        match event {
            Event::TopOfBook(ref t) => {
                assert_eq!(t.price, 0);
                assert_eq!(t.total_quantity, 0);
                assert!(t.eliminated());
            }
            other => panic!("expected TopOfBook, got {other:?}"),
        }
    }

    #[test]
    fn eliminated_tob_encodes_zero_form() {
        let line = encode_event(&Event::top_of_book("IBM", Side::Buy, 0, 0)).unwrap();
        assert_eq!(line, "B,IBM,B,0,0\n");
    }

    #[test]
    fn non_decimal_field_fails() {
        assert_eq!(
            decode_event("A,IBM,one,7"),
            Err(CodecError::ParseField("user"))
        );
    }

    #[test]
    fn cancel_request_round_trips() {
        let req = Request::cancel(3, "AAPL", 42);
        let line = encode_request(&req);
        assert_eq!(line, "C,3,AAPL,42\n");
        assert_eq!(decode_request(&line).unwrap(), req);
    }

    #[test]
    fn unknown_tag_fails() {
        assert_eq!(decode_event("Z,IBM,1,2"), Err(CodecError::UnknownType(b'Z')));
    }
}
