//! Outbound event serialization.
//!
//! Every filtered event is serialized exactly once per broadcast, to a
//! JSON object with kebab-case field names, numeric fields as numbers,
//! the side as `"buy"` / `"sell"`, and the event type under `"type"`.

use engine_codec::Event;
use serde::Serialize;

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "kebab-case")]
enum WireEvent<'a> {
    Ack {
        symbol: &'a str,
        user: u32,
        order: u32,
    },
    CancelAck {
        symbol: &'a str,
        user: u32,
        order: u32,
    },
    Reject {
        symbol: &'a str,
        user: u32,
        order: u32,
        reason: u8,
    },
    CancelReject {
        symbol: &'a str,
        user: u32,
        order: u32,
        reason: u8,
    },
    Trade {
        symbol: &'a str,
        buy_user: u32,
        buy_order: u32,
        sell_user: u32,
        sell_order: u32,
        price: u32,
        qty: u32,
    },
    TopOfBook {
        symbol: &'a str,
        side: &'static str,
        price: u32,
        qty: u32,
        eliminated: bool,
    },
}

impl<'a> From<&'a Event> for WireEvent<'a> {
    fn from(event: &'a Event) -> Self {
        match event {
            Event::Ack(a) => WireEvent::Ack {
                symbol: &a.symbol,
                user: a.user_id,
                order: a.user_order_id,
            },
            Event::CancelAck(c) => WireEvent::CancelAck {
                symbol: &c.symbol,
                user: c.user_id,
                order: c.user_order_id,
            },
            Event::Reject(r) => WireEvent::Reject {
                symbol: &r.symbol,
                user: r.user_id,
                order: r.user_order_id,
                reason: r.reason,
            },
            Event::CancelReject(r) => WireEvent::CancelReject {
                symbol: &r.symbol,
                user: r.user_id,
                order: r.user_order_id,
                reason: r.reason,
            },
            Event::Trade(t) => WireEvent::Trade {
                symbol: &t.symbol,
                buy_user: t.user_id_buy,
                buy_order: t.user_order_id_buy,
                sell_user: t.user_id_sell,
                sell_order: t.user_order_id_sell,
                price: t.price,
                qty: t.quantity,
            },
            Event::TopOfBook(t) => WireEvent::TopOfBook {
                symbol: &t.symbol,
                side: match t.side {
                    engine_codec::Side::Buy => "buy",
                    engine_codec::Side::Sell => "sell",
                },
                price: t.price,
                qty: t.total_quantity,
                eliminated: t.eliminated(),
            },
        }
    }
}

/// Serialize one event to its broadcast text form.
pub fn event_to_json(event: &Event) -> String {
    // The enum above has no map keys or recursion, so this cannot fail.
    serde_json::to_string(&WireEvent::from(event)).expect("event serialization")
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_codec::Side;
    use serde_json::json;

    fn value(event: &Event) -> serde_json::Value {
        serde_json::from_str(&event_to_json(event)).unwrap()
    }

    #[test]
    fn trade_shape() {
        let event = Event::trade("GOOG", 1, 11, 2, 22, 2500, 10);
        assert_eq!(
            value(&event),
            json!({
                "type": "trade",
                "symbol": "GOOG",
                "buy-user": 1,
                "buy-order": 11,
                "sell-user": 2,
                "sell-order": 22,
                "price": 2500,
                "qty": 10,
            })
        );
    }

    #[test]
    fn top_of_book_shape() {
        let event = Event::top_of_book("IBM", Side::Sell, 10000, 100);
        assert_eq!(
            value(&event),
            json!({
                "type": "top-of-book",
                "symbol": "IBM",
                "side": "sell",
                "price": 10000,
                "qty": 100,
                "eliminated": false,
            })
        );
    }

    #[test]
    fn eliminated_top_of_book_flagged() {
        let event = Event::top_of_book("IBM", Side::Buy, 0, 0);
        assert_eq!(value(&event)["eliminated"], json!(true));
    }

    #[test]
    fn cancel_ack_uses_kebab_case_type() {
        let event = Event::cancel_ack("IBM", 1, 7);
        assert_eq!(value(&event)["type"], json!("cancel-ack"));
    }
}
