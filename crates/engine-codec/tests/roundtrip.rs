use engine_codec::binary;
use engine_codec::csv;
use engine_codec::{decode_event_auto, Event, Request, Side};
use proptest::prelude::*;

fn any_side() -> impl Strategy<Value = Side> {
    prop_oneof![Just(Side::Buy), Just(Side::Sell)]
}

fn any_symbol() -> impl Strategy<Value = String> {
    "[A-Z]{1,8}".prop_map(|s| s)
}

fn any_request() -> impl Strategy<Value = Request> {
    prop_oneof![
        (any::<u32>(), any_symbol(), any::<u32>(), any::<u32>(), any_side(), any::<u32>())
            .prop_map(|(user, sym, px, qty, side, oid)| Request::new_order(
                user, sym, px, qty, side, oid
            )),
        (any::<u32>(), any_symbol(), any::<u32>())
            .prop_map(|(user, sym, oid)| Request::cancel(user, sym, oid)),
        Just(Request::Flush),
    ]
}

fn any_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        (any_symbol(), any::<u32>(), any::<u32>())
            .prop_map(|(sym, user, oid)| Event::ack(sym, user, oid)),
        (any_symbol(), any::<u32>(), any::<u32>())
            .prop_map(|(sym, user, oid)| Event::cancel_ack(sym, user, oid)),
        (
            any_symbol(),
            any::<u32>(),
            any::<u32>(),
            any::<u32>(),
            any::<u32>(),
            any::<u32>(),
            any::<u32>()
        )
            .prop_map(|(sym, bu, bo, su, so, px, qty)| Event::trade(
                sym, bu, bo, su, so, px, qty
            )),
        (any_symbol(), any_side(), any::<u32>(), any::<u32>())
            .prop_map(|(sym, side, px, qty)| Event::top_of_book(sym, side, px, qty)),
        (any_symbol(), any::<u32>(), any::<u32>(), any::<u8>()).prop_map(
            |(sym, user, oid, reason)| Event::Reject(engine_codec::Reject {
                symbol: sym,
                user_id: user,
                user_order_id: oid,
                reason,
            })
        ),
    ]
}

proptest! {
    #[test]
    fn binary_request_round_trip(req in any_request()) {
        let bytes = binary::encode_request(&req).unwrap();
        prop_assert_eq!(binary::decode_request(&bytes).unwrap(), req);
    }

    #[test]
    fn binary_event_round_trip(event in any_event()) {
        let bytes = binary::encode_event(&event).unwrap();
        prop_assert_eq!(binary::decode_event(&bytes).unwrap(), event);
    }

    #[test]
    fn csv_request_round_trip(req in any_request()) {
        let line = csv::encode_request(&req);
        prop_assert_eq!(csv::decode_request(&line).unwrap(), req);
    }

    #[test]
    fn csv_event_round_trip(event in any_event()) {
        let line = csv::encode_event(&event).unwrap();
        prop_assert_eq!(csv::decode_event(&line).unwrap(), event);
    }

    #[test]
    fn auto_detect_classifies_both_dialects(event in any_event()) {
        // Binary form must round-trip through the auto entrypoint...
        let bytes = binary::encode_event(&event).unwrap();
        prop_assert_eq!(decode_event_auto(&bytes).unwrap(), event.clone());

        // ...and so must the CSV form of the same event.
        let line = csv::encode_event(&event).unwrap();
        prop_assert_eq!(decode_event_auto(line.as_bytes()).unwrap(), event);
    }

    #[test]
    fn auto_detect_never_reports_bad_magic(buf in prop::collection::vec(any::<u8>(), 1..64)) {
        // The auto entrypoint owns the binary-vs-text decision, so a
        // BadMagic error leaking out of it would mean it dispatched a
        // non-magic buffer to the binary decoder.
        if let Err(err) = decode_event_auto(&buf) {
            prop_assert!(!matches!(err, engine_codec::CodecError::BadMagic(_)));
        }
    }
}

#[test]
fn csv_round_trip_tolerates_trailing_newline_and_spaces() {
    let event = Event::trade("GOOG", 1, 11, 2, 22, 2500, 10);
    let line = "T, GOOG, 1, 11, 2, 22, 2500, 10\n";
    assert_eq!(decode_event_auto(line.as_bytes()).unwrap(), event);
}
