#![cfg(all(feature = "session", feature = "timeline"))]

use chrono::NaiveDate;
use negotiation_core::session::{Enqueued, NegotiationSession};
use negotiation_core::timeline::receipt_timeline;
use negotiation_core::{Edit, InstrumentSpec, NegotiationConfig};
use rust_decimal_macros::dec;

#[test]
fn test_typing_burst_solves_once_for_last_value() {
    let mut session = NegotiationSession::start(dec!(100000), NegotiationConfig::default()).unwrap();
    session.submit(
        Edit::AddInstrument {
            spec: InstrumentSpec::cash(dec!(100000)),
        },
        0,
    );
    assert_eq!(session.pump(0).len(), 1);

    // "1", "12", "12.5" typed 100ms apart
    let mut last = Enqueued::Queued;
    for (t, pct) in [(100, dec!(1)), (200, dec!(12)), (300, dec!(12.5))] {
        last = session.submit(Edit::RealDiscountPercent { percent: pct, lock: false }, t);
    }
    assert_eq!(last, Enqueued::Superseded);
    assert_eq!(session.next_due_ms(), Some(600));

    let applied = session.pump(600);
    assert_eq!(applied.len(), 1);
    let outcome = applied[0].outcome.as_ref().unwrap();
    assert!(outcome.solver_iterations.is_some());
    assert!((session.state().real_discount_percent() - dec!(12.5)).abs() < dec!(0.01));
}

#[test]
fn test_committed_state_is_consistent_after_each_pump() {
    let mut session = NegotiationSession::start(dec!(20000), NegotiationConfig::default()).unwrap();
    session.submit(
        Edit::AddInstrument {
            spec: InstrumentSpec::boleto(dec!(20000), 4, dec!(0.01)).with_id("b"),
        },
        0,
    );
    session.submit(Edit::NegotiatedValue { value: dec!(18000) }, 10);
    session.submit(Edit::ToggleLock { id: "b".into() }, 20);

    // Only the instrument add is due; the toggle waits behind the settling value
    assert_eq!(session.pump(20).len(), 1);
    assert_eq!(session.pending(), 2);

    let applied = session.pump(310);
    assert_eq!(applied.len(), 2);
    let state = session.state();
    assert_eq!(state.negotiated_value(), dec!(18000));
    assert_eq!(state.instrument("b").unwrap().face_value(), dec!(18000));
    assert!(state.instrument("b").unwrap().is_locked());
    assert_eq!(state.remaining_value(), dec!(0));
}

#[test]
fn test_timeline_from_session_state() {
    let mut session = NegotiationSession::start(dec!(3000), NegotiationConfig::default()).unwrap();
    session
        .apply_now(&Edit::AddInstrument {
            spec: InstrumentSpec::cash(dec!(1000)),
        })
        .unwrap();
    session
        .apply_now(&Edit::AddInstrument {
            spec: InstrumentSpec::card(dec!(2000), 2, dec!(0.03), dec!(0.02)),
        })
        .unwrap();

    let reference = NaiveDate::from_ymd_opt(2025, 10, 1).unwrap();
    let tl = receipt_timeline(session.state().instruments(), reference).unwrap();
    assert_eq!(tl.receipts.len(), 3);
    assert_eq!(tl.total, dec!(3000));
    assert_eq!(tl.monthly.len(), 3);
    assert_eq!(tl.monthly[2].month, "2025-12");
}
