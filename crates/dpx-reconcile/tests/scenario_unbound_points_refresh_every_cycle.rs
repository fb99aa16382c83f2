//! Scenario: Unbound Points Refresh Every Cycle
//!
//! # Invariants under test
//!
//! 1. A point without a time group is looked up on every cycle.
//! 2. Its time is always the cycle's wall-clock time, found or not.
//! 3. A value seen last cycle but absent now becomes `None`, not stale.
//! 4. A `None` value is never emitted as a sample.

use dpx_reconcile::{parse_reading_time, Engine, PointOutcome, RawSnapshot, Value};
use dpx_schema::{DataType, PointSpec, Schema, SchemaShape};

#[test]
fn unbound_point_refreshes_and_stamps_now() {
    let schema = Schema::new(
        SchemaShape::Independent,
        vec![],
        vec![PointSpec::new("pressure", DataType::Float).with_source_id("P1")],
    )
    .unwrap();
    let mut e = Engine::new(schema);

    let now1 = parse_reading_time("2023-06-01 12:00:00").unwrap();
    let r = e.reconcile_at(&RawSnapshot::new().with_value("P1", "1013 mbar"), now1);
    assert_eq!(r.outcome("pressure"), Some(&PointOutcome::Updated));
    let p = e.point("pressure").unwrap();
    assert_eq!(p.value(), Some(&Value::Float(1013.0)));
    assert_eq!(p.time(), Some(now1));

    // Same value again is still re-emitted: there is no time group to gate it.
    let now2 = parse_reading_time("2023-06-01 12:00:10").unwrap();
    e.reconcile_at(&RawSnapshot::new().with_value("P1", "1013 mbar"), now2);
    let samples = e.samples();
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].time, now2);

    // Gone from the scrape: value resets, time still moves.
    let now3 = parse_reading_time("2023-06-01 12:00:20").unwrap();
    let r = e.reconcile_at(&RawSnapshot::new(), now3);
    assert_eq!(r.outcome("pressure"), Some(&PointOutcome::Missing));
    let p = e.point("pressure").unwrap();
    assert_eq!(p.value(), None);
    assert_eq!(p.time(), Some(now3));
    assert!(e.samples().is_empty());
}
