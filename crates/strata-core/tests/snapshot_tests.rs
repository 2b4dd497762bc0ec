//! Snapshot persistence across containers of different slot types.
//!
//! Uses proptest to verify that saving and loading reproduces every slot
//! and the default, and checks the rejection paths of the snapshot reader.

use proptest::prelude::*;
use std::sync::Arc;
use strata_core::{
    read_snapshot, write_snapshot, Bar, CorruptState, PerSymbol, Position, PositionBook,
    StrataError, SymbolId, SymbolRegistry, SymbolSlots,
};

fn registry(n: usize) -> SymbolRegistry {
    SymbolRegistry::new((0..n).map(|i| format!("S{i}"))).unwrap()
}

fn arb_vectors() -> impl Strategy<Value = (Vec<f32>, Vec<Vec<f32>>)> {
    (1usize..6).prop_flat_map(|n| {
        (
            prop::collection::vec(-1e6f32..1e6, 0..4),
            prop::collection::vec(prop::collection::vec(-1e6f32..1e6, 0..8), n),
        )
    })
}

proptest! {
    /// Vector containers reproduce every slot and the default.
    #[test]
    fn vector_container_roundtrip((default, values) in arb_vectors()) {
        let reg = registry(values.len());
        let c = PerSymbol::named("feat", &reg, default.clone());
        for (i, v) in values.iter().enumerate() {
            c.set(SymbolId::from(i), v.clone());
        }
        let bytes = c.encode_payload().unwrap();

        let d: PerSymbol<Vec<f32>> = PerSymbol::named("feat", &reg, Vec::new());
        prop_assert!(d.decode_payload(&bytes).is_ok());
        prop_assert_eq!(d.default_value(), default);
        prop_assert_eq!(d.values(), values);
    }

    /// Scalar containers reproduce every slot and the default.
    #[test]
    fn scalar_container_roundtrip(
        default in any::<i64>(),
        values in prop::collection::vec(any::<i64>(), 1..10),
    ) {
        let reg = registry(values.len());
        let c = PerSymbol::named("count", &reg, default);
        for (i, v) in values.iter().enumerate() {
            c.set(SymbolId::from(i), *v);
        }
        let bytes = c.encode_payload().unwrap();
        let d = PerSymbol::named("count", &reg, 0i64);
        prop_assert!(d.decode_payload(&bytes).is_ok());
        prop_assert_eq!(d.default_value(), default);
        prop_assert_eq!(d.values(), values);
    }

    /// reset(sym) always restores the stored default.
    #[test]
    fn reset_restores_default(default in -1e9f64..1e9, v in -1e9f64..1e9, idx in 0usize..4) {
        let reg = registry(4);
        let c = PerSymbol::new(&reg, 0.0f64);
        c.set_default(default);
        c.set(SymbolId::from(idx), v);
        c.reset(SymbolId::from(idx));
        prop_assert_eq!(c.get(SymbolId::from(idx)), default);
    }
}

#[test]
fn test_full_snapshot_roundtrip() {
    let reg = registry(2);
    let book = PositionBook::new(&reg);
    let prev: Arc<PerSymbol<Option<Bar>>> = Arc::new(PerSymbol::named("prev_bar", &reg, None));
    let thresholds = Arc::new(PerSymbol::named("threshold", &reg, 1.0f64));

    book.enter_long(SymbolId(1), 100.0, 42, 1.0, 2.0).unwrap();
    prev.set(SymbolId(0), Some(Bar::new(7, 1.0, 2.0, 0.5, 1.5, 10.0)));
    thresholds.set(SymbolId(1), 3.5);

    let containers: Vec<Arc<dyn SymbolSlots>> =
        vec![book.container(), prev.clone(), thresholds.clone()];
    let mut buf = Vec::new();
    write_snapshot(&mut buf, &containers).unwrap();

    let book2 = PositionBook::new(&reg);
    let prev2: Arc<PerSymbol<Option<Bar>>> = Arc::new(PerSymbol::named("prev_bar", &reg, None));
    let thresholds2 = Arc::new(PerSymbol::named("threshold", &reg, 1.0f64));
    let containers2: Vec<Arc<dyn SymbolSlots>> =
        vec![thresholds2.clone(), book2.container(), prev2.clone()];

    let outcome = read_snapshot(buf.as_slice(), &containers2).unwrap();
    assert!(outcome.is_complete());
    assert_eq!(outcome.loaded.len(), 3);

    let p: Position = book2.get(SymbolId(1));
    assert!(p.is_held());
    assert_eq!(p.entry_time, 42);
    assert_eq!(prev2.get(SymbolId(0)).map(|b| b.timestamp), Some(7));
    assert!((thresholds2.get(SymbolId(1)) - 3.5).abs() < 1e-12);
}

#[test]
fn test_snapshot_rejects_bad_magic() {
    let reg = registry(1);
    let c: Vec<Arc<dyn SymbolSlots>> = vec![Arc::new(PerSymbol::named("x", &reg, 0i32))];
    let err = read_snapshot(&b"NOPE\x01\x00"[..], &c).unwrap_err();
    assert!(matches!(err, StrataError::Corrupt(CorruptState::BadMagic)));
}

#[test]
fn test_snapshot_rejects_future_version() {
    let reg = registry(1);
    let c: Vec<Arc<dyn SymbolSlots>> = vec![Arc::new(PerSymbol::named("x", &reg, 0i32))];
    let mut buf = Vec::new();
    write_snapshot(&mut buf, &c).unwrap();
    buf[4] = 99;
    let err = read_snapshot(buf.as_slice(), &c).unwrap_err();
    assert!(matches!(
        err,
        StrataError::Corrupt(CorruptState::UnsupportedVersion { found: 99, .. })
    ));
}

#[test]
fn test_snapshot_rejects_single_container() {
    let small = registry(1);
    let large = registry(3);
    let saved: Vec<Arc<dyn SymbolSlots>> = vec![
        Arc::new(PerSymbol::named("a", &small, 1.0f64)),
        Arc::new(PerSymbol::named("b", &small, 2i64)),
    ];
    let mut buf = Vec::new();
    write_snapshot(&mut buf, &saved).unwrap();

    // "a" matches by name and type but was saved for a different symbol count;
    // "b" changed type.
    let a = Arc::new(PerSymbol::named("a", &large, 5.0f64));
    let b = Arc::new(PerSymbol::named("b", &small, 0.0f64));
    let live: Vec<Arc<dyn SymbolSlots>> = vec![a.clone(), b.clone()];
    let outcome = read_snapshot(buf.as_slice(), &live).unwrap();

    assert!(!outcome.is_complete());
    assert_eq!(outcome.rejected.len(), 2);
    assert!(matches!(outcome.rejected[0].1, CorruptState::CountMismatch { .. }));
    assert!(matches!(outcome.rejected[1].1, CorruptState::TypeMismatch { .. }));
    assert!((a.default_value() - 5.0).abs() < 1e-12);
}

#[test]
fn test_snapshot_rejects_oversized_payload_length() {
    let reg = registry(1);
    let c: Vec<Arc<dyn SymbolSlots>> = vec![Arc::new(PerSymbol::named("x", &reg, 0i32))];
    let mut buf = Vec::new();
    write_snapshot(&mut buf, &c).unwrap();

    // magic(4) version(2) count(4) name(2 + 1) type(2 + 3) -> payload length
    let at = 4 + 2 + 4 + 2 + 1 + 2 + 3;
    assert_eq!(&buf[at..at + 4], &12u32.to_le_bytes());
    buf[at..at + 4].copy_from_slice(&u32::MAX.to_le_bytes());

    let err = read_snapshot(buf.as_slice(), &c).unwrap_err();
    assert!(matches!(err, StrataError::Corrupt(CorruptState::Truncated(_))));
}

#[test]
fn test_snapshot_distinguishes_nested_types() {
    let reg = registry(2);
    let saved: Vec<Arc<dyn SymbolSlots>> = vec![Arc::new(PerSymbol::named(
        "window",
        &reg,
        vec![vec![1.0f32]],
    ))];
    let mut buf = Vec::new();
    write_snapshot(&mut buf, &saved).unwrap();

    let live = Arc::new(PerSymbol::named("window", &reg, vec![2.0f32]));
    let containers: Vec<Arc<dyn SymbolSlots>> = vec![live.clone()];
    let outcome = read_snapshot(buf.as_slice(), &containers).unwrap();
    assert!(matches!(
        &outcome.rejected[0].1,
        CorruptState::TypeMismatch { expected, found, .. }
            if expected == "vec<f32>" && found == "vec<vec<f32>>"
    ));
    assert_eq!(live.get(SymbolId(1)), vec![2.0]);
}
