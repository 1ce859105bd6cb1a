//! Property-based invariant tests for staged snapshots.
//!
//! 1. Every stage is evaluated at most once, whatever the read order
//! 2. The data range is finite and ordered, even with NaN and infinities
//! 3. Explicit limits with both bounds are the display range, ordered
//! 4. A 2-D projection yields a bitmap of the projected shape
//! 5. The complex sample is sorted and drawn from the projected values

use std::sync::Arc;

use ndv_core::data::DataAndMetadata;
use ndv_display::{
    DisplayLimits, SnapshotConfig, SnapshotParams, Stage, StagedSnapshot, validate_display_limits,
};
use num_complex::Complex64;
use proptest::prelude::*;

// ── Helpers ──────────────────────────────────────────────────────────

fn arb_value() -> impl Strategy<Value = f64> {
    prop_oneof![
        8 => -1.0e6f64..1.0e6,
        1 => Just(f64::NAN),
        1 => Just(f64::INFINITY),
        1 => Just(f64::NEG_INFINITY),
    ]
}

/// A real image of 1..=8 x 1..=8 pixels.
fn arb_image() -> impl Strategy<Value = DataAndMetadata> {
    (1usize..=8, 1usize..=8)
        .prop_flat_map(|(h, w)| {
            proptest::collection::vec(arb_value(), h * w).prop_map(move |v| (h, w, v))
        })
        .prop_map(|(h, w, v)| DataAndMetadata::real(&[h, w], v).expect("shape matches len"))
}

fn snapshot(data: DataAndMetadata, limits: Option<DisplayLimits>) -> StagedSnapshot {
    StagedSnapshot::new(
        SnapshotParams {
            data: Some(Arc::new(data)),
            display_limits: limits,
            ..SnapshotParams::default()
        },
        SnapshotConfig::default().with_sample_seed(11),
    )
}

// ═════════════════════════════════════════════════════════════════════════
// 1. At-most-once evaluation
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn stages_evaluate_at_most_once(
        data in arb_image(),
        reads in proptest::collection::vec(0usize..5, 1..20),
    ) {
        let s = snapshot(data, None);
        for r in reads {
            match r {
                0 => { s.projected(); }
                1 => { s.data_range(); }
                2 => { s.sample(); }
                3 => { s.display_range(); }
                _ => { s.bitmap(); }
            }
        }
        for stage in Stage::ALL {
            prop_assert!(s.stage_evaluations(stage) <= 1, "{:?}", stage);
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2. Finite, ordered data range
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn data_range_is_finite_and_ordered(data in arb_image()) {
        let (lo, hi) = snapshot(data, None).data_range().expect("image has a range");
        prop_assert!(lo.is_finite() && hi.is_finite());
        prop_assert!(lo <= hi);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. Explicit limits
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn explicit_limits_are_the_display_range(
        data in arb_image(),
        a in -1.0e3f64..1.0e3,
        b in -1.0e3f64..1.0e3,
    ) {
        let limits = validate_display_limits(&[Some(a), Some(b)]);
        let s = snapshot(data, limits);
        prop_assert_eq!(s.display_range(), Some((a.min(b), a.max(b))));
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. Bitmap shape
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn bitmap_matches_projection(data in arb_image()) {
        let shape = data.dimensional_shape().to_vec();
        let s = snapshot(data, None);
        let bitmap = s.bitmap().expect("2-D data has a bitmap");
        prop_assert_eq!((bitmap.height(), bitmap.width()), (shape[0], shape[1]));
        prop_assert!(bitmap.pixels().iter().all(|p| p.a() == 255));
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5. Complex sample
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn complex_sample_is_sorted_subset(
        values in proptest::collection::vec((-100.0f64..100.0, -100.0f64..100.0), 1..64),
        size in 1usize..300,
    ) {
        let n = values.len();
        let data = DataAndMetadata::complex(
            &[1, n],
            values.iter().map(|&(re, im)| Complex64::new(re, im)).collect(),
        )
        .expect("shape matches len");
        let s = StagedSnapshot::new(
            SnapshotParams { data: Some(Arc::new(data)), ..SnapshotParams::default() },
            SnapshotConfig::default().with_sample_size(size).with_sample_seed(3),
        );
        let projected = s.projected().expect("non-empty");
        let projected: Vec<f64> = projected.as_scalar().expect("scalar").iter().copied().collect();
        let sample = s.sample().expect("complex data is sampled");
        prop_assert_eq!(sample.len(), size);
        prop_assert!(sample.windows(2).all(|w| w[0] <= w[1]));
        prop_assert!(sample.iter().all(|v| projected.contains(v)));
    }
}
