//! Property tests for the bookkeeping primitives.

use incierto::{calc_psnr, RunningMean, TrainProgress};
use ndarray::Array4;
use proptest::prelude::*;

proptest! {
    #[test]
    fn running_mean_equals_prefix_average(
        values in proptest::collection::vec(-1e3f32..1e3, 1..64)
    ) {
        let mut rm = RunningMean::new();
        for (i, &v) in values.iter().enumerate() {
            let reported = rm.push(v);
            let expected = values[..=i].iter().sum::<f32>() / (i + 1) as f32;
            prop_assert!((reported - expected).abs() <= 1e-3 * expected.abs().max(1.0));
        }
        prop_assert_eq!(rm.len(), values.len());
    }

    #[test]
    fn global_step_is_strictly_increasing(
        start in 0u64..1_000_000,
        count in 1usize..256
    ) {
        let mut progress = TrainProgress { last_epoch: 0, global_step: start };
        let mut prev = start;
        for _ in 0..count {
            let step = progress.step();
            prop_assert!(step > prev);
            prev = step;
        }
        prop_assert_eq!(progress.global_step, start + count as u64);
    }

    #[test]
    fn progress_serde_round_trip(
        last_epoch in 0usize..10_000,
        global_step in 0u64..1_000_000_000
    ) {
        let progress = TrainProgress { last_epoch, global_step };
        let json = serde_json::to_string(&progress).unwrap();
        let back: TrainProgress = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(back, progress);
    }

    #[test]
    fn psnr_is_symmetric(a in 0.0f32..1.0, b in 0.0f32..1.0) {
        let x = Array4::from_elem((1, 1, 2, 2), a);
        let y = Array4::from_elem((1, 1, 2, 2), b);
        prop_assert_eq!(calc_psnr(&x, &y), calc_psnr(&y, &x));
    }
}
