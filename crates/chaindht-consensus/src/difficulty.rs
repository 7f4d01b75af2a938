//! Difficulty retargeting, run every [`chaindht_core::constants::RETARGET_INTERVAL`] blocks.

use num_bigint::BigUint;

use chaindht_core::constants::{BASE_TARGET, EXPECTED_10_BLOCKS_TIME};
use chaindht_core::hash::left_pad_32;
use chaindht_core::types::Target;

/// Recompute the chain target from the block that just triggered a
/// retarget and the block whose timestamp started the current 10-block
/// window.
///
/// `old_diff = base_target / block.target`; `time_passed` is clamped to a
/// minimum of 1 second to avoid a division by zero — the original source
/// guards this the same way rather than letting the ratio blow up, and that
/// guard is preserved here rather than "fixed" to some other clamp.
/// `new_diff = old_diff * (EXPECTED_10_BLOCKS_TIME / time_passed)`, clamped
/// to `[old_diff / 4, old_diff * 4]` and never below 1. The new target is
/// `base_target / new_diff`, left-padded back to 32 bytes.
pub fn retarget(block_target: &Target, block_timestamp: i64, window_start_timestamp: i64) -> Target {
    let base = BigUint::from_bytes_be(&BASE_TARGET);
    let actual = BigUint::from_bytes_be(block_target);

    if actual == BigUint::from(0u32) {
        return BASE_TARGET;
    }
    let old_diff = &base / &actual;

    let mut time_passed = block_timestamp - window_start_timestamp;
    if time_passed == 0 {
        time_passed = 1;
    }

    let ratio = if time_passed > 0 {
        (EXPECTED_10_BLOCKS_TIME / time_passed).max(0) as u64
    } else {
        0
    };

    let mut new_diff = &old_diff * ratio;

    let max_diff = &old_diff * 4u32;
    let min_diff = &old_diff / 4u32;
    if new_diff > max_diff {
        new_diff = max_diff;
    }
    if new_diff < min_diff {
        new_diff = min_diff;
    }
    if new_diff < BigUint::from(1u32) {
        new_diff = BigUint::from(1u32);
    }

    let new_target = &base / &new_diff;
    let bytes = new_target.to_bytes_be();
    left_pad_32(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retarget_with_exact_expected_time_is_a_no_op() {
        let target = retarget(&BASE_TARGET, EXPECTED_10_BLOCKS_TIME, 0);
        assert_eq!(target, BASE_TARGET);
    }

    #[test]
    fn retarget_faster_than_expected_tightens_target() {
        // Window finished in a quarter of the expected time: difficulty should
        // rise, i.e. the new target should be smaller (harder) than before.
        let fast_time = EXPECTED_10_BLOCKS_TIME / 4;
        let target = retarget(&BASE_TARGET, fast_time, 0);
        let base = BigUint::from_bytes_be(&BASE_TARGET);
        let new = BigUint::from_bytes_be(&target);
        assert!(new <= base);
    }

    #[test]
    fn retarget_slower_than_expected_loosens_target() {
        let slow_time = EXPECTED_10_BLOCKS_TIME * 8;
        let target = retarget(&BASE_TARGET, slow_time, 0);
        // Ratio truncates to 0 (600*8 time passed => 600/4800 = 0), so new_diff
        // is clamped to old_diff/4 per the minimum-diff clamp, loosening the
        // target relative to base.
        let base = BigUint::from_bytes_be(&BASE_TARGET);
        let new = BigUint::from_bytes_be(&target);
        assert!(new >= base);
    }

    #[test]
    fn retarget_zero_time_passed_does_not_panic() {
        // time_passed == 0 is guarded up to 1 rather than dividing by zero.
        let target = retarget(&BASE_TARGET, 0, 0);
        assert_ne!(target, [0u8; 32]);
    }

    #[test]
    fn retarget_clamps_growth_to_four_x() {
        // An extremely fast window (time_passed -> huge ratio) is clamped to
        // at most 4x the old difficulty, not an unbounded jump.
        let fast_time = 1;
        let target = retarget(&BASE_TARGET, fast_time, 0);
        let base = BigUint::from_bytes_be(&BASE_TARGET);
        let old_diff = BigUint::from(1u32); // base/base at genesis
        let new = BigUint::from_bytes_be(&target);
        let min_allowed_target = &base / (&old_diff * 4u32);
        assert!(new >= min_allowed_target);
    }

    #[test]
    fn retarget_never_drops_below_minimum_difficulty_of_one() {
        // Degenerate actual target equal to base means old_diff == 1; the
        // floor keeps new_diff >= 1 so the resulting target never exceeds base.
        let target = retarget(&BASE_TARGET, EXPECTED_10_BLOCKS_TIME * 1000, 0);
        let base = BigUint::from_bytes_be(&BASE_TARGET);
        let new = BigUint::from_bytes_be(&target);
        assert!(new <= base * 4u32);
    }

    #[test]
    fn retarget_zero_actual_target_falls_back_to_base() {
        let target = retarget(&[0u8; 32], 100, 0);
        assert_eq!(target, BASE_TARGET);
    }
}
