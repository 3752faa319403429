use crate::error::{BridgeError, Result};

/// Result of placing a raw counter value on the extended timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unwrapped {
    /// `rollover_size * rollover + raw`.
    pub index: i64,
    /// Cycle the value was attributed to. `-1` for a late packet that
    /// belongs before the first observed cycle.
    pub rollover: i64,
}

/// Extends a wrapping counter (RTP sequence number or timestamp) into a
/// 64-bit index by counting rollovers.
///
/// Reordering is tolerated within half the counter range: a value that is
/// far *ahead* of the highest value while early in a cycle is a late
/// packet from the previous cycle, and a value far *behind* it while late
/// in a cycle is the start of the next one.
///
/// One context per counter per stream. Not synchronized; `&mut self`
/// keeps each instance on a single thread at a time.
#[derive(Debug, Clone)]
pub struct RolloverContext {
    bits: u32,
    rollover_size: u64,
    half: u64,
    rollover_counter: u32,
    highest_value: Option<u64>,
}

impl RolloverContext {
    /// Create a context for a counter `bits` wide.
    ///
    /// Fails with [`BridgeError::InvalidCounterWidth`] outside `2..=32`.
    pub fn new(bits: u32) -> Result<Self> {
        if !(2..=32).contains(&bits) {
            return Err(BridgeError::InvalidCounterWidth(bits));
        }
        Ok(Self::with_valid_width(bits))
    }

    /// Context for 16-bit RTP sequence numbers.
    pub fn for_sequence_numbers() -> Self {
        Self::with_valid_width(16)
    }

    /// Context for 32-bit RTP timestamps.
    pub fn for_timestamps() -> Self {
        Self::with_valid_width(32)
    }

    fn with_valid_width(bits: u32) -> Self {
        let rollover_size = 1u64 << bits;
        Self {
            bits,
            rollover_size,
            half: rollover_size / 2,
            rollover_counter: 0,
            highest_value: None,
        }
    }

    /// Counter width in bits.
    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Number of forward wraps observed so far (mod 2^32).
    pub fn rollover_count(&self) -> u32 {
        self.rollover_counter
    }

    /// Most recently accepted value in the forward sense, if any.
    pub fn highest_value(&self) -> Option<u64> {
        self.highest_value
    }

    /// Place `raw` on the extended timeline, updating the rollover state.
    ///
    /// Bits of `raw` above the counter width are ignored.
    pub fn get_index(&mut self, raw: u64) -> Unwrapped {
        let raw = raw & (self.rollover_size - 1);

        let Some(highest) = self.highest_value else {
            self.highest_value = Some(raw);
            self.rollover_counter = 0;
            return Unwrapped {
                index: raw as i64,
                rollover: 0,
            };
        };

        let current = i64::from(self.rollover_counter);
        let rollover = if highest < self.half {
            if raw > highest && raw - highest > self.half {
                current - 1
            } else {
                self.highest_value = Some(highest.max(raw));
                current
            }
        } else if highest - self.half >= raw {
            self.rollover_counter = self.rollover_counter.wrapping_add(1);
            self.highest_value = Some(raw);
            tracing::trace!(
                bits = self.bits,
                rollovers = self.rollover_counter,
                "counter rolled over"
            );
            i64::from(self.rollover_counter)
        } else {
            self.highest_value = Some(highest.max(raw));
            current
        };

        Unwrapped {
            index: (self.rollover_size as i64)
                .wrapping_mul(rollover)
                .wrapping_add(raw as i64),
            rollover,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_narrow_and_wide_counters() {
        assert!(matches!(
            RolloverContext::new(1),
            Err(BridgeError::InvalidCounterWidth(1))
        ));
        assert!(matches!(
            RolloverContext::new(33),
            Err(BridgeError::InvalidCounterWidth(33))
        ));
        assert!(RolloverContext::new(2).is_ok());
    }

    #[test]
    fn checked_width_matches_named_constructors() {
        let mut checked = RolloverContext::new(16).unwrap();
        let mut named = RolloverContext::for_sequence_numbers();
        assert_eq!(checked.bits(), named.bits());
        for raw in [65_000u64, 65_535, 3, 65_534, 40_000] {
            assert_eq!(checked.get_index(raw), named.get_index(raw));
        }
        assert_eq!(RolloverContext::new(32).unwrap().bits(), 32);
    }

    #[test]
    fn first_value_taken_as_is() {
        let mut ctx = RolloverContext::for_sequence_numbers();
        let u = ctx.get_index(1234);
        assert_eq!(u, Unwrapped { index: 1234, rollover: 0 });
        assert_eq!(ctx.highest_value(), Some(1234));
    }

    #[test]
    fn sequence_wrap_counts_once() {
        let mut ctx = RolloverContext::for_sequence_numbers();
        let raw = [65530u64, 65531, 65532, 65533, 65534, 65535, 0, 1, 2];
        let indices: Vec<i64> = raw.iter().map(|&r| ctx.get_index(r).index).collect();
        assert_eq!(indices, (65530..=65538).collect::<Vec<i64>>());
        assert_eq!(ctx.rollover_count(), 1);
    }

    #[test]
    fn late_packet_after_wrap_is_not_a_rollover() {
        let mut ctx = RolloverContext::for_sequence_numbers();
        ctx.get_index(65533);
        ctx.get_index(65535);
        assert_eq!(ctx.get_index(0).index, 65536);

        let late = ctx.get_index(65534);
        assert_eq!(late, Unwrapped { index: 65534, rollover: 0 });
        assert_eq!(ctx.rollover_count(), 1);
        assert_eq!(ctx.highest_value(), Some(0));

        assert_eq!(ctx.get_index(1).index, 65537);
    }

    #[test]
    fn late_packet_before_first_cycle_goes_negative() {
        let mut ctx = RolloverContext::for_sequence_numbers();
        ctx.get_index(2);
        let late = ctx.get_index(65535);
        assert_eq!(late.rollover, -1);
        assert_eq!(late.index, -1);
    }

    #[test]
    fn monotonic_without_wrap_is_identity() {
        let mut ctx = RolloverContext::for_sequence_numbers();
        for raw in (0..65535u64).step_by(97) {
            assert_eq!(ctx.get_index(raw).index, raw as i64);
        }
        assert_eq!(ctx.rollover_count(), 0);
    }

    #[test]
    fn small_reorder_within_cycle_keeps_highest() {
        let mut ctx = RolloverContext::for_sequence_numbers();
        ctx.get_index(100);
        ctx.get_index(105);
        assert_eq!(ctx.get_index(103).index, 103);
        assert_eq!(ctx.highest_value(), Some(105));
    }

    #[test]
    fn timestamp_full_wrap() {
        let mut ctx = RolloverContext::for_timestamps();
        assert_eq!(ctx.get_index(0xFFFF_FFFF).index, 0xFFFF_FFFF);
        let u = ctx.get_index(0x0000_0001);
        assert_eq!(ctx.rollover_count(), 1);
        assert_eq!(u.rollover, 1);
        assert_eq!(u.index, 0x1_0000_0001);
    }

    #[test]
    fn repeated_wraps_on_narrow_counter() {
        let mut ctx = RolloverContext::new(4).unwrap();
        let mut last = -1;
        for step in 0..64u64 {
            let u = ctx.get_index(step % 16);
            assert_eq!(u.index, step as i64);
            assert!(u.index > last);
            last = u.index;
        }
        assert_eq!(ctx.rollover_count(), 3);
    }

    #[test]
    fn raw_bits_above_width_are_masked() {
        let mut ctx = RolloverContext::for_sequence_numbers();
        assert_eq!(ctx.get_index(0x1_0005).index, 5);
    }
}
