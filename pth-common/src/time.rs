/// Maximum duration (ms) considered valid for timers and prediction
/// heuristics. The housekeeping tick marks timers running longer than this
/// as maxed out; durations beyond it are indistinguishable.
///
/// Must stay in sync with the value used when training the predictors and
/// must be < 32,767 because the 16-bit timers wrap.
pub const MS_MAX_DUR: u16 = 4096;

/// Modular 16-bit difference between two timestamps of a free-running
/// millisecond counter.
pub const fn dur16(now: u16, then: u16) -> u16 {
    now.wrapping_sub(then)
}

/// [dur16] saturated to [MS_MAX_DUR] once the owning timer has been marked
/// as maxed out by the housekeeping tick.
pub const fn clamped_dur(now: u16, then: u16, maxed: bool) -> u16 {
    if maxed {
        MS_MAX_DUR
    } else {
        dur16(now, then)
    }
}

#[cfg(test)]
#[path = "time_test.rs"]
mod test;
