//! Rolling press-to-press and overlap statistics.
//!
//! Updated for every real matrix event, whether or not a tap-hold decision
//! is pending, because the predictors were trained on the durations of the
//! physical keystrokes, not on what was reported to the host.

use pth_common::keycodes::key_range::KC_NO;
use pth_common::time::{clamped_dur, dur16, MS_MAX_DUR};

pub(crate) struct TimingTracker {
    down_count: u8,
    prev_press_keycode: u16,
    cur_press_keycode: u16,
    press_to_press_timer: u16,
    press_to_press_maxed: bool,
    overlap_timer: u16,
    overlap_maxed: bool,
    release_timer: u16,
    release_maxed: bool,
    prev_press_to_press: i16,
    cur_press_to_press: i16,
    prev_overlap: i16,
    cur_overlap: i16,
}

impl TimingTracker {
    /// Seeds the timers in the past so the first predictions see saturated
    /// durations instead of garbage.
    pub(crate) fn new(now: u16) -> Self {
        Self {
            down_count: 0,
            prev_press_keycode: KC_NO,
            cur_press_keycode: KC_NO,
            press_to_press_timer: now.wrapping_sub(MS_MAX_DUR),
            press_to_press_maxed: false,
            overlap_timer: now,
            overlap_maxed: false,
            release_timer: now.wrapping_sub(MS_MAX_DUR - 100),
            release_maxed: false,
            prev_press_to_press: -1,
            cur_press_to_press: -1,
            prev_overlap: -1,
            cur_overlap: -1,
        }
    }

    pub(crate) fn on_event(&mut self, pressed: bool, now: u16) {
        if pressed {
            let dur = clamped_dur(now, self.press_to_press_timer, self.press_to_press_maxed);
            self.prev_press_to_press = self.cur_press_to_press;
            self.cur_press_to_press = dur as i16;
            self.press_to_press_timer = now;
            self.press_to_press_maxed = false;

            self.down_count += 1;
            if self.down_count == 2 {
                self.overlap_timer = now;
                self.overlap_maxed = false;
            }
        } else {
            let overlap = if self.down_count >= 2 {
                clamped_dur(now, self.overlap_timer, self.overlap_maxed)
            } else {
                0
            };
            self.down_count = self.down_count.saturating_sub(1);
            self.prev_overlap = self.cur_overlap;
            self.cur_overlap = overlap as i16;

            // Restart so one overlap is never counted twice.
            self.overlap_timer = now;
            self.overlap_maxed = false;
            self.release_timer = now;
            self.release_maxed = false;
        }
    }

    pub(crate) fn record_press_keycode(&mut self, keycode: u16) {
        self.prev_press_keycode = self.cur_press_keycode;
        self.cur_press_keycode = keycode;
    }

    /// Press-to-press and overlap history as seen from a tap-hold press
    /// that [on_event](Self::on_event) already counted.
    ///
    /// The overlap pair is shifted for consistency with the training data:
    /// with one other key already down there is an overlap in flight but no
    /// finished sample, so the newest slot is zero; with two or more, the
    /// in-flight overlap up to now becomes the newest sample and the older
    /// slot is zeroed.
    pub(crate) fn history_at_pth_press(&self, now: u16) -> (i16, i16, i16, i16) {
        let mut prev_prev_overlap = self.prev_overlap;
        let mut prev_overlap = self.cur_overlap;

        let down_before_this = self.down_count - 1;
        if down_before_this == 1 {
            prev_prev_overlap = prev_overlap;
            prev_overlap = 0;
        } else if down_before_this >= 2 {
            prev_prev_overlap = 0;
            prev_overlap = clamped_dur(now, self.overlap_timer, self.overlap_maxed) as i16;
        }

        (
            self.prev_press_to_press,
            self.cur_press_to_press,
            prev_prev_overlap,
            prev_overlap,
        )
    }

    pub(crate) fn release_to_press_dur(&self, now: u16) -> u16 {
        clamped_dur(now, self.release_timer, self.release_maxed)
    }

    /// Saturate timers that have run past [MS_MAX_DUR]. Once maxed a timer
    /// stays maxed until restarted.
    pub(crate) fn tick(&mut self, now: u16) {
        if !self.release_maxed && dur16(now, self.release_timer) >= MS_MAX_DUR {
            self.release_maxed = true;
        }
        if !self.overlap_maxed
            && self.down_count >= 2
            && dur16(now, self.overlap_timer) >= MS_MAX_DUR
        {
            self.overlap_maxed = true;
        }
        if !self.press_to_press_maxed && dur16(now, self.press_to_press_timer) >= MS_MAX_DUR {
            self.press_to_press_maxed = true;
        }
    }

    pub(crate) fn down_count(&self) -> u8 {
        self.down_count
    }

    pub(crate) fn prev_press_keycode(&self) -> u16 {
        self.prev_press_keycode
    }
}
