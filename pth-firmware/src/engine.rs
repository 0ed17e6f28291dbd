//! The tap-hold decision engine.
//!
//! Every matrix event runs through [Engine::process_record]; the firmware
//! main loop calls [Engine::tick] between scans. The engine classifies the
//! active tap-hold key as tap or hold from the typing context, consulting
//! the data-driven predictors only where the context alone does not
//! decide, and replays deferred events so the host sees them in the order
//! the user produced them.

use embassy_time::Instant;

use pth_common::keycodes::{self, key_range::KC_NO};
use pth_common::math::weighted_avg;
use pth_common::side;
use pth_common::time::{clamped_dur, dur16, MS_MAX_DUR};

use crate::hid::HidSink;
use crate::keymap::Keymap;
use crate::policy::{Ctx, Policy};
use crate::predict::Snapshot;
use crate::record::{KeyPos, KeyRecord};

use release_cache::{Phase, ReleaseCache};
use tap_release::TapReleaseSet;
use timing::TimingTracker;

pub(crate) mod release_cache;
pub(crate) mod tap_release;
pub(crate) mod timing;

/// Guardrails for the predicted minimum overlap. Chosen from the training
/// data: almost all mod-first overlaps are longer than the lower bound and
/// shorter than the upper one. Values must match those used in training.
pub const MIN_OVERLAP_MS: u16 = 39;
pub const MAX_OVERLAP_MS: u16 = 232;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Status {
    #[default]
    Idle,
    Pressed,
    SecondPressed,
    DecidedTap,
    DecidedHold,
}

impl Status {
    pub fn is_decided(self) -> bool {
        self >= Status::DecidedTap
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Decision {
    Tap,
    Hold,
}

/// The key under decision.
struct PthKey {
    keycode: u16,
    record: KeyRecord,
    press_timer: u16,
    press_timer_maxed: bool,
    atomic_side: u8,
    user_bits: u8,
    was_held_instantly: bool,
    /// Registered instead of the hold action when hold is chosen; `KC_NO`
    /// keeps the native hold.
    alt_tap_code: u16,
}

impl Default for PthKey {
    fn default() -> Self {
        Self {
            keycode: KC_NO,
            record: KeyRecord::none(),
            press_timer: 0,
            press_timer_maxed: false,
            atomic_side: 0,
            user_bits: 0,
            was_held_instantly: false,
            alt_tap_code: KC_NO,
        }
    }
}

/// The first key pressed while a tap-hold decision is pending.
struct SecondKey {
    present: bool,
    keycode: u16,
    record: KeyRecord,
    press_timer: u16,
    press_timer_maxed: bool,
    is_tap_hold: bool,
    same_side: bool,
    was_held_instantly: bool,
    to_be_released: bool,
}

impl Default for SecondKey {
    fn default() -> Self {
        Self {
            present: false,
            keycode: KC_NO,
            record: KeyRecord::none(),
            press_timer: 0,
            press_timer_maxed: false,
            is_tap_hold: false,
            same_side: false,
            was_held_instantly: false,
            to_be_released: false,
        }
    }
}

pub struct Engine<H: HidSink, K: Keymap, P: Policy> {
    hid: H,
    keymap: K,
    policy: P,

    status: Status,
    prev_status: Status,
    pth: PthKey,
    second: SecondKey,

    instant_layer_active: bool,
    layer_before_instant_layer_tap: u8,

    forced_choice_timeout: i16,
    forced_choice_done: bool,
    min_overlap_for_hold: u16,

    snap: Snapshot,
    timing: TimingTracker,
    cache: ReleaseCache,
    tap_releases: TapReleaseSet,
}

fn now_ms() -> u16 {
    Instant::now().as_millis() as u16
}

impl<H: HidSink, K: Keymap, P: Policy> Engine<H, K, P> {
    pub fn new(hid: H, keymap: K, policy: P) -> Self {
        Self {
            hid,
            keymap,
            policy,
            status: Status::Idle,
            prev_status: Status::Idle,
            pth: PthKey::default(),
            second: SecondKey::default(),
            instant_layer_active: false,
            layer_before_instant_layer_tap: 0,
            forced_choice_timeout: 0,
            forced_choice_done: false,
            min_overlap_for_hold: 0,
            snap: Snapshot::default(),
            timing: TimingTracker::new(now_ms()),
            cache: ReleaseCache::new(),
            tap_releases: TapReleaseSet::new(),
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn prev_status(&self) -> Status {
        self.prev_status
    }

    /// Handles one matrix event. Returns true to let the downstream key
    /// processing continue normally; false when the event was consumed
    /// here (or deferred for later replay).
    pub fn process_record(&mut self, keycode: u16, record: &mut KeyRecord) -> bool {
        if !record.event.is_matrix_event() {
            return true;
        }
        if keycodes::is_tap_dance(keycode) {
            return true;
        }
        if self.policy.per_key_tapping_term(keycode, record) != 0 {
            return true;
        }

        let pressed = record.event.pressed;
        let now = record.event.time;
        let pos = record.event.key;

        // Collected even for events whose report is deferred or reordered:
        // the predictors were trained on the real keystroke timing.
        self.timing.on_event(pressed, now);

        if pressed {
            self.timing.record_press_keycode(keycode);
        } else if self.tap_releases.remove(pos) {
            if matches!(self.status, Status::Pressed | Status::SecondPressed) {
                // The release gets cached below; the cached copy must
                // release the tap part, not the hold part.
                record.tap.set_tap();
            } else {
                record.tap.set_tap();
                self.emit_release(*record);
                return false;
            }
        }

        let is_tap_hold = keycodes::is_tap_hold(keycode);

        match self.status {
            Status::Idle => {
                if pressed && is_tap_hold {
                    return self.on_pth_press(keycode, record, now);
                }
            }
            Status::Pressed => return self.while_pressed(record, is_tap_hold, keycode, now),
            Status::SecondPressed => {
                return self.while_second_pressed(record, is_tap_hold, keycode, now)
            }
            Status::DecidedTap => {
                if pressed {
                    if is_tap_hold {
                        self.tap_releases.insert(pos);
                        record.tap.set_tap();
                        self.emit_press(*record);
                        return false;
                    }
                } else if pos == self.pth.record.event.key {
                    // The tap may have been sent this very scan; give the
                    // host time to accept it.
                    self.hid.send_and_wait();
                    self.pth.record.tap.set_tap();
                    self.emit_release(self.pth.record);
                    self.reset();
                    return false;
                }
            }
            Status::DecidedHold => {
                if pressed {
                    if is_tap_hold {
                        let cx = self.ctx();
                        if self.is_same_side_as_pth(pos)
                            && self.policy.register_as_hold_when_same_side(keycode, record, &cx)
                        {
                            record.tap.set_hold();
                            self.emit_press(*record);
                        } else {
                            self.tap_releases.insert(pos);
                            record.tap.set_tap();
                            self.emit_press(*record);
                        }
                        return false;
                    }
                } else if pos == self.pth.record.event.key {
                    self.unregister_pth_hold();
                    self.reset();
                    return false;
                }
            }
        }

        if !pressed && !self.second.was_held_instantly && pos == self.second.record.event.key {
            // The second's press may have been registered only moments ago
            // during the commit; keep its tap long enough for the host.
            self.hid.send_and_wait();
        }

        true
    }

    /// Housekeeping between scans: saturates timers, fires the predicted
    /// minimum overlap and the forced-choice timeout.
    pub fn tick(&mut self) {
        let now = now_ms();
        self.timing.tick(now);

        if self.status == Status::Idle || self.status.is_decided() {
            return;
        }

        if self.status == Status::SecondPressed && !self.second.press_timer_maxed {
            if self.min_overlap_for_hold > 0
                && dur16(now, self.second.press_timer) >= self.min_overlap_for_hold
            {
                crate::debug!("overlap long enough, choosing hold");
                self.commit_hold();
                return;
            } else if dur16(now, self.second.press_timer) >= MS_MAX_DUR {
                self.second.press_timer_maxed = true;
            }
        }

        if !self.pth.press_timer_maxed {
            if dur16(now, self.pth.press_timer) >= MS_MAX_DUR {
                self.pth.press_timer_maxed = true;
            } else if !self.forced_choice_done
                && self.forced_choice_timeout > 0
                && dur16(now, self.pth.press_timer) >= self.forced_choice_timeout as u16
            {
                self.force_choice();
            }
        }
    }

    // -- Transitions ------------------------------------------------------

    fn on_pth_press(&mut self, keycode: u16, record: &mut KeyRecord, now: u16) -> bool {
        self.status = Status::Pressed;
        self.pth.keycode = keycode;
        self.pth.record = *record;
        self.pth.press_timer = now;

        let side = self.keymap.side_of(record.event.key);
        self.pth.user_bits = side::user_bits(side);
        self.pth.atomic_side = side::pth_atom(side);

        let (pp_p2p, p_p2p, pp_ov, p_ov) = self.timing.history_at_pth_press(now);
        self.snap = Snapshot {
            prev_prev_press_to_prev_press: pp_p2p,
            prev_press_to_pth_press: p_p2p,
            prev_prev_overlap: pp_ov,
            prev_overlap: p_ov,
            press_to_press_w_avg: weighted_avg(pp_p2p as f32, p_p2p as f32),
            overlap_w_avg: weighted_avg(pp_ov as f32, p_ov as f32),
            release_to_pth_press: self.timing.release_to_press_dur(now),
            ..Snapshot::default()
        };

        let cx = self.ctx();
        self.pth.alt_tap_code = self.policy.code_instead_of_hold(&cx);
        self.forced_choice_timeout = self.policy.timeout_for_forcing_choice(&cx);

        if self.forced_choice_timeout == 0 {
            self.force_choice();
            if self.status.is_decided() {
                return false;
            }
        }

        #[cfg(feature = "fast-streak-tap")]
        {
            let cx = self.ctx();
            if self.policy.predict_fast_streak_tap(&cx) {
                crate::debug!("fast streak, choosing tap");
                #[cfg(feature = "fast-streak-tap-reset-immediately")]
                {
                    self.pth.record.tap.set_tap();
                    self.emit_press(self.pth.record);
                    self.tap_releases.insert(self.pth.record.event.key);
                    self.reset();
                }
                #[cfg(not(feature = "fast-streak-tap-reset-immediately"))]
                self.commit_tap();
                return false;
            }
        }

        let cx = self.ctx();
        self.pth.was_held_instantly = self.pth.alt_tap_code == KC_NO
            && self.policy.should_hold_instantly(keycode, record, &cx);
        if self.pth.was_held_instantly {
            if keycodes::is_layer_tap(keycode) {
                self.instant_layer_active = true;
                self.layer_before_instant_layer_tap =
                    self.keymap.current_layer_for(record.event.key);
            }
            crate::debug!("instantly holding");
            self.pth.record.tap.set_hold();
            self.emit_press(self.pth.record);
        }

        false
    }

    fn while_pressed(
        &mut self,
        record: &mut KeyRecord,
        is_tap_hold: bool,
        keycode: u16,
        now: u16,
    ) -> bool {
        if record.event.pressed {
            self.status = Status::SecondPressed;
            self.second.present = true;
            self.second.press_timer = now;
            self.second.keycode = keycode;
            self.second.record = *record;
            self.second.is_tap_hold = is_tap_hold;
            self.second.same_side = self.is_same_side_as_pth(record.event.key);

            self.snap.pth_to_second_press =
                clamped_dur(now, self.pth.press_timer, self.pth.press_timer_maxed);

            if self.pth.was_held_instantly
                && self.instant_layer_active
                && self.second.keycode == KC_NO
            {
                // The instant layer mapped this position to nothing; that
                // only makes sense if the user wanted the tap part.
                self.commit_tap();
                self.maybe_reset_after_tap();
                return false;
            }

            // The overlap prediction is also used for same-side tap-hold
            // seconds; it is trained on far more data than the third-press
            // tree.
            if self.second.is_tap_hold || !self.second.same_side {
                let cx = self.ctx();
                let predicted = self.policy.predict_min_overlap_for_hold(&cx);
                self.min_overlap_for_hold = predicted.clamp(MIN_OVERLAP_MS, MAX_OVERLAP_MS);
            }

            if !self.second.same_side {
                return false;
            }

            let cx = self.ctx();
            if self.policy.choose_tap_when_second_is_same_side_press(&cx) {
                self.commit_tap();
                self.maybe_reset_after_tap();
                return false;
            }

            if self.second.is_tap_hold {
                let cx = self.ctx();
                if self.policy.second_should_hold_instantly(keycode, record, &cx) {
                    if !self.instant_layer_active && keycodes::is_layer_tap(keycode) {
                        self.layer_before_instant_layer_tap =
                            self.keymap.current_layer_for(record.event.key);
                        self.instant_layer_active = true;
                    }
                    crate::debug!("instantly holding second");
                    self.second.was_held_instantly = true;
                    self.second.record.tap.set_hold();
                    self.emit_press(self.second.record);
                }
            }
            false
        } else {
            if record.event.key == self.pth.record.event.key {
                // Released with nothing in between: a plain tap.
                self.commit_tap();
                self.hid.send_and_wait();
                self.pth.record.tap.set_tap();
                self.emit_release(self.pth.record);
                self.reset();
                return false;
            }

            if !self.cache.push(record, Phase::BeforeSecond) {
                crate::warn!("release cache full, releasing out of order");
                self.hid.process(record);
            }
            false
        }
    }

    fn while_second_pressed(
        &mut self,
        record: &mut KeyRecord,
        is_tap_hold: bool,
        keycode: u16,
        now: u16,
    ) -> bool {
        if record.event.pressed {
            // A third key forces the decision now. The third-press tree is
            // consulted even when a minimum overlap was predicted; it was
            // trained specifically for this situation.
            self.snap.second_to_third_press =
                clamped_dur(now, self.second.press_timer, self.second.press_timer_maxed);

            let cx = self.ctx();
            let hold = self.policy.predict_hold_when_third_press(&cx);

            let mut keycode = keycode;
            let mut third_is_tap_hold = is_tap_hold;
            if hold {
                self.commit_hold();
            } else {
                self.commit_tap();
                if self.instant_layer_active {
                    // Captured under the instant layer; that layer is gone
                    // now that tap was chosen.
                    keycode = self
                        .keymap
                        .keycode_at(self.layer_before_instant_layer_tap, record.event.key);
                    third_is_tap_hold = keycodes::is_tap_hold(keycode);
                }
            }

            if third_is_tap_hold {
                let cx = self.ctx();
                if hold
                    && self.is_same_side_as_pth(record.event.key)
                    && self.policy.register_as_hold_when_same_side(keycode, record, &cx)
                {
                    record.tap.set_hold();
                    self.emit_press(*record);
                } else {
                    self.tap_releases.insert(record.event.key);
                    record.tap.set_tap();
                    self.emit_press(*record);
                }
            } else {
                // Registering the other keys above took time; forward with
                // a fresh timestamp.
                self.emit(*record);
            }

            if !hold {
                self.maybe_reset_after_tap();
            }
            false
        } else {
            if record.event.key == self.pth.record.event.key {
                let hold = if self.second.same_side {
                    false
                } else {
                    let cx = self.ctx();
                    if self.second.to_be_released {
                        self.policy.predict_hold_when_pth_release_after_second_release(&cx)
                    } else {
                        self.policy.predict_hold_when_pth_release_after_second_press(&cx)
                    }
                };

                if hold {
                    self.commit_hold();
                    self.unregister_pth_hold();
                } else {
                    self.commit_tap();
                    self.hid.send_and_wait();
                    self.pth.record.tap.set_tap();
                    self.emit_release(self.pth.record);
                }

                // The key is up; nothing further may be influenced by it.
                self.reset();
                return false;
            }

            if record.event.key == self.second.record.event.key {
                // Not reached when the second is released after a third
                // press; by then the decision is made and the default
                // logic or the release cache handles it.
                self.second.to_be_released = true;

                if self.second.same_side {
                    let cx = self.ctx();
                    if self.policy.choose_tap_when_second_is_same_side_release(&cx) {
                        // A same-side release before any third press is
                        // almost certainly a roll.
                        self.commit_tap();
                        self.maybe_reset_after_tap();
                        return false;
                    }
                }

                self.snap.pth_to_second_release =
                    clamped_dur(now, self.pth.press_timer, self.pth.press_timer_maxed);
                self.snap.second_dur =
                    clamped_dur(now, self.second.press_timer, self.second.press_timer_maxed);
                return false;
            }

            if !self.cache.push(record, Phase::AfterSecond) {
                crate::warn!("release cache full, releasing out of order");
                self.hid.process(record);
            }
            false
        }
    }

    // -- Decisions --------------------------------------------------------

    fn commit_tap(&mut self) {
        if self.status.is_decided() {
            return;
        }
        crate::debug!("tap chosen");
        self.status = Status::DecidedTap;

        if self.needs_neutralizing(self.pth.keycode, self.pth.was_held_instantly)
            || self.needs_neutralizing(self.second.keycode, self.second.was_held_instantly)
        {
            // Defeat lone-modifier semantics of the provisional hold.
            let key = self.policy.mod_suppression_key();
            self.hid.tap_code(key);
        }

        if self.pth.was_held_instantly {
            if keycodes::is_layer_tap(self.pth.keycode) && self.second.present {
                // The second was captured under the instant layer.
                self.second.keycode = self
                    .keymap
                    .keycode_at(self.layer_before_instant_layer_tap, self.second.record.event.key);
                self.second.is_tap_hold = keycodes::is_tap_hold(self.second.keycode);
            }
            self.pth.record.tap.set_hold();
            self.emit_release(self.pth.record);
        }
        if self.second.was_held_instantly {
            self.second.record.tap.set_hold();
            self.emit_release(self.second.record);
        }

        self.pth.record.tap.set_tap();
        self.emit_press(self.pth.record);
        self.flush_releases(Phase::BeforeSecond, true);

        if !self.second.present {
            return;
        }

        if self.second.is_tap_hold {
            if !self.second.to_be_released {
                // Still down when the state resets; its release must come
                // out as a tap release.
                self.tap_releases.insert(self.second.record.event.key);
            }
            self.second.record.tap.set_tap();
        }
        self.emit_press(self.second.record);
        let waited = self.flush_releases(Phase::AfterSecond, true);

        if self.second.to_be_released {
            if !waited {
                self.hid.send_and_wait();
            }
            self.emit_release(self.second.record);
        }
    }

    fn commit_hold(&mut self) {
        if self.status.is_decided() {
            return;
        }
        crate::debug!("hold chosen");
        self.status = Status::DecidedHold;

        if !self.pth.was_held_instantly {
            self.register_pth_hold();
        }
        self.flush_releases(Phase::BeforeSecond, !self.pth.was_held_instantly);

        if !self.second.present {
            return;
        }

        if !self.second.was_held_instantly {
            if self.second.is_tap_hold {
                let cx = self.ctx();
                if self.second.same_side
                    && self.policy.register_as_hold_when_same_side(
                        self.second.keycode,
                        &self.second.record,
                        &cx,
                    )
                {
                    // Same-side tap-hold becomes a hold too, so several
                    // holds can stack on one hand; applied even if the
                    // second was already released, for consistency.
                    self.second.record.tap.set_hold();
                } else {
                    if !self.second.to_be_released {
                        self.tap_releases.insert(self.second.record.event.key);
                    }
                    self.second.record.tap.set_tap();
                }
            }
            self.emit_press(self.second.record);
        }

        let waited = self.flush_releases(Phase::AfterSecond, !self.second.was_held_instantly);

        if self.second.to_be_released {
            if !waited {
                self.hid.send_and_wait();
            }
            self.emit_release(self.second.record);
        }
    }

    fn force_choice(&mut self) {
        self.forced_choice_done = true;
        let cx = self.ctx();
        match self.policy.forced_choice_after_timeout(&cx) {
            Some(Decision::Hold) => {
                crate::debug!("pressed long enough, choosing hold");
                self.commit_hold();
            }
            Some(Decision::Tap) => {
                crate::debug!("pressed long enough, choosing tap");
                self.commit_tap();
                self.maybe_reset_after_tap();
            }
            None => {}
        }
    }

    /// Registers the hold outcome of the key under decision. Only called
    /// when it was not already held instantly.
    fn register_pth_hold(&mut self) {
        if self.pth.alt_tap_code == KC_NO {
            self.pth.record.tap.set_hold();
            self.emit_press(self.pth.record);

            // A not-instantly-held second stays registered under the layer
            // it was captured on; only its keycode bookkeeping is brought
            // up to date with the layer this hold just activated. Pressing
            // an MT and an LT of the same layer thus works in any order.
            if self.second.present
                && !self.second.was_held_instantly
                && keycodes::is_layer_tap(self.pth.keycode)
            {
                let layer = keycodes::layer_of_layer_tap(self.pth.keycode);
                self.second.keycode = self.keymap.keycode_at(layer, self.second.record.event.key);
                self.second.is_tap_hold = keycodes::is_tap_hold(self.second.keycode);
            }
        } else {
            self.hid.register_code(self.pth.alt_tap_code);
        }
    }

    fn unregister_pth_hold(&mut self) {
        if self.pth.alt_tap_code == KC_NO {
            self.pth.record.tap.set_hold();
            self.emit_release(self.pth.record);
        } else {
            self.hid.unregister_code(self.pth.alt_tap_code);
        }
    }

    fn maybe_reset_after_tap(&mut self) {
        #[cfg(feature = "reset-immediately-when-tap-chosen")]
        {
            self.tap_releases.insert(self.pth.record.event.key);
            self.reset();
        }
    }

    fn reset(&mut self) {
        self.prev_status = self.status;
        self.status = Status::Idle;
        self.pth = PthKey::default();
        self.second = SecondKey::default();
        self.instant_layer_active = false;
        self.layer_before_instant_layer_tap = 0;
        self.forced_choice_done = false;
        self.min_overlap_for_hold = 0;
    }

    // -- Helpers ----------------------------------------------------------

    fn ctx(&self) -> Ctx {
        let mut snapshot = self.snap;
        snapshot.down_count = self.timing.down_count();
        snapshot.second_released = self.second.to_be_released;
        Ctx {
            snapshot,
            status: self.status,
            prev_status: self.prev_status,
            pth_keycode: self.pth.keycode,
            pth_user_bits: self.pth.user_bits,
            has_second: self.second.present,
            second_keycode: self.second.keycode,
            second_is_tap_hold: self.second.is_tap_hold,
            second_same_side: self.second.same_side,
            prev_press_keycode: self.timing.prev_press_keycode(),
            mods: self.keymap.active_mods(),
            caps_word: self.keymap.caps_word_active(),
        }
    }

    fn is_same_side_as_pth(&self, pos: KeyPos) -> bool {
        let other = side::other_atom(self.keymap.side_of(pos));
        side::is_same_side(self.pth.atomic_side, other)
    }

    fn needs_neutralizing(&self, keycode: u16, was_held_instantly: bool) -> bool {
        was_held_instantly
            && keycodes::is_mod_tap(keycode)
            && self
                .policy
                .should_neutralize_mods(keycodes::mods_5_bit_of(keycode))
    }

    /// Replays the cached releases of one partition in insertion order.
    /// With `wait_before_first` a guard wait precedes the first replay, so
    /// a register emitted just before is not glued to a release. Returns
    /// true when no further guard is needed after the flush.
    fn flush_releases(&mut self, phase: Phase, wait_before_first: bool) -> bool {
        let mask = self.cache.take(phase);
        if mask == 0 {
            return false;
        }

        let mut waited = !wait_before_first;
        let mut bits = mask;
        while bits != 0 {
            let slot = bits.trailing_zeros() as usize;
            if !waited {
                self.hid.send_and_wait();
                waited = true;
            }
            self.emit(self.cache.record(slot));
            bits &= bits - 1;
        }
        true
    }

    fn emit(&mut self, mut record: KeyRecord) {
        record.event.time = now_ms();
        self.hid.process(&record);
    }

    fn emit_press(&mut self, mut record: KeyRecord) {
        record.event.pressed = true;
        self.emit(record);
    }

    fn emit_release(&mut self, mut record: KeyRecord) {
        record.event.pressed = false;
        self.emit(record);
    }
}

#[cfg(test)]
#[path = "engine_test.rs"]
mod test;
