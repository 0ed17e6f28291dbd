//! The tuning surface of the engine.
//!
//! The original firmware exposed these decision points as weakly-bound
//! functions that a keymap could override one by one. Here they are default
//! methods on [Policy]; an implementation overrides only what it cares
//! about and inherits the rest.

use pth_common::keycodes::{self, kc, key_range::KC_NO, mods};
use pth_common::side;

use crate::engine::{Decision, Status};
use crate::predict::{self, Snapshot};
use crate::record::KeyRecord;

/// State a policy hook may consult. Captured by the engine at the call
/// site; the snapshot's live fields (`down_count`, second durations) are
/// current as of the triggering event.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Ctx {
    pub snapshot: Snapshot,
    pub status: Status,
    pub prev_status: Status,
    pub pth_keycode: u16,
    pub pth_user_bits: u8,
    pub has_second: bool,
    pub second_keycode: u16,
    pub second_is_tap_hold: bool,
    pub second_same_side: bool,
    pub prev_press_keycode: u16,
    /// Active 8-bit modifier mask, one-shot mods included.
    pub mods: u8,
    pub caps_word: bool,
}

pub trait Policy {
    /// Whether the tap-hold key should be provisionally held the moment it
    /// is pressed. Reverted if the final decision is tap.
    fn should_hold_instantly(&self, keycode: u16, record: &KeyRecord, cx: &Ctx) -> bool {
        default_should_hold_instantly(keycode, record, cx)
    }

    /// Same question for the second key of a sequence.
    fn second_should_hold_instantly(&self, keycode: u16, record: &KeyRecord, cx: &Ctx) -> bool {
        self.should_hold_instantly(keycode, record, cx)
    }

    /// Whether a second press on the same side resolves the tap-hold key
    /// as tap. A non-tap-hold same-side second implies a key roll. The
    /// second's keycode is taken from the current layer on purpose, so an
    /// instant layer tap can stack a mod tap from its new layer.
    fn choose_tap_when_second_is_same_side_press(&self, cx: &Ctx) -> bool {
        !cx.second_is_tap_hold
    }

    /// Whether a same-side second key released before any third press
    /// resolves the tap-hold key as tap. Almost always a key roll.
    fn choose_tap_when_second_is_same_side_release(&self, _cx: &Ctx) -> bool {
        true
    }

    /// Milliseconds after which [forced_choice_after_timeout] runs. Zero
    /// decides at the press itself; negative disables the timeout. Must be
    /// less than [MS_MAX_DUR](pth_common::time::MS_MAX_DUR).
    fn timeout_for_forcing_choice(&self, _cx: &Ctx) -> i16 {
        700
    }

    /// The decision to force once the timeout elapsed, or `None` to let
    /// the normal logic keep going.
    fn forced_choice_after_timeout(&self, cx: &Ctx) -> Option<Decision> {
        if cx.has_second {
            None
        } else {
            Some(Decision::Hold)
        }
    }

    /// Whether a mod-tap's 5-bit packed modifiers must be neutralized with
    /// a suppression key tap when rolled back to a tap. Ctrl and Shift act
    /// harmlessly on their own; anything else (Alt, GUI) triggers host
    /// behavior when tapped alone.
    fn should_neutralize_mods(&self, mods_5_bit: u8) -> bool {
        mods_5_bit & (mods::CTRL | mods::SHIFT) == 0
    }

    /// Keycode sent on tap to defeat lone-modifier semantics. F24 is
    /// avoided because GUI + F24 takes a screenshot on Windows.
    fn mod_suppression_key(&self) -> u16 {
        kc::F23
    }

    /// A keycode to register instead of activating the hold part when hold
    /// is chosen, e.g. Ctrl+C on hold of `LT(1, E)`. `KC_NO` keeps the
    /// normal hold action. Returning anything else disables instant hold
    /// for the key.
    fn code_instead_of_hold(&self, _cx: &Ctx) -> u16 {
        KC_NO
    }

    /// Whether a same-side tap-hold key pressed after the active one also
    /// resolves as hold, enabling stacked holds on one hand.
    fn register_as_hold_when_same_side(&self, _keycode: u16, _record: &KeyRecord, _cx: &Ctx) -> bool {
        true
    }

    /// Per-key tapping term. Returning non-zero hands the key back to the
    /// legacy tapping-term logic and bypasses this engine.
    fn per_key_tapping_term(&self, _keycode: u16, _record: &KeyRecord) -> u16 {
        0
    }

    /// Multiplier applied to hold predictions. The overlap prediction is
    /// instead scaled by `2 - factor`, since a larger required overlap
    /// makes hold harder.
    fn prediction_factor_for_hold(&self, cx: &Ctx) -> f32 {
        let mp = side::user_value(cx.pth_user_bits);
        if mp == 0 || mp > 3 {
            1.0
        } else {
            1.0 - mp as f32 * 0.05
        }
    }

    fn predict_hold_when_third_press(&self, cx: &Ctx) -> bool {
        let p = predict::hold_probability_when_third_press(&cx.snapshot);
        p * self.prediction_factor_for_hold(cx) > 0.5
    }

    fn predict_hold_when_pth_release_after_second_press(&self, cx: &Ctx) -> bool {
        let p = predict::hold_probability_when_pth_release_after_second_press(&cx.snapshot);
        p * self.prediction_factor_for_hold(cx) > 0.5
    }

    fn predict_hold_when_pth_release_after_second_release(&self, cx: &Ctx) -> bool {
        let p = predict::hold_probability_when_pth_release_after_second_release(&cx.snapshot);
        p * self.prediction_factor_for_hold(cx) > 0.5
    }

    /// Minimum overlap (ms) after which the pending decision flips to
    /// hold. The engine clamps the result to the trained guardrails.
    fn predict_min_overlap_for_hold(&self, cx: &Ctx) -> u16 {
        let mut pf = self.prediction_factor_for_hold(cx);
        if cx.second_same_side {
            // More likely a tap, so demand a larger overlap.
            pf -= 0.10;
        }
        let f = 1.0 + (1.0 - pf);
        (predict::overlap_ms_for_hold(&cx.snapshot) as f32 * f) as u16
    }

    /// Whether a keycode takes part in a fast typing streak: letters,
    /// space and common punctuation, with no non-Shift modifiers active.
    fn is_fast_streak_tap_key(&self, keycode: u16, cx: &Ctx) -> bool {
        if cx.mods & (mods::MASK_CTRL | mods::MASK_GUI | mods::ALT) != 0 {
            return false;
        }
        matches!(
            keycodes::tap_code_of(keycode),
            kc::A..=kc::Z | kc::SPACE | kc::DOT | kc::COMMA | kc::SEMICOLON | kc::SLASH
        )
    }

    /// Whether to resolve the freshly pressed tap-hold key as tap because
    /// the user is mid-streak.
    fn predict_fast_streak_tap(&self, cx: &Ctx) -> bool {
        self.is_fast_streak_tap_key(cx.pth_keycode, cx)
            && self.is_fast_streak_tap_key(cx.prev_press_keycode, cx)
            && cx.prev_status != Status::DecidedHold
            && cx.snapshot.prev_press_to_pth_press < 125
    }
}

/// Every hook at its default.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultPolicy;

impl Policy for DefaultPolicy {}

/// Hold instantly unless caps word would break, or the key is a mod-tap
/// whose modifiers are already active (or contain GUI).
///
/// The active-modifier rule works around the host seeing a modifier
/// release when a multi-modifier key goes up while another key holding one
/// of those modifiers is still down. Instant-holding GUI has only
/// downsides.
pub fn default_should_hold_instantly(keycode: u16, _record: &KeyRecord, cx: &Ctx) -> bool {
    if cx.caps_word {
        // A provisional hold would end the caps word.
        return false;
    }
    !keycodes::is_mod_tap_with_any_of(keycode, cx.mods | mods::MASK_GUI)
}
