use super::*;

#[test]
fn mod_tap_round_trip() {
    let code = mod_tap(mods::CTRL, kc::A);
    assert!(is_mod_tap(code));
    assert!(is_tap_hold(code));
    assert_eq!(mods_5_bit_of(code), mods::CTRL);
    assert_eq!(tap_code_of(code), kc::A);
}

#[test]
fn layer_tap_round_trip() {
    let code = layer_tap(3, kc::E);
    assert!(is_layer_tap(code));
    assert!(is_tap_hold(code));
    assert!(!is_mod_tap(code));
    assert_eq!(layer_of_layer_tap(code), 3);
    assert_eq!(tap_code_of(code), kc::E);
}

#[test]
fn swap_hands_toggles_are_not_tap_hold() {
    assert!(is_tap_hold(key_range::SWAP_HANDS_MIN | kc::A));
    assert_eq!(tap_code_of(key_range::SWAP_HANDS_MIN | kc::A), kc::A);
    assert!(!is_tap_hold(key_range::SWAP_HANDS_TOGGLE_MIN));
    assert!(!is_tap_hold(key_range::SWAP_HANDS_TOGGLE_MIN + 3));
    assert_eq!(tap_code_of(key_range::SWAP_HANDS_TOGGLE_MIN), kc::NO);
}

#[test]
fn basic_codes_pass_through() {
    assert!(!is_tap_hold(kc::A));
    assert!(!is_tap_hold(kc::LEFT_SHIFT));
    assert!(is_modifier(kc::LEFT_SHIFT));
    assert_eq!(tap_code_of(kc::A), kc::A);
}

#[test]
fn five_to_eight_bit_mods() {
    assert_eq!(mods::to_8_bit(mods::CTRL), 0x01);
    assert_eq!(mods::to_8_bit(mods::CTRL | mods::SHIFT), 0x03);
    assert_eq!(mods::to_8_bit(mods::RIGHT | mods::CTRL), 0x10);
    assert_eq!(mods::to_8_bit(mods::RIGHT | mods::GUI), 0x80);
}

#[test]
fn mod_tap_with_any_of() {
    let lcs_t = mod_tap(mods::CTRL | mods::SHIFT, kc::E);
    assert!(is_mod_tap_with_any_of(lcs_t, mods::MASK_SHIFT));
    assert!(is_mod_tap_with_any_of(lcs_t, 0x01));
    assert!(!is_mod_tap_with_any_of(lcs_t, mods::MASK_GUI));
    assert!(!is_mod_tap_with_any_of(kc::A, 0xff));
}

#[test]
fn composite_code_packing() {
    let ctrl_c = with_mods(mods::CTRL, kc::C);
    assert!(ctrl_c >= key_range::MODS_MIN && ctrl_c <= key_range::MODS_MAX);
    assert_eq!(mods_5_bit_of(ctrl_c), mods::CTRL);
    assert_eq!(tap_code_of(ctrl_c), kc::C);
}

#[test]
fn tap_dance_is_not_tap_hold() {
    assert!(is_tap_dance(key_range::TAP_DANCE_MIN + 1));
    assert!(!is_tap_hold(key_range::TAP_DANCE_MIN + 1));
}
