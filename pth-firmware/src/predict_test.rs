use super::*;

extern crate std;

fn snap() -> Snapshot {
    Snapshot {
        prev_prev_press_to_prev_press: -1,
        prev_press_to_pth_press: -1,
        prev_prev_overlap: -1,
        prev_overlap: -1,
        ..Snapshot::default()
    }
}

#[test]
fn third_press_tree_known_leaves() {
    // Quick roll with no second release yet.
    let mut s = snap();
    s.prev_press_to_pth_press = 100;
    s.pth_to_second_press = 100;
    s.second_to_third_press = 50;
    assert_eq!(hold_probability_when_third_press(&s), 0.040555656);

    // Second already released, slow third.
    let mut s = snap();
    s.prev_press_to_pth_press = 100;
    s.second_released = true;
    s.second_dur = 100;
    s.pth_to_second_release = 200;
    s.second_to_third_press = 200;
    s.pth_to_second_press = 30;
    assert_eq!(hold_probability_when_third_press(&s), 0.6714801);

    // Long pause before the tap-hold press.
    let mut s = snap();
    s.prev_press_to_pth_press = 800;
    s.press_to_press_w_avg = 500.0;
    s.pth_to_second_press = 100;
    s.release_to_pth_press = 400;
    assert_eq!(hold_probability_when_third_press(&s), 0.84);
}

#[test]
fn release_after_second_press_tree_known_leaves() {
    let mut s = snap();
    s.prev_press_to_pth_press = 100;
    s.pth_to_second_press = 100;
    assert_eq!(
        hold_probability_when_pth_release_after_second_press(&s),
        0.021824066
    );

    let mut s = snap();
    s.prev_press_to_pth_press = 2000;
    s.release_to_pth_press = 1400;
    s.pth_to_second_press = 10;
    s.prev_prev_press_to_prev_press = 100;
    assert_eq!(
        hold_probability_when_pth_release_after_second_press(&s),
        0.01754386
    );

    let mut s = snap();
    s.prev_press_to_pth_press = 2000;
    s.release_to_pth_press = 1000;
    s.pth_to_second_press = 200;
    assert_eq!(
        hold_probability_when_pth_release_after_second_press(&s),
        0.89287937
    );
}

#[test]
fn release_after_second_release_tree_known_leaves() {
    let mut s = snap();
    s.pth_to_second_release = 100;
    s.prev_press_to_pth_press = 500;
    assert_eq!(
        hold_probability_when_pth_release_after_second_release(&s),
        0.09534535
    );

    let mut s = snap();
    s.pth_to_second_release = 200;
    s.release_to_pth_press = 50;
    s.pth_to_second_press = 50;
    s.down_count = 0;
    assert_eq!(
        hold_probability_when_pth_release_after_second_release(&s),
        0.58709514
    );

    s.down_count = 1;
    assert_eq!(
        hold_probability_when_pth_release_after_second_release(&s),
        0.24063401
    );
}

#[test]
fn overlap_formula_survives_zero_denominators() {
    // A zero press-to-second duration hits both safe divisions.
    let mut s = snap();
    s.pth_to_second_press = 0;
    s.prev_press_to_pth_press = 0;
    s.prev_prev_overlap = 0;
    assert_eq!(overlap_ms_for_hold(&s), 20109);
}

#[test]
fn overlap_formula_typical_roll() {
    let mut s = snap();
    s.pth_to_second_press = 100;
    s.prev_press_to_pth_press = 150;
    s.prev_prev_overlap = 0;
    let overlap = overlap_ms_for_hold(&s);
    assert!(overlap > 380 && overlap < 400, "overlap was {overlap}");
}

#[test]
fn overlap_formula_never_negative() {
    // The left max operand goes negative; abs keeps the estimate usable.
    let mut s = snap();
    s.pth_to_second_press = 300;
    s.prev_press_to_pth_press = 2000;
    s.prev_prev_overlap = 0;
    let overlap = overlap_ms_for_hold(&s);
    assert!(overlap < 30000, "overlap was {overlap}");
}

#[test]
fn streak_predictions_degenerate_to_zero_without_history() {
    let mut s = snap();
    s.prev_press_to_pth_press = 0;
    s.prev_prev_overlap = 0;
    s.overlap_w_avg = 0.0;
    assert_eq!(fast_streak_tap_probability(&s), 0.0);
    assert_eq!(fast_streak_tap_probability_conservative(&s), 0.0);
}

#[test]
fn streak_prediction_grows_with_missing_overlap() {
    let mut s = snap();
    s.prev_press_to_pth_press = 100;
    s.prev_prev_overlap = 0;
    let p = fast_streak_tap_probability(&s);
    assert!(p > 1.0, "probability was {p}");
}
