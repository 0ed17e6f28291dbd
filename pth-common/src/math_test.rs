use super::*;

#[test]
fn weighted_avg_blends_toward_newer() {
    let avg = weighted_avg(100.0, 200.0);
    assert!(avg > 170.0 && avg < 180.0, "avg was {avg}");
    assert_eq!(weighted_avg(50.0, 50.0), 50.0);
}

#[test]
fn weighted_avg_ignores_missing_older_sample() {
    assert_eq!(weighted_avg(-1.0, 42.0), 42.0);
}

#[test]
fn safe_div_returns_numerator_on_zero() {
    assert_eq!(safe_div(10.0, 0.0), 10.0);
    assert_eq!(safe_div(10.0, 2.0), 5.0);
    assert_eq!(safe_div(-9.0, 3.0), -3.0);
}

#[test]
fn float_helpers() {
    assert_eq!(fabs(-3.5), 3.5);
    assert_eq!(fabs(3.5), 3.5);
    assert_eq!(fabs(0.0), 0.0);
    assert_eq!(fmax(1.0, 2.0), 2.0);
    assert_eq!(fmax(-1.0, -2.0), -1.0);
}
