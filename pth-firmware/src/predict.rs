//! Data-driven predictors.
//!
//! The decision trees and the closed-form overlap expression below were
//! generated offline from recorded typing data (CART training for the
//! trees, symbolic regression for the overlap and streak expressions) and
//! are compiled in as-is. Do not hand-edit them; regenerate from the
//! training artifacts instead.
//!
//! Every predictor is a pure function of a [Snapshot]. Durations beyond
//! [MS_MAX_DUR](pth_common::time::MS_MAX_DUR) arrive saturated, exactly as
//! in the training data. A negative duration means the value was not
//! available yet.

use pth_common::math::{fabs, fmax, safe_div};

/// Timing state captured around the active tap-hold key. The `prev_*`
/// history fields are frozen at the tap-hold press; the second/third and
/// `down_count` fields reflect the moment a predictor is consulted.
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Snapshot {
    pub prev_prev_press_to_prev_press: i16,
    pub prev_press_to_pth_press: i16,
    pub prev_prev_overlap: i16,
    pub prev_overlap: i16,
    pub press_to_press_w_avg: f32,
    pub overlap_w_avg: f32,
    /// From the release preceding the tap-hold press to that press.
    pub release_to_pth_press: u16,
    pub pth_to_second_press: u16,
    pub pth_to_second_release: u16,
    pub second_dur: u16,
    pub second_to_third_press: u16,
    pub down_count: u8,
    pub second_released: bool,
}

/// Hold probability when a third key is pressed.
///
/// Mod:      50,599 /  68,121 (74.28 %)
/// Non-mod: 306,692 / 310,294 (98.84 %)
/// Total:   357,291 / 378,415 (94.42 %)
#[allow(clippy::excessive_precision)]
pub fn hold_probability_when_third_press(s: &Snapshot) -> f32 {
    let mut opt_next_dur = -1.0_f32;
    let mut opt_th_down_next_up_dur = -1.0_f32;
    if s.second_released {
        opt_next_dur = s.second_dur as f32;
        opt_th_down_next_up_dur = s.pth_to_second_release as f32;
    }

    if s.prev_press_to_pth_press <= 759 {
        if opt_th_down_next_up_dur <= 150.0 {
            if s.pth_to_second_press <= 170 {
                if s.second_to_third_press <= 107 {
                    0.040555656
                } else if opt_th_down_next_up_dur <= 109.0 {
                    0.14262922
                } else if s.pth_to_second_press <= 55 {
                    0.3217576
                } else {
                    0.8006757
                }
            } else if s.pth_to_second_press <= 216 {
                if s.down_count == 0 {
                    if s.second_to_third_press <= 77 {
                        0.38718662
                    } else {
                        0.6451292
                    }
                } else {
                    0.22810061
                }
            } else if s.down_count == 0 {
                0.910299
            } else if s.pth_to_second_press <= 264 {
                0.4814815
            } else {
                0.8877551
            }
        } else if s.second_to_third_press <= 145 {
            if s.pth_to_second_press <= 92 {
                if s.down_count == 0 {
                    if s.release_to_pth_press <= 112 {
                        0.43078628
                    } else {
                        0.6967871
                    }
                } else if s.press_to_press_w_avg <= 63.602364 {
                    0.51724136
                } else {
                    0.16554306
                }
            } else if s.down_count == 0 {
                0.82194614
            } else if s.press_to_press_w_avg <= 105.37883 {
                0.64830506
            } else {
                0.35095447
            }
        } else if s.pth_to_second_press <= 59 {
            if opt_next_dur <= 130.0 {
                0.6714801
            } else if s.prev_press_to_pth_press <= 303 {
                0.27037036
            } else {
                0.7083333
            }
        } else {
            0.93728805
        }
    } else if s.press_to_press_w_avg <= 994.01086 {
        if opt_th_down_next_up_dur <= 120.0 {
            if s.pth_to_second_press <= 139 {
                if s.release_to_pth_press <= 443 {
                    0.84
                } else if s.release_to_pth_press <= 1110 {
                    0.12546816
                } else {
                    0.54545456
                }
            } else {
                0.83798885
            }
        } else if s.second_to_third_press <= 127 {
            if s.pth_to_second_press <= 146 {
                if s.release_to_pth_press <= 916 {
                    0.4074074
                } else {
                    0.9166667
                }
            } else {
                0.9607843
            }
        } else {
            0.97471267
        }
    } else if s.pth_to_second_press <= 19 {
        0.06451613
    } else if s.prev_press_to_pth_press <= 1449 {
        if s.pth_to_second_press <= 111 {
            if s.release_to_pth_press <= 1777 {
                0.6754386
            } else {
                0.1
            }
        } else {
            0.9519231
        }
    } else {
        0.99276936
    }
}

/// Hold probability when the tap-hold key is released while the second key
/// is still down.
///
/// Mod:       741,259 /  1,057,871 (70.07 %)
/// Non-mod: 9,162,154 /  9,190,163 (99.70 %)
/// Total:   9,903,413 / 10,248,034 (96.64 %)
#[allow(clippy::excessive_precision)]
pub fn hold_probability_when_pth_release_after_second_press(s: &Snapshot) -> f32 {
    if s.prev_press_to_pth_press <= 1254 {
        if s.pth_to_second_press <= 214 {
            if s.pth_to_second_press <= 168 {
                if s.prev_press_to_pth_press <= 237 {
                    0.021824066
                } else if s.pth_to_second_press <= 124 {
                    0.06581373
                } else if s.prev_prev_press_to_prev_press <= 1603 {
                    0.12980974
                } else {
                    0.6515581
                }
            } else if s.release_to_pth_press <= 169 {
                0.1548253
            } else if s.pth_to_second_press <= 186 {
                if s.press_to_press_w_avg <= 822.32574 {
                    0.3386316
                } else {
                    0.6540284
                }
            } else if s.prev_press_to_pth_press <= 226 {
                0.10697675
            } else {
                0.53629214
            }
        } else if s.pth_to_second_press <= 247 {
            if s.release_to_pth_press <= 162 {
                if s.overlap_w_avg <= 0.13447072 {
                    if s.prev_prev_press_to_prev_press <= 165 {
                        0.63566846
                    } else {
                        0.41175103
                    }
                } else {
                    0.24768922
                }
            } else if s.down_count == 0 {
                if s.overlap_w_avg <= 17.07778 {
                    0.7658702
                } else {
                    0.4507772
                }
            } else {
                0.08022922
            }
        } else if s.down_count == 0 {
            0.88925225
        } else if s.pth_to_second_press <= 312 {
            0.26601785
        } else if s.prev_press_to_pth_press <= 181 {
            0.7529976
        } else {
            0.23684211
        }
    } else if s.release_to_pth_press <= 1350 {
        if s.pth_to_second_press <= 139 {
            if s.release_to_pth_press <= 1273 {
                if s.prev_prev_press_to_prev_press <= 1588 {
                    if s.release_to_pth_press <= 539 {
                        0.5905512
                    } else {
                        0.25539857
                    }
                } else if s.release_to_pth_press <= 102 {
                    0.083333336
                } else {
                    0.8053435
                }
            } else if s.press_to_press_w_avg <= 1096.1167 {
                if s.pth_to_second_press <= 89 {
                    0.4801762
                } else {
                    0.7108014
                }
            } else {
                0.42533332
            }
        } else {
            0.89287937
        }
    } else if s.pth_to_second_press <= 17 {
        if s.prev_prev_press_to_prev_press <= 146 {
            0.01754386
        } else if s.release_to_pth_press <= 3116 {
            0.04477612
        } else if s.release_to_pth_press <= 3243 {
            0.5714286
        } else {
            0.09090909
        }
    } else if s.release_to_pth_press <= 1504 {
        0.9103782
    } else if s.down_count == 0 {
        0.98845273
    } else {
        0.046153847
    }
}

/// Hold probability when the tap-hold key is released after the second key
/// was also released.
///
/// Mod:     420,158 / 435,604 (96.45 %)
/// Non-mod:  60,870 /  85,031 (71.59 %)
/// Total:   481,028 / 520,635 (92.39 %)
#[allow(clippy::excessive_precision)]
pub fn hold_probability_when_pth_release_after_second_release(s: &Snapshot) -> f32 {
    let opt_next_dur = s.second_dur;
    let opt_th_down_next_up_dur = s.pth_to_second_release;

    if opt_th_down_next_up_dur <= 143 {
        if s.prev_press_to_pth_press <= 1292 {
            if opt_th_down_next_up_dur <= 116 {
                0.09534535
            } else if s.release_to_pth_press <= 118 {
                0.27736303
            } else if s.prev_press_to_pth_press <= 174 {
                0.08959538
            } else if s.pth_to_second_press <= 29 {
                0.32664755
            } else {
                0.65463656
            }
        } else if s.pth_to_second_press <= 19 {
            0.1
        } else if opt_th_down_next_up_dur <= 64 {
            if s.release_to_pth_press <= 2050 {
                0.0625
            } else if s.press_to_press_w_avg <= 2830.7092 {
                0.71428573
            } else {
                0.5
            }
        } else if s.release_to_pth_press <= 1244 {
            if opt_th_down_next_up_dur <= 107 {
                0.33333334
            } else {
                0.85714287
            }
        } else {
            0.99616855
        }
    } else if s.release_to_pth_press <= 125 {
        if s.pth_to_second_press <= 107 {
            if s.down_count == 0 {
                if s.pth_to_second_press <= 77 {
                    if s.release_to_pth_press <= 47 {
                        0.42004812
                    } else {
                        0.58709514
                    }
                } else {
                    0.70079845
                }
            } else {
                0.24063401
            }
        } else if opt_th_down_next_up_dur <= 182 {
            if s.prev_prev_overlap <= 0 {
                if opt_next_dur <= 43 {
                    0.4791367
                } else {
                    0.8005192
                }
            } else if opt_next_dur <= 54 {
                0.23857868
            } else {
                0.50877196
            }
        } else if s.pth_to_second_press <= 167 {
            0.8571564
        } else if opt_next_dur <= 17 {
            0.30452675
        } else {
            0.96995705
        }
    } else if s.down_count == 0 {
        if s.press_to_press_w_avg <= 867.94495 {
            0.94516844
        } else if s.pth_to_second_press <= 11 {
            0.14285715
        } else {
            0.9992744
        }
    } else if s.prev_prev_press_to_prev_press <= 311 {
        if opt_th_down_next_up_dur <= 238 {
            0.15384616
        } else if s.pth_to_second_press <= 175 {
            0.43137255
        } else {
            0.74390244
        }
    } else if opt_th_down_next_up_dur <= 178 {
        if s.prev_press_to_pth_press <= 96 {
            0.54285717
        } else {
            0.0952381
        }
    } else if s.prev_press_to_pth_press <= 187 {
        0.91690546
    } else {
        0.2
    }
}

/// Predicted minimum overlap (ms) that indicates an intentional hold.
///
/// Mod:                 991,319 /  1,496,055 (66.26 %)
/// Non-mod:           9,527,683 /  9,582,518 (99.43 %)
/// Total:            10,519,002 / 11,078,573 (94.95 %)
#[allow(clippy::excessive_precision)]
pub fn overlap_ms_for_hold(s: &Snapshot) -> u16 {
    let p2s = s.pth_to_second_press as f32;
    let prev = s.prev_press_to_pth_press as f32;
    let pp_overlap = s.prev_prev_overlap as f32;

    let guess = fabs(fmax(
        p2s * safe_div(
            20145.72453837935,
            20145.72453837935 - (prev - pp_overlap) * p2s,
        ),
        safe_div(
            20141.63979839019 - ((prev - 2.0 * pp_overlap) - pp_overlap) * 10.24699665838974,
            p2s,
        ) - 32.559018051648636,
    ));

    guess as u16
}

/// Streak-tap likelihood. Correctly predicted 7.49 % of tap-holds in the
/// data to be taps while mispredicting 0.66 %; the rest fall through to
/// the normal decision logic.
#[allow(clippy::excessive_precision)]
pub fn fast_streak_tap_probability(s: &Snapshot) -> f32 {
    let d = s.prev_prev_overlap as f32 - s.prev_press_to_pth_press as f32;
    fabs(safe_div(
        d,
        4.280551301886473 - s.prev_press_to_pth_press as f32,
    ))
}

/// Conservative streak-tap variant: 3.46 % correctly predicted as taps,
/// 0.29 % mispredicted.
#[allow(clippy::excessive_precision)]
pub fn fast_streak_tap_probability_conservative(s: &Snapshot) -> f32 {
    let d = s.prev_prev_overlap as f32 - s.prev_press_to_pth_press as f32;
    fabs(safe_div(d, d + 5.3131340976019885 * s.overlap_w_avg))
}

#[cfg(test)]
#[path = "predict_test.rs"]
mod test;
