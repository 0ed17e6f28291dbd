use super::*;

// The rule set the truth table folds: other Opposite wins, then other Same,
// then the pth-side equivalents, then absolute comparison.
fn same_side_by_rules(pth: u8, other: u8) -> bool {
    if other == ATOM_OPPOSITE {
        return false;
    }
    if other == ATOM_SAME {
        return true;
    }
    if pth == ATOM_OPPOSITE {
        return false;
    }
    if pth == ATOM_SAME {
        return true;
    }
    pth == other
}

#[test]
fn truth_table_matches_rules() {
    for pth in 0..4 {
        for other in 0..4 {
            assert_eq!(
                is_same_side(pth, other),
                same_side_by_rules(pth, other),
                "pth={pth} other={other}"
            );
        }
    }
}

#[test]
fn absolute_atoms_compare() {
    assert!(is_same_side(ATOM_LEFT, ATOM_LEFT));
    assert!(is_same_side(ATOM_RIGHT, ATOM_RIGHT));
    assert!(!is_same_side(ATOM_LEFT, ATOM_RIGHT));
    assert!(!is_same_side(ATOM_RIGHT, ATOM_LEFT));
}

#[test]
fn encode_decode() {
    let side = encode(ATOM_RIGHT, ATOM_OPPOSITE) | HARDER_10;
    assert_eq!(pth_atom(side), ATOM_RIGHT);
    assert_eq!(other_atom(side), ATOM_OPPOSITE);
    assert_eq!(user_bits(side), HARDER_10);
    assert_eq!(user_value(side), 2);
}

#[test]
fn named_descriptors() {
    assert_eq!(pth_atom(LO), ATOM_LEFT);
    assert_eq!(other_atom(LO), ATOM_OPPOSITE);
    assert_eq!(user_bits(S), 0);
    assert_eq!(L, 0b0000);
    assert_eq!(R, 0b0101);
}
