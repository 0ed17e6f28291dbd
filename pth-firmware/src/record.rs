//! Key event records as the engine receives and re-emits them.

/// Position of a key in the switch matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyPos {
    pub row: u8,
    pub col: u8,
}

impl KeyPos {
    pub const NONE: KeyPos = KeyPos {
        row: 0xff,
        col: 0xff,
    };

    pub const fn new(row: u8, col: u8) -> Self {
        Self { row, col }
    }

    pub const fn is_none(&self) -> bool {
        self.row == 0xff && self.col == 0xff
    }
}

/// A single press or release with its 16-bit millisecond timestamp.
///
/// Rows `0xf0..` mark events that did not originate from the matrix scan
/// (combos, programmatic input); those bypass the engine entirely.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyEvent {
    pub key: KeyPos,
    pub pressed: bool,
    pub time: u16,
}

impl KeyEvent {
    pub const fn is_matrix_event(&self) -> bool {
        self.key.row < 0xf0
    }
}

/// Tap-resolution state carried on a record. A count of zero means the
/// dual-role key acts as its hold part; a count of one or more as its tap
/// part. `interrupted` together with `count == 1` requests immediate tap
/// registration downstream.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Tap {
    pub count: u8,
    pub interrupted: bool,
}

impl Tap {
    pub fn set_tap(&mut self) {
        self.count = 1;
        self.interrupted = true;
    }

    pub fn set_hold(&mut self) {
        self.count = 0;
    }

    pub const fn is_tap(&self) -> bool {
        self.count >= 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyRecord {
    pub event: KeyEvent,
    pub tap: Tap,
}

impl KeyRecord {
    pub const fn new(key: KeyPos, pressed: bool, time: u16) -> Self {
        Self {
            event: KeyEvent { key, pressed, time },
            tap: Tap {
                count: 0,
                interrupted: false,
            },
        }
    }

    pub const fn none() -> Self {
        Self::new(KeyPos::NONE, false, 0)
    }
}
