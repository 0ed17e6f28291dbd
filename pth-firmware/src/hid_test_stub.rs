//! A miniature keyboard for tests: a layered keymap with a side table, a
//! layer stack, a modifier mask, and a recording HID sink. The board
//! interprets records the way the downstream pipeline would, so tests can
//! assert the exact host-visible trace.

extern crate std;
use core::cell::RefCell;
use std::rc::Rc;
use std::vec::Vec;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::Channel;

use pth_common::keycodes::{self, key_range, key_range::KC_NO, mods};

use crate::hid::HidSink;
use crate::keymap::Keymap;
use crate::record::{KeyPos, KeyRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HidOp {
    Down(u16),
    Up(u16),
}

struct BoardState {
    layers: Vec<Vec<Vec<u16>>>,
    sides: Vec<Vec<u8>>,
    layer_stack: Vec<u8>,
    /// Keycode each position was pressed as, so a release acts on the same
    /// code even after a layer change.
    active: Vec<Vec<u16>>,
    mods: u8,
    caps_word: bool,
}

pub struct TestBoard {
    state: RefCell<BoardState>,
    ops: Channel<NoopRawMutex, HidOp, 64>,
}

impl TestBoard {
    pub fn new(layers: Vec<Vec<Vec<u16>>>, sides: Vec<Vec<u8>>) -> Rc<Self> {
        let active = layers[0]
            .iter()
            .map(|row| std::vec![KC_NO; row.len()])
            .collect();
        Rc::new(Self {
            state: RefCell::new(BoardState {
                layers,
                sides,
                layer_stack: std::vec![0],
                active,
                mods: 0,
                caps_word: false,
            }),
            ops: Channel::new(),
        })
    }

    pub fn handles(board: &Rc<Self>) -> (TestHid, TestKeymap) {
        (TestHid(board.clone()), TestKeymap(board.clone()))
    }

    pub fn take_op(&self) -> Option<HidOp> {
        self.ops.try_receive().ok()
    }

    pub fn mods(&self) -> u8 {
        self.state.borrow().mods
    }

    pub fn set_mods(&self, mods: u8) {
        self.state.borrow_mut().mods = mods;
    }

    pub fn set_caps_word(&self, on: bool) {
        self.state.borrow_mut().caps_word = on;
    }

    pub fn current_layer(&self) -> u8 {
        *self.state.borrow().layer_stack.last().unwrap_or(&0)
    }

    /// What the scan loop would hand the engine for a key at `pos` right
    /// now.
    pub fn resolve_current(&self, pos: KeyPos) -> u16 {
        self.keycode_on(self.current_layer(), pos)
    }

    /// The pre-resolved keycode the integration layer passes alongside an
    /// event: fresh for presses, the press-time code for releases.
    pub fn key_event_code(&self, pos: KeyPos, down: bool) -> u16 {
        if down {
            self.resolve_current(pos)
        } else {
            self.state.borrow().active[pos.row as usize][pos.col as usize]
        }
    }

    fn keycode_on(&self, layer: u8, pos: KeyPos) -> u16 {
        let state = self.state.borrow();
        state
            .layers
            .get(layer as usize)
            .and_then(|rows| rows.get(pos.row as usize))
            .and_then(|cols| cols.get(pos.col as usize))
            .copied()
            .unwrap_or(KC_NO)
    }

    /// Downstream interpretation of a record, honouring its tap state.
    pub fn process(&self, record: &KeyRecord) {
        let pos = record.event.key;
        let down = record.event.pressed;
        let keycode = if down {
            let keycode = self.resolve_current(pos);
            self.state.borrow_mut().active[pos.row as usize][pos.col as usize] = keycode;
            keycode
        } else {
            self.state.borrow().active[pos.row as usize][pos.col as usize]
        };

        if keycodes::is_tap_hold(keycode) {
            if record.tap.is_tap() {
                self.basic(keycodes::tap_code_of(keycode), down);
            } else if keycodes::is_mod_tap(keycode) {
                self.mod_state(keycodes::mods_8_bit_of_mod_tap(keycode), down);
            } else if keycodes::is_layer_tap(keycode) {
                let layer = keycodes::layer_of_layer_tap(keycode);
                let mut state = self.state.borrow_mut();
                if down {
                    state.layer_stack.push(layer);
                } else if let Some(at) =
                    state.layer_stack.iter().rposition(|l| *l == layer)
                {
                    state.layer_stack.remove(at);
                }
            }
            // momentary swap-hands has no host-visible effect here
        } else if keycode == KC_NO {
        } else if (key_range::MODS_MIN..=key_range::MODS_MAX).contains(&keycode) {
            self.composite(keycode, down);
        } else {
            self.basic(keycode, down);
        }
    }

    fn composite(&self, keycode: u16, down: bool) {
        let packed = keycodes::mods_5_bit_of(keycode);
        let code = keycodes::tap_code_of(keycode);
        if down {
            self.mod_state(mods::to_8_bit(packed), true);
            self.basic(code, true);
        } else {
            self.basic(code, false);
            self.mod_state(mods::to_8_bit(packed), false);
        }
    }

    fn mod_state(&self, mask: u8, down: bool) {
        for bit in 0..8 {
            if mask & (1 << bit) != 0 {
                self.basic(key_range::MODIFIER_MIN + bit as u16, down);
            }
        }
    }

    fn basic(&self, keycode: u16, down: bool) {
        if keycodes::is_modifier(keycode) {
            let bit = 1 << (keycode - key_range::MODIFIER_MIN);
            let mut state = self.state.borrow_mut();
            if down {
                state.mods |= bit;
            } else {
                state.mods &= !bit;
            }
        }
        let op = if down {
            HidOp::Down(keycode)
        } else {
            HidOp::Up(keycode)
        };
        self.ops.try_send(op).expect("op buffer overflow");
    }
}

pub struct TestHid(Rc<TestBoard>);

impl HidSink for TestHid {
    fn process(&mut self, record: &KeyRecord) {
        self.0.process(record);
    }

    fn register_code(&mut self, keycode: u16) {
        if (key_range::MODS_MIN..=key_range::MODS_MAX).contains(&keycode) {
            self.0.composite(keycode, true);
        } else {
            self.0.basic(keycode, true);
        }
    }

    fn unregister_code(&mut self, keycode: u16) {
        if (key_range::MODS_MIN..=key_range::MODS_MAX).contains(&keycode) {
            self.0.composite(keycode, false);
        } else {
            self.0.basic(keycode, false);
        }
    }

    fn send_and_wait(&mut self) {}
}

pub struct TestKeymap(Rc<TestBoard>);

impl Keymap for TestKeymap {
    fn keycode_at(&self, layer: u8, pos: KeyPos) -> u16 {
        self.0.keycode_on(layer, pos)
    }

    fn current_layer_for(&self, _pos: KeyPos) -> u8 {
        self.0.current_layer()
    }

    fn side_of(&self, pos: KeyPos) -> u8 {
        let state = self.0.state.borrow();
        state
            .sides
            .get(pos.row as usize)
            .and_then(|cols| cols.get(pos.col as usize))
            .copied()
            .unwrap_or(0)
    }

    fn active_mods(&self) -> u8 {
        self.0.state.borrow().mods
    }

    fn caps_word_active(&self) -> bool {
        self.0.state.borrow().caps_word
    }
}
