//! Read access to the keymap, layer and modifier state the engine runs
//! against. The firmware integration owns all of it; the engine only ever
//! changes layers indirectly, by registering and unregistering layer-tap
//! records through its [HidSink](crate::hid::HidSink).

use crate::record::KeyPos;

pub trait Keymap {
    /// Keycode at a position on a specific layer, for re-resolving a
    /// captured position after a layer change.
    fn keycode_at(&self, layer: u8, pos: KeyPos) -> u16;

    /// The layer a press at `pos` currently resolves through.
    fn current_layer_for(&self, pos: KeyPos) -> u8;

    /// Encoded side descriptor of the key at `pos` (see
    /// [pth_common::side]).
    fn side_of(&self, pos: KeyPos) -> u8;

    /// All currently active modifiers as an 8-bit mask, including one-shot
    /// modifiers where supported.
    fn active_mods(&self) -> u8;

    fn caps_word_active(&self) -> bool {
        false
    }
}
