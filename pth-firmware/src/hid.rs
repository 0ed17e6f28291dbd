//! The downstream half of the key pipeline.
//!
//! In the original firmware the engine re-injected synthetic events into
//! the top of the pipeline and filtered them back out with a reentrancy
//! flag. Here emission is a direct call: records handed to
//! [HidSink::process] never come back through the engine, so no flag
//! exists.

use crate::record::KeyRecord;

pub trait HidSink {
    /// Continue normal downstream processing for `record`: resolve its
    /// position on the active layer and act on the result, honouring the
    /// record's tap-resolution state.
    fn process(&mut self, record: &KeyRecord);

    /// Press a basic or composite keycode directly.
    fn register_code(&mut self, keycode: u16);

    /// Release a basic or composite keycode directly.
    fn unregister_code(&mut self, keycode: u16);

    fn tap_code(&mut self, keycode: u16) {
        self.register_code(keycode);
        self.send_and_wait();
        self.unregister_code(keycode);
    }

    /// Flush the pending report and wait long enough that the host will
    /// not drop a register/unregister pair emitted within one scan cycle.
    fn send_and_wait(&mut self);
}
