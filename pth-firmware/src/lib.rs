#![no_std]
pub mod engine;
pub mod hid;
pub mod keymap;
pub mod policy;
pub mod predict;
pub mod record;

#[cfg(any(test, feature = "test-utils"))]
pub mod hid_test_stub;
#[cfg(any(test, feature = "test-utils"))]
pub mod time_driver_test_stub;

#[macro_use]
mod macros;

#[cfg(any(test, feature = "test-utils"))]
extern crate std;
