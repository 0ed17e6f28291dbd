#![no_std]
pub mod keycodes;
pub mod math;
pub mod side;
pub mod time;
