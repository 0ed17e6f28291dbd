//! A manually advanced clock for tests. Scenarios pin the timestamps the
//! engine sees instead of racing the wall clock.

extern crate std;
use core::cell::RefCell;
use core::task::Waker;

use embassy_time_driver::{AlarmHandle, Driver};
use embassy_time_queue_driver::TimerQueue;

std::thread_local! {
    static NOW_TICKS: RefCell<u64> = const { RefCell::new(0) };
}

struct ManualClock;

impl Driver for ManualClock {
    fn now(&self) -> u64 {
        NOW_TICKS.with_borrow(|ticks| *ticks)
    }

    unsafe fn allocate_alarm(&self) -> Option<AlarmHandle> {
        None
    }

    fn set_alarm_callback(&self, _alarm: AlarmHandle, _callback: fn(*mut ()), _ctx: *mut ()) {}

    fn set_alarm(&self, _alarm: AlarmHandle, _timestamp: u64) -> bool {
        true
    }
}

embassy_time_driver::time_driver_impl!(static CLOCK: ManualClock = ManualClock);

/// Moves the clock of the current test thread to an absolute millisecond
/// timestamp.
pub fn set_millis(ms: u64) {
    NOW_TICKS.with_borrow_mut(|ticks| *ticks = ms * (embassy_time::TICK_HZ / 1000));
}

struct ImmediateQueue;

impl TimerQueue for ImmediateQueue {
    fn schedule_wake(&'static self, _at: u64, waker: &Waker) {
        waker.wake_by_ref();
    }
}

embassy_time_queue_driver::timer_queue_impl!(static QUEUE: ImmediateQueue = ImmediateQueue);
