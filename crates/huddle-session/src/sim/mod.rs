//! In-process stand-in for the real-time engine and the host microphone.
//!
//! Used by the `huddle demo` command and by tests. It moves no audio; it
//! only emits the events a real engine would, in the same order.

mod capture;
mod engine;

pub use capture::SimCapture;
pub use engine::{SimBehavior, SimEngine, SimSession};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a std mutex, ignoring poisoning from a panicked test thread.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
