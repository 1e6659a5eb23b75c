// This file is based on the spin crate (MIT license). See COPYRIGHT for
// copyright information. spin-rs (https://github.com/mvdnes/spin-rs)
//
// A single-CPU kernel never actually contends on these locks against
// another core, but callers still need the critical-section discipline
// (disable interrupts, do the work, re-enable) so a timer or keyboard IRQ
// can't interrupt a half-updated structure. `Mutex::lock` folds "disable
// interrupts" and "spin on the flag" into one call; `MutexGuard::drop`
// restores interrupts to what they were before the lock was taken.

use crate::x86;
use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};

pub(crate) struct Mutex<T: ?Sized> {
    locked: AtomicBool,
    data: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send> Sync for Mutex<T> {}
unsafe impl<T: ?Sized + Send> Send for Mutex<T> {}

pub(crate) struct MutexGuard<'a, T: ?Sized + 'a> {
    lock: &'a AtomicBool,
    data: &'a mut T,
    // EFLAGS as observed right before this guard disabled interrupts, so
    // drop can restore the caller's IF bit rather than unconditionally
    // re-enabling interrupts (locks nest).
    saved_if: bool,
}

impl<T> Mutex<T> {
    pub(crate) const fn new(data: T) -> Mutex<T> {
        Mutex {
            locked: AtomicBool::new(false),
            data: UnsafeCell::new(data),
        }
    }
}

impl<T: ?Sized> Mutex<T> {
    pub(crate) fn lock(&self) -> MutexGuard<T> {
        let saved_if = x86::read_eflags() & x86::FL_IF != 0;
        x86::cli();
        while self
            .locked
            .compare_and_swap(false, true, Ordering::Acquire)
        {
            core::sync::atomic::spin_loop_hint();
        }
        MutexGuard {
            lock: &self.locked,
            data: unsafe { &mut *self.data.get() },
            saved_if,
        }
    }

    /// Non-blocking try-lock; used where a spin under `cli` would be a bug
    /// (e.g. re-entering the same lock on one CPU).
    pub(crate) fn try_lock(&self) -> Option<MutexGuard<T>> {
        let saved_if = x86::read_eflags() & x86::FL_IF != 0;
        x86::cli();
        if self
            .locked
            .compare_and_swap(false, true, Ordering::Acquire)
        {
            if saved_if {
                x86::sti();
            }
            None
        } else {
            Some(MutexGuard {
                lock: &self.locked,
                data: unsafe { &mut *self.data.get() },
                saved_if,
            })
        }
    }
}

impl<'a, T: ?Sized> Deref for MutexGuard<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        self.data
    }
}

impl<'a, T: ?Sized> DerefMut for MutexGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.data
    }
}

impl<'a, T: ?Sized> Drop for MutexGuard<'a, T> {
    fn drop(&mut self) {
        self.lock.store(false, Ordering::Release);
        if self.saved_if {
            x86::sti();
        }
    }
}
