// Scoped interrupt-disable guard used around mutation of the task ring,
// the current page-directory pointer, the kernel heap block table, or a
// disk transaction, per the concurrency model: the kernel disables
// interrupts for the duration and restores the caller's IF bit on drop.

use crate::x86;

pub(crate) struct IrqGuard {
    saved_if: bool,
}

#[must_use]
pub(crate) fn hold_off() -> IrqGuard {
    let saved_if = x86::read_eflags() & x86::FL_IF != 0;
    x86::cli();
    IrqGuard { saved_if }
}

impl Drop for IrqGuard {
    fn drop(&mut self) {
        if self.saved_if {
            x86::sti();
        }
    }
}
