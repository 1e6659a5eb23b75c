// ref. https://wiki.osdev.org/PS/2_Keyboard
// ref. https://wiki.osdev.org/%228042%22_PS/2_Controller

use crate::process;
use crate::trap::consts::IRQ_KBD;
use crate::{picirq, x86};
use consts::*;
use core::sync::atomic::{AtomicBool, Ordering};

mod consts {
    pub(crate) const PORT_DATA: u16 = 0x60;
    pub(crate) const PORT_STATUS: u16 = 0x64;
    pub(crate) const STATUS_FL_DIB: u8 = 0x01;

    pub(crate) const SCANCODE_RELEASE_BIT: u8 = 0x80;
    pub(crate) const SCANCODE_LSHIFT: u8 = 0x2a;
    pub(crate) const SCANCODE_RSHIFT: u8 = 0x36;
}

// Scancode set 1 -> ASCII, built in kbdmap.c.
extern "C" {
    static kbdmap_normal: [u8; 256];
    static kbdmap_shift: [u8; 256];
}

static SHIFT_HELD: AtomicBool = AtomicBool::new(false);

pub(crate) fn init() {
    picirq::unmask_8259a(IRQ_KBD);
}

/// Drain one scancode from the controller and, if it decodes to a
/// non-zero key, push it onto the current process's key buffer.
/// Called from the IRQ1 trap vector; never blocks.
pub(crate) fn on_irq() {
    let st = x86::inb(PORT_STATUS);
    if (st & STATUS_FL_DIB) == 0 {
        return;
    }

    let scancode = x86::inb(PORT_DATA);
    let released = scancode & SCANCODE_RELEASE_BIT != 0;
    let code = scancode & !SCANCODE_RELEASE_BIT;

    if code == SCANCODE_LSHIFT || code == SCANCODE_RSHIFT {
        SHIFT_HELD.store(!released, Ordering::Relaxed);
        return;
    }
    if released {
        return;
    }

    let shifted = SHIFT_HELD.load(Ordering::Relaxed);
    let byte = unsafe {
        if shifted {
            kbdmap_shift[code as usize]
        } else {
            kbdmap_normal[code as usize]
        }
    };
    if byte == 0 {
        return;
    }

    process::with_current(|p| p.push_key(byte));
}
