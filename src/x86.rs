// Thin wrappers around the x86 instructions the kernel needs: port I/O,
// control/descriptor-table register loads, and the handful of
// instructions Rust has no intrinsic for.

#[inline]
pub(crate) fn inb(port: u16) -> u8 {
    unsafe {
        let value: u8;
        asm!("inb $1, $0" : "={al}"(value) :"N{dx}"(port) :: "volatile");
        value
    }
}

#[inline]
pub(crate) fn outb(port: u16, value: u8) {
    unsafe {
        asm!("outb $1, $0" :: "N{dx}"(port), "{al}"(value) :: "volatile");
    }
}

#[inline]
pub(crate) fn outw(port: u16, value: u16) {
    unsafe {
        asm!("outw $1, $0" :: "N{dx}"(port), "{ax}"(value) :: "volatile");
    }
}

/// Read `n` 16-bit words from `port` into the buffer at `addr`.
pub(crate) unsafe fn insw(port: u16, addr: *mut u8, n: usize) {
    asm!("cld; rep insw" :: "{dx}"(port), "{edi}"(addr), "{ecx}"(n) : "edi", "ecx" : "volatile");
}

/// Write `n` 16-bit words to `port` from the buffer at `addr`.
pub(crate) unsafe fn outsw(port: u16, addr: *const u8, n: usize) {
    asm!("cld; rep outsw" :: "{dx}"(port), "{esi}"(addr), "{ecx}"(n) : "esi", "ecx" : "volatile");
}

#[repr(C, packed)]
struct Pseudodesc {
    limit: u16,
    base: u32,
}

pub(crate) unsafe fn lgdt(base: u32, size: u16) {
    let pd = Pseudodesc {
        limit: size - 1,
        base,
    };
    asm!("lgdt ($0)" :: "r"(&pd as *const Pseudodesc) : "memory");
}

pub(crate) unsafe fn lidt(base: u32, size: u16) {
    let pd = Pseudodesc {
        limit: size - 1,
        base,
    };
    asm!("lidt ($0)" :: "r"(&pd as *const Pseudodesc) : "memory");
}

pub(crate) unsafe fn ltr(selector: u16) {
    asm!("ltr $0" :: "r"(selector) :: "volatile");
}

pub(crate) unsafe fn lldt(selector: u16) {
    asm!("lldt $0" :: "r"(selector) :: "volatile");
}

pub(crate) unsafe fn lcr3(val: u32) {
    asm!("mov $0, %cr3" :: "r"(val) : "memory" : "volatile");
}

pub(crate) fn rcr3() -> u32 {
    let val: u32;
    unsafe {
        asm!("mov %cr3, $0" : "=r"(val));
    }
    val
}

pub(crate) fn rcr2() -> u32 {
    let val: u32;
    unsafe {
        asm!("mov %cr2, $0" : "=r"(val));
    }
    val
}

pub(crate) fn rcr0() -> u32 {
    let val: u32;
    unsafe {
        asm!("mov %cr0, $0" : "=r"(val));
    }
    val
}

pub(crate) unsafe fn lcr0(val: u32) {
    asm!("mov $0, %cr0" :: "r"(val) : "memory" : "volatile");
}

pub(crate) unsafe fn invlpg(addr: u32) {
    asm!("invlpg ($0)" :: "r"(addr) : "memory");
}

pub(crate) fn cld() {
    unsafe {
        asm!("cld" ::: "cc" : "volatile");
    }
}

pub(crate) fn cli() {
    unsafe {
        asm!("cli" ::: "memory" : "volatile");
    }
}

pub(crate) fn sti() {
    unsafe {
        asm!("sti" ::: "memory" : "volatile");
    }
}

pub(crate) fn hlt() {
    unsafe {
        asm!("hlt" :::: "volatile");
    }
}

/// Read EFLAGS, used to snapshot/restore the interrupt-enable bit around a
/// critical section (see `irqlock`).
pub(crate) fn read_eflags() -> u32 {
    let flags: u32;
    unsafe {
        asm!("pushfl; popl $0" : "=r"(flags));
    }
    flags
}

pub(crate) const FL_IF: u32 = 0x0000_0200;
