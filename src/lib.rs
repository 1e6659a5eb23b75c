// `cargo test` runs unit tests on the host, where std is available and
// needed by the test harness; `no_std` only applies to the real kernel
// build target.
#![cfg_attr(not(test), no_std)]
#![feature(asm)]
#![feature(const_fn)]
#![feature(alloc_error_handler)]

extern crate alloc;

#[macro_use]
pub(crate) mod console;

pub(crate) mod allocator;
pub(crate) mod constants;
pub(crate) mod elf;
pub(crate) mod errors;
pub(crate) mod fat16;
pub(crate) mod gdt;
pub(crate) mod ide;
pub(crate) mod irqlock;
pub(crate) mod kbd;
pub(crate) mod kheap;
pub(crate) mod once;
pub(crate) mod path;
pub(crate) mod picirq;
pub(crate) mod pmap;
pub(crate) mod process;
pub(crate) mod sched;
pub(crate) mod serial;
pub(crate) mod spinlock;
pub(crate) mod streamer;
pub(crate) mod syscall;
pub(crate) mod task;
pub(crate) mod trap;
pub(crate) mod vfs;
pub(crate) mod vga_buffer;
pub(crate) mod volatile;
pub(crate) mod x86;

use core::alloc::Layout;
use core::panic::PanicInfo;
use vga_buffer::Buffer;

#[cfg(not(test))]
#[global_allocator]
static ALLOCATOR: allocator::HeapAllocator = allocator::HeapAllocator;

/// Backing store for the `alloc`-facing global allocator. This is a
/// fixed static region rather than a linear address past the kernel
/// image, so it's already covered by the bootstrap identity map
/// `entrypgdir.c` installs and doesn't depend on `pmap::init` having
/// run yet.
#[cfg(not(test))]
const GLOBAL_HEAP_SIZE: usize = 1024 * 1024;
#[cfg(not(test))]
static mut GLOBAL_HEAP: [u8; GLOBAL_HEAP_SIZE] = [0; GLOBAL_HEAP_SIZE];

#[cfg(not(test))]
#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    println!("kernel panic: {}", info);
    loop {
        x86::hlt();
    }
}

#[cfg(not(test))]
#[alloc_error_handler]
fn alloc_error(layout: Layout) -> ! {
    panic!("allocation error: {:?}", layout);
}

/// Boot sequence: console -> GDT -> kernel heap -> VFS/disk probe ->
/// IDT -> TSS -> kernel page directory -> enable paging -> syscall
/// table (the dispatch table in syscall.rs needs no explicit register
/// step, it's just a `match`) -> keyboard -> load the first process.
/// Thereafter the kernel is re-entered only through `trap::trap`.
pub fn kernel_main() -> ! {
    let vga_buffer = unsafe { &mut *(constants::VGA_BUFFER_ADDR as *mut Buffer) };
    vga_buffer::init_writer(vga_buffer);

    println!("skyos: booting");

    unsafe {
        allocator::HeapAllocator::init(GLOBAL_HEAP.as_mut_ptr() as usize, GLOBAL_HEAP_SIZE);
    }

    unsafe {
        gdt::init_percpu();
    }
    println!("gdt: loaded");

    kheap::init();
    println!("kheap: initialized");

    vfs::init();

    unsafe {
        trap::trap_init();
    }
    println!("trap: IDT and TSS loaded");

    pmap::init();

    picirq::pic_init();
    kbd::init();
    println!("kbd: initialized");

    x86::sti();

    match process::load("0:/init.elf", &[]) {
        Ok(_) => println!("process: loaded initial task"),
        Err(e) => panic!("failed to load initial process: {:?}", e),
    }

    sched::run_first_ever_task();
}
