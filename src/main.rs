#![no_std]
#![no_main]

// The panic handler, global allocator and all real kernel modules live
// in the skyos library crate; this binary crate is just the symbol
// entry.S jumps to.

/// Entry point jumped to by entry.S once paging and the kernel stack
/// are set up. Never returns.
#[no_mangle]
pub extern "C" fn rust_entry() -> ! {
    skyos::kernel_main();
}
