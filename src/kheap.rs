// Bitmap first-fit kernel heap, 4 KiB blocks. This is the heap that
// backs the `malloc`/`free` syscalls, kept entirely separate from the
// `alloc::`-facing allocator in allocator.rs: the global allocator backs
// the kernel's own `Box`/`Vec` usage, this one backs user-requested
// memory so a process's allocations can be tracked and bulk-freed on
// exit via `Process::allocations`.

use crate::constants::{KHEAP_BASE, KHEAP_BLOCK_SIZE, KHEAP_SIZE};
use crate::irqlock::hold_off;
use core::ptr;

const TABLE_LEN: usize = KHEAP_SIZE / KHEAP_BLOCK_SIZE;

const BLOCK_FREE: u8 = 0x00;
const BLOCK_TAKEN: u8 = 0x01;
const BLOCK_IS_FIRST: u8 = 0x02;
const BLOCK_HAS_NEXT: u8 = 0x04;

struct HeapTable {
    entries: [u8; TABLE_LEN],
    base: u32,
}

impl HeapTable {
    const fn new(base: u32) -> HeapTable {
        HeapTable {
            entries: [BLOCK_FREE; TABLE_LEN],
            base,
        }
    }

    fn blocks_needed(size: usize) -> usize {
        (size + KHEAP_BLOCK_SIZE - 1) / KHEAP_BLOCK_SIZE
    }

    fn find_free_run(&self, blocks: usize) -> Option<usize> {
        let mut start = None;
        let mut run = 0;
        for i in 0..TABLE_LEN {
            if self.entries[i] & BLOCK_TAKEN == 0 {
                if start.is_none() {
                    start = Some(i);
                }
                run += 1;
                if run == blocks {
                    return start;
                }
            } else {
                start = None;
                run = 0;
            }
        }
        None
    }

    fn block_addr(&self, index: usize) -> u32 {
        self.base + (index as u32) * (KHEAP_BLOCK_SIZE as u32)
    }

    fn addr_to_block(&self, addr: u32) -> usize {
        ((addr - self.base) / KHEAP_BLOCK_SIZE as u32) as usize
    }

    fn alloc(&mut self, size: usize) -> Option<u32> {
        if size == 0 {
            return None;
        }
        let blocks = Self::blocks_needed(size);
        let start = self.find_free_run(blocks)?;

        for i in start..start + blocks {
            let mut flags = BLOCK_TAKEN;
            if i == start {
                flags |= BLOCK_IS_FIRST;
            }
            if i != start + blocks - 1 {
                flags |= BLOCK_HAS_NEXT;
            }
            self.entries[i] = flags;
        }

        Some(self.block_addr(start))
    }

    fn free(&mut self, addr: u32) {
        let mut i = self.addr_to_block(addr);
        assert!(self.entries[i] & BLOCK_IS_FIRST != 0, "free() on a non-block-start address");
        loop {
            let had_next = self.entries[i] & BLOCK_HAS_NEXT != 0;
            self.entries[i] = BLOCK_FREE;
            if !had_next {
                break;
            }
            i += 1;
        }
    }
}

static mut TABLE: HeapTable = HeapTable::new(KHEAP_BASE);

/// Zero out the heap bookkeeping table. The backing linear range
/// (`KHEAP_BASE..KHEAP_BASE + KHEAP_SIZE`) is already reachable since
/// every process page directory identity-maps the full 4 GiB space.
pub(crate) fn init() {
    let _guard = hold_off();
    unsafe {
        TABLE = HeapTable::new(KHEAP_BASE);
    }
    println!(
        "kheap: {} blocks of {} bytes at 0x{:x}",
        TABLE_LEN, KHEAP_BLOCK_SIZE, KHEAP_BASE
    );
}

/// Allocate `size` bytes, content left unspecified (matches the
/// syscall-facing `malloc`, which does not zero memory).
pub(crate) fn kmalloc(size: usize) -> Option<u32> {
    let _guard = hold_off();
    unsafe { TABLE.alloc(size) }
}

pub(crate) fn kzalloc(size: usize) -> Option<u32> {
    let addr = kmalloc(size)?;
    unsafe {
        ptr::write_bytes(addr as *mut u8, 0, size);
    }
    Some(addr)
}

pub(crate) fn kfree(addr: u32) {
    let _guard = hold_off();
    unsafe {
        TABLE.free(addr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_rounds_up_to_block_size() {
        let mut t = HeapTable::new(0x1000);
        let a = t.alloc(1).unwrap();
        assert_eq!(a, 0x1000);
        assert_eq!(t.entries[0] & BLOCK_TAKEN, BLOCK_TAKEN);
        assert_eq!(t.entries[1] & BLOCK_TAKEN, 0);
    }

    #[test]
    fn alloc_spans_multiple_blocks_and_frees_the_whole_run() {
        let mut t = HeapTable::new(0);
        let size = KHEAP_BLOCK_SIZE * 3 - 1;
        let a = t.alloc(size).unwrap();
        assert_eq!(HeapTable::blocks_needed(size), 3);
        assert!(t.entries[0] & BLOCK_IS_FIRST != 0);
        assert!(t.entries[0] & BLOCK_HAS_NEXT != 0);
        assert!(t.entries[2] & BLOCK_HAS_NEXT == 0);

        t.free(a);
        for i in 0..3 {
            assert_eq!(t.entries[i], BLOCK_FREE);
        }
    }

    #[test]
    fn first_fit_skips_a_too_small_gap() {
        let mut t = HeapTable::new(0);
        let a = t.alloc(KHEAP_BLOCK_SIZE).unwrap();
        let b = t.alloc(KHEAP_BLOCK_SIZE).unwrap();
        t.free(a);
        // gap at block 0 is only one block; a 2-block request must
        // skip it and land after b.
        let c = t.alloc(KHEAP_BLOCK_SIZE * 2).unwrap();
        assert_eq!(t.addr_to_block(c), t.addr_to_block(b) + 1);
    }

    #[test]
    fn zero_size_alloc_fails() {
        let mut t = HeapTable::new(0);
        assert!(t.alloc(0).is_none());
    }

    #[test]
    fn alloc_fails_when_exhausted() {
        let mut t = HeapTable::new(0);
        assert!(t.alloc(KHEAP_SIZE + KHEAP_BLOCK_SIZE).is_none());
    }

    #[test]
    #[should_panic(expected = "free() on a non-block-start address")]
    fn free_rejects_mid_block_address() {
        let mut t = HeapTable::new(0);
        t.alloc(KHEAP_BLOCK_SIZE * 2).unwrap();
        t.free(KHEAP_BLOCK_SIZE as u32);
    }
}
