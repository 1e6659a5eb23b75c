// Boot-time / compile-time configuration. There is no runtime config
// surface (nothing meaningful exists pre-paging); every tunable the
// kernel needs lives here, the way the teacher's own constants.rs does.

pub(crate) const KERN_BASE: u32 = 0xf000_0000;
pub(crate) const PGSIZE: u32 = 4096;
pub(crate) const PGSHIFT: u32 = 12;
pub(crate) const PTE_U: u32 = 0x4;
pub(crate) const PTE_W: u32 = 0x2;
pub(crate) const PTE_P: u32 = 0x1;
pub(crate) const NPDENTRIES: usize = 1024;
pub(crate) const NPTENTRIES: usize = 1024;
pub(crate) const PTSIZE: usize = NPTENTRIES * (PGSIZE as usize);

pub(crate) const CR0_PE: u32 = 0x0000001; // Protection Enable
pub(crate) const CR0_MP: u32 = 0x0000002; // Monitor coProcessor
pub(crate) const CR0_EM: u32 = 0x0000004; // Emulation
pub(crate) const CR0_TS: u32 = 0x0000008; // Task Switched
pub(crate) const CR0_ET: u32 = 0x0000010; // Extension Type
pub(crate) const CR0_NE: u32 = 0x0000020; // Numeric Error
pub(crate) const CR0_WP: u32 = 0x0010000; // Write Protect
pub(crate) const CR0_AM: u32 = 0x0040000; // Alignment Mask
pub(crate) const CR0_NW: u32 = 0x2000000; // Not Write through
pub(crate) const CR0_CD: u32 = 0x4000000; // Cache Disable
pub(crate) const CR0_PG: u32 = 0x8000000; // Paging

// --- Boot protocol (spec.md 6) ---

/// Physical address the boot sector loads the flat kernel image to.
pub(crate) const KERNEL_LOAD_ADDR: u32 = 0x0010_0000;
/// Stack base the boot sector hands off with.
pub(crate) const BOOT_STACK_BASE: u32 = 0x0020_0000;
/// Linear address of the VGA text buffer.
pub(crate) const VGA_BUFFER_ADDR: u32 = 0x000B_8000;

// --- Disk image layout (spec.md 6) ---

pub(crate) const SECTOR_SIZE: u32 = 512;
/// First sector of the FAT16 filesystem image.
pub(crate) const FS_START_SECTOR: u32 = 200;
/// Reserved sectors ahead of the filesystem (boot sector + kernel image).
pub(crate) const FS_RESERVED_SECTORS: u32 = 200;
pub(crate) const FS_VOLUME_LABEL: &str = "SKYOS";
pub(crate) const FS_SECTORS_PER_CLUSTER: u8 = 1;
/// Exactly 15 MiB.
pub(crate) const FS_IMAGE_SIZE: u64 = 15 * 1024 * 1024;

// --- Process / task model ---

pub(crate) const PROGRAM_VIRTUAL_ADDRESS: u32 = 0x0040_0000;
pub(crate) const USER_STACK_SIZE: u32 = 1024 * 1024; // 1 MiB
/// Fixed high virtual address the user stack is mapped at, distinct from
/// the kernel's own stack region.
pub(crate) const USER_STACK_TOP: u32 = 0x3FF0_0000;

pub(crate) const MAX_PROCESSES: usize = 16;
/// Per-process syscall-tracked allocation table size (spec.md 3,
/// `Process::allocations[N]`).
pub(crate) const MAX_PROCESS_ALLOCATIONS: usize = 1024;
pub(crate) const MAX_PATH: usize = 108;
pub(crate) const MAX_ARG_LEN: usize = 512;
pub(crate) const MAX_ARGS: usize = 16;
pub(crate) const PROCESS_KEY_BUFFER_SIZE: usize = 64;

pub(crate) const KSTACKTOP: u32 = KERN_BASE;
pub(crate) const KSTKSIZE: u32 = 8 * PGSIZE;
pub(crate) const KSTKGAP: u32 = 8 * PGSIZE;
pub(crate) const MMIOLIM: u32 = KSTACKTOP - (PTSIZE as u32);
pub(crate) const MMIOBASE: u32 = MMIOLIM - (PTSIZE as u32);
pub(crate) const ULIM: u32 = MMIOBASE;

// --- Kernel heap (spec.md 4.5) ---

/// 4 KiB blocks. The table has `(KHEAP_SIZE / KHEAP_BLOCK_SIZE)` entries.
pub(crate) const KHEAP_BLOCK_SIZE: usize = PGSIZE as usize;
pub(crate) const KHEAP_SIZE: usize = 3 * PTSIZE;
pub(crate) const KHEAP_BASE: u32 = ULIM - KHEAP_SIZE as u32;

// --- Disk / ATA ---

pub(crate) const ATA_PRIMARY_IO_BASE: u16 = 0x1F0;
pub(crate) const ATA_PRIMARY_CTRL_BASE: u16 = 0x3F6;
pub(crate) const NDISK: usize = 1;
pub(crate) const MAX_OPEN_FILES: usize = 64;

// --- Console (spec.md 6) ---

pub(crate) const CONSOLE_ROWS: usize = 20;
pub(crate) const CONSOLE_COLS: usize = 80;
pub(crate) const CONSOLE_DEFAULT_ATTR: u8 = 0x0F;
