// A process owns everything about a running program: its address
// space, its one task, the record of what it has malloc'd (so exit can
// free it all in one pass), and the input/argument state the syscall
// table reaches into. Kept separate from Task per the split described
// in task.rs.

use crate::constants::*;
use crate::elf::{ElfParser, ProghdrType};
use crate::errors::KernelError;
use crate::kheap;
use crate::pmap::{PageDirectory, PhysAddr, VirtAddr};
use crate::spinlock::Mutex;
use crate::task::{ProcessId, Task, TaskStatus};
use crate::vfs::{self, OpenMode};
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

pub(crate) struct Process {
    pub(crate) id: ProcessId,
    pgdir: PageDirectory,
    pub(crate) task: Task,
    allocations: [Option<u32>; MAX_PROCESS_ALLOCATIONS],
    key_buffer: [u8; PROCESS_KEY_BUFFER_SIZE],
    key_head: usize,
    key_tail: usize,
    /// Where `write_arguments_to_stack` staged `argc`/`argv` in the
    /// process's own address space, for `get_program_arguments` to hand
    /// back verbatim.
    argc: u32,
    argv_user_va: u32,
    /// Kernel-heap backing of the ELF image's loadable segments plus the
    /// user stack, allocated by `load()`; freed by `exit()` alongside the
    /// syscall-tracked `malloc` table.
    image_backings: Vec<u32>,
}

impl Process {
    pub(crate) fn pgdir(&self) -> &PageDirectory {
        &self.pgdir
    }

    pub(crate) fn argc(&self) -> u32 {
        self.argc
    }

    pub(crate) fn argv_user_va(&self) -> u32 {
        self.argv_user_va
    }

    /// Record a syscall-facing allocation so it can be bulk freed on
    /// exit; returns false if the tracking table is full (the caller
    /// should then free the memory back and report out-of-memory).
    pub(crate) fn track_allocation(&mut self, addr: u32) -> bool {
        for slot in self.allocations.iter_mut() {
            if slot.is_none() {
                *slot = Some(addr);
                return true;
            }
        }
        false
    }

    /// Returns false if `addr` was never recorded as one of this
    /// process's allocations, per the `free` syscall's reject contract.
    pub(crate) fn untrack_allocation(&mut self, addr: u32) -> bool {
        for slot in self.allocations.iter_mut() {
            if *slot == Some(addr) {
                *slot = None;
                return true;
            }
        }
        false
    }

    fn free_all_allocations(&mut self) {
        for slot in self.allocations.iter_mut() {
            if let Some(addr) = slot.take() {
                kheap::kfree(addr);
            }
        }
    }

    /// Unmap nothing explicitly (the page directory is about to be
    /// dropped whole) but free the kernel-heap pages backing the ELF
    /// image's segments and the user stack.
    fn free_image_and_stack(&mut self) {
        for addr in self.image_backings.drain(..) {
            kheap::kfree(addr);
        }
    }

    pub(crate) fn push_key(&mut self, byte: u8) {
        let next = (self.key_head + 1) % PROCESS_KEY_BUFFER_SIZE;
        if next == self.key_tail {
            return; // buffer full, drop the key
        }
        self.key_buffer[self.key_head] = byte;
        self.key_head = next;
    }

    pub(crate) fn pop_key(&mut self) -> Option<u8> {
        if self.key_head == self.key_tail {
            return None;
        }
        let byte = self.key_buffer[self.key_tail];
        self.key_tail = (self.key_tail + 1) % PROCESS_KEY_BUFFER_SIZE;
        Some(byte)
    }
}

struct ProcessTable {
    processes: [Option<Process>; MAX_PROCESSES],
    current: Option<usize>,
    next_id: usize,
}

static PROCESS_TABLE: Mutex<ProcessTableWrapper> = Mutex::new(ProcessTableWrapper::new());

struct ProcessTableWrapper(ProcessTable);

impl ProcessTableWrapper {
    const fn new() -> ProcessTableWrapper {
        ProcessTableWrapper(ProcessTable {
            processes: [None, None, None, None, None, None, None, None, None, None, None, None, None, None, None, None],
            current: None,
            next_id: 0,
        })
    }
}

fn round_up_pages(bytes: u32) -> u32 {
    (bytes + PGSIZE - 1) / PGSIZE
}

/// Stage `argc`/`argv` at the top of a freshly allocated user stack, C
/// runtime style: the strings themselves first (growing down from the
/// top), then the pointer array, then a null terminator. `stack_backing`
/// is the kernel-visible physical address the stack's pages were
/// allocated at; since it is identity-mapped under the kernel's own
/// directory it can be written directly, but the pointers stored in the
/// argv array have to be the *user* virtual addresses the process will
/// see once its own directory is active, which live at a fixed offset
/// from `stack_backing`.
///
/// Returns `(argc, argv_user_va)`. The fresh task starts with
/// `esp == argv_user_va`; nothing else is staged below it.
fn write_arguments_to_stack(stack_backing: u32, args: &[String]) -> (u32, u32) {
    let stack_va_base = USER_STACK_TOP - USER_STACK_SIZE;
    let mut cursor = stack_backing + USER_STACK_SIZE;
    let mut arg_vas: Vec<u32> = Vec::with_capacity(args.len());

    for arg in args {
        let bytes = arg.as_bytes();
        cursor -= (bytes.len() + 1) as u32;
        unsafe {
            let dest = cursor as *mut u8;
            core::ptr::copy_nonoverlapping(bytes.as_ptr(), dest, bytes.len());
            *dest.add(bytes.len()) = 0;
        }
        arg_vas.push(stack_va_base + (cursor - stack_backing));
    }

    cursor &= !0x3;
    cursor -= ((arg_vas.len() + 1) * 4) as u32;
    cursor &= !0xf;
    let argv_user_va = stack_va_base + (cursor - stack_backing);
    unsafe {
        let argv_ptr = cursor as *mut u32;
        for (i, va) in arg_vas.iter().enumerate() {
            *argv_ptr.add(i) = *va;
        }
        *argv_ptr.add(arg_vas.len()) = 0;
    }

    (args.len() as u32, argv_user_va)
}

/// Load an ELF image from `path` into a freshly allocated process and
/// mark it runnable. The program's loadable segments and stack are
/// backed by pages pulled from the kernel heap, then remapped into the
/// process's own 4 GiB directory at the addresses the ELF file and the
/// fixed user stack convention expect.
pub(crate) fn load(path: &str, args: &[String]) -> Result<ProcessId, KernelError> {
    let fd = vfs::fopen(path, OpenMode::Read)?;
    let stat = vfs::fstat(fd)?;

    let mut image = vec![0u8; stat.size as usize];
    let mut off = 0usize;
    loop {
        let n = vfs::fread(fd, &mut image[off..])?;
        if n == 0 {
            break;
        }
        off += n;
    }
    vfs::fclose(fd)?;

    let parser = ElfParser::new(image.as_ptr()).ok_or(KernelError::InvalidArgument)?;

    let mut table = PROCESS_TABLE.lock();
    let slot = table.0.processes.iter().position(|p| p.is_none()).ok_or(KernelError::Busy)?;

    let mut pgdir = PageDirectory::new_4gb(PTE_P | PTE_W | PTE_U);
    let mut image_backings = Vec::new();

    for ph in parser.program_headers() {
        if ph.p_type != ProghdrType::PtLoad {
            continue;
        }

        let pages = round_up_pages(ph.p_memsz).max(1);
        let backing = kheap::kzalloc((pages * PGSIZE) as usize).ok_or(KernelError::OutOfMemory)?;
        image_backings.push(backing);

        let seg_data = parser.segment_data(ph);
        unsafe {
            core::ptr::copy_nonoverlapping(seg_data.as_ptr(), backing as *mut u8, seg_data.len());
        }

        pgdir.map_range(
            VirtAddr(ph.p_vaddr),
            PhysAddr(backing),
            pages as usize,
            PTE_P | PTE_W | PTE_U,
        );
    }

    let stack_pages = USER_STACK_SIZE / PGSIZE;
    let stack_backing = kheap::kzalloc((stack_pages * PGSIZE) as usize).ok_or(KernelError::OutOfMemory)?;
    image_backings.push(stack_backing);
    pgdir.map_range(
        VirtAddr(USER_STACK_TOP - USER_STACK_SIZE),
        PhysAddr(stack_backing),
        stack_pages as usize,
        PTE_P | PTE_W | PTE_U,
    );

    let (argc, argv_user_va) = write_arguments_to_stack(stack_backing, args);

    let id = ProcessId(table.0.next_id);
    table.0.next_id += 1;

    let mut task = Task::new(id);
    task.trapframe.set_entry_point(parser.entry_point());
    task.trapframe.tf_esp = argv_user_va as usize;

    table.0.processes[slot] = Some(Process {
        id,
        pgdir,
        task,
        allocations: [None; MAX_PROCESS_ALLOCATIONS],
        key_buffer: [0; PROCESS_KEY_BUFFER_SIZE],
        key_head: 0,
        key_tail: 0,
        argc,
        argv_user_va,
        image_backings,
    });

    Ok(id)
}

/// Tear a process down: free its syscall-tracked `malloc`s and its ELF
/// image/stack pages, then drop the process entirely, which releases
/// its `PageDirectory` and frees its process-table slot for reuse.
pub(crate) fn exit(id: ProcessId) {
    let mut table = PROCESS_TABLE.lock();
    if let Some(idx) = table.0.processes.iter().position(|p| p.as_ref().map(|p| p.id) == Some(id)) {
        if let Some(p) = table.0.processes[idx].as_mut() {
            p.free_all_allocations();
            p.free_image_and_stack();
        }
        table.0.processes[idx] = None;
        if table.0.current == Some(idx) {
            table.0.current = None;
        }
    }
}

pub(crate) fn with_current<F, R>(f: F) -> Option<R>
where
    F: FnOnce(&mut Process) -> R,
{
    let mut table = PROCESS_TABLE.lock();
    let idx = table.0.current?;
    table.0.processes[idx].as_mut().map(f)
}

pub(crate) fn switch_to(id: ProcessId) {
    let mut table = PROCESS_TABLE.lock();
    if let Some(idx) = table.0.processes.iter().position(|p| p.as_ref().map(|p| p.id) == Some(id)) {
        table.0.current = Some(idx);
        if let Some(p) = table.0.processes[idx].as_mut() {
            p.task.status = TaskStatus::Running;
            crate::pmap::switch(&p.pgdir);
        }
    }
}

/// Find the next runnable task after the currently running one,
/// wrapping around, for the cooperative round-robin ring.
pub(crate) fn next_runnable() -> Option<ProcessId> {
    let table = PROCESS_TABLE.lock();
    let start = table.0.current.map(|i| i + 1).unwrap_or(0);

    for i in 0..MAX_PROCESSES {
        let idx = (start + i) % MAX_PROCESSES;
        if let Some(p) = &table.0.processes[idx] {
            if p.task.is_runnable() || p.task.status == TaskStatus::Running {
                return Some(p.id);
            }
        }
    }
    None
}

pub(crate) fn current_id() -> Option<ProcessId> {
    let table = PROCESS_TABLE.lock();
    table.0.current.and_then(|idx| table.0.processes[idx].as_ref().map(|p| p.id))
}
