// The int 0x80 command table. Each handler reads its own arguments off
// the calling task's user stack through a bounded peek helper rather
// than trusting registers, since `trap::trap` hands us nothing but the
// trapframe and the task is free to have built its stack however it
// likes.

use crate::constants::*;
use crate::errors::KernelError;
use crate::kheap;
use crate::pmap::{self, VirtAddr};
use crate::process;
use crate::sched;
use crate::trap::Trapframe;
use alloc::string::String;
use alloc::vec::Vec;

pub(crate) mod consts {
    pub(crate) const SYS_SUM: u32 = 0;
    pub(crate) const SYS_PRINT: u32 = 1;
    pub(crate) const SYS_GETKEY: u32 = 2;
    pub(crate) const SYS_PUTCHAR: u32 = 3;
    pub(crate) const SYS_MALLOC: u32 = 4;
    pub(crate) const SYS_FREE: u32 = 5;
    pub(crate) const SYS_PROCESS_LOAD_START: u32 = 6;
    pub(crate) const SYS_INVOKE_SYSTEM_COMMAND: u32 = 7;
    pub(crate) const SYS_GET_PROGRAM_ARGUMENTS: u32 = 8;
    pub(crate) const SYS_EXIT: u32 = 9;

    pub(crate) fn is_known(command: u32) -> bool {
        command <= SYS_EXIT
    }
}
use consts::*;

const MAX_PRINT_LEN: usize = 1024;

/// Read one dword at an arbitrary user virtual address, temporarily
/// switching CR3 to the current process's own directory and back.
fn peek_dword_at(va: VirtAddr) -> Option<u32> {
    process::with_current(|p| {
        pmap::switch(p.pgdir());
        let v = unsafe { *va.as_ptr::<u32>() };
        pmap::switch_to_kernel();
        v
    })
}

/// Read the `index`-th dword above the trapframe's saved `esp`, i.e.
/// the `index`-th argument the caller pushed before `int 0x80`.
fn peek_arg(frame: &Trapframe, index: usize) -> Option<u32> {
    peek_dword_at(VirtAddr(frame.tf_esp as u32) + (index as u32) * 4)
}

/// Copy a NUL-terminated string out of user space, capped at `max_len`.
fn peek_cstr_at(va: VirtAddr, max_len: usize) -> Option<String> {
    process::with_current(|p| {
        pmap::switch(p.pgdir());
        let mut bytes = Vec::new();
        unsafe {
            let mut cur = va.as_ptr::<u8>();
            for _ in 0..max_len {
                let b = *cur;
                if b == 0 {
                    break;
                }
                bytes.push(b);
                cur = cur.add(1);
            }
        }
        pmap::switch_to_kernel();
        String::from_utf8_lossy(&bytes).into_owned()
    })
}

fn peek_cstr_arg(frame: &Trapframe, index: usize, max_len: usize) -> Option<String> {
    let ptr = peek_arg(frame, index)?;
    peek_cstr_at(VirtAddr(ptr), max_len)
}

fn poke_dwords_at(va: VirtAddr, values: &[u32]) -> Option<()> {
    process::with_current(|p| {
        pmap::switch(p.pgdir());
        unsafe {
            let ptr = va.as_mut_ptr::<u32>();
            for (i, v) in values.iter().enumerate() {
                *ptr.add(i) = *v;
            }
        }
        pmap::switch_to_kernel();
    })
}

fn sys_sum(frame: &Trapframe) -> Result<i32, KernelError> {
    let a = peek_arg(frame, 0).ok_or(KernelError::InvalidArgument)? as i32;
    let b = peek_arg(frame, 1).ok_or(KernelError::InvalidArgument)? as i32;
    Ok(a + b)
}

fn sys_print(frame: &Trapframe) -> Result<i32, KernelError> {
    let msg = peek_cstr_arg(frame, 0, MAX_PRINT_LEN).ok_or(KernelError::InvalidArgument)?;
    print!("{}", msg);
    Ok(0)
}

fn sys_getkey() -> Result<i32, KernelError> {
    let key = process::with_current(|p| p.pop_key()).ok_or(KernelError::NoSuchProcess)?;
    Ok(key.unwrap_or(0) as i32)
}

fn sys_putchar(frame: &Trapframe) -> Result<i32, KernelError> {
    let c = peek_arg(frame, 0).ok_or(KernelError::InvalidArgument)? as u8;
    print!("{}", c as char);
    Ok(0)
}

fn sys_malloc(frame: &Trapframe) -> Result<i32, KernelError> {
    let size = peek_arg(frame, 0).ok_or(KernelError::InvalidArgument)? as usize;
    let addr = kheap::kmalloc(size).ok_or(KernelError::OutOfMemory)?;
    let tracked = process::with_current(|p| p.track_allocation(addr)).unwrap_or(false);
    if !tracked {
        kheap::kfree(addr);
        return Err(KernelError::OutOfMemory);
    }
    Ok(addr as i32)
}

fn sys_free(frame: &Trapframe) -> Result<i32, KernelError> {
    let addr = peek_arg(frame, 0).ok_or(KernelError::InvalidArgument)?;
    let owned = process::with_current(|p| p.untrack_allocation(addr)).unwrap_or(false);
    if !owned {
        return Err(KernelError::InvalidArgument);
    }
    kheap::kfree(addr);
    Ok(0)
}

fn sys_process_load_start(frame: &Trapframe) -> Result<i32, KernelError> {
    let path = peek_cstr_arg(frame, 0, MAX_PATH).ok_or(KernelError::InvalidArgument)?;
    let id = process::load(&path, &[])?;
    process::switch_to(id);
    Ok(0)
}

fn sys_invoke_system_command(frame: &Trapframe) -> Result<i32, KernelError> {
    let argv_ptr = peek_arg(frame, 0).ok_or(KernelError::InvalidArgument)?;

    let mut args = Vec::new();
    for i in 0..MAX_ARGS {
        let entry = peek_dword_at(VirtAddr(argv_ptr) + (i as u32) * 4).ok_or(KernelError::InvalidArgument)?;
        if entry == 0 {
            break;
        }
        args.push(peek_cstr_at(VirtAddr(entry), MAX_ARG_LEN).ok_or(KernelError::InvalidArgument)?);
    }

    if args.is_empty() {
        return Err(KernelError::InvalidArgument);
    }
    let path = args.remove(0);
    let id = process::load(&path, &args)?;
    process::switch_to(id);
    Ok(0)
}

fn sys_get_program_arguments(frame: &Trapframe) -> Result<i32, KernelError> {
    let out_ptr = peek_arg(frame, 0).ok_or(KernelError::InvalidArgument)?;
    let (argc, argv_va) =
        process::with_current(|p| (p.argc(), p.argv_user_va())).ok_or(KernelError::NoSuchProcess)?;
    poke_dwords_at(VirtAddr(out_ptr), &[argc, argv_va]).ok_or(KernelError::InvalidArgument)?;
    Ok(0)
}

fn sys_exit() -> Result<i32, KernelError> {
    let id = process::current_id().ok_or(KernelError::NoSuchProcess)?;
    process::exit(id);
    sched::schedule_next();
    Ok(0)
}

/// Dispatch one `int 0x80` invocation. Never panics on a bad command;
/// an unrecognized command id is logged and answered with 0 rather than
/// an error code. A recognized command with a malformed argument still
/// gets back a negative `KernelError` code in `eax`.
pub(crate) fn dispatch(command: u32, frame: &mut Trapframe) -> i32 {
    if !consts::is_known(command) {
        println!("syscall: unknown command {}", command);
        return 0;
    }

    let result = match command {
        SYS_SUM => sys_sum(frame),
        SYS_PRINT => sys_print(frame),
        SYS_GETKEY => sys_getkey(),
        SYS_PUTCHAR => sys_putchar(frame),
        SYS_MALLOC => sys_malloc(frame),
        SYS_FREE => sys_free(frame),
        SYS_PROCESS_LOAD_START => sys_process_load_start(frame),
        SYS_INVOKE_SYSTEM_COMMAND => sys_invoke_system_command(frame),
        SYS_GET_PROGRAM_ARGUMENTS => sys_get_program_arguments(frame),
        SYS_EXIT => sys_exit(),
        _ => unreachable!("command already checked against is_known"),
    };

    match result {
        Ok(v) => v,
        Err(e) => e.into(),
    }
}
