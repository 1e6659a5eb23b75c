// Capability-record virtual filesystem layer, generalized from the
// DevSw pattern the console/disk devices used to register themselves
// with: instead of a table of character devices, this is a table of
// mounted filesystems, each exposing the same small set of operations.

use crate::constants::MAX_OPEN_FILES;
use crate::errors::KernelError;
use crate::fat16::Fat16;
use crate::once::Once;
use crate::path;
use crate::spinlock::Mutex;
use crate::streamer::DiskStreamer;

#[derive(Debug, Clone, Copy)]
pub(crate) struct FileStat {
    pub(crate) size: u32,
    pub(crate) is_directory: bool,
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum OpenMode {
    Read,
    Write,
}

#[derive(Clone, Copy)]
struct OpenFile {
    first_cluster: u16,
    size: u32,
    pos: u32,
}

static ROOT_FS: Once<Fat16> = Once::new();
static OPEN_FILES: Mutex<[Option<OpenFile>; MAX_OPEN_FILES]> = Mutex::new([None; MAX_OPEN_FILES]);

pub(crate) fn init() {
    ROOT_FS.call_once(|| Fat16::mount().expect("failed to mount filesystem image"));
    println!("vfs: mounted disk 0");
}

/// Index 0 is reserved and never handed out as a real descriptor;
/// slots 1..MAX_OPEN_FILES are allocated densely.
fn find_free_slot(table: &[Option<OpenFile>; MAX_OPEN_FILES]) -> Option<usize> {
    table.iter().enumerate().skip(1).find(|(_, f)| f.is_none()).map(|(i, _)| i)
}

/// Open a path for reading. Writing is not supported by the on-disk
/// filesystem this kernel ships; `mode == OpenMode::Write` always fails
/// with `KernelError::ReadOnly`.
pub(crate) fn fopen(raw_path: &str, mode: OpenMode) -> Result<i32, KernelError> {
    if mode == OpenMode::Write {
        return Err(KernelError::ReadOnly);
    }

    let parsed = path::parse(raw_path)?;
    if parsed.disk != 0 {
        return Err(KernelError::NoSuchFile);
    }

    let fs = ROOT_FS.try_get().ok_or(KernelError::DiskError)?;
    let mut stream = DiskStreamer::new();
    let entry = fs.resolve(&mut stream, &parsed.parts)?;

    if entry.is_directory {
        return Err(KernelError::NotADirectory);
    }

    let mut table = OPEN_FILES.lock();
    let slot = find_free_slot(&table).ok_or(KernelError::TooManyOpenFiles)?;
    table[slot] = Some(OpenFile {
        first_cluster: entry.first_cluster,
        size: entry.size,
        pos: 0,
    });

    Ok(slot as i32)
}

pub(crate) fn fread(fd: i32, buf: &mut [u8]) -> Result<usize, KernelError> {
    let fs = ROOT_FS.try_get().ok_or(KernelError::DiskError)?;
    let mut table = OPEN_FILES.lock();
    let file = table
        .get_mut(fd as usize)
        .and_then(|f| f.as_mut())
        .ok_or(KernelError::InvalidArgument)?;

    let remaining = file.size.saturating_sub(file.pos) as usize;
    let want = core::cmp::min(buf.len(), remaining);
    if want == 0 {
        return Ok(0);
    }

    let mut stream = DiskStreamer::new();
    let n = fs.read_file(&mut stream, file.first_cluster, file.pos, &mut buf[..want])?;
    file.pos += n as u32;
    Ok(n)
}

pub(crate) fn fseek(fd: i32, pos: u32) -> Result<(), KernelError> {
    let mut table = OPEN_FILES.lock();
    let file = table
        .get_mut(fd as usize)
        .and_then(|f| f.as_mut())
        .ok_or(KernelError::InvalidArgument)?;
    file.pos = core::cmp::min(pos, file.size);
    Ok(())
}

pub(crate) fn fstat(fd: i32) -> Result<FileStat, KernelError> {
    let table = OPEN_FILES.lock();
    let file = table
        .get(fd as usize)
        .and_then(|f| f.as_ref())
        .ok_or(KernelError::InvalidArgument)?;
    Ok(FileStat {
        size: file.size,
        is_directory: false,
    })
}

pub(crate) fn fclose(fd: i32) -> Result<(), KernelError> {
    let mut table = OPEN_FILES.lock();
    let slot = table.get_mut(fd as usize).ok_or(KernelError::InvalidArgument)?;
    if slot.is_none() {
        return Err(KernelError::InvalidArgument);
    }
    *slot = None;
    Ok(())
}
