// A disk-backed byte cursor: reads arbitrary byte ranges by translating
// them to sector reads under the hood, tracking its own position so
// callers can treat the disk a little like a file.

use crate::constants::{FS_RESERVED_SECTORS, SECTOR_SIZE};
use crate::errors::KernelError;
use crate::ide;

pub(crate) struct DiskStreamer {
    pos: u32,
}

impl DiskStreamer {
    pub(crate) fn new() -> DiskStreamer {
        DiskStreamer { pos: 0 }
    }

    pub(crate) fn seek(&mut self, pos: u32) {
        self.pos = pos;
    }

    pub(crate) fn pos(&self) -> u32 {
        self.pos
    }

    /// Read `buf.len()` bytes starting at the stream's current byte
    /// offset into the filesystem image, advancing the cursor.
    pub(crate) fn read(&mut self, buf: &mut [u8]) -> Result<(), KernelError> {
        let mut remaining = buf.len();
        let mut out_off = 0usize;
        let mut byte_pos = self.pos;

        let mut sector_buf = [0u8; SECTOR_SIZE as usize];
        while remaining > 0 {
            let lba = FS_RESERVED_SECTORS + byte_pos / SECTOR_SIZE;
            let sector_off = (byte_pos % SECTOR_SIZE) as usize;
            ide::read_sector(lba, &mut sector_buf)?;

            let take = core::cmp::min(remaining, SECTOR_SIZE as usize - sector_off);
            buf[out_off..out_off + take].copy_from_slice(&sector_buf[sector_off..sector_off + take]);

            out_off += take;
            byte_pos += take as u32;
            remaining -= take;
        }

        self.pos = byte_pos;
        Ok(())
    }
}
