// FAT16 filesystem: BIOS parameter block parsing, root/sub-directory
// traversal, and cluster-chain following over the disk image built by
// the boot tooling (disk layout documented in constants.rs).

use crate::constants::{FS_RESERVED_SECTORS, SECTOR_SIZE};
use crate::errors::KernelError;
use crate::streamer::DiskStreamer;
use alloc::string::String;
use alloc::vec::Vec;

const DIRENT_SIZE: usize = 32;
const ATTR_DIRECTORY: u8 = 0x10;
const ATTR_VOLUME_ID: u8 = 0x08;
const FAT16_EOC: u16 = 0xfff8;
const FAT16_FREE: u16 = 0x0000;
const FAT16_BAD: u16 = 0xfff7;

#[derive(Debug)]
pub(crate) struct BiosParameterBlock {
    pub(crate) bytes_per_sector: u16,
    pub(crate) sectors_per_cluster: u8,
    pub(crate) reserved_sector_count: u16,
    pub(crate) num_fats: u8,
    pub(crate) root_entry_count: u16,
    pub(crate) total_sectors: u32,
    pub(crate) sectors_per_fat: u16,
}

impl BiosParameterBlock {
    fn parse(sector: &[u8; SECTOR_SIZE as usize]) -> Result<BiosParameterBlock, KernelError> {
        let u16_at = |off: usize| u16::from_le_bytes([sector[off], sector[off + 1]]);
        let u32_at = |off: usize| {
            u32::from_le_bytes([sector[off], sector[off + 1], sector[off + 2], sector[off + 3]])
        };

        let bytes_per_sector = u16_at(11);
        let sectors_per_cluster = sector[13];
        let reserved_sector_count = u16_at(14);
        let num_fats = sector[16];
        let root_entry_count = u16_at(17);
        let total_sectors16 = u16_at(19);
        let sectors_per_fat = u16_at(22);
        let total_sectors32 = u32_at(32);

        if bytes_per_sector as u32 != SECTOR_SIZE {
            return Err(KernelError::DiskError);
        }

        let total_sectors = if total_sectors16 != 0 {
            total_sectors16 as u32
        } else {
            total_sectors32
        };

        Ok(BiosParameterBlock {
            bytes_per_sector,
            sectors_per_cluster,
            reserved_sector_count,
            num_fats,
            root_entry_count,
            total_sectors,
            sectors_per_fat,
        })
    }

    fn root_dir_sector(&self) -> u32 {
        FS_RESERVED_SECTORS + self.reserved_sector_count as u32 + (self.num_fats as u32) * (self.sectors_per_fat as u32)
    }

    fn root_dir_sectors(&self) -> u32 {
        let bytes = self.root_entry_count as u32 * DIRENT_SIZE as u32;
        (bytes + SECTOR_SIZE - 1) / SECTOR_SIZE
    }

    fn first_data_sector(&self) -> u32 {
        self.root_dir_sector() + self.root_dir_sectors()
    }

    fn fat_start_sector(&self) -> u32 {
        FS_RESERVED_SECTORS + self.reserved_sector_count as u32
    }

    fn cluster_to_sector(&self, cluster: u16) -> u32 {
        self.first_data_sector() + ((cluster as u32).saturating_sub(2)) * self.sectors_per_cluster as u32
    }

    fn cluster_size_bytes(&self) -> u32 {
        self.sectors_per_cluster as u32 * SECTOR_SIZE
    }
}

#[derive(Debug, Clone)]
pub(crate) struct DirEntry {
    pub(crate) name: String,
    pub(crate) is_directory: bool,
    pub(crate) first_cluster: u16,
    pub(crate) size: u32,
}

fn decode_8_3(raw: &[u8]) -> String {
    let name = core::str::from_utf8(&raw[0..8]).unwrap_or("").trim_end();
    let ext = core::str::from_utf8(&raw[8..11]).unwrap_or("").trim_end();
    if ext.is_empty() {
        String::from(name)
    } else {
        let mut s = String::from(name);
        s.push('.');
        s.push_str(ext);
        s
    }
}

fn parse_dirent(raw: &[u8]) -> Option<DirEntry> {
    if raw[0] == 0x00 || raw[0] == 0xe5 {
        return None;
    }
    let attr = raw[11];
    if attr == 0x0f || attr & ATTR_VOLUME_ID != 0 {
        return None;
    }

    let first_cluster = u16::from_le_bytes([raw[26], raw[27]]);
    let size = u32::from_le_bytes([raw[28], raw[29], raw[30], raw[31]]);

    Some(DirEntry {
        name: decode_8_3(raw),
        is_directory: attr & ATTR_DIRECTORY != 0,
        first_cluster,
        size,
    })
}

pub(crate) struct Fat16 {
    bpb: BiosParameterBlock,
}

impl Fat16 {
    pub(crate) fn mount() -> Result<Fat16, KernelError> {
        let mut stream = DiskStreamer::new();
        let mut sector = [0u8; SECTOR_SIZE as usize];
        stream.read(&mut sector)?;
        let bpb = BiosParameterBlock::parse(&sector)?;
        Ok(Fat16 { bpb })
    }

    fn read_sector_at(&self, stream: &mut DiskStreamer, lba: u32, out: &mut [u8; SECTOR_SIZE as usize]) -> Result<(), KernelError> {
        stream.seek((lba - FS_RESERVED_SECTORS) * SECTOR_SIZE);
        stream.read(out)
    }

    fn fat_entry(&self, stream: &mut DiskStreamer, cluster: u16) -> Result<u16, KernelError> {
        let fat_byte_off = cluster as u32 * 2;
        let sector = self.bpb.fat_start_sector() + fat_byte_off / SECTOR_SIZE;
        let offset_in_sector = (fat_byte_off % SECTOR_SIZE) as usize;

        let mut buf = [0u8; SECTOR_SIZE as usize];
        self.read_sector_at(stream, sector, &mut buf)?;
        Ok(u16::from_le_bytes([buf[offset_in_sector], buf[offset_in_sector + 1]]))
    }

    /// Directory entries of the root directory.
    pub(crate) fn read_root_dir(&self, stream: &mut DiskStreamer) -> Result<Vec<DirEntry>, KernelError> {
        let mut entries = Vec::new();
        let mut buf = [0u8; SECTOR_SIZE as usize];

        'sectors: for i in 0..self.bpb.root_dir_sectors() {
            self.read_sector_at(stream, self.bpb.root_dir_sector() + i, &mut buf)?;
            for chunk in buf.chunks(DIRENT_SIZE) {
                if chunk[0] == 0x00 {
                    break 'sectors;
                }
                if let Some(e) = parse_dirent(chunk) {
                    entries.push(e);
                }
            }
        }

        Ok(entries)
    }

    /// Directory entries of a subdirectory starting at `cluster`.
    pub(crate) fn read_dir_cluster(&self, stream: &mut DiskStreamer, cluster: u16) -> Result<Vec<DirEntry>, KernelError> {
        let mut entries = Vec::new();
        let mut cur = cluster;
        let mut buf = [0u8; SECTOR_SIZE as usize];

        loop {
            let first_sector = self.bpb.cluster_to_sector(cur);
            'sectors: for i in 0..self.bpb.sectors_per_cluster as u32 {
                self.read_sector_at(stream, first_sector + i, &mut buf)?;
                for chunk in buf.chunks(DIRENT_SIZE) {
                    if chunk[0] == 0x00 {
                        return Ok(entries);
                    }
                    if let Some(e) = parse_dirent(chunk) {
                        entries.push(e);
                    }
                }
                let _ = i;
                continue 'sectors;
            }

            let next = self.fat_entry(stream, cur)?;
            if next >= FAT16_EOC || next == FAT16_FREE || next == FAT16_BAD {
                break;
            }
            cur = next;
        }

        Ok(entries)
    }

    /// Resolve a path's directory-name components to the terminal
    /// directory entry, starting from the root directory.
    pub(crate) fn resolve(&self, stream: &mut DiskStreamer, parts: &[String]) -> Result<DirEntry, KernelError> {
        let mut current = self.read_root_dir(stream)?;
        let mut found: Option<DirEntry> = None;

        for (i, part) in parts.iter().enumerate() {
            let entry = current
                .iter()
                .find(|e| e.name.eq_ignore_ascii_case(part))
                .cloned()
                .ok_or(KernelError::NoSuchFile)?;

            let is_last = i == parts.len() - 1;
            if !is_last {
                if !entry.is_directory {
                    return Err(KernelError::NotADirectory);
                }
                current = self.read_dir_cluster(stream, entry.first_cluster)?;
            }
            found = Some(entry);
        }

        found.ok_or(KernelError::InvalidPath)
    }

    /// Read up to `buf.len()` bytes starting at `byte_offset` within a
    /// file's cluster chain.
    pub(crate) fn read_file(
        &self,
        stream: &mut DiskStreamer,
        first_cluster: u16,
        byte_offset: u32,
        buf: &mut [u8],
    ) -> Result<usize, KernelError> {
        let cluster_size = self.bpb.cluster_size_bytes();
        let mut cluster = first_cluster;
        let mut skip_clusters = byte_offset / cluster_size;

        while skip_clusters > 0 {
            let next = self.fat_entry(stream, cluster)?;
            if next >= FAT16_EOC || next == FAT16_FREE || next == FAT16_BAD {
                return Ok(0);
            }
            cluster = next;
            skip_clusters -= 1;
        }

        let mut read_total = 0usize;
        let mut in_cluster_off = byte_offset % cluster_size;

        while read_total < buf.len() {
            let first_sector = self.bpb.cluster_to_sector(cluster);
            let mut sector_buf = [0u8; SECTOR_SIZE as usize];
            let sector_in_cluster = in_cluster_off / SECTOR_SIZE;
            let offset_in_sector = (in_cluster_off % SECTOR_SIZE) as usize;

            if sector_in_cluster >= self.bpb.sectors_per_cluster as u32 {
                let next = self.fat_entry(stream, cluster)?;
                if next >= FAT16_EOC || next == FAT16_FREE || next == FAT16_BAD {
                    break;
                }
                cluster = next;
                in_cluster_off = 0;
                continue;
            }

            self.read_sector_at(stream, first_sector + sector_in_cluster, &mut sector_buf)?;

            let take = core::cmp::min(buf.len() - read_total, SECTOR_SIZE as usize - offset_in_sector);
            buf[read_total..read_total + take].copy_from_slice(&sector_buf[offset_in_sector..offset_in_sector + take]);

            read_total += take;
            in_cluster_off += take as u32;
        }

        Ok(read_total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bpb_sector() -> [u8; SECTOR_SIZE as usize] {
        let mut sector = [0u8; SECTOR_SIZE as usize];
        sector[11..13].copy_from_slice(&(SECTOR_SIZE as u16).to_le_bytes());
        sector[13] = 4; // sectors_per_cluster
        sector[14..16].copy_from_slice(&1u16.to_le_bytes()); // reserved_sector_count
        sector[16] = 2; // num_fats
        sector[17..19].copy_from_slice(&512u16.to_le_bytes()); // root_entry_count
        sector[19..21].copy_from_slice(&20000u16.to_le_bytes()); // total_sectors16
        sector[22..24].copy_from_slice(&100u16.to_le_bytes()); // sectors_per_fat
        sector
    }

    #[test]
    fn parses_bpb_fields() {
        let bpb = BiosParameterBlock::parse(&sample_bpb_sector()).unwrap();
        assert_eq!(bpb.bytes_per_sector, SECTOR_SIZE as u16);
        assert_eq!(bpb.sectors_per_cluster, 4);
        assert_eq!(bpb.num_fats, 2);
        assert_eq!(bpb.total_sectors, 20000);
        assert_eq!(bpb.sectors_per_fat, 100);
    }

    #[test]
    fn falls_back_to_32_bit_total_sectors_when_16_bit_field_is_zero() {
        let mut sector = sample_bpb_sector();
        sector[19..21].copy_from_slice(&0u16.to_le_bytes());
        sector[32..36].copy_from_slice(&1_000_000u32.to_le_bytes());
        let bpb = BiosParameterBlock::parse(&sector).unwrap();
        assert_eq!(bpb.total_sectors, 1_000_000);
    }

    #[test]
    fn rejects_mismatched_sector_size() {
        let mut sector = sample_bpb_sector();
        sector[11..13].copy_from_slice(&1024u16.to_le_bytes());
        assert!(BiosParameterBlock::parse(&sector).is_err());
    }

    #[test]
    fn decodes_8_3_name_with_extension() {
        let mut raw = [0x20u8; 32];
        raw[0..8].copy_from_slice(b"INIT    ");
        raw[8..11].copy_from_slice(b"ELF");
        assert_eq!(decode_8_3(&raw[0..11]), "INIT.ELF");
    }

    #[test]
    fn decodes_8_3_name_without_extension() {
        let mut raw = [0x20u8; 32];
        raw[0..8].copy_from_slice(b"BIN     ");
        raw[8..11].copy_from_slice(b"   ");
        assert_eq!(decode_8_3(&raw[0..11]), "BIN");
    }

    #[test]
    fn skips_deleted_and_free_dirents() {
        let mut raw = [0u8; 32];
        raw[0] = 0xe5;
        assert!(parse_dirent(&raw).is_none());

        let mut raw2 = [0u8; 32];
        raw2[0] = 0x00;
        assert!(parse_dirent(&raw2).is_none());
    }

    #[test]
    fn parses_directory_attribute_and_size() {
        let mut raw = [0x20u8; 32];
        raw[0..8].copy_from_slice(b"BIN     ");
        raw[8..11].copy_from_slice(b"   ");
        raw[11] = ATTR_DIRECTORY;
        raw[26..28].copy_from_slice(&5u16.to_le_bytes());
        raw[28..32].copy_from_slice(&0u32.to_le_bytes());

        let e = parse_dirent(&raw).unwrap();
        assert!(e.is_directory);
        assert_eq!(e.first_cluster, 5);
        assert_eq!(e.size, 0);
    }
}
