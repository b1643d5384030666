use a2kit_macro::{DiskStruct,DiskStructError};
use a2kit_macro_derive::DiskStruct;

pub const VOL_KEY_BLOCK: usize = 2;
pub const ENTRY_LEN: u8 = 0x27;
pub const STORAGE_VOL_HEADER: u8 = 0x0f;

/// Key block of the volume directory up through the block count
#[derive(DiskStruct)]
pub struct VolDirHeader {
    pub prev: [u8;2],
    pub next: [u8;2],
    pub stor_len_nibs: u8,
    pub name: [u8;15],
    pub reserved: [u8;8],
    pub create_time: [u8;4],
    pub version: u8,
    pub min_version: u8,
    pub access: u8,
    pub entry_length: u8,
    pub entries_per_block: u8,
    pub file_count: [u8;2],
    pub bitmap_ptr: [u8;2],
    pub total_blocks: [u8;2]
}

pub const VOL_HEADER_LEN: usize = 43;

impl VolDirHeader {
    pub fn name(&self) -> &[u8] {
        let len = (self.stor_len_nibs & 0x0f) as usize;
        &self.name[0..len]
    }
}
