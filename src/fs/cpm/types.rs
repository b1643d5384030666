use a2kit_macro::{DiskStruct,DiskStructError};
use a2kit_macro_derive::DiskStruct;

/// user numbers run 0..USER_END
pub const USER_END: u8 = 0x10;
pub const DELETED: u8 = 0xe5;
pub const DIR_TRACK: usize = 3;
/// 2K of directory, 64 entries
pub const DIR_SECTORS: usize = 8;
pub const ENTRY_SIZE: usize = 32;
pub const MAX_EXTENT: u8 = 31;
pub const MAX_RECORDS: u8 = 0x80;

#[derive(PartialEq,Eq,Clone,Copy,Debug)]
pub enum ExtentType {
    File,
    Deleted,
    Password,
    Label,
    Timestamp,
    Unknown
}

#[derive(DiskStruct)]
pub struct Extent {
    pub user: u8,
    pub name: [u8;8],
    pub typ: [u8;3],
    pub xl: u8,
    pub bc: u8,
    pub xh: u8,
    pub rc: u8,
    pub block_list: [u8;16]
}

pub fn extent_type(xstat: u8) -> ExtentType {
    match xstat {
        x if x<USER_END => ExtentType::File,
        x if x==DELETED => ExtentType::Deleted,
        x if x<USER_END*2 => ExtentType::Password,
        0x20 => ExtentType::Label,
        0x21 => ExtentType::Timestamp,
        _ => ExtentType::Unknown
    }
}
