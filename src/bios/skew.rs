//! ## Sector Skewing Module
//! 
//! This contains all the sector skew tables for 16 sector tracks.
//! An image file stores the 16 sectors of a track in some order.  The "raw" or
//! physical order is the order of the sector numbers written in the address fields.
//! DOS 3.3, ProDOS, and CP/M each number the sectors in their own way, and images
//! made by dumping a disk through one of them inherit that numbering.
//! 
//! A sector request is always made in the file system's numbering.  It is taken to
//! raw with one table, and then to the image's numbering with another.
//! Tracks with any other sector count are never skewed in software.

use crate::img::SectorOrder;

/// Translate physical sector to DOS 3.3 logical sector
pub const RAW_TO_DOS: [usize;16] = [0,7,14,6,13,5,12,4,11,3,10,2,9,1,8,15];
/// Translate DOS 3.3 logical sector to physical sector
pub const DOS_TO_RAW: [usize;16] = [0,13,11,9,7,5,3,1,14,12,10,8,6,4,2,15];
/// Translate physical sector to ProDOS sector (position within the track of a PO image)
pub const RAW_TO_PRODOS: [usize;16] = [0,8,1,9,2,10,3,11,4,12,5,13,6,14,7,15];
/// Translate ProDOS sector to physical sector
pub const PRODOS_TO_RAW: [usize;16] = [0,2,4,6,8,10,12,14,1,3,5,7,9,11,13,15];
/// Translate physical sector to CP/M sector
pub const RAW_TO_CPM: [usize;16] = [0,11,6,1,12,7,2,13,8,3,14,9,4,15,10,5];
/// Translate CP/M sector to physical sector
pub const CPM_TO_RAW: [usize;16] = [0,3,6,9,12,15,2,5,8,11,14,1,4,7,10,13];

/// Physical sector skew used by DOS 3.2, this is written on the track itself
pub const DOS32_PHYSICAL: [usize;13] = [0,10,7,4,1,11,8,5,2,12,9,6,3];

/// Take a sector numbered in `order` to the physical numbering.
/// Unknown and physical orders pass through.
pub fn to_raw(order: SectorOrder,sector: usize) -> usize {
    match order {
        SectorOrder::DOS => DOS_TO_RAW[sector],
        SectorOrder::ProDOS => PRODOS_TO_RAW[sector],
        SectorOrder::CPM => CPM_TO_RAW[sector],
        SectorOrder::Physical | SectorOrder::Unknown => sector
    }
}

/// Take a physical sector number to the numbering of `order`.
pub fn from_raw(order: SectorOrder,raw: usize) -> usize {
    match order {
        SectorOrder::DOS => RAW_TO_DOS[raw],
        SectorOrder::ProDOS => RAW_TO_PRODOS[raw],
        SectorOrder::CPM => RAW_TO_CPM[raw],
        SectorOrder::Physical | SectorOrder::Unknown => raw
    }
}

/// Find where the file system's `sector` is stored within a track of the image.
/// Only 16 sector tracks are skewed.
pub fn image_sector(fs_order: SectorOrder,image_order: SectorOrder,sector: usize,sectors_per_track: usize) -> usize {
    if sectors_per_track != 16 || fs_order == image_order {
        return sector;
    }
    from_raw(image_order,to_raw(fs_order,sector))
}
