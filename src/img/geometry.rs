//! ## Geometry
//!
//! Works out tracks, sectors, and blocks from the size of the flat view.
//! Sector images up to 50 tracks are taken as 16 sectors per track, anything
//! larger is addressed by block only.  The 13 sector size is a special case.

use log::debug;
use crate::img::{Error,SectorOrder,BLOCK_SIZE,SECTOR_SIZE};
use crate::img::dsk::D13_LEN;
use crate::bios::blocks::BLOCKS_PER_TRACK;

/// Largest track count that is still treated as a floppy
pub const MAX_FLOPPY_TRACKS: usize = 50;

#[derive(PartialEq,Eq,Clone,Copy,Debug)]
pub struct Geometry {
    pub tracks: usize,
    /// 0 if only blocks are addressable
    pub sectors_per_track: usize,
    /// 0 if only sectors are addressable
    pub blocks: usize
}

impl Geometry {
    pub fn none() -> Self {
        Self { tracks: 0, sectors_per_track: 0, blocks: 0 }
    }
    /// Geometry of a sector image with `len` bytes of data
    pub fn for_sectors(len: u64) -> Result<Self,Error> {
        let track_len = (16*SECTOR_SIZE) as u64;
        if len==D13_LEN {
            return Ok(Self { tracks: 35, sectors_per_track: 13, blocks: 0 });
        }
        if len==0 || len % BLOCK_SIZE as u64 != 0 {
            return Err(Error::BadArgument(format!("{} bytes is not a whole number of blocks",len)));
        }
        let blocks = (len / BLOCK_SIZE as u64) as usize;
        if len % track_len==0 && len / track_len <= MAX_FLOPPY_TRACKS as u64 {
            let tracks = (len / track_len) as usize;
            debug!("geometry is {} tracks of 16 sectors",tracks);
            return Ok(Self { tracks, sectors_per_track: 16, blocks });
        }
        debug!("geometry is {} blocks",blocks);
        Ok(Self { tracks: 0, sectors_per_track: 0, blocks })
    }
    /// Geometry of a nibble image, `sectors_per_track` is 0 if no sector format was found
    pub fn for_nibbles(tracks: usize,sectors_per_track: usize) -> Self {
        let blocks = match sectors_per_track {
            16 => tracks * BLOCKS_PER_TRACK,
            _ => 0
        };
        Self { tracks, sectors_per_track, blocks }
    }
    /// Geometry of a run of tracks carved out of a larger volume
    pub fn for_tracks(tracks: usize,sectors_per_track: usize) -> Self {
        let track_len = sectors_per_track * SECTOR_SIZE;
        let blocks = match track_len % BLOCK_SIZE {
            0 => tracks * track_len / BLOCK_SIZE,
            _ => 0
        };
        Self { tracks, sectors_per_track, blocks }
    }
    pub fn has_sectors(&self) -> bool {
        self.sectors_per_track > 0
    }
    pub fn has_blocks(&self) -> bool {
        self.blocks > 0
    }
    /// Byte offset of a sector already mapped to image order
    pub fn sector_offset(&self,track: usize,image_sector: usize) -> u64 {
        ((track * self.sectors_per_track + image_sector) * SECTOR_SIZE) as u64
    }
}

/// Order to assume when the wrapper has no opinion.
/// Only the extension `po` says anything; the rest default by geometry.
pub fn default_order(ext: &str,geometry: &Geometry) -> SectorOrder {
    match (ext,geometry.sectors_per_track) {
        (_,13) => SectorOrder::Physical,
        ("po",_) => SectorOrder::ProDOS,
        // host block devices are read block by block
        (e,_) if e==super::identify::RAW_VOLUME_TAG => SectorOrder::ProDOS,
        (_,16) => SectorOrder::DOS,
        _ => SectorOrder::ProDOS
    }
}
