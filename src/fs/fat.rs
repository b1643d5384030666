//! ## FAT probe
//!
//! CF and SD cards that were once ProDOS volumes are often reformatted on a PC
//! without clearing the old directory, so this runs ahead of ProDOS.

use crate::img::{Error,SectorOrder};
use crate::bios::bpb;
use crate::disk::DiskImg;
use super::{FsFormat,FsProbe,Leniency,try_block,order_candidates};

pub struct FatProbe {}

impl FsProbe for FatProbe {
    fn format(&self) -> FsFormat {
        FsFormat::Fat
    }
    fn test_fs(&self,img: &mut DiskImg,order_hint: SectorOrder,_leniency: Leniency) -> Result<Option<SectorOrder>,Error> {
        if !img.has_blocks() || img.physical_format().is_nibble() {
            return Ok(None);
        }
        for order in order_candidates(img,order_hint) {
            if let Some(buf) = try_block(img,0,order)? {
                if bpb::verify_boot_sector(&buf) {
                    return Ok(Some(order));
                }
            }
        }
        Ok(None)
    }
}
