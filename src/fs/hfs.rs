//! ## HFS
//!
//! The master directory block sits in block 2 and starts with `BD`.

use log::debug;
use crate::img::{Error,SectorOrder};
use crate::disk::DiskImg;
use super::{FsFormat,FsProbe,Leniency,try_block};

const MDB_SIG: [u8;2] = *b"BD";

pub struct HfsProbe {}

impl FsProbe for HfsProbe {
    fn format(&self) -> FsFormat {
        FsFormat::Hfs
    }
    fn test_fs(&self,img: &mut DiskImg,order_hint: SectorOrder,leniency: Leniency) -> Result<Option<SectorOrder>,Error> {
        if !img.has_blocks() || img.num_blocks() < 800 {
            return Ok(None);
        }
        for order in super::order_candidates(img,order_hint) {
            let buf = match try_block(img,2,order)? {
                Some(buf) => buf,
                None => continue
            };
            if buf[0..2] != MDB_SIG {
                continue;
            }
            let alloc_blocks = u16::from_be_bytes([buf[0x12],buf[0x13]]) as usize;
            let alloc_size = u32::from_be_bytes([buf[0x14],buf[0x15],buf[0x16],buf[0x17]]) as usize;
            if leniency==Leniency::Strict {
                if alloc_blocks==0 || alloc_size==0 || alloc_size % 512 != 0 {
                    debug!("HFS allocation {} x {}",alloc_blocks,alloc_size);
                    continue;
                }
                if alloc_blocks * (alloc_size / 512) > img.num_blocks() {
                    debug!("HFS volume larger than image");
                    continue;
                }
            }
            return Ok(Some(order));
        }
        Ok(None)
    }
}
