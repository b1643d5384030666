//! ## Apple partition map
//!
//! Block 0 holds the driver descriptor (`ER`), blocks 1 and up hold one
//! partition entry each (`PM`).  All numbers are big endian.

use std::io::Cursor;
use binrw::{binrw,BinRead};
use log::{debug,trace};
use crate::img::{Error,SectorOrder};
use crate::disk::DiskImg;
use super::{FsFormat,FsProbe,Leniency,try_block};

const DDR_SIG: [u8;2] = *b"ER";
const PM_SIG: [u8;2] = *b"PM";
const MAX_ENTRIES: u32 = 256;

#[derive(Debug)]
#[binrw]
#[brw(big)]
struct PartitionEntry {
    sig: [u8;2],
    sig_pad: u16,
    map_blocks: u32,
    start: u32,
    count: u32,
    name: [u8;32],
    kind: [u8;32]
}

/// One entry from the map
#[derive(Clone,Debug)]
pub struct Partition {
    pub name: String,
    pub kind: String,
    pub start: usize,
    pub count: usize
}

fn c_string(buf: &[u8]) -> String {
    let end = buf.iter().position(|b| *b==0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[0..end]).to_string()
}

fn read_entry(img: &mut DiskImg,block: usize,order: SectorOrder) -> Result<Option<PartitionEntry>,Error> {
    let buf = match try_block(img,block,order)? {
        Some(buf) => buf,
        None => return Ok(None)
    };
    let entry = PartitionEntry::read(&mut Cursor::new(&buf))?;
    match entry.sig==PM_SIG {
        true => Ok(Some(entry)),
        false => Ok(None)
    }
}

/// Read the partition map, the image must be block addressable
pub fn read_map(img: &mut DiskImg) -> Result<Vec<Partition>,Error> {
    let order = img.image_order();
    let first = read_entry(img,1,order)?.ok_or(Error::FilesystemMismatch)?;
    let n = u32::min(first.map_blocks,MAX_ENTRIES) as usize;
    let mut ans = Vec::new();
    for block in 1..=n {
        match read_entry(img,block,order)? {
            Some(entry) => {
                trace!("partition {} at {} length {}",c_string(&entry.name),entry.start,entry.count);
                ans.push(Partition {
                    name: c_string(&entry.name),
                    kind: c_string(&entry.kind),
                    start: entry.start as usize,
                    count: entry.count as usize
                });
            },
            None => {
                debug!("partition map ends early at block {}",block);
                break;
            }
        }
    }
    Ok(ans)
}

pub struct MacPartProbe {}

impl FsProbe for MacPartProbe {
    fn format(&self) -> FsFormat {
        FsFormat::MacPartitionMap
    }
    fn test_fs(&self,img: &mut DiskImg,order_hint: SectorOrder,leniency: Leniency) -> Result<Option<SectorOrder>,Error> {
        if !img.has_blocks() || img.num_blocks() < 4 {
            return Ok(None);
        }
        for order in super::order_candidates(img,order_hint) {
            let ddr_ok = match try_block(img,0,order)? {
                Some(buf) => buf[0..2]==DDR_SIG,
                None => false
            };
            if !ddr_ok && leniency==Leniency::Strict {
                continue;
            }
            if let Some(entry) = read_entry(img,1,order)? {
                if entry.map_blocks==0 || entry.map_blocks > MAX_ENTRIES {
                    debug!("map block count {}",entry.map_blocks);
                    continue;
                }
                if leniency==Leniency::Strict && entry.start as usize + entry.count as usize > img.num_blocks() {
                    debug!("first partition runs past end of image");
                    continue;
                }
                return Ok(Some(order));
            }
        }
        Ok(None)
    }
}
