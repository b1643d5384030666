//! ## ProDOS probe
//!
//! Looks for the volume directory key block at block 2.

pub mod types;

use log::debug;
use a2kit_macro::DiskStruct;
use crate::img::{Error,SectorOrder};
use crate::disk::DiskImg;
use super::{FsFormat,FsProbe,Leniency,try_block,order_candidates};
use types::*;

const FIRST_CHAR: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const OTHER_CHAR: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789.";

fn legal_name(name: &[u8]) -> bool {
    if name.is_empty() || !FIRST_CHAR.contains(name[0] as char) {
        return false;
    }
    name[1..].iter().all(|c| OTHER_CHAR.contains(*c as char))
}

fn verify_header(buf: &[u8],image_blocks: usize,leniency: Leniency) -> Result<bool,Error> {
    let vol = VolDirHeader::from_bytes(&buf[0..VOL_HEADER_LEN])?;
    if vol.stor_len_nibs >> 4 != STORAGE_VOL_HEADER {
        debug!("storage type {}",vol.stor_len_nibs >> 4);
        return Ok(false);
    }
    if u16::from_le_bytes(vol.prev)!=0 || u16::from_le_bytes(vol.next)!=3 {
        debug!("unexpected volume directory links");
        return Ok(false);
    }
    if leniency==Leniency::Relaxed {
        return Ok(true);
    }
    let total_blocks = u16::from_le_bytes(vol.total_blocks) as usize;
    if total_blocks < 280 || total_blocks > image_blocks {
        debug!("peculiar block count {}",total_blocks);
        return Ok(false);
    }
    if vol.entry_length != ENTRY_LEN || (vol.entries_per_block!=0x0d && vol.entries_per_block!=0x0c) {
        debug!("unexpected header bytes {}, {}",vol.entry_length,vol.entries_per_block);
        return Ok(false);
    }
    if !legal_name(vol.name()) {
        debug!("volume name unexpected character");
        return Ok(false);
    }
    Ok(true)
}

pub struct ProdosProbe {}

impl FsProbe for ProdosProbe {
    fn format(&self) -> FsFormat {
        FsFormat::ProDOS
    }
    fn test_fs(&self,img: &mut DiskImg,order_hint: SectorOrder,leniency: Leniency) -> Result<Option<SectorOrder>,Error> {
        if !img.has_blocks() || img.num_blocks() <= VOL_KEY_BLOCK+1 {
            return Ok(None);
        }
        let image_blocks = img.num_blocks();
        for order in order_candidates(img,order_hint) {
            let buf = match try_block(img,VOL_KEY_BLOCK,order)? {
                Some(buf) => buf,
                None => continue
            };
            if !verify_header(&buf,image_blocks,leniency)? {
                continue;
            }
            // the second directory block must point back
            if leniency==Leniency::Strict {
                match try_block(img,VOL_KEY_BLOCK+1,order)? {
                    Some(next) if u16::from_le_bytes([next[0],next[1]])==VOL_KEY_BLOCK as u16 => {},
                    _ => {
                        debug!("directory block 3 does not link back in {} order",order);
                        continue;
                    }
                }
            }
            return Ok(Some(order));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_block(name: &str,total: u16) -> Vec<u8> {
        let mut buf = vec![0;512];
        buf[2] = 3;
        buf[4] = 0xf0 | name.len() as u8;
        buf[5..5+name.len()].copy_from_slice(name.as_bytes());
        buf[0x23] = 0x27;
        buf[0x24] = 0x0d;
        buf[0x29..0x2b].copy_from_slice(&u16::to_le_bytes(total));
        buf
    }

    #[test]
    fn header_checks() {
        assert!(verify_header(&key_block("NEW.DISK",280),280,Leniency::Strict).expect("check"));
        assert!(!verify_header(&key_block("1DISK",280),280,Leniency::Strict).expect("check"));
        assert!(!verify_header(&key_block("BIG",1600),280,Leniency::Strict).expect("check"));
        assert!(verify_header(&key_block("BIG",1600),280,Leniency::Relaxed).expect("check"));
    }
}
