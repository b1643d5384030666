//! ## Pascal probe
//!
//! The volume directory starts in block 2 with a 26 byte header, followed by
//! one 26 byte entry per file.

pub mod types;

use log::debug;
use a2kit_macro::DiskStruct;
use crate::img::{Error,SectorOrder};
use crate::disk::DiskImg;
use super::{FsFormat,FsProbe,Leniency,try_block,order_candidates};
use types::*;

fn printable(name: &[u8]) -> bool {
    name.iter().all(|c| *c >= 32 && *c <= 126)
}

/// Check the directory bytes, `dir` holds as many directory blocks as could be read
fn verify_directory(dir: &[u8],image_blocks: usize,leniency: Leniency) -> Result<bool,Error> {
    let header = VolDirHeader::from_bytes(&dir[0..ENTRY_SIZE])?;
    let beg0 = u16::from_le_bytes(header.begin_block);
    let end = u16::from_le_bytes(header.end_block);
    let tot = u16::from_le_bytes(header.total_blocks);
    if beg0!=0 || end as usize <= VOL_HEADER_BLOCK || end > 20 {
        debug!("header begin {} end {}",beg0,end);
        return Ok(false);
    }
    if header.name_len > 7 || header.name_len==0 {
        debug!("header name length {}",header.name_len);
        return Ok(false);
    }
    if header.file_type != [0,0] {
        debug!("header type {}",u16::from_le_bytes(header.file_type));
        return Ok(false);
    }
    if !printable(&header.name[0..header.name_len as usize]) {
        debug!("header name has unprintable characters");
        return Ok(false);
    }
    if leniency==Leniency::Relaxed {
        return Ok(true);
    }
    if tot as usize > image_blocks {
        debug!("header total blocks {}",tot);
        return Ok(false);
    }
    let num_files = u16::from_le_bytes(header.num_files) as usize;
    if (num_files+1)*ENTRY_SIZE > MAX_DIR_BLOCKS*512 {
        debug!("header file count {}",num_files);
        return Ok(false);
    }
    for i in 0..num_files {
        let off = (i+1)*ENTRY_SIZE;
        if off + ENTRY_SIZE > dir.len() {
            break;
        }
        let entry = DirectoryEntry::from_bytes(&dir[off..off+ENTRY_SIZE])?;
        let ebeg = u16::from_le_bytes(entry.begin_block);
        let eend = u16::from_le_bytes(entry.end_block);
        if ebeg < end || eend <= ebeg || eend > tot {
            debug!("entry {} begin {} end {}",i,ebeg,eend);
            return Ok(false);
        }
        if entry.name_len > 15 || entry.name_len==0 || !printable(&entry.name[0..entry.name_len as usize]) {
            debug!("entry {} has a bad name",i);
            return Ok(false);
        }
    }
    Ok(true)
}

pub struct PascalProbe {}

impl FsProbe for PascalProbe {
    fn format(&self) -> FsFormat {
        FsFormat::Pascal
    }
    fn test_fs(&self,img: &mut DiskImg,order_hint: SectorOrder,leniency: Leniency) -> Result<Option<SectorOrder>,Error> {
        if !img.has_blocks() || img.num_blocks() < VOL_HEADER_BLOCK + MAX_DIR_BLOCKS {
            return Ok(None);
        }
        let image_blocks = img.num_blocks();
        for order in order_candidates(img,order_hint) {
            let mut dir = Vec::new();
            for b in VOL_HEADER_BLOCK..VOL_HEADER_BLOCK+MAX_DIR_BLOCKS {
                match try_block(img,b,order)? {
                    Some(mut buf) => dir.append(&mut buf),
                    None => break
                }
            }
            if dir.is_empty() {
                continue;
            }
            if verify_directory(&dir,image_blocks,leniency)? {
                return Ok(Some(order));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_checks() {
        let mut dir = vec![0;2048];
        dir[2] = 6;
        dir[6] = 5;
        dir[7..12].copy_from_slice(b"BLANK");
        dir[14..16].copy_from_slice(&u16::to_le_bytes(280));
        assert!(verify_directory(&dir,280,Leniency::Strict).expect("check"));
        // one file at blocks 6..10
        dir[16] = 1;
        dir[26..28].copy_from_slice(&u16::to_le_bytes(6));
        dir[28..30].copy_from_slice(&u16::to_le_bytes(10));
        dir[32] = 4;
        dir[33..37].copy_from_slice(b"TEST");
        assert!(verify_directory(&dir,280,Leniency::Strict).expect("check"));
        dir[28..30].copy_from_slice(&u16::to_le_bytes(300));
        assert!(!verify_directory(&dir,280,Leniency::Strict).expect("check"));
        assert!(verify_directory(&dir,280,Leniency::Relaxed).expect("check"));
    }
}
