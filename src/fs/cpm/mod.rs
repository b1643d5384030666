//! ## CP/M probe
//!
//! The Apple II CP/M directory is 2K at the start of track 3.
//! There is no header, so every 32 byte entry has to look like an extent.

pub mod types;

use log::{debug,trace};
use a2kit_macro::DiskStruct;
use crate::img::{Error,SectorOrder};
use crate::disk::DiskImg;
use super::{FsFormat,FsProbe,Leniency,try_sector,order_candidates};
use types::*;

/// Returns the number of file extents, or `None` if some entry is not plausible.
fn score_directory(dir: &[u8],leniency: Leniency) -> Result<Option<usize>,Error> {
    let mut files = 0;
    for (idx,raw) in dir.chunks_exact(ENTRY_SIZE).enumerate() {
        let xtype = extent_type(raw[0]);
        trace!("entry {} has extent type {:?}",idx,xtype);
        match xtype {
            ExtentType::File => {
                let fx = Extent::from_bytes(raw)?;
                let printable = fx.name.iter().chain(fx.typ.iter()).all(|c| (c & 0x7f) >= 0x20 && (c & 0x7f) < 0x7f);
                if !printable {
                    debug!("entry {} has a bad name",idx);
                    return Ok(None);
                }
                if leniency==Leniency::Strict && (fx.xl > MAX_EXTENT || fx.rc > MAX_RECORDS) {
                    debug!("entry {} has extent {} records {}",idx,fx.xl,fx.rc);
                    return Ok(None);
                }
                files += 1;
            },
            ExtentType::Unknown => {
                debug!("unknown extent type {}",raw[0]);
                return Ok(None);
            },
            _ => {}
        }
    }
    Ok(Some(files))
}

pub struct CpmProbe {}

impl FsProbe for CpmProbe {
    fn format(&self) -> FsFormat {
        FsFormat::Cpm
    }
    fn test_fs(&self,img: &mut DiskImg,order_hint: SectorOrder,leniency: Leniency) -> Result<Option<SectorOrder>,Error> {
        if img.sectors_per_track() != 16 || img.num_tracks() <= DIR_TRACK {
            return Ok(None);
        }
        let mut best: Option<(SectorOrder,usize)> = None;
        'orders: for order in order_candidates(img,order_hint) {
            let mut dir = Vec::new();
            for s in 0..DIR_SECTORS {
                match try_sector(img,DIR_TRACK,s,order,SectorOrder::CPM)? {
                    Some(mut buf) => dir.append(&mut buf),
                    None => continue 'orders
                }
            }
            if let Some(score) = score_directory(&dir,leniency)? {
                debug!("CP/M directory has {} extents in {} order",score,order);
                if best.is_none() || best.is_some_and(|(_,b)| score > b) {
                    best = Some((order,score));
                }
            }
        }
        Ok(best.map(|(order,_)| order))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_directory() {
        let dir = vec![DELETED;2048];
        assert_eq!(score_directory(&dir,Leniency::Strict).expect("score"),Some(0));
        let zeros = vec![0;2048];
        assert_eq!(score_directory(&zeros,Leniency::Strict).expect("score"),None);
    }

    #[test]
    fn one_file() {
        let mut dir = vec![DELETED;2048];
        dir[0] = 0;
        dir[1..12].copy_from_slice(b"HELLO   COM");
        dir[12..16].copy_from_slice(&[0,0,0,2]);
        assert_eq!(score_directory(&dir,Leniency::Strict).expect("score"),Some(1));
        dir[15] = 0x81;
        assert_eq!(score_directory(&dir,Leniency::Strict).expect("score"),None);
        assert_eq!(score_directory(&dir,Leniency::Relaxed).expect("score"),Some(1));
    }
}
