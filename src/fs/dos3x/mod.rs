//! ## DOS 3.x probes
//!
//! DOS 3.2, DOS 3.3, and the UniDOS arrangement of two 400K DOS volumes on
//! an 800K disk.  All of them start from the VTOC at track 17, sector 0.
//! That sector is in the same place for every sector order, so telling the
//! orders apart takes a walk down the catalog chain.

pub mod types;

use std::collections::HashSet;
use log::{debug,trace};
use a2kit_macro::DiskStruct;
use crate::img::{Error,SectorOrder,SECTOR_SIZE,BLOCK_SIZE};
use crate::disk::DiskImg;
use super::{FsFormat,FsProbe,Leniency,try_sector,try_block,order_candidates};
use types::*;

/// UniDOS volumes are 50 tracks of 32 sectors
const UNIDOS_TRACKS: usize = 50;
const UNIDOS_SECTORS: usize = 32;
const UNIDOS_VOLUME_BLOCKS: usize = UNIDOS_TRACKS * UNIDOS_SECTORS * SECTOR_SIZE / BLOCK_SIZE;

/// Check the VTOC against the expected geometry.
fn verify_vtoc(vtoc: &VTOC,tracks: usize,sectors: usize,leniency: Leniency) -> bool {
    let d13 = sectors==13;
    if leniency==Leniency::Strict {
        if d13 && vtoc.version > 2 || !d13 && vtoc.version < 3 {
            debug!("VTOC wrong version {}",vtoc.version);
            return false;
        }
        if vtoc.vol < 1 || vtoc.vol > 254 {
            debug!("volume {} out of range",vtoc.vol);
            return false;
        }
        if vtoc.track1 != VTOC_TRACK || vtoc.sector1 as usize != sectors-1 {
            debug!("VTOC wrong track1 {}, sector1 {}",vtoc.track1,vtoc.sector1);
            return false;
        }
        if vtoc.tracks as usize != tracks {
            debug!("VTOC has {} tracks, image has {}",vtoc.tracks,tracks);
            return false;
        }
    } else if vtoc.track1 as usize >= tracks || vtoc.sector1 as usize >= sectors || vtoc.tracks as usize > tracks {
        debug!("VTOC links out of range");
        return false;
    }
    if vtoc.bytes != [0,1] || vtoc.sectors as usize != sectors {
        debug!("VTOC wrong bytes {:?}, sectors {}",vtoc.bytes,vtoc.sectors);
        return false;
    }
    true
}

/// Count how many catalog sectors can be chained from the VTOC before the
/// chain ends, loops, or leaves the disk.
fn catalog_score<F>(vtoc: &VTOC,tracks: usize,sectors: usize,mut read: F) -> Result<usize,Error>
where F: FnMut(usize,usize) -> Result<Option<Vec<u8>>,Error> {
    let mut visited = HashSet::new();
    let mut ts = (vtoc.track1 as usize,vtoc.sector1 as usize);
    let mut score = 0;
    while score < MAX_CATALOG_SECTORS {
        if ts.0 >= tracks || ts.1 >= sectors || !visited.insert(ts) {
            break;
        }
        let buf = match read(ts.0,ts.1)? {
            Some(buf) => buf,
            None => break
        };
        let link = CatalogLink::from_bytes(&buf[0..11])?;
        trace!("catalog {},{} links to {},{}",ts.0,ts.1,link.next_track,link.next_sector);
        if link.next_track==0 {
            score += 1;
            break;
        }
        if link.next_track as usize >= tracks || link.next_sector as usize >= sectors {
            break;
        }
        score += 1;
        ts = (link.next_track as usize,link.next_sector as usize);
    }
    Ok(score)
}

fn read_vtoc(buf: &[u8]) -> Result<VTOC,Error> {
    Ok(VTOC::from_bytes(&buf[0..SECTOR_SIZE])?)
}

pub struct Dos33Probe {}
pub struct Dos32Probe {}
pub struct UnidosProbe {}

impl FsProbe for Dos33Probe {
    fn format(&self) -> FsFormat {
        FsFormat::Dos33
    }
    fn test_fs(&self,img: &mut DiskImg,order_hint: SectorOrder,leniency: Leniency) -> Result<Option<SectorOrder>,Error> {
        let tracks = img.num_tracks();
        let sectors = img.sectors_per_track();
        // 32 sectors shows up in the halves of a UniDOS disk
        let fits = match sectors {
            16 => (35..=50).contains(&tracks),
            32 => tracks==UNIDOS_TRACKS,
            _ => false
        };
        if !fits {
            return Ok(None);
        }
        let mut best: Option<(SectorOrder,usize)> = None;
        for order in order_candidates(img,order_hint) {
            let vtoc = match try_sector(img,VTOC_TRACK as usize,0,order,SectorOrder::DOS)? {
                Some(buf) => read_vtoc(&buf)?,
                None => continue
            };
            if !verify_vtoc(&vtoc,tracks,sectors,leniency) {
                continue;
            }
            let score = catalog_score(&vtoc,tracks,sectors,|t,s| try_sector(img,t,s,order,SectorOrder::DOS))?;
            debug!("DOS 3.3 catalog score {} in {} order",score,order);
            if best.is_none() || best.is_some_and(|(_,b)| score > b) {
                best = Some((order,score));
            }
        }
        Ok(best.map(|(order,_)| order))
    }
}

impl FsProbe for Dos32Probe {
    fn format(&self) -> FsFormat {
        FsFormat::Dos32
    }
    fn test_fs(&self,img: &mut DiskImg,order_hint: SectorOrder,leniency: Leniency) -> Result<Option<SectorOrder>,Error> {
        let tracks = img.num_tracks();
        if img.sectors_per_track() != 13 || tracks != 35 {
            return Ok(None);
        }
        for order in order_candidates(img,order_hint) {
            if let Some(buf) = try_sector(img,VTOC_TRACK as usize,0,order,SectorOrder::Physical)? {
                if verify_vtoc(&read_vtoc(&buf)?,tracks,13,leniency) {
                    return Ok(Some(order));
                }
            }
        }
        Ok(None)
    }
}

impl FsProbe for UnidosProbe {
    fn format(&self) -> FsFormat {
        FsFormat::Unidos
    }
    fn test_fs(&self,img: &mut DiskImg,_order_hint: SectorOrder,leniency: Leniency) -> Result<Option<SectorOrder>,Error> {
        if img.num_blocks() != 2 * UNIDOS_VOLUME_BLOCKS || img.physical_format().is_nibble() {
            return Ok(None);
        }
        // sectors within a volume are linear, so the VTOC is the front half of a block
        let vtoc_block = VTOC_TRACK as usize * UNIDOS_SECTORS * SECTOR_SIZE / BLOCK_SIZE;
        for vol in 0..2 {
            let block = vol * UNIDOS_VOLUME_BLOCKS + vtoc_block;
            let ok = match try_block(img,block,SectorOrder::ProDOS)? {
                Some(buf) => verify_vtoc(&read_vtoc(&buf)?,UNIDOS_TRACKS,UNIDOS_SECTORS,leniency),
                None => false
            };
            if !ok {
                debug!("UniDOS volume {} not found",vol+1);
                return Ok(None);
            }
        }
        Ok(Some(SectorOrder::ProDOS))
    }
}

/// Block offsets of the two UniDOS volumes, with their length in tracks and sectors per track
pub fn unidos_volumes() -> [(usize,usize,usize);2] {
    [(0,UNIDOS_TRACKS,UNIDOS_SECTORS),(UNIDOS_TRACKS,UNIDOS_TRACKS,UNIDOS_SECTORS)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vtoc(tracks: u8,sectors: u8) -> VTOC {
        let mut ans = VTOC::new();
        ans.track1 = 17;
        ans.sector1 = sectors-1;
        ans.version = 3;
        ans.vol = 254;
        ans.tracks = tracks;
        ans.sectors = sectors;
        ans.bytes = [0,1];
        ans
    }

    #[test]
    fn vtoc_checks() {
        let v = vtoc(35,16);
        assert!(verify_vtoc(&v,35,16,Leniency::Strict));
        assert!(!verify_vtoc(&v,40,16,Leniency::Strict));
        assert!(verify_vtoc(&v,40,16,Leniency::Relaxed));
        assert!(!verify_vtoc(&v,35,13,Leniency::Relaxed));
    }

    #[test]
    fn catalog_walk_stops_on_loop() {
        let v = vtoc(35,16);
        // every sector points at 17,14 so the walk loops after two steps
        let score = catalog_score(&v,35,16,|_t,_s| {
            let mut buf = vec![0;256];
            buf[1] = 17;
            buf[2] = 14;
            Ok(Some(buf))
        }).expect("walk");
        assert_eq!(score,2);
        let score = catalog_score(&v,35,16,|_t,s| {
            let mut buf = vec![0;256];
            if s > 1 {
                buf[1] = 17;
                buf[2] = s as u8 - 1;
            }
            Ok(Some(buf))
        }).expect("walk");
        assert_eq!(score,15);
    }
}
