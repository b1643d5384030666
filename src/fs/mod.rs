//! # File System Sniffing
//!
//! Each supported file system provides a probe implementing `FsProbe`.  A probe looks at
//! the image through block and sector reads only, and reports which sector order makes
//! the file system hang together.  The directory walkers themselves live elsewhere.
//!
//! Probes run in a fixed order that resolves the known overlaps:
//! * partition maps go before the file systems they hold
//! * FAT goes early to catch memory cards that were reformatted on a PC
//! * DOS 3.x goes before ProDOS, since a ProDOS volume can host DOS volumes
//!
//! The image order and the file system order are different things.  The image order
//! is how sectors sit in the file, the file system order is how the file system numbers them.
//! Probes try each candidate image order, hint first.

pub mod macpart;
pub mod fat;
pub mod dos3x;
pub mod prodos;
pub mod pascal;
pub mod hfs;
pub mod cpm;

use std::fmt;
use std::str::FromStr;
use log::{debug,info};
use crate::img::{Error,SectorOrder};
use crate::disk::DiskImg;

/// How hard a probe looks before it believes
#[derive(PartialEq,Eq,Clone,Copy,Debug)]
pub enum Leniency {
    /// used during auto-detection
    Strict,
    /// used when the caller has asserted the format
    Relaxed
}

#[derive(PartialEq,Eq,Clone,Copy,Debug)]
pub enum FsFormat {
    Unknown,
    MacPartitionMap,
    Fat,
    Unidos,
    Dos33,
    Dos32,
    ProDOS,
    Pascal,
    Hfs,
    Cpm
}

impl FsFormat {
    /// Order in which the file system numbers its sectors
    pub fn native_order(&self) -> SectorOrder {
        match self {
            Self::Dos33 | Self::Unidos => SectorOrder::DOS,
            Self::Dos32 => SectorOrder::Physical,
            Self::Cpm => SectorOrder::CPM,
            Self::Unknown => SectorOrder::Unknown,
            _ => SectorOrder::ProDOS
        }
    }
}

impl fmt::Display for FsFormat {
    fn fmt(&self,f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f,"unknown"),
            Self::MacPartitionMap => write!(f,"macpart"),
            Self::Fat => write!(f,"fat"),
            Self::Unidos => write!(f,"unidos"),
            Self::Dos33 => write!(f,"dos33"),
            Self::Dos32 => write!(f,"dos32"),
            Self::ProDOS => write!(f,"prodos"),
            Self::Pascal => write!(f,"pascal"),
            Self::Hfs => write!(f,"hfs"),
            Self::Cpm => write!(f,"cpm")
        }
    }
}

impl FromStr for FsFormat {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self,Self::Err> {
        match s {
            "unknown" | "none" => Ok(Self::Unknown),
            "macpart" | "apm" => Ok(Self::MacPartitionMap),
            "fat" | "msdos" => Ok(Self::Fat),
            "unidos" => Ok(Self::Unidos),
            "dos33" => Ok(Self::Dos33),
            "dos32" => Ok(Self::Dos32),
            "prodos" => Ok(Self::ProDOS),
            "pascal" => Ok(Self::Pascal),
            "hfs" => Ok(Self::Hfs),
            "cpm" => Ok(Self::Cpm),
            _ => Err(Error::BadArgument(format!("unknown file system `{}`",s)))
        }
    }
}

pub trait FsProbe {
    fn format(&self) -> FsFormat;
    /// Test the image for this file system.  Returns the image order that works, if any.
    /// Read errors count as a failed test, other errors propagate.
    fn test_fs(&self,img: &mut DiskImg,order_hint: SectorOrder,leniency: Leniency) -> Result<Option<SectorOrder>,Error>;
}

/// Probes in the order they are run
pub fn probes() -> Vec<Box<dyn FsProbe>> {
    vec![
        Box::new(macpart::MacPartProbe {}),
        Box::new(fat::FatProbe {}),
        Box::new(dos3x::UnidosProbe {}),
        Box::new(dos3x::Dos33Probe {}),
        Box::new(dos3x::Dos32Probe {}),
        Box::new(prodos::ProdosProbe {}),
        Box::new(pascal::PascalProbe {}),
        Box::new(hfs::HfsProbe {}),
        Box::new(cpm::CpmProbe {})
    ]
}

/// The probe for one file system
pub fn probe_for(fmt: FsFormat) -> Option<Box<dyn FsProbe>> {
    probes().into_iter().find(|p| p.format()==fmt)
}

/// Image orders worth trying, hint first.
/// Images without 16 sector tracks have only one sensible order.
pub fn order_candidates(img: &DiskImg,order_hint: SectorOrder) -> Vec<SectorOrder> {
    if img.physical_format().is_nibble() {
        return vec![SectorOrder::Physical];
    }
    if img.sectors_per_track() != 16 {
        // nothing is skewed, so keep whatever label the caller had
        return match (img.sectors_per_track(),order_hint) {
            (13,_) => vec![SectorOrder::Physical],
            (_,SectorOrder::Unknown) => vec![SectorOrder::ProDOS],
            (_,hint) => vec![hint]
        };
    }
    let mut ans = Vec::new();
    if order_hint != SectorOrder::Unknown {
        ans.push(order_hint);
    }
    for o in [SectorOrder::ProDOS,SectorOrder::DOS,SectorOrder::CPM,SectorOrder::Physical] {
        if !ans.contains(&o) {
            ans.push(o);
        }
    }
    ans
}

/// Run every probe in turn, the first to confirm wins.
pub fn analyze(img: &mut DiskImg,order_hint: SectorOrder) -> Result<Option<(FsFormat,SectorOrder)>,Error> {
    for probe in probes() {
        if let Some(order) = probe.test_fs(img,order_hint,Leniency::Strict)? {
            info!("found {} with image order {}",probe.format(),order);
            return Ok(Some((probe.format(),order)));
        }
        debug!("{} declined",probe.format());
    }
    Ok(None)
}

/// Helper for probes: read a block, mapping read failures to `None`
pub(crate) fn try_block(img: &mut DiskImg,block: usize,order: SectorOrder) -> Result<Option<Vec<u8>>,Error> {
    match img.read_block_swapped(block,order) {
        Ok(buf) => Ok(Some(buf)),
        Err(Error::Io(e)) => Err(Error::Io(e)),
        Err(e) => {
            debug!("block {} not readable: {}",block,e);
            Ok(None)
        }
    }
}

/// Helper for probes: read a sector numbered by `fs_order`, mapping read failures to `None`
pub(crate) fn try_sector(img: &mut DiskImg,track: usize,sector: usize,order: SectorOrder,fs_order: SectorOrder) -> Result<Option<Vec<u8>>,Error> {
    match img.read_track_sector_swapped(track,sector,order,fs_order) {
        Ok(buf) => Ok(Some(buf)),
        Err(Error::Io(e)) => Err(Error::Io(e)),
        Err(e) => {
            debug!("sector {},{} not readable: {}",track,sector,e);
            Ok(None)
        }
    }
}
