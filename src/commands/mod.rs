//! # CLI Subcommands
//!
//! Contains modules that run the subcommands.
//! Helpers shared by several subcommands are here.

pub mod mkdsk;
pub mod stat;
pub mod get;
pub mod put;
pub mod partitions;

use std::path::Path;
use std::str::FromStr;
use log::{debug,info};
use crate::{ImgConfig,STDRESULT};
use crate::disk::DiskImg;
use crate::fs::{self,FsFormat};
use crate::img::SectorOrder;

#[derive(thiserror::Error,Debug)]
pub enum CommandError {
    #[error("Item type is unknown")]
    UnknownItemType,
    #[error("Command could not be interpreted")]
    InvalidCommand,
    #[error("One of the parameters was out of range")]
    OutOfRange,
    #[error("Address could not be parsed")]
    BadAddress,
    #[error("Image has no partitions")]
    NoPartitions
}

/// Disk regions that `get` and `put` work on
#[derive(PartialEq,Clone,Copy,Debug)]
pub enum ItemType {
    Block,
    Sector,
    Track
}

impl FromStr for ItemType {
    type Err = CommandError;
    fn from_str(s: &str) -> Result<Self,Self::Err> {
        match s {
            "block" => Ok(Self::Block),
            "sec" => Ok(Self::Sector),
            "track" => Ok(Self::Track),
            _ => Err(CommandError::UnknownItemType)
        }
    }
}

/// Build the configuration from the global switches
pub fn config_from(cmd: &clap::ArgMatches) -> ImgConfig {
    ImgConfig {
        allow_physical_write: cmd.get_flag("physical"),
        strict_nibble_checksums: cmd.get_flag("strict")
    }
}

fn parse_usize(s: &str) -> Result<usize,CommandError> {
    let s = s.trim();
    let ans = match s.strip_prefix("0x").or(s.strip_prefix('$')) {
        Some(hex) => usize::from_str_radix(hex,16),
        None => usize::from_str(s)
    };
    ans.map_err(|_| CommandError::BadAddress)
}

/// Parse `a..b` as a half open range, or `a` as a single value
fn parse_range(s: &str) -> Result<std::ops::Range<usize>,CommandError> {
    match s.split_once("..") {
        Some((beg,end)) => {
            let (beg,end) = (parse_usize(beg)?,parse_usize(end)?);
            match end > beg {
                true => Ok(beg..end),
                false => Err(CommandError::BadAddress)
            }
        },
        None => {
            let v = parse_usize(s)?;
            Ok(v..v+1)
        }
    }
}

/// Parse a block request such as `2..6,,9`
pub fn parse_block_request(s: &str) -> Result<Vec<usize>,CommandError> {
    let mut ans = Vec::new();
    for seg in s.split(",,") {
        ans.extend(parse_range(seg)?);
    }
    Ok(ans)
}

/// Parse a sector request such as `17,0..4,,18,0`, each segment is `<track>,<sector>`
pub fn parse_sector_request(s: &str) -> Result<Vec<[usize;2]>,CommandError> {
    let mut ans = Vec::new();
    for seg in s.split(",,") {
        let (trk,sec) = seg.split_once(',').ok_or(CommandError::BadAddress)?;
        for t in parse_range(trk)? {
            for s in parse_range(sec)? {
                ans.push([t,s]);
            }
        }
    }
    Ok(ans)
}

/// Open the image named by `--dimg`, honoring `--volume`, `--fs`, and `--order`
pub fn open_disk(cmd: &clap::ArgMatches,read_only: bool) -> Result<DiskImg,crate::DYNERR> {
    let path_str = cmd.get_one::<String>("dimg").ok_or(CommandError::InvalidCommand)?;
    let path = Path::new(path_str);
    let config = config_from(cmd);
    let mut disk = match cmd.get_flag("volume") {
        true => DiskImg::open_volume(path,read_only,config)?,
        false => DiskImg::open_image(path,read_only,config)?
    };
    disk.analyze_image()?;
    disk.analyze_image_fs()?;
    let maybe_fs = cmd.get_one::<String>("fs");
    let maybe_order = cmd.get_one::<String>("order");
    if maybe_fs.is_some() || maybe_order.is_some() {
        let fs_fmt = match maybe_fs {
            Some(s) => FsFormat::from_str(s)?,
            None => disk.fs_format()
        };
        let order = match maybe_order {
            Some(s) => SectorOrder::from_str(s)?,
            None => disk.image_order()
        };
        info!("overriding with {} in {} order",fs_fmt,order);
        disk.override_format(disk.physical_format(),fs_fmt,order)?;
    }
    Ok(disk)
}

/// Open an embedded volume by index, using the partition map or the UniDOS layout
pub fn open_part(disk: &mut DiskImg,index: usize) -> Result<DiskImg,crate::DYNERR> {
    match disk.fs_format() {
        FsFormat::MacPartitionMap => Ok(disk.open_partition(index)?),
        FsFormat::Unidos => {
            let (first,tracks,sectors) = *fs::dos3x::unidos_volumes().get(index).ok_or(CommandError::OutOfRange)?;
            Ok(disk.open_embedded_tracks(first,tracks,sectors)?)
        },
        _ => Err(CommandError::NoPartitions.into())
    }
}

/// Run `f` on the image, or on one of its partitions if `--part` was given, then close.
pub fn with_target<F>(cmd: &clap::ArgMatches,read_only: bool,f: F) -> STDRESULT
where F: FnOnce(&mut DiskImg) -> STDRESULT {
    let mut disk = open_disk(cmd,read_only)?;
    match cmd.get_one::<String>("part") {
        Some(s) => {
            let index = parse_usize(s)?;
            let mut child = open_part(&mut disk,index)?;
            debug!("working on partition {}",index);
            f(&mut child)?;
            // closing the child carries its changes up to the parent
            child.close()?;
        },
        None => f(&mut disk)?
    }
    disk.close()?;
    Ok(())
}

#[test]
fn requests() {
    assert_eq!(parse_block_request("2..5,,9").expect("parse"),vec![2,3,4,9]);
    assert_eq!(parse_block_request("0x10").expect("parse"),vec![16]);
    assert_eq!(parse_sector_request("17,0..2,,18,$f").expect("parse"),vec![[17,0],[17,1],[18,15]]);
    assert!(parse_sector_request("17").is_err());
    assert!(parse_block_request("5..5").is_err());
}
