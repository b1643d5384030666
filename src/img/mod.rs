//! # Disk Image Module
//!
//! Disk image files are handled by objects implementing the `ImageWrapper` trait.
//! The object type is named for the container format it handles, e.g., `Dot2mg`.
//! A wrapper knows how to recognize its container, how to expose the payload as a
//! flat run of sectors or nibble tracks, and how to put the payload back.
//!
//! ## Layers
//!
//! Opening an image peels up to three layers:
//! * an optional outer compression layer (`outer`), gzip or zip
//! * the wrapper (`dot2mg`, `dc42`, `nufx`, ...) which surrounds the payload
//! * the flat view, which is what `crate::disk::DiskImg` reads and writes
//!
//! The flat view is either a window onto the backing bytes, in which case writes
//! land in place, or a buffer that the wrapper re-encodes on `flush`.
//!
//! ## Sector Orders
//!
//! The flat view of a sector image holds sectors in some order that is not
//! recorded anywhere in most containers.  The permutations are kept in `bios::skew`.
//! Working out which order is in play is a joint effort of the wrapper, the
//! file extension, and the file system probes in `fs`.

pub mod outer;
pub mod identify;
pub mod geometry;
pub mod tracks;
pub mod dsk;
pub mod nib;
pub mod dot2mg;
pub mod dc42;
pub mod hdv;
pub mod trackstar;
pub mod fdi;
pub mod ddd;
pub mod nufx;

use std::fmt;
use std::str::FromStr;
use bit_vec::BitVec;
use crate::io::SharedSource;

pub const BLOCK_SIZE: usize = 512;
pub const SECTOR_SIZE: usize = 256;

/// Enumerates disk image errors.  The `Display` trait will print equivalent long message.
#[derive(thiserror::Error,Debug)]
pub enum Error {
    #[error("not this format")]
    FormatMismatch,
    #[error("image is damaged: {0}")]
    Damaged(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("extension `{ext}` does not match content: {reason}")]
    ExtensionMismatch { ext: String, reason: String },
    #[error("this is an archive of files, not a disk image")]
    MultiFileArchive,
    #[error("bad argument: {0}")]
    BadArgument(String),
    #[error("geometric coordinate out of range")]
    OutOfRange,
    #[error("image is read-only")]
    ReadOnly,
    #[error("image is not open")]
    NotOpen,
    #[error("image is still referenced by an embedded volume")]
    StillReferenced,
    #[error("parent image was closed")]
    ParentClosed,
    #[error("file system did not validate")]
    FilesystemMismatch,
    #[error("operation was cancelled")]
    Cancelled,
    #[error("nibble error: {0}")]
    Nibble(#[from] NibbleError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error)
}

impl Error {
    /// True if the format was positively recognized but failed validation.
    pub fn is_damaged(&self) -> bool {
        matches!(self,Self::Damaged(_))
    }
    pub fn is_mismatch(&self) -> bool {
        matches!(self,Self::FormatMismatch)
    }
}

impl From<a2kit_macro::DiskStructError> for Error {
    fn from(e: a2kit_macro::DiskStructError) -> Self {
        Self::Damaged(format!("structure could not be decoded ({:?})",e))
    }
}

impl From<binrw::Error> for Error {
    fn from(e: binrw::Error) -> Self {
        match e {
            binrw::Error::Io(io) => Self::Io(io),
            other => Self::Damaged(other.to_string())
        }
    }
}

/// Errors pertaining to nibble encoding
#[derive(thiserror::Error,Debug)]
pub enum NibbleError {
    #[error("could not interpret track data")]
    BadTrack,
    #[error("invalid byte while decoding")]
    InvalidByte,
    #[error("bad checksum found in a sector")]
    BadChecksum,
    #[error("sector not found")]
    SectorNotFound,
    #[error("nibble type appeared in wrong context")]
    NibbleType
}

/// Generic compression wrapped around everything else
#[derive(PartialEq,Eq,Clone,Copy,Debug)]
pub enum OuterFormat {
    None,
    Gzip,
    Zip
}

/// The container that surrounds the disk data
#[derive(PartialEq,Eq,Clone,Copy,Debug)]
pub enum FileFormat {
    Unknown,
    Unadorned,
    TwoMG,
    DiskCopy42,
    NuFX,
    Sim2eHDV,
    TrackStar,
    FDI,
    DDD
}

/// How the disk data is represented once the container is peeled away
#[derive(PartialEq,Eq,Clone,Copy,Debug)]
pub enum PhysicalFormat {
    Unknown,
    /// 256 byte sectors, no nibble information
    Sectors,
    /// 5.25 inch nibble tracks, 6656 bytes each
    Nib525_6656,
    /// 5.25 inch nibble tracks, 6384 bytes each
    Nib525_6384,
    /// 5.25 inch nibble tracks of varying length, stored in 6656 byte slots
    Nib525_Var
}

/// Order of the 16 sectors of a track as laid out in a file
#[derive(PartialEq,Eq,Clone,Copy,Debug)]
pub enum SectorOrder {
    Unknown,
    ProDOS,
    DOS,
    CPM,
    Physical
}

impl PhysicalFormat {
    pub fn is_nibble(&self) -> bool {
        matches!(self,Self::Nib525_6656 | Self::Nib525_6384 | Self::Nib525_Var)
    }
    /// Size of the slot each track occupies in the flat view
    pub fn track_slot(&self) -> usize {
        match self {
            Self::Nib525_6656 | Self::Nib525_Var => nib::TRACK_BYTE_CAPACITY_NIB,
            Self::Nib525_6384 => nib::TRACK_BYTE_CAPACITY_NB2,
            _ => 0
        }
    }
}

impl fmt::Display for OuterFormat {
    fn fmt(&self,f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f,"none"),
            Self::Gzip => write!(f,"gzip"),
            Self::Zip => write!(f,"zip")
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self,f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f,"unknown"),
            Self::Unadorned => write!(f,"unadorned"),
            Self::TwoMG => write!(f,"2mg"),
            Self::DiskCopy42 => write!(f,"dc42"),
            Self::NuFX => write!(f,"nufx"),
            Self::Sim2eHDV => write!(f,"hdv"),
            Self::TrackStar => write!(f,"trackstar"),
            Self::FDI => write!(f,"fdi"),
            Self::DDD => write!(f,"ddd")
        }
    }
}

impl FromStr for FileFormat {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self,Self::Err> {
        match s {
            "unadorned" | "dsk" | "do" | "po" | "d13" | "nib" => Ok(Self::Unadorned),
            "2mg" | "2img" => Ok(Self::TwoMG),
            "dc42" | "dc" => Ok(Self::DiskCopy42),
            "nufx" | "shk" | "sdk" => Ok(Self::NuFX),
            "hdv" => Ok(Self::Sim2eHDV),
            "trackstar" | "app" => Ok(Self::TrackStar),
            "fdi" => Ok(Self::FDI),
            "ddd" => Ok(Self::DDD),
            _ => Err(Error::BadArgument(format!("unknown file format `{}`",s)))
        }
    }
}

impl fmt::Display for PhysicalFormat {
    fn fmt(&self,f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f,"unknown"),
            Self::Sectors => write!(f,"sectors"),
            Self::Nib525_6656 => write!(f,"nib6656"),
            Self::Nib525_6384 => write!(f,"nib6384"),
            Self::Nib525_Var => write!(f,"nibvar")
        }
    }
}

impl FromStr for PhysicalFormat {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self,Self::Err> {
        match s {
            "sectors" => Ok(Self::Sectors),
            "nib6656" | "nib" => Ok(Self::Nib525_6656),
            "nib6384" | "nb2" => Ok(Self::Nib525_6384),
            "nibvar" => Ok(Self::Nib525_Var),
            _ => Err(Error::BadArgument(format!("unknown physical format `{}`",s)))
        }
    }
}

impl fmt::Display for SectorOrder {
    fn fmt(&self,f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f,"unknown"),
            Self::ProDOS => write!(f,"prodos"),
            Self::DOS => write!(f,"dos"),
            Self::CPM => write!(f,"cpm"),
            Self::Physical => write!(f,"physical")
        }
    }
}

impl FromStr for SectorOrder {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self,Self::Err> {
        match s {
            "prodos" | "po" => Ok(Self::ProDOS),
            "dos" | "do" => Ok(Self::DOS),
            "cpm" => Ok(Self::CPM),
            "physical" | "raw" => Ok(Self::Physical),
            "unknown" => Ok(Self::Unknown),
            _ => Err(Error::BadArgument(format!("unknown sector order `{}`",s)))
        }
    }
}

/// What a wrapper hands back after peeling its container.
pub struct Prepared {
    /// flat view of the payload
    pub flat: SharedSource,
    /// length of the flat view in bytes
    pub length: u64,
    pub physical: PhysicalFormat,
    pub order: SectorOrder,
    pub dos_volume: Option<u8>,
    /// one bit per block, set if the block could not be recovered
    pub bad_blocks: Option<BitVec>,
    pub notes: Vec<String>,
    pub force_read_only: bool,
    /// the container was recognized but failed a check that is known to be innocuous
    pub damaged: bool
}

impl Prepared {
    pub fn new(flat: SharedSource,length: u64,physical: PhysicalFormat,order: SectorOrder) -> Self {
        Self {
            flat,
            length,
            physical,
            order,
            dos_volume: None,
            bad_blocks: None,
            notes: Vec::new(),
            force_read_only: false,
            damaged: false
        }
    }
}

/// Parameters handed to a wrapper when creating a new image.
#[derive(Clone,Copy,Debug)]
pub struct CreateSpec {
    /// length of the flat view in bytes
    pub length: u64,
    pub physical: PhysicalFormat,
    pub order: SectorOrder,
    pub dos_volume: Option<u8>
}

/// The main trait for working with disk image containers.
/// The set of implementors is closed, use `new_wrapper` to get one.
pub trait ImageWrapper {
    fn what_am_i(&self) -> FileFormat;
    /// Cheap structural check of `length` bytes of `src`.
    /// Returns `FormatMismatch` if this is not the format, `Damaged` if it is but fails validation.
    fn test(&mut self,src: &SharedSource,length: u64) -> Result<(),Error>;
    /// Produce the flat view.  Must not modify the backing bytes.
    fn prep(&mut self,src: &SharedSource,length: u64,read_only: bool) -> Result<Prepared,Error>;
    /// Write a new container into `dest` and return (wrapped length, flat view).
    /// The flat view is blank (zeros, or 0xFF for nibbles), formatting is up to the caller.
    fn create(&mut self,spec: &CreateSpec,dest: &SharedSource) -> Result<(u64,SharedSource),Error>;
    /// Bring `dest` up to date with `flat` and return the wrapped length.
    fn flush(&mut self,dest: &SharedSource,flat: &SharedSource,data_len: u64) -> Result<u64,Error>;
    /// Length of a nibble track, only meaningful for `Nib525_Var`
    fn nibble_track_len(&self,_track: usize) -> Option<usize> {
        None
    }
    /// Record a new length for a nibble track, only meaningful for `Nib525_Var`
    fn set_nibble_track_len(&mut self,_track: usize,_len: usize) -> Result<(),Error> {
        Err(Error::Unsupported("track length is fixed".to_string()))
    }
    /// Whether the container can be written at all
    fn can_write(&self) -> bool {
        true
    }
}

/// Get a fresh wrapper for the given container, `physical` only matters for unadorned images
pub fn new_wrapper(fmt: FileFormat,physical: PhysicalFormat) -> Result<Box<dyn ImageWrapper>,Error> {
    match fmt {
        FileFormat::Unadorned if physical.is_nibble() => Ok(Box::new(nib::UnadornedNibble::new())),
        FileFormat::Unadorned => Ok(Box::new(dsk::UnadornedSector::new())),
        FileFormat::TwoMG => Ok(Box::new(dot2mg::Dot2mg::new())),
        FileFormat::DiskCopy42 => Ok(Box::new(dc42::DiskCopy42::new())),
        FileFormat::NuFX => Ok(Box::new(nufx::NufxWrapper::new())),
        FileFormat::Sim2eHDV => Ok(Box::new(hdv::Sim2eHdv::new())),
        FileFormat::TrackStar => Ok(Box::new(trackstar::TrackStar::new())),
        FileFormat::FDI => Ok(Box::new(fdi::Fdi::new())),
        FileFormat::DDD => Ok(Box::new(ddd::Ddd::new())),
        FileFormat::Unknown => Err(Error::BadArgument("no wrapper for unknown format".to_string()))
    }
}

/// If a data source is smaller than `quantum` bytes, pad it with zeros.
/// If it is larger, do not include the extra bytes.
pub fn quantize_block(src: &[u8],quantum: usize) -> Vec<u8> {
    let mut padded: Vec<u8> = src.iter().take(quantum).copied().collect();
    padded.resize(quantum,0);
    padded
}
