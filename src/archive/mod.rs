//! # Archive Codec Boundary
//!
//! Some disk images travel inside file archives.  The image engine only needs two things
//! from an archive codec: find the one disk image thread, and put it back.
//! Anything else an archive holds is somebody else's business.
//!
//! The built in codec handles NuFX (ShrinkIt) archives whose disk thread is stored
//! without compression.

pub mod nufx;

/// Enumerates archive errors.  The `Display` trait will print equivalent long message.
#[derive(thiserror::Error,Debug)]
pub enum Error {
    #[error("not an archive this codec understands")]
    NotArchive,
    #[error("archive holds more than one record")]
    MultipleRecords,
    #[error("archive holds no disk image thread")]
    NoDiskThread,
    #[error("CRC mismatch in {0}")]
    BadCrc(String),
    #[error("archive ends unexpectedly")]
    Truncated,
    #[error("thread format {0} is not supported")]
    Compressed(u16)
}

/// The disk image found in an archive
pub struct DiskImageThread {
    pub data: Vec<u8>,
    pub notes: Vec<String>
}

pub trait ArchiveCodec {
    /// Cheap check of the archive signature
    fn test(&self,buf: &[u8]) -> bool;
    /// Locate the single disk image thread and return its bytes.
    /// The codec remembers enough to rebuild the archive later.
    fn find_disk_image(&mut self,buf: &[u8]) -> Result<DiskImageThread,Error>;
    /// Produce the archive with the disk thread replaced by `disk`, which must keep its length.
    /// Output depends only on the inputs, so rebuilding twice gives the same bytes.
    fn rebuild(&self,disk: &[u8]) -> Result<Vec<u8>,Error>;
    /// Start a new archive holding `disk` under the name `name`
    fn create(&mut self,disk: &[u8],name: &str) -> Result<Vec<u8>,Error>;
}

impl From<Error> for crate::img::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::NotArchive => Self::FormatMismatch,
            Error::MultipleRecords | Error::NoDiskThread => Self::MultiFileArchive,
            Error::BadCrc(_) | Error::Truncated => Self::Damaged(e.to_string()),
            Error::Compressed(_) => Self::Unsupported(e.to_string())
        }
    }
}
