//! ## Outer compression
//!
//! Some images arrive wrapped in gzip or zip.  One level is peeled here and the
//! decompressed bytes become a buffer source that the wrapper tests run against.
//! On flush the whole buffer is compressed again, so a compressed image is never
//! updated in place.
//!
//! Compression is deterministic (fixed timestamps) so that flushing an unchanged
//! image twice gives the same bytes.

pub mod gzip;
pub mod zip;

use log::{debug,info};
use crate::io::SharedSource;
use crate::img::{Error,OuterFormat};

/// Bytes above which we refuse to decompress
pub const MAX_UNWRAPPED: u64 = 256_000_000;

/// The result of peeling the outer layer
pub struct Unwrapped {
    pub buf: SharedSource,
    pub length: u64,
    /// name of the wrapped file, this supplies the effective extension
    pub inner_name: String
}

/// Outer format suggested by a file extension
pub fn suggested(ext: &str) -> OuterFormat {
    match ext.to_lowercase().as_str() {
        "gz" => OuterFormat::Gzip,
        "zip" => OuterFormat::Zip,
        _ => OuterFormat::None
    }
}

/// Cheap structural test, never an error
pub fn test(fmt: OuterFormat,src: &SharedSource,length: u64) -> bool {
    match fmt {
        OuterFormat::Gzip => gzip::test(src,length),
        OuterFormat::Zip => zip::test(src,length),
        OuterFormat::None => false
    }
}

/// Decompress into a buffer source.
/// `name` is the outer file name, used when the container does not record an inner name.
pub fn load(fmt: OuterFormat,src: &SharedSource,length: u64,name: &str,read_only: bool) -> Result<Unwrapped,Error> {
    let ans = match fmt {
        OuterFormat::Gzip => gzip::load(src,length,name,read_only)?,
        OuterFormat::Zip => zip::load(src,length,read_only)?,
        OuterFormat::None => return Err(Error::BadArgument("no outer format to load".to_string()))
    };
    info!("unwrapped {} to {} bytes, inner name {}",fmt,ans.length,ans.inner_name);
    Ok(ans)
}

/// Compress `inner` and replace the contents of `dest`, returning the new length.
pub fn save(fmt: OuterFormat,dest: &SharedSource,inner: &[u8],inner_name: &str) -> Result<u64,Error> {
    let packed = match fmt {
        OuterFormat::Gzip => gzip::compress(inner,inner_name)?,
        OuterFormat::Zip => zip::compress(inner,inner_name)?,
        OuterFormat::None => return Err(Error::BadArgument("no outer format to save".to_string()))
    };
    debug!("compressed {} bytes to {}",inner.len(),packed.len());
    dest.borrow_mut().replace_all(&packed)?;
    Ok(packed.len() as u64)
}

/// Strip the last extension from a file name
pub fn strip_ext(name: &str) -> String {
    match name.rfind('.') {
        Some(i) if i > 0 => name[0..i].to_string(),
        _ => name.to_string()
    }
}
