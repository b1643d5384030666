//! ## Format identification
//!
//! Given a name and a source, work out the outer compression and the wrapper.
//! Some extensions are reliable, i.e., a file named that way is never anything else.
//! For those only the named wrapper is tried, and failure is reported as a mismatch
//! between extension and content.  Otherwise every wrapper gets a chance in a fixed
//! order, with the formats that have a signature or checksum going first.

use log::{debug,info,warn};
use crate::io::SharedSource;
use crate::img::{self,outer,Error,FileFormat,OuterFormat,PhysicalFormat,ImageWrapper,Prepared};

/// Extension given to host block devices, which are never compressed or wrapped
pub const RAW_VOLUME_TAG: &str = "$rawvol";

/// Order of trial for unreliable extensions
const PROBE_ORDER: [(FileFormat,PhysicalFormat);9] = [
    (FileFormat::NuFX,PhysicalFormat::Sectors),
    (FileFormat::DiskCopy42,PhysicalFormat::Sectors),
    (FileFormat::TwoMG,PhysicalFormat::Sectors),
    (FileFormat::DDD,PhysicalFormat::Sectors),
    (FileFormat::Sim2eHDV,PhysicalFormat::Sectors),
    (FileFormat::TrackStar,PhysicalFormat::Nib525_Var),
    (FileFormat::FDI,PhysicalFormat::Nib525_Var),
    (FileFormat::Unadorned,PhysicalFormat::Nib525_6656),
    (FileFormat::Unadorned,PhysicalFormat::Sectors)
];

/// Everything learned while peeling an image
pub struct Identified {
    pub outer: OuterFormat,
    /// name stored inside the outer layer, used when recompressing
    pub inner_name: String,
    /// source the wrapper works on, decompressed if there is an outer layer
    pub wrapped: SharedSource,
    pub wrapped_len: u64,
    pub wrapper: Box<dyn ImageWrapper>,
    pub prepared: Prepared,
    /// effective extension, lower case
    pub ext: String
}

/// Lower case extension of a file name, empty if there is none
pub fn extension(name: &str) -> String {
    let base = name.rsplit(|c| c=='/' || c=='\\').next().unwrap_or(name);
    match base.rfind('.') {
        Some(i) if i > 0 => base[i+1..].to_lowercase(),
        _ => String::new()
    }
}

/// The one wrapper to try for a reliable extension
pub fn reliable_format(ext: &str) -> Option<FileFormat> {
    match ext {
        "2mg" | "2img" => Some(FileFormat::TwoMG),
        "shk" | "sdk" | "bxy" => Some(FileFormat::NuFX),
        "hdv" => Some(FileFormat::Sim2eHDV),
        "ddd" => Some(FileFormat::DDD),
        "app" => Some(FileFormat::TrackStar),
        "fdi" => Some(FileFormat::FDI),
        RAW_VOLUME_TAG => Some(FileFormat::Unadorned),
        _ => None
    }
}

/// Every extension claimed by some wrapper or outer layer
pub fn known_extensions() -> Vec<String> {
    let lists = [
        img::dsk::file_extensions(),
        img::nib::file_extensions(),
        img::dot2mg::file_extensions(),
        img::dc42::file_extensions(),
        img::hdv::file_extensions(),
        img::trackstar::file_extensions(),
        img::fdi::file_extensions(),
        img::ddd::file_extensions(),
        crate::archive::nufx::file_extensions(),
        vec!["gz".to_string(),"zip".to_string()]
    ];
    let mut ans: Vec<String> = Vec::new();
    for ext in lists.into_iter().flatten() {
        if !ans.contains(&ext) {
            ans.push(ext);
        }
    }
    ans
}

fn try_wrapper(fmt: FileFormat,physical: PhysicalFormat,src: &SharedSource,length: u64,read_only: bool)
-> Result<(Box<dyn ImageWrapper>,Prepared),Error> {
    let mut wrapper = img::new_wrapper(fmt,physical)?;
    let prepared = wrapper.prep(src,length,read_only || !wrapper.can_write())?;
    Ok((wrapper,prepared))
}

/// Identify the image in `length` bytes of `src`.  The file `name` supplies the extension.
pub fn identify(src: &SharedSource,length: u64,name: &str,read_only: bool) -> Result<Identified,Error> {
    let mut ext = extension(name);
    let mut inner_name = name.rsplit(|c| c=='/' || c=='\\').next().unwrap_or(name).to_string();
    let mut outer_fmt = outer::suggested(&ext);
    let mut wrapped = src.clone();
    let mut wrapped_len = length;
    if outer_fmt != OuterFormat::None {
        if outer::test(outer_fmt,src,length) {
            let un = outer::load(outer_fmt,src,length,&inner_name,read_only)?;
            wrapped = un.buf;
            wrapped_len = un.length;
            inner_name = un.inner_name;
            ext = extension(&inner_name);
        } else {
            warn!("file has extension {} but is not compressed",ext);
            outer_fmt = OuterFormat::None;
            ext = extension(&outer::strip_ext(&inner_name));
        }
    }
    debug!("effective extension is `{}`",ext);
    if !ext.is_empty() && ext != RAW_VOLUME_TAG && !known_extensions().contains(&ext) {
        info!("extension `{}` is not claimed by any format, relying on content",ext);
    }
    let (wrapper,prepared) = match reliable_format(&ext) {
        Some(fmt) => {
            let physical = match fmt {
                FileFormat::TrackStar | FileFormat::FDI => PhysicalFormat::Nib525_Var,
                _ => PhysicalFormat::Sectors
            };
            match try_wrapper(fmt,physical,&wrapped,wrapped_len,read_only) {
                Ok(ans) => ans,
                Err(Error::FormatMismatch) => return Err(Error::ExtensionMismatch {
                    ext: ext.clone(),
                    reason: format!("content is not {}",fmt)
                }),
                Err(e) => return Err(e)
            }
        },
        None => {
            let mut best: Option<Error> = None;
            let mut found = None;
            for (fmt,physical) in PROBE_ORDER {
                match try_wrapper(fmt,physical,&wrapped,wrapped_len,read_only) {
                    Ok(ans) => {
                        found = Some(ans);
                        break;
                    },
                    Err(Error::FormatMismatch) => debug!("not {}",fmt),
                    Err(e) if e.is_damaged() => return Err(e),
                    Err(Error::MultiFileArchive) => return Err(Error::MultiFileArchive),
                    Err(e) => {
                        debug!("{} declined: {}",fmt,e);
                        if best.is_none() {
                            best = Some(e);
                        }
                    }
                }
            }
            match (found,best) {
                (Some(ans),_) => ans,
                (None,Some(e)) => return Err(e),
                (None,None) => return Err(Error::Unsupported(format!("`{}` is not a recognized disk image",inner_name)))
            }
        }
    };
    info!("identified {} / {} / {}",outer_fmt,wrapper.what_am_i(),prepared.physical);
    Ok(Identified { outer: outer_fmt, inner_name, wrapped, wrapped_len, wrapper, prepared, ext })
}
