//! ## Support for unadorned sector images
//!
//! The file is nothing but sectors, `.dsk`, `.do`, `.po`, `.d13`, `.raw`, and so on.
//! Since no order is recorded, the order is left unknown for the file system probes
//! and the extension to settle.

use log::debug;
use crate::io::{Source,SharedSource};
use crate::img::{self,Error,FileFormat,PhysicalFormat,SectorOrder,Prepared,CreateSpec};

/// 35 tracks of 13 sectors
pub const D13_LEN: u64 = 116480;

pub fn file_extensions() -> Vec<String> {
    vec!["dsk","do","po","d13","raw","iso","img"].iter().map(|s| s.to_string()).collect()
}

pub struct UnadornedSector {
}

impl UnadornedSector {
    pub fn new() -> Self {
        Self {}
    }
}

impl img::ImageWrapper for UnadornedSector {
    fn what_am_i(&self) -> FileFormat {
        FileFormat::Unadorned
    }
    fn test(&mut self,_src: &SharedSource,length: u64) -> Result<(),Error> {
        if length==0 || (length % img::BLOCK_SIZE as u64 != 0 && length != D13_LEN) {
            debug!("length {} is not a sector image",length);
            return Err(Error::FormatMismatch);
        }
        Ok(())
    }
    fn prep(&mut self,src: &SharedSource,length: u64,read_only: bool) -> Result<Prepared,Error> {
        self.test(src,length)?;
        let flat = Source::offset_view(src,0,length,read_only)?;
        Ok(Prepared::new(flat,length,PhysicalFormat::Sectors,SectorOrder::Unknown))
    }
    fn create(&mut self,spec: &CreateSpec,dest: &SharedSource) -> Result<(u64,SharedSource),Error> {
        if spec.physical != PhysicalFormat::Sectors {
            return Err(Error::BadArgument("unadorned sector image needs sector data".to_string()));
        }
        dest.borrow_mut().replace_all(&vec![0;spec.length as usize])?;
        let flat = Source::offset_view(dest,0,spec.length,false)?;
        Ok((spec.length,flat))
    }
    fn flush(&mut self,_dest: &SharedSource,_flat: &SharedSource,data_len: u64) -> Result<u64,Error> {
        // writes already landed in place
        Ok(data_len)
    }
}

#[test]
fn sector_lengths() {
    use crate::img::ImageWrapper;
    let src = Source::from_buffer(vec![],true);
    let mut w = UnadornedSector::new();
    assert!(w.test(&src,143360).is_ok());
    assert!(w.test(&src,D13_LEN).is_ok());
    assert!(w.test(&src,819200).is_ok());
    assert!(w.test(&src,143361).unwrap_err().is_mismatch());
    assert!(w.test(&src,0).unwrap_err().is_mismatch());
}
