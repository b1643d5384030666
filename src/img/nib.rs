//! ## Support for NIB disk images
//!
//! A NIB file is 35 tracks of latched nibbles laid end to end, each track padded
//! out to a fixed slot.  Two slot sizes are in circulation, 6656 (`.nib`) and 6384 (`.nb2`).
//! Sectors are recovered by the track engine in `tracks`, so the order is always physical.

use log::{debug,trace};
use crate::io::{Source,SharedSource};
use crate::img::{self,Error,FileFormat,PhysicalFormat,SectorOrder,Prepared,CreateSpec};

pub const TRACK_BYTE_CAPACITY_NIB: usize = 6656;
pub const TRACK_BYTE_CAPACITY_NB2: usize = 6384;
pub const TRACKS: usize = 35;

pub fn file_extensions() -> Vec<String> {
    vec!["nib".to_string(),"nb2".to_string(),"raw".to_string()]
}

/// Physical format implied by the length of a NIB file
pub fn physical_from_len(length: u64) -> Option<PhysicalFormat> {
    match length as usize {
        l if l == TRACKS*TRACK_BYTE_CAPACITY_NIB => Some(PhysicalFormat::Nib525_6656),
        l if l == TRACKS*TRACK_BYTE_CAPACITY_NB2 => Some(PhysicalFormat::Nib525_6384),
        _ => None
    }
}

pub struct UnadornedNibble {
    physical: PhysicalFormat
}

impl UnadornedNibble {
    pub fn new() -> Self {
        Self {
            physical: PhysicalFormat::Unknown
        }
    }
}

impl img::ImageWrapper for UnadornedNibble {
    fn what_am_i(&self) -> FileFormat {
        FileFormat::Unadorned
    }
    fn test(&mut self,src: &SharedSource,length: u64) -> Result<(),Error> {
        let physical = physical_from_len(length).ok_or(Error::FormatMismatch)?;
        // every latched nibble has the high bit set, check the first track
        let mut trk = vec![0;physical.track_slot()];
        src.borrow_mut().read_at(0,&mut trk)?;
        if let Some(pos) = trk.iter().position(|b| b & 0x80 == 0) {
            debug!("byte at {} is not a nibble",pos);
            return Err(Error::FormatMismatch);
        }
        trace!("nibble image with {} byte tracks",physical.track_slot());
        self.physical = physical;
        Ok(())
    }
    fn prep(&mut self,src: &SharedSource,length: u64,read_only: bool) -> Result<Prepared,Error> {
        self.test(src,length)?;
        let flat = Source::offset_view(src,0,length,read_only)?;
        Ok(Prepared::new(flat,length,self.physical,SectorOrder::Physical))
    }
    fn create(&mut self,spec: &CreateSpec,dest: &SharedSource) -> Result<(u64,SharedSource),Error> {
        match spec.physical {
            PhysicalFormat::Nib525_6656 | PhysicalFormat::Nib525_6384 => {},
            _ => return Err(Error::BadArgument("NIB image needs fixed length nibble tracks".to_string()))
        }
        let length = (TRACKS * spec.physical.track_slot()) as u64;
        dest.borrow_mut().replace_all(&vec![0xff;length as usize])?;
        self.physical = spec.physical;
        let flat = Source::offset_view(dest,0,length,false)?;
        Ok((length,flat))
    }
    fn flush(&mut self,_dest: &SharedSource,_flat: &SharedSource,data_len: u64) -> Result<u64,Error> {
        Ok(data_len)
    }
}

#[test]
fn nibble_test() {
    use crate::img::ImageWrapper;
    let mut w = UnadornedNibble::new();
    let good = Source::from_buffer(vec![0xff;TRACKS*TRACK_BYTE_CAPACITY_NB2],true);
    assert!(w.test(&good,(TRACKS*TRACK_BYTE_CAPACITY_NB2) as u64).is_ok());
    let bad = Source::from_buffer(vec![0;TRACKS*TRACK_BYTE_CAPACITY_NIB],true);
    assert!(w.test(&bad,(TRACKS*TRACK_BYTE_CAPACITY_NIB) as u64).unwrap_err().is_mismatch());
}
