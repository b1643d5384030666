//! ## Support for TrackStar images
//!
//! A TrackStar `.app` file is 40 fixed size records, one per track.  Each record holds a
//! text field, a zero byte, and the latched nibbles of one revolution stored back to front.
//! The last two bytes give the number of valid nibbles, with 0 meaning the whole field.
//!
//! The flat view puts each track in forward order at the start of a 6656 byte slot.
//! Track lengths vary, so they are kept here and exposed through `nibble_track_len`.

use log::{debug,trace,info};
use crate::io::{Source,SharedSource};
use crate::img::{self,Error,FileFormat,PhysicalFormat,SectorOrder,Prepared,CreateSpec};

pub const RECORD_LEN: usize = 6656;
pub const TRACKS: usize = 40;
const TEXT_LEN: usize = 128;
const BODY_OFFSET: usize = 129;
pub const MAX_NIBBLES: usize = 6525;
const LEN_OFFSET: usize = 6654;

pub fn file_extensions() -> Vec<String> {
    vec!["app".to_string()]
}

/// One track's record as it sits in the file
#[derive(Clone)]
pub struct Record {
    raw: Vec<u8>
}

impl Record {
    fn blank(track: usize) -> Self {
        let mut raw = vec![0xff;RECORD_LEN];
        let mut text = format!("a2dimg track {:02}",track).into_bytes();
        text.resize(TEXT_LEN,0x20);
        raw[0..TEXT_LEN].copy_from_slice(&text);
        raw[TEXT_LEN] = 0;
        raw[LEN_OFFSET..].copy_from_slice(&[0,0]);
        Self { raw }
    }
    fn field(&self) -> usize {
        u16::from_le_bytes([self.raw[LEN_OFFSET],self.raw[LEN_OFFSET+1]]) as usize
    }
    /// number of valid nibbles
    pub fn nib_len(&self) -> usize {
        match self.field() {
            0 => MAX_NIBBLES,
            l => l
        }
    }
    fn set_nib_len(&mut self,len: usize) {
        // keep the 0 convention if it was already in use
        if self.field()==0 && len==MAX_NIBBLES {
            return;
        }
        self.raw[LEN_OFFSET..].copy_from_slice(&u16::to_le_bytes(len as u16));
    }
    fn check(&self,track: usize) -> Result<(),Error> {
        if self.raw[TEXT_LEN] != 0 {
            debug!("track {} missing zero sentinel",track);
            return Err(Error::FormatMismatch);
        }
        if self.field() > MAX_NIBBLES {
            debug!("track {} length {} too large",track,self.field());
            return Err(Error::FormatMismatch);
        }
        let body = &self.raw[BODY_OFFSET..BODY_OFFSET+self.nib_len()];
        if body.iter().any(|b| b & 0x80 == 0) {
            debug!("track {} has bytes that are not nibbles",track);
            return Err(Error::FormatMismatch);
        }
        Ok(())
    }
    /// nibbles in forward order
    pub fn unpack(&self) -> Vec<u8> {
        let l = self.nib_len();
        self.raw[BODY_OFFSET..BODY_OFFSET+l].iter().rev().copied().collect()
    }
    /// store forward nibbles, anything past the valid length is left alone
    pub fn pack(&mut self,nibs: &[u8]) {
        let l = nibs.len();
        self.set_nib_len(l);
        for i in 0..l {
            self.raw[BODY_OFFSET+i] = nibs[l-1-i] | 0x80;
        }
    }
}

pub struct TrackStar {
    records: Vec<Record>
}

impl TrackStar {
    pub fn new() -> Self {
        Self { records: Vec::new() }
    }
    fn flat_bytes(&self) -> Vec<u8> {
        let mut ans = Vec::with_capacity(TRACKS*RECORD_LEN);
        for rec in &self.records {
            let mut slot = rec.unpack();
            slot.resize(RECORD_LEN,0xff);
            ans.append(&mut slot);
        }
        ans
    }
    fn wrapped_bytes(&self) -> Vec<u8> {
        self.records.iter().flat_map(|r| r.raw.iter().copied()).collect()
    }
}

impl img::ImageWrapper for TrackStar {
    fn what_am_i(&self) -> FileFormat {
        FileFormat::TrackStar
    }
    fn test(&mut self,src: &SharedSource,length: u64) -> Result<(),Error> {
        if length != (TRACKS*RECORD_LEN) as u64 {
            return Err(Error::FormatMismatch);
        }
        let buf = src.borrow_mut().read_all()?;
        let mut records = Vec::new();
        for track in 0..TRACKS {
            let rec = Record { raw: buf[track*RECORD_LEN..(track+1)*RECORD_LEN].to_vec() };
            rec.check(track)?;
            records.push(rec);
        }
        trace!("all TrackStar records pass");
        self.records = records;
        Ok(())
    }
    fn prep(&mut self,src: &SharedSource,length: u64,read_only: bool) -> Result<Prepared,Error> {
        self.test(src,length)?;
        info!("identified TrackStar image");
        let flat = Source::from_buffer(self.flat_bytes(),read_only);
        Ok(Prepared::new(flat,(TRACKS*RECORD_LEN) as u64,PhysicalFormat::Nib525_Var,SectorOrder::Physical))
    }
    fn create(&mut self,spec: &CreateSpec,dest: &SharedSource) -> Result<(u64,SharedSource),Error> {
        if spec.physical != PhysicalFormat::Nib525_Var || spec.length != (TRACKS*RECORD_LEN) as u64 {
            return Err(Error::BadArgument("TrackStar holds 40 variable length nibble tracks".to_string()));
        }
        self.records = (0..TRACKS).map(|t| Record::blank(t)).collect();
        let wrapped = self.wrapped_bytes();
        dest.borrow_mut().replace_all(&wrapped)?;
        let flat = Source::from_buffer(self.flat_bytes(),false);
        Ok((wrapped.len() as u64,flat))
    }
    fn flush(&mut self,dest: &SharedSource,flat: &SharedSource,_data_len: u64) -> Result<u64,Error> {
        let dat = flat.borrow_mut().read_all()?;
        for (track,rec) in self.records.iter_mut().enumerate() {
            let l = rec.nib_len();
            rec.pack(&dat[track*RECORD_LEN..track*RECORD_LEN+l]);
        }
        let wrapped = self.wrapped_bytes();
        dest.borrow_mut().replace_all(&wrapped)?;
        Ok(wrapped.len() as u64)
    }
    fn nibble_track_len(&self,track: usize) -> Option<usize> {
        self.records.get(track).map(|r| r.nib_len())
    }
    fn set_nibble_track_len(&mut self,track: usize,len: usize) -> Result<(),Error> {
        if len==0 || len > MAX_NIBBLES {
            return Err(Error::BadArgument(format!("TrackStar track length {}",len)));
        }
        match self.records.get_mut(track) {
            Some(rec) => {
                rec.set_nib_len(len);
                Ok(())
            },
            None => Err(Error::OutOfRange)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(len: usize) -> Record {
        let mut rec = Record::blank(3);
        for i in 0..MAX_NIBBLES {
            rec.raw[BODY_OFFSET+i] = 0x96 + (i % 0x60) as u8;
        }
        rec.raw[LEN_OFFSET..].copy_from_slice(&u16::to_le_bytes(len as u16));
        rec
    }

    #[test]
    fn record_round_trip() {
        for len in [1,100,6000,6524] {
            let rec = sample(len);
            let mut copy = rec.clone();
            let fwd = rec.unpack();
            assert_eq!(fwd.len(),len);
            assert_eq!(fwd[0],rec.raw[BODY_OFFSET+len-1]);
            copy.pack(&fwd);
            assert_eq!(copy.raw,rec.raw);
        }
    }

    #[test]
    fn zero_means_full() {
        let rec = sample(0);
        assert_eq!(rec.nib_len(),MAX_NIBBLES);
        let mut copy = rec.clone();
        copy.pack(&rec.unpack());
        assert_eq!(copy.raw,rec.raw);
    }

    #[test]
    fn pack_forces_high_bit() {
        let mut rec = sample(4);
        rec.pack(&[0x00,0x11,0x22,0x33]);
        assert_eq!(rec.unpack(),vec![0x80,0x91,0xa2,0xb3]);
    }
}
