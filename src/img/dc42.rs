//! ## Support for DiskCopy 4.2 images
//!
//! An 84 byte big endian header, then the sector data, then the tag bytes.
//! Only the 800K GCR layout used by the Apple IIgs is accepted.
//! A checksum mismatch is survivable, but the image is forced read-only
//! so that we never "repair" the checksum over data nobody has verified.

use std::io::{Cursor,Write};
use binrw::{binrw,BinRead,BinWrite};
use log::{debug,warn};
use crate::io::{Source,SharedSource};
use crate::img::{self,Error,FileFormat,PhysicalFormat,SectorOrder,Prepared,CreateSpec};

const HEADER_LEN: u64 = 84;
pub const DATA_LEN_800K: u32 = 819200;
const TAG_LEN_800K: u32 = 19200;
const PRIVATE: u16 = 0x0100;
const DEFAULT_NAME: &str = "-not a Macintosh disk-";

pub fn file_extensions() -> Vec<String> {
    vec!["dc".to_string(),"dc42".to_string(),"dsk".to_string(),"image".to_string()]
}

#[derive(Debug,Clone)]
#[binrw]
#[brw(big)]
pub struct Header {
    pub name_len: u8,
    pub name: [u8;63],
    pub data_size: u32,
    pub tag_size: u32,
    pub data_checksum: u32,
    pub tag_checksum: u32,
    pub disk_format: u8,
    pub format_byte: u8,
    pub private: u16
}

/// DiskCopy checksum: add each big endian word and rotate right
pub fn checksum(dat: &[u8]) -> u32 {
    let mut sum: u32 = 0;
    for word in dat.chunks(2) {
        let w = match word.len() {
            2 => u16::from_be_bytes([word[0],word[1]]),
            _ => (word[0] as u16) << 8
        };
        sum = sum.wrapping_add(w as u32).rotate_right(1);
    }
    sum
}

/// The first 12 tag bytes are left out of the tag checksum
pub fn tag_checksum(tags: &[u8]) -> u32 {
    match tags.len() > 12 {
        true => checksum(&tags[12..]),
        false => 0
    }
}

pub struct DiskCopy42 {
    header: Option<Header>
}

impl DiskCopy42 {
    pub fn new() -> Self {
        Self { header: None }
    }
    pub fn name(&self) -> String {
        match &self.header {
            Some(h) => String::from_utf8_lossy(&h.name[0..usize::min(63,h.name_len as usize)]).to_string(),
            None => String::new()
        }
    }
    fn read_header(src: &SharedSource) -> Result<Header,Error> {
        let mut buf = vec![0;HEADER_LEN as usize];
        src.borrow_mut().read_at(0,&mut buf)?;
        Ok(Header::read(&mut Cursor::new(&buf))?)
    }
    fn write_header(dest: &SharedSource,header: &Header) -> Result<(),Error> {
        let mut cur = Cursor::new(Vec::new());
        header.write(&mut cur)?;
        dest.borrow_mut().write_at(0,cur.get_ref())?;
        Ok(())
    }
    /// returns (data checksum, tag checksum) as found in the file
    fn compute_sums(src: &SharedSource,header: &Header) -> Result<(u32,u32),Error> {
        let mut dat = vec![0;header.data_size as usize];
        let mut tags = vec![0;header.tag_size as usize];
        let mut s = src.borrow_mut();
        s.read_at(HEADER_LEN,&mut dat)?;
        s.read_at(HEADER_LEN + header.data_size as u64,&mut tags)?;
        Ok((checksum(&dat),tag_checksum(&tags)))
    }
}

impl img::ImageWrapper for DiskCopy42 {
    fn what_am_i(&self) -> FileFormat {
        FileFormat::DiskCopy42
    }
    fn test(&mut self,src: &SharedSource,length: u64) -> Result<(),Error> {
        if length < HEADER_LEN {
            return Err(Error::FormatMismatch);
        }
        let header = Self::read_header(src)?;
        if header.private != PRIVATE || header.name_len > 63 {
            return Err(Error::FormatMismatch);
        }
        if HEADER_LEN + header.data_size as u64 + header.tag_size as u64 != length {
            debug!("DiskCopy sizes do not add up to {}",length);
            return Err(Error::FormatMismatch);
        }
        if header.data_size != DATA_LEN_800K {
            return Err(Error::Unsupported(format!("DiskCopy data size {}",header.data_size)));
        }
        if header.tag_size != 0 && header.tag_size != TAG_LEN_800K {
            return Err(Error::Damaged(format!("DiskCopy tag size {}",header.tag_size)));
        }
        self.header = Some(header);
        Ok(())
    }
    fn prep(&mut self,src: &SharedSource,length: u64,read_only: bool) -> Result<Prepared,Error> {
        self.test(src,length)?;
        let header = self.header.clone().ok_or(Error::NotOpen)?;
        let (dsum,tsum) = Self::compute_sums(src,&header)?;
        let bad_sum = dsum != header.data_checksum || (header.tag_size > 0 && tsum != header.tag_checksum);
        let flat = Source::offset_view(src,HEADER_LEN,header.data_size as u64,read_only || bad_sum)?;
        let mut ans = Prepared::new(flat,header.data_size as u64,PhysicalFormat::Sectors,SectorOrder::ProDOS);
        if bad_sum {
            warn!("DiskCopy checksum mismatch, expected {:08X} got {:08X}",header.data_checksum,dsum);
            ans.damaged = true;
            ans.force_read_only = true;
            ans.notes.push("checksum mismatch, forced read-only".to_string());
        }
        ans.notes.push(format!("disk name: {}",self.name()));
        Ok(ans)
    }
    fn create(&mut self,spec: &CreateSpec,dest: &SharedSource) -> Result<(u64,SharedSource),Error> {
        if spec.physical != PhysicalFormat::Sectors || spec.order != SectorOrder::ProDOS || spec.length != DATA_LEN_800K as u64 {
            return Err(Error::BadArgument("DiskCopy 4.2 holds 1600 blocks in ProDOS order".to_string()));
        }
        let mut name = [0;63];
        name[0..DEFAULT_NAME.len()].copy_from_slice(DEFAULT_NAME.as_bytes());
        let tags = vec![0;TAG_LEN_800K as usize];
        let header = Header {
            name_len: DEFAULT_NAME.len() as u8,
            name,
            data_size: DATA_LEN_800K,
            tag_size: TAG_LEN_800K,
            data_checksum: checksum(&vec![0;DATA_LEN_800K as usize]),
            tag_checksum: tag_checksum(&tags),
            disk_format: 1,
            format_byte: 0x24,
            private: PRIVATE
        };
        let total = HEADER_LEN + DATA_LEN_800K as u64 + TAG_LEN_800K as u64;
        dest.borrow_mut().replace_all(&vec![0;total as usize])?;
        Self::write_header(dest,&header)?;
        self.header = Some(header);
        let flat = Source::offset_view(dest,HEADER_LEN,DATA_LEN_800K as u64,false)?;
        Ok((total,flat))
    }
    fn flush(&mut self,dest: &SharedSource,_flat: &SharedSource,_data_len: u64) -> Result<u64,Error> {
        let mut header = self.header.clone().ok_or(Error::NotOpen)?;
        let (dsum,tsum) = Self::compute_sums(dest,&header)?;
        header.data_checksum = dsum;
        header.tag_checksum = tsum;
        Self::write_header(dest,&header)?;
        self.header = Some(header);
        dest.borrow_mut().flush()?;
        let len = dest.borrow().len()?;
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::img::ImageWrapper;

    #[test]
    fn checksum_rotates() {
        assert_eq!(checksum(&[0,1]),0x8000_0000);
        assert_eq!(checksum(&[0,1,0,1]),0xC000_0000);
    }

    #[test]
    fn create_then_corrupt() {
        let dest = Source::from_buffer(vec![],false);
        let spec = CreateSpec { length: 819200, physical: PhysicalFormat::Sectors, order: SectorOrder::ProDOS, dos_volume: None };
        let (len,flat) = DiskCopy42::new().create(&spec,&dest).expect("create");
        assert_eq!(len,84+819200+19200);
        drop(flat);
        let prep = DiskCopy42::new().prep(&dest,len,false).expect("prep");
        assert!(!prep.damaged);
        drop(prep);
        dest.borrow_mut().write_at(84+1000,&[0x55]).expect("poke");
        let prep = DiskCopy42::new().prep(&dest,len,false).expect("prep");
        assert!(prep.damaged);
        assert!(prep.force_read_only);
        assert!(prep.notes.iter().any(|n| n.contains("checksum mismatch")));
    }

    #[test]
    fn flush_repairs_checksum_after_write() {
        let dest = Source::from_buffer(vec![],false);
        let spec = CreateSpec { length: 819200, physical: PhysicalFormat::Sectors, order: SectorOrder::ProDOS, dos_volume: None };
        let mut w = DiskCopy42::new();
        let (len,flat) = w.create(&spec,&dest).expect("create");
        flat.borrow_mut().write_at(1000,&[0x55]).expect("write");
        assert_eq!(w.flush(&dest,&flat,819200).expect("flush"),len);
        drop(flat);
        let prep = DiskCopy42::new().prep(&dest,len,false).expect("prep");
        assert!(!prep.damaged);
    }
}
