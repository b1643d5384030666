//! ## Support for 2MG disk images
//!
//! This format consists of a header followed by data in either DSK or NIB format.
//! At the end of the data there can be a comment and creator information.
//! The payload is exposed in place, so only the header needs attention on flush.

use std::io::Write;
use log::{warn,debug,info};
use num_traits::FromPrimitive;
use num_derive::FromPrimitive;
use a2kit_macro::{DiskStruct,DiskStructError};
use a2kit_macro_derive::DiskStruct;
use crate::io::{Source,SharedSource};
use crate::img::{self,Error,FileFormat,PhysicalFormat,SectorOrder,Prepared,CreateSpec};
use crate::img::nib::{TRACK_BYTE_CAPACITY_NIB,TRACKS};

const HEADER_LEN: usize = 64;
const MAGIC: [u8;4] = *b"2IMG";
const CREATOR_ID: [u8;4] = *b"A2DI";
const FLAG_LOCKED: u32 = 0x8000_0000;
const FLAG_VOLUME: u32 = 0x0100;

pub fn file_extensions() -> Vec<String> {
    vec!["2mg".to_string(),"2img".to_string()]
}

#[derive(FromPrimitive,PartialEq,Clone,Copy)]
enum ImageFormat {
    DOS = 0,
    ProDOS = 1,
    Nibble = 2
}

// all header entries are LE numbers
#[derive(DiskStruct)]
pub struct Header {
    magic: [u8;4], // always '2IMG`
    creator_id: [u8;4], // a2dimg = 'A2DI'
    header_len: [u8;2],
    version: [u8;2], // 1
    img_fmt: [u8;4], // 0=DO, 1=PO, 2=nib
    flags: [u8;4], // bits 0-7=volume if bit 8 (otherwise 254), disk write protected if bit 31
    blocks: [u8;4],
    data_offset: [u8;4], // from start of file
    data_len: [u8;4],
    comment_offset: [u8;4],
    comment_len: [u8;4],
    creator_offset: [u8;4],
    creator_len: [u8;4],
    pad: [u8;16]
}

pub struct Dot2mg {
    header: Header,
    comment: String,
    creator_info: String,
    fixup_note: Option<String>
}

fn le32(x: [u8;4]) -> u64 {
    u32::from_le_bytes(x) as u64
}

/// true if trailer at `off` of `len` bytes intersects the payload
fn overlaps(off: u64,len: u64,data_off: u64,data_len: u64) -> bool {
    len > 0 && off < data_off + data_len && off + len > data_off
}

impl Dot2mg {
    pub fn new() -> Self {
        Self {
            header: Header::new(),
            comment: String::new(),
            creator_info: String::new(),
            fixup_note: None
        }
    }
    fn locked(&self) -> bool {
        le32(self.header.flags) as u32 & FLAG_LOCKED > 0
    }
    fn dos_volume(&self) -> Option<u8> {
        let flags = le32(self.header.flags) as u32;
        match flags & FLAG_VOLUME {
            0 => None,
            _ => Some((flags & 0xff) as u8)
        }
    }
    /// Set the legacy volume number, other flags are left alone
    pub fn set_dos_volume(&mut self,vol: u8) {
        let flags = u32::from_le_bytes(self.header.flags) & !0x1ff;
        self.header.flags = u32::to_le_bytes(flags | FLAG_VOLUME | vol as u32);
    }
    fn format_code(&self) -> Option<ImageFormat> {
        ImageFormat::from_u32(u32::from_le_bytes(self.header.img_fmt))
    }
    /// Check the header for consistency with a file of `length` bytes
    fn validate(&mut self,length: u64) -> Result<(),Error> {
        let header_len = u16::from_le_bytes(self.header.header_len) as u64;
        let version = u16::from_le_bytes(self.header.version);
        let data_off = le32(self.header.data_offset);
        let data_len = le32(self.header.data_len);
        let blocks = le32(self.header.blocks);
        if header_len < HEADER_LEN as u64 {
            return Err(Error::Damaged(format!("2MG header length {} is too short",header_len)));
        }
        if version > 1 {
            return Err(Error::Damaged(format!("2MG version {} not supported",version)));
        }
        let fmt = match self.format_code() {
            Some(fmt) => fmt,
            None => return Err(Error::Damaged(format!("illegal 2MG format {}",u32::from_le_bytes(self.header.img_fmt))))
        };
        if data_off < header_len || data_off + data_len > length {
            return Err(Error::Damaged(format!("2MG data at {} of length {} does not fit",data_off,data_len)));
        }
        match fmt {
            ImageFormat::DOS if blocks==0 => {
                // some creators leave blocks at 0 for DOS order
                let note = format!("2MG block count was 0, taken as {}",data_len / img::BLOCK_SIZE as u64);
                info!("{}",note);
                self.fixup_note = Some(note);
                self.header.blocks = u32::to_le_bytes((data_len / img::BLOCK_SIZE as u64) as u32);
            },
            ImageFormat::DOS | ImageFormat::ProDOS => {
                if blocks * img::BLOCK_SIZE as u64 != data_len {
                    return Err(Error::Damaged(format!("2MG block count {} does not match data size {}",blocks,data_len)));
                }
            },
            ImageFormat::Nibble => {
                if data_len != (TRACKS*TRACK_BYTE_CAPACITY_NIB) as u64 {
                    return Err(Error::Damaged(format!("2MG nibble data has length {}",data_len)));
                }
            }
        }
        let comment_off = le32(self.header.comment_offset);
        let comment_len = le32(self.header.comment_len);
        let creator_off = le32(self.header.creator_offset);
        let creator_len = le32(self.header.creator_len);
        if overlaps(comment_off,comment_len,data_off,data_len) || overlaps(creator_off,creator_len,data_off,data_len) {
            return Err(Error::Damaged("2MG trailer overlaps the disk data".to_string()));
        }
        Ok(())
    }
    fn read_trailer(src: &SharedSource,length: u64,off: u64,len: u64,what: &str) -> String {
        if len==0 {
            return String::new();
        }
        if off + len > length {
            warn!("end of {} {} runs past EOF, ignoring",what,off+len);
            return String::new();
        }
        let mut buf = vec![0;len as usize];
        if src.borrow_mut().read_at(off,&mut buf).is_err() {
            warn!("could not read {}",what);
            return String::new();
        }
        let ans = String::from_utf8_lossy(&buf).to_string();
        debug!("2MG {}: {}",what,ans);
        ans
    }
}

impl img::ImageWrapper for Dot2mg {
    fn what_am_i(&self) -> FileFormat {
        FileFormat::TwoMG
    }
    fn test(&mut self,src: &SharedSource,length: u64) -> Result<(),Error> {
        if length < HEADER_LEN as u64 {
            return Err(Error::FormatMismatch);
        }
        let mut buf = vec![0;HEADER_LEN];
        src.borrow_mut().read_at(0,&mut buf)?;
        if buf[0..4] != MAGIC {
            return Err(Error::FormatMismatch);
        }
        self.header = Header::from_bytes(&buf)?;
        self.validate(length)
    }
    fn prep(&mut self,src: &SharedSource,length: u64,read_only: bool) -> Result<Prepared,Error> {
        self.test(src,length)?;
        info!("identified 2MG from {:?}",String::from_utf8_lossy(&self.header.creator_id));
        self.comment = Self::read_trailer(src,length,le32(self.header.comment_offset),le32(self.header.comment_len),"comment");
        self.creator_info = Self::read_trailer(src,length,le32(self.header.creator_offset),le32(self.header.creator_len),"creator info");
        let (physical,order) = match self.format_code() {
            Some(ImageFormat::DOS) => (PhysicalFormat::Sectors,SectorOrder::DOS),
            Some(ImageFormat::ProDOS) => (PhysicalFormat::Sectors,SectorOrder::ProDOS),
            _ => (PhysicalFormat::Nib525_6656,SectorOrder::Physical)
        };
        let data_len = le32(self.header.data_len);
        let locked = self.locked();
        let flat = Source::offset_view(src,le32(self.header.data_offset),data_len,read_only || locked)?;
        let mut ans = Prepared::new(flat,data_len,physical,order);
        ans.dos_volume = self.dos_volume();
        ans.force_read_only = locked;
        if locked {
            ans.notes.push("2MG write protect flag is set".to_string());
        }
        if let Some(note) = &self.fixup_note {
            ans.notes.push(note.clone());
        }
        if self.comment.len() > 0 {
            ans.notes.push(format!("comment: {}",self.comment));
        }
        Ok(ans)
    }
    fn create(&mut self,spec: &CreateSpec,dest: &SharedSource) -> Result<(u64,SharedSource),Error> {
        let (fmt,blocks,fill) = match (spec.physical,spec.order) {
            (PhysicalFormat::Sectors,SectorOrder::DOS) => (ImageFormat::DOS,spec.length / img::BLOCK_SIZE as u64,0x00),
            (PhysicalFormat::Sectors,SectorOrder::ProDOS) => (ImageFormat::ProDOS,spec.length / img::BLOCK_SIZE as u64,0x00),
            (PhysicalFormat::Nib525_6656,SectorOrder::Physical) => (ImageFormat::Nibble,0,0xff),
            _ => return Err(Error::BadArgument(format!("2MG cannot hold {} in {} order",spec.physical,spec.order)))
        };
        if fmt==ImageFormat::Nibble && spec.length != (TRACKS*TRACK_BYTE_CAPACITY_NIB) as u64 {
            return Err(Error::BadArgument("2MG nibble data must be 35 tracks".to_string()));
        }
        self.creator_info = "a2dimg v".to_string() + env!("CARGO_PKG_VERSION");
        self.comment = String::new();
        let data_len = spec.length as u32;
        let cre_len = self.creator_info.len() as u32;
        self.header = Header {
            magic: MAGIC,
            creator_id: CREATOR_ID,
            header_len: u16::to_le_bytes(HEADER_LEN as u16),
            version: [1,0],
            img_fmt: u32::to_le_bytes(fmt as u32),
            flags: [0;4],
            blocks: u32::to_le_bytes(blocks as u32),
            data_offset: u32::to_le_bytes(HEADER_LEN as u32),
            data_len: u32::to_le_bytes(data_len),
            comment_offset: [0;4],
            comment_len: [0;4],
            creator_offset: u32::to_le_bytes(HEADER_LEN as u32 + data_len),
            creator_len: u32::to_le_bytes(cre_len),
            pad: [0;16]
        };
        if let Some(vol) = spec.dos_volume {
            self.set_dos_volume(vol);
        }
        let mut ans = self.header.to_bytes();
        ans.append(&mut vec![fill;spec.length as usize]);
        ans.append(&mut self.creator_info.as_bytes().to_vec());
        dest.borrow_mut().replace_all(&ans)?;
        let flat = Source::offset_view(dest,HEADER_LEN as u64,spec.length,false)?;
        Ok((ans.len() as u64,flat))
    }
    fn flush(&mut self,dest: &SharedSource,_flat: &SharedSource,_data_len: u64) -> Result<u64,Error> {
        // payload is written in place, header may carry a repaired block count
        let mut d = dest.borrow_mut();
        d.write_at(0,&self.header.to_bytes())?;
        d.flush()?;
        Ok(d.len()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::img::ImageWrapper;

    fn spec(physical: PhysicalFormat,order: SectorOrder,length: u64) -> CreateSpec {
        CreateSpec { length, physical, order, dos_volume: Some(100) }
    }

    #[test]
    fn create_and_reopen() {
        let dest = Source::from_buffer(vec![],false);
        let mut w = Dot2mg::new();
        let (len,flat) = w.create(&spec(PhysicalFormat::Sectors,SectorOrder::DOS,143360),&dest).expect("create");
        assert_eq!(len,64+143360+"a2dimg v".len() as u64+env!("CARGO_PKG_VERSION").len() as u64);
        assert_eq!(w.flush(&dest,&flat,143360).expect("flush"),len);
        let mut w2 = Dot2mg::new();
        let prep = w2.prep(&dest,len,true).expect("prep");
        assert_eq!(prep.order,SectorOrder::DOS);
        assert_eq!(prep.dos_volume,Some(100));
        assert_eq!(prep.length,143360);
        assert!(w2.creator_info.starts_with("a2dimg"));
        assert!(w2.comment.is_empty());
        assert!(prep.notes.is_empty());
    }

    #[test]
    fn comment_becomes_note() {
        let dest = Source::from_buffer(vec![],false);
        let mut w = Dot2mg::new();
        let (len,_flat) = w.create(&spec(PhysicalFormat::Sectors,SectorOrder::ProDOS,143360),&dest).expect("create");
        let comment = b"side 2 of the install set";
        dest.borrow_mut().write_at(len,comment).expect("append");
        dest.borrow_mut().write_at(32,&u32::to_le_bytes(len as u32)).expect("poke");
        dest.borrow_mut().write_at(36,&u32::to_le_bytes(comment.len() as u32)).expect("poke");
        let prep = Dot2mg::new().prep(&dest,len + comment.len() as u64,true).expect("prep");
        assert_eq!(prep.notes,vec!["comment: side 2 of the install set".to_string()]);
        // a comment past the end of the file is dropped
        let prep = Dot2mg::new().prep(&dest,len,true).expect("prep");
        assert!(prep.notes.is_empty());
    }

    #[test]
    fn header_round_trip() {
        let dest = Source::from_buffer(vec![],false);
        let mut w = Dot2mg::new();
        w.create(&spec(PhysicalFormat::Sectors,SectorOrder::ProDOS,819200),&dest).expect("create");
        let bytes = w.header.to_bytes();
        let header = Header::from_bytes(&bytes).expect("unpack");
        assert_eq!(u32::from_le_bytes(header.blocks),1600);
        assert_eq!(u32::from_le_bytes(header.data_len),819200);
        assert_eq!(u32::from_le_bytes(header.img_fmt),1);
        assert_eq!(header.to_bytes(),bytes);
    }

    #[test]
    fn volume_flag_bits() {
        let mut w = Dot2mg::new();
        w.header.flags = u32::to_le_bytes(FLAG_LOCKED | 0x1ff);
        w.set_dos_volume(0);
        assert_eq!(u32::from_le_bytes(w.header.flags),FLAG_LOCKED | FLAG_VOLUME);
        w.set_dos_volume(254);
        assert_eq!(u32::from_le_bytes(w.header.flags),FLAG_LOCKED | FLAG_VOLUME | 254);
        assert_eq!(w.dos_volume(),Some(254));
    }

    #[test]
    fn inconsistent_blocks_is_damage() {
        let dest = Source::from_buffer(vec![],false);
        let mut w = Dot2mg::new();
        let (len,_flat) = w.create(&spec(PhysicalFormat::Sectors,SectorOrder::ProDOS,143360),&dest).expect("create");
        dest.borrow_mut().write_at(20,&u32::to_le_bytes(281)).expect("poke");
        let err = Dot2mg::new().test(&dest,len).unwrap_err();
        assert!(err.is_damaged());
        let plain = Source::from_buffer(vec![0;143360],true);
        assert!(Dot2mg::new().test(&plain,143360).unwrap_err().is_mismatch());
    }

    #[test]
    fn locked_forces_read_only() {
        let dest = Source::from_buffer(vec![],false);
        let mut w = Dot2mg::new();
        let (len,_flat) = w.create(&spec(PhysicalFormat::Sectors,SectorOrder::ProDOS,143360),&dest).expect("create");
        dest.borrow_mut().write_at(16,&u32::to_le_bytes(FLAG_LOCKED)).expect("poke");
        let prep = Dot2mg::new().prep(&dest,len,false).expect("prep");
        assert!(prep.force_read_only);
        assert!(prep.flat.borrow().read_only());
    }
}
