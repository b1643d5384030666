//! ## Support for Sim //e HDV images
//!
//! A 15 byte header, the signature and a little endian block count, precedes
//! a ProDOS ordered payload.  Not to be confused with the headerless `.hdv`
//! used by other emulators, which is handled as plain sectors.

use std::io::Write;
use log::{debug,info};
use a2kit_macro::{DiskStruct,DiskStructError};
use a2kit_macro_derive::DiskStruct;
use crate::io::{Source,SharedSource};
use crate::img::{self,Error,FileFormat,PhysicalFormat,SectorOrder,Prepared,CreateSpec};

const SIGNATURE: &[u8;13] = b"SIMSYSTEM_HDV";
const HEADER_LEN: u64 = 15;

pub fn file_extensions() -> Vec<String> {
    vec!["hdv".to_string()]
}

#[derive(DiskStruct)]
pub struct Header {
    signature: [u8;13],
    blocks: [u8;2]
}

pub struct Sim2eHdv {
    blocks: u16
}

impl Sim2eHdv {
    pub fn new() -> Self {
        Self { blocks: 0 }
    }
}

impl img::ImageWrapper for Sim2eHdv {
    fn what_am_i(&self) -> FileFormat {
        FileFormat::Sim2eHDV
    }
    fn test(&mut self,src: &SharedSource,length: u64) -> Result<(),Error> {
        if length < HEADER_LEN {
            return Err(Error::FormatMismatch);
        }
        let mut buf = vec![0;HEADER_LEN as usize];
        src.borrow_mut().read_at(0,&mut buf)?;
        let header = Header::from_bytes(&buf)?;
        if header.signature != *SIGNATURE {
            return Err(Error::FormatMismatch);
        }
        let blocks = u16::from_le_bytes(header.blocks);
        if blocks==0 || HEADER_LEN + blocks as u64 * img::BLOCK_SIZE as u64 > length {
            return Err(Error::Damaged(format!("HDV claims {} blocks, file has {} bytes",blocks,length)));
        }
        debug!("Sim //e HDV with {} blocks",blocks);
        self.blocks = blocks;
        Ok(())
    }
    fn prep(&mut self,src: &SharedSource,length: u64,read_only: bool) -> Result<Prepared,Error> {
        self.test(src,length)?;
        info!("identified Sim //e HDV");
        let data_len = self.blocks as u64 * img::BLOCK_SIZE as u64;
        let flat = Source::offset_view(src,HEADER_LEN,data_len,read_only)?;
        Ok(Prepared::new(flat,data_len,PhysicalFormat::Sectors,SectorOrder::ProDOS))
    }
    fn create(&mut self,spec: &CreateSpec,dest: &SharedSource) -> Result<(u64,SharedSource),Error> {
        let blocks = spec.length / img::BLOCK_SIZE as u64;
        if spec.physical != PhysicalFormat::Sectors || spec.order != SectorOrder::ProDOS
            || spec.length % img::BLOCK_SIZE as u64 != 0 || blocks==0 || blocks > u16::MAX as u64 {
            return Err(Error::BadArgument("HDV holds 1 to 65535 blocks in ProDOS order".to_string()));
        }
        self.blocks = blocks as u16;
        let header = Header {
            signature: *SIGNATURE,
            blocks: u16::to_le_bytes(self.blocks)
        };
        let mut ans = header.to_bytes();
        ans.append(&mut vec![0;spec.length as usize]);
        dest.borrow_mut().replace_all(&ans)?;
        let flat = Source::offset_view(dest,HEADER_LEN,spec.length,false)?;
        Ok((ans.len() as u64,flat))
    }
    fn flush(&mut self,dest: &SharedSource,_flat: &SharedSource,_data_len: u64) -> Result<u64,Error> {
        let mut d = dest.borrow_mut();
        d.flush()?;
        Ok(d.len()?)
    }
}

#[test]
fn hdv_header() {
    use crate::img::ImageWrapper;
    let dest = Source::from_buffer(vec![],false);
    let spec = CreateSpec { length: 65535*512, physical: PhysicalFormat::Sectors, order: SectorOrder::ProDOS, dos_volume: None };
    let mut w = Sim2eHdv::new();
    let (len,flat) = w.create(&spec,&dest).expect("create");
    assert_eq!(len,15+65535*512);
    flat.borrow_mut().write_at(0,&[0x42]).expect("write");
    assert_eq!(w.flush(&dest,&flat,spec.length).expect("flush"),len);
    drop(flat);
    let buf = dest.borrow_mut().read_all().expect("read");
    assert_eq!(&buf[0..15],b"SIMSYSTEM_HDV\xff\xff");
    assert_eq!(buf[15],0x42);
    let prep = Sim2eHdv::new().prep(&dest,len,true).expect("prep");
    assert_eq!(prep.length,65535*512);
    dest.borrow_mut().set_len(1000).expect("truncate");
    assert!(Sim2eHdv::new().test(&dest,1000).unwrap_err().is_damaged());
}
