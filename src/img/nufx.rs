//! ## Support for disk images inside NuFX archives
//!
//! The archive codec does the heavy lifting.  We insist on exactly one record
//! holding exactly one disk image thread, which is materialized into a buffer.
//! Flushing hands the buffer back to the codec to rebuild the archive.

use log::info;
use crate::io::{Source,SharedSource};
use crate::archive::{ArchiveCodec,nufx::NufxCodec};
use crate::img::{self,Error,FileFormat,PhysicalFormat,SectorOrder,Prepared,CreateSpec};

const DEFAULT_NAME: &str = "NEW.DISK";

pub struct NufxWrapper {
    codec: NufxCodec
}

impl NufxWrapper {
    pub fn new() -> Self {
        Self { codec: NufxCodec::new() }
    }
}

impl img::ImageWrapper for NufxWrapper {
    fn what_am_i(&self) -> FileFormat {
        FileFormat::NuFX
    }
    fn test(&mut self,src: &SharedSource,length: u64) -> Result<(),Error> {
        if length < 48 {
            return Err(Error::FormatMismatch);
        }
        let buf = src.borrow_mut().read_all()?;
        if !self.codec.test(&buf) {
            return Err(Error::FormatMismatch);
        }
        self.codec.find_disk_image(&buf)?;
        Ok(())
    }
    fn prep(&mut self,src: &SharedSource,length: u64,read_only: bool) -> Result<Prepared,Error> {
        self.test(src,length)?;
        let buf = src.borrow_mut().read_all()?;
        let thread = self.codec.find_disk_image(&buf)?;
        info!("identified NuFX disk thread of {} bytes",thread.data.len());
        if thread.data.len() % img::BLOCK_SIZE != 0 {
            return Err(Error::Unsupported(format!("disk thread length {}",thread.data.len())));
        }
        let length = thread.data.len() as u64;
        let mut ans = Prepared::new(Source::from_buffer(thread.data,read_only),length,PhysicalFormat::Sectors,SectorOrder::ProDOS);
        ans.notes = thread.notes;
        Ok(ans)
    }
    fn create(&mut self,spec: &CreateSpec,dest: &SharedSource) -> Result<(u64,SharedSource),Error> {
        if spec.physical != PhysicalFormat::Sectors || spec.order != SectorOrder::ProDOS || spec.length % img::BLOCK_SIZE as u64 != 0 {
            return Err(Error::BadArgument("NuFX disk threads hold ProDOS ordered blocks".to_string()));
        }
        let flat = vec![0;spec.length as usize];
        let archive = self.codec.create(&flat,DEFAULT_NAME)?;
        dest.borrow_mut().replace_all(&archive)?;
        Ok((archive.len() as u64,Source::from_buffer(flat,false)))
    }
    fn flush(&mut self,dest: &SharedSource,flat: &SharedSource,_data_len: u64) -> Result<u64,Error> {
        let dat = flat.borrow_mut().read_all()?;
        let archive = self.codec.rebuild(&dat)?;
        dest.borrow_mut().replace_all(&archive)?;
        Ok(archive.len() as u64)
    }
}
