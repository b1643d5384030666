//! ## NuFX codec
//!
//! Reads and rebuilds single record NuFX archives.  Only enough of the format is
//! handled to pull out an uncompressed disk image thread.
//! A Binary II wrapper in front of the archive is carried along untouched.

use log::{debug,trace,warn};
use a2kit_macro::{DiskStruct,DiskStructError};
use a2kit_macro_derive::DiskStruct;
use chrono::{Datelike,Timelike};
use super::{ArchiveCodec,DiskImageThread,Error};

const NUFILE_ID: [u8;6] = [0x4e,0xf5,0x46,0xe9,0x6c,0xe5];
const NUFX_ID: [u8;4] = [0x4e,0xf5,0x46,0xd8];
const MASTER_LEN: usize = 48;
const RECORD_FIXED_LEN: usize = 56;
const THREAD_HEADER_LEN: usize = 16;
const BINARY2_LEN: usize = 128;
const CLASS_DATA: u16 = 2;
const CLASS_FILENAME: u16 = 3;
const KIND_DISK: u16 = 1;
const FORMAT_UNCOMPRESSED: u16 = 0;
const FILENAME_ROOM: u32 = 32;

pub fn file_extensions() -> Vec<String> {
    vec!["shk".to_string(),"sdk".to_string(),"bxy".to_string()]
}

const fn crc_table() -> [u16;256] {
    let mut table = [0u16;256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u16) << 8;
        let mut bit = 0;
        while bit < 8 {
            crc = match crc & 0x8000 {
                0 => crc << 1,
                _ => (crc << 1) ^ 0x1021
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

const CRC_TABLE: [u16;256] = crc_table();

/// CRC-16 as used throughout NuFX (XMODEM polynomial)
pub fn crc16(seed: u16,dat: &[u8]) -> u16 {
    dat.iter().fold(seed,|crc,b| (crc << 8) ^ CRC_TABLE[((crc >> 8) as u8 ^ b) as usize])
}

#[derive(DiskStruct)]
pub struct MasterHeader {
    nufile_id: [u8;6],
    master_crc: [u8;2],
    total_records: [u8;4],
    create_when: [u8;8],
    mod_when: [u8;8],
    master_version: [u8;2],
    reserved1: [u8;8],
    master_eof: [u8;4],
    reserved2: [u8;6]
}

#[derive(DiskStruct)]
pub struct RecordHeader {
    nufx_id: [u8;4],
    header_crc: [u8;2],
    attrib_count: [u8;2],
    version: [u8;2],
    total_threads: [u8;4],
    file_sys_id: [u8;2],
    file_sys_info: [u8;2],
    access: [u8;4],
    file_type: [u8;4],
    extra_type: [u8;4],
    storage_type: [u8;2],
    create_when: [u8;8],
    mod_when: [u8;8],
    archive_when: [u8;8]
}

#[derive(DiskStruct)]
pub struct ThreadHeader {
    class: [u8;2],
    format: [u8;2],
    kind: [u8;2],
    crc: [u8;2],
    eof: [u8;4],
    comp_eof: [u8;4]
}

/// NuFX date stamp from the local clock
fn nufx_now() -> [u8;8] {
    let now = chrono::Local::now().naive_local();
    [
        now.second() as u8,
        now.minute() as u8,
        now.hour() as u8,
        (now.year() - 1900) as u8,
        now.day0() as u8,
        now.month0() as u8,
        0,
        now.weekday().number_from_sunday() as u8
    ]
}

fn slice(buf: &[u8],start: usize,len: usize) -> Result<&[u8],Error> {
    match start.checked_add(len) {
        Some(end) if end <= buf.len() => Ok(&buf[start..end]),
        _ => Err(Error::Truncated)
    }
}

fn u16_at(buf: &[u8],i: usize) -> Result<u16,Error> {
    let s = slice(buf,i,2)?;
    Ok(u16::from_le_bytes([s[0],s[1]]))
}

/// Where things are in the archive we parsed
struct Layout {
    /// the whole archive as read
    original: Vec<u8>,
    /// start of the record header
    record: usize,
    /// end of the thread headers, which is the end of the header CRC
    header_end: usize,
    /// offset of the disk thread's header
    disk_header: usize,
    /// offset and length of the disk thread's data
    disk_data: usize,
    disk_len: usize,
    version: u16
}

pub struct NufxCodec {
    layout: Option<Layout>
}

impl NufxCodec {
    pub fn new() -> Self {
        Self { layout: None }
    }
    /// Length of a Binary II prefix, if present
    fn prefix_len(buf: &[u8]) -> usize {
        if buf.len() > BINARY2_LEN && buf[0..3]==[0x0a,0x47,0x4c] && buf[18]==0x02 {
            BINARY2_LEN
        } else {
            0
        }
    }
    fn parse(&self,buf: &[u8]) -> Result<Layout,Error> {
        let base = Self::prefix_len(buf);
        let master = MasterHeader::from_bytes(slice(buf,base,MASTER_LEN)?).map_err(|_| Error::Truncated)?;
        if master.nufile_id != NUFILE_ID {
            return Err(Error::NotArchive);
        }
        if crc16(0,&buf[base+8..base+MASTER_LEN]) != u16::from_le_bytes(master.master_crc) {
            return Err(Error::BadCrc("master header".to_string()));
        }
        match u32::from_le_bytes(master.total_records) {
            1 => {},
            0 => return Err(Error::NoDiskThread),
            n => {
                debug!("archive has {} records",n);
                return Err(Error::MultipleRecords);
            }
        }
        let record = base + MASTER_LEN;
        let rec = RecordHeader::from_bytes(slice(buf,record,RECORD_FIXED_LEN)?).map_err(|_| Error::Truncated)?;
        if rec.nufx_id != NUFX_ID {
            return Err(Error::NotArchive);
        }
        let attrib_count = u16::from_le_bytes(rec.attrib_count) as usize;
        let version = u16::from_le_bytes(rec.version);
        let fname_len = u16_at(buf,record + attrib_count)? as usize;
        let threads = u32::from_le_bytes(rec.total_threads) as usize;
        let thread_start = record + attrib_count + 2 + fname_len;
        let header_end = thread_start + threads * THREAD_HEADER_LEN;
        let header_bytes = slice(buf,record+6,header_end.saturating_sub(record+6))?;
        if crc16(0,header_bytes) != u16::from_le_bytes(rec.header_crc) {
            return Err(Error::BadCrc("record header".to_string()));
        }
        trace!("record version {} with {} threads",version,threads);
        let mut data_ptr = header_end;
        let mut found: Option<(usize,usize,usize)> = None;
        for t in 0..threads {
            let th_off = thread_start + t * THREAD_HEADER_LEN;
            let th = ThreadHeader::from_bytes(slice(buf,th_off,THREAD_HEADER_LEN)?).map_err(|_| Error::Truncated)?;
            let class = u16::from_le_bytes(th.class);
            let kind = u16::from_le_bytes(th.kind);
            let format = u16::from_le_bytes(th.format);
            let comp_eof = u32::from_le_bytes(th.comp_eof) as usize;
            if class==CLASS_DATA && kind==KIND_DISK {
                if found.is_some() {
                    return Err(Error::MultipleRecords);
                }
                if format != FORMAT_UNCOMPRESSED {
                    return Err(Error::Compressed(format));
                }
                let len = match u32::from_le_bytes(th.eof) {
                    0 => u32::from_le_bytes(rec.extra_type) as usize * u16::from_le_bytes(rec.storage_type) as usize,
                    eof => eof as usize
                };
                if len > comp_eof {
                    return Err(Error::Truncated);
                }
                let dat = slice(buf,data_ptr,len)?;
                if version >= 3 && crc16(0xffff,dat) != u16::from_le_bytes(th.crc) {
                    return Err(Error::BadCrc("disk thread".to_string()));
                }
                found = Some((th_off,data_ptr,len));
            }
            data_ptr += comp_eof;
        }
        if data_ptr > buf.len() {
            return Err(Error::Truncated);
        }
        match found {
            Some((disk_header,disk_data,disk_len)) => Ok(Layout {
                original: buf.to_vec(),
                record,
                header_end,
                disk_header,
                disk_data,
                disk_len,
                version
            }),
            None => Err(Error::NoDiskThread)
        }
    }
}

impl ArchiveCodec for NufxCodec {
    fn test(&self,buf: &[u8]) -> bool {
        let base = Self::prefix_len(buf);
        buf.len() >= base + MASTER_LEN && buf[base..base+6]==NUFILE_ID
    }
    fn find_disk_image(&mut self,buf: &[u8]) -> Result<DiskImageThread,Error> {
        let layout = self.parse(buf)?;
        let mut notes = Vec::new();
        if Self::prefix_len(buf) > 0 {
            notes.push("archive is wrapped in Binary II".to_string());
        }
        if layout.version < 3 {
            warn!("record version {} has no thread CRC",layout.version);
            notes.push("archive record has no data CRC".to_string());
        }
        let data = buf[layout.disk_data..layout.disk_data+layout.disk_len].to_vec();
        self.layout = Some(layout);
        Ok(DiskImageThread { data, notes })
    }
    fn rebuild(&self,disk: &[u8]) -> Result<Vec<u8>,Error> {
        let layout = self.layout.as_ref().ok_or(Error::NoDiskThread)?;
        if disk.len() != layout.disk_len {
            return Err(Error::Truncated);
        }
        let mut ans = layout.original.clone();
        ans[layout.disk_data..layout.disk_data+layout.disk_len].copy_from_slice(disk);
        if layout.version >= 3 {
            let crc = u16::to_le_bytes(crc16(0xffff,disk));
            ans[layout.disk_header+6..layout.disk_header+8].copy_from_slice(&crc);
        }
        let header_crc = u16::to_le_bytes(crc16(0,&ans[layout.record+6..layout.header_end]));
        ans[layout.record+4..layout.record+6].copy_from_slice(&header_crc);
        Ok(ans)
    }
    fn create(&mut self,disk: &[u8],name: &str) -> Result<Vec<u8>,Error> {
        let now = nufx_now();
        let mut fname = name.as_bytes().to_vec();
        fname.truncate(FILENAME_ROOM as usize);
        let name_thread = ThreadHeader {
            class: u16::to_le_bytes(CLASS_FILENAME),
            format: [0,0],
            kind: [0,0],
            crc: [0,0],
            eof: u32::to_le_bytes(fname.len() as u32),
            comp_eof: u32::to_le_bytes(FILENAME_ROOM)
        };
        let disk_thread = ThreadHeader {
            class: u16::to_le_bytes(CLASS_DATA),
            format: u16::to_le_bytes(FORMAT_UNCOMPRESSED),
            kind: u16::to_le_bytes(KIND_DISK),
            crc: u16::to_le_bytes(crc16(0xffff,disk)),
            eof: u32::to_le_bytes(disk.len() as u32),
            comp_eof: u32::to_le_bytes(disk.len() as u32)
        };
        let rec = RecordHeader {
            nufx_id: NUFX_ID,
            header_crc: [0,0],
            attrib_count: u16::to_le_bytes(RECORD_FIXED_LEN as u16 + 2),
            version: [3,0],
            total_threads: u32::to_le_bytes(2),
            file_sys_id: [1,0],
            file_sys_info: [0x2f,0],
            access: u32::to_le_bytes(0xe3),
            file_type: [0;4],
            extra_type: u32::to_le_bytes((disk.len() / 512) as u32),
            storage_type: u16::to_le_bytes(512),
            create_when: now,
            mod_when: now,
            archive_when: now
        };
        let mut record = rec.to_bytes();
        record.extend_from_slice(&[0,0]); // option_size
        record.extend_from_slice(&[0,0]); // filename_length, the name is in a thread
        record.append(&mut name_thread.to_bytes());
        record.append(&mut disk_thread.to_bytes());
        let header_crc = u16::to_le_bytes(crc16(0,&record[6..]));
        record[4..6].copy_from_slice(&header_crc);
        let mut name_data = fname.clone();
        name_data.resize(FILENAME_ROOM as usize,0);
        let total = MASTER_LEN + record.len() + name_data.len() + disk.len();
        let mut master = MasterHeader {
            nufile_id: NUFILE_ID,
            master_crc: [0,0],
            total_records: u32::to_le_bytes(1),
            create_when: now,
            mod_when: now,
            master_version: [2,0],
            reserved1: [0;8],
            master_eof: u32::to_le_bytes(total as u32),
            reserved2: [0;6]
        };
        let master_bytes = master.to_bytes();
        master.master_crc = u16::to_le_bytes(crc16(0,&master_bytes[8..]));
        let mut ans = master.to_bytes();
        ans.append(&mut record);
        ans.append(&mut name_data);
        ans.extend_from_slice(disk);
        self.layout = Some(self.parse(&ans)?);
        Ok(ans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc_check_value() {
        assert_eq!(crc16(0,b"123456789"),0x31c3);
    }

    #[test]
    fn create_find_rebuild() {
        let disk: Vec<u8> = (0..143360).map(|i| (i % 251) as u8).collect();
        let mut codec = NufxCodec::new();
        let archive = codec.create(&disk,"MY.DISK").expect("create");
        assert!(codec.test(&archive));
        let mut reader = NufxCodec::new();
        let found = reader.find_disk_image(&archive).expect("find");
        assert_eq!(found.data,disk);
        let mut changed = disk.clone();
        changed[1000] = 0xaa;
        let rebuilt = reader.rebuild(&changed).expect("rebuild");
        assert_eq!(rebuilt,reader.rebuild(&changed).expect("rebuild"));
        assert_eq!(NufxCodec::new().find_disk_image(&rebuilt).expect("find").data,changed);
    }

    #[test]
    fn corrupt_thread_fails_crc() {
        let disk = vec![0;143360];
        let mut archive = NufxCodec::new().create(&disk,"D").expect("create");
        let n = archive.len();
        archive[n-10] = 1;
        assert!(matches!(NufxCodec::new().find_disk_image(&archive),Err(Error::BadCrc(_))));
    }

    #[test]
    fn two_records() {
        let disk = vec![0;143360];
        let mut archive = NufxCodec::new().create(&disk,"D").expect("create");
        archive[8] = 2;
        let crc = u16::to_le_bytes(crc16(0,&archive[8..48]));
        archive[6..8].copy_from_slice(&crc);
        assert!(matches!(NufxCodec::new().find_disk_image(&archive),Err(Error::MultipleRecords)));
    }
}
