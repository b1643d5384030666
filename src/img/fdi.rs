//! ## Support for FDI images
//!
//! FDI 2.0 captures record the flux of each track.  We handle the pulse index
//! tracks used for 5.25 inch GCR disks.  Each pulse is placed in 4 microsecond bit
//! cells and the resulting bit stream is run through a Disk II style latch to get nibbles.
//!
//! Tracks that cannot be turned into nibbles (Huffman compressed streams, blank or
//! unknown track types) are reported in the bad block map.  FDI images are read-only.

use std::io::Cursor;
use binrw::{binrw,BinRead};
use bit_vec::BitVec;
use log::{debug,info,warn};
use crate::io::{Source,SharedSource};
use crate::img::{self,Error,FileFormat,PhysicalFormat,SectorOrder,Prepared,CreateSpec};
use crate::img::nib::TRACK_BYTE_CAPACITY_NIB;
use crate::img::tracks;

const SIGNATURE: &[u8;27] = b"Formatted Disk Image file\r\n";
const HEADER_LEN: usize = 152;
const PULSE_HEADER_LEN: usize = 20;
const TRACKS: usize = 35;
const BLOCKS_PER_TRACK: usize = 8;
const DISK_525: u8 = 1;
/// 4 microsecond cells, 60 seconds per minute
const CELLS_PER_MINUTE: f64 = 15_000_000.0;

pub fn file_extensions() -> Vec<String> {
    vec!["fdi".to_string()]
}

#[derive(Debug)]
#[binrw]
#[brw(big)]
pub struct Header {
    pub signature: [u8;27],
    pub creator: [u8;30],
    pub crlf: [u8;2],
    pub comment: [u8;80],
    pub eof_mark: u8,
    pub version: u16,
    pub last_track: u16,
    pub last_head: u8,
    pub disk_type: u8,
    pub rot_speed: u8,
    pub flags: u8,
    pub tpi: u8,
    pub head_width: u8,
    pub reserved: u16
}

#[derive(Debug)]
#[binrw]
#[brw(big)]
struct PulseHeader {
    num_pulses: u32,
    avg: u32,
    min: u32,
    max: u32,
    idx: u32
}

fn stream_len(field: u32) -> usize {
    (field & 0x00ff_ffff) as usize
}

fn stream_compression(field: u32) -> u8 {
    (field >> 24) as u8
}

/// Bytes of data belonging to a track descriptor
fn track_data_len(typ: u8,size: u8) -> usize {
    match typ & 0xc0 {
        0xc0 => ((((typ & 0x3f) as usize) << 8) | size as usize) * 256,
        _ => size as usize * 256
    }
}

/// Physical track steps per DOS track for the capture's TPI code
fn track_step(tpi: u8) -> Option<usize> {
    match tpi {
        0 => Some(1), // 48 tpi
        2 => Some(2), // 96 tpi
        5 => Some(4), // 192 tpi
        _ => None
    }
}

/// Turn the average pulse stream of one revolution into nibbles
fn pulses_to_nibbles(avg: &[u32],rpm: f64) -> Result<Vec<u8>,String> {
    let total: f64 = avg.iter().map(|x| *x as f64).sum();
    if total <= 0.0 {
        return Err("no pulses".to_string());
    }
    let cells_per_rev = CELLS_PER_MINUTE / rpm;
    let mut cells = BitVec::new();
    for pulse in avg {
        let n = (*pulse as f64 * cells_per_rev / total).round() as usize;
        for _i in 1..n {
            cells.push(false);
        }
        cells.push(true);
    }
    let mut ans = Vec::new();
    let mut latch: u8 = 0;
    for bit in cells.iter() {
        latch = (latch << 1) | bit as u8;
        if latch & 0x80 > 0 {
            ans.push(latch);
            latch = 0;
        }
    }
    if ans.len() < 1000 {
        return Err(format!("only {} nibbles",ans.len()));
    }
    ans.truncate(TRACK_BYTE_CAPACITY_NIB);
    Ok(ans)
}

fn decode_pulse_track(dat: &[u8],rpm: f64) -> Result<Vec<u8>,String> {
    if dat.len() < PULSE_HEADER_LEN {
        return Err("short pulse header".to_string());
    }
    let ph = PulseHeader::read(&mut Cursor::new(&dat[0..PULSE_HEADER_LEN])).map_err(|e| e.to_string())?;
    if stream_compression(ph.avg) != 0 {
        return Err("Huffman compressed pulse stream".to_string());
    }
    let n = ph.num_pulses as usize;
    let len = stream_len(ph.avg);
    if len != n * 4 || PULSE_HEADER_LEN + len > dat.len() {
        return Err(format!("average stream length {} for {} pulses",len,n));
    }
    let avg: Vec<u32> = dat[PULSE_HEADER_LEN..PULSE_HEADER_LEN+len].chunks(4)
        .map(|c| u32::from_be_bytes([c[0],c[1],c[2],c[3]])).collect();
    pulses_to_nibbles(&avg,rpm)
}

pub struct Fdi {
    header: Option<Header>,
    lengths: Vec<usize>
}

impl Fdi {
    pub fn new() -> Self {
        Self { header: None, lengths: Vec::new() }
    }
    fn read_header(src: &SharedSource) -> Result<Header,Error> {
        let mut buf = vec![0;HEADER_LEN];
        src.borrow_mut().read_at(0,&mut buf)?;
        Ok(Header::read(&mut Cursor::new(&buf))?)
    }
}

impl img::ImageWrapper for Fdi {
    fn what_am_i(&self) -> FileFormat {
        FileFormat::FDI
    }
    fn test(&mut self,src: &SharedSource,length: u64) -> Result<(),Error> {
        if length < HEADER_LEN as u64 {
            return Err(Error::FormatMismatch);
        }
        let header = Self::read_header(src)?;
        if header.signature != *SIGNATURE {
            return Err(Error::FormatMismatch);
        }
        if header.version >> 8 != 2 {
            return Err(Error::Unsupported(format!("FDI version {:04X}",header.version)));
        }
        if header.disk_type != DISK_525 {
            return Err(Error::Unsupported("only 5.25 inch FDI captures are handled".to_string()));
        }
        if track_step(header.tpi).is_none() {
            return Err(Error::Unsupported(format!("FDI tpi code {}",header.tpi)));
        }
        let descriptors = (header.last_track as usize + 1) * (header.last_head as usize + 1);
        if (HEADER_LEN + 2*descriptors) as u64 > length {
            return Err(Error::Damaged("FDI track table runs past end of file".to_string()));
        }
        debug!("FDI with {} track descriptors at {} rpm",descriptors,header.rot_speed as usize + 128);
        self.header = Some(header);
        Ok(())
    }
    fn prep(&mut self,src: &SharedSource,length: u64,_read_only: bool) -> Result<Prepared,Error> {
        self.test(src,length)?;
        let header = self.header.as_ref().ok_or(Error::NotOpen)?;
        info!("identified FDI image from {}",String::from_utf8_lossy(&header.creator).trim());
        let buf = src.borrow_mut().read_all()?;
        let heads = header.last_head as usize + 1;
        let descriptors = (header.last_track as usize + 1) * heads;
        let rpm = header.rot_speed as f64 + 128.0;
        let step = track_step(header.tpi).unwrap_or(1);
        // track data starts after the header, padded to 512 bytes
        let mut ptr = (HEADER_LEN + 2*descriptors + 511) / 512 * 512;
        let mut offsets = Vec::new();
        for d in 0..descriptors {
            let typ = buf[HEADER_LEN + 2*d];
            let size = buf[HEADER_LEN + 2*d + 1];
            let len = track_data_len(typ,size);
            offsets.push((typ,ptr,len));
            ptr += len;
        }
        if ptr > buf.len() {
            return Err(Error::Damaged("FDI track data runs past end of file".to_string()));
        }
        let mut flat = vec![0xff;TRACKS*TRACK_BYTE_CAPACITY_NIB];
        let mut bad = BitVec::from_elem(TRACKS*BLOCKS_PER_TRACK,false);
        let mut notes = Vec::new();
        self.lengths = vec![0;TRACKS];
        for track in 0..TRACKS {
            // only head 0 matters for 5.25 inch Apple disks
            let d = track * step * heads;
            let result = match offsets.get(d) {
                Some((typ,off,len)) if *typ >= 0xc0 => decode_pulse_track(&buf[*off..*off+*len],rpm),
                Some((typ,_,_)) => Err(format!("track type {:02X}",typ)),
                None => Err("track missing".to_string())
            };
            let readable = match &result {
                Ok(nibs) => tracks::analyze_track(nibs).is_some(),
                Err(_) => false
            };
            match result {
                Ok(nibs) => {
                    self.lengths[track] = nibs.len();
                    flat[track*TRACK_BYTE_CAPACITY_NIB..track*TRACK_BYTE_CAPACITY_NIB+nibs.len()].copy_from_slice(&nibs);
                    if !readable {
                        notes.push(format!("track {} decoded but no sectors found",track));
                    }
                },
                Err(reason) => {
                    warn!("FDI track {}: {}",track,reason);
                    notes.push(format!("track {} could not be decoded: {}",track,reason));
                }
            }
            if !readable {
                for b in 0..BLOCKS_PER_TRACK {
                    bad.set(track*BLOCKS_PER_TRACK + b,true);
                }
            }
        }
        let mut ans = Prepared::new(Source::from_buffer(flat,true),(TRACKS*TRACK_BYTE_CAPACITY_NIB) as u64,PhysicalFormat::Nib525_Var,SectorOrder::Physical);
        if bad.any() {
            ans.bad_blocks = Some(bad);
        }
        ans.notes = notes;
        ans.force_read_only = true;
        Ok(ans)
    }
    fn create(&mut self,_spec: &CreateSpec,_dest: &SharedSource) -> Result<(u64,SharedSource),Error> {
        Err(Error::Unsupported("FDI images cannot be created".to_string()))
    }
    fn flush(&mut self,_dest: &SharedSource,_flat: &SharedSource,_data_len: u64) -> Result<u64,Error> {
        Err(Error::ReadOnly)
    }
    fn nibble_track_len(&self,track: usize) -> Option<usize> {
        self.lengths.get(track).copied()
    }
    fn can_write(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::img::ImageWrapper;
    use crate::img::tracks::NibbleDescriptor;

    /// Turn a nibble track into pulse spacings, 1 unit per cell
    fn nibbles_to_pulses(nibs: &[u8]) -> Vec<u32> {
        let mut ans = Vec::new();
        let mut gap = 0;
        for nib in nibs {
            for k in (0..8).rev() {
                gap += 1;
                if (nib >> k) & 1 == 1 {
                    ans.push(gap);
                    gap = 0;
                }
            }
        }
        ans
    }

    fn build_fdi(trk: &[u8]) -> Vec<u8> {
        let mut ans = Vec::new();
        ans.extend_from_slice(SIGNATURE);
        ans.extend_from_slice(&[0x20;30]);
        ans.extend_from_slice(b"\r\n");
        ans.extend_from_slice(&[0x20;80]);
        ans.push(0x1a);
        ans.extend_from_slice(&[2,0,0,34,0,DISK_525,172,0,0,0,0,0]);
        let pulses = nibbles_to_pulses(trk);
        let mut body = Vec::new();
        body.extend_from_slice(&u32::to_be_bytes(pulses.len() as u32));
        body.extend_from_slice(&u32::to_be_bytes(pulses.len() as u32 * 4));
        body.extend_from_slice(&[0;12]);
        for p in &pulses {
            body.extend_from_slice(&u32::to_be_bytes(*p));
        }
        let blocks = (body.len() + 255) / 256;
        body.resize(blocks*256,0);
        for t in 0..35 {
            match t {
                0 => ans.extend_from_slice(&[0xc0 | (blocks >> 8) as u8,blocks as u8]),
                _ => ans.extend_from_slice(&[0,0])
            }
        }
        ans.resize(512,0);
        ans.append(&mut body);
        ans
    }

    #[test]
    fn decode_one_track() {
        let desc = NibbleDescriptor::dos33_std();
        // pulses get rescaled to 50000 cells, short gaps survive the rounding
        let trk = tracks::format_track(&desc,254,0,6400).expect("format");
        let fdi = build_fdi(&trk);
        let len = fdi.len() as u64;
        let src = Source::from_buffer(fdi,true);
        let prep = Fdi::new().prep(&src,len,true).expect("prep");
        let bad = prep.bad_blocks.expect("bad blocks");
        assert!(!bad.get(0).unwrap_or(true));
        assert!(bad.get(8).unwrap_or(false));
        let flat = prep.flat.borrow_mut().read_all().expect("read");
        assert_eq!(tracks::read_sector(&flat[0..6400],&desc,5).expect("sector"),vec![0;256]);
    }
}
