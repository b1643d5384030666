//! # Nibble Tracks
//!
//! A nibble track is the byte stream a Disk II controller would latch while the
//! track spins past the head.  The track is circular, so every search here wraps.
//!
//! The layout of the soft sectors is captured in a `NibbleDescriptor`: prolog and
//! epilog markers for the address and data fields, the data field encoding, and
//! which checks are enforced.  The relaxed descriptors cover disks written by
//! patched DOS versions that did not bother with epilogs or checksums.

pub mod gcr;

use log::{trace,debug};
use crate::bios::skew;
use crate::img::NibbleError;

/// Self-sync gap before the first sector
const GAP1: usize = 48;
/// Gap between address field and data field
const GAP2: usize = 6;
/// Gap after the data field
const GAP3: usize = 27;
/// How far past an address field we look for the data prolog
const DATA_SEARCH: usize = 64;

#[derive(PartialEq,Eq,Clone,Copy,Debug)]
pub enum NibbleEncoding {
    Gcr53,
    Gcr62
}

#[derive(PartialEq,Eq,Clone,Debug)]
pub struct NibbleDescriptor {
    pub name: &'static str,
    pub addr_prolog: [u8;3],
    pub addr_epilog: [u8;3],
    pub data_prolog: [u8;3],
    pub data_epilog: [u8;3],
    pub verify_addr_checksum: bool,
    pub verify_addr_epilog: bool,
    pub verify_data_checksum: bool,
    pub verify_data_epilog: bool,
    pub encoding: NibbleEncoding,
    pub sectors: usize
}

impl NibbleDescriptor {
    pub fn dos33_std() -> Self {
        Self {
            name: "DOS 3.3 standard",
            addr_prolog: [0xd5,0xaa,0x96],
            addr_epilog: [0xde,0xaa,0xeb],
            data_prolog: [0xd5,0xaa,0xad],
            data_epilog: [0xde,0xaa,0xeb],
            verify_addr_checksum: true,
            verify_addr_epilog: true,
            verify_data_checksum: true,
            verify_data_epilog: true,
            encoding: NibbleEncoding::Gcr62,
            sectors: 16
        }
    }
    pub fn dos33_patched() -> Self {
        Self {
            name: "DOS 3.3 patched",
            verify_addr_checksum: false,
            verify_addr_epilog: false,
            verify_data_checksum: false,
            verify_data_epilog: false,
            ..Self::dos33_std()
        }
    }
    pub fn dos32_std() -> Self {
        Self {
            name: "DOS 3.2 standard",
            addr_prolog: [0xd5,0xaa,0xb5],
            encoding: NibbleEncoding::Gcr53,
            sectors: 13,
            ..Self::dos33_std()
        }
    }
    pub fn dos32_patched() -> Self {
        Self {
            name: "DOS 3.2 patched",
            verify_addr_checksum: false,
            verify_addr_epilog: false,
            verify_data_checksum: false,
            verify_data_epilog: false,
            ..Self::dos32_std()
        }
    }
    /// Descriptors tried during analysis, strictest first
    pub fn standard_list() -> Vec<Self> {
        vec![Self::dos33_std(),Self::dos32_std(),Self::dos33_patched(),Self::dos32_patched()]
    }
    pub fn data_nibs(&self) -> usize {
        match self.encoding {
            NibbleEncoding::Gcr53 => gcr::DATA_NIBS_53,
            NibbleEncoding::Gcr62 => gcr::DATA_NIBS_62
        }
    }
    /// Bytes needed to format one track with this descriptor
    pub fn formatted_len(&self) -> usize {
        GAP1 + self.sectors * (3 + 8 + 3 + GAP2 + 3 + self.data_nibs() + 3 + GAP3)
    }
}

/// Contents of an address field
#[derive(PartialEq,Eq,Clone,Copy,Debug)]
pub struct AddressField {
    pub volume: u8,
    pub track: u8,
    pub sector: u8,
    /// offset just past the field
    pub end: usize
}

fn at(trk: &[u8],i: usize) -> u8 {
    trk[i % trk.len()]
}

fn matches_at(trk: &[u8],i: usize,key: &[u8]) -> bool {
    key.iter().enumerate().all(|(k,b)| at(trk,i+k)==*b)
}

fn put(buf: &mut Vec<u8>,dat: &[u8]) {
    buf.extend_from_slice(dat);
}

/// Create a freshly formatted track of length `track_len`, every sector zeroed.
pub fn format_track(desc: &NibbleDescriptor,volume: u8,track: u8,track_len: usize) -> Result<Vec<u8>,NibbleError> {
    if desc.formatted_len() > track_len {
        debug!("{} needs {} bytes, track holds {}",desc.name,desc.formatted_len(),track_len);
        return Err(NibbleError::BadTrack);
    }
    let data = match desc.encoding {
        NibbleEncoding::Gcr53 => gcr::encode_sector_53(&[0;256])?,
        NibbleEncoding::Gcr62 => gcr::encode_sector_62(&[0;256])?
    };
    let mut ans: Vec<u8> = Vec::with_capacity(track_len);
    put(&mut ans,&[0xff;GAP1]);
    for theta in 0..desc.sectors {
        // DOS 3.2 skews the sectors directly on the track
        let sector = match desc.sectors {
            13 => skew::DOS32_PHYSICAL[theta] as u8,
            _ => theta as u8
        };
        put(&mut ans,&desc.addr_prolog);
        for val in [volume,track,sector,volume ^ track ^ sector] {
            put(&mut ans,&gcr::encode_44(val));
        }
        put(&mut ans,&desc.addr_epilog);
        put(&mut ans,&[0xff;GAP2]);
        put(&mut ans,&desc.data_prolog);
        put(&mut ans,&data);
        put(&mut ans,&desc.data_epilog);
        put(&mut ans,&[0xff;GAP3]);
    }
    ans.resize(track_len,0xff);
    trace!("formatted track {} with {} sectors",track,desc.sectors);
    Ok(ans)
}

/// Decode the address field whose prolog starts at `i`, if it passes the descriptor's checks.
fn address_at(trk: &[u8],i: usize,desc: &NibbleDescriptor) -> Option<AddressField> {
    if !matches_at(trk,i,&desc.addr_prolog) {
        return None;
    }
    let mut vals = [0u8;4];
    for k in 0..4 {
        let pair = [at(trk,i+3+2*k),at(trk,i+4+2*k)];
        vals[k] = gcr::decode_44(pair).ok()?;
    }
    if desc.verify_addr_checksum && vals[0] ^ vals[1] ^ vals[2] != vals[3] {
        trace!("address checksum mismatch at {}",i);
        return None;
    }
    if desc.verify_addr_epilog && !matches_at(trk,i+11,&desc.addr_epilog[0..2]) {
        trace!("address epilog missing at {}",i);
        return None;
    }
    Some(AddressField { volume: vals[0], track: vals[1], sector: vals[2], end: i + 14 })
}

/// All address fields on the track in rotational order
pub fn address_map(trk: &[u8],desc: &NibbleDescriptor) -> Vec<AddressField> {
    let mut ans = Vec::new();
    if trk.is_empty() {
        return ans;
    }
    for i in 0..trk.len() {
        if let Some(addr) = address_at(trk,i,desc) {
            ans.push(addr);
        }
    }
    ans
}

/// Find the offset of the first data nibble of `sector`
fn find_data(trk: &[u8],desc: &NibbleDescriptor,sector: u8) -> Result<usize,NibbleError> {
    if trk.is_empty() {
        return Err(NibbleError::BadTrack);
    }
    for i in 0..trk.len() {
        if let Some(addr) = address_at(trk,i,desc) {
            if addr.sector != sector {
                continue;
            }
            for j in addr.end..addr.end+DATA_SEARCH {
                if matches_at(trk,j,&desc.data_prolog) {
                    return Ok(j+3);
                }
                // ran into the next sector's address field
                if matches_at(trk,j,&desc.addr_prolog) {
                    break;
                }
            }
            trace!("sector {} has no data field",sector);
        }
    }
    Err(NibbleError::SectorNotFound)
}

/// Read physical `sector` from a nibble track
pub fn read_sector(trk: &[u8],desc: &NibbleDescriptor,sector: u8) -> Result<Vec<u8>,NibbleError> {
    let start = find_data(trk,desc,sector)?;
    let n = desc.data_nibs();
    let nibs: Vec<u8> = (start..start+n).map(|i| at(trk,i)).collect();
    if desc.verify_data_epilog && !matches_at(trk,start+n,&desc.data_epilog[0..2]) {
        debug!("sector {} data epilog missing",sector);
        return Err(NibbleError::BadTrack);
    }
    match desc.encoding {
        NibbleEncoding::Gcr53 => gcr::decode_sector_53(&nibs,desc.verify_data_checksum),
        NibbleEncoding::Gcr62 => gcr::decode_sector_62(&nibs,desc.verify_data_checksum)
    }
}

/// Write physical `sector` into a nibble track, the sector must already be formatted
pub fn write_sector(trk: &mut [u8],desc: &NibbleDescriptor,sector: u8,dat: &[u8]) -> Result<(),NibbleError> {
    let start = find_data(trk,desc,sector)?;
    let mut nibs = match desc.encoding {
        NibbleEncoding::Gcr53 => gcr::encode_sector_53(dat)?,
        NibbleEncoding::Gcr62 => gcr::encode_sector_62(dat)?
    };
    nibs.extend_from_slice(&desc.data_epilog);
    let len = trk.len();
    for (k,nib) in nibs.iter().enumerate() {
        trk[(start+k) % len] = *nib;
    }
    Ok(())
}

/// Find the descriptor that explains the track, along with the volume number.
/// A descriptor is accepted if it locates at least half of its sectors.
pub fn analyze_track(trk: &[u8]) -> Option<(NibbleDescriptor,u8)> {
    for desc in NibbleDescriptor::standard_list() {
        let map = address_map(trk,&desc);
        let mut ids: Vec<u8> = map.iter().map(|a| a.sector).filter(|s| (*s as usize) < desc.sectors).collect();
        ids.sort();
        ids.dedup();
        if ids.len()*2 >= desc.sectors {
            debug!("track solved by {}, {} sectors found",desc.name,ids.len());
            return Some((desc,map[0].volume));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formatted_16_sector_length() {
        let desc = NibbleDescriptor::dos33_std();
        assert_eq!(desc.formatted_len(),6384);
        let trk = format_track(&desc,254,17,6656).expect("format");
        assert_eq!(trk.len(),6656);
        assert_eq!(address_map(&trk,&desc).len(),16);
    }

    #[test]
    fn sector_round_trip_16() {
        let desc = NibbleDescriptor::dos33_std();
        let mut trk = format_track(&desc,254,3,6384).expect("format");
        let dat: Vec<u8> = (0..256).map(|i| (255-i) as u8).collect();
        write_sector(&mut trk,&desc,9,&dat).expect("write");
        assert_eq!(read_sector(&trk,&desc,9).expect("read"),dat);
        assert_eq!(read_sector(&trk,&desc,8).expect("read"),vec![0;256]);
    }

    #[test]
    fn sector_round_trip_13() {
        let desc = NibbleDescriptor::dos32_std();
        let mut trk = format_track(&desc,254,0,6656).expect("format");
        let dat = vec![0x5a;256];
        write_sector(&mut trk,&desc,12,&dat).expect("write");
        assert_eq!(read_sector(&trk,&desc,12).expect("read"),dat);
        let (found,vol) = analyze_track(&trk).expect("analyze");
        assert_eq!(found.sectors,13);
        assert_eq!(vol,254);
    }

    #[test]
    fn sector_spanning_the_index() {
        let desc = NibbleDescriptor::dos33_std();
        let mut trk = format_track(&desc,254,0,6384).expect("format");
        trk.rotate_left(6000);
        let dat = vec![0x11;256];
        for s in 0..16 {
            write_sector(&mut trk,&desc,s,&dat).expect("write");
        }
        for s in 0..16 {
            assert_eq!(read_sector(&trk,&desc,s).expect("read"),dat);
        }
    }
}
