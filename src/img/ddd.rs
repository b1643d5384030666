//! ## Support for DDD images
//!
//! DDD images carry no signature.  The file is a 3 byte header, starting with the DOS
//! volume number, then 35 compressed tracks of 16 DOS ordered sectors.
//!
//! Each track goes through two stages:
//! 1. run length: any run of 4 or more, and any lone `0x97`, becomes `0x97,value,count`,
//!    where a count of 0 means 256.
//! 2. favorites: the 20 most frequent stage 1 bytes are written first (bit reversed),
//!    then each stage 1 byte is coded as `1` + 5 bit favorite index, or `00` + 8 bit literal.
//!    Bits are packed MSB first and each track ends on a byte boundary.
//!
//! Since stage 1 leaves no long runs, a file with a run of 5 or more identical bytes
//! (other than `0xff`, which trails some files) is not a DDD image.
//! Everything is recompressed on every flush.

use bit_vec::BitVec;
use log::{debug,trace,info};
use crate::io::{Source,SharedSource};
use crate::img::{self,Error,FileFormat,PhysicalFormat,SectorOrder,Prepared,CreateSpec};

const TRACKS: usize = 35;
const TRACK_LEN: usize = 4096;
const RUN_MARKER: u8 = 0x97;
const MIN_RUN: usize = 4;
const FAVORITES: usize = 20;
/// trailing bytes excused from the run check
const RUN_CHECK_SLACK: usize = 256;
const SUSPICIOUS_RUN: usize = 5;

pub fn file_extensions() -> Vec<String> {
    vec!["ddd".to_string()]
}

/// Look for a run that cannot come out of the DDD compressor
pub fn has_forbidden_run(buf: &[u8]) -> bool {
    let lim = buf.len().saturating_sub(RUN_CHECK_SLACK);
    let mut i = 0;
    while i < lim {
        let mut r = 1;
        while i + r < buf.len() && buf[i+r]==buf[i] {
            r += 1;
        }
        if r >= SUSPICIOUS_RUN && buf[i]!=0xff {
            trace!("run of {} bytes of {:02X} at {}",r,buf[i],i);
            return true;
        }
        i += r;
    }
    false
}

fn run_length(trk: &[u8]) -> Vec<u8> {
    let mut ans = Vec::new();
    let mut i = 0;
    while i < trk.len() {
        let v = trk[i];
        let mut r = 1;
        while i + r < trk.len() && trk[i+r]==v && r < 256 {
            r += 1;
        }
        if r >= MIN_RUN || v==RUN_MARKER {
            ans.append(&mut vec![RUN_MARKER,v,(r & 0xff) as u8]);
            i += r;
        } else {
            ans.push(v);
            i += 1;
        }
    }
    ans
}

fn favorites(stage1: &[u8]) -> Vec<u8> {
    let mut counts = [0usize;256];
    for b in stage1 {
        counts[*b as usize] += 1;
    }
    let mut order: Vec<usize> = (0..256).collect();
    order.sort_by(|a,b| counts[*b].cmp(&counts[*a]).then(a.cmp(b)));
    let mut ans: Vec<u8> = order.iter().take(FAVORITES).filter(|v| counts[**v] > 0).map(|v| *v as u8).collect();
    for v in 0..=255u8 {
        if ans.len()==FAVORITES {
            break;
        }
        if !ans.contains(&v) {
            ans.push(v);
        }
    }
    ans
}

fn push_bits(bits: &mut BitVec,val: u8,count: usize) {
    for k in (0..count).rev() {
        bits.push((val >> k) & 1 == 1);
    }
}

fn encode_track(trk: &[u8]) -> Vec<u8> {
    let stage1 = run_length(trk);
    let favs = favorites(&stage1);
    let mut ans: Vec<u8> = favs.iter().map(|v| v.reverse_bits()).collect();
    let mut bits = BitVec::new();
    for b in stage1 {
        match favs.iter().position(|f| *f==b) {
            Some(idx) => {
                bits.push(true);
                push_bits(&mut bits,idx as u8,5);
            },
            None => {
                bits.push(false);
                bits.push(false);
                push_bits(&mut bits,b,8);
            }
        }
    }
    ans.append(&mut bits.to_bytes());
    ans
}

/// Compress a 35 track DOS ordered image
pub fn encode(flat: &[u8],volume: u8) -> Vec<u8> {
    let mut ans = vec![volume,0,0];
    for trk in flat.chunks(TRACK_LEN).take(TRACKS) {
        ans.append(&mut encode_track(trk));
    }
    ans
}

struct BitReader<'a> {
    bits: &'a BitVec,
    pos: usize
}

impl<'a> BitReader<'a> {
    fn take(&mut self,count: usize) -> Result<u8,Error> {
        let mut ans = 0;
        for _i in 0..count {
            let bit = self.bits.get(self.pos).ok_or(Error::Damaged("DDD stream ended early".to_string()))?;
            ans = (ans << 1) | bit as u8;
            self.pos += 1;
        }
        Ok(ans)
    }
    fn align(&mut self) {
        self.pos = (self.pos + 7) / 8 * 8;
    }
    fn symbol(&mut self,favs: &[u8]) -> Result<u8,Error> {
        match self.take(1)? {
            1 => Ok(favs[self.take(5)? as usize % FAVORITES]),
            _ => match self.take(1)? {
                0 => self.take(8),
                _ => Err(Error::Damaged("DDD invalid prefix".to_string()))
            }
        }
    }
}

/// Decompress to (DOS ordered image, volume), any inconsistency is an error
pub fn decode(packed: &[u8]) -> Result<(Vec<u8>,u8),Error> {
    if packed.len() < 3 || packed[1]!=0 || packed[2]!=0 {
        return Err(Error::Damaged("DDD header".to_string()));
    }
    let bits = BitVec::from_bytes(&packed[3..]);
    let mut rdr = BitReader { bits: &bits, pos: 0 };
    let mut ans = Vec::with_capacity(TRACKS*TRACK_LEN);
    for track in 0..TRACKS {
        let mut favs = Vec::new();
        for _i in 0..FAVORITES {
            favs.push(rdr.take(8)?.reverse_bits());
        }
        let mut trk: Vec<u8> = Vec::with_capacity(TRACK_LEN);
        while trk.len() < TRACK_LEN {
            let b = rdr.symbol(&favs)?;
            if b==RUN_MARKER {
                let v = rdr.symbol(&favs)?;
                let count = match rdr.symbol(&favs)? {
                    0 => 256,
                    c => c as usize
                };
                trk.append(&mut vec![v;count]);
            } else {
                trk.push(b);
            }
        }
        if trk.len() != TRACK_LEN {
            return Err(Error::Damaged(format!("DDD track {} overflows",track)));
        }
        rdr.align();
        ans.append(&mut trk);
    }
    let leftover = packed.len() - 3 - rdr.pos / 8;
    if leftover > RUN_CHECK_SLACK {
        return Err(Error::Damaged(format!("DDD has {} bytes of trailing data",leftover)));
    }
    Ok((ans,packed[0]))
}

pub struct Ddd {
    volume: u8
}

impl Ddd {
    pub fn new() -> Self {
        Self { volume: 254 }
    }
}

impl img::ImageWrapper for Ddd {
    fn what_am_i(&self) -> FileFormat {
        FileFormat::DDD
    }
    fn test(&mut self,src: &SharedSource,length: u64) -> Result<(),Error> {
        // smallest possible track is 20 favorites plus 12 bytes of runs
        if length < 3 + (TRACKS * (FAVORITES + 12)) as u64 || length > (2 * TRACKS * TRACK_LEN) as u64 {
            return Err(Error::FormatMismatch);
        }
        let buf = src.borrow_mut().read_all()?;
        if has_forbidden_run(&buf) {
            return Err(Error::FormatMismatch);
        }
        match decode(&buf) {
            Ok((_,vol)) => {
                self.volume = vol;
                Ok(())
            },
            Err(e) => {
                debug!("DDD decode failed: {}",e);
                Err(Error::FormatMismatch)
            }
        }
    }
    fn prep(&mut self,src: &SharedSource,length: u64,read_only: bool) -> Result<Prepared,Error> {
        self.test(src,length)?;
        let buf = src.borrow_mut().read_all()?;
        let (flat,vol) = decode(&buf)?;
        info!("identified DDD image, volume {}",vol);
        let mut ans = Prepared::new(Source::from_buffer(flat,read_only),(TRACKS*TRACK_LEN) as u64,PhysicalFormat::Sectors,SectorOrder::DOS);
        ans.dos_volume = Some(vol);
        Ok(ans)
    }
    fn create(&mut self,spec: &CreateSpec,dest: &SharedSource) -> Result<(u64,SharedSource),Error> {
        if spec.physical != PhysicalFormat::Sectors || spec.order != SectorOrder::DOS || spec.length != (TRACKS*TRACK_LEN) as u64 {
            return Err(Error::BadArgument("DDD holds 35 tracks of 16 sectors in DOS order".to_string()));
        }
        self.volume = spec.dos_volume.unwrap_or(254);
        let flat = vec![0;TRACKS*TRACK_LEN];
        let packed = encode(&flat,self.volume);
        dest.borrow_mut().replace_all(&packed)?;
        Ok((packed.len() as u64,Source::from_buffer(flat,false)))
    }
    fn flush(&mut self,dest: &SharedSource,flat: &SharedSource,_data_len: u64) -> Result<u64,Error> {
        let dat = flat.borrow_mut().read_all()?;
        let packed = encode(&dat,self.volume);
        dest.borrow_mut().replace_all(&packed)?;
        Ok(packed.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::img::ImageWrapper;

    fn pseudo_random(n: usize) -> Vec<u8> {
        let mut x: u32 = 12345;
        (0..n).map(|_i| {
            x = x.wrapping_mul(1103515245).wrapping_add(12345);
            (x >> 16) as u8
        }).collect()
    }

    #[test]
    fn runs_rule() {
        let mut buf = pseudo_random(2000);
        for i in 0..2000 {
            if buf[i]==buf[(i+1)%2000] { buf[i] ^= 0x01; }
        }
        buf[100..106].copy_from_slice(&[0xff;6]);
        assert!(!has_forbidden_run(&buf));
        buf[500..506].copy_from_slice(&[0x42;6]);
        assert!(has_forbidden_run(&buf));
        buf[500..506].copy_from_slice(&[1,2,3,4,5,6]);
        buf[1900..1906].copy_from_slice(&[0x42;6]);
        assert!(!has_forbidden_run(&buf));
    }

    #[test]
    fn codec_round_trip() {
        let mut flat = vec![0;TRACKS*TRACK_LEN];
        flat[0..20000].copy_from_slice(&pseudo_random(20000));
        flat[50000..50300].copy_from_slice(&[0x97;300]);
        let packed = encode(&flat,17);
        assert!(!has_forbidden_run(&packed));
        let (unpacked,vol) = decode(&packed).expect("decode");
        assert_eq!(vol,17);
        assert_eq!(unpacked,flat);
    }

    /// Track of six 0xff bytes followed by zeros, the 0xff bytes come from
    /// favorite codes whose index wraps past the end of the table
    fn track_with_ff_run() -> Vec<u8> {
        let mut favs: Vec<u8> = (0..FAVORITES as u8).collect();
        favs[1] = RUN_MARKER;
        favs[2] = 248;
        let mut ans: Vec<u8> = favs.iter().map(|v| v.reverse_bits()).collect();
        let mut bits = BitVec::new();
        for _i in 0..8 {
            push_bits(&mut bits,0x3f,6);
        }
        for count_idx in [0;15].iter().chain([2].iter()) {
            for idx in [1,0,*count_idx] {
                push_bits(&mut bits,0x20 | idx,6);
            }
        }
        ans.append(&mut bits.to_bytes());
        ans
    }

    #[test]
    fn ff_run_inside_stream() {
        let mut packed = vec![254,0,0];
        packed.append(&mut track_with_ff_run());
        for _trk in 1..TRACKS {
            packed.append(&mut encode_track(&[0;TRACK_LEN]));
        }
        assert_eq!(packed[23..29],[0xff;6]);
        assert!(packed.len() > 29 + RUN_CHECK_SLACK);
        let src = Source::from_buffer(packed.clone(),true);
        assert!(Ddd::new().test(&src,packed.len() as u64).is_ok());
        let id = img::identify::identify(&src,packed.len() as u64,"disk.ddd",true).expect("identify");
        assert_eq!(id.wrapper.what_am_i(),FileFormat::DDD);
        let flat = id.prepared.flat.borrow_mut().read_all().expect("read");
        assert_eq!(flat[0..9],[11,11,11,11,11,11,11,11,0]);
        assert_eq!(flat.len(),TRACKS*TRACK_LEN);
        // the same run of any other value rules the file out
        let mut bad = packed.clone();
        bad[23..29].copy_from_slice(&[0x42;6]);
        let src = Source::from_buffer(bad.clone(),true);
        assert!(Ddd::new().test(&src,bad.len() as u64).unwrap_err().is_mismatch());
    }

    #[test]
    fn blank_image_is_ddd() {
        let dest = Source::from_buffer(vec![],false);
        let spec = CreateSpec { length: 143360, physical: PhysicalFormat::Sectors, order: SectorOrder::DOS, dos_volume: Some(254) };
        let (len,_flat) = Ddd::new().create(&spec,&dest).expect("create");
        assert!(Ddd::new().test(&dest,len).is_ok());
        let plain = Source::from_buffer(vec![0;143360],true);
        assert!(Ddd::new().test(&plain,143360).unwrap_err().is_mismatch());
    }
}
