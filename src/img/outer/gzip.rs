//! ### gzip layer

use std::io::{Read,Write};
use flate2::read::GzDecoder;
use flate2::{Compression,GzBuilder};
use log::debug;
use crate::io::{Source,SharedSource};
use crate::img::Error;
use super::{Unwrapped,MAX_UNWRAPPED};

// Only support deflate-based gzips
const GZIP_SIGNATURE: &[u8; 3] = b"\x1F\x8B\x08";

pub fn test(src: &SharedSource,length: u64) -> bool {
    if length < 18 {
        return false;
    }
    let mut buf = [0u8;3];
    match src.borrow_mut().read_at(0,&mut buf) {
        Ok(()) => buf == *GZIP_SIGNATURE,
        Err(_) => false
    }
}

pub fn load(src: &SharedSource,length: u64,name: &str,read_only: bool) -> Result<Unwrapped,Error> {
    let mut packed = vec![0;length as usize];
    src.borrow_mut().read_at(0,&mut packed)?;
    let mut decoder = GzDecoder::new(&packed[..]);
    let mut unpacked = Vec::new();
    decoder.read_to_end(&mut unpacked).map_err(|e| Error::Damaged(format!("gzip: {}",e)))?;
    if unpacked.len() as u64 > MAX_UNWRAPPED {
        return Err(Error::Unsupported("decompressed file too large".to_string()));
    }
    let inner_name = match decoder.header().and_then(|h| h.filename()) {
        Some(bytes) => String::from_utf8_lossy(bytes).to_string(),
        None => super::strip_ext(name)
    };
    debug!("gzip inner name {}",inner_name);
    let length = unpacked.len() as u64;
    Ok(Unwrapped { buf: Source::from_buffer(unpacked,read_only), length, inner_name })
}

pub fn compress(inner: &[u8],inner_name: &str) -> Result<Vec<u8>,Error> {
    // the header stores the name NUL terminated
    let name: String = inner_name.chars().filter(|c| *c != '\0').collect();
    let mut encoder = GzBuilder::new()
        .filename(name)
        .mtime(0)
        .write(Vec::new(),Compression::default());
    encoder.write_all(inner)?;
    Ok(encoder.finish()?)
}

#[test]
fn gzip_round_trip() {
    let dat: Vec<u8> = (0..5000).map(|i| (i % 7) as u8).collect();
    let packed = compress(&dat,"disk.po").expect("compress");
    assert_eq!(packed,compress(&dat,"disk.po").expect("compress"));
    let src = Source::from_buffer(packed.clone(),true);
    assert!(test(&src,packed.len() as u64));
    let un = load(&src,packed.len() as u64,"disk.po.gz",true).expect("load");
    assert_eq!(un.inner_name,"disk.po");
    assert_eq!(un.buf.borrow_mut().read_all().expect("read"),dat);
}

#[test]
fn nul_in_inner_name() {
    let packed = compress(&[1,2,3],"bad\0name.po").expect("compress");
    let src = Source::from_buffer(packed.clone(),true);
    let un = load(&src,packed.len() as u64,"x.gz",true).expect("load");
    assert_eq!(un.inner_name,"badname.po");
    assert_eq!(un.buf.borrow_mut().read_all().expect("read"),vec![1,2,3]);
}
