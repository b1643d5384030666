//! ### zip layer
//!
//! Only archives holding exactly one file are treated as a compressed disk image.

use std::io::{Cursor,Read,Write};
use log::debug;
use crate::io::{Source,SharedSource};
use crate::img::Error;
use super::{Unwrapped,MAX_UNWRAPPED};

const ZIP_SIGNATURE: &[u8; 4] = b"PK\x03\x04";

fn zip_err(e: ::zip::result::ZipError) -> Error {
    match e {
        ::zip::result::ZipError::Io(io) => Error::Io(io),
        other => Error::Damaged(format!("zip: {}",other))
    }
}

pub fn test(src: &SharedSource,length: u64) -> bool {
    if length < 22 {
        return false;
    }
    let mut buf = [0u8;4];
    match src.borrow_mut().read_at(0,&mut buf) {
        Ok(()) => buf == *ZIP_SIGNATURE,
        Err(_) => false
    }
}

pub fn load(src: &SharedSource,length: u64,read_only: bool) -> Result<Unwrapped,Error> {
    let mut packed = vec![0;length as usize];
    src.borrow_mut().read_at(0,&mut packed)?;
    let mut archive = ::zip::ZipArchive::new(Cursor::new(packed)).map_err(zip_err)?;
    let files: Vec<usize> = (0..archive.len()).filter(|i| match archive.by_index(*i) {
        Ok(f) => f.is_file(),
        Err(_) => false
    }).collect();
    if files.len() != 1 {
        debug!("zip archive has {} files",files.len());
        return Err(Error::Unsupported(format!("zip archive holds {} files, expected 1",files.len())));
    }
    let mut file = archive.by_index(files[0]).map_err(zip_err)?;
    if file.size() > MAX_UNWRAPPED {
        return Err(Error::Unsupported("decompressed file too large".to_string()));
    }
    let inner_name = file.name().rsplit('/').next().unwrap_or("").to_string();
    let mut unpacked = Vec::new();
    file.read_to_end(&mut unpacked).map_err(|e| Error::Damaged(format!("zip: {}",e)))?;
    let length = unpacked.len() as u64;
    Ok(Unwrapped { buf: Source::from_buffer(unpacked,read_only), length, inner_name })
}

pub fn compress(inner: &[u8],inner_name: &str) -> Result<Vec<u8>,Error> {
    let mut writer = ::zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = ::zip::write::SimpleFileOptions::default()
        .compression_method(::zip::CompressionMethod::Deflated)
        .last_modified_time(::zip::DateTime::default());
    writer.start_file(inner_name,options).map_err(zip_err)?;
    writer.write_all(inner)?;
    let cur = writer.finish().map_err(zip_err)?;
    Ok(cur.into_inner())
}

#[test]
fn zip_round_trip() {
    let dat = vec![0xe5;143360];
    let packed = compress(&dat,"cpm.dsk").expect("compress");
    assert_eq!(packed,compress(&dat,"cpm.dsk").expect("compress"));
    let src = Source::from_buffer(packed.clone(),true);
    assert!(test(&src,packed.len() as u64));
    let un = load(&src,packed.len() as u64,true).expect("load");
    assert_eq!(un.inner_name,"cpm.dsk");
    assert_eq!(un.length,143360);
}
