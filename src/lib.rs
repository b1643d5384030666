//! # `a2dimg` main library
//!
//! This library opens, identifies, and edits Apple II disk images at the level of
//! blocks, sectors, and nibble tracks.  It does not read or write files within the
//! disk's file system, but it does work out which file system is present.
//!
//! ## Architecture
//!
//! Disk image operations are built around three layers:
//! * `io::Source` is a byte source, a host file, an in-memory buffer, or a window onto another source
//! * `img::ImageWrapper` is implemented for each container format, it peels the container
//!   to expose a flat view of the disk data, and puts it back on flush
//! * `disk::DiskImg` works out the geometry and sector order, and provides block and sector I/O
//!
//! File system sniffing is in `fs`.  Each supported file system has a probe that reports
//! whether it believes the image holds that file system, and in what sector order.
//!
//! ## Disk Images
//!
//! The container formats supported are
//! * DSK, DO, PO, D13, and raw volumes
//! * NIB and NB2
//! * 2MG
//! * DiskCopy 4.2
//! * NuFX (ShrinkIt) disk archives, uncompressed threads only
//! * Sim //e HDV
//! * TrackStar
//! * FDI (read-only)
//! * DDD
//!
//! Any of these can be further wrapped in gzip or zip.
//!
//! ## File Systems
//!
//! The probes recognize
//! * DOS 3.2, DOS 3.3, UniDOS
//! * ProDOS
//! * Pascal File System
//! * HFS
//! * CP/M
//! * FAT
//! * Apple partition maps

pub mod io;
pub mod bios;
pub mod img;
pub mod archive;
pub mod fs;
pub mod disk;
pub mod commands;

pub type DYNERR = Box<dyn std::error::Error>;
pub type STDRESULT = Result<(),Box<dyn std::error::Error>>;

/// Switches that govern how images are opened.
#[derive(Clone,Copy,Debug,Default)]
pub struct ImgConfig {
    /// allow writes to host block devices
    pub allow_physical_write: bool,
    /// refuse nibble sectors with bad checksums rather than reading them anyway
    pub strict_nibble_checksums: bool
}

/// Display binary to stdout in columns of hex, +ascii, and -ascii
pub fn display_block(start_addr: usize,block: &[u8]) {
    let mut slice_start = 0;
    loop {
        let row_label = start_addr + slice_start;
        let slice_end = usize::min(slice_start + 16,block.len());
        let slice = &block[slice_start..slice_end];
        let txt: Vec<u8> = slice.iter().map(|c| match *c {
            x if x<32 => b'.',
            x if x<127 => x,
            _ => b'.'
        }).collect();
        let neg_txt: Vec<u8> = slice.iter().map(|c| match *c {
            x if (160..255).contains(&x) => x - 128,
            _ => b'.'
        }).collect();
        print!("{:04X} : ",row_label);
        for byte in slice {
            print!("{:02X} ",byte);
        }
        for _blank in slice_end..slice_start+16 {
            print!("   ");
        }
        print!("|+| {} ",String::from_utf8_lossy(&txt));
        for _blank in slice_end..slice_start+16 {
            print!(" ");
        }
        println!("|-| {}",String::from_utf8_lossy(&neg_txt));
        slice_start += 16;
        if slice_end==block.len() {
            break;
        }
    }
}
