//! ## Block Mapping
//!
//! A ProDOS block on a 16 sector disk is two sectors on the same track.
//! In ProDOS sector numbering block `b` is simply sectors `2(b%8)` and `2(b%8)+1`
//! of track `b/8`, which is why PO images are block-linear.

use log::trace;

pub const SECTORS_PER_BLOCK: usize = 2;
pub const BLOCKS_PER_TRACK: usize = 8;

/// Get the track and the pair of ProDOS-numbered sectors holding `block`.
pub fn ts_from_prodos_block(block: usize) -> (usize,[usize;2]) {
    let track = block / BLOCKS_PER_TRACK;
    let first = SECTORS_PER_BLOCK * (block % BLOCKS_PER_TRACK);
    trace!("block {} is track {}, ProDOS sectors {},{}",block,track,first,first+1);
    (track,[first,first+1])
}

/// Sector pairing stores two logical tracks in one physical track.
/// Logical sector `s` of track `t` goes to the physical track and sector returned here,
/// `offset` chooses which half of the pair comes first.
pub fn paired_ts(track: usize,sector: usize,offset: usize) -> [usize;2] {
    let s2 = sector * 2 + offset;
    [track * 2 + s2 / 16, s2 % 16]
}

#[test]
fn block_mapping() {
    assert_eq!(ts_from_prodos_block(0),(0,[0,1]));
    assert_eq!(ts_from_prodos_block(279),(34,[14,15]));
    assert_eq!(ts_from_prodos_block(1129),(141,[2,3]));
}

#[test]
fn pairing() {
    assert_eq!(paired_ts(0,0,0),[0,0]);
    assert_eq!(paired_ts(0,15,0),[1,14]);
    assert_eq!(paired_ts(3,7,1),[6,15]);
}
