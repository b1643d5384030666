//! ## Field codecs for 5.25 inch nibble tracks
//!
//! Each sector on a 5.25 inch track has an address field written with 4&4 encoding
//! and a data field written with either 5&3 (13 sectors) or 6&2 (16 sectors) encoding.
//! In the data field every byte of user data is scrambled across several
//! non-contiguous nibbles, and a running exclusive-or serves as the checksum.
//!
//! The bit shuffling matches what CiderPress writes, so sectors interoperate.

use crate::img::NibbleError;

pub const DATA_NIBS_53: usize = 411;
pub const DATA_NIBS_62: usize = 343;

const INVALID_NIB_BYTE: u8 = 0xff;
const CHUNK53: usize = 0x33;
const CHUNK62: usize = 0x56;

const FWD_53: [u8;32] = [
    0xab, 0xad, 0xae, 0xaf, 0xb5, 0xb6, 0xb7, 0xba,
    0xbb, 0xbd, 0xbe, 0xbf, 0xd6, 0xd7, 0xda, 0xdb,
    0xdd, 0xde, 0xdf, 0xea, 0xeb, 0xed, 0xee, 0xef,
    0xf5, 0xf6, 0xf7, 0xfa, 0xfb, 0xfd, 0xfe, 0xff
];

const FWD_62: [u8;64] = [
    0x96, 0x97, 0x9a, 0x9b, 0x9d, 0x9e, 0x9f, 0xa6,
    0xa7, 0xab, 0xac, 0xad, 0xae, 0xaf, 0xb2, 0xb3,
    0xb4, 0xb5, 0xb6, 0xb7, 0xb9, 0xba, 0xbb, 0xbc,
    0xbd, 0xbe, 0xbf, 0xcb, 0xcd, 0xce, 0xcf, 0xd3,
    0xd6, 0xd7, 0xd9, 0xda, 0xdb, 0xdc, 0xdd, 0xde,
    0xdf, 0xe5, 0xe6, 0xe7, 0xe9, 0xea, 0xeb, 0xec,
    0xed, 0xee, 0xef, 0xf2, 0xf3, 0xf4, 0xf5, 0xf6,
    0xf7, 0xf9, 0xfa, 0xfb, 0xfc, 0xfd, 0xfe, 0xff
];

/// Build the decoding table for a set of disk nibbles
const fn invert<const N: usize>(fwd: &[u8;N]) -> [u8;256] {
    let mut ans = [INVALID_NIB_BYTE;256];
    let mut i = 0;
    while i < N {
        ans[fwd[i] as usize] = i as u8;
        i += 1;
    }
    ans
}

const REV_53: [u8;256] = invert(&FWD_53);
const REV_62: [u8;256] = invert(&FWD_62);

/// encode a normal byte as two 4&4 nibbles
pub fn encode_44(val: u8) -> [u8;2] {
    [(val >> 1) | 0xaa, val | 0xaa]
}

/// decode two 4&4 nibbles as a normal byte, invalid nibble will yield error
pub fn decode_44(nibs: [u8;2]) -> Result<u8,NibbleError> {
    if nibs[0] & 0xaa != 0xaa || nibs[1] & 0xaa != 0xaa {
        Err(NibbleError::InvalidByte)
    } else {
        Ok(((nibs[0] << 1) | 0x01) & nibs[1])
    }
}

/// encode a 5-bit value as a 5&3 nibble
pub fn encode_53(val: u8) -> u8 {
    FWD_53[(val & 0x1f) as usize]
}

/// decode a 5&3 nibble as a 5-bit value, invalid nibble will yield error
pub fn decode_53(nib: u8) -> Result<u8,NibbleError> {
    match REV_53[nib as usize] {
        INVALID_NIB_BYTE => Err(NibbleError::InvalidByte),
        ans => Ok(ans)
    }
}

/// encode a 6-bit value as a 6&2 nibble
pub fn encode_62(val: u8) -> u8 {
    FWD_62[(val & 0x3f) as usize]
}

/// decode a 6&2 nibble as a 6-bit value, invalid nibble will yield error
pub fn decode_62(nib: u8) -> Result<u8,NibbleError> {
    match REV_62[nib as usize] {
        INVALID_NIB_BYTE => Err(NibbleError::InvalidByte),
        ans => Ok(ans)
    }
}

/// encode 256 bytes as 411 nibbles
pub fn encode_sector_53(dat: &[u8]) -> Result<Vec<u8>,NibbleError> {
    if dat.len() != 256 {
        return Err(NibbleError::NibbleType);
    }
    let mut top: [u8;256] = [0;256];
    let mut threes: [u8;154] = [0;154];
    for i in 0..CHUNK53 {
        let offset = CHUNK53-1-i;
        for k in 0..5 {
            top[offset+CHUNK53*k] = dat[i*5+k] >> 3;
        }
        threes[offset] =
            (dat[i*5] & 0x07) << 2 | (dat[i*5+3] & 0x04) >> 1 | (dat[i*5+4] & 0x04) >> 2;
        threes[offset+CHUNK53] =
            (dat[i*5+1] & 0x07) << 2 | (dat[i*5+3] & 0x02) | (dat[i*5+4] & 0x02) >> 1;
        threes[offset+CHUNK53*2] =
            (dat[i*5+2] & 0x07) << 2 | (dat[i*5+3] & 0x01) << 1 | (dat[i*5+4] & 0x01);
    }
    // last byte does not fit the pattern
    top[255] = dat[255] >> 3;
    threes[153] = dat[255] & 0x07;
    let mut ans = Vec::with_capacity(DATA_NIBS_53);
    let mut chksum = 0;
    for i in (0..threes.len()).rev() {
        ans.push(encode_53(threes[i] ^ chksum));
        chksum = threes[i];
    }
    for val in top {
        ans.push(encode_53(val ^ chksum));
        chksum = val;
    }
    ans.push(encode_53(chksum));
    Ok(ans)
}

/// decode 411 nibbles as 256 bytes
pub fn decode_sector_53(nibs: &[u8],verify_chk: bool) -> Result<Vec<u8>,NibbleError> {
    if nibs.len() < DATA_NIBS_53 {
        return Err(NibbleError::NibbleType);
    }
    let mut base: [u8;256] = [0;256];
    let mut threes: [u8;154] = [0;154];
    let mut chksum = 0;
    let mut idx = 0;
    for i in (0..threes.len()).rev() {
        chksum ^= decode_53(nibs[idx])?;
        threes[i] = chksum;
        idx += 1;
    }
    for i in 0..base.len() {
        chksum ^= decode_53(nibs[idx])?;
        base[i] = chksum << 3;
        idx += 1;
    }
    chksum ^= decode_53(nibs[idx])?;
    if verify_chk && chksum!=0 {
        return Err(NibbleError::BadChecksum);
    }
    let mut ans: Vec<u8> = Vec::with_capacity(256);
    for i in (0..CHUNK53).rev() {
        let three1 = threes[i];
        let three2 = threes[CHUNK53+i];
        let three3 = threes[CHUNK53*2+i];
        let three4 = (three1 & 0x02) << 1 | (three2 & 0x02) | (three3 & 0x02) >> 1;
        let three5 = (three1 & 0x01) << 2 | (three2 & 0x01) << 1 | (three3 & 0x01);
        ans.push(base[i] | ((three1 >> 2) & 0x07));
        ans.push(base[CHUNK53+i] | ((three2 >> 2) & 0x07));
        ans.push(base[CHUNK53*2+i] | ((three3 >> 2) & 0x07));
        ans.push(base[CHUNK53*3+i] | (three4 & 0x07));
        ans.push(base[CHUNK53*4+i] | (three5 & 0x07));
    }
    ans.push(base[255] | (threes[153] & 0x07));
    Ok(ans)
}

/// encode 256 bytes as 343 nibbles
pub fn encode_sector_62(dat: &[u8]) -> Result<Vec<u8>,NibbleError> {
    if dat.len() != 256 {
        return Err(NibbleError::NibbleType);
    }
    let mut top: [u8;256] = [0;256];
    let mut twos: [u8;CHUNK62] = [0;CHUNK62];
    let mut two_shift = 0;
    let mut two_pos = CHUNK62-1;
    for i in 0..256 {
        let val = dat[i];
        top[i] = val >> 2;
        twos[two_pos] |= ((val & 1) << 1 | (val & 2) >> 1) << two_shift;
        if two_pos==0 {
            two_pos = CHUNK62;
            two_shift += 2;
        }
        two_pos -= 1;
    }
    let mut ans = Vec::with_capacity(DATA_NIBS_62);
    let mut chksum = 0;
    for i in (0..CHUNK62).rev() {
        ans.push(encode_62(twos[i] ^ chksum));
        chksum = twos[i];
    }
    for val in top {
        ans.push(encode_62(val ^ chksum));
        chksum = val;
    }
    ans.push(encode_62(chksum));
    Ok(ans)
}

/// decode 343 nibbles as 256 bytes
pub fn decode_sector_62(nibs: &[u8],verify_chk: bool) -> Result<Vec<u8>,NibbleError> {
    if nibs.len() < DATA_NIBS_62 {
        return Err(NibbleError::NibbleType);
    }
    let mut twos: [u8;CHUNK62*3] = [0;CHUNK62*3];
    let mut chksum = 0;
    let mut idx = 0;
    for i in 0..CHUNK62 {
        chksum ^= decode_62(nibs[idx])?;
        twos[i] = ((chksum & 0x01) << 1) | ((chksum & 0x02) >> 1);
        twos[i + CHUNK62] = ((chksum & 0x04) >> 1) | ((chksum & 0x08) >> 3);
        twos[i + CHUNK62*2] = ((chksum & 0x10) >> 3) | ((chksum & 0x20) >> 5);
        idx += 1;
    }
    let mut ans: Vec<u8> = Vec::with_capacity(256);
    for i in 0..256 {
        chksum ^= decode_62(nibs[idx])?;
        ans.push((chksum << 2) | twos[i]);
        idx += 1;
    }
    chksum ^= decode_62(nibs[idx])?;
    if verify_chk && chksum!=0 {
        return Err(NibbleError::BadChecksum);
    }
    Ok(ans)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern() -> Vec<u8> {
        (0..256).map(|i| ((i * 7 + 3) % 256) as u8).collect()
    }

    #[test]
    fn sector_62() {
        let nibs = encode_sector_62(&pattern()).expect("encode");
        assert_eq!(nibs.len(),DATA_NIBS_62);
        assert!(nibs.iter().all(|n| n & 0x80 > 0));
        assert_eq!(decode_sector_62(&nibs,true).expect("decode"),pattern());
    }

    #[test]
    fn sector_53() {
        let nibs = encode_sector_53(&pattern()).expect("encode");
        assert_eq!(nibs.len(),DATA_NIBS_53);
        assert_eq!(decode_sector_53(&nibs,true).expect("decode"),pattern());
    }

    #[test]
    fn corrupted_62() {
        let mut nibs = encode_sector_62(&pattern()).expect("encode");
        nibs[100] = encode_62(decode_62(nibs[100]).expect("valid") ^ 1);
        assert!(matches!(decode_sector_62(&nibs,true),Err(NibbleError::BadChecksum)));
        assert!(decode_sector_62(&nibs,false).is_ok());
    }

    #[test]
    fn tables_invert() {
        for val in 0..64 {
            assert_eq!(decode_62(encode_62(val)).expect("decode"),val);
        }
        for val in 0..32 {
            assert_eq!(decode_53(encode_53(val)).expect("decode"),val);
        }
        assert!(decode_62(0xaa).is_err());
        assert!(decode_53(0x96).is_err());
    }

    #[test]
    fn address_bytes() {
        for val in [0u8,0x11,0xfe,0xff] {
            assert_eq!(decode_44(encode_44(val)).expect("decode"),val);
        }
        assert!(decode_44([0x00,0xaa]).is_err());
    }
}
