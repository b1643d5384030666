//! ## BIOS Parameter Block
//!
//! Only the fields needed to decide whether a boot sector carries a sane FAT
//! volume.  Layout follows the Microsoft white paper
//! "FAT: General Overview of On-Disk Format", Dec. 6, 2000.

use log::debug;
use a2kit_macro::{DiskStruct,DiskStructError};
use a2kit_macro_derive::DiskStruct;

const BOOT_SIGNATURE: [u8;2] = [0x55,0xaa]; // goes in boot[510..512]

/// Starts at byte 11 of the boot sector
#[derive(DiskStruct)]
pub struct BPBFoundation {
    /// 512, 1024, 2048, or 4096
    pub bytes_per_sec: [u8;2],
    /// power of 2 up to 128
    pub sec_per_clus: u8,
    pub reserved_sectors: [u8;2],
    pub num_fats: u8,
    /// must fill whole sectors
    pub root_ent_cnt: [u8;2],
    /// superceded by tot_sec_32 if 0
    pub tot_sec_16: [u8;2],
    pub media: u8,
    /// 0 for FAT32
    pub fat_size_16: [u8;2],
    pub sec_per_trk: [u8;2],
    pub num_heads: [u8;2],
    pub hidd_sec: [u8;4],
    pub tot_sec_32: [u8;4]
}

impl BPBFoundation {
    /// Name the first field that is out of range, if any
    fn first_problem(&self) -> Option<String> {
        let bytes = self.sec_size();
        let entries = u16::from_le_bytes(self.root_ent_cnt) as u64;
        let checks = [
            ([512,1024,2048,4096].contains(&bytes),"bytes per sector"),
            (self.sec_per_clus.is_power_of_two(),"sectors per cluster"),
            (self.reserved_sectors != [0,0],"reserved sectors"),
            (self.num_fats > 0,"FAT count"),
            (bytes > 0 && (entries*32) % bytes == 0,"root entry count"),
            (self.tot_sec() > 0,"total sectors")
        ];
        checks.iter().find(|(ok,_)| !ok).map(|(_,what)| what.to_string())
    }
    pub fn verify(&self) -> bool {
        match self.first_problem() {
            Some(what) => {
                debug!("BPB has invalid {}",what);
                false
            },
            None => true
        }
    }
    pub fn sec_size(&self) -> u64 {
        u16::from_le_bytes(self.bytes_per_sec) as u64
    }
    pub fn tot_sec(&self) -> u64 {
        match self.tot_sec_16 {
            [0,0] => u32::from_le_bytes(self.tot_sec_32) as u64,
            _ => u16::from_le_bytes(self.tot_sec_16) as u64
        }
    }
    pub fn root_dir_secs(&self) -> u64 {
        match self.sec_size() {
            0 => 0,
            bytes => (u16::from_le_bytes(self.root_ent_cnt) as u64 * 32).div_ceil(bytes)
        }
    }
}

/// Decide whether a boot sector holds a usable BPB
pub fn verify_boot_sector(sec_data: &[u8]) -> bool {
    if sec_data.len() < 512 {
        debug!("sector too small");
        return false;
    }
    if sec_data[510..512] != BOOT_SIGNATURE {
        debug!("signature mismatch");
        return false;
    }
    let bpb = match BPBFoundation::from_bytes(&sec_data[11..36]) {
        Ok(bpb) => bpb,
        Err(_) => return false
    };
    if !bpb.verify() {
        return false;
    }
    let fat_secs = match bpb.fat_size_16 {
        [0,0] => u32::from_le_bytes([sec_data[36],sec_data[37],sec_data[38],sec_data[39]]) as u64,
        _ => u16::from_le_bytes(bpb.fat_size_16) as u64
    };
    if fat_secs==0 {
        debug!("invalid count of FAT sectors 0");
        return false;
    }
    let reserved = u16::from_le_bytes(bpb.reserved_sectors) as u64;
    if bpb.tot_sec() <= reserved + bpb.num_fats as u64 * fat_secs + bpb.root_dir_secs() {
        debug!("data region came out 0 or negative");
        return false;
    }
    debug!("BPB counts: {}({}) FAT, {} tot, {} res, {} root",fat_secs,bpb.num_fats,bpb.tot_sec(),reserved,bpb.root_dir_secs());
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 1.44M floppy boot sector
    pub fn floppy_boot() -> Vec<u8> {
        let mut sec = vec![0;512];
        sec[0..3].copy_from_slice(&[0xeb,0x3c,0x90]);
        sec[11..13].copy_from_slice(&u16::to_le_bytes(512));
        sec[13] = 1;
        sec[14..16].copy_from_slice(&u16::to_le_bytes(1));
        sec[16] = 2;
        sec[17..19].copy_from_slice(&u16::to_le_bytes(224));
        sec[19..21].copy_from_slice(&u16::to_le_bytes(2880));
        sec[21] = 0xf0;
        sec[22..24].copy_from_slice(&u16::to_le_bytes(9));
        sec[510] = 0x55;
        sec[511] = 0xaa;
        sec
    }

    #[test]
    fn floppy_passes() {
        assert!(verify_boot_sector(&floppy_boot()));
    }

    #[test]
    fn missing_signature_fails() {
        let mut sec = floppy_boot();
        sec[511] = 0;
        assert!(!verify_boot_sector(&sec));
        let mut sec = floppy_boot();
        sec[13] = 3;
        assert!(!verify_boot_sector(&sec));
    }
}
