use std::io::Read;
use std::str::FromStr;
use log::{info,error};
use super::{ItemType,CommandError};
use crate::{STDRESULT,DYNERR};
use crate::img::{BLOCK_SIZE,SECTOR_SIZE};

const RCH: &str = "unreachable was reached";

/// Get the payload from stdin, decoding hex if asked
fn read_payload(hex_input: bool) -> Result<Vec<u8>,DYNERR> {
    let mut dat = Vec::new();
    std::io::stdin().read_to_end(&mut dat)?;
    if !hex_input {
        return Ok(dat);
    }
    let txt: String = String::from_utf8(dat)?.split_whitespace().collect();
    Ok(hex::decode(txt)?)
}

/// Split the payload into `n` chunks of `size`, the last is padded by the disk layer
fn chunks(dat: &[u8],n: usize,size: usize) -> Result<Vec<&[u8]>,CommandError> {
    if dat.len() > n * size {
        error!("{} bytes will not fit in {} x {}",dat.len(),n,size);
        return Err(CommandError::OutOfRange);
    }
    Ok(dat.chunks(size).collect())
}

pub fn put(cmd: &clap::ArgMatches) -> STDRESULT {
    let addr = cmd.get_one::<String>("file").expect(RCH);
    let typ = ItemType::from_str(cmd.get_one::<String>("type").expect(RCH))?;
    let dat = read_payload(cmd.get_flag("hex"))?;
    super::with_target(cmd,false,|disk| {
        match typ {
            ItemType::Block => {
                let list = super::parse_block_request(addr)?;
                for (b,chunk) in list.iter().zip(chunks(&dat,list.len(),BLOCK_SIZE)?) {
                    disk.write_block(*b,chunk)?;
                }
            },
            ItemType::Sector => {
                let list = super::parse_sector_request(addr)?;
                for ([t,s],chunk) in list.iter().zip(chunks(&dat,list.len(),SECTOR_SIZE)?) {
                    disk.write_track_sector(*t,*s,chunk)?;
                }
            },
            ItemType::Track => {
                let tracks = super::parse_block_request(addr)?;
                if tracks.len() != 1 {
                    return Err(Box::new(CommandError::InvalidCommand));
                }
                disk.write_nibble_track(tracks[0],&dat)?;
            }
        }
        info!("put {} bytes",dat.len());
        Ok(())
    })
}
