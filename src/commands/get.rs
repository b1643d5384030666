use std::io::Write;
use std::str::FromStr;
use log::debug;
use super::{ItemType,CommandError};
use crate::STDRESULT;

const RCH: &str = "unreachable was reached";

pub fn get(cmd: &clap::ArgMatches) -> STDRESULT {
    let addr = cmd.get_one::<String>("file").expect(RCH);
    let typ = ItemType::from_str(cmd.get_one::<String>("type").expect(RCH))?;
    let raw = cmd.get_flag("raw");
    super::with_target(cmd,true,|disk| {
        let dat = match typ {
            ItemType::Block => {
                let mut cum = Vec::new();
                for b in super::parse_block_request(addr)? {
                    cum.append(&mut disk.read_block(b)?);
                }
                cum
            },
            ItemType::Sector => {
                let mut cum = Vec::new();
                for [t,s] in super::parse_sector_request(addr)? {
                    cum.append(&mut disk.read_track_sector(t,s)?);
                }
                cum
            },
            ItemType::Track => {
                let tracks = super::parse_block_request(addr)?;
                if tracks.len() != 1 {
                    return Err(Box::new(CommandError::InvalidCommand));
                }
                disk.read_nibble_track(tracks[0])?
            }
        };
        debug!("got {} bytes",dat.len());
        match raw {
            true => std::io::stdout().write_all(&dat)?,
            false => crate::display_block(0,&dat)
        }
        Ok(())
    })
}
