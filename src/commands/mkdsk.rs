use std::path::Path;
use std::str::FromStr;
use log::{info,error};
use crate::STDRESULT;
use crate::disk::{DiskImg,CreateParams};
use crate::img::{FileFormat,OuterFormat,PhysicalFormat,SectorOrder,BLOCK_SIZE};
use crate::img::dsk::D13_LEN;
use super::CommandError;

const RCH: &str = "unreachable was reached";

/// Parameters implied by the image type, before the user's adjustments
fn defaults(typ: &str) -> Result<CreateParams,CommandError> {
    let ans = match typ {
        "do" | "dsk" => CreateParams::sectors(FileFormat::Unadorned,SectorOrder::DOS,280),
        "po" => CreateParams::sectors(FileFormat::Unadorned,SectorOrder::ProDOS,280),
        "d13" => CreateParams {
            order: SectorOrder::Physical,
            length: D13_LEN,
            sectors_per_track: 13,
            ..CreateParams::sectors(FileFormat::Unadorned,SectorOrder::Physical,0)
        },
        "nib" => CreateParams::nibbles(FileFormat::Unadorned,PhysicalFormat::Nib525_6656),
        "nb2" => CreateParams::nibbles(FileFormat::Unadorned,PhysicalFormat::Nib525_6384),
        "2mg" => CreateParams::sectors(FileFormat::TwoMG,SectorOrder::ProDOS,1600),
        "2mg-nib" => CreateParams::nibbles(FileFormat::TwoMG,PhysicalFormat::Nib525_6656),
        "dc42" => CreateParams::sectors(FileFormat::DiskCopy42,SectorOrder::ProDOS,1600),
        "hdv" => CreateParams::sectors(FileFormat::Sim2eHDV,SectorOrder::ProDOS,65535),
        "app" => CreateParams::nibbles(FileFormat::TrackStar,PhysicalFormat::Nib525_Var),
        "ddd" => CreateParams::sectors(FileFormat::DDD,SectorOrder::DOS,280),
        "sdk" => CreateParams::sectors(FileFormat::NuFX,SectorOrder::ProDOS,1600),
        _ => return Err(CommandError::UnknownItemType)
    };
    Ok(ans)
}

pub fn mkdsk(cmd: &clap::ArgMatches) -> STDRESULT {
    let typ = cmd.get_one::<String>("type").expect(RCH);
    let path = Path::new(cmd.get_one::<String>("dimg").expect(RCH));
    let mut params = defaults(typ)?;
    if let Some(s) = cmd.get_one::<String>("blocks") {
        if params.physical.is_nibble() || params.sectors_per_track==13 {
            error!("block count cannot be set for this type");
            return Err(Box::new(CommandError::InvalidCommand));
        }
        let blocks = usize::from_str(s).map_err(|_| CommandError::OutOfRange)?;
        params.length = (blocks * BLOCK_SIZE) as u64;
    }
    if let Some(s) = cmd.get_one::<String>("order") {
        params.order = SectorOrder::from_str(s)?;
    }
    if cmd.get_flag("thirteen") {
        if !params.physical.is_nibble() {
            error!("13 sector formatting only applies to nibble types");
            return Err(Box::new(CommandError::InvalidCommand));
        }
        params.sectors_per_track = 13;
    }
    if let Some(s) = cmd.get_one::<String>("volume") {
        match u8::from_str(s) {
            Ok(v) if (1..=254).contains(&v) => params.dos_volume = Some(v),
            _ => {
                error!("volume must be from 1 to 254");
                return Err(Box::new(CommandError::OutOfRange));
            }
        }
    }
    params.outer = match cmd.get_one::<String>("outer").map(|s| s.as_str()) {
        Some("gz") => OuterFormat::Gzip,
        Some("zip") => OuterFormat::Zip,
        _ => OuterFormat::None
    };
    let mut disk = DiskImg::create_image(path,&params,super::config_from(cmd))?;
    info!("created {} {} with {} blocks",disk.file_format(),disk.physical_format(),disk.num_blocks());
    eprintln!("created {} ({} bytes of disk data)",path.display(),disk.data_len());
    disk.close()?;
    Ok(())
}

#[test]
fn type_defaults() {
    let p = defaults("d13").expect("d13");
    assert_eq!(p.length,116480);
    assert_eq!(p.sectors_per_track,13);
    let p = defaults("app").expect("app");
    assert_eq!(p.physical,PhysicalFormat::Nib525_Var);
    assert!(defaults("woz").is_err());
}
