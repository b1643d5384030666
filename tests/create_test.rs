// test creation of every legal container, then write, flush, reopen, read
use std::path::Path;
use a2dimg::ImgConfig;
use a2dimg::disk::{DiskImg,CreateParams};
use a2dimg::img::{FileFormat,OuterFormat,PhysicalFormat,SectorOrder,Error};
use tempfile;
type STDRESULT = Result<(),Box<dyn std::error::Error>>;

fn pattern(len: usize,seed: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 7 + seed) % 256) as u8).collect()
}

/// write a block if the disk has blocks, otherwise a sector
fn put_marker(disk: &mut DiskImg,seed: usize) -> STDRESULT {
    match disk.has_blocks() {
        true => disk.write_block(5,&pattern(512,seed))?,
        false => disk.write_track_sector(5,3,&pattern(256,seed))?
    }
    Ok(())
}

fn check_marker(disk: &mut DiskImg,seed: usize) -> STDRESULT {
    match disk.has_blocks() {
        true => assert_eq!(disk.read_block(5)?,pattern(512,seed)),
        false => assert_eq!(disk.read_track_sector(5,3)?,pattern(256,seed))
    }
    Ok(())
}

fn round_trip(name: &str,params: CreateParams) -> STDRESULT {
    let cfg = ImgConfig::default();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join(name);
    let mut disk = DiskImg::create_image(&path,&params,cfg)?;
    assert!(!disk.is_dirty());
    put_marker(&mut disk,1)?;
    assert!(disk.is_dirty());
    disk.close()?;

    let mut disk = DiskImg::open_and_analyze(&path,false,cfg)?;
    assert_eq!(disk.outer_format(),params.outer);
    assert_eq!(disk.file_format(),params.format);
    assert_eq!(disk.physical_format(),params.physical);
    assert_eq!(disk.data_len(),params.length);
    check_marker(&mut disk,1)?;

    // flushing twice leaves the same bytes behind
    put_marker(&mut disk,2)?;
    disk.flush()?;
    let first = std::fs::read(&path)?;
    put_marker(&mut disk,2)?;
    disk.flush()?;
    assert_eq!(std::fs::read(&path)?,first);
    disk.close()?;

    let mut disk = DiskImg::open_and_analyze(&path,true,cfg)?;
    check_marker(&mut disk,2)?;
    Ok(())
}

#[test]
fn unadorned_dos() -> STDRESULT {
    round_trip("new.do",CreateParams::sectors(FileFormat::Unadorned,SectorOrder::DOS,280))
}

#[test]
fn unadorned_prodos() -> STDRESULT {
    round_trip("new.po",CreateParams::sectors(FileFormat::Unadorned,SectorOrder::ProDOS,280))?;
    round_trip("big.po",CreateParams::sectors(FileFormat::Unadorned,SectorOrder::ProDOS,1600))
}

#[test]
fn unadorned_d13() -> STDRESULT {
    let params = CreateParams {
        order: SectorOrder::Physical,
        length: 116480,
        sectors_per_track: 13,
        ..CreateParams::sectors(FileFormat::Unadorned,SectorOrder::Physical,0)
    };
    round_trip("new.d13",params)
}

#[test]
fn unadorned_nibbles() -> STDRESULT {
    round_trip("new.nib",CreateParams::nibbles(FileFormat::Unadorned,PhysicalFormat::Nib525_6656))?;
    round_trip("new.nb2",CreateParams::nibbles(FileFormat::Unadorned,PhysicalFormat::Nib525_6384))
}

#[test]
fn thirteen_sector_nibbles() -> STDRESULT {
    let params = CreateParams {
        sectors_per_track: 13,
        dos_volume: Some(100),
        ..CreateParams::nibbles(FileFormat::Unadorned,PhysicalFormat::Nib525_6656)
    };
    round_trip("dos32.nib",params.clone())?;
    let mut disk = DiskImg::create_buffer(&params,ImgConfig::default())?;
    assert_eq!(disk.sectors_per_track(),13);
    assert_eq!(disk.dos_volume(),Some(100));
    assert!(!disk.has_blocks());
    assert!(disk.read_block(0).is_err());
    Ok(())
}

#[test]
fn two_mg() -> STDRESULT {
    round_trip("prodos.2mg",CreateParams::sectors(FileFormat::TwoMG,SectorOrder::ProDOS,1600))?;
    round_trip("dos.2mg",CreateParams::sectors(FileFormat::TwoMG,SectorOrder::DOS,280))?;
    round_trip("nib.2mg",CreateParams::nibbles(FileFormat::TwoMG,PhysicalFormat::Nib525_6656))
}

#[test]
fn disk_copy() -> STDRESULT {
    round_trip("new.dc",CreateParams::sectors(FileFormat::DiskCopy42,SectorOrder::ProDOS,1600))
}

#[test]
fn sim_hdv() -> STDRESULT {
    round_trip("new.hdv",CreateParams::sectors(FileFormat::Sim2eHDV,SectorOrder::ProDOS,4096))
}

#[test]
fn trackstar() -> STDRESULT {
    round_trip("new.app",CreateParams::nibbles(FileFormat::TrackStar,PhysicalFormat::Nib525_Var))
}

#[test]
fn ddd() -> STDRESULT {
    round_trip("new.ddd",CreateParams::sectors(FileFormat::DDD,SectorOrder::DOS,280))
}

#[test]
fn nufx() -> STDRESULT {
    round_trip("new.sdk",CreateParams::sectors(FileFormat::NuFX,SectorOrder::ProDOS,280))
}

#[test]
fn compressed() -> STDRESULT {
    let params = CreateParams {
        outer: OuterFormat::Gzip,
        ..CreateParams::sectors(FileFormat::Unadorned,SectorOrder::ProDOS,280)
    };
    round_trip("new.po.gz",params)?;
    let params = CreateParams {
        outer: OuterFormat::Zip,
        ..CreateParams::sectors(FileFormat::TwoMG,SectorOrder::ProDOS,280)
    };
    round_trip("new.2mg.zip",params)
}

#[test]
fn refuses_bad_combinations() -> STDRESULT {
    let cfg = ImgConfig::default();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("bad.dc");
    let params = CreateParams::sectors(FileFormat::DiskCopy42,SectorOrder::ProDOS,280);
    assert!(matches!(DiskImg::create_image(&path,&params,cfg),Err(Error::BadArgument(_))));
    assert!(!path.exists());
    let params = CreateParams::sectors(FileFormat::FDI,SectorOrder::Physical,280);
    assert!(matches!(DiskImg::create_image(&path,&params,cfg),Err(Error::Unsupported(_))));
    let params = CreateParams::sectors(FileFormat::TwoMG,SectorOrder::CPM,280);
    assert!(DiskImg::create_image(&path,&params,cfg).is_err());
    Ok(())
}

#[test]
fn refuses_to_clobber() -> STDRESULT {
    let cfg = ImgConfig::default();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("exists.po");
    std::fs::write(&path,vec![0xaa;16])?;
    let params = CreateParams::sectors(FileFormat::Unadorned,SectorOrder::ProDOS,280);
    assert!(matches!(DiskImg::create_image(&path,&params,cfg),Err(Error::Io(_))));
    assert_eq!(std::fs::read(&path)?,vec![0xaa;16]);
    Ok(())
}

#[test]
fn read_only_refuses_writes() -> STDRESULT {
    let cfg = ImgConfig::default();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("ro.po");
    let params = CreateParams::sectors(FileFormat::Unadorned,SectorOrder::ProDOS,280);
    DiskImg::create_image(&path,&params,cfg)?.close()?;
    let mut disk = DiskImg::open_and_analyze(Path::new(&path),true,cfg)?;
    assert!(disk.is_read_only());
    assert!(matches!(disk.write_block(0,&[0;512]),Err(Error::ReadOnly)));
    Ok(())
}
