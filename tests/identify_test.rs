// test of container identification
use a2dimg::ImgConfig;
use a2dimg::disk::{DiskImg,CreateParams};
use a2dimg::img::{self,FileFormat,OuterFormat,PhysicalFormat,SectorOrder,Error};
use tempfile;
type STDRESULT = Result<(),Box<dyn std::error::Error>>;

fn created(params: CreateParams) -> Result<Vec<u8>,Error> {
    DiskImg::create_buffer(&params,ImgConfig::default())?.to_bytes()
}

#[test]
fn plain_sectors_named_2mg() {
    match DiskImg::open_buffer(vec![0;143360],"2mg",true,ImgConfig::default()) {
        Err(Error::ExtensionMismatch { ext, .. }) => assert_eq!(ext,"2mg"),
        Err(e) => panic!("wrong error {}",e),
        Ok(_) => panic!("plain sectors accepted as 2mg")
    }
}

#[test]
fn content_beats_unreliable_extension() -> STDRESULT {
    let bytes = created(CreateParams::sectors(FileFormat::TwoMG,SectorOrder::ProDOS,280))?;
    let disk = DiskImg::open_buffer(bytes,"dsk",true,ImgConfig::default())?;
    assert_eq!(disk.file_format(),FileFormat::TwoMG);
    assert_eq!(disk.image_order(),SectorOrder::ProDOS);
    assert_eq!(disk.data_len(),143360);
    Ok(())
}

#[test]
fn extension_picks_default_order() -> STDRESULT {
    let cfg = ImgConfig::default();
    for (ext,order) in [("po",SectorOrder::ProDOS),("do",SectorOrder::DOS),("dsk",SectorOrder::DOS)] {
        let mut disk = DiskImg::open_buffer(vec![0;143360],ext,true,cfg)?;
        assert_eq!(disk.file_format(),FileFormat::Unadorned);
        disk.analyze_image()?;
        assert_eq!(disk.image_order(),order);
        assert_eq!(disk.num_tracks(),35);
        assert_eq!(disk.num_blocks(),280);
    }
    let mut disk = DiskImg::open_buffer(vec![0;116480],"d13",true,cfg)?;
    disk.analyze_image()?;
    assert_eq!(disk.sectors_per_track(),13);
    assert_eq!(disk.image_order(),SectorOrder::Physical);
    assert!(!disk.has_blocks());
    Ok(())
}

#[test]
fn io_waits_for_geometry() -> STDRESULT {
    let mut disk = DiskImg::open_buffer(vec![0;143360],"po",true,ImgConfig::default())?;
    assert!(matches!(disk.read_block(0),Err(Error::BadArgument(_))));
    disk.analyze_image()?;
    assert_eq!(disk.read_block(0)?,vec![0;512]);
    Ok(())
}

#[test]
fn gzip_layer() -> STDRESULT {
    let mut flat = vec![0;143360];
    flat[512] = 0x5a;
    let packed = img::outer::gzip::compress(&flat,"disk.po")?;
    let mut disk = DiskImg::open_buffer(packed,"gz",true,ImgConfig::default())?;
    assert_eq!(disk.outer_format(),OuterFormat::Gzip);
    assert_eq!(disk.file_format(),FileFormat::Unadorned);
    disk.analyze_image()?;
    assert_eq!(disk.image_order(),SectorOrder::ProDOS);
    assert_eq!(disk.read_block(1)?[0],0x5a);
    Ok(())
}

#[test]
fn disk_copy_bad_checksum() -> STDRESULT {
    let mut bytes = created(CreateParams::sectors(FileFormat::DiskCopy42,SectorOrder::ProDOS,1600))?;
    let good = DiskImg::open_buffer(bytes.clone(),"dc",false,ImgConfig::default())?;
    assert!(!good.is_read_only());
    assert!(!good.is_damaged());
    bytes[84+1000] ^= 0xff;
    let bad = DiskImg::open_buffer(bytes,"dc",false,ImgConfig::default())?;
    assert_eq!(bad.file_format(),FileFormat::DiskCopy42);
    assert!(bad.is_read_only());
    assert!(bad.is_damaged());
    assert!(bad.notes().iter().any(|n| n.contains("checksum")));
    Ok(())
}

#[test]
fn nufx_bad_crc_is_fatal() -> STDRESULT {
    let mut bytes = created(CreateParams::sectors(FileFormat::NuFX,SectorOrder::ProDOS,280))?;
    assert_eq!(DiskImg::open_buffer(bytes.clone(),"sdk",true,ImgConfig::default())?.file_format(),FileFormat::NuFX);
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;
    assert!(matches!(DiskImg::open_buffer(bytes,"sdk",true,ImgConfig::default()),Err(Error::Damaged(_))));
    Ok(())
}

#[test]
fn nibble_by_content() -> STDRESULT {
    let bytes = created(CreateParams::nibbles(FileFormat::Unadorned,PhysicalFormat::Nib525_6656))?;
    let mut disk = DiskImg::open_buffer(bytes,"img",true,ImgConfig::default())?;
    assert_eq!(disk.physical_format(),PhysicalFormat::Nib525_6656);
    disk.analyze_image()?;
    assert_eq!(disk.sectors_per_track(),16);
    assert_eq!(disk.nibble_descriptor().map(|d| d.sectors),Some(16));
    assert_eq!(disk.dos_volume(),Some(254));
    Ok(())
}

#[test]
fn not_an_image() {
    assert!(DiskImg::open_buffer(vec![1,2,3],"bin",true,ImgConfig::default()).is_err());
}

#[test]
fn raw_volume_write_gate() -> STDRESULT {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("volume.raw");
    std::fs::write(&path,vec![0;143360])?;
    let disk = DiskImg::open_volume(&path,false,ImgConfig::default())?;
    assert_eq!(disk.file_format(),FileFormat::Unadorned);
    assert!(disk.is_read_only());
    assert!(disk.notes().len() > 0);
    drop(disk);
    let cfg = ImgConfig { allow_physical_write: true, ..ImgConfig::default() };
    let mut disk = DiskImg::open_volume(&path,false,cfg)?;
    assert!(!disk.is_read_only());
    disk.analyze_image()?;
    disk.write_block(3,&[0x33;512])?;
    disk.close()?;
    assert_eq!(std::fs::read(&path)?[1536],0x33);
    Ok(())
}
