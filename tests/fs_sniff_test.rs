// test file system sniffing and the sector order it settles on
use a2dimg::ImgConfig;
use a2dimg::disk::DiskImg;
use a2dimg::fs::FsFormat;
use a2dimg::img::{PhysicalFormat,SectorOrder,Error};
type STDRESULT = Result<(),Box<dyn std::error::Error>>;

fn blank(len: usize,ext: &str) -> Result<DiskImg,Error> {
    let mut disk = DiskImg::open_buffer(vec![0;len],ext,false,ImgConfig::default())?;
    disk.analyze_image()?;
    Ok(disk)
}

fn reopen(disk: &mut DiskImg,ext: &str) -> Result<DiskImg,Error> {
    disk.flush()?;
    let bytes = disk.to_bytes()?;
    let mut ans = DiskImg::open_buffer(bytes,ext,true,ImgConfig::default())?;
    ans.analyze_image_fs()?;
    Ok(ans)
}

fn vtoc(version: u8,tracks: u8,sectors: u8) -> Vec<u8> {
    let mut buf = vec![0;256];
    buf[1] = 17;
    buf[2] = sectors - 1;
    buf[3] = version;
    buf[6] = 254;
    buf[0x27] = 122;
    buf[0x34] = tracks;
    buf[0x35] = sectors;
    buf[0x36] = 0;
    buf[0x37] = 1;
    buf
}

/// VTOC and a full catalog chain, sectors numbered the DOS way
fn dos33(disk: &mut DiskImg,image_order: SectorOrder) -> STDRESULT {
    disk.write_track_sector_swapped(17,0,image_order,SectorOrder::DOS,&vtoc(3,35,16))?;
    for s in 1..16 {
        let mut buf = vec![0;256];
        if s > 1 {
            buf[1] = 17;
            buf[2] = s as u8 - 1;
        }
        disk.write_track_sector_swapped(17,s,image_order,SectorOrder::DOS,&buf)?;
    }
    Ok(())
}

/// ProDOS volume directory in blocks 2 and 3, relative to `base`
fn prodos(disk: &mut DiskImg,base: usize,total: u16) -> STDRESULT {
    let name = b"SNIFF";
    let mut key = vec![0;512];
    key[2] = 3;
    key[4] = 0xf0 | name.len() as u8;
    key[5..5+name.len()].copy_from_slice(name);
    key[0x23] = 0x27;
    key[0x24] = 0x0d;
    key[0x29..0x2b].copy_from_slice(&u16::to_le_bytes(total));
    disk.write_block(base+2,&key)?;
    let mut next = vec![0;512];
    next[0] = 2;
    disk.write_block(base+3,&next)?;
    Ok(())
}

#[test]
fn dos33_in_dos_order() -> STDRESULT {
    let mut disk = blank(143360,"do")?;
    dos33(&mut disk,SectorOrder::DOS)?;
    disk.analyze_image_fs()?;
    assert_eq!(disk.fs_format(),FsFormat::Dos33);
    assert_eq!(disk.image_order(),SectorOrder::DOS);
    assert_eq!(disk.fs_order(),SectorOrder::DOS);
    assert!(disk.notes().is_empty());
    Ok(())
}

#[test]
fn dos33_in_prodos_order() -> STDRESULT {
    let mut disk = blank(143360,"po")?;
    dos33(&mut disk,SectorOrder::ProDOS)?;
    disk.analyze_image_fs()?;
    assert_eq!(disk.fs_format(),FsFormat::Dos33);
    assert_eq!(disk.image_order(),SectorOrder::ProDOS);
    assert_eq!(disk.fs_order(),SectorOrder::DOS);
    // the catalog is now read through the file system order
    assert_eq!(disk.read_track_sector(17,0)?,vtoc(3,35,16));
    assert_eq!(disk.read_track_sector(17,15)?[1..3],[17,14]);
    Ok(())
}

#[test]
fn mislabeled_dos33() -> STDRESULT {
    let mut disk = blank(143360,"do")?;
    dos33(&mut disk,SectorOrder::DOS)?;
    let disk = reopen(&mut disk,"po")?;
    assert_eq!(disk.fs_format(),FsFormat::Dos33);
    assert_eq!(disk.image_order(),SectorOrder::DOS);
    assert!(disk.notes().iter().any(|n| n.contains("sector order changed")));
    Ok(())
}

#[test]
fn dos32_on_thirteen_sectors() -> STDRESULT {
    let mut disk = blank(116480,"d13")?;
    disk.write_track_sector(17,0,&vtoc(2,35,13))?;
    disk.analyze_image_fs()?;
    assert_eq!(disk.fs_format(),FsFormat::Dos32);
    assert_eq!(disk.image_order(),SectorOrder::Physical);
    Ok(())
}

#[test]
fn prodos_volume() -> STDRESULT {
    let mut disk = blank(143360,"po")?;
    prodos(&mut disk,0,280)?;
    disk.analyze_image_fs()?;
    assert_eq!(disk.fs_format(),FsFormat::ProDOS);
    assert_eq!(disk.image_order(),SectorOrder::ProDOS);
    // blocks written in ProDOS order, found again from a DOS ordered label
    let disk = reopen(&mut disk,"dsk")?;
    assert_eq!(disk.fs_format(),FsFormat::ProDOS);
    assert_eq!(disk.image_order(),SectorOrder::ProDOS);
    assert!(disk.notes().iter().any(|n| n.contains("sector order changed")));
    Ok(())
}

#[test]
fn prodos_in_dos_order() -> STDRESULT {
    let mut disk = blank(143360,"do")?;
    prodos(&mut disk,0,280)?;
    disk.analyze_image_fs()?;
    assert_eq!(disk.fs_format(),FsFormat::ProDOS);
    assert_eq!(disk.image_order(),SectorOrder::DOS);
    assert_eq!(disk.fs_order(),SectorOrder::ProDOS);
    Ok(())
}

#[test]
fn pascal_volume() -> STDRESULT {
    let mut disk = blank(143360,"po")?;
    let mut dir = vec![0;512];
    dir[2] = 6;
    dir[6] = 5;
    dir[7..12].copy_from_slice(b"BLANK");
    dir[14..16].copy_from_slice(&u16::to_le_bytes(280));
    disk.write_block(2,&dir)?;
    disk.analyze_image_fs()?;
    assert_eq!(disk.fs_format(),FsFormat::Pascal);
    Ok(())
}

#[test]
fn nothing_found() -> STDRESULT {
    let mut disk = blank(143360,"po")?;
    disk.analyze_image_fs()?;
    assert_eq!(disk.fs_format(),FsFormat::Unknown);
    assert_eq!(disk.image_order(),SectorOrder::ProDOS);
    assert_eq!(disk.read_block(0)?.len(),512);
    Ok(())
}

#[test]
fn overrides() -> STDRESULT {
    let mut disk = blank(143360,"po")?;
    assert!(matches!(disk.override_format(PhysicalFormat::Sectors,FsFormat::ProDOS,SectorOrder::ProDOS),Err(Error::FilesystemMismatch)));
    // total blocks too large fails the automatic probe, but passes when asserted
    prodos(&mut disk,0,1600)?;
    disk.analyze_image_fs()?;
    assert_eq!(disk.fs_format(),FsFormat::Unknown);
    disk.override_format(PhysicalFormat::Sectors,FsFormat::ProDOS,SectorOrder::ProDOS)?;
    assert_eq!(disk.fs_format(),FsFormat::ProDOS);
    assert!(matches!(disk.override_format(PhysicalFormat::Sectors,FsFormat::Dos33,SectorOrder::DOS),Err(Error::FilesystemMismatch)));
    assert!(matches!(disk.override_format(PhysicalFormat::Nib525_6656,FsFormat::ProDOS,SectorOrder::ProDOS),Err(Error::BadArgument(_))));
    disk.override_format(PhysicalFormat::Sectors,FsFormat::Unknown,SectorOrder::DOS)?;
    assert_eq!(disk.image_order(),SectorOrder::DOS);
    assert_eq!(disk.fs_format(),FsFormat::Unknown);
    Ok(())
}

#[test]
fn partition_map() -> STDRESULT {
    let mut disk = blank(819200,"po")?;
    let mut ddr = vec![0;512];
    ddr[0..2].copy_from_slice(b"ER");
    disk.write_block(0,&ddr)?;
    let mut entry = vec![0;512];
    entry[0..2].copy_from_slice(b"PM");
    entry[4..8].copy_from_slice(&u32::to_be_bytes(1));
    entry[8..12].copy_from_slice(&u32::to_be_bytes(16));
    entry[12..16].copy_from_slice(&u32::to_be_bytes(280));
    entry[16..21].copy_from_slice(b"MacOS");
    entry[48..60].copy_from_slice(b"Apple_PRODOS");
    disk.write_block(1,&entry)?;
    prodos(&mut disk,16,280)?;
    disk.analyze_image_fs()?;
    assert_eq!(disk.fs_format(),FsFormat::MacPartitionMap);

    let map = a2dimg::fs::macpart::read_map(&mut disk)?;
    assert_eq!(map.len(),1);
    assert_eq!(map[0].kind,"Apple_PRODOS");
    assert!(matches!(disk.open_partition(1),Err(Error::OutOfRange)));

    let mut child = disk.open_partition(0)?;
    assert!(child.is_embedded());
    assert_eq!(child.num_blocks(),280);
    assert_eq!(child.fs_format(),FsFormat::ProDOS);
    child.write_block(7,&[0x77;512])?;
    assert!(matches!(disk.close(),Err(Error::StillReferenced)));
    child.close()?;
    assert_eq!(disk.read_block(23)?,vec![0x77;512]);
    disk.close()?;
    Ok(())
}

#[test]
fn unidos_halves() -> STDRESULT {
    let mut disk = blank(819200,"po")?;
    for vol in 0..2 {
        let mut block = vec![0;512];
        block[0..256].copy_from_slice(&vtoc(3,50,32));
        disk.write_block(vol*800 + 272,&block)?;
    }
    disk.analyze_image_fs()?;
    assert_eq!(disk.fs_format(),FsFormat::Unidos);
    let mut second = disk.open_embedded_tracks(50,50,32)?;
    assert_eq!(second.fs_format(),FsFormat::Dos33);
    assert_eq!(second.num_tracks(),50);
    assert_eq!(second.sectors_per_track(),32);
    assert_eq!(second.read_track_sector(17,0)?,vtoc(3,50,32));
    second.close()?;
    assert!(matches!(disk.open_embedded_tracks(60,50,32),Err(Error::OutOfRange)));
    Ok(())
}
