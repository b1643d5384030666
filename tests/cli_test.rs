use assert_cmd::cargo; // Add methods on commands
use predicates::prelude::*; // Used for writing assertions
use tempfile;
type STDRESULT = Result<(),Box<dyn std::error::Error>>;

fn mkdsk(typ: &str,path: &std::path::Path) {
    let mut cmd = cargo::cargo_bin_cmd!("a2dimg");
    cmd.arg("mkdsk")
        .arg("-t").arg(typ)
        .arg("-d").arg(path)
        .assert()
        .success();
}

#[test]
fn stat_new_image() -> STDRESULT {
    let dir = tempfile::tempdir()?;
    let dimg_path = dir.path().join("new.po");
    mkdsk("po",&dimg_path);
    let mut cmd = cargo::cargo_bin_cmd!("a2dimg");
    cmd.arg("stat")
        .arg("-d").arg(&dimg_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"container\":\"unadorned\""))
        .stdout(predicate::str::contains("\"state\":\"geometry_known\""))
        .stdout(predicate::str::contains("\"blocks\":280"));
    Ok(())
}

#[test]
fn stat_pretty() -> STDRESULT {
    let dir = tempfile::tempdir()?;
    let dimg_path = dir.path().join("new.2mg");
    mkdsk("2mg",&dimg_path);
    let mut cmd = cargo::cargo_bin_cmd!("a2dimg");
    cmd.arg("stat")
        .arg("-d").arg(&dimg_path)
        .arg("--indent").arg("2")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"container\": \"2mg\""))
        .stdout(predicate::str::contains("\"blocks\": 1600"));
    Ok(())
}

#[test]
fn put_get_sector() -> STDRESULT {
    let dir = tempfile::tempdir()?;
    let dimg_path = dir.path().join("new.do");
    mkdsk("do",&dimg_path);
    let mut cmd = cargo::cargo_bin_cmd!("a2dimg");
    cmd.arg("put")
        .arg("-t").arg("sec").arg("-f").arg("17,0")
        .arg("-d").arg(&dimg_path)
        .arg("--hex")
        .write_stdin("41 42 43")
        .assert()
        .success();
    let mut expected = vec![0;256];
    expected[0..3].copy_from_slice(b"ABC");
    let mut cmd = cargo::cargo_bin_cmd!("a2dimg");
    cmd.arg("get")
        .arg("-t").arg("sec").arg("-f").arg("17,0")
        .arg("-d").arg(&dimg_path)
        .arg("--raw")
        .assert()
        .success()
        .stdout(expected);
    let mut cmd = cargo::cargo_bin_cmd!("a2dimg");
    cmd.arg("get")
        .arg("-t").arg("sec").arg("-f").arg("17,0")
        .arg("-d").arg(&dimg_path)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("0000 : 41 42 43 00"));
    Ok(())
}

#[test]
fn put_get_block_range() -> STDRESULT {
    let dir = tempfile::tempdir()?;
    let dimg_path = dir.path().join("new.po");
    mkdsk("po",&dimg_path);
    let dat: Vec<u8> = (0..1024).map(|i| (i % 251) as u8).collect();
    let mut cmd = cargo::cargo_bin_cmd!("a2dimg");
    cmd.arg("put")
        .arg("-t").arg("block").arg("-f").arg("6..8")
        .arg("-d").arg(&dimg_path)
        .write_stdin(dat.clone())
        .assert()
        .success();
    let mut cmd = cargo::cargo_bin_cmd!("a2dimg");
    cmd.arg("get")
        .arg("-t").arg("block").arg("-f").arg("6..8")
        .arg("-d").arg(&dimg_path)
        .arg("--raw")
        .assert()
        .success()
        .stdout(dat);
    Ok(())
}

#[test]
fn put_too_much() -> STDRESULT {
    let dir = tempfile::tempdir()?;
    let dimg_path = dir.path().join("new.po");
    mkdsk("po",&dimg_path);
    let mut cmd = cargo::cargo_bin_cmd!("a2dimg");
    cmd.arg("put")
        .arg("-t").arg("block").arg("-f").arg("2")
        .arg("-d").arg(&dimg_path)
        .write_stdin(vec![0u8;513])
        .assert()
        .failure();
    Ok(())
}

#[test]
fn get_nibble_track() -> STDRESULT {
    let dir = tempfile::tempdir()?;
    let dimg_path = dir.path().join("new.nib");
    mkdsk("nib",&dimg_path);
    let mut cmd = cargo::cargo_bin_cmd!("a2dimg");
    cmd.arg("get")
        .arg("-t").arg("track").arg("-f").arg("0")
        .arg("-d").arg(&dimg_path)
        .arg("--raw")
        .assert()
        .success()
        .stdout(predicate::function(|out: &[u8]| out.len()==6656));
    Ok(())
}

#[test]
fn mkdsk_refuses() -> STDRESULT {
    let dir = tempfile::tempdir()?;
    let dimg_path = dir.path().join("new.dc");
    let mut cmd = cargo::cargo_bin_cmd!("a2dimg");
    cmd.arg("mkdsk")
        .arg("-t").arg("dc42").arg("--blocks").arg("280")
        .arg("-d").arg(&dimg_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot create"));
    mkdsk("po",&dir.path().join("exists.po"));
    let mut cmd = cargo::cargo_bin_cmd!("a2dimg");
    cmd.arg("mkdsk")
        .arg("-t").arg("po")
        .arg("-d").arg(dir.path().join("exists.po"))
        .assert()
        .failure();
    Ok(())
}

#[test]
fn not_an_image() -> STDRESULT {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("junk.bin");
    std::fs::write(&path,b"not a disk image")?;
    let mut cmd = cargo::cargo_bin_cmd!("a2dimg");
    cmd.arg("stat")
        .arg("-d").arg(&path)
        .assert()
        .failure();
    Ok(())
}

#[test]
fn no_partitions() -> STDRESULT {
    let dir = tempfile::tempdir()?;
    let dimg_path = dir.path().join("new.po");
    mkdsk("po",&dimg_path);
    let mut cmd = cargo::cargo_bin_cmd!("a2dimg");
    cmd.arg("partitions")
        .arg("-d").arg(&dimg_path)
        .assert()
        .success()
        .stdout("[]\n");
    let mut cmd = cargo::cargo_bin_cmd!("a2dimg");
    cmd.arg("stat")
        .arg("-d").arg(&dimg_path)
        .arg("-p").arg("0")
        .assert()
        .failure();
    Ok(())
}
