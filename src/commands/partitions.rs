use json::JsonValue;
use log::warn;
use crate::STDRESULT;
use crate::fs::{self,FsFormat};

/// List the embedded volumes as a JSON array
pub fn partitions(cmd: &clap::ArgMatches) -> STDRESULT {
    let mut disk = super::open_disk(cmd,true)?;
    let mut ans = JsonValue::new_array();
    let names: Vec<(String,String)> = match disk.fs_format() {
        FsFormat::MacPartitionMap => fs::macpart::read_map(&mut disk)?.into_iter().map(|p| (p.name,p.kind)).collect(),
        FsFormat::Unidos => (1..=fs::dos3x::unidos_volumes().len()).map(|i| (format!("UniDOS {}",i),"DOS 3.3".to_string())).collect(),
        _ => Vec::new()
    };
    for (index,(name,kind)) in names.into_iter().enumerate() {
        let mut obj = JsonValue::new_object();
        obj["index"] = index.into();
        obj["name"] = name.into();
        obj["kind"] = kind.into();
        match super::open_part(&mut disk,index) {
            Ok(mut child) => {
                obj["blocks"] = child.num_blocks().into();
                obj["fs"] = child.fs_format().to_string().into();
                child.close()?;
            },
            Err(e) => {
                warn!("partition {} could not be opened: {}",index,e);
                obj["fs"] = JsonValue::Null;
            }
        }
        ans.push(obj)?;
    }
    let s = match cmd.get_one::<u16>("indent") {
        Some(spaces) => json::stringify_pretty(ans,*spaces),
        None => json::stringify(ans)
    };
    println!("{}",s);
    disk.close()?;
    Ok(())
}
