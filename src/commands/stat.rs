use json::JsonValue;
use crate::STDRESULT;
use crate::disk::DiskImg;

/// Describe the image as a JSON object
pub fn describe(disk: &DiskImg) -> JsonValue {
    let mut root = JsonValue::new_object();
    root["state"] = JsonValue::String(disk.state().to_string());
    root["outer"] = JsonValue::String(disk.outer_format().to_string());
    root["container"] = JsonValue::String(disk.file_format().to_string());
    root["physical"] = JsonValue::String(disk.physical_format().to_string());
    root["image_order"] = JsonValue::String(disk.image_order().to_string());
    root["fs_order"] = JsonValue::String(disk.fs_order().to_string());
    root["fs"] = JsonValue::String(disk.fs_format().to_string());
    root["geometry"] = JsonValue::new_object();
    root["geometry"]["tracks"] = disk.num_tracks().into();
    root["geometry"]["sectors"] = disk.sectors_per_track().into();
    root["geometry"]["blocks"] = disk.num_blocks().into();
    root["bytes"] = disk.data_len().into();
    root["read_only"] = disk.is_read_only().into();
    root["damaged"] = disk.is_damaged().into();
    if let Some(vol) = disk.dos_volume() {
        root["dos_volume"] = vol.into();
    }
    if let Some(desc) = disk.nibble_descriptor() {
        root["nibble_format"] = JsonValue::String(desc.name.to_string());
    }
    if let Some(bad) = disk.bad_blocks() {
        let list: Vec<JsonValue> = bad.iter().enumerate().filter(|(_,b)| *b).map(|(i,_)| i.into()).collect();
        root["bad_blocks"] = JsonValue::Array(list);
    }
    root["notes"] = JsonValue::Array(disk.notes().iter().map(|n| JsonValue::String(n.clone())).collect());
    root
}

pub fn stat(cmd: &clap::ArgMatches) -> STDRESULT {
    let indent = cmd.get_one::<u16>("indent").copied();
    super::with_target(cmd,true,|disk| {
        let root = describe(disk);
        let s = match indent {
            Some(spaces) => json::stringify_pretty(root,spaces),
            None => json::stringify(root)
        };
        println!("{}",s);
        Ok(())
    })
}
