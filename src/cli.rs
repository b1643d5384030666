use clap::{value_parser,crate_version,Arg,ArgAction,Command,ValueHint};

const RNG_HELP: &str = "addresses support ranges using `..` and `,,` separators,
e.g., `1..4,,7..10` would mean 1,2,3,7,8,9";
const F_LONG_HELP: &str = "for blocks this is the block number, for sectors it is <track>,<sector>,
for nibble tracks it is the track number";
const PART_HELP: &str = "partitions are numbered from 0, use `partitions` to list them";

fn dimg_arg(help: &'static str) -> Arg {
    Arg::new("dimg").long("dimg").short('d').value_name("PATH").help(help)
        .value_hint(ValueHint::FilePath)
        .required(true)
}

fn indent_arg() -> Arg {
    Arg::new("indent").long("indent").help("JSON indentation, omit to minify")
        .value_name("SPACES")
        .value_parser(value_parser!(u16).range(0..16))
        .required(false)
}

fn type_arg() -> Arg {
    Arg::new("type").long("type").short('t').help("type of the item")
        .value_name("TYPE")
        .value_parser(["block","sec","track"])
        .required(true)
}

fn file_arg() -> Arg {
    Arg::new("file").long("file").short('f').help("address of the item")
        .value_name("ADDRESS")
        .long_help(F_LONG_HELP)
        .required(true)
}

/// Switches for opening an existing image
fn open_args() -> Vec<Arg> {
    vec![
        Arg::new("volume").long("volume").help("open a host block device as a raw volume").action(ArgAction::SetTrue),
        Arg::new("physical").long("allow-physical-write").help("permit writes to host block devices").action(ArgAction::SetTrue),
        Arg::new("strict").long("strict-nibbles").help("refuse nibble sectors with bad checksums").action(ArgAction::SetTrue),
        Arg::new("fs").long("fs").value_name("FS").help("assert the file system")
            .value_parser(["prodos","dos33","dos32","unidos","pascal","hfs","cpm","fat","macpart","none"]),
        Arg::new("order").long("order").value_name("ORDER").help("assert the sector order of the image")
            .value_parser(["prodos","dos","cpm","physical"]),
        Arg::new("part").long("part").short('p').value_name("INDEX").help("work inside a partition").long_help(PART_HELP)
    ]
}

pub fn build_cli() -> Command {
    let long_help = "a2dimg is always invoked with exactly one of several subcommands.
Set RUST_LOG environment variable to control logging level.
  levels: trace,debug,info,warn,error

Examples:
---------
create DOS image:      `a2dimg mkdsk -t do -v 254 -d myimg.do`
create 800K 2MG:       `a2dimg mkdsk -t 2mg --blocks 1600 -d myimg.2mg`
describe image:        `a2dimg stat -d myimg.2mg --indent 2`
dump the VTOC:         `a2dimg get -t sec -f 17,0 -d myimg.do`
replace a block:       `a2dimg put -t block -f 2 -d myimg.po < block.bin`";

    let img_types = [
        "do", "dsk", "po", "d13", "nib", "nb2", "2mg", "2mg-nib", "dc42", "hdv", "app", "ddd", "sdk"
    ];

    let mut main_cmd = Command::new("a2dimg")
        .about("Identify, create, and edit Apple II disk images.")
        .after_long_help(long_help)
        .version(crate_version!());

    main_cmd = main_cmd.subcommand(
        Command::new("mkdsk")
            .arg(Arg::new("type").long("type").short('t').value_name("TYPE").help("type of disk image to create")
                .required(true)
                .value_parser(img_types))
            .arg(dimg_arg("disk image path to create"))
            .arg(Arg::new("blocks").long("blocks").short('b').value_name("BLOCKS").help("size in 512 byte blocks")
                .required(false))
            .arg(Arg::new("order").long("order").value_name("ORDER").help("sector order of the new image")
                .value_parser(["prodos","dos","cpm","physical"])
                .required(false))
            .arg(Arg::new("volume").long("volume").short('v').value_name("VOLUME").help("DOS volume number")
                .required(false))
            .arg(Arg::new("thirteen").long("thirteen").help("format nibble tracks with 13 sectors").action(ArgAction::SetTrue))
            .arg(Arg::new("outer").long("outer").short('z').value_name("FMT").help("compress the image")
                .value_parser(["gz","zip"])
                .required(false))
            .arg(Arg::new("physical").long("allow-physical-write").hide(true).action(ArgAction::SetTrue))
            .arg(Arg::new("strict").long("strict-nibbles").hide(true).action(ArgAction::SetTrue))
            .visible_alias("mkimg")
            .about("write a new, blank disk image to the given path")
            .after_help("the image is not formatted for any file system, nibble tracks get empty sectors")
    );
    main_cmd = main_cmd.subcommand(
        Command::new("stat")
            .arg(dimg_arg("path to disk image"))
            .args(open_args())
            .arg(indent_arg())
            .about("write image description as a JSON string to stdout")
    );
    main_cmd = main_cmd.subcommand(
        Command::new("get")
            .arg(file_arg())
            .arg(type_arg())
            .arg(dimg_arg("path to disk image"))
            .args(open_args())
            .arg(Arg::new("raw").long("raw").help("write bytes rather than a hex dump").action(ArgAction::SetTrue))
            .about("read from disk image, write to stdout")
            .after_help(RNG_HELP)
    );
    main_cmd = main_cmd.subcommand(
        Command::new("put")
            .arg(file_arg())
            .arg(type_arg())
            .arg(dimg_arg("path to disk image"))
            .args(open_args())
            .arg(Arg::new("hex").long("hex").help("stdin is hex text").action(ArgAction::SetTrue))
            .about("read from stdin, write to disk image")
            .after_help(RNG_HELP)
    );
    main_cmd = main_cmd.subcommand(
        Command::new("partitions")
            .arg(dimg_arg("path to disk image"))
            .args(open_args())
            .arg(indent_arg())
            .about("list embedded volumes as a JSON string")
    );
    main_cmd
}
