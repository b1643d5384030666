//! # Disk Image Façade
//!
//! `DiskImg` owns the chain of sources that starts at a host file (or buffer) and
//! ends at the flat view of the disk data.  It supplies block, sector, and nibble
//! track I/O in whatever order the file system wants, regardless of how the image
//! stores the sectors.
//!
//! ## Lifecycle
//!
//! * `open_image` peels the outer layer and the wrapper (`ImgState::WrapperIdentified`)
//! * `analyze_image` works out the geometry (`ImgState::GeometryKnown`)
//! * `analyze_image_fs` runs the file system probes (`ImgState::FilesystemKnown`)
//! * `flush` pushes changes out through the wrapper and outer layer
//! * `close` flushes and releases the chain
//!
//! ## Embedded Volumes
//!
//! A partition or a sub-volume is opened as a child `DiskImg` whose flat view is a
//! window onto the parent's flat view.  The child holds only a weak link to the parent,
//! so a write in the child marks every ancestor dirty, and a flush in the child is
//! carried up the chain.  The parent refuses to close while children are alive.

use std::cell::RefCell;
use std::io::Write;
use std::path::Path;
use std::rc::{Rc,Weak};
use bit_vec::BitVec;
use log::{debug,info,trace,warn};
use crate::ImgConfig;
use crate::io::{Source,SharedSource};
use crate::bios::{blocks,skew};
use crate::fs::{self,FsFormat,Leniency};
use crate::img::{self,outer,identify,Error,NibbleError,FileFormat,OuterFormat,PhysicalFormat,SectorOrder,CreateSpec,ImageWrapper};
use crate::img::geometry::{self,Geometry};
use crate::img::tracks::{self,NibbleDescriptor,NibbleEncoding};
use crate::img::{BLOCK_SIZE,SECTOR_SIZE};

#[derive(PartialEq,Eq,Clone,Copy,Debug)]
pub enum ImgState {
    Closed,
    WrapperIdentified,
    GeometryKnown,
    FilesystemKnown
}

impl std::fmt::Display for ImgState {
    fn fmt(&self,f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f,"closed"),
            Self::WrapperIdentified => write!(f,"wrapper_identified"),
            Self::GeometryKnown => write!(f,"geometry_known"),
            Self::FilesystemKnown => write!(f,"filesystem_known")
        }
    }
}

/// Parameters for `DiskImg::create_image`
#[derive(Clone,Debug)]
pub struct CreateParams {
    pub outer: OuterFormat,
    pub format: FileFormat,
    pub physical: PhysicalFormat,
    pub order: SectorOrder,
    /// length of the disk data in bytes
    pub length: u64,
    /// 16, or 13 for DOS 3.2 disks
    pub sectors_per_track: usize,
    pub dos_volume: Option<u8>
}

impl CreateParams {
    /// Sector image of `blocks` blocks
    pub fn sectors(format: FileFormat,order: SectorOrder,blocks: usize) -> Self {
        Self {
            outer: OuterFormat::None,
            format,
            physical: PhysicalFormat::Sectors,
            order,
            length: (blocks * BLOCK_SIZE) as u64,
            sectors_per_track: 16,
            dos_volume: None
        }
    }
    /// Nibble image with the natural track count for the container
    pub fn nibbles(format: FileFormat,physical: PhysicalFormat) -> Self {
        let tracks = match format {
            FileFormat::TrackStar => img::trackstar::TRACKS,
            _ => img::nib::TRACKS
        };
        Self {
            outer: OuterFormat::None,
            format,
            physical,
            order: SectorOrder::Physical,
            length: (tracks * physical.track_slot()) as u64,
            sectors_per_track: 16,
            dos_volume: None
        }
    }
}

/// Pieces needed to push the flat view back out to the host
struct Chain {
    /// the file or buffer the image was opened from
    root: SharedSource,
    outer: OuterFormat,
    inner_name: String,
    /// what the wrapper works on, `root` unless there is an outer layer
    wrapped: SharedSource,
    wrapper: Box<dyn ImageWrapper>
}

/// State shared with embedded children
struct Core {
    flat: Option<SharedSource>,
    flat_len: u64,
    dirty: bool,
    parent: Option<Weak<RefCell<Core>>>,
    /// only the root image has a chain
    chain: Option<Chain>
}

fn flush_core(core: &Rc<RefCell<Core>>) -> Result<(),Error> {
    let parent = {
        let mut guard = core.borrow_mut();
        let c = &mut *guard;
        if c.dirty {
            let flat = c.flat.as_ref().ok_or(Error::NotOpen)?;
            flat.borrow_mut().flush()?;
            if let Some(chain) = c.chain.as_mut() {
                let wrapped_len = chain.wrapper.flush(&chain.wrapped,flat,c.flat_len)?;
                debug!("wrapper flushed {} bytes",wrapped_len);
                if chain.outer != OuterFormat::None {
                    let inner = chain.wrapped.borrow_mut().read_all()?;
                    outer::save(chain.outer,&chain.root,&inner,&chain.inner_name)?;
                }
                chain.root.borrow_mut().flush()?;
            }
            c.dirty = false;
        }
        c.parent.clone()
    };
    match parent {
        Some(weak) => match weak.upgrade() {
            Some(p) => flush_core(&p),
            None => Err(Error::ParentClosed)
        },
        None => Ok(())
    }
}

/// Mark this core and every ancestor dirty
fn mark_dirty(core: &Rc<RefCell<Core>>) {
    core.borrow_mut().dirty = true;
    let mut maybe_parent = core.borrow().parent.clone();
    while let Some(weak) = maybe_parent {
        match weak.upgrade() {
            Some(p) => {
                p.borrow_mut().dirty = true;
                maybe_parent = p.borrow().parent.clone();
            },
            None => break
        }
    }
}

/// Check a requested combination against what the containers can hold.
fn check_combination(params: &CreateParams) -> Result<(),Error> {
    let len = params.length;
    let nib_len = |slot: usize,tracks: usize| (slot*tracks) as u64;
    let sixteen = len > 0 && len % (16*SECTOR_SIZE) as u64 == 0 && len <= (geometry::MAX_FLOPPY_TRACKS*16*SECTOR_SIZE) as u64;
    let whole_blocks = len > 0 && len % BLOCK_SIZE as u64 == 0;
    let bad = |why: &str| Err(Error::BadArgument(format!("cannot create {} {} in {} order: {}",params.format,params.physical,params.order,why)));
    if params.sectors_per_track != 16 && params.sectors_per_track != 13 {
        return bad("sectors per track must be 13 or 16");
    }
    match (params.format,params.physical,params.order) {
        (FileFormat::Unadorned,PhysicalFormat::Sectors,SectorOrder::Physical) if len==img::dsk::D13_LEN => Ok(()),
        (FileFormat::Unadorned,PhysicalFormat::Sectors,SectorOrder::ProDOS) => match whole_blocks {
            true => Ok(()),
            false => bad("length is not a whole number of blocks")
        },
        (FileFormat::Unadorned,PhysicalFormat::Sectors,SectorOrder::DOS | SectorOrder::CPM | SectorOrder::Physical) => match sixteen {
            true => Ok(()),
            false => bad("order needs whole 16 sector tracks")
        },
        (FileFormat::Unadorned,PhysicalFormat::Nib525_6656,SectorOrder::Physical) if len==nib_len(img::nib::TRACK_BYTE_CAPACITY_NIB,img::nib::TRACKS) => Ok(()),
        (FileFormat::Unadorned,PhysicalFormat::Nib525_6384,SectorOrder::Physical) if len==nib_len(img::nib::TRACK_BYTE_CAPACITY_NB2,img::nib::TRACKS) => Ok(()),
        (FileFormat::TwoMG,PhysicalFormat::Sectors,SectorOrder::ProDOS) if whole_blocks => Ok(()),
        (FileFormat::TwoMG,PhysicalFormat::Sectors,SectorOrder::DOS) if sixteen => Ok(()),
        (FileFormat::TwoMG,PhysicalFormat::Nib525_6656,SectorOrder::Physical) if len==nib_len(img::nib::TRACK_BYTE_CAPACITY_NIB,img::nib::TRACKS) => Ok(()),
        (FileFormat::DiskCopy42,PhysicalFormat::Sectors,SectorOrder::ProDOS) if len==img::dc42::DATA_LEN_800K as u64 => Ok(()),
        (FileFormat::Sim2eHDV,PhysicalFormat::Sectors,SectorOrder::ProDOS) if whole_blocks && len/BLOCK_SIZE as u64 <= 0xffff => Ok(()),
        (FileFormat::TrackStar,PhysicalFormat::Nib525_Var,SectorOrder::Physical) if len==nib_len(img::trackstar::RECORD_LEN,img::trackstar::TRACKS) => Ok(()),
        (FileFormat::DDD,PhysicalFormat::Sectors,SectorOrder::DOS) if len==143360 => Ok(()),
        (FileFormat::NuFX,PhysicalFormat::Sectors,SectorOrder::ProDOS) if whole_blocks => Ok(()),
        (FileFormat::FDI,_,_) => Err(Error::Unsupported("FDI images cannot be created".to_string())),
        _ => bad("not a legal combination")
    }
}

pub struct DiskImg {
    core: Rc<RefCell<Core>>,
    config: ImgConfig,
    state: ImgState,
    outer_format: OuterFormat,
    file_format: FileFormat,
    physical: PhysicalFormat,
    image_order: SectorOrder,
    fs_order: SectorOrder,
    fs_format: FsFormat,
    geometry: Geometry,
    nibble_desc: Option<NibbleDescriptor>,
    bad_blocks: Option<BitVec>,
    notes: Vec<String>,
    read_only: bool,
    damaged: bool,
    dos_volume: Option<u8>,
    ext: String,
    /// track offset when two logical tracks share a physical track
    pairing: Option<usize>,
    /// block-only geometry replaced by a track view while pairing is on
    unpaired_geometry: Option<Geometry>
}

impl DiskImg {
    fn from_core(core: Core,config: ImgConfig) -> Self {
        Self {
            core: Rc::new(RefCell::new(core)),
            config,
            state: ImgState::WrapperIdentified,
            outer_format: OuterFormat::None,
            file_format: FileFormat::Unknown,
            physical: PhysicalFormat::Unknown,
            image_order: SectorOrder::Unknown,
            fs_order: SectorOrder::Unknown,
            fs_format: FsFormat::Unknown,
            geometry: Geometry::none(),
            nibble_desc: None,
            bad_blocks: None,
            notes: Vec::new(),
            read_only: false,
            damaged: false,
            dos_volume: None,
            ext: String::new(),
            pairing: None,
            unpaired_geometry: None
        }
    }
    /// Identify the image in `length` bytes of `root`
    fn open_source(root: SharedSource,length: u64,name: &str,read_only: bool,config: ImgConfig) -> Result<Self,Error> {
        let id = identify::identify(&root,length,name,read_only)?;
        let prep = id.prepared;
        let mut read_only = read_only || prep.force_read_only || prep.flat.borrow().read_only();
        let mut notes = prep.notes;
        if id.ext==identify::RAW_VOLUME_TAG && !read_only && !config.allow_physical_write {
            warn!("physical volume writes are not enabled");
            notes.push("physical volume opened read-only".to_string());
            read_only = true;
        }
        let core = Core {
            flat: Some(prep.flat),
            flat_len: prep.length,
            dirty: false,
            parent: None,
            chain: Some(Chain {
                root,
                outer: id.outer,
                inner_name: id.inner_name,
                wrapped: id.wrapped,
                wrapper: id.wrapper
            })
        };
        let mut ans = Self::from_core(core,config);
        ans.outer_format = id.outer;
        ans.file_format = ans.with_wrapper(|w| w.what_am_i()).unwrap_or(FileFormat::Unknown);
        ans.physical = prep.physical;
        ans.image_order = prep.order;
        ans.dos_volume = prep.dos_volume;
        ans.bad_blocks = prep.bad_blocks;
        ans.notes = notes;
        ans.read_only = read_only;
        ans.damaged = prep.damaged;
        ans.ext = id.ext;
        for note in &ans.notes {
            info!("note: {}",note);
        }
        Ok(ans)
    }
    /// Open an image file, peeling the outer layer and the wrapper
    pub fn open_image(path: &Path,read_only: bool,config: ImgConfig) -> Result<Self,Error> {
        let root = Source::open_file(path,read_only)?;
        let length = root.borrow().len()?;
        let name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        Self::open_source(root,length,&name,read_only,config)
    }
    /// Open a host block device or raw volume, which is taken as plain sectors
    pub fn open_volume(path: &Path,read_only: bool,config: ImgConfig) -> Result<Self,Error> {
        let root = Source::open_file(path,read_only)?;
        let length = root.borrow().len()?;
        Self::open_source(root,length,&format!("volume.{}",identify::RAW_VOLUME_TAG),read_only,config)
    }
    /// Open an image held in memory, `ext` stands in for the file extension
    pub fn open_buffer(bytes: Vec<u8>,ext: &str,read_only: bool,config: ImgConfig) -> Result<Self,Error> {
        let length = bytes.len() as u64;
        let root = Source::from_buffer(bytes,read_only);
        Self::open_source(root,length,&format!("image.{}",ext),read_only,config)
    }
    /// Open and run both analysis steps
    pub fn open_and_analyze(path: &Path,read_only: bool,config: ImgConfig) -> Result<Self,Error> {
        let mut ans = Self::open_image(path,read_only,config)?;
        ans.analyze_image()?;
        ans.analyze_image_fs()?;
        Ok(ans)
    }
    /// Create a new image file, refusing to overwrite an existing one.
    /// Sectors are zeroed, nibble tracks are formatted with empty sectors.
    pub fn create_image(path: &Path,params: &CreateParams,config: ImgConfig) -> Result<Self,Error> {
        check_combination(params)?;
        let root = Source::create_file(path)?;
        let name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        match Self::create_in(root,&name,params,config) {
            Ok(ans) => Ok(ans),
            Err(e) => {
                warn!("create failed, removing {}",path.display());
                if let Err(rm) = std::fs::remove_file(path) {
                    debug!("could not remove: {}",rm);
                }
                Err(e)
            }
        }
    }
    /// Create a new image in memory, retrieve it with `to_bytes`
    pub fn create_buffer(params: &CreateParams,config: ImgConfig) -> Result<Self,Error> {
        check_combination(params)?;
        let root = Source::from_buffer(Vec::new(),false);
        Self::create_in(root,"image",params,config)
    }
    fn create_in(root: SharedSource,name: &str,params: &CreateParams,config: ImgConfig) -> Result<Self,Error> {
        let (wrapped,inner_name) = match params.outer {
            OuterFormat::None => (root.clone(),name.to_string()),
            _ => (Source::from_buffer(Vec::new(),false),outer::strip_ext(name))
        };
        let mut wrapper = img::new_wrapper(params.format,params.physical)?;
        let spec = CreateSpec {
            length: params.length,
            physical: params.physical,
            order: params.order,
            dos_volume: params.dos_volume
        };
        let (wrapped_len,flat) = wrapper.create(&spec,&wrapped)?;
        info!("created {} wrapper, {} bytes",params.format,wrapped_len);
        if params.physical.is_nibble() {
            let desc = match params.sectors_per_track {
                13 => NibbleDescriptor::dos32_std(),
                _ => NibbleDescriptor::dos33_std()
            };
            let vol = params.dos_volume.unwrap_or(254);
            let slot = params.physical.track_slot();
            let track_len = match params.physical {
                PhysicalFormat::Nib525_Var => desc.formatted_len(),
                _ => slot
            };
            let tracks = params.length as usize / slot;
            for t in 0..tracks {
                let mut trk = tracks::format_track(&desc,vol,t as u8,track_len)?;
                if params.physical==PhysicalFormat::Nib525_Var {
                    wrapper.set_nibble_track_len(t,track_len)?;
                }
                trk.resize(slot,0xff);
                flat.borrow_mut().write_at((t*slot) as u64,&trk)?;
            }
            debug!("formatted {} tracks with {}",tracks,desc.name);
        }
        let core = Core {
            flat: Some(flat),
            flat_len: params.length,
            dirty: true,
            parent: None,
            chain: Some(Chain { root, outer: params.outer, inner_name, wrapped, wrapper })
        };
        let mut ans = Self::from_core(core,config);
        ans.outer_format = params.outer;
        ans.file_format = params.format;
        ans.physical = params.physical;
        ans.image_order = params.order;
        ans.dos_volume = params.dos_volume;
        ans.ext = identify::extension(name);
        ans.flush()?;
        ans.analyze_image()?;
        Ok(ans)
    }
    /// Build a child image over `len` bytes of this image's flat view starting at `start`.
    fn open_child(&mut self,start: u64,len: u64,geometry: Geometry,order: SectorOrder) -> Result<DiskImg,Error> {
        self.check_io()?;
        let linear = self.physical==PhysicalFormat::Sectors && (self.image_order==SectorOrder::ProDOS || self.geometry.sectors_per_track != 16);
        if !linear {
            return Err(Error::Unsupported("embedded volumes need a block ordered sector image".to_string()));
        }
        let parent_flat = self.core.borrow().flat.clone().ok_or(Error::NotOpen)?;
        let flat = Source::offset_view(&parent_flat,start,len,self.read_only)?;
        let core = Core {
            flat: Some(flat),
            flat_len: len,
            dirty: false,
            parent: Some(Rc::downgrade(&self.core)),
            chain: None
        };
        let mut child = Self::from_core(core,self.config);
        child.outer_format = OuterFormat::None;
        child.file_format = self.file_format;
        child.physical = PhysicalFormat::Sectors;
        child.image_order = order;
        child.fs_order = order;
        child.read_only = self.read_only;
        child.geometry = geometry;
        child.state = ImgState::GeometryKnown;
        child.analyze_image_fs()?;
        info!("embedded volume at byte {} length {} is {}",start,len,child.fs_format);
        Ok(child)
    }
    /// Open `count` blocks starting at `start` as an embedded volume
    pub fn open_embedded_blocks(&mut self,start: usize,count: usize) -> Result<DiskImg,Error> {
        if count==0 {
            return Err(Error::OutOfRange);
        }
        self.block_run_end(start,count)?;
        let len = (count * BLOCK_SIZE) as u64;
        let geometry = Geometry::for_sectors(len)?;
        self.open_child((start * BLOCK_SIZE) as u64,len,geometry,SectorOrder::ProDOS)
    }
    /// Open a run of tracks as an embedded volume in DOS order.
    /// Tracks are counted in units of `sectors_per_track` sectors from the start of the image.
    pub fn open_embedded_tracks(&mut self,first_track: usize,num_tracks: usize,sectors_per_track: usize) -> Result<DiskImg,Error> {
        let track_len = (sectors_per_track as u64).checked_mul(SECTOR_SIZE as u64).ok_or(Error::OutOfRange)?;
        let start = (first_track as u64).checked_mul(track_len).ok_or(Error::OutOfRange)?;
        let len = (num_tracks as u64).checked_mul(track_len).ok_or(Error::OutOfRange)?;
        let end = start.checked_add(len).ok_or(Error::OutOfRange)?;
        if num_tracks==0 || sectors_per_track==0 || end > self.core.borrow().flat_len {
            return Err(Error::OutOfRange);
        }
        self.open_child(start,len,Geometry::for_tracks(num_tracks,sectors_per_track),SectorOrder::DOS)
    }
    /// Open entry `index` of an Apple partition map as an embedded volume
    pub fn open_partition(&mut self,index: usize) -> Result<DiskImg,Error> {
        let map = fs::macpart::read_map(self)?;
        let part = map.get(index).ok_or(Error::OutOfRange)?;
        let count = usize::min(part.count,self.geometry.blocks.saturating_sub(part.start));
        debug!("partition {} `{}` of type {}",index,part.name,part.kind);
        self.open_embedded_blocks(part.start,count)
    }
    /// Work out tracks, sectors, and blocks, and the image order if the wrapper left it open
    pub fn analyze_image(&mut self) -> Result<(),Error> {
        if self.state==ImgState::Closed {
            return Err(Error::NotOpen);
        }
        let flat_len = self.core.borrow().flat_len;
        if self.physical.is_nibble() {
            let slot = self.physical.track_slot() as u64;
            let num_tracks = (flat_len / slot) as usize;
            self.nibble_desc = None;
            // track 0 is sometimes odd, so also look at the catalog track
            let mut candidates = vec![0,17];
            candidates.extend(1..num_tracks);
            for t in candidates.into_iter().filter(|t| *t < num_tracks) {
                let trk = self.read_raw_track(t)?;
                if let Some((desc,vol)) = tracks::analyze_track(&trk) {
                    info!("nibble tracks use {}, volume {}",desc.name,vol);
                    if self.dos_volume.is_none() {
                        self.dos_volume = Some(vol);
                    }
                    self.nibble_desc = Some(desc);
                    break;
                }
            }
            let spt = match &self.nibble_desc {
                Some(desc) => desc.sectors,
                None => {
                    self.notes.push("no sector format found on nibble tracks".to_string());
                    0
                }
            };
            self.geometry = Geometry::for_nibbles(num_tracks,spt);
            self.image_order = SectorOrder::Physical;
        } else {
            self.geometry = Geometry::for_sectors(flat_len)?;
            if self.image_order==SectorOrder::Unknown {
                self.image_order = geometry::default_order(&self.ext,&self.geometry);
                debug!("image order taken as {} from extension `{}`",self.image_order,self.ext);
            }
        }
        self.pairing = None;
        self.unpaired_geometry = None;
        self.fs_order = self.image_order;
        self.state = ImgState::GeometryKnown;
        Ok(())
    }
    /// Run the file system probes.  Failure to find a file system is not an error.
    pub fn analyze_image_fs(&mut self) -> Result<(),Error> {
        if self.state==ImgState::WrapperIdentified {
            self.analyze_image()?;
        }
        self.check_io()?;
        let hint = self.image_order;
        match fs::analyze(self,hint)? {
            Some((fmt,order)) => {
                if order != hint {
                    let note = format!("sector order changed from {} to {} to suit {}",hint,order,fmt);
                    info!("{}",note);
                    self.notes.push(note);
                }
                self.image_order = order;
                self.fs_format = fmt;
                self.fs_order = fmt.native_order();
                self.state = ImgState::FilesystemKnown;
            },
            None => {
                info!("no file system found");
                self.fs_format = FsFormat::Unknown;
                self.fs_order = self.image_order;
            }
        }
        Ok(())
    }
    /// Force the image order and file system, which must still pass the relaxed probe.
    pub fn override_format(&mut self,physical: PhysicalFormat,fs_format: FsFormat,order: SectorOrder) -> Result<(),Error> {
        self.check_io()?;
        if physical != self.physical {
            return Err(Error::BadArgument(format!("image is {}, not {}",self.physical,physical)));
        }
        if physical.is_nibble() && order != SectorOrder::Physical {
            return Err(Error::BadArgument("nibble images are in physical order".to_string()));
        }
        if fs_format==FsFormat::Unknown {
            self.image_order = order;
            self.fs_order = order;
            self.fs_format = FsFormat::Unknown;
            self.state = ImgState::GeometryKnown;
            return Ok(());
        }
        let probe = fs::probe_for(fs_format).ok_or(Error::FilesystemMismatch)?;
        match probe.test_fs(self,order,Leniency::Relaxed)? {
            Some(found) if found==order => {
                info!("override to {} in {} order accepted",fs_format,order);
                self.image_order = order;
                self.fs_format = fs_format;
                self.fs_order = fs_format.native_order();
                self.state = ImgState::FilesystemKnown;
                Ok(())
            },
            Some(found) => {
                debug!("{} wants {} order",fs_format,found);
                Err(Error::FilesystemMismatch)
            },
            None => Err(Error::FilesystemMismatch)
        }
    }
    /// Map each logical track onto half of a physical track.
    /// `offset` selects which of the interleaved sectors belong to this volume.
    pub fn set_sector_pairing(&mut self,enable: bool,offset: usize) -> Result<(),Error> {
        if !enable {
            self.pairing = None;
            if let Some(geometry) = self.unpaired_geometry.take() {
                self.geometry = geometry;
            }
            return Ok(());
        }
        if offset > 1 {
            return Err(Error::BadArgument(format!("pairing offset {}",offset)));
        }
        // large sector images are block-only until they are viewed as 16 sector tracks
        let track_view = match self.geometry {
            Geometry { sectors_per_track: 0, blocks: n, .. } if self.physical==PhysicalFormat::Sectors
                && n > 0 && n % blocks::BLOCKS_PER_TRACK==0 => Some(Geometry::for_tracks(n / blocks::BLOCKS_PER_TRACK,16)),
            _ => None
        };
        let candidate = track_view.unwrap_or(self.geometry);
        if candidate.sectors_per_track != 16 || candidate.tracks % 2 != 0 {
            return Err(Error::BadArgument("sector pairing needs an even number of 16 sector tracks".to_string()));
        }
        if track_view.is_some() && self.unpaired_geometry.is_none() {
            debug!("viewing {} blocks as {} tracks for pairing",self.geometry.blocks,candidate.tracks);
            self.unpaired_geometry = Some(self.geometry);
            self.geometry = candidate;
        }
        self.pairing = Some(offset);
        Ok(())
    }
    /// Push pending writes out through the wrapper and outer layer, then up to any parent.
    pub fn flush(&mut self) -> Result<(),Error> {
        if self.state==ImgState::Closed {
            return Err(Error::NotOpen);
        }
        flush_core(&self.core)
    }
    /// Flush and release the chain.  Refused while embedded volumes are open.
    pub fn close(&mut self) -> Result<(),Error> {
        if self.state==ImgState::Closed {
            return Ok(());
        }
        if Rc::weak_count(&self.core) > 0 {
            return Err(Error::StillReferenced);
        }
        if !self.read_only {
            self.flush()?;
        }
        let mut c = self.core.borrow_mut();
        c.flat = None;
        c.chain = None;
        c.parent = None;
        drop(c);
        self.state = ImgState::Closed;
        debug!("image closed");
        Ok(())
    }
    /// Bytes of the file or buffer backing the image, as of the last flush
    pub fn to_bytes(&self) -> Result<Vec<u8>,Error> {
        let root = match &self.core.borrow().chain {
            Some(chain) => chain.root.clone(),
            None => return Err(Error::Unsupported("embedded volumes have no backing file".to_string()))
        };
        let ans = root.borrow_mut().read_all()?;
        Ok(ans)
    }

    fn with_wrapper<T,F: FnOnce(&dyn ImageWrapper) -> T>(&self,f: F) -> Option<T> {
        let c = self.core.borrow();
        c.chain.as_ref().map(|chain| f(chain.wrapper.as_ref()))
    }
    fn check_open(&self) -> Result<(),Error> {
        if self.state==ImgState::Closed {
            return Err(Error::NotOpen);
        }
        if let Some(weak) = &self.core.borrow().parent {
            if weak.upgrade().is_none() {
                return Err(Error::ParentClosed);
            }
        }
        Ok(())
    }
    fn check_io(&self) -> Result<(),Error> {
        self.check_open()?;
        if self.state==ImgState::WrapperIdentified {
            return Err(Error::BadArgument("image geometry has not been analyzed".to_string()));
        }
        Ok(())
    }
    fn check_write(&self) -> Result<(),Error> {
        self.check_io()?;
        match self.read_only {
            true => Err(Error::ReadOnly),
            false => Ok(())
        }
    }
    fn flat(&self) -> Result<SharedSource,Error> {
        self.core.borrow().flat.clone().ok_or(Error::NotOpen)
    }
    fn read_flat(&self,offset: u64,len: usize) -> Result<Vec<u8>,Error> {
        let mut buf = vec![0;len];
        self.flat()?.borrow_mut().read_at(offset,&mut buf)?;
        Ok(buf)
    }
    fn write_flat(&mut self,offset: u64,dat: &[u8]) -> Result<(),Error> {
        self.flat()?.borrow_mut().write_at(offset,dat)?;
        mark_dirty(&self.core);
        Ok(())
    }
    /// Length of nibble track `track` as recorded by the wrapper
    fn nibble_track_len(&self,track: usize) -> usize {
        let slot = self.physical.track_slot();
        match self.physical {
            PhysicalFormat::Nib525_Var => self.with_wrapper(|w| w.nibble_track_len(track)).flatten().unwrap_or(slot),
            _ => slot
        }
    }
    fn read_raw_track(&self,track: usize) -> Result<Vec<u8>,Error> {
        let slot = self.physical.track_slot();
        let len = usize::min(self.nibble_track_len(track),slot);
        self.read_flat((track*slot) as u64,len)
    }
    /// Descriptor with the checks loosened, used when checksums are not strict
    fn relaxed_descriptor(desc: &NibbleDescriptor) -> NibbleDescriptor {
        match desc.encoding {
            NibbleEncoding::Gcr53 => NibbleDescriptor::dos32_patched(),
            NibbleEncoding::Gcr62 => NibbleDescriptor::dos33_patched()
        }
    }
    /// Sector number as it appears on a nibble track
    fn raw_sector(&self,sector: usize,fs_order: SectorOrder) -> usize {
        match self.geometry.sectors_per_track {
            16 => skew::to_raw(fs_order,sector),
            _ => sector
        }
    }
    /// Sector number within the image track
    fn image_sector(&self,sector: usize,image_order: SectorOrder,fs_order: SectorOrder) -> usize {
        let image_order = match image_order {
            SectorOrder::Unknown => fs_order,
            o => o
        };
        skew::image_sector(fs_order,image_order,sector,self.geometry.sectors_per_track)
    }
    fn check_ts(&self,track: usize,sector: usize) -> Result<(),Error> {
        if !self.geometry.has_sectors() || track >= self.geometry.tracks || sector >= self.geometry.sectors_per_track {
            debug!("track {} sector {} is out of range",track,sector);
            return Err(Error::OutOfRange);
        }
        Ok(())
    }
    /// Apply sector pairing, if enabled
    fn paired(&self,track: usize,sector: usize) -> Result<(usize,usize),Error> {
        match self.pairing {
            Some(offset) => {
                if track >= self.geometry.tracks / 2 || sector >= 16 {
                    return Err(Error::OutOfRange);
                }
                let [t,s] = blocks::paired_ts(track,sector,offset);
                Ok((t,s))
            },
            None => Ok((track,sector))
        }
    }
    fn read_sector_unpaired(&self,track: usize,sector: usize,image_order: SectorOrder,fs_order: SectorOrder) -> Result<Vec<u8>,Error> {
        self.check_ts(track,sector)?;
        if self.physical.is_nibble() {
            let desc = self.nibble_desc.as_ref().ok_or(Error::Nibble(NibbleError::BadTrack))?;
            let raw = self.raw_sector(sector,fs_order);
            trace!("read track {} raw sector {}",track,raw);
            let trk = self.read_raw_track(track)?;
            return match tracks::read_sector(&trk,desc,raw as u8) {
                Err(NibbleError::BadChecksum) if !self.config.strict_nibble_checksums => {
                    warn!("track {} sector {} checksum mismatch, reading anyway",track,raw);
                    Ok(tracks::read_sector(&trk,&Self::relaxed_descriptor(desc),raw as u8)?)
                },
                result => Ok(result?)
            };
        }
        let s = self.image_sector(sector,image_order,fs_order);
        trace!("read track {} sector {} at image sector {}",track,sector,s);
        self.read_flat(self.geometry.sector_offset(track,s),SECTOR_SIZE)
    }
    fn write_sector_unpaired(&mut self,track: usize,sector: usize,image_order: SectorOrder,fs_order: SectorOrder,dat: &[u8]) -> Result<(),Error> {
        self.check_ts(track,sector)?;
        let buf = img::quantize_block(dat,SECTOR_SIZE);
        if self.physical.is_nibble() {
            let desc = self.nibble_desc.clone().ok_or(Error::Nibble(NibbleError::BadTrack))?;
            let raw = self.raw_sector(sector,fs_order);
            trace!("write track {} raw sector {}",track,raw);
            let mut trk = self.read_raw_track(track)?;
            tracks::write_sector(&mut trk,&desc,raw as u8,&buf)?;
            let slot = self.physical.track_slot();
            return self.write_flat((track*slot) as u64,&trk);
        }
        let s = self.image_sector(sector,image_order,fs_order);
        trace!("write track {} sector {} at image sector {}",track,sector,s);
        self.write_flat(self.geometry.sector_offset(track,s),&buf)
    }

    /// Read a sector, `sector` is numbered the way the file system numbers it
    pub fn read_track_sector(&mut self,track: usize,sector: usize) -> Result<Vec<u8>,Error> {
        self.read_track_sector_swapped(track,sector,self.image_order,self.fs_order)
    }
    pub fn write_track_sector(&mut self,track: usize,sector: usize,dat: &[u8]) -> Result<(),Error> {
        self.write_track_sector_swapped(track,sector,self.image_order,self.fs_order,dat)
    }
    /// Read a sector as if the image were in `image_order` and the file system wanted `fs_order`
    pub fn read_track_sector_swapped(&mut self,track: usize,sector: usize,image_order: SectorOrder,fs_order: SectorOrder) -> Result<Vec<u8>,Error> {
        self.check_io()?;
        let (t,s) = self.paired(track,sector)?;
        self.read_sector_unpaired(t,s,image_order,fs_order)
    }
    pub fn write_track_sector_swapped(&mut self,track: usize,sector: usize,image_order: SectorOrder,fs_order: SectorOrder,dat: &[u8]) -> Result<(),Error> {
        self.check_write()?;
        let (t,s) = self.paired(track,sector)?;
        self.write_sector_unpaired(t,s,image_order,fs_order,dat)
    }
    fn check_block(&self,block: usize) -> Result<(),Error> {
        if block >= self.geometry.blocks {
            debug!("block {} is out of range",block);
            return Err(Error::OutOfRange);
        }
        if let Some(bad) = &self.bad_blocks {
            if bad.get(block)==Some(true) {
                return Err(Error::Nibble(NibbleError::BadTrack));
            }
        }
        Ok(())
    }
    /// Block read is linear if the image stores blocks contiguously
    fn linear_blocks(&self,image_order: SectorOrder) -> bool {
        self.physical==PhysicalFormat::Sectors && (self.geometry.sectors_per_track != 16 || matches!(image_order,SectorOrder::ProDOS | SectorOrder::Unknown))
    }
    /// Read a ProDOS block
    pub fn read_block(&mut self,block: usize) -> Result<Vec<u8>,Error> {
        self.read_block_swapped(block,self.image_order)
    }
    pub fn write_block(&mut self,block: usize,dat: &[u8]) -> Result<(),Error> {
        self.write_block_swapped(block,self.image_order,dat)
    }
    /// Read a ProDOS block as if the image were in `image_order`
    pub fn read_block_swapped(&mut self,block: usize,image_order: SectorOrder) -> Result<Vec<u8>,Error> {
        self.check_io()?;
        self.check_block(block)?;
        if self.linear_blocks(image_order) {
            return self.read_flat((block*BLOCK_SIZE) as u64,BLOCK_SIZE);
        }
        let (track,sectors) = blocks::ts_from_prodos_block(block);
        let mut ans = self.read_sector_unpaired(track,sectors[0],image_order,SectorOrder::ProDOS)?;
        ans.append(&mut self.read_sector_unpaired(track,sectors[1],image_order,SectorOrder::ProDOS)?);
        Ok(ans)
    }
    pub fn write_block_swapped(&mut self,block: usize,image_order: SectorOrder,dat: &[u8]) -> Result<(),Error> {
        self.check_write()?;
        self.check_block(block)?;
        let buf = img::quantize_block(dat,BLOCK_SIZE);
        if self.linear_blocks(image_order) {
            return self.write_flat((block*BLOCK_SIZE) as u64,&buf);
        }
        let (track,sectors) = blocks::ts_from_prodos_block(block);
        self.write_sector_unpaired(track,sectors[0],image_order,SectorOrder::ProDOS,&buf[0..SECTOR_SIZE])?;
        self.write_sector_unpaired(track,sectors[1],image_order,SectorOrder::ProDOS,&buf[SECTOR_SIZE..])
    }
    /// End of a run of blocks, or `OutOfRange` if the run leaves the disk
    fn block_run_end(&self,start: usize,count: usize) -> Result<usize,Error> {
        match start.checked_add(count) {
            Some(end) if end <= self.geometry.blocks => Ok(end),
            _ => Err(Error::OutOfRange)
        }
    }
    /// Read `count` consecutive blocks
    pub fn read_blocks(&mut self,start: usize,count: usize) -> Result<Vec<u8>,Error> {
        self.check_io()?;
        let end = self.block_run_end(start,count)?;
        let clean = match &self.bad_blocks {
            Some(bad) => (start..end).all(|b| bad.get(b)==Some(false)),
            None => true
        };
        if clean && self.linear_blocks(self.image_order) {
            return self.read_flat((start*BLOCK_SIZE) as u64,count*BLOCK_SIZE);
        }
        let mut ans = Vec::with_capacity(count*BLOCK_SIZE);
        for b in start..end {
            ans.append(&mut self.read_block(b)?);
        }
        Ok(ans)
    }
    /// Write whole blocks starting at `start`, the data is padded to a block boundary
    pub fn write_blocks(&mut self,start: usize,dat: &[u8]) -> Result<(),Error> {
        self.check_write()?;
        self.block_run_end(start,dat.len().div_ceil(BLOCK_SIZE))?;
        for (i,chunk) in dat.chunks(BLOCK_SIZE).enumerate() {
            self.write_block(start+i,chunk)?;
        }
        Ok(())
    }
    /// Read a nibble track in forward order, length is whatever the wrapper recorded
    pub fn read_nibble_track(&mut self,track: usize) -> Result<Vec<u8>,Error> {
        self.check_io()?;
        if !self.physical.is_nibble() {
            return Err(Error::Unsupported("not a nibble image".to_string()));
        }
        if track >= self.geometry.tracks {
            return Err(Error::OutOfRange);
        }
        self.read_raw_track(track)
    }
    /// Replace a nibble track.  Only variable length images accept a change of length.
    pub fn write_nibble_track(&mut self,track: usize,dat: &[u8]) -> Result<(),Error> {
        self.check_write()?;
        if !self.physical.is_nibble() {
            return Err(Error::Unsupported("not a nibble image".to_string()));
        }
        if track >= self.geometry.tracks {
            return Err(Error::OutOfRange);
        }
        let slot = self.physical.track_slot();
        if dat.len() > slot || (self.physical != PhysicalFormat::Nib525_Var && dat.len() != slot) {
            return Err(Error::BadArgument(format!("track of {} bytes does not fit",dat.len())));
        }
        if dat.iter().any(|b| b & 0x80 == 0) {
            return Err(Error::Nibble(NibbleError::InvalidByte));
        }
        if self.physical==PhysicalFormat::Nib525_Var && dat.len() != self.nibble_track_len(track) {
            let mut c = self.core.borrow_mut();
            let chain = c.chain.as_mut().ok_or(Error::Unsupported("no wrapper to record track length".to_string()))?;
            chain.wrapper.set_nibble_track_len(track,dat.len())?;
        }
        let mut buf = dat.to_vec();
        buf.resize(slot,0xff);
        self.write_flat((track*slot) as u64,&buf)
    }
    /// Try to read every block in a range.  Returns the blocks that failed.
    /// `progress` gets (done,total) and can cancel by returning false.
    pub fn check_for_bad_blocks<F>(&mut self,first: usize,count: usize,mut progress: F) -> Result<Vec<usize>,Error>
    where F: FnMut(u64,u64) -> bool {
        self.check_io()?;
        let end = self.block_run_end(first,count)?;
        let mut ans = Vec::new();
        for (done,b) in (first..end).enumerate() {
            match self.read_block(b) {
                Ok(_) => {},
                Err(Error::Io(e)) => return Err(Error::Io(e)),
                Err(e) => {
                    debug!("block {}: {}",b,e);
                    ans.push(b);
                }
            }
            if !progress(done as u64 + 1,count as u64) {
                info!("bad block scan cancelled at block {}",b);
                return Err(Error::Cancelled);
            }
        }
        if ans.len() > 0 {
            warn!("{} unreadable blocks",ans.len());
        }
        Ok(ans)
    }

    pub fn state(&self) -> ImgState {
        self.state
    }
    pub fn outer_format(&self) -> OuterFormat {
        self.outer_format
    }
    pub fn file_format(&self) -> FileFormat {
        self.file_format
    }
    pub fn physical_format(&self) -> PhysicalFormat {
        self.physical
    }
    pub fn image_order(&self) -> SectorOrder {
        self.image_order
    }
    pub fn fs_order(&self) -> SectorOrder {
        self.fs_order
    }
    pub fn fs_format(&self) -> FsFormat {
        self.fs_format
    }
    /// Logical tracks, halved when sector pairing is on
    pub fn num_tracks(&self) -> usize {
        match self.pairing {
            Some(_) => self.geometry.tracks / 2,
            None => self.geometry.tracks
        }
    }
    pub fn sectors_per_track(&self) -> usize {
        self.geometry.sectors_per_track
    }
    pub fn num_blocks(&self) -> usize {
        self.geometry.blocks
    }
    pub fn has_blocks(&self) -> bool {
        self.geometry.has_blocks()
    }
    pub fn has_sectors(&self) -> bool {
        self.geometry.has_sectors()
    }
    pub fn dos_volume(&self) -> Option<u8> {
        self.dos_volume
    }
    pub fn nibble_descriptor(&self) -> Option<&NibbleDescriptor> {
        self.nibble_desc.as_ref()
    }
    pub fn bad_blocks(&self) -> Option<&BitVec> {
        self.bad_blocks.as_ref()
    }
    pub fn notes(&self) -> &[String] {
        &self.notes
    }
    pub fn is_dirty(&self) -> bool {
        self.core.borrow().dirty
    }
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }
    pub fn is_damaged(&self) -> bool {
        self.damaged
    }
    pub fn is_embedded(&self) -> bool {
        self.core.borrow().parent.is_some()
    }
    /// Length of the flat view in bytes
    pub fn data_len(&self) -> u64 {
        self.core.borrow().flat_len
    }
}

impl Drop for DiskImg {
    fn drop(&mut self) {
        if self.state==ImgState::Closed || self.read_only || !self.is_dirty() {
            return;
        }
        if let Err(e) = flush_core(&self.core) {
            warn!("flush on drop failed: {}",e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank(format: FileFormat,order: SectorOrder,blocks: usize) -> DiskImg {
        DiskImg::create_buffer(&CreateParams::sectors(format,order,blocks),ImgConfig::default()).expect("create")
    }

    #[test]
    fn illegal_combinations() {
        let cfg = ImgConfig::default();
        let mut p = CreateParams::sectors(FileFormat::DiskCopy42,SectorOrder::DOS,1600);
        assert!(DiskImg::create_buffer(&p,cfg).is_err());
        p.format = FileFormat::DDD;
        assert!(DiskImg::create_buffer(&p,cfg).is_err());
        let p = CreateParams::sectors(FileFormat::FDI,SectorOrder::Physical,280);
        assert!(matches!(DiskImg::create_buffer(&p,cfg),Err(Error::Unsupported(_))));
        let p = CreateParams::sectors(FileFormat::Unadorned,SectorOrder::DOS,1600);
        assert!(DiskImg::create_buffer(&p,cfg).is_err());
    }

    #[test]
    fn dos_order_sector_lands_in_place() {
        let mut disk = blank(FileFormat::Unadorned,SectorOrder::DOS,280);
        disk.write_track_sector(1,14,&[0xaa;256]).expect("write");
        // read back as a ProDOS block: DOS sector 14 is ProDOS sector 1, second half of block 8
        let blk = disk.read_block(8).expect("read");
        assert_eq!(blk[256..],[0xaa;256]);
        assert_eq!(blk[0..256],[0;256]);
        disk.flush().expect("flush");
        let bytes = disk.to_bytes().expect("bytes");
        assert_eq!(bytes[4096+14*256],0xaa);
    }

    #[test]
    fn prodos_order_blocks_are_linear() {
        let mut disk = blank(FileFormat::Unadorned,SectorOrder::ProDOS,280);
        disk.write_blocks(2,&[0x55;1024]).expect("write");
        assert_eq!(disk.read_blocks(2,2).expect("read"),vec![0x55;1024]);
        assert_eq!(disk.read_track_sector_swapped(0,4,SectorOrder::ProDOS,SectorOrder::ProDOS).expect("read"),vec![0x55;256]);
        assert!(disk.read_block(280).is_err());
    }

    #[test]
    fn pairing_needs_even_tracks() {
        let mut disk = blank(FileFormat::Unadorned,SectorOrder::DOS,280);
        assert!(disk.set_sector_pairing(true,0).is_err());
        let mut disk = blank(FileFormat::Unadorned,SectorOrder::DOS,320);
        disk.set_sector_pairing(true,1).expect("pairing");
        assert_eq!(disk.num_tracks(),20);
        disk.write_track_sector(3,7,&[1;256]).expect("write");
        disk.set_sector_pairing(false,0).expect("pairing");
        assert_eq!(disk.read_track_sector(6,15).expect("read"),vec![1;256]);
    }

    #[test]
    fn pairing_an_800k_image() {
        let mut disk = blank(FileFormat::Unadorned,SectorOrder::ProDOS,1600);
        assert_eq!(disk.num_tracks(),0);
        disk.set_sector_pairing(true,0).expect("pairing");
        assert_eq!(disk.num_tracks(),100);
        assert_eq!(disk.sectors_per_track(),16);
        assert_eq!(disk.num_blocks(),1600);
        disk.write_track_sector_swapped(70,9,SectorOrder::ProDOS,SectorOrder::ProDOS,&[0x5a;256]).expect("write");
        assert!(disk.read_track_sector(100,0).is_err());
        disk.set_sector_pairing(false,0).expect("pairing");
        assert_eq!(disk.num_tracks(),0);
        assert_eq!(disk.sectors_per_track(),0);
        // logical T70 S9 is physical T141 S2, the first half of block 1129
        assert_eq!(blocks::paired_ts(70,9,0),[141,2]);
        assert_eq!(disk.read_block(141*8 + 1).expect("read")[0..256],[0x5a;256]);
    }

    #[test]
    fn state_follows_analysis() {
        let mut disk = DiskImg::open_buffer(vec![0;143360],"po",false,ImgConfig::default()).expect("open");
        assert_eq!(disk.state(),ImgState::WrapperIdentified);
        disk.analyze_image_fs().expect("analyze");
        // nothing to find on a blank disk
        assert_eq!(disk.state(),ImgState::GeometryKnown);
        assert_eq!(disk.state().to_string(),"geometry_known");
        disk.close().expect("close");
        assert_eq!(disk.state(),ImgState::Closed);
    }

    #[test]
    fn huge_block_numbers_are_out_of_range() {
        let mut disk = blank(FileFormat::Unadorned,SectorOrder::ProDOS,280);
        assert!(matches!(disk.read_blocks(usize::MAX,2),Err(Error::OutOfRange)));
        assert!(matches!(disk.write_blocks(usize::MAX,&[0;1024]),Err(Error::OutOfRange)));
        assert!(matches!(disk.check_for_bad_blocks(usize::MAX,2,|_,_| true),Err(Error::OutOfRange)));
        assert!(matches!(disk.open_embedded_blocks(usize::MAX,2),Err(Error::OutOfRange)));
        assert!(matches!(disk.open_embedded_tracks(usize::MAX,2,16),Err(Error::OutOfRange)));
        assert!(matches!(disk.open_embedded_tracks(0,usize::MAX,usize::MAX),Err(Error::OutOfRange)));
        assert!(matches!(disk.read_blocks(279,2),Err(Error::OutOfRange)));
        assert_eq!(disk.read_blocks(279,1).expect("read").len(),512);
    }

    #[test]
    fn child_writes_dirty_the_parent() {
        let mut parent = blank(FileFormat::Unadorned,SectorOrder::ProDOS,1600);
        assert!(!parent.is_dirty());
        let mut child = parent.open_embedded_blocks(800,800).expect("child");
        child.write_block(0,&[0x42;512]).expect("write");
        assert!(parent.is_dirty());
        assert!(matches!(parent.close(),Err(Error::StillReferenced)));
        child.flush().expect("flush");
        assert!(!parent.is_dirty());
        drop(child);
        assert_eq!(parent.read_block(800).expect("read"),vec![0x42;512]);
        parent.close().expect("close");
        assert!(matches!(parent.read_block(0),Err(Error::NotOpen)));
    }

    #[test]
    fn scan_can_be_cancelled() {
        let mut disk = blank(FileFormat::Unadorned,SectorOrder::ProDOS,280);
        assert_eq!(disk.check_for_bad_blocks(0,280,|_,_| true).expect("scan"),Vec::<usize>::new());
        let mut calls = 0;
        let result = disk.check_for_bad_blocks(0,280,|done,_| {
            calls += 1;
            done < 10
        });
        assert!(matches!(result,Err(Error::Cancelled)));
        assert_eq!(calls,10);
    }

    #[test]
    fn nibble_sectors_round_trip() {
        let p = CreateParams::nibbles(FileFormat::Unadorned,PhysicalFormat::Nib525_6656);
        let mut disk = DiskImg::create_buffer(&p,ImgConfig::default()).expect("create");
        assert_eq!(disk.sectors_per_track(),16);
        assert_eq!(disk.dos_volume(),Some(254));
        disk.write_block(5,&[0x77;512]).expect("write");
        assert_eq!(disk.read_block(5).expect("read"),vec![0x77;512]);
        let trk = disk.read_nibble_track(0).expect("track");
        assert_eq!(trk.len(),6656);
    }
}
