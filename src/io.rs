//! # Byte Sources
//!
//! Everything above this module reads and writes through a `Source`.
//! A source is backed by a host file, an in-memory buffer, or a window onto
//! another source.  Positions are always relative to the source's own zero,
//! so a window can be handed to code that has no idea it is a window.
//!
//! Sources are shared as `SharedSource`.  A window holds only a weak handle on
//! its parent, so the parent's owner decides when the chain goes away.

use std::cell::RefCell;
use std::fs::{File,OpenOptions};
use std::io::{Cursor,Read,Seek,SeekFrom,Write,ErrorKind};
use std::path::{Path,PathBuf};
use std::rc::{Rc,Weak};
use log::{debug,trace};

pub type SharedSource = Rc<RefCell<Source>>;

pub enum Source {
    File {
        file: File,
        path: PathBuf,
        read_only: bool
    },
    Buffer {
        cur: Cursor<Vec<u8>>,
        read_only: bool
    },
    Offset {
        parent: Weak<RefCell<Source>>,
        start: u64,
        len: u64,
        pos: u64,
        read_only: bool
    }
}

fn parent_closed() -> std::io::Error {
    std::io::Error::new(ErrorKind::NotConnected,"parent source was closed")
}

fn refuse_write() -> std::io::Error {
    std::io::Error::new(ErrorKind::PermissionDenied,"source is read-only")
}

impl Source {
    /// Open a host file.  A read-only open never touches the file's contents.
    pub fn open_file(path: &Path,read_only: bool) -> Result<SharedSource,std::io::Error> {
        let file = match read_only {
            true => File::open(path)?,
            false => OpenOptions::new().read(true).write(true).open(path)?
        };
        debug!("opened {} ({})",path.display(),match read_only { true => "read-only", false => "read-write" });
        Ok(Rc::new(RefCell::new(Self::File { file, path: path.to_path_buf(), read_only })))
    }
    /// Create a new host file, refusing to clobber an existing one.
    pub fn create_file(path: &Path) -> Result<SharedSource,std::io::Error> {
        let file = OpenOptions::new().read(true).write(true).create_new(true).open(path)?;
        debug!("created {}",path.display());
        Ok(Rc::new(RefCell::new(Self::File { file, path: path.to_path_buf(), read_only: false })))
    }
    pub fn from_buffer(buf: Vec<u8>,read_only: bool) -> SharedSource {
        Rc::new(RefCell::new(Self::Buffer { cur: Cursor::new(buf), read_only }))
    }
    /// Create a window of `len` bytes starting at `start` within `parent`.
    pub fn offset_view(parent: &SharedSource,start: u64,len: u64,read_only: bool) -> Result<SharedSource,std::io::Error> {
        let parent_len = parent.borrow().len()?;
        if start + len > parent_len {
            return Err(std::io::Error::new(ErrorKind::UnexpectedEof,"window runs past end of parent"));
        }
        let read_only = read_only || parent.borrow().read_only();
        trace!("window at {} of length {}",start,len);
        Ok(Rc::new(RefCell::new(Self::Offset { parent: Rc::downgrade(parent), start, len, pos: 0, read_only })))
    }
    pub fn read_only(&self) -> bool {
        match self {
            Self::File { read_only, .. } => *read_only,
            Self::Buffer { read_only, .. } => *read_only,
            Self::Offset { read_only, .. } => *read_only
        }
    }
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::File { path, .. } => Some(path),
            _ => None
        }
    }
    pub fn len(&self) -> Result<u64,std::io::Error> {
        match self {
            Self::File { file, .. } => {
                let meta = file.metadata()?;
                match meta.is_file() {
                    true => Ok(meta.len()),
                    // block devices report 0, so ask the device
                    false => (&*file).seek(SeekFrom::End(0))
                }
            },
            Self::Buffer { cur, .. } => Ok(cur.get_ref().len() as u64),
            Self::Offset { parent, len, .. } => match parent.upgrade() {
                Some(_) => Ok(*len),
                None => Err(parent_closed())
            }
        }
    }
    /// Truncate or extend.  Windows have a fixed length and refuse.
    pub fn set_len(&mut self,new_len: u64) -> Result<(),std::io::Error> {
        if self.read_only() {
            return Err(refuse_write());
        }
        match self {
            Self::File { file, .. } => file.set_len(new_len),
            Self::Buffer { cur, .. } => {
                cur.get_mut().resize(new_len as usize,0);
                Ok(())
            },
            Self::Offset { len, .. } => match *len == new_len {
                true => Ok(()),
                false => Err(std::io::Error::new(ErrorKind::Unsupported,"cannot resize a window"))
            }
        }
    }
    pub fn read_at(&mut self,offset: u64,buf: &mut [u8]) -> Result<(),std::io::Error> {
        self.seek(SeekFrom::Start(offset))?;
        self.read_exact(buf)
    }
    pub fn write_at(&mut self,offset: u64,buf: &[u8]) -> Result<(),std::io::Error> {
        self.seek(SeekFrom::Start(offset))?;
        self.write_all(buf)
    }
    /// Read the entire source into a vector.
    pub fn read_all(&mut self) -> Result<Vec<u8>,std::io::Error> {
        let len = self.len()? as usize;
        let mut ans = vec![0;len];
        self.read_at(0,&mut ans)?;
        Ok(ans)
    }
    /// Replace the entire contents, the length becomes `dat.len()`.
    pub fn replace_all(&mut self,dat: &[u8]) -> Result<(),std::io::Error> {
        self.set_len(dat.len() as u64)?;
        self.write_at(0,dat)?;
        self.flush()
    }
}

impl Read for Source {
    fn read(&mut self,buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Self::File { file, .. } => file.read(buf),
            Self::Buffer { cur, .. } => cur.read(buf),
            Self::Offset { parent, start, len, pos, .. } => {
                let parent = parent.upgrade().ok_or_else(parent_closed)?;
                let avail = len.saturating_sub(*pos) as usize;
                let n = usize::min(avail,buf.len());
                if n==0 {
                    return Ok(0);
                }
                let mut p = parent.borrow_mut();
                p.seek(SeekFrom::Start(*start + *pos))?;
                p.read_exact(&mut buf[0..n])?;
                *pos += n as u64;
                Ok(n)
            }
        }
    }
}

impl Write for Source {
    fn write(&mut self,buf: &[u8]) -> std::io::Result<usize> {
        if self.read_only() {
            return Err(refuse_write());
        }
        match self {
            Self::File { file, .. } => file.write(buf),
            Self::Buffer { cur, .. } => cur.write(buf),
            Self::Offset { parent, start, len, pos, .. } => {
                let parent = parent.upgrade().ok_or_else(parent_closed)?;
                if *pos + buf.len() as u64 > *len {
                    return Err(std::io::Error::new(ErrorKind::WriteZero,"write runs past end of window"));
                }
                let mut p = parent.borrow_mut();
                p.seek(SeekFrom::Start(*start + *pos))?;
                p.write_all(buf)?;
                *pos += buf.len() as u64;
                Ok(buf.len())
            }
        }
    }
    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Self::File { file, .. } => file.flush(),
            Self::Buffer { .. } => Ok(()),
            Self::Offset { parent, .. } => {
                let parent = parent.upgrade().ok_or_else(parent_closed)?;
                let mut p = parent.borrow_mut();
                p.flush()
            }
        }
    }
}

impl Seek for Source {
    fn seek(&mut self,pos: SeekFrom) -> std::io::Result<u64> {
        match self {
            Self::File { file, .. } => file.seek(pos),
            Self::Buffer { cur, .. } => cur.seek(pos),
            Self::Offset { parent, len, pos: curr, .. } => {
                if parent.upgrade().is_none() {
                    return Err(parent_closed());
                }
                let new_pos = match pos {
                    SeekFrom::Start(p) => p as i64,
                    SeekFrom::End(d) => *len as i64 + d,
                    SeekFrom::Current(d) => *curr as i64 + d
                };
                if new_pos < 0 {
                    return Err(std::io::Error::new(ErrorKind::InvalidInput,"seek before start of window"));
                }
                *curr = new_pos as u64;
                Ok(*curr)
            }
        }
    }
}

#[test]
fn window_translates_offsets() {
    let parent = Source::from_buffer((0..=255).collect(),false);
    let view = Source::offset_view(&parent,16,32,false).expect("window");
    let mut buf = [0u8;4];
    view.borrow_mut().read_at(2,&mut buf).expect("read");
    assert_eq!(buf,[18,19,20,21]);
    view.borrow_mut().write_at(0,&[0xaa]).expect("write");
    assert_eq!(parent.borrow_mut().read_all().expect("read")[16],0xaa);
    assert!(view.borrow_mut().write_at(31,&[1,2]).is_err());
}

#[test]
fn window_outlived_by_parent() {
    let parent = Source::from_buffer(vec![0;64],false);
    let view = Source::offset_view(&parent,0,64,false).expect("window");
    drop(parent);
    assert!(view.borrow().len().is_err());
}
