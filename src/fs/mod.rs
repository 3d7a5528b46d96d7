//! # File system module
//!
//! Imposes a DISK BASIC variant on an already decoded `img::Disk`.  The
//! `DiskBasic` engine owns the disk, a parameter set, a per-format
//! allocation strategy and the scanned directory tree.  Format detection
//! ranks every geometry-compatible catalog entry by the confidence its
//! strategy reports for the allocation table and the directory region.
//!
//! Nothing in here touches the container layer: by the time an engine is
//! attached the sectors are plain addressable byte buffers.

pub mod attr;
pub mod group;
pub mod param;
pub mod dir;
pub mod diritem;
pub mod types;

use chrono::Local;
use regex::Regex;
use log::{debug,info,warn,error};
use thiserror::Error as ThisError;
use crate::{DYNERR,STDRESULT};
use crate::img::Disk;
use attr::FileAttr;
use dir::Directory;
use diritem::ops_for;
use group::{FatAvail,GroupList};
use param::{BasicCatalog,BasicParam};
use types::{type_for,BasicType,FatBuffer};

#[derive(ThisError,Debug,Clone,Copy,PartialEq,Eq)]
pub enum Error {
    #[error("no file system matched the disk")]
    NoMatch,
    #[error("file not found")]
    FileNotFound,
    #[error("file already exists")]
    FileAlreadyExists,
    #[error("disk full")]
    DiskFull,
    #[error("directory full")]
    DirectoryFull,
    #[error("broken allocation chain")]
    BrokenChain,
    #[error("path too deep")]
    PathTooDeep,
    #[error("end address before start address")]
    EndAddrTooSmall,
    #[error("cannot set name")]
    CannotSetName,
    #[error("cannot export file")]
    CannotExport,
    #[error("write protected")]
    WriteProtected,
    #[error("sector not reachable")]
    SectorAccess,
    #[error("operation not supported for this file system")]
    Unsupported
}

/// Accumulates scan problems instead of throwing; the worst status wins,
/// -1 fatal, 1 warning, 0 clean.
pub struct ScanResult {
    status: i32,
    messages: Vec<String>
}

impl ScanResult {
    pub fn new() -> Self {
        Self { status: 0, messages: Vec::new() }
    }
    pub fn fatal(&mut self,msg: &str) -> i32 {
        error!("{}",msg);
        self.messages.push(msg.to_string());
        self.status = -1;
        -1
    }
    pub fn warning(&mut self,msg: &str) -> i32 {
        warn!("{}",msg);
        self.messages.push(msg.to_string());
        if self.status==0 {
            self.status = 1;
        }
        1
    }
    pub fn status(&self) -> i32 {
        self.status
    }
    pub fn messages(&self) -> &[String] {
        &self.messages
    }
}

/// most common value of an iterator, used for geometry probing
fn mode<I: Iterator<Item=usize>>(vals: I) -> Option<usize> {
    let mut counts = std::collections::BTreeMap::new();
    for v in vals {
        *counts.entry(v).or_insert(0usize) += 1;
    }
    counts.into_iter().max_by_key(|(_,n)| *n).map(|(v,_)| v)
}

/// (tracks,sides,sectors,sector_size) as the disk model presents them
fn probe_geometry(disk: &Disk) -> Option<(usize,usize,usize,usize)> {
    let tracks = disk.tracks();
    if tracks.is_empty() {
        return None;
    }
    let cyls = tracks.iter().map(|t| t.major_ch().0 as usize).max()? + 1;
    let sides = tracks.iter().map(|t| t.major_ch().1 as usize).max()? + 1;
    let sectors = mode(tracks.iter().map(|t| t.sector_count()))?;
    let sector_size = mode(tracks.iter().flat_map(|t| t.sectors().iter().map(|s| s.size())))?;
    Some((cyls,sides,sectors,sector_size))
}

/// A DISK BASIC engine bound to one disk.
pub struct DiskBasic {
    disk: Disk,
    param: BasicParam,
    strategy: Box<dyn BasicType>,
    fat: FatBuffer,
    dir: Directory,
    result: ScanResult
}

impl DiskBasic {
    /// Detect the file system and attach.  Every catalog entry whose
    /// geometry fits the disk is ranked by confidence; ties go to the
    /// earlier catalog entry.
    pub fn open(disk: Disk,catalog: &BasicCatalog) -> Result<Self,DYNERR> {
        let (tracks,sides,sectors,sector_size) = match probe_geometry(&disk) {
            Some(g) => g,
            None => return Err(Box::new(Error::NoMatch))
        };
        debug!("probed geometry {}/{}/{}/{}",tracks,sides,sectors,sector_size);
        let mut best: Option<(f64,BasicParam)> = None;
        for param in catalog.candidates(tracks,sides,sectors,sector_size) {
            let strategy = type_for(param.kind);
            let conf = match FatBuffer::load(&disk,param) {
                Some(fat) => {
                    let table = strategy.check_fat(&disk,&fat,param);
                    let root = strategy.check_root_directory(&disk,param);
                    (table + root)/2.0
                },
                None => -1.0
            };
            debug!("{} confidence {:.2}",param.name,conf);
            if conf > best.as_ref().map_or(-1.0,|b| b.0) {
                best = Some((conf,param.clone()));
            }
        }
        let param = match best {
            Some((conf,param)) if conf > 0.0 => param,
            _ => return Err(Box::new(Error::NoMatch))
        };
        Self::attach(disk,param)
    }

    /// attach without detection, the caller vouches for the parameter set
    pub fn attach(disk: Disk,param: BasicParam) -> Result<Self,DYNERR> {
        let strategy = type_for(param.kind);
        let fat = FatBuffer::load(&disk,&param).ok_or(Error::SectorAccess)?;
        let mut ans = Self {
            disk,
            param,
            strategy,
            fat,
            dir: Directory::new(),
            result: ScanResult::new()
        };
        ans.rescan()?;
        Ok(ans)
    }

    /// rebuild the directory tree and every file's allocation chains
    fn rescan(&mut self) -> STDRESULT {
        let sectors = self.strategy.directory_sectors(&self.disk,&self.param)?;
        self.result = ScanResult::new();
        let status = self.dir.assign_root(self.param.kind,&self.disk,&self.param,sectors,&mut self.result);
        if status < 0 {
            return Err(Box::new(Error::NoMatch));
        }
        let root = self.dir.root().ok_or(Error::NoMatch)?;
        let ops = ops_for(self.param.kind);
        for idx in self.dir.children_of(root).to_vec() {
            let rec = match self.dir.item(idx) {
                Some(item) if item.used => item.record().to_vec(),
                _ => continue
            };
            let mut groups = GroupList::new();
            for unit in 0..ops.unit_count(&rec) {
                match self.strategy.unit_groups(&self.disk,&self.fat,&self.param,&rec,unit) {
                    Ok(list) => {
                        for mut g in list.items().iter().cloned() {
                            if unit > 0 {
                                g.division = unit;
                            }
                            groups.push(g);
                        }
                    },
                    Err(e) => {
                        self.result.warning(&format!("allocation chain unreadable: {}",e));
                    }
                }
            }
            if let Some(item) = self.dir.item_mut(idx) {
                item.groups = groups;
            }
        }
        Ok(())
    }

    pub fn param(&self) -> &BasicParam {
        &self.param
    }
    pub fn disk(&self) -> &Disk {
        &self.disk
    }
    pub fn messages(&self) -> &[String] {
        self.result.messages()
    }
    /// detach, flushing pending directory and table writes
    pub fn into_disk(mut self) -> Disk {
        self.dir.flush(&mut self.disk);
        self.fat.flush(&mut self.disk,&self.param);
        self.disk
    }

    /// (name, attribute string, size) of every live root entry
    pub fn catalog(&self) -> Vec<(String,String,usize)> {
        let root = match self.dir.root() {
            Some(r) => r,
            None => return Vec::new()
        };
        self.dir.children_of(root).iter()
            .filter_map(|idx| self.dir.item(*idx))
            .filter(|item| item.used && item.visible)
            .map(|item| (item.file_name(),item.attr_str(),item.file_size(&self.param)))
            .collect()
    }

    /// read a file's payload, trimming to the recorded size and scanning
    /// for the text EOF code where the format calls for it
    pub fn load(&self,name: &str) -> Result<Vec<u8>,DYNERR> {
        let root = self.dir.root().ok_or(Error::NoMatch)?;
        let idx = self.dir.find_file(root,name).ok_or(Error::FileNotFound)?;
        let item = self.dir.item(idx).ok_or(Error::FileNotFound)?;
        let mut data = self.strategy.read_file(&self.disk,&self.param,&item.groups)?;
        let ops = ops_for(self.param.kind);
        let size = item.file_size(&self.param);
        if size > 0 && size < data.len() {
            data.truncate(size);
        }
        if ops.needs_eof_scan(item.file_attr()) {
            if let Some(eof) = self.param.text_eof_code {
                if let Some(pos) = data.iter().position(|b| *b==eof) {
                    data.truncate(pos);
                }
            }
        }
        Ok(data)
    }

    /// create a file; existing names are rejected, delete first to replace
    pub fn save(&mut self,name: &str,data: &[u8],attr: FileAttr) -> STDRESULT {
        if self.disk.write_protected {
            return Err(Box::new(Error::WriteProtected));
        }
        let pattern = Regex::new(r"^[\x20-\x7e&&[^*?/\\:]]+$")?;
        if name.is_empty() || !pattern.is_match(name) {
            return Err(Box::new(Error::CannotSetName));
        }
        let root = self.dir.root().ok_or(Error::NoMatch)?;
        if self.dir.find_file(root,name).is_some() {
            return Err(Box::new(Error::FileAlreadyExists));
        }
        let children = self.dir.children_of(root).to_vec();
        let slot = self.strategy.empty_dir_slot(self.dir.items(),&children)
            .ok_or(Error::DirectoryFull)?;
        let groups = self.strategy.allocate_unit_groups(&self.disk,&mut self.fat,&self.param,0,data.len())?;
        self.strategy.write_file(&mut self.disk,&self.param,&groups,data,attr)?;
        let ops = ops_for(self.param.kind);
        let stored = ops.pre_import(name,attr);
        let size = ops.round_file_size(data.len(),&self.param);
        let now = Local::now().naive_local();
        {
            let item = self.dir.item_mut(slot).ok_or(Error::DirectoryFull)?;
            item.clear_data(&self.param);
            item.set_file_name(&stored);
            item.set_file_attr(&self.param,attr);
            let param = self.param.clone();
            let rec = item.record_mut();
            ops.set_groups(rec,&groups);
            ops.set_file_size(rec,&param,size);
            if ops.has_create_datetime() {
                ops.set_create_datetime(rec,now);
            }
            if ops.has_modify_datetime() {
                ops.set_modify_datetime(rec,now);
            }
            item.used = true;
            item.groups = groups;
        }
        self.write_end_marker(slot);
        self.dir.flush(&mut self.disk);
        self.fat.flush(&mut self.disk,&self.param);
        // pick up the fresh end marker so the next slot is scannable
        self.rescan()
    }

    /// keep the end-of-directory sentinel alive in the record slot after a
    /// reused one; a cleared record doubles as the sentinel in every
    /// end-marked format
    fn write_end_marker(&mut self,slot: usize) {
        let (area_idx,offset,rec_size) = match self.dir.item(slot) {
            Some(item) if item.is_bound() => (item.area,item.offset,item.ops().record_size()),
            _ => return
        };
        let area = match self.dir.area(area_idx) {
            Some(a) => a.clone(),
            None => return
        };
        let next = offset + rec_size;
        if next + rec_size > area.byte_len() {
            return;
        }
        let ops = ops_for(self.param.kind);
        let mut blank = vec![0u8;rec_size];
        ops.clear(&mut blank,&self.param);
        let mut still_last = false;
        if ops.check_used(&blank,true) || !ops.check(&blank,&mut still_last) {
            return;
        }
        // only write over bytes that do not already scan as a record
        if let Some(existing) = area.read(&self.disk,next,rec_size) {
            let mut last = false;
            if ops.check(&existing,&mut last) && ops.check_used(&existing,true) {
                return;
            }
        }
        area.write(&mut self.disk,next,&blank);
    }

    /// tombstone the entry and release its allocation
    pub fn delete(&mut self,name: &str) -> STDRESULT {
        if self.disk.write_protected {
            return Err(Box::new(Error::WriteProtected));
        }
        let root = self.dir.root().ok_or(Error::NoMatch)?;
        let idx = self.dir.find_file(root,name).ok_or(Error::FileNotFound)?;
        let groups = match self.dir.item(idx) {
            Some(item) => {
                if item.file_attr().contains(FileAttr::READONLY) {
                    return Err(Box::new(Error::WriteProtected));
                }
                item.groups.clone()
            },
            None => return Err(Box::new(Error::FileNotFound))
        };
        if let Some(item) = self.dir.item_mut(idx) {
            let param = self.param.clone();
            item.delete(&param);
        }
        self.strategy.free_groups(&mut self.fat,&self.param,&groups);
        self.dir.flush(&mut self.disk);
        self.fat.flush(&mut self.disk,&self.param);
        self.strategy.on_deleted_file(&mut self.disk,&mut self.fat,&self.param,&groups);
        self.rescan()
    }

    /// wipe every sector and lay down a blank file system
    pub fn format(&mut self) -> STDRESULT {
        if self.disk.write_protected {
            return Err(Box::new(Error::WriteProtected));
        }
        let fill = self.param.fill_code;
        for track in self.disk.tracks_mut() {
            for sector in track.sectors_mut() {
                sector.data_mut().fill(fill);
            }
        }
        self.strategy.on_formatted(&mut self.disk,&mut self.fat,&self.param);
        self.fat.flush(&mut self.disk,&self.param);
        info!("formatted as {}",self.param.name);
        self.rescan()
    }

    /// availability of every allocation group, recomputed from the live
    /// directory chains
    pub fn availability(&mut self) -> Vec<FatAvail> {
        let root = match self.dir.root() {
            Some(r) => r,
            None => return Vec::new()
        };
        let live: Vec<GroupList> = self.dir.children_of(root).iter()
            .filter_map(|idx| self.dir.item(*idx))
            .filter(|item| item.used)
            .map(|item| item.groups.clone())
            .collect();
        self.strategy.calc_disk_free_size(&self.disk,&self.fat,&self.param,&live)
    }

    /// free bytes remaining
    pub fn free_size(&mut self) -> usize {
        let free = self.availability().iter().filter(|a| **a==FatAvail::Free).count();
        free*self.param.group_size()
    }

    /// raw field dump of one entry, for inspection tools
    pub fn inner_fields(&self,name: &str) -> Result<Vec<(String,String)>,DYNERR> {
        let root = self.dir.root().ok_or(Error::NoMatch)?;
        let idx = self.dir.find_file(root,name).ok_or(Error::FileNotFound)?;
        let item = self.dir.item(idx).ok_or(Error::FileNotFound)?;
        Ok(item.inner_fields())
    }
}
