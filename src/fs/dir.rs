//! ## Directory management
//!
//! A `DirArea` is the ordered run of physical sectors holding one
//! directory's records, addressed as a single byte stream; reads and
//! writes stitch across sector boundaries so a record may straddle them.
//! `Directory` owns a flat arena of `DirItem`s forming an index based
//! tree: the root is a synthetic invisible item, scanned entries hang off
//! it as children.  Scanning the same backing bytes twice yields the same
//! list (idempotence).

use log::{debug,trace,warn};
use crate::img::Disk;
use crate::fs::ScanResult;
use crate::fs::attr::FileAttr;
use crate::fs::diritem::{ops_for,DirItem};
use crate::fs::param::{BasicParam,FormatKind};

/// the physical sectors of one directory, in scan order
#[derive(Clone)]
pub struct DirArea {
    sectors: Vec<(u8,u8,u8)>,
    sector_size: usize
}

impl DirArea {
    pub fn new(sectors: Vec<(u8,u8,u8)>,sector_size: usize) -> Self {
        Self { sectors, sector_size }
    }
    pub fn byte_len(&self) -> usize {
        self.sectors.len()*self.sector_size
    }
    pub fn sectors(&self) -> &[(u8,u8,u8)] {
        &self.sectors
    }
    /// copy out `len` bytes at stream offset, stitching across sectors
    pub fn read(&self,disk: &Disk,offset: usize,len: usize) -> Option<Vec<u8>> {
        if offset + len > self.byte_len() {
            return None;
        }
        let mut ans = Vec::with_capacity(len);
        let mut pos = offset;
        while ans.len() < len {
            let (t,s,r) = self.sectors[pos/self.sector_size];
            let within = pos%self.sector_size;
            let take = (self.sector_size - within).min(len - ans.len());
            let data = disk.sector_data(t,s,r)?;
            ans.extend_from_slice(&data[within..within+take]);
            pos += take;
        }
        Some(ans)
    }
    /// copy in, the mirror of `read`
    pub fn write(&self,disk: &mut Disk,offset: usize,buf: &[u8]) -> bool {
        if offset + buf.len() > self.byte_len() {
            return false;
        }
        let mut written = 0;
        let mut pos = offset;
        while written < buf.len() {
            let (t,s,r) = self.sectors[pos/self.sector_size];
            let within = pos%self.sector_size;
            let take = (self.sector_size - within).min(buf.len() - written);
            match disk.sector_data_mut(t,s,r) {
                Some(data) => data[within..within+take].copy_from_slice(&buf[written..written+take]),
                None => return false
            }
            pos += take;
            written += take;
        }
        true
    }
}

pub struct Directory {
    items: Vec<DirItem>,
    areas: Vec<DirArea>,
    root: Option<usize>,
    current: usize,
    valid: bool
}

impl Directory {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            areas: Vec::new(),
            root: None,
            current: 0,
            valid: false
        }
    }
    pub fn is_valid(&self) -> bool {
        self.valid
    }
    pub fn root(&self) -> Option<usize> {
        self.root
    }
    pub fn current(&self) -> usize {
        self.current
    }
    pub fn set_current(&mut self,idx: usize) {
        if idx < self.items.len() {
            self.current = idx;
        }
    }
    pub fn items(&self) -> &[DirItem] {
        &self.items
    }
    pub fn item(&self,idx: usize) -> Option<&DirItem> {
        self.items.get(idx)
    }
    pub fn item_mut(&mut self,idx: usize) -> Option<&mut DirItem> {
        self.items.get_mut(idx)
    }
    pub fn children_of(&self,idx: usize) -> &[usize] {
        match self.items.get(idx) {
            Some(item) => &item.children,
            None => &[]
        }
    }
    pub fn area(&self,idx: usize) -> Option<&DirArea> {
        self.areas.get(idx)
    }

    /// Rebuild the whole tree from the root directory area.  The previous
    /// root is dropped and recreated, never mutated in place.
    pub fn assign_root(&mut self,kind: FormatKind,disk: &Disk,param: &BasicParam,
                       sectors: Vec<(u8,u8,u8)>,result: &mut ScanResult) -> i32 {
        self.items.clear();
        self.areas.clear();
        self.valid = false;
        let mut root = DirItem::new(kind);
        root.visible = false;
        self.items.push(root);
        self.root = Some(0);
        self.current = 0;
        let status = self.scan(kind,disk,param,sectors,0,result);
        if status >= 0 {
            self.valid = true;
        }
        status
    }

    /// Scan a sub-directory's sectors under an existing parent.  Callers
    /// run the strategy's confidence check first.
    pub fn assign(&mut self,kind: FormatKind,disk: &Disk,param: &BasicParam,
                  sectors: Vec<(u8,u8,u8)>,parent: usize,result: &mut ScanResult) -> i32 {
        if parent >= self.items.len() {
            return result.fatal("no such parent directory");
        }
        self.items[parent].children.clear();
        self.scan(kind,disk,param,sectors,parent,result)
    }

    fn scan(&mut self,kind: FormatKind,disk: &Disk,param: &BasicParam,
            sectors: Vec<(u8,u8,u8)>,parent: usize,result: &mut ScanResult) -> i32 {
        let ops = ops_for(kind);
        let area = DirArea::new(sectors,param.sector_size);
        let area_idx = self.areas.len();
        let stream = match area.read(disk,0,area.byte_len()) {
            Some(s) => s,
            None => return result.fatal("directory sectors missing from disk")
        };
        self.areas.push(area);
        let mut worst = 0;
        let mut count = 0;
        for off in ops.record_offsets(stream.len(),param.sector_size) {
            if off + ops.record_size() > stream.len() {
                break;
            }
            let rec = stream[off..off+ops.record_size()].to_vec();
            let mut last = false;
            if !ops.check(&rec,&mut last) {
                worst = result.warning(&format!("implausible directory record at {}",off));
                continue;
            }
            let mut item = DirItem::bind(kind,area_idx,off,rec);
            item.parent = Some(parent);
            let idx = self.items.len();
            trace!("dir slot {} used {}",idx,item.used);
            self.items.push(item);
            self.items[parent].children.push(idx);
            count += 1;
            if last {
                debug!("end of directory at record {}",count);
                break;
            }
        }
        debug!("scanned {} directory records",count);
        worst
    }

    /// Find a child by name.  Returns the match and the item immediately
    /// following it, which end-marker maintenance needs.
    pub fn find_name(&self,scope: usize,name: &str,case_sensitive: bool,
                     exclude: Option<usize>) -> Option<(usize,Option<usize>)> {
        let children = self.children_of(scope);
        for (i,idx) in children.iter().enumerate() {
            if Some(*idx)==exclude {
                continue;
            }
            let item = &self.items[*idx];
            if !item.used {
                continue;
            }
            let found = match case_sensitive {
                true => item.file_name()==name,
                false => item.file_name().eq_ignore_ascii_case(name)
            };
            if found {
                let following = children.get(i+1).copied();
                return Some((*idx,following));
            }
        }
        None
    }

    /// case-insensitive lookup, the common path
    pub fn find_file(&self,scope: usize,name: &str) -> Option<usize> {
        self.find_name(scope,name,false,None).map(|(idx,_)| idx)
    }

    /// find the first used child whose attributes contain the given mask
    pub fn find_file_by_attr(&self,scope: usize,mask: FileAttr,
                             exclude: Option<usize>) -> Option<(usize,Option<usize>)> {
        let children = self.children_of(scope);
        for (i,idx) in children.iter().enumerate() {
            if Some(*idx)==exclude {
                continue;
            }
            let item = &self.items[*idx];
            if item.used && item.file_attr().contains(mask) {
                return Some((*idx,children.get(i+1).copied()));
            }
        }
        None
    }

    /// Directory occupied size: entry size times entry count, not counting
    /// the trailing run of never used entries.
    pub fn calc_size(&self,scope: usize) -> usize {
        let children = self.children_of(scope);
        let mut live = children.len();
        for idx in children.iter().rev() {
            match self.items[*idx].used {
                false => live -= 1,
                true => break
            }
        }
        match children.first() {
            Some(idx) => self.items[*idx].ops().record_size()*live,
            None => 0
        }
    }

    /// write every dirty record back through its area
    pub fn flush(&mut self,disk: &mut Disk) {
        for item in &mut self.items {
            if item.is_dirty() && item.is_bound() {
                let area = &self.areas[item.area];
                if !area.write(disk,item.offset,item.record()) {
                    warn!("could not write back directory record at {}",item.offset);
                    continue;
                }
                item.clear_dirty();
            }
        }
    }
}
