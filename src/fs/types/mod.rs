//! ## Per-format allocation strategies
//!
//! A `BasicType` owns everything too format specific for the engine but
//! too allocation centric for a directory entry: FAT slot encoding, free
//! group policy, availability classification, chain walking, and the
//! post-hooks run after format and delete.  Chain walks are bounded by a
//! hard iteration cap derived from the group count, the only guard against
//! corrupted tables that loop.
//!
//! Detection functions return a confidence ratio in [-1,1] rather than a
//! boolean, so multiple plausible interpretations of the same bytes can be
//! ranked.

pub mod fat8;
pub mod x1hu;
pub mod sdos;
pub mod mz;
pub mod fat12;
pub mod flex;
pub mod os9;
pub mod cpm;
pub mod c1541;
pub mod appledos;
pub mod prodos;
pub mod trsdos;
pub mod amiga;

use crate::STDRESULT;
use crate::img::Disk;
use crate::fs::Error;
use crate::fs::attr::FileAttr;
use crate::fs::diritem::DirItem;
use crate::fs::group::{FatAvail,GroupItem,GroupList};
use crate::fs::param::{BasicParam,FormatKind};

/// Working copy of the allocation table sectors.  Loaded once when the
/// engine attaches, flushed back when dirty.
pub struct FatBuffer {
    pub data: Vec<u8>,
    pub dirty: bool
}

impl FatBuffer {
    /// copy the table sectors out of the disk; formats without a persisted
    /// table get an empty buffer
    pub fn load(disk: &Disk,param: &BasicParam) -> Option<Self> {
        let mut data = Vec::new();
        for i in 0..param.fat_sectors {
            let (t,s,r) = param.lsn_to_chs(param.fat_start_lsn + i);
            data.extend_from_slice(disk.sector_data(t,s,r)?);
        }
        Some(Self { data, dirty: false })
    }
    pub fn flush(&mut self,disk: &mut Disk,param: &BasicParam) -> bool {
        if !self.dirty {
            return true;
        }
        for i in 0..param.fat_sectors {
            let (t,s,r) = param.lsn_to_chs(param.fat_start_lsn + i);
            let src = &self.data[i*param.sector_size..(i+1)*param.sector_size];
            match disk.sector_data_mut(t,s,r) {
                Some(dst) => dst.copy_from_slice(src),
                None => return false
            }
        }
        self.dirty = false;
        true
    }
}

pub trait BasicType {
    fn kind(&self) -> FormatKind;
    /// raw value of one FAT slot; formats without a persisted table return
    /// the unused sentinel
    fn group_number(&self,fat: &FatBuffer,param: &BasicParam,num: usize) -> usize;
    fn set_group_number(&self,fat: &mut FatBuffer,param: &BasicParam,num: usize,val: usize);
    /// first free group for a brand new file
    fn empty_group_number(&mut self,disk: &Disk,fat: &FatBuffer,param: &BasicParam) -> Option<usize>;
    /// next free group while extending a file; default policy restarts the
    /// plain search, formats with locality policies override
    fn next_empty_group_number(&mut self,disk: &Disk,fat: &FatBuffer,param: &BasicParam,curr: usize) -> Option<usize> {
        let _ = curr;
        self.empty_group_number(disk,fat,param)
    }
    /// rebuild the per-group availability classification by crossing the
    /// raw table against every live directory chain; this is also where
    /// sequential formats recompute their allocation watermark
    fn calc_disk_free_size(&mut self,disk: &Disk,fat: &FatBuffer,param: &BasicParam,live: &[GroupList]) -> Vec<FatAvail>;
    /// walk one file unit's allocation chain, starting from the record's
    /// start group; bounded by the group-count iteration cap
    fn unit_groups(&self,disk: &Disk,fat: &FatBuffer,param: &BasicParam,rec: &[u8],unit: usize) -> Result<GroupList,Error>;
    /// the file-write allocation loop
    fn allocate_unit_groups(&mut self,disk: &Disk,fat: &mut FatBuffer,param: &BasicParam,unit: usize,data_size: usize) -> Result<GroupList,Error>;
    /// confidence that the raw table is a plausible instance of this format
    fn check_fat(&self,disk: &Disk,fat: &FatBuffer,param: &BasicParam) -> f64;
    /// confidence that the directory region scans as this format
    fn check_root_directory(&self,disk: &Disk,param: &BasicParam) -> f64;
    /// physical sectors of the root directory, in scan order
    fn directory_sectors(&self,disk: &Disk,param: &BasicParam) -> Result<Vec<(u8,u8,u8)>,Error> {
        let _ = disk;
        Ok((param.dir_start_lsn..=param.dir_end_lsn).map(|lsn| param.lsn_to_chs(lsn)).collect())
    }
    /// track/side and sector range covered by one group; `next` matters for
    /// formats whose terminal code encodes the used sector count
    fn sector_range(&self,param: &BasicParam,group: usize,next: usize) -> (u8,u8,u8,u8) {
        let _ = next;
        let lsn = group*param.sectors_per_group;
        let (t,s,r0) = param.lsn_to_chs(lsn);
        let (_,_,r1) = param.lsn_to_chs(lsn + param.sectors_per_group - 1);
        (t,s,r0,r1)
    }
    /// gather file payload from the allocated sectors; formats with
    /// in-sector headers override
    fn read_file(&self,disk: &Disk,param: &BasicParam,groups: &GroupList) -> Result<Vec<u8>,Error> {
        let _ = param;
        let mut ans = Vec::new();
        for g in groups.items() {
            for r in g.sector_start..=g.sector_end {
                let data = disk.sector_data(g.track,g.side,r).ok_or(Error::SectorAccess)?;
                ans.extend_from_slice(data);
            }
        }
        ans.truncate(groups.total_size());
        Ok(ans)
    }
    /// stage file payload into the allocated sectors: zero padding of the
    /// partial final sector, optional EOF code injection for text files
    fn write_file(&self,disk: &mut Disk,param: &BasicParam,groups: &GroupList,data: &[u8],attr: FileAttr) -> STDRESULT {
        let mut src = data.to_vec();
        if attr.contains(FileAttr::ASCII) {
            if let Some(eof) = param.text_eof_code {
                src.push(eof);
            }
        }
        let mut pos = 0;
        for g in groups.items() {
            for r in g.sector_start..=g.sector_end {
                let sec = disk.sector_data_mut(g.track,g.side,r).ok_or(Error::SectorAccess)?;
                let take = sec.len().min(src.len().saturating_sub(pos));
                sec[0..take].copy_from_slice(&src[pos..pos+take]);
                sec[take..].fill(0);
                pos += take;
            }
        }
        Ok(())
    }
    /// release a deleted file's groups back to the table
    fn free_groups(&mut self,fat: &mut FatBuffer,param: &BasicParam,groups: &GroupList) {
        for g in groups.items() {
            self.set_group_number(fat,param,g.group,param.group_unused_code);
        }
    }
    fn on_formatted(&self,disk: &mut Disk,fat: &mut FatBuffer,param: &BasicParam) {
        let _ = disk;
        let _ = param;
        let _ = fat;
    }
    fn on_deleted_file(&mut self,disk: &mut Disk,fat: &mut FatBuffer,param: &BasicParam,groups: &GroupList) {
        let _ = disk;
        let _ = fat;
        let _ = param;
        let _ = groups;
    }
    /// where a reusable directory slot is and what counts as empty
    fn empty_dir_slot(&self,items: &[DirItem],children: &[usize]) -> Option<usize> {
        children.iter().copied().find(|idx| !items[*idx].used)
    }
    /// whether a raw FAT value is a chain terminator
    fn is_final_code(&self,param: &BasicParam,val: usize) -> bool {
        param.group_final_max > 0 && val >= param.group_final_code && val <= param.group_final_max
    }
}

/// the strategy factory, one dispatch per engine attach
pub fn type_for(kind: FormatKind) -> Box<dyn BasicType> {
    match kind {
        FormatKind::Fm | FormatKind::N88 | FormatKind::Fp | FormatKind::Dos80
            | FormatKind::Frost | FormatKind::Magical | FormatKind::Mdos
            | FormatKind::Xdos | FormatKind::Cdos | FormatKind::Tfdos
            => Box::new(fat8::Fat8Type::new(kind)),
        FormatKind::X1Hu => Box::new(x1hu::X1huType::new()),
        FormatKind::Sdos => Box::new(sdos::SdosType::new()),
        FormatKind::Mz => Box::new(mz::MzType::new()),
        FormatKind::Msdos | FormatKind::Msx => Box::new(fat12::Fat12Type::new(kind)),
        FormatKind::Flex => Box::new(flex::FlexType::new()),
        FormatKind::Os9 => Box::new(os9::Os9Type::new()),
        FormatKind::Cpm => Box::new(cpm::CpmType::new()),
        FormatKind::C1541 => Box::new(c1541::C1541Type::new()),
        FormatKind::AppleDos => Box::new(appledos::AppleDosType::new()),
        FormatKind::Prodos => Box::new(prodos::ProdosType::new()),
        FormatKind::Trsdos => Box::new(trsdos::TrsdosType::new()),
        FormatKind::Amiga => Box::new(amiga::AmigaType::new())
    }
}

/// Shared chain walk for table-backed formats.  Terminates within
/// `fat_end_group+1` iterations whatever the table contains: out of range
/// links and revisits are corruption, not grounds to hang.
pub(crate) fn walk_fat_chain(t: &dyn BasicType,fat: &FatBuffer,param: &BasicParam,start: usize) -> Result<GroupList,Error> {
    let mut list = GroupList::new();
    let mut g = start;
    for _ in 0..=param.fat_end_group {
        if g > param.fat_end_group {
            return Err(Error::BrokenChain);
        }
        if list.contains_group(g) {
            return Err(Error::BrokenChain);
        }
        let next = t.group_number(fat,param,g);
        let (track,side,r0,r1) = t.sector_range(param,g,next);
        let size = (r1 - r0 + 1) as usize*param.sector_size;
        list.push(GroupItem::new(g,next,track,side,r0,r1,size));
        if t.is_final_code(param,next) {
            return Ok(list);
        }
        if next==param.group_unused_code || next==param.group_system_code {
            return Err(Error::BrokenChain);
        }
        g = next;
    }
    Err(Error::BrokenChain)
}

/// classification straight off the raw table, the common case
pub(crate) fn classify_from_table(t: &dyn BasicType,fat: &FatBuffer,param: &BasicParam) -> Vec<FatAvail> {
    let mut ans = Vec::with_capacity(param.group_count());
    for g in param.fat_start_group..=param.fat_end_group {
        let val = t.group_number(fat,param,g);
        ans.push(match val {
            v if v==param.group_unused_code => FatAvail::Free,
            v if v==param.group_system_code => FatAvail::System,
            v if t.is_final_code(param,v) => FatAvail::UsedLast,
            v if v > param.fat_end_group => FatAvail::Missing,
            _ => FatAvail::Used
        });
    }
    ans
}

/// confidence from the fraction of FAT slots holding legal values
pub(crate) fn table_confidence(t: &dyn BasicType,fat: &FatBuffer,param: &BasicParam) -> f64 {
    let total = param.group_count();
    if total==0 || fat.data.is_empty() {
        return -1.0;
    }
    let mut valid = 0;
    for g in param.fat_start_group..=param.fat_end_group {
        let val = t.group_number(fat,param,g);
        if val==param.group_unused_code || val==param.group_system_code
            || t.is_final_code(param,val) || val <= param.fat_end_group {
            valid += 1;
        }
    }
    2.0*valid as f64/total as f64 - 1.0
}

/// confidence from the fraction of directory records that scan cleanly
pub(crate) fn directory_confidence(kind: FormatKind,disk: &Disk,param: &BasicParam) -> f64 {
    use crate::fs::dir::DirArea;
    use crate::fs::diritem::ops_for;
    let ops = ops_for(kind);
    let sectors: Vec<(u8,u8,u8)> = (param.dir_start_lsn..=param.dir_end_lsn)
        .map(|lsn| param.lsn_to_chs(lsn)).collect();
    let area = DirArea::new(sectors,param.sector_size);
    let stream = match area.read(disk,0,area.byte_len()) {
        Some(s) => s,
        None => return -1.0
    };
    let offsets = ops.record_offsets(stream.len(),param.sector_size);
    if offsets.is_empty() {
        return -1.0;
    }
    let mut valid = 0;
    let mut total = 0;
    for off in &offsets {
        if off + ops.record_size() > stream.len() {
            break;
        }
        total += 1;
        let mut last = false;
        if ops.check(&stream[*off..*off+ops.record_size()],&mut last) {
            valid += 1;
        }
        if last {
            break;
        }
    }
    match total {
        0 => -1.0,
        n => 2.0*valid as f64/n as f64 - 1.0
    }
}
