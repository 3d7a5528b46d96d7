//! ## Apple DOS 3.3 allocation strategy
//!
//! The VTOC on track 17 holds the free sector bitmap (a set bit means
//! free) and points at the first catalog sector; catalog sectors chain
//! through their second and third bytes.  A file is reached through one or
//! more track-sector list sectors, each holding up to 122 data sector
//! pairs.  List sectors are carried in the group list with a nonzero
//! division so readers can skip them.

use crate::STDRESULT;
use crate::img::Disk;
use crate::fs::Error;
use crate::fs::attr::FileAttr;
use crate::fs::diritem::ops_for;
use crate::fs::group::{FatAvail,GroupItem,GroupList};
use crate::fs::param::{BasicParam,FormatKind};
use super::{BasicType,FatBuffer};

const CATALOG_TRACK_OFF: usize = 1;
const CATALOG_SECTOR_OFF: usize = 2;
const PAIRS_OFF: usize = 0x0c;
const PAIRS_PER_SECTOR: usize = 122;
const BITMAP_OFF: usize = 0x38;
const VTOC_TRACKS_OFF: usize = 0x34;
const VTOC_SECTORS_OFF: usize = 0x35;
const DIR_TRACK: u8 = 17;

fn composite(track: u8,sector: u8) -> usize {
    ((track as usize) << 8) | sector as usize
}

pub struct AppleDosType;

impl AppleDosType {
    pub fn new() -> Self {
        Self
    }
    fn bit_pos(track: u8,sector: u8) -> (usize,u8) {
        let idx = BITMAP_OFF + track as usize*4 + match sector >= 8 {
            true => 0,
            false => 1
        };
        (idx,1 << (sector%8))
    }
    fn bitmap_free(fat: &FatBuffer,track: u8,sector: u8) -> bool {
        let (idx,mask) = Self::bit_pos(track,sector);
        match fat.data.get(idx) {
            Some(b) => b & mask != 0,
            None => false
        }
    }
    fn bitmap_set(fat: &mut FatBuffer,track: u8,sector: u8,free: bool) {
        let (idx,mask) = Self::bit_pos(track,sector);
        if let Some(b) = fat.data.get_mut(idx) {
            match free {
                true => *b |= mask,
                false => *b &= !mask
            }
            fat.dirty = true;
        }
    }
    /// walk the track-sector list chain gathering list and data sectors
    fn walk_ts_lists(&self,disk: &Disk,param: &BasicParam,start: usize) -> Result<GroupList,Error> {
        let mut list = GroupList::new();
        let mut g = start;
        let mut lists = 0;
        while g != 0 {
            let (t,s) = ((g >> 8) as u8,(g & 0xff) as u8);
            if t as usize >= param.tracks || s as usize >= param.sectors {
                return Err(Error::BrokenChain);
            }
            if list.contains_group(g) || lists > param.fat_end_group {
                return Err(Error::BrokenChain);
            }
            lists += 1;
            let data = disk.sector_data(t,0,s).ok_or(Error::SectorAccess)?.to_vec();
            let mut item = GroupItem::new(g,0,t,0,s,s,param.sector_size);
            item.division = 1;
            list.push(item);
            for pair in 0..PAIRS_PER_SECTOR {
                let off = PAIRS_OFF + pair*2;
                let (dt,ds) = (data[off],data[off+1]);
                if dt==0 && ds==0 {
                    break;
                }
                if dt as usize >= param.tracks || ds as usize >= param.sectors {
                    return Err(Error::BrokenChain);
                }
                let dg = composite(dt,ds);
                if list.contains_group(dg) {
                    return Err(Error::BrokenChain);
                }
                list.push(GroupItem::new(dg,0,dt,0,ds,ds,param.sector_size));
            }
            g = composite(data[CATALOG_TRACK_OFF],data[CATALOG_SECTOR_OFF]);
        }
        Ok(list)
    }
}

impl BasicType for AppleDosType {
    fn kind(&self) -> FormatKind {
        FormatKind::AppleDos
    }
    fn group_number(&self,_fat: &FatBuffer,param: &BasicParam,_num: usize) -> usize {
        param.group_unused_code
    }
    fn set_group_number(&self,_fat: &mut FatBuffer,_param: &BasicParam,_num: usize,_val: usize) {
    }
    fn empty_group_number(&mut self,_disk: &Disk,fat: &FatBuffer,param: &BasicParam) -> Option<usize> {
        for t in 0..param.tracks as u8 {
            if t==DIR_TRACK {
                continue;
            }
            for s in 0..param.sectors as u8 {
                if Self::bitmap_free(fat,t,s) {
                    return Some(composite(t,s));
                }
            }
        }
        None
    }
    fn calc_disk_free_size(&mut self,_disk: &Disk,fat: &FatBuffer,param: &BasicParam,live: &[GroupList]) -> Vec<FatAvail> {
        let mut ans = Vec::with_capacity(param.tracks*param.sectors);
        for t in 0..param.tracks as u8 {
            for s in 0..param.sectors as u8 {
                ans.push(match (t==DIR_TRACK,Self::bitmap_free(fat,t,s)) {
                    (true,_) => FatAvail::System,
                    (_,true) => FatAvail::Free,
                    (_,false) => FatAvail::Used
                });
            }
        }
        for list in live {
            if let Some(g) = list.items().last() {
                let idx = g.track as usize*param.sectors + g.sector_start as usize;
                if idx < ans.len() && ans[idx]==FatAvail::Used {
                    ans[idx] = FatAvail::UsedLast;
                }
            }
        }
        ans
    }
    fn unit_groups(&self,disk: &Disk,_fat: &FatBuffer,param: &BasicParam,rec: &[u8],unit: usize) -> Result<GroupList,Error> {
        match ops_for(self.kind()).start_group(rec,unit) {
            Some(start) => self.walk_ts_lists(disk,param,start),
            None => Ok(GroupList::new())
        }
    }
    /// one list sector followed by the data sectors; files needing more
    /// than one list sector are declined
    fn allocate_unit_groups(&mut self,_disk: &Disk,fat: &mut FatBuffer,param: &BasicParam,_unit: usize,data_size: usize) -> Result<GroupList,Error> {
        let sectors = 1.max((data_size + param.sector_size - 1)/param.sector_size);
        if sectors > PAIRS_PER_SECTOR {
            return Err(Error::Unsupported);
        }
        let mut taken: Vec<(u8,u8)> = Vec::with_capacity(sectors+1);
        'outer: for t in 0..param.tracks as u8 {
            if t==DIR_TRACK {
                continue;
            }
            for s in 0..param.sectors as u8 {
                if Self::bitmap_free(fat,t,s) && !taken.contains(&(t,s)) {
                    taken.push((t,s));
                    if taken.len()==sectors+1 {
                        break 'outer;
                    }
                }
            }
        }
        if taken.len() < sectors+1 {
            return Err(Error::DiskFull);
        }
        let mut list = GroupList::new();
        for (i,(t,s)) in taken.iter().enumerate() {
            Self::bitmap_set(fat,*t,*s,false);
            let mut item = GroupItem::new(composite(*t,*s),0,*t,0,*s,*s,param.sector_size);
            if i==0 {
                item.division = 1;
            }
            list.push(item);
        }
        Ok(list)
    }
    fn check_fat(&self,_disk: &Disk,fat: &FatBuffer,param: &BasicParam) -> f64 {
        if fat.data.len() <= BITMAP_OFF {
            return -1.0;
        }
        let mut score = 0;
        if fat.data[VTOC_TRACKS_OFF] as usize==param.tracks {
            score += 1;
        }
        if fat.data[VTOC_SECTORS_OFF] as usize==param.sectors {
            score += 1;
        }
        if (fat.data[CATALOG_TRACK_OFF] as usize) < param.tracks {
            score += 1;
        }
        2.0*score as f64/3.0 - 1.0
    }
    fn check_root_directory(&self,disk: &Disk,param: &BasicParam) -> f64 {
        match self.directory_sectors(disk,param) {
            Ok(sectors) if !sectors.is_empty() => 1.0,
            _ => -1.0
        }
    }
    /// catalog sectors chain from the VTOC pointer
    fn directory_sectors(&self,disk: &Disk,param: &BasicParam) -> Result<Vec<(u8,u8,u8)>,Error> {
        let (vt,_,vs) = param.lsn_to_chs(param.fat_start_lsn);
        let vtoc = disk.sector_data(vt,0,vs).ok_or(Error::SectorAccess)?;
        let mut t = vtoc[CATALOG_TRACK_OFF];
        let mut s = vtoc[CATALOG_SECTOR_OFF];
        let mut ans = Vec::new();
        while t != 0 {
            if t as usize >= param.tracks || s as usize >= param.sectors {
                return Err(Error::BrokenChain);
            }
            if ans.contains(&(t,0,s)) || ans.len() > param.sectors {
                return Err(Error::BrokenChain);
            }
            let data = disk.sector_data(t,0,s).ok_or(Error::SectorAccess)?;
            ans.push((t,0,s));
            t = data[CATALOG_TRACK_OFF];
            s = data[CATALOG_SECTOR_OFF];
        }
        match ans.is_empty() {
            true => Err(Error::BrokenChain),
            false => Ok(ans)
        }
    }
    /// list sectors are bookkeeping, only data sectors carry payload
    fn read_file(&self,disk: &Disk,_param: &BasicParam,groups: &GroupList) -> Result<Vec<u8>,Error> {
        let mut ans = Vec::new();
        for g in groups.items() {
            if g.division != 0 {
                continue;
            }
            let data = disk.sector_data(g.track,g.side,g.sector_start).ok_or(Error::SectorAccess)?;
            ans.extend_from_slice(data);
        }
        Ok(ans)
    }
    fn write_file(&self,disk: &mut Disk,param: &BasicParam,groups: &GroupList,data: &[u8],_attr: FileAttr) -> STDRESULT {
        let items = groups.items();
        let (ts_list,payload) = match items.split_first() {
            Some(split) => split,
            None => return Err(Error::SectorAccess.into())
        };
        let list_sec = disk.sector_data_mut(ts_list.track,ts_list.side,ts_list.sector_start)
            .ok_or(Error::SectorAccess)?;
        list_sec.fill(0);
        for (i,g) in payload.iter().enumerate() {
            list_sec[PAIRS_OFF + i*2] = g.track;
            list_sec[PAIRS_OFF + i*2 + 1] = g.sector_start;
        }
        let mut pos = 0;
        for g in payload {
            let sec = disk.sector_data_mut(g.track,g.side,g.sector_start).ok_or(Error::SectorAccess)?;
            let take = param.sector_size.min(data.len().saturating_sub(pos));
            sec[0..take].copy_from_slice(&data[pos..pos+take]);
            sec[take..].fill(0);
            pos += take;
        }
        Ok(())
    }
    fn free_groups(&mut self,fat: &mut FatBuffer,_param: &BasicParam,groups: &GroupList) {
        for g in groups.items() {
            Self::bitmap_set(fat,g.track,g.sector_start,true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitmap_layout_matches_dos33() {
        let mut fat = FatBuffer { data: vec![0;256], dirty: false };
        AppleDosType::bitmap_set(&mut fat,2,15,true);
        AppleDosType::bitmap_set(&mut fat,2,0,true);
        assert_eq!(fat.data[BITMAP_OFF + 8],0x80);
        assert_eq!(fat.data[BITMAP_OFF + 9],0x01);
        assert!(AppleDosType::bitmap_free(&fat,2,15));
        assert!(!AppleDosType::bitmap_free(&fat,2,14));
    }
}
