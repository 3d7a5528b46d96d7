//! ## TRSDOS allocation strategy
//!
//! Space is granted in granules of five sectors, two granules per track.
//! The Granule Allocation Table holds one byte per track whose low two
//! bits mark allocated granules.  A file's extents live in its directory
//! record: a track byte plus a packed byte of first granule and contiguous
//! count.

use crate::img::Disk;
use crate::fs::Error;
use crate::fs::diritem::trsdos::{EXTENT_COUNT,EXTENT_OFF};
use crate::fs::group::{FatAvail,GroupItem,GroupList};
use crate::fs::param::{BasicParam,FormatKind};
use super::{directory_confidence,BasicType,FatBuffer};

const GRANULES_PER_TRACK: usize = 2;
const SECTORS_PER_GRANULE: u8 = 5;
const DIR_TRACK: usize = 17;

pub struct TrsdosType;

impl TrsdosType {
    pub fn new() -> Self {
        Self
    }
    fn gat_used(fat: &FatBuffer,group: usize) -> bool {
        let track = group/GRANULES_PER_TRACK;
        match fat.data.get(track) {
            Some(b) => b & (1 << (group%GRANULES_PER_TRACK)) != 0,
            None => true
        }
    }
    fn gat_set(fat: &mut FatBuffer,group: usize,used: bool) {
        let track = group/GRANULES_PER_TRACK;
        if let Some(b) = fat.data.get_mut(track) {
            match used {
                true => *b |= 1 << (group%GRANULES_PER_TRACK),
                false => *b &= !(1 << (group%GRANULES_PER_TRACK))
            }
            fat.dirty = true;
        }
    }
    fn granule_item(&self,param: &BasicParam,group: usize,next: usize) -> GroupItem {
        let (t,s,r0,r1) = self.sector_range(param,group,next);
        GroupItem::new(group,next,t,s,r0,r1,SECTORS_PER_GRANULE as usize*param.sector_size)
    }
}

impl BasicType for TrsdosType {
    fn kind(&self) -> FormatKind {
        FormatKind::Trsdos
    }
    fn group_number(&self,fat: &FatBuffer,param: &BasicParam,num: usize) -> usize {
        match Self::gat_used(fat,num) {
            true => param.group_system_code,
            false => param.group_unused_code
        }
    }
    fn set_group_number(&self,fat: &mut FatBuffer,param: &BasicParam,num: usize,val: usize) {
        Self::gat_set(fat,num,val != param.group_unused_code);
    }
    fn empty_group_number(&mut self,_disk: &Disk,fat: &FatBuffer,param: &BasicParam) -> Option<usize> {
        (param.fat_start_group..=param.fat_end_group).find(|g| {
            g/GRANULES_PER_TRACK != DIR_TRACK && !Self::gat_used(fat,*g)
        })
    }
    fn calc_disk_free_size(&mut self,_disk: &Disk,fat: &FatBuffer,param: &BasicParam,live: &[GroupList]) -> Vec<FatAvail> {
        let mut ans: Vec<FatAvail> = (0..=param.fat_end_group).map(|g| {
            match (g/GRANULES_PER_TRACK==DIR_TRACK,Self::gat_used(fat,g)) {
                (true,_) => FatAvail::System,
                (_,false) => FatAvail::Free,
                (_,true) => FatAvail::Used
            }
        }).collect();
        for list in live {
            if let Some(g) = list.items().last() {
                if g.group < ans.len() && ans[g.group]==FatAvail::Used {
                    ans[g.group] = FatAvail::UsedLast;
                }
            }
        }
        ans
    }
    /// expand the record's five extents into granules
    fn unit_groups(&self,_disk: &Disk,_fat: &FatBuffer,param: &BasicParam,rec: &[u8],_unit: usize) -> Result<GroupList,Error> {
        let mut list = GroupList::new();
        let mut runs: Vec<(usize,usize)> = Vec::new();
        for e in 0..EXTENT_COUNT {
            let off = EXTENT_OFF + e*2;
            if rec[off]==0xff {
                break;
            }
            let track = rec[off] as usize;
            let gran = (rec[off+1] >> 5) as usize;
            let count = (rec[off+1] & 0x1f) as usize + 1;
            runs.push((track*GRANULES_PER_TRACK + gran,count));
        }
        let total: usize = runs.iter().map(|r| r.1).sum();
        let mut seen = 0;
        for (start,count) in &runs {
            for i in 0..*count {
                let g = start + i;
                if g > param.fat_end_group || list.contains_group(g) {
                    return Err(Error::BrokenChain);
                }
                seen += 1;
                let next = match seen==total {
                    true => 0,
                    false => g+1
                };
                list.push(self.granule_item(param,g,next));
            }
        }
        Ok(list)
    }
    fn allocate_unit_groups(&mut self,disk: &Disk,fat: &mut FatBuffer,param: &BasicParam,_unit: usize,data_size: usize) -> Result<GroupList,Error> {
        let gran_size = SECTORS_PER_GRANULE as usize*param.sector_size;
        let granules = 1.max((data_size + gran_size - 1)/gran_size);
        let mut taken: Vec<usize> = Vec::with_capacity(granules);
        let mut curr = match self.empty_group_number(disk,fat,param) {
            Some(g) => g,
            None => return Err(Error::DiskFull)
        };
        Self::gat_set(fat,curr,true);
        taken.push(curr);
        while taken.len() < granules {
            curr = match self.next_empty_group_number(disk,fat,param,curr) {
                Some(g) => g,
                None => {
                    for g in taken {
                        Self::gat_set(fat,g,false);
                    }
                    return Err(Error::DiskFull);
                }
            };
            Self::gat_set(fat,curr,true);
            taken.push(curr);
        }
        let mut list = GroupList::new();
        for (i,g) in taken.iter().enumerate() {
            let next = match i+1==granules {
                true => 0,
                false => taken[i+1]
            };
            list.push(self.granule_item(param,*g,next));
        }
        Ok(list)
    }
    fn check_fat(&self,_disk: &Disk,fat: &FatBuffer,param: &BasicParam) -> f64 {
        if fat.data.len() < param.tracks {
            return -1.0;
        }
        // the directory track is always allocated and the granule bits
        // never exceed the two-per-track mask
        let mut valid = 0;
        for t in 0..param.tracks {
            if fat.data[t] & 0x03==fat.data[t] || fat.data[t]==0xff {
                valid += 1;
            }
        }
        let mut conf = 2.0*valid as f64/param.tracks as f64 - 1.0;
        if fat.data[DIR_TRACK] & 0x03==0x03 {
            conf = (conf + 1.0)/2.0;
        }
        conf
    }
    fn check_root_directory(&self,disk: &Disk,param: &BasicParam) -> f64 {
        directory_confidence(self.kind(),disk,param)
    }
    /// granule g sits on track g/2, sectors 1..=5 or 6..=10
    fn sector_range(&self,param: &BasicParam,group: usize,next: usize) -> (u8,u8,u8,u8) {
        let _ = next;
        let track = (group/GRANULES_PER_TRACK) as u8;
        let r0 = (group%GRANULES_PER_TRACK) as u8*SECTORS_PER_GRANULE + param.sector_base;
        (track,0,r0,r0 + SECTORS_PER_GRANULE - 1)
    }
    fn free_groups(&mut self,fat: &mut FatBuffer,_param: &BasicParam,groups: &GroupList) {
        for g in groups.items() {
            Self::gat_set(fat,g.group,false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::param::builtin_params;

    fn trs_param() -> BasicParam {
        builtin_params().into_iter().find(|p| p.kind==FormatKind::Trsdos).unwrap()
    }

    #[test]
    fn extents_expand_to_granules() {
        let param = trs_param();
        let t = TrsdosType::new();
        let d = Disk::new("test",crate::img::DiskDensity::D2);
        let fat = FatBuffer { data: vec![0;256], dirty: false };
        let mut rec = vec![0u8;32];
        for i in 0..EXTENT_COUNT {
            rec[EXTENT_OFF+i*2] = 0xff;
            rec[EXTENT_OFF+i*2+1] = 0xff;
        }
        // track 2 granule 1, three contiguous granules
        rec[EXTENT_OFF] = 2;
        rec[EXTENT_OFF+1] = (1 << 5) | 2;
        let list = t.unit_groups(&d,&fat,&param,&rec,0).unwrap();
        assert_eq!(list.len(),3);
        assert_eq!(list.first_group(),Some(5));
        assert_eq!(list.items()[2].next,0);
        assert_eq!(list.items()[1].track,3);
        assert_eq!(list.items()[1].sector_start,1);
    }

    #[test]
    fn granule_sectors_split_the_track() {
        let param = trs_param();
        let t = TrsdosType::new();
        let (track,_,r0,r1) = t.sector_range(&param,7,0);
        assert_eq!(track,3);
        assert_eq!((r0,r1),(6,10));
    }
}
