//! ## CP/M allocation strategy
//!
//! There is no allocation table on disk: the block allocation map inside
//! each directory extent is the only record of what is used.  The strategy
//! therefore keeps the availability array from the last
//! `calc_disk_free_size` pass and allocates out of it.  Block 0 starts at
//! the directory, blocks 0 and 1 are the directory itself.

use crate::img::Disk;
use crate::fs::Error;
use crate::fs::diritem::cpm::{MAP_LEN,MAP_OFF};
use crate::fs::group::{FatAvail,GroupItem,GroupList};
use crate::fs::param::{BasicParam,FormatKind};
use super::{directory_confidence,BasicType,FatBuffer};

const DIR_BLOCKS: usize = 2;

pub struct CpmType {
    avail: Vec<FatAvail>
}

impl CpmType {
    pub fn new() -> Self {
        Self { avail: Vec::new() }
    }
    fn block_extent(&self,param: &BasicParam,block: usize,next: usize) -> GroupItem {
        let (t,s,r0,r1) = self.sector_range(param,block,next);
        GroupItem::new(block,next,t,s,r0,r1,(r1-r0+1) as usize*param.sector_size)
    }
}

impl BasicType for CpmType {
    fn kind(&self) -> FormatKind {
        FormatKind::Cpm
    }
    fn group_number(&self,_fat: &FatBuffer,param: &BasicParam,_num: usize) -> usize {
        param.group_unused_code
    }
    fn set_group_number(&self,_fat: &mut FatBuffer,_param: &BasicParam,_num: usize,_val: usize) {
    }
    fn empty_group_number(&mut self,_disk: &Disk,_fat: &FatBuffer,_param: &BasicParam) -> Option<usize> {
        self.avail.iter().position(|a| *a==FatAvail::Free)
    }
    fn calc_disk_free_size(&mut self,_disk: &Disk,_fat: &FatBuffer,param: &BasicParam,live: &[GroupList]) -> Vec<FatAvail> {
        let mut ans = vec![FatAvail::Free;param.fat_end_group+1];
        for b in 0..DIR_BLOCKS {
            ans[b] = FatAvail::System;
        }
        for list in live {
            for (i,g) in list.items().iter().enumerate() {
                if g.group < ans.len() {
                    ans[g.group] = match i+1==list.len() {
                        true => FatAvail::UsedLast,
                        false => FatAvail::Used
                    };
                }
            }
        }
        self.avail = ans.clone();
        ans
    }
    /// the allocation map is sixteen single byte block numbers in the
    /// extent record, zero meaning no block
    fn unit_groups(&self,_disk: &Disk,_fat: &FatBuffer,param: &BasicParam,rec: &[u8],_unit: usize) -> Result<GroupList,Error> {
        let mut list = GroupList::new();
        for i in 0..MAP_LEN {
            let block = rec[MAP_OFF+i] as usize;
            if block==0 {
                continue;
            }
            if block > param.fat_end_group {
                return Err(Error::BrokenChain);
            }
            let next = match rec[MAP_OFF+i+1..MAP_OFF+MAP_LEN].iter().find(|b| **b != 0) {
                Some(b) => *b as usize,
                None => 0
            };
            list.push(self.block_extent(param,block,next));
        }
        Ok(list)
    }
    fn allocate_unit_groups(&mut self,disk: &Disk,fat: &mut FatBuffer,param: &BasicParam,_unit: usize,data_size: usize) -> Result<GroupList,Error> {
        if self.avail.is_empty() {
            self.calc_disk_free_size(disk,fat,param,&[]);
        }
        let blocks = 1.max((data_size + param.group_size() - 1)/param.group_size());
        if blocks > MAP_LEN {
            return Err(Error::Unsupported);
        }
        let mut taken: Vec<usize> = Vec::with_capacity(blocks);
        for _ in 0..blocks {
            match self.avail.iter().position(|a| *a==FatAvail::Free) {
                Some(b) => {
                    self.avail[b] = FatAvail::Used;
                    taken.push(b);
                },
                None => {
                    for b in taken {
                        self.avail[b] = FatAvail::Free;
                    }
                    return Err(Error::DiskFull);
                }
            }
        }
        let mut list = GroupList::new();
        for (i,b) in taken.iter().enumerate() {
            let next = match i+1==blocks {
                true => 0,
                false => taken[i+1]
            };
            list.push(self.block_extent(param,*b,next));
        }
        Ok(list)
    }
    fn check_fat(&self,_disk: &Disk,_fat: &FatBuffer,_param: &BasicParam) -> f64 {
        0.0
    }
    fn check_root_directory(&self,disk: &Disk,param: &BasicParam) -> f64 {
        directory_confidence(self.kind(),disk,param)
    }
    /// block numbers count from the directory start
    fn sector_range(&self,param: &BasicParam,group: usize,next: usize) -> (u8,u8,u8,u8) {
        let _ = next;
        let lsn = param.dir_start_lsn + group*param.sectors_per_group;
        let (t,s,r0) = param.lsn_to_chs(lsn);
        let (_,_,r1) = param.lsn_to_chs(lsn + param.sectors_per_group - 1);
        (t,s,r0,r1)
    }
    fn free_groups(&mut self,_fat: &mut FatBuffer,_param: &BasicParam,groups: &GroupList) {
        for g in groups.items() {
            if g.group < self.avail.len() {
                self.avail[g.group] = FatAvail::Free;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::param::builtin_params;

    #[test]
    fn map_bytes_become_extents() {
        let param = builtin_params().into_iter().find(|p| p.kind==FormatKind::Cpm).unwrap();
        let t = CpmType::new();
        let d = Disk::new("test",crate::img::DiskDensity::D2);
        let fat = FatBuffer { data: vec![], dirty: false };
        let mut rec = vec![0u8;32];
        rec[MAP_OFF] = 2;
        rec[MAP_OFF+1] = 3;
        rec[MAP_OFF+2] = 7;
        let list = t.unit_groups(&d,&fat,&param,&rec,0).unwrap();
        assert_eq!(list.len(),3);
        assert_eq!(list.items()[0].next,3);
        assert_eq!(list.items()[2].next,0);
        assert_eq!(list.total_size(),3*param.group_size());
    }
}
