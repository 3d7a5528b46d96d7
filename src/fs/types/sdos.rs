//! ## S-DOS allocation strategy
//!
//! There is no persisted allocation table.  Files occupy a sequential run
//! of sectors and new allocations always come from the watermark, one past
//! the highest sector any live file touches.  Freed runs below the
//! watermark are never reclaimed, they classify as leaks.  Deleting a file
//! compacts the directory by shifting the surviving records left so the
//! zero end sentinel stays in place.

use log::debug;
use crate::img::Disk;
use crate::fs::Error;
use crate::fs::dir::DirArea;
use crate::fs::diritem::ops_for;
use crate::fs::group::{FatAvail,GroupItem,GroupList};
use crate::fs::param::{BasicParam,FormatKind};
use super::{directory_confidence,BasicType,FatBuffer};

pub struct SdosType {
    watermark: usize
}

impl SdosType {
    pub fn new() -> Self {
        Self { watermark: 0 }
    }
    pub fn watermark(&self) -> usize {
        self.watermark
    }
    fn sequential_run(&self,param: &BasicParam,start: usize,sectors: usize) -> Result<GroupList,Error> {
        let mut list = GroupList::new();
        for i in 0..sectors {
            let g = start + i;
            if g > param.fat_end_group {
                return Err(Error::BrokenChain);
            }
            let next = match i+1==sectors {
                true => 0,
                false => g+1
            };
            let (t,s,r) = param.lsn_to_chs(g);
            list.push(GroupItem::new(g,next,t,s,r,r,param.sector_size));
        }
        Ok(list)
    }
}

impl BasicType for SdosType {
    fn kind(&self) -> FormatKind {
        FormatKind::Sdos
    }
    fn group_number(&self,_fat: &FatBuffer,param: &BasicParam,_num: usize) -> usize {
        param.group_unused_code
    }
    fn set_group_number(&self,_fat: &mut FatBuffer,_param: &BasicParam,_num: usize,_val: usize) {
    }
    fn empty_group_number(&mut self,_disk: &Disk,_fat: &FatBuffer,param: &BasicParam) -> Option<usize> {
        match self.watermark <= param.fat_end_group {
            true => Some(self.watermark),
            false => None
        }
    }
    fn next_empty_group_number(&mut self,_disk: &Disk,_fat: &FatBuffer,param: &BasicParam,curr: usize) -> Option<usize> {
        match curr+1 <= param.fat_end_group {
            true => Some(curr+1),
            false => None
        }
    }
    /// recomputes the watermark as a side effect
    fn calc_disk_free_size(&mut self,_disk: &Disk,_fat: &FatBuffer,param: &BasicParam,live: &[GroupList]) -> Vec<FatAvail> {
        let total = param.fat_end_group + 1;
        let mut ans = vec![FatAvail::Free;total];
        for lsn in param.dir_start_lsn..=param.dir_end_lsn {
            ans[lsn] = FatAvail::System;
        }
        let mut highest: Option<usize> = None;
        for list in live {
            for g in list.items() {
                if g.group < total {
                    ans[g.group] = match g.next {
                        0 => FatAvail::UsedLast,
                        _ => FatAvail::Used
                    };
                    highest = Some(highest.map_or(g.group,|h: usize| h.max(g.group)));
                }
            }
        }
        self.watermark = match highest {
            Some(h) => h+1,
            None => 0
        };
        // anything untouched below the watermark was freed and stays dead
        for g in 0..self.watermark {
            if ans[g]==FatAvail::Free {
                ans[g] = FatAvail::Leak;
            }
        }
        debug!("watermark at sector {}",self.watermark);
        ans
    }
    fn unit_groups(&self,_disk: &Disk,_fat: &FatBuffer,param: &BasicParam,rec: &[u8],unit: usize) -> Result<GroupList,Error> {
        let ops = ops_for(self.kind());
        let start = match ops.start_group(rec,unit) {
            Some(s) => s,
            None => return Ok(GroupList::new())
        };
        let size = ops.file_size(rec,param,&GroupList::new());
        let sectors = 1.max((size + param.sector_size - 1)/param.sector_size);
        self.sequential_run(param,start,sectors)
    }
    fn allocate_unit_groups(&mut self,_disk: &Disk,_fat: &mut FatBuffer,param: &BasicParam,_unit: usize,data_size: usize) -> Result<GroupList,Error> {
        let sectors = 1.max((data_size + param.sector_size - 1)/param.sector_size);
        if self.watermark + sectors > param.fat_end_group + 1 {
            return Err(Error::DiskFull);
        }
        let start = self.watermark;
        self.watermark += sectors;
        self.sequential_run(param,start,sectors)
    }
    fn check_fat(&self,_disk: &Disk,_fat: &FatBuffer,_param: &BasicParam) -> f64 {
        0.0
    }
    fn check_root_directory(&self,disk: &Disk,param: &BasicParam) -> f64 {
        directory_confidence(self.kind(),disk,param)
    }
    /// shift the surviving records left over the tombstone, keeping the
    /// zero sentinel at the tail
    fn on_deleted_file(&mut self,disk: &mut Disk,_fat: &mut FatBuffer,param: &BasicParam,_groups: &GroupList) {
        let ops = ops_for(self.kind());
        let sectors: Vec<(u8,u8,u8)> = (param.dir_start_lsn..=param.dir_end_lsn)
            .map(|lsn| param.lsn_to_chs(lsn)).collect();
        let area = DirArea::new(sectors,param.sector_size);
        let stream = match area.read(disk,0,area.byte_len()) {
            Some(s) => s,
            None => return
        };
        let rs = ops.record_size();
        let mut packed: Vec<u8> = Vec::with_capacity(stream.len());
        for chunk in stream.chunks_exact(rs) {
            if chunk[0] != 0xff {
                packed.extend_from_slice(chunk);
            }
        }
        packed.resize(stream.len(),0);
        area.write(disk,0,&packed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::param::builtin_params;

    fn sdos_param() -> BasicParam {
        builtin_params().into_iter().find(|p| p.kind==FormatKind::Sdos).unwrap()
    }

    fn disk() -> Disk {
        Disk::new("test",crate::img::DiskDensity::D2)
    }

    #[test]
    fn freed_space_is_never_reused() {
        let param = sdos_param();
        let d = disk();
        let mut t = SdosType::new();
        // one live file occupying sectors 10..=14, the gap below leaks
        let live = vec![t.sequential_run(&param,10,5).unwrap()];
        let avail = t.calc_disk_free_size(&d,&FatBuffer { data: vec![], dirty: false },&param,&live);
        assert_eq!(t.watermark(),15);
        assert_eq!(avail[9],FatAvail::Leak);
        assert_eq!(avail[10],FatAvail::Used);
        assert_eq!(avail[14],FatAvail::UsedLast);
        assert_eq!(avail[15],FatAvail::Free);
    }

    #[test]
    fn allocation_starts_at_watermark() {
        let param = sdos_param();
        let d = disk();
        let mut t = SdosType::new();
        let live = vec![t.sequential_run(&param,0,8).unwrap()];
        t.calc_disk_free_size(&d,&FatBuffer { data: vec![], dirty: false },&param,&live);
        let mut fat = FatBuffer { data: vec![], dirty: false };
        let list = t.allocate_unit_groups(&d,&mut fat,&param,0,3*256).unwrap();
        assert_eq!(list.first_group(),Some(8));
        assert_eq!(t.watermark(),11);
    }

    #[test]
    fn full_disk_is_detected() {
        let param = sdos_param();
        let d = disk();
        let mut t = SdosType::new();
        let live = vec![t.sequential_run(&param,0,param.fat_end_group+1).unwrap()];
        t.calc_disk_free_size(&d,&FatBuffer { data: vec![], dirty: false },&param,&live);
        let mut fat = FatBuffer { data: vec![], dirty: false };
        assert!(matches!(t.allocate_unit_groups(&d,&mut fat,&param,0,256),Err(Error::DiskFull)));
    }
}
