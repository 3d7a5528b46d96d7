//! ## 8 bit FAT strategy
//!
//! Shared by F-BASIC, N88-BASIC, FP-BASIC and DOS80: one byte per group,
//! a link value pointing at the next group, a terminal code carrying the
//! number of sectors used in the last group.  The terminal range is
//! tested before the unused code, since DOS80's terminal range runs into
//! its unused sentinel.

use crate::img::Disk;
use crate::fs::Error;
use crate::fs::diritem::ops_for;
use crate::fs::group::{FatAvail,GroupList};
use crate::fs::param::{BasicParam,FormatKind};
use super::{walk_fat_chain,classify_from_table,table_confidence,directory_confidence,BasicType,FatBuffer};

pub struct Fat8Type {
    kind: FormatKind
}

impl Fat8Type {
    pub fn new(kind: FormatKind) -> Self {
        Self { kind }
    }
}

impl BasicType for Fat8Type {
    fn kind(&self) -> FormatKind {
        self.kind
    }
    fn group_number(&self,fat: &FatBuffer,param: &BasicParam,num: usize) -> usize {
        match fat.data.get(num) {
            Some(v) => *v as usize,
            None => param.group_unused_code
        }
    }
    fn set_group_number(&self,fat: &mut FatBuffer,_param: &BasicParam,num: usize,val: usize) {
        if num < fat.data.len() {
            fat.data[num] = val as u8;
            fat.dirty = true;
        }
    }
    fn empty_group_number(&mut self,_disk: &Disk,fat: &FatBuffer,param: &BasicParam) -> Option<usize> {
        (param.fat_start_group..=param.fat_end_group)
            .find(|g| self.group_number(fat,param,*g)==param.group_unused_code)
    }
    fn calc_disk_free_size(&mut self,_disk: &Disk,fat: &FatBuffer,param: &BasicParam,live: &[GroupList]) -> Vec<FatAvail> {
        let mut ans = classify_from_table(self,fat,param);
        // a live chain through a free slot means the table is inconsistent
        for list in live {
            for g in list.items() {
                let idx = g.group - param.fat_start_group;
                if idx < ans.len() && ans[idx]==FatAvail::Free {
                    ans[idx] = FatAvail::Missing;
                }
            }
        }
        ans
    }
    fn unit_groups(&self,_disk: &Disk,fat: &FatBuffer,param: &BasicParam,rec: &[u8],unit: usize) -> Result<GroupList,Error> {
        match ops_for(self.kind).start_group(rec,unit) {
            Some(start) => walk_fat_chain(self,fat,param,start),
            None => Ok(GroupList::new())
        }
    }
    fn allocate_unit_groups(&mut self,disk: &Disk,fat: &mut FatBuffer,param: &BasicParam,_unit: usize,data_size: usize) -> Result<GroupList,Error> {
        let sectors = 1.max((data_size + param.sector_size - 1)/param.sector_size);
        let n_groups = (sectors + param.sectors_per_group - 1)/param.sectors_per_group;
        let mut taken: Vec<usize> = Vec::with_capacity(n_groups);
        let mut curr = match self.empty_group_number(disk,fat,param) {
            Some(g) => g,
            None => return Err(Error::DiskFull)
        };
        self.set_group_number(fat,param,curr,param.group_final_code);
        taken.push(curr);
        for _ in 1..n_groups {
            let next = match self.next_empty_group_number(disk,fat,param,curr) {
                Some(g) => g,
                None => {
                    for g in taken {
                        self.set_group_number(fat,param,g,param.group_unused_code);
                    }
                    return Err(Error::DiskFull);
                }
            };
            self.set_group_number(fat,param,next,param.group_final_code);
            self.set_group_number(fat,param,curr,next);
            taken.push(next);
            curr = next;
        }
        let last_sectors = sectors - (n_groups - 1)*param.sectors_per_group;
        let code = (param.group_final_code + last_sectors).min(param.group_final_max);
        self.set_group_number(fat,param,curr,code);
        walk_fat_chain(self,fat,param,taken[0])
    }
    fn check_fat(&self,_disk: &Disk,fat: &FatBuffer,param: &BasicParam) -> f64 {
        table_confidence(self,fat,param)
    }
    fn check_root_directory(&self,disk: &Disk,param: &BasicParam) -> f64 {
        directory_confidence(self.kind,disk,param)
    }
    /// terminal codes encode the used sector count of the last group
    fn sector_range(&self,param: &BasicParam,group: usize,next: usize) -> (u8,u8,u8,u8) {
        let lsn = group*param.sectors_per_group;
        let (t,s,r0) = param.lsn_to_chs(lsn);
        let used = match self.is_final_code(param,next) && next > param.group_final_code {
            true => (next - param.group_final_code).min(param.sectors_per_group),
            false => param.sectors_per_group
        };
        let (_,_,r1) = param.lsn_to_chs(lsn + used - 1);
        (t,s,r0,r1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::img::DiskDensity;
    use crate::fs::param::builtin_params;

    fn fm_param() -> BasicParam {
        builtin_params().into_iter().find(|p| p.kind==FormatKind::Fm).unwrap()
    }

    fn empty_disk() -> Disk {
        Disk::new("test",DiskDensity::D2)
    }

    #[test]
    fn chain_walk_follows_links() {
        let param = fm_param();
        let t = Fat8Type::new(FormatKind::Fm);
        let mut fat = FatBuffer { data: vec![0xff;256], dirty: false };
        fat.data[2] = 5;
        fat.data[5] = 9;
        fat.data[9] = 0xc3; // 3 sectors used in the last group
        let list = walk_fat_chain(&t,&fat,&param,2).unwrap();
        assert_eq!(list.len(),3);
        assert_eq!(list.items()[0].group,2);
        assert_eq!(list.items()[2].group,9);
        assert_eq!(list.items()[2].sector_end - list.items()[2].sector_start,2);
    }

    #[test]
    fn chain_cycle_is_broken() {
        let param = fm_param();
        let t = Fat8Type::new(FormatKind::Fm);
        let mut fat = FatBuffer { data: vec![0xff;256], dirty: false };
        fat.data[2] = 5;
        fat.data[5] = 2;
        assert!(matches!(walk_fat_chain(&t,&fat,&param,2),Err(Error::BrokenChain)));
    }

    #[test]
    fn self_loop_is_broken() {
        let param = fm_param();
        let t = Fat8Type::new(FormatKind::Fm);
        let mut fat = FatBuffer { data: vec![0xff;256], dirty: false };
        fat.data[7] = 7;
        assert!(matches!(walk_fat_chain(&t,&fat,&param,7),Err(Error::BrokenChain)));
    }

    #[test]
    fn allocation_links_and_terminates() {
        let param = fm_param();
        let disk = empty_disk();
        let mut t = Fat8Type::new(FormatKind::Fm);
        let mut fat = FatBuffer { data: vec![0xff;256], dirty: false };
        // 10 sectors = 2 groups of 8, 2 sectors used in the last
        let list = t.allocate_unit_groups(&disk,&mut fat,&param,0,10*256).unwrap();
        assert_eq!(list.len(),2);
        assert_eq!(fat.data[0],1);
        assert_eq!(fat.data[1],0xc2);
        assert!(fat.dirty);
    }

    #[test]
    fn allocation_rolls_back_when_full() {
        let param = fm_param();
        let disk = empty_disk();
        let mut t = Fat8Type::new(FormatKind::Fm);
        let mut fat = FatBuffer { data: vec![0xc1;256], dirty: false };
        fat.data[3] = 0xff; // one free group, two needed
        assert!(matches!(t.allocate_unit_groups(&disk,&mut fat,&param,0,16*256),Err(Error::DiskFull)));
        assert_eq!(fat.data[3],0xff);
    }
}
