//! ## Hu-BASIC allocation strategy
//!
//! The FAT is split into two half tables: low bytes of every group link in
//! the first half, high bytes in the second.  A terminal code is
//! `0x80 + sectors_used - 1`, so the last group knows how many of its 16
//! sectors carry data.  Free search is next-fit: forward from the last
//! allocation, then backward.  Formatting marks the out-of-range slots
//! with the system code and stamps an IPL signature into the boot sector.

use crate::img::Disk;
use crate::fs::Error;
use crate::fs::diritem::ops_for;
use crate::fs::group::{FatAvail,GroupList};
use crate::fs::param::{BasicParam,FormatKind};
use super::{walk_fat_chain,classify_from_table,table_confidence,directory_confidence,BasicType,FatBuffer};

const IPL_SIGNATURE: &[u8] = b"\x01IPL";

pub struct X1huType {
    last_alloc: Option<usize>
}

impl X1huType {
    pub fn new() -> Self {
        Self { last_alloc: None }
    }
    fn half(fat: &FatBuffer) -> usize {
        fat.data.len()/2
    }
}

impl BasicType for X1huType {
    fn kind(&self) -> FormatKind {
        FormatKind::X1Hu
    }
    fn group_number(&self,fat: &FatBuffer,param: &BasicParam,num: usize) -> usize {
        let half = Self::half(fat);
        if num >= half {
            return param.group_system_code;
        }
        let lo = fat.data[num] as usize;
        let hi = fat.data[half + num] as usize;
        // terminal and sentinel codes are single byte values
        match lo >= param.group_final_code {
            true => lo,
            false => (hi << 8) | lo
        }
    }
    fn set_group_number(&self,fat: &mut FatBuffer,_param: &BasicParam,num: usize,val: usize) {
        let half = Self::half(fat);
        if num < half {
            fat.data[num] = (val & 0xff) as u8;
            fat.data[half + num] = (val >> 8) as u8;
            fat.dirty = true;
        }
    }
    fn empty_group_number(&mut self,_disk: &Disk,fat: &FatBuffer,param: &BasicParam) -> Option<usize> {
        let found = (param.fat_start_group..=param.fat_end_group)
            .find(|g| self.group_number(fat,param,*g)==param.group_unused_code);
        self.last_alloc = found;
        found
    }
    /// forward next-fit, falling back to a backward sweep
    fn next_empty_group_number(&mut self,_disk: &Disk,fat: &FatBuffer,param: &BasicParam,curr: usize) -> Option<usize> {
        let forward = ((curr+1)..=param.fat_end_group)
            .find(|g| self.group_number(fat,param,*g)==param.group_unused_code);
        let found = match forward {
            Some(g) => Some(g),
            None => (param.fat_start_group..curr).rev()
                .find(|g| self.group_number(fat,param,*g)==param.group_unused_code)
        };
        self.last_alloc = found;
        found
    }
    fn calc_disk_free_size(&mut self,_disk: &Disk,fat: &FatBuffer,param: &BasicParam,_live: &[GroupList]) -> Vec<FatAvail> {
        classify_from_table(self,fat,param)
    }
    fn unit_groups(&self,_disk: &Disk,fat: &FatBuffer,param: &BasicParam,rec: &[u8],unit: usize) -> Result<GroupList,Error> {
        match ops_for(self.kind()).start_group(rec,unit) {
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
        self.set_group_number(fat,param,curr,param.group_final_code + last_sectors - 1);
        walk_fat_chain(self,fat,param,taken[0])
    }
    fn check_fat(&self,_disk: &Disk,fat: &FatBuffer,param: &BasicParam) -> f64 {
        table_confidence(self,fat,param)
    }
    fn check_root_directory(&self,disk: &Disk,param: &BasicParam) -> f64 {
        directory_confidence(self.kind(),disk,param)
    }
    /// `0x80` means 1 sector used, `0x8f` the full 16
    fn sector_range(&self,param: &BasicParam,group: usize,next: usize) -> (u8,u8,u8,u8) {
        let lsn = group*param.sectors_per_group;
        let (t,s,r0) = param.lsn_to_chs(lsn);
        let used = match self.is_final_code(param,next) {
            true => (next - param.group_final_code + 1).min(param.sectors_per_group),
            false => param.sectors_per_group
        };
        let (_,_,r1) = param.lsn_to_chs(lsn + used - 1);
        (t,s,r0,r1)
    }
    fn on_formatted(&self,disk: &mut Disk,fat: &mut FatBuffer,param: &BasicParam) {
        fat.data.fill(param.group_unused_code as u8);
        let half = Self::half(fat);
        for num in (param.fat_end_group+1)..half {
            fat.data[num] = param.group_system_code as u8;
        }
        // the management track holds the IPL, FAT and directory
        fat.data[0] = param.group_system_code as u8;
        fat.dirty = true;
        let (t,s,r) = param.lsn_to_chs(0);
        if let Some(boot) = disk.sector_data_mut(t,s,r) {
            boot[0..IPL_SIGNATURE.len()].copy_from_slice(IPL_SIGNATURE);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::param::builtin_params;

    fn hu_param() -> BasicParam {
        builtin_params().into_iter().find(|p| p.kind==FormatKind::X1Hu).unwrap()
    }

    #[test]
    fn split_halves_round_trip() {
        let param = hu_param();
        let t = X1huType::new();
        let mut fat = FatBuffer { data: vec![0;512], dirty: false };
        t.set_group_number(&mut fat,&param,5,0x42);
        assert_eq!(fat.data[5],0x42);
        assert_eq!(t.group_number(&fat,&param,5),0x42);
    }

    #[test]
    fn terminal_code_counts_sectors() {
        let param = hu_param();
        let t = X1huType::new();
        // 0x83 terminal = 4 sectors used
        let (_,_,r0,r1) = t.sector_range(&param,3,0x83);
        assert_eq!(r1 - r0,3);
    }

    #[test]
    fn next_fit_searches_forward_then_backward() {
        let param = hu_param();
        let disk = crate::img::Disk::new("test",crate::img::DiskDensity::D2);
        let mut t = X1huType::new();
        let mut fat = FatBuffer { data: vec![0;512], dirty: false };
        for g in 10..=param.fat_end_group {
            t.set_group_number(&mut fat,&param,g,0x80);
        }
        // forward is exhausted above group 9, search wraps backward
        assert_eq!(t.next_empty_group_number(&disk,&fat,&param,9),Some(8));
    }

    #[test]
    fn format_marks_out_of_range_slots() {
        let param = hu_param();
        let mut disk = crate::img::Disk::new("test",crate::img::DiskDensity::D2);
        let t = X1huType::new();
        let mut fat = FatBuffer { data: vec![0xaa;512], dirty: false };
        t.on_formatted(&mut disk,&mut fat,&param);
        assert_eq!(fat.data[param.fat_end_group+1],0xff);
        assert_eq!(fat.data[1],0x00);
        assert_eq!(fat.data[0],0xff);
    }
}
