//! ## MZ BASIC allocation strategy
//!
//! A 16 bit little endian FAT, one entry per sector.  Values at or above
//! 0x8000 terminate a chain, zero is free.

use crate::img::Disk;
use crate::fs::Error;
use crate::fs::diritem::ops_for;
use crate::fs::group::{FatAvail,GroupList};
use crate::fs::param::{BasicParam,FormatKind};
use super::{walk_fat_chain,classify_from_table,table_confidence,directory_confidence,BasicType,FatBuffer};

pub struct MzType;

impl MzType {
    pub fn new() -> Self {
        Self
    }
}

impl BasicType for MzType {
    fn kind(&self) -> FormatKind {
        FormatKind::Mz
    }
    fn group_number(&self,fat: &FatBuffer,param: &BasicParam,num: usize) -> usize {
        let off = num*2;
        match off+1 < fat.data.len() {
            true => fat.data[off] as usize | (fat.data[off+1] as usize) << 8,
            false => param.group_system_code
        }
    }
    fn set_group_number(&self,fat: &mut FatBuffer,_param: &BasicParam,num: usize,val: usize) {
        let off = num*2;
        if off+1 < fat.data.len() {
            fat.data[off] = (val & 0xff) as u8;
            fat.data[off+1] = (val >> 8) as u8;
            fat.dirty = true;
        }
    }
    fn empty_group_number(&mut self,_disk: &Disk,fat: &FatBuffer,param: &BasicParam) -> Option<usize> {
        (param.fat_start_group..=param.fat_end_group)
            .find(|g| self.group_number(fat,param,*g)==param.group_unused_code)
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
        let mut taken: Vec<usize> = Vec::with_capacity(sectors);
        let mut curr = match self.empty_group_number(disk,fat,param) {
            Some(g) => g,
            None => return Err(Error::DiskFull)
        };
        self.set_group_number(fat,param,curr,param.group_final_code);
        taken.push(curr);
        for _ in 1..sectors {
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
        walk_fat_chain(self,fat,param,taken[0])
    }
    fn check_fat(&self,_disk: &Disk,fat: &FatBuffer,param: &BasicParam) -> f64 {
        table_confidence(self,fat,param)
    }
    fn check_root_directory(&self,disk: &Disk,param: &BasicParam) -> f64 {
        directory_confidence(self.kind(),disk,param)
    }
    fn on_formatted(&self,_disk: &mut Disk,fat: &mut FatBuffer,param: &BasicParam) {
        fat.data.fill(0);
        // management sectors on track 0 never leave the system
        let managed = param.fat_start_lsn + param.fat_sectors;
        for g in 0..managed {
            self.set_group_number(fat,param,g,param.group_system_code);
        }
        fat.dirty = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::param::builtin_params;

    #[test]
    fn sixteen_bit_slots_round_trip() {
        let param = builtin_params().into_iter().find(|p| p.kind==FormatKind::Mz).unwrap();
        let t = MzType::new();
        let mut fat = FatBuffer { data: vec![0;2560], dirty: false };
        t.set_group_number(&mut fat,&param,100,0x1234);
        assert_eq!(t.group_number(&fat,&param,100),0x1234);
        assert_eq!(fat.data[200],0x34);
        assert_eq!(fat.data[201],0x12);
    }
}
