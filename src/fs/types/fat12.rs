//! ## FAT12 allocation strategy
//!
//! Shared by MS-DOS and MSX-DOS.  Two 12 bit entries pack into three
//! bytes; cluster numbering starts at 2 and the data area begins right
//! after the root directory.

use crate::img::Disk;
use crate::fs::Error;
use crate::fs::diritem::ops_for;
use crate::fs::group::{FatAvail,GroupList};
use crate::fs::param::{BasicParam,FormatKind};
use super::{walk_fat_chain,classify_from_table,table_confidence,directory_confidence,BasicType,FatBuffer};

pub struct Fat12Type {
    kind: FormatKind
}

impl Fat12Type {
    pub fn new(kind: FormatKind) -> Self {
        Self { kind }
    }
}

impl BasicType for Fat12Type {
    fn kind(&self) -> FormatKind {
        self.kind
    }
    fn group_number(&self,fat: &FatBuffer,param: &BasicParam,num: usize) -> usize {
        let idx = num + num/2;
        if idx+1 >= fat.data.len() {
            return param.group_system_code;
        }
        match num % 2 {
            0 => fat.data[idx] as usize | ((fat.data[idx+1] & 0x0f) as usize) << 8,
            _ => (fat.data[idx] >> 4) as usize | (fat.data[idx+1] as usize) << 4
        }
    }
    fn set_group_number(&self,fat: &mut FatBuffer,_param: &BasicParam,num: usize,val: usize) {
        let idx = num + num/2;
        if idx+1 >= fat.data.len() {
            return;
        }
        match num % 2 {
            0 => {
                fat.data[idx] = (val & 0xff) as u8;
                fat.data[idx+1] = (fat.data[idx+1] & 0xf0) | ((val >> 8) & 0x0f) as u8;
            },
            _ => {
                fat.data[idx] = (fat.data[idx] & 0x0f) | ((val & 0x0f) << 4) as u8;
                fat.data[idx+1] = ((val >> 4) & 0xff) as u8;
            }
        }
        fat.dirty = true;
    }
    fn empty_group_number(&mut self,_disk: &Disk,fat: &FatBuffer,param: &BasicParam) -> Option<usize> {
        (param.fat_start_group..=param.fat_end_group)
            .find(|g| self.group_number(fat,param,*g)==param.group_unused_code)
    }
    fn calc_disk_free_size(&mut self,_disk: &Disk,fat: &FatBuffer,param: &BasicParam,_live: &[GroupList]) -> Vec<FatAvail> {
        classify_from_table(self,fat,param)
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
        self.set_group_number(fat,param,curr,param.group_final_max);
        walk_fat_chain(self,fat,param,taken[0])
    }
    fn check_fat(&self,_disk: &Disk,fat: &FatBuffer,param: &BasicParam) -> f64 {
        // the media descriptor entry pins the first two slots
        if fat.data.len() >= 3 && fat.data[1]==0xff && fat.data[2]==0xff {
            return (table_confidence(self,fat,param) + 1.0)/2.0;
        }
        table_confidence(self,fat,param)
    }
    fn check_root_directory(&self,disk: &Disk,param: &BasicParam) -> f64 {
        directory_confidence(self.kind,disk,param)
    }
    /// clusters count from 2, the data area follows the root directory
    fn sector_range(&self,param: &BasicParam,group: usize,next: usize) -> (u8,u8,u8,u8) {
        let _ = next;
        let data_start = param.dir_end_lsn + 1;
        let lsn = data_start + (group - param.fat_start_group)*param.sectors_per_group;
        let (t,s,r0) = param.lsn_to_chs(lsn);
        let (_,_,r1) = param.lsn_to_chs(lsn + param.sectors_per_group - 1);
        (t,s,r0,r1)
    }
    fn on_formatted(&self,_disk: &mut Disk,fat: &mut FatBuffer,param: &BasicParam) {
        fat.data.fill(0);
        // media descriptor and its filler
        fat.data[0] = 0xf9;
        fat.data[1] = 0xff;
        fat.data[2] = 0xff;
        let _ = param;
        fat.dirty = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::param::builtin_params;

    fn msdos_param() -> BasicParam {
        builtin_params().into_iter().find(|p| p.kind==FormatKind::Msdos).unwrap()
    }

    #[test]
    fn packed_slots_round_trip() {
        let param = msdos_param();
        let t = Fat12Type::new(FormatKind::Msdos);
        let mut fat = FatBuffer { data: vec![0;1536], dirty: false };
        t.set_group_number(&mut fat,&param,2,0xabc);
        t.set_group_number(&mut fat,&param,3,0x123);
        assert_eq!(t.group_number(&fat,&param,2),0xabc);
        assert_eq!(t.group_number(&fat,&param,3),0x123);
        // neighbors share a byte and must not clobber each other
        t.set_group_number(&mut fat,&param,2,0xfff);
        assert_eq!(t.group_number(&fat,&param,3),0x123);
    }

    #[test]
    fn cluster_two_maps_to_data_area() {
        let param = msdos_param();
        let t = Fat12Type::new(FormatKind::Msdos);
        let (track,side,r0,_) = t.sector_range(&param,2,0);
        assert_eq!(param.chs_to_lsn(track,side,r0),param.dir_end_lsn + 1);
    }
}
