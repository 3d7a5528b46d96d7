//! ## OS-9 allocation strategy
//!
//! Everything is addressed by logical sector number.  Sector 0 identifies
//! the volume and points at the root directory's file descriptor, sector 1
//! holds the allocation bitmap (a set bit means allocated).  A file
//! descriptor carries up to 48 segment entries of u24 start and u16 count,
//! both big endian.  Saving is not supported here because it would mean
//! synthesizing descriptors, only reading and deleting are.

use crate::img::Disk;
use crate::fs::Error;
use crate::fs::diritem::ops_for;
use crate::fs::group::{FatAvail,GroupItem,GroupList};
use crate::fs::param::{BasicParam,FormatKind};
use super::{BasicType,FatBuffer};

const ID_TOTAL_OFF: usize = 0;
const ID_ROOT_OFF: usize = 8;
const FD_SEGLIST_OFF: usize = 16;
const FD_SEGMENTS: usize = 48;

fn u24_be(data: &[u8],off: usize) -> usize {
    (data[off] as usize) << 16 | (data[off+1] as usize) << 8 | data[off+2] as usize
}

pub struct Os9Type;

impl Os9Type {
    pub fn new() -> Self {
        Self
    }
    fn bit(fat: &FatBuffer,lsn: usize) -> bool {
        match fat.data.get(lsn/8) {
            Some(b) => b & (0x80 >> (lsn%8)) != 0,
            None => true
        }
    }
    fn set_bit(fat: &mut FatBuffer,lsn: usize,used: bool) {
        if let Some(b) = fat.data.get_mut(lsn/8) {
            match used {
                true => *b |= 0x80 >> (lsn%8),
                false => *b &= !(0x80 >> (lsn%8))
            }
            fat.dirty = true;
        }
    }
    /// expand a descriptor's segment list into per-sector extents
    fn descriptor_sectors(&self,disk: &Disk,param: &BasicParam,fd_lsn: usize) -> Result<GroupList,Error> {
        let (t,s,r) = param.lsn_to_chs(fd_lsn);
        let fd = disk.sector_data(t,s,r).ok_or(Error::SectorAccess)?;
        let mut list = GroupList::new();
        for seg in 0..FD_SEGMENTS {
            let off = FD_SEGLIST_OFF + seg*5;
            if off+5 > fd.len() {
                break;
            }
            let start = u24_be(fd,off);
            let count = (fd[off+3] as usize) << 8 | fd[off+4] as usize;
            if start==0 && count==0 {
                break;
            }
            for i in 0..count {
                let lsn = start + i;
                if lsn > param.fat_end_group || list.len() > param.fat_end_group {
                    return Err(Error::BrokenChain);
                }
                let (t,s,r) = param.lsn_to_chs(lsn);
                list.push(GroupItem::new(lsn,0,t,s,r,r,param.sector_size));
            }
        }
        Ok(list)
    }
}

impl BasicType for Os9Type {
    fn kind(&self) -> FormatKind {
        FormatKind::Os9
    }
    fn group_number(&self,fat: &FatBuffer,param: &BasicParam,num: usize) -> usize {
        match Self::bit(fat,num) {
            true => param.group_system_code,
            false => param.group_unused_code
        }
    }
    fn set_group_number(&self,fat: &mut FatBuffer,param: &BasicParam,num: usize,val: usize) {
        Self::set_bit(fat,num,val != param.group_unused_code);
    }
    fn empty_group_number(&mut self,_disk: &Disk,fat: &FatBuffer,param: &BasicParam) -> Option<usize> {
        (2..=param.fat_end_group).find(|lsn| !Self::bit(fat,*lsn))
    }
    fn calc_disk_free_size(&mut self,_disk: &Disk,fat: &FatBuffer,param: &BasicParam,live: &[GroupList]) -> Vec<FatAvail> {
        let mut ans: Vec<FatAvail> = (0..=param.fat_end_group).map(|lsn| match Self::bit(fat,lsn) {
            true => FatAvail::Used,
            false => FatAvail::Free
        }).collect();
        ans[0] = FatAvail::System;
        ans[1] = FatAvail::System;
        for list in live {
            if let Some(last) = list.last_group() {
                if last < ans.len() {
                    ans[last] = FatAvail::UsedLast;
                }
            }
        }
        ans
    }
    fn unit_groups(&self,disk: &Disk,_fat: &FatBuffer,param: &BasicParam,rec: &[u8],unit: usize) -> Result<GroupList,Error> {
        match ops_for(self.kind()).start_group(rec,unit) {
            Some(fd_lsn) => self.descriptor_sectors(disk,param,fd_lsn),
            None => Ok(GroupList::new())
        }
    }
    fn allocate_unit_groups(&mut self,_disk: &Disk,_fat: &mut FatBuffer,_param: &BasicParam,_unit: usize,_data_size: usize) -> Result<GroupList,Error> {
        Err(Error::Unsupported)
    }
    fn check_fat(&self,disk: &Disk,_fat: &FatBuffer,param: &BasicParam) -> f64 {
        let (t,s,r) = param.lsn_to_chs(0);
        let id = match disk.sector_data(t,s,r) {
            Some(d) => d,
            None => return -1.0
        };
        let total = u24_be(id,ID_TOTAL_OFF);
        let expect = param.tracks*param.sides*param.sectors;
        match total==expect {
            true => 1.0,
            false => match total > 0 && total <= expect {
                true => 0.0,
                false => -1.0
            }
        }
    }
    fn check_root_directory(&self,disk: &Disk,param: &BasicParam) -> f64 {
        match self.directory_sectors(disk,param) {
            Ok(sectors) if !sectors.is_empty() => 1.0,
            Ok(_) => 0.0,
            Err(_) => -1.0
        }
    }
    /// the root directory's sectors come from its descriptor
    fn directory_sectors(&self,disk: &Disk,param: &BasicParam) -> Result<Vec<(u8,u8,u8)>,Error> {
        let (t,s,r) = param.lsn_to_chs(0);
        let id = disk.sector_data(t,s,r).ok_or(Error::SectorAccess)?;
        let fd_lsn = u24_be(id,ID_ROOT_OFF);
        if fd_lsn==0 || fd_lsn > param.fat_end_group {
            return Err(Error::BrokenChain);
        }
        let list = self.descriptor_sectors(disk,param,fd_lsn)?;
        Ok(list.items().iter().map(|g| (g.track,g.side,g.sector_start)).collect())
    }
    fn free_groups(&mut self,fat: &mut FatBuffer,_param: &BasicParam,groups: &GroupList) {
        for g in groups.items() {
            Self::set_bit(fat,g.group,false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitmap_bits_are_msb_first() {
        let mut fat = FatBuffer { data: vec![0;80], dirty: false };
        Os9Type::set_bit(&mut fat,0,true);
        Os9Type::set_bit(&mut fat,9,true);
        assert_eq!(fat.data[0],0x80);
        assert_eq!(fat.data[1],0x40);
        assert!(Os9Type::bit(&fat,9));
        assert!(!Os9Type::bit(&fat,8));
    }
}
