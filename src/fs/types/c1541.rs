//! ## Commodore 1541 allocation strategy
//!
//! Zoned geometry (21/19/18/17 sectors per track), a Block Availability
//! Map on track 18 where a set bit means free, and per-sector forward
//! links in the first two bytes of every data sector.  Track numbers on
//! the medium count from 1, the disk model counts from 0; group numbers
//! are composite (cbm_track<<8)|sector values.

use crate::STDRESULT;
use crate::img::Disk;
use crate::fs::Error;
use crate::fs::attr::FileAttr;
use crate::fs::diritem::ops_for;
use crate::fs::group::{FatAvail,GroupItem,GroupList};
use crate::fs::param::{BasicParam,FormatKind};
use super::{BasicType,FatBuffer};

pub const SECTOR_PAYLOAD: usize = 254;
const DIR_TRACK: u8 = 18;
const BAM_ENTRY_OFF: usize = 4;
const DOS_VERSION: u8 = 0x41;
const TRACK_COUNT: u8 = 35;

/// sectors on a CBM track, tracks counting from 1
pub fn sectors_on_track(cbm_track: u8) -> u8 {
    match cbm_track {
        1..=17 => 21,
        18..=24 => 19,
        25..=30 => 18,
        _ => 17
    }
}

fn composite(cbm_track: u8,sector: u8) -> usize {
    ((cbm_track as usize) << 8) | sector as usize
}

pub struct C1541Type;

impl C1541Type {
    pub fn new() -> Self {
        Self
    }
    fn bam_free(fat: &FatBuffer,cbm_track: u8,sector: u8) -> bool {
        let off = BAM_ENTRY_OFF + (cbm_track as usize - 1)*4 + 1 + sector as usize/8;
        match fat.data.get(off) {
            Some(b) => b & (1 << (sector%8)) != 0,
            None => false
        }
    }
    fn bam_set(fat: &mut FatBuffer,cbm_track: u8,sector: u8,free: bool) {
        let base = BAM_ENTRY_OFF + (cbm_track as usize - 1)*4;
        if base+3 >= fat.data.len() {
            return;
        }
        let off = base + 1 + sector as usize/8;
        let was_free = fat.data[off] & (1 << (sector%8)) != 0;
        match free {
            true => fat.data[off] |= 1 << (sector%8),
            false => fat.data[off] &= !(1 << (sector%8))
        }
        if was_free != free {
            fat.data[base] = match free {
                true => fat.data[base].saturating_add(1),
                false => fat.data[base].saturating_sub(1)
            };
        }
        fat.dirty = true;
    }
    fn walk_links(&self,disk: &Disk,param: &BasicParam,start: usize) -> Result<GroupList,Error> {
        let mut list = GroupList::new();
        let mut g = start;
        for _ in 0..=param.fat_end_group {
            let (ct,s) = ((g >> 8) as u8,(g & 0xff) as u8);
            if ct < 1 || ct > TRACK_COUNT || s >= sectors_on_track(ct) {
                return Err(Error::BrokenChain);
            }
            if list.contains_group(g) {
                return Err(Error::BrokenChain);
            }
            let data = disk.sector_data(ct-1,0,s).ok_or(Error::SectorAccess)?;
            let next = composite(data[0],data[1]);
            // a zero link track ends the chain, the sector byte then holds
            // the count of payload bytes plus one
            let size = match data[0] {
                0 => (data[1] as usize).saturating_sub(1).min(SECTOR_PAYLOAD),
                _ => SECTOR_PAYLOAD
            };
            list.push(GroupItem::new(g,match data[0] { 0 => 0, _ => next },ct-1,0,s,s,size));
            if data[0]==0 {
                return Ok(list);
            }
            g = next;
        }
        Err(Error::BrokenChain)
    }
}

impl BasicType for C1541Type {
    fn kind(&self) -> FormatKind {
        FormatKind::C1541
    }
    fn group_number(&self,_fat: &FatBuffer,param: &BasicParam,_num: usize) -> usize {
        param.group_unused_code
    }
    fn set_group_number(&self,_fat: &mut FatBuffer,_param: &BasicParam,_num: usize,_val: usize) {
    }
    fn empty_group_number(&mut self,_disk: &Disk,fat: &FatBuffer,_param: &BasicParam) -> Option<usize> {
        for ct in 1..=TRACK_COUNT {
            if ct==DIR_TRACK {
                continue;
            }
            for s in 0..sectors_on_track(ct) {
                if Self::bam_free(fat,ct,s) {
                    return Some(composite(ct,s));
                }
            }
        }
        None
    }
    fn calc_disk_free_size(&mut self,_disk: &Disk,fat: &FatBuffer,param: &BasicParam,live: &[GroupList]) -> Vec<FatAvail> {
        let _ = param;
        let mut ans = Vec::new();
        for ct in 1..=TRACK_COUNT {
            for s in 0..sectors_on_track(ct) {
                ans.push(match (ct==DIR_TRACK,Self::bam_free(fat,ct,s)) {
                    (true,_) => FatAvail::System,
                    (_,true) => FatAvail::Free,
                    (_,false) => FatAvail::Used
                });
            }
        }
        let mut flat_base = vec![0usize;TRACK_COUNT as usize + 1];
        for ct in 1..TRACK_COUNT {
            flat_base[ct as usize + 1] = flat_base[ct as usize] + sectors_on_track(ct) as usize;
        }
        for list in live {
            if let Some(g) = list.items().last() {
                let ct = g.track as usize + 1;
                let idx = flat_base[ct] + g.sector_start as usize;
                if idx < ans.len() && ans[idx]==FatAvail::Used {
                    ans[idx] = FatAvail::UsedLast;
                }
            }
        }
        ans
    }
    fn unit_groups(&self,disk: &Disk,_fat: &FatBuffer,param: &BasicParam,rec: &[u8],unit: usize) -> Result<GroupList,Error> {
        match ops_for(self.kind()).start_group(rec,unit) {
            Some(start) => self.walk_links(disk,param,start),
            None => Ok(GroupList::new())
        }
    }
    fn allocate_unit_groups(&mut self,_disk: &Disk,fat: &mut FatBuffer,param: &BasicParam,_unit: usize,data_size: usize) -> Result<GroupList,Error> {
        let sectors = 1.max((data_size + SECTOR_PAYLOAD - 1)/SECTOR_PAYLOAD);
        let mut taken: Vec<(u8,u8)> = Vec::with_capacity(sectors);
        'outer: for ct in 1..=TRACK_COUNT {
            if ct==DIR_TRACK {
                continue;
            }
            for s in 0..sectors_on_track(ct) {
                if Self::bam_free(fat,ct,s) && !taken.contains(&(ct,s)) {
                    taken.push((ct,s));
                    if taken.len()==sectors {
                        break 'outer;
                    }
                }
            }
        }
        if taken.len() < sectors {
            return Err(Error::DiskFull);
        }
        let mut list = GroupList::new();
        for (i,(ct,s)) in taken.iter().enumerate() {
            Self::bam_set(fat,*ct,*s,false);
            let next = match i+1==sectors {
                true => 0,
                false => composite(taken[i+1].0,taken[i+1].1)
            };
            let size = match i+1==sectors {
                true => match data_size % SECTOR_PAYLOAD {
                    0 => SECTOR_PAYLOAD,
                    r => r
                },
                false => SECTOR_PAYLOAD
            };
            list.push(GroupItem::new(composite(*ct,*s),next,ct-1,0,*s,*s,size));
        }
        let _ = param;
        Ok(list)
    }
    fn check_fat(&self,_disk: &Disk,fat: &FatBuffer,_param: &BasicParam) -> f64 {
        if fat.data.len() < 144 {
            return -1.0;
        }
        let mut score = 0;
        if fat.data[0]==DIR_TRACK {
            score += 1;
        }
        if fat.data[2]==DOS_VERSION {
            score += 1;
        }
        let plausible = (1..=TRACK_COUNT).all(|ct| {
            fat.data[BAM_ENTRY_OFF + (ct as usize - 1)*4] <= sectors_on_track(ct)
        });
        if plausible {
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
    /// directory sectors chain from track 18 sector 1
    fn directory_sectors(&self,disk: &Disk,param: &BasicParam) -> Result<Vec<(u8,u8,u8)>,Error> {
        let mut ans = Vec::new();
        let mut ct = DIR_TRACK;
        let mut s = 1u8;
        for _ in 0..=param.fat_end_group {
            if ct < 1 || ct > TRACK_COUNT || s >= sectors_on_track(ct) {
                return Err(Error::BrokenChain);
            }
            if ans.contains(&(ct-1,0,s)) {
                return Err(Error::BrokenChain);
            }
            let data = disk.sector_data(ct-1,0,s).ok_or(Error::SectorAccess)?;
            ans.push((ct-1,0,s));
            if data[0]==0 {
                return Ok(ans);
            }
            ct = data[0];
            s = data[1];
        }
        Err(Error::BrokenChain)
    }
    fn read_file(&self,disk: &Disk,_param: &BasicParam,groups: &GroupList) -> Result<Vec<u8>,Error> {
        let mut ans = Vec::new();
        for g in groups.items() {
            let data = disk.sector_data(g.track,g.side,g.sector_start).ok_or(Error::SectorAccess)?;
            ans.extend_from_slice(&data[2..2+g.size.min(SECTOR_PAYLOAD)]);
        }
        Ok(ans)
    }
    fn write_file(&self,disk: &mut Disk,_param: &BasicParam,groups: &GroupList,data: &[u8],_attr: FileAttr) -> STDRESULT {
        let mut pos = 0;
        for g in groups.items() {
            let sec = disk.sector_data_mut(g.track,g.side,g.sector_start).ok_or(Error::SectorAccess)?;
            sec.fill(0);
            let take = SECTOR_PAYLOAD.min(data.len().saturating_sub(pos));
            match g.next {
                0 => {
                    sec[0] = 0;
                    sec[1] = (take + 1) as u8;
                },
                n => {
                    sec[0] = (n >> 8) as u8;
                    sec[1] = (n & 0xff) as u8;
                }
            }
            sec[2..2+take].copy_from_slice(&data[pos..pos+take]);
            pos += take;
        }
        Ok(())
    }
    fn free_groups(&mut self,fat: &mut FatBuffer,_param: &BasicParam,groups: &GroupList) {
        for g in groups.items() {
            Self::bam_set(fat,g.track+1,g.sector_start,true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zoned_sector_counts() {
        assert_eq!(sectors_on_track(1),21);
        assert_eq!(sectors_on_track(17),21);
        assert_eq!(sectors_on_track(18),19);
        assert_eq!(sectors_on_track(25),18);
        assert_eq!(sectors_on_track(35),17);
    }

    #[test]
    fn bam_bits_track_the_free_count() {
        let mut fat = FatBuffer { data: vec![0;256], dirty: false };
        C1541Type::bam_set(&mut fat,1,0,true);
        C1541Type::bam_set(&mut fat,1,5,true);
        assert_eq!(fat.data[BAM_ENTRY_OFF],2);
        assert!(C1541Type::bam_free(&fat,1,5));
        C1541Type::bam_set(&mut fat,1,5,false);
        assert_eq!(fat.data[BAM_ENTRY_OFF],1);
        assert!(!C1541Type::bam_free(&fat,1,5));
    }
}
