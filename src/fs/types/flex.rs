//! ## FLEX allocation strategy
//!
//! No allocation table: every sector carries a forward link in its first
//! two bytes and 252 payload bytes after a sequence number.  Free sectors
//! form their own chain whose head lives in the System Information Record,
//! the sector the parameter set addresses as the table.  Group numbers are
//! composite (track<<8)|sector values.

use log::warn;
use crate::STDRESULT;
use crate::img::Disk;
use crate::fs::Error;
use crate::fs::attr::FileAttr;
use crate::fs::diritem::ops_for;
use crate::fs::group::{FatAvail,GroupItem,GroupList};
use crate::fs::param::{BasicParam,FormatKind};
use super::{directory_confidence,BasicType,FatBuffer};

pub const SECTOR_PAYLOAD: usize = 252;
const SIR_FREE_TRACK: usize = 29;
const SIR_FREE_SECTOR: usize = 30;
const SIR_FREE_COUNT: usize = 33;
const SIR_MAX_TRACK: usize = 38;
const SIR_MAX_SECTOR: usize = 39;

fn composite(track: u8,sector: u8) -> usize {
    ((track as usize) << 8) | sector as usize
}

pub struct FlexType;

impl FlexType {
    pub fn new() -> Self {
        Self
    }
    fn walk_links(&self,disk: &Disk,param: &BasicParam,start: usize) -> Result<GroupList,Error> {
        let mut list = GroupList::new();
        let mut g = start;
        for _ in 0..=param.fat_end_group {
            let (t,s) = ((g >> 8) as u8,(g & 0xff) as u8);
            if t as usize >= param.tracks || (s as usize) > param.sectors || s < 1 {
                return Err(Error::BrokenChain);
            }
            if list.contains_group(g) {
                return Err(Error::BrokenChain);
            }
            let data = disk.sector_data(t,0,s).ok_or(Error::SectorAccess)?;
            let next = composite(data[0],data[1]);
            list.push(GroupItem::new(g,next,t,0,s,s,SECTOR_PAYLOAD));
            if data[0]==0 {
                return Ok(list);
            }
            g = next;
        }
        Err(Error::BrokenChain)
    }
}

impl BasicType for FlexType {
    fn kind(&self) -> FormatKind {
        FormatKind::Flex
    }
    fn group_number(&self,_fat: &FatBuffer,param: &BasicParam,_num: usize) -> usize {
        param.group_unused_code
    }
    fn set_group_number(&self,_fat: &mut FatBuffer,_param: &BasicParam,_num: usize,_val: usize) {
    }
    fn empty_group_number(&mut self,_disk: &Disk,fat: &FatBuffer,_param: &BasicParam) -> Option<usize> {
        if fat.data.len() <= SIR_FREE_SECTOR || fat.data[SIR_FREE_TRACK]==0 {
            return None;
        }
        Some(composite(fat.data[SIR_FREE_TRACK],fat.data[SIR_FREE_SECTOR]))
    }
    fn calc_disk_free_size(&mut self,disk: &Disk,fat: &FatBuffer,param: &BasicParam,live: &[GroupList]) -> Vec<FatAvail> {
        // flat index over (track,sector), system track 0 first
        let total = param.tracks*param.sectors;
        let mut ans = vec![FatAvail::Leak;total];
        for s in 0..param.sectors {
            ans[s] = FatAvail::System;
        }
        if let Some(start) = self.empty_group_number(disk,fat,param) {
            if let Ok(free) = self.walk_links(disk,param,start) {
                for g in free.items() {
                    let idx = g.track as usize*param.sectors + (g.sector_start - 1) as usize;
                    ans[idx] = FatAvail::Free;
                }
            }
        }
        for list in live {
            for g in list.items() {
                let idx = g.track as usize*param.sectors + (g.sector_start - 1) as usize;
                if idx < total {
                    ans[idx] = match g.next {
                        0 => FatAvail::UsedLast,
                        _ => FatAvail::Used
                    };
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
    /// take sectors off the head of the free chain; the links inside the
    /// taken sectors are rewritten when the payload is staged
    fn allocate_unit_groups(&mut self,disk: &Disk,fat: &mut FatBuffer,param: &BasicParam,_unit: usize,data_size: usize) -> Result<GroupList,Error> {
        let sectors = 1.max((data_size + SECTOR_PAYLOAD - 1)/SECTOR_PAYLOAD);
        let start = match self.empty_group_number(disk,fat,param) {
            Some(g) => g,
            None => return Err(Error::DiskFull)
        };
        let free = self.walk_links(disk,param,start)?;
        if free.len() < sectors {
            return Err(Error::DiskFull);
        }
        let mut list = GroupList::new();
        for (i,g) in free.items().iter().take(sectors).enumerate() {
            let next = match i+1==sectors {
                true => 0,
                false => free.items()[i+1].group
            };
            list.push(GroupItem::new(g.group,next,g.track,g.side,g.sector_start,g.sector_end,SECTOR_PAYLOAD));
        }
        // new head of the free chain
        match free.items().get(sectors) {
            Some(head) => {
                fat.data[SIR_FREE_TRACK] = head.track;
                fat.data[SIR_FREE_SECTOR] = head.sector_start;
            },
            None => {
                fat.data[SIR_FREE_TRACK] = 0;
                fat.data[SIR_FREE_SECTOR] = 0;
            }
        }
        let count = ((fat.data[SIR_FREE_COUNT] as usize) << 8 | fat.data[SIR_FREE_COUNT+1] as usize)
            .saturating_sub(sectors);
        fat.data[SIR_FREE_COUNT] = (count >> 8) as u8;
        fat.data[SIR_FREE_COUNT+1] = (count & 0xff) as u8;
        fat.dirty = true;
        Ok(list)
    }
    fn check_fat(&self,_disk: &Disk,fat: &FatBuffer,param: &BasicParam) -> f64 {
        if fat.data.len() <= SIR_MAX_SECTOR {
            return -1.0;
        }
        let mut score = 0;
        if fat.data[SIR_MAX_TRACK] as usize==param.tracks - 1 {
            score += 1;
        }
        if fat.data[SIR_MAX_SECTOR] as usize==param.sectors {
            score += 1;
        }
        if (fat.data[SIR_FREE_TRACK] as usize) < param.tracks {
            score += 1;
        }
        2.0*score as f64/3.0 - 1.0
    }
    fn check_root_directory(&self,disk: &Disk,param: &BasicParam) -> f64 {
        directory_confidence(self.kind(),disk,param)
    }
    /// directory sectors are chained just like file sectors
    fn directory_sectors(&self,disk: &Disk,param: &BasicParam) -> Result<Vec<(u8,u8,u8)>,Error> {
        let (t0,_,s0) = param.lsn_to_chs(param.dir_start_lsn);
        let mut ans = Vec::new();
        let mut g = composite(t0,s0);
        for _ in 0..=param.fat_end_group {
            let (t,s) = ((g >> 8) as u8,(g & 0xff) as u8);
            if ans.contains(&(t,0,s)) {
                return Err(Error::BrokenChain);
            }
            let data = disk.sector_data(t,0,s).ok_or(Error::SectorAccess)?;
            ans.push((t,0,s));
            if data[0]==0 {
                return Ok(ans);
            }
            g = composite(data[0],data[1]);
        }
        Err(Error::BrokenChain)
    }
    fn read_file(&self,disk: &Disk,_param: &BasicParam,groups: &GroupList) -> Result<Vec<u8>,Error> {
        let mut ans = Vec::new();
        for g in groups.items() {
            let data = disk.sector_data(g.track,g.side,g.sector_start).ok_or(Error::SectorAccess)?;
            ans.extend_from_slice(&data[4..4+SECTOR_PAYLOAD]);
        }
        Ok(ans)
    }
    /// stage payload behind the 4 byte sector header, writing links and
    /// sequence numbers as we go
    fn write_file(&self,disk: &mut Disk,param: &BasicParam,groups: &GroupList,data: &[u8],_attr: FileAttr) -> STDRESULT {
        let _ = param;
        let mut pos = 0;
        for (i,g) in groups.items().iter().enumerate() {
            let sec = disk.sector_data_mut(g.track,g.side,g.sector_start).ok_or(Error::SectorAccess)?;
            sec.fill(0);
            sec[0] = (g.next >> 8) as u8;
            sec[1] = (g.next & 0xff) as u8;
            sec[2] = ((i+1) >> 8) as u8;
            sec[3] = ((i+1) & 0xff) as u8;
            let take = SECTOR_PAYLOAD.min(data.len().saturating_sub(pos));
            sec[4..4+take].copy_from_slice(&data[pos..pos+take]);
            pos += take;
        }
        if pos < data.len() {
            warn!("{} bytes did not fit the allocation",data.len()-pos);
        }
        Ok(())
    }
}
