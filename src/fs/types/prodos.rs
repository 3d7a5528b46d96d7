//! ## ProDOS allocation strategy
//!
//! 512 byte blocks, each two physical sectors.  The volume bitmap sits in
//! block 6 with a set bit meaning free, MSB first.  Storage types route
//! file access: a seedling's key block is the data, a sapling's key is an
//! index block of up to 256 data block pointers (low bytes then high
//! bytes), a tree's key is a master index over index blocks.  Index
//! blocks ride along in the group list with a nonzero division.

use crate::STDRESULT;
use crate::img::Disk;
use crate::fs::Error;
use crate::fs::attr::FileAttr;
use crate::fs::diritem::ops_for;
use crate::fs::group::{FatAvail,GroupItem,GroupList};
use crate::fs::param::{BasicParam,FormatKind};
use super::{BasicType,FatBuffer};

pub const BLOCK_SIZE: usize = 512;
const SYSTEM_BLOCKS: usize = 7;
const INDEX_ENTRIES: usize = 256;

const STORAGE_SEEDLING: u8 = 1;
const STORAGE_SAPLING: u8 = 2;
const STORAGE_TREE: u8 = 3;
const STORAGE_VOLUME: u8 = 0xf;

pub struct ProdosType;

impl ProdosType {
    pub fn new() -> Self {
        Self
    }
    fn bitmap_free(fat: &FatBuffer,block: usize) -> bool {
        match fat.data.get(block/8) {
            Some(b) => b & (0x80 >> (block%8)) != 0,
            None => false
        }
    }
    fn bitmap_set(fat: &mut FatBuffer,block: usize,free: bool) {
        if let Some(b) = fat.data.get_mut(block/8) {
            match free {
                true => *b |= 0x80 >> (block%8),
                false => *b &= !(0x80 >> (block%8))
            }
            fat.dirty = true;
        }
    }
    fn read_block(disk: &Disk,param: &BasicParam,block: usize) -> Result<Vec<u8>,Error> {
        let mut ans = Vec::with_capacity(BLOCK_SIZE);
        for i in 0..2 {
            let (t,s,r) = param.lsn_to_chs(block*2 + i);
            ans.extend_from_slice(disk.sector_data(t,s,r).ok_or(Error::SectorAccess)?);
        }
        Ok(ans)
    }
    fn block_item(param: &BasicParam,block: usize,division: usize) -> GroupItem {
        let lsn = block*2;
        let (t,s,r0) = param.lsn_to_chs(lsn);
        let (_,_,r1) = param.lsn_to_chs(lsn+1);
        let mut item = GroupItem::new(block,0,t,s,r0,r1,BLOCK_SIZE);
        item.division = division;
        item
    }
    fn push_index(disk: &Disk,param: &BasicParam,index: usize,list: &mut GroupList) -> Result<(),Error> {
        if index > param.fat_end_group || list.contains_group(index) {
            return Err(Error::BrokenChain);
        }
        list.push(Self::block_item(param,index,1));
        let data = Self::read_block(disk,param,index)?;
        for i in 0..INDEX_ENTRIES {
            let block = data[i] as usize | (data[INDEX_ENTRIES+i] as usize) << 8;
            if block==0 {
                continue;
            }
            if block > param.fat_end_group || list.contains_group(block) {
                return Err(Error::BrokenChain);
            }
            list.push(Self::block_item(param,block,0));
        }
        Ok(())
    }
}

impl BasicType for ProdosType {
    fn kind(&self) -> FormatKind {
        FormatKind::Prodos
    }
    fn group_number(&self,fat: &FatBuffer,param: &BasicParam,num: usize) -> usize {
        match Self::bitmap_free(fat,num) {
            true => param.group_unused_code,
            false => param.group_system_code
        }
    }
    fn set_group_number(&self,fat: &mut FatBuffer,param: &BasicParam,num: usize,val: usize) {
        Self::bitmap_set(fat,num,val==param.group_unused_code);
    }
    fn empty_group_number(&mut self,_disk: &Disk,fat: &FatBuffer,param: &BasicParam) -> Option<usize> {
        (SYSTEM_BLOCKS..=param.fat_end_group).find(|b| Self::bitmap_free(fat,*b))
    }
    fn calc_disk_free_size(&mut self,_disk: &Disk,fat: &FatBuffer,param: &BasicParam,live: &[GroupList]) -> Vec<FatAvail> {
        let mut ans: Vec<FatAvail> = (0..=param.fat_end_group).map(|b| match (b < SYSTEM_BLOCKS,Self::bitmap_free(fat,b)) {
            (true,_) => FatAvail::System,
            (_,true) => FatAvail::Free,
            (_,false) => FatAvail::Used
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
    fn unit_groups(&self,disk: &Disk,_fat: &FatBuffer,param: &BasicParam,rec: &[u8],unit: usize) -> Result<GroupList,Error> {
        let ops = ops_for(self.kind());
        let key = match ops.start_group(rec,unit) {
            Some(k) => k,
            None => return Ok(GroupList::new())
        };
        if key > param.fat_end_group {
            return Err(Error::BrokenChain);
        }
        let storage = ops.file_type2(rec).unwrap_or(STORAGE_SEEDLING);
        let mut list = GroupList::new();
        match storage {
            STORAGE_SEEDLING => list.push(Self::block_item(param,key,0)),
            STORAGE_SAPLING => Self::push_index(disk,param,key,&mut list)?,
            STORAGE_TREE => {
                list.push(Self::block_item(param,key,2));
                let master = Self::read_block(disk,param,key)?;
                for i in 0..INDEX_ENTRIES {
                    let index = master[i] as usize | (master[INDEX_ENTRIES+i] as usize) << 8;
                    if index != 0 {
                        Self::push_index(disk,param,index,&mut list)?;
                    }
                }
            },
            _ => return Err(Error::Unsupported)
        }
        Ok(list)
    }
    /// seedling for one block, sapling with one index block otherwise
    fn allocate_unit_groups(&mut self,_disk: &Disk,fat: &mut FatBuffer,param: &BasicParam,_unit: usize,data_size: usize) -> Result<GroupList,Error> {
        let blocks = 1.max((data_size + BLOCK_SIZE - 1)/BLOCK_SIZE);
        if blocks > INDEX_ENTRIES {
            return Err(Error::Unsupported);
        }
        let need = match blocks {
            1 => 1,
            n => n+1
        };
        let mut taken: Vec<usize> = Vec::with_capacity(need);
        for b in SYSTEM_BLOCKS..=param.fat_end_group {
            if Self::bitmap_free(fat,b) {
                taken.push(b);
                if taken.len()==need {
                    break;
                }
            }
        }
        if taken.len() < need {
            return Err(Error::DiskFull);
        }
        let mut list = GroupList::new();
        for (i,b) in taken.iter().enumerate() {
            Self::bitmap_set(fat,*b,false);
            let division = match blocks > 1 && i==0 {
                true => 1,
                false => 0
            };
            list.push(Self::block_item(param,*b,division));
        }
        Ok(list)
    }
    fn check_fat(&self,_disk: &Disk,fat: &FatBuffer,param: &BasicParam) -> f64 {
        if fat.data.is_empty() {
            return -1.0;
        }
        // the system blocks are always allocated
        let sys_used = (0..SYSTEM_BLOCKS.min(param.fat_end_group)).all(|b| !Self::bitmap_free(fat,b));
        match sys_used {
            true => 0.5,
            false => -0.5
        }
    }
    fn check_root_directory(&self,disk: &Disk,param: &BasicParam) -> f64 {
        let (t,s,r) = param.lsn_to_chs(param.dir_start_lsn);
        match disk.sector_data(t,s,r) {
            Some(key) if key.len() > 4 && key[4] >> 4==STORAGE_VOLUME => 1.0,
            Some(_) => -0.5,
            None => -1.0
        }
    }
    /// index blocks carry no payload
    fn read_file(&self,disk: &Disk,param: &BasicParam,groups: &GroupList) -> Result<Vec<u8>,Error> {
        let mut ans = Vec::new();
        for g in groups.items() {
            if g.division != 0 {
                continue;
            }
            ans.extend_from_slice(&Self::read_block(disk,param,g.group)?);
        }
        Ok(ans)
    }
    fn write_file(&self,disk: &mut Disk,param: &BasicParam,groups: &GroupList,data: &[u8],_attr: FileAttr) -> STDRESULT {
        let items = groups.items();
        let data_blocks: Vec<&GroupItem> = items.iter().filter(|g| g.division==0).collect();
        if let Some(index) = items.iter().find(|g| g.division==1) {
            let mut block = vec![0u8;BLOCK_SIZE];
            for (i,g) in data_blocks.iter().enumerate() {
                block[i] = g.group as u8;
                block[INDEX_ENTRIES+i] = (g.group >> 8) as u8;
            }
            for i in 0..2 {
                let (t,s,r) = param.lsn_to_chs(index.group*2 + i);
                let sec = disk.sector_data_mut(t,s,r).ok_or(Error::SectorAccess)?;
                sec.copy_from_slice(&block[i*param.sector_size..(i+1)*param.sector_size]);
            }
        }
        let mut pos = 0;
        for g in data_blocks {
            for i in 0..2 {
                let (t,s,r) = param.lsn_to_chs(g.group*2 + i);
                let sec = disk.sector_data_mut(t,s,r).ok_or(Error::SectorAccess)?;
                let take = sec.len().min(data.len().saturating_sub(pos));
                sec[0..take].copy_from_slice(&data[pos..pos+take]);
                sec[take..].fill(0);
                pos += take;
            }
        }
        Ok(())
    }
    fn free_groups(&mut self,fat: &mut FatBuffer,_param: &BasicParam,groups: &GroupList) {
        for g in groups.items() {
            Self::bitmap_set(fat,g.group,true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::param::builtin_params;

    #[test]
    fn bitmap_bits_are_msb_first() {
        let mut fat = FatBuffer { data: vec![0;64], dirty: false };
        ProdosType::bitmap_set(&mut fat,0,true);
        ProdosType::bitmap_set(&mut fat,10,true);
        assert_eq!(fat.data[0],0x80);
        assert_eq!(fat.data[1],0x20);
        assert!(ProdosType::bitmap_free(&fat,10));
    }

    #[test]
    fn blocks_span_two_sectors() {
        let param = builtin_params().into_iter().find(|p| p.kind==FormatKind::Prodos).unwrap();
        let item = ProdosType::block_item(&param,3,0);
        assert_eq!(item.size,BLOCK_SIZE);
        assert_eq!(param.chs_to_lsn(item.track,item.side,item.sector_start),6);
    }
}
