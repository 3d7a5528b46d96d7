//! ## AmigaDOS OFS allocation strategy
//!
//! Everything is addressed by block number.  The root block sits at the
//! middle of the disk and carries a 72 entry hash table of file header
//! blocks, each header chaining to same-hash siblings and carrying its own
//! table of data blocks plus an extension pointer for long files.  The
//! allocation bitmap lives in its own block, a set bit means free, and
//! blocks 0/1 (boot) are not mapped at all.  Saving is not supported here
//! because it would mean synthesizing header blocks, only reading and
//! deleting are.

use crate::img::Disk;
use crate::fs::Error;
use crate::fs::diritem::{ops_for,DirItem};
use crate::fs::group::{FatAvail,GroupItem,GroupList};
use crate::fs::param::{BasicParam,FormatKind};
use super::{BasicType,FatBuffer};

const T_HEADER: u32 = 2;
const T_DATA: u32 = 8;
const ST_ROOT: u32 = 1;
/// hash table and data block table both hold 72 longs on 512 byte blocks
const TABLE_SIZE: usize = 72;
const TABLE_OFF: usize = 0x18;
/// data block table fills downward from here
const TABLE_END: usize = 0x138;
const DATA_SIZE_OFF: usize = 0x0c;
const DATA_PAYLOAD_OFF: usize = 0x18;
const DATA_PAYLOAD: usize = 488;
const BM_FLAG_OFF: usize = 0x138;
const BM_PAGES_OFF: usize = 0x13c;
const NAME_LEN_OFF: usize = 0x1b0;
const HASH_CHAIN_OFF: usize = 0x1f0;
const EXTENSION_OFF: usize = 0x1f8;
const SEC_TYPE_OFF: usize = 0x1fc;
const BOOT_BLOCKS: usize = 2;

fn u32_be(data: &[u8],off: usize) -> u32 {
    match data.len() >= off+4 {
        true => u32::from_be_bytes([data[off],data[off+1],data[off+2],data[off+3]]),
        false => 0
    }
}

fn put_u32_be(data: &mut [u8],off: usize,val: u32) {
    data[off..off+4].copy_from_slice(&val.to_be_bytes());
}

pub struct AmigaType;

impl AmigaType {
    pub fn new() -> Self {
        Self
    }
    /// bitmap words are big endian, bits LSB first, boot blocks unmapped
    fn bit_free(fat: &FatBuffer,block: usize) -> bool {
        if block < BOOT_BLOCKS {
            return false;
        }
        let i = block - BOOT_BLOCKS;
        let off = 4 + (i/32)*4;
        u32_be(&fat.data,off) & (1 << (i%32)) != 0
    }
    fn set_bit_free(fat: &mut FatBuffer,block: usize,free: bool) {
        if block < BOOT_BLOCKS {
            return;
        }
        let i = block - BOOT_BLOCKS;
        let off = 4 + (i/32)*4;
        if fat.data.len() >= off+4 {
            let mut word = u32_be(&fat.data,off);
            match free {
                true => word |= 1 << (i%32),
                false => word &= !(1 << (i%32))
            }
            put_u32_be(&mut fat.data,off,word);
            fat.dirty = true;
        }
    }
    /// expand a header's data block table, following the extension chain
    fn expand_table(&self,disk: &Disk,param: &BasicParam,header: usize) -> Result<GroupList,Error> {
        let mut list = GroupList::new();
        let mut block = header;
        for _ in 0..=param.fat_end_group {
            let (t,s,r) = param.lsn_to_chs(block);
            let hdr = disk.sector_data(t,s,r).ok_or(Error::SectorAccess)?;
            for i in 0..TABLE_SIZE {
                let data_block = u32_be(hdr,TABLE_END - 4*(i+1)) as usize;
                if data_block==0 {
                    break;
                }
                if data_block > param.fat_end_group || list.len() > param.fat_end_group {
                    return Err(Error::BrokenChain);
                }
                let (dt,ds,dr) = param.lsn_to_chs(data_block);
                let dat = disk.sector_data(dt,ds,dr).ok_or(Error::SectorAccess)?;
                let size = match u32_be(dat,0)==T_DATA {
                    true => (u32_be(dat,DATA_SIZE_OFF) as usize).min(DATA_PAYLOAD),
                    false => param.sector_size
                };
                list.push(GroupItem::new(data_block,0,dt,ds,dr,dr,size));
            }
            let ext = u32_be(hdr,EXTENSION_OFF) as usize;
            if ext==0 {
                return Ok(list);
            }
            if ext > param.fat_end_group || ext==block {
                return Err(Error::BrokenChain);
            }
            block = ext;
        }
        Err(Error::BrokenChain)
    }
}

impl BasicType for AmigaType {
    fn kind(&self) -> FormatKind {
        FormatKind::Amiga
    }
    fn group_number(&self,fat: &FatBuffer,param: &BasicParam,num: usize) -> usize {
        match Self::bit_free(fat,num) {
            true => param.group_unused_code,
            false => param.group_system_code
        }
    }
    fn set_group_number(&self,fat: &mut FatBuffer,param: &BasicParam,num: usize,val: usize) {
        Self::set_bit_free(fat,num,val==param.group_unused_code);
    }
    fn empty_group_number(&mut self,_disk: &Disk,fat: &FatBuffer,param: &BasicParam) -> Option<usize> {
        (BOOT_BLOCKS..=param.fat_end_group).find(|b| Self::bit_free(fat,*b))
    }
    fn calc_disk_free_size(&mut self,_disk: &Disk,fat: &FatBuffer,param: &BasicParam,live: &[GroupList]) -> Vec<FatAvail> {
        let mut ans: Vec<FatAvail> = (0..=param.fat_end_group).map(|b| match Self::bit_free(fat,b) {
            true => FatAvail::Free,
            false => FatAvail::Used
        }).collect();
        ans[0] = FatAvail::System;
        ans[1] = FatAvail::System;
        ans[param.dir_start_lsn] = FatAvail::System;
        ans[param.fat_start_lsn] = FatAvail::System;
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
            Some(header) => self.expand_table(disk,param,header),
            None => Ok(GroupList::new())
        }
    }
    fn allocate_unit_groups(&mut self,_disk: &Disk,_fat: &mut FatBuffer,_param: &BasicParam,_unit: usize,_data_size: usize) -> Result<GroupList,Error> {
        Err(Error::Unsupported)
    }
    fn check_fat(&self,disk: &Disk,_fat: &FatBuffer,param: &BasicParam) -> f64 {
        let (t,s,r) = param.lsn_to_chs(param.dir_start_lsn);
        let root = match disk.sector_data(t,s,r) {
            Some(d) => d,
            None => return -1.0
        };
        match u32_be(root,0)==T_HEADER && u32_be(root,SEC_TYPE_OFF)==ST_ROOT {
            true => 1.0,
            false => -1.0
        }
    }
    fn check_root_directory(&self,disk: &Disk,param: &BasicParam) -> f64 {
        let (t,s,r) = param.lsn_to_chs(param.dir_start_lsn);
        let root = match disk.sector_data(t,s,r) {
            Some(d) => d,
            None => return -1.0
        };
        if u32_be(root,0) != T_HEADER || u32_be(root,SEC_TYPE_OFF) != ST_ROOT {
            return -1.0;
        }
        match self.directory_sectors(disk,param) {
            Ok(_) => 1.0,
            Err(_) => -1.0
        }
    }
    /// The root's hash table and the per-header sibling chains give the
    /// header blocks, each of which is one directory record.  An untyped
    /// root scans as an empty directory so a blank disk can be attached
    /// for formatting.
    fn directory_sectors(&self,disk: &Disk,param: &BasicParam) -> Result<Vec<(u8,u8,u8)>,Error> {
        let (t,s,r) = param.lsn_to_chs(param.dir_start_lsn);
        let root = disk.sector_data(t,s,r).ok_or(Error::SectorAccess)?;
        if u32_be(root,0) != T_HEADER || u32_be(root,SEC_TYPE_OFF) != ST_ROOT {
            return Ok(Vec::new());
        }
        let mut ans = Vec::new();
        for i in 0..TABLE_SIZE {
            let mut block = u32_be(root,TABLE_OFF + 4*i) as usize;
            let mut hops = 0;
            while block != 0 {
                if block > param.fat_end_group || hops > param.fat_end_group {
                    return Err(Error::BrokenChain);
                }
                let chs = param.lsn_to_chs(block);
                ans.push(chs);
                let hdr = disk.sector_data(chs.0,chs.1,chs.2).ok_or(Error::SectorAccess)?;
                block = u32_be(hdr,HASH_CHAIN_OFF) as usize;
                hops += 1;
            }
        }
        Ok(ans)
    }
    /// OFS data blocks frame their payload behind a 24 byte header
    fn read_file(&self,disk: &Disk,_param: &BasicParam,groups: &GroupList) -> Result<Vec<u8>,Error> {
        let mut ans = Vec::new();
        for g in groups.items() {
            let dat = disk.sector_data(g.track,g.side,g.sector_start).ok_or(Error::SectorAccess)?;
            match u32_be(dat,0)==T_DATA {
                true => {
                    let take = g.size.min(dat.len().saturating_sub(DATA_PAYLOAD_OFF));
                    ans.extend_from_slice(&dat[DATA_PAYLOAD_OFF..DATA_PAYLOAD_OFF+take]);
                },
                false => {
                    let take = g.size.min(dat.len());
                    ans.extend_from_slice(&dat[0..take]);
                }
            }
        }
        Ok(ans)
    }
    fn free_groups(&mut self,fat: &mut FatBuffer,_param: &BasicParam,groups: &GroupList) {
        for g in groups.items() {
            Self::set_bit_free(fat,g.group,true);
        }
    }
    fn on_formatted(&self,disk: &mut Disk,fat: &mut FatBuffer,param: &BasicParam) {
        let (t,s,r) = param.lsn_to_chs(param.dir_start_lsn);
        if let Some(root) = disk.sector_data_mut(t,s,r) {
            root.fill(0);
            put_u32_be(root,0,T_HEADER);
            put_u32_be(root,DATA_SIZE_OFF,TABLE_SIZE as u32);
            put_u32_be(root,BM_FLAG_OFF,0xffffffff);
            put_u32_be(root,BM_PAGES_OFF,param.fat_start_lsn as u32);
            root[NAME_LEN_OFF] = 5;
            root[NAME_LEN_OFF+1..NAME_LEN_OFF+6].copy_from_slice(b"EMPTY");
            put_u32_be(root,SEC_TYPE_OFF,ST_ROOT);
        }
        fat.data.fill(0);
        for b in BOOT_BLOCKS..=param.fat_end_group {
            Self::set_bit_free(fat,b,true);
        }
        Self::set_bit_free(fat,param.dir_start_lsn,false);
        Self::set_bit_free(fat,param.fat_start_lsn,false);
        fat.dirty = true;
    }
    /// a reusable slot needs a header block, which is never synthesized
    /// here; a save is declined at allocation before any slot is written
    fn empty_dir_slot(&self,_items: &[DirItem],children: &[usize]) -> Option<usize> {
        children.first().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::img::{DiskDensity,Sector,Track};
    use crate::fs::param::builtin_params;

    fn amiga_param() -> BasicParam {
        builtin_params().into_iter().find(|p| p.kind==FormatKind::Amiga).unwrap()
    }

    /// root, bitmap and a small file all land on cylinder 40 side 0
    fn disk_with_middle_track() -> Disk {
        let mut disk = Disk::new("test",DiskDensity::D2DD);
        let mut trk = Track::new(40,0,80);
        for r in 1..=11 {
            trk.add_sector(Sector::new(40,0,r,2,vec![0;512]));
        }
        disk.add_track(trk,1);
        disk
    }

    #[test]
    fn bitmap_bits_are_lsb_first_words() {
        let mut fat = FatBuffer { data: vec![0;512], dirty: false };
        AmigaType::set_bit_free(&mut fat,2,true);
        AmigaType::set_bit_free(&mut fat,35,true);
        // block 2 is bit 0 of word 0, block 35 is bit 1 of word 1
        assert_eq!(&fat.data[4..8],&[0,0,0,1]);
        assert_eq!(&fat.data[8..12],&[0,0,0,2]);
        assert!(AmigaType::bit_free(&fat,2));
        assert!(AmigaType::bit_free(&fat,35));
        assert!(!AmigaType::bit_free(&fat,3));
        assert!(!AmigaType::bit_free(&fat,0));
    }

    #[test]
    fn allocation_is_declined() {
        let param = amiga_param();
        let disk = disk_with_middle_track();
        let mut t = AmigaType::new();
        let mut fat = FatBuffer { data: vec![0;512], dirty: false };
        assert!(matches!(t.allocate_unit_groups(&disk,&mut fat,&param,0,100),Err(Error::Unsupported)));
    }

    #[test]
    fn hash_table_yields_header_blocks() {
        let param = amiga_param();
        let mut disk = disk_with_middle_track();
        {
            let root = disk.sector_data_mut(40,0,1).unwrap();
            put_u32_be(root,0,T_HEADER);
            put_u32_be(root,TABLE_OFF,882);
            put_u32_be(root,SEC_TYPE_OFF,ST_ROOT);
        }
        {
            let hdr = disk.sector_data_mut(40,0,3).unwrap();
            put_u32_be(hdr,0,T_HEADER);
        }
        let t = AmigaType::new();
        assert_eq!(t.directory_sectors(&disk,&param).unwrap(),vec![(40,0,3)]);
        assert!(t.check_fat(&disk,&FatBuffer { data: vec![],dirty: false },&param) > 0.0);
    }

    #[test]
    fn data_table_expands_with_framing() {
        let param = amiga_param();
        let mut disk = disk_with_middle_track();
        {
            let hdr = disk.sector_data_mut(40,0,3).unwrap();
            put_u32_be(hdr,0,T_HEADER);
            put_u32_be(hdr,4,882);
            put_u32_be(hdr,TABLE_END-4,883);
            put_u32_be(hdr,TABLE_END-8,884);
        }
        {
            let dat = disk.sector_data_mut(40,0,4).unwrap();
            put_u32_be(dat,0,T_DATA);
            put_u32_be(dat,DATA_SIZE_OFF,DATA_PAYLOAD as u32);
            for i in 0..DATA_PAYLOAD {
                dat[DATA_PAYLOAD_OFF+i] = b'A';
            }
        }
        {
            let dat = disk.sector_data_mut(40,0,5).unwrap();
            put_u32_be(dat,0,T_DATA);
            put_u32_be(dat,DATA_SIZE_OFF,212);
            for i in 0..212 {
                dat[DATA_PAYLOAD_OFF+i] = b'B';
            }
        }
        let t = AmigaType::new();
        let fat = FatBuffer { data: vec![],dirty: false };
        let rec = disk.sector_data(40,0,3).unwrap().to_vec();
        let list = t.unit_groups(&disk,&fat,&param,&rec,0).unwrap();
        assert_eq!(list.len(),2);
        assert_eq!(list.total_size(),700);
        let bytes = t.read_file(&disk,&param,&list).unwrap();
        assert_eq!(bytes.len(),700);
        assert!(bytes[0..DATA_PAYLOAD].iter().all(|b| *b==b'A'));
        assert!(bytes[DATA_PAYLOAD..].iter().all(|b| *b==b'B'));
    }
}
