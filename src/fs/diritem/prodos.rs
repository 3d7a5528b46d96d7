//! ## ProDOS directory entries
//!
//! 39 byte record: storage type and name length packed in the first byte,
//! 15 character name, file type, key block pointer, blocks used, a 24 bit
//! EOF, packed create/modify datetimes, access byte and aux type.  Entries
//! sit 13 to a 512 byte block after a 4 byte block header, so a record can
//! straddle the underlying 256 byte sector boundary.

use chrono::{NaiveDate,NaiveDateTime};
use crate::fs::attr::FileAttr;
use crate::fs::group::GroupList;
use crate::fs::param::{BasicParam,FormatKind};
use super::{DirItemOps,hex_field,put_u16,u16_at};

const STORAGE_OFF: usize = 0;
const NAME: (usize,usize) = (1,15);
const TYPE_OFF: usize = 0x10;
const KEY_OFF: usize = 0x11;
const BLOCKS_OFF: usize = 0x13;
const EOF_OFF: usize = 0x15;
const CREATE_OFF: usize = 0x18;
const ACCESS_OFF: usize = 0x1e;
const AUX_OFF: usize = 0x1f;
const MODIFY_OFF: usize = 0x21;
const BLOCK_HEADER: usize = 4;
const BLOCK_SIZE: usize = 512;

const STORAGE_SEEDLING: u8 = 0x1;
const STORAGE_SAPLING: u8 = 0x2;
const STORAGE_DIR: u8 = 0xd;
const TYPE_TEXT: u8 = 0x04;
const TYPE_BINARY: u8 = 0x06;
const TYPE_BASIC: u8 = 0xfc;
const ACCESS_WRITE: u8 = 0x02;
const ACCESS_DEFAULT: u8 = 0xc3;

fn unpack_datetime(rec: &[u8],off: usize) -> Option<NaiveDateTime> {
    let date = u16_at(rec,off);
    let time = u16_at(rec,off+2);
    let year = 1900 + (date >> 9) as i32;
    let year = match year < 1940 {
        true => year + 100,
        false => year
    };
    let month = ((date >> 5) & 0x0f) as u32;
    let day = (date & 0x1f) as u32;
    NaiveDate::from_ymd_opt(year,month,day)?
        .and_hms_opt(((time >> 8) & 0x1f) as u32,(time & 0x3f) as u32,0)
}

fn pack_datetime(rec: &mut [u8],off: usize,val: NaiveDateTime) {
    use chrono::{Datelike,Timelike};
    let date = (((val.year() % 100) as u16) << 9) | ((val.month() as u16) << 5) | val.day() as u16;
    let time = ((val.hour() as u16) << 8) | val.minute() as u16;
    put_u16(rec,off,date);
    put_u16(rec,off+2,time);
}

pub struct ProdosOps;

impl DirItemOps for ProdosOps {
    fn kind(&self) -> FormatKind {
        FormatKind::Prodos
    }
    fn record_size(&self) -> usize {
        39
    }
    fn record_offsets(&self,stream_len: usize,_sector_size: usize) -> Vec<usize> {
        let per_block = (BLOCK_SIZE - BLOCK_HEADER)/self.record_size();
        let mut ans = Vec::new();
        for block in 0..stream_len/BLOCK_SIZE {
            for i in 0..per_block {
                ans.push(block*BLOCK_SIZE + BLOCK_HEADER + i*self.record_size());
            }
        }
        ans
    }
    fn check(&self,rec: &[u8],_last: &mut bool) -> bool {
        let storage = rec[STORAGE_OFF] >> 4;
        let name_len = (rec[STORAGE_OFF] & 0x0f) as usize;
        if rec[STORAGE_OFF]==0 {
            return true;
        }
        matches!(storage,1|2|3|0xd|0xe|0xf) && name_len >= 1 && name_len <= NAME.1
    }
    fn check_used(&self,rec: &[u8],_unuse_hint: bool) -> bool {
        rec[STORAGE_OFF] != 0
    }
    fn name_span(&self) -> (usize,usize) {
        NAME
    }
    fn name_pad(&self) -> u8 {
        0x00
    }
    fn set_name(&self,rec: &mut [u8],name: &str) {
        Self::store_name(rec,name);
    }
    fn file_type1(&self,rec: &[u8]) -> u8 {
        rec[TYPE_OFF]
    }
    fn set_file_type1(&self,rec: &mut [u8],_param: &BasicParam,val: u8) {
        rec[TYPE_OFF] = val;
    }
    fn file_type2(&self,rec: &[u8]) -> Option<u8> {
        Some(rec[STORAGE_OFF] >> 4)
    }
    fn set_file_type2(&self,rec: &mut [u8],val: u8) {
        rec[STORAGE_OFF] = (val << 4) | (rec[STORAGE_OFF] & 0x0f);
    }
    fn file_attr(&self,rec: &[u8]) -> FileAttr {
        let mut attr = match rec[STORAGE_OFF] >> 4==STORAGE_DIR {
            true => FileAttr::DIRECTORY,
            false => match rec[TYPE_OFF] {
                TYPE_TEXT => FileAttr::DATA | FileAttr::ASCII,
                TYPE_BASIC => FileAttr::BASIC | FileAttr::BINARY,
                _ => FileAttr::MACHINE | FileAttr::BINARY
            }
        };
        if rec[ACCESS_OFF] & ACCESS_WRITE==0 {
            attr |= FileAttr::READONLY;
        }
        attr
    }
    fn set_file_attr(&self,rec: &mut [u8],_param: &BasicParam,attr: FileAttr) {
        if attr.contains(FileAttr::DIRECTORY) {
            self.set_file_type2(rec,STORAGE_DIR);
        } else {
            rec[TYPE_OFF] = match (attr.contains(FileAttr::BASIC),attr.contains(FileAttr::ASCII)) {
                (true,_) => TYPE_BASIC,
                (_,true) => TYPE_TEXT,
                _ => TYPE_BINARY
            };
        }
        rec[ACCESS_OFF] = match attr.contains(FileAttr::READONLY) {
            true => ACCESS_DEFAULT & !ACCESS_WRITE,
            false => ACCESS_DEFAULT
        };
    }
    fn file_size(&self,rec: &[u8],_param: &BasicParam,_groups: &GroupList) -> usize {
        rec[EOF_OFF] as usize | (rec[EOF_OFF+1] as usize) << 8 | (rec[EOF_OFF+2] as usize) << 16
    }
    fn set_file_size(&self,rec: &mut [u8],_param: &BasicParam,val: usize) {
        rec[EOF_OFF] = val as u8;
        rec[EOF_OFF+1] = (val >> 8) as u8;
        rec[EOF_OFF+2] = (val >> 16) as u8;
    }
    fn start_group(&self,rec: &[u8],unit: usize) -> Option<usize> {
        match unit {
            0 => match u16_at(rec,KEY_OFF) {
                0 => None,
                b => Some(b as usize)
            },
            _ => None
        }
    }
    fn set_start_group(&self,rec: &mut [u8],unit: usize,group: usize) {
        if unit==0 {
            put_u16(rec,KEY_OFF,group as u16);
        }
    }
    /// the key pointer, storage type and block count all follow from the
    /// shape of the allocation
    fn set_groups(&self,rec: &mut [u8],groups: &GroupList) {
        if let Some(first) = groups.first_group() {
            self.set_start_group(rec,0,first);
        }
        let storage = match groups.items().iter().any(|g| g.division==1) {
            true => STORAGE_SAPLING,
            false => STORAGE_SEEDLING
        };
        self.set_file_type2(rec,storage);
        put_u16(rec,BLOCKS_OFF,groups.len() as u16);
    }
    fn has_address(&self) -> bool {
        true
    }
    /// aux type is the load address for binary files
    fn start_address(&self,rec: &[u8]) -> Option<u16> {
        Some(u16_at(rec,AUX_OFF))
    }
    fn set_start_address(&self,rec: &mut [u8],val: u16) {
        put_u16(rec,AUX_OFF,val);
    }
    fn has_create_datetime(&self) -> bool {
        true
    }
    fn has_modify_datetime(&self) -> bool {
        true
    }
    fn create_datetime(&self,rec: &[u8]) -> Option<NaiveDateTime> {
        unpack_datetime(rec,CREATE_OFF)
    }
    fn modify_datetime(&self,rec: &[u8]) -> Option<NaiveDateTime> {
        unpack_datetime(rec,MODIFY_OFF)
    }
    fn set_create_datetime(&self,rec: &mut [u8],val: NaiveDateTime) {
        pack_datetime(rec,CREATE_OFF,val);
    }
    fn set_modify_datetime(&self,rec: &mut [u8],val: NaiveDateTime) {
        pack_datetime(rec,MODIFY_OFF,val);
    }
    fn delete(&self,rec: &mut [u8],_param: &BasicParam) {
        rec[STORAGE_OFF] = 0;
    }
    fn clear(&self,rec: &mut [u8],_param: &BasicParam) {
        rec.fill(0);
    }
    fn inner_fields(&self,rec: &[u8]) -> Vec<(String,String)> {
        vec![
            hex_field("STORAGE",&rec[STORAGE_OFF..STORAGE_OFF+1]),
            hex_field("TYPE",&rec[TYPE_OFF..TYPE_OFF+1]),
            hex_field("KEY",&rec[KEY_OFF..KEY_OFF+2]),
            hex_field("BLOCKS",&rec[BLOCKS_OFF..BLOCKS_OFF+2]),
            hex_field("EOF",&rec[EOF_OFF..EOF_OFF+3]),
            hex_field("ACCESS",&rec[ACCESS_OFF..ACCESS_OFF+1]),
            hex_field("AUX",&rec[AUX_OFF..AUX_OFF+2])
        ]
    }
}

impl ProdosOps {
    /// name handling is length prefixed rather than padded
    pub fn stored_name(rec: &[u8]) -> String {
        let len = (rec[STORAGE_OFF] & 0x0f) as usize;
        rec[NAME.0..NAME.0+len.min(NAME.1)].iter().map(|b| (b & 0x7f) as char).collect()
    }
    pub fn store_name(rec: &mut [u8],name: &str) {
        let bytes: Vec<u8> = name.bytes().take(NAME.1).collect();
        rec[NAME.0..NAME.0+NAME.1].fill(0);
        rec[NAME.0..NAME.0+bytes.len()].copy_from_slice(&bytes);
        rec[STORAGE_OFF] = (rec[STORAGE_OFF] & 0xf0) | bytes.len() as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_datetime_round_trip() {
        let ops = ProdosOps;
        let mut rec = vec![0u8;39];
        let dt = NaiveDate::from_ymd_opt(1986,7,4).unwrap().and_hms_opt(9,41,0).unwrap();
        ops.set_create_datetime(&mut rec,dt);
        assert_eq!(ops.create_datetime(&rec),Some(dt));
    }

    #[test]
    fn length_prefixed_name() {
        let mut rec = vec![0u8;39];
        ProdosOps::store_name(&mut rec,"STARTUP");
        assert_eq!(rec[0] & 0x0f,7);
        assert_eq!(ProdosOps::stored_name(&rec),"STARTUP");
    }
}
