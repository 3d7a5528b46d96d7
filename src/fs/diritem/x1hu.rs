//! ## Hu-BASIC (X1) directory entries
//!
//! 32 byte record: type byte, 13 character name, 3 character extension,
//! password byte, load/length/execute addresses, BCD date and time, and a
//! 16 bit start group (the split-halves FAT can address more than 255
//! groups).  Type byte 0x00 marks a never used slot and terminates the
//! scan; 0xFF marks a deleted slot.

use chrono::{NaiveDate,NaiveDateTime};
use crate::fs::attr::FileAttr;
use crate::fs::group::GroupList;
use crate::fs::param::{BasicParam,FormatKind};
use super::{DirItemOps,hex_field,put_u16,string_from_field,u16_at};

const TYPE_OFF: usize = 0;
const NAME: (usize,usize) = (1,13);
const EXT: (usize,usize) = (14,3);
const PASSWORD_OFF: usize = 17;
const LOAD_OFF: usize = 18;
const LENGTH_OFF: usize = 20;
const EXEC_OFF: usize = 22;
const DATE_OFF: usize = 24;
const TIME_OFF: usize = 27;
const GROUP_OFF: usize = 30;
const DELETED: u8 = 0xff;
const NO_PASSWORD: u8 = 0x20;

const ATTR_BINARY: u8 = 0x01;
const ATTR_BASIC: u8 = 0x02;
const ATTR_ASCII: u8 = 0x04;
const ATTR_HIDDEN: u8 = 0x10;
const ATTR_READONLY: u8 = 0x40;
const ATTR_DIR: u8 = 0x80;

fn from_bcd(b: u8) -> u32 {
    ((b >> 4) as u32)*10 + (b & 0x0f) as u32
}

fn to_bcd(v: u32) -> u8 {
    (((v/10) << 4) | (v%10)) as u8
}

pub struct X1huOps;

impl DirItemOps for X1huOps {
    fn kind(&self) -> FormatKind {
        FormatKind::X1Hu
    }
    fn record_size(&self) -> usize {
        32
    }
    fn check(&self,rec: &[u8],last: &mut bool) -> bool {
        match rec[TYPE_OFF] {
            0 => {
                *last = true;
                true
            },
            DELETED => true,
            t => t & (ATTR_BINARY|ATTR_BASIC|ATTR_ASCII|ATTR_DIR) != 0
        }
    }
    fn check_used(&self,rec: &[u8],_unuse_hint: bool) -> bool {
        rec[TYPE_OFF] != 0 && rec[TYPE_OFF] != DELETED
    }
    fn name_span(&self) -> (usize,usize) {
        NAME
    }
    fn ext_span(&self) -> Option<(usize,usize)> {
        Some(EXT)
    }
    fn file_type1(&self,rec: &[u8]) -> u8 {
        rec[TYPE_OFF]
    }
    fn set_file_type1(&self,rec: &mut [u8],_param: &BasicParam,val: u8) {
        rec[TYPE_OFF] = val;
    }
    fn file_attr(&self,rec: &[u8]) -> FileAttr {
        let t = rec[TYPE_OFF];
        let mut attr = FileAttr::empty();
        if t & ATTR_BINARY != 0 {
            attr |= FileAttr::MACHINE | FileAttr::BINARY;
        }
        if t & ATTR_BASIC != 0 {
            attr |= FileAttr::BASIC;
        }
        if t & ATTR_ASCII != 0 {
            attr |= FileAttr::ASCII;
        }
        if t & ATTR_HIDDEN != 0 {
            attr |= FileAttr::HIDDEN;
        }
        if t & ATTR_READONLY != 0 {
            attr |= FileAttr::READONLY;
        }
        if t & ATTR_DIR != 0 {
            attr |= FileAttr::DIRECTORY;
        }
        attr
    }
    fn set_file_attr(&self,rec: &mut [u8],_param: &BasicParam,attr: FileAttr) {
        let mut t = 0;
        if attr.contains(FileAttr::MACHINE) {
            t |= ATTR_BINARY;
        }
        if attr.contains(FileAttr::BASIC) {
            t |= ATTR_BASIC;
        }
        if attr.contains(FileAttr::ASCII) {
            t |= ATTR_ASCII;
        }
        if attr.contains(FileAttr::HIDDEN) {
            t |= ATTR_HIDDEN;
        }
        if attr.contains(FileAttr::READONLY) {
            t |= ATTR_READONLY;
        }
        if attr.contains(FileAttr::DIRECTORY) {
            t |= ATTR_DIR;
        }
        rec[TYPE_OFF] = t;
    }
    /// explicit length for binary files, derived from the chain for ASCII
    fn file_size(&self,rec: &[u8],_param: &BasicParam,groups: &GroupList) -> usize {
        match u16_at(rec,LENGTH_OFF) {
            0 => groups.total_size(),
            n => n as usize
        }
    }
    fn set_file_size(&self,rec: &mut [u8],_param: &BasicParam,val: usize) {
        put_u16(rec,LENGTH_OFF,val as u16);
    }
    fn start_group(&self,rec: &[u8],unit: usize) -> Option<usize> {
        match unit {
            0 => Some(u16_at(rec,GROUP_OFF) as usize),
            _ => None
        }
    }
    fn set_start_group(&self,rec: &mut [u8],unit: usize,group: usize) {
        if unit==0 {
            put_u16(rec,GROUP_OFF,group as u16);
        }
    }
    fn has_address(&self) -> bool {
        true
    }
    fn start_address(&self,rec: &[u8]) -> Option<u16> {
        Some(u16_at(rec,LOAD_OFF))
    }
    fn end_address(&self,rec: &[u8]) -> Option<u16> {
        Some(u16_at(rec,LOAD_OFF).wrapping_add(u16_at(rec,LENGTH_OFF)))
    }
    fn execute_address(&self,rec: &[u8]) -> Option<u16> {
        Some(u16_at(rec,EXEC_OFF))
    }
    fn set_start_address(&self,rec: &mut [u8],val: u16) {
        put_u16(rec,LOAD_OFF,val);
    }
    fn set_execute_address(&self,rec: &mut [u8],val: u16) {
        put_u16(rec,EXEC_OFF,val);
    }
    fn has_create_datetime(&self) -> bool {
        true
    }
    fn create_datetime(&self,rec: &[u8]) -> Option<NaiveDateTime> {
        let yy = from_bcd(rec[DATE_OFF]);
        let year = match yy < 80 {
            true => 2000 + yy,
            false => 1900 + yy
        };
        let date = NaiveDate::from_ymd_opt(year as i32,from_bcd(rec[DATE_OFF+1]),from_bcd(rec[DATE_OFF+2]))?;
        date.and_hms_opt(from_bcd(rec[TIME_OFF]),from_bcd(rec[TIME_OFF+1]),0)
    }
    fn set_create_datetime(&self,rec: &mut [u8],val: NaiveDateTime) {
        use chrono::{Datelike,Timelike};
        rec[DATE_OFF] = to_bcd(val.year() as u32 % 100);
        rec[DATE_OFF+1] = to_bcd(val.month());
        rec[DATE_OFF+2] = to_bcd(val.day());
        rec[TIME_OFF] = to_bcd(val.hour());
        rec[TIME_OFF+1] = to_bcd(val.minute());
    }
    fn delete(&self,rec: &mut [u8],_param: &BasicParam) {
        rec[TYPE_OFF] = DELETED;
    }
    fn clear(&self,rec: &mut [u8],_param: &BasicParam) {
        rec.fill(0);
        rec[PASSWORD_OFF] = NO_PASSWORD;
    }
    fn needs_eof_scan(&self,attr: FileAttr) -> bool {
        attr.contains(FileAttr::ASCII)
    }
    fn inner_fields(&self,rec: &[u8]) -> Vec<(String,String)> {
        vec![
            hex_field("TYPE",&rec[TYPE_OFF..TYPE_OFF+1]),
            ("NAME".to_string(),string_from_field(&rec[NAME.0..NAME.0+NAME.1],0x20)),
            ("EXT".to_string(),string_from_field(&rec[EXT.0..EXT.0+EXT.1],0x20)),
            hex_field("PASSWORD",&rec[PASSWORD_OFF..PASSWORD_OFF+1]),
            hex_field("LOAD",&rec[LOAD_OFF..LOAD_OFF+2]),
            hex_field("LENGTH",&rec[LENGTH_OFF..LENGTH_OFF+2]),
            hex_field("EXEC",&rec[EXEC_OFF..EXEC_OFF+2]),
            hex_field("DATE",&rec[DATE_OFF..DATE_OFF+3]),
            hex_field("TIME",&rec[TIME_OFF..TIME_OFF+2]),
            hex_field("GROUP",&rec[GROUP_OFF..GROUP_OFF+2])
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attr_bijection() {
        let ops = X1huOps;
        let param = crate::fs::param::builtin_params()[2].clone();
        let combos = [
            FileAttr::MACHINE | FileAttr::BINARY,
            FileAttr::BASIC,
            FileAttr::ASCII | FileAttr::READONLY,
            FileAttr::DIRECTORY,
            FileAttr::BASIC | FileAttr::HIDDEN
        ];
        for attr in combos {
            let mut rec = vec![0u8;32];
            ops.set_file_attr(&mut rec,&param,attr);
            assert_eq!(ops.file_attr(&rec),attr);
        }
    }

    #[test]
    fn bcd_datetime() {
        let ops = X1huOps;
        let mut rec = vec![0u8;32];
        let dt = NaiveDate::from_ymd_opt(1985,12,3).unwrap().and_hms_opt(14,30,0).unwrap();
        ops.set_create_datetime(&mut rec,dt);
        assert_eq!(rec[DATE_OFF],0x85);
        assert_eq!(rec[DATE_OFF+1],0x12);
        assert_eq!(ops.create_datetime(&rec),Some(dt));
    }
}
