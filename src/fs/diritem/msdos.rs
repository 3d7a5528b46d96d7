//! ## MS-DOS / MSX-DOS FAT12 directory entries
//!
//! The classic 32 byte FAT entry: 8+3 name, attribute byte, packed DOS
//! time and date, 16 bit start cluster and 32 bit byte size.  First name
//! byte 0x00 terminates the scan, 0xE5 marks a deleted slot.  MSX-DOS uses
//! the identical layout; the two kinds share this implementation.

use chrono::{NaiveDate,NaiveDateTime};
use crate::fs::attr::FileAttr;
use crate::fs::group::GroupList;
use crate::fs::param::{BasicParam,FormatKind};
use super::{DirItemOps,hex_field,put_u16,string_from_field,u16_at};

const NAME: (usize,usize) = (0,8);
const EXT: (usize,usize) = (8,3);
const ATTR_OFF: usize = 0x0b;
const TIME_OFF: usize = 0x16;
const DATE_OFF: usize = 0x18;
const CLUSTER_OFF: usize = 0x1a;
const SIZE_OFF: usize = 0x1c;
const DELETED: u8 = 0xe5;

const ATTR_READONLY: u8 = 0x01;
const ATTR_HIDDEN: u8 = 0x02;
const ATTR_DIR: u8 = 0x10;

fn unpack_datetime(date: u16,time: u16) -> Option<NaiveDateTime> {
    let year = 1980 + (date >> 9) as i32;
    let month = ((date >> 5) & 0x0f) as u32;
    let day = (date & 0x1f) as u32;
    let hour = (time >> 11) as u32;
    let minute = ((time >> 5) & 0x3f) as u32;
    let second = ((time & 0x1f)*2) as u32;
    NaiveDate::from_ymd_opt(year,month,day)?.and_hms_opt(hour,minute,second)
}

fn pack_datetime(val: NaiveDateTime) -> (u16,u16) {
    use chrono::{Datelike,Timelike};
    let date = (((val.year()-1980) as u16) << 9) | ((val.month() as u16) << 5) | val.day() as u16;
    let time = ((val.hour() as u16) << 11) | ((val.minute() as u16) << 5) | (val.second() as u16)/2;
    (date,time)
}

pub struct MsdosOps {
    pub kind: FormatKind
}

impl DirItemOps for MsdosOps {
    fn kind(&self) -> FormatKind {
        self.kind
    }
    fn record_size(&self) -> usize {
        32
    }
    fn check(&self,rec: &[u8],last: &mut bool) -> bool {
        if rec[0]==0 {
            *last = true;
            return true;
        }
        if rec[0]==DELETED {
            return true;
        }
        rec[ATTR_OFF] & 0xc0==0
    }
    fn check_used(&self,rec: &[u8],_unuse_hint: bool) -> bool {
        rec[0] != 0 && rec[0] != DELETED
    }
    fn name_span(&self) -> (usize,usize) {
        NAME
    }
    fn ext_span(&self) -> Option<(usize,usize)> {
        Some(EXT)
    }
    fn file_type1(&self,rec: &[u8]) -> u8 {
        rec[ATTR_OFF]
    }
    fn set_file_type1(&self,rec: &mut [u8],_param: &BasicParam,val: u8) {
        rec[ATTR_OFF] = val;
    }
    fn file_attr(&self,rec: &[u8]) -> FileAttr {
        let t = rec[ATTR_OFF];
        let mut attr = match t & ATTR_DIR != 0 {
            true => FileAttr::DIRECTORY,
            false => FileAttr::DATA
        };
        if t & ATTR_READONLY != 0 {
            attr |= FileAttr::READONLY;
        }
        if t & ATTR_HIDDEN != 0 {
            attr |= FileAttr::HIDDEN;
        }
        attr
    }
    fn set_file_attr(&self,rec: &mut [u8],_param: &BasicParam,attr: FileAttr) {
        let mut t = 0;
        if attr.contains(FileAttr::DIRECTORY) {
            t |= ATTR_DIR;
        }
        if attr.contains(FileAttr::READONLY) {
            t |= ATTR_READONLY;
        }
        if attr.contains(FileAttr::HIDDEN) {
            t |= ATTR_HIDDEN;
        }
        rec[ATTR_OFF] = t;
    }
    fn file_size(&self,rec: &[u8],_param: &BasicParam,_groups: &GroupList) -> usize {
        u32::from_le_bytes([rec[SIZE_OFF],rec[SIZE_OFF+1],rec[SIZE_OFF+2],rec[SIZE_OFF+3]]) as usize
    }
    fn set_file_size(&self,rec: &mut [u8],_param: &BasicParam,val: usize) {
        rec[SIZE_OFF..SIZE_OFF+4].copy_from_slice(&(val as u32).to_le_bytes());
    }
    fn start_group(&self,rec: &[u8],unit: usize) -> Option<usize> {
        match unit {
            0 => match u16_at(rec,CLUSTER_OFF) {
                0 => None,
                c => Some(c as usize)
            },
            _ => None
        }
    }
    fn set_start_group(&self,rec: &mut [u8],unit: usize,group: usize) {
        if unit==0 {
            put_u16(rec,CLUSTER_OFF,group as u16);
        }
    }
    fn has_modify_datetime(&self) -> bool {
        true
    }
    fn modify_datetime(&self,rec: &[u8]) -> Option<NaiveDateTime> {
        unpack_datetime(u16_at(rec,DATE_OFF),u16_at(rec,TIME_OFF))
    }
    fn set_modify_datetime(&self,rec: &mut [u8],val: NaiveDateTime) {
        let (date,time) = pack_datetime(val);
        put_u16(rec,DATE_OFF,date);
        put_u16(rec,TIME_OFF,time);
    }
    fn delete(&self,rec: &mut [u8],_param: &BasicParam) {
        rec[0] = DELETED;
    }
    fn clear(&self,rec: &mut [u8],_param: &BasicParam) {
        rec.fill(0);
        rec[NAME.0..EXT.0+EXT.1].fill(0x20);
        rec[0] = 0;
    }
    fn inner_fields(&self,rec: &[u8]) -> Vec<(String,String)> {
        vec![
            ("NAME".to_string(),string_from_field(&rec[NAME.0..NAME.0+NAME.1],0x20)),
            ("EXT".to_string(),string_from_field(&rec[EXT.0..EXT.0+EXT.1],0x20)),
            hex_field("ATTR",&rec[ATTR_OFF..ATTR_OFF+1]),
            hex_field("TIME",&rec[TIME_OFF..TIME_OFF+2]),
            hex_field("DATE",&rec[DATE_OFF..DATE_OFF+2]),
            hex_field("CLUSTER",&rec[CLUSTER_OFF..CLUSTER_OFF+2]),
            hex_field("SIZE",&rec[SIZE_OFF..SIZE_OFF+4])
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dos_datetime_round_trip() {
        let dt = NaiveDate::from_ymd_opt(1993,6,15).unwrap().and_hms_opt(10,20,30).unwrap();
        let (date,time) = pack_datetime(dt);
        assert_eq!(unpack_datetime(date,time),Some(dt));
    }

    #[test]
    fn attr_bijection() {
        let ops = MsdosOps { kind: FormatKind::Msdos };
        let param = crate::fs::param::builtin_params()[8].clone();
        let combos = [
            FileAttr::DATA,
            FileAttr::DATA | FileAttr::READONLY,
            FileAttr::DIRECTORY,
            FileAttr::DATA | FileAttr::HIDDEN | FileAttr::READONLY
        ];
        for attr in combos {
            let mut rec = vec![0u8;32];
            ops.set_file_attr(&mut rec,&param,attr);
            assert_eq!(ops.file_attr(&rec),attr);
        }
    }
}
