//! ## X-DOS directory entries
//!
//! 32 byte record: a 16 character name, a type byte, a flag byte
//! (0x01 protect), the start group, a 16 bit sector count and a
//! year/month/day stamp counted from 1980.  First name byte 0x00 marks a
//! never used slot, 0xFF a deleted one.

use chrono::{Datelike,NaiveDate,NaiveDateTime};
use crate::fs::attr::FileAttr;
use crate::fs::group::GroupList;
use crate::fs::param::{BasicParam,FormatKind};
use super::{DirItemOps,hex_field,put_u16,string_from_field,u16_at};

const NAME: (usize,usize) = (0,16);
const TYPE_OFF: usize = 16;
const FLAGS_OFF: usize = 17;
const GROUP_OFF: usize = 18;
const SECTORS_OFF: usize = 19;
const DATE_OFF: usize = 21;
const DELETED: u8 = 0xff;

const TYPE_BASIC: u8 = 0;
const TYPE_DATA: u8 = 1;
const TYPE_MACHINE: u8 = 2;
const FLAG_PROTECT: u8 = 0x01;

pub struct XdosOps;

impl DirItemOps for XdosOps {
    fn kind(&self) -> FormatKind {
        FormatKind::Xdos
    }
    fn record_size(&self) -> usize {
        32
    }
    fn check(&self,rec: &[u8],_last: &mut bool) -> bool {
        if rec[0]==0 || rec[0]==DELETED {
            return true;
        }
        if rec[TYPE_OFF] > TYPE_MACHINE || rec[FLAGS_OFF] & !FLAG_PROTECT != 0 {
            return false;
        }
        rec[NAME.0..NAME.0+NAME.1].iter().all(|b| *b >= 0x20 || *b==0)
    }
    fn check_used(&self,rec: &[u8],_unuse_hint: bool) -> bool {
        rec[0] != 0 && rec[0] != DELETED
    }
    fn name_span(&self) -> (usize,usize) {
        NAME
    }
    fn file_type1(&self,rec: &[u8]) -> u8 {
        rec[TYPE_OFF]
    }
    fn set_file_type1(&self,rec: &mut [u8],_param: &BasicParam,val: u8) {
        rec[TYPE_OFF] = val;
    }
    fn file_attr(&self,rec: &[u8]) -> FileAttr {
        let mut attr = match rec[TYPE_OFF] {
            TYPE_DATA => FileAttr::DATA | FileAttr::ASCII,
            TYPE_MACHINE => FileAttr::MACHINE | FileAttr::BINARY,
            _ => FileAttr::BASIC | FileAttr::BINARY
        };
        if rec[FLAGS_OFF] & FLAG_PROTECT != 0 {
            attr |= FileAttr::READONLY;
        }
        attr
    }
    fn set_file_attr(&self,rec: &mut [u8],_param: &BasicParam,attr: FileAttr) {
        rec[TYPE_OFF] = match (attr.contains(FileAttr::DATA),attr.contains(FileAttr::MACHINE)) {
            (true,_) => TYPE_DATA,
            (_,true) => TYPE_MACHINE,
            _ => TYPE_BASIC
        };
        rec[FLAGS_OFF] = match attr.contains(FileAttr::READONLY) {
            true => FLAG_PROTECT,
            false => 0
        };
    }
    fn file_size(&self,rec: &[u8],param: &BasicParam,groups: &GroupList) -> usize {
        match groups.is_empty() {
            false => groups.total_size(),
            true => u16_at(rec,SECTORS_OFF) as usize*param.sector_size
        }
    }
    fn set_file_size(&self,rec: &mut [u8],param: &BasicParam,val: usize) {
        let sectors = (val + param.sector_size - 1)/param.sector_size;
        put_u16(rec,SECTORS_OFF,sectors as u16);
    }
    fn start_group(&self,rec: &[u8],unit: usize) -> Option<usize> {
        match unit {
            0 => Some(rec[GROUP_OFF] as usize),
            _ => None
        }
    }
    fn set_start_group(&self,rec: &mut [u8],unit: usize,group: usize) {
        if unit==0 {
            rec[GROUP_OFF] = group as u8;
        }
    }
    fn has_modify_datetime(&self) -> bool {
        true
    }
    fn modify_datetime(&self,rec: &[u8]) -> Option<NaiveDateTime> {
        let year = 1980 + rec[DATE_OFF] as i32;
        NaiveDate::from_ymd_opt(year,rec[DATE_OFF+1] as u32,rec[DATE_OFF+2] as u32)
            .and_then(|d| d.and_hms_opt(0,0,0))
    }
    fn set_modify_datetime(&self,rec: &mut [u8],val: NaiveDateTime) {
        let date = val.date();
        rec[DATE_OFF] = (date.year() - 1980).clamp(0,255) as u8;
        rec[DATE_OFF+1] = date.month() as u8;
        rec[DATE_OFF+2] = date.day() as u8;
    }
    fn delete(&self,rec: &mut [u8],_param: &BasicParam) {
        rec[0] = DELETED;
    }
    fn needs_eof_scan(&self,attr: FileAttr) -> bool {
        attr.contains(FileAttr::ASCII)
    }
    fn inner_fields(&self,rec: &[u8]) -> Vec<(String,String)> {
        vec![
            ("NAME".to_string(),string_from_field(&rec[NAME.0..NAME.0+NAME.1],0x20)),
            hex_field("TYPE",&rec[TYPE_OFF..TYPE_OFF+1]),
            hex_field("FLAGS",&rec[FLAGS_OFF..FLAGS_OFF+1]),
            hex_field("GROUP",&rec[GROUP_OFF..GROUP_OFF+1]),
            hex_field("SECTORS",&rec[SECTORS_OFF..SECTORS_OFF+2]),
            hex_field("DATE",&rec[DATE_OFF..DATE_OFF+3])
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::param::builtin_params;

    fn param() -> BasicParam {
        builtin_params().into_iter().find(|p| p.kind==FormatKind::Xdos).unwrap()
    }

    #[test]
    fn attr_bijection() {
        let ops = XdosOps;
        let param = param();
        let combos = [
            FileAttr::BASIC | FileAttr::BINARY,
            FileAttr::DATA | FileAttr::ASCII,
            FileAttr::MACHINE | FileAttr::BINARY | FileAttr::READONLY
        ];
        for attr in combos {
            let mut rec = vec![0u8;32];
            ops.set_file_attr(&mut rec,&param,attr);
            assert_eq!(ops.file_attr(&rec),attr);
        }
    }

    #[test]
    fn date_round_trip() {
        let ops = XdosOps;
        let mut rec = vec![0u8;32];
        let stamp = NaiveDate::from_ymd_opt(1987,6,15).unwrap().and_hms_opt(0,0,0).unwrap();
        ops.set_modify_datetime(&mut rec,stamp);
        assert_eq!(ops.modify_datetime(&rec),Some(stamp));
    }

    #[test]
    fn sentinels() {
        let ops = XdosOps;
        let mut rec = vec![0u8;32];
        assert!(!ops.check_used(&rec,false));
        rec[0] = b'X';
        assert!(ops.check_used(&rec,false));
        rec[0] = 0xff;
        assert!(!ops.check_used(&rec,false));
    }
}
