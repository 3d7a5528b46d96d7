//! ## AmigaDOS directory entries
//!
//! There is no packed directory table: every entry is a whole 512 byte
//! file header block reached through the root block's hash table, so the
//! record here is the block itself.  Longwords are big endian.  The name
//! is length prefixed, protection bits are active low denials, and the
//! stamp counts days since 1978-01-01 plus minutes and 1/50 second ticks.
//! A zeroed type longword marks a dead block.

use chrono::{Duration,NaiveDate,NaiveDateTime,Timelike};
use crate::fs::attr::FileAttr;
use crate::fs::group::GroupList;
use crate::fs::param::{BasicParam,FormatKind};
use super::{DirItemOps,hex_field,string_from_field};

const TYPE_OFF: usize = 0;
const HEADER_KEY_OFF: usize = 4;
const PROTECT_OFF: usize = 0x140;
const BYTE_SIZE_OFF: usize = 0x144;
const DAYS_OFF: usize = 0x1a4;
const MINS_OFF: usize = 0x1a8;
const TICKS_OFF: usize = 0x1ac;
const NAME_LEN_OFF: usize = 0x1b0;
const NAME: (usize,usize) = (0x1b1,30);
const SEC_TYPE_OFF: usize = 0x1fc;

const T_HEADER: u32 = 2;
const ST_USERDIR: u32 = 2;
const ST_FILE: u32 = 0xffff_fffd;
const PROTECT_W: u32 = 0x04;

pub fn u32_be_at(rec: &[u8],off: usize) -> u32 {
    u32::from_be_bytes([rec[off],rec[off+1],rec[off+2],rec[off+3]])
}

pub fn put_u32_be(rec: &mut [u8],off: usize,val: u32) {
    rec[off..off+4].copy_from_slice(&val.to_be_bytes());
}

pub struct AmigaOps;

impl DirItemOps for AmigaOps {
    fn kind(&self) -> FormatKind {
        FormatKind::Amiga
    }
    fn record_size(&self) -> usize {
        512
    }
    fn check(&self,rec: &[u8],_last: &mut bool) -> bool {
        if u32_be_at(rec,TYPE_OFF)==0 {
            return true;
        }
        u32_be_at(rec,TYPE_OFF)==T_HEADER
            && matches!(u32_be_at(rec,SEC_TYPE_OFF),ST_USERDIR|ST_FILE)
    }
    fn check_used(&self,rec: &[u8],_unuse_hint: bool) -> bool {
        u32_be_at(rec,TYPE_OFF)==T_HEADER
    }
    fn name_span(&self) -> (usize,usize) {
        NAME
    }
    fn name_pad(&self) -> u8 {
        0x00
    }
    /// the length prefix travels with the characters
    fn set_name(&self,rec: &mut [u8],name: &str) {
        let bytes = name.as_bytes();
        let len = bytes.len().min(NAME.1);
        rec[NAME_LEN_OFF] = len as u8;
        rec[NAME.0..NAME.0+NAME.1].fill(0);
        rec[NAME.0..NAME.0+len].copy_from_slice(&bytes[0..len]);
    }
    fn file_type1(&self,rec: &[u8]) -> u8 {
        rec[SEC_TYPE_OFF+3]
    }
    fn set_file_type1(&self,_rec: &mut [u8],_param: &BasicParam,_val: u8) {}
    fn file_attr(&self,rec: &[u8]) -> FileAttr {
        let mut attr = match u32_be_at(rec,SEC_TYPE_OFF)==ST_USERDIR {
            true => FileAttr::DIRECTORY,
            false => FileAttr::DATA | FileAttr::BINARY
        };
        // protection bits deny, a set W bit means no writing
        if u32_be_at(rec,PROTECT_OFF) & PROTECT_W != 0 {
            attr |= FileAttr::READONLY;
        }
        attr
    }
    fn set_file_attr(&self,rec: &mut [u8],_param: &BasicParam,attr: FileAttr) {
        put_u32_be(rec,TYPE_OFF,T_HEADER);
        let sec_type = match attr.contains(FileAttr::DIRECTORY) {
            true => ST_USERDIR,
            false => ST_FILE
        };
        put_u32_be(rec,SEC_TYPE_OFF,sec_type);
        let protect = match attr.contains(FileAttr::READONLY) {
            true => PROTECT_W,
            false => 0
        };
        put_u32_be(rec,PROTECT_OFF,protect);
    }
    fn file_size(&self,rec: &[u8],_param: &BasicParam,groups: &GroupList) -> usize {
        match u32_be_at(rec,BYTE_SIZE_OFF) {
            0 => groups.total_size(),
            n => n as usize
        }
    }
    fn set_file_size(&self,rec: &mut [u8],_param: &BasicParam,val: usize) {
        put_u32_be(rec,BYTE_SIZE_OFF,val as u32);
    }
    /// the header block records its own number
    fn start_group(&self,rec: &[u8],unit: usize) -> Option<usize> {
        match unit {
            0 => match u32_be_at(rec,HEADER_KEY_OFF) {
                0 => None,
                n => Some(n as usize)
            },
            _ => None
        }
    }
    fn set_start_group(&self,rec: &mut [u8],unit: usize,group: usize) {
        if unit==0 {
            put_u32_be(rec,HEADER_KEY_OFF,group as u32);
        }
    }
    fn has_modify_datetime(&self) -> bool {
        true
    }
    fn modify_datetime(&self,rec: &[u8]) -> Option<NaiveDateTime> {
        let epoch = NaiveDate::from_ymd_opt(1978,1,1)?.and_hms_opt(0,0,0)?;
        let days = u32_be_at(rec,DAYS_OFF) as i64;
        let mins = u32_be_at(rec,MINS_OFF) as i64;
        let ticks = u32_be_at(rec,TICKS_OFF) as i64;
        if mins >= 24*60 || ticks >= 50*60 {
            return None;
        }
        Some(epoch + Duration::days(days) + Duration::minutes(mins) + Duration::seconds(ticks/50))
    }
    fn set_modify_datetime(&self,rec: &mut [u8],val: NaiveDateTime) {
        let epoch = NaiveDate::from_ymd_opt(1978,1,1).unwrap();
        let days = val.date().signed_duration_since(epoch).num_days().max(0);
        let mins = val.time().hour()*60 + val.time().minute();
        let ticks = val.time().second()*50;
        put_u32_be(rec,DAYS_OFF,days as u32);
        put_u32_be(rec,MINS_OFF,mins);
        put_u32_be(rec,TICKS_OFF,ticks);
    }
    /// tombstone in place, the hash chain is cleaned up on the next scan
    fn delete(&self,rec: &mut [u8],_param: &BasicParam) {
        put_u32_be(rec,TYPE_OFF,0);
    }
    fn clear(&self,rec: &mut [u8],_param: &BasicParam) {
        rec.fill(0);
    }
    fn inner_fields(&self,rec: &[u8]) -> Vec<(String,String)> {
        vec![
            hex_field("TYPE",&rec[TYPE_OFF..TYPE_OFF+4]),
            hex_field("HEADER_KEY",&rec[HEADER_KEY_OFF..HEADER_KEY_OFF+4]),
            hex_field("PROTECT",&rec[PROTECT_OFF..PROTECT_OFF+4]),
            hex_field("SIZE",&rec[BYTE_SIZE_OFF..BYTE_SIZE_OFF+4]),
            ("NAME".to_string(),string_from_field(&rec[NAME.0..NAME.0+NAME.1],0)),
            hex_field("SEC_TYPE",&rec[SEC_TYPE_OFF..SEC_TYPE_OFF+4])
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::param::builtin_params;

    fn param() -> BasicParam {
        builtin_params().into_iter().find(|p| p.kind==FormatKind::Amiga).unwrap()
    }

    #[test]
    fn name_keeps_length_prefix() {
        let ops = AmigaOps;
        let mut rec = vec![0u8;512];
        ops.set_name(&mut rec,"Startup-Sequence.info");
        assert_eq!(rec[NAME_LEN_OFF] as usize,"Startup-Sequence.info".len());
        assert_eq!(&rec[NAME.0..NAME.0+21],b"Startup-Sequence.info");
    }

    #[test]
    fn protection_denies_writing() {
        let ops = AmigaOps;
        let param = param();
        let mut rec = vec![0u8;512];
        ops.set_file_attr(&mut rec,&param,FileAttr::DATA | FileAttr::BINARY | FileAttr::READONLY);
        assert!(ops.file_attr(&rec).contains(FileAttr::READONLY));
        ops.set_file_attr(&mut rec,&param,FileAttr::DATA | FileAttr::BINARY);
        assert!(!ops.file_attr(&rec).contains(FileAttr::READONLY));
    }

    #[test]
    fn stamp_round_trip() {
        let ops = AmigaOps;
        let mut rec = vec![0u8;512];
        let stamp = NaiveDate::from_ymd_opt(1989,10,24).unwrap().and_hms_opt(13,45,30).unwrap();
        ops.set_modify_datetime(&mut rec,stamp);
        assert_eq!(ops.modify_datetime(&rec),Some(stamp));
    }

    #[test]
    fn dead_block_is_unused() {
        let ops = AmigaOps;
        let param = param();
        let mut rec = vec![0u8;512];
        ops.set_file_attr(&mut rec,&param,FileAttr::DATA | FileAttr::BINARY);
        assert!(ops.check_used(&rec,false));
        ops.delete(&mut rec,&param);
        assert!(!ops.check_used(&rec,false));
        let mut last = false;
        assert!(ops.check(&rec,&mut last));
    }
}
