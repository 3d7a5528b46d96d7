//! ## FROST-DOS directory entries
//!
//! 32 byte record in the F-BASIC family mold: 8 character name, a type
//! byte (0 BASIC, 1 data, 2 machine), an ASCII flag byte, a protect byte
//! and the start group.  First name byte 0x00 marks a never used slot,
//! 0xFF a deleted one.

use crate::fs::attr::FileAttr;
use crate::fs::group::GroupList;
use crate::fs::param::{BasicParam,FormatKind};
use super::{DirItemOps,hex_field,string_from_field};

const NAME: (usize,usize) = (0,8);
const TYPE_OFF: usize = 8;
const ASCII_OFF: usize = 9;
const PROTECT_OFF: usize = 10;
const GROUP_OFF: usize = 11;
const DELETED: u8 = 0xff;

const TYPE_BASIC: u8 = 0;
const TYPE_DATA: u8 = 1;
const TYPE_MACHINE: u8 = 2;

pub struct FrostOps;

impl DirItemOps for FrostOps {
    fn kind(&self) -> FormatKind {
        FormatKind::Frost
    }
    fn record_size(&self) -> usize {
        32
    }
    fn check(&self,rec: &[u8],_last: &mut bool) -> bool {
        if rec[0]==0 || rec[0]==DELETED {
            return true;
        }
        if rec[TYPE_OFF] > TYPE_MACHINE {
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
            TYPE_DATA => FileAttr::DATA,
            TYPE_MACHINE => FileAttr::MACHINE,
            _ => FileAttr::BASIC
        };
        attr |= match rec[ASCII_OFF] {
            0 => FileAttr::BINARY,
            _ => FileAttr::ASCII
        };
        if rec[PROTECT_OFF] != 0 {
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
        rec[ASCII_OFF] = match attr.contains(FileAttr::ASCII) {
            true => 0xff,
            false => 0
        };
        rec[PROTECT_OFF] = match attr.contains(FileAttr::READONLY) {
            true => 0xff,
            false => 0
        };
    }
    fn file_size(&self,_rec: &[u8],_param: &BasicParam,groups: &GroupList) -> usize {
        groups.total_size()
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
            hex_field("ASCII",&rec[ASCII_OFF..ASCII_OFF+1]),
            hex_field("PROTECT",&rec[PROTECT_OFF..PROTECT_OFF+1]),
            hex_field("GROUP",&rec[GROUP_OFF..GROUP_OFF+1])
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::param::builtin_params;

    fn param() -> BasicParam {
        builtin_params().into_iter().find(|p| p.kind==FormatKind::Frost).unwrap()
    }

    #[test]
    fn attr_bijection() {
        let ops = FrostOps;
        let param = param();
        let combos = [
            FileAttr::BASIC | FileAttr::BINARY,
            FileAttr::BASIC | FileAttr::ASCII,
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
    fn sentinels() {
        let ops = FrostOps;
        let mut rec = vec![0u8;32];
        assert!(!ops.check_used(&rec,false));
        rec[0] = b'A';
        assert!(ops.check_used(&rec,false));
        rec[0] = 0xff;
        assert!(!ops.check_used(&rec,false));
    }
}
