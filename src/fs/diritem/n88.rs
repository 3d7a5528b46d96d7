//! ## N88-BASIC directory entries
//!
//! 16 byte record: 6 character name, 3 character extension, one attribute
//! byte and the start group.  First name byte 0xFF is the end-of-directory
//! sentinel, 0x00 a deleted slot.  ASCII files carry no size field; length
//! is derived by counting allocated sectors and scanning for the EOF code.

use crate::fs::attr::FileAttr;
use crate::fs::group::GroupList;
use crate::fs::param::{BasicParam,FormatKind};
use super::{DirItemOps,hex_field,string_from_field};

const NAME: (usize,usize) = (0,6);
const EXT: (usize,usize) = (6,3);
const TYPE_OFF: usize = 9;
const GROUP_OFF: usize = 10;
const ENDMARK: u8 = 0xff;
const DELETED: u8 = 0x00;

const ATTR_MACHINE: u8 = 0x01;
const ATTR_READONLY: u8 = 0x10;
const ATTR_ENCRYPTED: u8 = 0x20;
const ATTR_ASCII: u8 = 0x80;

pub struct N88Ops;

impl DirItemOps for N88Ops {
    fn kind(&self) -> FormatKind {
        FormatKind::N88
    }
    fn record_size(&self) -> usize {
        16
    }
    fn check(&self,rec: &[u8],last: &mut bool) -> bool {
        if rec[0]==ENDMARK {
            *last = true;
            return true;
        }
        if rec[0]==DELETED {
            return true;
        }
        rec[NAME.0..EXT.0+EXT.1].iter().all(|b| *b >= 0x20 || *b==0)
    }
    fn check_used(&self,rec: &[u8],_unuse_hint: bool) -> bool {
        rec[0] != DELETED && rec[0] != ENDMARK
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
        let mut attr = match (t & ATTR_MACHINE != 0,t & ATTR_ASCII != 0) {
            (true,_) => FileAttr::MACHINE | FileAttr::BINARY,
            (false,true) => FileAttr::BASIC | FileAttr::ASCII,
            (false,false) => FileAttr::BASIC | FileAttr::BINARY
        };
        if t & ATTR_READONLY != 0 {
            attr |= FileAttr::READONLY;
        }
        if t & ATTR_ENCRYPTED != 0 {
            attr |= FileAttr::ENCRYPTED;
        }
        attr
    }
    fn set_file_attr(&self,rec: &mut [u8],_param: &BasicParam,attr: FileAttr) {
        let mut t = match (attr.contains(FileAttr::MACHINE),attr.contains(FileAttr::ASCII)) {
            (true,_) => ATTR_MACHINE,
            (false,true) => ATTR_ASCII,
            (false,false) => 0
        };
        if attr.contains(FileAttr::READONLY) {
            t |= ATTR_READONLY;
        }
        if attr.contains(FileAttr::ENCRYPTED) {
            t |= ATTR_ENCRYPTED;
        }
        rec[TYPE_OFF] = t;
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
            ("EXT".to_string(),string_from_field(&rec[EXT.0..EXT.0+EXT.1],0x20)),
            hex_field("TYPE",&rec[TYPE_OFF..TYPE_OFF+1]),
            hex_field("GROUP",&rec[GROUP_OFF..GROUP_OFF+1])
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endmark_sentinel() {
        let ops = N88Ops;
        let mut rec = vec![0x20u8;16];
        rec[0] = 0xff;
        let mut last = false;
        assert!(ops.check(&rec,&mut last));
        assert!(last);
        assert!(!ops.check_used(&rec,false));
    }

    #[test]
    fn attr_bijection() {
        let ops = N88Ops;
        let param = crate::fs::param::builtin_params()[1].clone();
        let combos = [
            FileAttr::BASIC | FileAttr::BINARY,
            FileAttr::BASIC | FileAttr::ASCII,
            FileAttr::MACHINE | FileAttr::BINARY | FileAttr::READONLY,
            FileAttr::BASIC | FileAttr::BINARY | FileAttr::ENCRYPTED
        ];
        for attr in combos {
            let mut rec = vec![0u8;16];
            ops.set_file_attr(&mut rec,&param,attr);
            assert_eq!(ops.file_attr(&rec),attr);
        }
    }
}
