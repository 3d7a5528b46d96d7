//! ## TF-DOS directory entries
//!
//! 32 byte record: a 12 character name, a type byte (1 OBJ, 2 BAS,
//! 3 TEX), the start group and a 16 bit load address.  First name byte
//! 0x00 marks a never used slot, 0xFF a deleted one.

use crate::fs::attr::FileAttr;
use crate::fs::group::GroupList;
use crate::fs::param::{BasicParam,FormatKind};
use super::{DirItemOps,hex_field,put_u16,string_from_field,u16_at};

const NAME: (usize,usize) = (0,12);
const TYPE_OFF: usize = 12;
const GROUP_OFF: usize = 13;
const LOAD_OFF: usize = 14;
const DELETED: u8 = 0xff;

const TYPE_OBJ: u8 = 1;
const TYPE_BAS: u8 = 2;
const TYPE_TEX: u8 = 3;

pub struct TfdosOps;

impl DirItemOps for TfdosOps {
    fn kind(&self) -> FormatKind {
        FormatKind::Tfdos
    }
    fn record_size(&self) -> usize {
        32
    }
    fn check(&self,rec: &[u8],_last: &mut bool) -> bool {
        if rec[0]==0 || rec[0]==DELETED {
            return true;
        }
        if !matches!(rec[TYPE_OFF],TYPE_OBJ|TYPE_BAS|TYPE_TEX) {
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
        match rec[TYPE_OFF] {
            TYPE_OBJ => FileAttr::MACHINE | FileAttr::BINARY,
            TYPE_TEX => FileAttr::DATA | FileAttr::ASCII,
            _ => FileAttr::BASIC | FileAttr::BINARY
        }
    }
    fn set_file_attr(&self,rec: &mut [u8],_param: &BasicParam,attr: FileAttr) {
        rec[TYPE_OFF] = match (attr.contains(FileAttr::MACHINE),attr.contains(FileAttr::ASCII)) {
            (true,_) => TYPE_OBJ,
            (_,true) => TYPE_TEX,
            _ => TYPE_BAS
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
    fn has_address(&self) -> bool {
        true
    }
    fn start_address(&self,rec: &[u8]) -> Option<u16> {
        Some(u16_at(rec,LOAD_OFF))
    }
    fn set_start_address(&self,rec: &mut [u8],val: u16) {
        put_u16(rec,LOAD_OFF,val);
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
            hex_field("GROUP",&rec[GROUP_OFF..GROUP_OFF+1]),
            hex_field("LOAD",&rec[LOAD_OFF..LOAD_OFF+2])
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::param::builtin_params;

    fn param() -> BasicParam {
        builtin_params().into_iter().find(|p| p.kind==FormatKind::Tfdos).unwrap()
    }

    #[test]
    fn attr_bijection() {
        let ops = TfdosOps;
        let param = param();
        let combos = [
            FileAttr::BASIC | FileAttr::BINARY,
            FileAttr::DATA | FileAttr::ASCII,
            FileAttr::MACHINE | FileAttr::BINARY
        ];
        for attr in combos {
            let mut rec = vec![0u8;32];
            ops.set_file_attr(&mut rec,&param,attr);
            assert_eq!(ops.file_attr(&rec),attr);
        }
    }

    #[test]
    fn sentinels() {
        let ops = TfdosOps;
        let mut rec = vec![0u8;32];
        assert!(!ops.check_used(&rec,false));
        rec[0] = b'T';
        assert!(ops.check_used(&rec,false));
        rec[0] = 0xff;
        assert!(!ops.check_used(&rec,false));
    }
}
