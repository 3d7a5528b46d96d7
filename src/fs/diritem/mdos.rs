//! ## MDOS directory entries
//!
//! 32 byte record in the MZ manner: a leading type byte (1 OBJ, 2 BTX,
//! 4 TEX), a 12 character name padded with 0x0D, a 16 bit byte count and
//! load/execute addresses, then the start group.  Type 0x00 marks a never
//! used slot, 0xFF a deleted one.

use crate::fs::attr::FileAttr;
use crate::fs::group::GroupList;
use crate::fs::param::{BasicParam,FormatKind};
use super::{DirItemOps,hex_field,put_u16,string_from_field,u16_at};

const TYPE_OFF: usize = 0;
const NAME: (usize,usize) = (1,12);
const SIZE_OFF: usize = 13;
const LOAD_OFF: usize = 15;
const EXEC_OFF: usize = 17;
const GROUP_OFF: usize = 19;
const DELETED: u8 = 0xff;
const NAME_PAD: u8 = 0x0d;

const TYPE_OBJ: u8 = 1;
const TYPE_BTX: u8 = 2;
const TYPE_TEX: u8 = 4;

pub struct MdosOps;

impl DirItemOps for MdosOps {
    fn kind(&self) -> FormatKind {
        FormatKind::Mdos
    }
    fn record_size(&self) -> usize {
        32
    }
    fn check(&self,rec: &[u8],_last: &mut bool) -> bool {
        matches!(rec[TYPE_OFF],0|DELETED|TYPE_OBJ|TYPE_BTX|TYPE_TEX)
    }
    fn check_used(&self,rec: &[u8],_unuse_hint: bool) -> bool {
        rec[TYPE_OFF] != 0 && rec[TYPE_OFF] != DELETED
    }
    fn name_span(&self) -> (usize,usize) {
        NAME
    }
    fn name_pad(&self) -> u8 {
        NAME_PAD
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
            _ => TYPE_BTX
        };
    }
    fn file_size(&self,rec: &[u8],_param: &BasicParam,groups: &GroupList) -> usize {
        match u16_at(rec,SIZE_OFF) {
            0 => groups.total_size(),
            n => n as usize
        }
    }
    fn set_file_size(&self,rec: &mut [u8],_param: &BasicParam,val: usize) {
        put_u16(rec,SIZE_OFF,val.min(0xffff) as u16);
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
    fn execute_address(&self,rec: &[u8]) -> Option<u16> {
        Some(u16_at(rec,EXEC_OFF))
    }
    fn set_start_address(&self,rec: &mut [u8],val: u16) {
        put_u16(rec,LOAD_OFF,val);
    }
    fn set_execute_address(&self,rec: &mut [u8],val: u16) {
        put_u16(rec,EXEC_OFF,val);
    }
    fn delete(&self,rec: &mut [u8],_param: &BasicParam) {
        rec[TYPE_OFF] = DELETED;
    }
    fn clear(&self,rec: &mut [u8],_param: &BasicParam) {
        rec.fill(0);
        rec[NAME.0..NAME.0+NAME.1].fill(NAME_PAD);
    }
    fn needs_eof_scan(&self,attr: FileAttr) -> bool {
        attr.contains(FileAttr::ASCII)
    }
    fn inner_fields(&self,rec: &[u8]) -> Vec<(String,String)> {
        vec![
            hex_field("TYPE",&rec[TYPE_OFF..TYPE_OFF+1]),
            ("NAME".to_string(),string_from_field(&rec[NAME.0..NAME.0+NAME.1],NAME_PAD)),
            hex_field("SIZE",&rec[SIZE_OFF..SIZE_OFF+2]),
            hex_field("LOAD",&rec[LOAD_OFF..LOAD_OFF+2]),
            hex_field("EXEC",&rec[EXEC_OFF..EXEC_OFF+2]),
            hex_field("GROUP",&rec[GROUP_OFF..GROUP_OFF+1])
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::param::builtin_params;

    fn param() -> BasicParam {
        builtin_params().into_iter().find(|p| p.kind==FormatKind::Mdos).unwrap()
    }

    #[test]
    fn attr_bijection() {
        let ops = MdosOps;
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
        let ops = MdosOps;
        let mut rec = vec![0u8;32];
        assert!(!ops.check_used(&rec,false));
        rec[TYPE_OFF] = TYPE_BTX;
        assert!(ops.check_used(&rec,false));
        rec[TYPE_OFF] = DELETED;
        assert!(!ops.check_used(&rec,false));
    }

    #[test]
    fn byte_exact_size() {
        let ops = MdosOps;
        let param = param();
        let mut rec = vec![0u8;32];
        ops.set_file_size(&mut rec,&param,700);
        assert_eq!(ops.file_size(&rec,&param,&GroupList::new()),700);
    }
}
