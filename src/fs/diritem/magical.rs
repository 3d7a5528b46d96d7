//! ## Magical DOS directory entries
//!
//! 32 byte record: a 12 character name, a type byte, a flag byte
//! (0x01 protect, 0x02 hidden), the start group and a 16 bit sector
//! count.  First name byte 0x00 marks a never used slot, 0xFF a
//! deleted one.

use crate::fs::attr::FileAttr;
use crate::fs::group::GroupList;
use crate::fs::param::{BasicParam,FormatKind};
use super::{DirItemOps,hex_field,put_u16,string_from_field,u16_at};

const NAME: (usize,usize) = (0,12);
const TYPE_OFF: usize = 12;
const FLAGS_OFF: usize = 13;
const GROUP_OFF: usize = 14;
const SECTORS_OFF: usize = 15;
const DELETED: u8 = 0xff;

const TYPE_BASIC: u8 = 0;
const TYPE_DATA: u8 = 1;
const TYPE_MACHINE: u8 = 2;
const FLAG_PROTECT: u8 = 0x01;
const FLAG_HIDDEN: u8 = 0x02;

pub struct MagicalOps;

impl DirItemOps for MagicalOps {
    fn kind(&self) -> FormatKind {
        FormatKind::Magical
    }
    fn record_size(&self) -> usize {
        32
    }
    fn check(&self,rec: &[u8],_last: &mut bool) -> bool {
        if rec[0]==0 || rec[0]==DELETED {
            return true;
        }
        if rec[TYPE_OFF] > TYPE_MACHINE || rec[FLAGS_OFF] & !(FLAG_PROTECT|FLAG_HIDDEN) != 0 {
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
        attr |= FileAttr::BINARY;
        if rec[FLAGS_OFF] & FLAG_PROTECT != 0 {
            attr |= FileAttr::READONLY;
        }
        if rec[FLAGS_OFF] & FLAG_HIDDEN != 0 {
            attr |= FileAttr::HIDDEN;
        }
        attr
    }
    fn set_file_attr(&self,rec: &mut [u8],_param: &BasicParam,attr: FileAttr) {
        rec[TYPE_OFF] = match (attr.contains(FileAttr::DATA),attr.contains(FileAttr::MACHINE)) {
            (true,_) => TYPE_DATA,
            (_,true) => TYPE_MACHINE,
            _ => TYPE_BASIC
        };
        let mut flags = 0;
        if attr.contains(FileAttr::READONLY) {
            flags |= FLAG_PROTECT;
        }
        if attr.contains(FileAttr::HIDDEN) {
            flags |= FLAG_HIDDEN;
        }
        rec[FLAGS_OFF] = flags;
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
    fn delete(&self,rec: &mut [u8],_param: &BasicParam) {
        rec[0] = DELETED;
    }
    fn inner_fields(&self,rec: &[u8]) -> Vec<(String,String)> {
        vec![
            ("NAME".to_string(),string_from_field(&rec[NAME.0..NAME.0+NAME.1],0x20)),
            hex_field("TYPE",&rec[TYPE_OFF..TYPE_OFF+1]),
            hex_field("FLAGS",&rec[FLAGS_OFF..FLAGS_OFF+1]),
            hex_field("GROUP",&rec[GROUP_OFF..GROUP_OFF+1]),
            hex_field("SECTORS",&rec[SECTORS_OFF..SECTORS_OFF+2])
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::param::builtin_params;

    fn param() -> BasicParam {
        builtin_params().into_iter().find(|p| p.kind==FormatKind::Magical).unwrap()
    }

    #[test]
    fn attr_bijection() {
        let ops = MagicalOps;
        let param = param();
        let combos = [
            FileAttr::BASIC | FileAttr::BINARY,
            FileAttr::DATA | FileAttr::BINARY | FileAttr::HIDDEN,
            FileAttr::MACHINE | FileAttr::BINARY | FileAttr::READONLY
        ];
        for attr in combos {
            let mut rec = vec![0u8;32];
            ops.set_file_attr(&mut rec,&param,attr);
            assert_eq!(ops.file_attr(&rec),attr);
        }
    }

    #[test]
    fn size_from_sector_count() {
        let ops = MagicalOps;
        let param = param();
        let mut rec = vec![0u8;32];
        ops.set_file_size(&mut rec,&param,600);
        assert_eq!(ops.file_size(&rec,&param,&GroupList::new()),3*256);
    }

    #[test]
    fn sentinels() {
        let ops = MagicalOps;
        let mut rec = vec![0u8;32];
        assert!(!ops.check_used(&rec,false));
        rec[0] = b'M';
        assert!(ops.check_used(&rec,false));
        rec[0] = 0xff;
        assert!(!ops.check_used(&rec,false));
    }
}
