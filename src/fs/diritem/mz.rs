//! ## MZ DISK BASIC directory entries
//!
//! 64 byte record: mode byte (0x01 OBJ, 0x02 BTX, 0x04 ASC), a 17
//! character name terminated by 0x0D, a lock byte, 16 bit size, load and
//! execute addresses and the start sector.  Mode 0x00 is a never used slot.

use crate::fs::attr::FileAttr;
use crate::fs::group::GroupList;
use crate::fs::param::{BasicParam,FormatKind};
use super::{DirItemOps,hex_field,put_u16,string_from_field,u16_at};

const MODE_OFF: usize = 0;
const NAME: (usize,usize) = (1,17);
const LOCK_OFF: usize = 18;
const SIZE_OFF: usize = 20;
const LOAD_OFF: usize = 22;
const EXEC_OFF: usize = 24;
const GROUP_OFF: usize = 30;
const DELETED: u8 = 0xff;
const NAME_TERM: u8 = 0x0d;

const MODE_OBJ: u8 = 0x01;
const MODE_BTX: u8 = 0x02;
const MODE_ASC: u8 = 0x04;

pub struct MzOps;

impl DirItemOps for MzOps {
    fn kind(&self) -> FormatKind {
        FormatKind::Mz
    }
    fn record_size(&self) -> usize {
        64
    }
    fn check(&self,rec: &[u8],_last: &mut bool) -> bool {
        matches!(rec[MODE_OFF],0|DELETED|MODE_OBJ|MODE_BTX|MODE_ASC)
    }
    fn check_used(&self,rec: &[u8],_unuse_hint: bool) -> bool {
        rec[MODE_OFF] != 0 && rec[MODE_OFF] != DELETED
    }
    fn name_span(&self) -> (usize,usize) {
        NAME
    }
    fn name_pad(&self) -> u8 {
        NAME_TERM
    }
    fn file_type1(&self,rec: &[u8]) -> u8 {
        rec[MODE_OFF]
    }
    fn set_file_type1(&self,rec: &mut [u8],_param: &BasicParam,val: u8) {
        rec[MODE_OFF] = val;
    }
    fn file_attr(&self,rec: &[u8]) -> FileAttr {
        let mut attr = match rec[MODE_OFF] {
            MODE_OBJ => FileAttr::MACHINE | FileAttr::BINARY,
            MODE_ASC => FileAttr::DATA | FileAttr::ASCII,
            _ => FileAttr::BASIC | FileAttr::BINARY
        };
        if rec[LOCK_OFF] != 0 {
            attr |= FileAttr::READONLY;
        }
        attr
    }
    fn set_file_attr(&self,rec: &mut [u8],_param: &BasicParam,attr: FileAttr) {
        rec[MODE_OFF] = match (attr.contains(FileAttr::MACHINE),attr.contains(FileAttr::DATA)) {
            (true,_) => MODE_OBJ,
            (_,true) => MODE_ASC,
            _ => MODE_BTX
        };
        rec[LOCK_OFF] = match attr.contains(FileAttr::READONLY) {
            true => 0x01,
            false => 0
        };
    }
    fn file_size(&self,rec: &[u8],_param: &BasicParam,groups: &GroupList) -> usize {
        match u16_at(rec,SIZE_OFF) {
            0 => groups.total_size(),
            n => n as usize
        }
    }
    fn set_file_size(&self,rec: &mut [u8],_param: &BasicParam,val: usize) {
        put_u16(rec,SIZE_OFF,val as u16);
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
        Some(u16_at(rec,LOAD_OFF).wrapping_add(u16_at(rec,SIZE_OFF)))
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
        rec[MODE_OFF] = DELETED;
    }
    fn clear(&self,rec: &mut [u8],_param: &BasicParam) {
        rec.fill(0);
        rec[NAME.0..NAME.0+NAME.1].fill(NAME_TERM);
    }
    fn needs_eof_scan(&self,attr: FileAttr) -> bool {
        attr.contains(FileAttr::ASCII)
    }
    fn inner_fields(&self,rec: &[u8]) -> Vec<(String,String)> {
        vec![
            hex_field("MODE",&rec[MODE_OFF..MODE_OFF+1]),
            ("NAME".to_string(),string_from_field(&rec[NAME.0..NAME.0+NAME.1],NAME_TERM)),
            hex_field("LOCK",&rec[LOCK_OFF..LOCK_OFF+1]),
            hex_field("SIZE",&rec[SIZE_OFF..SIZE_OFF+2]),
            hex_field("LOAD",&rec[LOAD_OFF..LOAD_OFF+2]),
            hex_field("EXEC",&rec[EXEC_OFF..EXEC_OFF+2]),
            hex_field("GROUP",&rec[GROUP_OFF..GROUP_OFF+2])
        ]
    }
}
