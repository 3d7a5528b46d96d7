//! ## FP-BASIC directory entries
//!
//! 32 byte record: 8 character name, type byte, start group, then load,
//! end and execute addresses.  Like DOS80, BASIC files take the catalog's
//! default addresses when the type byte is written.

use crate::fs::attr::FileAttr;
use crate::fs::group::GroupList;
use crate::fs::param::{BasicParam,FormatKind};
use super::{DirItemOps,hex_field,put_u16,string_from_field,u16_at};

const NAME: (usize,usize) = (0,8);
const TYPE_OFF: usize = 8;
const GROUP_OFF: usize = 9;
const LOAD_OFF: usize = 16;
const END_OFF: usize = 18;
const EXEC_OFF: usize = 20;
const DELETED: u8 = 0xff;

pub const TYPE_BASIC: u8 = 0;
pub const TYPE_DATA: u8 = 1;
pub const TYPE_MACHINE: u8 = 2;

pub struct FpOps;

impl DirItemOps for FpOps {
    fn kind(&self) -> FormatKind {
        FormatKind::Fp
    }
    fn record_size(&self) -> usize {
        32
    }
    fn check(&self,rec: &[u8],_last: &mut bool) -> bool {
        if rec[0]==0 || rec[0]==DELETED {
            return true;
        }
        rec[TYPE_OFF] <= TYPE_MACHINE
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
    fn set_file_type1(&self,rec: &mut [u8],param: &BasicParam,val: u8) {
        rec[TYPE_OFF] = val;
        if val==TYPE_BASIC {
            if let Some(addr) = param.int("DefaultStartAddress") {
                put_u16(rec,LOAD_OFF,addr as u16);
            }
            if let Some(addr) = param.int("DefaultExecuteAddress") {
                put_u16(rec,EXEC_OFF,addr as u16);
            }
        }
    }
    fn file_attr(&self,rec: &[u8]) -> FileAttr {
        match rec[TYPE_OFF] {
            TYPE_DATA => FileAttr::DATA | FileAttr::ASCII,
            TYPE_MACHINE => FileAttr::MACHINE | FileAttr::BINARY,
            _ => FileAttr::BASIC | FileAttr::BINARY
        }
    }
    fn set_file_attr(&self,rec: &mut [u8],param: &BasicParam,attr: FileAttr) {
        let t = match (attr.contains(FileAttr::DATA),attr.contains(FileAttr::MACHINE)) {
            (true,_) => TYPE_DATA,
            (_,true) => TYPE_MACHINE,
            _ => TYPE_BASIC
        };
        self.set_file_type1(rec,param,t);
    }
    fn file_size(&self,rec: &[u8],_param: &BasicParam,groups: &GroupList) -> usize {
        let by_addr = u16_at(rec,END_OFF).saturating_sub(u16_at(rec,LOAD_OFF)) as usize;
        match rec[TYPE_OFF]==TYPE_MACHINE && by_addr > 0 {
            true => by_addr,
            false => groups.total_size()
        }
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
    fn end_address(&self,rec: &[u8]) -> Option<u16> {
        Some(u16_at(rec,END_OFF))
    }
    fn execute_address(&self,rec: &[u8]) -> Option<u16> {
        Some(u16_at(rec,EXEC_OFF))
    }
    fn set_start_address(&self,rec: &mut [u8],val: u16) {
        put_u16(rec,LOAD_OFF,val);
    }
    fn set_end_address(&self,rec: &mut [u8],val: u16) {
        put_u16(rec,END_OFF,val);
    }
    fn set_execute_address(&self,rec: &mut [u8],val: u16) {
        put_u16(rec,EXEC_OFF,val);
    }
    fn delete(&self,rec: &mut [u8],_param: &BasicParam) {
        rec[0] = DELETED;
    }
    fn inner_fields(&self,rec: &[u8]) -> Vec<(String,String)> {
        vec![
            ("NAME".to_string(),string_from_field(&rec[NAME.0..NAME.0+NAME.1],0x20)),
            hex_field("TYPE",&rec[TYPE_OFF..TYPE_OFF+1]),
            hex_field("GROUP",&rec[GROUP_OFF..GROUP_OFF+1]),
            hex_field("LOAD",&rec[LOAD_OFF..LOAD_OFF+2]),
            hex_field("END",&rec[END_OFF..END_OFF+2]),
            hex_field("EXEC",&rec[EXEC_OFF..EXEC_OFF+2])
        ]
    }
}
