//! ## S-DOS directory entries
//!
//! 32 byte record: 8 character name, type byte, 16 bit start group, sector
//! count, and load/execute addresses.  The directory is terminated by a
//! never used slot (name byte 0x00): deleting a file tombstones the entry
//! and the allocation strategy then compacts the list leftward so the end
//! sentinel invariant survives.  BASIC files take the catalog's default
//! addresses on type assignment.

use crate::fs::attr::FileAttr;
use crate::fs::group::GroupList;
use crate::fs::param::{BasicParam,FormatKind};
use super::{DirItemOps,hex_field,put_u16,string_from_field,u16_at};

const NAME: (usize,usize) = (0,8);
const TYPE_OFF: usize = 8;
const GROUP_OFF: usize = 10;
const SECTORS_OFF: usize = 12;
const LOAD_OFF: usize = 14;
const EXEC_OFF: usize = 16;
const DELETED: u8 = 0xff;

pub const TYPE_BASIC: u8 = 0;
pub const TYPE_DATA: u8 = 1;
pub const TYPE_MACHINE: u8 = 2;

pub struct SdosOps;

impl DirItemOps for SdosOps {
    fn kind(&self) -> FormatKind {
        FormatKind::Sdos
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
    fn file_size(&self,rec: &[u8],param: &BasicParam,_groups: &GroupList) -> usize {
        u16_at(rec,SECTORS_OFF) as usize * param.sector_size
    }
    fn set_file_size(&self,rec: &mut [u8],param: &BasicParam,val: usize) {
        let sectors = (val + param.sector_size - 1)/param.sector_size;
        put_u16(rec,SECTORS_OFF,sectors as u16);
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
        rec[0] = DELETED;
    }
    fn clear(&self,rec: &mut [u8],_param: &BasicParam) {
        rec.fill(0);
    }
    fn inner_fields(&self,rec: &[u8]) -> Vec<(String,String)> {
        vec![
            ("NAME".to_string(),string_from_field(&rec[NAME.0..NAME.0+NAME.1],0x20)),
            hex_field("TYPE",&rec[TYPE_OFF..TYPE_OFF+1]),
            hex_field("GROUP",&rec[GROUP_OFF..GROUP_OFF+2]),
            hex_field("SECTORS",&rec[SECTORS_OFF..SECTORS_OFF+2]),
            hex_field("LOAD",&rec[LOAD_OFF..LOAD_OFF+2]),
            hex_field("EXEC",&rec[EXEC_OFF..EXEC_OFF+2])
        ]
    }
}
