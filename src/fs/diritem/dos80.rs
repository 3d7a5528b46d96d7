//! ## DOS80 directory entries
//!
//! 16 byte record: 6 character name, type byte, two per-unit start groups
//! (a BASIC program and its companion machine part occupy separate units),
//! a sector count, and three 16 bit address slots (start, end, execute).
//! Setting the type to BASIC force-writes the catalog's configured default
//! start/execute addresses into address slots 0 and 2, overriding whatever
//! was stored before.  File sizes round up to the 256 byte sector boundary.

use crate::fs::attr::FileAttr;
use crate::fs::group::GroupList;
use crate::fs::param::{BasicParam,FormatKind};
use super::{DirItemOps,hex_field,put_u16,string_from_field,u16_at};

const NAME: (usize,usize) = (0,6);
const TYPE_OFF: usize = 6;
const GROUP0_OFF: usize = 7;
const GROUP1_OFF: usize = 8;
const SECTORS_OFF: usize = 9;
const ADDR0_OFF: usize = 10;
const ADDR1_OFF: usize = 12;
const ADDR2_OFF: usize = 14;
const DELETED: u8 = 0xff;
const NO_UNIT: u8 = 0xff;

pub const TYPE_BASIC: u8 = 0;
pub const TYPE_DATA: u8 = 1;
pub const TYPE_MACHINE: u8 = 2;

pub struct Dos80Ops;

impl DirItemOps for Dos80Ops {
    fn kind(&self) -> FormatKind {
        FormatKind::Dos80
    }
    fn record_size(&self) -> usize {
        16
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
    /// BASIC files get the format mandated load and execute addresses,
    /// regardless of any previously stored value
    fn set_file_type1(&self,rec: &mut [u8],param: &BasicParam,val: u8) {
        rec[TYPE_OFF] = val;
        if val==TYPE_BASIC {
            if let Some(addr) = param.int("DefaultStartAddress") {
                put_u16(rec,ADDR0_OFF,addr as u16);
            }
            if let Some(addr) = param.int("DefaultExecuteAddress") {
                put_u16(rec,ADDR2_OFF,addr as u16);
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
        rec[SECTORS_OFF] as usize * param.sector_size
    }
    fn set_file_size(&self,rec: &mut [u8],param: &BasicParam,val: usize) {
        let rounded = self.round_file_size(val,param);
        rec[SECTORS_OFF] = (rounded/param.sector_size) as u8;
    }
    fn start_group(&self,rec: &[u8],unit: usize) -> Option<usize> {
        let raw = match unit {
            0 => rec[GROUP0_OFF],
            1 => rec[GROUP1_OFF],
            _ => return None
        };
        match raw {
            NO_UNIT => None,
            g => Some(g as usize)
        }
    }
    fn set_start_group(&self,rec: &mut [u8],unit: usize,group: usize) {
        match unit {
            0 => rec[GROUP0_OFF] = group as u8,
            1 => rec[GROUP1_OFF] = group as u8,
            _ => {}
        }
    }
    fn unit_count(&self,rec: &[u8]) -> usize {
        match rec[GROUP1_OFF] {
            NO_UNIT => 1,
            _ => 2
        }
    }
    fn has_address(&self) -> bool {
        true
    }
    fn start_address(&self,rec: &[u8]) -> Option<u16> {
        Some(u16_at(rec,ADDR0_OFF))
    }
    fn end_address(&self,rec: &[u8]) -> Option<u16> {
        Some(u16_at(rec,ADDR1_OFF))
    }
    fn execute_address(&self,rec: &[u8]) -> Option<u16> {
        Some(u16_at(rec,ADDR2_OFF))
    }
    fn set_start_address(&self,rec: &mut [u8],val: u16) {
        put_u16(rec,ADDR0_OFF,val);
    }
    fn set_end_address(&self,rec: &mut [u8],val: u16) {
        put_u16(rec,ADDR1_OFF,val);
    }
    fn set_execute_address(&self,rec: &mut [u8],val: u16) {
        put_u16(rec,ADDR2_OFF,val);
    }
    fn delete(&self,rec: &mut [u8],_param: &BasicParam) {
        rec[0] = DELETED;
    }
    fn clear(&self,rec: &mut [u8],_param: &BasicParam) {
        rec.fill(0);
        rec[GROUP0_OFF] = NO_UNIT;
        rec[GROUP1_OFF] = NO_UNIT;
    }
    fn round_file_size(&self,val: usize,param: &BasicParam) -> usize {
        match val {
            0 => 0,
            v => (((v-1)/param.sector_size)+1)*param.sector_size
        }
    }
    fn inner_fields(&self,rec: &[u8]) -> Vec<(String,String)> {
        vec![
            ("NAME".to_string(),string_from_field(&rec[NAME.0..NAME.0+NAME.1],0x20)),
            hex_field("TYPE",&rec[TYPE_OFF..TYPE_OFF+1]),
            hex_field("GROUP0",&rec[GROUP0_OFF..GROUP0_OFF+1]),
            hex_field("GROUP1",&rec[GROUP1_OFF..GROUP1_OFF+1]),
            hex_field("SECTORS",&rec[SECTORS_OFF..SECTORS_OFF+1]),
            hex_field("START",&rec[ADDR0_OFF..ADDR0_OFF+2]),
            hex_field("END",&rec[ADDR1_OFF..ADDR1_OFF+2]),
            hex_field("EXEC",&rec[ADDR2_OFF..ADDR2_OFF+2])
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::param::{builtin_params,FormatKind};

    fn dos80_param() -> BasicParam {
        builtin_params().into_iter().find(|p| p.kind==FormatKind::Dos80).unwrap()
    }

    #[test]
    fn basic_type_rewrites_addresses() {
        let ops = Dos80Ops;
        let param = dos80_param();
        let mut rec = vec![0u8;16];
        put_u16(&mut rec,ADDR0_OFF,0x1234);
        put_u16(&mut rec,ADDR2_OFF,0x5678);
        ops.set_file_type1(&mut rec,&param,TYPE_BASIC);
        assert_eq!(ops.start_address(&rec),Some(0x9000));
        assert_eq!(ops.execute_address(&rec),Some(0x9000));
    }

    #[test]
    fn machine_type_keeps_addresses() {
        let ops = Dos80Ops;
        let param = dos80_param();
        let mut rec = vec![0u8;16];
        put_u16(&mut rec,ADDR0_OFF,0x1234);
        ops.set_file_type1(&mut rec,&param,TYPE_MACHINE);
        assert_eq!(ops.start_address(&rec),Some(0x1234));
    }

    #[test]
    fn size_rounds_to_sector() {
        let ops = Dos80Ops;
        let param = dos80_param();
        assert_eq!(ops.round_file_size(1,&param),256);
        assert_eq!(ops.round_file_size(256,&param),256);
        assert_eq!(ops.round_file_size(257,&param),512);
    }
}
