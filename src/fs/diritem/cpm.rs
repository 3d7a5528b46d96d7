//! ## CP/M directory entries
//!
//! 32 byte extent: user number, 8 character name, 3 character extension
//! with flag bits in the high bits (t1' read only, t2' system), extent
//! number, record count and a 16 slot allocation map of block numbers.
//! User byte 0xE5 marks both a never used and a deleted slot.

use crate::fs::attr::FileAttr;
use crate::fs::group::GroupList;
use crate::fs::param::{BasicParam,FormatKind};
use super::{DirItemOps,hex_field,string_from_field};

const USER_OFF: usize = 0;
const NAME: (usize,usize) = (1,8);
const EXT: (usize,usize) = (9,3);
const EXTENT_OFF: usize = 12;
const RECORDS_OFF: usize = 15;
pub const MAP_OFF: usize = 16;
pub const MAP_LEN: usize = 16;
const EMPTY: u8 = 0xe5;
const RECORD_BYTES: usize = 128;
const EXTENT_BYTES: usize = 16384;

pub struct CpmOps;

impl DirItemOps for CpmOps {
    fn kind(&self) -> FormatKind {
        FormatKind::Cpm
    }
    fn record_size(&self) -> usize {
        32
    }
    fn check(&self,rec: &[u8],_last: &mut bool) -> bool {
        rec[USER_OFF]==EMPTY || rec[USER_OFF] < 0x10
    }
    fn check_used(&self,rec: &[u8],_unuse_hint: bool) -> bool {
        rec[USER_OFF] < 0x10
    }
    fn name_span(&self) -> (usize,usize) {
        NAME
    }
    fn ext_span(&self) -> Option<(usize,usize)> {
        Some(EXT)
    }
    fn file_type1(&self,rec: &[u8]) -> u8 {
        rec[USER_OFF]
    }
    fn set_file_type1(&self,rec: &mut [u8],_param: &BasicParam,val: u8) {
        rec[USER_OFF] = val;
    }
    fn file_attr(&self,rec: &[u8]) -> FileAttr {
        let mut attr = FileAttr::DATA;
        if rec[EXT.0] & 0x80 != 0 {
            attr |= FileAttr::READONLY;
        }
        if rec[EXT.0+1] & 0x80 != 0 {
            attr |= FileAttr::HIDDEN;
        }
        attr
    }
    fn set_file_attr(&self,rec: &mut [u8],_param: &BasicParam,attr: FileAttr) {
        match attr.contains(FileAttr::READONLY) {
            true => rec[EXT.0] |= 0x80,
            false => rec[EXT.0] &= 0x7f
        }
        match attr.contains(FileAttr::HIDDEN) {
            true => rec[EXT.0+1] |= 0x80,
            false => rec[EXT.0+1] &= 0x7f
        }
    }
    fn file_size(&self,rec: &[u8],_param: &BasicParam,_groups: &GroupList) -> usize {
        rec[EXTENT_OFF] as usize * EXTENT_BYTES + rec[RECORDS_OFF] as usize * RECORD_BYTES
    }
    fn set_file_size(&self,rec: &mut [u8],_param: &BasicParam,val: usize) {
        rec[EXTENT_OFF] = (val/EXTENT_BYTES) as u8;
        rec[RECORDS_OFF] = ((val%EXTENT_BYTES + RECORD_BYTES - 1)/RECORD_BYTES) as u8;
    }
    /// first block in the allocation map; the full map is read by the strategy
    fn start_group(&self,rec: &[u8],unit: usize) -> Option<usize> {
        match unit {
            0 if rec[MAP_OFF]==0 => None,
            0 => Some(rec[MAP_OFF] as usize),
            _ => None
        }
    }
    fn set_start_group(&self,rec: &mut [u8],unit: usize,group: usize) {
        if unit==0 {
            rec[MAP_OFF] = group as u8;
        }
    }
    fn set_groups(&self,rec: &mut [u8],groups: &GroupList) {
        rec[MAP_OFF..MAP_OFF+MAP_LEN].fill(0);
        for (i,g) in groups.items().iter().take(MAP_LEN).enumerate() {
            rec[MAP_OFF+i] = g.group as u8;
        }
    }
    fn delete(&self,rec: &mut [u8],param: &BasicParam) {
        rec[USER_OFF] = param.delete_code;
    }
    fn clear(&self,rec: &mut [u8],param: &BasicParam) {
        rec.fill(0);
        rec[USER_OFF] = param.fill_code;
    }
    fn pre_export(&self,name: &str,attr: FileAttr) -> String {
        let _ = attr;
        name.trim_end_matches('.').to_string()
    }
    fn inner_fields(&self,rec: &[u8]) -> Vec<(String,String)> {
        vec![
            hex_field("USER",&rec[USER_OFF..USER_OFF+1]),
            ("NAME".to_string(),string_from_field(&rec[NAME.0..NAME.0+NAME.1],0x20)),
            ("EXT".to_string(),string_from_field(&rec[EXT.0..EXT.0+EXT.1],0x20)),
            hex_field("EXTENT",&rec[EXTENT_OFF..EXTENT_OFF+1]),
            hex_field("RECORDS",&rec[RECORDS_OFF..RECORDS_OFF+1]),
            hex_field("MAP",&rec[MAP_OFF..MAP_OFF+MAP_LEN])
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_from_extent_and_records() {
        let ops = CpmOps;
        let param = crate::fs::param::builtin_params()[6].clone();
        let mut rec = vec![0u8;32];
        ops.set_file_size(&mut rec,&param,16384 + 3*128);
        assert_eq!(rec[EXTENT_OFF],1);
        assert_eq!(rec[RECORDS_OFF],3);
        assert_eq!(ops.file_size(&rec,&param,&GroupList::new()),16384 + 3*128);
    }
}
