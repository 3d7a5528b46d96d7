//! ## Commodore 1541 directory entries
//!
//! 32 byte slot: the first two bytes carry the directory chain link (only
//! meaningful in a sector's first slot), then the file type byte (DEL/SEQ/
//! PRG/USR/REL plus the locked and closed bits), the first track/sector of
//! the file chain, a 16 character name padded with 0xA0, and the block
//! count.  Type byte 0x00 marks an unused slot.

use crate::fs::attr::FileAttr;
use crate::fs::group::GroupList;
use crate::fs::param::{BasicParam,FormatKind};
use super::{DirItemOps,hex_field,string_from_field};

const TYPE_OFF: usize = 2;
const TRACK_OFF: usize = 3;
const SECTOR_OFF: usize = 4;
const NAME: (usize,usize) = (5,16);
const BLOCKS_OFF: usize = 0x1e;
const NAME_PAD: u8 = 0xa0;

const TYPE_SEQ: u8 = 1;
const TYPE_PRG: u8 = 2;
const TYPE_USR: u8 = 3;
const TYPE_REL: u8 = 4;
const LOCKED: u8 = 0x40;
const CLOSED: u8 = 0x80;

/// payload bytes per sector after the 2 byte chain link
pub const SECTOR_PAYLOAD: usize = 254;

pub struct C1541Ops;

impl DirItemOps for C1541Ops {
    fn kind(&self) -> FormatKind {
        FormatKind::C1541
    }
    fn record_size(&self) -> usize {
        32
    }
    fn check(&self,rec: &[u8],_last: &mut bool) -> bool {
        rec[TYPE_OFF]==0 || rec[TYPE_OFF] & 0x07 <= TYPE_REL
    }
    fn check_used(&self,rec: &[u8],_unuse_hint: bool) -> bool {
        rec[TYPE_OFF] != 0
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
        let mut attr = match rec[TYPE_OFF] & 0x07 {
            TYPE_PRG => FileAttr::BASIC | FileAttr::BINARY,
            TYPE_USR => FileAttr::MACHINE | FileAttr::BINARY,
            TYPE_REL => FileAttr::DATA | FileAttr::RANDOM,
            _ => FileAttr::DATA | FileAttr::ASCII
        };
        if rec[TYPE_OFF] & LOCKED != 0 {
            attr |= FileAttr::READONLY;
        }
        attr
    }
    fn set_file_attr(&self,rec: &mut [u8],_param: &BasicParam,attr: FileAttr) {
        let mut t = CLOSED | match (attr.contains(FileAttr::RANDOM),attr.contains(FileAttr::MACHINE),attr.contains(FileAttr::BASIC)) {
            (true,_,_) => TYPE_REL,
            (_,true,_) => TYPE_USR,
            (_,_,true) => TYPE_PRG,
            _ => TYPE_SEQ
        };
        if attr.contains(FileAttr::READONLY) {
            t |= LOCKED;
        }
        rec[TYPE_OFF] = t;
    }
    fn file_size(&self,rec: &[u8],_param: &BasicParam,groups: &GroupList) -> usize {
        match groups.is_empty() {
            false => groups.total_size(),
            true => (rec[BLOCKS_OFF] as usize | (rec[BLOCKS_OFF+1] as usize) << 8)*SECTOR_PAYLOAD
        }
    }
    fn set_file_size(&self,rec: &mut [u8],_param: &BasicParam,val: usize) {
        let blocks = (val + SECTOR_PAYLOAD - 1)/SECTOR_PAYLOAD;
        rec[BLOCKS_OFF] = blocks as u8;
        rec[BLOCKS_OFF+1] = (blocks >> 8) as u8;
    }
    /// start group packs the (track,sector) pair of the first chained sector
    fn start_group(&self,rec: &[u8],unit: usize) -> Option<usize> {
        match unit {
            0 if rec[TRACK_OFF]==0 => None,
            0 => Some(((rec[TRACK_OFF] as usize) << 8) | rec[SECTOR_OFF] as usize),
            _ => None
        }
    }
    fn set_start_group(&self,rec: &mut [u8],unit: usize,group: usize) {
        if unit==0 {
            rec[TRACK_OFF] = (group >> 8) as u8;
            rec[SECTOR_OFF] = group as u8;
        }
    }
    fn delete(&self,rec: &mut [u8],_param: &BasicParam) {
        rec[TYPE_OFF] = 0;
    }
    fn clear(&self,rec: &mut [u8],_param: &BasicParam) {
        rec.fill(0);
        rec[NAME.0..NAME.0+NAME.1].fill(NAME_PAD);
    }
    fn inner_fields(&self,rec: &[u8]) -> Vec<(String,String)> {
        vec![
            hex_field("TYPE",&rec[TYPE_OFF..TYPE_OFF+1]),
            hex_field("START",&rec[TRACK_OFF..SECTOR_OFF+1]),
            ("NAME".to_string(),string_from_field(&rec[NAME.0..NAME.0+NAME.1],NAME_PAD)),
            hex_field("BLOCKS",&rec[BLOCKS_OFF..BLOCKS_OFF+2])
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attr_bijection() {
        let ops = C1541Ops;
        let param = crate::fs::param::builtin_params()[12].clone();
        let combos = [
            FileAttr::DATA | FileAttr::ASCII,
            FileAttr::BASIC | FileAttr::BINARY,
            FileAttr::MACHINE | FileAttr::BINARY | FileAttr::READONLY,
            FileAttr::DATA | FileAttr::RANDOM
        ];
        for attr in combos {
            let mut rec = vec![0u8;32];
            ops.set_file_attr(&mut rec,&param,attr);
            assert_eq!(ops.file_attr(&rec),attr);
        }
    }
}
