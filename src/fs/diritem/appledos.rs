//! ## Apple DOS 3.3 directory entries
//!
//! 35 byte record inside the chained catalog sectors: track/sector of the
//! file's track-sector list, a type byte (locked bit 0x80), a 30 character
//! high-bit-ASCII name and the sector count.  Track byte 0x00 marks a never
//! used slot, 0xFF a deleted one.  Catalog sectors carry an 11 byte header
//! before the seven entries.

use crate::fs::attr::FileAttr;
use crate::fs::group::GroupList;
use crate::fs::param::{BasicParam,FormatKind};
use super::{DirItemOps,hex_field,string_from_field};

const TRACK_OFF: usize = 0;
const SECTOR_OFF: usize = 1;
const TYPE_OFF: usize = 2;
const NAME: (usize,usize) = (3,30);
const SECTORS_OFF: usize = 33;
const DELETED: u8 = 0xff;
const NAME_PAD: u8 = 0xa0;
const SECTOR_HEADER: usize = 11;

const TYPE_TEXT: u8 = 0x00;
const TYPE_APPLESOFT: u8 = 0x02;
const TYPE_BINARY: u8 = 0x04;
const LOCKED: u8 = 0x80;

pub struct AppleDosOps;

impl DirItemOps for AppleDosOps {
    fn kind(&self) -> FormatKind {
        FormatKind::AppleDos
    }
    fn record_size(&self) -> usize {
        35
    }
    fn record_offsets(&self,stream_len: usize,sector_size: usize) -> Vec<usize> {
        let per_sector = (sector_size - SECTOR_HEADER)/self.record_size();
        let mut ans = Vec::new();
        for sec in 0..stream_len/sector_size {
            for i in 0..per_sector {
                ans.push(sec*sector_size + SECTOR_HEADER + i*self.record_size());
            }
        }
        ans
    }
    fn check(&self,rec: &[u8],_last: &mut bool) -> bool {
        matches!(rec[TRACK_OFF],0|DELETED) || rec[TRACK_OFF] < 50
    }
    fn check_used(&self,rec: &[u8],_unuse_hint: bool) -> bool {
        rec[TRACK_OFF] != 0 && rec[TRACK_OFF] != DELETED
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
        let mut attr = match rec[TYPE_OFF] & 0x7f {
            TYPE_BINARY => FileAttr::MACHINE | FileAttr::BINARY,
            TYPE_TEXT => FileAttr::DATA | FileAttr::ASCII,
            _ => FileAttr::BASIC | FileAttr::BINARY
        };
        if rec[TYPE_OFF] & LOCKED != 0 {
            attr |= FileAttr::READONLY;
        }
        attr
    }
    fn set_file_attr(&self,rec: &mut [u8],_param: &BasicParam,attr: FileAttr) {
        let mut t = match (attr.contains(FileAttr::MACHINE),attr.contains(FileAttr::BASIC)) {
            (true,_) => TYPE_BINARY,
            (_,true) => TYPE_APPLESOFT,
            _ => TYPE_TEXT
        };
        if attr.contains(FileAttr::READONLY) {
            t |= LOCKED;
        }
        rec[TYPE_OFF] = t;
    }
    fn file_size(&self,rec: &[u8],param: &BasicParam,groups: &GroupList) -> usize {
        match groups.is_empty() {
            false => groups.total_size(),
            true => {
                let count = rec[SECTORS_OFF] as usize | (rec[SECTORS_OFF+1] as usize) << 8;
                count*param.sector_size
            }
        }
    }
    fn set_file_size(&self,rec: &mut [u8],param: &BasicParam,val: usize) {
        let sectors = (val + param.sector_size - 1)/param.sector_size;
        rec[SECTORS_OFF] = sectors as u8;
        rec[SECTORS_OFF+1] = (sectors >> 8) as u8;
    }
    /// start group packs the (track,sector) of the track-sector list
    fn start_group(&self,rec: &[u8],unit: usize) -> Option<usize> {
        match unit {
            0 if rec[TRACK_OFF]==0 || rec[TRACK_OFF]==DELETED => None,
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
        rec[TRACK_OFF] = DELETED;
    }
    fn clear(&self,rec: &mut [u8],_param: &BasicParam) {
        rec.fill(0);
        rec[NAME.0..NAME.0+NAME.1].fill(NAME_PAD);
    }
    fn inner_fields(&self,rec: &[u8]) -> Vec<(String,String)> {
        vec![
            hex_field("TSLIST",&rec[TRACK_OFF..SECTOR_OFF+1]),
            hex_field("TYPE",&rec[TYPE_OFF..TYPE_OFF+1]),
            ("NAME".to_string(),string_from_field(&rec[NAME.0..NAME.0+NAME.1],NAME_PAD)),
            hex_field("SECTORS",&rec[SECTORS_OFF..SECTORS_OFF+2])
        ]
    }
}
