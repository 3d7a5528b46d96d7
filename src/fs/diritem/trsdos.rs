//! ## TRSDOS 2.3 directory entries
//!
//! 32 byte record: a flag byte (in-use, invisible, protection), the number
//! of bytes used in the final sector, an 8+3 name, password hashes, the end
//! record number and five granule extents.  Each extent is a track byte
//! plus a packed granule byte (high 3 bits first granule on the track, low
//! 5 bits contiguous granule count minus one); 0xFFFF marks an unused
//! extent.

use crate::fs::attr::FileAttr;
use crate::fs::group::GroupList;
use crate::fs::param::{BasicParam,FormatKind};
use super::{DirItemOps,hex_field,put_u16,string_from_field,u16_at};

const FLAG_OFF: usize = 0;
const EOF_OFF: usize = 3;
const NAME: (usize,usize) = (5,8);
const EXT: (usize,usize) = (13,3);
const ERN_OFF: usize = 20;
pub const EXTENT_OFF: usize = 22;
pub const EXTENT_COUNT: usize = 5;

const FLAG_USED: u8 = 0x10;
const FLAG_HIDDEN: u8 = 0x08;
const FLAG_READONLY: u8 = 0x01;

pub struct TrsdosOps;

impl DirItemOps for TrsdosOps {
    fn kind(&self) -> FormatKind {
        FormatKind::Trsdos
    }
    fn record_size(&self) -> usize {
        32
    }
    fn check(&self,rec: &[u8],_last: &mut bool) -> bool {
        if rec[FLAG_OFF] & FLAG_USED==0 {
            return true;
        }
        rec[NAME.0..NAME.0+NAME.1].iter().all(|b| *b >= 0x20 || *b==0)
    }
    fn check_used(&self,rec: &[u8],_unuse_hint: bool) -> bool {
        rec[FLAG_OFF] & FLAG_USED != 0
    }
    fn name_span(&self) -> (usize,usize) {
        NAME
    }
    fn ext_span(&self) -> Option<(usize,usize)> {
        Some(EXT)
    }
    fn file_type1(&self,rec: &[u8]) -> u8 {
        rec[FLAG_OFF]
    }
    fn set_file_type1(&self,rec: &mut [u8],_param: &BasicParam,val: u8) {
        rec[FLAG_OFF] = val;
    }
    fn file_attr(&self,rec: &[u8]) -> FileAttr {
        let mut attr = FileAttr::DATA;
        if rec[FLAG_OFF] & FLAG_HIDDEN != 0 {
            attr |= FileAttr::HIDDEN;
        }
        if rec[FLAG_OFF] & FLAG_READONLY != 0 {
            attr |= FileAttr::READONLY;
        }
        attr
    }
    /// writing attributes implies a live entry, the in-use bit comes along
    fn set_file_attr(&self,rec: &mut [u8],_param: &BasicParam,attr: FileAttr) {
        let mut f = FLAG_USED;
        if attr.contains(FileAttr::HIDDEN) {
            f |= FLAG_HIDDEN;
        }
        if attr.contains(FileAttr::READONLY) {
            f |= FLAG_READONLY;
        }
        rec[FLAG_OFF] = f;
    }
    fn file_size(&self,rec: &[u8],param: &BasicParam,_groups: &GroupList) -> usize {
        let ern = u16_at(rec,ERN_OFF) as usize;
        let eof = rec[EOF_OFF] as usize;
        match ern {
            0 => 0,
            n => (n-1)*param.sector_size + match eof {
                0 => param.sector_size,
                e => e
            }
        }
    }
    fn set_file_size(&self,rec: &mut [u8],param: &BasicParam,val: usize) {
        let ern = (val + param.sector_size - 1)/param.sector_size;
        put_u16(rec,ERN_OFF,ern as u16);
        rec[EOF_OFF] = (val % param.sector_size) as u8;
    }
    /// group = track * granules-per-track + first granule of extent 0
    fn start_group(&self,rec: &[u8],unit: usize) -> Option<usize> {
        match unit {
            0 if rec[EXTENT_OFF]==0xff => None,
            0 => {
                let track = rec[EXTENT_OFF] as usize;
                let gran = (rec[EXTENT_OFF+1] >> 5) as usize;
                Some(track*2 + gran)
            },
            _ => None
        }
    }
    fn set_start_group(&self,rec: &mut [u8],unit: usize,group: usize) {
        if unit==0 {
            rec[EXTENT_OFF] = (group/2) as u8;
            rec[EXTENT_OFF+1] = ((group%2) as u8) << 5;
        }
    }
    fn delete(&self,rec: &mut [u8],_param: &BasicParam) {
        rec[FLAG_OFF] &= !FLAG_USED;
    }
    fn clear(&self,rec: &mut [u8],_param: &BasicParam) {
        rec.fill(0);
        for i in 0..EXTENT_COUNT {
            rec[EXTENT_OFF+i*2] = 0xff;
            rec[EXTENT_OFF+i*2+1] = 0xff;
        }
    }
    fn inner_fields(&self,rec: &[u8]) -> Vec<(String,String)> {
        vec![
            hex_field("FLAGS",&rec[FLAG_OFF..FLAG_OFF+1]),
            hex_field("EOF",&rec[EOF_OFF..EOF_OFF+1]),
            ("NAME".to_string(),string_from_field(&rec[NAME.0..NAME.0+NAME.1],0x20)),
            ("EXT".to_string(),string_from_field(&rec[EXT.0..EXT.0+EXT.1],0x20)),
            hex_field("ERN",&rec[ERN_OFF..ERN_OFF+2]),
            hex_field("EXTENTS",&rec[EXTENT_OFF..EXTENT_OFF+EXTENT_COUNT*2])
        ]
    }
}
