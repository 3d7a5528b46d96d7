//! ## OS-9 directory entries
//!
//! 32 byte record: up to 29 name characters with the final character's
//! high bit set, then a 24 bit big endian LSN of the file descriptor
//! sector.  Attributes, sizes and segment lists live in the descriptor,
//! which the allocation strategy reads; the entry itself only names it.
//! A zero first byte marks an unused slot.

use crate::fs::attr::FileAttr;
use crate::fs::group::GroupList;
use crate::fs::param::{BasicParam,FormatKind};
use super::{DirItemOps,hex_field,string_from_field};

const NAME: (usize,usize) = (0,29);
const LSN_OFF: usize = 29;

pub struct Os9Ops;

impl DirItemOps for Os9Ops {
    fn kind(&self) -> FormatKind {
        FormatKind::Os9
    }
    fn record_size(&self) -> usize {
        32
    }
    fn check(&self,rec: &[u8],_last: &mut bool) -> bool {
        if rec[0]==0 {
            return true;
        }
        // one character must carry the terminator bit
        rec[NAME.0..NAME.0+NAME.1].iter().any(|b| b & 0x80 != 0)
    }
    fn check_used(&self,rec: &[u8],_unuse_hint: bool) -> bool {
        rec[0] != 0
    }
    fn name_span(&self) -> (usize,usize) {
        NAME
    }
    fn name_pad(&self) -> u8 {
        0x00
    }
    fn file_type1(&self,rec: &[u8]) -> u8 {
        rec[LSN_OFF]
    }
    fn set_file_type1(&self,_rec: &mut [u8],_param: &BasicParam,_val: u8) {}
    /// attributes live in the file descriptor, resolved during the scan
    fn file_attr(&self,rec: &[u8]) -> FileAttr {
        match rec[0]==b'.' {
            true => FileAttr::DATA | FileAttr::HIDDEN,
            false => FileAttr::DATA
        }
    }
    fn set_file_attr(&self,_rec: &mut [u8],_param: &BasicParam,_attr: FileAttr) {}
    fn file_size(&self,_rec: &[u8],_param: &BasicParam,groups: &GroupList) -> usize {
        groups.total_size()
    }
    fn start_group(&self,rec: &[u8],unit: usize) -> Option<usize> {
        match unit {
            0 => {
                let lsn = ((rec[LSN_OFF] as usize) << 16)
                    | ((rec[LSN_OFF+1] as usize) << 8)
                    | rec[LSN_OFF+2] as usize;
                match lsn {
                    0 => None,
                    n => Some(n)
                }
            },
            _ => None
        }
    }
    fn set_start_group(&self,rec: &mut [u8],unit: usize,group: usize) {
        if unit==0 {
            rec[LSN_OFF] = (group >> 16) as u8;
            rec[LSN_OFF+1] = (group >> 8) as u8;
            rec[LSN_OFF+2] = group as u8;
        }
    }
    fn delete(&self,rec: &mut [u8],_param: &BasicParam) {
        rec[0] = 0;
    }
    fn clear(&self,rec: &mut [u8],_param: &BasicParam) {
        rec.fill(0);
    }
    fn pre_import(&self,name: &str,_attr: FileAttr) -> String {
        // OS-9 names carry no extension
        match name.rsplit_once('.') {
            Some((base,_)) if !base.is_empty() => base.to_string(),
            _ => name.to_string()
        }
    }
    fn inner_fields(&self,rec: &[u8]) -> Vec<(String,String)> {
        vec![
            ("NAME".to_string(),string_from_field(&rec[NAME.0..NAME.0+NAME.1],0)),
            hex_field("FD_LSN",&rec[LSN_OFF..LSN_OFF+3])
        ]
    }
}
