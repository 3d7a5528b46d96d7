//! ## FLEX directory entries
//!
//! 24 byte record: 8 character name, 3 character extension, protection
//! byte, start and end track/sector pairs, a big endian total sector count
//! (6809 byte order), a random access flag and a month/day/year date.
//! The allocation chain lives in the sectors themselves (forward links in
//! each sector header); the start group packs the track/sector pair.

use chrono::{NaiveDate,NaiveDateTime};
use crate::fs::attr::FileAttr;
use crate::fs::group::GroupList;
use crate::fs::param::{BasicParam,FormatKind};
use super::{DirItemOps,hex_field,put_u16_be,string_from_field,u16_be_at};

const NAME: (usize,usize) = (0,8);
const EXT: (usize,usize) = (8,3);
const PROT_OFF: usize = 11;
const START_TRACK_OFF: usize = 13;
const START_SECTOR_OFF: usize = 14;
const END_TRACK_OFF: usize = 15;
const END_SECTOR_OFF: usize = 16;
const TOTAL_OFF: usize = 17;
const RANDOM_OFF: usize = 19;
const MONTH_OFF: usize = 21;
const DAY_OFF: usize = 22;
const YEAR_OFF: usize = 23;
const DELETED: u8 = 0xff;

const PROT_READONLY: u8 = 0x80;
const PROT_HIDDEN: u8 = 0x10;

/// link payload per sector after the 4 byte header
pub const SECTOR_PAYLOAD: usize = 252;

pub struct FlexOps;

impl DirItemOps for FlexOps {
    fn kind(&self) -> FormatKind {
        FormatKind::Flex
    }
    fn record_size(&self) -> usize {
        24
    }
    /// dir sectors have a 16 byte header before the entries
    fn record_offsets(&self,stream_len: usize,sector_size: usize) -> Vec<usize> {
        let per_sector = (sector_size - 16)/self.record_size();
        let mut ans = Vec::new();
        for sec in 0..stream_len/sector_size {
            for i in 0..per_sector {
                ans.push(sec*sector_size + 16 + i*self.record_size());
            }
        }
        ans
    }
    fn check(&self,rec: &[u8],_last: &mut bool) -> bool {
        if rec[0]==0 || rec[0]==DELETED {
            return true;
        }
        rec[NAME.0..NAME.0+NAME.1].iter().all(|b| *b >= 0x20 || *b==0)
    }
    fn check_used(&self,rec: &[u8],_unuse_hint: bool) -> bool {
        rec[0] != 0 && rec[0] != DELETED
    }
    fn name_span(&self) -> (usize,usize) {
        NAME
    }
    fn ext_span(&self) -> Option<(usize,usize)> {
        Some(EXT)
    }
    fn name_pad(&self) -> u8 {
        0x00
    }
    fn file_type1(&self,rec: &[u8]) -> u8 {
        rec[PROT_OFF]
    }
    fn set_file_type1(&self,rec: &mut [u8],_param: &BasicParam,val: u8) {
        rec[PROT_OFF] = val;
    }
    fn file_attr(&self,rec: &[u8]) -> FileAttr {
        let mut attr = FileAttr::DATA;
        if rec[PROT_OFF] & PROT_READONLY != 0 {
            attr |= FileAttr::READONLY;
        }
        if rec[PROT_OFF] & PROT_HIDDEN != 0 {
            attr |= FileAttr::HIDDEN;
        }
        if rec[RANDOM_OFF] != 0 {
            attr |= FileAttr::RANDOM;
        }
        attr
    }
    fn set_file_attr(&self,rec: &mut [u8],_param: &BasicParam,attr: FileAttr) {
        let mut p = 0;
        if attr.contains(FileAttr::READONLY) {
            p |= PROT_READONLY;
        }
        if attr.contains(FileAttr::HIDDEN) {
            p |= PROT_HIDDEN;
        }
        rec[PROT_OFF] = p;
        rec[RANDOM_OFF] = match attr.contains(FileAttr::RANDOM) {
            true => 0x02,
            false => 0
        };
    }
    fn file_size(&self,rec: &[u8],_param: &BasicParam,groups: &GroupList) -> usize {
        match u16_be_at(rec,TOTAL_OFF) {
            0 => groups.total_size(),
            n => n as usize * SECTOR_PAYLOAD
        }
    }
    fn set_file_size(&self,rec: &mut [u8],_param: &BasicParam,val: usize) {
        let sectors = (val + SECTOR_PAYLOAD - 1)/SECTOR_PAYLOAD;
        put_u16_be(rec,TOTAL_OFF,sectors as u16);
    }
    /// start group packs the (track,sector) pair of the first linked sector
    fn start_group(&self,rec: &[u8],unit: usize) -> Option<usize> {
        match unit {
            0 if rec[START_TRACK_OFF]==0 && rec[START_SECTOR_OFF]==0 => None,
            0 => Some(((rec[START_TRACK_OFF] as usize) << 8) | rec[START_SECTOR_OFF] as usize),
            _ => None
        }
    }
    fn set_start_group(&self,rec: &mut [u8],unit: usize,group: usize) {
        if unit==0 {
            rec[START_TRACK_OFF] = (group >> 8) as u8;
            rec[START_SECTOR_OFF] = group as u8;
        }
    }
    fn set_groups(&self,rec: &mut [u8],groups: &GroupList) {
        if let Some(first) = groups.first_group() {
            self.set_start_group(rec,0,first);
        }
        if let Some(last) = groups.last_group() {
            rec[END_TRACK_OFF] = (last >> 8) as u8;
            rec[END_SECTOR_OFF] = last as u8;
        }
    }
    fn has_create_datetime(&self) -> bool {
        true
    }
    fn create_datetime(&self,rec: &[u8]) -> Option<NaiveDateTime> {
        let yy = rec[YEAR_OFF] as i32;
        let year = match yy < 75 {
            true => 2000 + yy,
            false => 1900 + yy
        };
        NaiveDate::from_ymd_opt(year,rec[MONTH_OFF] as u32,rec[DAY_OFF] as u32)?.and_hms_opt(0,0,0)
    }
    fn set_create_datetime(&self,rec: &mut [u8],val: NaiveDateTime) {
        use chrono::Datelike;
        rec[MONTH_OFF] = val.month() as u8;
        rec[DAY_OFF] = val.day() as u8;
        rec[YEAR_OFF] = (val.year() % 100) as u8;
    }
    fn delete(&self,rec: &mut [u8],_param: &BasicParam) {
        rec[0] = DELETED;
    }
    fn clear(&self,rec: &mut [u8],_param: &BasicParam) {
        rec.fill(0);
    }
    fn inner_fields(&self,rec: &[u8]) -> Vec<(String,String)> {
        vec![
            ("NAME".to_string(),string_from_field(&rec[NAME.0..NAME.0+NAME.1],0)),
            ("EXT".to_string(),string_from_field(&rec[EXT.0..EXT.0+EXT.1],0)),
            hex_field("PROT",&rec[PROT_OFF..PROT_OFF+1]),
            hex_field("START",&rec[START_TRACK_OFF..START_SECTOR_OFF+1]),
            hex_field("END",&rec[END_TRACK_OFF..END_SECTOR_OFF+1]),
            hex_field("TOTAL",&rec[TOTAL_OFF..TOTAL_OFF+2]),
            hex_field("RANDOM",&rec[RANDOM_OFF..RANDOM_OFF+1])
        ]
    }
}
