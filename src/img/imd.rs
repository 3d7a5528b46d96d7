//! ## Support for ImageDisk IMD disk images
//!
//! An IMD stream opens with an ASCII line `IMD v.vv: date`, a free text
//! comment terminated by 0x1A, then track records.  Each track record has a
//! 5 byte header, a sector numbering map, optional cylinder and head maps,
//! and one data record per sector.  A data record is a code byte optionally
//! followed by a payload: odd codes carry the full sector, even codes carry
//! a single fill byte, and 0 means the sector was unreadable.

use log::{trace,debug};
use crate::img::{Disk,DiskImageFile,DiskResult,Error,ImageParser,Sector,Track,TypeHints};
use crate::img::model::DiskDensity;

const CYL_MAP_FLAG: u8 = 0x80;
const HEAD_MAP_FLAG: u8 = 0x40;
const HEAD_MASK: u8 = 0x0f;
const TERMINATOR: u8 = 0x1a;

pub fn file_extensions() -> Vec<String> {
    vec!["imd".to_string()]
}

pub struct ImdParser;

impl ImdParser {
    /// Index of the byte following the 0x1A comment terminator.
    fn comment_end(data: &[u8]) -> Option<usize> {
        data.iter().position(|b| *b==TERMINATOR).map(|i| i+1)
    }
    fn signature_ok(data: &[u8]) -> bool {
        data.len() > 10 && &data[0..4]==b"IMD " && data[4]==b'1' && data[5]==b'.'
    }
}

impl ImageParser for ImdParser {
    fn name(&self) -> &'static str {
        "imd"
    }
    fn file_extensions(&self) -> Vec<String> {
        file_extensions()
    }
    fn check(&self,data: &[u8],_hints: &mut TypeHints,_result: &mut DiskResult) -> i32 {
        if !Self::signature_ok(data) {
            return -1;
        }
        match Self::comment_end(data) {
            Some(end) if end < data.len() => 0,
            _ => -1
        }
    }
    fn parse(&self,data: &[u8],_hints: &TypeHints,file: &mut DiskImageFile,result: &mut DiskResult) -> i32 {
        if !Self::signature_ok(data) {
            return result.fatal(Error::DiskHeader,"not an IMD version 1 stream");
        }
        let mut ptr = match Self::comment_end(data) {
            Some(end) => end,
            None => return result.fatal(Error::DiskHeader,"comment terminator not found")
        };
        let comment = String::from_utf8_lossy(&data[0..ptr-1]).trim().to_string();
        debug!("{}",comment);
        let mut disk = Disk::new("",DiskDensity::D2);
        let mut worst = 0;
        while ptr < data.len() {
            if ptr + 5 > data.len() {
                worst = result.warning(Error::DiskTooSmall,"stream ends inside track header");
                break;
            }
            let track_offset = ptr as u32;
            let mode = data[ptr];
            let cyl = data[ptr+1];
            let head = data[ptr+2];
            let count = data[ptr+3] as usize;
            let shift = data[ptr+4];
            ptr += 5;
            if mode > 5 {
                return result.fatal(Error::DiskHeader,&format!("unknown mode {}",mode));
            }
            if shift==0xff {
                // per-sector sizes within one track
                return result.fatal(Error::UnsupportedType,"inhomogeneous sector sizes");
            }
            if shift > 6 {
                return result.fatal(Error::SectorSizeHeader,&format!("size exponent {}",shift));
            }
            let size = Sector::size_from_code(shift);
            if ptr + count > data.len() {
                return result.fatal(Error::DiskTooSmall,"stream ends inside sector map");
            }
            let sector_map = data[ptr..ptr+count].to_vec();
            ptr += count;
            let cyl_map: Vec<u8> = match head & CYL_MAP_FLAG {
                0 => vec![cyl;count],
                _ => {
                    if ptr + count > data.len() {
                        return result.fatal(Error::DiskTooSmall,"stream ends inside cylinder map");
                    }
                    let m = data[ptr..ptr+count].to_vec();
                    ptr += count;
                    m
                }
            };
            let head_map: Vec<u8> = match head & HEAD_MAP_FLAG {
                0 => vec![head & HEAD_MASK;count],
                _ => {
                    if ptr + count > data.len() {
                        return result.fatal(Error::DiskTooSmall,"stream ends inside head map");
                    }
                    let m = data[ptr..ptr+count].to_vec();
                    ptr += count;
                    m
                }
            };
            if mode%3==0 {
                disk.density = DiskDensity::D2HD; // 500 kbps
            }
            let pos = cyl as usize * 2 + (head & HEAD_MASK) as usize;
            let mut track = Track::new(cyl,head & HEAD_MASK,pos);
            for i in 0..count {
                if ptr >= data.len() {
                    return result.fatal(Error::DiskTooSmall,"stream ends inside data record");
                }
                let code = data[ptr];
                ptr += 1;
                let payload = match code {
                    0 => {
                        worst = result.warning(Error::NoSector,
                            &format!("sector {} of cyl {} unavailable",sector_map[i],cyl));
                        vec![0;size]
                    },
                    1 | 3 | 5 | 7 => {
                        if ptr + size > data.len() {
                            return result.fatal(Error::DiskTooSmall,"stream ends inside sector data");
                        }
                        let v = data[ptr..ptr+size].to_vec();
                        ptr += size;
                        v
                    },
                    2 | 4 | 6 | 8 => {
                        if ptr >= data.len() {
                            return result.fatal(Error::DiskTooSmall,"stream ends inside fill record");
                        }
                        let fill = data[ptr];
                        ptr += 1;
                        vec![fill;size]
                    },
                    _ => {
                        return result.fatal(Error::DiskHeader,&format!("unknown data code {}",code));
                    }
                };
                let mut sec = Sector::new(cyl_map[i],head_map[i],sector_map[i],shift,payload);
                sec.single_density = mode < 3;
                sec.deleted = matches!(code,3 | 4 | 7 | 8);
                sec.status = code;
                trace!("sector C{} H{} R{}",cyl_map[i],head_map[i],sector_map[i]);
                track.add_sector(sec);
            }
            let (c,h) = track.major_ch();
            track.track_num = c;
            track.side_num = h;
            track.compute_interleave();
            if !disk.add_track(track,track_offset) {
                return result.fatal(Error::DuplicateTrack,&format!("slot {}",pos));
            }
        }
        if disk.track_count()==0 {
            return result.fatal(Error::NoTrack,"no tracks in IMD stream");
        }
        disk.name = comment.chars().take(16).collect();
        debug!("IMD {} tracks",disk.track_count());
        file.add_disk(disk);
        worst
    }
}
