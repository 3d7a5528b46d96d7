//! ## Support for Apple 2MG disk images
//!
//! 2MG is a 64 byte header wrapped around a plain sector dump, with a
//! format field selecting DOS or ProDOS sector order and optional trailing
//! comment and creator regions.  The inner dump is decoded with the plain
//! geometry rules; nibblized payloads (format 2) are not handled.

use log::{debug};
use crate::img::{names,Disk,DiskImageFile,DiskParam,DiskResult,Error,ImageParser,Sector,Track,TypeHints};
use crate::img::model::DiskDensity;

const MAGIC: &[u8] = b"2IMG";
const HEADER_SIZE: usize = 64;
const FMT_DOS: u32 = 0;
const FMT_PRODOS: u32 = 1;
const FMT_NIB: u32 = 2;
const LOCKED: u32 = 0x8000_0000;

pub fn file_extensions() -> Vec<String> {
    vec!["2mg".to_string(),"2img".to_string()]
}

fn le32(data: &[u8],at: usize) -> u32 {
    u32::from_le_bytes([data[at],data[at+1],data[at+2],data[at+3]])
}

pub struct Dot2mgParser;

impl Dot2mgParser {
    /// Geometry of the wrapped dump: template match first, then the two
    /// canonical Apple capacities.
    fn inner_param(len: usize,fmt: u32) -> Option<DiskParam> {
        match len {
            143360 => Some(DiskParam::new("5.25",35,1,16,256,DiskDensity::D2)),
            819200 if fmt==FMT_PRODOS => Some(DiskParam::new("3.5-800K",80,2,10,512,DiskDensity::D2DD)),
            _ => names::size_matches(len).into_iter().next()
        }
    }
}

impl ImageParser for Dot2mgParser {
    fn name(&self) -> &'static str {
        "2mg"
    }
    fn file_extensions(&self) -> Vec<String> {
        file_extensions()
    }
    fn check(&self,data: &[u8],_hints: &mut TypeHints,_result: &mut DiskResult) -> i32 {
        if data.len() < HEADER_SIZE || &data[0..4] != MAGIC {
            return -1;
        }
        let fmt = le32(data,12);
        if fmt==FMT_NIB || fmt > FMT_NIB {
            return -1;
        }
        let data_offset = le32(data,24) as usize;
        let data_len = le32(data,28) as usize;
        if data_offset < HEADER_SIZE || data_offset + data_len > data.len() {
            return -1;
        }
        match Self::inner_param(data_len,fmt) {
            Some(_) => 0,
            None => -1
        }
    }
    fn parse(&self,data: &[u8],_hints: &TypeHints,file: &mut DiskImageFile,result: &mut DiskResult) -> i32 {
        if data.len() < HEADER_SIZE || &data[0..4] != MAGIC {
            return result.fatal(Error::DiskHeader,"not a 2MG stream");
        }
        let fmt = le32(data,12);
        if fmt==FMT_NIB {
            return result.fatal(Error::UnsupportedType,"nibblized 2MG payload");
        }
        if fmt > FMT_NIB {
            return result.fatal(Error::DiskHeader,&format!("unknown payload format {}",fmt));
        }
        let flags = le32(data,16);
        let data_offset = le32(data,24) as usize;
        let data_len = le32(data,28) as usize;
        if data_offset < HEADER_SIZE || data_offset + data_len > data.len() {
            return result.fatal(Error::OverflowOffset,"payload region outside stream");
        }
        let param = match Self::inner_param(data_len,fmt) {
            Some(p) => p,
            None => return result.fatal(Error::InvalidDisk,&format!("no geometry for {} byte payload",data_len))
        };
        let inner = &data[data_offset..data_offset+data_len];
        let mut disk = Disk::new(&param.name,param.density);
        disk.write_protected = flags & LOCKED != 0;
        let track_bytes = param.sectors*param.sector_size;
        for cyl in 0..param.tracks {
            for side in 0..param.sides {
                let idx = cyl*param.sides + side;
                let pos = cyl*2 + side;
                let mut track = Track::new(cyl as u8,side as u8,pos);
                for r in 0..param.sectors {
                    let src = idx*track_bytes + r*param.sector_size;
                    let sec = Sector::new(cyl as u8,side as u8,r as u8,param.size_code(),
                        inner[src..src+param.sector_size].to_vec());
                    track.add_sector(sec);
                }
                if !disk.add_track(track,(data_offset + idx*track_bytes) as u32) {
                    return result.fatal(Error::DuplicateTrack,&format!("slot {}",pos));
                }
            }
        }
        debug!("2MG format {} with {} byte payload",fmt,data_len);
        file.add_disk(disk);
        0
    }
}
