//! ## Support for FDI disk images
//!
//! An FDI stream is a fixed 0x1000 byte header with big endian geometry
//! fields followed by a plain dump of the sectors.  The header carries no
//! magic, so `check` validates that the declared geometry accounts for the
//! stream length exactly.

use log::{debug};
use crate::img::{Disk,DiskImageFile,DiskParam,DiskResult,Error,ImageParser,Sector,Track,TypeHints};
use crate::img::model::DiskDensity;

const HEADER_SIZE: usize = 0x1000;

pub fn file_extensions() -> Vec<String> {
    vec!["fdi".to_string()]
}

fn be32(data: &[u8],at: usize) -> u32 {
    u32::from_be_bytes([data[at],data[at+1],data[at+2],data[at+3]])
}

fn read_param(data: &[u8]) -> Option<DiskParam> {
    let header_size = be32(data,8) as usize;
    let body_size = be32(data,12) as usize;
    let sector_size = be32(data,16) as usize;
    let sectors = be32(data,20) as usize;
    let sides = be32(data,24) as usize;
    let tracks = be32(data,28) as usize;
    if header_size != HEADER_SIZE {
        return None;
    }
    if !matches!(sector_size,128|256|512|1024) {
        return None;
    }
    if sectors==0 || sectors > 32 || sides==0 || sides > 2 || tracks==0 || tracks > 85 {
        return None;
    }
    if tracks*sides*sectors*sector_size != body_size {
        return None;
    }
    let density = match body_size {
        l if l > 1_000_000 => DiskDensity::D2HD,
        l if l > 500_000 => DiskDensity::D2DD,
        _ => DiskDensity::D2
    };
    Some(DiskParam::new("",tracks,sides,sectors,sector_size,density))
}

pub struct FdiParser;

impl ImageParser for FdiParser {
    fn name(&self) -> &'static str {
        "fdi"
    }
    fn file_extensions(&self) -> Vec<String> {
        file_extensions()
    }
    fn check(&self,data: &[u8],_hints: &mut TypeHints,_result: &mut DiskResult) -> i32 {
        if data.len() < HEADER_SIZE {
            return -1;
        }
        match read_param(data) {
            Some(p) if HEADER_SIZE + p.disk_size()==data.len() => 0,
            _ => -1
        }
    }
    fn parse(&self,data: &[u8],_hints: &TypeHints,file: &mut DiskImageFile,result: &mut DiskResult) -> i32 {
        if data.len() < HEADER_SIZE {
            return result.fatal(Error::DiskTooSmall,"stream smaller than FDI header");
        }
        let param = match read_param(data) {
            Some(p) => p,
            None => return result.fatal(Error::DiskHeader,"bad geometry in FDI header")
        };
        if HEADER_SIZE + param.disk_size() > data.len() {
            return result.fatal(Error::DiskTooSmall,"payload overflows stream");
        }
        let payload = &data[HEADER_SIZE..];
        let mut disk = Disk::new("",param.density);
        let track_bytes = param.sectors*param.sector_size;
        for cyl in 0..param.tracks {
            for side in 0..param.sides {
                let idx = cyl*param.sides + side;
                let pos = cyl*2 + side;
                let mut track = Track::new(cyl as u8,side as u8,pos);
                for r in 1..=param.sectors {
                    let src = idx*track_bytes + (r-1)*param.sector_size;
                    let sec = Sector::new(cyl as u8,side as u8,r as u8,param.size_code(),
                        payload[src..src+param.sector_size].to_vec());
                    track.add_sector(sec);
                }
                if !disk.add_track(track,(HEADER_SIZE + idx*track_bytes) as u32) {
                    return result.fatal(Error::DuplicateTrack,&format!("slot {}",pos));
                }
            }
        }
        debug!("FDI {}",param);
        file.add_disk(disk);
        0
    }
}
