//! ## Support for DIFC.X DIM disk images
//!
//! The X68000 DIM container is a 256 byte header with a media byte keying
//! the geometry, a per-track presence table, and the `DIFC HEADER`
//! signature, followed by the raw bytes of every flagged track in order.

use log::{debug};
use crate::img::{Disk,DiskImageFile,DiskParam,DiskResult,Error,ImageParser,Sector,Track,TypeHints};
use crate::img::model::DiskDensity;

const HEADER_SIZE: usize = 256;
const SIGNATURE: &[u8] = b"DIFC HEADER";
const SIGNATURE_OFF: usize = 0xab;
const FLAGS_OFF: usize = 1;
const FLAGS_LEN: usize = 170;

pub fn file_extensions() -> Vec<String> {
    vec!["dim".to_string()]
}

fn geometry(media: u8) -> Option<DiskParam> {
    match media {
        0x00 => Some(DiskParam::new("2HD",77,2,8,1024,DiskDensity::D2HD)),
        0x01 => Some(DiskParam::new("2HS",80,2,9,1024,DiskDensity::D2HD)),
        0x02 => Some(DiskParam::new("2HC",80,2,15,512,DiskDensity::D2HD)),
        0x03 => Some(DiskParam::new("2HDE",80,2,9,1024,DiskDensity::D2HD)),
        0x09 => Some(DiskParam::new("2HQ",80,2,18,512,DiskDensity::D2HD)),
        _ => None
    }
}

pub struct DimParser;

impl ImageParser for DimParser {
    fn name(&self) -> &'static str {
        "dim"
    }
    fn file_extensions(&self) -> Vec<String> {
        file_extensions()
    }
    fn check(&self,data: &[u8],_hints: &mut TypeHints,_result: &mut DiskResult) -> i32 {
        if data.len() < HEADER_SIZE {
            return -1;
        }
        if &data[SIGNATURE_OFF..SIGNATURE_OFF+SIGNATURE.len()] != SIGNATURE {
            return -1;
        }
        match geometry(data[0]) {
            Some(_) => 0,
            None => -1
        }
    }
    fn parse(&self,data: &[u8],_hints: &TypeHints,file: &mut DiskImageFile,result: &mut DiskResult) -> i32 {
        if data.len() < HEADER_SIZE
        || &data[SIGNATURE_OFF..SIGNATURE_OFF+SIGNATURE.len()] != SIGNATURE {
            return result.fatal(Error::DiskHeader,"not a DIM stream");
        }
        let param = match geometry(data[0]) {
            Some(p) => p,
            None => return result.fatal(Error::UnsupportedType,&format!("media byte {:#04x}",data[0]))
        };
        let mut disk = Disk::new(&param.name,param.density);
        let track_bytes = param.sectors*param.sector_size;
        let slots = (param.tracks*param.sides).min(FLAGS_LEN);
        let mut ptr = HEADER_SIZE;
        let mut worst = 0;
        for idx in 0..slots {
            if data[FLAGS_OFF+idx]==0 {
                continue; // track not stored
            }
            if ptr + track_bytes > data.len() {
                worst = result.warning(Error::DiskTooSmall,&format!("stream ends inside track {}",idx));
                break;
            }
            let cyl = (idx/param.sides) as u8;
            let side = (idx%param.sides) as u8;
            let pos = cyl as usize*2 + side as usize;
            let mut track = Track::new(cyl,side,pos);
            for r in 1..=param.sectors {
                let src = ptr + (r-1)*param.sector_size;
                let sec = Sector::new(cyl,side,r as u8,param.size_code(),
                    data[src..src+param.sector_size].to_vec());
                track.add_sector(sec);
            }
            if !disk.add_track(track,ptr as u32) {
                return result.fatal(Error::DuplicateTrack,&format!("slot {}",pos));
            }
            ptr += track_bytes;
        }
        if disk.track_count()==0 {
            return result.fatal(Error::NoTrack,"no tracks flagged in DIM header");
        }
        debug!("DIM {} with {} tracks",param.name,disk.track_count());
        file.add_disk(disk);
        worst
    }
}
