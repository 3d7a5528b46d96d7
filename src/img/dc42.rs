//! ## Support for Apple Disk Copy 4.2 disk images
//!
//! The 84 byte header carries a Pascal style length-prefixed label, big
//! endian data and tag sizes, checksums, and a disk format byte that keys
//! the geometry.  The payload is a block ordered dump of 512 byte sectors.
//! The checksum rotates a 32 bit accumulator right once per big endian word.

use log::{debug};
use crate::img::{Disk,DiskImageFile,DiskParam,DiskResult,Error,ImageParser,Sector,Track,TypeHints};
use crate::img::model::DiskDensity;

const HEADER_SIZE: usize = 84;
const MAGIC: u16 = 0x0100;

pub fn file_extensions() -> Vec<String> {
    vec!["dc42".to_string(),"image".to_string(),"img".to_string()]
}

/// Disk Copy checksum: add each big endian word, rotate right one bit.
pub fn checksum(buf: &[u8]) -> u32 {
    let mut sum: u32 = 0;
    let mut i = 0;
    while i+1 < buf.len() {
        let word = u16::from_be_bytes([buf[i],buf[i+1]]) as u32;
        sum = (sum.wrapping_add(word)).rotate_right(1);
        i += 2;
    }
    sum
}

fn be32(data: &[u8],at: usize) -> u32 {
    u32::from_be_bytes([data[at],data[at+1],data[at+2],data[at+3]])
}

fn geometry(format: u8) -> Option<DiskParam> {
    match format {
        0 => Some(DiskParam::new("400K",80,1,10,512,DiskDensity::D2DD)),
        1 => Some(DiskParam::new("800K",80,2,10,512,DiskDensity::D2DD)),
        2 => Some(DiskParam::new("720K",80,2,9,512,DiskDensity::D2DD)),
        3 => Some(DiskParam::new("1440K",80,2,18,512,DiskDensity::D2HD)),
        _ => None
    }
}

pub struct Dc42Parser;

impl ImageParser for Dc42Parser {
    fn name(&self) -> &'static str {
        "dc42"
    }
    fn file_extensions(&self) -> Vec<String> {
        file_extensions()
    }
    fn check(&self,data: &[u8],_hints: &mut TypeHints,_result: &mut DiskResult) -> i32 {
        if data.len() < HEADER_SIZE {
            return -1;
        }
        if u16::from_be_bytes([data[82],data[83]]) != MAGIC {
            return -1;
        }
        if data[0] > 63 {
            return -1;
        }
        let data_size = be32(data,64) as usize;
        let tag_size = be32(data,68) as usize;
        if HEADER_SIZE + data_size + tag_size > data.len() {
            return -1;
        }
        match geometry(data[80]) {
            Some(p) if p.disk_size()==data_size => 0,
            _ => -1
        }
    }
    fn parse(&self,data: &[u8],_hints: &TypeHints,file: &mut DiskImageFile,result: &mut DiskResult) -> i32 {
        if data.len() < HEADER_SIZE || u16::from_be_bytes([data[82],data[83]]) != MAGIC {
            return result.fatal(Error::DiskHeader,"not a Disk Copy 4.2 stream");
        }
        let label_len = (data[0] as usize).min(63);
        let label = String::from_utf8_lossy(&data[1..1+label_len]).to_string();
        let data_size = be32(data,64) as usize;
        if HEADER_SIZE + data_size > data.len() {
            return result.fatal(Error::DiskTooSmall,"payload overflows stream");
        }
        let param = match geometry(data[80]) {
            Some(p) if p.disk_size()==data_size => p,
            Some(_) => return result.fatal(Error::DiskHeader,"payload size disagrees with format byte"),
            None => return result.fatal(Error::UnsupportedType,&format!("disk format {}",data[80]))
        };
        let payload = &data[HEADER_SIZE..HEADER_SIZE+data_size];
        let mut worst = 0;
        if checksum(payload) != be32(data,72) {
            worst = result.warning(Error::InvalidDisk,"data checksum mismatch");
        }
        let mut disk = Disk::new(&label,param.density);
        let track_bytes = param.sectors*param.sector_size;
        for cyl in 0..param.tracks {
            for side in 0..param.sides {
                let idx = cyl*param.sides + side;
                let pos = cyl*2 + side;
                let mut track = Track::new(cyl as u8,side as u8,pos);
                for r in 0..param.sectors {
                    let src = idx*track_bytes + r*param.sector_size;
                    let sec = Sector::new(cyl as u8,side as u8,r as u8,param.size_code(),
                        payload[src..src+param.sector_size].to_vec());
                    track.add_sector(sec);
                }
                if !disk.add_track(track,(HEADER_SIZE + idx*track_bytes) as u32) {
                    return result.fatal(Error::DuplicateTrack,&format!("slot {}",pos));
                }
            }
        }
        debug!("Disk Copy '{}' {} bytes",disk.name,data_size);
        file.add_disk(disk);
        worst
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_rotates() {
        // one word: 0x0001 -> add then rotate right gives 0x80000000
        assert_eq!(checksum(&[0x00,0x01]),0x8000_0000);
        // two zero words stay zero
        assert_eq!(checksum(&[0,0,0,0]),0);
    }
}
