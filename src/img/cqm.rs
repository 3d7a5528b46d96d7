//! ## Support for CopyQM disk images
//!
//! CopyQM wraps a BPB-like 133 byte header, an optional comment, and a run
//! length coded body.  Each run starts with a signed 16 bit length: a
//! negative value repeats the next byte that many times, a positive value
//! copies that many literal bytes.  The decoded body is a plain dump over
//! the header's geometry.

use log::{debug};
use crate::img::{Disk,DiskImageFile,DiskParam,DiskResult,Error,ImageParser,Sector,Track,TypeHints};
use crate::img::model::DiskDensity;

const MAGIC: &[u8] = b"CQ\x14";
const HEADER_SIZE: usize = 133;
const SECTOR_SIZE_OFF: usize = 0x03;
const SPT_OFF: usize = 0x10;
const HEADS_OFF: usize = 0x12;
const USED_CYLS_OFF: usize = 0x5a;
const TOTAL_CYLS_OFF: usize = 0x5b;
const COMMENT_LEN_OFF: usize = 0x6f;

pub fn file_extensions() -> Vec<String> {
    vec!["cqm".to_string(),"dsk".to_string()]
}

/// Expand the signed run length body.  Stops when `want` bytes have been
/// produced or the source is exhausted, whichever comes first.
pub fn rle_expand(src: &[u8],want: usize) -> Vec<u8> {
    let mut ans: Vec<u8> = Vec::with_capacity(want);
    let mut ptr = 0;
    while ans.len() < want && ptr+1 < src.len() {
        let run = i16::from_le_bytes([src[ptr],src[ptr+1]]);
        ptr += 2;
        if run < 0 {
            if ptr >= src.len() {
                break;
            }
            let fill = src[ptr];
            ptr += 1;
            for _i in 0..-(run as i32) {
                ans.push(fill);
            }
        } else {
            let count = run as usize;
            if ptr + count > src.len() {
                ans.extend_from_slice(&src[ptr..]);
                break;
            }
            ans.extend_from_slice(&src[ptr..ptr+count]);
            ptr += count;
        }
    }
    ans
}

pub struct CqmParser;

impl CqmParser {
    fn read_param(data: &[u8]) -> Option<DiskParam> {
        let sector_size = u16::from_le_bytes([data[SECTOR_SIZE_OFF],data[SECTOR_SIZE_OFF+1]]) as usize;
        let sectors = u16::from_le_bytes([data[SPT_OFF],data[SPT_OFF+1]]) as usize;
        let sides = u16::from_le_bytes([data[HEADS_OFF],data[HEADS_OFF+1]]) as usize;
        let tracks = data[USED_CYLS_OFF] as usize;
        if !matches!(sector_size,128|256|512|1024) {
            return None;
        }
        if sectors==0 || sectors > 36 || sides==0 || sides > 2 || tracks==0 || tracks > 85 {
            return None;
        }
        if (data[TOTAL_CYLS_OFF] as usize) < tracks {
            return None;
        }
        let density = match tracks*sides*sectors*sector_size {
            l if l > 1_000_000 => DiskDensity::D2HD,
            l if l > 500_000 => DiskDensity::D2DD,
            _ => DiskDensity::D2
        };
        Some(DiskParam::new("",tracks,sides,sectors,sector_size,density))
    }
    fn body_at(data: &[u8]) -> usize {
        let comment_len = u16::from_le_bytes([data[COMMENT_LEN_OFF],data[COMMENT_LEN_OFF+1]]) as usize;
        HEADER_SIZE + comment_len
    }
}

impl ImageParser for CqmParser {
    fn name(&self) -> &'static str {
        "cqm"
    }
    fn file_extensions(&self) -> Vec<String> {
        file_extensions()
    }
    fn check(&self,data: &[u8],_hints: &mut TypeHints,_result: &mut DiskResult) -> i32 {
        if data.len() < HEADER_SIZE || &data[0..3] != MAGIC {
            return -1;
        }
        if Self::read_param(data).is_none() {
            return -1;
        }
        match Self::body_at(data) < data.len() {
            true => 0,
            false => -1
        }
    }
    fn parse(&self,data: &[u8],_hints: &TypeHints,file: &mut DiskImageFile,result: &mut DiskResult) -> i32 {
        if data.len() < HEADER_SIZE || &data[0..3] != MAGIC {
            return result.fatal(Error::DiskHeader,"not a CopyQM stream");
        }
        let param = match Self::read_param(data) {
            Some(p) => p,
            None => return result.fatal(Error::DiskHeader,"bad geometry in CopyQM header")
        };
        let body_at = Self::body_at(data);
        if body_at >= data.len() {
            return result.fatal(Error::DiskTooSmall,"stream ends inside comment");
        }
        let comment = match body_at > HEADER_SIZE {
            true => String::from_utf8_lossy(&data[HEADER_SIZE..body_at]).trim().to_string(),
            false => String::new()
        };
        let want = param.disk_size();
        let mut payload = rle_expand(&data[body_at..],want);
        let mut worst = 0;
        if payload.len() < want {
            worst = result.warning(Error::DiskTooSmall,
                &format!("body expanded to {} of {} bytes",payload.len(),want));
            payload.resize(want,0);
        }
        let mut disk = Disk::new(&comment,param.density);
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
                if !disk.add_track(track,(idx+1) as u32) {
                    return result.fatal(Error::DuplicateTrack,&format!("slot {}",pos));
                }
            }
        }
        debug!("CopyQM {} with {} byte body",param,want);
        file.add_disk(disk);
        worst
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_runs() {
        // repeat 0xe5 four times, then three literals
        let src = [0xfc,0xff,0xe5, 3,0,1,2,3];
        assert_eq!(rle_expand(&src,7),vec![0xe5,0xe5,0xe5,0xe5,1,2,3]);
    }

    #[test]
    fn truncated_body_is_partial() {
        let src = [0x10,0,1,2];
        let out = rle_expand(&src,16);
        assert_eq!(out,vec![1,2]);
    }
}
