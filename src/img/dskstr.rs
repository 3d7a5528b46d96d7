//! ## Support for DSKSTR compressed disk images
//!
//! A DSKSTR stream opens with a free text comment terminated by 0x1A, then a
//! 16 byte header beginning with `DSKSTR ver` and carrying the geometry.
//! The body is compressed twice.  Stage two is an LZSS scheme: a control
//! byte supplies 8 flags, a set flag passes one literal byte, a clear flag a
//! 2 byte back-reference into a rolling 4 KiB window.  Stage one is a run
//! length code whose leading length byte selects a literal run or, with the
//! sign bit set, a repeat run.  Tracks are packed in 512 byte blocks of the
//! intermediate stream, so the read position is corrected to the next block
//! boundary after each track.

use log::{trace,debug};
use crate::img::{Disk,DiskImageFile,DiskParam,DiskResult,Error,ImageParser,Sector,Track,TypeHints};
use crate::img::model::DiskDensity;

const MAGIC: &[u8] = b"DSKSTR ver";
const HEADER_SIZE: usize = 16;
const TERMINATOR: u8 = 0x1a;
const WINDOW: usize = 0x1000;
const WINDOW_START: usize = 0xfee;
const MIN_MATCH: usize = 3;
const BLOCK: usize = 512;
const REPEAT_MASK: u8 = 0x80;

pub fn file_extensions() -> Vec<String> {
    vec!["str".to_string(),"dskstr".to_string()]
}

/// Expand the LZSS stage into the intermediate stream.
pub fn lzss_expand(src: &[u8]) -> Vec<u8> {
    let mut ans: Vec<u8> = Vec::new();
    let mut window = [0u8;WINDOW];
    let mut wpos = WINDOW_START;
    let mut ptr = 0;
    while ptr < src.len() {
        let flags = src[ptr];
        ptr += 1;
        for bit in 0..8 {
            if ptr >= src.len() {
                break;
            }
            if flags >> bit & 1 == 1 {
                let b = src[ptr];
                ptr += 1;
                ans.push(b);
                window[wpos] = b;
                wpos = (wpos+1) % WINDOW;
            } else {
                if ptr + 1 >= src.len() {
                    ptr = src.len();
                    break;
                }
                let b1 = src[ptr] as usize;
                let b2 = src[ptr+1] as usize;
                ptr += 2;
                let offset = b1 | (b2 & 0xf0) << 4;
                let len = (b2 & 0x0f) + MIN_MATCH;
                for i in 0..len {
                    let b = window[(offset+i) % WINDOW];
                    ans.push(b);
                    window[wpos] = b;
                    wpos = (wpos+1) % WINDOW;
                }
            }
        }
    }
    ans
}

/// Expand stage one runs from `src` starting at `ptr` until `want` bytes are
/// produced.  Returns the bytes and the updated read position, or None when
/// the source ends early.
pub fn rle_expand(src: &[u8],ptr: &mut usize,want: usize) -> Option<Vec<u8>> {
    let mut ans: Vec<u8> = Vec::with_capacity(want);
    while ans.len() < want {
        if *ptr >= src.len() {
            return None;
        }
        let code = src[*ptr];
        *ptr += 1;
        if code & REPEAT_MASK != 0 {
            let count = (code & !REPEAT_MASK) as usize;
            if *ptr >= src.len() {
                return None;
            }
            let fill = src[*ptr];
            *ptr += 1;
            for _i in 0..count {
                ans.push(fill);
            }
        } else {
            let count = code as usize;
            if *ptr + count > src.len() {
                return None;
            }
            ans.extend_from_slice(&src[*ptr..*ptr+count]);
            *ptr += count;
        }
    }
    ans.truncate(want);
    Some(ans)
}

pub struct DskStrParser;

impl DskStrParser {
    /// Index of the header, just past the comment terminator.
    fn header_at(data: &[u8]) -> Option<usize> {
        let end = data.iter().position(|b| *b==TERMINATOR)? + 1;
        if end + HEADER_SIZE > data.len() {
            return None;
        }
        match &data[end..end+MAGIC.len()]==MAGIC {
            true => Some(end),
            false => None
        }
    }
    fn read_param(header: &[u8]) -> Option<DiskParam> {
        let tracks = header[12] as usize;
        let sides = header[13] as usize;
        let sectors = header[14] as usize;
        let code = header[15];
        if tracks==0 || tracks > 85 || sides==0 || sides > 2 || sectors==0 || sectors > 32 || code > 3 {
            return None;
        }
        let sector_size = Sector::size_from_code(code);
        let density = match tracks > 44 {
            true => DiskDensity::D2DD,
            false => DiskDensity::D2
        };
        Some(DiskParam::new("",tracks,sides,sectors,sector_size,density))
    }
}

impl ImageParser for DskStrParser {
    fn name(&self) -> &'static str {
        "dskstr"
    }
    fn file_extensions(&self) -> Vec<String> {
        file_extensions()
    }
    fn check(&self,data: &[u8],_hints: &mut TypeHints,_result: &mut DiskResult) -> i32 {
        match Self::header_at(data) {
            Some(at) => match Self::read_param(&data[at..at+HEADER_SIZE]) {
                Some(_) => 0,
                None => -1
            },
            None => -1
        }
    }
    fn parse(&self,data: &[u8],_hints: &TypeHints,file: &mut DiskImageFile,result: &mut DiskResult) -> i32 {
        let at = match Self::header_at(data) {
            Some(a) => a,
            None => return result.fatal(Error::DiskHeader,"not a DSKSTR stream")
        };
        let param = match Self::read_param(&data[at..at+HEADER_SIZE]) {
            Some(p) => p,
            None => return result.fatal(Error::DiskHeader,"bad geometry in DSKSTR header")
        };
        let comment = String::from_utf8_lossy(&data[0..at-1]).trim().to_string();
        let mid = lzss_expand(&data[at+HEADER_SIZE..]);
        debug!("DSKSTR stage two expanded {} -> {} bytes",data.len()-at-HEADER_SIZE,mid.len());
        let mut disk = Disk::new(&comment,param.density);
        let track_bytes = param.sides*param.sectors*param.sector_size;
        let mut ptr = 0;
        let mut worst = 0;
        for cyl in 0..param.tracks {
            let payload = match rle_expand(&mid,&mut ptr,track_bytes) {
                Some(v) => v,
                None => {
                    worst = result.warning(Error::DiskTooSmall,
                        &format!("compressed stream ends inside cyl {}",cyl));
                    break;
                }
            };
            // runs never cross a block boundary, realign for the next track
            if ptr % BLOCK != 0 {
                trace!("cyl {} correcting position {} to block boundary",cyl,ptr);
                ptr += BLOCK - ptr % BLOCK;
            }
            for side in 0..param.sides {
                let idx = cyl*param.sides + side;
                let pos = cyl*2 + side;
                let mut track = Track::new(cyl as u8,side as u8,pos);
                for r in 1..=param.sectors {
                    let src = (side*param.sectors + (r-1)) * param.sector_size;
                    let sec = Sector::new(cyl as u8,side as u8,r as u8,param.size_code(),
                        payload[src..src+param.sector_size].to_vec());
                    track.add_sector(sec);
                }
                if !disk.add_track(track,(idx+1) as u32) {
                    return result.fatal(Error::DuplicateTrack,&format!("slot {}",pos));
                }
            }
        }
        if disk.track_count()==0 {
            return result.fatal(Error::NoTrack,"no tracks decoded from DSKSTR stream");
        }
        file.add_disk(disk);
        worst
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lzss_literals() {
        // all flags set, bytes pass through
        let src = [0xff,1,2,3,4,5,6,7,8];
        assert_eq!(lzss_expand(&src),vec![1,2,3,4,5,6,7,8]);
    }

    #[test]
    fn lzss_back_reference() {
        // four literals then a token repeating the last three of them,
        // which sit at window positions 0xfef..0xff2
        let src = [0x0f,10,20,30,40,0xef,0xf0];
        let out = lzss_expand(&src);
        assert_eq!(out,vec![10,20,30,40,20,30,40]);
    }

    #[test]
    fn rle_literal_and_repeat() {
        // literal run of 3 then 0x84 = repeat run of 4
        let src = [3,7,8,9,0x84,0xe5];
        let mut ptr = 0;
        let out = rle_expand(&src,&mut ptr,7).expect("expand");
        assert_eq!(out,vec![7,8,9,0xe5,0xe5,0xe5,0xe5]);
        assert_eq!(ptr,src.len());
    }

    #[test]
    fn rle_underrun_rejected() {
        let src = [0x85,0xaa];
        let mut ptr = 0;
        assert!(rle_expand(&src,&mut ptr,100).is_none());
    }
}
