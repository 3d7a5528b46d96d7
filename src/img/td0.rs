//! ## Support for Teledisk TD0 disk images
//!
//! Teledisk streams begin with a 12 byte header, an optional comment block,
//! then track records, each a 4 byte header followed by sector records.
//! Sector data blocks are compressed with one of three methods: raw copy,
//! a repeated 2 byte pattern, or run length fragments.  Only the normal
//! `TD` signature is handled; `td` streams carry an additional LZH stage
//! over the whole file and are rejected as an unsupported variant.

use log::{trace,debug,warn};
use crate::img::{Disk,DiskImageFile,DiskResult,Error,ImageParser,Sector,Track,TypeHints};
use crate::img::model::DiskDensity;

const HEADER_SIZE: usize = 12;
const COMMENT_HEADER_SIZE: usize = 10;
const TRACK_HEADER_SIZE: usize = 4;
const SECTOR_HEADER_SIZE: usize = 6;
const END_OF_TRACKS: u8 = 0xff;
const COMMENT_MASK: u8 = 0x80;
const FM_MASK: u8 = 0x80;
const NO_DATA_MASK: u8 = 0x30;

pub fn file_extensions() -> Vec<String> {
    vec!["td0".to_string()]
}

/// Checksum over TD0 header and data regions, poly 0xa097.
pub fn crc16(crc_seed: u16,buf: &[u8]) -> u16 {
    let mut crc: u16 = crc_seed;
    for i in 0..buf.len() {
        crc ^= (buf[i] as u16) << 8;
        for _bit in 0..8 {
            crc = (crc << 1) ^ match crc & 0x8000 { 0 => 0, _ => 0xa097 };
        }
    }
    crc
}

/// Decode one sector data block of the given method into exactly `size`
/// bytes.  `src` starts right after the method byte.  Returns the decoded
/// bytes and the count of source bytes consumed.
pub fn decode_data(method: u8,size: usize,src: &[u8]) -> Result<(Vec<u8>,usize),Error> {
    let mut ans: Vec<u8> = Vec::new();
    let mut ptr = 0;
    match method {
        0 => {
            if src.len() < size {
                return Err(Error::OverflowSize);
            }
            ans.extend_from_slice(&src[0..size]);
            ptr = size;
        },
        1 => {
            while ans.len() < size {
                if ptr + 4 > src.len() {
                    return Err(Error::OverflowSize);
                }
                let count = u16::from_le_bytes([src[ptr],src[ptr+1]]) as usize;
                for _i in 0..count {
                    ans.push(src[ptr+2]);
                    ans.push(src[ptr+3]);
                }
                ptr += 4;
            }
        },
        2 => {
            while ans.len() < size {
                if ptr >= src.len() {
                    return Err(Error::OverflowSize);
                }
                let pattern_len = 2 * src[ptr] as usize;
                ptr += 1;
                if pattern_len==0 {
                    // literal fragment, length byte then raw bytes
                    if ptr >= src.len() {
                        return Err(Error::OverflowSize);
                    }
                    let literal_len = src[ptr] as usize;
                    ptr += 1;
                    if ptr + literal_len > src.len() {
                        return Err(Error::OverflowSize);
                    }
                    ans.extend_from_slice(&src[ptr..ptr+literal_len]);
                    ptr += literal_len;
                } else {
                    // repeat fragment, count byte then the pattern
                    if ptr >= src.len() {
                        return Err(Error::OverflowSize);
                    }
                    let repeat = src[ptr] as usize;
                    ptr += 1;
                    if ptr + pattern_len > src.len() {
                        return Err(Error::OverflowSize);
                    }
                    for _i in 0..repeat {
                        ans.extend_from_slice(&src[ptr..ptr+pattern_len]);
                    }
                    ptr += pattern_len;
                }
            }
        },
        _ => return Err(Error::UnsupportedType)
    }
    if ans.len() != size {
        return Err(Error::SectorSizeSector);
    }
    Ok((ans,ptr))
}

pub struct Td0Parser;

impl ImageParser for Td0Parser {
    fn name(&self) -> &'static str {
        "td0"
    }
    fn file_extensions(&self) -> Vec<String> {
        file_extensions()
    }
    fn check(&self,data: &[u8],_hints: &mut TypeHints,_result: &mut DiskResult) -> i32 {
        if data.len() < HEADER_SIZE {
            return -1;
        }
        if &data[0..2]==b"td" {
            debug!("advanced compression TD0 is not handled");
            return -1;
        }
        if &data[0..2] != b"TD" {
            return -1;
        }
        if data[4] & 0xf0 != 0x10 {
            return -1; // version 1.x only
        }
        0
    }
    fn parse(&self,data: &[u8],_hints: &TypeHints,file: &mut DiskImageFile,result: &mut DiskResult) -> i32 {
        if data.len() < HEADER_SIZE {
            return result.fatal(Error::DiskTooSmall,"stream smaller than TD0 header");
        }
        if &data[0..2]==b"td" {
            return result.fatal(Error::UnsupportedType,"advanced compression TD0");
        }
        if &data[0..2] != b"TD" || data[4] & 0xf0 != 0x10 {
            return result.fatal(Error::DiskHeader,"not a normal TD0 version 1 stream");
        }
        let mut worst = 0;
        let recorded = u16::from_le_bytes([data[10],data[11]]);
        if crc16(0,&data[0..10]) != recorded {
            worst = result.warning(Error::DiskHeader,"image header checksum mismatch");
        }
        let density = match (data[5] & 0x03,data[5] & FM_MASK) {
            (2,_) => DiskDensity::D2HD,
            _ => DiskDensity::D2
        };
        let fm_disk = data[5] & FM_MASK != 0;
        let mut ptr = HEADER_SIZE;
        let mut name = String::new();
        if data[7] & COMMENT_MASK != 0 {
            if ptr + COMMENT_HEADER_SIZE > data.len() {
                return result.fatal(Error::DiskTooSmall,"stream ends inside comment header");
            }
            let len = u16::from_le_bytes([data[ptr+2],data[ptr+3]]) as usize;
            if ptr + COMMENT_HEADER_SIZE + len > data.len() {
                return result.fatal(Error::DiskTooSmall,"stream ends inside comment data");
            }
            let raw = &data[ptr+COMMENT_HEADER_SIZE..ptr+COMMENT_HEADER_SIZE+len];
            name = String::from_utf8_lossy(raw).replace('\0'," ").trim().to_string();
            ptr += COMMENT_HEADER_SIZE + len;
        }
        let mut disk = Disk::new(&name,density);
        loop {
            if ptr + 1 > data.len() {
                worst = result.warning(Error::NoTrack,"stream ended without track terminator");
                break;
            }
            let count = data[ptr];
            if count==END_OF_TRACKS {
                break;
            }
            if ptr + TRACK_HEADER_SIZE > data.len() {
                return result.fatal(Error::DiskTooSmall,"stream ends inside track header");
            }
            let cyl = data[ptr+1];
            let head = data[ptr+2];
            let fm_track = fm_disk || head & FM_MASK != 0;
            let pos = cyl as usize * 2 + (head & 0x01) as usize;
            let mut track = Track::new(cyl,head & 0x01,pos);
            let track_offset = ptr as u32;
            ptr += TRACK_HEADER_SIZE;
            for _i in 0..count {
                if ptr + SECTOR_HEADER_SIZE > data.len() {
                    return result.fatal(Error::DiskTooSmall,"stream ends inside sector header");
                }
                let header = &data[ptr..ptr+SECTOR_HEADER_SIZE];
                if header[3] > 7 {
                    return result.fatal(Error::SectorSizeHeader,&format!("size exponent {}",header[3]));
                }
                let size = Sector::size_from_code(header[3]);
                let flags = header[4];
                ptr += SECTOR_HEADER_SIZE;
                let payload = match flags & NO_DATA_MASK {
                    0 => {
                        if ptr + 3 > data.len() {
                            return result.fatal(Error::DiskTooSmall,"stream ends inside data block");
                        }
                        let block_len = u16::from_le_bytes([data[ptr],data[ptr+1]]) as usize;
                        let method = data[ptr+2];
                        if ptr + 2 + block_len > data.len() {
                            return result.fatal(Error::OverflowSize,"data block overflows stream");
                        }
                        let src = &data[ptr+3..ptr+2+block_len];
                        let decoded = match decode_data(method,size,src) {
                            Ok((bytes,consumed)) => {
                                if consumed + 1 != block_len {
                                    warn!("data block length {} does not match decode end",block_len);
                                }
                                bytes
                            },
                            Err(kind) => {
                                // keep the slot, substitute a blank sector
                                worst = result.warning(kind,
                                    &format!("sector {} of cyl {} could not be decoded",header[2],cyl));
                                vec![0;size]
                            }
                        };
                        ptr += 2 + block_len;
                        decoded
                    },
                    _ => {
                        trace!("sector {} of cyl {} carries no data",header[2],cyl);
                        vec![0;size]
                    }
                };
                let mut sec = Sector::new(header[0],header[1],header[2],header[3],payload);
                sec.single_density = fm_track;
                sec.deleted = flags & 0x04 != 0;
                sec.status = flags;
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
            return result.fatal(Error::NoTrack,"no tracks in TD0 stream");
        }
        debug!("TD0 '{}' {} tracks",disk.name,disk.track_count());
        file.add_disk(disk);
        worst
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_method() {
        let src = [1,2,3,4];
        let (out,used) = decode_data(0,4,&src).expect("decode");
        assert_eq!(out,vec![1,2,3,4]);
        assert_eq!(used,4);
    }

    #[test]
    fn repeated_pattern_method() {
        // 64 repetitions of the pattern e5 e5 makes a 128 byte sector
        let src = [64,0,0xe5,0xe5];
        let (out,used) = decode_data(1,128,&src).expect("decode");
        assert_eq!(out,vec![0xe5;128]);
        assert_eq!(used,4);
    }

    #[test]
    fn run_length_method() {
        // literal fragment of 5 bytes then a 4 byte pattern repeated 3 times
        let src = [0,5,10,20,30,40,50, 2,3,1,2,3,4];
        let (out,used) = decode_data(2,17,&src).expect("decode");
        assert_eq!(out.len(),17);
        assert_eq!(&out[0..5],&[10,20,30,40,50]);
        assert_eq!(&out[5..9],&[1,2,3,4]);
        assert_eq!(&out[9..13],&[1,2,3,4]);
        assert_eq!(&out[13..17],&[1,2,3,4]);
        assert_eq!(used,src.len());
    }

    #[test]
    fn bad_method_rejected() {
        assert!(decode_data(3,128,&[0;16]).is_err());
    }

    #[test]
    fn short_source_rejected() {
        assert!(decode_data(0,128,&[0;16]).is_err());
    }

    #[test]
    fn header_checksum() {
        let mut header = [0u8;10];
        header[0..2].copy_from_slice(b"TD");
        header[4] = 0x15;
        let crc = crc16(0,&header);
        assert_ne!(crc,0);
        assert_eq!(crc16(0,&header),crc);
    }
}
