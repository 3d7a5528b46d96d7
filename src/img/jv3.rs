//! ## Support for TRS-80 JV3 disk images
//!
//! A JV3 stream is a table of 2901 three byte sector headers plus one write
//! protect byte, followed by the sector payloads in table order.  A stream
//! holding more than 2901 sectors appends a second header block after the
//! first block's data.  Free table entries have 0xFF in the track field.

use std::collections::BTreeMap;
use log::{trace,debug};
use crate::img::{Disk,DiskImageFile,DiskResult,Error,ImageParser,Sector,Track,TypeHints};
use crate::img::model::DiskDensity;

const TABLE_LEN: usize = 2901;
const BLOCK_SIZE: usize = TABLE_LEN*3 + 1;
const FREE_TRACK: u8 = 0xff;
const FLAG_SIZE_MASK: u8 = 0x03;
const FLAG_NON_IBM: u8 = 0x04;
const FLAG_CRC_ERROR: u8 = 0x08;
const FLAG_SIDE: u8 = 0x10;
const FLAG_DELETED: u8 = 0x20;
const FLAG_DENSITY: u8 = 0x80;
const WRITABLE: u8 = 0xff;

pub fn file_extensions() -> Vec<String> {
    vec!["jv3".to_string(),"dsk".to_string()]
}

/// Size of a used sector: the two flag bits permute the usual exponents.
fn sector_size(flags: u8) -> usize {
    match flags & FLAG_SIZE_MASK {
        0 => 256,
        1 => 128,
        2 => 1024,
        _ => 512
    }
}

fn size_code(size: usize) -> u8 {
    match size {
        128 => 0,
        256 => 1,
        512 => 2,
        _ => 3
    }
}

pub struct Jv3Parser;

impl Jv3Parser {
    /// Sum of the payload bytes declared by one header block.
    fn block_payload(block: &[u8]) -> usize {
        let mut total = 0;
        for i in 0..TABLE_LEN {
            if block[i*3] != FREE_TRACK {
                total += sector_size(block[i*3+2]);
            }
        }
        total
    }
}

impl ImageParser for Jv3Parser {
    fn name(&self) -> &'static str {
        "jv3"
    }
    fn file_extensions(&self) -> Vec<String> {
        file_extensions()
    }
    fn check(&self,data: &[u8],_hints: &mut TypeHints,_result: &mut DiskResult) -> i32 {
        if data.len() < BLOCK_SIZE {
            return -1;
        }
        let mut used = 0;
        for i in 0..TABLE_LEN {
            let track = data[i*3];
            if track==FREE_TRACK {
                continue;
            }
            if track > 85 {
                return -1;
            }
            used += 1;
        }
        if used==0 {
            return -1;
        }
        let payload = Self::block_payload(&data[0..BLOCK_SIZE]);
        // a second header block may follow the first block's data
        if data.len() != BLOCK_SIZE + payload && data.len() < BLOCK_SIZE + payload + BLOCK_SIZE {
            return -1;
        }
        0
    }
    fn parse(&self,data: &[u8],_hints: &TypeHints,file: &mut DiskImageFile,result: &mut DiskResult) -> i32 {
        if data.len() < BLOCK_SIZE {
            return result.fatal(Error::DiskTooSmall,"stream smaller than JV3 header block");
        }
        let mut disk = Disk::new("",DiskDensity::D2);
        disk.write_protected = data[TABLE_LEN*3] != WRITABLE;
        let mut tracks: BTreeMap<usize,Track> = BTreeMap::new();
        let mut worst = 0;
        let mut base = 0;
        for block_num in 0..2 {
            if base + BLOCK_SIZE > data.len() {
                if block_num==0 {
                    return result.fatal(Error::DiskTooSmall,"stream smaller than JV3 header block");
                }
                break;
            }
            let block = &data[base..base+BLOCK_SIZE];
            let mut ptr = base + BLOCK_SIZE;
            for i in 0..TABLE_LEN {
                let c = block[i*3];
                if c==FREE_TRACK {
                    continue;
                }
                let r = block[i*3+1];
                let flags = block[i*3+2];
                let size = sector_size(flags);
                if ptr + size > data.len() {
                    worst = result.warning(Error::OverflowSize,
                        &format!("sector {} of track {} overflows stream",r,c));
                    ptr = data.len();
                    continue;
                }
                let h = match flags & FLAG_SIDE { 0 => 0, _ => 1 };
                let pos = c as usize * 2 + h as usize;
                let mut sec = Sector::new(c,h,r,size_code(size),data[ptr..ptr+size].to_vec());
                sec.single_density = flags & FLAG_DENSITY == 0;
                sec.deleted = flags & FLAG_DELETED != 0;
                sec.status = flags & (FLAG_CRC_ERROR | FLAG_NON_IBM);
                trace!("sector C{} H{} R{} size {}",c,h,r,size);
                tracks.entry(pos).or_insert_with(|| Track::new(c,h,pos)).add_sector(sec);
                ptr += size;
            }
            base = ptr;
            if base >= data.len() {
                break;
            }
        }
        if tracks.len()==0 {
            return result.fatal(Error::NoTrack,"no used sectors in JV3 stream");
        }
        for (pos,mut track) in tracks {
            track.compute_interleave();
            // table order need not follow the layout, use synthetic offsets
            if !disk.add_track(track,pos as u32 + 1) {
                return result.fatal(Error::DuplicateTrack,&format!("slot {}",pos));
            }
        }
        debug!("JV3 {} tracks, write protect {}",disk.track_count(),disk.write_protected);
        file.add_disk(disk);
        worst
    }
}
