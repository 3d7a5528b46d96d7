//! ## Support for Commodore G64 disk images
//!
//! A G64 stream holds raw GCR track bytes for up to 84 half tracks, located
//! by a table of absolute offsets after the `GCR-1541` signature.  Sectors
//! are recovered by scanning each track for 0xFF sync runs: a header block
//! decodes to 0x08 followed by checksum, sector and track ids, a data block
//! to 0x07 followed by 256 payload bytes and a checksum.  Five GCR bytes
//! decode to four data bytes throughout.

use log::{trace,debug};
use crate::img::{codec,Disk,DiskImageFile,DiskResult,Error,ImageParser,Sector,Track,TypeHints};
use crate::img::model::DiskDensity;

const MAGIC: &[u8] = b"GCR-1541";
const HEADER_SIZE: usize = 12;
const MAX_HALF_TRACKS: usize = 84;
const HEADER_BLOCK: u8 = 0x08;
const DATA_BLOCK: u8 = 0x07;
const SECTOR_SIZE: usize = 256;
/// GCR footprint of a data block: 0x07 + 256 bytes + checksum + 2 off bytes
const DATA_GCR_LEN: usize = 325;

pub fn file_extensions() -> Vec<String> {
    vec!["g64".to_string()]
}

pub struct G64Parser;

impl G64Parser {
    /// Position just after the next run of at least `min` sync bytes,
    /// starting at `ptr`.  The track buffer is treated as circularly laid
    /// out but scanned once.
    fn next_sync(raw: &[u8],ptr: usize,min: usize) -> Option<usize> {
        let mut run = 0;
        for i in ptr..raw.len() {
            if raw[i]==0xff {
                run += 1;
            } else {
                if run >= min {
                    return Some(i);
                }
                run = 0;
            }
        }
        None
    }
    /// Decode one track's GCR bytes into sectors.
    fn parse_track(&self,raw: &[u8],half_track: usize,track: &mut Track,result: &mut DiskResult) -> i32 {
        let mut worst = 0;
        let mut ptr = 0;
        while let Some(start) = Self::next_sync(raw,ptr,2) {
            ptr = start;
            if ptr + 10 > raw.len() {
                break;
            }
            let block = match codec::gcr_decode(&raw[ptr..ptr+10],8) {
                Ok(v) => v,
                Err(_) => {
                    ptr += 1;
                    continue;
                }
            };
            if block[0] != HEADER_BLOCK {
                ptr += 1;
                continue;
            }
            let checksum = block[1];
            let r = block[2];
            let c = block[3];
            if checksum != block[2]^block[3]^block[4]^block[5] {
                worst = result.warning(Error::IdSector,
                    &format!("header checksum mismatch at half track {}",half_track));
            }
            ptr += 10;
            let data_at = match Self::next_sync(raw,ptr,2) {
                Some(p) => p,
                None => {
                    worst = result.warning(Error::NoSector,&format!("no data block for sector {}",r));
                    break;
                }
            };
            if data_at + DATA_GCR_LEN > raw.len() {
                worst = result.warning(Error::OverflowSize,&format!("sector {} truncated",r));
                break;
            }
            let decoded = match codec::gcr_decode(&raw[data_at..data_at+DATA_GCR_LEN],SECTOR_SIZE+4) {
                Ok(v) => v,
                Err(_) => {
                    worst = result.warning(Error::NoSector,&format!("bad GCR in sector {}",r));
                    ptr = data_at + 1;
                    continue;
                }
            };
            if decoded[0] != DATA_BLOCK {
                worst = result.warning(Error::NoSector,&format!("no data block for sector {}",r));
                ptr = data_at + 1;
                continue;
            }
            let payload = decoded[1..1+SECTOR_SIZE].to_vec();
            let data_sum = payload.iter().fold(0u8,|acc,b| acc^b);
            if data_sum != decoded[1+SECTOR_SIZE] {
                worst = result.warning(Error::SectorSizeSector,
                    &format!("data checksum mismatch in sector {}",r));
            }
            let mut sec = Sector::new(c,0,r,1,payload);
            sec.status = data_sum^decoded[1+SECTOR_SIZE];
            trace!("GCR sector T{} S{}",c,r);
            track.add_sector(sec);
            ptr = data_at + DATA_GCR_LEN;
        }
        worst
    }
}

impl ImageParser for G64Parser {
    fn name(&self) -> &'static str {
        "g64"
    }
    fn file_extensions(&self) -> Vec<String> {
        file_extensions()
    }
    fn check(&self,data: &[u8],_hints: &mut TypeHints,_result: &mut DiskResult) -> i32 {
        if data.len() < HEADER_SIZE + MAX_HALF_TRACKS*4 {
            return -1;
        }
        if &data[0..8] != MAGIC {
            return -1;
        }
        let tracks = data[9] as usize;
        if tracks==0 || tracks > MAX_HALF_TRACKS {
            return -1;
        }
        0
    }
    fn parse(&self,data: &[u8],_hints: &TypeHints,file: &mut DiskImageFile,result: &mut DiskResult) -> i32 {
        if data.len() < HEADER_SIZE + MAX_HALF_TRACKS*4 || &data[0..8] != MAGIC {
            return result.fatal(Error::DiskHeader,"not a G64 stream");
        }
        let half_tracks = (data[9] as usize).min(MAX_HALF_TRACKS);
        let mut disk = Disk::new("",DiskDensity::D2);
        let mut worst = 0;
        for ht in 0..half_tracks {
            let entry = HEADER_SIZE + ht*4;
            let offset = u32::from_le_bytes([data[entry],data[entry+1],data[entry+2],data[entry+3]]) as usize;
            if offset==0 {
                continue; // half track not stored
            }
            if offset + 2 > data.len() {
                worst = result.warning(Error::OverflowOffset,&format!("half track {} outside stream",ht));
                continue;
            }
            let len = u16::from_le_bytes([data[offset],data[offset+1]]) as usize;
            if offset + 2 + len > data.len() {
                worst = result.warning(Error::OverflowSize,&format!("half track {} truncated",ht));
                continue;
            }
            let raw = &data[offset+2..offset+2+len];
            let mut track = Track::new((ht/2) as u8,0,ht);
            let status = self.parse_track(raw,ht,&mut track,result);
            worst = worst.max(status);
            if track.sector_count()==0 {
                continue;
            }
            let (c,h) = track.major_ch();
            track.track_num = c;
            track.side_num = h;
            track.compute_interleave();
            if !disk.add_track(track,offset as u32) {
                return result.fatal(Error::DuplicateTrack,&format!("slot {}",ht));
            }
        }
        if disk.track_count()==0 {
            return result.fatal(Error::NoTrack,"no sectors recovered from GCR data");
        }
        debug!("G64 {} tracks",disk.track_count());
        file.add_disk(disk);
        worst
    }
}
