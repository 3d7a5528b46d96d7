//! ## Support for TRS-80 DMK disk images
//!
//! A DMK stream is a 16 byte header followed by raw track bytes, each track
//! prefixed by a 128 entry IDAM pointer table.  Pointer bit 15 flags double
//! density, the low 14 bits locate the 0xFE address mark inside the track.
//! Single density tracks are conventionally stored with every byte doubled
//! unless header flag 0x40 says otherwise.

use log::{trace,debug};
use crate::img::{Disk,DiskImageFile,DiskResult,Error,ImageParser,Sector,Track,TypeHints};
use crate::img::model::DiskDensity;

const HEADER_SIZE: usize = 16;
const IDAM_TABLE_LEN: usize = 128;
const WRITE_PROTECTED: u8 = 0xff;
const SIG_REAL: u32 = 0x12345678;
const SIG_VIRTUAL: u32 = 0;
const FLAG_SINGLE_SIDED: u8 = 0x10;
const FLAG_NOT_DOUBLED: u8 = 0x40;
const DENSITY_BIT: u16 = 0x8000;
const OFFSET_MASK: u16 = 0x3fff;

pub fn file_extensions() -> Vec<String> {
    vec!["dmk".to_string()]
}

fn signature(data: &[u8]) -> u32 {
    u32::from_le_bytes([data[0x0c],data[0x0d],data[0x0e],data[0x0f]])
}

pub struct DmkParser;

impl DmkParser {
    /// Decode one sector starting at an IDAM pointer.  `step` is 2 for
    /// doubled single density bytes, otherwise 1.
    fn parse_sector(&self,raw: &[u8],idam: usize,step: usize,dd: bool,track: &mut Track,result: &mut DiskResult) -> i32 {
        if idam + 7*step > raw.len() || raw[idam] != 0xfe {
            return result.warning(Error::NoSector,&format!("address mark missing at {:#x}",idam));
        }
        let c = raw[idam+step];
        let h = raw[idam+2*step];
        let r = raw[idam+3*step];
        let n = raw[idam+4*step];
        if n > 7 {
            return result.warning(Error::SectorSizeHeader,&format!("size exponent {}",n));
        }
        let size = Sector::size_from_code(n);
        // the data mark trails the id field by a gap of bounded length
        let mut dam = None;
        let mut ptr = idam + 7*step;
        let limit = ptr + 50*step;
        while ptr < raw.len() && ptr < limit {
            if raw[ptr]==0xfb || raw[ptr]==0xf8 {
                dam = Some(ptr);
                break;
            }
            ptr += step;
        }
        let dam = match dam {
            Some(d) => d,
            None => return result.warning(Error::NoSector,&format!("data mark missing for sector {}",r))
        };
        let deleted = raw[dam]==0xf8;
        let mut payload = Vec::with_capacity(size);
        let mut src = dam + step;
        for _i in 0..size {
            if src >= raw.len() {
                return result.warning(Error::OverflowSize,&format!("sector {} truncated",r));
            }
            payload.push(raw[src]);
            src += step;
        }
        let mut sec = Sector::new(c,h,r,n,payload);
        sec.single_density = !dd;
        sec.deleted = deleted;
        trace!("sector C{} H{} R{} N{}",c,h,r,n);
        track.add_sector(sec);
        0
    }
}

impl ImageParser for DmkParser {
    fn name(&self) -> &'static str {
        "dmk"
    }
    fn file_extensions(&self) -> Vec<String> {
        file_extensions()
    }
    fn check(&self,data: &[u8],_hints: &mut TypeHints,_result: &mut DiskResult) -> i32 {
        if data.len() < HEADER_SIZE {
            return -1;
        }
        if data[0] != 0 && data[0] != WRITE_PROTECTED {
            return -1;
        }
        let sig = signature(data);
        if sig != SIG_REAL && sig != SIG_VIRTUAL {
            return -1;
        }
        let cyls = data[1] as usize;
        let track_len = u16::from_le_bytes([data[2],data[3]]) as usize;
        if cyls==0 || cyls > 85 || track_len <= 2*IDAM_TABLE_LEN || track_len > 0x4000 {
            return -1;
        }
        let sides = match data[4] & FLAG_SINGLE_SIDED { 0 => 2, _ => 1 };
        if HEADER_SIZE + cyls*sides*track_len > data.len() {
            return -1;
        }
        0
    }
    fn parse(&self,data: &[u8],_hints: &TypeHints,file: &mut DiskImageFile,result: &mut DiskResult) -> i32 {
        if data.len() < HEADER_SIZE {
            return result.fatal(Error::DiskTooSmall,"stream smaller than DMK header");
        }
        let sig = signature(data);
        if sig != SIG_REAL && sig != SIG_VIRTUAL {
            return result.fatal(Error::DiskHeader,&format!("signature {:#010x}",sig));
        }
        let cyls = data[1] as usize;
        let track_len = u16::from_le_bytes([data[2],data[3]]) as usize;
        if track_len <= 2*IDAM_TABLE_LEN {
            return result.fatal(Error::DiskHeader,&format!("track length {}",track_len));
        }
        let sides = match data[4] & FLAG_SINGLE_SIDED { 0 => 2, _ => 1 };
        let doubled = data[4] & FLAG_NOT_DOUBLED == 0;
        let mut disk = Disk::new("",DiskDensity::D2);
        disk.write_protected = data[0]==WRITE_PROTECTED;
        let mut worst = 0;
        for cyl in 0..cyls {
            for side in 0..sides {
                let base = HEADER_SIZE + (cyl*sides + side)*track_len;
                if base + track_len > data.len() {
                    worst = result.warning(Error::DiskTooSmall,&format!("stream ends inside cyl {}",cyl));
                    break;
                }
                let raw = &data[base..base+track_len];
                let pos = cyl*2 + side;
                let mut track = Track::new(cyl as u8,side as u8,pos);
                for i in 0..IDAM_TABLE_LEN {
                    let entry = u16::from_le_bytes([raw[i*2],raw[i*2+1]]);
                    if entry==0 {
                        continue;
                    }
                    let dd = entry & DENSITY_BIT != 0;
                    let idam = (entry & OFFSET_MASK) as usize;
                    if idam < 2*IDAM_TABLE_LEN || idam >= track_len {
                        worst = result.warning(Error::OverflowOffset,
                            &format!("pointer {} of cyl {} out of range",i,cyl));
                        continue;
                    }
                    let step = match dd || !doubled { true => 1, false => 2 };
                    let status = self.parse_sector(raw,idam,step,dd,&mut track,result);
                    worst = worst.max(status);
                }
                if track.sector_count()==0 {
                    continue; // unformatted
                }
                let (c,h) = track.major_ch();
                track.track_num = c;
                track.side_num = h;
                track.compute_interleave();
                if !disk.add_track(track,base as u32) {
                    return result.fatal(Error::DuplicateTrack,&format!("slot {}",pos));
                }
            }
        }
        if disk.track_count()==0 {
            return result.fatal(Error::NoTrack,"no formatted tracks in DMK stream");
        }
        debug!("DMK {} tracks, write protect {}",disk.track_count(),disk.write_protected);
        file.add_disk(disk);
        worst
    }
}
