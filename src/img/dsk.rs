//! ## Support for CPC DSK disk images
//!
//! The CPCEMU container stores a 256 byte disk info block followed by track
//! blocks, each led by a 256 byte `Track-Info` header and an 8 byte info
//! entry per sector.  The standard variant declares one track size for the
//! whole disk; the extended variant carries a per-track size table in
//! 256 byte units, where zero marks an unformatted track.

use log::{trace,debug};
use crate::img::{Disk,DiskImageFile,DiskResult,Error,ImageParser,Sector,Track,TypeHints};
use crate::img::model::DiskDensity;

const STD_MAGIC: &[u8] = b"MV - CPCEMU Disk-File\r\nDisk-Info\r\n";
const EXT_MAGIC: &[u8] = b"EXTENDED CPC DSK File\r\nDisk-Info\r\n";
const DISK_INFO_SIZE: usize = 256;
const TRACK_INFO_SIZE: usize = 256;
const TRACK_MARKER: &[u8] = b"Track-Info\r\n";
const SECTOR_INFO_SIZE: usize = 8;
const TRACK_COUNT_OFF: usize = 0x30;
const SIDE_COUNT_OFF: usize = 0x31;
const TRACK_SIZE_OFF: usize = 0x32;
const EXT_SIZE_TABLE_OFF: usize = 0x34;

pub fn file_extensions() -> Vec<String> {
    vec!["dsk".to_string()]
}

#[derive(Clone,Copy,PartialEq,Eq)]
enum Variant {
    Standard,
    Extended
}

fn variant(data: &[u8]) -> Option<Variant> {
    if data.len() < DISK_INFO_SIZE {
        return None;
    }
    if data[0..STD_MAGIC.len()]==*STD_MAGIC {
        return Some(Variant::Standard);
    }
    if data[0..EXT_MAGIC.len()]==*EXT_MAGIC {
        return Some(Variant::Extended);
    }
    None
}

/// Per-track byte footprints in file order, zero for unformatted tracks.
fn track_sizes(data: &[u8],var: Variant) -> Vec<usize> {
    let tracks = data[TRACK_COUNT_OFF] as usize;
    let sides = data[SIDE_COUNT_OFF] as usize;
    let count = tracks*sides;
    match var {
        Variant::Standard => {
            let size = u16::from_le_bytes([data[TRACK_SIZE_OFF],data[TRACK_SIZE_OFF+1]]) as usize;
            vec![size;count]
        },
        Variant::Extended => {
            (0..count).map(|i| match EXT_SIZE_TABLE_OFF+i < DISK_INFO_SIZE {
                true => data[EXT_SIZE_TABLE_OFF+i] as usize * 256,
                false => 0
            }).collect()
        }
    }
}

pub struct DskParser;

impl DskParser {
    /// Decode one track block into the disk.  Short sector data is padded
    /// with the track's filler byte rather than rejected.
    fn parse_track(&self,block: &[u8],offset_pos: usize,offset: u32,disk: &mut Disk,result: &mut DiskResult) -> i32 {
        if block.len() < TRACK_INFO_SIZE {
            return result.warning(Error::DiskTooSmall,&format!("track block {} shorter than its header",offset_pos));
        }
        if &block[0..TRACK_MARKER.len()] != TRACK_MARKER {
            return result.warning(Error::DiskHeader,&format!("track block {} missing marker",offset_pos));
        }
        let count = block[0x15] as usize;
        let filler = block[0x17];
        let single_density = block[0x13] & 0x80 != 0;
        if 0x18 + count*SECTOR_INFO_SIZE > TRACK_INFO_SIZE {
            return result.warning(Error::TooManySectors,&format!("track block {} declares {} sectors",offset_pos,count));
        }
        let mut track = Track::new(block[0x10],block[0x11],offset_pos);
        let mut worst = 0;
        let mut data_ptr = TRACK_INFO_SIZE;
        for i in 0..count {
            let info = &block[0x18+i*SECTOR_INFO_SIZE..0x18+(i+1)*SECTOR_INFO_SIZE];
            let declared = u16::from_le_bytes([info[6],info[7]]) as usize;
            let size = match declared {
                0 => Sector::size_from_code(info[3] & 7),
                s => s
            };
            let mut payload: Vec<u8> = match data_ptr+size <= block.len() {
                true => block[data_ptr..data_ptr+size].to_vec(),
                false => {
                    worst = result.warning(Error::OverflowSize,
                        &format!("sector {} of track block {} truncated",info[2],offset_pos));
                    let mut v = block.get(data_ptr..).unwrap_or(&[]).to_vec();
                    v.resize(size,filler);
                    v
                }
            };
            // weak or oversized reads store multiple copies, keep the first
            let nominal = Sector::size_from_code(info[3] & 7);
            if declared > nominal && declared % nominal == 0 {
                payload.truncate(nominal);
            }
            let mut sec = Sector::new(info[0],info[1],info[2],info[3],payload);
            sec.single_density = single_density;
            sec.deleted = info[5] & 0x40 != 0;
            sec.status = info[4];
            trace!("sector C{} H{} R{} N{}",info[0],info[1],info[2],info[3]);
            track.add_sector(sec);
            data_ptr += size;
        }
        let (c,h) = track.major_ch();
        track.track_num = c;
        track.side_num = h;
        track.compute_interleave();
        if !disk.add_track(track,offset) {
            return result.fatal(Error::DuplicateTrack,&format!("slot {}",offset_pos));
        }
        worst
    }
}

impl ImageParser for DskParser {
    fn name(&self) -> &'static str {
        "cpcdsk"
    }
    fn file_extensions(&self) -> Vec<String> {
        file_extensions()
    }
    fn check(&self,data: &[u8],_hints: &mut TypeHints,_result: &mut DiskResult) -> i32 {
        let var = match variant(data) {
            Some(v) => v,
            None => return -1
        };
        let tracks = data[TRACK_COUNT_OFF] as usize;
        let sides = data[SIDE_COUNT_OFF] as usize;
        if tracks==0 || tracks > 82 || sides==0 || sides > 2 {
            return -1;
        }
        let total: usize = track_sizes(data,var).iter().sum();
        if DISK_INFO_SIZE + total > data.len() {
            return -1;
        }
        0
    }
    fn parse(&self,data: &[u8],_hints: &TypeHints,file: &mut DiskImageFile,result: &mut DiskResult) -> i32 {
        let var = match variant(data) {
            Some(v) => v,
            None => return result.fatal(Error::DiskHeader,"not a CPCEMU stream")
        };
        let sides = data[SIDE_COUNT_OFF] as usize;
        let sizes = track_sizes(data,var);
        let name = String::from_utf8_lossy(&data[0x22..0x30]).trim_end_matches(['\0',' ']).to_string();
        let mut disk = Disk::new(&name,DiskDensity::D2);
        let mut ptr = DISK_INFO_SIZE;
        let mut worst = 0;
        for (i,size) in sizes.iter().enumerate() {
            if *size==0 {
                continue; // unformatted
            }
            if ptr + size > data.len() {
                worst = result.warning(Error::DiskTooSmall,&format!("stream ends inside track block {}",i));
                break;
            }
            // slot layout is cylinder major with alternating sides
            let pos = match sides {
                1 => (i/sides)*2,
                _ => i
            };
            let status = self.parse_track(&data[ptr..ptr+size],pos,ptr as u32,&mut disk,result);
            if status < 0 {
                return status;
            }
            worst = worst.max(status);
            ptr += size;
        }
        if disk.track_count()==0 {
            return result.fatal(Error::NoTrack,"no formatted tracks");
        }
        debug!("CPC DSK '{}' {} tracks",disk.name,disk.track_count());
        file.add_disk(disk);
        worst
    }
}
