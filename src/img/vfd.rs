//! ## Support for Virtual98 FDD disk images
//!
//! The Virtual98 container is a signature, a comment region, and a fixed
//! table of 12 byte sector entries for up to 160 tracks of 26 sectors.
//! Each entry holds the id tuple, a fill byte, flags, and an absolute u32
//! payload offset; 0xFFFFFFFF marks an absent sector.  An entry whose
//! offset is absent but whose id is valid represents a uniformly filled
//! sector reconstructed from the fill byte.

use log::{trace,debug};
use crate::img::{Disk,DiskImageFile,DiskResult,Error,ImageParser,Sector,Track,TypeHints};
use crate::img::model::DiskDensity;

const SIGNATURE: &[u8] = b"VFD1.00\0";
const COMMENT_OFF: usize = 0x08;
const COMMENT_LEN: usize = 0x80;
const PROTECT_OFF: usize = 0x88;
const TABLE_OFF: usize = 0xdc;
const MAX_TRACKS_VFD: usize = 160;
const MAX_SECTORS: usize = 26;
const ENTRY_SIZE: usize = 12;
const ABSENT: u32 = 0xffff_ffff;
const HEADER_SIZE: usize = TABLE_OFF + MAX_TRACKS_VFD*MAX_SECTORS*ENTRY_SIZE;

pub fn file_extensions() -> Vec<String> {
    vec!["fdd".to_string(),"vfd".to_string()]
}

pub struct VfdParser;

impl ImageParser for VfdParser {
    fn name(&self) -> &'static str {
        "vfd"
    }
    fn file_extensions(&self) -> Vec<String> {
        file_extensions()
    }
    fn check(&self,data: &[u8],_hints: &mut TypeHints,_result: &mut DiskResult) -> i32 {
        if data.len() < HEADER_SIZE {
            return -1;
        }
        if &data[0..SIGNATURE.len()] != SIGNATURE {
            return -1;
        }
        0
    }
    fn parse(&self,data: &[u8],_hints: &TypeHints,file: &mut DiskImageFile,result: &mut DiskResult) -> i32 {
        if data.len() < HEADER_SIZE || &data[0..SIGNATURE.len()] != SIGNATURE {
            return result.fatal(Error::DiskHeader,"not a Virtual98 stream");
        }
        let comment = String::from_utf8_lossy(&data[COMMENT_OFF..COMMENT_OFF+COMMENT_LEN])
            .trim_end_matches('\0').trim().to_string();
        let mut disk = Disk::new(&comment,DiskDensity::D2HD);
        disk.write_protected = data[PROTECT_OFF] != 0;
        let mut worst = 0;
        for pos in 0..MAX_TRACKS_VFD {
            let mut track = Track::new((pos/2) as u8,(pos%2) as u8,pos);
            for i in 0..MAX_SECTORS {
                let at = TABLE_OFF + (pos*MAX_SECTORS + i)*ENTRY_SIZE;
                let entry = &data[at..at+ENTRY_SIZE];
                let offset = u32::from_le_bytes([entry[8],entry[9],entry[10],entry[11]]);
                let n = entry[3];
                if offset==ABSENT && entry[0]==0xff {
                    continue; // empty entry
                }
                if n > 7 {
                    worst = result.warning(Error::SectorSizeHeader,
                        &format!("size exponent {} in track {}",n,pos));
                    continue;
                }
                let size = Sector::size_from_code(n);
                let payload = match offset {
                    ABSENT => vec![entry[4];size],
                    off => {
                        let off = off as usize;
                        if off < HEADER_SIZE || off + size > data.len() {
                            worst = result.warning(Error::OverflowOffset,
                                &format!("sector {} of track {} outside stream",entry[2],pos));
                            continue;
                        }
                        data[off..off+size].to_vec()
                    }
                };
                let mut sec = Sector::new(entry[0],entry[1],entry[2],n,payload);
                sec.deleted = entry[5] & 0x01 != 0;
                trace!("sector C{} H{} R{}",entry[0],entry[1],entry[2]);
                track.add_sector(sec);
            }
            if track.sector_count()==0 {
                continue;
            }
            let (c,h) = track.major_ch();
            track.track_num = c;
            track.side_num = h;
            track.compute_interleave();
            // table entries are the stable anchor, payload offsets may be
            // scattered in any order
            let offset = (TABLE_OFF + pos*MAX_SECTORS*ENTRY_SIZE) as u32;
            if !disk.add_track(track,offset) {
                return result.fatal(Error::DuplicateTrack,&format!("slot {}",pos));
            }
        }
        if disk.track_count()==0 {
            return result.fatal(Error::NoTrack,"no sectors in Virtual98 stream");
        }
        debug!("Virtual98 '{}' {} tracks",disk.name,disk.track_count());
        file.add_disk(disk);
        worst
    }
}
