//! ## Support for HxC HFE disk images
//!
//! HFE stores raw flux cells rather than decoded sectors.  A 0x200 byte
//! header gives the geometry and a track lookup table; each track's cell
//! data is striped in 512 byte blocks, the first half of every block
//! belonging to side 0 and the second half to side 1, bits LSB first.
//! Sectors are recovered by demodulating the cell stream: MFM address and
//! data marks are located by their 0x4489 sync words, FM marks by their
//! clock-violating raw patterns.  Only revision 0 of the `HXCPICFE`
//! signature is decoded; the v3 opcode stream is rejected.

use log::{trace,debug};
use crate::img::{codec,Disk,DiskImageFile,DiskResult,Error,ImageParser,Sector,Track,TypeHints};
use crate::img::codec::BitStream;
use crate::img::model::DiskDensity;

const MAGIC_V1: &[u8] = b"HXCPICFE";
const MAGIC_V3: &[u8] = b"HXCHFEV3";
const HEADER_SIZE: usize = 0x200;
const BLOCK: usize = 512;
const ENC_ISOIBM_MFM: u8 = 0x00;
const ENC_ISOIBM_FM: u8 = 0x02;
const ENC_EMU_FM: u8 = 0x03;
/// bound on the gap between an id field and its data mark, in cells
const DAM_WINDOW: usize = 16*16*43;

pub fn file_extensions() -> Vec<String> {
    vec!["hfe".to_string()]
}

pub struct HfeParser;

impl HfeParser {
    /// Demodulate every MFM sector on one side's cell stream.
    fn scan_mfm(&self,bits: &mut BitStream,track: &mut Track,result: &mut DiskResult) -> i32 {
        let mut worst = 0;
        loop {
            if !bits.seek_pattern(codec::MFM_SYNC,bits.len()) {
                break;
            }
            let mut mark = 0xa1;
            while mark==0xa1 {
                mark = match bits.read_mfm_byte() {
                    Some(b) => b,
                    None => return worst
                };
            }
            if mark != codec::ID_MARK {
                continue;
            }
            let id = match bits.read_mfm_slice(6) {
                Some(v) => v,
                None => return worst
            };
            if id[3] > 7 {
                worst = result.warning(Error::SectorSizeHeader,&format!("size exponent {}",id[3]));
                continue;
            }
            let recorded = u16::from_be_bytes([id[4],id[5]]);
            let computed = codec::crc16_ccitt(0xffff,
                &[0xa1,0xa1,0xa1,codec::ID_MARK,id[0],id[1],id[2],id[3]]);
            if recorded != computed {
                worst = result.warning(Error::IdSector,
                    &format!("id field checksum mismatch at sector {}",id[2]));
            }
            // the data mark must follow within the gap window
            if !bits.seek_pattern(codec::MFM_SYNC,DAM_WINDOW) {
                worst = result.warning(Error::NoSector,&format!("no data mark for sector {}",id[2]));
                continue;
            }
            let mut dam = 0xa1;
            while dam==0xa1 {
                dam = match bits.read_mfm_byte() {
                    Some(b) => b,
                    None => return worst
                };
            }
            if dam != codec::DATA_MARK && dam != codec::DELETED_DATA_MARK {
                worst = result.warning(Error::NoSector,&format!("no data mark for sector {}",id[2]));
                continue;
            }
            let size = Sector::size_from_code(id[3]);
            let payload = match bits.read_mfm_slice(size) {
                Some(v) => v,
                None => {
                    worst = result.warning(Error::OverflowSize,&format!("sector {} truncated",id[2]));
                    continue;
                }
            };
            let mut sec = Sector::new(id[0],id[1],id[2],id[3],payload);
            sec.deleted = dam==codec::DELETED_DATA_MARK;
            sec.recorded_crc = Some(recorded);
            trace!("MFM sector C{} H{} R{} N{}",id[0],id[1],id[2],id[3]);
            track.add_sector(sec);
        }
        worst
    }
    /// Demodulate every FM sector on one side's cell stream.
    fn scan_fm(&self,bits: &mut BitStream,track: &mut Track,result: &mut DiskResult) -> i32 {
        let mut worst = 0;
        loop {
            if !bits.seek_pattern(codec::FM_IDAM,bits.len()) {
                break;
            }
            let id = match bits.read_fm_slice(6) {
                Some(v) => v,
                None => return worst
            };
            if id[3] > 7 {
                worst = result.warning(Error::SectorSizeHeader,&format!("size exponent {}",id[3]));
                continue;
            }
            let mark = bits.pos();
            let deleted = if bits.seek_pattern(codec::FM_DAM,DAM_WINDOW) {
                false
            } else {
                bits.reset(mark);
                if !bits.seek_pattern(codec::FM_DDAM,DAM_WINDOW) {
                    worst = result.warning(Error::NoSector,&format!("no data mark for sector {}",id[2]));
                    continue;
                }
                true
            };
            let size = Sector::size_from_code(id[3]);
            let payload = match bits.read_fm_slice(size) {
                Some(v) => v,
                None => {
                    worst = result.warning(Error::OverflowSize,&format!("sector {} truncated",id[2]));
                    continue;
                }
            };
            let mut sec = Sector::new(id[0],id[1],id[2],id[3],payload);
            sec.single_density = true;
            sec.deleted = deleted;
            trace!("FM sector C{} H{} R{} N{}",id[0],id[1],id[2],id[3]);
            track.add_sector(sec);
        }
        worst
    }
    /// Pull one side's cell bytes out of the striped track region.
    fn side_bytes(region: &[u8],side: usize) -> Vec<u8> {
        let mut ans = Vec::with_capacity(region.len()/2);
        let mut ptr = 0;
        while ptr < region.len() {
            let lo = ptr + side*(BLOCK/2);
            let hi = (lo + BLOCK/2).min(region.len());
            if lo < region.len() {
                ans.extend_from_slice(&region[lo..hi]);
            }
            ptr += BLOCK;
        }
        ans
    }
}

impl ImageParser for HfeParser {
    fn name(&self) -> &'static str {
        "hfe"
    }
    fn file_extensions(&self) -> Vec<String> {
        file_extensions()
    }
    fn check(&self,data: &[u8],_hints: &mut TypeHints,_result: &mut DiskResult) -> i32 {
        if data.len() < HEADER_SIZE {
            return -1;
        }
        if &data[0..8] != MAGIC_V1 && &data[0..8] != MAGIC_V3 {
            return -1;
        }
        let tracks = data[9] as usize;
        let sides = data[10] as usize;
        if tracks==0 || tracks > 82 || sides==0 || sides > 2 {
            return -1;
        }
        0
    }
    fn parse(&self,data: &[u8],_hints: &TypeHints,file: &mut DiskImageFile,result: &mut DiskResult) -> i32 {
        if data.len() < HEADER_SIZE {
            return result.fatal(Error::DiskTooSmall,"stream smaller than HFE header");
        }
        if &data[0..8]==MAGIC_V3 {
            return result.fatal(Error::UnsupportedType,"HFE v3 opcode stream");
        }
        if &data[0..8] != MAGIC_V1 {
            return result.fatal(Error::DiskHeader,"not an HFE stream");
        }
        if data[8] != 0 {
            return result.fatal(Error::UnsupportedType,&format!("HFE revision {}",data[8]));
        }
        let tracks = data[9] as usize;
        let sides = data[10] as usize;
        let encoding = data[11];
        let bitrate = u16::from_le_bytes([data[12],data[13]]);
        let lut_base = u16::from_le_bytes([data[18],data[19]]) as usize * BLOCK;
        if lut_base + tracks*4 > data.len() {
            return result.fatal(Error::OverflowOffset,"track lookup table outside stream");
        }
        let density = match (bitrate,tracks) {
            (b,_) if b >= 400 => DiskDensity::D2HD,
            (_,t) if t > 44 => DiskDensity::D2DD,
            _ => DiskDensity::D2
        };
        let fm = encoding==ENC_ISOIBM_FM || encoding==ENC_EMU_FM;
        let mut disk = Disk::new("",density);
        let mut worst = 0;
        for cyl in 0..tracks {
            let entry = lut_base + cyl*4;
            let offset = u16::from_le_bytes([data[entry],data[entry+1]]) as usize * BLOCK;
            let len = u16::from_le_bytes([data[entry+2],data[entry+3]]) as usize;
            if offset + len > data.len() {
                worst = result.warning(Error::OverflowOffset,&format!("cyl {} cell data outside stream",cyl));
                continue;
            }
            let region = &data[offset..offset+len];
            for side in 0..sides {
                let cells = Self::side_bytes(region,side);
                let mut bits = BitStream::from_bytes_lsb(&cells);
                let pos = cyl*2 + side;
                let mut track = Track::new(cyl as u8,side as u8,pos);
                let status = match fm {
                    true => self.scan_fm(&mut bits,&mut track,result),
                    false => {
                        let s = self.scan_mfm(&mut bits,&mut track,result);
                        match track.sector_count() {
                            0 => {
                                // some images mark FM tracks with the MFM code
                                bits.reset(0);
                                self.scan_fm(&mut bits,&mut track,result)
                            },
                            _ => s
                        }
                    }
                };
                worst = worst.max(status);
                if track.sector_count()==0 {
                    continue;
                }
                let (c,h) = track.major_ch();
                track.track_num = c;
                track.side_num = h;
                track.compute_interleave();
                if !disk.add_track(track,(offset + side*BLOCK/2) as u32) {
                    return result.fatal(Error::DuplicateTrack,&format!("slot {}",pos));
                }
            }
        }
        if disk.track_count()==0 {
            return result.fatal(Error::NoTrack,"no sectors recovered from cell data");
        }
        debug!("HFE {} tracks at {} kbps",disk.track_count(),bitrate);
        file.add_disk(disk);
        worst
    }
}
