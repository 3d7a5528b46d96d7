//! ## Support for D88 disk images
//!
//! The D88 container is the canonical format for Japanese 8-bit machines and
//! maps almost directly onto the in-memory model: a 0x2B0 byte header with a
//! 164 entry track offset table, then per-sector blocks carrying the id
//! tuple, density and status.  Several disks may be concatenated in one
//! stream.  This parser also serializes the model back out, regenerating the
//! offset table from the tracks actually present.

use log::{trace,debug,warn};
use crate::img::{Disk,DiskImageFile,DiskResult,Error,ImageParser,Sector,Track,TypeHints};
use crate::img::model::{DiskDensity,MAX_TRACKS};

pub const HEADER_SIZE: usize = 0x20 + MAX_TRACKS*4;
const NAME_LEN: usize = 17;
const SECTOR_HEADER_SIZE: usize = 16;
const WRITE_PROTECT: u8 = 0x10;
const DENSITY_FM: u8 = 0x40;
const DELETED_MARK: u8 = 0x10;

pub fn file_extensions() -> Vec<String> {
    vec!["d88".to_string(),"d77".to_string(),"d68".to_string(),"98d".to_string(),"d8u".to_string()]
}

pub struct D88Parser;

impl D88Parser {
    /// Read one sector block, append to the track, and return its encoded
    /// byte footprint, or a negative status on a structural violation.
    fn parse_sector(&self,data: &[u8],ptr: usize,track: &mut Track,result: &mut DiskResult) -> i64 {
        if ptr + SECTOR_HEADER_SIZE > data.len() {
            return result.fatal(Error::DiskTooSmall,&format!("sector header at {:#x}",ptr)) as i64;
        }
        let c = data[ptr];
        let h = data[ptr+1];
        let r = data[ptr+2];
        let n = data[ptr+3];
        if n > 7 {
            return result.fatal(Error::SectorSizeHeader,&format!("size exponent {}",n)) as i64;
        }
        let density = data[ptr+6];
        let deleted = data[ptr+7];
        let status = data[ptr+8];
        let size = u16::from_le_bytes([data[ptr+14],data[ptr+15]]) as usize;
        if ptr + SECTOR_HEADER_SIZE + size > data.len() {
            return result.fatal(Error::OverflowSize,&format!("sector data at {:#x}",ptr)) as i64;
        }
        let mut sec = Sector::new(c,h,r,n,data[ptr+SECTOR_HEADER_SIZE..ptr+SECTOR_HEADER_SIZE+size].to_vec());
        sec.single_density = density==DENSITY_FM;
        sec.deleted = deleted==DELETED_MARK;
        sec.status = status;
        trace!("sector C{} H{} R{} N{} size {}",c,h,r,n,size);
        track.add_sector(sec);
        (SECTOR_HEADER_SIZE + size) as i64
    }
    /// Read one track worth of sector blocks starting at `offset`.
    fn parse_track(&self,data: &[u8],offset_pos: usize,offset: usize,disk: &mut Disk,result: &mut DiskResult) -> i32 {
        if offset + SECTOR_HEADER_SIZE > data.len() {
            return result.fatal(Error::OverflowOffset,&format!("track {} offset {:#x}",offset_pos,offset));
        }
        let declared = u16::from_le_bytes([data[offset+4],data[offset+5]]) as usize;
        if declared==0 || declared > 64 {
            return result.warning(Error::TooManySectors,&format!("track {} declares {} sectors",offset_pos,declared));
        }
        let mut track = Track::new((offset_pos/2) as u8,(offset_pos%2) as u8,offset_pos);
        let mut ptr = offset;
        let mut worst = 0;
        for _i in 0..declared {
            let footprint = self.parse_sector(data,ptr,&mut track,result);
            if footprint < 0 {
                // skip the rest of this track, keep what was decoded
                worst = 1;
                break;
            }
            ptr += footprint as usize;
        }
        let (c,h) = track.major_ch();
        track.track_num = c;
        track.side_num = h;
        track.compute_interleave();
        if !disk.add_track(track,offset as u32) {
            return result.fatal(Error::DuplicateTrack,&format!("slot {}",offset_pos));
        }
        worst
    }
    /// Read one disk block.  On success returns the disk, the bytes
    /// consumed, and the worst per-track status; on fatal error the partial
    /// disk is discarded.
    fn parse_disk(&self,data: &[u8],base: usize,result: &mut DiskResult) -> Result<(Disk,usize,i32),i32> {
        if base + HEADER_SIZE > data.len() {
            return Err(result.fatal(Error::DiskTooSmall,"stream smaller than D88 header"));
        }
        let header = &data[base..base+HEADER_SIZE];
        let name_end = header[0..NAME_LEN-1].iter().position(|b| *b==0).unwrap_or(NAME_LEN-1);
        let name = String::from_utf8_lossy(&header[0..name_end]).to_string();
        let density = match DiskDensity::from_byte(header[0x1b]) {
            Some(d) => d,
            None => {
                return Err(result.fatal(Error::DiskHeader,&format!("disk type {:#04x}",header[0x1b])));
            }
        };
        let declared_size = u32::from_le_bytes([header[0x1c],header[0x1d],header[0x1e],header[0x1f]]) as usize;
        if base + declared_size > data.len() {
            return Err(result.fatal(Error::DiskTooSmall,&format!("declared size {} exceeds stream",declared_size)));
        }
        let mut disk = Disk::new(&name,density);
        disk.write_protected = header[0x1a]==WRITE_PROTECT;
        let mut worst = 0;
        let mut last_offset = 0usize;
        for pos in 0..MAX_TRACKS {
            let off = u32::from_le_bytes([
                header[0x20+pos*4],header[0x21+pos*4],header[0x22+pos*4],header[0x23+pos*4]
            ]) as usize;
            if off==0 {
                continue; // unused or deleted slot
            }
            if off <= last_offset || off < HEADER_SIZE {
                return Err(result.fatal(Error::OverflowOffset,&format!("offset table not increasing at slot {}",pos)));
            }
            if base + off >= base + declared_size {
                return Err(result.fatal(Error::OverflowOffset,&format!("slot {} offset {:#x} outside disk block",pos,off)));
            }
            last_offset = off;
            let status = self.parse_track(data,pos,base+off,&mut disk,result);
            if status < 0 {
                return Err(status);
            }
            worst = worst.max(status);
        }
        if disk.track_count()==0 {
            return Err(result.fatal(Error::NoTrack,"no tracks in disk block"));
        }
        debug!("D88 disk '{}' {} tracks, {} bytes",disk.name,disk.track_count(),disk.byte_size());
        Ok((disk,declared_size.max(HEADER_SIZE),worst))
    }
}

impl ImageParser for D88Parser {
    fn name(&self) -> &'static str {
        "d88"
    }
    fn file_extensions(&self) -> Vec<String> {
        file_extensions()
    }
    fn check(&self,data: &[u8],_hints: &mut TypeHints,result: &mut DiskResult) -> i32 {
        if data.len() < HEADER_SIZE {
            return -1;
        }
        if DiskDensity::from_byte(data[0x1b]).is_none() {
            return -1;
        }
        let declared = u32::from_le_bytes([data[0x1c],data[0x1d],data[0x1e],data[0x1f]]) as usize;
        if declared < HEADER_SIZE || declared > data.len() {
            return -1;
        }
        // offsets must be zero or strictly increasing and inside the block
        let mut last = 0usize;
        for pos in 0..MAX_TRACKS {
            let off = u32::from_le_bytes([
                data[0x20+pos*4],data[0x21+pos*4],data[0x22+pos*4],data[0x23+pos*4]
            ]) as usize;
            if off==0 {
                continue;
            }
            if off <= last || off < HEADER_SIZE || off >= declared {
                return -1;
            }
            last = off;
        }
        let _ = result;
        0
    }
    fn parse(&self,data: &[u8],_hints: &TypeHints,file: &mut DiskImageFile,result: &mut DiskResult) -> i32 {
        let mut ptr = 0;
        let mut worst = 0;
        let mut parsed = 0;
        while ptr < data.len() {
            match self.parse_disk(data,ptr,result) {
                Ok((disk,consumed,status)) => {
                    file.add_disk(disk);
                    parsed += 1;
                    ptr += consumed;
                    worst = worst.max(status);
                },
                Err(status) => {
                    if parsed==0 {
                        return status;
                    }
                    // later disks in a concatenated set are best effort
                    warn!("trailing data after disk {} could not be parsed",parsed);
                    worst = 1;
                    break;
                }
            }
        }
        worst
    }
    fn to_bytes(&self,disk: &Disk) -> Option<Vec<u8>> {
        let mut header = vec![0u8;HEADER_SIZE];
        let name_bytes = disk.name.as_bytes();
        let copy_len = name_bytes.len().min(NAME_LEN-1);
        header[0..copy_len].copy_from_slice(&name_bytes[0..copy_len]);
        header[0x1a] = match disk.write_protected { true => WRITE_PROTECT, false => 0 };
        header[0x1b] = disk.density.to_byte();
        let mut body: Vec<u8> = Vec::new();
        for trk in disk.tracks() {
            let offset = (HEADER_SIZE + body.len()) as u32;
            let pos = trk.offset_pos;
            if pos >= MAX_TRACKS {
                warn!("track slot {} dropped on write",pos);
                continue;
            }
            header[0x20+pos*4..0x24+pos*4].copy_from_slice(&u32::to_le_bytes(offset));
            let count = trk.sector_count() as u16;
            for sec in trk.sectors() {
                let mut block = vec![0u8;SECTOR_HEADER_SIZE];
                block[0..4].copy_from_slice(&sec.chrn());
                block[4..6].copy_from_slice(&u16::to_le_bytes(count));
                block[6] = match sec.single_density { true => DENSITY_FM, false => 0 };
                block[7] = match sec.deleted { true => DELETED_MARK, false => 0 };
                block[8] = sec.status;
                block[14..16].copy_from_slice(&u16::to_le_bytes(sec.size() as u16));
                body.append(&mut block);
                body.extend_from_slice(sec.data());
            }
        }
        let total = (HEADER_SIZE + body.len()) as u32;
        header[0x1c..0x20].copy_from_slice(&u32::to_le_bytes(total));
        let mut ans = header;
        ans.append(&mut body);
        Some(ans)
    }
}
