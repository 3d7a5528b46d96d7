//! ## Support for plain sector dumps
//!
//! A plain image is nothing but the sector payloads in ascending track,
//! side, sector order.  There is no header, so `check` has to propose a
//! geometry: first by matching the file size against the template table in
//! `names`, then by arithmetic factorization of the size.  When more than
//! one candidate survives the caller must pick one (`TypeHints::chosen`)
//! before `parse` will proceed.

use log::{debug,trace};
use crate::img::{codec,names,Disk,DiskImageFile,DiskParam,DiskResult,Error,ImageParser,Sector,Track,TypeHints};
use crate::img::model::DiskDensity;

pub fn file_extensions() -> Vec<String> {
    vec!["dsk".to_string(),"img".to_string(),"ima".to_string(),"flp".to_string(),
        "1dd".to_string(),"2d".to_string(),"2dd".to_string(),"2hd".to_string()]
}

pub struct PlainParser;

impl PlainParser {
    /// Propose geometries whose raw size equals `len` by brute factoring.
    /// Template matches are preferred and come first.
    fn factor_candidates(len: usize) -> Vec<DiskParam> {
        let mut ans = names::size_matches(len);
        for sector_size in names::SECTOR_SIZES {
            for sides in 1..=2usize {
                for sectors in 8..=26usize {
                    let track_bytes = sides*sectors*sector_size;
                    if track_bytes==0 || len%track_bytes != 0 {
                        continue;
                    }
                    let tracks = len/track_bytes;
                    if tracks < 35 || tracks > 85 {
                        continue;
                    }
                    let density = match len {
                        l if l > 1_000_000 => DiskDensity::D2HD,
                        l if l > 500_000 => DiskDensity::D2DD,
                        _ => DiskDensity::D2
                    };
                    let cand = DiskParam::new("factored",tracks,sides,sectors,sector_size,density);
                    if !ans.iter().any(|p| p.tracks==tracks && p.sides==sides && p.sectors==sectors && p.sector_size==sector_size) {
                        ans.push(cand);
                    }
                }
            }
        }
        ans
    }
}

impl ImageParser for PlainParser {
    fn name(&self) -> &'static str {
        "plain"
    }
    fn file_extensions(&self) -> Vec<String> {
        file_extensions()
    }
    fn check(&self,data: &[u8],hints: &mut TypeHints,result: &mut DiskResult) -> i32 {
        if let Some(chosen) = &hints.chosen {
            if chosen.disk_size()==data.len() {
                return 0;
            }
            return result.fatal(Error::InvalidDisk,
                &format!("requested geometry needs {} bytes, stream has {}",chosen.disk_size(),data.len()));
        }
        let candidates = Self::factor_candidates(data.len());
        if candidates.len()==0 {
            return -1;
        }
        debug!("{} geometry candidates for {} bytes",candidates.len(),data.len());
        hints.params = candidates;
        match hints.params.len() {
            1 => 0,
            _ => 1 // manual parameter selection required
        }
    }
    fn parse(&self,data: &[u8],hints: &TypeHints,file: &mut DiskImageFile,result: &mut DiskResult) -> i32 {
        let param = match hints.resolved() {
            Some(p) => p.clone(),
            None => return result.fatal(Error::InvalidDisk,"no geometry selected for plain image")
        };
        if param.disk_size() != data.len() {
            return result.fatal(Error::DiskTooSmall,
                &format!("geometry needs {} bytes, stream has {}",param.disk_size(),data.len()));
        }
        let mut disk = Disk::new(&param.name,param.density);
        let track_bytes = param.sectors*param.sector_size;
        for cyl in 0..param.tracks {
            for side in 0..param.sides {
                let idx = cyl*param.sides + side;
                // slot layout is cylinder major with alternating sides, a
                // single sided disk leaves the odd slots empty
                let pos = cyl*2 + side;
                let mut track = Track::new(cyl as u8,side as u8,pos);
                track.interleave = param.interleave;
                let order = codec::sector_numbers_for_interleave(param.interleave,param.sectors,1);
                for r in order {
                    // payloads are stored in ascending logical order
                    let src = (idx*param.sectors + (r-1)) * param.sector_size;
                    let mut sec = Sector::new(cyl as u8,side as u8,r as u8,param.size_code(),
                        data[src..src+param.sector_size].to_vec());
                    sec.single_density = param.sector_size==128;
                    track.add_sector(sec);
                }
                trace!("track {} side {} assembled",cyl,side);
                if !disk.add_track(track,(idx*track_bytes) as u32 + 1) {
                    return result.fatal(Error::TooManyTracks,&format!("slot {}",pos));
                }
            }
        }
        file.add_disk(disk);
        0
    }
    fn to_bytes(&self,disk: &Disk) -> Option<Vec<u8>> {
        // regenerate ascending logical order regardless of physical layout
        let mut ans: Vec<u8> = Vec::new();
        for trk in disk.tracks() {
            let mut numbers: Vec<u8> = trk.sectors().iter().map(|s| s.sector_num).collect();
            numbers.sort_unstable();
            for r in numbers {
                ans.extend_from_slice(trk.sector(r)?.data());
            }
        }
        Some(ans)
    }
}
