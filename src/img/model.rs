//! ## Canonical disk model
//!
//! All parsers populate, and all consumers read, the same in-memory
//! representation: `DiskImageFile` owns `Disk`s, a `Disk` owns `Track`s in
//! offset-slot order, a `Track` owns `Sector`s in physical read order.
//! Interleave is explicit: the track records the stride that reproduces the
//! physical order from ascending sector numbers.  The disk keeps a D88 style
//! offset table whose unused slots are zero.
//!
//! The model owns every byte buffer outright.  The file system layer refers
//! to sector bytes by locator, never by pointer, so a directory entry can
//! outlive nothing it does not own.

use std::fmt;
use log::{trace,warn};
use crate::img::codec;

/// historical maximum of the D88 offset table
pub const MAX_TRACKS: usize = 164;

#[derive(Clone,Copy,PartialEq,Eq,Debug)]
pub enum DiskDensity {
    /// single sided or double sided double density, 40 track class
    D2,
    /// double density, 80 track class
    D2DD,
    /// high density
    D2HD
}

impl DiskDensity {
    pub fn to_byte(&self) -> u8 {
        match self {
            Self::D2 => 0x00,
            Self::D2DD => 0x10,
            Self::D2HD => 0x20
        }
    }
    pub fn from_byte(val: u8) -> Option<Self> {
        match val {
            0x00 => Some(Self::D2),
            0x10 => Some(Self::D2DD),
            0x20 => Some(Self::D2HD),
            _ => None
        }
    }
}

impl fmt::Display for DiskDensity {
    fn fmt(&self,f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::D2 => write!(f,"2D"),
            Self::D2DD => write!(f,"2DD"),
            Self::D2HD => write!(f,"2HD")
        }
    }
}

/// One sector with its id tuple and payload.  The id fields are recorded as
/// found in the source container, which on malformed dumps may disagree with
/// the geometric position.
pub struct Sector {
    /// C,H,R,N as encoded in the address field
    pub track_num: u8,
    pub side_num: u8,
    pub sector_num: u8,
    pub size_code: u8,
    /// sequence position within the track, physical read order
    pub position: usize,
    pub single_density: bool,
    pub deleted: bool,
    /// status byte from containers that store one (e.g. D88)
    pub status: u8,
    /// CRC recorded by the source container, when it stores one
    pub recorded_crc: Option<u16>,
    modified: bool,
    data: Vec<u8>
}

impl Sector {
    pub fn new(track_num: u8,side_num: u8,sector_num: u8,size_code: u8,data: Vec<u8>) -> Self {
        Self {
            track_num,
            side_num,
            sector_num,
            size_code,
            position: 0,
            single_density: false,
            deleted: false,
            status: 0,
            recorded_crc: None,
            modified: false,
            data
        }
    }
    /// id tuple in address field order
    pub fn chrn(&self) -> [u8;4] {
        [self.track_num,self.side_num,self.sector_num,self.size_code]
    }
    pub fn size(&self) -> usize {
        self.data.len()
    }
    pub fn data(&self) -> &[u8] {
        &self.data
    }
    /// mutable access marks the sector dirty for save-back
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.modified = true;
        &mut self.data
    }
    pub fn is_modified(&self) -> bool {
        self.modified
    }
    pub fn clear_modified(&mut self) {
        self.modified = false;
    }
    /// byte size implied by the N field
    pub fn size_from_code(code: u8) -> usize {
        128 << code as usize
    }
}

/// One track: an ordered run of sectors in physical layout order.
pub struct Track {
    pub track_num: u8,
    pub side_num: u8,
    /// index into the disk's offset table
    pub offset_pos: usize,
    /// stride reproducing physical order from ascending sector numbers
    pub interleave: usize,
    sectors: Vec<Sector>
}

impl Track {
    pub fn new(track_num: u8,side_num: u8,offset_pos: usize) -> Self {
        Self {
            track_num,
            side_num,
            offset_pos,
            interleave: 1,
            sectors: Vec::new()
        }
    }
    pub fn add_sector(&mut self,mut sector: Sector) {
        sector.position = self.sectors.len();
        self.sectors.push(sector);
    }
    pub fn sector_count(&self) -> usize {
        self.sectors.len()
    }
    pub fn sectors(&self) -> &[Sector] {
        &self.sectors
    }
    pub fn sectors_mut(&mut self) -> &mut [Sector] {
        &mut self.sectors
    }
    /// find by R field, the first match wins
    pub fn sector(&self,sector_num: u8) -> Option<&Sector> {
        self.sectors.iter().find(|s| s.sector_num==sector_num)
    }
    pub fn sector_mut(&mut self,sector_num: u8) -> Option<&mut Sector> {
        self.sectors.iter_mut().find(|s| s.sector_num==sector_num)
    }
    /// total payload bytes on the track
    pub fn byte_size(&self) -> usize {
        self.sectors.iter().map(|s| s.size()).sum()
    }
    /// C,H decided by majority vote across contained sectors, used to
    /// tolerate malformed dumps with a stray id field
    pub fn major_ch(&self) -> (u8,u8) {
        (Self::majority(self.sectors.iter().map(|s| s.track_num),self.track_num),
         Self::majority(self.sectors.iter().map(|s| s.side_num),self.side_num))
    }
    fn majority(vals: impl Iterator<Item=u8>,fallback: u8) -> u8 {
        let mut counts = std::collections::HashMap::new();
        for v in vals {
            *counts.entry(v).or_insert(0usize) += 1;
        }
        counts.into_iter().max_by_key(|(_,n)| *n).map(|(v,_)| v).unwrap_or(fallback)
    }
    /// Diff the physical read order against ascending sector numbers and
    /// store the minimal stride that reproduces it.
    pub fn compute_interleave(&mut self) {
        let observed: Vec<usize> = self.sectors.iter().map(|s| s.sector_num as usize).collect();
        self.interleave = codec::detect_interleave(&observed);
        trace!("track {} side {} interleave {}",self.track_num,self.side_num,self.interleave);
    }
}

/// One disk: tracks in offset-slot order plus the offset table itself.
/// Invariant: live offsets are strictly increasing and an unused slot is 0.
pub struct Disk {
    pub name: String,
    pub write_protected: bool,
    pub density: DiskDensity,
    offsets: Vec<u32>,
    tracks: Vec<Track>,
    modified: bool
}

impl Disk {
    pub fn new(name: &str,density: DiskDensity) -> Self {
        Self {
            name: name.to_string(),
            write_protected: false,
            density,
            offsets: vec![0;MAX_TRACKS],
            tracks: Vec::new(),
            modified: false
        }
    }
    /// Append a track and register its container byte offset.
    /// Returns false when the slot is out of range or already occupied.
    pub fn add_track(&mut self,track: Track,offset: u32) -> bool {
        let pos = track.offset_pos;
        if pos >= self.offsets.len() {
            warn!("track slot {} exceeds offset table",pos);
            return false;
        }
        if self.offsets[pos] != 0 {
            warn!("track slot {} already occupied",pos);
            return false;
        }
        self.offsets[pos] = offset;
        self.tracks.push(track);
        true
    }
    pub fn offset(&self,pos: usize) -> u32 {
        match pos < self.offsets.len() {
            true => self.offsets[pos],
            false => 0
        }
    }
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }
    pub fn tracks_mut(&mut self) -> &mut [Track] {
        &mut self.tracks
    }
    /// find by geometric C,H using the majority-vote id
    pub fn track(&self,track_num: u8,side_num: u8) -> Option<&Track> {
        self.tracks.iter().find(|t| t.major_ch()==(track_num,side_num))
    }
    pub fn track_mut(&mut self,track_num: u8,side_num: u8) -> Option<&mut Track> {
        self.tracks.iter_mut().find(|t| t.major_ch()==(track_num,side_num))
    }
    /// read one sector's payload by geometric C,H,R
    pub fn sector_data(&self,track_num: u8,side_num: u8,sector_num: u8) -> Option<&[u8]> {
        self.track(track_num,side_num)?.sector(sector_num).map(|s| s.data())
    }
    pub fn sector_data_mut(&mut self,track_num: u8,side_num: u8,sector_num: u8) -> Option<&mut [u8]> {
        self.modified = true;
        self.track_mut(track_num,side_num)?.sector_mut(sector_num).map(|s| s.data_mut())
    }
    pub fn is_modified(&self) -> bool {
        self.modified || self.tracks.iter().any(|t| t.sectors().iter().any(|s| s.is_modified()))
    }
    pub fn set_modified(&mut self,val: bool) {
        self.modified = val;
        if !val {
            for trk in &mut self.tracks {
                for sec in trk.sectors_mut() {
                    sec.clear_modified();
                }
            }
        }
    }
    /// total payload bytes on the disk
    pub fn byte_size(&self) -> usize {
        self.tracks.iter().map(|t| t.byte_size()).sum()
    }
    /// Verify the offset-table invariant: live offsets strictly increasing.
    pub fn offsets_valid(&self) -> bool {
        let mut last = 0u32;
        for off in &self.offsets {
            if *off==0 {
                continue;
            }
            if *off <= last {
                return false;
            }
            last = *off;
        }
        true
    }
}

/// Whether a parse replaces the container contents or appends to them.
#[derive(Clone,Copy,PartialEq,Eq)]
pub enum ParseMode {
    New,
    Append
}

/// Multi-disk container.
pub struct DiskImageFile {
    disks: Vec<Disk>,
    pub mode: ParseMode
}

impl DiskImageFile {
    pub fn new() -> Self {
        Self { disks: Vec::new(), mode: ParseMode::New }
    }
    pub fn disk_count(&self) -> usize {
        self.disks.len()
    }
    pub fn disk(&self,num: usize) -> Option<&Disk> {
        self.disks.get(num)
    }
    pub fn disk_mut(&mut self,num: usize) -> Option<&mut Disk> {
        self.disks.get_mut(num)
    }
    pub fn add_disk(&mut self,disk: Disk) {
        self.disks.push(disk);
    }
    /// honor the parse mode before a top-level parse:
    /// `New` replaces all content, `Append` adds
    pub fn begin_parse(&mut self) {
        if self.mode==ParseMode::New {
            self.disks.clear();
        }
    }
    pub fn replace_disk(&mut self,num: usize,disk: Disk) -> bool {
        match num < self.disks.len() {
            true => {
                self.disks[num] = disk;
                true
            },
            false => false
        }
    }
    pub fn remove_disk(&mut self,num: usize) -> Option<Disk> {
        match num < self.disks.len() {
            true => Some(self.disks.remove(num)),
            false => None
        }
    }
}
