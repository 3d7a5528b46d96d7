//! ## Allocation groups
//!
//! A `GroupItem` is one allocation extent, the common currency every
//! variant's FAT chain is expressed in.  `calc_disk_free_size` rebuilds a
//! per-group `FatAvail` classification array by cross referencing live
//! directory chains against the raw table contents.

use std::fmt;

/// availability of one allocation group
#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum FatAvail {
    Free,
    Used,
    /// used and terminal for its chain
    UsedLast,
    System,
    /// group is out of the addressable range
    Missing,
    /// unreferenced but unavailable, sequential formats never reclaim gaps
    Leak
}

impl fmt::Display for FatAvail {
    fn fmt(&self,f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Free => write!(f,"free"),
            Self::Used => write!(f,"used"),
            Self::UsedLast => write!(f,"last"),
            Self::System => write!(f,"system"),
            Self::Missing => write!(f,"missing"),
            Self::Leak => write!(f,"leak")
        }
    }
}

/// one allocation extent of a file
#[derive(Clone,Debug,PartialEq,Eq)]
pub struct GroupItem {
    pub group: usize,
    /// FAT link leaving this group, terminal codes included
    pub next: usize,
    pub track: u8,
    pub side: u8,
    pub sector_start: u8,
    pub sector_end: u8,
    pub size: usize,
    /// sub-unit index for formats that split one file into units
    pub division: usize
}

impl GroupItem {
    pub fn new(group: usize,next: usize,track: u8,side: u8,sector_start: u8,sector_end: u8,size: usize) -> Self {
        Self { group, next, track, side, sector_start, sector_end, size, division: 0 }
    }
}

/// ordered extents of one file
#[derive(Clone,Debug,Default)]
pub struct GroupList {
    items: Vec<GroupItem>
}

impl GroupList {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }
    pub fn push(&mut self,item: GroupItem) {
        self.items.push(item);
    }
    pub fn len(&self) -> usize {
        self.items.len()
    }
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
    pub fn items(&self) -> &[GroupItem] {
        &self.items
    }
    pub fn clear(&mut self) {
        self.items.clear();
    }
    pub fn total_size(&self) -> usize {
        self.items.iter().map(|g| g.size).sum()
    }
    pub fn contains_group(&self,group: usize) -> bool {
        self.items.iter().any(|g| g.group==group)
    }
    pub fn first_group(&self) -> Option<usize> {
        self.items.first().map(|g| g.group)
    }
    pub fn last_group(&self) -> Option<usize> {
        self.items.last().map(|g| g.group)
    }
}
