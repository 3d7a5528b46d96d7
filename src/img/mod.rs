//! # Disk Image Module
//!
//! Disk image containers are decoded into one canonical in-memory model,
//! `DiskImageFile` -> `Disk` -> `Track` -> `Sector`, found in `model`.
//! Every container format gets a submodule with a unit struct implementing
//! the `ImageParser` trait.  The `DiskParser` facade owns the registered
//! parsers and drives the two phase `check`/`parse` protocol.
//!
//! ## Check and Parse
//!
//! `check` is a cheap pass that reads header bytes and validates magic
//! numbers and structural invariants without mutating the target container.
//! For formats without embedded geometry (plain images) it proposes one or
//! more plausible `DiskParam` candidates by matching the file size against
//! the template table in `names`, or failing that by factoring the size.
//! `parse` may only be called with a parameter that `check` accepted, or a
//! manual override placed in `TypeHints::chosen`.
//!
//! ## Error Accumulation
//!
//! Parsers never panic on bad data and never throw.  Problems are pushed
//! onto a caller supplied `DiskResult` with a coded kind, and the signed
//! status code is propagated upward: `<0` fatal, `0` ok, `>0` ok with
//! warnings.  A fatal error abandons only the disk under construction;
//! warnings zero-fill or truncate the affected unit and continue, so one
//! corrupt sector does not prevent parsing the rest of the disk.

pub mod model;
pub mod codec;
pub mod names;
pub mod d88;
pub mod plain;
pub mod dsk;
pub mod td0;
pub mod imd;
pub mod dmk;
pub mod jv3;
pub mod hfe;
pub mod g64;
pub mod dskstr;
pub mod dot2mg;
pub mod dc42;
pub mod cqm;
pub mod dim;
pub mod fdi;
pub mod vfd;

use std::fmt;
use log::{debug,info};
pub use model::{Sector,Track,Disk,DiskImageFile,DiskDensity,ParseMode};

/// Enumerates container level errors.  The `Display` trait will print the
/// equivalent long message.  These are the kinds carried by `DiskResult`.
#[derive(thiserror::Error,Debug,Clone,Copy,PartialEq,Eq)]
pub enum Error {
    #[error("no data in stream")]
    NoData,
    #[error("no disk in container")]
    NoDisk,
    #[error("track not found")]
    NoTrack,
    #[error("disk structure is invalid")]
    InvalidDisk,
    #[error("stream is smaller than the header requires")]
    DiskTooSmall,
    #[error("stream is larger than the format allows")]
    DiskTooLarge,
    #[error("bad field in disk header")]
    DiskHeader,
    #[error("track offset table capacity exceeded")]
    OverflowOffset,
    #[error("declared size overflows the stream")]
    OverflowSize,
    #[error("track id field inconsistent with position")]
    IdTrack,
    #[error("side id field inconsistent with position")]
    IdSide,
    #[error("sector id field out of range")]
    IdSector,
    #[error("sector size in header out of range")]
    SectorSizeHeader,
    #[error("sector size in sector out of range")]
    SectorSizeSector,
    #[error("duplicate track")]
    DuplicateTrack,
    #[error("duplicate sector")]
    DuplicateSector,
    #[error("sector not found")]
    NoSector,
    #[error("too many tracks")]
    TooManyTracks,
    #[error("too many sectors")]
    TooManySectors,
    #[error("unsupported variant of this container")]
    UnsupportedType,
    #[error("no parser registered for this stream")]
    Unsupported
}

/// Single-writer append-only error log threaded through a parse.
/// Callers clear it before starting a new top-level operation.
pub struct DiskResult {
    fatals: usize,
    warnings: usize,
    list: Vec<(Error,String)>
}

impl DiskResult {
    pub fn new() -> Self {
        Self { fatals: 0, warnings: 0, list: Vec::new() }
    }
    pub fn clear(&mut self) {
        self.fatals = 0;
        self.warnings = 0;
        self.list.clear();
    }
    /// record a fatal error and return the fatal status code
    pub fn fatal(&mut self,kind: Error,detail: &str) -> i32 {
        debug!("fatal: {} ({})",kind,detail);
        self.fatals += 1;
        self.list.push((kind,detail.to_string()));
        -1
    }
    /// record a recoverable problem and return the warning status code
    pub fn warning(&mut self,kind: Error,detail: &str) -> i32 {
        debug!("warning: {} ({})",kind,detail);
        self.warnings += 1;
        self.list.push((kind,detail.to_string()));
        1
    }
    /// worst status accumulated so far: -1 fatal, 1 warnings, 0 clean
    pub fn status(&self) -> i32 {
        if self.fatals > 0 {
            -1
        } else if self.warnings > 0 {
            1
        } else {
            0
        }
    }
    pub fn contains(&self,kind: Error) -> bool {
        self.list.iter().any(|(k,_)| *k==kind)
    }
    pub fn messages(&self) -> Vec<String> {
        self.list.iter().map(|(k,d)| match d.len() {
            0 => format!("{}",k),
            _ => format!("{}: {}",k,d)
        }).collect()
    }
    pub fn len(&self) -> usize {
        self.list.len()
    }
}

impl fmt::Display for DiskResult {
    fn fmt(&self,f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for msg in self.messages() {
            writeln!(f,"{}",msg)?;
        }
        Ok(())
    }
}

/// Geometry and encoding parameters for one disk.  Parsers of headerless
/// formats receive this from `check`; parsers of self-describing formats
/// fill it in as they go.
#[derive(Clone,Debug,PartialEq,Eq)]
pub struct DiskParam {
    pub name: String,
    /// tracks per side
    pub tracks: usize,
    pub sides: usize,
    /// sectors per track
    pub sectors: usize,
    pub sector_size: usize,
    pub interleave: usize,
    pub density: DiskDensity
}

impl DiskParam {
    pub fn new(name: &str,tracks: usize,sides: usize,sectors: usize,sector_size: usize,density: DiskDensity) -> Self {
        Self {
            name: name.to_string(),
            tracks,
            sides,
            sectors,
            sector_size,
            interleave: 1,
            density
        }
    }
    /// total byte size of a raw dump with this geometry
    pub fn disk_size(&self) -> usize {
        self.tracks * self.sides * self.sectors * self.sector_size
    }
    /// N field exponent for the sector size, sizes that are not
    /// powers of two round down
    pub fn size_code(&self) -> u8 {
        let mut code = 0;
        let mut size = self.sector_size;
        while size > 128 {
            size >>= 1;
            code += 1;
        }
        code
    }
}

impl fmt::Display for DiskParam {
    fn fmt(&self,f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f,"{} {}/{}/{}/{}",self.name,self.tracks,self.sides,self.sectors,self.sector_size)
    }
}

/// Hints passed through the facade into `check`.  The explicit format name
/// takes precedence over the extension; candidate parameters proposed by
/// `check` come back in `params`, and a manual selection goes in `chosen`.
pub struct TypeHints {
    pub ext: Option<String>,
    pub format_name: Option<String>,
    pub params: Vec<DiskParam>,
    pub chosen: Option<DiskParam>
}

impl TypeHints {
    pub fn new() -> Self {
        Self { ext: None, format_name: None, params: Vec::new(), chosen: None }
    }
    pub fn with_ext(maybe_ext: Option<&str>) -> Self {
        Self {
            ext: maybe_ext.map(|e| e.to_lowercase()),
            format_name: None,
            params: Vec::new(),
            chosen: None
        }
    }
    /// the parameter `parse` should use: manual choice first, then the
    /// unique candidate from `check`
    pub fn resolved(&self) -> Option<&DiskParam> {
        match &self.chosen {
            Some(p) => Some(p),
            None => match self.params.len() {
                1 => Some(&self.params[0]),
                _ => None
            }
        }
    }
}

/// Trait for one container format.  `check` must not mutate anything but the
/// hints; `parse` appends to the container only on success.
pub trait ImageParser {
    fn name(&self) -> &'static str;
    fn file_extensions(&self) -> Vec<String>;
    /// Cheap structural test: -1 reject, 0 accept, 1 accept but a manual
    /// parameter selection is required (multiple candidates in hints).
    fn check(&self,data: &[u8],hints: &mut TypeHints,result: &mut DiskResult) -> i32;
    /// Decode the stream and append a `Disk` to the container.
    /// -1 fatal (nothing added), 0 ok, 1 ok with warnings.
    fn parse(&self,data: &[u8],hints: &TypeHints,file: &mut DiskImageFile,result: &mut DiskResult) -> i32;
    /// Serialize a disk back into this container, for formats that write.
    fn to_bytes(&self,_disk: &Disk) -> Option<Vec<u8>> {
        None
    }
}

/// Format dispatch facade.  Selection order is: explicit format-name
/// override, then file extension lookup, then every registered parser.
pub struct DiskParser {
    parsers: Vec<Box<dyn ImageParser>>
}

impl DiskParser {
    pub fn new() -> Self {
        Self {
            parsers: vec![
                Box::new(d88::D88Parser),
                Box::new(dsk::DskParser),
                Box::new(td0::Td0Parser),
                Box::new(imd::ImdParser),
                Box::new(dmk::DmkParser),
                Box::new(jv3::Jv3Parser),
                Box::new(hfe::HfeParser),
                Box::new(g64::G64Parser),
                Box::new(dskstr::DskStrParser),
                Box::new(dot2mg::Dot2mgParser),
                Box::new(dc42::Dc42Parser),
                Box::new(cqm::CqmParser),
                Box::new(dim::DimParser),
                Box::new(fdi::FdiParser),
                Box::new(vfd::VfdParser),
                // plain matches almost any size, it must come last
                Box::new(plain::PlainParser)
            ]
        }
    }
    fn candidates(&self,hints: &TypeHints) -> Vec<&dyn ImageParser> {
        if let Some(name) = &hints.format_name {
            return self.parsers.iter()
                .filter(|p| p.name()==name)
                .map(|p| p.as_ref())
                .collect();
        }
        if let Some(ext) = &hints.ext {
            let by_ext: Vec<&dyn ImageParser> = self.parsers.iter()
                .filter(|p| p.file_extensions().contains(ext))
                .map(|p| p.as_ref())
                .collect();
            if by_ext.len() > 0 {
                return by_ext;
            }
        }
        self.parsers.iter().map(|p| p.as_ref()).collect()
    }
    /// Run `check` over the candidate parsers.  On acceptance the hints
    /// carry the accepted parser name and any parameter candidates.
    pub fn check(&self,data: &[u8],hints: &mut TypeHints,result: &mut DiskResult) -> i32 {
        if data.len()==0 {
            return result.fatal(Error::NoData,"empty stream");
        }
        for parser in self.candidates(hints) {
            let status = parser.check(data,hints,result);
            if status >= 0 {
                info!("identified {} image",parser.name());
                hints.format_name = Some(parser.name().to_string());
                return status;
            }
        }
        result.fatal(Error::Unsupported,"no parser accepted the stream")
    }
    /// Run `check` then `parse` with the first parser that accepts.
    pub fn parse(&self,data: &[u8],hints: &mut TypeHints,file: &mut DiskImageFile,result: &mut DiskResult) -> i32 {
        if data.len()==0 {
            return result.fatal(Error::NoData,"empty stream");
        }
        file.begin_parse();
        for parser in self.candidates(hints) {
            let checked = parser.check(data,hints,result);
            if checked < 0 {
                continue;
            }
            if checked > 0 && hints.chosen.is_none() {
                // multiple geometry candidates and no manual selection
                return 1;
            }
            info!("parsing as {}",parser.name());
            let status = parser.parse(data,hints,file,result);
            if status >= 0 {
                hints.format_name = Some(parser.name().to_string());
                return status;
            }
        }
        result.fatal(Error::Unsupported,"no parser accepted the stream")
    }
    /// Look up a registered parser that can serialize this disk.
    pub fn serialize(&self,format_name: &str,disk: &Disk) -> Option<Vec<u8>> {
        for parser in &self.parsers {
            if parser.name()==format_name {
                return parser.to_bytes(disk);
            }
        }
        None
    }
}
