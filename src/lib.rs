//! # `dbkit` main library
//!
//! This library manipulates vintage floppy disk images and the DISK BASIC
//! style file systems stored on them.  Manipulations can be done at a level
//! as low as raw track bytes, or as high as named files with attributes.
//!
//! ## Architecture
//!
//! Operations are built around two layers:
//! * `img` decodes a disk image container into a canonical track/sector model,
//!   it does not try to interpret a file system
//! * `fs` imposes a DISK BASIC variant on the already decoded sector data
//!
//! Every container parser implements `img::ImageParser`, a two phase
//! `check`/`parse` protocol driven by the `img::DiskParser` facade.  `check`
//! never mutates the target; `parse` populates an `img::Disk` and appends it
//! to an `img::DiskImageFile`.  Errors and warnings are accumulated on a
//! `img::DiskResult` collector rather than thrown; the worst status code is
//! propagated upward while sibling units continue to be processed.
//!
//! When a `fs::DiskBasic` engine is created it takes ownership of some
//! `img::Disk` and binds it to a `fs::param::BasicParam` describing the
//! file system variant.  Directory entries are interpreted through a
//! per-variant capability table, so one scan loop serves every variant.
//!
//! ## Disk Images
//!
//! As of this writing `dbkit` reads
//! * D88, Plain/raw (both also write back)
//! * CPC DSK, Teledisk TD0, ImageDisk IMD, CopyQM
//! * TRS-80 DMK and JV3
//! * HxC HFE (MFM/FM bit streams), Commodore G64 (GCR)
//! * DSKSTR compressed streams
//! * Apple 2MG and Disk Copy 4.2
//! * DIFC.X DIM, Anex86 FDI, Virtual98 FDD
//!
//! ## File Systems
//!
//! The `fs` module understands N88-BASIC, L3/F-BASIC, Hu-BASIC (X1), MZ,
//! FLEX, OS-9, CP/M, FP, MS-DOS FAT12, MSX-DOS, DOS80, S-DOS, Commodore 1541,
//! Apple DOS 3.3, ProDOS and TRSDOS directory variants.

pub mod img;
pub mod fs;

use log::{info,warn};
use img::{DiskImageFile,DiskResult,TypeHints};

pub type DYNERR = Box<dyn std::error::Error>;
pub type STDRESULT = Result<(),Box<dyn std::error::Error>>;

const KNOWN_FILE_EXTENSIONS: &str = "d88,d77,d68,98d,d8u,1dd,2d,2dd,2hd,dsk,img,ima,flp,td0,imd,dmk,jv3,hfe,g64,2mg,2img,dc42,image,cqm,dim,fdi,fdd,vfd,str,dskstr";

/// Read a disk image from a bytestream into a new container.
/// Optional `maybe_ext` restricts the parsers that are tried based on file extension.
/// Geometry of headerless images is resolved against the built-in template table.
pub fn create_img_from_bytestream(data: &[u8],maybe_ext: Option<&str>) -> Result<DiskImageFile,DYNERR> {
    let mut file = DiskImageFile::new();
    let mut hints = TypeHints::with_ext(maybe_ext);
    let mut result = DiskResult::new();
    let parser = img::DiskParser::new();
    match parser.parse(data,&mut hints,&mut file,&mut result) {
        s if s < 0 => {
            warn!("cannot match any image format");
            Err(Box::new(img::Error::Unsupported))
        },
        s => {
            if s > 0 {
                for msg in result.messages() {
                    warn!("{}",msg);
                }
            }
            Ok(file)
        }
    }
}

/// Calls `create_img_from_bytestream` getting the bytes from a file.
/// File extension will be used to restrict parsers that are tried,
/// unless the extension is unknown, in which case all will be tried.
pub fn create_img_from_file(img_path: &str) -> Result<DiskImageFile,DYNERR> {
    match std::fs::read(img_path) {
        Ok(data) => {
            let mut maybe_ext = img_path.split('.').last();
            if let Some(ext) = maybe_ext {
                if !KNOWN_FILE_EXTENSIONS.contains(&ext.to_lowercase()) {
                    maybe_ext = None;
                }
            }
            create_img_from_bytestream(&data,maybe_ext)
        },
        Err(e) => Err(Box::new(e))
    }
}

/// Return a DISK BASIC engine attached to disk `disk_num` of the container,
/// or an error if no catalog entry matches the disk.  The engine takes
/// ownership of the disk; use `fs::DiskBasic::into_disk` to get it back.
pub fn open_basic(mut file: DiskImageFile,disk_num: usize,catalog: &fs::param::BasicCatalog) -> Result<fs::DiskBasic,DYNERR> {
    let disk = match file.remove_disk(disk_num) {
        Some(d) => d,
        None => return Err(Box::new(img::Error::NoDisk))
    };
    match fs::DiskBasic::open(disk,catalog) {
        Ok(basic) => {
            info!("identified {} file system",basic.param().kind);
            Ok(basic)
        },
        Err(e) => Err(e)
    }
}
