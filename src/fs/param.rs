//! ## File system parameters and catalog
//!
//! A `BasicParam` describes one DISK BASIC variant: geometry, allocation
//! group size, FAT sentinel codes, directory bounds and named parameters.
//! The `BasicCatalog` resolves a format kind to its parameter set from a
//! built-in table, optionally extended by a JSON document following the
//! same field names.  Directory and FAT positions are logical sector
//! numbers counted from track 0 side 0 sector 1.

use std::collections::BTreeMap;
use std::fmt;
use log::{debug,warn};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use crate::DYNERR;
use crate::fs::attr::FileAttr;

/// byte order of multi-byte FAT entries
#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum Endianness {
    Little,
    Big
}

/// The closed set of implemented DISK BASIC variants.  The numeric values
/// are the catalog's format type numbers.
#[derive(Clone,Copy,Debug,PartialEq,Eq,FromPrimitive)]
pub enum FormatKind {
    Fm = 0,
    N88 = 1,
    X1Hu = 2,
    Mz = 3,
    Flex = 4,
    Os9 = 5,
    Cpm = 6,
    Fp = 7,
    Msdos = 8,
    Msx = 9,
    Dos80 = 10,
    Sdos = 11,
    C1541 = 12,
    AppleDos = 13,
    Prodos = 14,
    Trsdos = 15,
    Frost = 16,
    Magical = 17,
    Mdos = 18,
    Xdos = 19,
    Cdos = 20,
    Tfdos = 21,
    Amiga = 22
}

impl fmt::Display for FormatKind {
    fn fmt(&self,f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fm => write!(f,"F-BASIC"),
            Self::N88 => write!(f,"N88-BASIC"),
            Self::X1Hu => write!(f,"Hu-BASIC"),
            Self::Mz => write!(f,"MZ BASIC"),
            Self::Flex => write!(f,"FLEX"),
            Self::Os9 => write!(f,"OS-9"),
            Self::Cpm => write!(f,"CP/M"),
            Self::Fp => write!(f,"FP-BASIC"),
            Self::Msdos => write!(f,"MS-DOS"),
            Self::Msx => write!(f,"MSX-DOS"),
            Self::Dos80 => write!(f,"DOS80"),
            Self::Sdos => write!(f,"S-DOS"),
            Self::C1541 => write!(f,"C1541"),
            Self::AppleDos => write!(f,"Apple DOS 3.3"),
            Self::Prodos => write!(f,"ProDOS"),
            Self::Trsdos => write!(f,"TRSDOS"),
            Self::Frost => write!(f,"FROST-DOS"),
            Self::Magical => write!(f,"Magical DOS"),
            Self::Mdos => write!(f,"MDOS"),
            Self::Xdos => write!(f,"X-DOS"),
            Self::Cdos => write!(f,"C-DOS"),
            Self::Tfdos => write!(f,"TF-DOS"),
            Self::Amiga => write!(f,"AmigaDOS OFS")
        }
    }
}

/// Parameter set for one variant.  Immutable once handed to the engine.
#[derive(Clone,Debug)]
pub struct BasicParam {
    pub kind: FormatKind,
    pub name: String,
    /// expected geometry, candidates are filtered against the disk model
    pub tracks: usize,
    pub sides: usize,
    pub sectors: usize,
    pub sector_size: usize,
    pub sectors_per_group: usize,
    /// first logical sector of the allocation table
    pub fat_start_lsn: usize,
    pub fat_sectors: usize,
    pub fat_start_group: usize,
    pub fat_end_group: usize,
    /// terminal FAT codes run from `group_final_code` to `group_final_max`,
    /// several formats encode the used sector count in the difference
    pub group_final_code: usize,
    pub group_final_max: usize,
    pub group_system_code: usize,
    pub group_unused_code: usize,
    pub dir_start_lsn: usize,
    /// inclusive
    pub dir_end_lsn: usize,
    pub dir_entry_size: usize,
    /// first sector number on a track, 1 for most formats, 0 for Apple and Commodore
    pub sector_base: u8,
    pub endianness: Endianness,
    pub fill_code: u8,
    pub delete_code: u8,
    pub text_eof_code: Option<u8>,
    pub ints: BTreeMap<String,i64>,
    pub strings: BTreeMap<String,String>
}

impl BasicParam {
    /// logical sector number of (track,side,sector), sectors count from `sector_base`
    pub fn chs_to_lsn(&self,track: u8,side: u8,sector: u8) -> usize {
        (track as usize*self.sides + side as usize)*self.sectors + (sector - self.sector_base) as usize
    }
    pub fn lsn_to_chs(&self,lsn: usize) -> (u8,u8,u8) {
        let track = lsn/(self.sides*self.sectors);
        let side = lsn/self.sectors % self.sides;
        let sector = lsn%self.sectors + self.sector_base as usize;
        (track as u8,side as u8,sector as u8)
    }
    pub fn group_count(&self) -> usize {
        self.fat_end_group + 1 - self.fat_start_group
    }
    pub fn group_size(&self) -> usize {
        self.sectors_per_group*self.sector_size
    }
    pub fn int(&self,key: &str) -> Option<i64> {
        self.ints.get(key).copied()
    }
    pub fn string(&self,key: &str) -> Option<&str> {
        self.strings.get(key).map(|s| s.as_str())
    }
}

fn base_param(kind: FormatKind,name: &str,tracks: usize,sides: usize,sectors: usize,sector_size: usize) -> BasicParam {
    BasicParam {
        kind,
        name: name.to_string(),
        tracks,
        sides,
        sectors,
        sector_size,
        sectors_per_group: 8,
        fat_start_lsn: 0,
        fat_sectors: 1,
        fat_start_group: 0,
        fat_end_group: tracks*sides*sectors/8 - 1,
        group_final_code: 0xc0,
        group_final_max: 0xc8,
        group_system_code: 0xfe,
        group_unused_code: 0xff,
        dir_start_lsn: 0,
        dir_end_lsn: 0,
        dir_entry_size: 32,
        sector_base: 1,
        endianness: Endianness::Little,
        fill_code: 0xff,
        delete_code: 0x00,
        text_eof_code: Some(0x1a),
        ints: BTreeMap::new(),
        strings: BTreeMap::new()
    }
}

/// The built-in parameter table.  One entry per implemented variant, in the
/// same shape an external JSON catalog would supply.
pub fn builtin_params() -> Vec<BasicParam> {
    let mut ans: Vec<BasicParam> = Vec::new();

    // F-BASIC 2D: management track 1, 8 sector groups
    let mut p = base_param(FormatKind::Fm,"F-BASIC 2D",40,2,16,256);
    p.fat_start_lsn = p.chs_to_lsn(1,0,1);
    p.dir_start_lsn = p.chs_to_lsn(1,0,4);
    p.dir_end_lsn = p.chs_to_lsn(1,1,16);
    p.fat_end_group = 151;
    ans.push(p);

    // N88-BASIC 2D: management on track 18 side 1
    let mut p = base_param(FormatKind::N88,"N88-BASIC 2D",40,2,16,256);
    p.fat_start_lsn = p.chs_to_lsn(18,1,14);
    p.fat_sectors = 3;
    p.dir_start_lsn = p.chs_to_lsn(18,1,1);
    p.dir_end_lsn = p.chs_to_lsn(18,1,12);
    p.fat_end_group = 151;
    ans.push(p);

    // Hu-BASIC 2D: whole-track groups, split-halves FAT, terminal code
    // carries the used sector count
    let mut p = base_param(FormatKind::X1Hu,"Hu-BASIC 2D",40,2,16,256);
    p.sectors_per_group = 16;
    p.fat_start_lsn = p.chs_to_lsn(0,0,2);
    p.fat_sectors = 2;
    p.fat_end_group = 79;
    p.group_final_code = 0x80;
    p.group_final_max = 0x8f;
    p.group_system_code = 0xff;
    p.group_unused_code = 0x00;
    p.dir_start_lsn = p.chs_to_lsn(0,0,4);
    p.dir_end_lsn = p.chs_to_lsn(0,0,16);
    p.delete_code = 0x00;
    p.fill_code = 0x00;
    ans.push(p);

    // MZ DISK BASIC 2D: 64 byte entries, 16 bit FAT
    let mut p = base_param(FormatKind::Mz,"MZ BASIC 2D",40,2,16,256);
    p.sectors_per_group = 1;
    p.fat_start_lsn = p.chs_to_lsn(0,0,15);
    p.fat_sectors = 10;
    p.fat_end_group = 40*2*16 - 1;
    p.group_final_code = 0x8000;
    p.group_final_max = 0xffff;
    p.group_unused_code = 0x0000;
    p.group_system_code = 0x7fff;
    p.dir_start_lsn = p.chs_to_lsn(0,0,2);
    p.dir_end_lsn = p.chs_to_lsn(0,0,14);
    p.dir_entry_size = 64;
    p.text_eof_code = Some(0x0d);
    ans.push(p);

    // FLEX 1S: per-sector forward links, no FAT proper
    let mut p = base_param(FormatKind::Flex,"FLEX",40,1,10,256);
    p.sectors_per_group = 1;
    p.fat_start_lsn = p.chs_to_lsn(0,0,3);
    p.fat_end_group = 40*10 - 1;
    p.group_final_code = 0;
    p.group_final_max = 0;
    p.dir_start_lsn = p.chs_to_lsn(0,0,5);
    p.dir_end_lsn = p.chs_to_lsn(0,0,10);
    p.dir_entry_size = 24;
    p.fill_code = 0x00;
    p.text_eof_code = None;
    ans.push(p);

    // OS-9: LSN addressed, allocation bitmap after the id sector
    let mut p = base_param(FormatKind::Os9,"OS-9",40,1,16,256);
    p.sectors_per_group = 1;
    p.fat_start_lsn = 1;
    p.fat_end_group = 40*16 - 1;
    p.group_final_code = 0;
    p.group_final_max = 0;
    p.dir_start_lsn = 2;
    p.dir_end_lsn = 2;
    p.dir_entry_size = 32;
    p.fill_code = 0x00;
    p.text_eof_code = None;
    ans.push(p);

    // CP/M 2D: 2 KiB blocks, directory in the first two blocks
    let mut p = base_param(FormatKind::Cpm,"CP/M 2D",40,2,16,256);
    p.sectors_per_group = 8;
    p.fat_start_lsn = 0;
    p.fat_sectors = 0; // allocation derived from the directory itself
    p.fat_end_group = 155;
    p.group_final_code = 0;
    p.group_final_max = 0;
    p.dir_start_lsn = p.chs_to_lsn(2,0,1);
    p.dir_end_lsn = p.chs_to_lsn(2,0,16);
    p.fill_code = 0xe5;
    p.delete_code = 0xe5;
    p.text_eof_code = Some(0x1a);
    ans.push(p);

    // FP-BASIC 2D
    let mut p = base_param(FormatKind::Fp,"FP-BASIC 2D",40,2,16,256);
    p.fat_start_lsn = p.chs_to_lsn(1,0,1);
    p.dir_start_lsn = p.chs_to_lsn(1,0,2);
    p.dir_end_lsn = p.chs_to_lsn(1,1,16);
    p.fat_end_group = 151;
    p.ints.insert("DefaultStartAddress".to_string(),0x8000);
    p.ints.insert("DefaultExecuteAddress".to_string(),0x8000);
    ans.push(p);

    // MS-DOS FAT12 720K, BPB values confirmed against the boot sector
    let mut p = base_param(FormatKind::Msdos,"MS-DOS FAT12 720K",80,2,9,512);
    p.sectors_per_group = 2;
    p.fat_start_lsn = 1;
    p.fat_sectors = 3;
    p.fat_start_group = 2;
    p.fat_end_group = 356;
    p.group_final_code = 0xff8;
    p.group_final_max = 0xfff;
    p.group_system_code = 0xff7;
    p.group_unused_code = 0x000;
    p.dir_start_lsn = 7;
    p.dir_end_lsn = 13;
    p.fill_code = 0x00;
    p.delete_code = 0xe5;
    ans.push(p);

    // MSX-DOS FAT12 2DD shares the FAT12 mechanics
    let mut p = base_param(FormatKind::Msx,"MSX-DOS FAT12",80,2,9,512);
    p.sectors_per_group = 2;
    p.fat_start_lsn = 1;
    p.fat_sectors = 3;
    p.fat_start_group = 2;
    p.fat_end_group = 356;
    p.group_final_code = 0xff8;
    p.group_final_max = 0xfff;
    p.group_system_code = 0xff7;
    p.group_unused_code = 0x000;
    p.dir_start_lsn = 7;
    p.dir_end_lsn = 13;
    p.fill_code = 0x00;
    p.delete_code = 0xe5;
    ans.push(p);

    // DOS80 1S: hard coded load addresses for BASIC files
    let mut p = base_param(FormatKind::Dos80,"DOS80",35,1,16,256);
    p.sectors_per_group = 1;
    p.fat_start_lsn = p.chs_to_lsn(18,0,1);
    p.fat_end_group = 35*16 - 1;
    p.group_final_code = 0xc0;
    p.group_final_max = 0xff;
    p.dir_start_lsn = p.chs_to_lsn(18,0,2);
    p.dir_end_lsn = p.chs_to_lsn(18,0,16);
    p.dir_entry_size = 16;
    p.ints.insert("DefaultStartAddress".to_string(),0x9000);
    p.ints.insert("DefaultExecuteAddress".to_string(),0x9000);
    ans.push(p);

    // S-DOS 1S: no persisted FAT, sequential watermark allocation
    let mut p = base_param(FormatKind::Sdos,"S-DOS",35,1,16,256);
    p.sectors_per_group = 1;
    p.fat_sectors = 0;
    p.fat_end_group = 35*16 - 1;
    p.group_final_code = 0;
    p.group_final_max = 0;
    p.dir_start_lsn = p.chs_to_lsn(17,0,1);
    p.dir_end_lsn = p.chs_to_lsn(17,0,16);
    p.dir_entry_size = 32;
    p.fill_code = 0x00;
    ans.push(p);

    // Commodore 1541: zoned geometry, BAM on track 18
    let mut p = base_param(FormatKind::C1541,"C1541",35,1,21,256);
    p.sector_base = 0;
    p.sectors_per_group = 1;
    p.fat_start_lsn = p.chs_to_lsn(17,0,0); // BAM, track 18 sector 0 in CBM numbering
    p.fat_end_group = 682;
    p.group_final_code = 0;
    p.group_final_max = 0;
    p.dir_start_lsn = 0;
    p.dir_end_lsn = 0;
    p.dir_entry_size = 32;
    p.fill_code = 0x00;
    p.delete_code = 0x00;
    p.text_eof_code = None;
    ans.push(p);

    // Apple DOS 3.3: VTOC on track 17, chained catalog sectors
    let mut p = base_param(FormatKind::AppleDos,"Apple DOS 3.3",35,1,16,256);
    p.sector_base = 0;
    p.sectors_per_group = 1;
    p.fat_start_lsn = p.chs_to_lsn(17,0,0); // VTOC
    p.fat_end_group = 35*16 - 1;
    p.group_final_code = 0;
    p.group_final_max = 0;
    p.dir_start_lsn = 0;
    p.dir_end_lsn = 0;
    p.dir_entry_size = 35;
    p.fill_code = 0x00;
    p.delete_code = 0xff;
    p.text_eof_code = None;
    ans.push(p);

    // ProDOS on a 140K disk: 512 byte blocks = 2 sectors
    let mut p = base_param(FormatKind::Prodos,"ProDOS 140K",35,1,16,256);
    p.sector_base = 0;
    p.sectors_per_group = 2;
    p.fat_start_lsn = 12; // bitmap block 6
    p.fat_sectors = 2;
    p.fat_end_group = 279;
    p.group_final_code = 0;
    p.group_final_max = 0;
    p.dir_start_lsn = 4; // volume directory blocks 2..5
    p.dir_end_lsn = 11;
    p.dir_entry_size = 39;
    p.fill_code = 0x00;
    p.text_eof_code = None;
    ans.push(p);

    // TRSDOS 2.3: GAT and HIT on track 17
    let mut p = base_param(FormatKind::Trsdos,"TRSDOS 2.3",35,1,10,256);
    p.sectors_per_group = 5;
    p.fat_start_lsn = p.chs_to_lsn(17,0,1);
    p.fat_end_group = 35*2 - 1;
    p.group_final_code = 0;
    p.group_final_max = 0;
    p.dir_start_lsn = p.chs_to_lsn(17,0,3);
    p.dir_end_lsn = p.chs_to_lsn(17,0,10);
    p.dir_entry_size = 32;
    p.fill_code = 0x00;
    p.text_eof_code = None;
    ans.push(p);

    // FROST-DOS 2D: F-BASIC style FAT, management track 2
    let mut p = base_param(FormatKind::Frost,"FROST-DOS 2D",40,2,16,256);
    p.fat_start_lsn = p.chs_to_lsn(2,0,1);
    p.dir_start_lsn = p.chs_to_lsn(2,0,3);
    p.dir_end_lsn = p.chs_to_lsn(2,1,16);
    p.fat_end_group = 151;
    ans.push(p);

    // Magical DOS 2D: management track 20, two FAT sectors
    let mut p = base_param(FormatKind::Magical,"Magical DOS 2D",40,2,16,256);
    p.fat_start_lsn = p.chs_to_lsn(20,0,1);
    p.fat_sectors = 2;
    p.dir_start_lsn = p.chs_to_lsn(20,0,4);
    p.dir_end_lsn = p.chs_to_lsn(20,1,16);
    p.fat_end_group = 151;
    ans.push(p);

    // MDOS 2D: MZ family record layout over the 8 bit FAT
    let mut p = base_param(FormatKind::Mdos,"MDOS 2D",40,2,16,256);
    p.fat_start_lsn = p.chs_to_lsn(18,0,1);
    p.dir_start_lsn = p.chs_to_lsn(18,0,3);
    p.dir_end_lsn = p.chs_to_lsn(18,1,16);
    p.fat_end_group = 151;
    p.text_eof_code = Some(0x0d);
    ans.push(p);

    // X-DOS 2DD: whole-track groups, management track 40
    let mut p = base_param(FormatKind::Xdos,"X-DOS 2DD",80,2,16,256);
    p.sectors_per_group = 16;
    p.fat_start_lsn = p.chs_to_lsn(40,0,2);
    p.dir_start_lsn = p.chs_to_lsn(40,0,4);
    p.dir_end_lsn = p.chs_to_lsn(40,1,16);
    p.fat_end_group = 159;
    p.group_final_max = 0xd0;
    p.text_eof_code = Some(0x0d);
    ans.push(p);

    // C-DOS 2D: management track 16
    let mut p = base_param(FormatKind::Cdos,"C-DOS 2D",40,2,16,256);
    p.fat_start_lsn = p.chs_to_lsn(16,0,1);
    p.dir_start_lsn = p.chs_to_lsn(16,0,3);
    p.dir_end_lsn = p.chs_to_lsn(16,1,16);
    p.fat_end_group = 151;
    p.text_eof_code = Some(0x0d);
    ans.push(p);

    // TF-DOS 1S: 4 sector groups, management track 18
    let mut p = base_param(FormatKind::Tfdos,"TF-DOS",40,1,16,256);
    p.sectors_per_group = 4;
    p.fat_start_lsn = p.chs_to_lsn(18,0,1);
    p.dir_start_lsn = p.chs_to_lsn(18,0,2);
    p.dir_end_lsn = p.chs_to_lsn(18,0,16);
    p.fat_end_group = 159;
    p.group_final_max = 0xc4;
    p.text_eof_code = Some(0x0d);
    ans.push(p);

    // AmigaDOS OFS DD: block addressed, root at the middle of the disk,
    // bitmap conventionally right after it
    let mut p = base_param(FormatKind::Amiga,"AmigaDOS OFS DD",80,2,11,512);
    p.sectors_per_group = 1;
    p.fat_start_lsn = 881;
    p.fat_end_group = 80*2*11 - 1;
    p.group_final_code = 0;
    p.group_final_max = 0;
    p.dir_start_lsn = 880;
    p.dir_end_lsn = 880;
    p.dir_entry_size = 512;
    p.endianness = Endianness::Big;
    p.fill_code = 0x00;
    p.text_eof_code = None;
    ans.push(p);

    ans
}

/// Resolves format kinds to parameter sets.
pub struct BasicCatalog {
    entries: Vec<BasicParam>
}

impl BasicCatalog {
    pub fn new() -> Self {
        Self { entries: builtin_params() }
    }
    pub fn entries(&self) -> &[BasicParam] {
        &self.entries
    }
    pub fn find(&self,kind: FormatKind) -> Option<&BasicParam> {
        self.entries.iter().find(|p| p.kind==kind)
    }
    /// parameter sets whose geometry is compatible with a disk of the given
    /// track/side/sector/size shape
    pub fn candidates(&self,tracks: usize,sides: usize,sectors: usize,sector_size: usize) -> Vec<&BasicParam> {
        self.entries.iter().filter(|p|
            p.sides==sides && p.sector_size==sector_size
            && tracks >= p.tracks.saturating_sub(5) && tracks <= p.tracks + 10
            && (p.kind==FormatKind::C1541 || p.sectors==sectors)
        ).collect()
    }
    /// Extend the catalog from a JSON document: an array of objects whose
    /// fields mirror `BasicParam`.  Unknown kinds are skipped with a warning.
    pub fn load_json(&mut self,text: &str) -> Result<usize,DYNERR> {
        let parsed = json::parse(text)?;
        let mut count = 0;
        for obj in parsed.members() {
            let type_number = match obj["type_number"].as_usize() {
                Some(n) => n,
                None => {
                    warn!("catalog entry without type_number skipped");
                    continue;
                }
            };
            let kind = match FormatKind::from_usize(type_number) {
                Some(k) => k,
                None => {
                    warn!("unknown format type {} skipped",type_number);
                    continue;
                }
            };
            let mut p = match self.find(kind) {
                Some(base) => base.clone(),
                None => continue
            };
            if let Some(s) = obj["name"].as_str() {
                p.name = s.to_string();
            }
            for (key,slot) in [
                ("tracks",&mut p.tracks),("sides",&mut p.sides),
                ("sectors",&mut p.sectors),("sector_size",&mut p.sector_size),
                ("sectors_per_group",&mut p.sectors_per_group),
                ("fat_start_lsn",&mut p.fat_start_lsn),("fat_sectors",&mut p.fat_sectors),
                ("fat_start_group",&mut p.fat_start_group),("fat_end_group",&mut p.fat_end_group),
                ("group_final_code",&mut p.group_final_code),("group_final_max",&mut p.group_final_max),
                ("group_system_code",&mut p.group_system_code),("group_unused_code",&mut p.group_unused_code),
                ("dir_start_lsn",&mut p.dir_start_lsn),("dir_end_lsn",&mut p.dir_end_lsn),
                ("dir_entry_size",&mut p.dir_entry_size)
            ] {
                if let Some(v) = obj[key].as_usize() {
                    *slot = v;
                }
            }
            for (name,val) in obj["ints"].entries() {
                if let Some(v) = val.as_i64() {
                    p.ints.insert(name.to_string(),v);
                }
            }
            for (name,val) in obj["strings"].entries() {
                if let Some(v) = val.as_str() {
                    p.strings.insert(name.to_string(),v.to_string());
                }
            }
            debug!("catalog entry {} loaded",p.name);
            self.entries.push(p);
            count += 1;
        }
        Ok(count)
    }
}

/// Guess the neutral attributes of an imported file from its extension.
pub fn attr_from_extension(ext: &str) -> Option<FileAttr> {
    match ext.to_uppercase().as_str() {
        "BAS" => Some(FileAttr::BASIC),
        "BIN" | "CIM" => Some(FileAttr::MACHINE | FileAttr::BINARY),
        "DAT" => Some(FileAttr::DATA),
        "TXT" | "ASC" | "DOC" => Some(FileAttr::ASCII),
        "SYS" => Some(FileAttr::HIDDEN | FileAttr::BINARY),
        "COM" | "EXE" => Some(FileAttr::MACHINE | FileAttr::BINARY),
        "RND" => Some(FileAttr::RANDOM),
        _ => None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lsn_round_trip() {
        let p = &builtin_params()[0];
        for lsn in [0,1,15,16,32,100,p.tracks*p.sides*p.sectors-1] {
            let (t,s,r) = p.lsn_to_chs(lsn);
            assert_eq!(p.chs_to_lsn(t,s,r),lsn);
        }
    }

    #[test]
    fn builtin_covers_every_kind() {
        let catalog = BasicCatalog::new();
        for num in 0..23 {
            let kind = FormatKind::from_usize(num).expect("kind");
            assert!(catalog.find(kind).is_some(),"missing {}",kind);
        }
    }

    #[test]
    fn json_overlay() {
        let mut catalog = BasicCatalog::new();
        let doc = r#"[{"type_number":10,"name":"DOS80 custom","ints":{"DefaultStartAddress":36864}}]"#;
        let n = catalog.load_json(doc).expect("load");
        assert_eq!(n,1);
        let p = catalog.entries().last().unwrap();
        assert_eq!(p.name,"DOS80 custom");
        assert_eq!(p.int("DefaultStartAddress"),Some(36864));
    }

    #[test]
    fn extension_table() {
        assert_eq!(attr_from_extension("bas"),Some(FileAttr::BASIC));
        assert_eq!(attr_from_extension("weird"),None);
    }
}
