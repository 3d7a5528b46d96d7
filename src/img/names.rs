//! ## Geometry templates
//!
//! Convenient parameter sets for the disk layouts this library meets in the
//! wild.  Headerless image checks match the file size against this table
//! before falling back to arithmetic factorization.

use crate::img::{DiskParam,DiskDensity};

/// the sector sizes conventional formats use
pub const SECTOR_SIZES: [usize;4] = [128,256,512,1024];

pub fn templates() -> Vec<DiskParam> {
    vec![
        DiskParam::new("1S",35,1,16,256,DiskDensity::D2),
        DiskParam::new("1D",40,1,16,256,DiskDensity::D2),
        DiskParam::new("1DD",80,1,16,256,DiskDensity::D2DD),
        DiskParam::new("2D",40,2,16,256,DiskDensity::D2),
        DiskParam::new("2DD-640",80,2,16,256,DiskDensity::D2DD),
        DiskParam::new("2DD-720",80,2,9,512,DiskDensity::D2DD),
        DiskParam::new("2HD-1.2M",77,2,8,1024,DiskDensity::D2HD),
        DiskParam::new("2HD-1.2M-PC",80,2,15,512,DiskDensity::D2HD),
        DiskParam::new("2HD-1.44M",80,2,18,512,DiskDensity::D2HD),
        DiskParam::new("8-SSSD",77,1,26,128,DiskDensity::D2),
        DiskParam::new("8-DSDD",77,2,26,256,DiskDensity::D2HD),
        DiskParam::new("5-SSSD-10",35,1,10,256,DiskDensity::D2),
        DiskParam::new("5-DSDD-10",40,2,10,256,DiskDensity::D2),
        DiskParam::new("5-SSDD-18",40,1,18,128,DiskDensity::D2),
        DiskParam::new("3.5-2DD-AMIGA",80,2,11,512,DiskDensity::D2DD)
    ]
}

/// all templates whose raw dump size matches `len`
pub fn size_matches(len: usize) -> Vec<DiskParam> {
    templates().into_iter().filter(|p| p.disk_size()==len).collect()
}
