//! ## Polymorphic directory entries
//!
//! Each DISK BASIC variant owns the binary layout of one fixed size
//! directory record.  The per-variant behavior sits behind the `DirItemOps`
//! capability table, resolved exactly once at the factory boundary
//! (`ops_for`).  A `DirItem` is the format neutral carrier: it holds a
//! working copy of the raw record, the locator of the backing bytes inside
//! the directory stream, the scanned allocation chain, and the tree links.
//!
//! Lifecycle: unbound (no backing bytes) -> bound (record copied in, used
//! flag computed) -> scanned (group chain attached) -> deleted (tombstoned,
//! chain retained until the slot is reused).

pub mod fm;
pub mod n88;
pub mod x1hu;
pub mod mz;
pub mod flex;
pub mod os9;
pub mod cpm;
pub mod fp;
pub mod msdos;
pub mod dos80;
pub mod sdos;
pub mod c1541;
pub mod appledos;
pub mod prodos;
pub mod trsdos;
pub mod frost;
pub mod magical;
pub mod mdos;
pub mod xdos;
pub mod cdos;
pub mod tfdos;
pub mod amiga;

use chrono::NaiveDateTime;
use crate::fs::attr::FileAttr;
use crate::fs::group::GroupList;
use crate::fs::param::{BasicParam,FormatKind};

/// Capability surface every variant implements over its raw record bytes.
/// Methods with defaults are genuinely optional capabilities; a variant
/// that lacks the underlying field simply leaves the default.
pub trait DirItemOps: Sync {
    fn kind(&self) -> FormatKind;
    fn record_size(&self) -> usize;
    /// offsets of the records within the directory byte stream; the default
    /// is a dense run, variants with per-sector headers override
    fn record_offsets(&self,stream_len: usize,sector_size: usize) -> Vec<usize> {
        let _ = sector_size;
        let n = self.record_size();
        (0..stream_len/n).map(|i| i*n).collect()
    }
    /// plausibility of the raw bytes; sets `last` on an end-of-directory marker
    fn check(&self,rec: &[u8],last: &mut bool) -> bool;
    /// used/free status from the name/type sentinels
    fn check_used(&self,rec: &[u8],unuse_hint: bool) -> bool;
    /// (offset,length) of the name field
    fn name_span(&self) -> (usize,usize);
    /// write the name field; ProDOS overrides to keep its length prefix
    fn set_name(&self,rec: &mut [u8],name: &str) {
        let (off,len) = self.name_span();
        let pad = self.name_pad();
        match self.ext_span() {
            Some((eoff,elen)) => {
                let (base,ext) = match name.rsplit_once('.') {
                    Some((b,e)) => (b,e),
                    None => (name,"")
                };
                put_field(&mut rec[off..off+len],base,pad);
                put_field(&mut rec[eoff..eoff+elen],ext,pad);
            },
            None => put_field(&mut rec[off..off+len],name,pad)
        }
    }
    fn ext_span(&self) -> Option<(usize,usize)> {
        None
    }
    fn name_pad(&self) -> u8 {
        0x20
    }
    fn file_type1(&self,rec: &[u8]) -> u8;
    fn set_file_type1(&self,rec: &mut [u8],param: &BasicParam,val: u8);
    fn file_type2(&self,_rec: &[u8]) -> Option<u8> {
        None
    }
    fn set_file_type2(&self,_rec: &mut [u8],_val: u8) {}
    /// map the native type byte(s) to the neutral attribute set, must be the
    /// inverse of `set_file_attr` over the bits the format supports
    fn file_attr(&self,rec: &[u8]) -> FileAttr;
    fn set_file_attr(&self,rec: &mut [u8],param: &BasicParam,attr: FileAttr);
    /// explicit size field when the format stores one, otherwise derived
    /// from the allocation chain
    fn file_size(&self,rec: &[u8],param: &BasicParam,groups: &GroupList) -> usize;
    fn set_file_size(&self,_rec: &mut [u8],_param: &BasicParam,_val: usize) {}
    /// start group of the given file unit
    fn start_group(&self,rec: &[u8],unit: usize) -> Option<usize>;
    fn set_start_group(&self,rec: &mut [u8],unit: usize,group: usize);
    /// record a fresh allocation in the entry; most formats store only the
    /// chain head, CP/M stores the whole block map
    fn set_groups(&self,rec: &mut [u8],groups: &GroupList) {
        if let Some(first) = groups.first_group() {
            self.set_start_group(rec,0,first);
        }
    }
    /// number of physical units one logical file splits into
    fn unit_count(&self,_rec: &[u8]) -> usize {
        1
    }
    fn has_address(&self) -> bool {
        false
    }
    fn start_address(&self,_rec: &[u8]) -> Option<u16> {
        None
    }
    fn end_address(&self,_rec: &[u8]) -> Option<u16> {
        None
    }
    fn execute_address(&self,_rec: &[u8]) -> Option<u16> {
        None
    }
    fn set_start_address(&self,_rec: &mut [u8],_val: u16) {}
    fn set_end_address(&self,_rec: &mut [u8],_val: u16) {}
    fn set_execute_address(&self,_rec: &mut [u8],_val: u16) {}
    fn has_create_datetime(&self) -> bool {
        false
    }
    fn has_modify_datetime(&self) -> bool {
        false
    }
    fn create_datetime(&self,_rec: &[u8]) -> Option<NaiveDateTime> {
        None
    }
    fn modify_datetime(&self,_rec: &[u8]) -> Option<NaiveDateTime> {
        None
    }
    fn set_create_datetime(&self,_rec: &mut [u8],_val: NaiveDateTime) {}
    fn set_modify_datetime(&self,_rec: &mut [u8],_val: NaiveDateTime) {}
    /// tombstone the entry, the record body is left for recovery tools
    fn delete(&self,rec: &mut [u8],param: &BasicParam);
    /// fill a fresh slot with the format's fill byte
    fn clear(&self,rec: &mut [u8],param: &BasicParam) {
        rec.fill(param.fill_code);
    }
    /// text files whose size must be found by scanning for the EOF code
    fn needs_eof_scan(&self,_attr: FileAttr) -> bool {
        false
    }
    fn round_file_size(&self,val: usize,_param: &BasicParam) -> usize {
        val
    }
    /// filename transform before import from a foreign file system
    fn pre_import(&self,name: &str,_attr: FileAttr) -> String {
        name.to_string()
    }
    /// filename transform before export to a foreign file system
    fn pre_export(&self,name: &str,_attr: FileAttr) -> String {
        name.to_string()
    }
    fn attr_str(&self,rec: &[u8]) -> String {
        self.file_attr(rec).to_display_string()
    }
    /// raw field dump for inspection
    fn inner_fields(&self,rec: &[u8]) -> Vec<(String,String)>;
}

static FM_OPS: fm::FmOps = fm::FmOps;
static N88_OPS: n88::N88Ops = n88::N88Ops;
static X1HU_OPS: x1hu::X1huOps = x1hu::X1huOps;
static MZ_OPS: mz::MzOps = mz::MzOps;
static FLEX_OPS: flex::FlexOps = flex::FlexOps;
static OS9_OPS: os9::Os9Ops = os9::Os9Ops;
static CPM_OPS: cpm::CpmOps = cpm::CpmOps;
static FP_OPS: fp::FpOps = fp::FpOps;
static MSDOS_OPS: msdos::MsdosOps = msdos::MsdosOps { kind: FormatKind::Msdos };
static MSX_OPS: msdos::MsdosOps = msdos::MsdosOps { kind: FormatKind::Msx };
static DOS80_OPS: dos80::Dos80Ops = dos80::Dos80Ops;
static SDOS_OPS: sdos::SdosOps = sdos::SdosOps;
static C1541_OPS: c1541::C1541Ops = c1541::C1541Ops;
static APPLEDOS_OPS: appledos::AppleDosOps = appledos::AppleDosOps;
static PRODOS_OPS: prodos::ProdosOps = prodos::ProdosOps;
static TRSDOS_OPS: trsdos::TrsdosOps = trsdos::TrsdosOps;
static FROST_OPS: frost::FrostOps = frost::FrostOps;
static MAGICAL_OPS: magical::MagicalOps = magical::MagicalOps;
static MDOS_OPS: mdos::MdosOps = mdos::MdosOps;
static XDOS_OPS: xdos::XdosOps = xdos::XdosOps;
static CDOS_OPS: cdos::CdosOps = cdos::CdosOps;
static TFDOS_OPS: tfdos::TfdosOps = tfdos::TfdosOps;
static AMIGA_OPS: amiga::AmigaOps = amiga::AmigaOps;

/// the factory boundary: dispatch on the format kind happens here, once
pub fn ops_for(kind: FormatKind) -> &'static dyn DirItemOps {
    match kind {
        FormatKind::Fm => &FM_OPS,
        FormatKind::N88 => &N88_OPS,
        FormatKind::X1Hu => &X1HU_OPS,
        FormatKind::Mz => &MZ_OPS,
        FormatKind::Flex => &FLEX_OPS,
        FormatKind::Os9 => &OS9_OPS,
        FormatKind::Cpm => &CPM_OPS,
        FormatKind::Fp => &FP_OPS,
        FormatKind::Msdos => &MSDOS_OPS,
        FormatKind::Msx => &MSX_OPS,
        FormatKind::Dos80 => &DOS80_OPS,
        FormatKind::Sdos => &SDOS_OPS,
        FormatKind::C1541 => &C1541_OPS,
        FormatKind::AppleDos => &APPLEDOS_OPS,
        FormatKind::Prodos => &PRODOS_OPS,
        FormatKind::Trsdos => &TRSDOS_OPS,
        FormatKind::Frost => &FROST_OPS,
        FormatKind::Magical => &MAGICAL_OPS,
        FormatKind::Mdos => &MDOS_OPS,
        FormatKind::Xdos => &XDOS_OPS,
        FormatKind::Cdos => &CDOS_OPS,
        FormatKind::Tfdos => &TFDOS_OPS,
        FormatKind::Amiga => &AMIGA_OPS
    }
}

/// One directory-entry slot.  Owns a working copy of its raw record;
/// mutations mark it dirty and are written back by the directory's flush.
pub struct DirItem {
    pub kind: FormatKind,
    /// index of the directory area holding the backing bytes
    pub area: usize,
    /// byte offset of the record within that area's stream
    pub offset: usize,
    pub used: bool,
    pub groups: GroupList,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    /// false for synthetic entries such as the root or "." / ".."
    pub visible: bool,
    rec: Vec<u8>,
    dirty: bool
}

impl DirItem {
    /// unbound entry, no backing bytes yet
    pub fn new(kind: FormatKind) -> Self {
        Self {
            kind,
            area: 0,
            offset: 0,
            used: false,
            groups: GroupList::new(),
            parent: None,
            children: Vec::new(),
            visible: true,
            rec: Vec::new(),
            dirty: false
        }
    }
    /// bind to existing raw bytes
    pub fn bind(kind: FormatKind,area: usize,offset: usize,rec: Vec<u8>) -> Self {
        let ops = ops_for(kind);
        let used = ops.check_used(&rec,false);
        Self {
            kind,
            area,
            offset,
            used,
            groups: GroupList::new(),
            parent: None,
            children: Vec::new(),
            visible: true,
            rec,
            dirty: false
        }
    }
    pub fn ops(&self) -> &'static dyn DirItemOps {
        ops_for(self.kind)
    }
    pub fn record(&self) -> &[u8] {
        &self.rec
    }
    pub fn record_mut(&mut self) -> &mut [u8] {
        self.dirty = true;
        &mut self.rec
    }
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }
    pub fn is_bound(&self) -> bool {
        !self.rec.is_empty()
    }
    /// name and extension joined the conventional way
    pub fn file_name(&self) -> String {
        let ops = self.ops();
        let (off,len) = ops.name_span();
        let name = string_from_field(&self.rec[off..off+len],ops.name_pad());
        match ops.ext_span() {
            Some((eoff,elen)) => {
                let ext = string_from_field(&self.rec[eoff..eoff+elen],ops.name_pad());
                match ext.is_empty() {
                    true => name,
                    false => format!("{}.{}",name,ext)
                }
            },
            None => name
        }
    }
    pub fn set_file_name(&mut self,name: &str) {
        let ops = self.ops();
        ops.set_name(self.record_mut(),name);
    }
    pub fn file_attr(&self) -> FileAttr {
        self.ops().file_attr(&self.rec)
    }
    pub fn set_file_attr(&mut self,param: &BasicParam,attr: FileAttr) {
        let ops = self.ops();
        ops.set_file_attr(self.record_mut(),param,attr);
    }
    pub fn attr_str(&self) -> String {
        self.ops().attr_str(&self.rec)
    }
    pub fn file_size(&self,param: &BasicParam) -> usize {
        self.ops().file_size(&self.rec,param,&self.groups)
    }
    pub fn delete(&mut self,param: &BasicParam) {
        let ops = self.ops();
        ops.delete(self.record_mut(),param);
        self.used = false;
    }
    /// clone name, attributes and allocation bookkeeping from another entry
    pub fn copy_item(&mut self,src: &DirItem) {
        self.copy_data(src.record());
        self.groups = src.groups.clone();
        self.used = src.used;
    }
    /// overwrite the raw record wholesale
    pub fn copy_data(&mut self,rec: &[u8]) {
        self.rec = rec.to_vec();
        self.dirty = true;
    }
    pub fn clear_data(&mut self,param: &BasicParam) {
        let ops = self.ops();
        if self.rec.len() != ops.record_size() {
            self.rec = vec![0;ops.record_size()];
        }
        ops.clear(self.record_mut(),param);
    }
    pub fn inner_fields(&self) -> Vec<(String,String)> {
        self.ops().inner_fields(&self.rec)
    }
}

/// decode a padded fixed-width name field, high bit stripped
pub fn string_from_field(field: &[u8],pad: u8) -> String {
    let mut end = field.len();
    while end > 0 && (field[end-1]==pad || field[end-1]==0) {
        end -= 1;
    }
    field[0..end].iter().map(|b| (b & 0x7f) as char).collect()
}

/// encode into a padded fixed-width name field, truncating as needed
pub fn put_field(field: &mut [u8],val: &str,pad: u8) {
    field.fill(pad);
    for (i,b) in val.bytes().take(field.len()).enumerate() {
        field[i] = b;
    }
}

pub fn u16_at(rec: &[u8],off: usize) -> u16 {
    u16::from_le_bytes([rec[off],rec[off+1]])
}

pub fn put_u16(rec: &mut [u8],off: usize,val: u16) {
    rec[off..off+2].copy_from_slice(&val.to_le_bytes());
}

pub fn u16_be_at(rec: &[u8],off: usize) -> u16 {
    u16::from_be_bytes([rec[off],rec[off+1]])
}

pub fn put_u16_be(rec: &mut [u8],off: usize,val: u16) {
    rec[off..off+2].copy_from_slice(&val.to_be_bytes());
}

/// labeled hex rendering for `inner_fields`
pub fn hex_field(label: &str,bytes: &[u8]) -> (String,String) {
    (label.to_string(),hex::encode_upper(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_field_round_trip() {
        let mut field = [0x20u8;8];
        put_field(&mut field,"HELLO",0x20);
        assert_eq!(&field,b"HELLO   ");
        assert_eq!(string_from_field(&field,0x20),"HELLO");
    }

    #[test]
    fn long_name_truncates() {
        let mut field = [0u8;4];
        put_field(&mut field,"TOOLONG",0x20);
        assert_eq!(&field,b"TOOL");
    }
}
