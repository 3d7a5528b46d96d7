//! ## Format neutral file attributes
//!
//! Every variant maps its native type byte(s) onto this common bit set and
//! back.  The mapping must be bijective over the bits a format supports, so
//! a file exported from one variant can be imported into another without
//! losing the attributes both understand.

use bitflags::bitflags;

bitflags! {
    #[derive(Clone,Copy,Debug,PartialEq,Eq)]
    pub struct FileAttr: u32 {
        const BASIC     = 0x0001;
        const MACHINE   = 0x0002;
        const DATA      = 0x0004;
        const ASCII     = 0x0008;
        const BINARY    = 0x0010;
        const RANDOM    = 0x0020;
        const READONLY  = 0x0040;
        const READWRITE = 0x0080;
        const ENCRYPTED = 0x0100;
        const DIRECTORY = 0x0200;
        const NONSHARE  = 0x0400;
        const HIDDEN    = 0x0800;
    }
}

impl FileAttr {
    /// human readable rendering, stable order
    pub fn to_display_string(&self) -> String {
        let names: [(FileAttr,&str);12] = [
            (FileAttr::BASIC,"BASIC"),
            (FileAttr::MACHINE,"MACHINE"),
            (FileAttr::DATA,"DATA"),
            (FileAttr::ASCII,"ASCII"),
            (FileAttr::BINARY,"BINARY"),
            (FileAttr::RANDOM,"RANDOM"),
            (FileAttr::READONLY,"READONLY"),
            (FileAttr::READWRITE,"READWRITE"),
            (FileAttr::ENCRYPTED,"ENCRYPTED"),
            (FileAttr::DIRECTORY,"DIRECTORY"),
            (FileAttr::NONSHARE,"NONSHARE"),
            (FileAttr::HIDDEN,"HIDDEN")
        ];
        let mut parts: Vec<&str> = Vec::new();
        for (bit,name) in names {
            if self.contains(bit) {
                parts.push(name);
            }
        }
        match parts.len() {
            0 => "NONE".to_string(),
            _ => parts.join(",")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_order_is_stable() {
        let attr = FileAttr::READONLY | FileAttr::BASIC;
        assert_eq!(attr.to_display_string(),"BASIC,READONLY");
        assert_eq!(FileAttr::empty().to_display_string(),"NONE");
    }
}
