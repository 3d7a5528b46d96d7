// test of the DISK BASIC layer: format, save, load, delete, detection
use dbkit::img::{DiskImageFile,DiskParam,DiskParser,DiskResult,TypeHints};
use dbkit::img::model::DiskDensity;
use dbkit::fs::DiskBasic;
use dbkit::fs::attr::FileAttr;
use dbkit::fs::param::{BasicCatalog,BasicParam,FormatKind};
use dbkit::fs::group::FatAvail;

fn init_log() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// assemble a zero filled disk through the plain parser
fn blank_disk(tracks: usize,sides: usize,sectors: usize,sector_size: usize,density: DiskDensity) -> dbkit::img::Disk {
    let data = vec![0u8;tracks*sides*sectors*sector_size];
    let mut hints = TypeHints::new();
    hints.format_name = Some("plain".to_string());
    hints.chosen = Some(DiskParam::new("test",tracks,sides,sectors,sector_size,density));
    let mut file = DiskImageFile::new();
    let mut result = DiskResult::new();
    let parser = DiskParser::new();
    assert_eq!(parser.parse(&data,&mut hints,&mut file,&mut result),0);
    file.remove_disk(0).expect("disk")
}

fn param_for(kind: FormatKind) -> BasicParam {
    BasicCatalog::new().find(kind).expect("catalog entry").clone()
}

#[test]
fn n88_save_load_delete() {
    init_log();
    let disk = blank_disk(40,2,16,256,DiskDensity::D2);
    let mut basic = DiskBasic::attach(disk,param_for(FormatKind::N88)).expect("attach");
    basic.format().expect("format");
    let free0 = basic.free_size();
    assert!(free0 > 0);
    let data: Vec<u8> = (0..600).map(|i| (i%251) as u8).collect();
    basic.save("HELLO",&data,FileAttr::BASIC | FileAttr::BINARY).expect("save");
    assert!(basic.free_size() < free0);
    let cat = basic.catalog();
    assert_eq!(cat.len(),1);
    assert_eq!(cat[0].0,"HELLO");
    let loaded = basic.load("HELLO").expect("load");
    assert!(loaded.len() >= data.len());
    assert_eq!(&loaded[0..data.len()],&data[..]);
    assert!(loaded[data.len()..].iter().all(|b| *b==0));
    // existing names are rejected, delete first to replace
    assert!(basic.save("HELLO",&data,FileAttr::BASIC | FileAttr::BINARY).is_err());

    // the directory survives a detach and reattach unchanged
    let disk = basic.into_disk();
    let mut basic = DiskBasic::attach(disk,param_for(FormatKind::N88)).expect("reattach");
    assert_eq!(basic.catalog(),cat);
    let loaded2 = basic.load("HELLO").expect("reload");
    assert_eq!(loaded2,loaded);

    basic.delete("HELLO").expect("delete");
    assert!(basic.catalog().is_empty());
    assert!(basic.load("HELLO").is_err());
    assert_eq!(basic.free_size(),free0);
}

#[test]
fn n88_rejects_bad_names() {
    init_log();
    let disk = blank_disk(40,2,16,256,DiskDensity::D2);
    let mut basic = DiskBasic::attach(disk,param_for(FormatKind::N88)).expect("attach");
    basic.format().expect("format");
    for name in ["","A*B","WHAT?","A/B"] {
        assert!(basic.save(name,&[1,2,3],FileAttr::BASIC | FileAttr::BINARY).is_err());
    }
}

#[test]
fn sdos_watermark_never_reuses_freed_space() {
    init_log();
    let disk = blank_disk(35,1,16,256,DiskDensity::D2);
    let mut basic = DiskBasic::attach(disk,param_for(FormatKind::Sdos)).expect("attach");
    basic.format().expect("format");
    let a: Vec<u8> = vec![0x41;300];
    let b: Vec<u8> = vec![0x42;100];
    basic.save("A",&a,FileAttr::BASIC | FileAttr::BINARY).expect("save a");
    basic.save("B",&b,FileAttr::BASIC | FileAttr::BINARY).expect("save b");
    basic.delete("A").expect("delete a");
    // deletion compacted the directory, B must still resolve
    let cat = basic.catalog();
    assert_eq!(cat.len(),1);
    assert_eq!(cat[0].0,"B");
    let loaded = basic.load("B").expect("load b");
    assert_eq!(&loaded[0..b.len()],&b[..]);
    // A's sectors leak rather than return to the free pool
    let avail = basic.availability();
    assert_eq!(avail[0],FatAvail::Leak);
    assert_eq!(avail[1],FatAvail::Leak);
    assert_eq!(avail[2],FatAvail::UsedLast);
    assert_eq!(avail[3],FatAvail::Free);
    // the next allocation comes from the watermark, past B
    basic.save("C",&[0x43;10],FileAttr::BASIC | FileAttr::BINARY).expect("save c");
    let fields = basic.inner_fields("C").expect("fields");
    assert!(fields.contains(&("GROUP".to_string(),"0300".to_string())));
}

#[test]
fn dos80_basic_files_take_default_addresses() {
    init_log();
    let disk = blank_disk(35,1,16,256,DiskDensity::D2);
    let mut basic = DiskBasic::attach(disk,param_for(FormatKind::Dos80)).expect("attach");
    basic.format().expect("format");
    let data: Vec<u8> = (0..300).map(|i| (i%97) as u8).collect();
    basic.save("GAME",&data,FileAttr::BASIC | FileAttr::BINARY).expect("save");
    // the catalog's configured addresses override anything stored before
    let fields = basic.inner_fields("GAME").expect("fields");
    assert!(fields.contains(&("START".to_string(),"0090".to_string())));
    assert!(fields.contains(&("EXEC".to_string(),"0090".to_string())));
    let loaded = basic.load("GAME").expect("load");
    assert_eq!(&loaded[0..data.len()],&data[..]);
}

#[test]
fn msdos_detection_and_d88_round_trip() {
    init_log();
    let disk = blank_disk(80,2,9,512,DiskDensity::D2DD);
    let mut basic = DiskBasic::attach(disk,param_for(FormatKind::Msdos)).expect("attach");
    basic.format().expect("format");
    let data: Vec<u8> = (0..2000).map(|i| (i%173) as u8).collect();
    basic.save("README.TXT",&data,FileAttr::empty()).expect("save");

    // through a D88 container and back, then detect instead of attach
    let parser = DiskParser::new();
    let d88_bytes = parser.serialize("d88",&basic.into_disk()).expect("serialize");
    let file = dbkit::create_img_from_bytestream(&d88_bytes,Some("d88")).expect("reparse");
    let catalog = BasicCatalog::new();
    let mut basic = dbkit::open_basic(file,0,&catalog).expect("open");
    assert_eq!(basic.param().kind,FormatKind::Msdos);
    let cat = basic.catalog();
    assert_eq!(cat.len(),1);
    assert_eq!(cat[0].0,"README.TXT");
    // FAT directories store the exact byte count
    let loaded = basic.load("README.TXT").expect("load");
    assert_eq!(loaded,data);
    basic.delete("README.TXT").expect("delete");
    assert!(basic.catalog().is_empty());
}

#[test]
fn xdos_save_load_delete() {
    init_log();
    let disk = blank_disk(80,2,16,256,DiskDensity::D2DD);
    let mut basic = DiskBasic::attach(disk,param_for(FormatKind::Xdos)).expect("attach");
    basic.format().expect("format");
    let data: Vec<u8> = (0..5000).map(|i| (i%211) as u8).collect();
    basic.save("SAMPLE",&data,FileAttr::MACHINE | FileAttr::BINARY).expect("save");
    let cat = basic.catalog();
    assert_eq!(cat.len(),1);
    assert_eq!(cat[0].0,"SAMPLE");
    let loaded = basic.load("SAMPLE").expect("load");
    assert!(loaded.len() >= data.len());
    assert_eq!(&loaded[0..data.len()],&data[..]);

    // detection instead of attach after a detach
    let disk = basic.into_disk();
    let catalog = BasicCatalog::new();
    let mut basic = DiskBasic::open(disk,&catalog).expect("open");
    assert_eq!(basic.param().kind,FormatKind::Xdos);
    basic.delete("SAMPLE").expect("delete");
    assert!(basic.catalog().is_empty());
}

fn put_be(sec: &mut [u8],off: usize,val: u32) {
    sec[off..off+4].copy_from_slice(&val.to_be_bytes());
}

/// clear one block's free bit in an AmigaDOS bitmap block
fn mark_block_used(map: &mut [u8],block: usize) {
    let i = block - 2;
    let off = 4 + (i/32)*4;
    let mut word = u32::from_be_bytes([map[off],map[off+1],map[off+2],map[off+3]]);
    word &= !(1 << (i%32));
    put_be(map,off,word);
}

#[test]
fn amiga_catalog_is_read_only() {
    init_log();
    let disk = blank_disk(80,2,11,512,DiskDensity::D2DD);
    let mut basic = DiskBasic::attach(disk,param_for(FormatKind::Amiga)).expect("attach");
    basic.format().expect("format");
    // no header block synthesis, saving must be declined
    assert!(basic.save("README",&[1,2,3],FileAttr::DATA | FileAttr::BINARY).is_err());

    // hand plant a two block file: root hash entry -> header 882 -> data 883,884
    let mut disk = basic.into_disk();
    {
        let root = disk.sector_data_mut(40,0,1).expect("root");
        put_be(root,0x18,882);
    }
    {
        let hdr = disk.sector_data_mut(40,0,3).expect("header");
        put_be(hdr,0,2);
        put_be(hdr,4,882);
        put_be(hdr,0x134,883);
        put_be(hdr,0x130,884);
        put_be(hdr,0x144,700);
        hdr[0x1b0] = 6;
        hdr[0x1b1..0x1b7].copy_from_slice(b"README");
        put_be(hdr,0x1fc,0xfffffffd);
    }
    {
        let dat = disk.sector_data_mut(40,0,4).expect("data 1");
        put_be(dat,0,8);
        put_be(dat,0x0c,488);
        for i in 0..488 {
            dat[0x18+i] = b'A';
        }
    }
    {
        let dat = disk.sector_data_mut(40,0,5).expect("data 2");
        put_be(dat,0,8);
        put_be(dat,0x0c,212);
        for i in 0..212 {
            dat[0x18+i] = b'B';
        }
    }
    {
        let map = disk.sector_data_mut(40,0,2).expect("bitmap");
        for block in [882,883,884] {
            mark_block_used(map,block);
        }
    }

    let catalog = BasicCatalog::new();
    let mut basic = DiskBasic::open(disk,&catalog).expect("open");
    assert_eq!(basic.param().kind,FormatKind::Amiga);
    let cat = basic.catalog();
    assert_eq!(cat.len(),1);
    assert_eq!(cat[0].0,"README");
    assert_eq!(cat[0].2,700);
    let loaded = basic.load("README").expect("load");
    assert_eq!(loaded.len(),700);
    assert!(loaded[0..488].iter().all(|b| *b==b'A'));
    assert!(loaded[488..].iter().all(|b| *b==b'B'));
    // deletion tombstones the header in place
    basic.delete("README").expect("delete");
    assert!(basic.catalog().is_empty());
    assert!(basic.load("README").is_err());
}

#[test]
fn write_protect_blocks_mutation() {
    init_log();
    let mut disk = blank_disk(40,2,16,256,DiskDensity::D2);
    let param = param_for(FormatKind::N88);
    disk.write_protected = true;
    let mut basic = DiskBasic::attach(disk,param).expect("attach");
    assert!(basic.format().is_err());
    assert!(basic.save("X",&[1],FileAttr::BASIC | FileAttr::BINARY).is_err());
    assert!(basic.delete("X").is_err());
}

#[test]
fn no_match_on_unformatted_disk() {
    init_log();
    // every sector 0xEE is not a plausible instance of anything
    let mut disk = blank_disk(40,2,16,256,DiskDensity::D2);
    for track in disk.tracks_mut() {
        for sector in track.sectors_mut() {
            sector.data_mut().fill(0xee);
        }
    }
    let catalog = BasicCatalog::new();
    assert!(DiskBasic::open(disk,&catalog).is_err());
}
