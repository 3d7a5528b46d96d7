//! ## Sector codec utilities
//!
//! Pure functions over byte buffers shared by the format parsers: interleave
//! arithmetic, G64 GCR nibble coding, and the MFM/FM bit-stream demodulator
//! used by flux level containers.  Run-length schemes that exist in only one
//! container (Teledisk, CopyQM, DSKSTR) live with their parser.

use bit_vec::BitVec;
use log::trace;

/// Enumerates codec errors.  The `Display` trait will print the long message.
#[derive(thiserror::Error,Debug)]
pub enum CodecError {
    #[error("invalid GCR nibble")]
    InvalidGcrNibble,
    #[error("bit pattern not found")]
    PatternNotFound,
    #[error("ran out of bits")]
    OutOfData,
    #[error("bad checksum in decoded field")]
    BadChecksum
}

// ---------------------------------------------------------------------------
// interleave

/// Produce the physical order of sector numbers for a track written with the
/// given interleave stride.  Logical sector `base+i` lands `interleave` slots
/// after its predecessor, advancing by one on collision.
pub fn sector_numbers_for_interleave(interleave: usize,count: usize,base: usize) -> Vec<usize> {
    if count==0 {
        return Vec::new();
    }
    let step = match interleave { 0 => 1, k => k };
    let mut out = vec![usize::MAX;count];
    let mut pos = 0;
    for i in 0..count {
        while out[pos] != usize::MAX {
            pos = (pos+1) % count;
        }
        out[pos] = base + i;
        pos = (pos + step) % count;
    }
    out
}

/// Given the physical read order of sector numbers, find the minimal stride
/// that reproduces it.  Falls back to 1 when no stride matches (irregular or
/// custom layouts).
pub fn detect_interleave(observed: &[usize]) -> usize {
    let n = observed.len();
    if n < 2 {
        return 1;
    }
    let base = match observed.iter().min() {
        Some(b) => *b,
        None => return 1
    };
    // rotate so the lowest numbered sector leads, the read may have
    // started anywhere on the track
    let start = observed.iter().position(|v| *v==base).unwrap_or(0);
    let rotated: Vec<usize> = (0..n).map(|i| observed[(start+i)%n]).collect();
    for k in 1..=n {
        if sector_numbers_for_interleave(k,n,base)==rotated {
            return k;
        }
    }
    trace!("no stride matches physical order {:?}",observed);
    1
}

// ---------------------------------------------------------------------------
// GCR (Commodore G64)

const INVALID_NIB: u8 = 0xff;

const FWD_G64: [u8;16] = [
    0b01010, 0b01011, 0b10010, 0b10011,
    0b01110, 0b01111, 0b10110, 0b10111,
    0b01001, 0b11001, 0b11010, 0b11011,
    0b01101, 0b11101, 0b11110, 0b10101
];

const REV_G64: [u8;32] = [
    0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,0xFF,
    0xFF,0x08,0x00,0x01,0xFF,0x0C,0x04,0x05,
    0xFF,0xFF,0x02,0x03,0xFF,0x0F,0x06,0x07,
    0xFF,0x09,0x0A,0x0B,0xFF,0x0D,0x0E,0xFF
];

/// take 5 bits from the sliding 2-byte window at the given bit position
fn take5(src: &[u8],bitpos: usize) -> u8 {
    let byte = bitpos/8;
    let shift = bitpos%8;
    let hi = src[byte] as u16;
    let lo = match byte+1 < src.len() { true => src[byte+1] as u16, false => 0 };
    (((hi << 8 | lo) >> (11-shift)) & 0x1f) as u8
}

/// Decode `count` bytes of GCR data starting at bit 0 of `src`.
/// The window advances 5 bits at a time, two nibbles per output byte.
pub fn gcr_decode(src: &[u8],count: usize) -> Result<Vec<u8>,CodecError> {
    if src.len()*8 < count*10 {
        return Err(CodecError::OutOfData);
    }
    let mut ans = Vec::with_capacity(count);
    let mut bitpos = 0;
    for _i in 0..count {
        let hi = REV_G64[take5(src,bitpos) as usize];
        let lo = REV_G64[take5(src,bitpos+5) as usize];
        if hi==INVALID_NIB || lo==INVALID_NIB {
            return Err(CodecError::InvalidGcrNibble);
        }
        ans.push(hi << 4 | lo);
        bitpos += 10;
    }
    Ok(ans)
}

/// Encode bytes as GCR, 10 bits per byte, packed MSB first.
pub fn gcr_encode(src: &[u8]) -> Vec<u8> {
    let mut bits = BitVec::with_capacity(src.len()*10);
    for val in src {
        for nib in [FWD_G64[(val >> 4) as usize],FWD_G64[(val & 0x0f) as usize]] {
            for b in (0..5).rev() {
                bits.push(nib >> b & 1 == 1);
            }
        }
    }
    while bits.len()%8 != 0 {
        bits.push(true); // pad toward sync
    }
    bits.to_bytes()
}

// ---------------------------------------------------------------------------
// MFM / FM bit streams

/// MFM-encoded gap byte 0x4E
pub const MFM_GAP: u16 = 0x9254;
/// MFM sync byte 0xA1 with the missing clock bit
pub const MFM_SYNC: u16 = 0x4489;
/// FM gap byte 0xFF under clock 0xFF
pub const FM_GAP: u16 = 0xFFFF;
/// FM ID address mark 0xFE under clock 0xC7
pub const FM_IDAM: u16 = 0xF57E;
/// FM data address mark 0xFB under clock 0xC7
pub const FM_DAM: u16 = 0xF56F;
/// FM deleted data address mark 0xF8 under clock 0xC7
pub const FM_DDAM: u16 = 0xF56A;

/// ID address mark byte following the MFM sync run
pub const ID_MARK: u8 = 0xfe;
/// data address mark byte
pub const DATA_MARK: u8 = 0xfb;
/// deleted data address mark byte
pub const DELETED_DATA_MARK: u8 = 0xf8;

/// A cursor over a track's raw bit cells with a 16-bit shift register,
/// used to resynchronize on clock-encoded marker patterns and then pull
/// decoded bytes out of the stream.
pub struct BitStream {
    bits: BitVec,
    pos: usize
}

impl BitStream {
    /// bits packed MSB first within each byte
    pub fn from_bytes_msb(buf: &[u8]) -> Self {
        Self { bits: BitVec::from_bytes(buf), pos: 0 }
    }
    /// bits packed LSB first within each byte (HFE cell order)
    pub fn from_bytes_lsb(buf: &[u8]) -> Self {
        let mut bits = BitVec::with_capacity(buf.len()*8);
        for byte in buf {
            for b in 0..8 {
                bits.push(byte >> b & 1 == 1);
            }
        }
        Self { bits, pos: 0 }
    }
    pub fn len(&self) -> usize {
        self.bits.len()
    }
    pub fn pos(&self) -> usize {
        self.pos
    }
    /// rewind to a previously saved cursor
    pub fn reset(&mut self,pos: usize) {
        self.pos = pos;
    }
    fn next_bit(&mut self) -> Option<bool> {
        let b = self.bits.get(self.pos)?;
        self.pos += 1;
        Some(b)
    }
    /// Advance bit by bit until the shift register holds `pattern`, or until
    /// `limit` bits have been consumed.  On success the cursor rests just
    /// after the pattern.
    pub fn seek_pattern(&mut self,pattern: u16,limit: usize) -> bool {
        let mut reg: u16 = 0;
        let mut count = 0;
        while count < limit {
            match self.next_bit() {
                Some(b) => {
                    reg = reg << 1 | b as u16;
                    count += 1;
                    if count >= 16 && reg==pattern {
                        return true;
                    }
                },
                None => return false
            }
        }
        false
    }
    /// seek a run of `n` consecutive occurrences of a 16-bit pattern
    pub fn seek_pattern_run(&mut self,pattern: u16,n: usize,limit: usize) -> bool {
        if !self.seek_pattern(pattern,limit) {
            return false;
        }
        let mut run = 1;
        while run < n {
            let mark = self.pos;
            match self.read_raw16() {
                Some(v) if v==pattern => run += 1,
                _ => {
                    self.pos = mark;
                    run = 1;
                    if !self.seek_pattern(pattern,limit) {
                        return false;
                    }
                }
            }
        }
        true
    }
    fn read_raw16(&mut self) -> Option<u16> {
        let mut reg: u16 = 0;
        for _i in 0..16 {
            reg = reg << 1 | self.next_bit()? as u16;
        }
        Some(reg)
    }
    /// read one MFM cell pair group: data bits are the second of each pair
    pub fn read_mfm_byte(&mut self) -> Option<u8> {
        let raw = self.read_raw16()?;
        let mut ans = 0u8;
        for i in 0..8 {
            ans = ans << 1 | (raw >> (14 - i*2) & 1) as u8;
        }
        Some(ans)
    }
    /// read one FM byte: every cell pair is (clock,data), clock is ignored
    pub fn read_fm_byte(&mut self) -> Option<u8> {
        // cell layout is the same as MFM, only the clock rule differs
        self.read_mfm_byte()
    }
    pub fn read_mfm_slice(&mut self,len: usize) -> Option<Vec<u8>> {
        let mut ans = Vec::with_capacity(len);
        for _i in 0..len {
            ans.push(self.read_mfm_byte()?);
        }
        Some(ans)
    }
    pub fn read_fm_slice(&mut self,len: usize) -> Option<Vec<u8>> {
        self.read_mfm_slice(len)
    }
}

/// MFM-encode a run of bytes.  `last_bit` carries the final data bit across
/// calls so gap and data runs join with legal clocking.
pub fn mfm_encode(src: &[u8],last_bit: &mut bool) -> BitVec {
    let mut bits = BitVec::with_capacity(src.len()*16);
    for byte in src {
        for i in (0..8).rev() {
            let data = byte >> i & 1 == 1;
            let clock = !*last_bit && !data;
            bits.push(clock);
            bits.push(data);
            *last_bit = data;
        }
    }
    bits
}

/// FM-encode a run of bytes under the given clock byte (0xFF for data).
pub fn fm_encode(src: &[u8],clock: u8) -> BitVec {
    let mut bits = BitVec::with_capacity(src.len()*16);
    for byte in src {
        for i in (0..8).rev() {
            bits.push(clock >> i & 1 == 1);
            bits.push(byte >> i & 1 == 1);
        }
    }
    bits
}

/// append the MFM sync word (A1 with missing clock) `n` times
pub fn mfm_sync(bits: &mut BitVec,n: usize) {
    for _i in 0..n {
        for b in (0..16).rev() {
            bits.push(MFM_SYNC >> b & 1 == 1);
        }
    }
}

/// CRC as used by the IBM track format (CCITT, poly 0x1021).
pub fn crc16_ccitt(seed: u16,buf: &[u8]) -> u16 {
    let mut crc = seed;
    for byte in buf {
        crc ^= (*byte as u16) << 8;
        for _bit in 0..8 {
            crc = (crc << 1) ^ match crc & 0x8000 { 0 => 0, _ => 0x1021 };
        }
    }
    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interleave_involution() {
        for n in 2..=26 {
            for k in 1..=n {
                let order = sector_numbers_for_interleave(k,n,1);
                let mut sorted = order.clone();
                sorted.sort_unstable();
                assert_eq!(sorted,(1..=n).collect::<Vec<usize>>());
                let detected = detect_interleave(&order);
                assert_eq!(sector_numbers_for_interleave(detected,n,1),order);
            }
        }
    }

    #[test]
    fn interleave_classic_patterns() {
        assert_eq!(sector_numbers_for_interleave(1,8,1),vec![1,2,3,4,5,6,7,8]);
        assert_eq!(sector_numbers_for_interleave(2,8,1),vec![1,5,2,6,3,7,4,8]);
        assert_eq!(detect_interleave(&[1,5,2,6,3,7,4,8]),2);
    }

    #[test]
    fn gcr_round_trip() {
        let data: Vec<u8> = (0..=255).collect();
        let enc = gcr_encode(&data);
        let dec = gcr_decode(&enc,data.len()).expect("gcr decode failed");
        assert_eq!(dec,data);
    }

    #[test]
    fn mfm_round_trip() {
        let data = [0x4eu8,0x00,0xfe,0x01,0x00,0x01,0x01,0xaa,0x55];
        let mut last = false;
        let bits = mfm_encode(&data,&mut last);
        let mut stream = BitStream { bits, pos: 0 };
        for expected in data {
            assert_eq!(stream.read_mfm_byte(),Some(expected));
        }
    }

    #[test]
    fn mfm_sync_search() {
        let mut last = false;
        let mut bits = mfm_encode(&[0x4e;10],&mut last);
        mfm_sync(&mut bits,3);
        let mut tail = mfm_encode(&[ID_MARK,2,0,5,1],&mut last);
        let mut all = bits;
        all.append(&mut tail);
        let mut stream = BitStream { bits: all, pos: 0 };
        assert!(stream.seek_pattern_run(MFM_SYNC,3,100000));
        assert_eq!(stream.read_mfm_byte(),Some(ID_MARK));
        assert_eq!(stream.read_mfm_slice(4),Some(vec![2,0,5,1]));
    }

    #[test]
    fn fm_marks() {
        let bits = fm_encode(&[ID_MARK],0xc7);
        let mut reg = 0u16;
        for b in bits.iter() {
            reg = reg << 1 | b as u16;
        }
        assert_eq!(reg,FM_IDAM);
        let bits = fm_encode(&[DATA_MARK],0xc7);
        let mut reg = 0u16;
        for b in bits.iter() {
            reg = reg << 1 | b as u16;
        }
        assert_eq!(reg,FM_DAM);
    }
}
