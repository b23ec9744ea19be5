//! Bit-precise field codec.
//!
//! A field writes `size` bits of a 64-bit value at absolute bit offset `pos`
//! of a header buffer. Bits are packed MSB first: absolute bit `p` lives in
//! byte `p / 8` with weight `1 << (7 - p % 8)`.
//!
//! Before placement the value goes through the configured transforms:
//!
//! 1. `BE` byte-reverses the whole 64-bit container (not just `size` bits).
//! 2. `swap` exchanges bits 0..16 with bits 16..32; the upper 32 bits are dropped.
//! 3. The value is padded or truncated to `size` bits.
//! 4. `invert` writes the value LSB first instead of MSB first.

use crate::clock::{diane_value, Clock};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Little,
    Big,
}

/// Counting unit of a size field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeUnit {
    U8,
    U16,
    U32,
}

impl SizeUnit {
    pub fn bits(self) -> u64 {
        match self {
            SizeUnit::U8 => 8,
            SizeUnit::U16 => 16,
            SizeUnit::U32 => 32,
        }
    }
}

/// Which part of the message a size field counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeScope {
    ExcludingHeader,
    IncludingHeader,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeFormat {
    Milliseconds,
    Microseconds,
    DianePacked,
}

/// Field variant; selects where the encoded value comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// Literal configured value.
    Value,
    /// Length of the payload (optionally plus the header) in `unit`s.
    Size { unit: SizeUnit, scope: SizeScope },
    /// Current time of day.
    Time { format: TimeFormat },
    /// Identifier field. Encodes its configured value exactly like [`FieldKind::Value`].
    Id,
}

/// Inputs supplied by the header composer when encoding one header.
#[derive(Clone, Copy)]
pub struct EncodeContext<'a> {
    /// Payload length in bytes of the message being built.
    pub payload_bytes: u32,
    /// Total header length in bits (max of `pos + size` over all fields).
    pub header_bits: u32,
    pub clock: &'a dyn Clock,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub pos: u32,
    pub size: u32,
    pub value: i64,
    pub endianness: Endianness,
    pub swap_words: bool,
    pub invert_bits: bool,
    pub kind: FieldKind,
}

impl Field {
    /// Last bit (exclusive) covered by this field.
    pub fn end_bit(&self) -> u32 {
        self.pos + self.size
    }

    /// Grow `header_bits` so it covers this field.
    pub fn update_header_bits(&self, header_bits: &mut u32) {
        if *header_bits < self.end_bit() {
            *header_bits = self.end_bit();
        }
    }

    /// Raw value before the endianness/swap transforms.
    pub fn source_value(&self, ctx: &EncodeContext<'_>) -> i64 {
        match &self.kind {
            FieldKind::Value | FieldKind::Id => self.value,
            FieldKind::Size { unit, scope } => {
                size_value(ctx.payload_bytes, ctx.header_bits, *unit, *scope) as i64
            }
            FieldKind::Time { format } => match format {
                TimeFormat::Milliseconds => ctx.clock.day_milliseconds() as i64,
                TimeFormat::Microseconds => ctx.clock.day_microseconds() as i64,
                TimeFormat::DianePacked => diane_value(ctx.clock.day_microseconds()) as i64,
            },
        }
    }

    /// Value after the endianness and word-swap transforms.
    pub fn transformed_value(&self, ctx: &EncodeContext<'_>) -> i64 {
        let mut v = self.source_value(ctx);
        if self.endianness == Endianness::Big {
            v = reverse_container(v);
        }
        if self.swap_words {
            v = ((v & 0x0000_FFFF) << 16) | ((v & 0xFFFF_0000) >> 16);
        }
        v
    }

    /// Write this field into `buf`, zero-extending it to cover the field first.
    pub fn encode(&self, buf: &mut Vec<u8>, ctx: &EncodeContext<'_>) {
        let v = self.transformed_value(ctx);
        let natural = natural_width(v);
        if natural < self.size {
            debug!(
                field = %self.name,
                size = self.size,
                value = v,
                natural,
                "value padded with zeros to field size"
            );
        } else if natural > self.size {
            debug!(
                field = %self.name,
                size = self.size,
                value = v,
                natural,
                "value truncated to field size"
            );
        }
        let width = self.size;

        let end_byte = self.end_bit().div_ceil(8) as usize;
        if buf.len() < end_byte {
            buf.resize(end_byte, 0);
        }

        for i in 0..self.size {
            let src = if self.invert_bits { i } else { width - 1 - i };
            put_bit(buf, self.pos as usize + i as usize, bit_of(v, src));
        }
    }
}

/// Byte-reverse the full 64-bit container.
fn reverse_container(v: i64) -> i64 {
    let mut raw = [0u8; 8];
    LittleEndian::write_i64(&mut raw, v);
    BigEndian::read_i64(&raw)
}

/// Number of significant bits of `v` (0 for 0); negative values count the magnitude.
pub fn natural_width(v: i64) -> u32 {
    64 - v.unsigned_abs().leading_zeros()
}

/// Bit `idx` of `v`; indices past 63 read the sign.
fn bit_of(v: i64, idx: u32) -> u8 {
    if idx >= 64 {
        (v < 0) as u8
    } else {
        ((v >> idx) & 1) as u8
    }
}

/// OR one bit into the MSB-first buffer. Positions past the end are dropped.
pub fn put_bit(buf: &mut [u8], pos: usize, bit: u8) {
    if pos < 8 * buf.len() {
        buf[pos / 8] |= (bit & 1) << (7 - pos % 8);
    }
}

/// Size field value: covered bits rounded up to whole `unit`s.
pub fn size_value(payload_bytes: u32, header_bits: u32, unit: SizeUnit, scope: SizeScope) -> u64 {
    let mut bits = 8 * u64::from(payload_bytes);
    if scope == SizeScope::IncludingHeader {
        bits += 8 * u64::from(header_bits).div_ceil(8);
    }
    bits.div_ceil(unit.bits())
}

/// Render bytes as space-separated binary octets (debug helper).
pub fn format_bits(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:08b}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;

    const CLOCK: FixedClock = FixedClock(0);

    fn ctx(payload_bytes: u32, header_bits: u32) -> EncodeContext<'static> {
        EncodeContext {
            payload_bytes,
            header_bits,
            clock: &CLOCK,
        }
    }

    fn value_field(pos: u32, size: u32, value: i64) -> Field {
        Field {
            name: format!("f{}", pos),
            pos,
            size,
            value,
            endianness: Endianness::Little,
            swap_words: false,
            invert_bits: false,
            kind: FieldKind::Value,
        }
    }

    fn encode_one(f: &Field) -> Vec<u8> {
        let mut buf = Vec::new();
        f.encode(&mut buf, &ctx(0, f.end_bit()));
        buf
    }

    #[test]
    fn byte_aligned_value() {
        assert_eq!(encode_one(&value_field(0, 8, 16)), vec![16]);
        assert_eq!(encode_one(&value_field(8, 8, 90)), vec![0, 90]);
        assert_eq!(encode_one(&value_field(0, 16, 52275)), vec![204, 51]);
    }

    #[test]
    fn unaligned_value_spans_bytes() {
        // 519 = 10_0000_0111 on 10 bits at bit 16
        assert_eq!(encode_one(&value_field(16, 10, 519)), vec![0, 0, 129, 192]);
        // 5 = 101 on 3 bits at bit 56
        let buf = encode_one(&value_field(56, 3, 5));
        assert_eq!(buf.len(), 8);
        assert_eq!(buf[7], 160);
    }

    #[test]
    fn padding_keeps_value_right_aligned() {
        assert_eq!(encode_one(&value_field(0, 16, 2)), vec![0, 2]);
    }

    #[test]
    fn truncation_keeps_low_bits() {
        // 0x1FF needs 9 bits, only the low 4 are written
        assert_eq!(encode_one(&value_field(0, 4, 0x1FF)), vec![0xF0]);
    }

    #[test]
    fn invert_writes_lsb_first() {
        let mut f = value_field(0, 8, 1);
        f.invert_bits = true;
        assert_eq!(encode_one(&f), vec![0x80]);
        f.value = 0b0000_0110;
        assert_eq!(encode_one(&f), vec![0b0110_0000]);
    }

    #[test]
    fn big_endian_reverses_whole_container() {
        let mut f = value_field(0, 16, 2);
        f.endianness = Endianness::Big;
        // 2 becomes 0x0200_0000_0000_0000; the low 16 bits are zero.
        assert_eq!(encode_one(&f), vec![0, 0]);

        let mut wide = value_field(0, 64, 1);
        wide.endianness = Endianness::Big;
        assert_eq!(encode_one(&wide), vec![1, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn word_swap_exchanges_low_halves() {
        let mut f = value_field(0, 32, 0x0001_0002);
        f.swap_words = true;
        assert_eq!(encode_one(&f), vec![0x00, 0x02, 0x00, 0x01]);

        // bits above 32 do not survive the swap
        f.value = 0x1_0000_0000_0003;
        assert_eq!(encode_one(&f), vec![0x00, 0x03, 0x00, 0x00]);
    }

    #[test]
    fn encoding_never_shrinks_buffer() {
        let mut buf = vec![0u8; 6];
        value_field(0, 8, 7).encode(&mut buf, &ctx(0, 8));
        assert_eq!(buf, vec![7, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn out_of_range_bit_is_dropped() {
        let mut buf = vec![0u8; 1];
        put_bit(&mut buf, 8, 1);
        put_bit(&mut buf, 7, 1);
        assert_eq!(buf, vec![1]);
    }

    #[test]
    fn natural_width_counts_significant_bits() {
        assert_eq!(natural_width(0), 0);
        assert_eq!(natural_width(1), 1);
        assert_eq!(natural_width(52275), 16);
        assert_eq!(natural_width(-1), 1);
        assert_eq!(natural_width(i64::MIN), 64);
    }

    #[test]
    fn size_value_rounds_up() {
        assert_eq!(size_value(19, 48, SizeUnit::U8, SizeScope::ExcludingHeader), 19);
        assert_eq!(size_value(100, 48, SizeUnit::U16, SizeScope::ExcludingHeader), 50);
        // 100 bytes + 7 header bytes = 856 bits -> 53.5 words -> 54
        assert_eq!(size_value(100, 56, SizeUnit::U16, SizeScope::IncludingHeader), 54);
        // header of 59 bits counts as 8 bytes
        assert_eq!(size_value(10, 59, SizeUnit::U8, SizeScope::IncludingHeader), 18);
        assert_eq!(size_value(10, 59, SizeUnit::U32, SizeScope::IncludingHeader), 5);
    }

    #[test]
    fn size_field_uses_context() {
        let f = Field {
            kind: FieldKind::Size {
                unit: SizeUnit::U8,
                scope: SizeScope::ExcludingHeader,
            },
            ..value_field(48, 8, 0)
        };
        let mut buf = Vec::new();
        f.encode(&mut buf, &ctx(19, 72));
        assert_eq!(buf[6], 19);
    }

    #[test]
    fn time_field_reads_clock() {
        let clock = FixedClock(66_100_045);
        let c = EncodeContext {
            payload_bytes: 0,
            header_bits: 64,
            clock: &clock,
        };
        let mut f = Field {
            kind: FieldKind::Time {
                format: TimeFormat::Microseconds,
            },
            ..value_field(0, 32, 0)
        };
        assert_eq!(f.source_value(&c), 66_100_045);
        f.kind = FieldKind::Time {
            format: TimeFormat::Milliseconds,
        };
        assert_eq!(f.source_value(&c), 66_100);
        f.kind = FieldKind::Time {
            format: TimeFormat::DianePacked,
        };
        assert_eq!(f.source_value(&c), 26_169_573_421);
    }

    #[test]
    fn id_field_passes_value_through() {
        let f = Field {
            kind: FieldKind::Id,
            ..value_field(0, 16, 52275)
        };
        assert_eq!(encode_one(&f), vec![204, 51]);
    }

    #[test]
    fn format_bits_renders_octets() {
        assert_eq!(format_bits(&[137, 0]), "10001001 00000000");
    }

    #[test]
    fn zero_width_field_writes_nothing() {
        let mut buf = Vec::new();
        value_field(0, 0, 5).encode(&mut buf, &ctx(0, 0));
        assert!(buf.is_empty());
        value_field(12, 0, 5).encode(&mut buf, &ctx(0, 12));
        assert_eq!(buf, vec![0, 0]);
    }
}
