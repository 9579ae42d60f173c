//! Lookup tables built once and shared by every context: the reciprocal/
//! log2 table that drives perspective correction and LOD selection, the
//! ordered-dither tables, and the per-format texel expansion tables.
//!
//! These are the leaves of the dependency order described in `spec.md` §2:
//! everything else in the pipeline is built on top of these.

use std::sync::OnceLock;

const RECIPLOG_LOOKUP_BITS: u32 = 10;
const RECIPLOG_LOOKUP_ENTRIES: usize = 1 << RECIPLOG_LOOKUP_BITS;
/// Fractional bits of the `1/w` output of `fast_reciplog`.
pub const RECIP_OUTPUT_PREC: u32 = 15;
/// Fractional bits of the `log2(w)` output of `fast_reciplog`.
pub const LOG_OUTPUT_PREC: u32 = 8;

struct ReciplogEntry {
    recip: i32,
    log2: i32,
}

/// Paired reciprocal/log2 table sampled at `2^RECIPLOG_LOOKUP_BITS` points
/// across the top bits of a 32-bit unsigned input, linearly interpolated
/// between adjacent samples using the next 8 fractional bits.
struct Reciplog {
    table: Vec<ReciplogEntry>,
}

impl Reciplog {
    fn build() -> Self {
        let mut table = Vec::with_capacity(RECIPLOG_LOOKUP_ENTRIES + 1);
        for i in 0..=RECIPLOG_LOOKUP_ENTRIES {
            // Sample x uniformly in (0, 1] across the lookup domain; the
            // real input is later normalized to this same domain by shifting
            // out leading zero bits (see `fast_reciplog`).
            let x = (i.max(1) as f64) / (RECIPLOG_LOOKUP_ENTRIES as f64);
            let recip = (1.0 / x * (1i64 << RECIP_OUTPUT_PREC) as f64) as i64;
            let log2 = (-x.log2() * (1i64 << LOG_OUTPUT_PREC) as f64) as i64;
            table.push(ReciplogEntry {
                recip: recip.clamp(i32::MIN as i64, i32::MAX as i64) as i32,
                log2: log2.clamp(i32::MIN as i64, i32::MAX as i64) as i32,
            });
        }
        Self { table }
    }

    /// Returns `(1/w, log2(w))` for a nonzero 32-bit unsigned `w`, with
    /// `1/w` in `RECIP_OUTPUT_PREC` fractional bits and `log2(w)` in
    /// `LOG_OUTPUT_PREC` fractional bits (negative when `w < 1`).
    fn reciplog(&self, w: u32) -> (i32, i32) {
        if w == 0 {
            return (i32::MAX, i32::MIN);
        }
        let shift = w.leading_zeros();
        let normalized = (w << shift) as u64; // top bit set
        let index_bits = 32 - RECIPLOG_LOOKUP_BITS;
        let index = (normalized >> index_bits) as usize & (RECIPLOG_LOOKUP_ENTRIES - 1);
        let frac_bits = index_bits - 8;
        let frac = ((normalized >> frac_bits) & 0xFF) as i64;

        let a = &self.table[index];
        let b = &self.table[index + 1];
        let recip = a.recip as i64 + (((b.recip as i64 - a.recip as i64) * frac) >> 8);
        let log2_frac = a.log2 as i64 + (((b.log2 as i64 - a.log2 as i64) * frac) >> 8);

        // log2(w) = log2(normalized) - shift, since normalized = w << shift.
        let log2 = log2_frac - ((shift as i64) << LOG_OUTPUT_PREC);
        (recip as i32, (-log2) as i32)
    }
}

static RECIPLOG: OnceLock<Reciplog> = OnceLock::new();

/// `(1/w, log2(w))`, both fixed-point as documented on [`Reciplog::reciplog`].
pub fn fast_reciplog(w: u32) -> (i32, i32) {
    RECIPLOG.get_or_init(Reciplog::build).reciplog(w)
}

/// Two 4x256x4 tables mapping `(y & 3, 8-bit value, x & 3)` to a dithered
/// 5- or 6-bit output, plus the 2x2 equivalents selected by `fbzMode`'s
/// dither-subtraction-mode bit, built once at startup.
struct DitherTables {
    to5: Vec<u8>,
    to6: Vec<u8>,
    to5_2x2: Vec<u8>,
    to6_2x2: Vec<u8>,
}

const DITHER_MATRIX_4X4: [[i32; 4]; 4] = [
    [0, 8, 2, 10],
    [12, 4, 14, 6],
    [3, 11, 1, 9],
    [15, 7, 13, 5],
];

/// The 2x2 ordered-dither matrix (same 0-15 value space as the 4x4 matrix,
/// tiled across a 2x2 cell instead of 4x4).
const DITHER_MATRIX_2X2: [[i32; 2]; 2] = [[2, 10], [14, 6]];

impl DitherTables {
    fn build() -> Self {
        let mut to5 = vec![0u8; 4 * 256 * 4];
        let mut to6 = vec![0u8; 4 * 256 * 4];
        for y in 0..4usize {
            for v in 0..256usize {
                for x in 0..4usize {
                    let bias = DITHER_MATRIX_4X4[y][x] - 8;
                    let idx = (y * 256 + v) * 4 + x;
                    to5[idx] = (((v as i32 + bias / 2).clamp(0, 255) >> 3) & 0x1F) as u8;
                    to6[idx] = (((v as i32 + bias / 4).clamp(0, 255) >> 2) & 0x3F) as u8;
                }
            }
        }

        let mut to5_2x2 = vec![0u8; 2 * 256 * 2];
        let mut to6_2x2 = vec![0u8; 2 * 256 * 2];
        for y in 0..2usize {
            for v in 0..256usize {
                for x in 0..2usize {
                    let bias = DITHER_MATRIX_2X2[y][x] - 8;
                    let idx = (y * 256 + v) * 2 + x;
                    to5_2x2[idx] = (((v as i32 + bias / 2).clamp(0, 255) >> 3) & 0x1F) as u8;
                    to6_2x2[idx] = (((v as i32 + bias / 4).clamp(0, 255) >> 2) & 0x3F) as u8;
                }
            }
        }

        Self { to5, to6, to5_2x2, to6_2x2 }
    }
}

static DITHER: OnceLock<DitherTables> = OnceLock::new();

#[inline]
pub fn dither_to_5bit(y: u32, value: u8, x: u32) -> u8 {
    let t = DITHER.get_or_init(DitherTables::build);
    t.to5[(((y & 3) as usize) * 256 + value as usize) * 4 + (x & 3) as usize]
}

#[inline]
pub fn dither_to_6bit(y: u32, value: u8, x: u32) -> u8 {
    let t = DITHER.get_or_init(DitherTables::build);
    t.to6[(((y & 3) as usize) * 256 + value as usize) * 4 + (x & 3) as usize]
}

#[inline]
pub fn dither_to_5bit_2x2(y: u32, value: u8, x: u32) -> u8 {
    let t = DITHER.get_or_init(DitherTables::build);
    t.to5_2x2[(((y & 1) as usize) * 256 + value as usize) * 2 + (x & 1) as usize]
}

#[inline]
pub fn dither_to_6bit_2x2(y: u32, value: u8, x: u32) -> u8 {
    let t = DITHER.get_or_init(DitherTables::build);
    t.to6_2x2[(((y & 1) as usize) * 256 + value as usize) * 2 + (x & 1) as usize]
}

/// Compact texel formats that expand through a precomputed lookup table
/// rather than per-texel arithmetic or a palette indirection. See
/// `spec.md` §4.5 "Format decoding" and §6 "Texture formats".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Rgb332,
    Alpha8,
    Intensity8,
    Ai44,
    Rgb565,
    Argb1555,
    Argb4444,
}

impl TableFormat {
    const ALL: [TableFormat; 7] = [
        TableFormat::Rgb332,
        TableFormat::Alpha8,
        TableFormat::Intensity8,
        TableFormat::Ai44,
        TableFormat::Rgb565,
        TableFormat::Argb1555,
        TableFormat::Argb4444,
    ];

    fn decode_rgb332(texel: u32) -> u32 {
        let r3 = (texel >> 5) & 0x7;
        let g3 = (texel >> 2) & 0x7;
        let b2 = texel & 0x3;
        let r = (r3 << 5) | (r3 << 2) | (r3 >> 1);
        let g = (g3 << 5) | (g3 << 2) | (g3 >> 1);
        let b = (b2 << 6) | (b2 << 4) | (b2 << 2) | b2;
        0xFF000000 | (r << 16) | (g << 8) | b
    }

    fn decode_alpha8(texel: u32) -> u32 {
        (texel & 0xFF) << 24
    }

    fn decode_intensity8(texel: u32) -> u32 {
        let i = texel & 0xFF;
        0xFF000000 | (i << 16) | (i << 8) | i
    }

    fn decode_ai44(texel: u32) -> u32 {
        let a4 = (texel >> 4) & 0xF;
        let i4 = texel & 0xF;
        let a = (a4 << 4) | a4;
        let i = (i4 << 4) | i4;
        (a << 24) | (i << 16) | (i << 8) | i
    }

    fn decode_rgb565(texel: u32) -> u32 {
        let r5 = (texel >> 11) & 0x1F;
        let g6 = (texel >> 5) & 0x3F;
        let b5 = texel & 0x1F;
        let r = (r5 << 3) | (r5 >> 2);
        let g = (g6 << 2) | (g6 >> 4);
        let b = (b5 << 3) | (b5 >> 2);
        0xFF000000 | (r << 16) | (g << 8) | b
    }

    fn decode_argb1555(texel: u32) -> u32 {
        let a1 = (texel >> 15) & 0x1;
        let r5 = (texel >> 10) & 0x1F;
        let g5 = (texel >> 5) & 0x1F;
        let b5 = texel & 0x1F;
        let a = if a1 != 0 { 0xFF } else { 0x00 };
        let r = (r5 << 3) | (r5 >> 2);
        let g = (g5 << 3) | (g5 >> 2);
        let b = (b5 << 3) | (b5 >> 2);
        (a << 24) | (r << 16) | (g << 8) | b
    }

    fn decode_argb4444(texel: u32) -> u32 {
        let a4 = (texel >> 12) & 0xF;
        let r4 = (texel >> 8) & 0xF;
        let g4 = (texel >> 4) & 0xF;
        let b4 = texel & 0xF;
        let a = (a4 << 4) | a4;
        let r = (r4 << 4) | r4;
        let g = (g4 << 4) | g4;
        let b = (b4 << 4) | b4;
        (a << 24) | (r << 16) | (g << 8) | b
    }

    fn entries(self) -> usize {
        match self {
            TableFormat::Rgb332 | TableFormat::Alpha8 | TableFormat::Intensity8 | TableFormat::Ai44 => 256,
            TableFormat::Rgb565 | TableFormat::Argb1555 | TableFormat::Argb4444 => 65536,
        }
    }

    fn decode_one(self, texel: u32) -> u32 {
        match self {
            TableFormat::Rgb332 => Self::decode_rgb332(texel),
            TableFormat::Alpha8 => Self::decode_alpha8(texel),
            TableFormat::Intensity8 => Self::decode_intensity8(texel),
            TableFormat::Ai44 => Self::decode_ai44(texel),
            TableFormat::Rgb565 => Self::decode_rgb565(texel),
            TableFormat::Argb1555 => Self::decode_argb1555(texel),
            TableFormat::Argb4444 => Self::decode_argb4444(texel),
        }
    }
}

struct FormatTables {
    tables: std::collections::HashMap<TableFormat, Vec<u32>>,
}

impl FormatTables {
    fn build() -> Self {
        let mut tables = std::collections::HashMap::new();
        for fmt in TableFormat::ALL {
            let table = (0..fmt.entries() as u32).map(|t| fmt.decode_one(t)).collect();
            tables.insert(fmt, table);
        }
        Self { tables }
    }
}

static FORMAT_TABLES: OnceLock<FormatTables> = OnceLock::new();

/// Expand a raw texel through the precomputed table for `format`, yielding
/// ARGB32 (`0xAARRGGBB`).
pub fn decode_table_texel(format: TableFormat, texel: u32) -> u32 {
    let tables = FORMAT_TABLES.get_or_init(FormatTables::build);
    tables.tables[&format][texel as usize]
}

/// AI88: per-texel arithmetic expansion rather than a lookup table, per
/// `spec.md` §4.5 "Format decoding" (c).
#[inline]
pub fn decode_ai88(texel: u32) -> u32 {
    let a = (texel >> 8) & 0xFF;
    let i = texel & 0xFF;
    (a << 24) | (i << 16) | (i << 8) | i
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reciplog_of_one_is_identity() {
        let (recip, log2) = fast_reciplog(1 << 30);
        // w = 2^30 normalizes to the top of the table; log2 should be near 30.
        assert!((log2 - (30 << LOG_OUTPUT_PREC as i32)).abs() < (1 << LOG_OUTPUT_PREC as i32));
        assert!(recip > 0);
    }

    #[test]
    fn rgb565_round_trips_pure_channels() {
        let argb = decode_table_texel(TableFormat::Rgb565, 0xF800); // pure red
        assert_eq!(argb & 0x00FF0000, 0x00FF0000);
        assert_eq!(argb & 0x0000FFFF, 0);
    }

    #[test]
    fn argb1555_alpha_bit_is_all_or_nothing() {
        assert_eq!(decode_table_texel(TableFormat::Argb1555, 0x0000) >> 24, 0);
        assert_eq!(decode_table_texel(TableFormat::Argb1555, 0x8000) >> 24, 0xFF);
    }

    #[test]
    fn dither_2x2_table_is_distinct_from_4x4_at_the_same_coordinate() {
        // At (0,0) the 4x4 matrix biases by 0 and the 2x2 matrix by 2; at
        // v = 11 that difference crosses a >>3 quantization boundary.
        let v4 = dither_to_5bit(0, 11, 0);
        let v2 = dither_to_5bit_2x2(0, 11, 0);
        assert_ne!(v4, v2);
    }

    #[test]
    fn dither_table_is_monotonic_within_two_steps() {
        let mut prev = dither_to_5bit(0, 0, 0);
        for v in 1..=255u8 {
            let cur = dither_to_5bit(0, v, 0);
            assert!(cur as i32 - prev as i32 <= 1);
            prev = cur;
        }
    }
}
