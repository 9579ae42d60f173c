//! Texture Mapping Unit state: local texture RAM, palette storage, and the
//! per-triangle iteration/LOD configuration. `spec.md` §3 "TMU" and §4.5.

use crate::core::register::TLod;

pub const TMU_RAM_BYTES: usize = 2 * 1024 * 1024;
const MAX_LOD_LEVELS: usize = 8;

/// One region of TMU RAM holding an 8-bit palette-indexed texture, recorded
/// so `grTexDownloadTable`-loaded palettes can be reapplied on reconvert
/// without re-uploading texel data. `spec.md` §8 invariant 7.
#[derive(Debug, Clone, Copy)]
pub struct PaletteRegion {
    pub start_addr: u32,
    pub num_texels: u32,
}

pub struct TmuState {
    pub ram: Vec<u8>,
    pub palette_regions: Vec<PaletteRegion>,
    pub palette: [u32; 256],
    pub alpha_palette: [u32; 256],

    /// Per-mipmap-level byte offset into `ram`, indexed by LOD level 0..8.
    pub lod_offset: [u32; MAX_LOD_LEVELS],
    pub lodmin: i32,
    pub lodmax: i32,
    pub lodbias: i32,
    pub wmask: u32,
    pub hmask: u32,

    pub s: ParamIter,
    pub t: ParamIter,
    pub w: ParamIter,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ParamIter {
    pub start: f64,
    pub dx: f64,
    pub dy: f64,
}

impl TmuState {
    pub fn new() -> Self {
        Self {
            ram: vec![0u8; TMU_RAM_BYTES],
            palette_regions: Vec::new(),
            palette: [0; 256],
            alpha_palette: [0; 256],
            lod_offset: [0; MAX_LOD_LEVELS],
            lodmin: 0,
            lodmax: 0,
            lodbias: 0,
            wmask: 0,
            hmask: 0,
            s: ParamIter::default(),
            t: ParamIter::default(),
            w: ParamIter::default(),
        }
    }

    /// Applies a register-file `tLOD` value, converting the 4.2-scaled
    /// `lodmin`/`lodmax`/`lodbias` fields to internal `LOD_FRAC_BITS`
    /// precision. See `fixed::LOD_REGISTER_TO_INTERNAL_SHIFT`.
    pub fn apply_t_lod(&mut self, t_lod: TLod) {
        use crate::core::fixed::LOD_REGISTER_TO_INTERNAL_SHIFT;
        self.lodmin = (t_lod.lodmin() as i32) << LOD_REGISTER_TO_INTERNAL_SHIFT;
        self.lodmax = (t_lod.lodmax() as i32) << LOD_REGISTER_TO_INTERNAL_SHIFT;
        self.lodbias = (t_lod.lodbias() as i32) << LOD_REGISTER_TO_INTERNAL_SHIFT;
    }

    /// Sets the base width/height mask (`2^n - 1`) used to wrap/clamp S,T
    /// per mipmap level; level `n` halves both masks (floor, minimum 0).
    pub fn set_base_size(&mut self, log2_width: u32, log2_height: u32) {
        self.wmask = (1u32 << log2_width).wrapping_sub(1);
        self.hmask = (1u32 << log2_height).wrapping_sub(1);
    }

    pub fn mask_for_level(&self, level: u32) -> (u32, u32) {
        (self.wmask >> level, self.hmask >> level)
    }

    /// Stores an 8-bit palette table uploaded via `grTexDownloadTable`.
    /// Per the pinned-ambiguity decision, NCC/YIQ tables are accepted but
    /// decode to zero; only P8/AP88 palettes are materialized here.
    pub fn download_palette(&mut self, entries: &[u32; 256], with_alpha: bool) {
        if with_alpha {
            self.alpha_palette = *entries;
        } else {
            self.palette = *entries;
        }
    }

    /// Removes or trims any tracked P8 regions overlapping
    /// `[start, start+len)`, leaving the remaining set non-overlapping.
    fn clear_overlap(&mut self, start: u32, len: u32) {
        let end = start + len;
        let mut kept = Vec::with_capacity(self.palette_regions.len());
        for r in self.palette_regions.drain(..) {
            let r_end = r.start_addr + r.num_texels;
            if r_end <= start || r.start_addr >= end {
                kept.push(r);
                continue;
            }
            if r.start_addr < start {
                kept.push(PaletteRegion { start_addr: r.start_addr, num_texels: start - r.start_addr });
            }
            if r_end > end {
                kept.push(PaletteRegion { start_addr: end, num_texels: r_end - end });
            }
        }
        self.palette_regions = kept;
    }

    /// A non-P8 texel upload landed on `[start, start+len)`: drop any P8
    /// tracking for that range. `spec.md` §3 invariant 4.
    pub fn invalidate_non_palette_upload(&mut self, start: u32, len: u32) {
        self.clear_overlap(start, len);
    }

    /// A P8 texel upload landed on `[start_addr, start_addr+num_texels)`:
    /// record it as paletted, merging with any existing tracked regions so
    /// each byte is covered at most once. `spec.md` §3 invariant 4.
    pub fn record_palette_region(&mut self, start_addr: u32, num_texels: u32) {
        self.clear_overlap(start_addr, num_texels);
        self.palette_regions.push(PaletteRegion { start_addr, num_texels });
    }

    #[inline]
    pub fn read_texel8(&self, byte_offset: usize) -> u8 {
        self.ram[byte_offset]
    }

    #[inline]
    pub fn read_texel16(&self, byte_offset: usize) -> u16 {
        u16::from_le_bytes([self.ram[byte_offset], self.ram[byte_offset + 1]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::register::TLod;

    #[test]
    fn apply_t_lod_scales_register_fields_by_sixty_four() {
        let mut tmu = TmuState::new();
        tmu.apply_t_lod(TLod(0x3F)); // lodmin = 0x3F (6 bits)
        assert_eq!(tmu.lodmin, 0x3F << 6);
    }

    #[test]
    fn mask_for_level_halves_each_step() {
        let mut tmu = TmuState::new();
        tmu.set_base_size(8, 6); // 256x64
        assert_eq!(tmu.mask_for_level(0), (255, 63));
        assert_eq!(tmu.mask_for_level(1), (127, 31));
    }

    #[test]
    fn download_palette_is_independent_of_alpha_palette() {
        let mut tmu = TmuState::new();
        let mut entries = [0u32; 256];
        entries[1] = 0xFF00FF00;
        tmu.download_palette(&entries, false);
        assert_eq!(tmu.palette[1], 0xFF00FF00);
        assert_eq!(tmu.alpha_palette[1], 0);
    }

    #[test]
    fn non_palette_upload_trims_overlapping_p8_region() {
        let mut tmu = TmuState::new();
        tmu.record_palette_region(0, 100);
        tmu.invalidate_non_palette_upload(40, 20);
        assert_eq!(tmu.palette_regions.len(), 2);
        assert_eq!(tmu.palette_regions[0].start_addr, 0);
        assert_eq!(tmu.palette_regions[0].num_texels, 40);
        assert_eq!(tmu.palette_regions[1].start_addr, 60);
        assert_eq!(tmu.palette_regions[1].num_texels, 40);
    }

    #[test]
    fn overlapping_p8_uploads_cover_each_byte_once() {
        let mut tmu = TmuState::new();
        tmu.record_palette_region(0, 50);
        tmu.record_palette_region(30, 50);
        let total: u32 = tmu.palette_regions.iter().map(|r| r.num_texels).sum();
        assert_eq!(total, 80); // [0,30) kept, [30,80) newly recorded — no double coverage
    }
}
