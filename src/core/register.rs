//! The hardware register file: a dense, indexed array of 1,024 32-bit
//! words, and the bitfield views documented in `spec.md` §4.1.
//!
//! Registers are partitioned into four regions (FBI base `0x000`, TMU0 base
//! `0x100`, TMU1 base `0x200`, TMU2 base `0x300`); each TMU's register
//! window is the primary entry point into its own pipeline state. The
//! register file itself is dumb storage — all semantics live in the
//! bitfield wrapper types below, which are zero-cost views over a copied
//! `u32` and carry no state of their own.

pub const FBI_BASE: usize = 0x000;
pub const TMU0_BASE: usize = 0x100;
pub const TMU1_BASE: usize = 0x200;
#[allow(dead_code)]
pub const TMU2_BASE: usize = 0x300;

// Offsets within a region, in words, for the registers whose bitfields are
// documented in spec.md §4.1. Per-TMU registers are read at `TMUn_BASE + offset`.
pub const REG_FBZ_COLOR_PATH: usize = 0x00;
pub const REG_FBZ_MODE: usize = 0x01;
pub const REG_ALPHA_MODE: usize = 0x02;
pub const REG_FOG_MODE: usize = 0x03;
pub const REG_ZA_COLOR: usize = 0x04;
pub const REG_CHROMA_KEY: usize = 0x05;
pub const REG_CHROMA_RANGE: usize = 0x06;
pub const REG_CLIP_LEFT_RIGHT: usize = 0x07;
pub const REG_CLIP_LOW_Y_HIGH_Y: usize = 0x08;
pub const REG_COLOR0: usize = 0x09;
pub const REG_COLOR1: usize = 0x0A;
pub const REG_STIPPLE: usize = 0x0B;
pub const REG_FOG_COLOR: usize = 0x0C;

pub const REG_TEXTURE_MODE: usize = 0x00;
pub const REG_T_LOD: usize = 0x01;

const WORD_COUNT: usize = 1024;

#[derive(Debug)]
pub struct RegisterFile {
    words: [u32; WORD_COUNT],
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self { words: [0; WORD_COUNT] }
    }
}

impl RegisterFile {
    pub fn read(&self, index: usize) -> u32 {
        self.words[index]
    }

    pub fn write(&mut self, index: usize, value: u32) {
        self.words[index] = value;
    }

    pub fn read_f32(&self, index: usize) -> f32 {
        f32::from_bits(self.words[index])
    }

    pub fn write_f32(&mut self, index: usize, value: f32) {
        self.words[index] = value.to_bits();
    }

    /// The same four bytes viewed as packed `0xAARRGGBB`.
    pub fn read_rgba(&self, index: usize) -> [u8; 4] {
        self.words[index].to_le_bytes()
    }

    pub fn write_rgba(&mut self, index: usize, rgba: [u8; 4]) {
        self.words[index] = u32::from_le_bytes(rgba);
    }

    pub fn fbz_color_path(&self) -> FbzColorPath {
        FbzColorPath(self.words[FBI_BASE + REG_FBZ_COLOR_PATH])
    }

    pub fn set_fbz_color_path(&mut self, v: u32) {
        self.words[FBI_BASE + REG_FBZ_COLOR_PATH] = v;
    }

    pub fn fbz_mode(&self) -> FbzMode {
        FbzMode(self.words[FBI_BASE + REG_FBZ_MODE])
    }

    pub fn set_fbz_mode(&mut self, v: u32) {
        self.words[FBI_BASE + REG_FBZ_MODE] = v;
    }

    pub fn alpha_mode(&self) -> AlphaMode {
        AlphaMode(self.words[FBI_BASE + REG_ALPHA_MODE])
    }

    pub fn set_alpha_mode(&mut self, v: u32) {
        self.words[FBI_BASE + REG_ALPHA_MODE] = v;
    }

    pub fn fog_mode(&self) -> FogMode {
        FogMode(self.words[FBI_BASE + REG_FOG_MODE])
    }

    pub fn set_fog_mode(&mut self, v: u32) {
        self.words[FBI_BASE + REG_FOG_MODE] = v;
    }

    pub fn za_color(&self) -> u32 {
        self.words[FBI_BASE + REG_ZA_COLOR]
    }

    pub fn set_za_color(&mut self, v: u32) {
        self.words[FBI_BASE + REG_ZA_COLOR] = v;
    }

    pub fn chroma_key(&self) -> u32 {
        self.words[FBI_BASE + REG_CHROMA_KEY]
    }

    pub fn set_chroma_key(&mut self, v: u32) {
        self.words[FBI_BASE + REG_CHROMA_KEY] = v;
    }

    pub fn chroma_range(&self) -> u32 {
        self.words[FBI_BASE + REG_CHROMA_RANGE]
    }

    pub fn set_chroma_range(&mut self, v: u32) {
        self.words[FBI_BASE + REG_CHROMA_RANGE] = v;
    }

    pub fn clip_left_right(&self) -> (u32, u32) {
        let w = self.words[FBI_BASE + REG_CLIP_LEFT_RIGHT];
        (w & 0x3FF, (w >> 16) & 0x3FF)
    }

    pub fn set_clip_left_right(&mut self, left: u32, right: u32) {
        self.words[FBI_BASE + REG_CLIP_LEFT_RIGHT] = (left & 0x3FF) | ((right & 0x3FF) << 16);
    }

    pub fn clip_low_y_high_y(&self) -> (u32, u32) {
        let w = self.words[FBI_BASE + REG_CLIP_LOW_Y_HIGH_Y];
        (w & 0x3FF, (w >> 16) & 0x3FF)
    }

    pub fn set_clip_low_y_high_y(&mut self, top: u32, bottom: u32) {
        self.words[FBI_BASE + REG_CLIP_LOW_Y_HIGH_Y] = (top & 0x3FF) | ((bottom & 0x3FF) << 16);
    }

    pub fn color0(&self) -> [u8; 4] {
        self.read_rgba(FBI_BASE + REG_COLOR0)
    }

    pub fn set_color0(&mut self, rgba: [u8; 4]) {
        self.write_rgba(FBI_BASE + REG_COLOR0, rgba);
    }

    pub fn color1(&self) -> [u8; 4] {
        self.read_rgba(FBI_BASE + REG_COLOR1)
    }

    pub fn set_color1(&mut self, rgba: [u8; 4]) {
        self.write_rgba(FBI_BASE + REG_COLOR1, rgba);
    }

    pub fn stipple(&self) -> u32 {
        self.words[FBI_BASE + REG_STIPPLE]
    }

    pub fn set_stipple(&mut self, v: u32) {
        self.words[FBI_BASE + REG_STIPPLE] = v;
    }

    /// The fog blend target color (`grFogColor`-equivalent), distinct from
    /// the `color1` constant-color combine input. `spec.md` §6 "State".
    pub fn fog_color(&self) -> [u8; 4] {
        self.read_rgba(FBI_BASE + REG_FOG_COLOR)
    }

    pub fn set_fog_color(&mut self, rgba: [u8; 4]) {
        self.write_rgba(FBI_BASE + REG_FOG_COLOR, rgba);
    }

    pub fn texture_mode(&self, tmu_base: usize) -> TextureMode {
        TextureMode(self.words[tmu_base + REG_TEXTURE_MODE])
    }

    pub fn set_texture_mode(&mut self, tmu_base: usize, v: u32) {
        self.words[tmu_base + REG_TEXTURE_MODE] = v;
    }

    pub fn t_lod(&self, tmu_base: usize) -> TLod {
        TLod(self.words[tmu_base + REG_T_LOD])
    }

    pub fn set_t_lod(&mut self, tmu_base: usize, v: u32) {
        self.words[tmu_base + REG_T_LOD] = v;
    }

    /// `grColorCombine`-equivalent: sets the RGB combine's "other" source
    /// select, local-color select, and its arithmetic recipe (function,
    /// factor, invert), then re-derives the texture-enable bit from both
    /// combines' source selects. `spec.md` §4.2, §8 invariant 3.
    pub fn set_color_combine(&mut self, other: u32, local_is_constant: bool, function: u32, factor: u32, invert: bool) {
        let mut raw = self.fbz_color_path().0;
        raw = (raw & !0x3) | (other & 0x3);
        raw = if local_is_constant { raw | (1 << 4) } else { raw & !(1 << 4) };
        raw = apply_combine_recipe(raw, function, factor, invert);
        self.set_fbz_color_path(raw);
        self.recompute_texture_enable();
    }

    /// `grAlphaCombine`-equivalent: sets the alpha combine's "other" source
    /// select, local-alpha select (iterated, texture alpha, or constant),
    /// and its arithmetic recipe, then re-derives the texture-enable bit.
    /// `spec.md` §4.2, §8 invariant 3.
    pub fn set_alpha_combine(&mut self, other: u32, local: u32, function: u32, factor: u32, invert: bool) {
        let mut raw = self.fbz_color_path().0;
        raw = (raw & !(0x3 << 2)) | ((other & 0x3) << 2);
        raw = (raw & !(0x3 << 5)) | ((local & 0x3) << 5);
        raw = apply_combine_recipe(raw, function, factor, invert);
        self.set_fbz_color_path(raw);
        self.recompute_texture_enable();
    }

    /// Re-derives `fbzColorPath`'s texture-enable bit (27) as the union of
    /// "RGB combine needs texture" and "alpha combine needs texture", per
    /// `spec.md` §8 invariant 3. Every combine setter calls this after
    /// updating its own source select, so the bit always reflects the
    /// latest state of both combines.
    fn recompute_texture_enable(&mut self) {
        let fbz = self.fbz_color_path();
        let needs_texture = fbz.rgb_needs_texture() || fbz.alpha_needs_texture();
        let raw = if needs_texture { fbz.0 | (1 << 27) } else { fbz.0 & !(1 << 27) };
        self.set_fbz_color_path(raw);
    }
}

/// Shared color/alpha combine recipe bits: zero-other, subtract-local,
/// m-select (blend factor), reverse-blend, add-local-rgb, add-local-alpha,
/// invert-output. Both `grColorCombine` and `grAlphaCombine` share this
/// layout (bits 8-16 of `fbzColorPath`), the same shape `TextureCombine`
/// uses for the per-TMU combine unit. `factor` packs the 3-bit m-select in
/// its low bits and the reverse-blend flag in bit 3, mirroring how
/// `BlendFactor`'s codes fold "one-minus" variants into the factor select
/// rather than a separate parameter. `spec.md` §4.2.
fn apply_combine_recipe(raw: u32, function: u32, factor: u32, invert: bool) -> u32 {
    const RECIPE_MASK: u32 = (1 << 8) | (1 << 9) | (0x7 << 10) | (1 << 13) | (1 << 14) | (1 << 15) | (1 << 16);
    let mut bits = (factor & 0x7) << 10;
    if factor & 0x8 != 0 {
        bits |= 1 << 13;
    }
    bits |= match function & 0x7 {
        0 => 1 << 8,                 // zero: out = 0
        1 => (1 << 8) | (1 << 14),   // local: out = c_local
        2 => (1 << 8) | (1 << 15),   // local alpha: out = a_local
        3 => 0,                      // scale-other: out = other * factor
        4 => 1 << 14,                // out = other * factor + c_local
        5 => 1 << 15,                // out = other * factor + a_local
        6 => 1 << 9,                 // out = (other - c_local) * factor
        _ => (1 << 9) | (1 << 14),   // out = (other - c_local) * factor + c_local
    };
    if invert {
        bits |= 1 << 16;
    }
    (raw & !RECIPE_MASK) | bits
}

/// Color/alpha combine source selects and arithmetic flags. `spec.md` §4.1.
#[derive(Debug, Clone, Copy)]
pub struct FbzColorPath(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSource {
    Iterated,
    Texture,
    Color1,
    LfbOrTexture,
}

impl FbzColorPath {
    pub fn rgb_select(self) -> ColorSource {
        match self.0 & 0x3 {
            0 => ColorSource::Iterated,
            1 => ColorSource::Texture,
            2 => ColorSource::Color1,
            _ => ColorSource::LfbOrTexture,
        }
    }

    pub fn a_select(self) -> ColorSource {
        match (self.0 >> 2) & 0x3 {
            0 => ColorSource::Iterated,
            1 => ColorSource::Texture,
            2 => ColorSource::Color1,
            _ => ColorSource::LfbOrTexture,
        }
    }

    pub fn local_color_select(self) -> bool {
        (self.0 >> 4) & 1 != 0
    }

    pub fn local_alpha_select(self) -> u32 {
        (self.0 >> 5) & 0x3
    }

    pub fn zero_other(self) -> bool {
        (self.0 >> 8) & 1 != 0
    }

    pub fn sub_c_local(self) -> bool {
        (self.0 >> 9) & 1 != 0
    }

    pub fn m_select(self) -> u32 {
        (self.0 >> 10) & 0x7
    }

    pub fn reverse_blend(self) -> bool {
        (self.0 >> 13) & 1 != 0
    }

    pub fn add_c_local(self) -> bool {
        (self.0 >> 14) & 1 != 0
    }

    pub fn add_a_local(self) -> bool {
        (self.0 >> 15) & 1 != 0
    }

    pub fn invert_output(self) -> bool {
        (self.0 >> 16) & 1 != 0
    }

    pub fn texture_enable(self) -> bool {
        (self.0 >> 27) & 1 != 0
    }

    pub fn rgbzw_clamp(self) -> bool {
        (self.0 >> 28) & 1 != 0
    }

    /// Whether the RGB combine, as configured, needs a texture sample.
    pub fn rgb_needs_texture(self) -> bool {
        matches!(self.rgb_select(), ColorSource::Texture)
    }

    /// Whether the alpha combine, as configured, needs a texture sample.
    pub fn alpha_needs_texture(self) -> bool {
        matches!(self.a_select(), ColorSource::Texture)
    }
}

/// Per-pixel control flags: clipping, chroma key, stipple, depth, dither,
/// buffer write masks. `spec.md` §4.1.
#[derive(Debug, Clone, Copy)]
pub struct FbzMode(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthFunction {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

impl DepthFunction {
    fn from_bits(bits: u32) -> Self {
        match bits & 0x7 {
            0 => DepthFunction::Never,
            1 => DepthFunction::Less,
            2 => DepthFunction::Equal,
            3 => DepthFunction::LessEqual,
            4 => DepthFunction::Greater,
            5 => DepthFunction::NotEqual,
            6 => DepthFunction::GreaterEqual,
            _ => DepthFunction::Always,
        }
    }

    pub fn passes(self, src: u16, dst: u16) -> bool {
        match self {
            DepthFunction::Never => false,
            DepthFunction::Less => src < dst,
            DepthFunction::Equal => src == dst,
            DepthFunction::LessEqual => src <= dst,
            DepthFunction::Greater => src > dst,
            DepthFunction::NotEqual => src != dst,
            DepthFunction::GreaterEqual => src >= dst,
            DepthFunction::Always => true,
        }
    }
}

impl FbzMode {
    pub fn enable_clipping(self) -> bool {
        self.0 & 1 != 0
    }

    pub fn enable_chromakey(self) -> bool {
        (self.0 >> 1) & 1 != 0
    }

    pub fn enable_stipple(self) -> bool {
        (self.0 >> 2) & 1 != 0
    }

    pub fn w_buffer_select(self) -> bool {
        (self.0 >> 3) & 1 != 0
    }

    pub fn enable_depthbuf(self) -> bool {
        (self.0 >> 4) & 1 != 0
    }

    pub fn depth_function(self) -> DepthFunction {
        DepthFunction::from_bits(self.0 >> 5)
    }

    pub fn enable_dithering(self) -> bool {
        (self.0 >> 8) & 1 != 0
    }

    pub fn rgb_buffer_mask(self) -> bool {
        (self.0 >> 9) & 1 != 0
    }

    pub fn aux_buffer_mask(self) -> bool {
        (self.0 >> 10) & 1 != 0
    }

    pub fn dither_2x2(self) -> bool {
        (self.0 >> 11) & 1 != 0
    }

    pub fn stipple_pattern_mode(self) -> bool {
        (self.0 >> 12) & 1 != 0
    }

    pub fn enable_alpha_mask(self) -> bool {
        (self.0 >> 13) & 1 != 0
    }

    pub fn enable_depth_bias(self) -> bool {
        (self.0 >> 16) & 1 != 0
    }

    pub fn y_origin_inverted(self) -> bool {
        (self.0 >> 17) & 1 != 0
    }

    pub fn enable_alpha_planes(self) -> bool {
        (self.0 >> 18) & 1 != 0
    }

    pub fn alpha_dither_subtract(self) -> bool {
        (self.0 >> 19) & 1 != 0
    }

    pub fn depth_source_compare(self) -> bool {
        (self.0 >> 20) & 1 != 0
    }

    pub fn depth_float_select(self) -> bool {
        (self.0 >> 21) & 1 != 0
    }
}

/// Alpha test and alpha blend configuration. `spec.md` §4.1.
#[derive(Debug, Clone, Copy)]
pub struct AlphaMode(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlphaFunction {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

impl AlphaFunction {
    fn from_bits(bits: u32) -> Self {
        match bits & 0x7 {
            0 => AlphaFunction::Never,
            1 => AlphaFunction::Less,
            2 => AlphaFunction::Equal,
            3 => AlphaFunction::LessEqual,
            4 => AlphaFunction::Greater,
            5 => AlphaFunction::NotEqual,
            6 => AlphaFunction::GreaterEqual,
            _ => AlphaFunction::Always,
        }
    }

    pub fn passes(self, value: u8, reference: u8) -> bool {
        match self {
            AlphaFunction::Never => false,
            AlphaFunction::Less => value < reference,
            AlphaFunction::Equal => value == reference,
            AlphaFunction::LessEqual => value <= reference,
            AlphaFunction::Greater => value > reference,
            AlphaFunction::NotEqual => value != reference,
            AlphaFunction::GreaterEqual => value >= reference,
            AlphaFunction::Always => true,
        }
    }
}

/// One of the four blend-factor slots (src-rgb, dst-rgb, src-a, dst-a).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendFactor {
    Zero,
    SrcAlpha,
    SrcColor,
    DstAlpha,
    OneMinusSrcAlpha,
    DstColor,
    OneMinusDstColor,
    OneMinusDstAlpha,
    AlphaSaturateOrPrefog,
    One,
    OneMinusSrcColor,
    Reserved,
}

impl BlendFactor {
    fn from_bits(bits: u32) -> Self {
        match bits & 0xF {
            0 => BlendFactor::Zero,
            1 => BlendFactor::SrcAlpha,
            2 => BlendFactor::SrcColor,
            3 => BlendFactor::DstAlpha,
            4 => BlendFactor::OneMinusSrcAlpha,
            5 => BlendFactor::DstColor,
            6 => BlendFactor::OneMinusDstColor,
            7 => BlendFactor::OneMinusDstAlpha,
            15 => BlendFactor::AlphaSaturateOrPrefog,
            9 => BlendFactor::One,
            10 => BlendFactor::OneMinusSrcColor,
            _ => BlendFactor::Reserved,
        }
    }
}

impl AlphaMode {
    pub fn alpha_test_enable(self) -> bool {
        self.0 & 1 != 0
    }

    pub fn alpha_function(self) -> AlphaFunction {
        AlphaFunction::from_bits(self.0 >> 1)
    }

    pub fn alpha_blend_enable(self) -> bool {
        (self.0 >> 4) & 1 != 0
    }

    pub fn src_rgb_factor(self) -> BlendFactor {
        BlendFactor::from_bits(self.0 >> 8)
    }

    pub fn dst_rgb_factor(self) -> BlendFactor {
        BlendFactor::from_bits(self.0 >> 12)
    }

    pub fn src_alpha_factor(self) -> BlendFactor {
        BlendFactor::from_bits(self.0 >> 16)
    }

    pub fn dst_alpha_factor(self) -> BlendFactor {
        BlendFactor::from_bits(self.0 >> 20)
    }

    pub fn alpha_reference(self) -> u8 {
        ((self.0 >> 24) & 0xFF) as u8
    }
}

/// Fog enable and source selection. `spec.md` §4.1.
#[derive(Debug, Clone, Copy)]
pub struct FogMode(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FogSource {
    WTable,
    IteratedAlpha,
    IteratedZ,
    FogCoord,
}

impl FogMode {
    pub fn enable(self) -> bool {
        self.0 & 1 != 0
    }

    pub fn add(self) -> bool {
        (self.0 >> 1) & 1 != 0
    }

    pub fn mult(self) -> bool {
        (self.0 >> 2) & 1 != 0
    }

    pub fn source(self) -> FogSource {
        match (self.0 >> 3) & 0x3 {
            0 => FogSource::WTable,
            1 => FogSource::IteratedAlpha,
            2 => FogSource::IteratedZ,
            _ => FogSource::FogCoord,
        }
    }

    pub fn constant(self) -> bool {
        (self.0 >> 5) & 1 != 0
    }

    pub fn dither(self) -> bool {
        (self.0 >> 6) & 1 != 0
    }

    pub fn zones(self) -> bool {
        (self.0 >> 7) & 1 != 0
    }
}

/// Per-TMU texture mode: filtering, clamping, format, combine unit.
/// `spec.md` §4.1.
#[derive(Debug, Clone, Copy)]
pub struct TextureMode(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFormat {
    Rgb332,
    Yiq422,
    Alpha8,
    Intensity8,
    Ai44,
    Palette8,
    Argb8332,
    Ayiq8422,
    Rgb565,
    Argb1555,
    Argb4444,
    Ai88,
    AlphaPalette88,
}

impl TextureFormat {
    fn from_bits(bits: u32) -> Self {
        match bits & 0xF {
            0x0 => TextureFormat::Rgb332,
            0x1 => TextureFormat::Yiq422,
            0x2 => TextureFormat::Alpha8,
            0x3 => TextureFormat::Intensity8,
            0x4 => TextureFormat::Ai44,
            0x5 => TextureFormat::Palette8,
            0x8 => TextureFormat::Argb8332,
            0x9 => TextureFormat::Ayiq8422,
            0xA => TextureFormat::Rgb565,
            0xB => TextureFormat::Argb1555,
            0xC => TextureFormat::Argb4444,
            0xD => TextureFormat::Ai88,
            0xE => TextureFormat::AlphaPalette88,
            _ => TextureFormat::Rgb565,
        }
    }

    pub fn bytes_per_texel(self) -> usize {
        match self {
            TextureFormat::Rgb332
            | TextureFormat::Yiq422
            | TextureFormat::Alpha8
            | TextureFormat::Intensity8
            | TextureFormat::Ai44
            | TextureFormat::Palette8 => 1,
            _ => 2,
        }
    }

    pub fn is_palette(self) -> bool {
        matches!(self, TextureFormat::Palette8 | TextureFormat::AlphaPalette88)
    }
}

impl TextureMode {
    pub fn perspective(self) -> bool {
        self.0 & 1 != 0
    }

    pub fn min_filter_bilinear(self) -> bool {
        (self.0 >> 1) & 1 != 0
    }

    pub fn mag_filter_bilinear(self) -> bool {
        (self.0 >> 2) & 1 != 0
    }

    pub fn clamp_neg_w(self) -> bool {
        (self.0 >> 3) & 1 != 0
    }

    pub fn lod_dither(self) -> bool {
        (self.0 >> 4) & 1 != 0
    }

    pub fn ncc_select(self) -> bool {
        (self.0 >> 5) & 1 != 0
    }

    pub fn clamp_s(self) -> bool {
        (self.0 >> 6) & 1 != 0
    }

    pub fn clamp_t(self) -> bool {
        (self.0 >> 7) & 1 != 0
    }

    pub fn format(self) -> TextureFormat {
        TextureFormat::from_bits(self.0 >> 8)
    }

    pub fn combine_rgb(self) -> u32 {
        (self.0 >> 12) & 0x1FF
    }

    pub fn combine_alpha(self) -> u32 {
        (self.0 >> 21) & 0x1FF
    }

    pub fn trilinear(self) -> bool {
        (self.0 >> 30) & 1 != 0
    }

    pub fn rgb_combine(self) -> TextureCombine {
        TextureCombine(self.combine_rgb())
    }

    pub fn alpha_combine(self) -> TextureCombine {
        TextureCombine(self.combine_alpha())
    }
}

/// The texture combine unit's field layout, same shape the GLOSSARY
/// describes for `fbzColorPath`'s color combine, packed into the 9 bits
/// `textureMode` reserves for each of RGB (12-20) and alpha (21-29).
/// `spec.md` §4.5 "Texture combine".
#[derive(Debug, Clone, Copy)]
pub struct TextureCombine(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureBlendFactor {
    Zero,
    CLocal,
    AOther,
    ALocal,
    LodDetail,
    LodFraction,
    One,
}

impl TextureCombine {
    pub fn zero_other(self) -> bool {
        self.0 & 1 != 0
    }

    pub fn sub_c_local(self) -> bool {
        (self.0 >> 1) & 1 != 0
    }

    pub fn blend_factor(self) -> TextureBlendFactor {
        match (self.0 >> 2) & 0x7 {
            0 => TextureBlendFactor::Zero,
            1 => TextureBlendFactor::CLocal,
            2 => TextureBlendFactor::AOther,
            3 => TextureBlendFactor::ALocal,
            4 => TextureBlendFactor::LodDetail,
            5 => TextureBlendFactor::LodFraction,
            _ => TextureBlendFactor::One,
        }
    }

    pub fn reverse_blend(self) -> bool {
        (self.0 >> 5) & 1 != 0
    }

    pub fn add_c_local(self) -> bool {
        (self.0 >> 6) & 1 != 0
    }

    pub fn add_a_local(self) -> bool {
        (self.0 >> 7) & 1 != 0
    }

    pub fn invert_output(self) -> bool {
        (self.0 >> 8) & 1 != 0
    }
}

/// Per-TMU LOD configuration. `spec.md` §4.1.
#[derive(Debug, Clone, Copy)]
pub struct TLod(pub u32);

impl TLod {
    /// LOD register fields are 4.2 fixed point; see `fixed::LOD_REGISTER_TO_INTERNAL_SHIFT`.
    pub fn lodmin(self) -> u32 {
        self.0 & 0x3F
    }

    pub fn lodmax(self) -> u32 {
        (self.0 >> 6) & 0x3F
    }

    pub fn lodbias(self) -> u32 {
        (self.0 >> 12) & 0x3F
    }

    pub fn lod_odd(self) -> bool {
        (self.0 >> 18) & 1 != 0
    }

    pub fn lod_tsplit(self) -> bool {
        (self.0 >> 19) & 1 != 0
    }

    pub fn s_is_wider(self) -> bool {
        (self.0 >> 20) & 1 != 0
    }

    pub fn aspect(self) -> u32 {
        (self.0 >> 21) & 0x3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fbz_color_path_decodes_rgb_select() {
        let fbz = FbzColorPath(0b01);
        assert_eq!(fbz.rgb_select(), ColorSource::Texture);
        assert!(fbz.rgb_needs_texture());
    }

    #[test]
    fn texture_enable_bit_survives_round_trip() {
        let mut regs = RegisterFile::default();
        regs.set_fbz_color_path(1 << 27);
        assert!(regs.fbz_color_path().texture_enable());
    }

    #[test]
    fn depth_function_less_matches_spec_semantics() {
        assert!(DepthFunction::Less.passes(10, 20));
        assert!(!DepthFunction::Less.passes(20, 10));
    }

    #[test]
    fn clip_rect_round_trips_through_registers() {
        let mut regs = RegisterFile::default();
        regs.set_clip_left_right(5, 100);
        regs.set_clip_low_y_high_y(3, 80);
        assert_eq!(regs.clip_left_right(), (5, 100));
        assert_eq!(regs.clip_low_y_high_y(), (3, 80));
    }

    #[test]
    fn color_combine_selecting_texture_derives_texture_enable() {
        let mut regs = RegisterFile::default();
        regs.set_color_combine(1, false, 3, 0, false); // other = Texture
        assert!(regs.fbz_color_path().texture_enable());
        assert_eq!(regs.fbz_color_path().rgb_select(), ColorSource::Texture);
    }

    #[test]
    fn alpha_combine_selecting_iterated_clears_texture_enable_when_rgb_does_not_need_it() {
        let mut regs = RegisterFile::default();
        regs.set_color_combine(1, false, 3, 0, false);
        assert!(regs.fbz_color_path().texture_enable());
        regs.set_color_combine(0, false, 3, 0, false); // rgb back to Iterated
        regs.set_alpha_combine(0, 0, 3, 0, false); // alpha stays Iterated too
        assert!(!regs.fbz_color_path().texture_enable());
    }

    #[test]
    fn alpha_combine_never_clears_the_rgb_select_bits() {
        let mut regs = RegisterFile::default();
        regs.set_color_combine(2, false, 3, 0, false); // rgb select = Color1
        regs.set_alpha_combine(1, 1, 3, 0, false); // alpha select = Texture, local = texture-alpha
        assert_eq!(regs.fbz_color_path().rgb_select(), ColorSource::Color1);
        assert_eq!(regs.fbz_color_path().a_select(), ColorSource::Texture);
        assert_eq!(regs.fbz_color_path().local_alpha_select(), 1);
    }
}
