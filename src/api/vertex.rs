//! The default packed vertex layout and the `grVertexLayout`-equivalent
//! remapping table. `spec.md` §6 "Vertex layout contract";
//! `SPEC_FULL.md` §B "Vertex-layout remapping".

use crate::core::setup::InputVertex;

/// The thirteen attributes a vertex may carry, in the order Glide documents
/// them for the default packed layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    X,
    Y,
    Z,
    R,
    G,
    B,
    A,
    Oow,
    Sow0,
    Tow0,
    Sow1,
    Tow1,
    Ooz,
    Fog,
}

const ATTRIBUTE_COUNT: usize = 14;
const ALL_ATTRIBUTES: [Attribute; ATTRIBUTE_COUNT] = [
    Attribute::X,
    Attribute::Y,
    Attribute::Z,
    Attribute::R,
    Attribute::G,
    Attribute::B,
    Attribute::A,
    Attribute::Oow,
    Attribute::Sow0,
    Attribute::Tow0,
    Attribute::Sow1,
    Attribute::Tow1,
    Attribute::Ooz,
    Attribute::Fog,
];

/// Maps each attribute to a byte offset within one vertex record, or `None`
/// if the vertex doesn't carry it (e.g. no second TMU coordinates). All
/// attributes are read as little-endian `f32`.
#[derive(Debug, Clone)]
pub struct VertexLayout {
    offsets: [Option<u32>; ATTRIBUTE_COUNT],
    pub stride: u32,
}

impl VertexLayout {
    /// The default packed layout: all thirteen attributes present, in
    /// declaration order, tightly packed as `f32`.
    pub fn default_packed() -> Self {
        let mut offsets = [None; ATTRIBUTE_COUNT];
        for (i, _) in ALL_ATTRIBUTES.iter().enumerate() {
            offsets[i] = Some((i as u32) * 4);
        }
        Self { offsets, stride: (ATTRIBUTE_COUNT as u32) * 4 }
    }

    pub fn empty(stride: u32) -> Self {
        Self { offsets: [None; ATTRIBUTE_COUNT], stride }
    }

    pub fn set_offset(&mut self, attribute: Attribute, byte_offset: u32) {
        let index = ALL_ATTRIBUTES.iter().position(|a| *a == attribute).unwrap();
        self.offsets[index] = Some(byte_offset);
    }

    fn offset(&self, attribute: Attribute) -> Option<u32> {
        let index = ALL_ATTRIBUTES.iter().position(|a| *a == attribute).unwrap();
        self.offsets[index]
    }

    fn read_f32(&self, raw: &[u8], attribute: Attribute, default: f32) -> f32 {
        match self.offset(attribute) {
            Some(offset) => {
                let o = offset as usize;
                if o + 4 <= raw.len() {
                    f32::from_le_bytes([raw[o], raw[o + 1], raw[o + 2], raw[o + 3]])
                } else {
                    default
                }
            }
            None => default,
        }
    }

    /// Reads one vertex record out of `raw` (starting at its own offset 0)
    /// through this layout, producing the setup stage's canonical
    /// `InputVertex`. Missing attributes take sensible defaults (colors
    /// opaque white, `oow` 1.0).
    pub fn read_vertex(&self, raw: &[u8]) -> InputVertex {
        InputVertex {
            x: self.read_f32(raw, Attribute::X, 0.0),
            y: self.read_f32(raw, Attribute::Y, 0.0),
            z: self.read_f32(raw, Attribute::Z, 0.0),
            r: self.read_f32(raw, Attribute::R, 255.0),
            g: self.read_f32(raw, Attribute::G, 255.0),
            b: self.read_f32(raw, Attribute::B, 255.0),
            a: self.read_f32(raw, Attribute::A, 255.0),
            oow: self.read_f32(raw, Attribute::Oow, 1.0),
            tmu_s: [self.read_f32(raw, Attribute::Sow0, 0.0), self.read_f32(raw, Attribute::Sow1, 0.0)],
            tmu_t: [self.read_f32(raw, Attribute::Tow0, 0.0), self.read_f32(raw, Attribute::Tow1, 0.0)],
            tmu_w: [self.read_f32(raw, Attribute::Oow, 1.0), self.read_f32(raw, Attribute::Oow, 1.0)],
            fog_coord: self.read_f32(raw, Attribute::Fog, 0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_round_trips_all_attributes() {
        let layout = VertexLayout::default_packed();
        let mut raw = vec![0u8; layout.stride as usize];
        raw[0..4].copy_from_slice(&12.5f32.to_le_bytes()); // x
        let v = layout.read_vertex(&raw);
        assert_eq!(v.x, 12.5);
    }

    #[test]
    fn missing_attribute_falls_back_to_default() {
        let mut layout = VertexLayout::empty(8);
        layout.set_offset(Attribute::X, 0);
        layout.set_offset(Attribute::Y, 4);
        let mut raw = vec![0u8; 8];
        raw[0..4].copy_from_slice(&1.0f32.to_le_bytes());
        raw[4..8].copy_from_slice(&2.0f32.to_le_bytes());
        let v = layout.read_vertex(&raw);
        assert_eq!((v.x, v.y), (1.0, 2.0));
        assert_eq!(v.r, 255.0);
        assert_eq!(v.oow, 1.0);
    }

    #[test]
    fn custom_offset_relocates_an_attribute() {
        let mut layout = VertexLayout::default_packed();
        layout.set_offset(Attribute::R, 100);
        let mut raw = vec![0u8; 104];
        raw[100..104].copy_from_slice(&64.0f32.to_le_bytes());
        let v = layout.read_vertex(&raw);
        assert_eq!(v.r, 64.0);
    }
}
