//! Lane model: how 128 bits are partitioned into lanes.
//!
//! A [`Shape`] fixes lane count, lane width and lane kind. Lanes are numbered
//! little-endian: lane 0 occupies the lowest-addressed bytes of a [`V128`],
//! which is also the order of lowered scalar slots and of lane immediates.
//!
//! Integer lanes narrower than 32 bits are widened to `i32` with an explicit
//! [`Extension`]; float lanes are reinterpreted bit for bit.

use crate::types::ValueType;
use crate::value::{V128, Value};
use smallvec::SmallVec;
use std::fmt;

/// Per-lane values of one vector.
pub type LaneValues = SmallVec<[Value; 16]>;

/// Interpretation of a lane's bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LaneKind {
    Int,
    Float,
}

/// How a narrow integer lane is widened to 32 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Extension {
    Signed,
    Unsigned,
}

/// A shape that cannot describe a 128-bit vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ShapeError {
    #[error("{lanes} lanes of {lane_bits} bits do not partition 128 bits")]
    NotV128 { lanes: u8, lane_bits: u8 },
    #[error("{lane_bits}-bit {kind:?} lanes are not supported")]
    UnsupportedLane { lane_bits: u8, kind: LaneKind },
}

/// Partition of a 128-bit vector into lanes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Shape {
    lanes: u8,
    lane_bits: u8,
    kind: LaneKind,
}

impl Shape {
    /// 16 × 8-bit integer.
    pub const I8X16: Shape = Shape {
        lanes: 16,
        lane_bits: 8,
        kind: LaneKind::Int,
    };
    /// 8 × 16-bit integer.
    pub const I16X8: Shape = Shape {
        lanes: 8,
        lane_bits: 16,
        kind: LaneKind::Int,
    };
    /// 4 × 32-bit integer.
    pub const I32X4: Shape = Shape {
        lanes: 4,
        lane_bits: 32,
        kind: LaneKind::Int,
    };
    /// 4 × 32-bit float.
    pub const F32X4: Shape = Shape {
        lanes: 4,
        lane_bits: 32,
        kind: LaneKind::Float,
    };

    /// Every supported shape.
    pub const ALL: [Shape; 4] = [Shape::I8X16, Shape::I16X8, Shape::I32X4, Shape::F32X4];

    /// Build a shape, rejecting partitions that do not cover exactly 128 bits
    /// or lane widths the scalar slots cannot hold.
    pub const fn new(lanes: u8, lane_bits: u8, kind: LaneKind) -> Result<Shape, ShapeError> {
        if lanes as u32 * lane_bits as u32 != 128 {
            return Err(ShapeError::NotV128 { lanes, lane_bits });
        }
        let supported = match kind {
            LaneKind::Int => matches!(lane_bits, 8 | 16 | 32),
            LaneKind::Float => lane_bits == 32,
        };
        if !supported {
            return Err(ShapeError::UnsupportedLane { lane_bits, kind });
        }
        Ok(Shape {
            lanes,
            lane_bits,
            kind,
        })
    }

    #[inline]
    pub const fn lanes(self) -> usize {
        self.lanes as usize
    }

    #[inline]
    pub const fn lane_bits(self) -> u32 {
        self.lane_bits as u32
    }

    #[inline]
    pub const fn lane_bytes(self) -> usize {
        self.lane_bits as usize / 8
    }

    #[inline]
    pub const fn kind(self) -> LaneKind {
        self.kind
    }

    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self.kind, LaneKind::Float)
    }

    #[inline]
    pub const fn is_integer(self) -> bool {
        matches!(self.kind, LaneKind::Int)
    }

    /// Whether lanes are narrower than a scalar slot.
    #[inline]
    pub const fn is_narrow(self) -> bool {
        self.lane_bits < 32
    }

    /// Number of lanes packed into one 32-bit word.
    #[inline]
    pub const fn lanes_per_word(self) -> usize {
        32 / self.lane_bits as usize
    }

    /// Type of the scalar slot holding one lane after lowering.
    #[inline]
    pub const fn slot_type(self) -> ValueType {
        match self.kind {
            LaneKind::Int => ValueType::Int32,
            LaneKind::Float => ValueType::Float32,
        }
    }

    /// Mask selecting a lane's bits within a 32-bit word.
    #[inline]
    pub const fn lane_mask(self) -> u32 {
        if self.lane_bits >= 32 {
            u32::MAX
        } else {
            (1u32 << self.lane_bits) - 1
        }
    }

    /// The integer shape with the same lane partition.
    #[inline]
    pub const fn integer(self) -> Shape {
        Shape {
            lanes: self.lanes,
            lane_bits: self.lane_bits,
            kind: LaneKind::Int,
        }
    }

    /// Widen the low `lane_bits` of `raw` to 32 bits.
    #[inline]
    pub const fn extend(self, raw: u32, ext: Extension) -> i32 {
        let bits = self.lane_bits as u32;
        if bits >= 32 {
            return raw as i32;
        }
        match ext {
            Extension::Signed => ((raw << (32 - bits)) as i32) >> (32 - bits),
            Extension::Unsigned => (raw & self.lane_mask()) as i32,
        }
    }

    /// Canonical slot form of an integer lane: truncated to the lane width,
    /// then sign-extended.
    #[inline]
    pub const fn wrap(self, value: i32) -> i32 {
        self.extend(value as u32, Extension::Signed)
    }

    /// Little-endian bit pattern of every lane, lane 0 first, in the low
    /// `lane_bits` of each `u32`.
    pub fn raw_lanes(self, bytes: &V128) -> impl Iterator<Item = u32> + '_ {
        bytes.chunks_exact(self.lane_bytes()).map(|chunk| {
            chunk
                .iter()
                .rev()
                .fold(0u32, |acc, &b| (acc << 8) | b as u32)
        })
    }

    /// Split 16 bytes into lane values.
    ///
    /// Integer lanes become `Value::I32` widened with `ext`; float lanes
    /// become `Value::F32` carrying exactly the lane's bit pattern.
    pub fn decode(self, bytes: &V128, ext: Extension) -> LaneValues {
        self.raw_lanes(bytes)
            .map(|raw| match self.kind {
                LaneKind::Int => Value::I32(self.extend(raw, ext)),
                LaneKind::Float => Value::F32(f32::from_bits(raw)),
            })
            .collect()
    }

    /// Pack lane values back into 16 bytes, keeping the low `lane_bits` of
    /// each 32-bit lane pattern. Missing lanes encode as zero.
    pub fn encode(self, lanes: &[Value]) -> V128 {
        let mut out = [0u8; 16];
        let width = self.lane_bytes();
        for (chunk, lane) in out.chunks_exact_mut(width).zip(lanes) {
            let raw = lane.bits32().unwrap_or(0);
            chunk.copy_from_slice(&raw.to_le_bytes()[..width]);
        }
        out
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.kind {
            LaneKind::Int => 'i',
            LaneKind::Float => 'f',
        };
        write!(f, "{}{}x{}", prefix, self.lane_bits, self.lanes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_bad_partition() {
        assert_eq!(
            Shape::new(8, 8, LaneKind::Int),
            Err(ShapeError::NotV128 {
                lanes: 8,
                lane_bits: 8
            })
        );
        assert_eq!(
            Shape::new(8, 16, LaneKind::Float),
            Err(ShapeError::UnsupportedLane {
                lane_bits: 16,
                kind: LaneKind::Float
            })
        );
        assert_eq!(
            Shape::new(2, 64, LaneKind::Int),
            Err(ShapeError::UnsupportedLane {
                lane_bits: 64,
                kind: LaneKind::Int
            })
        );
        assert_eq!(Shape::new(16, 8, LaneKind::Int), Ok(Shape::I8X16));
    }

    #[test]
    fn test_extend() {
        assert_eq!(Shape::I8X16.extend(0xff, Extension::Signed), -1);
        assert_eq!(Shape::I8X16.extend(0xff, Extension::Unsigned), 0xff);
        assert_eq!(Shape::I16X8.extend(0x1_8000, Extension::Signed), -32768);
        assert_eq!(Shape::I16X8.extend(0x1_8000, Extension::Unsigned), 0x8000);
        assert_eq!(Shape::I32X4.extend(0xffff_ffff, Extension::Unsigned), -1);
        assert_eq!(Shape::I8X16.wrap(0x17f), 127);
        assert_eq!(Shape::I8X16.wrap(0x80), -128);
    }

    #[test]
    fn test_decode_float_is_bitwise() {
        let bytes: V128 = [
            0x00, 0x00, 0x80, 0xbf, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x80, 0x3f, 0x00, 0x00,
            0x00, 0x40,
        ];
        let lanes = Shape::F32X4.decode(&bytes, Extension::Signed);
        let floats: Vec<f32> = lanes.iter().filter_map(Value::as_f32).collect();
        assert_eq!(floats, vec![-1.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_decode_narrow_lanes_little_endian() {
        let mut bytes = [0u8; 16];
        bytes[0] = 0xfe;
        bytes[1] = 0x01;
        let signed = Shape::I16X8.decode(&bytes, Extension::Signed);
        assert_eq!(signed[0], Value::I32(0x01fe));
        let bytes_as_i8 = Shape::I8X16.decode(&bytes, Extension::Signed);
        assert_eq!(bytes_as_i8[0], Value::I32(-2));
        assert_eq!(bytes_as_i8[1], Value::I32(1));
        let unsigned = Shape::I8X16.decode(&bytes, Extension::Unsigned);
        assert_eq!(unsigned[0], Value::I32(0xfe));
    }

    #[test]
    fn test_encode_inverts_decode() {
        let bytes: V128 = core::array::from_fn(|i| (i as u8).wrapping_mul(37));
        for shape in Shape::ALL {
            let lanes = shape.decode(&bytes, Extension::Signed);
            assert_eq!(lanes.len(), shape.lanes());
            assert_eq!(shape.encode(&lanes), bytes, "{}", shape);
        }
    }

    #[test]
    fn test_raw_lanes_are_little_endian() {
        let bytes: V128 = core::array::from_fn(|i| i as u8);
        let halves: Vec<u32> = Shape::I16X8.raw_lanes(&bytes).collect();
        assert_eq!(halves.len(), 8);
        assert_eq!(halves[0], 0x0100);
        assert_eq!(halves[7], 0x0f0e);
        let words: Vec<u32> = Shape::F32X4.raw_lanes(&bytes).collect();
        assert_eq!(words, vec![0x0302_0100, 0x0706_0504, 0x0b0a_0908, 0x0f0e_0d0c]);
    }

    #[test]
    fn test_display() {
        assert_eq!(Shape::I8X16.to_string(), "i8x16");
        assert_eq!(Shape::F32X4.to_string(), "f32x4");
        assert_eq!(Shape::F32X4.integer(), Shape::I32X4);
        assert_eq!(Shape::I16X8.lane_mask(), 0xffff);
        assert_eq!(Shape::I8X16.lanes_per_word(), 4);
    }
}
