// src/ops.rs
//
// Pixel operations as plain data.
// These are cheap to create, compare and hash - the work happens in engine::pipeline.

use crate::error::{RawImageError, Result};
use bitflags::bitflags;

bitflags! {
    /// What running an operation does to a buffer, beyond its pixel math.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct OperationEffect: u8 {
        /// Output dimensions may differ from the input.
        const RESIZES = 1 << 0;
        /// Output alpha is pixel-for-pixel identical to input alpha.
        const PRESERVES_ALPHA = 1 << 1;
        /// Applying the operation twice equals applying it once.
        const IDEMPOTENT = 1 << 2;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OperationContract {
    pub name: &'static str,
    pub effects: OperationEffect,
}

/// Gradient used by [`Operation::ColorMap`]; four stops at luma 0, 85, 170, 255.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Palette {
    /// black -> red -> yellow -> white
    Heat,
    /// dark blue -> blue -> cyan -> white
    Cool,
    /// navy -> teal -> aquamarine -> foam
    Ocean,
}

impl Palette {
    pub fn stops(&self) -> [[u8; 3]; 4] {
        match self {
            Palette::Heat => [[0, 0, 0], [255, 0, 0], [255, 255, 0], [255, 255, 255]],
            Palette::Cool => [[0, 0, 64], [0, 64, 255], [0, 255, 255], [255, 255, 255]],
            Palette::Ocean => [[0, 16, 48], [0, 96, 128], [64, 200, 180], [224, 255, 250]],
        }
    }

    fn tag(&self) -> u8 {
        match self {
            Palette::Heat => 0,
            Palette::Cool => 1,
            Palette::Ocean => 2,
        }
    }
}

/// A single pixel transform and its parameters.
///
/// Every variant maps to one pure function in `engine::filters`; parameters are
/// validated there, before any pixel is touched.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Grayscale,
    Invert,
    /// Levels per channel (>= 2)
    Posterize { levels: u32 },
    /// Tile edge length in pixels (>= 1)
    Pixelize { block_size: u32 },
    /// Additive offset (-255 to 255)
    Brightness { offset: i32 },
    /// -100 to 100
    Contrast { amount: i32 },
    Sepia,
    /// Box blur radius (1 to 64)
    Blur { radius: u32 },
    Sharpen,
    Emboss,
    EdgeDetect,
    Sketch { radius: u32 },
    Cartoon { levels: u32, edge_threshold: u32 },
    /// intensity 0 to 100
    Glow { radius: u32, intensity: u32 },
    ColorMap { palette: Palette },
    /// 0 to 100
    Vignette { strength: u32 },
    /// Deterministic for a given seed
    Noise { amount: u32, seed: u64 },
    /// Block-reduction preview; output is ceil(w/factor) x ceil(h/factor)
    Downsample { factor: u32 },
    Resize { width: u32, height: u32 },
    Crop { x: u32, y: u32, width: u32, height: u32 },
    FlipH,
    FlipV,
    /// 0, 90, 180, 270 and their negatives
    Rotate { degrees: i32 },
}

impl Operation {
    pub fn contract(&self) -> OperationContract {
        let keeps_alpha = OperationEffect::PRESERVES_ALPHA;
        let (name, effects) = match self {
            Operation::Grayscale => ("grayscale", keeps_alpha | OperationEffect::IDEMPOTENT),
            Operation::Invert => ("invert", keeps_alpha),
            Operation::Posterize { .. } => ("posterize", keeps_alpha | OperationEffect::IDEMPOTENT),
            Operation::Pixelize { .. } => ("pixelize", OperationEffect::IDEMPOTENT),
            Operation::Brightness { .. } => ("brightness", keeps_alpha),
            Operation::Contrast { .. } => ("contrast", keeps_alpha),
            Operation::Sepia => ("sepia", keeps_alpha),
            Operation::Blur { .. } => ("blur", OperationEffect::empty()),
            Operation::Sharpen => ("sharpen", keeps_alpha),
            Operation::Emboss => ("emboss", keeps_alpha),
            Operation::EdgeDetect => ("edge_detect", keeps_alpha),
            Operation::Sketch { .. } => ("sketch", keeps_alpha),
            Operation::Cartoon { .. } => ("cartoon", keeps_alpha),
            Operation::Glow { .. } => ("glow", keeps_alpha),
            Operation::ColorMap { .. } => ("color_map", keeps_alpha),
            Operation::Vignette { .. } => ("vignette", keeps_alpha),
            Operation::Noise { .. } => ("noise", keeps_alpha),
            Operation::Downsample { .. } => ("downsample", OperationEffect::RESIZES),
            Operation::Resize { .. } => ("resize", OperationEffect::RESIZES),
            Operation::Crop { .. } => ("crop", OperationEffect::RESIZES),
            Operation::FlipH => ("flip_h", OperationEffect::empty()),
            Operation::FlipV => ("flip_v", OperationEffect::empty()),
            Operation::Rotate { .. } => ("rotate", OperationEffect::RESIZES),
        };
        OperationContract { name, effects }
    }

    pub fn name(&self) -> &'static str {
        self.contract().name
    }

    /// Canonical byte encoding used when deriving result signatures.
    /// Tags are stable; never renumber a variant.
    pub(crate) fn encode_key(&self, out: &mut Vec<u8>) {
        fn u32s(out: &mut Vec<u8>, tag: u8, values: &[u32]) {
            out.push(tag);
            for v in values {
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
        match self {
            Operation::Grayscale => out.push(0),
            Operation::Invert => out.push(1),
            Operation::Posterize { levels } => u32s(out, 2, &[*levels]),
            Operation::Pixelize { block_size } => u32s(out, 3, &[*block_size]),
            Operation::Brightness { offset } => {
                out.push(4);
                out.extend_from_slice(&offset.to_le_bytes());
            }
            Operation::Contrast { amount } => {
                out.push(5);
                out.extend_from_slice(&amount.to_le_bytes());
            }
            Operation::Sepia => out.push(6),
            Operation::Blur { radius } => u32s(out, 7, &[*radius]),
            Operation::Sharpen => out.push(8),
            Operation::Emboss => out.push(9),
            Operation::EdgeDetect => out.push(10),
            Operation::Sketch { radius } => u32s(out, 11, &[*radius]),
            Operation::Cartoon {
                levels,
                edge_threshold,
            } => u32s(out, 12, &[*levels, *edge_threshold]),
            Operation::Glow { radius, intensity } => u32s(out, 13, &[*radius, *intensity]),
            Operation::ColorMap { palette } => {
                out.push(14);
                out.push(palette.tag());
            }
            Operation::Vignette { strength } => u32s(out, 15, &[*strength]),
            Operation::Noise { amount, seed } => {
                u32s(out, 16, &[*amount]);
                out.extend_from_slice(&seed.to_le_bytes());
            }
            Operation::Downsample { factor } => u32s(out, 17, &[*factor]),
            Operation::Resize { width, height } => u32s(out, 18, &[*width, *height]),
            Operation::Crop {
                x,
                y,
                width,
                height,
            } => u32s(out, 19, &[*x, *y, *width, *height]),
            Operation::FlipH => out.push(20),
            Operation::FlipV => out.push(21),
            Operation::Rotate { degrees } => {
                out.push(22);
                out.extend_from_slice(&degrees.to_le_bytes());
            }
        }
    }

    /// The editor's named filters with their default parameters.
    pub fn from_filter_name(name: &str) -> Result<Self> {
        let op = match name.to_lowercase().as_str() {
            "grayscale" | "greyscale" => Operation::Grayscale,
            "invert" => Operation::Invert,
            "posterize" => Operation::Posterize { levels: 4 },
            "pixelize" | "pixelate" => Operation::Pixelize { block_size: 8 },
            "brightness" => Operation::Brightness { offset: 32 },
            "contrast" => Operation::Contrast { amount: 25 },
            "sepia" => Operation::Sepia,
            "blur" => Operation::Blur { radius: 2 },
            "sharpen" => Operation::Sharpen,
            "emboss" => Operation::Emboss,
            "edge" | "edge_detect" | "edges" => Operation::EdgeDetect,
            "sketch" => Operation::Sketch { radius: 4 },
            "cartoon" => Operation::Cartoon {
                levels: 6,
                edge_threshold: 96,
            },
            "glow" => Operation::Glow {
                radius: 4,
                intensity: 60,
            },
            "color_map" | "colormap" | "heatmap" => Operation::ColorMap {
                palette: Palette::Heat,
            },
            "vignette" => Operation::Vignette { strength: 60 },
            "noise" => Operation::Noise {
                amount: 24,
                seed: 0x5EED,
            },
            other => {
                return Err(RawImageError::invalid_parameter(
                    "filter",
                    other.to_string(),
                    "unknown filter name",
                ))
            }
        };
        Ok(op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_flags() {
        assert!(Operation::Grayscale
            .contract()
            .effects
            .contains(OperationEffect::PRESERVES_ALPHA | OperationEffect::IDEMPOTENT));
        assert!(Operation::Resize {
            width: 1,
            height: 1
        }
        .contract()
        .effects
        .contains(OperationEffect::RESIZES));
        assert!(!Operation::Invert
            .contract()
            .effects
            .contains(OperationEffect::IDEMPOTENT));
    }

    #[test]
    fn test_encode_key_differs_by_params() {
        let mut a = Vec::new();
        let mut b = Vec::new();
        Operation::Noise { amount: 5, seed: 1 }.encode_key(&mut a);
        Operation::Noise { amount: 5, seed: 2 }.encode_key(&mut b);
        assert_ne!(a, b);
    }

    #[test]
    fn test_encode_key_does_not_collide_across_variants() {
        let mut a = Vec::new();
        let mut b = Vec::new();
        Operation::Blur { radius: 3 }.encode_key(&mut a);
        Operation::Sketch { radius: 3 }.encode_key(&mut b);
        assert_ne!(a, b);
    }

    #[test]
    fn test_filter_names() {
        assert_eq!(
            Operation::from_filter_name("Sepia").unwrap(),
            Operation::Sepia
        );
        assert_eq!(
            Operation::from_filter_name("pixelate").unwrap().name(),
            "pixelize"
        );
        assert!(matches!(
            Operation::from_filter_name("oil-paint"),
            Err(RawImageError::InvalidParameter { .. })
        ));
    }
}
