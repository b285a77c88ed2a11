// src/engine/pipeline.rs
//
// Pipeline operations: validate, optimize and apply operation chains.

use crate::engine::buffer::RawImageBuffer;
use crate::engine::filters;
use crate::error::{RawImageError, Result};
use crate::ops::{Operation, OperationEffect};
use std::borrow::Cow;
use std::time::Instant;
use tracing::{debug, trace};

/// Check every operation's parameters before any pixel work starts, so a bad
/// parameter late in a chain does not waste the work done by earlier steps.
pub fn validate_operation_sequence(ops: &[Operation]) -> Result<()> {
    for op in ops {
        filters::validate(op)?;
    }
    Ok(())
}

/// Operations that return their input unchanged for these parameters.
fn is_identity(op: &Operation) -> bool {
    matches!(
        op,
        Operation::Brightness { offset: 0 }
            | Operation::Contrast { amount: 0 }
            | Operation::Vignette { strength: 0 }
            | Operation::Noise { amount: 0, .. }
            | Operation::Glow { intensity: 0, .. }
            | Operation::Pixelize { block_size: 1 }
            | Operation::Downsample { factor: 1 }
            | Operation::Rotate { degrees: 0 }
    )
}

/// Rewrite a validated chain into an equivalent, shorter one.
///
/// - identity operations are dropped
/// - adjacent Invert/Invert, FlipH/FlipH and FlipV/FlipV pairs cancel
/// - rotations are normalized into 0..360 and adjacent ones fold into one
///   (or none when they net to 0)
/// - repeats of an idempotent operation collapse into one
///
/// The optimized chain produces the same pixels as the original; result
/// signatures are derived from it so equivalent edits share a cache slot.
pub fn optimize_ops(ops: &[Operation]) -> Vec<Operation> {
    let mut optimized: Vec<Operation> = Vec::with_capacity(ops.len());

    for op in ops {
        let normalized;
        let op = match *op {
            Operation::Rotate { degrees } => {
                normalized = Operation::Rotate {
                    degrees: degrees.rem_euclid(360),
                };
                &normalized
            }
            _ => op,
        };
        if is_identity(op) {
            continue;
        }
        let last = optimized.last().cloned();
        match (last, op) {
            (Some(Operation::Invert), Operation::Invert)
            | (Some(Operation::FlipH), Operation::FlipH)
            | (Some(Operation::FlipV), Operation::FlipV) => {
                optimized.pop();
            }
            (Some(Operation::Rotate { degrees: a }), Operation::Rotate { degrees: b }) => {
                optimized.pop();
                let net = (a + b).rem_euclid(360);
                if net != 0 {
                    optimized.push(Operation::Rotate { degrees: net });
                }
            }
            (Some(prev), op)
                if prev == *op && op.contract().effects.contains(OperationEffect::IDEMPOTENT) => {}
            _ => optimized.push(op.clone()),
        }
    }

    optimized
}

/// Dispatch one operation to its filter.
pub fn apply_op(src: &RawImageBuffer, op: &Operation) -> Result<RawImageBuffer> {
    match *op {
        Operation::Grayscale => Ok(filters::grayscale(src)),
        Operation::Invert => Ok(filters::invert(src)),
        Operation::Posterize { levels } => filters::posterize(src, levels),
        Operation::Pixelize { block_size } => filters::pixelize(src, block_size),
        Operation::Brightness { offset } => filters::brightness(src, offset),
        Operation::Contrast { amount } => filters::contrast(src, amount),
        Operation::Sepia => Ok(filters::sepia(src)),
        Operation::Blur { radius } => filters::blur(src, radius),
        Operation::Sharpen => Ok(filters::sharpen(src)),
        Operation::Emboss => Ok(filters::emboss(src)),
        Operation::EdgeDetect => Ok(filters::edge_detect(src)),
        Operation::Sketch { radius } => filters::sketch(src, radius),
        Operation::Cartoon {
            levels,
            edge_threshold,
        } => filters::cartoon(src, levels, edge_threshold),
        Operation::Glow { radius, intensity } => filters::glow(src, radius, intensity),
        Operation::ColorMap { palette } => Ok(filters::color_map(src, palette)),
        Operation::Vignette { strength } => filters::vignette(src, strength),
        Operation::Noise { amount, seed } => filters::noise(src, amount, seed),
        Operation::Downsample { factor } => filters::downsample(src, factor),
        Operation::Resize { width, height } => filters::resize(src, width, height),
        Operation::Crop {
            x,
            y,
            width,
            height,
        } => filters::crop(src, x, y, width, height),
        Operation::FlipH => Ok(filters::flip_h(src)),
        Operation::FlipV => Ok(filters::flip_v(src)),
        Operation::Rotate { degrees } => filters::rotate(src, degrees),
    }
}

/// Apply a chain of operations with Copy-on-Write semantics.
///
/// When the chain optimizes to nothing the source is returned borrowed and no
/// pixels are copied. Otherwise every step allocates a fresh buffer; the
/// source is never modified.
pub fn apply_ops<'a>(
    src: &'a RawImageBuffer,
    ops: &[Operation],
) -> Result<Cow<'a, RawImageBuffer>> {
    validate_operation_sequence(ops)?;
    let optimized = optimize_ops(ops);
    apply_optimized(src, &optimized)
}

/// Same as [`apply_ops`] for a chain that already went through [`optimize_ops`].
pub(crate) fn apply_optimized<'a>(
    src: &'a RawImageBuffer,
    optimized: &[Operation],
) -> Result<Cow<'a, RawImageBuffer>> {
    if optimized.is_empty() {
        trace!(target: "raw_image_cache::pipeline", "empty chain; returning source");
        return Ok(Cow::Borrowed(src));
    }

    let started = Instant::now();
    let mut current: Cow<'a, RawImageBuffer> = Cow::Borrowed(src);
    for op in optimized {
        let step = Instant::now();
        let next = apply_op(&current, op)?;
        let contract = op.contract();
        if !contract.effects.contains(OperationEffect::RESIZES)
            && next.dimensions() != current.dimensions()
        {
            return Err(RawImageError::internal_panic(format!(
                "{} changed dimensions from {:?} to {:?}",
                contract.name,
                current.dimensions(),
                next.dimensions()
            )));
        }
        trace!(
            target: "raw_image_cache::pipeline",
            op = contract.name,
            width = next.width(),
            height = next.height(),
            elapsed_us = step.elapsed().as_micros() as u64,
            "applied operation"
        );
        current = Cow::Owned(next);
    }

    debug!(
        target: "raw_image_cache::pipeline",
        ops = optimized.len(),
        src_width = src.width(),
        src_height = src.height(),
        width = current.width(),
        height = current.height(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "pipeline finished"
    );
    Ok(current)
}
