use raw_image_cache::engine::filters::{flip_h, flip_v, grayscale, invert, pixelize, posterize};
use raw_image_cache::engine::{apply_op, apply_ops, optimize_ops, ContentSignature, RawImageBuffer, RawImageCache};
use raw_image_cache::ops::{Operation, OperationEffect, Palette};
use raw_image_cache::RawImageError;
use proptest::prelude::*;
use std::borrow::Cow;

fn buffer_strategy() -> impl Strategy<Value = RawImageBuffer> {
    (1u32..=12, 1u32..=12).prop_flat_map(|(w, h)| {
        proptest::collection::vec(any::<u8>(), (w * h * 4) as usize)
            .prop_map(move |pixels| RawImageBuffer::new(w, h, pixels).unwrap())
    })
}

fn rotate_angle_strategy() -> impl Strategy<Value = i32> {
    prop_oneof![
        Just(0),
        Just(90),
        Just(180),
        Just(270),
        Just(-90),
        Just(-180),
        Just(-270),
    ]
}

/// Operations that are cheap and whose parameters are always valid.
fn simple_op_strategy() -> impl Strategy<Value = Operation> {
    prop_oneof![
        Just(Operation::Invert),
        Just(Operation::FlipH),
        Just(Operation::FlipV),
        Just(Operation::Grayscale),
        Just(Operation::Posterize { levels: 2 }),
        Just(Operation::Pixelize { block_size: 1 }),
        Just(Operation::Sepia),
        rotate_angle_strategy().prop_map(|degrees| Operation::Rotate { degrees }),
        (-40i32..=40).prop_map(|offset| Operation::Brightness { offset }),
    ]
}

/// Operations whose contract claims alpha is untouched.
fn alpha_preserving_op_strategy() -> impl Strategy<Value = Operation> {
    prop_oneof![
        Just(Operation::Grayscale),
        Just(Operation::Invert),
        (2u32..=16).prop_map(|levels| Operation::Posterize { levels }),
        (-255i32..=255).prop_map(|offset| Operation::Brightness { offset }),
        (-100i32..=100).prop_map(|amount| Operation::Contrast { amount }),
        Just(Operation::Sepia),
        Just(Operation::Sharpen),
        Just(Operation::Emboss),
        Just(Operation::EdgeDetect),
        (1u32..=4).prop_map(|radius| Operation::Sketch { radius }),
        (2u32..=8, 0u32..=255).prop_map(|(levels, edge_threshold)| Operation::Cartoon {
            levels,
            edge_threshold
        }),
        (1u32..=4, 0u32..=100).prop_map(|(radius, intensity)| Operation::Glow { radius, intensity }),
        prop_oneof![Just(Palette::Heat), Just(Palette::Cool), Just(Palette::Ocean)]
            .prop_map(|palette| Operation::ColorMap { palette }),
        (0u32..=100).prop_map(|strength| Operation::Vignette { strength }),
        (0u32..=100, any::<u64>()).prop_map(|(amount, seed)| Operation::Noise { amount, seed }),
    ]
}

fn alpha_plane(buffer: &RawImageBuffer) -> Vec<u8> {
    buffer.pixels().chunks_exact(4).map(|px| px[3]).collect()
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_construction_accepts_only_exact_length(
        w in 0u32..=16,
        h in 0u32..=16,
        delta in prop_oneof![Just(0i64), -8i64..=-1, 1i64..=8],
    ) {
        let expected = (w * h * 4) as i64;
        let len = expected + delta;
        prop_assume!(len >= 0);
        let result = RawImageBuffer::new(w, h, vec![0; len as usize]);
        if delta == 0 {
            prop_assert!(result.is_ok());
        } else {
            let is_shape_mismatch = matches!(result, Err(RawImageError::ShapeMismatch { .. }));
            prop_assert!(is_shape_mismatch);
        }
    }

    #[test]
    fn prop_invert_is_an_involution(img in buffer_strategy()) {
        prop_assert_eq!(invert(&invert(&img)), img);
    }

    #[test]
    fn prop_flips_are_involutions(img in buffer_strategy()) {
        prop_assert_eq!(&flip_h(&flip_h(&img)), &img);
        prop_assert_eq!(&flip_v(&flip_v(&img)), &img);
    }

    #[test]
    fn prop_grayscale_equal_channels_and_alpha_kept(img in buffer_strategy()) {
        let gray = grayscale(&img);
        for px in gray.pixels().chunks_exact(4) {
            prop_assert_eq!(px[0], px[1]);
            prop_assert_eq!(px[1], px[2]);
        }
        prop_assert_eq!(alpha_plane(&gray), alpha_plane(&img));
    }

    #[test]
    fn prop_posterize_is_idempotent(img in buffer_strategy(), levels in 2u32..=256) {
        let once = posterize(&img, levels).unwrap();
        let twice = posterize(&once, levels).unwrap();
        prop_assert_eq!(twice, once);
    }

    #[test]
    fn prop_pixelize_keeps_uniform_image(
        w in 1u32..=20,
        h in 1u32..=20,
        block in 1u32..=24,
        rgba in any::<[u8; 4]>(),
    ) {
        let img = RawImageBuffer::filled(w, h, rgba).unwrap();
        prop_assert_eq!(pixelize(&img, block).unwrap(), img);
    }

    #[test]
    fn prop_pixelize_is_idempotent(img in buffer_strategy(), block in 1u32..=6) {
        let once = pixelize(&img, block).unwrap();
        prop_assert_eq!(pixelize(&once, block).unwrap(), once);
    }

    #[test]
    fn prop_rotation_quarter_turns_swap_dimensions(img in buffer_strategy(), degrees in rotate_angle_strategy()) {
        let out = apply_op(&img, &Operation::Rotate { degrees }).unwrap();
        if degrees.rem_euclid(180) == 90 {
            prop_assert_eq!(out.dimensions(), (img.height(), img.width()));
        } else {
            prop_assert_eq!(out.dimensions(), img.dimensions());
        }
    }

    #[test]
    fn prop_four_quarter_turns_restore_image(img in buffer_strategy()) {
        let mut current = img.clone();
        for _ in 0..4 {
            current = apply_op(&current, &Operation::Rotate { degrees: 90 }).unwrap();
        }
        prop_assert_eq!(current, img);
    }

    #[test]
    fn prop_alpha_preserving_ops_keep_alpha(img in buffer_strategy(), op in alpha_preserving_op_strategy()) {
        prop_assert!(op.contract().effects.contains(OperationEffect::PRESERVES_ALPHA));
        let out = apply_op(&img, &op).unwrap();
        prop_assert_eq!(out.dimensions(), img.dimensions());
        prop_assert_eq!(alpha_plane(&out), alpha_plane(&img));
    }

    #[test]
    fn prop_optimized_chain_matches_naive_chain(
        img in buffer_strategy(),
        ops in proptest::collection::vec(simple_op_strategy(), 0..8),
    ) {
        let mut naive = img.clone();
        for op in &ops {
            naive = apply_op(&naive, op).unwrap();
        }
        let optimized = apply_ops(&img, &ops).unwrap();
        prop_assert_eq!(optimized.as_ref(), &naive);
        prop_assert!(optimize_ops(&ops).len() <= ops.len());
    }

    #[test]
    fn prop_cancelling_chain_borrows_source(img in buffer_strategy(), pairs in 1usize..=4) {
        let ops: Vec<Operation> = (0..pairs)
            .flat_map(|_| [Operation::FlipH, Operation::FlipH])
            .collect();
        let out = apply_ops(&img, &ops).unwrap();
        prop_assert!(matches!(out, Cow::Borrowed(_)));
    }

    #[test]
    fn prop_signature_is_deterministic(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
        prop_assert_eq!(ContentSignature::compute(&bytes), ContentSignature::compute(&bytes));
        let sig = ContentSignature::compute(&bytes);
        prop_assert_eq!(sig.to_hex().parse::<ContentSignature>().unwrap(), sig);
    }

    #[test]
    fn prop_distinct_bytes_have_distinct_signatures(
        a in proptest::collection::vec(any::<u8>(), 1..256),
        b in proptest::collection::vec(any::<u8>(), 1..256),
    ) {
        prop_assume!(a != b);
        prop_assert_ne!(ContentSignature::compute(&a), ContentSignature::compute(&b));
    }

    #[test]
    fn prop_derived_signature_follows_optimized_chain(
        seed in proptest::collection::vec(any::<u8>(), 1..64),
        ops in proptest::collection::vec(simple_op_strategy(), 0..6),
    ) {
        let parent = ContentSignature::compute(&seed);
        prop_assert_eq!(parent.derive(&ops), parent.derive(&ops));
        let mut padded = ops.clone();
        padded.push(Operation::Invert);
        padded.push(Operation::Invert);
        prop_assert_eq!(
            parent.derive(&optimize_ops(&padded)),
            parent.derive(&optimize_ops(&ops))
        );
    }

    #[test]
    fn prop_cache_never_exceeds_capacity(
        capacity in 1usize..=16,
        keys in proptest::collection::vec(0u16..64, 0..128),
    ) {
        let cache = RawImageCache::new(capacity).unwrap();
        let pixel = RawImageBuffer::filled(1, 1, [1, 2, 3, 4]).unwrap();
        for key in &keys {
            cache.set(ContentSignature::compute(&key.to_le_bytes()), pixel.clone());
            prop_assert!(cache.len() <= capacity);
        }
        if let Some(last) = keys.last() {
            let newest = ContentSignature::compute(&last.to_le_bytes());
            prop_assert_eq!(cache.signatures_mru().first().copied(), Some(newest));
        }
    }
}
