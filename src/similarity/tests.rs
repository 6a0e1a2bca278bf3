use super::*;

const EPSILON: f32 = 1e-6;

#[test]
fn dot_product_sums_products() {
    let result = dot_product(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0])
        .expect("equal-length vectors should succeed");
    assert!((result - 32.0).abs() < EPSILON);
}

#[test]
fn dot_product_rejects_length_mismatch() {
    let result = dot_product(&[1.0, 2.0], &[1.0, 2.0, 3.0]);
    assert!(matches!(
        result,
        Err(RetrievalError::LengthMismatch { left: 2, right: 3 })
    ));
}

#[test]
fn norm_of_zero_vector_is_zero() {
    assert_eq!(vector_norm(&[0.0, 0.0, 0.0]), 0.0);
    assert_eq!(vector_norm(&[]), 0.0);
}

#[test]
fn norm_is_euclidean() {
    assert!((vector_norm(&[3.0, 4.0]) - 5.0).abs() < EPSILON);
}

#[test]
fn cosine_is_symmetric() {
    let pairs: [(&[f32], &[f32]); 3] = [
        (&[1.0, 2.0, 3.0], &[-2.0, 0.5, 4.0]),
        (&[0.3, -0.7], &[0.9, 0.1]),
        (&[5.0, 0.0, 0.0, 1.0], &[0.0, 1.0, 0.0, 1.0]),
    ];

    for (a, b) in pairs {
        let ab = cosine_similarity(a, b).expect("should compute similarity");
        let ba = cosine_similarity(b, a).expect("should compute similarity");
        assert_eq!(ab, ba);
    }
}

#[test]
fn self_similarity_is_one() {
    for v in [vec![1.0, 0.0], vec![0.2, -0.4, 0.9], vec![1e-3, 1e-3, 1e-3]] {
        let sim = cosine_similarity(&v, &v).expect("should compute similarity");
        assert!((sim - 1.0).abs() < 1e-5, "self similarity was {}", sim);
    }
}

#[test]
fn extreme_magnitudes_keep_their_direction() {
    for v in [
        vec![1e-30, 1e-30],
        vec![1e20, 0.0],
        vec![3e19, 3e19],
        vec![f32::MIN_POSITIVE, f32::MIN_POSITIVE, 0.0],
    ] {
        let sim = cosine_similarity(&v, &v).expect("should compute similarity");
        assert!((sim - 1.0).abs() < 1e-5, "self similarity of {:?} was {}", v, sim);
        assert!(vector_norm(&v) > 0.0);
        assert!(vector_norm(&v).is_finite());
    }

    let tiny_orthogonal = cosine_similarity(&[1e-30, 0.0], &[0.0, 1e-30]).expect("should compute");
    assert_eq!(tiny_orthogonal, 0.0);

    let huge_opposite = cosine_similarity(&[1e20, 0.0], &[-2e20, 0.0]).expect("should compute");
    assert!((huge_opposite + 1.0).abs() < 1e-5);
}

#[test]
fn dot_product_of_large_components_is_finite() {
    let result = dot_product(&[1e19, 1e19], &[1e19, -1e19]).expect("should compute");
    assert_eq!(result, 0.0);

    let tiny = dot_product(&[1e-20], &[1e-20]).expect("should compute");
    assert!(tiny > 0.0);
}

#[test]
fn normalize_handles_tiny_vectors() {
    let unit = normalize(&[1e-30, 1e-30]).expect("tiny vector still has a direction");
    assert!((vector_norm(&unit) - 1.0).abs() < EPSILON);
}

#[test]
fn zero_vector_is_dissimilar_to_everything() {
    let zero = [0.0, 0.0, 0.0];
    assert_eq!(
        cosine_similarity(&zero, &[1.0, 2.0, 3.0]).expect("should compute"),
        0.0
    );
    assert_eq!(
        cosine_similarity(&[1.0, 2.0, 3.0], &zero).expect("should compute"),
        0.0
    );
    assert_eq!(cosine_similarity(&zero, &zero).expect("should compute"), 0.0);
}

#[test]
fn cosine_rejects_every_length_mismatch() {
    let vectors: [&[f32]; 4] = [&[1.0], &[1.0, 0.0], &[0.0, 0.0, 0.0], &[]];
    for (i, a) in vectors.iter().enumerate() {
        for (j, b) in vectors.iter().enumerate() {
            if i == j {
                continue;
            }
            assert!(
                matches!(
                    cosine_similarity(a, b),
                    Err(RetrievalError::LengthMismatch { .. })
                ),
                "expected mismatch for lengths {} and {}",
                a.len(),
                b.len()
            );
        }
    }
}

#[test]
fn precomputed_norms_match_computed() {
    let a = [0.5, 0.25, -1.0];
    let b = [0.1, 0.9, 0.3];
    let computed = cosine_similarity(&a, &b).expect("should compute");
    let cached = cosine_similarity_with_norms(&a, &b, Some(vector_norm(&a)), Some(vector_norm(&b)))
        .expect("should compute");
    assert!((computed - cached).abs() < EPSILON);
}

#[test]
fn opposite_vectors_score_negative_one() {
    let sim = cosine_similarity(&[1.0, 1.0], &[-1.0, -1.0]).expect("should compute");
    assert!((sim + 1.0).abs() < 1e-5);
}

#[test]
fn validation_rules() {
    assert!(validate_vector(&[0.1, 0.2]));
    assert!(validate_vector(&[0.0]));
    assert!(!validate_vector(&[]));
    assert!(!validate_vector(&[0.1, f32::NAN]));
    assert!(!validate_vector(&[f32::INFINITY, 0.0]));
    assert!(!validate_vector(&[f32::NEG_INFINITY]));
}

#[test]
fn float_conversions() {
    let wide = [0.1_f64, -2.5, 1e40];
    let narrow = to_float32(&wide);
    assert_eq!(narrow.len(), 3);
    assert!((narrow[0] - 0.1).abs() < EPSILON);
    assert_eq!(narrow[1], -2.5);
    assert!(narrow[2].is_infinite());

    let back = from_float32(&[0.5, -0.25]);
    assert_eq!(back, vec![0.5, -0.25]);
}

#[test]
fn normalize_produces_unit_vectors() {
    let unit = normalize(&[3.0, 4.0]).expect("non-zero vector should normalize");
    assert!((unit[0] - 0.6).abs() < EPSILON);
    assert!((unit[1] - 0.8).abs() < EPSILON);
    assert!((vector_norm(&unit) - 1.0).abs() < EPSILON);

    assert!(normalize(&[0.0, 0.0]).is_none());
    assert!(normalize(&[f32::INFINITY, 1.0]).is_none());
}
