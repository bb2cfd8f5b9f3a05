// src/embedding/hash.rs
// Deterministic hash embedding fallback

use sha2::{Digest, Sha256};

/// Produce a unit-norm vector from a salted SHA-256 of the text.
///
/// Purely synchronous and always available. Each dimension hashes
/// `"{text}:{i}"` and maps the first four bytes into [-1, 1] before the
/// whole vector is L2-normalized.
pub fn hash_embed(text: &str, dims: usize) -> Vec<f32> {
    let normalized = text.trim().to_lowercase();
    let mut vec = Vec::with_capacity(dims);

    for i in 0..dims {
        let mut hasher = Sha256::new();
        hasher.update(normalized.as_bytes());
        hasher.update(b":");
        hasher.update(i.to_string().as_bytes());
        let digest = hasher.finalize();

        let word = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
        vec.push((word % 1000) as f32 / 500.0 - 1.0);
    }

    super::l2_normalize(&mut vec);
    vec
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_embed_is_deterministic() {
        let a = hash_embed("database optimization", 384);
        let b = hash_embed("database optimization", 384);
        assert_eq!(a, b);
    }

    #[test]
    fn hash_embed_is_unit_norm() {
        let vec = hash_embed("some text", 384);
        let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn distinct_texts_produce_distinct_vectors() {
        assert_ne!(hash_embed("alpha", 384), hash_embed("beta", 384));
    }

    #[test]
    fn dimensionality_is_fixed() {
        assert_eq!(hash_embed("x", 384).len(), 384);
        assert_eq!(hash_embed("", 384).len(), 384);
    }
}
