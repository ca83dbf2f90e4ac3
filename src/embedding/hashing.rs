//! Offline feature-hashing embedder
//!
//! Deterministic and dependency-free at runtime: every lowercase word and
//! every character trigram of a word is hashed with MD5 into one of
//! `dimensions` buckets with a hash-derived sign, then the vector is
//! L2-normalised. Identical texts give cosine 1.0, texts sharing no words or
//! trigrams land near 0.0.

use async_trait::async_trait;

use super::{validate_input, Embedding, EmbeddingError, EmbeddingProvider};

const WORD_WEIGHT: f32 = 1.0;
const TRIGRAM_WEIGHT: f32 = 0.5;

#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
    max_input_chars: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize, max_input_chars: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
            max_input_chars,
        }
    }

    /// Embed without input validation; empty text yields the zero vector.
    pub fn vectorize(&self, text: &str) -> Embedding {
        let mut v = vec![0.0f32; self.dimensions];
        let lower = text.to_lowercase();

        for word in lower.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            self.add_feature(&mut v, word, WORD_WEIGHT);

            let padded: Vec<char> = format!(" {word} ").chars().collect();
            for tri in padded.windows(3) {
                let gram: String = tri.iter().collect();
                self.add_feature(&mut v, &gram, TRIGRAM_WEIGHT);
            }
        }

        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }

    fn add_feature(&self, v: &mut [f32], feature: &str, weight: f32) {
        let digest = md5::compute(feature.as_bytes());
        let bucket = u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]]) as usize
            % self.dimensions;
        let sign = if digest[4] & 1 == 0 { 1.0 } else { -1.0 };
        v[bucket] += sign * weight;
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        let text = validate_input(text, self.max_input_chars)?;
        Ok(self.vectorize(text))
    }

    fn dimension(&self) -> Option<usize> {
        Some(self.dimensions)
    }

    fn provider_name(&self) -> &str {
        "hashing"
    }
}
