//! Small dense-math helpers for the inference and training paths
//!
//! Everything here operates on plain slices; the tensors involved are
//! tiny (latent dims in the tens) and a linear-algebra crate would buy
//! nothing.

/// Added before every log to keep it finite.
pub const LOG_EPS: f32 = 1e-8;

/// y = x·W + b with `w[i][j]` mapping input i to output j.
pub fn affine(x: &[f32], w: &[Vec<f32>], b: &[f32]) -> Vec<f32> {
    debug_assert_eq!(x.len(), w.len());
    let mut out = b.to_vec();
    for (i, &xi) in x.iter().enumerate() {
        for (j, &wij) in w[i].iter().enumerate() {
            out[j] += xi * wij;
        }
    }
    out
}

/// Temperature-scaled softmax, max-subtracted for stability.
pub fn softmax(logits: &[f32], temperature: f32) -> Vec<f32> {
    let t = if temperature > 0.0 { temperature } else { 1.0 };
    let max = logits.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
    let exps: Vec<f32> = logits.iter().map(|&z| ((z - max) / t).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Index of the maximum element; ties go to the lowest index.
pub fn argmax(v: &[f32]) -> usize {
    let mut best = 0;
    for (i, &x) in v.iter().enumerate().skip(1) {
        if x > v[best] {
            best = i;
        }
    }
    best
}

/// Inverse-CDF categorical draw: the first index whose cumulative
/// probability meets or exceeds `draw` (uniform in [0, 1)).
pub fn sample_categorical(probs: &[f32], draw: f32) -> usize {
    let mut cumulative = 0.0;
    for (i, &p) in probs.iter().enumerate() {
        cumulative += p;
        if cumulative >= draw {
            return i;
        }
    }
    // Rounding left the cumulative sum a hair under 1.0.
    probs.len() - 1
}

/// Shannon entropy of a probability vector.
pub fn entropy(probs: &[f32]) -> f32 {
    -probs.iter().map(|&p| p * (p + LOG_EPS).ln()).sum::<f32>()
}
