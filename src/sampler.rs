//! Sampler
//!
//! Strategies for resampling the training rows before each tree is grown.
use rand::rngs::StdRng;
use rand::Rng;

// A sampler can be used to subset the data prior to fitting a new tree.
pub trait Sampler {
    /// Sample the data, returning a tuple, where the first item is the samples
    /// chosen for training, and the second are the samples excluded.
    fn sample(&mut self, rng: &mut StdRng, index: &[usize]) -> (Vec<usize>, Vec<usize>);
}

/// Draws `index.len()` rows with replacement. Chosen rows may repeat; the
/// excluded rows are the out-of-bag rows.
pub struct BootstrapSampler;

impl Sampler for BootstrapSampler {
    fn sample(&mut self, rng: &mut StdRng, index: &[usize]) -> (Vec<usize>, Vec<usize>) {
        if index.is_empty() {
            return (Vec::new(), Vec::new());
        }
        let mut drawn = vec![false; index.len()];
        let mut chosen = Vec::with_capacity(index.len());
        for _ in 0..index.len() {
            let pos = rng.gen_range(0..index.len());
            drawn[pos] = true;
            chosen.push(index[pos]);
        }
        let excluded = index
            .iter()
            .zip(drawn.iter())
            .filter(|(_, d)| !**d)
            .map(|(i, _)| *i)
            .collect();
        (chosen, excluded)
    }
}
