use log::debug;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{thread_rng, SeedableRng};

use super::model::{Batch, Dataset, DatasetError};

/// Configuration for the [`DataLoader`].
#[derive(Debug, Clone)]
pub struct DataLoaderConfig {
    pub batch_size: usize,
    pub shuffle: bool,
    /// Drop a trailing batch smaller than `batch_size`.
    pub drop_last: bool,
    /// Seed for reproducible shuffling.
    pub seed: Option<u64>,
}

impl Default for DataLoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: 1,
            shuffle: false,
            drop_last: false,
            seed: None,
        }
    }
}

impl DataLoaderConfig {
    pub fn batch_size(mut self, bs: usize) -> Self {
        self.batch_size = bs;
        self
    }

    pub fn shuffle(mut self, s: bool) -> Self {
        self.shuffle = s;
        self
    }

    pub fn drop_last(mut self, d: bool) -> Self {
        self.drop_last = d;
        self
    }

    pub fn seed(mut self, s: u64) -> Self {
        self.seed = Some(s);
        self
    }
}

/// Groups dataset samples into [`Batch`]es.
pub struct DataLoader<'a> {
    dataset: &'a dyn Dataset,
    config: DataLoaderConfig,
    indices: Vec<usize>,
}

impl<'a> DataLoader<'a> {
    pub fn new(dataset: &'a dyn Dataset, config: DataLoaderConfig) -> Result<Self, DatasetError> {
        if config.batch_size == 0 {
            return Err(DatasetError::InvalidBatchSize);
        }
        let mut loader = Self {
            dataset,
            config,
            indices: (0..dataset.len()).collect(),
        };
        loader.reshuffle();
        Ok(loader)
    }

    /// Number of batches one pass yields.
    pub fn num_batches(&self) -> usize {
        if self.config.drop_last {
            self.dataset.len() / self.config.batch_size
        } else {
            self.dataset.len().div_ceil(self.config.batch_size)
        }
    }

    /// Draw a new sample order (no-op unless shuffling).
    pub fn reshuffle(&mut self) {
        if self.config.shuffle {
            match self.config.seed {
                Some(seed) => {
                    let mut rng = StdRng::seed_from_u64(seed);
                    self.indices.shuffle(&mut rng);
                }
                None => {
                    let mut rng = thread_rng();
                    self.indices.shuffle(&mut rng);
                }
            }
        }
    }

    pub fn iter(&self) -> BatchIter<'_, 'a> {
        BatchIter {
            loader: self,
            next_batch: 0,
        }
    }
}

/// Yields one batch per step; every sample is read from disk on demand.
pub struct BatchIter<'l, 'a> {
    loader: &'l DataLoader<'a>,
    next_batch: usize,
}

impl Iterator for BatchIter<'_, '_> {
    type Item = Result<Batch, DatasetError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_batch >= self.loader.num_batches() {
            return None;
        }
        let bs = self.loader.config.batch_size;
        let start = self.next_batch * bs;
        let end = (start + bs).min(self.loader.indices.len());
        self.next_batch += 1;

        debug!("batch {}: samples {start}..{end}", self.next_batch - 1);
        let samples = self.loader.indices[start..end]
            .iter()
            .map(|&i| self.loader.dataset.get(i))
            .collect::<Result<Vec<_>, _>>();
        Some(samples.and_then(Batch::collate))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.loader.num_batches().saturating_sub(self.next_batch);
        (remaining, Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::tests::sample;
    use crate::data::model::Sample;
    use rstest::rstest;

    /// Sample `i` has every pixel set to `i`.
    struct Counting(usize);

    impl Dataset for Counting {
        fn len(&self) -> usize {
            self.0
        }

        fn get(&self, index: usize) -> Result<Sample, DatasetError> {
            if index >= self.0 {
                return Err(DatasetError::IndexOutOfRange { index, len: self.0 });
            }
            Ok(sample(&format!("p{index}"), index as f32, &[1.0, 0.0]))
        }
    }

    fn first_pixels(loader: &DataLoader<'_>) -> Vec<Vec<f32>> {
        loader
            .iter()
            .map(|b| {
                let b = b.unwrap();
                (0..b.len()).map(|i| b.image[[i, 0, 0, 0]]).collect()
            })
            .collect()
    }

    #[rstest]
    #[case(10, 3, false, 4)]
    #[case(10, 3, true, 3)]
    #[case(9, 3, false, 3)]
    #[case(0, 4, false, 0)]
    fn counts_batches(
        #[case] n: usize,
        #[case] bs: usize,
        #[case] drop_last: bool,
        #[case] expected: usize,
    ) {
        let ds = Counting(n);
        let loader =
            DataLoader::new(&ds, DataLoaderConfig::default().batch_size(bs).drop_last(drop_last))
                .unwrap();
        assert_eq!(loader.num_batches(), expected);
        assert_eq!(loader.iter().count(), expected);
    }

    #[test]
    fn sequential_order_and_tail() {
        let ds = Counting(5);
        let loader = DataLoader::new(&ds, DataLoaderConfig::default().batch_size(2)).unwrap();
        assert_eq!(
            first_pixels(&loader),
            vec![vec![0.0, 1.0], vec![2.0, 3.0], vec![4.0]]
        );
    }

    #[test]
    fn seeded_shuffle_is_reproducible_permutation() {
        let ds = Counting(20);
        let config = DataLoaderConfig::default().batch_size(4).shuffle(true).seed(7);
        let a = first_pixels(&DataLoader::new(&ds, config.clone()).unwrap());
        let b = first_pixels(&DataLoader::new(&ds, config).unwrap());
        assert_eq!(a, b);

        let mut seen: Vec<f32> = a.into_iter().flatten().collect();
        seen.sort_by(f32::total_cmp);
        assert_eq!(seen, (0..20).map(|i| i as f32).collect::<Vec<_>>());
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let ds = Counting(3);
        assert!(matches!(
            DataLoader::new(&ds, DataLoaderConfig::default().batch_size(0)),
            Err(DatasetError::InvalidBatchSize)
        ));
    }

    #[test]
    fn batch_shapes() {
        let ds = Counting(3);
        let loader = DataLoader::new(&ds, DataLoaderConfig::default().batch_size(3)).unwrap();
        let batch = loader.iter().next().unwrap().unwrap();
        assert_eq!(batch.image.dim(), (3, 12, 4, 4));
        assert_eq!(batch.label.dim(), (3, 2));
    }
}
