use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

pub const DEFAULT_TRAIN_RATIO: f32 = 0.7;
pub const DEFAULT_VAL_RATIO: f32 = 0.15;

/// Node indices for each phase; test takes whatever train and val leave
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSplit {
    pub train: Vec<usize>,
    pub val: Vec<usize>,
    pub test: Vec<usize>,
}

impl DataSplit {
    pub fn random(num_nodes: usize, train_ratio: f32, val_ratio: f32, seed: u64) -> Self {
        let mut indices: Vec<usize> = (0..num_nodes).collect();
        indices.shuffle(&mut StdRng::seed_from_u64(seed));

        let train_size = ((train_ratio.clamp(0.0, 1.0) * num_nodes as f32) as usize).min(num_nodes);
        let val_size = ((val_ratio.clamp(0.0, 1.0) * num_nodes as f32) as usize).min(num_nodes - train_size);

        let test = indices.split_off(train_size + val_size);
        let val = indices.split_off(train_size);

        Self { train: indices, val, test }
    }
}
