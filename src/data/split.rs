use polars::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Seeded shuffle split into `(train, test)`. The test share is rounded up
/// so a non-zero `test_size` on a non-trivial frame always yields at least
/// one test row.
pub fn train_test_split(
    df: &DataFrame,
    test_size: f64,
    seed: u64,
) -> PolarsResult<(DataFrame, DataFrame)> {
    let rows = df.height();
    let mut indices: Vec<IdxSize> = (0..rows as IdxSize).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);
    let shuffled = df.take(&IdxCa::from_vec("row".into(), indices))?;

    let test_rows = ((rows as f64) * test_size).ceil() as usize;
    let test_rows = test_rows.min(rows.saturating_sub(1));
    Ok((
        shuffled.slice(test_rows as i64, rows - test_rows),
        shuffled.slice(0, test_rows),
    ))
}
