use std::{fs, io, path::Path};

use ordered_float::OrderedFloat;

pub fn create_folder_if_not_exists(dir: &Path) -> io::Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

/// Arithmetic mean, 0 for an empty window
pub fn moving_average(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Smallest and largest finite value
pub fn finite_bounds(values: &[f64]) -> Option<(f64, f64)> {
    let finite = values.iter().copied().filter(|value| value.is_finite()).map(OrderedFloat);

    let min = finite.clone().min()?;
    let max = finite.max()?;
    Some((min.0, max.0))
}

pub fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0., 0usize), |(sum, count), value| (sum + value, count + 1));

    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}
