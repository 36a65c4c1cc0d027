/// Arithmetic mean, `None` for an empty slice.
pub fn mean(data: &[f64]) -> Option<f64> {
    match data.len() {
        0 => None,
        count => Some(data.iter().sum::<f64>() / count as f64),
    }
}

/// Population standard deviation (divides by `n`, not `n - 1`).
pub fn population_std_dev(data: &[f64]) -> Option<f64> {
    let data_mean = mean(data)?;
    let variance = data
        .iter()
        .map(|value| {
            let diff = data_mean - *value;

            diff * diff
        })
        .sum::<f64>()
        / data.len() as f64;

    Some(variance.sqrt())
}

/// Splits `timestamps` into consecutive pairs, dropping a trailing unpaired
/// value, and returns `second - first` for each pair.
pub fn paired_differences(timestamps: &[f64]) -> Vec<f64> {
    timestamps
        .chunks_exact(2)
        .map(|pair| pair[1] - pair[0])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[10., 20., 30., 15., 22.]), Some(19.4));
        assert_eq!(mean(&[0.25]), Some(0.25));
    }

    #[test]
    fn test_mean_empty_slice() {
        assert_eq!(mean(&[]), None);
    }

    #[test]
    fn test_mean_negative_values() {
        assert_eq!(mean(&[-5.0, -10.0, -15.0]), Some(-10.0));
    }

    #[test]
    fn test_population_std_dev() {
        assert_eq!(
            population_std_dev(&[100., 120., 90., 102., 94.]),
            Some(10.322790320451151)
        );
    }

    #[test]
    fn test_population_std_dev_of_two_is_half_the_gap() {
        let sdev = population_std_dev(&[0.1, 0.3]).unwrap();
        assert!((sdev - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_population_std_dev_empty_and_identical() {
        assert_eq!(population_std_dev(&[]), None);
        assert_eq!(population_std_dev(&[5.0, 5.0, 5.0]), Some(0.0));
    }

    #[test]
    fn test_paired_differences_drops_trailing_value() {
        assert_eq!(paired_differences(&[1.0, 1.5, 2.0, 3.0, 9.0]), vec![0.5, 1.0]);
        assert!(paired_differences(&[4.0]).is_empty());
    }
}
