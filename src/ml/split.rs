use crate::error::{AppError, Result};
use tracing::info;

/// Partition rows into train/test sets by a year attribute.
///
/// Train rows are those whose year is in `train_years`; test rows are those
/// whose year equals `test_year`. Rows in neither set are discarded.
///
/// Leakage is a correctness invariant, not a recoverable condition: a train
/// row carrying the test year, or a test row carrying any other year,
/// aborts the pipeline. Silent leakage would invalidate every downstream
/// metric.
pub fn split_by_year<T, F>(
    rows: &[T],
    year_of: F,
    train_years: &[i32],
    test_year: i32,
) -> Result<(Vec<T>, Vec<T>)>
where
    T: Clone,
    F: Fn(&T) -> i32,
{
    if train_years.contains(&test_year) {
        return Err(AppError::DataIntegrity(format!(
            "test year {} is listed among the training years",
            test_year
        )));
    }

    let mut train = Vec::new();
    let mut test = Vec::new();
    for row in rows {
        let year = year_of(row);
        if train_years.contains(&year) {
            train.push(row.clone());
        } else if year == test_year {
            test.push(row.clone());
        }
    }

    // Verify no leakage survived the partition
    if train.iter().any(|row| year_of(row) == test_year) {
        return Err(AppError::DataIntegrity(
            "test year found in training data".to_string(),
        ));
    }
    if test.iter().any(|row| year_of(row) != test_year) {
        return Err(AppError::DataIntegrity(
            "non-test year found in test data".to_string(),
        ));
    }

    info!(
        train_records = train.len(),
        test_records = test.len(),
        ?train_years,
        test_year,
        "Year split verified, no data leakage"
    );

    Ok((train, test))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Row {
        year: i32,
        value: u32,
    }

    fn rows(years: &[i32]) -> Vec<Row> {
        years
            .iter()
            .enumerate()
            .map(|(i, &year)| Row {
                year,
                value: i as u32,
            })
            .collect()
    }

    #[test]
    fn test_split_partitions_exactly_by_year() {
        let data = rows(&[2020, 2021, 2022, 2023, 2024, 2024, 2019]);
        let (train, test) =
            split_by_year(&data, |r| r.year, &[2020, 2021, 2022, 2023], 2024).unwrap();

        assert_eq!(train.len(), 4);
        assert!(train.iter().all(|r| (2020..=2023).contains(&r.year)));
        assert_eq!(test.len(), 2);
        assert!(test.iter().all(|r| r.year == 2024));
        // 2019 belongs to neither partition
        assert!(!train.iter().chain(test.iter()).any(|r| r.year == 2019));
    }

    #[test]
    fn test_split_has_zero_overlap() {
        let data = rows(&[2020, 2021, 2024, 2024, 2021]);
        let (train, test) = split_by_year(&data, |r| r.year, &[2020, 2021], 2024).unwrap();

        for t in &train {
            assert!(!test.contains(t));
        }
    }

    #[test]
    fn test_test_year_in_train_years_is_fatal() {
        let data = rows(&[2020, 2024]);
        let err = split_by_year(&data, |r| r.year, &[2020, 2024], 2024).unwrap_err();
        assert!(matches!(err, AppError::DataIntegrity(_)));
    }

    #[test]
    fn test_empty_input_yields_empty_partitions() {
        let data: Vec<Row> = Vec::new();
        let (train, test) = split_by_year(&data, |r| r.year, &[2020], 2024).unwrap();
        assert!(train.is_empty());
        assert!(test.is_empty());
    }
}
