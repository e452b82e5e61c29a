use super::rdbms::{RdbmsDataSource, SplitProvider};
use async_trait::async_trait;
use conflux_common::models::DataSourceInstance;
use conflux_error::{ConfluxError, ErrorCode, Result};
use conflux_sql::query::{Select, SplitDescription};

/// The whole table is one split.
pub struct SingleSplitProvider;

#[async_trait]
impl SplitProvider for SingleSplitProvider {
    async fn list_splits(
        &self,
        _source: &RdbmsDataSource,
        _instance: &DataSourceInstance,
        _select: &Select,
    ) -> Result<Vec<SplitDescription>> {
        Ok(vec![SplitDescription::Single])
    }
}

/// Parses a PostgreSQL array literal of integers such as `{1,5,10}`.
pub fn parse_histogram_bounds(text: &str) -> Result<Vec<i64>> {
    let inner = text
        .trim()
        .strip_prefix('{')
        .and_then(|t| t.strip_suffix('}'))
        .ok_or_else(|| {
            ConfluxError::new(
                ErrorCode::PermanentBackendError,
                format!("malformed histogram bounds '{}'", text),
            )
        })?;

    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }

    inner
        .split(',')
        .map(|b| {
            b.trim().trim_matches('"').parse::<i64>().map_err(|e| {
                ConfluxError::new(
                    ErrorCode::PermanentBackendError,
                    format!("histogram bound '{}' is not an integer: {}", b, e),
                )
            })
        })
        .collect()
}

/// Turns sorted bounds `b0 < b1 < .. < bn` into `(-inf, b0)`, `[b0, b1)`, ..,
/// `[bn, +inf)`. Together the splits cover every key exactly once.
pub fn splits_from_bounds(column: &str, bounds: &[i64]) -> Vec<SplitDescription> {
    if bounds.is_empty() {
        return vec![SplitDescription::Single];
    }

    let mut edges: Vec<Option<i64>> = Vec::with_capacity(bounds.len() + 2);
    edges.push(None);
    edges.extend(bounds.iter().copied().map(Some));
    edges.push(None);
    edges.dedup();

    edges
        .windows(2)
        .map(|w| SplitDescription::HistogramBounds {
            column: column.to_string(),
            lower: w[0],
            upper: w[1],
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bounds() {
        assert_eq!(parse_histogram_bounds("{1,5,10}").unwrap(), vec![1, 5, 10]);
        assert_eq!(parse_histogram_bounds("{}").unwrap(), Vec::<i64>::new());
        assert!(parse_histogram_bounds("1,5").is_err());
        assert!(parse_histogram_bounds("{a,b}").is_err());
    }

    #[test]
    fn test_splits_cover_the_key_space() {
        let splits = splits_from_bounds("id", &[1, 5, 10]);
        let ranges: Vec<(Option<i64>, Option<i64>)> = splits
            .iter()
            .map(|s| match s {
                SplitDescription::HistogramBounds { lower, upper, .. } => (*lower, *upper),
                SplitDescription::Single => panic!("unexpected single split"),
            })
            .collect();
        assert_eq!(
            ranges,
            vec![
                (None, Some(1)),
                (Some(1), Some(5)),
                (Some(5), Some(10)),
                (Some(10), None)
            ]
        );
    }

    #[test]
    fn test_no_bounds_is_one_split() {
        assert_eq!(splits_from_bounds("id", &[]), vec![SplitDescription::Single]);
    }
}
