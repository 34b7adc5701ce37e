//! Aggregation of per-iteration scores into `mean ± half-width`.
//!
//! The half-width is that of a 95% normal-approximation confidence interval:
//! `1.96 * s / sqrt(n)` with `s` the Bessel-corrected sample standard deviation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One iteration's scores, keyed `test_<metric>`
pub type RawScore = BTreeMap<String, f64>;

/// z-value of a two-sided 95% interval
const Z_95: f64 = 1.96;

/// Key under which a metric's per-iteration score is stored
pub fn score_key(metric_name: &str) -> String {
    format!("test_{}", metric_name)
}

/// Mean of a metric over iterations, with its confidence half-width
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregatedScore {
    pub mean: f64,
    pub half_width: f64,
}

/// Aggregate one metric over a run's raw scores.
///
/// Each raw score is looked up under `test_<metric>` first and the bare metric
/// name second; iterations carrying neither are ignored. No values gives NaN
/// for both fields, a single value gives a NaN half-width.
pub fn aggregate_scores(raw_scores: &[RawScore], metric_name: &str) -> AggregatedScore {
    let prefixed = score_key(metric_name);
    let values: Vec<f64> = raw_scores
        .iter()
        .filter_map(|raw| raw.get(&prefixed).or_else(|| raw.get(metric_name)))
        .copied()
        .collect();
    aggregate_values(&values)
}

/// Mean and 95% half-width of a list of values
pub fn aggregate_values(values: &[f64]) -> AggregatedScore {
    let n = values.len();
    if n == 0 {
        return AggregatedScore {
            mean: f64::NAN,
            half_width: f64::NAN,
        };
    }

    let mean = values.iter().sum::<f64>() / n as f64;
    if n == 1 {
        return AggregatedScore {
            mean,
            half_width: f64::NAN,
        };
    }

    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    AggregatedScore {
        mean,
        half_width: Z_95 * variance.sqrt() / (n as f64).sqrt(),
    }
}

/// Render a score as `"55.00 ± 5.66"` in percent, dropping an undefined half-width
pub fn format_score(score: AggregatedScore) -> String {
    if score.mean.is_nan() {
        "n/a".to_string()
    } else if score.half_width.is_nan() {
        format!("{:.2}", score.mean * 100.0)
    } else {
        format!("{:.2} ± {:.2}", score.mean * 100.0, score.half_width * 100.0)
    }
}

/// Raw per-iteration scores plus their aggregates.
///
/// `total` holds `test_<metric>` (mean) and `test_<metric>_se` (half-width).
/// Undefined values serialize as JSON `null` and read back as NaN.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreDict {
    #[serde(with = "nan_map_vec")]
    pub raw: Vec<RawScore>,
    #[serde(with = "nan_map")]
    pub total: BTreeMap<String, f64>,
}

impl ScoreDict {
    /// Aggregate every named metric over `raw`
    pub fn from_raw(raw: Vec<RawScore>, metric_names: &[&str]) -> Self {
        let mut total = BTreeMap::new();
        for name in metric_names {
            let score = aggregate_scores(&raw, name);
            total.insert(score_key(name), score.mean);
            total.insert(format!("{}_se", score_key(name)), score.half_width);
        }
        Self { raw, total }
    }

    /// Aggregate of one metric as stored in `total`
    pub fn get(&self, metric_name: &str) -> Option<AggregatedScore> {
        let key = score_key(metric_name);
        let mean = *self.total.get(&key)?;
        let half_width = self
            .total
            .get(&format!("{}_se", key))
            .copied()
            .unwrap_or(f64::NAN);
        Some(AggregatedScore { mean, half_width })
    }

    /// Metric names present in `total`, in key order
    pub fn metric_names(&self) -> Vec<String> {
        self.total
            .keys()
            .filter(|k| !k.ends_with("_se"))
            .filter_map(|k| k.strip_prefix("test_"))
            .map(str::to_string)
            .collect()
    }
}

mod nan_map {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S: Serializer>(
        map: &BTreeMap<String, f64>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let optional: BTreeMap<&str, Option<f64>> = map
            .iter()
            .map(|(k, v)| (k.as_str(), (!v.is_nan()).then_some(*v)))
            .collect();
        optional.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<String, f64>, D::Error> {
        let optional = BTreeMap::<String, Option<f64>>::deserialize(deserializer)?;
        Ok(optional
            .into_iter()
            .map(|(k, v)| (k, v.unwrap_or(f64::NAN)))
            .collect())
    }
}

mod nan_map_vec {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S: Serializer>(
        maps: &[BTreeMap<String, f64>],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let optional: Vec<BTreeMap<&str, Option<f64>>> = maps
            .iter()
            .map(|map| {
                map.iter()
                    .map(|(k, v)| (k.as_str(), (!v.is_nan()).then_some(*v)))
                    .collect()
            })
            .collect();
        optional.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<BTreeMap<String, f64>>, D::Error> {
        let optional = Vec::<BTreeMap<String, Option<f64>>>::deserialize(deserializer)?;
        Ok(optional
            .into_iter()
            .map(|map| {
                map.into_iter()
                    .map(|(k, v)| (k, v.unwrap_or(f64::NAN)))
                    .collect()
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(key: &str, value: f64) -> RawScore {
        RawScore::from([(key.to_string(), value)])
    }

    #[test]
    fn test_mean_and_half_width() {
        let scores = vec![
            raw("test_mcc", 0.50),
            raw("test_mcc", 0.55),
            raw("test_mcc", 0.60),
        ];
        let agg = aggregate_scores(&scores, "mcc");
        assert!((agg.mean - 0.55).abs() < 1e-12);

        // sample std of [0.50, 0.55, 0.60] is 0.05
        let expected = 1.96 * 0.05 / 3f64.sqrt();
        assert!((agg.half_width - expected).abs() < 1e-12);
    }

    #[test]
    fn test_empty_scores_are_nan() {
        let agg = aggregate_scores(&[], "mcc");
        assert!(agg.mean.is_nan());
        assert!(agg.half_width.is_nan());
    }

    #[test]
    fn test_single_score_has_nan_half_width() {
        let agg = aggregate_scores(&[raw("test_mcc", 0.75)], "mcc");
        assert_eq!(agg.mean, 0.75);
        assert!(agg.half_width.is_nan());
    }

    #[test]
    fn test_unprefixed_key_is_accepted_and_prefixed_wins() {
        let mut both = raw("test_f1", 0.8);
        both.insert("f1".to_string(), 0.1);
        let scores = vec![raw("f1", 0.6), both];
        let agg = aggregate_scores(&scores, "f1");
        assert!((agg.mean - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_format_score() {
        let agg = AggregatedScore {
            mean: 0.55,
            half_width: 0.0566,
        };
        assert_eq!(format_score(agg), "55.00 ± 5.66");
        assert_eq!(
            format_score(AggregatedScore {
                mean: 0.75,
                half_width: f64::NAN
            }),
            "75.00"
        );
    }

    #[test]
    fn test_score_dict_totals() {
        let scores = vec![raw("test_acc", 0.5), raw("test_acc", 0.7)];
        let dict = ScoreDict::from_raw(scores, &["acc"]);
        assert!((dict.total["test_acc"] - 0.6).abs() < 1e-12);
        assert!(dict.total.contains_key("test_acc_se"));
        assert_eq!(dict.metric_names(), vec!["acc".to_string()]);
        assert_eq!(dict.get("acc").unwrap().mean, dict.total["test_acc"]);
    }

    #[test]
    fn test_score_dict_nan_serializes_as_null() {
        let dict = ScoreDict::from_raw(vec![raw("test_acc", 0.5)], &["acc"]);
        let json = serde_json::to_value(&dict).unwrap();
        assert_eq!(json["total"]["test_acc"], 0.5);
        assert!(json["total"]["test_acc_se"].is_null());

        let back: ScoreDict = serde_json::from_value(json).unwrap();
        assert!(back.total["test_acc_se"].is_nan());
        assert_eq!(back.raw, dict.raw);
    }
}
