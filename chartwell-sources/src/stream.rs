//! Simulated push adapter.
//!
//! Never touches the network. Each fetch returns a fixed baseline with every
//! value independently perturbed by up to `±jitter_pct`. With a field map,
//! the baseline is first laid out at the map's source paths so the normal
//! mapping step reproduces the shape the caller asked for.

use crate::path_map::{get_value, map_payload, set_value};
use crate::{DataSourceAdapter, FetchContext};
use async_trait::async_trait;
use chartwell_core::{
    ChartResponse, DataSourceDescriptor, Dataset, FetchError, FetchResult, FieldMap, SourceKind,
    StreamSettings,
};
use rand::Rng;
use serde_json::{Map, Value};

/// A labelled series used as the unperturbed feed.
#[derive(Debug, Clone, PartialEq)]
pub struct Baseline {
    pub labels: Vec<String>,
    pub series: Vec<(String, Vec<f64>)>,
}

impl Default for Baseline {
    fn default() -> Self {
        Self {
            labels: ["Jan", "Feb", "Mar", "Apr", "May", "Jun"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            series: vec![(
                "Live".to_string(),
                vec![65.0, 59.0, 80.0, 81.0, 56.0, 55.0],
            )],
        }
    }
}

#[derive(Debug, Clone)]
pub struct StreamAdapter {
    baseline: Baseline,
    jitter_pct: f64,
}

impl StreamAdapter {
    pub fn new(settings: &StreamSettings) -> Self {
        Self {
            baseline: Baseline::default(),
            jitter_pct: settings.jitter_pct.abs(),
        }
    }

    pub fn with_baseline(mut self, baseline: Baseline) -> Self {
        self.baseline = baseline;
        self
    }

    pub fn jitter_pct(&self) -> f64 {
        self.jitter_pct
    }

    /// One perturbed sample of the baseline in canonical form.
    pub fn sample(&self) -> ChartResponse {
        let mut rng = rand::rng();
        let datasets = self
            .baseline
            .series
            .iter()
            .map(|(label, values)| {
                let perturbed = values
                    .iter()
                    .map(|v| perturb(*v, self.jitter_pct, &mut rng))
                    .collect();
                Dataset::new(label.clone(), perturbed)
            })
            .collect();

        ChartResponse {
            labels: self.baseline.labels.clone(),
            datasets,
            ..Default::default()
        }
    }
}

fn perturb<R: Rng>(value: f64, pct: f64, rng: &mut R) -> f64 {
    if pct <= 0.0 {
        return value;
    }
    let factor = 1.0 + rng.random_range(-pct..=pct);
    (value * factor * 100.0).round() / 100.0
}

/// Lay `canonical` out so that mapping it through `table` yields the
/// canonical fields again: each target's value is written at its source path.
pub fn lay_out_for(canonical: &Value, table: &FieldMap) -> Value {
    let mut payload = Value::Object(Map::new());
    for (target, source) in table {
        if let Some(value) = get_value(canonical, target) {
            set_value(&mut payload, source, value.clone());
        }
    }
    payload
}

#[async_trait]
impl DataSourceAdapter for StreamAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Stream
    }

    async fn fetch_json(
        &self,
        descriptor: &DataSourceDescriptor,
        ctx: &FetchContext,
    ) -> FetchResult<Value> {
        if !matches!(descriptor, DataSourceDescriptor::Stream(_)) {
            return Err(FetchError::invalid_source(format!(
                "stream adapter cannot fetch a {} source",
                descriptor.kind()
            )));
        }
        if ctx.cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        let sample = self.sample().to_json();
        match &ctx.field_map {
            Some(table) if !table.is_empty() => {
                Ok(map_payload(&lay_out_for(&sample, table), table))
            }
            _ => Ok(sample),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chartwell_core::{DataPoints, StreamSource};
    use serde_json::json;

    fn stream_source() -> DataSourceDescriptor {
        DataSourceDescriptor::Stream(StreamSource {
            url: "wss://feed.test/live".to_string(),
            refresh_interval_ms: Some(1000),
        })
    }

    fn values(response: &ChartResponse) -> Vec<f64> {
        match &response.datasets[0].data {
            DataPoints::Values(v) => v.iter().map(|x| x.unwrap_or_default()).collect(),
            DataPoints::Points(_) => Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_values_stay_within_jitter() {
        let adapter = StreamAdapter::new(&StreamSettings {
            refresh_interval_ms: 1000,
            jitter_pct: 0.1,
        });
        let baseline = Baseline::default().series[0].1.clone();
        for _ in 0..50 {
            let response = adapter
                .fetch(&stream_source(), &FetchContext::default())
                .await
                .unwrap();
            assert_eq!(response.labels.len(), 6);
            for (got, base) in values(&response).iter().zip(&baseline) {
                assert!((got - base).abs() <= base * 0.1 + 0.01, "{} vs {}", got, base);
            }
        }
    }

    #[tokio::test]
    async fn test_zero_jitter_is_baseline() {
        let adapter = StreamAdapter::new(&StreamSettings {
            refresh_interval_ms: 1000,
            jitter_pct: 0.0,
        });
        let response = adapter
            .fetch(&stream_source(), &FetchContext::default())
            .await
            .unwrap();
        assert_eq!(values(&response), Baseline::default().series[0].1);
    }

    #[tokio::test]
    async fn test_field_map_shape_is_honoured() {
        let adapter = StreamAdapter::new(&StreamSettings::default()).with_baseline(Baseline {
            labels: vec!["a".to_string(), "b".to_string()],
            series: vec![("S".to_string(), vec![1.0, 2.0])],
        });
        let mut table = FieldMap::new();
        table.insert("labels".to_string(), "$.feed.ticks".to_string());
        table.insert("datasets".to_string(), "$.feed.series".to_string());

        let ctx = FetchContext::default().with_field_map(table);
        let response = adapter.fetch(&stream_source(), &ctx).await.unwrap();
        assert_eq!(response.labels, vec!["a", "b"]);
        assert_eq!(response.datasets.len(), 1);
        assert_eq!(response.datasets[0].label, "S");
    }

    #[test]
    fn test_lay_out_for_inverts_mapping() {
        let canonical = json!({"labels": ["x"], "datasets": []});
        let mut table = FieldMap::new();
        table.insert("labels".to_string(), "$.months".to_string());
        let payload = lay_out_for(&canonical, &table);
        assert_eq!(payload, json!({"months": ["x"]}));
        assert_eq!(map_payload(&payload, &table), json!({"labels": ["x"]}));
    }

    #[tokio::test]
    async fn test_out_of_range_source_index_is_skipped() {
        let adapter = StreamAdapter::new(&StreamSettings::default());
        let mut table = FieldMap::new();
        table.insert("labels".to_string(), "$.ticks[18446744073709551615]".to_string());
        table.insert("datasets".to_string(), "$.series".to_string());

        let ctx = FetchContext::default().with_field_map(table);
        let response = adapter.fetch(&stream_source(), &ctx).await.unwrap();
        assert!(response.labels.is_empty());
        assert_eq!(response.datasets.len(), 1);
    }

    #[tokio::test]
    async fn test_rejects_other_sources() {
        let adapter = StreamAdapter::new(&StreamSettings::default());
        let rest = DataSourceDescriptor::Rest(chartwell_core::RequestSource::get("https://a"));
        let err = adapter
            .fetch(&rest, &FetchContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidSource { .. }));
    }
}
