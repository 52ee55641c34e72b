//! Canonical chart response.
//!
//! Every adapter produces this shape regardless of where the data came from.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// An `{x, y, r}` point for scatter and bubble charts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r: Option<f64>,
}

/// Dataset values: plain numbers (with gaps) or coordinate points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataPoints {
    Values(Vec<Option<f64>>),
    Points(Vec<Point>),
}

impl Default for DataPoints {
    fn default() -> Self {
        DataPoints::Values(Vec::new())
    }
}

impl DataPoints {
    pub fn len(&self) -> usize {
        match self {
            DataPoints::Values(v) => v.len(),
            DataPoints::Points(p) => p.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub data: DataPoints,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_color: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_width: Option<f64>,
    /// Renderer-specific styling keys passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Dataset {
    pub fn new(label: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            label: label.into(),
            data: DataPoints::Values(values.into_iter().map(Some).collect()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<String>,
}

/// `{labels, datasets, options?, meta?}` handed to the renderer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChartResponse {
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub datasets: Vec<Dataset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

impl ChartResponse {
    /// Build a response from arbitrary JSON, keeping whatever conforms.
    ///
    /// Labels are stringified. Dataset labels are stringified too, numeric
    /// strings in `data` become numbers and other non-numbers become gaps;
    /// `data` that is not an array becomes empty. Datasets that still fail
    /// to decode are dropped. A non-object input yields an empty response.
    pub fn from_value_lossy(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::default();
        };

        let labels = obj
            .get("labels")
            .and_then(Value::as_array)
            .map(|items| items.iter().map(label_text).collect())
            .unwrap_or_default();

        let datasets = obj
            .get("datasets")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(dataset_lossy)
                    .collect()
            })
            .unwrap_or_default();

        let options = obj.get("options").and_then(Value::as_object).cloned();
        let meta = obj
            .get("meta")
            .and_then(|m| serde_json::from_value::<ResponseMeta>(m.clone()).ok());

        Self {
            labels,
            datasets,
            options,
            meta,
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

fn dataset_lossy(value: &Value) -> Option<Dataset> {
    let mut obj = value.as_object()?.clone();
    if let Some(label) = obj.get("label").filter(|label| !label.is_string()) {
        let text = label_text(label);
        obj.insert("label".to_string(), Value::String(text));
    }
    if let Some(data) = obj.remove("data") {
        obj.insert("data".to_string(), data_lossy(data));
    }
    serde_json::from_value(Value::Object(obj)).ok()
}

fn data_lossy(data: Value) -> Value {
    match data {
        Value::Array(items) if items.iter().any(Value::is_object) => Value::Array(items),
        Value::Array(items) => Value::Array(items.into_iter().map(number_lossy).collect()),
        _ => Value::Array(Vec::new()),
    }
}

fn number_lossy(value: Value) -> Value {
    match value {
        Value::Number(_) => value,
        Value::String(text) => text
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map_or(Value::Null, Value::Number),
        _ => Value::Null,
    }
}

fn label_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dataset_accepts_gaps_and_styling() {
        let dataset: Dataset = serde_json::from_value(json!({
            "label": "Revenue",
            "data": [10, null, 30],
            "backgroundColor": ["#f00", "#0f0"],
            "tension": 0.4
        }))
        .unwrap();

        assert_eq!(dataset.data, DataPoints::Values(vec![Some(10.0), None, Some(30.0)]));
        assert_eq!(dataset.background_color, Some(json!(["#f00", "#0f0"])));
        assert_eq!(dataset.extra.get("tension"), Some(&json!(0.4)));
    }

    #[test]
    fn test_dataset_accepts_points() {
        let dataset: Dataset = serde_json::from_value(json!({
            "label": "Size",
            "data": [{"x": 1, "y": 2, "r": 5}, {"x": 3, "y": 4}]
        }))
        .unwrap();
        assert!(matches!(dataset.data, DataPoints::Points(ref p) if p.len() == 2));
    }

    #[test]
    fn test_from_value_lossy_stringifies_labels() {
        let response = ChartResponse::from_value_lossy(&json!({
            "labels": ["Jan", 2, null],
            "datasets": [{"label": "A", "data": [1]}, "garbage"],
            "meta": {"title": "Sales", "generatedAt": "2026-01-01T00:00:00Z"}
        }));

        assert_eq!(response.labels, vec!["Jan", "2", ""]);
        assert_eq!(response.datasets.len(), 1);
        assert_eq!(
            response.meta.and_then(|m| m.title),
            Some("Sales".to_string())
        );
    }

    #[test]
    fn test_from_value_lossy_coerces_dataset_fields() {
        let response = ChartResponse::from_value_lossy(&json!({
            "labels": ["Jan", "Feb", "Mar"],
            "datasets": [
                {"label": "ok", "data": ["1", " 2.5 ", "n/a"]},
                {"label": 7, "data": [true, null, 3]},
                {"label": "flat", "data": "x"}
            ]
        }));

        assert_eq!(response.datasets.len(), 3);
        assert_eq!(
            response.datasets[0].data,
            DataPoints::Values(vec![Some(1.0), Some(2.5), None])
        );
        assert_eq!(response.datasets[1].label, "7");
        assert_eq!(
            response.datasets[1].data,
            DataPoints::Values(vec![None, None, Some(3.0)])
        );
        assert!(response.datasets[2].data.is_empty());
    }

    #[test]
    fn test_from_value_lossy_non_object() {
        assert_eq!(
            ChartResponse::from_value_lossy(&json!([1, 2])),
            ChartResponse::default()
        );
    }

    #[test]
    fn test_serializes_camel_case() {
        let mut dataset = Dataset::new("A", vec![1.0]);
        dataset.border_width = Some(2.0);
        let response = ChartResponse {
            labels: vec!["x".to_string()],
            datasets: vec![dataset],
            ..Default::default()
        };
        let json = response.to_json();
        assert_eq!(json["datasets"][0]["borderWidth"], json!(2.0));
        assert!(json.get("options").is_none());
    }
}
