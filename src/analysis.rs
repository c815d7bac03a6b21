use std::collections::HashMap;
use std::fmt::Display;

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::config::AnalysisConfig;
use crate::error::Error;

/// Severity buckets in the order they are stored.
pub const STATUS_BUCKETS: [&str; 4] = ["Fine", "Danger", "Serious", "Very Serious"];

const DISTANCE_SLOT: usize = 2;
const ANGLE_SLOT: usize = 3;
const LANDMARK_SLOTS: usize = 4;
const POINT_SLOTS: [(usize, &str); 2] = [(0, "first point"), (1, "second point")];
const MAX_CONFIDENCE: f64 = 100.0;

/// Body returned by the pose-estimation service.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisPayload {
    pub result: Vec<i32>,
    pub normal_ratio: f64,
    pub scores: Vec<f64>,
    /// Each entry is `[[x, y], [x, y], distance, angle]`.
    pub landmarks_info: Vec<Vec<Value>>,
    #[serde(default)]
    pub status_frequencies: HashMap<String, i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Posture {
    Abnormal,
    Normal,
}

impl Posture {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Abnormal),
            1 => Some(Self::Normal),
            _ => None,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            Self::Abnormal => 0,
            Self::Normal => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedAnalysis {
    pub postures: Vec<Posture>,
    pub confidences: Vec<f64>,
    pub normal_ratio: String,
    pub status_frequencies: String,
    pub distances: String,
    pub angles: String,
}

impl ParsedAnalysis {
    /// Classification sequence as stored on the report, e.g. `[0 1 1]`.
    pub fn predict(&self) -> String {
        bracketed(self.postures.iter().map(|p| p.code()))
    }
}

pub fn parse_analysis(payload: &AnalysisPayload) -> Result<ParsedAnalysis, Error> {
    let segments = payload.result.len();
    if payload.scores.len() != segments || payload.landmarks_info.len() != segments {
        return Err(Error::MalformedPayload(format!(
            "segment count mismatch: {} results, {} scores, {} landmarks",
            segments,
            payload.scores.len(),
            payload.landmarks_info.len()
        )));
    }

    let postures = payload
        .result
        .iter()
        .enumerate()
        .map(|(i, &code)| {
            Posture::from_code(code).ok_or_else(|| {
                Error::MalformedPayload(format!("segment {i}: unknown classification {code}"))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if let Some((i, confidence)) = payload
        .scores
        .iter()
        .enumerate()
        .find(|(_, c)| !(0.0..=MAX_CONFIDENCE).contains(*c))
    {
        return Err(Error::MalformedPayload(format!(
            "segment {i}: confidence {confidence} outside 0-{MAX_CONFIDENCE}"
        )));
    }

    let mut distances = Vec::with_capacity(segments);
    let mut angles = Vec::with_capacity(segments);
    for (i, landmark) in payload.landmarks_info.iter().enumerate() {
        if landmark.len() != LANDMARK_SLOTS {
            return Err(Error::MalformedPayload(format!(
                "landmark {i}: expected {LANDMARK_SLOTS} fields, got {}",
                landmark.len()
            )));
        }
        for (slot, field) in POINT_SLOTS {
            landmark_point(landmark, i, slot, field)?;
        }
        distances.push(landmark_number(landmark, i, DISTANCE_SLOT, "distance")?);
        angles.push(landmark_number(landmark, i, ANGLE_SLOT, "angle")?);
    }

    debug!(segments, "parsed analysis payload");

    Ok(ParsedAnalysis {
        postures,
        confidences: payload.scores.clone(),
        normal_ratio: format!("{:.3}", payload.normal_ratio),
        status_frequencies: format_status_frequencies(&payload.status_frequencies),
        distances: format_decimals(&distances, 3),
        angles: format_decimals(&angles, 3),
    })
}

fn landmark_number(landmark: &[Value], index: usize, slot: usize, field: &str) -> Result<f64, Error> {
    landmark
        .get(slot)
        .and_then(Value::as_f64)
        .ok_or_else(|| Error::MalformedPayload(format!("landmark {index}: {field} is not a number")))
}

/// Checks an `[x, y]` pair.
fn landmark_point(landmark: &[Value], index: usize, slot: usize, field: &str) -> Result<(), Error> {
    let is_pair = landmark
        .get(slot)
        .and_then(Value::as_array)
        .is_some_and(|point| point.len() == 2 && point.iter().all(Value::is_number));
    if is_pair {
        Ok(())
    } else {
        Err(Error::MalformedPayload(format!(
            "landmark {index}: {field} is not an [x, y] pair"
        )))
    }
}

pub fn format_status_frequencies(histogram: &HashMap<String, i64>) -> String {
    bracketed(
        STATUS_BUCKETS
            .iter()
            .map(|bucket| histogram.get(*bucket).copied().unwrap_or(0)),
    )
}

pub fn format_decimals(values: &[f64], precision: usize) -> String {
    bracketed(values.iter().map(|v| format!("{v:.precision$}")))
}

fn bracketed<T: Display>(items: impl Iterator<Item = T>) -> String {
    let joined = items.map(|item| item.to_string()).collect::<Vec<_>>().join(" ");
    format!("[{joined}]")
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AnalysisClient: Send + Sync {
    async fn analyze(&self, video_url: &str) -> Result<AnalysisPayload, Error>;
}

/// Calls the pose-estimation endpoint over HTTP.
#[derive(Clone)]
pub struct HttpAnalysisClient {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpAnalysisClient {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint,
        }
    }
}

#[async_trait]
impl AnalysisClient for HttpAnalysisClient {
    async fn analyze(&self, video_url: &str) -> Result<AnalysisPayload, Error> {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("video_url", video_url);

        let body = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        serde_json::from_str(&body).map_err(|e| Error::MalformedPayload(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_payload() -> AnalysisPayload {
        serde_json::from_value(json!({
            "result": [0, 1, 1],
            "hunched_ratio": 33.3,
            "normal_ratio": 66.66666,
            "scores": [99.9, 92.9, 82.3],
            "landmarks_info": [
                [[0.1, 0.2], [0.3, 0.4], 1.0, 45.0],
                [[0.5, 0.6], [0.7, 0.8], 2.0, 60.0],
                [[0.5, 0.6], [0.7, 0.8], 2.12345, 61.5]
            ],
            "status_frequencies": {"Very Serious": 6}
        }))
        .unwrap()
    }

    #[test]
    fn parses_sequences_and_formats_text_fields() {
        let parsed = parse_analysis(&sample_payload()).unwrap();

        assert_eq!(
            parsed.postures,
            vec![Posture::Abnormal, Posture::Normal, Posture::Normal]
        );
        assert_eq!(parsed.confidences, vec![99.9, 92.9, 82.3]);
        assert_eq!(parsed.predict(), "[0 1 1]");
        assert_eq!(parsed.normal_ratio, "66.667");
        assert_eq!(parsed.status_frequencies, "[0 0 0 6]");
        assert_eq!(parsed.distances, "[1.000 2.000 2.123]");
        assert_eq!(parsed.angles, "[45.000 60.000 61.500]");
    }

    #[test]
    fn missing_buckets_default_to_zero() {
        assert_eq!(format_status_frequencies(&HashMap::new()), "[0 0 0 0]");

        let full = HashMap::from([
            ("Fine".to_string(), 1),
            ("Danger".to_string(), 2),
            ("Serious".to_string(), 1),
            ("Very Serious".to_string(), 2),
        ]);
        assert_eq!(format_status_frequencies(&full), "[1 2 1 2]");
    }

    #[test]
    fn histogram_is_optional_in_payload() {
        let payload: AnalysisPayload = serde_json::from_value(json!({
            "result": [],
            "normal_ratio": 0.0,
            "scores": [],
            "landmarks_info": []
        }))
        .unwrap();
        let parsed = parse_analysis(&payload).unwrap();
        assert_eq!(parsed.status_frequencies, "[0 0 0 0]");
        assert_eq!(parsed.distances, "[]");
    }

    #[test]
    fn landmark_without_angle_is_rejected() {
        let mut payload = sample_payload();
        payload.landmarks_info[1] = vec![json!([0.5, 0.6]), json!([0.7, 0.8]), json!(2.0)];
        assert!(matches!(
            parse_analysis(&payload),
            Err(Error::MalformedPayload(_))
        ));
    }

    #[test]
    fn landmark_points_must_be_coordinate_pairs() {
        let mut payload = sample_payload();
        payload.landmarks_info[0] = vec![json!("oops"), Value::Null, json!(1.0), json!(2.0)];
        assert!(matches!(
            parse_analysis(&payload),
            Err(Error::MalformedPayload(_))
        ));

        let mut payload = sample_payload();
        payload.landmarks_info[2][1] = json!([0.7]);
        assert!(matches!(
            parse_analysis(&payload),
            Err(Error::MalformedPayload(_))
        ));

        let mut payload = sample_payload();
        payload.landmarks_info[1][0] = json!([0.5, "y"]);
        assert!(matches!(
            parse_analysis(&payload),
            Err(Error::MalformedPayload(_))
        ));
    }

    #[test]
    fn confidence_outside_percent_range_is_rejected() {
        let mut payload = sample_payload();
        payload.scores[1] = 250.0;
        assert!(matches!(
            parse_analysis(&payload),
            Err(Error::MalformedPayload(_))
        ));

        let mut payload = sample_payload();
        payload.scores[0] = -5.0;
        assert!(matches!(
            parse_analysis(&payload),
            Err(Error::MalformedPayload(_))
        ));

        let mut payload = sample_payload();
        payload.scores = vec![0.0, 100.0, 50.0];
        assert!(parse_analysis(&payload).is_ok());
    }

    #[test]
    fn non_numeric_distance_is_rejected() {
        let mut payload = sample_payload();
        payload.landmarks_info[0][DISTANCE_SLOT] = Value::Null;
        assert!(matches!(
            parse_analysis(&payload),
            Err(Error::MalformedPayload(_))
        ));
    }

    #[test]
    fn mismatched_lengths_fail_fast() {
        let mut payload = sample_payload();
        payload.scores.pop();
        assert!(matches!(
            parse_analysis(&payload),
            Err(Error::MalformedPayload(_))
        ));

        let mut payload = sample_payload();
        payload.landmarks_info.pop();
        assert!(matches!(
            parse_analysis(&payload),
            Err(Error::MalformedPayload(_))
        ));
    }

    #[test]
    fn unknown_label_is_rejected() {
        let mut payload = sample_payload();
        payload.result[2] = 2;
        assert!(matches!(
            parse_analysis(&payload),
            Err(Error::MalformedPayload(_))
        ));
    }

    #[test]
    fn payload_missing_required_field_does_not_decode() {
        let decoded = serde_json::from_value::<AnalysisPayload>(json!({
            "result": [1],
            "scores": [99.0],
            "landmarks_info": [[[0, 0], [0, 0], 1.0, 2.0]]
        }));
        assert!(decoded.is_err());
    }
}
