use crate::analysis::Posture;
use crate::error::Error;

/// Composite 0-100 score for one analysis, formatted to two decimals.
pub fn calculate_score(postures: &[Posture], confidences: &[f64]) -> Result<String, Error> {
    if postures.is_empty() {
        return Err(Error::InvalidInput(
            "cannot score an analysis with no segments".to_string(),
        ));
    }
    if postures.len() != confidences.len() {
        return Err(Error::InvalidInput(format!(
            "{} classifications but {} confidences",
            postures.len(),
            confidences.len()
        )));
    }

    if let Some(confidence) = confidences.iter().find(|c| !(0.0..=100.0).contains(*c)) {
        return Err(Error::InvalidInput(format!(
            "confidence {confidence} is outside 0-100"
        )));
    }

    let mut normal_cases = Vec::with_capacity(postures.len());
    let mut abnormal_cases = Vec::with_capacity(postures.len());
    for (posture, &confidence) in postures.iter().zip(confidences) {
        match posture {
            Posture::Normal => normal_cases.push(confidence),
            Posture::Abnormal => abnormal_cases.push(confidence),
        }
    }

    let case_weight = 100.0 / postures.len() as f64;
    let mut total = 0.0;
    for confidence in normal_cases {
        total += normal_weight(confidence) * case_weight;
    }
    for confidence in abnormal_cases {
        total += abnormal_weight(confidence) * case_weight;
    }

    Ok(format!("{total:.2}"))
}

pub fn normal_weight(confidence: f64) -> f64 {
    match confidence {
        c if c >= 99.8 => 1.0,
        c if c >= 99.0 => 0.97,
        c if c >= 96.0 => 0.94,
        c if c >= 93.0 => 0.9,
        _ => 0.86,
    }
}

/// A confident abnormal call earns less than a hesitant one.
pub fn abnormal_weight(confidence: f64) -> f64 {
    match confidence {
        c if c >= 99.5 => 0.18,
        c if c >= 98.0 => 0.23,
        c if c >= 95.0 => 0.3,
        c if c >= 90.0 => 0.35,
        _ => 0.43,
    }
}
