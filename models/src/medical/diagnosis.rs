// models/src/medical/diagnosis.rs
//! Output of the fundus-image classifier.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A graded prediction. The classifier may add keys of its own (per-class
/// scores, model version); they are passed through untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub stage: String,
    #[serde(default)]
    pub probability: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The JSON document the classifier printed.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PredictorOutput {
    Failure { error: String },
    Success(Prediction),
}

impl PredictorOutput {
    /// The whole of stdout is tried first, so pretty-printed JSON works.
    /// Failing that, the last non-empty line is parsed on its own so that
    /// progress chatter ahead of the result is tolerated.
    pub fn parse(stdout: &str) -> Result<Self, serde_json::Error> {
        let whole = serde_json::from_str(stdout.trim());
        if whole.is_ok() {
            return whole;
        }
        match stdout.lines().rev().map(str::trim).find(|line| !line.is_empty()) {
            Some(last) if last != stdout.trim() => serde_json::from_str(last).or(whole),
            _ => whole,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_success_and_keeps_extra_keys() {
        let out = PredictorOutput::parse(r#"{"stage":"Moderate","probability":0.72,"model":"effnet-b3"}"#).unwrap();
        match out {
            PredictorOutput::Success(p) => {
                assert_eq!(p.stage, "Moderate");
                assert_eq!(p.probability, serde_json::json!(0.72));
                assert_eq!(p.extra["model"], "effnet-b3");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn parses_pretty_printed_output() {
        let stdout = "{\n  \"stage\": \"Mild\",\n  \"probability\": 0.9\n}\n";
        match PredictorOutput::parse(stdout).unwrap() {
            PredictorOutput::Success(p) => {
                assert_eq!(p.stage, "Mild");
                assert_eq!(p.probability, serde_json::json!(0.9));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn parses_reported_failure() {
        let out = PredictorOutput::parse(r#"{"error":"cannot read image"}"#).unwrap();
        assert_eq!(out, PredictorOutput::Failure { error: "cannot read image".into() });
    }

    #[test]
    fn chatter_before_the_result_is_skipped() {
        let stdout = "loading weights...\nwarming up\n{\"stage\":\"No_DR\",\"probability\":\"0.98\"}\n\n";
        assert!(matches!(PredictorOutput::parse(stdout), Ok(PredictorOutput::Success(_))));
    }

    #[test]
    fn rejects_non_json() {
        assert!(PredictorOutput::parse("Traceback (most recent call last):").is_err());
        assert!(PredictorOutput::parse("").is_err());
    }
}
