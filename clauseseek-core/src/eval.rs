//! Offline answer evaluation.
//!
//! Compares a gold and a prediction JSON Lines file record by record. Each
//! record carries an `answer` object with an optional `verdict` string and an
//! optional `citations` array.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use crate::error::EvalError;

/// Aggregate scores over the first `n` record pairs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvalReport {
    pub n: usize,
    /// Share of pairs whose verdicts match, ignoring case and surrounding
    /// whitespace. Missing verdicts never match.
    pub verdict_accuracy: f64,
    /// Share of predictions with a non-empty citation list.
    pub has_citation: f64,
}

impl std::fmt::Display for EvalReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "N={}  VerdictAccuracy={:.3}  HasCitation={:.3}",
            self.n, self.verdict_accuracy, self.has_citation
        )
    }
}

/// Evaluate `pred_path` against `gold_path`. Records are paired by position.
pub fn evaluate(gold_path: &Path, pred_path: &Path) -> Result<EvalReport, EvalError> {
    let gold = read_records(gold_path)?;
    let pred = read_records(pred_path)?;
    Ok(score(&gold, &pred))
}

/// Score already parsed records.
pub fn score(gold: &[Value], pred: &[Value]) -> EvalReport {
    let n = gold.len().min(pred.len());
    let mut correct = 0usize;
    let mut cited = 0usize;
    for (g, p) in gold.iter().zip(pred.iter()) {
        if let (Some(gv), Some(pv)) = (verdict(g), verdict(p)) {
            if gv.trim().to_lowercase() == pv.trim().to_lowercase() {
                correct += 1;
            }
        }
        let has_citations = p["answer"]["citations"]
            .as_array()
            .is_some_and(|c| !c.is_empty());
        if has_citations {
            cited += 1;
        }
    }
    let ratio = |count: usize| if n == 0 { 0.0 } else { count as f64 / n as f64 };
    EvalReport {
        n,
        verdict_accuracy: ratio(correct),
        has_citation: ratio(cited),
    }
}

fn verdict(record: &Value) -> Option<&str> {
    record["answer"]["verdict"].as_str().filter(|v| !v.is_empty())
}

fn read_records(path: &Path) -> Result<Vec<Value>, EvalError> {
    if !path.exists() {
        return Err(EvalError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path)?;
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|e| EvalError::InvalidLine {
                path: path.to_path_buf(),
                line: i + 1,
                message: e.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_score_counts_verdicts_and_citations() {
        let gold = vec![
            json!({"answer": {"verdict": "Yes"}}),
            json!({"answer": {"verdict": "no"}}),
            json!({"answer": {"verdict": "yes"}}),
        ];
        let pred = vec![
            json!({"answer": {"verdict": " yes ", "citations": [{"owner": "a"}]}}),
            json!({"answer": {"verdict": "yes", "citations": []}}),
            json!({"answer": {}}),
            json!({"answer": {"verdict": "extra"}}),
        ];
        let report = score(&gold, &pred);
        assert_eq!(report.n, 3);
        assert!((report.verdict_accuracy - 1.0 / 3.0).abs() < 1e-9);
        assert!((report.has_citation - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_score_empty() {
        let report = score(&[], &[json!({})]);
        assert_eq!(report.n, 0);
        assert_eq!(report.verdict_accuracy, 0.0);
        assert_eq!(report.has_citation, 0.0);
    }

    #[test]
    fn test_evaluate_files() {
        let dir = TempDir::new().unwrap();
        let gold = dir.path().join("gold.jsonl");
        let pred = dir.path().join("pred.jsonl");
        std::fs::write(&gold, "{\"answer\":{\"verdict\":\"high\"}}\n\n").unwrap();
        std::fs::write(
            &pred,
            "{\"answer\":{\"verdict\":\"HIGH\",\"citations\":[1]}}\n",
        )
        .unwrap();
        let report = evaluate(&gold, &pred).unwrap();
        assert_eq!(report.n, 1);
        assert_eq!(report.verdict_accuracy, 1.0);
        assert_eq!(report.has_citation, 1.0);
        assert_eq!(report.to_string(), "N=1  VerdictAccuracy=1.000  HasCitation=1.000");
    }

    #[test]
    fn test_evaluate_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = evaluate(&dir.path().join("gold.jsonl"), &dir.path().join("pred.jsonl"))
            .unwrap_err();
        assert!(matches!(err, EvalError::FileNotFound { .. }));
    }

    #[test]
    fn test_evaluate_invalid_line() {
        let dir = TempDir::new().unwrap();
        let gold = dir.path().join("gold.jsonl");
        std::fs::write(&gold, "{}\nnot json\n").unwrap();
        let err = evaluate(&gold, &gold).unwrap_err();
        assert!(matches!(err, EvalError::InvalidLine { line: 2, .. }));
    }
}
