use serde::{Deserialize, Serialize};
use std::fmt;

/// Risk zone derived from a crime-count prediction.
///
/// Ordering is by severity: Green < Amber < Red.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    Green,
    Amber,
    Red,
}

impl Zone {
    /// Fixed label order used by the confusion matrix
    pub const ALL: [Zone; 3] = [Zone::Green, Zone::Amber, Zone::Red];

    fn index(self) -> usize {
        match self {
            Zone::Green => 0,
            Zone::Amber => 1,
            Zone::Red => 2,
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Zone::Green => write!(f, "green"),
            Zone::Amber => write!(f, "amber"),
            Zone::Red => write!(f, "red"),
        }
    }
}

/// Fixed crime-count thresholds separating the three zones.
///
/// No learned parameters; classification is a pure function of the count.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ZoneThresholds {
    pub amber: f64,
    pub red: f64,
}

impl Default for ZoneThresholds {
    fn default() -> Self {
        Self {
            amber: 20.0,
            red: 50.0,
        }
    }
}

impl ZoneThresholds {
    /// Classify a crime count: count > red -> Red, count > amber -> Amber,
    /// else Green.
    pub fn classify(&self, crime_count: f64) -> Zone {
        if crime_count > self.red {
            Zone::Red
        } else if crime_count > self.amber {
            Zone::Amber
        } else {
            Zone::Green
        }
    }

    pub fn classify_all(&self, counts: &[f64]) -> Vec<Zone> {
        counts.iter().map(|&c| self.classify(c)).collect()
    }

    /// Evaluate predicted counts against true counts by classifying both
    /// identically and comparing the label sequences.
    ///
    /// Sequences are truncated to equal length before comparison, guarding
    /// against off-by-one row drops upstream.
    pub fn evaluate(&self, y_true: &[f64], y_pred: &[f64]) -> ZoneEvaluation {
        let true_zones = self.classify_all(y_true);
        let pred_zones = self.classify_all(y_pred);

        let len = true_zones.len().min(pred_zones.len());
        let true_zones = &true_zones[..len];
        let pred_zones = &pred_zones[..len];

        let mut confusion_matrix = [[0usize; 3]; 3];
        let mut correct = 0usize;
        for (t, p) in true_zones.iter().zip(pred_zones.iter()) {
            confusion_matrix[t.index()][p.index()] += 1;
            if t == p {
                correct += 1;
            }
        }

        let accuracy = if len == 0 {
            0.0
        } else {
            correct as f64 / len as f64
        };

        ZoneEvaluation {
            accuracy,
            confusion_matrix,
            samples: len,
        }
    }
}

/// Zone classification quality against thresholded ground truth
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneEvaluation {
    /// Fraction of samples whose predicted zone matches the true zone
    pub accuracy: f64,

    /// 3x3 matrix indexed [true][predicted] in [green, amber, red] order
    pub confusion_matrix: [[usize; 3]; 3],

    /// Number of compared samples after truncation
    pub samples: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_thresholds() {
        let thresholds = ZoneThresholds::default();
        assert_eq!(thresholds.classify(15.0), Zone::Green);
        assert_eq!(thresholds.classify(20.0), Zone::Green);
        assert_eq!(thresholds.classify(25.0), Zone::Amber);
        assert_eq!(thresholds.classify(50.0), Zone::Amber);
        assert_eq!(thresholds.classify(55.0), Zone::Red);
    }

    #[test]
    fn test_classification_is_monotonic() {
        let thresholds = ZoneThresholds::default();
        let counts: Vec<f64> = (0..200).map(|i| i as f64 * 0.5).collect();
        for pair in counts.windows(2) {
            assert!(thresholds.classify(pair[0]) <= thresholds.classify(pair[1]));
        }
    }

    #[test]
    fn test_evaluation_perfect_predictions() {
        let thresholds = ZoneThresholds::default();
        let counts = vec![5.0, 30.0, 70.0, 18.0];
        let eval = thresholds.evaluate(&counts, &counts);

        assert_eq!(eval.accuracy, 1.0);
        assert_eq!(eval.samples, 4);
        assert_eq!(eval.confusion_matrix[0][0], 2); // two greens
        assert_eq!(eval.confusion_matrix[1][1], 1);
        assert_eq!(eval.confusion_matrix[2][2], 1);
    }

    #[test]
    fn test_evaluation_counts_misclassifications() {
        let thresholds = ZoneThresholds::default();
        let y_true = vec![5.0, 30.0];
        let y_pred = vec![60.0, 30.0];
        let eval = thresholds.evaluate(&y_true, &y_pred);

        assert_eq!(eval.accuracy, 0.5);
        // true green predicted red
        assert_eq!(eval.confusion_matrix[0][2], 1);
        assert_eq!(eval.confusion_matrix[1][1], 1);
    }

    #[test]
    fn test_evaluation_truncates_to_shorter_sequence() {
        let thresholds = ZoneThresholds::default();
        let y_true = vec![5.0, 30.0, 70.0];
        let y_pred = vec![5.0, 30.0];
        let eval = thresholds.evaluate(&y_true, &y_pred);

        assert_eq!(eval.samples, 2);
        assert_eq!(eval.accuracy, 1.0);
    }

    #[test]
    fn test_evaluation_empty() {
        let thresholds = ZoneThresholds::default();
        let eval = thresholds.evaluate(&[], &[]);
        assert_eq!(eval.accuracy, 0.0);
        assert_eq!(eval.samples, 0);
    }
}
