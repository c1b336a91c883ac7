use serde::{Deserialize, Serialize};

/// Coarse shape statistics derived from the detected counts. Recomputed
/// per request, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metrics {
    pub dot_count: usize,
    pub path_count: usize,
    pub symmetry_percentage: f64,
    pub repetition_percentage: f64,
    pub pattern_type: String,
}

/// Estimate metrics from the counts alone. This is deliberately a
/// placeholder heuristic, not a geometric symmetry verifier: a dot count
/// that fits a classic 9-dot lattice is reported as highly symmetric,
/// everything else scores on simple clamped inverse-linear curves.
/// Callers must not treat the output as ground truth.
pub fn estimate(dot_count: usize, path_count: usize) -> Metrics {
    if dot_count > 0 && dot_count % 9 == 0 {
        return Metrics {
            dot_count,
            path_count,
            symmetry_percentage: 98.5,
            repetition_percentage: 95.0,
            pattern_type: "Rotational C4/Reflectional".to_string(),
        };
    }

    let symmetry_percentage = (90.0 - dot_count as f64 * 1.5).clamp(40.0, 90.0);
    let repetition_percentage = (85.0 - path_count as f64 * 0.8).clamp(30.0, 85.0);
    Metrics {
        dot_count,
        path_count,
        symmetry_percentage,
        repetition_percentage,
        pattern_type: "Bilateral/Flowing".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nine_dot_lattice_reports_rotational_symmetry() {
        let metrics = estimate(9, 3);
        assert_eq!(metrics.symmetry_percentage, 98.5);
        assert_eq!(metrics.repetition_percentage, 95.0);
        assert_eq!(metrics.pattern_type, "Rotational C4/Reflectional");
    }

    #[test]
    fn test_any_positive_multiple_of_nine_qualifies() {
        for dots in [9usize, 18, 27, 81] {
            let metrics = estimate(dots, 0);
            assert_eq!(metrics.pattern_type, "Rotational C4/Reflectional");
        }
    }

    #[test]
    fn test_zero_dots_is_not_rotational() {
        let metrics = estimate(0, 0);
        assert_eq!(metrics.pattern_type, "Bilateral/Flowing");
        assert_eq!(metrics.symmetry_percentage, 90.0);
    }

    #[test]
    fn test_scores_clamp_to_their_ranges() {
        let crowded = estimate(1000, 1000);
        assert_eq!(crowded.symmetry_percentage, 40.0);
        assert_eq!(crowded.repetition_percentage, 30.0);

        let sparse = estimate(2, 1);
        assert!(sparse.symmetry_percentage <= 90.0);
        assert!(sparse.repetition_percentage <= 85.0);
        assert_eq!(sparse.pattern_type, "Bilateral/Flowing");
    }

    #[test]
    fn test_counts_pass_through() {
        let metrics = estimate(7, 12);
        assert_eq!(metrics.dot_count, 7);
        assert_eq!(metrics.path_count, 12);
    }
}
