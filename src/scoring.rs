use std::cmp::Ordering;
use std::collections::HashSet;

use crate::analyzers::hotspots::scan;
use crate::types::{EnergyAnalysis, Hotspot, Rating};

/// Hotspots kept in an [`EnergyAnalysis`]; the total estimate still covers all.
pub const TOP_HOTSPOTS: usize = 10;

const MIN_FILE_SCORE: f64 = 0.1;
const MAX_FILE_SCORE: f64 = 1.0;
const SEVERITY_WEIGHT: f64 = 0.5;

const RATING_EFFICIENT: f64 = 0.8;
const RATING_MODERATE:  f64 = 0.5;

/// Rounds to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Scans and aggregates in one step.
pub fn analyze(language: &str, source: &str) -> EnergyAnalysis {
    aggregate(scan(language, source))
}

/// Reduces raw scan results to a file score, the top hotspots, the total
/// estimate and the distinct suggestions.
///
/// Suggestions keep the order in which they first appear in `hotspots` as
/// produced by the scanner, before sorting by severity.
pub fn aggregate(mut hotspots: Vec<Hotspot>) -> EnergyAnalysis {
    let mut seen = HashSet::new();
    let suggestions: Vec<String> = hotspots
        .iter()
        .filter(|h| seen.insert(h.suggestion.as_str()))
        .map(|h| h.suggestion.clone())
        .collect();

    // stable: equal scores keep scan order
    hotspots.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

    let avg_score = if hotspots.is_empty() {
        0.0
    } else {
        hotspots.iter().map(|h| h.score).sum::<f64>() / hotspots.len() as f64
    };
    let file_score = (1.0 - avg_score * SEVERITY_WEIGHT).clamp(MIN_FILE_SCORE, MAX_FILE_SCORE);
    let total_estimate_mj = hotspots.iter().map(|h| h.estimate_mj).sum::<f64>();

    hotspots.truncate(TOP_HOTSPOTS);

    EnergyAnalysis {
        file_score: round2(file_score),
        hotspots,
        total_estimate_mj: round2(total_estimate_mj),
        suggestions,
    }
}

pub fn get_rating(file_score: f64) -> Rating {
    if file_score >= RATING_EFFICIENT { Rating::Efficient }
    else if file_score >= RATING_MODERATE { Rating::Moderate }
    else { Rating::Wasteful }
}
