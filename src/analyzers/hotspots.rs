use rand::Rng;
use tracing::debug;

use super::rules::{Rule, CATALOG};
use crate::scoring::round2;
use crate::types::Hotspot;

/// Upper bound (exclusive) of the random variance added to each score.
pub const SCORE_JITTER: f64 = 0.1;

const MILLIJOULES_PER_LINE: f64 = 0.01;

/// Scans `source` with the common rules plus the rules for `language`.
/// Unknown languages fall back to the baseline rule set.
pub fn scan(language: &str, source: &str) -> Vec<Hotspot> {
    scan_with_rng(language, source, &mut rand::thread_rng())
}

/// Like [`scan`], drawing score jitter from `rng`.
pub fn scan_with_rng<R: Rng + ?Sized>(language: &str, source: &str, rng: &mut R) -> Vec<Hotspot> {
    let rules = CATALOG.rules_for(language).count();
    let hotspots = scan_rules(CATALOG.rules_for(language), source, rng);
    debug!(language, rules, hotspots = hotspots.len(), "static scan finished");
    hotspots
}

/// Applies each rule in order, emitting one hotspot per non-overlapping match.
///
/// After a match the search resumes at the match end; after a zero-length
/// match it resumes one character later.
pub fn scan_rules<'a, R, I>(rules: I, source: &str, rng: &mut R) -> Vec<Hotspot>
where
    R: Rng + ?Sized,
    I: IntoIterator<Item = &'a Rule>,
{
    let lines = LineIndex::new(source);
    let mut hotspots = Vec::new();

    for rule in rules {
        let mut cursor = 0;
        while cursor <= source.len() {
            let Some((start, end)) = rule.matcher.find_at(source, cursor) else {
                break;
            };

            let start_line = lines.line_of(start);
            let end_line = lines.line_of(end).max(start_line);
            let line_count = (end_line - start_line + 1) as f64;

            hotspots.push(Hotspot {
                start_line,
                end_line,
                score: rule.base_score + rng.gen_range(0.0..SCORE_JITTER),
                estimate_mj: round2(line_count * rule.energy_multiplier * MILLIJOULES_PER_LINE),
                suggestion: rule.suggestion.clone(),
                kind: rule.kind,
            });

            cursor = if end > start { end } else { next_boundary(source, end) };
        }
    }

    hotspots
}

fn next_boundary(text: &str, at: usize) -> usize {
    text[at..]
        .chars()
        .next()
        .map_or(text.len() + 1, |c| at + c.len_utf8())
}

/// Byte offsets of every `\n`, for 1-indexed line lookups.
struct LineIndex {
    newlines: Vec<usize>,
}

impl LineIndex {
    fn new(text: &str) -> Self {
        LineIndex {
            newlines: text.match_indices('\n').map(|(i, _)| i).collect(),
        }
    }

    /// Line number of the character at `offset`: one more than the number
    /// of separators before it.
    fn line_of(&self, offset: usize) -> usize {
        self.newlines.partition_point(|&nl| nl < offset) + 1
    }
}
