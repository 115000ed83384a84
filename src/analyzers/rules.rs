use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use crate::types::{HotspotType, Language};

/// Identifier reported by the status endpoint for this rule table.
pub const CATALOG_VERSION: &str = "static-pattern-analyzer-v1";

/// Language whose rules apply when a scan names an unknown language.
pub const BASELINE_LANGUAGE: Language = Language::JavaScript;

// ─── Declarative table ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum PatternSpec {
    /// Plain regular expression.
    Regex(&'static str),
    /// Header regex whose first group captures a function name; matches
    /// through the nearest later call `name(`, or failing that the nearest
    /// call of the longest prefix of the name that is called at all.
    SelfCall(&'static str),
}

struct RuleSpec {
    id: &'static str,
    kind: HotspotType,
    pattern: PatternSpec,
    base_score: f64,
    energy_multiplier: f64,
    suggestion: &'static str,
}

const COMMON_RULES: &[RuleSpec] = &[
    RuleSpec {
        id: "nested-for-loops",
        kind: HotspotType::Loop,
        pattern: PatternSpec::Regex(r"for\s*\([^)]*\)\s*\{[\s\S]*?for\s*\([^)]*\)"),
        base_score: 0.85,
        energy_multiplier: 1.5,
        suggestion: "Nested loops detected. Consider using hash maps or sorting to reduce O(n²) complexity.",
    },
    RuleSpec {
        id: "nested-while-loops",
        kind: HotspotType::Loop,
        pattern: PatternSpec::Regex(r"while\s*\([^)]*\)\s*\{[\s\S]*?while\s*\([^)]*\)"),
        base_score: 0.8,
        energy_multiplier: 1.4,
        suggestion: "Nested while loops can be inefficient. Consider restructuring the algorithm.",
    },
    RuleSpec {
        id: "recursive-function",
        kind: HotspotType::Recursion,
        pattern: PatternSpec::SelfCall(r"function\s+(\w+)[^{]*\{"),
        base_score: 0.7,
        energy_multiplier: 1.3,
        suggestion: "Recursive function detected. Consider memoization or iterative approach.",
    },
];

const JAVASCRIPT_RULES: &[RuleSpec] = &[
    RuleSpec {
        id: "nested-foreach",
        kind: HotspotType::Loop,
        pattern: PatternSpec::Regex(r"\.forEach\s*\([^)]*\)\s*[\s\S]*?\.forEach"),
        base_score: 0.75,
        energy_multiplier: 1.3,
        suggestion: "Nested forEach detected. Use reduce or a single loop with object lookup.",
    },
    RuleSpec {
        id: "filter-then-map",
        kind: HotspotType::Algorithm,
        pattern: PatternSpec::Regex(r"\.filter\([^)]*\)\.map\([^)]*\)"),
        base_score: 0.5,
        energy_multiplier: 0.8,
        suggestion: "Chained filter/map iterates twice. Consider using reduce for single pass.",
    },
    RuleSpec {
        id: "json-deep-clone",
        kind: HotspotType::Memory,
        pattern: PatternSpec::Regex(r"JSON\.parse\(JSON\.stringify"),
        base_score: 0.6,
        energy_multiplier: 1.1,
        suggestion: "Deep clone via JSON is expensive. Use structuredClone() or spread operator.",
    },
    RuleSpec {
        id: "await-in-loop",
        kind: HotspotType::Io,
        pattern: PatternSpec::Regex(r"await\s+[\s\S]*?for\s*\("),
        base_score: 0.65,
        energy_multiplier: 1.2,
        suggestion: "Await inside loop causes sequential execution. Use Promise.all() for parallelization.",
    },
];

const PYTHON_RULES: &[RuleSpec] = &[
    RuleSpec {
        id: "nested-range-loops",
        kind: HotspotType::Loop,
        pattern: PatternSpec::Regex(r"for\s+\w+\s+in\s+range[\s\S]*?for\s+\w+\s+in\s+range"),
        base_score: 0.85,
        energy_multiplier: 1.5,
        suggestion: "Nested range loops detected. Consider using numpy vectorization or list comprehension.",
    },
    RuleSpec {
        id: "concat-in-loop",
        kind: HotspotType::Algorithm,
        pattern: PatternSpec::Regex(r"\+\s*=\s*.*\s+for\s+"),
        base_score: 0.55,
        energy_multiplier: 0.9,
        suggestion: "String concatenation in loop. Use ''.join() or list append for better performance.",
    },
    RuleSpec {
        id: "nested-list-calls",
        kind: HotspotType::Memory,
        pattern: PatternSpec::Regex(r"list\([\s\S]*?list\("),
        base_score: 0.5,
        energy_multiplier: 0.8,
        suggestion: "Nested list() calls create intermediate objects. Consider generator expressions.",
    },
];

const CPP_RULES: &[RuleSpec] = &[
    RuleSpec {
        id: "manual-new-delete",
        kind: HotspotType::Memory,
        pattern: PatternSpec::Regex(r"new\s+\w+[\s\S]*?delete"),
        base_score: 0.6,
        energy_multiplier: 1.1,
        suggestion: "Manual memory management detected. Consider using smart pointers (unique_ptr, shared_ptr).",
    },
    RuleSpec {
        id: "repeated-push-back",
        kind: HotspotType::Algorithm,
        pattern: PatternSpec::Regex(r"\.push_back\([^)]*\)[\s\S]*?\.push_back"),
        base_score: 0.5,
        energy_multiplier: 0.9,
        suggestion: "Multiple push_back calls. Consider reserve() to preallocate vector capacity.",
    },
    RuleSpec {
        id: "repeated-cout",
        kind: HotspotType::Io,
        pattern: PatternSpec::Regex(r"cout\s*<<[\s\S]*?cout\s*<<"),
        base_score: 0.4,
        energy_multiplier: 0.7,
        suggestion: "Multiple cout calls. Consider buffering output or using single stream.",
    },
];

fn language_specs(language: Language) -> &'static [RuleSpec] {
    match language {
        Language::JavaScript => JAVASCRIPT_RULES,
        Language::Python     => PYTHON_RULES,
        Language::Cpp        => CPP_RULES,
    }
}

// ─── Compiled rules ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum Matcher {
    Regex(Regex),
    SelfCall(Regex),
}

impl Matcher {
    /// Finds the leftmost match starting at or after byte offset `start`,
    /// returning its `(start, end)` byte span.
    pub fn find_at(&self, text: &str, start: usize) -> Option<(usize, usize)> {
        match self {
            Matcher::Regex(re) => re.find_at(text, start).map(|m| (m.start(), m.end())),
            Matcher::SelfCall(header) => find_self_call(header, text, start),
        }
    }
}

fn find_self_call(header: &Regex, text: &str, start: usize) -> Option<(usize, usize)> {
    let mut pos = start;
    while pos <= text.len() {
        let caps = header.captures_at(text, pos)?;
        let head = caps.get(0)?;
        let name = caps.get(1)?.as_str();
        if let Some(end) = nearest_call(text, head.end(), name) {
            return Some((head.start(), end));
        }
        // no call for this header; try the next header after its start
        pos = text[head.start()..]
            .chars()
            .next()
            .map_or(text.len() + 1, |c| head.start() + c.len_utf8());
    }
    None
}

/// End of the first `prefix(` call after `from`, trying the whole `name`
/// first and then each shorter prefix down to a single character.
fn nearest_call(text: &str, from: usize, name: &str) -> Option<usize> {
    let mut ends: Vec<usize> = name.char_indices().skip(1).map(|(i, _)| i).collect();
    ends.push(name.len());
    ends.iter().rev().find_map(|&len| {
        let call = Regex::new(&format!(r"{}\s*\(", regex::escape(&name[..len]))).ok()?;
        call.find_at(text, from).map(|m| m.end())
    })
}

/// One detection rule: what to look for and what a match costs.
#[derive(Debug, Clone)]
pub struct Rule {
    pub id: String,
    pub kind: HotspotType,
    pub matcher: Matcher,
    pub base_score: f64,
    pub energy_multiplier: f64,
    pub suggestion: String,
}

impl Rule {
    /// Builds a plain-regex rule.
    pub fn new(
        id: &str,
        kind: HotspotType,
        pattern: &str,
        base_score: f64,
        energy_multiplier: f64,
        suggestion: &str,
    ) -> Result<Rule, regex::Error> {
        Ok(Rule {
            id: id.to_string(),
            kind,
            matcher: Matcher::Regex(Regex::new(pattern)?),
            base_score,
            energy_multiplier,
            suggestion: suggestion.to_string(),
        })
    }

    fn compile(spec: &RuleSpec) -> Rule {
        let matcher = match spec.pattern {
            PatternSpec::Regex(p) => Matcher::Regex(Regex::new(p).expect("built-in rule regex")),
            PatternSpec::SelfCall(p) => {
                Matcher::SelfCall(Regex::new(p).expect("built-in self-call regex"))
            }
        };
        Rule {
            id: spec.id.to_string(),
            kind: spec.kind,
            matcher,
            base_score: spec.base_score,
            energy_multiplier: spec.energy_multiplier,
            suggestion: spec.suggestion.to_string(),
        }
    }
}

/// Common rules plus one rule set per supported language.
pub struct RuleCatalog {
    common: Vec<Rule>,
    by_language: HashMap<Language, Vec<Rule>>,
}

impl RuleCatalog {
    fn builtin() -> RuleCatalog {
        RuleCatalog {
            common: COMMON_RULES.iter().map(Rule::compile).collect(),
            by_language: Language::ALL
                .iter()
                .map(|&lang| (lang, language_specs(lang).iter().map(Rule::compile).collect()))
                .collect(),
        }
    }

    /// Active rule set for `language`: common rules first, then the
    /// language's own. Unknown names get the baseline language's rules.
    pub fn rules_for(&self, language: &str) -> impl Iterator<Item = &Rule> + '_ {
        let lang = language.parse::<Language>().unwrap_or(BASELINE_LANGUAGE);
        self.common
            .iter()
            .chain(self.by_language.get(&lang).into_iter().flatten())
    }

    pub fn common(&self) -> &[Rule] {
        &self.common
    }

    pub fn language_rules(&self, language: Language) -> &[Rule] {
        self.by_language.get(&language).map(|v| v.as_slice()).unwrap_or(&[])
    }
}

pub static CATALOG: Lazy<RuleCatalog> = Lazy::new(RuleCatalog::builtin);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_language_has_rules() {
        for lang in Language::ALL {
            assert!(
                !CATALOG.language_rules(lang).is_empty(),
                "{lang} should have its own rule set"
            );
        }
        assert_eq!(CATALOG.common().len(), 3, "Common set should hold the three shared rules");
    }

    #[test]
    fn test_rule_constants_in_range() {
        let all = CATALOG
            .common()
            .iter()
            .chain(Language::ALL.iter().flat_map(|&l| CATALOG.language_rules(l)));
        for rule in all {
            assert!(
                (0.0..=1.0).contains(&rule.base_score),
                "{}: base_score {} out of [0,1]", rule.id, rule.base_score
            );
            assert!(rule.energy_multiplier > 0.0, "{}: multiplier must be positive", rule.id);
            assert!(!rule.suggestion.is_empty(), "{}: suggestion must not be empty", rule.id);
        }
    }

    #[test]
    fn test_unknown_language_uses_baseline_rules() {
        let unknown: Vec<&str> = CATALOG.rules_for("cobol").map(|r| r.id.as_str()).collect();
        let baseline: Vec<&str> = CATALOG.rules_for("javascript").map(|r| r.id.as_str()).collect();
        assert_eq!(unknown, baseline, "Unknown language should fall back to javascript rules");
    }

    #[test]
    fn test_common_rules_come_first() {
        let ids: Vec<&str> = CATALOG.rules_for("python").map(|r| r.id.as_str()).collect();
        assert_eq!(&ids[..3], &["nested-for-loops", "nested-while-loops", "recursive-function"]);
        assert!(ids.contains(&"nested-range-loops"));
        assert!(!ids.contains(&"json-deep-clone"), "javascript rules must not leak into python");
    }

    #[test]
    fn test_self_call_matches_through_recursive_call() {
        let rule = CATALOG.common().iter().find(|r| r.id == "recursive-function").unwrap();
        let src = "function fib(n) {\n  if (n < 2) return n;\n  return fib(n - 1) + fib(n - 2);\n}";
        let (start, end) = rule.matcher.find_at(src, 0).expect("recursion should be detected");
        assert_eq!(start, 0);
        assert!(src[start..end].ends_with("fib("), "Match should stop at the first self-call");
    }

    #[test]
    fn test_self_call_ignores_non_recursive_function() {
        let rule = CATALOG.common().iter().find(|r| r.id == "recursive-function").unwrap();
        let src = "function add(a, b) {\n  return a + b;\n}\nconsole.log(sum(1, 2));";
        assert!(rule.matcher.find_at(src, 0).is_none(), "No self-call means no match");
    }

    #[test]
    fn test_self_call_falls_back_to_name_prefix() {
        let rule = CATALOG.common().iter().find(|r| r.id == "recursive-function").unwrap();
        let src = "function fetchData(url) {\n  if (url) {\n    return 1;\n  }\n}";
        let (start, end) = rule.matcher.find_at(src, 0).expect("prefix `f` is called by `if (`");
        assert_eq!(&src[start..end], "function fetchData(url) {\n  if (");
    }

    #[test]
    fn test_self_call_prefers_longest_called_prefix() {
        let rule = CATALOG.common().iter().find(|r| r.id == "recursive-function").unwrap();
        let src = "function printAll(xs) {\n  for (const x of xs) print(x);\n}";
        let (_, end) = rule.matcher.find_at(src, 0).expect("prefix `print` is called");
        assert!(src[..end].ends_with("print("), "`print(` beats the earlier `f` in `for (`");
    }

    #[test]
    fn test_self_call_skips_to_later_recursive_function() {
        let rule = CATALOG.common().iter().find(|r| r.id == "recursive-function").unwrap();
        let src = "function a() { return 1; }\nfunction walk(n) { return walk(n - 1); }";
        let (start, _) = rule.matcher.find_at(src, 0).expect("second function recurses");
        assert_eq!(&src[start..start + 13], "function walk");
    }
}
