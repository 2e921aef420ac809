//! Hype meter: a deterministic 1-5 estimate of how inflated an article's
//! claims are relative to the evidence it offers.
//!
//! Pure lexical scoring over the title and the serialized summary. Two
//! weighted dictionaries pull in opposite directions, with adjustments for
//! "not specified" placeholders, source credibility, speculative time
//! horizons and category. The function is total: any input maps to 1..=5.

use crate::models::Category;
use once_cell::sync::Lazy;
use regex::Regex;

/// Upper bound on how often one pattern can count.
const PER_PATTERN_CAP: usize = 3;

/// Evidence is discounted before comparing against hype.
const EVIDENCE_WEIGHT: f64 = 0.8;

/// `delta` above each threshold adds one point to the base score of 1.
const THRESHOLDS: [f64; 4] = [-3.0, -1.0, 1.0, 3.0];

const HYPE_PATTERNS: &[(&str, f64)] = &[
    // superlatives
    (r"\brevolutionar(y|ize|izes)\b", 3.0),
    (r"\bgame[- ]chang(er|ing)\b", 3.0),
    (r"\bmind[- ]blowing\b", 3.0),
    (r"\bchanges everything\b", 3.0),
    (r"\bunprecedented\b", 2.5),
    (r"\bgroundbreaking\b", 2.5),
    (r"\bworld'?s first\b", 2.5),
    (r"\bbest ever\b", 2.5),
    (r"\bsuperhuman\b", 2.5),
    // strong claims
    (r"\bbreakthrough", 2.0),
    (r"\bagi\b", 2.0),
    (r"\bwill replace\b", 2.0),
    (r"\binsane(ly)?\b", 2.0),
    (r"\btransform(s|ative|ing)?\b", 1.5),
    (r"\bdisrupt", 1.5),
    (r"\bmassive(ly)?\b", 1.0),
    (r"\bdramatic(ally)?\b", 1.0),
    (r"\bhuge\b", 1.0),
    (r"\bnext[- ]generation\b", 1.0),
    (r"\bcutting[- ]edge\b", 1.0),
    (r"\bstate[- ]of[- ]the[- ]art\b", 1.0),
    // mild novelty
    (r"\bunveil(s|ed)?\b", 0.75),
    (r"\bintroduc(es|ing)\b", 0.5),
    (r"\bannounc(es|ed)\b", 0.5),
    (r"\bfirst\b", 0.5),
    (r"\bnew\b", 0.25),
];

const EVIDENCE_PATTERNS: &[(&str, f64)] = &[
    // methodology
    (r"\bpeer[- ]review", 2.0),
    (r"\bablation", 2.0),
    (r"\bbenchmark", 1.5),
    (r"\barxiv\b", 1.5),
    (r"\bmethodolog", 1.5),
    (r"\bsample size\b", 1.5),
    (r"\bevaluat", 1.0),
    (r"\bstud(y|ies)\b", 1.0),
    (r"\bpaper\b", 1.0),
    (r"\bdataset", 1.0),
    (r"\bcontrolled\b", 1.0),
    (r"\bcompared (with|to)\b", 1.0),
    (r"\baccording to\b", 0.75),
    (r"\breported\b", 0.5),
    // hedging
    (r"\blimitation", 1.5),
    (r"\bpreliminary\b", 1.0),
    (r"\bearly results\b", 1.0),
    (r"\bcaveat", 1.0),
    (r"\bnot yet\b", 0.75),
    (r"\bmay\b", 0.5),
    (r"\bmight\b", 0.5),
    (r"\bcould\b", 0.25),
];

/// Quantified claims: percentages, multipliers, sizes, money.
const QUANTIFIED_PATTERNS: &[(&str, f64)] = &[
    (r"\d+(\.\d+)?\s?(%|percent\b)", 1.0),
    (r"\b\d+(\.\d+)?\s?(x|×)(\s|$|\b)", 1.0),
    (r"\b\d+(\.\d+)?\s?(billion|million|thousand)\b", 0.75),
    (r"\b\d+(\.\d+)?\s?[bm]? ?(parameters|tokens)\b", 1.0),
    (r"\$\s?\d", 0.75),
];

const LONG_HORIZON_PATTERNS: &[(&str, f64)] = &[
    (r"\bby 20[3-9]\d\b", 1.0),
    (r"\bin the (next|coming) (decade|few years|years)\b", 1.0),
    (r"\bsomeday\b", 1.0),
    (r"\bone day\b", 1.0),
    (r"\beventually\b", 0.75),
    (r"\bin the future\b", 0.75),
];

const IMMEDIACY_PATTERNS: &[(&str, f64)] = &[
    (r"\bavailable (now|today)\b", 0.5),
    (r"\bnow available\b", 0.5),
    (r"\bstarting (today|now)\b", 0.5),
    (r"\btoday\b", 0.5),
    (r"\bthis week\b", 0.5),
    (r"\bshipping\b", 0.5),
];

/// Research publishers: their claims usually come with methodology.
const CREDIBLE_SOURCES: &[&str] = &["deepmind", "openai", "hugging face", "arxiv", "towards data science"];

/// Community and aggregator sources: claims travel without evidence.
const LOW_CREDIBILITY_SOURCES: &[&str] = &["reddit", "twitter", "x.com", "hacker news", "medium"];

const NOT_SPECIFIED_PENALTY: f64 = 0.75;
const CREDIBLE_BONUS: f64 = 1.0;
const LOW_CREDIBILITY_HYPE: f64 = 1.5;

struct Weighted {
    re: Regex,
    weight: f64,
}

fn compile(patterns: &[(&str, f64)]) -> Vec<Weighted> {
    patterns
        .iter()
        .map(|(p, w)| Weighted {
            re: Regex::new(p).unwrap(),
            weight: *w,
        })
        .collect()
}

static HYPE: Lazy<Vec<Weighted>> = Lazy::new(|| compile(HYPE_PATTERNS));
static EVIDENCE: Lazy<Vec<Weighted>> = Lazy::new(|| compile(EVIDENCE_PATTERNS));
static QUANTIFIED: Lazy<Vec<Weighted>> = Lazy::new(|| compile(QUANTIFIED_PATTERNS));
static LONG_HORIZON: Lazy<Vec<Weighted>> = Lazy::new(|| compile(LONG_HORIZON_PATTERNS));
static IMMEDIACY: Lazy<Vec<Weighted>> = Lazy::new(|| compile(IMMEDIACY_PATTERNS));
static NOT_SPECIFIED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bnot specified\b").unwrap());

fn weigh(text: &str, table: &[Weighted]) -> f64 {
    table
        .iter()
        .map(|w| w.re.find_iter(text).count().min(PER_PATTERN_CAP) as f64 * w.weight)
        .sum()
}

fn category_bias(category: Category) -> f64 {
    match category {
        Category::CapabilitiesAndHow => 0.0,
        Category::InActionRealWorld => -0.5,
        Category::TrendsRisksOutlook => 0.5,
    }
}

/// Breakdown of one scoring run, exposed for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HypeBreakdown {
    pub hype: f64,
    pub evidence: f64,
    pub delta: f64,
    pub score: u8,
}

/// Score an article, returning the full breakdown.
pub fn score_breakdown(title: &str, source: &str, category: Category, summary_text: &str) -> HypeBreakdown {
    let text = format!("{title}\n{summary_text}").to_lowercase();
    let source = source.to_lowercase();

    let mut hype = weigh(&text, &HYPE) + weigh(&text, &LONG_HORIZON).min(2.0);
    let mut evidence = weigh(&text, &EVIDENCE) + weigh(&text, &QUANTIFIED).min(5.0) + weigh(&text, &IMMEDIACY);

    evidence -= NOT_SPECIFIED.find_iter(&text).count() as f64 * NOT_SPECIFIED_PENALTY;

    if CREDIBLE_SOURCES.iter().any(|s| source.contains(s)) {
        evidence += CREDIBLE_BONUS;
    }
    if LOW_CREDIBILITY_SOURCES.iter().any(|s| source.contains(s)) {
        hype += LOW_CREDIBILITY_HYPE;
    }
    hype += category_bias(category);

    let delta = hype - EVIDENCE_WEIGHT * evidence;
    let above = THRESHOLDS.iter().filter(|t| delta > **t).count();
    let score = 1 + above as u8;

    HypeBreakdown {
        hype,
        evidence,
        delta,
        score,
    }
}

/// Hype meter value in `1..=5`.
pub fn score(title: &str, source: &str, category: Category, summary_text: &str) -> u8 {
    score_breakdown(title, source, category, summary_text).score
}
