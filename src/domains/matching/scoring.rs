//! Weighted compatibility scorer.
//!
//! Pure functions: identical inputs always produce the identical score. The
//! only time input is the current calendar year, passed in by the caller so
//! age derivation stays deterministic within a request.

use crate::domains::matching::models::ProfileRecord;
use serde::Serialize;
use std::collections::HashSet;

pub const WEIGHT_AGE: f64 = 0.25;
pub const WEIGHT_LOCATION: f64 = 0.20;
pub const WEIGHT_RELIGION: f64 = 0.20;
pub const WEIGHT_EDUCATION: f64 = 0.15;
pub const WEIGHT_INTERESTS: f64 = 0.10;
pub const WEIGHT_LIFESTYLE: f64 = 0.10;

/// Additive preference-match bonus is capped here before the final clamp.
pub const MAX_PREFERENCE_BONUS: f64 = 25.0;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ScoreBreakdown {
    pub age: f64,
    pub location: f64,
    pub religion: f64,
    pub education: f64,
    pub interests: f64,
    pub lifestyle: f64,
    pub preference_bonus: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CompatibilityScore {
    pub total: f64,
    pub breakdown: ScoreBreakdown,
}

/// Score `candidate` against `requester` on a 0-100 scale.
pub fn compatibility_score(
    requester: &ProfileRecord,
    candidate: &ProfileRecord,
    current_year: i32,
) -> CompatibilityScore {
    let age = age_score(requester.dob_year, candidate.dob_year);
    let location = location_score(requester, candidate);
    let religion = religion_score(&requester.religion, &candidate.religion);
    let education = education_score(&requester.education_level, &candidate.education_level);
    let interests = interests_score(requester, candidate);
    let lifestyle = lifestyle_score(requester, candidate);
    let preference_bonus = preference_bonus(requester, candidate, current_year);

    let weighted = age * WEIGHT_AGE
        + location * WEIGHT_LOCATION
        + religion * WEIGHT_RELIGION
        + education * WEIGHT_EDUCATION
        + interests * WEIGHT_INTERESTS
        + lifestyle * WEIGHT_LIFESTYLE;

    CompatibilityScore {
        total: (weighted + preference_bonus).clamp(0.0, 100.0),
        breakdown: ScoreBreakdown {
            age,
            location,
            religion,
            education,
            interests,
            lifestyle,
            preference_bonus,
        },
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

// ======================================================================
// AGE
// ======================================================================

/// Both birth years are required; the gap between them decides the band.
fn age_score(a_year: Option<i32>, b_year: Option<i32>) -> f64 {
    let (Some(a), Some(b)) = (a_year, b_year) else {
        return 0.0;
    };
    let diff = (a - b).abs();
    match diff {
        0..=3 => 100.0,
        4..=7 => 80.0,
        8..=12 => 60.0,
        d => (60.0 - f64::from(d - 12) * 5.0).max(20.0),
    }
}

// ======================================================================
// LOCATION
// ======================================================================

fn same_place(a: &Option<String>, b: &Option<String>) -> bool {
    match (non_empty(a), non_empty(b)) {
        (Some(x), Some(y)) => x.eq_ignore_ascii_case(y),
        _ => false,
    }
}

fn location_score(a: &ProfileRecord, b: &ProfileRecord) -> f64 {
    if same_place(&a.city, &b.city) {
        100.0
    } else if same_place(&a.state, &b.state) {
        80.0
    } else if same_place(&a.country, &b.country) {
        60.0
    } else {
        20.0
    }
}

// ======================================================================
// RELIGION
// ======================================================================

/// Missing data is neutral. Denominations under Islam (Sunni/Shia/Sufi/...)
/// score as the same family.
fn religion_score(a: &Option<String>, b: &Option<String>) -> f64 {
    let (Some(ra), Some(rb)) = (non_empty(a), non_empty(b)) else {
        return 50.0;
    };
    if ra.eq_ignore_ascii_case(rb) {
        return 100.0;
    }
    let la = ra.to_lowercase();
    let lb = rb.to_lowercase();
    if la.contains("islam") && lb.contains("islam") {
        return 85.0;
    }
    20.0
}

// ======================================================================
// EDUCATION
// ======================================================================

fn education_level_ordinal(raw: &str) -> Option<i32> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "high school" | "high_school" | "secondary" => Some(1),
        "diploma" | "certificate" => Some(2),
        "associate" | "associate degree" => Some(3),
        "bachelors" | "bachelor" | "bachelor's" | "bachelors degree" | "bachelor's degree" => {
            Some(4)
        }
        "masters" | "master" | "master's" | "masters degree" | "master's degree" => Some(5),
        "professional" | "professional degree" => Some(6),
        "doctorate" | "phd" | "doctoral" => Some(7),
        _ => None,
    }
}

fn education_score(a: &Option<String>, b: &Option<String>) -> f64 {
    let (Some(ea), Some(eb)) = (non_empty(a), non_empty(b)) else {
        return 50.0;
    };
    let (Some(la), Some(lb)) = (education_level_ordinal(ea), education_level_ordinal(eb)) else {
        return 50.0;
    };
    match (la - lb).abs() {
        0 => 100.0,
        1 => 85.0,
        2 => 70.0,
        3 => 55.0,
        _ => 40.0,
    }
}

// ======================================================================
// INTERESTS
// ======================================================================

/// Exact match 100%, containment 80%, otherwise word-overlap ratio.
fn text_similarity(a: &str, b: &str) -> f64 {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    if a == b {
        return 100.0;
    }
    if a.contains(&b) || b.contains(&a) {
        return 80.0;
    }
    let words_a: HashSet<&str> = a.split_whitespace().collect();
    let words_b: HashSet<&str> = b.split_whitespace().collect();
    if words_a.is_empty() || words_b.is_empty() {
        return 0.0;
    }
    let intersection = words_a.intersection(&words_b).count() as f64;
    let union = words_a.union(&words_b).count() as f64;
    intersection / union * 100.0
}

/// Average similarity across the interest fields both sides filled in,
/// then mapped into bands. No overlap in data at all is neutral.
fn interests_score(a: &ProfileRecord, b: &ProfileRecord) -> f64 {
    let pairs = [
        (&a.interests_entertainment, &b.interests_entertainment),
        (&a.interests_food, &b.interests_food),
        (&a.interests_music, &b.interests_music),
        (&a.interests_sports, &b.interests_sports),
    ];

    let mut similarities = Vec::new();
    for (x, y) in pairs {
        if let (Some(x), Some(y)) = (non_empty(x), non_empty(y)) {
            similarities.push(text_similarity(x, y));
        }
    }

    if similarities.is_empty() {
        return 50.0;
    }
    let avg = similarities.iter().sum::<f64>() / similarities.len() as f64;

    if avg >= 70.0 {
        100.0
    } else if avg >= 50.0 {
        85.0
    } else if avg >= 30.0 {
        70.0
    } else if avg >= 15.0 {
        55.0
    } else {
        40.0
    }
}

// ======================================================================
// LIFESTYLE
// ======================================================================

// Rows/columns follow the ordinal order of each habit; exact match on the
// diagonal, opposite extremes in the corners.
const SMOKING_MATRIX: [[f64; 3]; 3] = [
    [100.0, 70.0, 30.0],
    [70.0, 100.0, 70.0],
    [30.0, 70.0, 100.0],
];
const DRINKING_MATRIX: [[f64; 3]; 3] = [
    [100.0, 80.0, 40.0],
    [80.0, 100.0, 80.0],
    [40.0, 80.0, 100.0],
];
const CHILDREN_MATRIX: [[f64; 3]; 3] = [
    [100.0, 75.0, 35.0],
    [75.0, 100.0, 75.0],
    [35.0, 75.0, 100.0],
];

fn smoking_ordinal(raw: &str) -> Option<usize> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "no" | "never" => Some(0),
        "occasionally" | "socially" | "sometimes" => Some(1),
        "yes" | "regularly" | "daily" => Some(2),
        _ => None,
    }
}

fn drinking_ordinal(raw: &str) -> Option<usize> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "no" | "never" => Some(0),
        "socially" | "occasionally" | "sometimes" => Some(1),
        "yes" | "regularly" | "daily" => Some(2),
        _ => None,
    }
}

fn children_ordinal(raw: &str) -> Option<usize> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "want" | "wants" | "yes" => Some(0),
        "maybe" | "open" | "undecided" => Some(1),
        "no" | "none" => Some(2),
        _ => None,
    }
}

fn matrix_score(
    a: &Option<String>,
    b: &Option<String>,
    ordinal: fn(&str) -> Option<usize>,
    matrix: &[[f64; 3]; 3],
) -> Option<f64> {
    let (x, y) = (non_empty(a)?, non_empty(b)?);
    let (ia, ib) = (ordinal(x)?, ordinal(y)?);
    Some(matrix[ia][ib])
}

/// Average of the habit matrices over the fields present on both sides;
/// nothing comparable is neutral.
fn lifestyle_score(a: &ProfileRecord, b: &ProfileRecord) -> f64 {
    let mut scores = Vec::new();
    if let Some(s) = matrix_score(&a.smoking, &b.smoking, smoking_ordinal, &SMOKING_MATRIX) {
        scores.push(s);
    }
    if let Some(s) = matrix_score(&a.drinking, &b.drinking, drinking_ordinal, &DRINKING_MATRIX) {
        scores.push(s);
    }
    if let Some(s) = matrix_score(
        &a.children_preference,
        &b.children_preference,
        children_ordinal,
        &CHILDREN_MATRIX,
    ) {
        scores.push(s);
    }

    if scores.is_empty() {
        50.0
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    }
}

// ======================================================================
// PREFERENCE BONUS
// ======================================================================

fn preference_bonus(requester: &ProfileRecord, candidate: &ProfileRecord, current_year: i32) -> f64 {
    let mut bonus: f64 = 0.0;

    if requester.pref_age_min.is_some() || requester.pref_age_max.is_some() {
        if let Some(age) = candidate.dob_year.map(|y| current_year - y) {
            let lo = requester.pref_age_min.unwrap_or(i32::MIN);
            let hi = requester.pref_age_max.unwrap_or(i32::MAX);
            if age >= lo && age <= hi {
                bonus += 10.0;
            }
        }
    }

    if let (Some(wanted), Some(actual)) = (
        non_empty(&requester.pref_education),
        non_empty(&candidate.education_level),
    ) {
        let matches = match (
            education_level_ordinal(wanted),
            education_level_ordinal(actual),
        ) {
            (Some(a), Some(b)) => a == b,
            _ => wanted.eq_ignore_ascii_case(actual),
        };
        if matches {
            bonus += 8.0;
        }
    }

    // Flat credit for stating a practice preference at all; profile data is
    // too sparse to match against.
    if non_empty(&requester.pref_religious_practice).is_some() {
        bonus += 5.0;
    }

    if let (Some(wanted), Some(actual)) = (
        non_empty(&requester.pref_marital_status),
        non_empty(&candidate.marital_status),
    ) {
        if wanted.eq_ignore_ascii_case(actual) {
            bonus += 7.0;
        }
    }

    bonus.min(MAX_PREFERENCE_BONUS)
}
