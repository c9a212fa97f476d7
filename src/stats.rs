use crate::model::{Assessment, Subject};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

pub const MASTERY_THRESHOLD: u8 = 80;
const REPORT_LIST_LIMIT: usize = 5;

/// Half-up rounding, `floor(x + 0.5)`, so -2.5 rounds to -2.
pub fn round_half_up(x: f64) -> i64 {
    (x + 0.5).floor() as i64
}

fn mean(scores: impl Iterator<Item = u8>) -> Option<f64> {
    let mut n = 0usize;
    let mut sum = 0u64;
    for s in scores {
        n += 1;
        sum += s as u64;
    }
    if n == 0 {
        None
    } else {
        Some(sum as f64 / n as f64)
    }
}

fn percentage(part: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    round_half_up(100.0 * part as f64 / total as f64) as u32
}

pub fn average_score(assessments: &[Assessment]) -> u32 {
    mean(assessments.iter().map(Assessment::score))
        .map(|m| round_half_up(m) as u32)
        .unwrap_or(0)
}

/// Recent half minus older half, in the order given.
///
/// With an odd count the middle assessment belongs to the recent half.
pub fn trend(assessments: &[Assessment]) -> i64 {
    let n = assessments.len();
    if n < 2 {
        return 0;
    }
    let (older, recent) = assessments.split_at(n / 2);
    match (
        mean(recent.iter().map(Assessment::score)),
        mean(older.iter().map(Assessment::score)),
    ) {
        (Some(r), Some(o)) => round_half_up(r - o),
        _ => 0,
    }
}

pub fn mastery_rate(assessments: &[Assessment]) -> u32 {
    let mastered = assessments
        .iter()
        .filter(|a| a.score() >= MASTERY_THRESHOLD)
        .count();
    percentage(mastered, assessments.len())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MasteryLevel {
    Advanced,
    Proficient,
    Developing,
    Beginning,
}

pub fn mastery_level(score: u32) -> MasteryLevel {
    match score {
        s if s >= 90 => MasteryLevel::Advanced,
        s if s >= 80 => MasteryLevel::Proficient,
        s if s >= 70 => MasteryLevel::Developing,
        _ => MasteryLevel::Beginning,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Distribution {
    pub advanced: usize,
    pub proficient: usize,
    pub developing: usize,
    pub beginning: usize,
}

pub fn distribution(assessments: &[Assessment]) -> Distribution {
    let mut d = Distribution::default();
    for a in assessments {
        match mastery_level(a.score() as u32) {
            MasteryLevel::Advanced => d.advanced += 1,
            MasteryLevel::Proficient => d.proficient += 1,
            MasteryLevel::Developing => d.developing += 1,
            MasteryLevel::Beginning => d.beginning += 1,
        }
    }
    d
}

pub fn unique_student_count(assessments: &[Assessment]) -> usize {
    assessments
        .iter()
        .map(|a| a.student_name.as_str())
        .collect::<HashSet<_>>()
        .len()
}

/// Most frequent subject. Ties go to the subject seen first.
pub fn top_subject(assessments: &[Assessment]) -> Option<Subject> {
    let mut order: Vec<&Subject> = Vec::new();
    let mut counts: HashMap<&Subject, usize> = HashMap::new();
    for a in assessments {
        let c = counts.entry(&a.subject).or_insert(0);
        if *c == 0 {
            order.push(&a.subject);
        }
        *c += 1;
    }

    let mut best: Option<(&Subject, usize)> = None;
    for s in order {
        let c = counts[s];
        if best.map(|(_, bc)| c > bc).unwrap_or(true) {
            best = Some((s, c));
        }
    }
    best.map(|(s, _)| s.clone())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateRange {
    Week,
    Month,
    Quarter,
}

impl DateRange {
    pub fn days(self) -> i64 {
        match self {
            DateRange::Week => 7,
            DateRange::Month => 30,
            DateRange::Quarter => 90,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProgressFilter {
    pub student_name: Option<String>,
    pub subject: Option<String>,
    pub date_range: Option<DateRange>,
}

fn parse_assessment_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let day = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// Empty filter values mean "no constraint". Order is preserved.
pub fn filter_progress(
    assessments: &[Assessment],
    filter: &ProgressFilter,
    today: NaiveDate,
) -> Vec<Assessment> {
    let student = filter.student_name.as_deref().filter(|s| !s.is_empty());
    let subject = filter.subject.as_deref().filter(|s| !s.is_empty());
    let cutoff = filter
        .date_range
        .map(|r| today - Duration::days(r.days()));

    assessments
        .iter()
        .filter(|a| student.map(|s| a.student_name == s).unwrap_or(true))
        .filter(|a| subject.map(|s| a.subject.as_str() == s).unwrap_or(true))
        .filter(|a| match cutoff {
            Some(c) => parse_assessment_date(&a.date)
                .map(|d| d >= c)
                .unwrap_or(false),
            None => true,
        })
        .cloned()
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSummary {
    pub total_assessments: usize,
    pub average_score: u32,
    pub trend: i64,
    pub mastery_rate: u32,
    pub unique_students: usize,
    pub top_subject: Option<Subject>,
}

pub fn progress_summary(assessments: &[Assessment]) -> ProgressSummary {
    ProgressSummary {
        total_assessments: assessments.len(),
        average_score: average_score(assessments),
        trend: trend(assessments),
        mastery_rate: mastery_rate(assessments),
        unique_students: unique_student_count(assessments),
        top_subject: top_subject(assessments),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectStats {
    pub subject: Subject,
    pub count: usize,
    pub average_score: u32,
    pub student_count: usize,
}

/// Per-subject rows in first-seen subject order.
pub fn subject_breakdown(assessments: &[Assessment]) -> Vec<SubjectStats> {
    let mut rows: Vec<(Subject, usize, u64, HashSet<&str>)> = Vec::new();
    for a in assessments {
        let idx = match rows.iter().position(|(s, ..)| *s == a.subject) {
            Some(i) => i,
            None => {
                rows.push((a.subject.clone(), 0, 0, HashSet::new()));
                rows.len() - 1
            }
        };
        let row = &mut rows[idx];
        row.1 += 1;
        row.2 += a.score() as u64;
        row.3.insert(a.student_name.as_str());
    }

    rows.into_iter()
        .map(|(subject, count, total, students)| SubjectStats {
            subject,
            count,
            average_score: round_half_up(total as f64 / count as f64) as u32,
            student_count: students.len(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassStats {
    pub average_score: u32,
    pub total_assessments: usize,
    pub mastery_rate: u32,
    pub distribution: Distribution,
}

pub fn class_stats(assessments: &[Assessment]) -> ClassStats {
    ClassStats {
        average_score: average_score(assessments),
        total_assessments: assessments.len(),
        mastery_rate: mastery_rate(assessments),
        distribution: distribution(assessments),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompetencyAverage {
    pub name: String,
    /// Mean level on the 1-4 scale, one decimal.
    pub average_level: f64,
    pub samples: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentReport {
    pub student_name: String,
    pub total_assessments: usize,
    pub average_score: u32,
    pub mastery_level: MasteryLevel,
    pub strengths: Vec<String>,
    pub areas_for_growth: Vec<String>,
    pub recommendations: Option<Vec<String>>,
    pub competencies: Vec<CompetencyAverage>,
}

fn first_unique<'a>(items: impl Iterator<Item = &'a String>, limit: usize) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut out = Vec::new();
    for s in items {
        if out.len() == limit {
            break;
        }
        if seen.insert(s.as_str()) {
            out.push(s.clone());
        }
    }
    out
}

pub fn student_report(assessments: &[Assessment], student_name: &str) -> Option<StudentReport> {
    let mine: Vec<Assessment> = assessments
        .iter()
        .filter(|a| a.student_name == student_name)
        .cloned()
        .collect();
    let latest = mine.last()?;

    let mut competencies: Vec<(String, u64, usize)> = Vec::new();
    for c in mine.iter().flat_map(|a| a.results.competency_levels.iter()) {
        match competencies.iter_mut().find(|(name, ..)| *name == c.name) {
            Some(row) => {
                row.1 += c.level as u64;
                row.2 += 1;
            }
            None => competencies.push((c.name.clone(), c.level as u64, 1)),
        }
    }

    let average = average_score(&mine);
    Some(StudentReport {
        student_name: student_name.to_string(),
        total_assessments: mine.len(),
        average_score: average,
        mastery_level: mastery_level(average),
        strengths: first_unique(
            mine.iter().flat_map(|a| a.results.strengths.iter()),
            REPORT_LIST_LIMIT,
        ),
        areas_for_growth: first_unique(
            mine.iter().flat_map(|a| a.results.areas_for_growth.iter()),
            REPORT_LIST_LIMIT,
        ),
        recommendations: latest.results.recommendations.clone(),
        competencies: competencies
            .into_iter()
            .map(|(name, total, samples)| CompetencyAverage {
                name,
                average_level: round_half_up(10.0 * total as f64 / samples as f64) as f64 / 10.0,
                samples,
            })
            .collect(),
    })
}
