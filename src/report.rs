// src/report.rs
//! Turns a completed analysis into a verdict with a percentage breakdown.
//! Pure data transformation, no I/O.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::errors::{Result, ScanError};
use crate::models::AnalysisReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Verdict {
    Malicious,
    Suspicious,
    Safe,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Malicious => write!(f, "Malicious"),
            Verdict::Suspicious => write!(f, "Suspicious"),
            Verdict::Safe => write!(f, "Safe"),
        }
    }
}

impl Verdict {
    /// Strict priority: any malicious detection wins, then any suspicious one.
    pub fn from_counts(malicious: u64, suspicious: u64) -> Self {
        if malicious > 0 {
            Verdict::Malicious
        } else if suspicious > 0 {
            Verdict::Suspicious
        } else {
            Verdict::Safe
        }
    }

    pub fn class(&self) -> &'static str {
        match self {
            Verdict::Malicious => "malicious",
            Verdict::Suspicious => "suspicious",
            Verdict::Safe => "safe",
        }
    }
}

/// The four categories shown in the breakdown, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Malicious,
    Suspicious,
    Harmless,
    Undetected,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Malicious,
        Category::Suspicious,
        Category::Harmless,
        Category::Undetected,
    ];

    /// Key in the `stats` mapping.
    pub fn key(&self) -> &'static str {
        match self {
            Category::Malicious => "malicious",
            Category::Suspicious => "suspicious",
            Category::Harmless => "harmless",
            Category::Undetected => "undetected",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Category::Malicious => "Malicious",
            Category::Suspicious => "Suspicious",
            Category::Harmless => "Clean",
            Category::Undetected => "Undetected",
        }
    }

    pub fn class(&self) -> &'static str {
        match self {
            Category::Harmless => "safe",
            other => other.key(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryShare {
    pub category: Category,
    pub label: &'static str,
    pub class: &'static str,
    pub count: u64,
    pub percent: f64,
}

/// Display coloring for a single engine's detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionClass {
    Malicious,
    Suspicious,
    Safe,
}

impl DetectionClass {
    pub fn classify(category: &str) -> Self {
        match category {
            "malicious" => DetectionClass::Malicious,
            "suspicious" => DetectionClass::Suspicious,
            _ => DetectionClass::Safe,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineDetail {
    pub engine: String,
    pub category: String,
    pub class: DetectionClass,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedVerdict {
    pub verdict: Verdict,
    pub verdict_class: &'static str,
    pub total: u64,
    /// Share of engines that flagged the target as malicious.
    pub detection_rate: f64,
    pub breakdown: Vec<CategoryShare>,
    pub engines: Vec<EngineDetail>,
}

fn percent_of(value: u64, total: u64) -> f64 {
    (value as f64 / total as f64 * 1000.0).round() / 10.0
}

/// Builds the verdict for a completed analysis.
pub fn present(report: &AnalysisReport) -> Result<RenderedVerdict> {
    let stats: &BTreeMap<String, u64> = report.stats.as_ref().ok_or(ScanError::InvalidFormat)?;

    let total: u64 = stats.values().sum();
    if total == 0 {
        return Err(ScanError::NoResults);
    }

    let count = |category: Category| stats.get(category.key()).copied().unwrap_or(0);

    let breakdown: Vec<CategoryShare> = Category::ALL
        .iter()
        .map(|&category| {
            let value = count(category);
            CategoryShare {
                category,
                label: category.label(),
                class: category.class(),
                count: value,
                percent: percent_of(value, total),
            }
        })
        .collect();

    let verdict = Verdict::from_counts(count(Category::Malicious), count(Category::Suspicious));

    let engines = report
        .results
        .iter()
        .flatten()
        .map(|(engine, result)| EngineDetail {
            engine: engine.clone(),
            category: result.category.clone(),
            class: DetectionClass::classify(&result.category),
            result: result.result.clone(),
        })
        .collect();

    Ok(RenderedVerdict {
        verdict,
        verdict_class: verdict.class(),
        total,
        detection_rate: percent_of(count(Category::Malicious), total),
        breakdown,
        engines,
    })
}

impl fmt::Display for RenderedVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Verdict: {} ({}% detection rate)", self.verdict, self.detection_rate)?;
        for share in &self.breakdown {
            writeln!(f, "  {:<11} {:>4} ({:.1}%)", share.label, share.count, share.percent)?;
        }
        let flagged: Vec<&str> = self
            .engines
            .iter()
            .filter(|e| e.class != DetectionClass::Safe)
            .map(|e| e.engine.as_str())
            .collect();
        if flagged.is_empty() {
            write!(f, "  No engine flagged this target")
        } else {
            write!(f, "  Flagged by: {}", flagged.join(", "))
        }
    }
}
