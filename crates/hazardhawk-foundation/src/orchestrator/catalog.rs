//! Hazard Catalog
//!
//! Maps raw model class labels to hazards, PPE observations and OSHA
//! citations, and assembles the final [`AnalysisResult`]. Local and cloud
//! tiers both go through [`build_result`], so the same detection always
//! yields the same hazard regardless of where it was produced.
//!
//! Labels are matched after normalization (`"No-Hardhat"` → `no_hard_hat`).

use std::collections::BTreeMap;

use super::runtime::{RawDetection, RawInference};
use super::types::{
    AnalysisResult, Hazard, HazardType, OshaViolation, PpeDetection, PpeItem, PpeStatus,
    RiskLevel, Severity, WorkType,
};

/// What a normalized label means.
#[derive(Debug, Clone, Copy)]
pub enum LabelMeaning {
    /// A hazard, optionally implying a PPE slot is missing.
    Hazard(&'static HazardEntry),
    /// Evidence that a PPE item is worn.
    PpePresent(PpeItem),
    /// Scene context (people, cones); no effect on the result.
    Context,
}

#[derive(Debug)]
pub struct HazardEntry {
    pub tag: &'static str,
    pub hazard_type: HazardType,
    pub severity: Severity,
    pub description: &'static str,
    pub osha_code: &'static str,
    pub osha_title: &'static str,
    pub missing_ppe: Option<PpeItem>,
    pub recommendations: &'static [&'static str],
}

static NO_HARD_HAT: HazardEntry = HazardEntry {
    tag: "no-hard-hat",
    hazard_type: HazardType::PpeViolation,
    severity: Severity::High,
    description: "Worker without head protection",
    osha_code: "1926.100(a)",
    osha_title: "Head protection",
    missing_ppe: Some(PpeItem::HardHat),
    recommendations: &[
        "Stop work until a hard hat is worn",
        "Verify hard hat availability at site entry",
    ],
};

static NO_SAFETY_VEST: HazardEntry = HazardEntry {
    tag: "no-safety-vest",
    hazard_type: HazardType::PpeViolation,
    severity: Severity::Medium,
    description: "Worker without high-visibility vest",
    osha_code: "1926.201(a)",
    osha_title: "Signaling and high-visibility apparel",
    missing_ppe: Some(PpeItem::SafetyVest),
    recommendations: &["Issue a class 2 or 3 high-visibility vest"],
};

static FALL_HAZARD: HazardEntry = HazardEntry {
    tag: "fall-hazard",
    hazard_type: HazardType::FallHazard,
    severity: Severity::Critical,
    description: "Unprotected edge or opening above 6 feet",
    osha_code: "1926.501(b)(1)",
    osha_title: "Duty to have fall protection",
    missing_ppe: None,
    recommendations: &[
        "Install guardrails or a safety net system",
        "Require a personal fall arrest system",
    ],
};

static ELECTRICAL_HAZARD: HazardEntry = HazardEntry {
    tag: "electrical-hazard",
    hazard_type: HazardType::ElectricalHazard,
    severity: Severity::High,
    description: "Exposed energized conductors",
    osha_code: "1926.416(a)(1)",
    osha_title: "Protection of employees from electric shock",
    missing_ppe: None,
    recommendations: &[
        "De-energize and lock out the circuit",
        "Guard or insulate exposed conductors",
    ],
};

static MACHINERY: HazardEntry = HazardEntry {
    tag: "heavy-machinery",
    hazard_type: HazardType::MachineryHazard,
    severity: Severity::Medium,
    description: "Heavy equipment operating near workers",
    osha_code: "1926.600(a)(3)",
    osha_title: "Equipment",
    missing_ppe: None,
    recommendations: &["Establish a swing radius exclusion zone"],
};

static CRANE: HazardEntry = HazardEntry {
    tag: "crane-operation",
    hazard_type: HazardType::MachineryHazard,
    severity: Severity::High,
    description: "Crane operating near workers",
    osha_code: "1926.1424(a)",
    osha_title: "Work area control",
    missing_ppe: None,
    recommendations: &["Barricade the crane swing radius", "Assign a qualified signal person"],
};

static VEHICLE: HazardEntry = HazardEntry {
    tag: "vehicle-traffic",
    hazard_type: HazardType::VehicleTraffic,
    severity: Severity::Medium,
    description: "Vehicle operating in the work zone",
    osha_code: "1926.601(b)(4)",
    osha_title: "Motor vehicles",
    missing_ppe: None,
    recommendations: &["Use a spotter when backing", "Separate pedestrian routes"],
};

/// Resolve a raw label.
pub fn lookup(label: &str) -> Option<LabelMeaning> {
    let meaning = match normalize_label(label).as_str() {
        "no_hard_hat" | "no_helmet" => LabelMeaning::Hazard(&NO_HARD_HAT),
        "no_safety_vest" | "no_vest" => LabelMeaning::Hazard(&NO_SAFETY_VEST),
        "fall_hazard" | "unprotected_edge" => LabelMeaning::Hazard(&FALL_HAZARD),
        "electrical_hazard" | "exposed_wiring" => LabelMeaning::Hazard(&ELECTRICAL_HAZARD),
        "machinery" | "excavator" => LabelMeaning::Hazard(&MACHINERY),
        "crane" => LabelMeaning::Hazard(&CRANE),
        "truck" | "vehicle" => LabelMeaning::Hazard(&VEHICLE),
        "hard_hat" | "helmet" => LabelMeaning::PpePresent(PpeItem::HardHat),
        "safety_vest" | "vest" => LabelMeaning::PpePresent(PpeItem::SafetyVest),
        "safety_glasses" | "goggles" => LabelMeaning::PpePresent(PpeItem::SafetyGlasses),
        "gloves" => LabelMeaning::PpePresent(PpeItem::Gloves),
        "harness" | "fall_harness" => LabelMeaning::PpePresent(PpeItem::FallHarness),
        "safety_boots" | "boots" => LabelMeaning::PpePresent(PpeItem::SafetyBoots),
        "person" | "safety_cone" | "barrier" => LabelMeaning::Context,
        _ => return None,
    };
    Some(meaning)
}

/// `"No-Hardhat"` → `"no_hard_hat"`.
pub fn normalize_label(label: &str) -> String {
    let snake = label.trim().to_ascii_lowercase().replace(['-', ' '], "_");
    snake.replace("hardhat", "hard_hat")
}

/// Options that shape result assembly.
#[derive(Debug, Clone, Copy)]
pub struct AssemblyOptions {
    pub work_type: WorkType,
    pub confidence_threshold: f32,
    pub include_osha_codes: bool,
}

/// Assemble an [`AnalysisResult`] from raw detections.
///
/// Detections below the threshold are dropped. Each hazard label contributes
/// one hazard per detection; PPE slots take the strongest evidence seen. Slots
/// the work type requires but nothing observed are reported as `Unknown`.
pub fn build_result(
    raw: &RawInference,
    options: AssemblyOptions,
    backend_used: impl Into<String>,
) -> AnalysisResult {
    let mut result = AnalysisResult::empty(backend_used);
    let mut kept_scores: Vec<f32> = Vec::new();
    let mut unknown_labels: Vec<&str> = Vec::new();

    for detection in raw
        .detections
        .iter()
        .filter(|d| d.score >= options.confidence_threshold)
    {
        match lookup(&detection.label) {
            Some(LabelMeaning::Hazard(entry)) => {
                kept_scores.push(detection.score);
                result.hazards.push(hazard_from(entry, detection, options));
                if let Some(item) = entry.missing_ppe {
                    record_ppe(&mut result.ppe_status, item, PpeStatus::Missing, detection.score);
                }
            }
            Some(LabelMeaning::PpePresent(item)) => {
                kept_scores.push(detection.score);
                record_ppe(&mut result.ppe_status, item, PpeStatus::Present, detection.score);
            }
            Some(LabelMeaning::Context) => {}
            None => unknown_labels.push(&detection.label),
        }
    }

    for item in options.work_type.required_ppe() {
        result.ppe_status.entry(*item).or_insert(PpeDetection {
            status: PpeStatus::Unknown,
            confidence: 0.0,
        });
    }

    if options.include_osha_codes {
        result.osha_violations = violations_for(&result.hazards);
    }

    result.overall_risk = RiskLevel::assess(&result.hazards);
    result.ai_confidence = match raw.overall_confidence {
        Some(confidence) => confidence,
        None if kept_scores.is_empty() => 0.0,
        None => kept_scores.iter().sum::<f32>() / kept_scores.len() as f32,
    };
    if !unknown_labels.is_empty() {
        result.debug_info = Some(format!("unmapped labels: {}", unknown_labels.join(", ")));
    }

    result.normalize();
    result
}

fn hazard_from(entry: &HazardEntry, detection: &RawDetection, options: AssemblyOptions) -> Hazard {
    Hazard {
        tag: entry.tag.to_string(),
        hazard_type: entry.hazard_type,
        description: entry.description.to_string(),
        severity: entry.severity,
        confidence: detection.score,
        osha_code: options
            .include_osha_codes
            .then(|| entry.osha_code.to_string()),
        bounding_box: detection.bounding_box,
        recommendations: entry.recommendations.iter().map(|r| r.to_string()).collect(),
    }
}

/// Missing beats present for the same slot; otherwise the stronger score wins.
fn record_ppe(
    slots: &mut BTreeMap<PpeItem, PpeDetection>,
    item: PpeItem,
    status: PpeStatus,
    confidence: f32,
) {
    let incoming = PpeDetection { status, confidence };
    slots
        .entry(item)
        .and_modify(|current| {
            let replace = match (current.status, status) {
                (PpeStatus::Missing, PpeStatus::Present) => false,
                (PpeStatus::Present, PpeStatus::Missing) => true,
                _ => confidence > current.confidence,
            };
            if replace {
                *current = incoming;
            }
        })
        .or_insert(incoming);
}

/// One violation per distinct OSHA code, carrying the worst severity seen.
fn violations_for(hazards: &[Hazard]) -> Vec<OshaViolation> {
    let mut by_code: BTreeMap<String, OshaViolation> = BTreeMap::new();

    for hazard in hazards {
        let Some(code) = &hazard.osha_code else {
            continue;
        };
        let title = lookup_title(&hazard.tag).unwrap_or("Safety standard");
        by_code
            .entry(code.clone())
            .and_modify(|v| v.severity = v.severity.max(hazard.severity))
            .or_insert_with(|| OshaViolation {
                code: code.clone(),
                title: title.to_string(),
                severity: hazard.severity,
                description: hazard.description.clone(),
            });
    }

    by_code.into_values().collect()
}

fn lookup_title(tag: &str) -> Option<&'static str> {
    [
        &NO_HARD_HAT,
        &NO_SAFETY_VEST,
        &FALL_HAZARD,
        &ELECTRICAL_HAZARD,
        &MACHINERY,
        &CRANE,
        &VEHICLE,
    ]
    .into_iter()
    .find(|e| e.tag == tag)
    .map(|e| e.osha_title)
}

/// Typical hazard for a work type, used by the checklist tier.
pub fn typical_hazard(work_type: WorkType) -> Option<&'static HazardEntry> {
    match work_type {
        WorkType::FallProtection | WorkType::Roofing | WorkType::HighRiseConstruction => {
            Some(&FALL_HAZARD)
        }
        WorkType::Electrical => Some(&ELECTRICAL_HAZARD),
        WorkType::Excavation => Some(&MACHINERY),
        WorkType::Roadwork => Some(&VEHICLE),
        WorkType::GeneralConstruction | WorkType::PpeCompliance | WorkType::Welding => None,
    }
}
