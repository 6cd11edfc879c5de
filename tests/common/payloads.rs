//! Recorded extraction payloads for a small hypertension protocol

use serde_json::{json, Value};

pub fn metadata() -> Value {
    json!({
        "study_title": "A Randomized, Double-Blind, Placebo-Controlled Study of Drug X in Essential Hypertension",
        "study_id": "DX-301",
        "sponsor": "Acme Pharma",
        "indication": "Essential Hypertension",
        "study_phase": "Phase 3",
        "identifiers": [
            {"id": "NCT01234567", "name": "NCT01234567", "type": "registry"},
            {"id": "EudraCT-2024-000123-45", "name": "2024-000123-45", "type": "registry"}
        ]
    })
}

pub fn eligibility() -> Value {
    json!({
        "inclusion": [
            "Age 18 to 75 years",
            "Mean seated systolic BP between 140 and 180 mmHg"
        ],
        "exclusion": [
            "Secondary hypertension",
            "eGFR below 30 mL/min/1.73m2"
        ]
    })
}

pub fn objectives() -> Value {
    json!({
        "objectives": [
            {"name": "Evaluate the effect of Drug X on seated SBP", "level": "primary"},
            {"name": "Assess safety and tolerability", "level": "secondary"}
        ],
        "endpoints": [
            {"name": "Change from baseline in seated SBP at Week 12", "level": "primary"}
        ]
    })
}

pub fn design() -> Value {
    json!({
        "arms": [
            {"id": "ARM-1", "name": "Drug X 10 mg"},
            {"id": "ARM-2", "name": "Drug X 20 mg"},
            {"id": "ARM-3", "name": "Placebo"}
        ],
        "epochs": ["Screening", "Run-in", "Treatment", "Follow-up"],
        "study_cells": [
            {"arm": "ARM-1", "epoch": "epoch_3"},
            {"arm": "ARM-2", "epoch": "epoch_3"},
            {"arm": "ARM-3", "epoch": "epoch_3"}
        ]
    })
}

pub fn interventions() -> Value {
    json!({
        "interventions": [
            {"name": "Drug X", "role": "investigational"},
            {"name": "Placebo", "role": "comparator"}
        ],
        "products": [
            {"name": "Drug X 10 mg tablet", "route": "oral"},
            {"name": "Drug X 20 mg tablet", "route": "oral"}
        ]
    })
}

pub fn scheduling() -> Value {
    json!({
        "encounters": [
            {"name": "Screening Visit", "day": -14},
            {"name": "Baseline", "day": 1},
            {"name": "Week 12", "day": 85}
        ],
        "activities": ["Informed consent", "Vital signs", "12-lead ECG", "Clinical labs"],
        "timings": [{"name": "Week 12", "value": "P12W"}]
    })
}

pub fn narrative() -> Value {
    json!({
        "sections": [
            {"name": "Introduction", "text_length": 2400},
            {"name": "Study Rationale", "text_length": 1800}
        ],
        "abbreviations": [
            {"name": "SBP", "expansion": "systolic blood pressure"},
            {"name": "eGFR", "expansion": "estimated glomerular filtration rate"}
        ]
    })
}

pub fn for_phase(name: &str) -> Value {
    match name {
        "metadata" => metadata(),
        "eligibility" => eligibility(),
        "objectives" => objectives(),
        "design" => design(),
        "interventions" => interventions(),
        "scheduling" => scheduling(),
        "narrative" => narrative(),
        _ => json!({}),
    }
}
