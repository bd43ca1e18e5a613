use crate::domain::contract::LlmRecommendation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Verdict,
    Confidence,
    Reasons,
    Risks,
    Guidance,
    TimeHorizon,
}

fn section_for_label(label: &str) -> Option<Section> {
    let section = match label {
        "recommendation" | "verdict" | "decision" | "action" | "final recommendation" => {
            Section::Verdict
        }
        "confidence" | "confidence level" => Section::Confidence,
        "reasons" | "key reasons" | "supporting reasons" | "rationale" => Section::Reasons,
        "risks" | "risk factors" | "key risks" | "risk factors to consider" => Section::Risks,
        "guidance"
        | "entry/exit"
        | "entry/exit guidance"
        | "entry/exit points"
        | "suggested entry/exit points" => Section::Guidance,
        "time horizon" | "horizon" => Section::TimeHorizon,
        _ => return None,
    };
    Some(section)
}

/// Removes heading marks, bullets and `1.`/`1)` numbering from the start of a line.
fn strip_list_marker(line: &str) -> &str {
    let mut s = line.trim_start_matches(|c: char| c == '#' || c.is_whitespace());
    for bullet in ["- ", "* ", "• ", "+ "] {
        if let Some(rest) = s.strip_prefix(bullet) {
            return rest.trim();
        }
    }
    let digits = s.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &s[digits..];
        if let Some(rest) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
            s = rest;
        }
    }
    s.trim()
}

fn is_list_item(line: &str) -> bool {
    let s = line.trim_start();
    ["- ", "* ", "• ", "+ "].iter().any(|b| s.starts_with(b))
        || (s.chars().next().is_some_and(|c| c.is_ascii_digit())
            && strip_list_marker(s).len() < s.len())
}

fn split_label(line: &str) -> Option<(Section, String)> {
    let s = strip_list_marker(line);
    let (label, value) = s.split_once(':')?;
    let label = label
        .replace(['*', '_'], "")
        .trim()
        .to_ascii_lowercase();
    let section = section_for_label(&label)?;
    let value = value.trim().trim_matches('*').trim().to_string();
    Some((section, value))
}

fn first_word(value: &str) -> String {
    value
        .split(|c: char| !c.is_alphabetic())
        .find(|w| !w.is_empty())
        .unwrap_or_default()
        .to_string()
}

fn push_paragraph(target: &mut String, text: &str) {
    if text.is_empty() {
        return;
    }
    if !target.is_empty() {
        target.push(' ');
    }
    target.push_str(text);
}

/// Reads a recommendation written as labelled sections, e.g.
///
/// ```text
/// Recommendation: HOLD
/// Confidence: Medium
/// Reasons:
/// - mixed short-term signals
/// Risks:
/// - regulatory uncertainty
/// Guidance: wait for breakout confirmation
/// ```
///
/// Returns `None` when no verdict label is present.
pub fn parse_labelled(text: &str) -> Option<LlmRecommendation> {
    let mut out = LlmRecommendation::default();
    let mut reasons = Vec::new();
    let mut risks = Vec::new();
    let mut horizon = String::new();
    let mut verdict_seen = false;
    let mut current: Option<Section> = None;

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Some((section, value)) = split_label(trimmed) {
            current = Some(section);
            match section {
                Section::Verdict => {
                    if !verdict_seen {
                        out.verdict = first_word(&value);
                        verdict_seen = !out.verdict.is_empty();
                    }
                }
                Section::Confidence => out.confidence = first_word(&value),
                Section::Reasons if !value.is_empty() => reasons.push(value),
                Section::Risks if !value.is_empty() => risks.push(value),
                Section::Guidance => push_paragraph(&mut out.guidance, &value),
                Section::TimeHorizon => push_paragraph(&mut horizon, &value),
                _ => {}
            }
            continue;
        }

        let item = strip_list_marker(trimmed).trim_matches('*').trim().to_string();
        match current {
            Some(Section::Reasons) if is_list_item(trimmed) => reasons.push(item),
            Some(Section::Risks) if is_list_item(trimmed) => risks.push(item),
            Some(Section::Guidance) => push_paragraph(&mut out.guidance, &item),
            Some(Section::TimeHorizon) => push_paragraph(&mut horizon, &item),
            _ => {}
        }
    }

    if !verdict_seen {
        return None;
    }

    out.reasons = reasons.into();
    out.risks = risks.into();
    out.time_horizon = Some(horizon).filter(|h| !h.is_empty());
    Some(out)
}
