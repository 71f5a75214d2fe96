//! Gap Analyzer (§4.E): post-generation quality inspection over a completed
//! document's sections and source sets plus the Stage 2 context blob.

use chrono::Datelike;
use synth_core::{DocumentType, Issue, Section, Severity, Source, SourceType};
use synth_providers::schemas::{CriticalInformationOutput, ResearchGap};
use synth_providers::{GenerationParams, ProviderGateway, StructuredSchema, TaskTag};
use tracing::warn;

/// Result of a full Gap Analyzer pass (§4.E).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GapAnalysisResult {
    pub issues: Vec<Issue>,
    /// §4.E: 3-5 missing essentials given the document type, or empty if the
    /// critical-information provider call failed (logged, non-fatal per §7).
    pub missing_essentials: Vec<String>,
    pub completeness_score: f32,
    pub requires_revision: bool,
}

fn severity_from_str(s: &str) -> Severity {
    match s.to_lowercase().as_str() {
        "critical" => Severity::Critical,
        "high" => Severity::High,
        "medium" => Severity::Medium,
        _ => Severity::Low,
    }
}

/// §4.E item 1: content completeness. A gap is unaddressed if none of its
/// keywords appear anywhere in the concatenated section text; its issue
/// inherits the gap's own severity.
fn content_completeness(research_gaps: &[ResearchGap], concatenated_text: &str) -> Vec<Issue> {
    let haystack = concatenated_text.to_lowercase();
    research_gaps
        .iter()
        .filter(|gap| !gap.keywords.iter().any(|kw| haystack.contains(&kw.to_lowercase())))
        .map(|gap| Issue {
            severity: severity_from_str(&gap.severity),
            category: "content_completeness".to_string(),
            message: format!("research gap not addressed: {}", gap.description),
        })
        .collect()
}

/// §4.E item 2: source coverage. Sources scoring >= 0.85 relevance that were
/// never cited (title-keyword or doi/pmid probe against the concatenated
/// text) become issues; a skewed internal/external ratio adds a balance note.
fn source_coverage(sources: &[Source], concatenated_text: &str) -> Vec<Issue> {
    let mut issues = Vec::new();
    let haystack = concatenated_text.to_lowercase();

    for source in sources {
        if source.best_relevance() < 0.85 {
            continue;
        }
        let title_hit = source
            .title
            .split_whitespace()
            .filter(|w| w.len() > 3)
            .any(|w| haystack.contains(&w.to_lowercase()));
        let id_hit = source
            .external_id
            .as_deref()
            .map(|id| haystack.contains(&id.to_lowercase()))
            .unwrap_or(false);
        if !title_hit && !id_hit {
            issues.push(Issue {
                severity: Severity::Medium,
                category: "source_coverage".to_string(),
                message: format!("high-relevance source never cited: {}", source.title),
            });
        }
    }

    if !sources.is_empty() {
        let internal = sources.iter().filter(|s| s.source_type == SourceType::Internal).count() as f32;
        let ratio = internal / sources.len() as f32;
        if !(0.2..=0.8).contains(&ratio) {
            let severity = if ratio < 0.1 || ratio > 0.9 { Severity::Medium } else { Severity::Low };
            issues.push(Issue {
                severity,
                category: "source_balance".to_string(),
                message: format!("internal/external source ratio {:.2} is outside the balanced [0.2, 0.8] range", ratio),
            });
        }
    }

    issues
}

/// §4.E item 3: section balance via mean/short-threshold/long-threshold/CV.
/// Severity scales with how extreme the deviation is, the same pattern
/// `source_coverage` uses for its internal/external ratio: a section far
/// below the short threshold, or a CV far past 0.6, is flagged more
/// severely than one that just barely crosses the line.
fn section_balance(sections: &[Section]) -> Vec<Issue> {
    if sections.len() < 2 {
        return Vec::new();
    }
    let counts: Vec<f32> = sections.iter().map(|s| s.word_count as f32).collect();
    let mean = counts.iter().sum::<f32>() / counts.len() as f32;
    if mean == 0.0 {
        return Vec::new();
    }
    let short_threshold = 0.4 * mean;
    let long_threshold = 2.5 * mean;
    let variance = counts.iter().map(|c| (c - mean).powi(2)).sum::<f32>() / counts.len() as f32;
    let cv = variance.sqrt() / mean;

    let mut issues = Vec::new();
    for section in sections {
        let words = section.word_count as f32;
        if words < short_threshold {
            let severity = if words < 0.5 * short_threshold { Severity::Critical } else { Severity::Medium };
            issues.push(Issue {
                severity,
                category: "section_balance".to_string(),
                message: format!("section '{}' ({} words) is unusually short relative to the document mean", section.title, section.word_count),
            });
        } else if words > long_threshold {
            let severity = if words > 1.5 * long_threshold { Severity::Medium } else { Severity::Low };
            issues.push(Issue {
                severity,
                category: "section_balance".to_string(),
                message: format!("section '{}' ({} words) is unusually long relative to the document mean", section.title, section.word_count),
            });
        }
    }
    if cv > 0.6 {
        let severity = if cv > 0.9 { Severity::High } else { Severity::Medium };
        issues.push(Issue {
            severity,
            category: "section_balance".to_string(),
            message: format!("section word counts have high coefficient of variation ({:.2})", cv),
        });
    }
    issues
}

/// §4.E item 4: temporal coverage.
fn temporal_coverage(sources: &[Source]) -> Vec<Issue> {
    let has_external = sources.iter().any(|s| s.source_type != SourceType::Internal);
    let years: Vec<i32> = sources.iter().filter_map(|s| s.year).collect();

    if !has_external || years.is_empty() {
        return vec![Issue {
            severity: Severity::High,
            category: "temporal_coverage".to_string(),
            message: "no external sources or no publication years available".to_string(),
        }];
    }

    let current_year = chrono::Utc::now().year();
    let recent = years.iter().filter(|y| current_year - **y < 2).count() as f32 / years.len() as f32;
    let old = years.iter().filter(|y| current_year - **y > 10).count() as f32 / years.len() as f32;

    let mut issues = Vec::new();
    if recent < 0.20 {
        issues.push(Issue {
            severity: Severity::Medium,
            category: "temporal_coverage".to_string(),
            message: format!("only {:.0}% of sources are under 2 years old", recent * 100.0),
        });
    }
    if old > 0.50 {
        issues.push(Issue {
            severity: Severity::Medium,
            category: "temporal_coverage".to_string(),
            message: format!("{:.0}% of sources are over 10 years old", old * 100.0),
        });
    }
    issues
}

/// §4.E item 5: critical-information check, a structured prompt bounded to
/// 3-5 missing essentials given the document type. A provider failure here
/// is non-fatal (§7): it is logged and the document proceeds with an empty
/// list rather than aborting the gap analysis.
async fn critical_information(gateway: &ProviderGateway, document_type: DocumentType, topic: &str) -> Vec<String> {
    let schema = StructuredSchema::from_schemars::<CriticalInformationOutput>("critical_information");
    let prompt = format!(
        "For a {document_type} chapter on \"{topic}\", list the 3 to 5 most critical pieces of \
         information a clinician would expect that might be missing from a draft.",
    );
    let params = GenerationParams { task_tag: TaskTag::Summarization, max_tokens: 512, ..Default::default() };

    match gateway.generate_structured(&prompt, &schema, &params).await {
        Ok(generation) => match serde_json::from_value::<CriticalInformationOutput>(generation.data) {
            Ok(output) => output.missing_essentials,
            Err(error) => {
                warn!(%error, "critical-information output malformed, proceeding without it");
                Vec::new()
            }
        },
        Err(error) => {
            warn!(%error, "critical-information provider call failed, proceeding without it");
            Vec::new()
        }
    }
}

/// Completeness score (§4.E): start at 1.0, subtract per-severity penalties,
/// clamp to [0,1]. `requires_revision` if critical > 0 or high > 2 or
/// score < 0.75.
fn completeness_from_issues(issues: &[Issue]) -> (f32, bool) {
    let mut score = 1.0f32;
    let mut critical = 0;
    let mut high = 0;
    for issue in issues {
        match issue.severity {
            Severity::Critical => {
                score -= 0.15;
                critical += 1;
            }
            Severity::High => {
                score -= 0.08;
                high += 1;
            }
            Severity::Medium => score -= 0.04,
            Severity::Low => score -= 0.02,
        }
    }
    let score = score.clamp(0.0, 1.0);
    let requires_revision = critical > 0 || high > 2 || score < 0.75;
    (score, requires_revision)
}

/// Runs all five checks and aggregates into a [`GapAnalysisResult`]. Issues
/// are returned ordered by severity (critical > high > medium > low) per §5
/// ordering guarantees.
pub async fn analyze(
    gateway: &ProviderGateway,
    document_type: DocumentType,
    topic: &str,
    sections: &[Section],
    sources: &[Source],
    research_gaps: &[ResearchGap],
) -> GapAnalysisResult {
    let concatenated: String = sections.iter().map(|s| s.content.as_str()).collect::<Vec<_>>().join(" ");

    let mut issues = Vec::new();
    issues.extend(content_completeness(research_gaps, &concatenated));
    issues.extend(source_coverage(sources, &concatenated));
    issues.extend(section_balance(sections));
    issues.extend(temporal_coverage(sources));
    issues.sort_by(|a, b| b.severity.cmp(&a.severity));

    let missing_essentials = critical_information(gateway, document_type, topic).await;
    let (completeness_score, requires_revision) = completeness_from_issues(&issues);

    GapAnalysisResult { issues, missing_essentials, completeness_score, requires_revision }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synth_core::{SectionType, SynthesisConfig};
    use synth_providers::RoutingTable;

    fn section(title: &str, words: usize) -> Section {
        let mut s = Section::new(0, title, SectionType::Introduction);
        s.set_content(vec!["word"; words].join(" "));
        s
    }

    fn source(years_ago: i32, source_type: SourceType) -> Source {
        let mut s = Source::new("Some Source", source_type);
        s.year = Some(chrono::Utc::now().year() - years_ago);
        s.relevance_score = Some(0.9);
        s
    }

    /// §8 scenario 4: one 50-word section, one 2000-word section, no
    /// external sources -> balance issue + temporal issue, score < 0.75,
    /// requires_revision = true.
    #[tokio::test]
    async fn scenario_4_gap_analyzer_triggers_revision() {
        let sections = vec![section("Short", 50), section("Long", 2000)];
        let sources: Vec<Source> = Vec::new();
        let gateway = ProviderGateway::new(&SynthesisConfig::default(), RoutingTable::new());

        let result = analyze(&gateway, DocumentType::SurgicalDisease, "t", &sections, &sources, &[]).await;

        assert!(result.issues.iter().any(|i| i.category == "section_balance"));
        assert!(result.issues.iter().any(|i| i.category == "temporal_coverage"));
        assert!(result.completeness_score < 0.75);
        assert!(result.requires_revision);
    }

    #[test]
    fn issues_sorted_by_severity_descending() {
        let issues = vec![
            Issue { severity: Severity::Low, category: "a".into(), message: "m".into() },
            Issue { severity: Severity::Critical, category: "b".into(), message: "m".into() },
            Issue { severity: Severity::Medium, category: "c".into(), message: "m".into() },
        ];
        let mut sorted = issues;
        sorted.sort_by(|a, b| b.severity.cmp(&a.severity));
        assert_eq!(sorted[0].severity, Severity::Critical);
        assert_eq!(sorted[2].severity, Severity::Low);
    }

    #[test]
    fn temporal_coverage_flags_old_sources() {
        let sources = vec![source(15, SourceType::ExternalDb), source(12, SourceType::ExternalDb)];
        let issues = temporal_coverage(&sources);
        assert!(issues.iter().any(|i| i.message.contains("over 10 years old")));
    }

    #[test]
    fn completeness_score_penalizes_by_severity() {
        let issues = vec![Issue { severity: Severity::Critical, category: "x".into(), message: "m".into() }];
        let (score, requires_revision) = completeness_from_issues(&issues);
        assert!((score - 0.85).abs() < 1e-6);
        assert!(requires_revision);
    }
}
