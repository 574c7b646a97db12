//! # Research Skill
//!
//! Multi-query market research aggregator.
//!
//! One completion call names the startup's market; the name is expanded into
//! a fixed set of search queries, results are bucketed by the query that
//! produced them, and each non-empty bucket is synthesized into one section
//! of a [`CompositeReport`].

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tokio::task::JoinSet;

use crate::error::{ScoutError, ScoutResult};
use crate::skills::completion::Completer;
use crate::skills::prompts;
use crate::skills::records::StartupRecord;
use crate::swarm::events::{PipelineEventKind, RunContext};
use crate::tools::search::SearchProvider;

const FINANCIAL_TERMS: [&str; 4] = ["funding", "revenue", "valuation", "financials"];
const TREND_TERMS: [&str; 3] = ["trend", "growth forecast", "emerging"];

/// Bucket a research result belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResearchCategory {
    Financial,
    Trend,
    General,
}

impl ResearchCategory {
    /// Categorize by the query that produced a result. Financial terms win over trend terms.
    pub fn for_keyword(keyword: &str) -> Self {
        let keyword = keyword.to_lowercase();
        if FINANCIAL_TERMS.iter().any(|term| keyword.contains(term)) {
            ResearchCategory::Financial
        } else if TREND_TERMS.iter().any(|term| keyword.contains(term)) {
            ResearchCategory::Trend
        } else {
            ResearchCategory::General
        }
    }

    /// Report heading
    pub fn heading(&self) -> &'static str {
        match self {
            ResearchCategory::General => "Market Overview",
            ResearchCategory::Financial => "Financial Analysis",
            ResearchCategory::Trend => "Market Trend Analysis",
        }
    }

    fn listing_label(&self) -> &'static str {
        match self {
            ResearchCategory::General => "General Market Research",
            ResearchCategory::Financial => "Financial Research",
            ResearchCategory::Trend => "Market Trend Research",
        }
    }

    fn instruction(&self) -> &'static str {
        match self {
            ResearchCategory::General => prompts::RESEARCH_MARKET,
            ResearchCategory::Financial => prompts::RESEARCH_FINANCIAL,
            ResearchCategory::Trend => prompts::RESEARCH_TREND,
        }
    }

    /// Report order
    fn ordered() -> [ResearchCategory; 3] {
        [
            ResearchCategory::General,
            ResearchCategory::Financial,
            ResearchCategory::Trend,
        ]
    }
}

/// One search hit, tagged with the query that found it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ResearchResult {
    pub title: String,
    pub snippet: String,
    pub source: String,
    pub date: String,
    /// Originating search keyword
    pub keyword: String,
    pub category: ResearchCategory,
}

impl ResearchResult {
    fn from_hit(hit: &Value, keyword: &str) -> Option<Self> {
        let field = |key: &str| {
            hit.get(key)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .trim()
                .to_string()
        };
        if !hit.is_object() {
            return None;
        }
        Some(Self {
            title: field("title"),
            snippet: field("snippet"),
            source: field("source"),
            date: field("date"),
            keyword: keyword.to_string(),
            category: ResearchCategory::for_keyword(keyword),
        })
    }

    /// Normalized title + source. Untitled hits are keyed by their snippet.
    fn dedup_key(&self) -> (String, String) {
        let text = if self.title.is_empty() {
            &self.snippet
        } else {
            &self.title
        };
        (
            text.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" "),
            self.source.to_lowercase(),
        )
    }
}

/// One synthesized section of the report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReportSection {
    pub category: ResearchCategory,
    pub heading: String,
    pub body: String,
    /// Number of results the section was synthesized from
    pub result_count: usize,
}

/// Synthesized research across all categories
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CompositeReport {
    pub keywords: Vec<String>,
    pub sections: Vec<ReportSection>,
    /// Results kept after de-duplication
    pub result_count: usize,
    /// Non-fatal problems met while gathering
    pub warnings: Vec<String>,
}

impl CompositeReport {
    /// Markdown report, one `##` section per non-empty category
    pub fn render(&self) -> String {
        let mut report = String::from("# Comprehensive Market Analysis\n\n");
        for section in &self.sections {
            report.push_str(&format!("## {}\n{}\n\n", section.heading, section.body));
        }
        report
    }

    pub fn section(&self, category: ResearchCategory) -> Option<&ReportSection> {
        self.sections.iter().find(|s| s.category == category)
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

// ============================================================================
// Pure helpers
// ============================================================================

/// Expand the core market keyword into search queries
pub fn expand_keywords(core: &str, company: Option<&str>) -> Vec<String> {
    match company {
        Some(company) => vec![
            format!("{}, Growth, Trend, Size, Revenue", core),
            format!("{} funding history", company),
            format!("{} revenue financials", company),
            format!("{} valuation", company),
            format!("{} emerging trends", core),
            format!("{} market growth forecast", core),
        ],
        None => vec![
            format!("{}, Growth, Trend, Size, Revenue", core),
            format!("{} funding trends", core),
            format!("{} market financials", core),
            format!("{} emerging trends", core),
        ],
    }
}

/// First non-empty line of a keyword reply, without quotes or trailing punctuation
fn clean_keyword(reply: &str) -> Option<String> {
    let line = reply.lines().map(str::trim).find(|l| !l.is_empty())?;
    let line = line
        .trim_start_matches(|c: char| c == '"' || c == '\'' || c == '*' || c == '-' || c.is_whitespace())
        .trim_end_matches(|c: char| {
            c == '"' || c == '\'' || c == '*' || c == '.' || c.is_whitespace()
        });
    let line = line
        .strip_prefix("Keyword:")
        .or_else(|| line.strip_prefix("keyword:"))
        .unwrap_or(line)
        .trim();
    (!line.is_empty()).then(|| line.to_string())
}

/// Listing fed to a category synthesis call. Results without a snippet are skipped.
fn compile_listing(category: ResearchCategory, results: &[&ResearchResult]) -> String {
    let mut listing = format!("{}:\n\n", category.listing_label());
    for result in results.iter().filter(|r| !r.snippet.is_empty()) {
        listing.push_str(&format!(
            "Source: {} ({})\nTitle: {}\nSearch Keyword: {}\nFinding: {}\n\n",
            result.source, result.date, result.title, result.keyword, result.snippet
        ));
    }
    listing
}

/// Parse one search payload. Anything but an array is zero results.
fn ingest(payload: &Value, keyword: &str) -> Vec<ResearchResult> {
    match payload.as_array() {
        Some(hits) => hits
            .iter()
            .filter_map(|hit| ResearchResult::from_hit(hit, keyword))
            .collect(),
        None => {
            tracing::warn!("No list results for keyword: {}", keyword);
            Vec::new()
        }
    }
}

// ============================================================================
// Skill
// ============================================================================

/// Research aggregator. The report is gathered at most once per instance.
pub struct ResearchSkill {
    completer: Completer,
    search: Arc<dyn SearchProvider>,
    results_per_query: usize,
    report: OnceCell<Result<CompositeReport, String>>,
}

impl ResearchSkill {
    pub fn new(completer: Completer, search: Arc<dyn SearchProvider>, results_per_query: usize) -> Self {
        Self {
            completer,
            search,
            results_per_query,
            report: OnceCell::new(),
        }
    }

    /// Shared report for this run, gathering it on first use
    pub async fn report(&self, record: &StartupRecord, ctx: &RunContext) -> ScoutResult<CompositeReport> {
        let cached = self
            .report
            .get_or_init(|| async {
                self.gather(record, ctx).await.map_err(|e| e.to_string())
            })
            .await;
        cached
            .clone()
            .map_err(|message| ScoutError::search(format!("research unavailable: {}", message)))
    }

    /// Run the full keyword -> search -> synthesis flow
    pub async fn gather(&self, record: &StartupRecord, ctx: &RunContext) -> ScoutResult<CompositeReport> {
        ctx.emit(ctx.event(PipelineEventKind::ResearchStarted)).await;

        let reply = self
            .completer
            .text("research.keyword", prompts::RESEARCH_KEYWORD, &record.description)
            .await?;
        let core = clean_keyword(&reply)
            .ok_or_else(|| ScoutError::completion("research.keyword: no keyword in reply"))?;
        let keywords = expand_keywords(&core, record.company());
        tracing::info!("Generated {} keywords: {:?}", keywords.len(), keywords);

        ctx.emit(
            ctx.event(PipelineEventKind::ResearchProgress)
                .with_data(serde_json::json!({ "keywords": keywords })),
        )
        .await;

        let mut warnings = Vec::new();
        let results = self.search_all(&keywords, &mut warnings).await;
        tracing::info!("Total search results: {}", results.len());

        let mut report = self.synthesize(&results, &mut warnings).await;
        report.keywords = keywords;
        report.result_count = results.len();
        report.warnings = warnings;

        ctx.emit(
            ctx.event(PipelineEventKind::ResearchCompleted).with_data(serde_json::json!({
                "results": report.result_count,
                "sections": report.sections.len(),
            })),
        )
        .await;
        Ok(report)
    }

    /// Query every keyword concurrently and ingest the hits in keyword order
    async fn search_all(&self, keywords: &[String], warnings: &mut Vec<String>) -> Vec<ResearchResult> {
        let mut set = JoinSet::new();
        for (index, keyword) in keywords.iter().enumerate() {
            let search = Arc::clone(&self.search);
            let keyword = keyword.clone();
            let limit = self.results_per_query;
            let timeout = self.completer.timeout();
            set.spawn(async move {
                let outcome = match tokio::time::timeout(timeout, search.search(&keyword, limit)).await {
                    Ok(result) => result,
                    Err(_) => Err(ScoutError::timeout(format!("search '{}'", keyword), timeout)),
                };
                (index, keyword, outcome)
            });
        }

        let mut payloads = Vec::with_capacity(keywords.len());
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(entry) => payloads.push(entry),
                Err(e) => warnings.push(format!("search task failed: {}", e)),
            }
        }
        payloads.sort_by_key(|(index, _, _)| *index);

        let mut seen = HashSet::new();
        let mut results = Vec::new();
        for (_, keyword, outcome) in payloads {
            match outcome {
                Ok(payload) => {
                    let hits = ingest(&payload, &keyword);
                    tracing::info!("Found {} results for '{}'", hits.len(), keyword);
                    results.extend(hits.into_iter().filter(|hit| seen.insert(hit.dedup_key())));
                }
                Err(e) => {
                    tracing::warn!(backend = self.search.name(), "Search failed for '{}': {}", keyword, e);
                    warnings.push(format!("search '{}': {}", keyword, e));
                }
            }
        }
        results
    }

    async fn synthesize_section(
        &self,
        category: ResearchCategory,
        results: &[ResearchResult],
    ) -> Option<ScoutResult<ReportSection>> {
        let bucket: Vec<&ResearchResult> = results.iter().filter(|r| r.category == category).collect();
        if bucket.is_empty() {
            return None;
        }

        let listing = compile_listing(category, &bucket);
        let operation = format!("research.{:?}", category).to_lowercase();
        let body = self
            .completer
            .text(&operation, category.instruction(), &listing)
            .await;
        Some(body.map(|body| ReportSection {
            category,
            heading: category.heading().to_string(),
            body: body.trim().to_string(),
            result_count: bucket.len(),
        }))
    }

    async fn synthesize(&self, results: &[ResearchResult], warnings: &mut Vec<String>) -> CompositeReport {
        let [general, financial, trend] = ResearchCategory::ordered();
        let (general, financial, trend) = tokio::join!(
            self.synthesize_section(general, results),
            self.synthesize_section(financial, results),
            self.synthesize_section(trend, results),
        );

        let mut report = CompositeReport::default();
        for outcome in [general, financial, trend].into_iter().flatten() {
            match outcome {
                Ok(section) => report.sections.push(section),
                Err(e) => {
                    tracing::warn!("Research synthesis failed: {}", e);
                    warnings.push(format!("synthesis: {}", e));
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{completer, ScriptedCompletion, StaticSearch};
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn test_keyword_categorization() {
        assert_eq!(ResearchCategory::for_keyword("fintech funding trends"), ResearchCategory::Financial);
        assert_eq!(ResearchCategory::for_keyword("Acme valuation"), ResearchCategory::Financial);
        assert_eq!(ResearchCategory::for_keyword("payments emerging trends"), ResearchCategory::Trend);
        assert_eq!(ResearchCategory::for_keyword("payments market growth forecast"), ResearchCategory::Trend);
        assert_eq!(ResearchCategory::for_keyword("payments market size"), ResearchCategory::General);
    }

    #[test]
    fn test_expand_keywords_with_and_without_company() {
        let with = expand_keywords("Digital Payments Market", Some("Stripe"));
        assert_eq!(with.len(), 6);
        assert_eq!(with[0], "Digital Payments Market, Growth, Trend, Size, Revenue");
        assert_eq!(with[1], "Stripe funding history");
        assert_eq!(with[5], "Digital Payments Market market growth forecast");

        let without = expand_keywords("Digital Payments Market", None);
        assert_eq!(
            without,
            vec![
                "Digital Payments Market, Growth, Trend, Size, Revenue",
                "Digital Payments Market funding trends",
                "Digital Payments Market market financials",
                "Digital Payments Market emerging trends",
            ]
        );
    }

    #[test]
    fn test_clean_keyword() {
        assert_eq!(clean_keyword("\n\"Chinese Pharmaceutical Market\".\n").as_deref(), Some("Chinese Pharmaceutical Market"));
        assert_eq!(clean_keyword("Keyword: Travel Search").as_deref(), Some("Travel Search"));
        assert_eq!(clean_keyword("  \n "), None);
    }

    #[test]
    fn test_listing_skips_results_without_snippet() {
        let with = ResearchResult {
            title: "Funding round".to_string(),
            snippet: "Raised $20M".to_string(),
            source: "techcrunch.com".to_string(),
            date: "2024".to_string(),
            keyword: "Acme funding history".to_string(),
            category: ResearchCategory::Financial,
        };
        let without = ResearchResult {
            snippet: String::new(),
            title: "Empty".to_string(),
            ..with.clone()
        };
        let listing = compile_listing(ResearchCategory::Financial, &[&with, &without]);

        assert!(listing.starts_with("Financial Research:\n\n"));
        assert!(listing.contains("Source: techcrunch.com (2024)\nTitle: Funding round\nSearch Keyword: Acme funding history\nFinding: Raised $20M\n\n"));
        assert!(!listing.contains("Empty"));
    }

    #[test]
    fn test_non_list_payload_is_zero_results() {
        assert!(ingest(&json!({"error": "quota"}), "x").is_empty());
        assert_eq!(ingest(&json!([{"title": "t", "snippet": "s"}]), "x").len(), 1);
    }

    #[test]
    fn test_render_orders_sections_and_omits_empty() {
        let report = CompositeReport {
            sections: vec![ReportSection {
                category: ResearchCategory::Trend,
                heading: "Market Trend Analysis".to_string(),
                body: "Growing".to_string(),
                result_count: 1,
            }],
            ..CompositeReport::default()
        };
        let rendered = report.render();
        assert!(rendered.starts_with("# Comprehensive Market Analysis\n\n"));
        assert!(rendered.contains("## Market Trend Analysis\nGrowing"));
        assert!(!rendered.contains("Financial Analysis"));
    }

    #[tokio::test]
    async fn test_gather_builds_sections_and_dedups() {
        let completion = ScriptedCompletion::new()
            .on_text("one keyword", "Digital Payments Market")
            .on_text("financial analyst", "Revenue up 30%")
            .on_text("trend analyst", "Adoption accelerating");
        let hit = json!([
            {"title": "Payments boom", "snippet": "Market grew", "source": "ft.com", "date": "2024"},
            {"title": "Payments  BOOM", "snippet": "dup", "source": "FT.com", "date": "2024"}
        ]);
        let search = StaticSearch::new(hit);
        let skill = ResearchSkill::new(completer(completion), Arc::new(search), 5);

        let record = StartupRecord {
            description: "Payments API".to_string(),
            ..StartupRecord::default()
        };
        let report = skill.gather(&record, &RunContext::new()).await.unwrap();

        assert_eq!(report.keywords.len(), 4);
        // Identical hits for every keyword collapse to one result
        assert_eq!(report.result_count, 1);
        assert_eq!(report.sections.len(), 1);
        assert_eq!(report.sections[0].category, ResearchCategory::Financial);
        assert_eq!(report.sections[0].body, "Revenue up 30%");
    }

    #[tokio::test]
    async fn test_failed_search_is_a_warning_not_an_error() {
        let completion = ScriptedCompletion::new().on_text("one keyword", "Travel Search Market");
        let skill = ResearchSkill::new(completer(completion), Arc::new(StaticSearch::failing()), 5);

        let record = StartupRecord {
            description: "Flight search".to_string(),
            ..StartupRecord::default()
        };
        let report = skill.gather(&record, &RunContext::new()).await.unwrap();

        assert!(report.is_empty());
        assert_eq!(report.warnings.len(), 4);
    }

    #[tokio::test]
    async fn test_report_is_gathered_once_per_run() {
        let completion = Arc::new(ScriptedCompletion::new().on_text("one keyword", "Travel Search Market"));
        let search = Arc::new(StaticSearch::failing());
        let skill = ResearchSkill::new(
            Completer::new(completion.clone(), Duration::from_secs(5)),
            search.clone(),
            5,
        );
        let record = StartupRecord {
            description: "Flight search".to_string(),
            ..StartupRecord::default()
        };

        skill.report(&record, &RunContext::new()).await.unwrap();
        skill.report(&record, &RunContext::new()).await.unwrap();

        assert_eq!(completion.calls(), 1);
        let mut queries = search.queries();
        queries.sort();
        assert_eq!(
            queries,
            vec![
                "Travel Search Market emerging trends",
                "Travel Search Market funding trends",
                "Travel Search Market market financials",
                "Travel Search Market, Growth, Trend, Size, Revenue",
            ]
        );
    }

    #[tokio::test]
    async fn test_untitled_hits_are_kept_apart() {
        let completion = ScriptedCompletion::new()
            .on_text("one keyword", "Payments Market")
            .with_text("Summary");
        let hits = json!([
            {"snippet": "Stripe raised $600M", "source": "", "date": ""},
            {"snippet": "Adyen revenue grew 20%", "source": "", "date": ""}
        ]);
        let skill = ResearchSkill::new(completer(completion), Arc::new(StaticSearch::new(hits)), 5);
        let record = StartupRecord {
            description: "Payments API".to_string(),
            ..StartupRecord::default()
        };

        let report = skill.gather(&record, &RunContext::new()).await.unwrap();
        assert_eq!(report.result_count, 2);
    }

    #[tokio::test]
    async fn test_keyword_failure_fails_gather() {
        let skill = ResearchSkill::new(
            completer(crate::testing::FailingCompletion),
            Arc::new(StaticSearch::new(json!([]))),
            5,
        );
        let record = StartupRecord {
            description: "Anything".to_string(),
            ..StartupRecord::default()
        };
        assert!(skill.report(&record, &RunContext::new()).await.is_err());
    }
}
