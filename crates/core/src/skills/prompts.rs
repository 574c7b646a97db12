//! Default prompt templates bundled at compile time.

/// Record parser - free text to startup record
pub const RECORD_PARSER: &str = include_str!("defaults/record_parser.md");

/// Categorization - closed-vocabulary breakdown for the classifier
pub const CATEGORIZATION: &str = include_str!("defaults/categorization.md");

/// Market analyst - basic analysis from the record alone
pub const MARKET_ANALYSIS: &str = include_str!("defaults/market_analysis.md");

/// Market analyst - analysis enriched with external research
pub const MARKET_ADVANCED: &str = include_str!("defaults/market_advanced.md");

/// Market analyst - discursive VC narrative
pub const MARKET_NARRATIVE: &str = include_str!("defaults/market_narrative.md");

/// Research - core market keyword
pub const RESEARCH_KEYWORD: &str = include_str!("defaults/research_keyword.md");

pub const RESEARCH_FINANCIAL: &str = include_str!("defaults/research_financial.md");

pub const RESEARCH_TREND: &str = include_str!("defaults/research_trend.md");

pub const RESEARCH_MARKET: &str = include_str!("defaults/research_market.md");

/// Product analyst
pub const PRODUCT_ANALYSIS: &str = include_str!("defaults/product_analysis.md");

/// Founder analyst
pub const FOUNDER_ANALYSIS: &str = include_str!("defaults/founder_analysis.md");

/// Founder segmentation - L1 to L5
pub const FOUNDER_SEGMENTATION: &str = include_str!("defaults/founder_segmentation.md");

/// Founder-idea fit
pub const IDEA_FIT: &str = include_str!("defaults/idea_fit.md");

/// Integration - final investment decision
pub const INTEGRATION: &str = include_str!("defaults/integration.md");

/// All default prompts with their slugs
pub fn all_defaults() -> Vec<(&'static str, &'static str)> {
    vec![
        ("record_parser", RECORD_PARSER),
        ("categorization", CATEGORIZATION),
        ("market_analysis", MARKET_ANALYSIS),
        ("market_advanced", MARKET_ADVANCED),
        ("market_narrative", MARKET_NARRATIVE),
        ("research_keyword", RESEARCH_KEYWORD),
        ("research_financial", RESEARCH_FINANCIAL),
        ("research_trend", RESEARCH_TREND),
        ("research_market", RESEARCH_MARKET),
        ("product_analysis", PRODUCT_ANALYSIS),
        ("founder_analysis", FOUNDER_ANALYSIS),
        ("founder_segmentation", FOUNDER_SEGMENTATION),
        ("idea_fit", IDEA_FIT),
        ("integration", INTEGRATION),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_prompts_non_empty() {
        for (slug, content) in all_defaults() {
            assert!(!content.is_empty(), "Prompt '{}' should not be empty", slug);
            assert!(content.len() > 50, "Prompt '{}' seems too short", slug);
        }
    }

    #[test]
    fn test_prompt_count() {
        assert_eq!(all_defaults().len(), 14, "Should have 14 default prompts");
    }
}
