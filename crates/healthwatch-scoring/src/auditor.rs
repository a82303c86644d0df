//! Meta Auditor (C6, §4.6): a pure function over the page inventory. Same
//! input always produces the same issue sets (§8 property 7) — no I/O, no
//! clock reads beyond what the caller already baked into `Page`.

use healthwatch_core::entities::{MetaIssue, Page};
use std::collections::{BTreeSet, HashMap};

const TITLE_MAX: usize = 60;
const TITLE_MIN: usize = 30;
const META_MAX: usize = 160;
const META_MIN: usize = 70;

/// Per-page issue sets for the whole inventory, keyed by `canonical_url`.
/// Duplicates are computed across the full slice, so callers must pass the
/// complete active inventory, not a page at a time.
pub fn audit(pages: &[Page]) -> HashMap<String, BTreeSet<MetaIssue>> {
    let mut title_counts: HashMap<String, u32> = HashMap::new();
    let mut meta_counts: HashMap<String, u32> = HashMap::new();
    for page in pages {
        if let Some(t) = normalized(page.title.as_deref()) {
            *title_counts.entry(t).or_insert(0) += 1;
        }
        if let Some(m) = normalized(page.meta_description.as_deref()) {
            *meta_counts.entry(m).or_insert(0) += 1;
        }
    }

    let mut out = HashMap::with_capacity(pages.len());
    for page in pages {
        let mut issues = BTreeSet::new();
        match page.title.as_deref().map(str::trim) {
            None | Some("") => {
                issues.insert(MetaIssue::MissingTitle);
            }
            Some(t) => {
                let len = t.len();
                if len > TITLE_MAX {
                    issues.insert(MetaIssue::TitleTooLong);
                } else if len < TITLE_MIN {
                    issues.insert(MetaIssue::TitleTooShort);
                }
                if let Some(key) = normalized(Some(t)) {
                    if title_counts.get(&key).copied().unwrap_or(0) > 1 {
                        issues.insert(MetaIssue::DuplicateTitle);
                    }
                }
            }
        }
        match page.meta_description.as_deref().map(str::trim) {
            None | Some("") => {
                issues.insert(MetaIssue::MissingMeta);
            }
            Some(m) => {
                let len = m.len();
                if len > META_MAX {
                    issues.insert(MetaIssue::MetaTooLong);
                } else if len < META_MIN {
                    issues.insert(MetaIssue::MetaTooShort);
                }
                if let Some(key) = normalized(Some(m)) {
                    if meta_counts.get(&key).copied().unwrap_or(0) > 1 {
                        issues.insert(MetaIssue::DuplicateMeta);
                    }
                }
            }
        }
        out.insert(page.canonical_url.clone(), issues);
    }
    out
}

fn normalized(s: Option<&str>) -> Option<String> {
    let s = s?.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use healthwatch_core::entities::PageType;

    fn page(url: &str, title: Option<&str>, meta: Option<&str>) -> Page {
        Page {
            canonical_url: url.to_string(),
            slug: url.to_string(),
            title: title.map(str::to_string),
            meta_description: meta.map(str::to_string),
            page_type: PageType::Site,
            cms_page_id: None,
            has_form: false,
            form_ids: vec![],
            has_cta: false,
            cta_ids: vec![],
            published_at: None,
            last_updated_at: None,
            content_age_days: None,
            is_indexed: true,
            is_active: true,
            meta_issues: Default::default(),
            has_broken_links: false,
            broken_link_count: 0,
            health_score: None,
            health_score_breakdown: None,
            last_health_check_at: None,
        }
    }

    #[test]
    fn flags_missing_title_and_meta() {
        let pages = vec![page("https://x.com/a", None, None)];
        let issues = audit(&pages);
        let a = &issues["https://x.com/a"];
        assert!(a.contains(&MetaIssue::MissingTitle));
        assert!(a.contains(&MetaIssue::MissingMeta));
    }

    #[test]
    fn duplicate_titles_are_case_and_whitespace_insensitive() {
        let pages = vec![
            page("https://x.com/a", Some("  Welcome To Our Site  "), Some("a fine description of reasonable length here")),
            page("https://x.com/b", Some("welcome to our site"), Some("another fine description of reasonable length too")),
        ];
        let issues = audit(&pages);
        assert!(issues["https://x.com/a"].contains(&MetaIssue::DuplicateTitle));
        assert!(issues["https://x.com/b"].contains(&MetaIssue::DuplicateTitle));
    }

    #[test]
    fn is_deterministic_across_runs() {
        let pages = vec![page("https://x.com/a", Some("Ok Title Length Here For Sure"), Some("d".repeat(100).as_str()))];
        assert_eq!(audit(&pages), audit(&pages));
    }
}
