//! Health Scorer (C7, §4.7): a pure function from a page plus its latest
//! snapshots to a six-dimension breakdown. Every bucket boundary below is a
//! literal from the design table — do not round or otherwise "improve" them,
//! the end-to-end scenarios in the design (S1/S2) pin exact totals.

use healthwatch_core::entities::{
    AnalyticsSnapshot, HealthScoreBreakdown, MetaIssue, Page, PageType, SearchSnapshot, SpeedScore,
};

/// Inputs to a single page's score. `None` means "no matching snapshot was
/// found for this page in the current run" (§4.8 "URL-matching policy"), not
/// "the adapter returned zero engagement" — both become the documented
/// missing-data score for that dimension.
pub struct ScoringInputs<'a> {
    pub page: &'a Page,
    pub analytics: Option<&'a AnalyticsSnapshot>,
    pub search: Option<&'a SearchSnapshot>,
    pub speed: Option<&'a SpeedScore>,
    pub now_utc_date: chrono::NaiveDate,
}

pub fn score(inputs: &ScoringInputs) -> HealthScoreBreakdown {
    HealthScoreBreakdown {
        traffic_trend: traffic_trend(inputs.analytics),
        seo_ranking: seo_ranking(inputs.search),
        page_speed: page_speed(inputs.speed),
        content_freshness: content_freshness(inputs.page, inputs.now_utc_date),
        conversion_health: conversion_health(inputs.page),
        technical_health: technical_health(inputs.page),
    }
}

fn traffic_trend(analytics: Option<&AnalyticsSnapshot>) -> u32 {
    match analytics {
        None => 10,
        Some(a) => {
            let change = a.traffic_change_pct;
            if change >= 0.0 {
                20
            } else if change > -10.0 {
                15
            } else if change > -30.0 {
                8
            } else {
                0
            }
        }
    }
}

fn seo_ranking(search: Option<&SearchSnapshot>) -> u32 {
    match search {
        None => 0,
        Some(s) => {
            let pos = s.avg_position;
            if pos <= 10.0 {
                20
            } else if pos <= 20.0 {
                15
            } else if pos <= 50.0 {
                8
            } else {
                0
            }
        }
    }
}

fn page_speed(speed: Option<&SpeedScore>) -> u32 {
    match speed {
        None => 10,
        Some(s) => {
            let perf = s.performance_score;
            if perf >= 90 {
                20
            } else if perf >= 70 {
                15
            } else if perf >= 50 {
                8
            } else {
                0
            }
        }
    }
}

fn content_freshness(page: &Page, now: chrono::NaiveDate) -> u32 {
    let age_days = match page.content_age_days {
        Some(d) => d,
        None => match page.last_updated_at {
            Some(ts) => (now - ts.date_naive()).num_days(),
            None => return 0,
        },
    };
    if age_days < 90 {
        15
    } else if age_days < 180 {
        10
    } else if age_days < 365 {
        5
    } else {
        0
    }
}

fn conversion_health(page: &Page) -> u32 {
    if page.has_form {
        5
    } else {
        match page.page_type {
            PageType::Blog => 10,
            PageType::Landing => 0,
            _ => 8,
        }
    }
}

fn technical_health(page: &Page) -> u32 {
    let mut score: i32 = 10;
    if page.meta_issues.contains(&MetaIssue::MissingMeta) {
        score -= 2;
    }
    if page.meta_issues.contains(&MetaIssue::MissingTitle) {
        score -= 2;
    }
    if page.meta_issues.contains(&MetaIssue::TitleTooLong) || page.meta_issues.contains(&MetaIssue::TitleTooShort) {
        score -= 1;
    }
    if page.meta_issues.contains(&MetaIssue::DuplicateTitle) || page.meta_issues.contains(&MetaIssue::DuplicateMeta) {
        score -= 1;
    }
    if page.has_broken_links {
        score -= 2;
    }
    if !page.is_indexed {
        score -= 2;
    }
    score.max(0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn base_page() -> Page {
        Page {
            canonical_url: "https://example.com/a".to_string(),
            slug: "a".to_string(),
            title: Some("A fine example title of decent length".to_string()),
            meta_description: Some("A fine example meta description of decent length for sure".to_string()),
            page_type: PageType::Site,
            cms_page_id: None,
            has_form: true,
            form_ids: vec![],
            has_cta: false,
            cta_ids: vec![],
            published_at: None,
            last_updated_at: Some(Utc.with_ymd_and_hms(2026, 6, 13, 0, 0, 0).unwrap()),
            content_age_days: Some(45),
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
    fn s1_minor_decline_is_stable() {
        let page = base_page();
        let analytics = AnalyticsSnapshot {
            page_url: page.canonical_url.clone(),
            snapshot_date: NaiveDate::from_ymd_opt(2026, 7, 28).unwrap(),
            active_users: 110,
            sessions: 0,
            page_views: 0,
            bounce_rate: 0.0,
            avg_session_duration: 0.0,
            users_previous_period: 120,
            sessions_previous_period: 0,
            traffic_change_pct: AnalyticsSnapshot::compute_traffic_change_pct(110, 120),
        };
        let search = SearchSnapshot {
            page_url: page.canonical_url.clone(),
            snapshot_date: analytics.snapshot_date,
            total_clicks: 0,
            total_impressions: 0,
            avg_ctr: 0.0,
            avg_position: 8.0,
            previous_clicks: 0,
            previous_impressions: 0,
            previous_ctr: 0.0,
            previous_position: 0.0,
            position_change: 0.0,
        };
        let speed = SpeedScore {
            id: uuid::Uuid::new_v4(),
            page_url: page.canonical_url.clone(),
            test_date: analytics.snapshot_date,
            strategy: healthwatch_core::entities::SpeedStrategy::Mobile,
            performance_score: 95,
            accessibility_score: 100,
            seo_score: 100,
            best_practices_score: 100,
            lcp_ms: 0,
            fid_ms: 0,
            cls: 0.0,
            inp_ms: 0,
            opportunities: vec![],
            tested_at: Utc::now(),
        };
        let inputs = ScoringInputs {
            page: &page,
            analytics: Some(&analytics),
            search: Some(&search),
            speed: Some(&speed),
            now_utc_date: NaiveDate::from_ymd_opt(2026, 7, 28).unwrap(),
        };
        let breakdown = score(&inputs);
        assert!((analytics.traffic_change_pct - (-8.333333333333334)).abs() < 1e-9);
        assert_eq!(breakdown.traffic_trend, 15);
        assert_eq!(breakdown.seo_ranking, 20);
        assert_eq!(breakdown.page_speed, 20);
        assert_eq!(breakdown.content_freshness, 15);
        assert_eq!(breakdown.conversion_health, 5);
        assert_eq!(breakdown.technical_health, 10);
        assert_eq!(breakdown.total(), 85);
        assert!(!breakdown.is_flagged());
    }

    #[test]
    fn s2_severe_decline_flags_and_is_critical() {
        let mut page = base_page();
        page.last_updated_at = Some(Utc.with_ymd_and_hms(2025, 6, 24, 0, 0, 0).unwrap());
        page.content_age_days = Some(400);
        page.meta_issues = [MetaIssue::MissingMeta, MetaIssue::TitleTooLong].into_iter().collect();

        let analytics = AnalyticsSnapshot {
            page_url: page.canonical_url.clone(),
            snapshot_date: NaiveDate::from_ymd_opt(2026, 7, 28).unwrap(),
            active_users: 50,
            sessions: 0,
            page_views: 0,
            bounce_rate: 0.0,
            avg_session_duration: 0.0,
            users_previous_period: 120,
            sessions_previous_period: 0,
            traffic_change_pct: AnalyticsSnapshot::compute_traffic_change_pct(50, 120),
        };
        let search = SearchSnapshot {
            page_url: page.canonical_url.clone(),
            snapshot_date: analytics.snapshot_date,
            total_clicks: 0,
            total_impressions: 0,
            avg_ctr: 0.0,
            avg_position: 25.0,
            previous_clicks: 0,
            previous_impressions: 0,
            previous_ctr: 0.0,
            previous_position: 0.0,
            position_change: 0.0,
        };
        let speed = SpeedScore {
            id: uuid::Uuid::new_v4(),
            page_url: page.canonical_url.clone(),
            test_date: analytics.snapshot_date,
            strategy: healthwatch_core::entities::SpeedStrategy::Mobile,
            performance_score: 45,
            accessibility_score: 80,
            seo_score: 80,
            best_practices_score: 80,
            lcp_ms: 0,
            fid_ms: 0,
            cls: 0.0,
            inp_ms: 0,
            opportunities: vec![],
            tested_at: Utc::now(),
        };
        let inputs = ScoringInputs {
            page: &page,
            analytics: Some(&analytics),
            search: Some(&search),
            speed: Some(&speed),
            now_utc_date: NaiveDate::from_ymd_opt(2026, 7, 28).unwrap(),
        };
        let breakdown = score(&inputs);
        assert_eq!(breakdown.traffic_trend, 0);
        assert_eq!(breakdown.seo_ranking, 8);
        assert_eq!(breakdown.page_speed, 0);
        assert_eq!(breakdown.content_freshness, 0);
        assert_eq!(breakdown.conversion_health, 5);
        assert_eq!(breakdown.technical_health, 7);
        assert_eq!(breakdown.total(), 20);
        assert!(breakdown.is_flagged());
        assert!(breakdown.is_critical());
    }

    #[test]
    fn boundary_missing_data_defaults() {
        let page = base_page();
        let inputs = ScoringInputs {
            page: &page,
            analytics: None,
            search: None,
            speed: None,
            now_utc_date: NaiveDate::from_ymd_opt(2026, 7, 28).unwrap(),
        };
        let breakdown = score(&inputs);
        assert_eq!(breakdown.traffic_trend, 10);
        assert_eq!(breakdown.seo_ranking, 0);
        assert_eq!(breakdown.page_speed, 10);
    }

    #[test]
    fn content_freshness_is_strict_at_90_days() {
        let mut page = base_page();
        page.content_age_days = Some(90);
        assert_eq!(content_freshness(&page, NaiveDate::from_ymd_opt(2026, 7, 28).unwrap()), 10);
    }
}
