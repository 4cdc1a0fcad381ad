//! Funnel aggregation over a (possibly partially enriched) job set.
//!
//! Every function here is pure: the same jobs and context always produce the
//! same report, so snapshots can be recomputed from scratch at any point.

use std::collections::{BTreeMap, HashSet};

use salescycle_shared::{
    ConversionRate, EnrichedJob, FunnelRow, MilestoneCategory, RepConversions, RepFunnel,
    RepPerformance, Stage,
};

use crate::period::ReportingPeriod;
use crate::stages::{STAGES, stage_order};

/// Stage-order pairs reported as conversion rates, with their short labels.
pub const CONVERSION_PAIRS: [(&str, &str, u8, u8); 5] = [
    ("IVS", "Adjuster", 1, 2),
    ("Adjuster", "Bought", 2, 3),
    ("Bought", "Design Completed", 3, 5),
    ("Design Completed", "Approved", 5, 6),
    ("Lead", "Approved", 1, 6),
];

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Representatives excluded from the primary and per-rep views.
#[derive(Debug, Clone, Default)]
pub struct RepDenylist {
    names: HashSet<String>,
}

impl RepDenylist {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = names
            .into_iter()
            .map(|n| normalize(n.as_ref()))
            .filter(|n| !n.is_empty())
            .collect();
        Self { names }
    }

    pub fn is_inactive(&self, rep: &str) -> bool {
        self.names.contains(&normalize(rep))
    }

    /// Non-empty and not denylisted.
    pub fn is_active_rep(&self, rep: &str) -> bool {
        !rep.trim().is_empty() && !self.is_inactive(rep)
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Inputs that parameterize aggregation besides the jobs themselves.
#[derive(Debug, Clone)]
pub struct AggregationContext {
    pub period: ReportingPeriod,
    pub denylist: RepDenylist,
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Everything derived from one job set.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FunnelReport {
    pub funnel: Vec<FunnelRow>,
    pub conversions: Vec<ConversionRate>,
    pub rep_performance: Vec<RepPerformance>,
    pub rep_funnel: Vec<RepFunnel>,
    pub rep_conversions: Vec<RepConversions>,
    pub sales_ytd: f64,
    pub built_ytd: f64,
}

/// Recompute every aggregate from `jobs`.
///
/// The primary view (funnel, conversions, rep performance) drops only jobs
/// owned by a denylisted rep; unowned jobs stay. The per-rep views use the
/// full set and skip unowned jobs. YTD totals use the full set.
pub fn aggregate(jobs: &[EnrichedJob], ctx: &AggregationContext) -> FunnelReport {
    let primary: Vec<&EnrichedJob> = jobs
        .iter()
        .filter(|j| !ctx.denylist.is_inactive(&j.sales_owner))
        .collect();

    FunnelReport {
        funnel: build_funnel(&primary),
        conversions: build_conversions(&primary, &ctx.period),
        rep_performance: build_rep_performance(&primary, &ctx.period),
        rep_funnel: build_rep_funnel(jobs, &ctx.denylist),
        rep_conversions: build_rep_conversions(jobs, &ctx.denylist),
        sales_ytd: sales_ytd(jobs, &ctx.period),
        built_ytd: built_ytd(jobs),
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// One row per stage definition, in funnel order.
pub fn build_funnel(jobs: &[&EnrichedJob]) -> Vec<FunnelRow> {
    STAGES
        .iter()
        .map(|def| {
            let (count, value) = jobs
                .iter()
                .filter(|j| j.stage == def.stage)
                .fold((0usize, 0.0f64), |(n, v), j| (n + 1, v + j.contract_amount));
            FunnelRow {
                stage: def.stage,
                milestone: def.milestone,
                count,
                value,
                order: def.order,
            }
        })
        .collect()
}

/// Conversion rates over classified jobs created in the reporting month.
/// Empty when there are none.
pub fn build_conversions(jobs: &[&EnrichedJob], period: &ReportingPeriod) -> Vec<ConversionRate> {
    let classified: Vec<&EnrichedJob> = jobs
        .iter()
        .copied()
        .filter(|j| j.stage.is_classified() && period.is_current_month(&j.created_date))
        .collect();
    conversions_for(&classified)
}

/// Month-to-date figures per owner, sorted by rep name.
pub fn build_rep_performance(
    jobs: &[&EnrichedJob],
    period: &ReportingPeriod,
) -> Vec<RepPerformance> {
    let mtd = jobs
        .iter()
        .copied()
        .filter(|j| !j.sales_owner.is_empty() && period.is_current_month(&j.created_date));

    group_by_owner(mtd)
        .into_iter()
        .map(|(rep, rep_jobs)| {
            let leads = rep_jobs.len();
            let classified: Vec<&EnrichedJob> = rep_jobs
                .iter()
                .copied()
                .filter(|j| j.stage.is_classified())
                .collect();
            let (approved_count, approved_value) = rep_jobs
                .iter()
                .filter(|j| j.stage == Stage::Approved)
                .fold((0usize, 0.0f64), |(n, v), j| (n + 1, v + j.contract_amount));

            RepPerformance {
                rep,
                leads,
                ivs_rate: rate(reach(&classified, 1), leads),
                adjuster_rate: rate(reach(&classified, 2), leads),
                close_rate: rate(reach(&classified, 6), leads),
                approved_count,
                approved_value,
            }
        })
        .collect()
}

/// Full funnel for each active representative, sorted by rep name.
pub fn build_rep_funnel(jobs: &[EnrichedJob], denylist: &RepDenylist) -> Vec<RepFunnel> {
    group_by_owner(jobs.iter().filter(|j| denylist.is_active_rep(&j.sales_owner)))
        .into_iter()
        .map(|(rep, rep_jobs)| RepFunnel {
            rep,
            funnel: build_funnel(&rep_jobs),
        })
        .collect()
}

/// All-time conversions for each active representative with classified jobs.
pub fn build_rep_conversions(jobs: &[EnrichedJob], denylist: &RepDenylist) -> Vec<RepConversions> {
    group_by_owner(jobs.iter().filter(|j| denylist.is_active_rep(&j.sales_owner)))
        .into_iter()
        .filter_map(|(rep, rep_jobs)| {
            let classified: Vec<&EnrichedJob> = rep_jobs
                .into_iter()
                .filter(|j| j.stage.is_classified())
                .collect();
            let conversions = conversions_for(&classified);
            (!conversions.is_empty()).then_some(RepConversions { rep, conversions })
        })
        .collect()
}

/// Contract value of approved jobs whose milestone date is in the reporting year.
pub fn sales_ytd(jobs: &[EnrichedJob], period: &ReportingPeriod) -> f64 {
    jobs.iter()
        .filter(|j| {
            j.milestone_category == MilestoneCategory::Approved
                && period.is_current_year(&j.milestone_date)
        })
        .map(|j| j.contract_amount)
        .sum()
}

/// Current-year invoiced total across all jobs.
pub fn built_ytd(jobs: &[EnrichedJob]) -> f64 {
    jobs.iter()
        .filter(|j| j.built_amount > 0.0)
        .map(|j| j.built_amount)
        .sum()
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Number of jobs at or past funnel position `order`.
pub fn reach(jobs: &[&EnrichedJob], order: u8) -> usize {
    jobs.iter()
        .filter(|j| stage_order(j.stage).is_some_and(|o| o >= order))
        .count()
}

/// `round(100 * part / whole)`, 0 when `whole` is 0.
pub fn rate(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    (100.0 * part as f64 / whole as f64).round() as u32
}

fn conversions_for(classified: &[&EnrichedJob]) -> Vec<ConversionRate> {
    if classified.is_empty() {
        return Vec::new();
    }
    CONVERSION_PAIRS
        .iter()
        .map(|&(from, to, from_order, to_order)| ConversionRate {
            from: from.to_string(),
            to: to.to_string(),
            rate: rate(reach(classified, to_order), reach(classified, from_order)),
        })
        .collect()
}

fn group_by_owner<'a, I>(jobs: I) -> BTreeMap<String, Vec<&'a EnrichedJob>>
where
    I: Iterator<Item = &'a EnrichedJob>,
{
    let mut groups: BTreeMap<String, Vec<&'a EnrichedJob>> = BTreeMap::new();
    for job in jobs {
        groups.entry(job.sales_owner.clone()).or_default().push(job);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::seed_job;
    use chrono::NaiveDate;
    use salescycle_shared::RawJobRecord;

    const THIS_MONTH: &str = "2026-10-03T14:00:00";
    const LAST_YEAR: &str = "2025-10-03T14:00:00";

    fn ctx(inactive: &[&str]) -> AggregationContext {
        AggregationContext {
            period: ReportingPeriod::containing(NaiveDate::from_ymd_opt(2026, 10, 15).unwrap()),
            denylist: RepDenylist::new(inactive),
        }
    }

    fn job(id: &str, milestone: &str, stage: Stage, owner: &str, created: &str) -> EnrichedJob {
        let mut job = seed_job(RawJobRecord {
            id: id.into(),
            current_milestone: milestone.into(),
            created_date: created.into(),
            ..Default::default()
        });
        job.stage = stage;
        job.sales_owner = owner.into();
        job
    }

    fn sample() -> Vec<EnrichedJob> {
        let mut approved = job("a1", "Approved", Stage::Approved, "Dana Smith", THIS_MONTH);
        approved.contract_amount = 12000.0;
        approved.milestone_date = "2026-03-01".into();

        let mut old_approved = job("a2", "Approved", Stage::Approved, "Marcus Lee", LAST_YEAR);
        old_approved.contract_amount = 5000.0;
        old_approved.milestone_date = "2025-03-01".into();
        old_approved.built_amount = 750.0;

        vec![
            job("l1", "Lead", Stage::InitialVisitScheduled, "Dana Smith", THIS_MONTH),
            job("l2", "Lead", Stage::Unclassified, "Dana Smith", THIS_MONTH),
            job("p1", "Prospect", Stage::BoughtJob, "Marcus Lee", THIS_MONTH),
            job("p2", "Prospect", Stage::CompletedDesignMeeting, "", THIS_MONTH),
            job("p3", "Prospect", Stage::AdjusterMeetingScheduled, "Old Rep", THIS_MONTH),
            approved,
            old_approved,
        ]
    }

    #[test]
    fn funnel_counts_and_values() {
        let report = aggregate(&sample(), &ctx(&[]));

        assert_eq!(report.funnel.len(), 6);
        let orders: Vec<u8> = report.funnel.iter().map(|r| r.order).collect();
        assert_eq!(orders, vec![1, 2, 3, 4, 5, 6]);

        let approved = &report.funnel[5];
        assert_eq!(approved.stage, Stage::Approved);
        assert_eq!(approved.count, 2);
        assert_eq!(approved.value, 17000.0);
        assert_eq!(report.funnel[1].count, 1);
    }

    #[test]
    fn denylisted_owner_leaves_primary_view_but_unowned_stays() {
        let report = aggregate(&sample(), &ctx(&["  old rep "]));

        // p3 is gone; p2 (unowned) is still counted.
        assert_eq!(report.funnel[1].count, 0);
        assert_eq!(report.funnel[4].count, 1);
        assert!(report.rep_funnel.iter().all(|r| r.rep != "Old Rep"));
    }

    #[test]
    fn conversions_use_current_month_classified_jobs() {
        let report = aggregate(&sample(), &ctx(&[]));
        let rates: Vec<(String, String, u32)> = report
            .conversions
            .iter()
            .map(|c| (c.from.clone(), c.to.clone(), c.rate))
            .collect();

        // MTD classified: orders 1, 3, 5, 2, 6 → reach(1)=5 reach(2)=4 reach(3)=3 reach(5)=2 reach(6)=1
        assert_eq!(
            rates,
            vec![
                ("IVS".into(), "Adjuster".into(), 80),
                ("Adjuster".into(), "Bought".into(), 75),
                ("Bought".into(), "Design Completed".into(), 67),
                ("Design Completed".into(), "Approved".into(), 50),
                ("Lead".into(), "Approved".into(), 20),
            ]
        );
    }

    #[test]
    fn conversions_empty_without_mtd_classified_jobs() {
        let jobs = vec![
            job("l1", "Lead", Stage::Unclassified, "", THIS_MONTH),
            job("l2", "Lead", Stage::InitialVisitScheduled, "", LAST_YEAR),
            job("l3", "Lead", Stage::InitialVisitScheduled, "", ""),
        ];
        assert!(aggregate(&jobs, &ctx(&[])).conversions.is_empty());
    }

    #[test]
    fn reach_never_grows_along_a_pair() {
        let jobs = sample();
        let refs: Vec<&EnrichedJob> = jobs.iter().collect();
        for (_, _, from, to) in CONVERSION_PAIRS {
            assert!(reach(&refs, to) <= reach(&refs, from));
        }
    }

    #[test]
    fn zero_denominator_rate_is_zero() {
        assert_eq!(rate(0, 0), 0);
        assert_eq!(rate(3, 0), 0);
        assert_eq!(rate(2, 3), 67);
        assert_eq!(rate(1, 2), 50);
    }

    #[test]
    fn rep_performance_is_month_to_date_and_sorted() {
        let report = aggregate(&sample(), &ctx(&[]));
        let reps: Vec<&str> = report.rep_performance.iter().map(|r| r.rep.as_str()).collect();
        assert_eq!(reps, vec!["Dana Smith", "Marcus Lee", "Old Rep"]);

        let dana = &report.rep_performance[0];
        assert_eq!(dana.leads, 3);
        assert_eq!(dana.ivs_rate, 67);
        assert_eq!(dana.adjuster_rate, 33);
        assert_eq!(dana.close_rate, 33);
        assert_eq!(dana.approved_count, 1);
        assert_eq!(dana.approved_value, 12000.0);

        // Marcus's approved job is from last year, so only p1 counts.
        let marcus = &report.rep_performance[1];
        assert_eq!(marcus.leads, 1);
        assert_eq!(marcus.approved_count, 0);
    }

    #[test]
    fn rep_views_cover_all_time_and_skip_unowned() {
        let report = aggregate(&sample(), &ctx(&[]));

        let reps: Vec<&str> = report.rep_funnel.iter().map(|r| r.rep.as_str()).collect();
        assert_eq!(reps, vec!["Dana Smith", "Marcus Lee", "Old Rep"]);

        let marcus = &report.rep_funnel[1];
        assert_eq!(marcus.funnel[5].count, 1);
        assert_eq!(marcus.funnel[2].count, 1);

        let marcus_conv = report
            .rep_conversions
            .iter()
            .find(|r| r.rep == "Marcus Lee")
            .unwrap();
        // Bought + Approved: reach(1)=2 reach(6)=1
        assert_eq!(marcus_conv.conversions[4].rate, 50);
    }

    #[test]
    fn rep_without_classified_jobs_has_no_conversions() {
        let jobs = vec![job("l1", "Lead", Stage::Unclassified, "Dana Smith", THIS_MONTH)];
        let report = aggregate(&jobs, &ctx(&[]));
        assert_eq!(report.rep_funnel.len(), 1);
        assert!(report.rep_conversions.is_empty());
    }

    #[test]
    fn ytd_totals() {
        let report = aggregate(&sample(), &ctx(&[]));
        assert_eq!(report.sales_ytd, 12000.0);
        assert_eq!(report.built_ytd, 750.0);
    }

    #[test]
    fn ytd_ignores_denylist() {
        let report = aggregate(&sample(), &ctx(&["Dana Smith"]));
        assert_eq!(report.sales_ytd, 12000.0);
        assert_eq!(report.funnel[5].count, 1);
    }

    #[test]
    fn aggregation_is_idempotent() {
        let jobs = sample();
        let ctx = ctx(&["old rep"]);
        assert_eq!(aggregate(&jobs, &ctx), aggregate(&jobs, &ctx));
    }

    #[test]
    fn unclassified_only_set_yields_zero_rows() {
        let jobs: Vec<EnrichedJob> = (0..3)
            .map(|i| job(&format!("l{i}"), "Lead", Stage::Unclassified, "", ""))
            .collect();
        let report = aggregate(&jobs, &ctx(&[]));
        assert!(report.funnel.iter().all(|r| r.count == 0));
        assert!(report.conversions.is_empty());
        assert!(report.rep_performance.is_empty());
    }
}
