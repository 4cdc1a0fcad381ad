//! Funnel stage definitions and the stage classifier.

use salescycle_shared::{MilestoneCategory, Stage};

/// One position in the sales funnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageDefinition {
    pub stage: Stage,
    pub milestone: MilestoneCategory,
    /// Status a job must carry to sit at this stage; `None` matches any status.
    pub status_match: Option<&'static str>,
    /// 1-based funnel position.
    pub order: u8,
}

/// The funnel, in order. Orders are strictly increasing and only `Approved`
/// is a wildcard.
pub const STAGES: [StageDefinition; 6] = [
    StageDefinition {
        stage: Stage::InitialVisitScheduled,
        milestone: MilestoneCategory::Lead,
        status_match: Some("Initial Visit Scheduled"),
        order: 1,
    },
    StageDefinition {
        stage: Stage::AdjusterMeetingScheduled,
        milestone: MilestoneCategory::Prospect,
        status_match: Some("Adjuster Meeting Scheduled"),
        order: 2,
    },
    StageDefinition {
        stage: Stage::BoughtJob,
        milestone: MilestoneCategory::Prospect,
        status_match: Some("Bought Job"),
        order: 3,
    },
    StageDefinition {
        stage: Stage::ScheduledDesignMeeting,
        milestone: MilestoneCategory::Prospect,
        status_match: Some("Scheduled Design Meeting"),
        order: 4,
    },
    StageDefinition {
        stage: Stage::CompletedDesignMeeting,
        milestone: MilestoneCategory::Prospect,
        status_match: Some("Completed Design Meeting"),
        order: 5,
    },
    StageDefinition {
        stage: Stage::Approved,
        milestone: MilestoneCategory::Approved,
        status_match: None,
        order: 6,
    },
];

/// Map a milestone category and status name to a funnel stage.
///
/// Approved jobs are always `Approved`. Otherwise the first definition whose
/// milestone matches and whose status equals `status_name` (ignoring ASCII
/// case) wins; anything else is `Unclassified`.
pub fn classify(milestone: MilestoneCategory, status_name: &str) -> Stage {
    if milestone == MilestoneCategory::Approved {
        return Stage::Approved;
    }

    STAGES
        .iter()
        .filter(|def| def.milestone == milestone)
        .find(|def| {
            def.status_match
                .is_some_and(|required| required.eq_ignore_ascii_case(status_name))
        })
        .map(|def| def.stage)
        .unwrap_or(Stage::Unclassified)
}

/// Funnel order of `stage`, or `None` for `Unclassified`.
pub fn stage_order(stage: Stage) -> Option<u8> {
    definition(stage).map(|def| def.order)
}

pub fn definition(stage: Stage) -> Option<&'static StageDefinition> {
    STAGES.iter().find(|def| def.stage == stage)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approved_ignores_status() {
        for status in ["", "Bogus", "Initial Visit Scheduled", "bought job"] {
            assert_eq!(classify(MilestoneCategory::Approved, status), Stage::Approved);
        }
    }

    #[test]
    fn lead_status_matches_case_insensitively() {
        assert_eq!(
            classify(MilestoneCategory::Lead, "Initial Visit Scheduled"),
            Stage::InitialVisitScheduled
        );
        assert_eq!(
            classify(MilestoneCategory::Lead, "initial VISIT scheduled"),
            Stage::InitialVisitScheduled
        );
        assert_eq!(classify(MilestoneCategory::Lead, "Bogus"), Stage::Unclassified);
        assert_eq!(classify(MilestoneCategory::Lead, ""), Stage::Unclassified);
    }

    #[test]
    fn status_must_belong_to_the_milestone() {
        // A prospect status on a lead does not classify.
        assert_eq!(classify(MilestoneCategory::Lead, "Bought Job"), Stage::Unclassified);
        assert_eq!(
            classify(MilestoneCategory::Prospect, "Bought Job"),
            Stage::BoughtJob
        );
        assert_eq!(
            classify(MilestoneCategory::Prospect, "completed design meeting"),
            Stage::CompletedDesignMeeting
        );
    }

    #[test]
    fn post_approved_milestones_stay_unclassified() {
        for milestone in [
            MilestoneCategory::Completed,
            MilestoneCategory::Invoiced,
            MilestoneCategory::Closed,
            MilestoneCategory::Unknown,
        ] {
            assert_eq!(classify(milestone, "Bought Job"), Stage::Unclassified);
        }
    }

    #[test]
    fn stage_table_is_well_formed() {
        assert!(STAGES.windows(2).all(|w| w[0].order < w[1].order));
        assert_eq!(STAGES.first().map(|d| d.order), Some(1));

        let wildcards: Vec<_> = STAGES.iter().filter(|d| d.status_match.is_none()).collect();
        assert_eq!(wildcards.len(), 1);
        assert_eq!(wildcards[0].stage, Stage::Approved);
        assert_eq!(wildcards[0].order, 6);
    }

    #[test]
    fn orders_lookup() {
        assert_eq!(stage_order(Stage::InitialVisitScheduled), Some(1));
        assert_eq!(stage_order(Stage::Approved), Some(6));
        assert_eq!(stage_order(Stage::Unclassified), None);
    }
}
