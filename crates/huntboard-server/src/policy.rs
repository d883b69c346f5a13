//! Access control policy.
//!
//! Pure predicates evaluated per read request. Visibility of submission
//! content and scoring data is gated on ownership, bounty authorship,
//! administrator rights, or bounty completion (completed bounties publish
//! all submission content).
//!
//! Hidden submissions are redacted at the serialization boundary, never
//! omitted: the record keeps its identity, score and vote count while the
//! descriptive fields are replaced by [`HIDDEN_CONTENT_PLACEHOLDER`].

use uuid::Uuid;

use crate::auth::Requester;
use crate::models::{Bounty, BountyStatus, ScoringJob, Submission};

/// Placeholder substituted for hidden submission content.
pub const HIDDEN_CONTENT_PLACEHOLDER: &str = "[hidden for privacy]";

/// Check if the requester may see a submission's content.
///
/// True iff the requester owns the submission, created its bounty, is an
/// administrator, or the bounty is completed.
pub fn can_view_submission_content(
    submitter_id: Uuid,
    bounty_creator_id: Uuid,
    bounty_status: BountyStatus,
    requester: Option<&Requester>,
) -> bool {
    if bounty_status == BountyStatus::Completed {
        return true;
    }
    match requester {
        Some(r) => r.is_admin || r.id == submitter_id || r.id == bounty_creator_id,
        None => false,
    }
}

/// Check if the requester may see a scoring job and its context.
///
/// Unlike submission content, scoring data never becomes public on bounty
/// completion; it stays with the parties involved.
pub fn can_view_scoring_job(
    submitter_id: Uuid,
    bounty_creator_id: Uuid,
    requester: Option<&Requester>,
) -> bool {
    match requester {
        Some(r) => r.is_admin || r.id == submitter_id || r.id == bounty_creator_id,
        None => false,
    }
}

/// Check if the requester may download a file.
///
/// Same disjunction as submission content, evaluated against the file's
/// owning submission and bounty.
pub fn can_access_file(
    submitter_id: Uuid,
    bounty_creator_id: Uuid,
    bounty_status: BountyStatus,
    requester: Option<&Requester>,
) -> bool {
    can_view_submission_content(submitter_id, bounty_creator_id, bounty_status, requester)
}

/// Convenience wrapper taking loaded entities.
pub fn submission_content_visible(
    submission: &Submission,
    bounty: &Bounty,
    requester: Option<&Requester>,
) -> bool {
    can_view_submission_content(
        submission.submitter_id,
        bounty.creator_id,
        bounty.status,
        requester,
    )
}

/// Convenience wrapper for a job with its submission/bounty context loaded.
pub fn scoring_job_visible(
    _job: &ScoringJob,
    submitter_id: Uuid,
    bounty_creator_id: Uuid,
    requester: Option<&Requester>,
) -> bool {
    can_view_scoring_job(submitter_id, bounty_creator_id, requester)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The content predicate over every combination of the four grants:
    /// owner, bounty creator, admin, completed bounty. Visible iff any
    /// grant holds.
    #[test]
    fn test_content_visibility_truth_table() {
        for is_owner in [false, true] {
            for is_creator in [false, true] {
                for is_admin in [false, true] {
                    for is_completed in [false, true] {
                        let submitter_id = Uuid::new_v4();
                        // Owner-and-creator means the ids coincide.
                        let creator_id = if is_owner && is_creator {
                            submitter_id
                        } else {
                            Uuid::new_v4()
                        };
                        let requester_id = if is_owner {
                            submitter_id
                        } else if is_creator {
                            creator_id
                        } else {
                            Uuid::new_v4()
                        };
                        let requester = Requester::new(requester_id, is_admin);
                        let status = if is_completed {
                            BountyStatus::Completed
                        } else {
                            BountyStatus::Active
                        };

                        let expected = is_owner || is_creator || is_admin || is_completed;
                        let actual = can_view_submission_content(
                            submitter_id,
                            creator_id,
                            status,
                            Some(&requester),
                        );
                        assert_eq!(
                            actual, expected,
                            "owner={} creator={} admin={} completed={}",
                            is_owner, is_creator, is_admin, is_completed
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_anonymous_sees_content_only_after_completion() {
        let submitter_id = Uuid::new_v4();
        let creator_id = Uuid::new_v4();

        assert!(!can_view_submission_content(
            submitter_id,
            creator_id,
            BountyStatus::Active,
            None
        ));
        assert!(can_view_submission_content(
            submitter_id,
            creator_id,
            BountyStatus::Completed,
            None
        ));
    }

    #[test]
    fn test_scoring_job_stays_private_after_completion() {
        let submitter_id = Uuid::new_v4();
        let creator_id = Uuid::new_v4();
        let stranger = Requester::new(Uuid::new_v4(), false);

        // Completion publishes content, not scoring data.
        assert!(!can_view_scoring_job(submitter_id, creator_id, Some(&stranger)));
        assert!(!can_view_scoring_job(submitter_id, creator_id, None));

        let owner = Requester::new(submitter_id, false);
        let creator = Requester::new(creator_id, false);
        let admin = Requester::new(Uuid::new_v4(), true);
        assert!(can_view_scoring_job(submitter_id, creator_id, Some(&owner)));
        assert!(can_view_scoring_job(submitter_id, creator_id, Some(&creator)));
        assert!(can_view_scoring_job(submitter_id, creator_id, Some(&admin)));
    }

    #[test]
    fn test_file_access_follows_content_access() {
        let submitter_id = Uuid::new_v4();
        let creator_id = Uuid::new_v4();
        let owner = Requester::new(submitter_id, false);
        let stranger = Requester::new(Uuid::new_v4(), false);

        assert!(can_access_file(
            submitter_id,
            creator_id,
            BountyStatus::Active,
            Some(&owner)
        ));
        assert!(!can_access_file(
            submitter_id,
            creator_id,
            BountyStatus::Active,
            Some(&stranger)
        ));
        assert!(can_access_file(
            submitter_id,
            creator_id,
            BountyStatus::Completed,
            Some(&stranger)
        ));
    }
}
