//! Status rules applied when the scanner finds interview evidence.

use crate::application::ApplicationStatus;

/// Decide the status after interview evidence was found for a record.
///
/// Only `Applied` is promoted. Every other status was either reached by
/// promotion already or recorded by hand, and stale evidence must not
/// overwrite it. Nothing here ever lowers a status.
pub fn promote_on_interview_evidence(
  current: ApplicationStatus,
) -> ApplicationStatus {
  match current {
    ApplicationStatus::Applied => ApplicationStatus::Interviewed,
    other => other,
  }
}

/// The promotion target, if any, for a record given the scan's evidence flag.
pub fn promotion_for(
  current: ApplicationStatus,
  has_interview_evidence: bool,
) -> Option<ApplicationStatus> {
  if !has_interview_evidence {
    return None;
  }
  let next = promote_on_interview_evidence(current);
  (next != current).then_some(next)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn applied_is_promoted() {
    assert_eq!(
      promote_on_interview_evidence(ApplicationStatus::Applied),
      ApplicationStatus::Interviewed
    );
  }

  #[test]
  fn manual_outcomes_are_untouched() {
    for status in [
      ApplicationStatus::Interviewed,
      ApplicationStatus::Rejected,
      ApplicationStatus::Offer,
      ApplicationStatus::Ghosted,
    ] {
      assert_eq!(promote_on_interview_evidence(status), status);
    }
  }

  #[test]
  fn promotion_happens_once() {
    let first = promotion_for(ApplicationStatus::Applied, true);
    assert_eq!(first, Some(ApplicationStatus::Interviewed));
    assert_eq!(promotion_for(ApplicationStatus::Interviewed, true), None);
  }

  #[test]
  fn no_evidence_no_promotion() {
    for status in ApplicationStatus::ALL {
      assert_eq!(promotion_for(status, false), None);
    }
  }
}
