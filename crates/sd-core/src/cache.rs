use crate::types::{BuildId, BuildReviewStatus, BuildStatus};
use std::cell::RefCell;
use std::collections::HashMap;

/// Memoized statuses for one [`crate::RequestContext`]. Never shared.
#[derive(Debug, Default)]
pub struct StatusCache {
    statuses: RefCell<HashMap<BuildId, BuildStatus>>,
    review_statuses: RefCell<HashMap<BuildId, Option<BuildReviewStatus>>>,
}

impl StatusCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self, id: &BuildId) -> Option<BuildStatus> {
        self.statuses.borrow().get(id).copied()
    }

    pub fn store_status(&self, id: BuildId, status: BuildStatus) {
        self.statuses.borrow_mut().insert(id, status);
    }

    /// Outer `None` when not cached; inner `None` when the build has no
    /// review status.
    pub fn review_status(&self, id: &BuildId) -> Option<Option<BuildReviewStatus>> {
        self.review_statuses.borrow().get(id).copied()
    }

    pub fn store_review_status(&self, id: BuildId, status: Option<BuildReviewStatus>) {
        self.review_statuses.borrow_mut().insert(id, status);
    }

    pub fn invalidate(&self, id: &BuildId) {
        self.statuses.borrow_mut().remove(id);
        self.review_statuses.borrow_mut().remove(id);
    }
}
