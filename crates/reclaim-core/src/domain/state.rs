//! State - バケット単位の状態遷移
//!
//! ```text
//! Discovered -> Classified{Eligible|Skipped}
//! Eligible -> ObjectsDeleting -> ObjectsDeleted -> BucketDeleting -> BucketDeleted
//!                             \-> ObjectsDeleteFailed
//!                                                 BucketDeleting -> BucketDeleteFailed
//! ```

use std::fmt;

/// BucketState は 1 バケットの処理段階
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketState {
    Discovered,
    Eligible,
    Skipped,
    ObjectsDeleting,
    ObjectsDeleted,
    ObjectsDeleteFailed,
    BucketDeleting,
    BucketDeleted,
    BucketDeleteFailed,
}

impl BucketState {
    /// これ以上遷移しない状態か
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BucketState::Skipped
                | BucketState::ObjectsDeleteFailed
                | BucketState::BucketDeleted
                | BucketState::BucketDeleteFailed
        )
    }

    /// 許可された遷移か
    pub fn can_transition_to(self, next: BucketState) -> bool {
        use BucketState::*;
        matches!(
            (self, next),
            (Discovered, Eligible)
                | (Discovered, Skipped)
                | (Eligible, ObjectsDeleting)
                | (ObjectsDeleting, ObjectsDeleted)
                | (ObjectsDeleting, ObjectsDeleteFailed)
                | (ObjectsDeleted, BucketDeleting)
                | (BucketDeleting, BucketDeleted)
                | (BucketDeleting, BucketDeleteFailed)
        )
    }
}

impl fmt::Display for BucketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BucketState::Discovered => "discovered",
            BucketState::Eligible => "eligible",
            BucketState::Skipped => "skipped",
            BucketState::ObjectsDeleting => "objects_deleting",
            BucketState::ObjectsDeleted => "objects_deleted",
            BucketState::ObjectsDeleteFailed => "objects_delete_failed",
            BucketState::BucketDeleting => "bucket_deleting",
            BucketState::BucketDeleted => "bucket_deleted",
            BucketState::BucketDeleteFailed => "bucket_delete_failed",
        };
        f.write_str(s)
    }
}
