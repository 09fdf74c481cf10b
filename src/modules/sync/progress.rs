// Copyright © 2025 mailsift.com
// Licensed under MailSift License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use ahash::AHashSet;

/// Tracks out-of-order completion within one batch.
///
/// The watermark is the highest UID such that it and every lower UID of the
/// batch are resolved. Deferred UIDs are never resolved, so the marker stays
/// below them and the next listing offers them again.
#[derive(Debug)]
pub struct BatchProgress {
    uids: Vec<u32>,
    resolved: AHashSet<u32>,
    next: usize,
}

impl BatchProgress {
    pub fn new(uids: &[u32]) -> Self {
        let mut uids = uids.to_vec();
        uids.sort_unstable();
        uids.dedup();
        Self {
            uids,
            resolved: AHashSet::new(),
            next: 0,
        }
    }

    /// Marks `uid` resolved and returns the watermark.
    pub fn resolve(&mut self, uid: u32) -> Option<u32> {
        self.resolved.insert(uid);
        while self
            .uids
            .get(self.next)
            .is_some_and(|uid| self.resolved.contains(uid))
        {
            self.next += 1;
        }
        self.watermark()
    }

    pub fn watermark(&self) -> Option<u32> {
        self.next.checked_sub(1).map(|i| self.uids[i])
    }

    pub fn is_complete(&self) -> bool {
        self.next == self.uids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watermark_waits_for_gaps() {
        let mut progress = BatchProgress::new(&[4, 7, 9, 12]);
        assert_eq!(progress.watermark(), None);
        assert_eq!(progress.resolve(9), None);
        assert_eq!(progress.resolve(4), Some(4));
        assert_eq!(progress.resolve(7), Some(9));
        assert!(!progress.is_complete());
        assert_eq!(progress.resolve(12), Some(12));
        assert!(progress.is_complete());
    }

    #[test]
    fn test_unresolved_uid_holds_watermark() {
        let mut progress = BatchProgress::new(&[1, 2, 3]);
        progress.resolve(1);
        progress.resolve(3);
        assert_eq!(progress.watermark(), Some(1));
    }
}
