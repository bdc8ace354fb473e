/// Follows the conversation: asks for a scroll to the newest exchange only
/// when the log has grown since the last observation.
#[derive(Debug, Default)]
pub struct ScrollFollower {
    seen: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollCommand {
    /// Reveal the entry at this index, the newest one.
    RevealLatest(usize),
}

impl ScrollFollower {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call after the view has been rebuilt with `log_len` exchanges.
    pub fn observe(&mut self, log_len: usize) -> Option<ScrollCommand> {
        if log_len > self.seen {
            self.seen = log_len;
            Some(ScrollCommand::RevealLatest(log_len - 1))
        } else {
            None
        }
    }

    pub fn seen(&self) -> usize {
        self.seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_scroll_without_growth() {
        let mut follower = ScrollFollower::new();
        assert_eq!(follower.observe(0), None);
        assert_eq!(follower.observe(0), None);
    }

    #[test]
    fn test_scroll_once_per_growth() {
        let mut follower = ScrollFollower::new();
        assert_eq!(follower.observe(1), Some(ScrollCommand::RevealLatest(0)));
        assert_eq!(follower.observe(1), None);
        assert_eq!(follower.observe(3), Some(ScrollCommand::RevealLatest(2)));
        assert_eq!(follower.seen(), 3);
    }
}
