use serde::{Deserialize, Serialize};

/// Position in the event list of a time window, advanced round-robin on
/// every fetch. A list of a different length restarts at the first event.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EventCursor {
    pub current: Option<usize>,
    pub count: usize,
}

impl EventCursor {
    /// Advance over a list of `count` events and return the index to load.
    pub fn next(&mut self, count: usize) -> Option<usize> {
        if count == 0 {
            *self = EventCursor::default();
            return None;
        }
        let index = match self.current {
            Some(current) if self.count == count => (current + 1) % count,
            _ => 0,
        };
        self.current = Some(index);
        self.count = count;
        Some(index)
    }

    pub fn reset(&mut self) {
        *self = EventCursor::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wraps_around() {
        let mut cursor = EventCursor::default();
        let visited: Vec<_> = (0..4).map(|_| cursor.next(3)).collect();
        assert_eq!(visited, vec![Some(0), Some(1), Some(2), Some(0)]);
    }

    #[test]
    fn test_changed_list_restarts() {
        let mut cursor = EventCursor::default();
        cursor.next(5);
        cursor.next(5);
        assert_eq!(cursor.current, Some(1));
        assert_eq!(cursor.next(2), Some(0));
        assert_eq!(cursor.count, 2);
    }

    #[test]
    fn test_empty_list() {
        let mut cursor = EventCursor {
            current: Some(3),
            count: 4,
        };
        assert_eq!(cursor.next(0), None);
        assert_eq!(cursor, EventCursor::default());
        cursor.next(1);
        cursor.reset();
        assert_eq!(cursor.current, None);
    }
}
