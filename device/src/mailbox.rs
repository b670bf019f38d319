/// Single-slot holder for the most recent value.
///
/// Publishing while an earlier value is still unread overwrites it: the
/// mailbox guarantees only that the newest value is observable, never that
/// every published value is delivered. Each published value can be taken at
/// most once.
#[derive(Debug)]
pub struct Mailbox<T> {
    latest: Option<T>,
    fresh: bool,
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self {
            latest: None,
            fresh: false,
        }
    }
}

impl<T: Clone> Mailbox<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` and raises the new-data flag.
    ///
    /// Returns the previous value if it was overwritten before being taken.
    pub fn publish(&mut self, value: T) -> Option<T> {
        let previous = self.latest.replace(value);
        let overwritten = if self.fresh { previous } else { None };
        self.fresh = true;
        overwritten
    }

    /// Returns the value published since the last take, clearing the flag.
    pub fn take(&mut self) -> Option<T> {
        if !self.fresh {
            return None;
        }
        self.fresh = false;
        self.latest.clone()
    }

    pub fn has_new(&self) -> bool {
        self.fresh
    }

    /// Most recent value, whether or not it has been taken.
    pub fn latest(&self) -> Option<&T> {
        self.latest.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_is_taken_once() {
        let mut mailbox = Mailbox::new();
        assert_eq!(mailbox.take(), None::<u8>);

        assert_eq!(mailbox.publish(40), None);
        assert!(mailbox.has_new());
        assert_eq!(mailbox.take(), Some(40));
        assert!(!mailbox.has_new());
        assert_eq!(mailbox.take(), None);
        assert_eq!(mailbox.latest(), Some(&40));
    }

    #[test]
    fn unread_value_is_overwritten() {
        let mut mailbox = Mailbox::new();
        mailbox.publish(40);
        assert_eq!(mailbox.publish(30), Some(40));
        assert_eq!(mailbox.take(), Some(30));
        assert_eq!(mailbox.take(), None);
    }

    #[test]
    fn consumed_value_is_not_reported_as_lost() {
        let mut mailbox = Mailbox::new();
        mailbox.publish(40);
        mailbox.take();
        assert_eq!(mailbox.publish(30), None);
        assert_eq!(mailbox.take(), Some(30));
    }
}
