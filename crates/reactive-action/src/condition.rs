//! External enablement source for an action

use futures::stream::{BoxStream, Stream, StreamExt};
use std::fmt;

/// Boolean signal combined with the executing state to gate inputs
///
/// Until a stream-backed condition delivers its first value it counts as
/// `true`. When the stream ends, its last value stays in effect.
pub struct EnableCondition {
    source: Source,
}

enum Source {
    Constant(bool),
    Stream(BoxStream<'static, bool>),
}

impl EnableCondition {
    /// A condition that never disables the action
    pub fn always() -> Self {
        Self::constant(true)
    }

    /// A condition fixed at `value`
    pub fn constant(value: bool) -> Self {
        Self {
            source: Source::Constant(value),
        }
    }

    /// A condition that follows the values of `stream`
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = bool> + Send + 'static,
    {
        Self {
            source: Source::Stream(stream.boxed()),
        }
    }

    /// Value in effect before any stream value arrives
    pub(crate) fn initial(&self) -> bool {
        match self.source {
            Source::Constant(value) => value,
            Source::Stream(_) => true,
        }
    }

    /// The stream to watch, if the condition can change at all
    pub(crate) fn into_updates(self) -> Option<BoxStream<'static, bool>> {
        match self.source {
            Source::Constant(_) => None,
            Source::Stream(stream) => Some(stream),
        }
    }
}

impl Default for EnableCondition {
    fn default() -> Self {
        Self::always()
    }
}

impl From<bool> for EnableCondition {
    fn from(value: bool) -> Self {
        Self::constant(value)
    }
}

impl fmt::Debug for EnableCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.source {
            Source::Constant(value) => f.debug_tuple("Constant").field(&value).finish(),
            Source::Stream(_) => f.write_str("Stream"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[test]
    fn test_default_is_always_enabled() {
        let condition = EnableCondition::default();
        assert!(condition.initial());
        assert!(condition.into_updates().is_none());
    }

    #[test]
    fn test_constant_false() {
        let condition = EnableCondition::from(false);
        assert!(!condition.initial());
        assert!(condition.into_updates().is_none());
    }

    #[test]
    fn test_stream_starts_enabled() {
        let condition = EnableCondition::from_stream(stream::iter(vec![false]));
        assert!(condition.initial());
        assert_eq!(format!("{:?}", condition), "Stream");
        assert!(condition.into_updates().is_some());
    }
}
