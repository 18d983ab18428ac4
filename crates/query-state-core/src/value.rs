use std::fmt::Debug;

/// Bound shared by every value a codec can produce.
///
/// Values are cloned into state handles and compared against defaults, and
/// may cross into the flush task, hence `Clone + PartialEq + Send + Sync`.
pub trait QueryValue: 'static + Clone + PartialEq + Debug + Send + Sync {}

impl<T> QueryValue for T where T: 'static + Clone + PartialEq + Debug + Send + Sync {}
