/// Strategy for judging captured output against a unit's reference.
///
/// A comparator is chosen once per unit from its expected-output kind; implementations hold
/// whatever they precompiled from the reference.
pub trait OutputComparator: Send + Sync {
    /// `true` iff `actual` satisfies the reference.
    fn matches(&self, actual: &str) -> bool;

    /// Line diff between the reference and `actual`, for verbose reports.
    fn diff(&self, actual: &str) -> String;
}
