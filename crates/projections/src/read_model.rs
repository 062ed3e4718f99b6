//! Query-side access to a view.

/// A view that can be inspected without going through its projection.
pub trait ReadModel: Send + Sync {
    /// Number of entries, or 0 while the view is being written.
    fn count(&self) -> usize;
}
