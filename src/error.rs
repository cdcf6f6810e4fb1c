use parse_display::Display;

/// Error returned by [`StoreApi`](crate::StoreApi) when the store cannot be reached.
#[non_exhaustive]
#[derive(Display, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// The store is still running its initializer, or it has been dropped.
    #[display("store is unavailable (initializing or dropped)")]
    Unavailable,
}

impl std::error::Error for StoreError {}
