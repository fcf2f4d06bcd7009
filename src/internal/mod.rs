//! Internal implementation details.

pub(crate) mod circular;
pub(crate) mod disposables;
pub(crate) mod suppressed;

pub(crate) use circular::PrototypeGuard;
pub(crate) use disposables::DisposableBeans;
pub(crate) use suppressed::SuppressedErrors;
