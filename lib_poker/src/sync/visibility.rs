//! Injectable visibility capability.
//!
//! Browser surfaces gate polling on the document visibility API; a
//! terminal client is simply always visible. Tests flip a toggle to prove
//! that hidden ticks stay off the network.

use std::sync::atomic::{AtomicBool, Ordering};

/// Where "is the view visible" comes from.
pub trait VisibilitySource: Send + Sync {
    fn is_visible(&self) -> bool;
}

/// Source for surfaces that are never hidden.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysVisible;

impl VisibilitySource for AlwaysVisible {
    fn is_visible(&self) -> bool {
        true
    }
}

/// Manually toggled source.
#[derive(Debug)]
pub struct ToggleVisibility(AtomicBool);

impl ToggleVisibility {
    pub fn new(visible: bool) -> Self {
        Self(AtomicBool::new(visible))
    }

    pub fn set(&self, visible: bool) {
        self.0.store(visible, Ordering::Relaxed);
    }
}

impl VisibilitySource for ToggleVisibility {
    fn is_visible(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

impl<T: VisibilitySource + ?Sized> VisibilitySource for std::sync::Arc<T> {
    fn is_visible(&self) -> bool {
        (**self).is_visible()
    }
}
