//! Per-frame dictionary shared by the passes of one frame.

use std::collections::BTreeMap;

use bitflags::bitflags;

use crate::options::OptionValue;

bitflags! {
    /// Signals raised during a frame that downstream passes may react to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RefreshFlags: u32 {
        /// Some pass changed its render options; accumulated history is invalid.
        const RENDER_OPTIONS_CHANGED = 1 << 0;
        /// Scene lighting changed.
        const LIGHTING_CHANGED = 1 << 1;
        /// The frame resolution differs from the previous frame.
        const RESOLUTION_CHANGED = 1 << 2;
    }
}

/// Key/value store created fresh for every frame.
///
/// Passes executing earlier in the frame can leave values and refresh flags
/// for passes executing later. Nothing survives into the next frame.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FrameDictionary {
    refresh: RefreshFlags,
    values: BTreeMap<String, OptionValue>,
}

impl FrameDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refresh_flags(&self) -> RefreshFlags {
        self.refresh
    }

    /// Raise one or more refresh flags for the rest of the frame.
    pub fn raise(&mut self, flags: RefreshFlags) {
        self.refresh |= flags;
    }

    /// Whether any of `flags` has been raised this frame.
    pub fn is_raised(&self, flags: RefreshFlags) -> bool {
        self.refresh.intersects(flags)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<OptionValue>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.values.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<OptionValue> {
        self.values.remove(key)
    }
}
