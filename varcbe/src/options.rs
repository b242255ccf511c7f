//! Knobs that change what the compiled table looks like.

use bitflags::bitflags;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Flags: u32 {
        /// Store components that occur more than once in a shared section
        /// and replace each occurrence with a back-reference
        const SHARE_COMPONENT_DATA = 0b0001;
    }
}

impl Default for Flags {
    fn default() -> Self {
        Flags::SHARE_COMPONENT_DATA
    }
}
