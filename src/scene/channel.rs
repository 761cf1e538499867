use bitflags::bitflags;

bitflags! {
    /// Channel-box attributes of a transform node.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct Channel: u16 {
        const TX = 1 << 0;
        const TY = 1 << 1;
        const TZ = 1 << 2;
        const RX = 1 << 3;
        const RY = 1 << 4;
        const RZ = 1 << 5;
        const SX = 1 << 6;
        const SY = 1 << 7;
        const SZ = 1 << 8;
        const VISIBILITY = 1 << 9;

        const TRANSLATE = Self::TX.bits() | Self::TY.bits() | Self::TZ.bits();
        const ROTATE = Self::RX.bits() | Self::RY.bits() | Self::RZ.bits();
        const SCALE = Self::SX.bits() | Self::SY.bits() | Self::SZ.bits();
    }
}

/// Lock / keyable state of every channel plus the visibility value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Channels {
    pub locked: Channel,
    pub keyable: Channel,
    pub visible: bool,
}

impl Channels {
    /// Everything unlocked, keyable and visible.
    pub fn restore(&mut self) {
        *self = Self::default();
    }

    #[inline]
    #[must_use]
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    /// The subset of `channels` that is locked.
    #[inline]
    #[must_use]
    pub fn locked_in(&self, channels: Channel) -> Channel {
        self.locked & channels
    }
}

impl Default for Channels {
    fn default() -> Self {
        Self {
            locked: Channel::empty(),
            keyable: Channel::all(),
            visible: true,
        }
    }
}
