use bitflags::bitflags;

use crate::handle::{Handle, INVALID_HANDLE};

use super::Rect;

bitflags! {
    /// Window style flags.
    ///
    /// The toolkit may coerce a requested combination; a query always reports
    /// the effective flags.
    #[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
    pub struct WindowFlags: u32 {
        const RESIZABLE      = 0b00001;
        const CLOSABLE       = 0b00010;
        const MINIATURIZABLE = 0b00100;
        const FULLSCREEN     = 0b01000;
        const BORDERLESS     = 0b10000;
    }
}

impl WindowFlags {
    /// Used when a window is declared without any flag.
    pub const DEFAULT: Self = Self::RESIZABLE
        .union(Self::CLOSABLE)
        .union(Self::MINIATURIZABLE);

    /// Parses a single flag name (`"Closable"`, `"Resizable"`, ...).
    pub fn from_config_name(name: &str) -> Option<Self> {
        match name {
            "Resizable" => Some(Self::RESIZABLE),
            "Closable" => Some(Self::CLOSABLE),
            "Miniaturizable" => Some(Self::MINIATURIZABLE),
            "Fullscreen" => Some(Self::FULLSCREEN),
            "Borderless" => Some(Self::BORDERLESS),
            _ => None,
        }
    }
}

/// Window record.
///
/// `identifier == 0` marks the invalid descriptor returned by failed
/// operations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowDescriptor {
    pub identifier: Handle,
    pub frame: Rect,
    pub flags: WindowFlags,
    /// Index of the display holding the window.
    pub screen: u32,
    pub title: Option<String>,
}

impl WindowDescriptor {
    pub fn new(frame: Rect, flags: WindowFlags) -> Self {
        Self {
            identifier: INVALID_HANDLE,
            frame,
            flags,
            screen: 0,
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn on_screen(mut self, screen: u32) -> Self {
        self.screen = screen;
        self
    }

    /// The all-zero record.
    pub fn invalid() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.identifier != INVALID_HANDLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_flags_match_desktop_window() {
        assert_eq!(WindowFlags::DEFAULT.bits(), 0b00111);
    }

    #[test]
    fn flag_names_parse() {
        assert_eq!(WindowFlags::from_config_name("Borderless"), Some(WindowFlags::BORDERLESS));
        assert_eq!(WindowFlags::from_config_name("borderless"), None);
    }

    #[test]
    fn config_names_differ_from_constant_names() {
        // bitflags' own parser takes the constant name.
        assert_eq!(WindowFlags::from_name("RESIZABLE"), Some(WindowFlags::RESIZABLE));
        assert_eq!(WindowFlags::from_config_name("RESIZABLE"), None);
        assert_eq!(WindowFlags::from_config_name("Resizable"), Some(WindowFlags::RESIZABLE));
    }

    #[test]
    fn invalid_descriptor_is_all_zero() {
        let d = WindowDescriptor::invalid();
        assert!(!d.is_valid());
        assert_eq!(d.frame, Rect::default());
        assert!(d.flags.is_empty());
        assert_eq!(d.title, None);
    }
}
