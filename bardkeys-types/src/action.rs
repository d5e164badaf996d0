use serde::{Deserialize, Serialize};

/// Windows virtual-key code.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct VirtualKey(u16);

impl VirtualKey {
    pub const SHIFT: VirtualKey = VirtualKey(0x10);
    pub const CONTROL: VirtualKey = VirtualKey(0x11);
    /// VK_MENU, the Alt key.
    pub const ALT: VirtualKey = VirtualKey(0x12);

    /// Every modifier key, in the order they are force-released.
    pub const MODIFIERS: [VirtualKey; 3] = [Self::SHIFT, Self::CONTROL, Self::ALT];

    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    pub fn get(self) -> u16 {
        self.0
    }

    pub fn is_modifier(self) -> bool {
        Self::MODIFIERS.contains(&self)
    }

    /// Printable label: the character for ASCII codes, `VK_n` otherwise.
    pub fn label(self) -> String {
        match u8::try_from(self.0) {
            Ok(b) if (32..=126).contains(&b) => (b as char).to_string(),
            _ => format!("VK_{}", self.0),
        }
    }
}

/// Modifier combination composed atomically around a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Modifier {
    Ctrl,
    Shift,
    ShiftCtrl,
    Alt,
}

impl Modifier {
    /// Modifier keys in press order. Shift always precedes Ctrl.
    pub fn keys(self) -> &'static [VirtualKey] {
        match self {
            Modifier::Ctrl => &[VirtualKey::CONTROL],
            Modifier::Shift => &[VirtualKey::SHIFT],
            Modifier::ShiftCtrl => &[VirtualKey::SHIFT, VirtualKey::CONTROL],
            Modifier::Alt => &[VirtualKey::ALT],
        }
    }

    /// Number of modifier keys held around the key.
    pub fn depth(self) -> usize {
        self.keys().len()
    }

    pub fn name(self) -> &'static str {
        match self {
            Modifier::Ctrl => "CTRL",
            Modifier::Shift => "SHIFT",
            Modifier::ShiftCtrl => "SHIFT+CTRL",
            Modifier::Alt => "ALT",
        }
    }
}

/// What a note turns into at the keyboard.
///
/// `Plain` keys support a real press/hold/release lifecycle. `Modified` keys
/// are tapped: the whole combination is pressed and released inside a single
/// press call, and the matching release is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputAction {
    Plain(VirtualKey),
    Modified(Modifier, VirtualKey),
}

impl OutputAction {
    pub const fn plain(code: u16) -> Self {
        OutputAction::Plain(VirtualKey::new(code))
    }

    pub const fn modified(modifier: Modifier, code: u16) -> Self {
        OutputAction::Modified(modifier, VirtualKey::new(code))
    }

    pub fn key(&self) -> VirtualKey {
        match self {
            OutputAction::Plain(key) | OutputAction::Modified(_, key) => *key,
        }
    }

    pub fn modifier(&self) -> Option<Modifier> {
        match self {
            OutputAction::Plain(_) => None,
            OutputAction::Modified(modifier, _) => Some(*modifier),
        }
    }

    pub fn is_double_modifier(&self) -> bool {
        matches!(self, OutputAction::Modified(Modifier::ShiftCtrl, _))
    }

    /// Human readable form, e.g. `CTRL+5` or `8`.
    pub fn label(&self) -> String {
        match self {
            OutputAction::Plain(key) => key.label(),
            OutputAction::Modified(modifier, key) => format!("{}+{}", modifier.name(), key.label()),
        }
    }
}

impl std::fmt::Display for OutputAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label())
    }
}
