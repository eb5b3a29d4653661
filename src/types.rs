//! Shared types, enums, and constants.
//!
//! All types that cross module boundaries or define the FFI data model live here.

use bitflags::bitflags;
use serde::Deserialize;

// ============================================================================
// Node Kinds
// ============================================================================

/// Role of a mirrored DOM node, as far as keyboard navigation cares.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Any element without a navigation role (wrappers, lists, landmarks).
    Container = 0,
    /// The header landmark. Key events outside of it are ignored.
    Header = 1,
    /// The top-level navigation bar.
    MainNav = 2,
    /// Wrapper of one top-level entry (link or trigger plus its popup).
    NavItem = 3,
    /// Top-level link or popup trigger.
    NavLink = 4,
    /// Top-level call-to-action button.
    Cta = 5,
    Popup = 6,
    Column = 7,
    Section = 8,
    Headline = 9,
    /// Link inside a popup (nav link, promo link, image link, rich text link).
    Link = 10,
    Brand = 11,
    Toggle = 12,
    SearchTrigger = 13,
    SearchField = 14,
    SignIn = 15,
    ProfileButton = 16,
    Logo = 17,
    Breadcrumb = 18,
    Curtain = 19,
}

impl NodeKind {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Container),
            1 => Some(Self::Header),
            2 => Some(Self::MainNav),
            3 => Some(Self::NavItem),
            4 => Some(Self::NavLink),
            5 => Some(Self::Cta),
            6 => Some(Self::Popup),
            7 => Some(Self::Column),
            8 => Some(Self::Section),
            9 => Some(Self::Headline),
            10 => Some(Self::Link),
            11 => Some(Self::Brand),
            12 => Some(Self::Toggle),
            13 => Some(Self::SearchTrigger),
            14 => Some(Self::SearchField),
            15 => Some(Self::SignIn),
            16 => Some(Self::ProfileButton),
            17 => Some(Self::Logo),
            18 => Some(Self::Breadcrumb),
            19 => Some(Self::Curtain),
            _ => None,
        }
    }

    /// Whether a node of this kind can receive focus.
    pub fn is_focusable(self) -> bool {
        !matches!(
            self,
            Self::Container
                | Self::Header
                | Self::MainNav
                | Self::NavItem
                | Self::Popup
                | Self::Column
                | Self::Section
                | Self::Curtain
        )
    }

    /// Kinds that take part in the emulated header tab order.
    /// Popup links and headlines are only reached by diving into a popup.
    pub fn in_tab_sequence(self) -> bool {
        self.is_focusable() && !matches!(self, Self::Link | Self::Headline)
    }

    /// Kinds that make up the top-level item list.
    pub fn is_top_level(self) -> bool {
        matches!(self, Self::NavLink | Self::Cta)
    }
}

// ============================================================================
// Breakpoint Visibility
// ============================================================================

/// Author-level display rule relative to the desktop breakpoint.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Breakpoint {
    #[default]
    Always = 0,
    DesktopOnly = 1,
    MobileOnly = 2,
}

impl Breakpoint {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Always),
            1 => Some(Self::DesktopOnly),
            2 => Some(Self::MobileOnly),
            _ => None,
        }
    }

    pub fn shown(self, desktop: bool) -> bool {
        match self {
            Self::Always => true,
            Self::DesktopOnly => desktop,
            Self::MobileOnly => !desktop,
        }
    }
}

// ============================================================================
// Class State (bitflags)
// ============================================================================

bitflags! {
    /// Class toggles the navigation core owns. CSS reacts to these.
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct NodeClasses: u32 {
        /// `feds-popup--open`
        const OPEN_POPUP      = 0b0000_0001;
        /// `feds-dropdown--active`
        const ACTIVE_DROPDOWN = 0b0000_0010;
        /// `feds-popup-trigger--fullWidth`, set by the host on the nav item.
        const FULL_WIDTH      = 0b0000_0100;
        /// `feds-curtainWrapper--open`
        const CURTAIN_OPEN    = 0b0000_1000;
    }
}

// ============================================================================
// Analytics State
// ============================================================================

/// Analytics label on a popup trigger. It names the action the next
/// activation performs, so an expanded trigger reads `header|Close`.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyticsState {
    Open = 0,
    Close = 1,
}

impl AnalyticsState {
    pub fn label(self) -> &'static str {
        match self {
            Self::Open => "header|Open",
            Self::Close => "header|Close",
        }
    }
}

// ============================================================================
// Direction & Focus Hints
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextDirection {
    #[default]
    Ltr,
    Rtl,
}

/// Where focus lands when a popup or column is entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusHint {
    First,
    Last,
}

/// Scan direction used when the requested item is not visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

// ============================================================================
// Keys
// ============================================================================

/// Keys the router reacts to, named after `KeyboardEvent.code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavKey {
    Tab,
    Enter,
    Escape,
    Space,
    ArrowLeft,
    ArrowUp,
    ArrowRight,
    ArrowDown,
}

impl NavKey {
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "Tab" => Some(Self::Tab),
            "Enter" | "NumpadEnter" => Some(Self::Enter),
            "Escape" => Some(Self::Escape),
            "Space" => Some(Self::Space),
            "ArrowLeft" => Some(Self::ArrowLeft),
            "ArrowUp" => Some(Self::ArrowUp),
            "ArrowRight" => Some(Self::ArrowRight),
            "ArrowDown" => Some(Self::ArrowDown),
            _ => None,
        }
    }

    /// Legacy numeric `keyCode` lookup.
    pub fn from_key_code(key_code: u32) -> Option<Self> {
        match key_code {
            9 => Some(Self::Tab),
            13 => Some(Self::Enter),
            27 => Some(Self::Escape),
            32 => Some(Self::Space),
            37 => Some(Self::ArrowLeft),
            38 => Some(Self::ArrowUp),
            39 => Some(Self::ArrowRight),
            40 => Some(Self::ArrowDown),
            _ => None,
        }
    }

    /// `code` wins when present; an empty `code` falls back to `keyCode`.
    pub fn resolve(code: &str, key_code: u32) -> Option<Self> {
        if code.is_empty() {
            Self::from_key_code(key_code)
        } else {
            Self::from_code(code)
        }
    }

    /// Map a terminal key event. Returns the key and whether Shift is held;
    /// BackTab is reported as Shift+Tab.
    pub fn from_crossterm(event: &crossterm::event::KeyEvent) -> Option<(Self, bool)> {
        use crossterm::event::{KeyCode, KeyEventKind, KeyModifiers};

        if event.kind == KeyEventKind::Release {
            return None;
        }
        let shift = event.modifiers.contains(KeyModifiers::SHIFT);
        let key = match event.code {
            KeyCode::Tab => Self::Tab,
            KeyCode::BackTab => return Some((Self::Tab, true)),
            KeyCode::Enter => Self::Enter,
            KeyCode::Esc => Self::Escape,
            KeyCode::Char(' ') => Self::Space,
            KeyCode::Left => Self::ArrowLeft,
            KeyCode::Up => Self::ArrowUp,
            KeyCode::Right => Self::ArrowRight,
            KeyCode::Down => Self::ArrowDown,
            _ => return None,
        };
        Some((key, shift))
    }
}

// ============================================================================
// Output Events
// ============================================================================

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavEventType {
    None = 0,
    FocusChange = 1,
    /// `aria-expanded` changed. data[0] = 0/1.
    Expanded = 2,
    /// Analytics label changed. data[0] = `AnalyticsState`.
    Analytics = 3,
    /// Class toggled. data[0] = `NodeClasses` bits, data[1] = 0 removed / 1 added.
    ClassChange = 4,
    /// Inline `left` offset. data[0] = f32 bits, data[1] = 0 cleared / 1 set.
    Offset = 5,
    /// Synthetic click on a link or CTA.
    Activate = 6,
    /// Ask the host to scroll the target into view.
    ScrollIntoView = 7,
    /// Node removed from the tree by the core (empty headlines).
    Removed = 8,
}

/// FFI-safe event struct. Fixed layout, 24 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavEvent {
    pub event_type: u32,
    pub target: u32,
    pub data: [u32; 4],
}

impl NavEvent {
    pub fn none() -> Self {
        Self {
            event_type: NavEventType::None as u32,
            target: 0,
            data: [0; 4],
        }
    }

    pub fn focus_change(from: u32, to: u32) -> Self {
        Self {
            event_type: NavEventType::FocusChange as u32,
            target: to,
            data: [from, to, 0, 0],
        }
    }

    pub fn expanded(target: u32, expanded: bool) -> Self {
        Self {
            event_type: NavEventType::Expanded as u32,
            target,
            data: [expanded as u32, 0, 0, 0],
        }
    }

    pub fn analytics(target: u32, state: AnalyticsState) -> Self {
        Self {
            event_type: NavEventType::Analytics as u32,
            target,
            data: [state as u32, 0, 0, 0],
        }
    }

    pub fn class_change(target: u32, classes: NodeClasses, added: bool) -> Self {
        Self {
            event_type: NavEventType::ClassChange as u32,
            target,
            data: [classes.bits(), added as u32, 0, 0],
        }
    }

    pub fn offset(target: u32, left: Option<f32>) -> Self {
        Self {
            event_type: NavEventType::Offset as u32,
            target,
            data: [
                left.map(f32::to_bits).unwrap_or(0),
                left.is_some() as u32,
                0,
                0,
            ],
        }
    }

    pub fn activate(target: u32) -> Self {
        Self {
            event_type: NavEventType::Activate as u32,
            target,
            data: [0; 4],
        }
    }

    pub fn scroll_into_view(target: u32) -> Self {
        Self {
            event_type: NavEventType::ScrollIntoView as u32,
            target,
            data: [0; 4],
        }
    }

    pub fn removed(target: u32) -> Self {
        Self {
            event_type: NavEventType::Removed as u32,
            target,
            data: [0; 4],
        }
    }
}

// ============================================================================
// Host Input Event (internal, not FFI)
// ============================================================================

#[derive(Debug, Clone)]
pub enum HostInputEvent {
    Key {
        target: u32,
        key: NavKey,
        shift: bool,
    },
    Click {
        target: u32,
    },
    /// Focus moved by the host (pointer, native tab order). `related` is
    /// the node that lost focus, 0 for none.
    FocusIn {
        target: u32,
        related: u32,
    },
    Resize {
        width: f32,
        height: f32,
    },
}

// ============================================================================
// NavNode
// ============================================================================

#[derive(Debug, Clone)]
pub struct NavNode {
    pub kind: NodeKind,
    pub taffy_node: taffy::NodeId,
    pub text: String,
    pub children: Vec<u32>,
    pub parent: Option<u32>,
    pub dirty: bool,
    // Attributes
    pub aria_expanded: Option<bool>,
    pub aria_haspopup: bool,
    pub analytics: Option<AnalyticsState>,
    pub classes: NodeClasses,
    /// `data-requestor` on the curtain.
    pub requestor: Option<String>,
    /// Inline `left` offset in px.
    pub offset_left: Option<f32>,
    // Author style
    pub breakpoint: Breakpoint,
    pub display_none: bool,
    pub visibility_hidden: bool,
}

impl NavNode {
    pub fn new(kind: NodeKind, taffy_node: taffy::NodeId) -> Self {
        Self {
            kind,
            taffy_node,
            text: String::new(),
            children: Vec::new(),
            parent: None,
            dirty: true,
            aria_expanded: None,
            aria_haspopup: false,
            analytics: None,
            classes: NodeClasses::empty(),
            requestor: None,
            offset_left: None,
            // Section headlines only render below the desktop breakpoint.
            breakpoint: if kind == NodeKind::Headline {
                Breakpoint::MobileOnly
            } else {
                Breakpoint::Always
            },
            display_none: false,
            visibility_hidden: false,
        }
    }

    pub fn is_expanded(&self) -> bool {
        self.aria_expanded == Some(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

    #[test]
    fn test_node_kind_from_u8() {
        assert_eq!(NodeKind::from_u8(0), Some(NodeKind::Container));
        assert_eq!(NodeKind::from_u8(6), Some(NodeKind::Popup));
        assert_eq!(NodeKind::from_u8(19), Some(NodeKind::Curtain));
        assert_eq!(NodeKind::from_u8(20), None);
    }

    #[test]
    fn test_tab_sequence_excludes_popup_content() {
        assert!(NodeKind::NavLink.in_tab_sequence());
        assert!(NodeKind::Breadcrumb.in_tab_sequence());
        assert!(!NodeKind::Link.in_tab_sequence());
        assert!(!NodeKind::Headline.in_tab_sequence());
        assert!(!NodeKind::Popup.is_focusable());
    }

    #[test]
    fn test_key_code_table() {
        assert_eq!(NavKey::from_key_code(9), Some(NavKey::Tab));
        assert_eq!(NavKey::from_key_code(13), Some(NavKey::Enter));
        assert_eq!(NavKey::from_key_code(27), Some(NavKey::Escape));
        assert_eq!(NavKey::from_key_code(32), Some(NavKey::Space));
        assert_eq!(NavKey::from_key_code(37), Some(NavKey::ArrowLeft));
        assert_eq!(NavKey::from_key_code(38), Some(NavKey::ArrowUp));
        assert_eq!(NavKey::from_key_code(39), Some(NavKey::ArrowRight));
        assert_eq!(NavKey::from_key_code(40), Some(NavKey::ArrowDown));
        assert_eq!(NavKey::from_key_code(65), None);
    }

    #[test]
    fn test_code_takes_precedence_over_key_code() {
        assert_eq!(NavKey::resolve("ArrowUp", 40), Some(NavKey::ArrowUp));
        assert_eq!(NavKey::resolve("", 40), Some(NavKey::ArrowDown));
        assert_eq!(NavKey::resolve("KeyA", 9), None);
    }

    #[test]
    fn test_crossterm_backtab_is_shift_tab() {
        let key = KeyEvent::new(KeyCode::BackTab, KeyModifiers::NONE);
        assert_eq!(NavKey::from_crossterm(&key), Some((NavKey::Tab, true)));

        let mut release = KeyEvent::new(KeyCode::Down, KeyModifiers::NONE);
        release.kind = KeyEventKind::Release;
        assert_eq!(NavKey::from_crossterm(&release), None);

        let space = KeyEvent::new(KeyCode::Char(' '), KeyModifiers::NONE);
        assert_eq!(NavKey::from_crossterm(&space), Some((NavKey::Space, false)));
    }

    #[test]
    fn test_nav_event_size() {
        assert_eq!(std::mem::size_of::<NavEvent>(), 24);
    }

    #[test]
    fn test_offset_event_round_trips_bits() {
        let ev = NavEvent::offset(7, Some(-12.5));
        assert_eq!(f32::from_bits(ev.data[0]), -12.5);
        assert_eq!(ev.data[1], 1);
        assert_eq!(NavEvent::offset(7, None).data[1], 0);
    }

    #[test]
    fn test_headline_defaults_to_mobile_only() {
        let mut tree: taffy::TaffyTree<()> = taffy::TaffyTree::new();
        let id = tree.new_leaf(taffy::Style::DEFAULT).unwrap();
        assert_eq!(
            NavNode::new(NodeKind::Headline, id).breakpoint,
            Breakpoint::MobileOnly
        );
        assert_eq!(NavNode::new(NodeKind::Link, id).breakpoint, Breakpoint::Always);
    }
}
