//! The canonical event type shared by both endpoints.
//!
//! Input packets (kinds 1–3) and window-management packets surface as
//! [`TermEvent`] values: the server's `pull_event` returns them to the hosted
//! program, and the client's `queue_event` serializes them back onto the
//! wire.

use crate::keymap::KeyCode;
use crate::protocol::ibt::IbtValue;
use crate::protocol::messages::{MessageKind, WindowId};

/// An event flowing through a terminal session.
#[derive(Debug, Clone, PartialEq)]
pub enum TermEvent {
    /// A key was pressed (`held` marks auto-repeat).
    Key { code: KeyCode, held: bool },
    /// A key was released.
    KeyUp { code: KeyCode },
    /// A character was typed.
    Char(char),
    MouseClick { button: u8, x: u32, y: u32 },
    MouseUp { button: u8, x: u32, y: u32 },
    /// `direction` is −1 for scroll-up, +1 for scroll-down.
    MouseScroll { direction: i8, x: u32, y: u32 },
    MouseDrag { button: u8, x: u32, y: u32 },
    /// A named event with arbitrary parameters (the kind-3 packet).
    Custom { name: String, params: Vec<IbtValue> },
    /// The peer resized a window.
    Resize { window: WindowId },
    /// A window was closed (kind-4 close).
    WindowClosed { window: WindowId },
    /// An out-of-band server message (kind 5).
    Message {
        kind: MessageKind,
        title: String,
        body: String,
    },
}

impl TermEvent {
    /// The conventional event name, as hosted programs match on it.
    pub fn name(&self) -> &str {
        match self {
            TermEvent::Key { .. } => "key",
            TermEvent::KeyUp { .. } => "key_up",
            TermEvent::Char(_) => "char",
            TermEvent::MouseClick { .. } => "mouse_click",
            TermEvent::MouseUp { .. } => "mouse_up",
            TermEvent::MouseScroll { .. } => "mouse_scroll",
            TermEvent::MouseDrag { .. } => "mouse_drag",
            TermEvent::Custom { name, .. } => name,
            TermEvent::Resize { .. } => "term_resize",
            TermEvent::WindowClosed { .. } => "win_close",
            TermEvent::Message { .. } => "message",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_event_names() {
        assert_eq!(
            TermEvent::Key {
                code: KeyCode::A,
                held: false
            }
            .name(),
            "key"
        );
        assert_eq!(TermEvent::Char('x').name(), "char");
        assert_eq!(TermEvent::WindowClosed { window: 0 }.name(), "win_close");
    }

    #[test]
    fn test_custom_event_uses_its_own_name() {
        let event = TermEvent::Custom {
            name: "redstone".to_string(),
            params: vec![],
        };
        assert_eq!(event.name(), "redstone");
    }
}
