//! Serialization of host events into input packets.
//!
//! The inverse of the server's dispatch: whatever the host's input layer
//! produces becomes a kind-1/2/3 packet.  Characters travel as their UTF-8
//! byte value with the char flag set (`'A'` goes out as 0x41) — the char
//! flag switches the code byte out of the scancode space entirely.  Scroll
//! direction maps onto the wire's 0/1 button byte.

use tracing::debug;

use rawterm_core::event::TermEvent;
use rawterm_core::protocol::messages::{
    EventQueue, KeyFlags, KeyInput, MouseEventKind, MouseInput, Packet, PacketBody, WindowId,
};

/// Builds the input packet for a host event; `None` for events that have no
/// wire form (or are handled elsewhere, like resizes).
pub fn event_to_packet(window: WindowId, event: &TermEvent) -> Option<Packet> {
    let body = match event {
        TermEvent::Char(c) => {
            // The code byte of a char event is the character itself; only
            // single-byte characters have a wire form.
            if !c.is_ascii() {
                debug!(char = %c, "dropping character with no single-byte form");
                return None;
            }
            PacketBody::KeyInput(KeyInput {
                code: *c as u8,
                flags: KeyFlags(KeyFlags::IS_CHAR),
            })
        }
        TermEvent::Key { code, held } => PacketBody::KeyInput(KeyInput {
            code: code.code(),
            flags: KeyFlags(if *held { KeyFlags::HELD } else { 0 }),
        }),
        TermEvent::KeyUp { code } => PacketBody::KeyInput(KeyInput {
            code: code.code(),
            flags: KeyFlags(KeyFlags::KEY_UP),
        }),
        TermEvent::MouseClick { button, x, y } => PacketBody::MouseInput(MouseInput {
            kind: MouseEventKind::Click,
            button: *button,
            x: *x,
            y: *y,
        }),
        TermEvent::MouseUp { button, x, y } => PacketBody::MouseInput(MouseInput {
            kind: MouseEventKind::Up,
            button: *button,
            x: *x,
            y: *y,
        }),
        TermEvent::MouseScroll { direction, x, y } => PacketBody::MouseInput(MouseInput {
            kind: MouseEventKind::Scroll,
            button: u8::from(*direction >= 0),
            x: *x,
            y: *y,
        }),
        TermEvent::MouseDrag { button, x, y } => PacketBody::MouseInput(MouseInput {
            kind: MouseEventKind::Drag,
            button: *button,
            x: *x,
            y: *y,
        }),
        TermEvent::Custom { name, params } => PacketBody::EventQueue(EventQueue {
            name: name.clone(),
            params: params.clone(),
        }),
        // Resizes carry display dimensions and are built by the client
        // itself; the remaining events only ever travel server → client.
        TermEvent::Resize { .. }
        | TermEvent::WindowClosed { .. }
        | TermEvent::Message { .. } => return None,
    };
    Some(Packet { window, body })
}
