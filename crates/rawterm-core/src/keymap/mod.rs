//! Bidirectional mapping between the wire key-code space and named keys.
//!
//! Ordinary key/key-up packets carry an 8-bit scancode from the set-1
//! space; [`KeyCode`] names that space and maps codes back and forth.
//! Char-flagged key packets are different: their code byte is the UTF-8
//! character byte value itself and never touches this table.

mod codes;

pub use codes::KeyCode;
