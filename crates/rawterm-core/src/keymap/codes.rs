//! The wire key-code space.
//!
//! Raw-mode key packets carry the classic set-1 scancode values (`a` = 30,
//! `enter` = 28, `f1` = 59, …) — the same numbering the terminal's own `keys`
//! table exposes.  [`KeyCode`] is the canonical named enumeration over that
//! space; the numeric value of each variant is its wire code.

use serde::{Deserialize, Serialize};

/// A named key on the wire-code space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum KeyCode {
    Escape = 1,
    One = 2,
    Two = 3,
    Three = 4,
    Four = 5,
    Five = 6,
    Six = 7,
    Seven = 8,
    Eight = 9,
    Nine = 10,
    Zero = 11,
    Minus = 12,
    Equals = 13,
    Backspace = 14,
    Tab = 15,
    Q = 16,
    W = 17,
    E = 18,
    R = 19,
    T = 20,
    Y = 21,
    U = 22,
    I = 23,
    O = 24,
    P = 25,
    LeftBracket = 26,
    RightBracket = 27,
    Enter = 28,
    LeftCtrl = 29,
    A = 30,
    S = 31,
    D = 32,
    F = 33,
    G = 34,
    H = 35,
    J = 36,
    K = 37,
    L = 38,
    Semicolon = 39,
    Apostrophe = 40,
    Grave = 41,
    LeftShift = 42,
    Backslash = 43,
    Z = 44,
    X = 45,
    C = 46,
    V = 47,
    B = 48,
    N = 49,
    M = 50,
    Comma = 51,
    Period = 52,
    Slash = 53,
    RightShift = 54,
    NumpadMultiply = 55,
    LeftAlt = 56,
    Space = 57,
    CapsLock = 58,
    F1 = 59,
    F2 = 60,
    F3 = 61,
    F4 = 62,
    F5 = 63,
    F6 = 64,
    F7 = 65,
    F8 = 66,
    F9 = 67,
    F10 = 68,
    NumLock = 69,
    ScrollLock = 70,
    Numpad7 = 71,
    Numpad8 = 72,
    Numpad9 = 73,
    NumpadSubtract = 74,
    Numpad4 = 75,
    Numpad5 = 76,
    Numpad6 = 77,
    NumpadAdd = 78,
    Numpad1 = 79,
    Numpad2 = 80,
    Numpad3 = 81,
    Numpad0 = 82,
    NumpadDecimal = 83,
    F11 = 87,
    F12 = 88,
    F13 = 100,
    F14 = 101,
    F15 = 102,
    NumpadEquals = 141,
    NumpadEnter = 156,
    RightCtrl = 157,
    NumpadDivide = 181,
    RightAlt = 184,
    Pause = 197,
    Home = 199,
    Up = 200,
    PageUp = 201,
    Left = 203,
    Right = 205,
    End = 207,
    Down = 208,
    PageDown = 209,
    Insert = 210,
    Delete = 211,
}

impl KeyCode {
    /// The wire code for this key.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Looks up the key for a wire code; `None` for unassigned codes.
    pub fn from_code(code: u8) -> Option<KeyCode> {
        use KeyCode::*;
        Some(match code {
            1 => Escape,
            2 => One,
            3 => Two,
            4 => Three,
            5 => Four,
            6 => Five,
            7 => Six,
            8 => Seven,
            9 => Eight,
            10 => Nine,
            11 => Zero,
            12 => Minus,
            13 => Equals,
            14 => Backspace,
            15 => Tab,
            16 => Q,
            17 => W,
            18 => E,
            19 => R,
            20 => T,
            21 => Y,
            22 => U,
            23 => I,
            24 => O,
            25 => P,
            26 => LeftBracket,
            27 => RightBracket,
            28 => Enter,
            29 => LeftCtrl,
            30 => A,
            31 => S,
            32 => D,
            33 => F,
            34 => G,
            35 => H,
            36 => J,
            37 => K,
            38 => L,
            39 => Semicolon,
            40 => Apostrophe,
            41 => Grave,
            42 => LeftShift,
            43 => Backslash,
            44 => Z,
            45 => X,
            46 => C,
            47 => V,
            48 => B,
            49 => N,
            50 => M,
            51 => Comma,
            52 => Period,
            53 => Slash,
            54 => RightShift,
            55 => NumpadMultiply,
            56 => LeftAlt,
            57 => Space,
            58 => CapsLock,
            59 => F1,
            60 => F2,
            61 => F3,
            62 => F4,
            63 => F5,
            64 => F6,
            65 => F7,
            66 => F8,
            67 => F9,
            68 => F10,
            69 => NumLock,
            70 => ScrollLock,
            71 => Numpad7,
            72 => Numpad8,
            73 => Numpad9,
            74 => NumpadSubtract,
            75 => Numpad4,
            76 => Numpad5,
            77 => Numpad6,
            78 => NumpadAdd,
            79 => Numpad1,
            80 => Numpad2,
            81 => Numpad3,
            82 => Numpad0,
            83 => NumpadDecimal,
            87 => F11,
            88 => F12,
            100 => F13,
            101 => F14,
            102 => F15,
            141 => NumpadEquals,
            156 => NumpadEnter,
            157 => RightCtrl,
            181 => NumpadDivide,
            184 => RightAlt,
            197 => Pause,
            199 => Home,
            200 => Up,
            201 => PageUp,
            203 => Left,
            205 => Right,
            207 => End,
            208 => Down,
            209 => PageDown,
            210 => Insert,
            211 => Delete,
            _ => return None,
        })
    }

    /// The conventional name of this key, as event consumers see it.
    pub fn name(self) -> &'static str {
        use KeyCode::*;
        match self {
            Escape => "escape",
            One => "one",
            Two => "two",
            Three => "three",
            Four => "four",
            Five => "five",
            Six => "six",
            Seven => "seven",
            Eight => "eight",
            Nine => "nine",
            Zero => "zero",
            Minus => "minus",
            Equals => "equals",
            Backspace => "backspace",
            Tab => "tab",
            Q => "q",
            W => "w",
            E => "e",
            R => "r",
            T => "t",
            Y => "y",
            U => "u",
            I => "i",
            O => "o",
            P => "p",
            LeftBracket => "leftBracket",
            RightBracket => "rightBracket",
            Enter => "enter",
            LeftCtrl => "leftCtrl",
            A => "a",
            S => "s",
            D => "d",
            F => "f",
            G => "g",
            H => "h",
            J => "j",
            K => "k",
            L => "l",
            Semicolon => "semicolon",
            Apostrophe => "apostrophe",
            Grave => "grave",
            LeftShift => "leftShift",
            Backslash => "backslash",
            Z => "z",
            X => "x",
            C => "c",
            V => "v",
            B => "b",
            N => "n",
            M => "m",
            Comma => "comma",
            Period => "period",
            Slash => "slash",
            RightShift => "rightShift",
            NumpadMultiply => "numPadMultiply",
            LeftAlt => "leftAlt",
            Space => "space",
            CapsLock => "capsLock",
            F1 => "f1",
            F2 => "f2",
            F3 => "f3",
            F4 => "f4",
            F5 => "f5",
            F6 => "f6",
            F7 => "f7",
            F8 => "f8",
            F9 => "f9",
            F10 => "f10",
            NumLock => "numLock",
            ScrollLock => "scrollLock",
            Numpad7 => "numPad7",
            Numpad8 => "numPad8",
            Numpad9 => "numPad9",
            NumpadSubtract => "numPadSubtract",
            Numpad4 => "numPad4",
            Numpad5 => "numPad5",
            Numpad6 => "numPad6",
            NumpadAdd => "numPadAdd",
            Numpad1 => "numPad1",
            Numpad2 => "numPad2",
            Numpad3 => "numPad3",
            Numpad0 => "numPad0",
            NumpadDecimal => "numPadDecimal",
            F11 => "f11",
            F12 => "f12",
            F13 => "f13",
            F14 => "f14",
            F15 => "f15",
            NumpadEquals => "numPadEqual",
            NumpadEnter => "numPadEnter",
            RightCtrl => "rightCtrl",
            NumpadDivide => "numPadDivide",
            RightAlt => "rightAlt",
            Pause => "pause",
            Home => "home",
            Up => "up",
            PageUp => "pageUp",
            Left => "left",
            Right => "right",
            End => "end",
            Down => "down",
            PageDown => "pageDown",
            Insert => "insert",
            Delete => "delete",
        }
    }
}
