//! Key-name and modifier translation tables.
//!
//! Shortcut specs store keys by their settings-file names ("v", "f3",
//! "forwarddelete"). These tables translate them to the registration
//! backend's key codes and to the observing backend's event keys. The
//! naming follows the Mac keyboard: "delete" is the backspace-position key,
//! "forwarddelete" the one below Help.

use global_hotkey::hotkey::{Code, Modifiers};

use crate::interface::Modifier;

/// Translate a settings-file key name. `None` means the name is unknown and
/// the combination invalid.
pub fn key_to_code(name: &str) -> Option<Code> {
    let code = match name.to_lowercase().as_str() {
        "a" => Code::KeyA,
        "b" => Code::KeyB,
        "c" => Code::KeyC,
        "d" => Code::KeyD,
        "e" => Code::KeyE,
        "f" => Code::KeyF,
        "g" => Code::KeyG,
        "h" => Code::KeyH,
        "i" => Code::KeyI,
        "j" => Code::KeyJ,
        "k" => Code::KeyK,
        "l" => Code::KeyL,
        "m" => Code::KeyM,
        "n" => Code::KeyN,
        "o" => Code::KeyO,
        "p" => Code::KeyP,
        "q" => Code::KeyQ,
        "r" => Code::KeyR,
        "s" => Code::KeyS,
        "t" => Code::KeyT,
        "u" => Code::KeyU,
        "v" => Code::KeyV,
        "w" => Code::KeyW,
        "x" => Code::KeyX,
        "y" => Code::KeyY,
        "z" => Code::KeyZ,
        "0" => Code::Digit0,
        "1" => Code::Digit1,
        "2" => Code::Digit2,
        "3" => Code::Digit3,
        "4" => Code::Digit4,
        "5" => Code::Digit5,
        "6" => Code::Digit6,
        "7" => Code::Digit7,
        "8" => Code::Digit8,
        "9" => Code::Digit9,
        "f1" => Code::F1,
        "f2" => Code::F2,
        "f3" => Code::F3,
        "f4" => Code::F4,
        "f5" => Code::F5,
        "f6" => Code::F6,
        "f7" => Code::F7,
        "f8" => Code::F8,
        "f9" => Code::F9,
        "f10" => Code::F10,
        "f11" => Code::F11,
        "f12" => Code::F12,
        "up" => Code::ArrowUp,
        "down" => Code::ArrowDown,
        "left" => Code::ArrowLeft,
        "right" => Code::ArrowRight,
        "return" => Code::Enter,
        "tab" => Code::Tab,
        "space" => Code::Space,
        "escape" => Code::Escape,
        "delete" => Code::Backspace,
        "forwarddelete" => Code::Delete,
        "home" => Code::Home,
        "end" => Code::End,
        "pageup" => Code::PageUp,
        "pagedown" => Code::PageDown,
        "=" => Code::Equal,
        "-" => Code::Minus,
        "[" => Code::BracketLeft,
        "]" => Code::BracketRight,
        "'" => Code::Quote,
        ";" => Code::Semicolon,
        "\\" => Code::Backslash,
        "," => Code::Comma,
        "/" => Code::Slash,
        "." => Code::Period,
        "`" => Code::Backquote,
        "keypad0" => Code::Numpad0,
        "keypad1" => Code::Numpad1,
        "keypad2" => Code::Numpad2,
        "keypad3" => Code::Numpad3,
        "keypad4" => Code::Numpad4,
        "keypad5" => Code::Numpad5,
        "keypad6" => Code::Numpad6,
        "keypad7" => Code::Numpad7,
        "keypad8" => Code::Numpad8,
        "keypad9" => Code::Numpad9,
        "keypaddecimal" => Code::NumpadDecimal,
        "keypadmultiply" => Code::NumpadMultiply,
        "keypadplus" => Code::NumpadAdd,
        "keypadminus" => Code::NumpadSubtract,
        "keypaddivide" => Code::NumpadDivide,
        "keypadequals" => Code::NumpadEqual,
        "keypadenter" => Code::NumpadEnter,
        _ => return None,
    };
    Some(code)
}

/// Fold a modifier list into registration flags. Duplicates are harmless.
pub fn modifiers_to_flags(modifiers: &[Modifier]) -> Modifiers {
    let mut flags = Modifiers::empty();
    for modifier in modifiers {
        flags |= match modifier {
            Modifier::Command => Modifiers::META,
            Modifier::Option => Modifiers::ALT,
            Modifier::Control => Modifiers::CONTROL,
            Modifier::Shift => Modifiers::SHIFT,
        };
    }
    flags
}

/// Map a registration code to the observing backend's event key. Keys the
/// event tap cannot distinguish return `None`; the observing backend then
/// refuses the combination.
pub fn code_to_rdev_key(code: Code) -> Option<rdev::Key> {
    let key = match code {
        Code::KeyA => rdev::Key::KeyA,
        Code::KeyB => rdev::Key::KeyB,
        Code::KeyC => rdev::Key::KeyC,
        Code::KeyD => rdev::Key::KeyD,
        Code::KeyE => rdev::Key::KeyE,
        Code::KeyF => rdev::Key::KeyF,
        Code::KeyG => rdev::Key::KeyG,
        Code::KeyH => rdev::Key::KeyH,
        Code::KeyI => rdev::Key::KeyI,
        Code::KeyJ => rdev::Key::KeyJ,
        Code::KeyK => rdev::Key::KeyK,
        Code::KeyL => rdev::Key::KeyL,
        Code::KeyM => rdev::Key::KeyM,
        Code::KeyN => rdev::Key::KeyN,
        Code::KeyO => rdev::Key::KeyO,
        Code::KeyP => rdev::Key::KeyP,
        Code::KeyQ => rdev::Key::KeyQ,
        Code::KeyR => rdev::Key::KeyR,
        Code::KeyS => rdev::Key::KeyS,
        Code::KeyT => rdev::Key::KeyT,
        Code::KeyU => rdev::Key::KeyU,
        Code::KeyV => rdev::Key::KeyV,
        Code::KeyW => rdev::Key::KeyW,
        Code::KeyX => rdev::Key::KeyX,
        Code::KeyY => rdev::Key::KeyY,
        Code::KeyZ => rdev::Key::KeyZ,
        Code::Digit0 => rdev::Key::Num0,
        Code::Digit1 => rdev::Key::Num1,
        Code::Digit2 => rdev::Key::Num2,
        Code::Digit3 => rdev::Key::Num3,
        Code::Digit4 => rdev::Key::Num4,
        Code::Digit5 => rdev::Key::Num5,
        Code::Digit6 => rdev::Key::Num6,
        Code::Digit7 => rdev::Key::Num7,
        Code::Digit8 => rdev::Key::Num8,
        Code::Digit9 => rdev::Key::Num9,
        Code::F1 => rdev::Key::F1,
        Code::F2 => rdev::Key::F2,
        Code::F3 => rdev::Key::F3,
        Code::F4 => rdev::Key::F4,
        Code::F5 => rdev::Key::F5,
        Code::F6 => rdev::Key::F6,
        Code::F7 => rdev::Key::F7,
        Code::F8 => rdev::Key::F8,
        Code::F9 => rdev::Key::F9,
        Code::F10 => rdev::Key::F10,
        Code::F11 => rdev::Key::F11,
        Code::F12 => rdev::Key::F12,
        Code::ArrowUp => rdev::Key::UpArrow,
        Code::ArrowDown => rdev::Key::DownArrow,
        Code::ArrowLeft => rdev::Key::LeftArrow,
        Code::ArrowRight => rdev::Key::RightArrow,
        Code::Enter => rdev::Key::Return,
        Code::Tab => rdev::Key::Tab,
        Code::Space => rdev::Key::Space,
        Code::Escape => rdev::Key::Escape,
        Code::Backspace => rdev::Key::Backspace,
        Code::Delete => rdev::Key::Delete,
        Code::Home => rdev::Key::Home,
        Code::End => rdev::Key::End,
        Code::PageUp => rdev::Key::PageUp,
        Code::PageDown => rdev::Key::PageDown,
        Code::Equal => rdev::Key::Equal,
        Code::Minus => rdev::Key::Minus,
        Code::BracketLeft => rdev::Key::LeftBracket,
        Code::BracketRight => rdev::Key::RightBracket,
        Code::Quote => rdev::Key::Quote,
        Code::Semicolon => rdev::Key::SemiColon,
        Code::Backslash => rdev::Key::BackSlash,
        Code::Comma => rdev::Key::Comma,
        Code::Slash => rdev::Key::Slash,
        Code::Period => rdev::Key::Dot,
        Code::Backquote => rdev::Key::BackQuote,
        _ => return None,
    };
    Some(key)
}
