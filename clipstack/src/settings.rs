//! Typed view over the persisted settings keys.

use serde_json::Value;

use crate::interface::{Modifier, ShortcutSpec};
use crate::storage::SettingsStore;

pub const KEY_MAX_HISTORY_ITEMS: &str = "maxHistoryItems";
pub const KEY_MAX_HISTORY_DAYS: &str = "maxHistoryDays";
pub const KEY_SHORTCUT_MODIFIERS: &str = "globalShortcutModifiers";
pub const KEY_SHORTCUT_KEY: &str = "globalShortcutKey";
pub const KEY_LAUNCH_AT_LOGIN: &str = "launchAtLogin";
pub const KEY_SHOW_MENU_BAR_ICON: &str = "showMenuBarIcon";
pub const KEY_APPEARANCE_MODE: &str = "appearanceMode";

pub const DEFAULT_MAX_HISTORY_ITEMS: usize = 100;
pub const DEFAULT_MAX_HISTORY_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Appearance {
    System,
    Light,
    Dark,
}

impl Appearance {
    pub fn key_name(&self) -> &'static str {
        match self {
            Appearance::System => "system",
            Appearance::Light => "light",
            Appearance::Dark => "dark",
        }
    }

    pub fn from_key_name(name: &str) -> Option<Self> {
        match name {
            "system" => Some(Appearance::System),
            "light" => Some(Appearance::Light),
            "dark" => Some(Appearance::Dark),
            _ => None,
        }
    }
}

/// Settings as the rest of the crate consumes them. Unknown or missing keys
/// fall back to defaults; a partial settings file is normal on first run.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub max_history_items: usize,
    pub max_history_days: i64,
    pub shortcut: ShortcutSpec,
    pub launch_at_login: bool,
    pub show_menu_bar_icon: bool,
    pub appearance: Appearance,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_history_items: DEFAULT_MAX_HISTORY_ITEMS,
            max_history_days: DEFAULT_MAX_HISTORY_DAYS,
            shortcut: ShortcutSpec::default(),
            launch_at_login: false,
            show_menu_bar_icon: true,
            appearance: Appearance::System,
        }
    }
}

impl Settings {
    pub fn load(store: &SettingsStore) -> Self {
        let defaults = Settings::default();

        let modifiers = store
            .get_string_list(KEY_SHORTCUT_MODIFIERS)
            .map(|names| {
                names
                    .iter()
                    .filter_map(|n| Modifier::from_key_name(n))
                    .collect::<Vec<_>>()
            })
            .filter(|mods| !mods.is_empty())
            .unwrap_or_else(|| defaults.shortcut.modifiers.clone());
        let key = store
            .get_string(KEY_SHORTCUT_KEY)
            .filter(|k| !k.is_empty())
            .unwrap_or_else(|| defaults.shortcut.key.clone());

        Self {
            max_history_items: store
                .get_u64(KEY_MAX_HISTORY_ITEMS)
                .map(|n| n as usize)
                .unwrap_or(defaults.max_history_items),
            max_history_days: store
                .get_u64(KEY_MAX_HISTORY_DAYS)
                .map(|n| n as i64)
                .unwrap_or(defaults.max_history_days),
            shortcut: ShortcutSpec::new(modifiers, key),
            launch_at_login: store
                .get_bool(KEY_LAUNCH_AT_LOGIN)
                .unwrap_or(defaults.launch_at_login),
            show_menu_bar_icon: store
                .get_bool(KEY_SHOW_MENU_BAR_ICON)
                .unwrap_or(defaults.show_menu_bar_icon),
            appearance: store
                .get_string(KEY_APPEARANCE_MODE)
                .and_then(|s| Appearance::from_key_name(&s))
                .unwrap_or(defaults.appearance),
        }
    }

    pub fn save(&self, store: &SettingsStore) {
        store.set(
            KEY_MAX_HISTORY_ITEMS,
            Value::from(self.max_history_items as u64),
        );
        store.set(
            KEY_MAX_HISTORY_DAYS,
            Value::from(self.max_history_days as u64),
        );
        store.set(
            KEY_SHORTCUT_MODIFIERS,
            Value::from(
                self.shortcut
                    .modifiers
                    .iter()
                    .map(|m| m.key_name())
                    .collect::<Vec<_>>(),
            ),
        );
        store.set(KEY_SHORTCUT_KEY, Value::from(self.shortcut.key.clone()));
        store.set(KEY_LAUNCH_AT_LOGIN, Value::from(self.launch_at_login));
        store.set(
            KEY_SHOW_MENU_BAR_ICON,
            Value::from(self.show_menu_bar_icon),
        );
        store.set(
            KEY_APPEARANCE_MODE,
            Value::from(self.appearance.key_name()),
        );
    }
}
