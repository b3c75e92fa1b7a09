//! Display configuration for the terminal controller

use crossterm::style::Color;
use serde::{Deserialize, Deserializer};

/// Foreground color used for reveal text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ForegroundColor {
    Black,
    Red,
    Green,
    Yellow,
    #[default]
    Blue,
    Magenta,
    Cyan,
    White,
}

impl ForegroundColor {
    pub const ALL: [ForegroundColor; 8] = [
        ForegroundColor::Black,
        ForegroundColor::Red,
        ForegroundColor::Green,
        ForegroundColor::Yellow,
        ForegroundColor::Blue,
        ForegroundColor::Magenta,
        ForegroundColor::Cyan,
        ForegroundColor::White,
    ];

    /// Looks up a color by its lowercase name.
    ///
    /// Missing or unrecognized names select the default (blue).
    pub fn from_name(name: Option<&str>) -> Self {
        let Some(name) = name else {
            return Self::default();
        };
        Self::ALL
            .into_iter()
            .find(|c| c.name() == name)
            .unwrap_or_else(|| {
                tracing::debug!("unknown color {:?}, using default", name);
                Self::default()
            })
    }

    pub fn name(self) -> &'static str {
        match self {
            ForegroundColor::Black => "black",
            ForegroundColor::Red => "red",
            ForegroundColor::Green => "green",
            ForegroundColor::Yellow => "yellow",
            ForegroundColor::Blue => "blue",
            ForegroundColor::Magenta => "magenta",
            ForegroundColor::Cyan => "cyan",
            ForegroundColor::White => "white",
        }
    }

    /// Terminal color for this foreground. All but black use the bright
    /// variant.
    pub fn to_color(self) -> Color {
        match self {
            ForegroundColor::Black => Color::Black,
            ForegroundColor::Red => Color::Red,
            ForegroundColor::Green => Color::Green,
            ForegroundColor::Yellow => Color::Yellow,
            ForegroundColor::Blue => Color::Blue,
            ForegroundColor::Magenta => Color::Magenta,
            ForegroundColor::Cyan => Color::Cyan,
            ForegroundColor::White => Color::White,
        }
    }
}

impl<'de> Deserialize<'de> for ForegroundColor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = Option::<String>::deserialize(deserializer)?;
        Ok(Self::from_name(name.as_deref()))
    }
}

/// Settings supplied by the outer program before the terminal is set up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Clear the screen and hide the cursor when entering raw mode.
    pub clear_screen: bool,
    pub foreground: ForegroundColor,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name_known() {
        for color in ForegroundColor::ALL {
            assert_eq!(ForegroundColor::from_name(Some(color.name())), color);
        }
    }

    #[test]
    fn test_from_name_fallback() {
        assert_eq!(ForegroundColor::from_name(None), ForegroundColor::Blue);
        assert_eq!(ForegroundColor::from_name(Some("purple")), ForegroundColor::Blue);
        assert_eq!(ForegroundColor::from_name(Some("")), ForegroundColor::Blue);
        // Names are matched exactly.
        assert_eq!(ForegroundColor::from_name(Some("Red")), ForegroundColor::Blue);
    }

    #[test]
    fn test_black_is_not_bright() {
        assert_eq!(ForegroundColor::Black.to_color(), Color::Black);
        assert_eq!(ForegroundColor::Red.to_color(), Color::Red);
    }

    #[test]
    fn test_config_from_json() {
        let config: DisplayConfig =
            serde_json::from_str(r#"{"clear_screen": true, "foreground": "green"}"#).unwrap();
        assert!(config.clear_screen);
        assert_eq!(config.foreground, ForegroundColor::Green);
    }

    #[test]
    fn test_config_from_json_defaults() {
        let config: DisplayConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, DisplayConfig::default());

        let config: DisplayConfig =
            serde_json::from_str(r#"{"foreground": "chartreuse"}"#).unwrap();
        assert_eq!(config.foreground, ForegroundColor::Blue);

        let config: DisplayConfig = serde_json::from_str(r#"{"foreground": null}"#).unwrap();
        assert_eq!(config.foreground, ForegroundColor::Blue);
    }
}
