//! Locale-dependent separator tables

use crate::error::{ErrorCode, ParserError, ParserResult};

/// Decimal and parameter separators used to read and write formulas.
///
/// Both characters must differ, otherwise `1,2` could be read either as a
/// number or as two parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Separators {
    decimal: char,
    parameter: char,
}

impl Separators {
    /// English style: `1.5` and `SUM(1,2)`
    pub const DEFAULT: Separators = Separators {
        decimal: '.',
        parameter: ',',
    };

    /// Create a separator pair, failing if both characters are equal.
    pub fn new(decimal: char, parameter: char) -> ParserResult<Self> {
        if decimal == parameter {
            return Err(ParserError::new(
                format!("Decimal and parameter separator must differ, both are '{decimal}'"),
                0,
                ErrorCode::INVALID_SEPARATORS,
            ));
        }
        Ok(Self { decimal, parameter })
    }

    /// Separators for a locale tag such as `"de"` or `"en-US"`.
    pub fn for_locale(tag: &str) -> Self {
        Locale::from_tag(tag).separators()
    }

    pub fn decimal(&self) -> char {
        self.decimal
    }

    pub fn parameter(&self) -> char {
        self.parameter
    }
}

impl Default for Separators {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Locales with a known separator table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    En,
    De,
    Fr,
    Es,
    It,
    Nl,
    Pt,
    Ru,
}

impl Locale {
    /// Resolve a tag like `"de-AT"`; unknown tags fall back to English.
    pub fn from_tag(tag: &str) -> Self {
        let lang = tag
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        match lang.as_str() {
            "de" => Locale::De,
            "fr" => Locale::Fr,
            "es" => Locale::Es,
            "it" => Locale::It,
            "nl" => Locale::Nl,
            "pt" => Locale::Pt,
            "ru" => Locale::Ru,
            _ => Locale::En,
        }
    }

    pub fn separators(self) -> Separators {
        match self {
            Locale::En => Separators::DEFAULT,
            // every comma-decimal locale uses ';' between parameters
            _ => Separators {
                decimal: ',',
                parameter: ';',
            },
        }
    }
}
