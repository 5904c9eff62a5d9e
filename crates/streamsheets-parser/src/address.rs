//! A1-style cell addresses and ranges
//!
//! The formula core never resolves addresses itself. These helpers are for
//! sheets implementing [`Reference`](crate::Reference), so that every sheet
//! reads `$B$2` and `A1:C3` the same way.

use std::fmt;

/// Zero-based cell position parsed from `A1` notation (`$` markers allowed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellAddress {
    pub row: u32,
    pub col: u32,
    pub row_absolute: bool,
    pub col_absolute: bool,
}

impl CellAddress {
    pub fn new(row: u32, col: u32) -> Self {
        Self {
            row,
            col,
            row_absolute: false,
            col_absolute: false,
        }
    }

    /// Parse `A1`, `$B$2`, `c10` and the like. Returns `None` for anything
    /// that is not a single cell address.
    ///
    /// ```
    /// use streamsheets_parser::CellAddress;
    ///
    /// let address = CellAddress::parse("$AB$12").unwrap();
    /// assert_eq!((address.col, address.row), (27, 11));
    /// assert_eq!(address.to_string(), "AB12");
    /// assert!(CellAddress::parse("A0").is_none());
    /// ```
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let (col_absolute, rest) = strip_dollar(text);
        let letters_end = rest
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(rest.len());
        let (letters, rest) = rest.split_at(letters_end);
        let (row_absolute, digits) = strip_dollar(rest);

        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let col = Self::letters_to_column(letters)?;
        let row = digits.parse::<u32>().ok()?.checked_sub(1)?;
        Some(Self {
            row,
            col,
            row_absolute,
            col_absolute,
        })
    }

    /// Column index to letters (0 = A, 25 = Z, 26 = AA)
    pub fn column_to_letters(col: u32) -> String {
        let mut letters = Vec::new();
        let mut n = col as u64 + 1;
        while n > 0 {
            n -= 1;
            letters.push((b'A' + (n % 26) as u8) as char);
            n /= 26;
        }
        letters.iter().rev().collect()
    }

    /// Column letters to index (A = 0). `None` if empty, not ASCII letters,
    /// or out of range.
    pub fn letters_to_column(letters: &str) -> Option<u32> {
        if letters.is_empty() {
            return None;
        }
        let mut col: u32 = 0;
        for c in letters.chars() {
            if !c.is_ascii_alphabetic() {
                return None;
            }
            let digit = c.to_ascii_uppercase() as u32 - 'A' as u32 + 1;
            col = col.checked_mul(26)?.checked_add(digit)?;
        }
        Some(col - 1)
    }

    /// A1 text including the `$` markers
    pub fn to_a1_string(&self) -> String {
        format!(
            "{}{}{}{}",
            if self.col_absolute { "$" } else { "" },
            Self::column_to_letters(self.col),
            if self.row_absolute { "$" } else { "" },
            self.row as u64 + 1
        )
    }
}

/// Relative form without `$` markers, e.g. `B2`; suitable as a lookup key.
impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", Self::column_to_letters(self.col), self.row as u64 + 1)
    }
}

fn strip_dollar(text: &str) -> (bool, &str) {
    match text.strip_prefix('$') {
        Some(rest) => (true, rest),
        None => (false, text),
    }
}

/// Rectangular range such as `A1:C3`, normalized so `start` is top-left
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRange {
    pub start: CellAddress,
    pub end: CellAddress,
}

impl CellRange {
    pub fn new(a: CellAddress, b: CellAddress) -> Self {
        Self {
            start: CellAddress::new(a.row.min(b.row), a.col.min(b.col)),
            end: CellAddress::new(a.row.max(b.row), a.col.max(b.col)),
        }
    }

    /// Parse `A1:B3`; corners may be given in any order.
    pub fn parse(text: &str) -> Option<Self> {
        let (from, to) = text.split_once(':')?;
        Some(Self::new(CellAddress::parse(from)?, CellAddress::parse(to)?))
    }

    /// Addresses in row-major order
    pub fn cells(&self) -> impl Iterator<Item = CellAddress> {
        let (start, end) = (self.start, self.end);
        (start.row..=end.row)
            .flat_map(move |row| (start.col..=end.col).map(move |col| CellAddress::new(row, col)))
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}
