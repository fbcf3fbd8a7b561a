use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Alternation is ordered longest first so `XII` never resolves as `X` + `II`.
static ROMAN_REGEX: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"\b(XII|XI|IX|X|VIII|VII|VI|IV|V|III|II|I)\b").unwrap());

/// Uppercases and maps Cyrillic look-alikes onto the Latin characters used by numerals.
pub fn normalize_chars(text: &str) -> String {
  text
    .to_uppercase()
    .chars()
    .map(|c| match c {
      'Х' => 'X',
      'І' | 'Ӏ' => 'I',
      '–' | '—' | '‐' | '‑' => '-',
      c => c,
    })
    .collect()
}

fn roman_value(numeral: &str) -> Option<u8> {
  Some(match numeral {
    "I" => 1,
    "II" => 2,
    "III" => 3,
    "IV" => 4,
    "V" => 5,
    "VI" => 6,
    "VII" => 7,
    "VIII" => 8,
    "IX" => 9,
    "X" => 10,
    "XI" => 11,
    "XII" => 12,
    _ => return None,
  })
}

/// Replaces whole-word Roman numerals I to XII with Arabic numbers.
pub fn replace_roman_numerals(text: &str) -> String {
  ROMAN_REGEX
    .replace_all(text, |captures: &Captures| {
      let numeral = &captures[1];
      roman_value(numeral)
        .map(|value| value.to_string())
        .unwrap_or_else(|| numeral.to_string())
    })
    .into_owned()
}
