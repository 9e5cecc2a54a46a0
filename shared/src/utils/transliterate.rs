//! Label and title normalization
//!
//! Turns arbitrary Unicode text into a path segment made of lowercase ASCII
//! letters, digits and single underscores.

use regex::Regex;
use std::sync::OnceLock;

/// Runs of anything that is not an ASCII letter or digit (underscores included)
fn separator_regex() -> &'static Regex {
    static SEPARATOR: OnceLock<Regex> = OnceLock::new();
    SEPARATOR.get_or_init(|| Regex::new(r"[^a-zA-Z0-9]+").expect("separator pattern compiles"))
}

/// Latin replacement for a lowercase Cyrillic letter
fn cyrillic_to_latin(c: char) -> Option<&'static str> {
    let latin = match c {
        'а' => "a",
        'б' => "b",
        'в' => "v",
        'г' => "g",
        'д' => "d",
        'е' => "e",
        'ё' => "e",
        'ж' => "zh",
        'з' => "z",
        'и' => "i",
        'й' => "j",
        'к' => "k",
        'л' => "l",
        'м' => "m",
        'н' => "n",
        'о' => "o",
        'п' => "p",
        'р' => "r",
        'с' => "s",
        'т' => "t",
        'у' => "u",
        'ф' => "f",
        'х' => "h",
        'ц' => "c",
        'ч' => "ch",
        'ш' => "sh",
        'щ' => "shch",
        'ъ' => "",
        'ы' => "y",
        'ь' => "",
        'э' => "e",
        'ю' => "ju",
        'я' => "ya",
        _ => return None,
    };
    Some(latin)
}

/// Whether the character belongs to the basic Russian alphabet
/// (U+0410..=U+044F plus Ё/ё)
pub fn is_russian_char(c: char) -> bool {
    matches!(c, '\u{0410}'..='\u{044F}' | '\u{0401}' | '\u{0451}')
}

/// Normalize text into a safe path segment
///
/// Lowercases, transliterates Cyrillic, collapses every run of non
/// alphanumeric ASCII characters into one `_` and trims `_` from both ends.
///
/// ```
/// use passferry_shared::utils::transliterate::normalize;
///
/// assert_eq!(normalize("Hello, World!"), "hello_world");
/// assert_eq!(normalize("Привет мир"), "privet_mir");
/// assert_eq!(normalize(""), "");
/// ```
pub fn normalize(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let lowered = text.to_lowercase();
    let mut latin = String::with_capacity(lowered.len());
    for c in lowered.chars() {
        if is_russian_char(c) {
            if let Some(replacement) = cyrillic_to_latin(c) {
                latin.push_str(replacement);
            }
            continue;
        }
        latin.push(c);
    }

    separator_regex()
        .replace_all(&latin, "_")
        .trim_matches('_')
        .to_string()
}
