//! Deterministic Greek-to-Latin ("Greeklish") transliteration for the
//! `OriginalName` module's `greeklish` option (spec.md 4.3).
//!
//! A flat `static` match table, not a generated const-map crate: the
//! teacher avoids adding a dependency for small fixed lookup tables (see
//! `gc::size`'s unit-suffix table), and Greek has few enough letters that a
//! match arm per character is the obvious representation.

/// Transliterates `input` character by character. Characters with no
/// mapping (digits, Latin letters, punctuation) pass through unchanged.
pub fn transliterate(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match transliterate_char(c) {
            Some(mapped) => out.push_str(mapped),
            None => out.push(c),
        }
    }
    out
}

fn transliterate_char(c: char) -> Option<&'static str> {
    Some(match c {
        'Α' => "A",
        'Β' => "V",
        'Γ' => "G",
        'Δ' => "D",
        'Ε' => "E",
        'Ζ' => "Z",
        'Η' => "I",
        'Θ' => "Th",
        'Ι' => "I",
        'Κ' => "K",
        'Λ' => "L",
        'Μ' => "M",
        'Ν' => "N",
        'Ξ' => "X",
        'Ο' => "O",
        'Π' => "P",
        'Ρ' => "R",
        'Σ' => "S",
        'Τ' => "T",
        'Υ' => "Y",
        'Φ' => "F",
        'Χ' => "Ch",
        'Ψ' => "Ps",
        'Ω' => "O",
        'α' => "a",
        'β' => "v",
        'γ' => "g",
        'δ' => "d",
        'ε' => "e",
        'ζ' => "z",
        'η' => "i",
        'θ' => "th",
        'ι' => "i",
        'κ' => "k",
        'λ' => "l",
        'μ' => "m",
        'ν' => "n",
        'ξ' => "x",
        'ο' => "o",
        'π' => "p",
        'ρ' => "r",
        'ς' => "s",
        'σ' => "s",
        'τ' => "t",
        'υ' => "y",
        'φ' => "f",
        'χ' => "ch",
        'ψ' => "ps",
        'ω' => "o",
        'ά' => "a",
        'έ' => "e",
        'ή' => "i",
        'ί' => "i",
        'ό' => "o",
        'ύ' => "y",
        'ώ' => "o",
        'ϊ' => "i",
        'ϋ' => "y",
        _ => return None,
    })
}
