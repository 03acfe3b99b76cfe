//! Language code tables.
//!
//! Streams are tagged with ISO 639-2 codes in either the bibliographic (`fre`)
//! or terminologic (`fra`) spelling. Everything here treats the two as
//! equivalent and prefers the bibliographic form when normalizing.

/// Display name for a language code, used for regenerated track titles.
pub fn language_name(code: &str) -> Option<&'static str> {
    let name = match code {
        "eng" => "English",
        "spa" => "Spanish",
        "fre" | "fra" => "French",
        "ger" | "deu" => "German",
        "ita" => "Italian",
        "por" => "Portuguese",
        "jpn" => "Japanese",
        "chi" | "zho" => "Chinese",
        "kor" => "Korean",
        "rus" => "Russian",
        "ara" => "Arabic",
        "hin" => "Hindi",
        "tha" => "Thai",
        "vie" => "Vietnamese",
        "pol" => "Polish",
        "dut" | "nld" => "Dutch",
        "swe" => "Swedish",
        "nor" => "Norwegian",
        "dan" => "Danish",
        "fin" => "Finnish",
        "ces" | "cze" => "Czech",
        "hun" => "Hungarian",
        "tur" => "Turkish",
        "gre" | "ell" => "Greek",
        "heb" => "Hebrew",
        _ => return None,
    };
    Some(name)
}

/// The other ISO 639-2 spelling of a code, for the languages that have two.
pub fn alternate_code(code: &str) -> Option<&'static str> {
    let alt = match code {
        "fre" => "fra",
        "fra" => "fre",
        "ger" => "deu",
        "deu" => "ger",
        "chi" => "zho",
        "zho" => "chi",
        "dut" => "nld",
        "nld" => "dut",
        "gre" => "ell",
        "ell" => "gre",
        _ => return None,
    };
    Some(alt)
}

/// Normalize a language name or code to an ISO 639-2/B code, `"und"` if unknown.
///
/// ```
/// use remuxcode_av::language::normalize_language;
///
/// assert_eq!(normalize_language("Japanese"), "jpn");
/// assert_eq!(normalize_language("fr"), "fre");
/// assert_eq!(normalize_language("deu"), "ger");
/// assert_eq!(normalize_language("Klingon"), "und");
/// ```
pub fn normalize_language(raw: &str) -> &'static str {
    match raw.trim().to_lowercase().as_str() {
        "japanese" | "ja" | "jpn" => "jpn",
        "english" | "en" | "eng" => "eng",
        "korean" | "ko" | "kor" => "kor",
        "chinese" | "mandarin" | "cantonese" | "zh" | "chi" | "zho" => "chi",
        "spanish" | "es" | "spa" => "spa",
        "french" | "fr" | "fre" | "fra" => "fre",
        "german" | "de" | "ger" | "deu" => "ger",
        "italian" | "it" | "ita" => "ita",
        "portuguese" | "pt" | "por" => "por",
        "russian" | "ru" | "rus" => "rus",
        "arabic" | "ar" | "ara" => "ara",
        "hindi" | "hi" | "hin" => "hin",
        "thai" | "th" | "tha" => "tha",
        "vietnamese" | "vi" | "vie" => "vie",
        "polish" | "pl" | "pol" => "pol",
        "dutch" | "nl" | "dut" | "nld" => "dut",
        "swedish" | "sv" | "swe" => "swe",
        "norwegian" | "no" | "nor" => "nor",
        "danish" | "da" | "dan" => "dan",
        "finnish" | "fi" | "fin" => "fin",
        "czech" | "cs" | "cze" | "ces" => "cze",
        "hungarian" | "hu" | "hun" => "hun",
        "turkish" | "tr" | "tur" => "tur",
        "greek" | "el" | "gre" | "ell" => "gre",
        "hebrew" | "he" | "heb" => "heb",
        _ => "und",
    }
}
