//! Cell-level parsing shared by the spreadsheet and CSV importers.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref SHEET_LIST_SEPARATOR: Regex = Regex::new(r"[,;/]|\sand\s").unwrap();
    static ref PEOPLE_SEPARATOR: Regex = Regex::new(r",|\band\b|&|\n").unwrap();
    static ref PEOPLE_NOISE: Regex = Regex::new(r"^(and their|with|including)").unwrap();
    static ref NEE_SUFFIX: Regex = Regex::new(r"\(nee [^)]+\)").unwrap();
    static ref LOCATION_SEPARATOR: Regex = Regex::new(r"[,;\n]").unwrap();
    static ref LOCATION_PREFIX: Regex = Regex::new(r"(?i)^locations?:?\s*").unwrap();
    static ref CHAPTER_LINE: Regex = Regex::new(r"^(\d{1,2}:\d{2}(?::\d{2})?)\s+(.+)$").unwrap();
    static ref BITFIELD_KEY: Regex = Regex::new(r"(?i)bitfield:\s*(.+)").unwrap();
}

/// Maximum stored length of a chapter title, in characters.
pub const CHAPTER_TITLE_MAX_CHARS: usize = 500;

fn trimmed_non_empty<'a>(parts: impl Iterator<Item = &'a str>) -> Vec<String> {
    parts
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Splits a spreadsheet list cell on `,`, `;`, `/` or a whitespace-delimited
/// ` and `.
pub fn split_sheet_list(cell: &str) -> Vec<String> {
    trimmed_non_empty(SHEET_LIST_SEPARATOR.split(cell))
}

/// Splits the CSV `People` cell and drops descriptive fragments such as
/// "with friends".
pub fn split_people_list(cell: &str) -> Vec<String> {
    trimmed_non_empty(PEOPLE_SEPARATOR.split(cell))
        .into_iter()
        .filter(|p| !PEOPLE_NOISE.is_match(&p.to_lowercase()))
        .collect()
}

/// First word and the rest; `(nee X)` is removed from the last name.
pub fn parse_person_name(full_name: &str) -> (String, String) {
    let parts: Vec<&str> = full_name.split_whitespace().collect();
    match parts.split_first() {
        None => (String::new(), String::new()),
        Some((first, rest)) => {
            let last = NEE_SUFFIX.replace_all(&rest.join(" "), "").trim().to_string();
            (first.to_string(), last)
        }
    }
}

/// Splits the CSV `Location` cell on `,`, `;` or newlines, strips a
/// `Location(s):` prefix and drops repeats, keeping first-seen order.
pub fn split_location_list(cell: &str) -> Vec<String> {
    let mut cleaned: Vec<String> = Vec::new();
    for part in trimmed_non_empty(LOCATION_SEPARATOR.split(cell)) {
        let name = LOCATION_PREFIX.replace(&part, "").trim().to_string();
        if !name.is_empty() && !cleaned.contains(&name) {
            cleaned.push(name);
        }
    }
    cleaned
}

/// `H:MM:SS` to seconds; anything else is `None`.
pub fn parse_duration(value: &str) -> Option<i64> {
    let parts: Vec<&str> = value.trim().split(':').collect();
    if parts.len() != 3 {
        return None;
    }
    let hours: i64 = parts[0].parse().ok()?;
    let minutes: i64 = parts[1].parse().ok()?;
    let seconds: i64 = parts[2].parse().ok()?;
    Some(hours * 3600 + minutes * 60 + seconds)
}

/// `(start_time, title)` for every line of the form `M:SS title` or
/// `H:MM:SS title`; other lines are ignored. Titles are truncated.
pub fn parse_chapter_lines(cell: &str) -> Vec<(String, String)> {
    cell.lines()
        .filter_map(|line| {
            let caps = CHAPTER_LINE.captures(line.trim())?;
            let title: String = caps[2].trim().chars().take(CHAPTER_TITLE_MAX_CHARS).collect();
            Some((caps[1].to_string(), title))
        })
        .collect()
}

/// Names listed after `Bitfield:` in a key cell, in bit order.
pub fn parse_bitfield_key(cell: &str) -> Vec<String> {
    match BITFIELD_KEY.captures(cell) {
        Some(caps) => caps[1].split(',').map(|n| n.trim().to_string()).collect(),
        None => vec![],
    }
}

/// Positions of `'1'` characters, only when the bitfield has exactly
/// `key_len` characters.
pub fn set_bits(bitfield: &str, key_len: usize) -> Vec<usize> {
    let bits: Vec<char> = bitfield.trim().chars().collect();
    if key_len == 0 || bits.len() != key_len {
        return vec![];
    }
    bits.iter()
        .enumerate()
        .filter(|(_, bit)| **bit == '1')
        .map(|(index, _)| index)
        .collect()
}

/// Accepts either a bare playlist id or a URL carrying `list=<id>`.
pub fn playlist_id(value: &str) -> String {
    let value = value.trim();
    match value.split_once('?') {
        Some((_, query)) => query
            .split('&')
            .find_map(|pair| pair.strip_prefix("list="))
            .map(|id| urlencoding::decode(id).map(|d| d.into_owned()).unwrap_or_else(|_| id.to_string()))
            .unwrap_or_default(),
        None => value.to_string(),
    }
}

/// Lowercased words of a chapter title.
pub fn title_words(title: &str) -> Vec<String> {
    title.to_lowercase().split_whitespace().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sheet_lists_split_on_separators_and_word_and() {
        assert_eq!(
            split_sheet_list("Anaheim, Disneyland/ Reno and Tahoe;"),
            vec!["Anaheim", "Disneyland", "Reno", "Tahoe"]
        );
        assert_eq!(split_sheet_list("Sandy Beach"), vec!["Sandy Beach"]);
    }

    #[test]
    fn people_lists_drop_descriptions() {
        assert_eq!(
            split_people_list("Ruth Hayward, Doug & Sandy Thompson\nwith friends and Bill"),
            vec!["Ruth Hayward", "Doug", "Sandy Thompson", "Bill"]
        );
    }

    #[test]
    fn person_names_strip_nee() {
        assert_eq!(
            parse_person_name("Ruth (nee Myre) Hayward"),
            ("Ruth".to_string(), "Hayward".to_string())
        );
        assert_eq!(parse_person_name("Doug"), ("Doug".to_string(), String::new()));
    }

    #[test]
    fn locations_strip_prefix_and_repeats() {
        assert_eq!(
            split_location_list("Locations: Reno; Oakland\nReno, Tahoe"),
            vec!["Reno", "Oakland", "Tahoe"]
        );
    }

    #[test]
    fn durations_need_three_parts() {
        assert_eq!(parse_duration("0:09:26"), Some(566));
        assert_eq!(parse_duration("9:26"), None);
        assert_eq!(parse_duration(""), None);
    }

    #[test]
    fn chapter_lines_and_truncation() {
        let long = "x".repeat(600);
        let parsed = parse_chapter_lines(&format!("0:00 Opening\nnot a chapter\n1:02:03 {}", long));
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0], ("0:00".to_string(), "Opening".to_string()));
        assert_eq!(parsed[1].1.chars().count(), CHAPTER_TITLE_MAX_CHARS);
    }

    #[test]
    fn bitfield_bits_follow_key() {
        let key = parse_bitfield_key("Haywards bitfield: Alice, Bob , Carol");
        assert_eq!(key, vec!["Alice", "Bob", "Carol"]);
        assert_eq!(set_bits("101", key.len()), vec![0, 2]);
        assert!(set_bits("10", key.len()).is_empty());
        assert!(parse_bitfield_key("nothing here").is_empty());
    }

    #[test]
    fn playlist_from_url_or_id() {
        assert_eq!(playlist_id("https://www.youtube.com/playlist?list=PLabc&x=1"), "PLabc");
        assert_eq!(playlist_id("PLabc"), "PLabc");
    }
}
