/// Collapse runs of whitespace to a single space and trim.
pub fn normalize_ws(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_space = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !prev_space {
                out.push(' ');
                prev_space = true;
            }
        } else {
            out.push(ch);
            prev_space = false;
        }
    }
    out.trim().to_string()
}

/// Filesystem-safe form of a species name: lowercase ASCII alphanumerics
/// separated by single hyphens. Accented letters are folded where common.
///
/// Distinct names can share a slug ("Robin" and "Robin!"); callers writing
/// files by slug will overwrite earlier output in that case.
pub fn slugify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_hyphen = true;
    for ch in name.chars() {
        let ch = fold_accent(ch);
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
            last_hyphen = false;
        } else if is_separator(ch) && !last_hyphen {
            out.push('-');
            last_hyphen = true;
        }
    }
    let out = out.trim_end_matches('-').to_string();
    if out.is_empty() {
        "bird".to_string()
    } else {
        out
    }
}

fn is_separator(ch: char) -> bool {
    ch.is_whitespace() || matches!(ch, '-' | '_' | '\'' | '/')
}

fn fold_accent(ch: char) -> char {
    match ch {
        'à' | 'á' | 'â' | 'ä' | 'ã' | 'å' => 'a',
        'ç' => 'c',
        'è' | 'é' | 'ê' | 'ë' => 'e',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'ñ' => 'n',
        'ò' | 'ó' | 'ô' | 'ö' | 'õ' | 'ø' => 'o',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        'ý' | 'ÿ' => 'y',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_ws() {
        assert_eq!(normalize_ws("  Barn \n\t owl  "), "Barn owl");
        assert_eq!(normalize_ws(""), "");
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Barn owl"), "barn-owl");
        assert_eq!(slugify("Black-headed gull"), "black-headed-gull");
        assert_eq!(slugify("Bewick's swan"), "bewick-s-swan");
        assert_eq!(slugify("  Robin!  "), "robin");
        assert_eq!(slugify("Pied / white wagtail"), "pied-white-wagtail");
        assert_eq!(slugify("Garganey (é)"), "garganey-e");
        assert_eq!(slugify("!!!"), "bird");
    }

    #[test]
    fn test_slug_collisions_are_possible() {
        assert_eq!(slugify("Robin"), slugify("Robin!"));
    }
}
