//! Slug derivation for learning categories
//!
//! Category names are often Cyrillic; slugs must be URL-safe Latin. The
//! transliteration table is fixed so derivation stays deterministic.

/// Transliterate Cyrillic characters to Latin and normalize separators.
fn transliterate(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.to_lowercase().chars() {
        match ch {
            'а' => out.push('a'),
            'б' => out.push('b'),
            'в' => out.push('v'),
            'г' => out.push('g'),
            'д' => out.push('d'),
            'е' => out.push('e'),
            'ё' => out.push_str("yo"),
            'ж' => out.push_str("zh"),
            'з' => out.push('z'),
            'и' => out.push('i'),
            'й' => out.push('y'),
            'к' => out.push('k'),
            'л' => out.push('l'),
            'м' => out.push('m'),
            'н' => out.push('n'),
            'о' => out.push('o'),
            'п' => out.push('p'),
            'р' => out.push('r'),
            'с' => out.push('s'),
            'т' => out.push('t'),
            'у' => out.push('u'),
            'ф' => out.push('f'),
            'х' => out.push_str("kh"),
            'ц' => out.push_str("ts"),
            'ч' => out.push_str("ch"),
            'ш' => out.push_str("sh"),
            'щ' => out.push_str("sch"),
            'ъ' | 'ь' => {}
            'ы' => out.push('y'),
            'э' => out.push('e'),
            'ю' => out.push_str("yu"),
            'я' => out.push_str("ya"),
            ' ' | '_' => out.push('-'),
            other => out.push(other),
        }
    }
    out
}

/// Sanitize an arbitrary string into slug form: lowercase ASCII
/// alphanumerics and single hyphens, no edge hyphens.
fn sanitize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_hyphen = true; // suppress leading hyphens
    for ch in text.to_lowercase().chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch);
            prev_hyphen = false;
        } else if ch == '-' && !prev_hyphen {
            out.push('-');
            prev_hyphen = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// Derive a slug from a category name.
pub fn slugify(name: &str) -> String {
    sanitize(&transliterate(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cyrillic_name_maps_to_latin() {
        let slug = slugify("Алгебра");
        assert_eq!(slug, "algebra");
        assert!(slug.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'));
    }

    #[test]
    fn test_multi_char_mappings() {
        assert_eq!(slugify("Ёжик"), "yozhik");
        assert_eq!(slugify("Химия"), "khimiya");
        assert_eq!(slugify("Счёт"), "schyot");
    }

    #[test]
    fn test_spaces_and_underscores_become_hyphens() {
        assert_eq!(slugify("Высшая математика"), "vysshaya-matematika");
        assert_eq!(slugify("linear_algebra"), "linear-algebra");
    }

    #[test]
    fn test_soft_and_hard_signs_dropped() {
        assert_eq!(slugify("Подъезд"), "podezd");
    }

    #[test]
    fn test_collapses_repeats_and_trims_edges() {
        assert_eq!(slugify("  math -- basics  "), "math-basics");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_deterministic_and_idempotent() {
        let once = slugify("Теория вероятностей");
        let twice = slugify("Теория вероятностей");
        assert_eq!(once, twice);
        // Re-slugging a slug is a no-op
        assert_eq!(slugify(&once), once);
    }
}
