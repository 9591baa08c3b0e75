//! Custom URL slugs.

/// Lowercase ASCII alphanumerics; every run of anything else becomes one `-`; trimmed.
pub fn slugify(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_dash = false;
    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    out
}

/// Truncate to `max` bytes without leaving a trailing dash (slugs are ASCII).
pub fn truncate_slug(slug: &str, max: usize) -> String {
    if slug.len() <= max {
        return slug.to_string();
    }
    slug[..max].trim_end_matches('-').to_string()
}

/// `base` if unused, otherwise `base-N` for the smallest N >= 2 not in `taken`.
pub fn next_free_slug(base: &str, taken: &[String]) -> String {
    if !taken.iter().any(|t| t == base) {
        return base.to_string();
    }
    let prefix = format!("{}-", base);
    let mut used: Vec<u64> = taken
        .iter()
        .filter_map(|t| t.strip_prefix(&prefix))
        .filter_map(|n| n.parse().ok())
        .collect();
    used.sort_unstable();
    let mut n = 2;
    for u in used {
        if u == n {
            n += 1;
        } else if u > n {
            break;
        }
    }
    format!("{}-{}", base, n)
}

pub fn is_slug(s: &str) -> bool {
    !s.is_empty() && slugify(s) == s
}
