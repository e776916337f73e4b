//! Glob-style key pattern matching.

/// Match `key` against a glob-style `pattern`.
///
/// Supports `*` (any run of characters, including empty) and `?` (exactly
/// one character). All other characters match literally. This mirrors the
/// subset of glob syntax used for bulk cache invalidation patterns like
/// `cache:get_user:*`.
pub fn key_matches(pattern: &str, key: &str) -> bool {
    let pat: Vec<char> = pattern.chars().collect();
    let txt: Vec<char> = key.chars().collect();

    let (mut p, mut t) = (0usize, 0usize);
    // Position of the last `*` seen and the text position it was tried at,
    // for backtracking when a literal run fails to match.
    let (mut star, mut mark) = (None::<usize>, 0usize);

    while t < txt.len() {
        if p < pat.len() && (pat[p] == '?' || pat[p] == txt[t]) {
            p += 1;
            t += 1;
        } else if p < pat.len() && pat[p] == '*' {
            star = Some(p);
            mark = t;
            p += 1;
        } else if let Some(s) = star {
            // Let the last `*` absorb one more character and retry.
            p = s + 1;
            mark += 1;
            t = mark;
        } else {
            return false;
        }
    }

    // Trailing `*`s match the empty string.
    while p < pat.len() && pat[p] == '*' {
        p += 1;
    }

    p == pat.len()
}
