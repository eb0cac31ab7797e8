//! `*` / `?` wildcard matching.

/// Match `text` against a pattern where `*` matches any run of characters
/// and `?` matches exactly one.
///
/// Iterative, with a single backtrack point at the most recent `*`: linear
/// space and no limit on pattern or text length.
pub fn matches(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    // Pattern index after the last `*`, and the text index it is retried at.
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && p[pi] == '*' {
            pi += 1;
            star = Some((pi, ti));
        } else if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if let Some((after_star, retry)) = star {
            // Let the star swallow one more character.
            pi = after_star;
            ti = retry + 1;
            star = Some((after_star, ti));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|&c| c == '*')
}

/// Case-insensitive variant of [`matches`].
pub fn matches_ignore_case(pattern: &str, text: &str) -> bool {
    matches(&pattern.to_lowercase(), &text.to_lowercase())
}
