//! Glob matching with the semantics of the Redis `KEYS`/`SCAN MATCH` patterns.

/// Returns true when `text` matches `pattern`.
///
/// Supports `*`, `?`, character classes (`[abc]`, `[a-z]`, `[^x]`) and `\`
/// escapes. An unterminated class is matched as a literal `[`.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut pi, mut ti) = (0, 0);
    // (pattern index of the last `*`, text index it currently absorbs up to)
    let mut backtrack: Option<(usize, usize)> = None;

    while ti < text.len() {
        if pattern.get(pi) == Some(&'*') {
            backtrack = Some((pi, ti));
            pi += 1;
            continue;
        }
        if let Some(next) = match_one(&pattern, pi, text[ti]) {
            pi = next;
            ti += 1;
            continue;
        }
        match backtrack {
            Some((star, absorbed)) => {
                pi = star + 1;
                ti = absorbed + 1;
                backtrack = Some((star, absorbed + 1));
            }
            None => return false,
        }
    }

    pattern[pi..].iter().all(|c| *c == '*')
}

/// Matches a single non-`*` token at `pi`, returning the index after it.
fn match_one(pattern: &[char], pi: usize, c: char) -> Option<usize> {
    match *pattern.get(pi)? {
        '*' => None,
        '?' => Some(pi + 1),
        '\\' if pi + 1 < pattern.len() => (pattern[pi + 1] == c).then_some(pi + 2),
        '[' => match match_class(pattern, pi, c) {
            Some((true, next)) => Some(next),
            Some((false, _)) => None,
            None => (c == '[').then_some(pi + 1),
        },
        literal => (literal == c).then_some(pi + 1),
    }
}

/// Evaluates the class opening at `start`. `None` when it is unterminated.
fn match_class(pattern: &[char], start: usize, c: char) -> Option<(bool, usize)> {
    let mut i = start + 1;
    let negate = pattern.get(i) == Some(&'^');
    if negate {
        i += 1;
    }

    let mut matched = false;
    while i < pattern.len() && pattern[i] != ']' {
        if pattern[i] == '\\' && i + 1 < pattern.len() {
            matched |= pattern[i + 1] == c;
            i += 2;
        } else if i + 2 < pattern.len() && pattern[i + 1] == '-' && pattern[i + 2] != ']' {
            let (lo, hi) = ordered(pattern[i], pattern[i + 2]);
            matched |= (lo..=hi).contains(&c);
            i += 3;
        } else {
            matched |= pattern[i] == c;
            i += 1;
        }
    }

    if i >= pattern.len() {
        return None;
    }
    Some((matched != negate, i + 1))
}

fn ordered(a: char, b: char) -> (char, char) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Escapes glob metacharacters so `value` only matches itself.
pub fn escape_glob(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
