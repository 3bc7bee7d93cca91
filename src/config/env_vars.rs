/// Expand `$VAR` and `${VAR}` references in a pbs.conf value from the
/// process environment. Unknown variables are left as written.
pub fn parse_unix_env_vars(value: &str) -> String {
    expand_vars_with(value, |name| std::env::var(name).ok())
}

/// Expand `$VAR` and `${VAR}` references using `lookup`.
///
/// A variable name is the longest run of ASCII alphanumerics and `_`
/// following `$`. Unterminated `${` and lone `$` are copied through.
pub fn expand_vars_with<F>(value: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let bytes = value.as_bytes();
    let mut result = String::with_capacity(value.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'$' {
            // Copy one whole UTF-8 character
            let ch_len = value[i..].chars().next().map(|c| c.len_utf8()).unwrap_or(1);
            result.push_str(&value[i..i + ch_len]);
            i += ch_len;
            continue;
        }

        // ${VAR}
        if i + 1 < bytes.len() && bytes[i + 1] == b'{' {
            if let Some(end) = value[i + 2..].find('}') {
                let name = &value[i + 2..i + 2 + end];
                match lookup(name) {
                    Some(v) => result.push_str(&v),
                    None => result.push_str(&value[i..i + 3 + end]),
                }
                i += 3 + end;
            } else {
                result.push_str(&value[i..]);
                break;
            }
            continue;
        }

        // $VAR
        let mut end = i + 1;
        while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_') {
            end += 1;
        }
        if end == i + 1 {
            result.push('$');
            i += 1;
            continue;
        }
        let name = &value[i + 1..end];
        match lookup(name) {
            Some(v) => result.push_str(&v),
            None => result.push_str(&value[i..end]),
        }
        i = end;
    }

    result
}
