//! Parsing and quoting of `DIGEST-MD5` directives (RFC 2831 §7.1).

/// A list of `key=value` directives, in the order they were received.
#[derive(Debug, Default)]
pub(super) struct Directives<'c> {
    pairs: Vec<(&'c str, String)>,
}

impl<'c> Directives<'c> {
    pub fn parse(input: &'c str) -> Option<Self> {
        let mut pairs = Vec::new();
        let mut rest = input;

        loop {
            rest = rest.trim_start_matches(|c: char| c == ',' || c.is_ascii_whitespace());
            if rest.is_empty() {
                break Some(Self { pairs });
            }

            let (key, tail) = rest.split_once('=')?;
            let key = key.trim();
            if key.is_empty() || !key.bytes().all(is_token) {
                return None;
            }

            let tail = tail.trim_start();
            let (value, tail) = match tail.strip_prefix('"') {
                Some(quoted) => {
                    let (value, tail) = unquote(quoted)?;
                    let tail = tail.trim_start();

                    if !tail.is_empty() && !tail.starts_with(',') {
                        return None;
                    }

                    (value, tail)
                }
                None => {
                    let end = tail.find(',').unwrap_or(tail.len());

                    (tail[..end].trim_end().to_owned(), &tail[end..])
                }
            };

            pairs.push((key, value));
            rest = tail;
        }
    }

    /// First value of the directive named `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, value)| value.as_str())
    }

    /// All the values of the directive named `key`, in order.
    pub fn all<'s>(&'s self, key: &'s str) -> impl Iterator<Item = &'s str> + 's {
        self.pairs
            .iter()
            .filter(move |(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, value)| value.as_str())
    }
}

fn is_token(b: u8) -> bool {
    b.is_ascii_graphic() && !b"()<>@,;:\\\"/[]?={}".contains(&b)
}

fn unquote(input: &str) -> Option<(String, &str)> {
    let mut value = String::new();
    let mut escaped = false;

    for (i, c) in input.char_indices() {
        match c {
            _ if escaped => {
                value.push(c);
                escaped = false;
            }
            '\\' => escaped = true,
            '"' => return Some((value, &input[i + 1..])),
            _ => value.push(c),
        }
    }

    None
}

/// Render `value` as a quoted-string.
pub(super) fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);

    quoted.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');

    quoted
}
