use super::{DecodeError, DELIMITER, ESCAPE};

/// Splits a line on unescaped delimiters, unescaping `\|` and `\\` as it goes.
pub(crate) fn split_escaped(line: &str) -> Result<Vec<String>, DecodeError> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars();
    while let Some(ch) = chars.next() {
        if ch == ESCAPE {
            match chars.next() {
                Some(next) if next == DELIMITER || next == ESCAPE => current.push(next),
                Some(next) => {
                    current.push(ESCAPE);
                    current.push(next);
                }
                None => return Err(DecodeError::DanglingEscape),
            }
        } else if ch == DELIMITER {
            fields.push(std::mem::take(&mut current));
        } else {
            current.push(ch);
        }
    }
    fields.push(current);
    Ok(fields)
}

fn escape_field(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    for ch in field.chars() {
        if ch == DELIMITER || ch == ESCAPE {
            out.push(ESCAPE);
        }
        out.push(ch);
    }
    out
}

pub(crate) fn join_escaped(fields: &[&str]) -> String {
    fields
        .iter()
        .map(|field| escape_field(field))
        .collect::<Vec<_>>()
        .join(&DELIMITER.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_survive_a_split() {
        let line = join_escaped(&["a|b", r"c\d", "", "plain"]);
        assert_eq!(line, r"a\|b|c\\d||plain");
        assert_eq!(
            split_escaped(&line).expect("split"),
            vec!["a|b", r"c\d", "", "plain"]
        );
    }

    #[test]
    fn unknown_escapes_are_kept_literally() {
        assert_eq!(split_escaped(r"C:\Users\me").expect("split"), vec![r"C:\Users\me"]);
    }

    #[test]
    fn trailing_escape_is_an_error() {
        assert_eq!(split_escaped("abc\\"), Err(DecodeError::DanglingEscape));
    }
}
