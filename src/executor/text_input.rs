// `adb shell input text` is re-parsed by the device shell. Spaces become
// `%s` (decoded by `input` itself) and the whole argument is single-quoted,
// so no character of the text is ever interpreted by the shell.

pub fn escape_for_input(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    out.push('\'');
    for c in text.chars() {
        match c {
            ' ' => out.push_str("%s"),
            '\'' => out.push_str("'\\''"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Undoes POSIX sh quoting for a word made of single-quoted runs joined
    /// by `\'`. Panics on anything the shell would treat specially.
    fn sh_unquote(word: &str) -> String {
        let mut out = String::new();
        let mut rest = word;
        while !rest.is_empty() {
            if let Some(tail) = rest.strip_prefix("\\'") {
                out.push('\'');
                rest = tail;
                continue;
            }
            let tail = rest.strip_prefix('\'').expect("unquoted shell text");
            let end = tail.find('\'').expect("unterminated quote");
            out.push_str(&tail[..end]);
            rest = &tail[end + 1..];
        }
        out
    }

    #[test]
    fn spaces_and_metacharacters() {
        assert_eq!(escape_for_input("watermelon near me"), "'watermelon%snear%sme'");
        assert_eq!(escape_for_input("salt & (pepper)"), "'salt%s&%s(pepper)'");
        assert_eq!(escape_for_input("kid's"), "'kid'\\''s'");
        assert_eq!(escape_for_input("plain"), "'plain'");
        assert_eq!(escape_for_input(""), "''");
    }

    #[test]
    fn command_substitution_stays_literal() {
        let hostile = "`reboot` $HOME $(id) \\n * ? ~ ! [a] {b} # ; | & < > \"q\" 'x'";
        let escaped = escape_for_input(hostile);
        assert_eq!(sh_unquote(&escaped), hostile.replace(' ', "%s"));
        assert!(escaped.starts_with('\'') && escaped.ends_with('\''));
    }
}
