/// Mask a URL that may embed credentials (webhook paths, database tokens).
///
/// Short values are hidden entirely; longer ones keep the first 10 and last 7
/// characters.
pub fn mask_url(url: &str) -> String {
    mask(url, 20, 10, 7)
}

/// Mask an API token, keeping the first and last 4 characters of values longer
/// than 10 characters.
pub fn mask_token(token: &str) -> String {
    mask(token, 10, 4, 4)
}

fn mask(value: &str, hide_up_to: usize, head: usize, tail: usize) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= hide_up_to {
        return "***".to_string();
    }

    let start: String = chars[..head].iter().collect();
    let end: String = chars[chars.len() - tail..].iter().collect();
    format!("{start}***{end}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_urls_are_fully_hidden() {
        assert_eq!(mask_url("https://a.io/x"), "***");
        assert_eq!(mask_url("12345678901234567890"), "***");
    }

    #[test]
    fn long_urls_keep_head_and_tail() {
        assert_eq!(
            mask_url("https://hooks.slack.com/services/T000/B000/abcdefg"),
            "https://ho***abcdefg"
        );
    }

    #[test]
    fn tokens_keep_four_on_each_side() {
        assert_eq!(mask_token("0123456789"), "***");
        assert_eq!(mask_token("eyJhbGciOiJFZERTQSJ9"), "eyJh***QSJ9");
    }

    #[test]
    fn masking_respects_char_boundaries() {
        assert_eq!(mask_token("ééééééééééééé"), "éééé***éééé");
    }
}
