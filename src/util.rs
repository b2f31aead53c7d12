use std::borrow::Cow;

pub fn to_ascii_uppercase_cow(text: &str) -> Cow<'_, str> {
    if text.chars().any(|c| c.is_ascii_lowercase()) {
        Cow::Owned(text.to_ascii_uppercase())
    } else {
        Cow::Borrowed(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_ascii_uppercase_cow() {
        assert!(matches!(to_ascii_uppercase_cow("HOST"), Cow::Borrowed("HOST")));
        assert_eq!(to_ascii_uppercase_cow("Host"), "HOST");
    }
}
