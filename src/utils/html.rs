use ammonia;

/// Clean user-supplied HTML before it is stored.
///
/// Whitelist-based: safe tags (like <b>, <p>) survive, while <script>,
/// <iframe> and event-handler attributes are stripped along with their
/// content. Comment and post bodies go through this on every write.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_scripts_keeps_formatting() {
        let cleaned = clean_html("<b>hi</b><script>alert(1)</script>");
        assert_eq!(cleaned, "<b>hi</b>");
    }

    #[test]
    fn plain_text_is_untouched() {
        assert_eq!(clean_html("just words"), "just words");
    }
}
