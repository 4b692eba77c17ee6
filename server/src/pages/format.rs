//! Page body rendering.

use pulldown_cmark::{html, Options, Parser};

use super::types::PageFormatter;

/// Render `body` to HTML with `formatter`.
pub fn render(formatter: PageFormatter, body: &str) -> String {
    match formatter {
        PageFormatter::Markdown => markdown(body),
        PageFormatter::Html => body.to_string(),
        PageFormatter::None => escape_html(body),
    }
}

fn markdown(body: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let mut out = String::with_capacity(body.len() * 3 / 2);
    html::push_html(&mut out, Parser::new_ext(body, options));
    out
}

/// Escape the five HTML-significant characters.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markdown() {
        assert_eq!(
            render(PageFormatter::Markdown, "# Rules\n\nBe *nice*."),
            "<h1>Rules</h1>\n<p>Be <em>nice</em>.</p>\n"
        );
    }

    #[test]
    fn test_html_is_verbatim() {
        let body = "<footer>&copy; fanboard</footer>";
        assert_eq!(render(PageFormatter::Html, body), body);
    }

    #[test]
    fn test_none_is_escaped() {
        assert_eq!(
            render(PageFormatter::None, "a > b && c < \"d\""),
            "a &gt; b &amp;&amp; c &lt; &quot;d&quot;"
        );
        assert_eq!(render(PageFormatter::None, "body { color: red; }"), "body { color: red; }");
    }
}
