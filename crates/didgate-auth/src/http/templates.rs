//! HTML rendering for errors shown to the user agent.

const STYLES: &str = r#"
body { font-family: system-ui, -apple-system, sans-serif; background: #f5f6f8; color: #1f2430; margin: 0; }
.container { max-width: 28rem; margin: 4rem auto; padding: 0 1rem; }
.card { background: #fff; border-radius: 12px; padding: 2rem; box-shadow: 0 1px 3px rgba(0,0,0,.08); text-align: center; }
.error-title { font-size: 1.25rem; font-weight: 600; margin-bottom: .75rem; }
.error-description { color: #4a5160; margin-bottom: 1rem; }
.error-code { font-family: ui-monospace, monospace; font-size: .85rem; color: #8a90a0; }
"#;

fn html_page(title: &str, content: &str) -> String {
    let mut html = String::with_capacity(content.len() + 1024);
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("    <meta charset=\"UTF-8\">\n");
    html.push_str("    <title>");
    html.push_str(&html_escape(title));
    html.push_str(" - didgate</title>\n    <style>");
    html.push_str(STYLES);
    html.push_str("</style>\n</head>\n<body>\n    <div class=\"container\">\n");
    html.push_str(content);
    html.push_str("\n    </div>\n</body>\n</html>");
    html
}

/// Renders the page shown for errors that cannot be redirected.
pub fn render_error_page(error_code: &str, error_description: &str) -> String {
    let mut content = String::with_capacity(512);
    content.push_str("<div class=\"card\">\n");
    content.push_str("<div class=\"error-title\">Authorization Error</div>\n");
    content.push_str("<div class=\"error-description\">");
    content.push_str(&html_escape(error_description));
    content.push_str("</div>\n<div class=\"error-code\">");
    content.push_str(&html_escape(error_code));
    content.push_str("</div>\n</div>");
    html_page("Error", &content)
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
