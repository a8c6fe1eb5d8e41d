//! HTML view of a generated plan.
//!
//! Plans come back as loosely formatted Markdown-ish text. Headings (`#`),
//! bullet lines (`-`, `*`, `•`) and numbered lines (`1.`) are recognised;
//! everything else becomes a paragraph. All text is escaped.

const STYLE: &str = "body{font-family:system-ui,sans-serif;max-width:42rem;margin:2rem auto;\
padding:0 1rem;line-height:1.5;color:#1d1d2b}h1{font-size:1.6rem}\
h2,h3{margin-top:1.6rem}.meta{color:#666;font-size:.9rem}";

pub const PLAN_TITLE: &str = "Your night shift sleep plan";

/// Render a complete HTML page for `plan`.
pub fn render_plan_html(plan: &str, recipient: Option<&str>) -> String {
    let mut html = String::with_capacity(plan.len() * 2 + 512);
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str(&format!("<title>{PLAN_TITLE}</title>\n<style>{STYLE}</style>\n"));
    html.push_str("</head>\n<body>\n");
    html.push_str(&format!("<h1>{PLAN_TITLE}</h1>\n"));
    if let Some(to) = recipient {
        html.push_str(&format!("<p class=\"meta\">Prepared for {}</p>\n", escape(to)));
    }
    html.push_str(&render_body(plan));
    html.push_str("</body>\n</html>\n");
    html
}

#[derive(PartialEq)]
enum Block {
    None,
    Paragraph,
    Bullets,
    Numbered,
}

fn render_body(plan: &str) -> String {
    let mut out = String::new();
    let mut open = Block::None;

    for raw in plan.lines() {
        let line = raw.trim();

        if line.is_empty() {
            close(&mut out, &mut open);
            continue;
        }

        if let Some((level, text)) = heading(line) {
            close(&mut out, &mut open);
            out.push_str(&format!("<h{level}>{}</h{level}>\n", inline(text)));
        } else if let Some(item) = bullet(line) {
            if open != Block::Bullets {
                close(&mut out, &mut open);
                out.push_str("<ul>\n");
                open = Block::Bullets;
            }
            out.push_str(&format!("<li>{}</li>\n", inline(item)));
        } else if let Some(item) = numbered(line) {
            if open != Block::Numbered {
                close(&mut out, &mut open);
                out.push_str("<ol>\n");
                open = Block::Numbered;
            }
            out.push_str(&format!("<li>{}</li>\n", inline(item)));
        } else {
            if open == Block::Paragraph {
                out.push_str("<br>\n");
            } else {
                close(&mut out, &mut open);
                out.push_str("<p>");
                open = Block::Paragraph;
            }
            out.push_str(&inline(line));
        }
    }
    close(&mut out, &mut open);
    out
}

fn close(out: &mut String, open: &mut Block) {
    match open {
        Block::None => {}
        Block::Paragraph => out.push_str("</p>\n"),
        Block::Bullets => out.push_str("</ul>\n"),
        Block::Numbered => out.push_str("</ol>\n"),
    }
    *open = Block::None;
}

/// `#`..`###` headings render as `h2`..`h4`; the page title owns `h1`.
fn heading(line: &str) -> Option<(usize, &str)> {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    if hashes == 0 || hashes > 3 {
        return None;
    }
    let text = line[hashes..].strip_prefix(' ')?;
    Some((hashes + 1, text.trim()))
}

fn bullet(line: &str) -> Option<&str> {
    ["- ", "* ", "• "]
        .iter()
        .find_map(|p| line.strip_prefix(p))
        .map(str::trim)
}

fn numbered(line: &str) -> Option<&str> {
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let rest = line[digits..].strip_prefix(['.', ')'])?;
    rest.strip_prefix(' ').map(str::trim)
}

/// Escape text and turn `**bold**` spans into `<strong>`.
fn inline(text: &str) -> String {
    let escaped = escape(text);
    let mut out = String::with_capacity(escaped.len());
    let mut parts = escaped.split("**");
    if let Some(first) = parts.next() {
        out.push_str(first);
    }
    let rest: Vec<&str> = parts.collect();
    // An unmatched trailing `**` stays literal.
    let pairs = rest.len() / 2 * 2;
    for (i, part) in rest.iter().enumerate() {
        if i < pairs {
            out.push_str(if i % 2 == 0 { "<strong>" } else { "</strong>" });
        } else {
            out.push_str("**");
        }
        out.push_str(part);
    }
    out
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}
