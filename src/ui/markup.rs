//! `{{tag:text}}` markup used by `Ui::fmt`.
//!
//! Tags map onto crossterm colors and attributes. Unknown tags and unbalanced
//! braces are left in the output verbatim.

use crossterm::style::{Attribute, Color, Stylize};

enum Tag {
    Fg(Color),
    Attr(Attribute),
}

fn tag(name: &str) -> Option<Tag> {
    let tag = match name {
        "red" => Tag::Fg(Color::Red),
        "green" => Tag::Fg(Color::Green),
        "yellow" => Tag::Fg(Color::Yellow),
        "blue" => Tag::Fg(Color::Blue),
        "magenta" => Tag::Fg(Color::Magenta),
        "cyan" => Tag::Fg(Color::Cyan),
        "gray" | "grey" => Tag::Fg(Color::DarkGrey),
        "bold" => Tag::Attr(Attribute::Bold),
        "italic" => Tag::Attr(Attribute::Italic),
        "underline" => Tag::Attr(Attribute::Underlined),
        _ => return None,
    };
    Some(tag)
}

/// Renders markup into ANSI-styled text.
pub fn render(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let candidate = &rest[start + 2..];
        let Some(end) = candidate.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };
        let inner = &candidate[..end];
        match inner.split_once(':').and_then(|(name, body)| Some((tag(name)?, body))) {
            Some((Tag::Fg(color), body)) => out.push_str(&body.with(color).to_string()),
            Some((Tag::Attr(attr), body)) => out.push_str(&body.attribute(attr).to_string()),
            None => out.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &candidate[end + 2..];
    }
    out.push_str(rest);
    out
}
