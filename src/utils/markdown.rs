//! Markdown clean-up and section parsing for plain-text model replies.

use regex::Regex;
use std::sync::OnceLock;

fn fenced_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)```(?:json|javascript|js|html|css|md|markdown)?\s*([\s\S]*?)\s*```")
            .expect("valid regex")
    })
}

fn inline_code_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"`([^`]*)`").expect("valid regex"))
}

fn output_heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?im)^\s*#{1,6}\s*OUTPUT\s+[AB]:.*\n").expect("valid regex"))
}

fn glued_heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^(#{1,6})([^#\s])").expect("valid regex"))
}

fn numbered_item_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{1,2}[.)]\s+").expect("valid regex"))
}

/// Unwrap fenced code blocks and inline code spans, keeping their text.
pub fn clean_markdown(content: &str) -> String {
    let unfenced = fenced_block_re().replace_all(content, "$1");
    inline_code_re()
        .replace_all(&unfenced, "$1")
        .trim()
        .to_string()
}

/// Delete every code fence marker.
pub fn remove_fences(text: &str) -> String {
    text.replace("```", "").trim().to_string()
}

/// Models sometimes emit literal `\n` / `\t` sequences inside JSON strings.
pub fn unescape_literals(text: &str) -> String {
    text.replace("\\n", "\n").replace("\\t", "\t")
}

/// Normalize a letter or blog post for publishing.
pub fn tidy_publication(md: &str) -> String {
    if md.trim().is_empty() {
        return String::new();
    }

    let without_noise = output_heading_re().replace_all(md, "");
    let spaced = glued_heading_re().replace_all(&without_noise, "$1 $2");

    let mut out: Vec<&str> = Vec::new();
    for line in spaced.lines() {
        if is_atx_heading(line) {
            if let Some(prev) = out.last() {
                if !prev.trim().is_empty() {
                    out.push("");
                }
            }
        }
        out.push(line);
    }

    out.join("\n").trim().to_string()
}

fn is_atx_heading(line: &str) -> bool {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    (1..=6).contains(&hashes) && line[hashes..].starts_with(' ')
}

/// `- x`, `-x`, `* x`, `*x`, `• x` and numbered items. Rules (`---`) and bold (`**`) are not bullets.
fn is_bullet(line: &str) -> bool {
    let mut chars = line.chars();
    match chars.next() {
        Some('•') => true,
        Some(marker @ ('-' | '*')) => match chars.next() {
            None => marker == '-',
            Some(next) => next != marker,
        },
        _ => numbered_item_re().is_match(line),
    }
}

fn strip_bullet(line: &str) -> &str {
    if let Some(m) = numbered_item_re().find(line) {
        return line[m.end()..].trim();
    }
    line.trim_start_matches(['-', '*', '•']).trim()
}

fn heading_title(line: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    let is_heading = trimmed.starts_with('#')
        || (trimmed.starts_with("**") && trimmed.ends_with("**") && trimmed.len() > 4)
        || (!is_bullet(trimmed) && trimmed.ends_with(':') && trimmed.len() <= 80);

    if !is_heading {
        return None;
    }

    let title = trimmed
        .trim_start_matches('#')
        .trim()
        .trim_matches('*')
        .trim()
        .trim_end_matches(':')
        .trim()
        .trim_matches('*')
        .trim();
    Some(title.to_string())
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Section {
    pub title: String,
    pub lines: Vec<String>,
}

impl Section {
    pub fn bullets(&self) -> Vec<String> {
        self.lines
            .iter()
            .filter(|l| is_bullet(l))
            .map(|l| strip_bullet(l).to_string())
            .filter(|l| !l.is_empty())
            .collect()
    }

    pub fn text(&self) -> String {
        self.lines
            .iter()
            .filter(|l| !is_bullet(l))
            .cloned()
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Bullets when the section has any, otherwise its plain lines.
    pub fn items(&self) -> Vec<String> {
        let bullets = self.bullets();
        if bullets.is_empty() {
            self.lines.clone()
        } else {
            bullets
        }
    }
}

/// Split text into titled sections. Lines before the first heading are dropped.
pub fn parse_sections(md: &str) -> Vec<Section> {
    let mut sections: Vec<Section> = Vec::new();

    for raw in md.lines() {
        let line = raw.trim();
        if let Some(title) = heading_title(line) {
            sections.push(Section {
                title,
                lines: Vec::new(),
            });
            continue;
        }
        if line.is_empty() {
            continue;
        }
        if let Some(current) = sections.last_mut() {
            current.lines.push(line.to_string());
        }
    }

    sections
}

/// Section whose title contains `keyword` (case-insensitive). The first match with content wins;
/// an empty match is returned only when no matching section has any.
pub fn find_section<'a>(sections: &'a [Section], keyword: &str) -> Option<&'a Section> {
    let keyword = keyword.to_lowercase();
    let mut matching = sections
        .iter()
        .filter(|s| s.title.to_lowercase().contains(&keyword))
        .peekable();
    let first = *matching.peek()?;
    Some(matching.find(|s| !s.items().is_empty()).unwrap_or(first))
}
