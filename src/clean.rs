use std::sync::LazyLock;

use regex::Regex;

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^```[A-Za-z0-9]*\n(.*)\n```$").expect("code fence pattern is valid")
});

const PAIRED_BLOCKS: &[(&str, &str)] = &[
    ("<think>", "</think>"),
    ("<thinking>", "</thinking>"),
    ("<reasoning>", "</reasoning>"),
    ("<reflection>", "</reflection>"),
    ("<scratchpad>", "</scratchpad>"),
];

const SERVICE_MARKERS: &[&str] = &[
    "</s>",
    "<s>",
    "<eos>",
    "<bos>",
    "<|im_start|>",
    "<|im_end|>",
    "<|endoftext|>",
    "<|eot_id|>",
    "<start_of_turn>",
    "<end_of_turn>",
];

const REASONING_OPENERS: &[&str] = &[
    "ok, let me think",
    "okay,",
    "let me see",
    "let me figure this out",
    "alright,",
    "i need to",
    "first,",
    "so,",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct OutputCleaner;

impl OutputCleaner {
    pub fn clean(&self, raw: &str) -> String {
        clean_model_output(raw)
    }
}

pub fn clean_model_output(raw: &str) -> String {
    // Every step only shrinks or normalizes, so this reaches a fixed point.
    let mut text = raw.to_string();
    loop {
        let next = clean_pass(&text);
        if next == text {
            return next;
        }
        text = next;
    }
}

pub fn meta_markers() -> impl Iterator<Item = &'static str> {
    PAIRED_BLOCKS
        .iter()
        .flat_map(|(open, close)| [*open, *close])
        .chain(SERVICE_MARKERS.iter().copied())
}

fn clean_pass(text: &str) -> String {
    let stripped = strip_markers(unwrap_code_fence(text.trim()));
    drop_reasoning_preamble(&normalize_whitespace(&stripped))
}

fn strip_markers(text: &str) -> String {
    // ASCII lowercasing keeps byte offsets aligned with `text`.
    let lower = text.to_ascii_lowercase();
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;

    while let Some(found) = lower[cursor..].find('<') {
        let at = cursor + found;
        out.push_str(&text[cursor..at]);
        let rest = &lower[at..];

        if let Some((open, close)) = PAIRED_BLOCKS.iter().find(|(open, _)| rest.starts_with(open))
        {
            let body_start = at + open.len();
            match lower[body_start..].find(close) {
                Some(end) => cursor = body_start + end + close.len(),
                None => return out,
            }
            continue;
        }

        if let Some(marker) = PAIRED_BLOCKS
            .iter()
            .map(|(_, close)| *close)
            .chain(SERVICE_MARKERS.iter().copied())
            .find(|marker| rest.starts_with(marker))
        {
            cursor = at + marker.len();
            continue;
        }

        out.push('<');
        cursor = at + 1;
    }

    out.push_str(&text[cursor..]);
    out
}

fn normalize_whitespace(text: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    for line in text.lines() {
        let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() && lines.last().map_or(true, |l| l.is_empty()) {
            continue;
        }
        lines.push(collapsed);
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

fn drop_reasoning_preamble(text: &str) -> String {
    let mut paragraphs: Vec<&str> = text.split("\n\n").collect();
    while paragraphs.len() > 1 && is_reasoning_paragraph(paragraphs[0]) {
        paragraphs.remove(0);
    }
    paragraphs.join("\n\n")
}

fn is_reasoning_paragraph(paragraph: &str) -> bool {
    let lower = paragraph.to_lowercase();
    REASONING_OPENERS.iter().any(|opener| lower.starts_with(opener))
}

fn unwrap_code_fence(text: &str) -> &str {
    CODE_FENCE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map_or(text, |body| body.as_str())
}
