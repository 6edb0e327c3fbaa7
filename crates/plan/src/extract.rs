use crate::step::ExtractedFile;
use regex::Regex;
use std::sync::OnceLock;

const RECOGNIZED_EXTENSIONS: &[&str] = &[
    "txt", "md", "json", "csv", "xlsx", "xls", "docx", "doc", "pdf", "pptx", "ppt", "png", "jpg",
    "jpeg", "gif", "svg", "html", "py", "rs", "js", "ts", "yaml", "yml", "toml", "zip", "mp4",
    "mp3", "wav",
];

fn absolute_path_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let ext_group = RECOGNIZED_EXTENSIONS.join("|");
        Regex::new(&format!(
            r#"(?:["']([^"'\n]+\.(?:{ext}))["']|((?:/|[A-Za-z]:\\)[^\s"'\n]+\.(?:{ext})))"#,
            ext = ext_group
        ))
        .expect("static regex is valid")
    })
}

/// Parses file references (absolute paths or quoted names ending in a recognized
/// extension) out of free-text notes. Returns the notes unchanged (the source text
/// itself is not rewritten beyond what the caller already has) plus the extracted list.
pub fn extract_files(notes: &str) -> Vec<ExtractedFile> {
    let re = absolute_path_pattern();
    let mut found = Vec::new();
    for caps in re.captures_iter(notes) {
        let matched = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str().to_string());
        if let Some(path) = matched {
            let name = path
                .rsplit(['/', '\\'])
                .next()
                .unwrap_or(&path)
                .to_string();
            found.push(ExtractedFile { name, path });
        }
    }
    found
}
