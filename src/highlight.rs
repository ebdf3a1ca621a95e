use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorRole {
    Normal,
    Highlight,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRun {
    pub text: String,
    pub role: ColorRole,
}

/// Ordered runs whose concatenation is the original line.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StyledLine {
    pub runs: Vec<TextRun>,
}

impl StyledLine {
    pub fn text(&self) -> String {
        self.runs.iter().map(|run| run.text.as_str()).collect()
    }

    pub fn plain(line: &str) -> Self {
        let mut styled = Self::default();
        if !line.is_empty() {
            styled.push_plain(line);
        }
        styled
    }

    fn push_plain(&mut self, text: &str) {
        if let Some(last) = self.runs.last_mut() {
            if last.role == ColorRole::Normal {
                last.text.push_str(text);
                return;
            }
        }
        self.runs.push(TextRun {
            text: text.to_string(),
            role: ColorRole::Normal,
        });
    }

    fn push_highlight(&mut self, text: &str) {
        self.runs.push(TextRun {
            text: text.to_string(),
            role: ColorRole::Highlight,
        });
    }
}

/// Scans left to right; at each position the longest keyword that prefixes
/// the remainder becomes a highlighted run, otherwise one character is
/// appended to the current plain run.
pub fn assign_highlights(line: &str, keywords: &[String]) -> StyledLine {
    let mut styled = StyledLine::default();
    let mut rest = line;

    while let Some(ch) = rest.chars().next() {
        let matched = keywords
            .iter()
            .filter(|kw| !kw.is_empty() && rest.starts_with(kw.as_str()))
            .max_by_key(|kw| kw.len());

        match matched {
            Some(kw) => {
                styled.push_highlight(kw);
                rest = &rest[kw.len()..];
            }
            None => {
                let width = ch.len_utf8();
                styled.push_plain(&rest[..width]);
                rest = &rest[width..];
            }
        }
    }

    styled
}
