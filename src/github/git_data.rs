//! Labeled values kept at the bottom of an issue body.
//!
//! ```text
//! Free-form description...
//!
//! ---
//! **_Aha_**: APP-123
//! **_Size_**: L
//! ```
//!
//! Lines shaped like `**_Label_**: value` are data; everything else is body
//! text and is kept verbatim.

const LABEL_OPEN: &str = "**_";
const LABEL_CLOSE: &str = "_**: ";
const SEPARATOR: &str = "---";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitData {
    pub body: Vec<String>,
    /// `(label, value)` pairs, unique.
    pub data: Vec<(String, String)>,
}

impl GitData {
    pub fn parse(text: &str) -> Self {
        let mut parsed = GitData::default();

        for line in text.split('\n') {
            match parse_data_line(line) {
                Some((label, value)) => parsed.add(label, value),
                None => parsed.body.push(line.to_string()),
            }
        }

        parsed.trim_body();
        parsed
    }

    /// Body lines, then `---` and the data sorted by label and value.
    pub fn render(&mut self) -> String {
        self.trim_body();

        let mut out = String::new();
        for line in &self.body {
            out.push_str(line);
            out.push('\n');
        }

        if !self.data.is_empty() {
            out.push('\n');
            out.push_str(SEPARATOR);
            out.push('\n');

            self.data.sort();
            for (label, value) in &self.data {
                out.push_str(&format!("{}{}{}{}\n", LABEL_OPEN, label, LABEL_CLOSE, value));
            }
        }

        out
    }

    pub fn add(&mut self, label: &str, value: &str) {
        if !self.has(label, value) {
            self.data.push((label.to_string(), value.to_string()));
        }
    }

    /// Removes `label`/`value`, or every entry for `label` when `value` is
    /// empty. Returns whether anything was removed.
    pub fn delete(&mut self, label: &str, value: &str) -> bool {
        let before = self.data.len();
        self.data
            .retain(|(l, v)| !(l == label && (value.is_empty() || v == value)));
        self.data.len() != before
    }

    pub fn has(&self, label: &str, value: &str) -> bool {
        self.data.iter().any(|(l, v)| l == label && v == value)
    }

    /// Replaces every value of `label` with `value`.
    pub fn set(&mut self, label: &str, value: &str) {
        self.delete(label, "");
        self.add(label, value);
    }

    pub fn values(&self, label: &str) -> Vec<&str> {
        self.data
            .iter()
            .filter(|(l, _)| l == label)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn first(&self, label: &str) -> Option<&str> {
        self.data
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| v.as_str())
    }

    fn trim_body(&mut self) {
        while let Some(last) = self.body.last() {
            let last = last.trim();
            if last.is_empty() || last == SEPARATOR {
                self.body.pop();
            } else {
                break;
            }
        }
    }
}

fn parse_data_line(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix(LABEL_OPEN)?;
    let end = rest.find(LABEL_CLOSE)?;
    let label = rest[..end].trim();
    let value = rest[end + LABEL_CLOSE.len()..].trim();
    Some((label, value))
}
