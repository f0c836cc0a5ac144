//! Deb822 control-file stanzas
//!
//! Index files are sequences of blank-line separated stanzas. Each stanza is
//! a list of `Name: value` fields; lines starting with a blank continue the
//! previous field.

/// One `Name: value` field with its continuation lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    /// Text after the colon on the first line, trimmed
    pub value: String,
    /// Continuation lines, trimmed, empty ones dropped
    pub continuation: Vec<String>,
}

/// One record of a control file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stanza {
    /// 1-based line number of the first field
    pub line: usize,
    pub fields: Vec<Field>,
    /// Lines that were neither a field nor a continuation
    pub stray_lines: Vec<usize>,
}

impl Stanza {
    /// Field by name, case-insensitively
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
    }

    /// First-line value of a field; `None` when absent or empty
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.field(name)
            .map(|f| f.value.as_str())
            .filter(|v| !v.is_empty())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Split control-file text into stanzas.
///
/// `#` comment lines are ignored. A stanza that only collected stray lines
/// is still returned so callers can report it.
#[must_use]
pub fn parse_stanzas(text: &str) -> Vec<Stanza> {
    let mut stanzas = Vec::new();
    let mut current = Stanza::default();

    for (index, raw) in text.lines().enumerate() {
        let number = index + 1;
        let line = raw.trim_end_matches('\r');

        if line.trim().is_empty() {
            if !current.fields.is_empty() || !current.stray_lines.is_empty() {
                stanzas.push(std::mem::take(&mut current));
            }
            continue;
        }
        if line.starts_with('#') {
            continue;
        }

        if line.starts_with([' ', '\t']) {
            match current.fields.last_mut() {
                Some(field) => {
                    let text = line.trim();
                    if !text.is_empty() {
                        field.continuation.push(text.to_string());
                    }
                }
                None => current.stray_lines.push(number),
            }
            continue;
        }

        match line.split_once(':') {
            Some((name, value)) if !name.trim().is_empty() && !name.contains(' ') => {
                if current.fields.is_empty() && current.stray_lines.is_empty() {
                    current.line = number;
                }
                current.fields.push(Field {
                    name: name.trim().to_string(),
                    value: value.trim().to_string(),
                    continuation: Vec::new(),
                });
            }
            _ => {
                if current.fields.is_empty() && current.stray_lines.is_empty() {
                    current.line = number;
                }
                current.stray_lines.push(number);
            }
        }
    }

    if !current.fields.is_empty() || !current.stray_lines.is_empty() {
        stanzas.push(current);
    }
    stanzas
}
