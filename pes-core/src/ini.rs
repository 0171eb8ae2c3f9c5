//! Minimal INI reader for the consoles and games-catalogue files.
//!
//! Sections in square brackets, `key = value` pairs, `#`/`;` comments.
//! Section order and key order are preserved so console processing order
//! matches the file.

use crate::error::ConfigError;

#[derive(Debug, Clone)]
pub struct IniSection {
    name: String,
    values: Vec<(String, String)>,
}

impl IniSection {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// First value for a key, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct IniDocument {
    sections: Vec<IniSection>,
}

impl IniDocument {
    /// Parse a full INI document.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut sections: Vec<IniSection> = Vec::new();

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some(header) = line.strip_prefix('[') {
                let name = header
                    .strip_suffix(']')
                    .ok_or_else(|| ConfigError::malformed(line_no, "unterminated section header"))?
                    .trim();
                if name.is_empty() {
                    return Err(ConfigError::malformed(line_no, "empty section name"));
                }
                sections.push(IniSection {
                    name: name.to_string(),
                    values: Vec::new(),
                });
                continue;
            }

            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| ConfigError::malformed(line_no, "expected 'key = value'"))?;
            let section = sections
                .last_mut()
                .ok_or_else(|| ConfigError::malformed(line_no, "key outside any section"))?;
            section
                .values
                .push((key.trim().to_string(), value.trim().to_string()));
        }

        Ok(Self { sections })
    }

    pub fn sections(&self) -> impl Iterator<Item = &IniSection> {
        self.sections.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sections_and_values() {
        let doc = IniDocument::parse(
            "# consoles\n\
             [NES]\n\
             extensions = nes zip\n\
             emulator = fceux\n\
             \n\
             ; second console\n\
             [Mega Drive]\n\
             extensions = bin smd\n",
        )
        .unwrap();

        let sections: Vec<_> = doc.sections().collect();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].name(), "NES");
        assert_eq!(sections[0].get("extensions"), Some("nes zip"));
        assert_eq!(sections[0].get("emulator"), Some("fceux"));
        assert_eq!(sections[1].name(), "Mega Drive");
        assert_eq!(sections[1].get("missing"), None);
    }

    #[test]
    fn values_keep_internal_equals() {
        let doc = IniDocument::parse("[a]\ncommand = run --flag=1 %%GAME%%\n").unwrap();
        let section = doc.sections().next().unwrap();
        assert_eq!(section.get("command"), Some("run --flag=1 %%GAME%%"));
    }

    #[test]
    fn rejects_key_outside_section() {
        let err = IniDocument::parse("orphan = 1\n").unwrap_err();
        assert!(matches!(err, ConfigError::Malformed { line: 1, .. }));
    }

    #[test]
    fn rejects_unterminated_header() {
        let err = IniDocument::parse("[broken\n").unwrap_err();
        assert!(matches!(err, ConfigError::Malformed { line: 1, .. }));
    }
}
