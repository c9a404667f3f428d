use std::{fmt::Display, path::Path};

use crate::error::{Error, Result};

/// The only `core.repositoryformatversion` this crate understands.
pub const SUPPORTED_FORMAT_VERSION: i64 = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    key: String,
    value: String,
    line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Section {
    name: String,
    entries: Vec<Entry>,
}

/// The repository `config` file: `[section]` headers followed by
/// `key = value` lines. Section names and keys are case insensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    sections: Vec<Section>,
}

impl Default for Config {
    fn default() -> Self {
        let mut config = Config {
            sections: Vec::new(),
        };
        config.set("core", "repositoryformatversion", "0");
        config.set("core", "filemode", "false");
        config.set("core", "bare", "false");
        config
    }
}

impl Config {
    pub fn parse(text: &str) -> Result<Self> {
        let mut sections: Vec<Section> = Vec::new();
        for (index, raw) in text.lines().enumerate() {
            let line = index + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }
            if let Some(header) = trimmed.strip_prefix('[') {
                let name = header.strip_suffix(']').ok_or_else(|| Error::InvalidConfig {
                    line,
                    reason: String::from("unterminated section header"),
                })?;
                sections.push(Section {
                    name: name.trim().to_string(),
                    entries: Vec::new(),
                });
                continue;
            }
            let section = sections.last_mut().ok_or_else(|| Error::InvalidConfig {
                line,
                reason: String::from("key outside of any section"),
            })?;
            // A bare key is shorthand for `key = true`.
            let (key, value) = match trimmed.split_once('=') {
                Some((key, value)) => (key.trim(), unquote(value.trim())),
                None => (trimmed, "true"),
            };
            if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
                return Err(Error::InvalidConfig {
                    line,
                    reason: format!("invalid key {:?}", key),
                });
            }
            section.entries.push(Entry {
                key: key.to_ascii_lowercase(),
                value: value.to_string(),
                line,
            });
        }
        Ok(Config { sections })
    }

    pub fn read(path: &Path) -> Result<Self> {
        log::debug!("reading config {:?}", path);
        Config::parse(&std::fs::read_to_string(path)?)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        log::debug!("writing config {:?}", path);
        Ok(std::fs::write(path, self.to_string())?)
    }

    fn entry(&self, section: &str, key: &str) -> Option<&Entry> {
        // Later entries win, as they do when a key is repeated.
        self.sections
            .iter()
            .filter(|s| s.name.eq_ignore_ascii_case(section))
            .flat_map(|s| s.entries.iter())
            .filter(|e| e.key.eq_ignore_ascii_case(key))
            .last()
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.entry(section, key).map(|e| e.value.as_str())
    }

    pub fn set(&mut self, section: &str, key: &str, value: &str) {
        let key = key.to_ascii_lowercase();
        let index = match self
            .sections
            .iter()
            .position(|s| s.name.eq_ignore_ascii_case(section))
        {
            Some(index) => index,
            None => {
                self.sections.push(Section {
                    name: section.to_string(),
                    entries: Vec::new(),
                });
                self.sections.len() - 1
            }
        };
        let entries = &mut self.sections[index].entries;
        match entries.iter_mut().find(|e| e.key == key) {
            Some(entry) => entry.value = value.to_string(),
            None => entries.push(Entry {
                key,
                value: value.to_string(),
                line: 0,
            }),
        }
    }

    pub fn get_int(&self, section: &str, key: &str) -> Result<Option<i64>> {
        match self.entry(section, key) {
            None => Ok(None),
            Some(entry) => entry
                .value
                .parse()
                .map(Some)
                .map_err(|_| Error::InvalidConfig {
                    line: entry.line,
                    reason: format!("{}.{} is not an integer: {:?}", section, key, entry.value),
                }),
        }
    }

    pub fn get_bool(&self, section: &str, key: &str) -> Result<Option<bool>> {
        match self.entry(section, key) {
            None => Ok(None),
            Some(entry) => match entry.value.to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(Some(true)),
                "false" | "no" | "off" | "0" | "" => Ok(Some(false)),
                _ => Err(Error::InvalidConfig {
                    line: entry.line,
                    reason: format!("{}.{} is not a boolean: {:?}", section, key, entry.value),
                }),
            },
        }
    }

    pub fn repository_format_version(&self) -> Result<i64> {
        self.get_int("core", "repositoryformatversion")?
            .ok_or_else(|| Error::InvalidConfig {
                line: 0,
                reason: String::from("core.repositoryformatversion is missing"),
            })
    }

    pub fn filemode(&self) -> Result<bool> {
        Ok(self.get_bool("core", "filemode")?.unwrap_or(false))
    }

    pub fn bare(&self) -> Result<bool> {
        Ok(self.get_bool("core", "bare")?.unwrap_or(false))
    }
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

impl Display for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for section in &self.sections {
            writeln!(f, "[{}]", section.name)?;
            for entry in &section.entries {
                writeln!(f, "\t{} = {}", entry.key, entry.value)?;
            }
        }
        Ok(())
    }
}

#[test]
fn test_default_config() {
    let config = Config::default();
    assert_eq!(config.repository_format_version().unwrap(), 0);
    assert!(!config.filemode().unwrap());
    assert!(!config.bare().unwrap());
    assert_eq!(
        config.to_string(),
        "[core]\n\trepositoryformatversion = 0\n\tfilemode = false\n\tbare = false\n"
    );
    assert_eq!(Config::parse(&config.to_string()).unwrap().to_string(), config.to_string());
}

#[test]
fn test_parse_git_style_config() {
    let text = "# written by git\n\
[core]\n\
\trepositoryformatversion = 0\n\
\tfileMode = true\n\
\tbare = false\n\
\tlogallrefupdates\n\
[remote \"origin\"]\n\
\turl = \"https://example.com/repo.git\"\n";
    let config = Config::parse(text).unwrap();
    assert!(config.filemode().unwrap());
    assert_eq!(config.get_bool("core", "logallrefupdates").unwrap(), Some(true));
    assert_eq!(
        config.get("remote \"origin\"", "url"),
        Some("https://example.com/repo.git")
    );
    assert_eq!(config.get("CORE", "FILEMODE"), Some("true"));
}

#[test]
fn test_invalid_configs() {
    assert!(matches!(
        Config::parse("key = value\n"),
        Err(Error::InvalidConfig { line: 1, .. })
    ));
    assert!(matches!(
        Config::parse("[core\n"),
        Err(Error::InvalidConfig { line: 1, .. })
    ));
    let config = Config::parse("[core]\n\tbare = maybe\n\trepositoryformatversion = x\n").unwrap();
    assert!(matches!(config.bare(), Err(Error::InvalidConfig { line: 2, .. })));
    assert!(matches!(
        config.repository_format_version(),
        Err(Error::InvalidConfig { line: 3, .. })
    ));
    let config = Config::parse("[core]\n").unwrap();
    assert!(config.repository_format_version().is_err());
}
