//! Loaders for the consoles file and the games-catalogue file.
//!
//! Both files are INI. Path values may reference `%%BASE%%` (the install
//! root) and `%%USERDIR%%` (the user's `.pes` directory); substitution
//! happens here so the rest of the pipeline only ever sees resolved paths.

use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::ini::{IniDocument, IniSection};

/// Install-root and user-dir values substituted into path options.
#[derive(Debug, Clone)]
pub struct PathVars {
    pub base_dir: PathBuf,
    pub user_dir: PathBuf,
}

impl PathVars {
    pub fn substitute(&self, raw: &str) -> String {
        raw.replace("%%BASE%%", &self.base_dir.to_string_lossy())
            .replace("%%USERDIR%%", &self.user_dir.to_string_lossy())
    }
}

/// One console section from the consoles file, resolved and validated.
///
/// This is raw configuration; it becomes a [`crate::Console`] once the
/// store has assigned the console its id.
#[derive(Debug, Clone)]
pub struct ConsoleSettings {
    pub name: String,
    /// Lowercase extensions without the leading dot.
    pub extensions: Vec<String>,
    /// Shell template containing the `%%GAME%%` token.
    pub command: String,
    pub image: PathBuf,
    pub nocoverart: PathBuf,
    pub emulator: String,
    pub gamesdb_id: Option<i64>,
    pub achievement_id: Option<i64>,
    /// Filename stems to skip during a scan.
    pub ignore: Vec<String>,
}

/// Load and validate the consoles file.
pub fn load_consoles(path: &Path, vars: &PathVars) -> Result<Vec<ConsoleSettings>, ConfigError> {
    let text = std::fs::read_to_string(path)?;
    let doc = IniDocument::parse(&text)?;

    let mut consoles = Vec::new();
    for section in doc.sections() {
        consoles.push(parse_console(section, vars)?);
    }
    log::debug!("loaded {} consoles from {}", consoles.len(), path.display());
    Ok(consoles)
}

fn require<'a>(
    section: &'a IniSection,
    name: &str,
    option: &str,
) -> Result<&'a str, ConfigError> {
    section
        .get(option)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::missing(name, option))
}

fn parse_console(section: &IniSection, vars: &PathVars) -> Result<ConsoleSettings, ConfigError> {
    let name = section.name().to_string();

    let extensions = require(section, &name, "extensions")?
        .split_whitespace()
        .map(normalise_extension)
        .collect::<Vec<_>>();

    let command = require(section, &name, "command")?.to_string();
    if !command.contains("%%GAME%%") {
        return Err(ConfigError::invalid(
            &name,
            "command",
            "missing the %%GAME%% token",
        ));
    }

    let image = PathBuf::from(vars.substitute(require(section, &name, "image")?));
    let nocoverart = PathBuf::from(vars.substitute(require(section, &name, "nocoverart")?));
    let emulator = require(section, &name, "emulator")?.to_string();

    let gamesdb_id = parse_optional_int(section.get("thegamesdb_id"), &name, "thegamesdb_id")?;
    let achievement_id = parse_optional_int(section.get("achievement_id"), &name, "achievement_id")?;

    let ignore = section
        .get("ignore_roms")
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();

    Ok(ConsoleSettings {
        name,
        extensions,
        command,
        image,
        nocoverart,
        emulator,
        gamesdb_id,
        achievement_id,
        ignore,
    })
}

fn parse_optional_int(
    value: Option<&str>,
    section: &str,
    option: &str,
) -> Result<Option<i64>, ConfigError> {
    match value {
        None => Ok(None),
        Some(v) => v
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| ConfigError::invalid(section, option, format!("'{v}' is not an integer"))),
    }
}

/// Lowercase an extension and drop any leading dot.
fn normalise_extension(ext: &str) -> String {
    ext.trim_start_matches('.').to_lowercase()
}

/// One entry from the games-catalogue file: a terse filename stem mapped
/// to its preferred human title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogueEntry {
    pub short_name: String,
    pub full_name: String,
}

/// Load the games-catalogue file (one section per short name, mandatory
/// `full_name` option).
pub fn load_games_catalogue(path: &Path) -> Result<Vec<CatalogueEntry>, ConfigError> {
    let text = std::fs::read_to_string(path)?;
    let doc = IniDocument::parse(&text)?;

    let mut entries = Vec::new();
    for section in doc.sections() {
        let full_name = section
            .get("full_name")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ConfigError::missing(section.name(), "full_name"))?;
        entries.push(CatalogueEntry {
            short_name: section.name().to_string(),
            full_name: full_name.to_string(),
        });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> PathVars {
        PathVars {
            base_dir: PathBuf::from("/opt/pes"),
            user_dir: PathBuf::from("/home/pi/.pes"),
        }
    }

    fn write_temp(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("consoles.ini");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    const NES_SECTION: &str = "[NES]\n\
        extensions = .nes .zip\n\
        command = fceux %%GAME%%\n\
        image = %%BASE%%/icons/nes.png\n\
        nocoverart = %%USERDIR%%/nocover.png\n\
        emulator = fceux\n\
        thegamesdb_id = 7\n\
        achievement_id = 3\n\
        ignore_roms = bios, test cart\n";

    #[test]
    fn parses_full_console_section() {
        let (_dir, path) = write_temp(NES_SECTION);
        let consoles = load_consoles(&path, &vars()).unwrap();
        assert_eq!(consoles.len(), 1);

        let nes = &consoles[0];
        assert_eq!(nes.name, "NES");
        assert_eq!(nes.extensions, vec!["nes", "zip"]);
        assert_eq!(nes.image, PathBuf::from("/opt/pes/icons/nes.png"));
        assert_eq!(nes.nocoverart, PathBuf::from("/home/pi/.pes/nocover.png"));
        assert_eq!(nes.gamesdb_id, Some(7));
        assert_eq!(nes.achievement_id, Some(3));
        assert_eq!(nes.ignore, vec!["bios", "test cart"]);
    }

    #[test]
    fn optional_ids_default_to_none() {
        let (_dir, path) = write_temp(
            "[Atari 2600]\n\
             extensions = a26 bin\n\
             command = stella %%GAME%%\n\
             image = x.png\n\
             nocoverart = y.png\n\
             emulator = stella\n",
        );
        let consoles = load_consoles(&path, &vars()).unwrap();
        assert_eq!(consoles[0].gamesdb_id, None);
        assert_eq!(consoles[0].achievement_id, None);
        assert!(consoles[0].ignore.is_empty());
    }

    #[test]
    fn missing_command_is_an_error() {
        let (_dir, path) = write_temp("[NES]\nextensions = nes\n");
        let err = load_consoles(&path, &vars()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingOption { .. }));
    }

    #[test]
    fn command_must_carry_game_token() {
        let (_dir, path) = write_temp(
            "[NES]\n\
             extensions = nes\n\
             command = fceux\n\
             image = x.png\n\
             nocoverart = y.png\n\
             emulator = fceux\n",
        );
        let err = load_consoles(&path, &vars()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn games_catalogue_requires_full_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("games.ini");
        std::fs::write(&path, "[smb]\nfull_name = Super Mario Bros.\n[bad]\n").unwrap();
        let err = load_games_catalogue(&path).unwrap_err();
        assert!(matches!(err, ConfigError::MissingOption { .. }));
    }

    #[test]
    fn games_catalogue_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("games.ini");
        std::fs::write(&path, "[smb]\nfull_name = Super Mario Bros.\n").unwrap();
        let entries = load_games_catalogue(&path).unwrap();
        assert_eq!(
            entries,
            vec![CatalogueEntry {
                short_name: "smb".into(),
                full_name: "Super Mario Bros.".into(),
            }]
        );
    }
}
