//! The immutable console descriptor consumed by the scan pipeline.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::config::ConsoleSettings;

/// A configured console: identity, ROM location, and catalogue keys.
///
/// Constructed once at startup (after the store has assigned the console
/// its id) and treated as read-only for the lifetime of a scan. The one
/// exception is the catalogue platform-name cache, which is resolved
/// lazily and written exactly once.
#[derive(Debug)]
pub struct Console {
    id: i64,
    name: String,
    rom_dir: PathBuf,
    cover_art_dir: PathBuf,
    extensions: HashSet<String>,
    ignore: HashSet<String>,
    command: String,
    emulator: String,
    image: PathBuf,
    nocoverart: PathBuf,
    gamesdb_id: Option<i64>,
    achievement_id: Option<i64>,
    gamesdb_name: OnceLock<String>,
}

impl Console {
    /// Build a console descriptor from its validated settings.
    ///
    /// `cached_gamesdb_name` is the platform name persisted by an earlier
    /// run, if any; passing it pre-fills the lazy cache so the catalogue is
    /// not asked again.
    pub fn new(
        id: i64,
        settings: ConsoleSettings,
        rom_dir: PathBuf,
        cover_art_dir: PathBuf,
        cached_gamesdb_name: Option<String>,
    ) -> Self {
        let gamesdb_name = OnceLock::new();
        if let Some(cached) = cached_gamesdb_name {
            let _ = gamesdb_name.set(cached);
        }
        Self {
            id,
            name: settings.name,
            rom_dir,
            cover_art_dir,
            extensions: settings.extensions.into_iter().collect(),
            ignore: settings.ignore.into_iter().collect(),
            command: settings.command,
            emulator: settings.emulator,
            image: settings.image,
            nocoverart: settings.nocoverart,
            gamesdb_id: settings.gamesdb_id,
            achievement_id: settings.achievement_id,
            gamesdb_name,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rom_dir(&self) -> &Path {
        &self.rom_dir
    }

    pub fn cover_art_dir(&self) -> &Path {
        &self.cover_art_dir
    }

    pub fn emulator(&self) -> &str {
        &self.emulator
    }

    pub fn image(&self) -> &Path {
        &self.image
    }

    pub fn nocoverart(&self) -> &Path {
        &self.nocoverart
    }

    /// Catalogue platform key; `None` disables remote enrichment.
    pub fn gamesdb_id(&self) -> Option<i64> {
        self.gamesdb_id
    }

    /// Achievement platform key; `None` disables the hashing path.
    pub fn achievement_id(&self) -> Option<i64> {
        self.achievement_id
    }

    /// The cached catalogue platform name, if resolved.
    pub fn gamesdb_name(&self) -> Option<&str> {
        self.gamesdb_name.get().map(String::as_str)
    }

    /// Record the resolved catalogue platform name. The first write wins;
    /// concurrent callers resolve the same value so later writes are
    /// dropped silently.
    pub fn cache_gamesdb_name(&self, name: String) {
        let _ = self.gamesdb_name.set(name);
    }

    /// Whether a path carries one of this console's ROM extensions.
    pub fn matches_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions.contains(&e.to_lowercase()))
            .unwrap_or(false)
    }

    /// Strip the first matching extension from a filename, yielding the
    /// stem used for catalogue queries and cover-art naming.
    pub fn rom_stem<'a>(&self, file_name: &'a str) -> &'a str {
        for ext in &self.extensions {
            let suffix_len = ext.len() + 1;
            if file_name.len() <= suffix_len || !file_name.is_char_boundary(file_name.len() - suffix_len) {
                continue;
            }
            let (stem, suffix) = file_name.split_at(file_name.len() - suffix_len);
            if suffix.starts_with('.') && suffix[1..].eq_ignore_ascii_case(ext) {
                return stem;
            }
        }
        file_name
    }

    /// Whether a stem is in the console's ignore list.
    pub fn is_ignored(&self, stem: &str) -> bool {
        self.ignore.contains(stem)
    }

    /// Expand the emulator command template for a ROM path, substituting
    /// the `%%GAME%%` token with the shell-quoted path.
    pub fn launch_command(&self, rom_path: &Path) -> String {
        self.command
            .replace("%%GAME%%", &shell_quote(&rom_path.to_string_lossy()))
    }
}

/// Single-quote a value for POSIX shells, escaping embedded quotes.
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
