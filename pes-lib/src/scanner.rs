//! Directory enumeration for a console's ROM collection.

use std::path::PathBuf;

use pes_core::Console;

/// List a console's ROM files: regular files only, extension-filtered,
/// ignore-list applied, sorted by path so task start order is stable
/// across runs.
pub fn scan_rom_files(console: &Console) -> std::io::Result<Vec<PathBuf>> {
    let mut entries: Vec<std::fs::DirEntry> =
        std::fs::read_dir(console.rom_dir())?.flatten().collect();
    entries.sort_by_key(|e| e.path());

    let mut roms = Vec::new();
    for entry in entries {
        let path = entry.path();
        if !path.is_file() || !console.matches_extension(&path) {
            continue;
        }
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if console.is_ignored(console.rom_stem(file_name)) {
            log::debug!("skipping ignored ROM {}", path.display());
            continue;
        }
        roms.push(path);
    }

    Ok(roms)
}
