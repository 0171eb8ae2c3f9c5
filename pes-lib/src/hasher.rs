//! The rasum content fingerprint used for achievement identification.
//!
//! A streaming MD5 over the ROM payload after the platform's conventional
//! header (when present) has been skipped, so the digest is stable across
//! headered and headerless dumps of the same cartridge.

use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::ReadSeek;
use crate::error::ScanError;

const CHUNK_SIZE: usize = 64 * 1024; // 64 KB

/// iNES magic: "NES" followed by an MS-DOS EOF byte.
const NES_MAGIC: [u8; 4] = [0x4E, 0x45, 0x53, 0x1A];
const NES_HEADER_SIZE: u64 = 16;

/// Copier/SMD headers are both 512 bytes on top of a power-of-two image.
const COPIER_HEADER_SIZE: u64 = 512;

/// Console families with distinct header-stripping conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RomFamily {
    Genesis,
    Nes,
    Snes,
    Generic,
}

impl RomFamily {
    /// Derive the hash family from a console's display name. Consoles the
    /// conventions don't cover hash the whole file.
    pub fn for_console(console_name: &str) -> Self {
        let name = console_name.to_lowercase();
        if name.contains("snes") || name.contains("super nintendo") || name.contains("super famicom")
        {
            Self::Snes
        } else if name.contains("nes") || name.contains("famicom") {
            Self::Nes
        } else if name.contains("genesis") || name.contains("mega drive") || name.contains("megadrive")
        {
            Self::Genesis
        } else {
            Self::Generic
        }
    }
}

/// Compute the rasum digest of a ROM file.
pub fn rasum(path: &Path, family: RomFamily) -> Result<String, ScanError> {
    let mut file = std::fs::File::open(path)?;
    rasum_reader(&mut file, family)
}

/// Compute the rasum digest from any seekable reader.
pub fn rasum_reader(reader: &mut dyn ReadSeek, family: RomFamily) -> Result<String, ScanError> {
    let file_size = reader.seek(SeekFrom::End(0))?;
    let skip = header_size(reader, file_size, family)?;
    reader.seek(SeekFrom::Start(skip))?;

    let mut ctx = md5::Context::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        ctx.consume(&buf[..n]);
    }

    Ok(format!("{:x}", ctx.compute()))
}

/// Bytes to skip before hashing, per the family's published convention.
fn header_size(
    reader: &mut dyn ReadSeek,
    file_size: u64,
    family: RomFamily,
) -> Result<u64, ScanError> {
    match family {
        RomFamily::Generic => Ok(0),
        RomFamily::Nes => {
            if file_size < NES_MAGIC.len() as u64 {
                return Ok(0);
            }
            reader.seek(SeekFrom::Start(0))?;
            let mut magic = [0u8; 4];
            reader.read_exact(&mut magic)?;
            if magic != NES_MAGIC {
                return Ok(0);
            }
            if file_size < NES_HEADER_SIZE {
                return Err(ScanError::malformed_rom(format!(
                    "iNES magic present but file is only {file_size} bytes"
                )));
            }
            Ok(NES_HEADER_SIZE)
        }
        RomFamily::Snes => Ok(if file_size % 1024 == COPIER_HEADER_SIZE {
            COPIER_HEADER_SIZE
        } else {
            0
        }),
        RomFamily::Genesis => Ok(if file_size % 16384 == COPIER_HEADER_SIZE {
            COPIER_HEADER_SIZE
        } else {
            0
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn md5_of(data: &[u8]) -> String {
        format!("{:x}", md5::compute(data))
    }

    #[test]
    fn family_from_console_name() {
        assert_eq!(RomFamily::for_console("NES"), RomFamily::Nes);
        assert_eq!(RomFamily::for_console("SNES"), RomFamily::Snes);
        assert_eq!(RomFamily::for_console("Super Nintendo"), RomFamily::Snes);
        assert_eq!(RomFamily::for_console("Mega Drive"), RomFamily::Genesis);
        assert_eq!(RomFamily::for_console("Sega Genesis"), RomFamily::Genesis);
        assert_eq!(RomFamily::for_console("Game Boy"), RomFamily::Generic);
    }

    #[test]
    fn generic_hashes_the_whole_file() {
        let data = b"not a real rom".to_vec();
        let mut cursor = Cursor::new(data.clone());
        let digest = rasum_reader(&mut cursor, RomFamily::Generic).unwrap();
        assert_eq!(digest, md5_of(&data));
    }

    #[test]
    fn nes_skips_the_ines_header() {
        let payload = vec![0xABu8; 2048];
        let mut rom = NES_MAGIC.to_vec();
        rom.resize(NES_HEADER_SIZE as usize, 0);
        rom.extend_from_slice(&payload);

        let mut cursor = Cursor::new(rom);
        let digest = rasum_reader(&mut cursor, RomFamily::Nes).unwrap();
        assert_eq!(digest, md5_of(&payload));
    }

    #[test]
    fn headerless_nes_dump_hashes_everything() {
        let data = vec![0x42u8; 2048];
        let mut cursor = Cursor::new(data.clone());
        let digest = rasum_reader(&mut cursor, RomFamily::Nes).unwrap();
        assert_eq!(digest, md5_of(&data));
    }

    #[test]
    fn truncated_ines_header_is_malformed() {
        let mut cursor = Cursor::new(NES_MAGIC.to_vec());
        let err = rasum_reader(&mut cursor, RomFamily::Nes).unwrap_err();
        assert!(matches!(err, ScanError::MalformedRom(_)));
    }

    #[test]
    fn snes_skips_copier_header_only_when_present() {
        let payload = vec![0x10u8; 1024];

        let mut headered = vec![0xFFu8; COPIER_HEADER_SIZE as usize];
        headered.extend_from_slice(&payload);
        let mut cursor = Cursor::new(headered);
        assert_eq!(
            rasum_reader(&mut cursor, RomFamily::Snes).unwrap(),
            md5_of(&payload)
        );

        let mut cursor = Cursor::new(payload.clone());
        assert_eq!(
            rasum_reader(&mut cursor, RomFamily::Snes).unwrap(),
            md5_of(&payload)
        );
    }

    #[test]
    fn genesis_skips_smd_header_only_when_present() {
        let payload = vec![0x22u8; 16384];

        let mut headered = vec![0x00u8; COPIER_HEADER_SIZE as usize];
        headered.extend_from_slice(&payload);
        let mut cursor = Cursor::new(headered);
        assert_eq!(
            rasum_reader(&mut cursor, RomFamily::Genesis).unwrap(),
            md5_of(&payload)
        );

        let mut cursor = Cursor::new(payload.clone());
        assert_eq!(
            rasum_reader(&mut cursor, RomFamily::Genesis).unwrap(),
            md5_of(&payload)
        );
    }

    #[test]
    fn digest_is_stable_across_invocations() {
        let data = vec![0x99u8; 4096];
        let mut a = Cursor::new(data.clone());
        let mut b = Cursor::new(data);
        assert_eq!(
            rasum_reader(&mut a, RomFamily::Generic).unwrap(),
            rasum_reader(&mut b, RomFamily::Generic).unwrap()
        );
    }
}
