//! Everything related to the program ROM and its header.

use std::{
    fmt,
    fs,
    io,
    path::{Path, PathBuf},
};

use crate::{
    log::*,
    primitives::Byte,
};


/// Offset of the four magic bytes within the ROM.
const MAGIC_OFFSET: usize = 0x100;

/// The header magic, read little-endian.
const MAGIC: u32 = 0x0531_6690;

/// Smallest ROM that still contains a complete header page.
pub const MIN_ROM_SIZE: usize = 0x210;

/// ROMs cannot exceed the 64 MiB ROM region of the address space.
pub const MAX_ROM_SIZE: usize = 0x0400_0000;


/// Errors that can occur while loading a program file. All of them are fatal:
/// an invalid program is never mounted.
#[derive(Debug)]
pub enum LoadError {
    Io(io::Error),
    TooSmall(usize),
    TooLarge(usize),
    BadMagic(u32),
    BadTitle(String),
    BadAuthor(String),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LoadError::Io(e) => write!(f, "could not read program file: {}", e),
            LoadError::TooSmall(size) => write!(
                f,
                "program file is too small ({} bytes, minimum is {})",
                size,
                MIN_ROM_SIZE,
            ),
            LoadError::TooLarge(size) => write!(
                f,
                "program file is too large ({} bytes, maximum is {})",
                size,
                MAX_ROM_SIZE,
            ),
            LoadError::BadMagic(found) => write!(
                f,
                "missing or incorrect magic number in program header (found 0x{:08x})",
                found,
            ),
            LoadError::BadTitle(why) => write!(f, "invalid title in program header: {}", why),
            LoadError::BadAuthor(why) => write!(f, "invalid author in program header: {}", why),
        }
    }
}

impl std::error::Error for LoadError {}

impl From<io::Error> for LoadError {
    fn from(e: io::Error) -> Self {
        LoadError::Io(e)
    }
}


/// A loaded and validated program.
///
/// Contains the full ROM image, the header metadata and the save RAM backing
/// buffer (with its sidecar file path, when the program was loaded from disk).
pub struct Program {
    rom: Box<[Byte]>,
    title: String,
    author: String,
    sram: Vec<Byte>,
    sram_path: Option<PathBuf>,
}

impl Program {
    /// Loads and validates a program file. If the header requests save RAM,
    /// the `<path>.sram` sidecar is loaded as well (a missing sidecar is
    /// fine, the save RAM simply starts out zeroed).
    pub fn load_file(path: &Path) -> Result<Self, LoadError> {
        let bytes = fs::read(path)?;

        let mut sidecar = path.as_os_str().to_owned();
        sidecar.push(".sram");
        let mut program = Self::from_bytes(&bytes, Some(PathBuf::from(sidecar)))?;

        if let Err(e) = program.load_sram() {
            warn!("[program] could not read SRAM sidecar: {}", e);
        }

        info!("[program] loaded '{}' by {} ({} bytes)", program.title, program.author, bytes.len());
        Ok(program)
    }

    /// Validates a ROM image held in memory. No sidecar is read; pass the
    /// path it should be written to later, or `None` to keep the save RAM
    /// purely in memory.
    pub fn from_bytes(bytes: &[u8], sram_path: Option<PathBuf>) -> Result<Self, LoadError> {
        if bytes.len() < MIN_ROM_SIZE {
            return Err(LoadError::TooSmall(bytes.len()));
        } else if bytes.len() > MAX_ROM_SIZE {
            return Err(LoadError::TooLarge(bytes.len()));
        }

        let magic = u32::from_le_bytes([
            bytes[MAGIC_OFFSET],
            bytes[MAGIC_OFFSET + 1],
            bytes[MAGIC_OFFSET + 2],
            bytes[MAGIC_OFFSET + 3],
        ]);
        if magic != MAGIC {
            return Err(LoadError::BadMagic(magic));
        }

        let title = read_header_string(&bytes[0x120..0x140]).map_err(LoadError::BadTitle)?;
        let author = read_header_string(&bytes[0x140..0x160]).map_err(LoadError::BadAuthor)?;

        let sram_size = u32::from_le_bytes([
            bytes[0x104],
            bytes[0x105],
            bytes[0x106],
            bytes[0x107],
        ]);

        let rom: Vec<_> = bytes.iter().cloned().map(Byte::new).collect();

        Ok(Self {
            rom: rom.into_boxed_slice(),
            title,
            author,
            sram: vec![Byte::zero(); sram_size as usize],
            sram_path,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn has_sram(&self) -> bool {
        !self.sram.is_empty()
    }

    /// Reads a [`Byte`] from the ROM. Reads past the end of the image (but
    /// still inside the 64 MiB ROM region) float high, like an unmapped bus.
    pub fn read_rom(&self, offset: u32) -> Byte {
        match self.rom.get(offset as usize) {
            Some(b) => *b,
            None => Byte::new(0xff),
        }
    }

    /// Reads a [`Byte`] from the save RAM.
    pub fn read_sram(&self, offset: u32) -> Byte {
        match self.sram.get(offset as usize) {
            Some(b) => *b,
            None => {
                error!("[program] relative SRAM address 0x{:x} is out of range", offset);
                Byte::new(0xff)
            }
        }
    }

    /// Writes a [`Byte`] to the save RAM. Out-of-range writes are dropped.
    pub fn write_sram(&mut self, offset: u32, byte: Byte) {
        match self.sram.get_mut(offset as usize) {
            Some(b) => *b = byte,
            None => {
                error!("[program] relative SRAM address 0x{:x} is out of range", offset);
            }
        }
    }

    /// Fills the save RAM from the sidecar file, if one exists.
    fn load_sram(&mut self) -> io::Result<()> {
        let path = match &self.sram_path {
            Some(path) if self.has_sram() && path.exists() => path,
            _ => return Ok(()),
        };

        let bytes = fs::read(path)?;
        for (dst, src) in self.sram.iter_mut().zip(bytes) {
            *dst = Byte::new(src);
        }

        debug!("[program] loaded SRAM from {}", path.display());
        Ok(())
    }

    /// Writes the save RAM back to the sidecar file. Call this when shutting
    /// the emulator down.
    pub fn save_sram(&self) -> io::Result<()> {
        let path = match &self.sram_path {
            Some(path) if self.has_sram() => path,
            _ => return Ok(()),
        };

        let bytes: Vec<u8> = self.sram.iter().map(|b| b.get()).collect();
        fs::write(path, bytes)?;

        debug!("[program] saved SRAM to {}", path.display());
        Ok(())
    }
}

// Manual implementation to omit printing the full ROM image.
impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Program")
            .field("length", &self.rom.len())
            .field("title", &self.title)
            .field("author", &self.author)
            .field("sram", &self.sram.len())
            .finish()
    }
}

/// Reads a null-terminated printable string out of a 32-byte header field.
fn read_header_string(field: &[u8]) -> Result<String, String> {
    let mut out = String::new();
    for (i, &b) in field.iter().enumerate() {
        if b == 0x00 {
            return Ok(out);
        }

        if !b.is_ascii() || b.is_ascii_control() {
            return Err(format!("byte #{} is not a printable character", i + 1));
        }

        out.push(b as char);
    }

    Err("missing null terminator within 32 bytes".into())
}


#[cfg(test)]
mod test {
    use super::*;


    fn rom_with_header() -> Vec<u8> {
        let mut rom = vec![0u8; MIN_ROM_SIZE];
        rom[0x100..0x104].copy_from_slice(&[0x90, 0x66, 0x31, 0x05]);
        rom[0x120..0x125].copy_from_slice(b"title");
        rom[0x140..0x146].copy_from_slice(b"author");
        rom
    }

    #[test]
    fn test_valid_header() {
        let program = Program::from_bytes(&rom_with_header(), None).unwrap();
        assert_eq!(program.title(), "title");
        assert_eq!(program.author(), "author");
        assert!(!program.has_sram());
    }

    #[test]
    fn test_sram_size_field() {
        let mut rom = rom_with_header();
        rom[0x104..0x108].copy_from_slice(&0x4000u32.to_le_bytes());
        let mut program = Program::from_bytes(&rom, None).unwrap();
        assert!(program.has_sram());

        program.write_sram(0x3fff, Byte::new(0xab));
        assert_eq!(program.read_sram(0x3fff), 0xab);
        // Out of range accesses degrade instead of aborting.
        assert_eq!(program.read_sram(0x4000), 0xff);
    }

    #[test]
    fn test_rejects_bad_roms() {
        assert!(matches!(
            Program::from_bytes(&[0u8; 16], None),
            Err(LoadError::TooSmall(16)),
        ));

        let mut rom = rom_with_header();
        rom[0x100] = 0x91;
        assert!(matches!(Program::from_bytes(&rom, None), Err(LoadError::BadMagic(_))));

        let mut rom = rom_with_header();
        rom[0x122] = 0x07; // unprintable byte inside the title
        assert!(matches!(Program::from_bytes(&rom, None), Err(LoadError::BadTitle(_))));

        let mut rom = rom_with_header();
        for b in &mut rom[0x140..0x160] {
            *b = b'x'; // author field without a null terminator
        }
        assert!(matches!(Program::from_bytes(&rom, None), Err(LoadError::BadAuthor(_))));
    }

    #[test]
    fn test_rom_reads_float_high_past_the_image() {
        let program = Program::from_bytes(&rom_with_header(), None).unwrap();
        assert_eq!(program.read_rom(0x100), 0x90);
        assert_eq!(program.read_rom(MIN_ROM_SIZE as u32), 0xff);
    }
}
