//! ProDOS file type codes.

pub const TEXT: u8 = 0x04;
pub const BINARY: u8 = 0x06;
pub const FONT_8BIT: u8 = 0x07;
pub const GRAPHICS_8BIT: u8 = 0x08;
pub const DIRECTORY: u8 = 0x0F;
pub const ADB: u8 = 0x19;
pub const AWP: u8 = 0x1A;
pub const ASP: u8 = 0x1B;
pub const DESCRIPTOR_TABLE: u8 = 0x42;
pub const GWP: u8 = 0x50;
pub const IIGS_SOURCE: u8 = 0xB0;
pub const IIGS_APPLICATION: u8 = 0xB3;
pub const IIGS_DEVICE_DRIVER: u8 = 0xBB;
pub const FST: u8 = 0xBD;
pub const PNT: u8 = 0xC0;
pub const PIC: u8 = 0xC1;
pub const FONT: u8 = 0xC8;
pub const FINDER: u8 = 0xC9;
pub const ICN: u8 = 0xCA;
pub const APPLETALK: u8 = 0xE2;
pub const PASCAL_VOLUME: u8 = 0xEF;
pub const USER_DEFINED_1: u8 = 0xF1;
pub const BAT: u8 = 0xF5;
pub const INTEGER_BASIC: u8 = 0xFA;
pub const APPLESOFT: u8 = 0xFC;
pub const VARIABLES: u8 = 0xFD;
pub const RELOCATABLE: u8 = 0xFE;
pub const SYSTEM: u8 = 0xFF;

const NAMES: &[(u8, &str)] = &[
    (0x00, "NON"),
    (0x01, "BAD"),
    (0x02, "PCD"),
    (0x03, "PTX"),
    (TEXT, "TXT"),
    (0x05, "PDA"),
    (BINARY, "BIN"),
    (FONT_8BIT, "FNT"),
    (GRAPHICS_8BIT, "FOT"),
    (0x09, "BA3"),
    (0x0A, "DA3"),
    (0x0B, "WPF"),
    (0x0C, "SOS"),
    (DIRECTORY, "DIR"),
    (0x10, "RPD"),
    (0x11, "RPI"),
    (0x12, "AFD"),
    (0x13, "AFM"),
    (0x14, "AFR"),
    (0x15, "SCL"),
    (0x16, "PFS"),
    (ADB, "ADB"),
    (AWP, "AWP"),
    (ASP, "ASP"),
    (0x20, "TDM"),
    (0x21, "IPS"),
    (0x22, "UPV"),
    (0x29, "3SD"),
    (0x2A, "8SC"),
    (0x2B, "8OB"),
    (0x2C, "8IC"),
    (0x2D, "8LD"),
    (0x2E, "P8C"),
    (DESCRIPTOR_TABLE, "FTD"),
    (GWP, "GWP"),
    (0x51, "GSS"),
    (0x52, "GDB"),
    (0x53, "DRW"),
    (0x54, "GDP"),
    (0x55, "HMD"),
    (0x56, "EDU"),
    (0x57, "STN"),
    (0x58, "HLP"),
    (0x59, "COM"),
    (0x5A, "CFG"),
    (0x5B, "ANM"),
    (0x5C, "MUM"),
    (0x5D, "ENT"),
    (0x5E, "DVU"),
    (0x60, "PRE"),
    (0x6B, "BIO"),
    (0x6D, "DVR"),
    (0x6E, "PRE"),
    (0x6F, "HDV"),
    (0x80, "GES"),
    (0x81, "GEA"),
    (0x82, "GEO"),
    (0x83, "GED"),
    (0x84, "GEF"),
    (0x85, "GEP"),
    (0x86, "GEI"),
    (0x87, "GEX"),
    (0x89, "GEV"),
    (0x8B, "GEC"),
    (0x8C, "GEK"),
    (0x8D, "GEW"),
    (0xA0, "WP "),
    (0xAB, "GSB"),
    (0xAC, "TDF"),
    (0xAD, "BDF"),
    (IIGS_SOURCE, "SRC"),
    (0xB1, "OBJ"),
    (0xB2, "LIB"),
    (IIGS_APPLICATION, "S16"),
    (0xB4, "RTL"),
    (0xB5, "EXE"),
    (0xB6, "PIF"),
    (0xB7, "TIF"),
    (0xB8, "NDA"),
    (0xB9, "CDA"),
    (0xBA, "TOL"),
    (IIGS_DEVICE_DRIVER, "DVR"),
    (0xBC, "LDF"),
    (FST, "FST"),
    (0xBF, "DOC"),
    (PNT, "PNT"),
    (PIC, "PIC"),
    (0xC2, "ANI"),
    (0xC3, "PAL"),
    (0xC5, "OOG"),
    (0xC6, "SCR"),
    (0xC7, "CDV"),
    (FONT, "FON"),
    (FINDER, "FND"),
    (ICN, "ICN"),
    (0xD5, "MUS"),
    (0xD6, "INS"),
    (0xD7, "MDI"),
    (0xD8, "SND"),
    (0xDB, "DBM"),
    (0xE0, "LBR"),
    (APPLETALK, "ATK"),
    (0xEE, "R16"),
    (PASCAL_VOLUME, "PAS"),
    (0xF0, "CMD"),
    (USER_DEFINED_1, "OVL"),
    (0xF2, "UD2"),
    (0xF3, "UD3"),
    (0xF4, "UD4"),
    (BAT, "BAT"),
    (0xF6, "UD6"),
    (0xF7, "UD7"),
    (0xF8, "PRG"),
    (0xF9, "P16"),
    (INTEGER_BASIC, "INT"),
    (0xFB, "IVR"),
    (APPLESOFT, "BAS"),
    (VARIABLES, "VAR"),
    (RELOCATABLE, "REL"),
    (SYSTEM, "SYS"),
];

/// The three-letter abbreviation of a file type, or `$XX` for codes with
/// no common name.
pub fn type_name(file_type: u8) -> String {
    match NAMES.iter().find(|(code, _)| *code == file_type) {
        Some((_, name)) => name.to_string(),
        None => format!("${:02X}", file_type),
    }
}

/// GEOS files on ProDOS volumes use types 0x80 to 0x8F.
pub fn is_geos(file_type: u8) -> bool {
    file_type & 0xF0 == 0x80
}

/// Types that share the "binary-like" decoding rules.
pub fn is_binary_like(file_type: u8) -> bool {
    matches!(
        file_type,
        BINARY | RELOCATABLE | SYSTEM | BAT | USER_DEFINED_1
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_name() {
        assert_eq!(type_name(0x04), "TXT");
        assert_eq!(type_name(0xFC), "BAS");
        assert_eq!(type_name(0xC1), "PIC");
        assert_eq!(type_name(0x3F), "$3F");
        assert!(is_geos(0x82));
        assert!(!is_geos(0x92));
        assert!(is_binary_like(0xFF));
        assert!(!is_binary_like(0x04));
    }

    #[test]
    fn test_codes_are_unique() {
        let mut codes: Vec<u8> = NAMES.iter().map(|(c, _)| *c).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), NAMES.len());
    }
}
