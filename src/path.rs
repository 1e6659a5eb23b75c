// Path grammar: `<digit> ':' '/' <name> ('/' <name>)*`. The leading
// digit selects a disk (only disk 0 exists today); everything after is
// a plain FAT16 directory traversal from the root.

use crate::errors::KernelError;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

pub(crate) struct ParsedPath {
    pub(crate) disk: u8,
    pub(crate) parts: Vec<String>,
}

pub(crate) fn parse(raw: &str) -> Result<ParsedPath, KernelError> {
    let mut chars = raw.chars();
    let disk_char = chars.next().ok_or(KernelError::InvalidPath)?;
    let disk = disk_char.to_digit(10).ok_or(KernelError::InvalidPath)? as u8;

    if chars.next() != Some(':') {
        return Err(KernelError::InvalidPath);
    }
    if chars.next() != Some('/') {
        return Err(KernelError::InvalidPath);
    }

    let rest = chars.as_str();
    let parts = rest
        .split('/')
        .filter(|p| !p.is_empty())
        .map(|p| p.to_string())
        .collect();

    Ok(ParsedPath { disk, parts })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_disk_and_components() {
        let p = parse("0:/bin/init.elf").unwrap();
        assert_eq!(p.disk, 0);
        assert_eq!(p.parts, vec!["bin".to_string(), "init.elf".to_string()]);
    }

    #[test]
    fn root_has_no_components() {
        let p = parse("0:/").unwrap();
        assert!(p.parts.is_empty());
    }

    #[test]
    fn collapses_repeated_slashes() {
        let p = parse("0:/bin//init.elf").unwrap();
        assert_eq!(p.parts, vec!["bin".to_string(), "init.elf".to_string()]);
    }

    #[test]
    fn rejects_missing_colon() {
        assert!(parse("0/bin").is_err());
    }

    #[test]
    fn rejects_missing_leading_slash() {
        assert!(parse("0:bin").is_err());
    }

    #[test]
    fn rejects_non_digit_disk() {
        assert!(parse("a:/bin").is_err());
    }

    #[test]
    fn rejects_empty_input() {
        assert!(parse("").is_err());
    }
}
