use std::str::FromStr;

/// A 16-bit address or size argument. Accepts decimal, `0x`-prefixed hex,
/// or hex with a trailing `h`.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Addr(pub u16);

impl FromStr for Addr {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: u16 = if let Some(digits) = s.strip_suffix('h').or_else(|| s.strip_suffix('H')) {
            u16::from_str_radix(digits, 0x10)?
        } else if let Some(digits) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            u16::from_str_radix(digits, 0x10)?
        } else {
            u16::from_str(s)?
        };
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_addr() {
        assert_eq!(Addr::from_str("0").unwrap().0, 0);
        assert_eq!(Addr::from_str("256").unwrap().0, 256);
        assert_eq!(Addr::from_str("0x100").unwrap().0, 0x100);
        assert_eq!(Addr::from_str("0XFF").unwrap().0, 0xff);
        assert_eq!(Addr::from_str("100h").unwrap().0, 0x100);
        assert_eq!(Addr::from_str("0E000H").unwrap().0, 0xe000);
        assert!(Addr::from_str("").is_err());
        assert!(Addr::from_str("zz").is_err());
        assert!(Addr::from_str("0x10000").is_err());
    }
}
