use std::{fmt, str::FromStr};

use crate::error::CardError;

/// Straight-alpha RGBA8 color. Template documents carry colors as CSS-style
/// hex strings (`#rgb`, `#rrggbb`, `#rrggbbaa`) or functional
/// `rgb(...)`/`rgba(...)` notation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const WHITE: Rgba8 = Rgba8::new(255, 255, 255, 255);
    pub const BLACK: Rgba8 = Rgba8::new(0, 0, 0, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    /// Premultiplied representation, matching the decode path's rounding.
    pub fn to_premul(self) -> [u8; 4] {
        let a = self.a as u16;
        if a == 0 {
            return [0, 0, 0, 0];
        }
        let premul = |c: u8| ((c as u16 * a + 127) / 255) as u8;
        [premul(self.r), premul(self.g), premul(self.b), self.a]
    }
}

impl fmt::Display for Rgba8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 255 {
            write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            write!(
                f,
                "#{:02x}{:02x}{:02x}{:02x}",
                self.r, self.g, self.b, self.a
            )
        }
    }
}

impl FromStr for Rgba8 {
    type Err = CardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.starts_with("rgb") {
            return parse_functional(s);
        }
        let hex = s
            .strip_prefix('#')
            .ok_or_else(|| CardError::validation(format!("color '{s}' must start with '#'")))?;
        let nib = |c: u8| -> Result<u8, CardError> {
            (c as char)
                .to_digit(16)
                .map(|d| d as u8)
                .ok_or_else(|| CardError::validation(format!("color '{s}' has a non-hex digit")))
        };
        let bytes = hex.as_bytes();
        match bytes.len() {
            3 => {
                let c = |i: usize| -> Result<u8, CardError> { Ok(nib(bytes[i])? * 17) };
                Ok(Rgba8::opaque(c(0)?, c(1)?, c(2)?))
            }
            6 | 8 => {
                let c = |i: usize| -> Result<u8, CardError> {
                    Ok(nib(bytes[i])? * 16 + nib(bytes[i + 1])?)
                };
                let a = if bytes.len() == 8 { c(6)? } else { 255 };
                Ok(Rgba8::new(c(0)?, c(2)?, c(4)?, a))
            }
            _ => Err(CardError::validation(format!(
                "color '{s}' must be #rgb, #rrggbb or #rrggbbaa"
            ))),
        }
    }
}

fn parse_functional(s: &str) -> Result<Rgba8, CardError> {
    let bad = || CardError::validation(format!("color '{s}' is not valid rgb()/rgba() notation"));
    let inner = s
        .strip_prefix("rgba")
        .or_else(|| s.strip_prefix("rgb"))
        .and_then(|r| r.trim().strip_prefix('('))
        .and_then(|r| r.strip_suffix(')'))
        .ok_or_else(bad)?;
    let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
    if parts.len() != 3 && parts.len() != 4 {
        return Err(bad());
    }
    let chan = |p: &str| -> Result<u8, CardError> { p.parse::<u8>().map_err(|_| bad()) };
    let a = match parts.get(3) {
        Some(p) => {
            let f = p.parse::<f64>().map_err(|_| bad())?;
            (f.clamp(0.0, 1.0) * 255.0).round() as u8
        }
        None => 255,
    };
    Ok(Rgba8::new(chan(parts[0])?, chan(parts[1])?, chan(parts[2])?, a))
}

impl serde::Serialize for Rgba8 {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for Rgba8 {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_hex_forms() {
        assert_eq!("#fff".parse::<Rgba8>().unwrap(), Rgba8::WHITE);
        assert_eq!(
            "#b71c1c".parse::<Rgba8>().unwrap(),
            Rgba8::opaque(0xb7, 0x1c, 0x1c)
        );
        assert_eq!(
            "#ffffff80".parse::<Rgba8>().unwrap(),
            Rgba8::new(255, 255, 255, 0x80)
        );
        assert!("fff".parse::<Rgba8>().is_err());
        assert!("#ggg".parse::<Rgba8>().is_err());
        assert!("#ffff".parse::<Rgba8>().is_err());
    }

    #[test]
    fn parses_functional_notation() {
        assert_eq!(
            "rgb(255, 183, 77)".parse::<Rgba8>().unwrap(),
            Rgba8::opaque(255, 183, 77)
        );
        assert_eq!(
            "rgba(255, 255, 255, 0.8)".parse::<Rgba8>().unwrap(),
            Rgba8::new(255, 255, 255, 204)
        );
        assert!("rgba(1, 2)".parse::<Rgba8>().is_err());
        assert!("rgba(300, 0, 0, 1)".parse::<Rgba8>().is_err());
    }

    #[test]
    fn display_round_trips() {
        for c in [Rgba8::opaque(1, 2, 3), Rgba8::new(10, 20, 30, 40)] {
            assert_eq!(c.to_string().parse::<Rgba8>().unwrap(), c);
        }
    }

    #[test]
    fn premul_matches_decode_rounding() {
        let c = Rgba8::new(100, 50, 200, 128);
        assert_eq!(
            c.to_premul(),
            [
                ((100u16 * 128 + 127) / 255) as u8,
                ((50u16 * 128 + 127) / 255) as u8,
                ((200u16 * 128 + 127) / 255) as u8,
                128
            ]
        );
        assert_eq!(Rgba8::new(9, 9, 9, 0).to_premul(), [0, 0, 0, 0]);
    }
}
