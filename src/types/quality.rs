use std::{fmt::Display, str::FromStr};

/// Quality constraint handed to the media fetcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    /// Let the fetcher pick its best available stream
    Best,
    /// Cap the stream height, e.g. 720 or 1080
    MaxHeight(u16),
}

impl Quality {
    /// Build the fetcher's format selector expression.
    pub fn format_selector(self) -> String {
        match self {
            Quality::Best => "best".to_owned(),
            Quality::MaxHeight(h) => format!("best[height<={h}]"),
        }
    }
}

impl FromStr for Quality {
    type Err = Box<dyn std::error::Error + Sync + Send>;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("best") {
            Ok(Self::Best)
        } else {
            Ok(Self::MaxHeight(s.parse()?))
        }
    }
}

impl Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Quality::Best => f.write_str("best"),
            Quality::MaxHeight(h) => write!(f, "{h}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_best_and_heights() {
        assert_eq!("best".parse::<Quality>().unwrap(), Quality::Best);
        assert_eq!("720".parse::<Quality>().unwrap(), Quality::MaxHeight(720));
        assert!("hd".parse::<Quality>().is_err());
    }

    #[test]
    fn format_selector_caps_height() {
        assert_eq!(Quality::Best.format_selector(), "best");
        assert_eq!(
            Quality::MaxHeight(720).format_selector(),
            "best[height<=720]"
        );
    }
}
