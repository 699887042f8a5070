use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Hosting provider types
///
/// Object-storage style providers (`S3`, `Local`) store the file and hand out URLs to it;
/// SaaS style providers (`Wistia`) take the file and return their own player links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostingProvider {
    S3,
    Local,
    Wistia,
}

impl HostingProvider {
    pub fn is_saas(&self) -> bool {
        matches!(self, HostingProvider::Wistia)
    }
}

impl FromStr for HostingProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "s3" => Ok(HostingProvider::S3),
            "local" => Ok(HostingProvider::Local),
            "wistia" => Ok(HostingProvider::Wistia),
            _ => Err(anyhow::anyhow!("Invalid hosting provider: {}", s)),
        }
    }
}

impl Display for HostingProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            HostingProvider::S3 => write!(f, "s3"),
            HostingProvider::Local => write!(f, "local"),
            HostingProvider::Wistia => write!(f, "wistia"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_provider() {
        assert_eq!("S3".parse::<HostingProvider>().unwrap(), HostingProvider::S3);
        assert_eq!(" wistia ".parse::<HostingProvider>().unwrap(), HostingProvider::Wistia);
        assert!("vimeo".parse::<HostingProvider>().is_err());
    }

    #[test]
    fn test_display_matches_serde() {
        let json = serde_json::to_string(&HostingProvider::Local).unwrap();
        assert_eq!(json, format!("\"{}\"", HostingProvider::Local));
    }
}
