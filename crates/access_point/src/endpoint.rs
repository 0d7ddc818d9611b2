use crate::protocol::Protocol;
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Where a sender delivers to. The URLs of `Production` and `Test` come from the
/// protocol version in use.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Endpoint {
    #[default]
    Production,
    Test,
    Custom(Url),
}

impl Endpoint {
    pub fn from_test_flag(test: bool) -> Self {
        if test {
            Endpoint::Test
        } else {
            Endpoint::Production
        }
    }

    pub fn is_test(&self) -> bool {
        matches!(self, Endpoint::Test)
    }

    pub fn resolve<P: Protocol>(&self) -> Result<Url, url::ParseError> {
        match self {
            Endpoint::Production => Url::parse(P::PRODUCTION_URL),
            Endpoint::Test => Url::parse(P::TEST_URL),
            Endpoint::Custom(url) => Ok(url.clone()),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Production => f.write_str("production"),
            Endpoint::Test => f.write_str("test"),
            Endpoint::Custom(url) => write!(f, "{url}"),
        }
    }
}

impl FromStr for Endpoint {
    type Err = url::ParseError;

    /// `production`, `test`, or an absolute URL.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "production" | "prod" => Ok(Endpoint::Production),
            "test" => Ok(Endpoint::Test),
            _ => Url::parse(s.trim()).map(Endpoint::Custom),
        }
    }
}
