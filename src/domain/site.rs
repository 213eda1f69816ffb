//! Source sites and scraper channels
//!
//! A site row is identified by its brand `name`; the `(name, gender, type)`
//! triple forms a channel, which is the unit one scraper run owns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Audience a site listing targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Unspecified,
    Women,
    Men,
}

impl Gender {
    /// Numeric code stored in the `sites.gender` column and used in channel keys
    pub const fn code(self) -> i64 {
        match self {
            Self::Unspecified => 0,
            Self::Women => 1,
            Self::Men => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Unspecified),
            1 => Some(Self::Women),
            2 => Some(Self::Men),
            _ => None,
        }
    }
}

/// Which listing of a site a channel scrapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SiteType {
    NewArrivals,
    Sale,
}

impl SiteType {
    pub const fn code(self) -> i64 {
        match self {
            Self::NewArrivals => 1,
            Self::Sale => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::NewArrivals),
            2 => Some(Self::Sale),
            _ => None,
        }
    }
}

/// Static description of a site, owned by its adapter and upserted on each run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteDefinition {
    pub name: &'static str,
    pub display_name: &'static str,
    pub scrape_url: &'static str,
    /// Host product links live on; used to route link-health checks
    pub host: &'static str,
    pub gender: Gender,
    pub site_type: SiteType,
    pub description: Option<&'static str>,
}

impl SiteDefinition {
    pub fn channel_key(&self) -> ChannelKey {
        ChannelKey::new(self.name, self.gender, self.site_type)
    }
}

/// Persisted site row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub id: i64,
    pub name: String,
    pub display_name: String,
    pub scrape_url: String,
    pub gender: Gender,
    pub site_type: SiteType,
    pub description: Option<String>,
    pub inserted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Channel identity: one (site, gender, type) scraping unit
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelKey {
    pub site: String,
    pub gender: Gender,
    pub site_type: SiteType,
}

impl ChannelKey {
    pub fn new(site: impl Into<String>, gender: Gender, site_type: SiteType) -> Self {
        Self {
            site: site.into(),
            gender,
            site_type,
        }
    }
}

/// Renders as `Name_gender_type`, e.g. `Freepeople_1_1`
impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}",
            self.site,
            self.gender.code(),
            self.site_type.code()
        )
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChannelKeyError {
    #[error("channel key '{0}' must look like Name_gender_type")]
    Malformed(String),

    #[error("unknown gender code '{0}'")]
    UnknownGender(String),

    #[error("unknown site type code '{0}'")]
    UnknownSiteType(String),
}

impl FromStr for ChannelKey {
    type Err = ChannelKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Site names may themselves contain '-' but never '_'
        let mut parts = s.rsplitn(3, '_');
        let (Some(type_part), Some(gender_part), Some(site)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(ChannelKeyError::Malformed(s.to_string()));
        };
        if site.is_empty() {
            return Err(ChannelKeyError::Malformed(s.to_string()));
        }

        let gender = gender_part
            .parse::<i64>()
            .ok()
            .and_then(Gender::from_code)
            .ok_or_else(|| ChannelKeyError::UnknownGender(gender_part.to_string()))?;
        let site_type = type_part
            .parse::<i64>()
            .ok()
            .and_then(SiteType::from_code)
            .ok_or_else(|| ChannelKeyError::UnknownSiteType(type_part.to_string()))?;

        Ok(Self::new(site, gender, site_type))
    }
}

/// Scraper control record: the heartbeat of one channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScraperRecord {
    pub site_id: i64,
    pub channel: ChannelKey,
    pub last_scraped: Option<DateTime<Utc>>,
}

impl ScraperRecord {
    /// A channel is stale when it never ran or last ran before `threshold`
    pub fn is_stale(&self, threshold: DateTime<Utc>) -> bool {
        self.last_scraped.is_none_or(|at| at < threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rstest::rstest;

    #[rstest]
    #[case("Freepeople_1_1", "Freepeople", Gender::Women, SiteType::NewArrivals)]
    #[case("Urban-outfitters_2_2", "Urban-outfitters", Gender::Men, SiteType::Sale)]
    #[case("Basics_0_2", "Basics", Gender::Unspecified, SiteType::Sale)]
    fn channel_key_parses_original_naming(
        #[case] raw: &str,
        #[case] site: &str,
        #[case] gender: Gender,
        #[case] site_type: SiteType,
    ) {
        let key: ChannelKey = raw.parse().unwrap();
        assert_eq!(key, ChannelKey::new(site, gender, site_type));
        assert_eq!(key.to_string(), raw);
    }

    #[rstest]
    #[case("Freepeople")]
    #[case("_1_1")]
    #[case("Freepeople_9_1")]
    #[case("Freepeople_1_x")]
    fn channel_key_rejects_garbage(#[case] raw: &str) {
        assert!(raw.parse::<ChannelKey>().is_err());
    }

    #[test]
    fn scraper_staleness() {
        let now = Utc::now();
        let mut record = ScraperRecord {
            site_id: 1,
            channel: ChannelKey::new("Hm", Gender::Women, SiteType::Sale),
            last_scraped: None,
        };
        assert!(record.is_stale(now));

        record.last_scraped = Some(now - Duration::hours(30));
        assert!(record.is_stale(now - Duration::hours(24)));

        record.last_scraped = Some(now - Duration::hours(1));
        assert!(!record.is_stale(now - Duration::hours(24)));
    }
}
