/// Classification and scrape-status definitions for tracked URLs and entities
use std::fmt;

/// Category assigned to a URL by the categorizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UrlType {
    /// Adoptable-animal detail page
    Entity,

    /// Paginated index of entity links
    Listing,

    General,
    Service,
    Advice,

    /// Media, admin, cart and other never-scraped paths
    Ignored,
}

impl UrlType {
    /// Returns true for the types the content scraper handles
    pub fn is_content(&self) -> bool {
        matches!(self, Self::General | Self::Service | Self::Advice)
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Entity => "entity",
            Self::Listing => "listing",
            Self::General => "general",
            Self::Service => "service",
            Self::Advice => "advice",
            Self::Ignored => "ignored",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "entity" => Some(Self::Entity),
            "listing" => Some(Self::Listing),
            "general" => Some(Self::General),
            "service" => Some(Self::Service),
            "advice" => Some(Self::Advice),
            "ignored" => Some(Self::Ignored),
            _ => None,
        }
    }

    /// Returns all URL types
    pub fn all() -> [Self; 6] {
        [
            Self::Entity,
            Self::Listing,
            Self::General,
            Self::Service,
            Self::Advice,
            Self::Ignored,
        ]
    }
}

impl fmt::Display for UrlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// Scrape outcome of a tracked URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScrapeStatus {
    Pending,
    Success,
    Failed,
}

impl ScrapeStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for ScrapeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// Availability of an entity on the site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityStatus {
    Available,

    /// No longer listed; kept for history
    Removed,
}

impl EntityStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Removed => "removed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "available" => Some(Self::Available),
            "removed" => Some(Self::Removed),
            _ => None,
        }
    }
}

impl fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
