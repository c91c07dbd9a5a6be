// Administrative levels and their boundary service equivalents
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum AdminLevel {
    #[serde(rename = "#country")]
    Country,
    #[serde(rename = "#adm1")]
    Adm1,
    #[serde(rename = "#adm2")]
    Adm2,
    #[serde(rename = "#adm3")]
    Adm3,
    #[serde(rename = "#adm4")]
    Adm4,
    #[serde(rename = "#adm5")]
    Adm5,
}

impl AdminLevel {
    /// Most specific first; the order used when guessing a layer's level.
    pub const MOST_SPECIFIC_FIRST: [AdminLevel; 6] = [
        AdminLevel::Adm5,
        AdminLevel::Adm4,
        AdminLevel::Adm3,
        AdminLevel::Adm2,
        AdminLevel::Adm1,
        AdminLevel::Country,
    ];

    /// Parse a hashtag such as `#adm2` (the leading `#` is optional).
    pub fn from_tag(tag: &str) -> Option<Self> {
        let tag = tag.trim().trim_start_matches('#').to_lowercase();
        match tag.as_str() {
            "country" => Some(AdminLevel::Country),
            "adm1" => Some(AdminLevel::Adm1),
            "adm2" => Some(AdminLevel::Adm2),
            "adm3" => Some(AdminLevel::Adm3),
            "adm4" => Some(AdminLevel::Adm4),
            "adm5" => Some(AdminLevel::Adm5),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            AdminLevel::Country => "#country",
            AdminLevel::Adm1 => "#adm1",
            AdminLevel::Adm2 => "#adm2",
            AdminLevel::Adm3 => "#adm3",
            AdminLevel::Adm4 => "#adm4",
            AdminLevel::Adm5 => "#adm5",
        }
    }

    /// Numeric level on the boundary service.
    pub fn service_level(&self) -> u32 {
        match self {
            AdminLevel::Country => 1,
            AdminLevel::Adm1 => 2,
            AdminLevel::Adm2 => 3,
            AdminLevel::Adm3 => 4,
            AdminLevel::Adm4 => 5,
            AdminLevel::Adm5 => 6,
        }
    }

    /// Sub-layer name listed in the per-country metadata document.
    pub fn layer_name(&self) -> &'static str {
        match self {
            AdminLevel::Country => "Admin0",
            AdminLevel::Adm1 => "Admin1",
            AdminLevel::Adm2 => "Admin2",
            AdminLevel::Adm3 => "Admin3",
            AdminLevel::Adm4 => "Admin4",
            AdminLevel::Adm5 => "Admin5",
        }
    }

    /// Feature property holding the p-code at this level.
    pub fn code_property(&self) -> &'static str {
        match self {
            AdminLevel::Country => "admin0Pcode",
            AdminLevel::Adm1 => "admin1Pcode",
            AdminLevel::Adm2 => "admin2Pcode",
            AdminLevel::Adm3 => "admin3Pcode",
            AdminLevel::Adm4 => "admin4Pcode",
            AdminLevel::Adm5 => "admin5Pcode",
        }
    }
}

impl fmt::Display for AdminLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}
