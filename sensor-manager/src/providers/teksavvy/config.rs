pub const BASE_URL: &str = "https://api.teksavvy.com";
pub const USAGE_PATH: &str = "/web/Usage/UsageSummaryRecords";

/// OData filter selecting the current billing period server-side
pub const CURRENT_FILTER: (&str, &str) = ("$filter", "IsCurrent eq true");

pub const API_KEY_HEADER: &str = "TekSavvy-APIKey";

pub const UNIT: &str = "GB";
pub const ICON: &str = "mdi:chart-donut";
