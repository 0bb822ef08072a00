// src/config/consts.rs

// Net config
pub const HTTP_TIMEOUT_SECS: u64 = 30;
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
                              AppleWebKit/537.36 (KHTML, like Gecko) \
                              Chrome/124.0.0.0 Safari/537.36";
pub const ACCEPT: &str = "text/html,application/json,text/csv;q=0.9,*/*;q=0.8";
pub const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9,ko;q=0.8";

// Endpoints, in chain order per dataset
pub const KDCA_VACCINE_STAT_URL: &str =
    "https://api.odcloud.kr/api/15077756/v1/vaccine-stat?page=1&perPage=10000&returnType=JSON";
pub const KDCA_INF_STATE_URL: &str =
    "https://openapi.data.go.kr/openapi/service/rest/Covid19/getCovid19InfStateJson?numOfRows=1000&_type=json";
pub const MOHW_VACCINATION_URL: &str =
    "https://apis.data.go.kr/1352000/ODMS_COVID_07/callCovid07Api?numOfRows=1000&returnType=json";
pub const MOHW_DAILY_URL: &str =
    "https://apis.data.go.kr/1352000/ODMS_COVID_04/callCovid04Api?numOfRows=1000&returnType=json";
pub const OWID_VACCINATION_URL: &str =
    "https://raw.githubusercontent.com/owid/covid-19-data/master/public/data/vaccinations/country_data/South%20Korea.csv";
pub const OWID_DAILY_URL: &str = "https://covid.ourworldindata.org/data/owid-covid-data.csv";
pub const JHU_CONFIRMED_URL: &str =
    "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_time_series/time_series_covid19_confirmed_global.csv";
pub const JHU_DEATHS_URL: &str =
    "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_time_series/time_series_covid19_deaths_global.csv";
pub const WHO_DAILY_URL: &str = "https://covid19.who.int/WHO-COVID-19-global-data.csv";
pub const COMMUNITY_DAILY_URL: &str =
    "https://raw.githubusercontent.com/jooeungen/coronaboard_kr/master/kr_daily.csv";
pub const COMMUNITY_REGIONAL_URL: &str =
    "https://raw.githubusercontent.com/jooeungen/coronaboard_kr/master/kr_regional_vaccination.json";
pub const KDCA_DASHBOARD_URL: &str = "https://ncv.kdca.go.kr/eng/mainStatus.es?mid=a11702000000";
pub const NEWS_URLS: &[&str] = &[
    "https://en.yna.co.kr/covid19/index",
    "https://www.koreatimes.co.kr/www/nation/covid19.html",
];

// Country filters for multi-country payloads
pub const OWID_ISO_CODE: &str = "KOR";
pub const JHU_COUNTRY: &str = "Korea, South";
pub const WHO_COUNTRY: &str = "Republic of Korea";

// HTML table selection (all keywords must appear in the header row)
pub const DASHBOARD_TABLE_KEYWORDS: &[&str] = &["region", "dose"];
pub const NEWS_TABLE_KEYWORDS: &[&str] = &["confirmed"];

// Local cache
pub const STORE_DIR: &str = ".store";
pub const STORE_SEP: char = ',';
pub const DEBUG_LOG_FILE: &str = "debug.log";

// Output
pub const DEFAULT_OUT_DIR: &str = "out";
pub const SUMMARY_FILE: &str = "summary.json";
pub const PROCESSED_VACCINATION_FILE: &str = "processed_vaccination_data.csv";
pub const PROCESSED_DAILY_FILE: &str = "processed_daily_stats.csv";
pub const PROCESSED_REGIONAL_FILE: &str = "processed_regional_data.csv";

// Acquisition
pub const DEFAULT_CACHE_DAYS: u32 = 1;
pub const DEFAULT_RETRIES: u32 = 3;
pub const RETRY_DELAY_SECS: u64 = 5;

// Canonical formats
pub const DATE_FORMAT: &str = "%Y-%m-%d";

// Population (approximate)
pub const TOTAL_POPULATION: i64 = 51_000_000;

/// The 17 first-level divisions, in canonical order.
pub const REGIONS: [&str; 17] = [
    "Seoul", "Busan", "Daegu", "Incheon", "Gwangju", "Daejeon", "Ulsan",
    "Sejong", "Gyeonggi", "Gangwon", "Chungbuk", "Chungnam", "Jeonbuk",
    "Jeonnam", "Gyeongbuk", "Gyeongnam", "Jeju",
];

/// Approximate share of the national population per region.
pub const POPULATION_SHARE: [(&str, f64); 17] = [
    ("Seoul", 0.20), ("Busan", 0.07), ("Daegu", 0.05), ("Incheon", 0.06),
    ("Gwangju", 0.03), ("Daejeon", 0.03), ("Ulsan", 0.02), ("Sejong", 0.01),
    ("Gyeonggi", 0.25), ("Gangwon", 0.03), ("Chungbuk", 0.03), ("Chungnam", 0.04),
    ("Jeonbuk", 0.03), ("Jeonnam", 0.03), ("Gyeongbuk", 0.05), ("Gyeongnam", 0.06),
    ("Jeju", 0.01),
];

pub const VACCINE_TYPES: [&str; 5] = ["Pfizer", "Moderna", "AstraZeneca", "Janssen", "Novavax"];
