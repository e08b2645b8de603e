//! Regex based user-agent classification.
//!
//! The classifier never fails: anything it can't make sense of is reported as
//! `Unknown`/`Other`. Only major browser versions are kept, so reports don't
//! explode into one row per patch release.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref BOT_REGEX: Regex =
        Regex::new(r"(?i)bot|crawl|spider|slurp|headless|lighthouse|preview").unwrap();
    static ref TABLET_REGEX: Regex = Regex::new(r"(?i)ipad|tablet|kindle|silk/").unwrap();
    static ref MOBILE_REGEX: Regex = Regex::new(r"Mobi|iPhone|iPod|Windows Phone").unwrap();
    static ref EDGE_REGEX: Regex = Regex::new(r"Edg(?:e|A|iOS)?/(\d+)").unwrap();
    static ref OPERA_REGEX: Regex = Regex::new(r"(?:OPR|Opera)/(\d+)").unwrap();
    static ref SAMSUNG_REGEX: Regex = Regex::new(r"SamsungBrowser/(\d+)").unwrap();
    static ref FIREFOX_REGEX: Regex = Regex::new(r"(?:Firefox|FxiOS)/(\d+)").unwrap();
    static ref CHROME_REGEX: Regex = Regex::new(r"(?:Chrome|CriOS)/(\d+)").unwrap();
    static ref SAFARI_REGEX: Regex = Regex::new(r"Version/(\d+)[\d.]*.*Safari/").unwrap();
    static ref WINDOWS_REGEX: Regex = Regex::new(r"Windows NT (\d+\.\d+)").unwrap();
    static ref IOS_REGEX: Regex = Regex::new(r"(iPhone|iPad|iPod).*? OS (\d+)(?:_(\d+))?").unwrap();
    static ref ANDROID_REGEX: Regex = Regex::new(r"Android (\d+(?:\.\d+)?)").unwrap();
    static ref MACOS_REGEX: Regex = Regex::new(r"Mac OS X (\d+)[_.](\d+)").unwrap();
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    Desktop,
    Mobile,
    Tablet,
    Bot,
    Unknown,
}

impl DeviceType {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceType::Desktop => "desktop",
            DeviceType::Mobile => "mobile",
            DeviceType::Tablet => "tablet",
            DeviceType::Bot => "bot",
            DeviceType::Unknown => "unknown",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UserAgentInfo {
    pub device_type: DeviceType,
    pub browser: String,
    pub browser_version: Option<String>,
    pub os: String,
    pub os_version: Option<String>,
    pub is_bot: bool,
}

impl UserAgentInfo {
    fn unknown() -> Self {
        UserAgentInfo {
            device_type: DeviceType::Unknown,
            browser: "Unknown".to_string(),
            browser_version: None,
            os: "Unknown".to_string(),
            os_version: None,
            is_bot: false,
        }
    }
}

pub fn parse_user_agent(user_agent: &str) -> UserAgentInfo {
    let ua = user_agent.trim();
    if ua.is_empty() {
        return UserAgentInfo::unknown();
    }

    let is_bot = BOT_REGEX.is_match(ua);
    let (browser, browser_version) = detect_browser(ua);
    let (os, os_version) = detect_os(ua);

    UserAgentInfo {
        device_type: detect_device(ua, is_bot),
        browser: browser.to_string(),
        browser_version,
        os: os.to_string(),
        os_version,
        is_bot,
    }
}

fn detect_device(ua: &str, is_bot: bool) -> DeviceType {
    let android = ua.contains("Android");
    if is_bot {
        DeviceType::Bot
    } else if TABLET_REGEX.is_match(ua) || (android && !ua.contains("Mobile")) {
        DeviceType::Tablet
    } else if MOBILE_REGEX.is_match(ua) || android {
        DeviceType::Mobile
    } else {
        DeviceType::Desktop
    }
}

fn capture(regex: &Regex, ua: &str) -> Option<String> {
    regex
        .captures(ua)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn detect_browser(ua: &str) -> (&'static str, Option<String>) {
    // Most browsers also claim to be Chrome and Safari, order matters.
    let candidates: [(&'static str, &Regex); 6] = [
        ("Edge", &*EDGE_REGEX),
        ("Opera", &*OPERA_REGEX),
        ("Samsung Internet", &*SAMSUNG_REGEX),
        ("Firefox", &*FIREFOX_REGEX),
        ("Chrome", &*CHROME_REGEX),
        ("Safari", &*SAFARI_REGEX),
    ];
    for (name, regex) in candidates {
        if let Some(version) = capture(regex, ua) {
            return (name, Some(version));
        }
    }
    ("Other", None)
}

fn windows_version(nt: &str) -> String {
    match nt {
        "10.0" => "10",
        "6.3" => "8.1",
        "6.2" => "8",
        "6.1" => "7",
        "6.0" => "Vista",
        "5.1" | "5.2" => "XP",
        other => other,
    }
    .to_string()
}

fn detect_os(ua: &str) -> (&'static str, Option<String>) {
    if let Some(nt) = capture(&WINDOWS_REGEX, ua) {
        return ("Windows", Some(windows_version(&nt)));
    }
    if let Some(c) = IOS_REGEX.captures(ua) {
        let name = if &c[1] == "iPad" { "iPadOS" } else { "iOS" };
        let version = match c.get(3) {
            Some(minor) => format!("{}.{}", &c[2], minor.as_str()),
            None => c[2].to_string(),
        };
        return (name, Some(version));
    }
    if ua.contains("CrOS") {
        return ("ChromeOS", None);
    }
    if ua.contains("Android") {
        return ("Android", capture(&ANDROID_REGEX, ua));
    }
    if let Some(c) = MACOS_REGEX.captures(ua) {
        return ("macOS", Some(format!("{}.{}", &c[1], &c[2])));
    }
    if ua.contains("Macintosh") {
        return ("macOS", None);
    }
    if ua.contains("Linux") || ua.contains("X11") {
        return ("Linux", None);
    }
    ("Unknown", None)
}
