//! Local phishing URL detection
//!
//! Two layers, checked in order:
//!
//! 1. A denylist of known malicious short-link/IP-logger domains. An exact
//!    host match (after lowercasing and stripping a leading "www.") produces
//!    an automatic HIGH-severity verdict with confidence 1.0 and skips the
//!    scorer entirely.
//! 2. A deterministic point-accumulation scorer over independent checks,
//!    each contributing points and a reason when triggered.
//!
//! [`assess_url`] never fails: an unparsable URL yields `RiskLevel::Unknown`
//! with confidence 0.

use url::Url;

use crate::types::{ClassificationVerdict, RiskLevel, Severity, UrlRisk};

/// Domains that trigger an immediate flagged verdict.
const DENYLISTED_DOMAINS: &[&str] = &[
    "iplogger.com",
    "maper.info",
    "iplogger.ru",
    "iplogger.co",
    "iplogger.org",
    "2no.co",
    "yip.su",
    "iplogger.info",
    "iplis.ru",
    "ezstat.ru",
    "iplog.co",
    "iplogger.cn",
    "grabify.link",
    "gg.gg",
    "shorte.st",
    "shorturl.at",
    "adf.ly",
    "bc.vc",
    "ouo.io",
    "adfoc.us",
    "goo.gl",
];

/// Known legitimate domains; exact or subdomain suffix match short-circuits
/// the scorer with a SAFE result.
const TRUSTED_DOMAINS: &[&str] = &[
    "google.com",
    "youtube.com",
    "facebook.com",
    "twitter.com",
    "x.com",
    "instagram.com",
    "linkedin.com",
    "github.com",
    "stackoverflow.com",
    "wikipedia.org",
    "amazon.com",
    "apple.com",
    "microsoft.com",
    "telegram.org",
    "whatsapp.com",
    "reddit.com",
    "netflix.com",
];

/// TLDs disproportionately used by throwaway phishing domains.
const SUSPICIOUS_TLDS: &[&str] = &[
    ".tk", ".ml", ".ga", ".cf", ".gq", ".xyz", ".top", ".work", ".click", ".link", ".pw", ".cc",
    ".ws", ".info", ".biz",
];

/// Keywords that phishing URLs lean on anywhere in the full URL.
const SUSPICIOUS_KEYWORDS: &[&str] = &[
    "login",
    "signin",
    "verify",
    "account",
    "secure",
    "update",
    "confirm",
    "banking",
    "paypal",
    "wallet",
    "crypto",
    "bitcoin",
    "password",
    "suspended",
    "locked",
    "urgent",
    "action-required",
    "prize",
    "winner",
    "claim",
    "free",
    "gift",
    "reward",
];

/// Popular brands mapped to known lookalike spellings.
const TYPOSQUAT_PATTERNS: &[(&str, &[&str])] = &[
    ("google", &["g00gle", "gooogle", "googl3", "gogle"]),
    ("facebook", &["faceb00k", "facebok", "faceboook", "fecebook"]),
    ("paypal", &["paypai", "paypa1", "paypall", "paypa"]),
    ("amazon", &["amaz0n", "amazom", "arnazon", "amazan"]),
    ("apple", &["app1e", "appl3", "appie", "aple"]),
    ("microsoft", &["micros0ft", "microsft", "microsfot", "micorsoft"]),
    ("instagram", &["instgram", "instagran", "instagrarn", "instagramm"]),
    ("whatsapp", &["whatsap", "whatsaap", "whatapp", "whatsup"]),
];

/// URL shorteners that hide the real destination.
const URL_SHORTENERS: &[&str] = &[
    "bit.ly",
    "tinyurl.com",
    "goo.gl",
    "ow.ly",
    "t.co",
    "is.gd",
    "buff.ly",
    "adf.ly",
    "short.link",
];

/// Check a URL's host against the denylist.
///
/// Returns the matched host when the URL resolves to a denylisted domain.
pub fn denylist_match(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed
        .host_str()?
        .to_lowercase()
        .trim_start_matches("www.")
        .to_string();
    if DENYLISTED_DOMAINS.contains(&host.as_str()) {
        Some(host)
    } else {
        None
    }
}

/// Synthesize the flagged verdict for a denylisted URL.
pub fn denylist_verdict(url: &str, host: &str) -> ClassificationVerdict {
    ClassificationVerdict {
        is_flagged: true,
        confidence: 1.0,
        label: "PHISHING".to_string(),
        explanation: format!("Denylisted domain detected: {}", host),
        sources: vec![url.to_string()],
        severity: Severity::High,
        is_humor: false,
    }
}

/// Synthesize the flagged verdict for a scorer phishing hit.
pub fn risk_verdict(url: &str, risk: &UrlRisk) -> ClassificationVerdict {
    ClassificationVerdict {
        is_flagged: true,
        confidence: risk.confidence,
        label: "PHISHING".to_string(),
        explanation: format!("Suspicious URL detected: {}", risk.reasons.join("; ")),
        sources: vec![url.to_string()],
        severity: Severity::High,
        is_humor: false,
    }
}

/// Score a URL for phishing indicators.
///
/// Total and side-effect-free: any parse failure degrades to
/// `RiskLevel::Unknown` with confidence 0.
pub fn assess_url(url: &str) -> UrlRisk {
    let parsed = match Url::parse(url) {
        Ok(parsed) => parsed,
        Err(_) => return unknown_risk(),
    };
    let host = match parsed.host_str() {
        Some(host) => host.to_lowercase(),
        None => return unknown_risk(),
    };
    let full_url = url.to_lowercase();

    if is_trusted(&host) {
        return UrlRisk {
            is_phishing: false,
            risk_level: RiskLevel::Safe,
            confidence: 0.95,
            reasons: vec![format!("Trusted domain: {}", host)],
        };
    }

    let mut score: u32 = 0;
    let mut reasons = Vec::new();

    if let Some(tld) = suspicious_tld(&host) {
        reasons.push(format!("Suspicious domain extension ({})", tld));
        score += 30;
    }
    if is_ip_address(&host) {
        reasons.push("Uses IP address instead of domain name".to_string());
        score += 40;
    }
    if host.split('.').count() > 4 {
        reasons.push("Suspicious number of subdomains".to_string());
        score += 20;
    }
    if let Some(brand) = typosquat_target(&host) {
        reasons.push(format!("Possible typosquatting of: {}", brand));
        score += 50;
    }
    let keywords: Vec<&str> = SUSPICIOUS_KEYWORDS
        .iter()
        .filter(|keyword| full_url.contains(**keyword))
        .copied()
        .collect();
    if !keywords.is_empty() {
        reasons.push(format!(
            "Contains suspicious keywords: {}",
            keywords.join(", ")
        ));
        score += 15 * keywords.len() as u32;
    }
    if URL_SHORTENERS
        .iter()
        .any(|shortener| host.contains(shortener))
    {
        reasons.push("URL shortener (hides real destination)".to_string());
        score += 25;
    }
    // Non-ASCII hosts come back from the URL parser punycode-encoded.
    if host.chars().any(|c| !c.is_ascii()) || host.split('.').any(|label| label.starts_with("xn--"))
    {
        reasons.push("Contains lookalike characters (homograph attack)".to_string());
        score += 60;
    }
    let hyphens = host.chars().filter(|c| *c == '-').count();
    let digits = host.chars().filter(|c| c.is_ascii_digit()).count();
    if hyphens > 2 || digits > 3 {
        reasons.push("Unusual domain pattern (many hyphens/numbers)".to_string());
        score += 15;
    }
    if host.len() > 50 {
        reasons.push("Unusually long domain name".to_string());
        score += 10;
    }

    let risk_level = match score {
        70.. => RiskLevel::High,
        40..=69 => RiskLevel::Medium,
        20..=39 => RiskLevel::Low,
        _ => RiskLevel::Safe,
    };

    UrlRisk {
        is_phishing: score >= 40,
        risk_level,
        confidence: (score as f64 / 100.0).min(0.95),
        reasons,
    }
}

fn unknown_risk() -> UrlRisk {
    UrlRisk {
        is_phishing: false,
        risk_level: RiskLevel::Unknown,
        confidence: 0.0,
        reasons: vec!["Unable to analyze URL".to_string()],
    }
}

fn is_trusted(host: &str) -> bool {
    TRUSTED_DOMAINS
        .iter()
        .any(|trusted| host == *trusted || host.ends_with(&format!(".{}", trusted)))
}

fn suspicious_tld(host: &str) -> Option<&'static str> {
    SUSPICIOUS_TLDS
        .iter()
        .find(|tld| host.ends_with(**tld))
        .copied()
}

fn is_ip_address(host: &str) -> bool {
    let octets: Vec<&str> = host.split('.').collect();
    octets.len() == 4
        && octets
            .iter()
            .all(|octet| !octet.is_empty() && octet.len() <= 3 && octet.parse::<u16>().is_ok())
}

fn typosquat_target(host: &str) -> Option<&'static str> {
    for (brand, typos) in TYPOSQUAT_PATTERNS {
        if typos.iter().any(|typo| host.contains(typo)) {
            return Some(brand);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denylist_match_strips_www() {
        assert_eq!(
            denylist_match("http://www.iplogger.org/abc"),
            Some("iplogger.org".to_string())
        );
        assert_eq!(
            denylist_match("http://grabify.link/x"),
            Some("grabify.link".to_string())
        );
        assert_eq!(denylist_match("https://example.com/"), None);
        assert_eq!(denylist_match("not a url"), None);
    }

    #[test]
    fn test_denylist_verdict_shape() {
        let verdict = denylist_verdict("http://iplogger.org/abc", "iplogger.org");
        assert!(verdict.is_flagged);
        assert_eq!(verdict.severity, Severity::High);
        assert_eq!(verdict.confidence, 1.0);
        assert_eq!(verdict.label, "PHISHING");
        assert!(verdict.needs_marker());
    }

    #[test]
    fn test_trusted_domain_short_circuits() {
        let risk = assess_url("https://accounts.google.com/login?verify=1");
        assert_eq!(risk.risk_level, RiskLevel::Safe);
        assert!(!risk.is_phishing);
        assert_eq!(risk.confidence, 0.95);
        assert_eq!(risk.reasons.len(), 1);
    }

    #[test]
    fn test_unparsable_url_degrades_to_unknown() {
        let risk = assess_url("http://");
        assert_eq!(risk.risk_level, RiskLevel::Unknown);
        assert!(!risk.is_phishing);
        assert_eq!(risk.confidence, 0.0);
    }

    #[test]
    fn test_ip_host_scores() {
        // IP host (+40) puts the URL at MEDIUM and over the phishing bar.
        let risk = assess_url("http://192.168.13.37/path");
        assert!(risk.is_phishing);
        assert_eq!(risk.risk_level, RiskLevel::Medium);
        assert!(risk
            .reasons
            .iter()
            .any(|reason| reason.contains("IP address")));
    }

    #[test]
    fn test_keyword_accumulation() {
        // "login", "verify", "account" and "secure" in one URL: 4 * 15 = 60.
        let risk = assess_url("http://example.net/login/verify?account=1&secure=yes");
        assert!(risk.is_phishing);
        assert_eq!(risk.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn test_typosquatting_plus_tld_is_high() {
        // typosquat (+50) and suspicious TLD (+30).
        let risk = assess_url("http://paypa1-support.xyz/");
        assert!(risk.is_phishing);
        assert_eq!(risk.risk_level, RiskLevel::High);
        assert!(risk
            .reasons
            .iter()
            .any(|reason| reason.contains("typosquatting of: paypal")));
    }

    #[test]
    fn test_homograph_host() {
        let risk = assess_url("http://аpple-id.com/");
        assert!(risk
            .reasons
            .iter()
            .any(|reason| reason.contains("homograph")));
    }

    #[test]
    fn test_confidence_is_capped() {
        let risk = assess_url("http://paypa1-login-verify-secure.xyz/claim?prize=free");
        assert!(risk.confidence <= 0.95);
        assert_eq!(risk.risk_level, RiskLevel::High);
    }
}
