use once_cell::sync::Lazy;
use regex::Regex;

const HTTPS_SCHEME: &str = "https://";
const HTTP_SCHEME: &str = "http://";

static VTUNER_HOST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9]+\.vtuner\.com$").expect("vtuner host pattern is valid")
});

/// Receivers may lack TLS support, so stream targets are always handed out as plain http.
pub fn downgrade_https(url: &str) -> String {
    let trimmed = url.trim();
    match trimmed.get(..HTTPS_SCHEME.len()) {
        Some(scheme) if scheme.eq_ignore_ascii_case(HTTPS_SCHEME) => {
            format!("{HTTP_SCHEME}{}", &trimmed[HTTPS_SCHEME.len()..])
        }
        _ => trimmed.to_string(),
    }
}

pub fn is_vtuner_host(host: &str) -> bool {
    VTUNER_HOST.is_match(host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn https_is_downgraded() {
        assert_eq!(
            downgrade_https("https://stream.example.com/live.mp3"),
            "http://stream.example.com/live.mp3"
        );
        assert_eq!(
            downgrade_https("HTTPS://stream.example.com/"),
            "http://stream.example.com/"
        );
    }

    #[test]
    fn other_urls_are_left_alone() {
        assert_eq!(
            downgrade_https("http://stream.example.com/live.mp3"),
            "http://stream.example.com/live.mp3"
        );
        assert_eq!(downgrade_https("icecast://x"), "icecast://x");
        assert_eq!(downgrade_https("ht"), "ht");
    }

    #[test]
    fn vtuner_hosts_are_recognized() {
        assert!(is_vtuner_host("radioyamaha.vtuner.com"));
        assert!(is_vtuner_host("denon.vtuner.com"));
        assert!(!is_vtuner_host("radioyamaha.vtuner.com:8080"));
        assert!(!is_vtuner_host("192.168.1.20"));
        assert!(!is_vtuner_host("a.b.vtuner.com"));
    }
}
