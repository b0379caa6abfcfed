use super::session::SessionOptions;

/// Construct Chrome command‑line arguments for a session.
pub fn build_chrome_arguments(options: &SessionOptions) -> Vec<String> {
    let mut args = vec![
        "--disable-blink-features=AutomationControlled".to_string(),
        "--disable-infobars".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--no-sandbox".to_string(),
        "--disable-extensions".to_string(),
        "--disable-plugins-discovery".to_string(),
        "--mute-audio".to_string(),
        format!("--user-agent={}", options.user_agent),
        format!(
            "--window-size={},{}",
            options.window_size.0, options.window_size.1
        ),
        "--lang=en-US,en".to_string(),
    ];
    if options.headless {
        args.push("--headless=new".to_string());
        args.push("--disable-gpu".to_string());
    }
    args
}

/// JavaScript evasions applied after navigation to reduce automation signals.
pub struct StealthScripts;

impl StealthScripts {
    pub fn core_evasions() -> &'static str {
        r#"
            Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
            Object.defineProperty(navigator, 'languages', {
                get: () => ['en-US', 'en']
            });
            if (!window.chrome) window.chrome = { runtime: {} };
        "#
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arguments_carry_user_agent_and_headless_flags() {
        let options = SessionOptions {
            user_agent: "UA/1.0".into(),
            headless: true,
            ..SessionOptions::default()
        };
        let args = build_chrome_arguments(&options);
        assert!(args.contains(&"--user-agent=UA/1.0".to_string()));
        assert!(args.contains(&"--headless=new".to_string()));
        assert!(args.contains(&"--window-size=1440,900".to_string()));
    }

    #[test]
    fn headed_sessions_skip_headless_flags() {
        let options = SessionOptions {
            headless: false,
            ..SessionOptions::default()
        };
        let args = build_chrome_arguments(&options);
        assert!(!args.iter().any(|a| a.starts_with("--headless")));
    }
}
