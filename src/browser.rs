use anyhow::Result;
use headless_chrome::{Browser, LaunchOptions, Tab};
use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::scroll::FeedDriver;

/// Budget for the results feed to appear after navigation.
pub const FEED_TIMEOUT: Duration = Duration::from_secs(30);

pub const FEED_SELECTOR: &str = "div[role='feed']";

static USER_AGENTS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:124.0) Gecko/20100101 Firefox/124.0",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    ]
});

// Runs before any page script; keeps the headless session from advertising itself.
const STEALTH_SCRIPT: &str = r#"
    Object.defineProperty(navigator, 'webdriver', {
        get: () => undefined,
    });
    Object.defineProperty(navigator, 'hardwareConcurrency', {
        get: () => 4,
    });
    Object.defineProperty(navigator, 'languages', {
        get: () => ['en-US', 'en'],
    });
    window.chrome = {
        runtime: {},
        loadTimes: function() {},
        csi: function() {},
        app: {}
    };
"#;

/// Launch a headless Chrome with a rotated User-Agent. Proxy routing is
/// opaque to the scraper: CHROME_PROXY, when set, is passed straight through.
pub fn launch() -> Result<Browser> {
    let user_agent = USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0]);
    debug!("Using User-Agent: {}", user_agent);

    let mut args = vec![
        OsStr::new("--disable-blink-features=AutomationControlled"),
        OsStr::new("--no-sandbox"),
        OsStr::new("--disable-dev-shm-usage"),
        OsStr::new("--disable-infobars"),
        OsStr::new("--window-position=0,0"),
        OsStr::new("--ignore-certificate-errors"),
    ];

    let ua_arg = format!("--user-agent={}", user_agent);
    args.push(OsStr::new(&ua_arg));

    let proxy_arg = std::env::var("CHROME_PROXY")
        .ok()
        .map(|proxy| format!("--proxy-server={}", proxy));
    if let Some(ref proxy) = proxy_arg {
        args.push(OsStr::new(proxy));
    }

    let browser = Browser::new(LaunchOptions {
        headless: true,
        window_size: Some((1920, 1080)),
        args,
        ..Default::default()
    })?;

    Ok(browser)
}

/// Open a fresh tab with the stealth script installed ahead of page scripts.
pub fn open_tab(browser: &Browser) -> Result<Arc<Tab>> {
    let tab = browser.new_tab()?;

    tab.enable_debugger()?;
    tab.call_method(headless_chrome::protocol::cdp::Page::AddScriptToEvaluateOnNewDocument {
        source: STEALTH_SCRIPT.to_string(),
        world_name: None,
        include_command_line_api: None,
        run_immediately: None,
    })?;

    Ok(tab)
}

/// `FeedDriver` backed by a live tab. Every call is one evaluate round-trip
/// exchanging plain JSON values with the page.
pub struct TabFeed<'a> {
    tab: &'a Tab,
}

impl<'a> TabFeed<'a> {
    pub fn new(tab: &'a Tab) -> Self {
        Self { tab }
    }

    fn eval_number(&self, expression: &str) -> Result<f64> {
        let result = self.tab.evaluate(expression, false)?;
        Ok(result.value.and_then(|v| v.as_f64()).unwrap_or(0.0))
    }
}

impl FeedDriver for TabFeed<'_> {
    fn feed_present(&self) -> Result<bool> {
        let result = self
            .tab
            .evaluate("document.querySelector('div[role=\"feed\"]') !== null", false)?;
        Ok(result.value.and_then(|v| v.as_bool()).unwrap_or(false))
    }

    fn item_count(&self) -> Result<usize> {
        let count = self.eval_number(
            "document.querySelectorAll('div[role=\"feed\"] > div > div[jsaction]').length",
        )?;
        Ok(count as usize)
    }

    fn scroll_extent(&self) -> Result<i64> {
        let extent = self.eval_number(
            "(() => { const feed = document.querySelector('div[role=\"feed\"]'); return feed ? feed.scrollHeight : 0; })()",
        )?;
        Ok(extent as i64)
    }

    fn scroll_to_end(&self) -> Result<()> {
        self.tab.evaluate(
            "(() => { const feed = document.querySelector('div[role=\"feed\"]'); if (feed) feed.scrollTo(0, feed.scrollHeight); })()",
            false,
        )?;
        Ok(())
    }
}
