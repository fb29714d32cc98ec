use crate::browser::chrome::ChromePage;
use crate::browser::config::{ConnectionOptions, LaunchOptions};
use crate::error::{DomesticatedError, Result};
use headless_chrome::{Browser, Tab};
use std::{ffi::OsStr, sync::Arc, time::Duration};

/// Browser session that manages a Chrome/Chromium instance
pub struct BrowserSession {
    /// The underlying headless_chrome Browser instance
    browser: Browser,
}

impl BrowserSession {
    /// Launch a new browser instance with the given options
    pub fn launch(options: LaunchOptions) -> Result<Self> {
        let mut launch_opts = headless_chrome::LaunchOptions::default();

        launch_opts.ignore_default_args.push(OsStr::new("--enable-automation"));
        launch_opts.args.push(OsStr::new("--disable-blink-features=AutomationControlled"));

        // Keep the browser alive while a page waits on a slow completion request
        launch_opts.idle_browser_timeout = Duration::from_secs(60 * 60);

        launch_opts.headless = options.headless;
        launch_opts.window_size = Some((options.window_width, options.window_height));

        if let Some(path) = options.chrome_path {
            launch_opts.path = Some(path);
        }

        if let Some(dir) = options.user_data_dir {
            launch_opts.user_data_dir = Some(dir);
        }

        launch_opts.sandbox = options.sandbox;

        let browser = Browser::new(launch_opts).map_err(|e| DomesticatedError::LaunchFailed(e.to_string()))?;

        browser
            .new_tab()
            .map_err(|e| DomesticatedError::LaunchFailed(format!("Failed to create tab: {}", e)))?;

        log::info!("Browser launched (headless: {})", options.headless);
        Ok(Self { browser })
    }

    /// Connect to an existing browser instance via WebSocket
    pub fn connect(options: ConnectionOptions) -> Result<Self> {
        let browser =
            Browser::connect_with_timeout(options.ws_url.clone(), Duration::from_millis(options.timeout))
                .map_err(|e| DomesticatedError::ConnectionFailed(e.to_string()))?;

        log::info!("Connected to browser at {}", options.ws_url);
        Ok(Self { browser })
    }

    /// Launch a browser with default options
    pub fn new() -> Result<Self> {
        Self::launch(LaunchOptions::default())
    }

    /// Get all tabs
    pub fn get_tabs(&self) -> Result<Vec<Arc<Tab>>> {
        let tabs = self
            .browser
            .get_tabs()
            .lock()
            .map_err(|e| DomesticatedError::ConnectionFailed(format!("Failed to get tabs: {}", e)))?
            .clone();

        Ok(tabs)
    }

    /// The first open tab, or a fresh one when none is left
    pub fn tab(&self) -> Result<Arc<Tab>> {
        if let Some(tab) = self.get_tabs()?.into_iter().next() {
            return Ok(tab);
        }
        self.browser
            .new_tab()
            .map_err(|e| DomesticatedError::ConnectionFailed(format!("Failed to create tab: {}", e)))
    }

    /// The current tab as a [`ChromePage`]
    pub fn page(&self) -> Result<ChromePage> {
        ChromePage::attach(self.tab()?)
    }

    /// Navigate the current tab to `url` and return it as a page
    pub fn open(&self, url: &str) -> Result<ChromePage> {
        let page = self.page()?;
        page.navigate(url)?;
        Ok(page)
    }

    /// Get the underlying Browser instance
    pub fn browser(&self) -> &Browser {
        &self.browser
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{Page, locate};

    // Integration tests (require Chrome to be installed)
    #[test]
    #[ignore] // Ignore by default, run with: cargo test -- --ignored
    fn test_launch_browser() {
        let result = BrowserSession::launch(LaunchOptions::new().headless(true));
        assert!(result.is_ok());
    }

    #[test]
    #[ignore]
    fn test_open_blank_page() {
        let session = BrowserSession::launch(LaunchOptions::new().headless(true)).expect("Failed to launch browser");

        let page = session.open("about:blank").expect("Failed to open page");
        let body = locate(&page, "body", None).unwrap();
        assert!(body.is_some());
        assert!(page.viewport().unwrap().width > 0.0);
    }
}
