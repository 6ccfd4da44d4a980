pub mod artifacts;
pub mod driver;
#[cfg(test)]
pub mod fake;
pub mod navigator;
pub mod selectors;
pub mod webdriver;

pub use artifacts::ArtifactStore;
pub use driver::{BrowserLauncher, PageDriver, ProxyAddress};
pub use navigator::{PageNavigator, ScreenshotMode};
