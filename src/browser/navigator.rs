//! Typed page operations on top of a [`PageDriver`], plus checkpoint capture.

use crate::browser::artifacts::ArtifactStore;
use crate::browser::driver::{PageDriver, ScriptArg};
use crate::core::error::{AppError, Result};
use fantoccini::Locator;
use image::ImageFormat;
use std::io::Cursor;
use std::time::Duration;
use tokio::time::sleep;

const SCROLL_AND_MEASURE_SCRIPT: &str = "arguments[0].scrollIntoView(true); \
     const r = arguments[0].getBoundingClientRect(); \
     return [r.left, r.top, r.width, r.height, window.innerWidth, window.innerHeight];";

/// How element screenshots are produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScreenshotMode {
    /// Ask the browser for the element image directly.
    Native,
    /// Crop a viewport screenshot taken at the given device scale factor.
    /// Chrome renders element screenshots at 1x regardless of the scale factor,
    /// so the crop is the only way to get full-resolution calendar images.
    CropScaled(f64),
}

/// Element position in CSS pixels, relative to the viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

pub struct PageNavigator<'a, D: PageDriver> {
    driver: &'a D,
    artifacts: &'a ArtifactStore,
    mode: ScreenshotMode,
    settle_delay: Duration,
}

impl<'a, D: PageDriver> PageNavigator<'a, D> {
    pub fn new(driver: &'a D, artifacts: &'a ArtifactStore, mode: ScreenshotMode) -> Self {
        Self {
            driver,
            artifacts,
            mode,
            settle_delay: Duration::from_millis(300),
        }
    }

    /// Pause applied after clicks and typing so the page can react.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn driver(&self) -> &'a D {
        self.driver
    }

    pub async fn goto(&self, url: &str) -> Result<()> {
        tracing::debug!(target: "navigator", "Navigating to: {}", url);
        self.driver.goto(url).await.map_err(|e| {
            tracing::error!(target: "navigator", "Failed to navigate to {}: {}", url, e);
            e
        })
    }

    /// Looks an element up. A missing element is `Ok(None)`.
    pub async fn find(&self, locator: Locator<'_>) -> Result<Option<D::Element>> {
        absent_as_none(self.driver.find(locator).await)
    }

    /// Looks up an element whose presence is a precondition for the next step.
    pub async fn find_required(&self, locator: Locator<'_>, what: &str) -> Result<D::Element> {
        self.find(locator)
            .await?
            .ok_or_else(|| AppError::ElementNotFound(format!("{} ({:?})", what, locator)))
    }

    pub async fn find_all(&self, locator: Locator<'_>) -> Result<Vec<D::Element>> {
        match self.driver.find_all(locator).await {
            Err(AppError::ElementNotFound(_)) => Ok(Vec::new()),
            other => other,
        }
    }

    pub async fn find_in(
        &self,
        parent: &D::Element,
        locator: Locator<'_>,
    ) -> Result<Option<D::Element>> {
        absent_as_none(self.driver.find_in(parent, locator).await)
    }

    pub async fn find_all_in(
        &self,
        parent: &D::Element,
        locator: Locator<'_>,
    ) -> Result<Vec<D::Element>> {
        match self.driver.find_all_in(parent, locator).await {
            Err(AppError::ElementNotFound(_)) => Ok(Vec::new()),
            other => other,
        }
    }

    pub async fn text(&self, element: &D::Element) -> Result<String> {
        self.driver.text(element).await
    }

    /// Text of the element at `locator`, or `None` if the page does not have it.
    pub async fn read_text_safe(&self, locator: Locator<'_>) -> Result<Option<String>> {
        match self.find(locator).await? {
            Some(element) => absent_as_none(self.driver.text(&element).await),
            None => Ok(None),
        }
    }

    pub async fn click(&self, element: &D::Element) -> Result<()> {
        self.driver.click(element).await?;
        self.settle().await;
        Ok(())
    }

    pub async fn click_required(&self, locator: Locator<'_>, what: &str) -> Result<()> {
        let element = self.find_required(locator, what).await?;
        tracing::debug!(target: "navigator", "Clicking {}", what);
        self.click(&element).await
    }

    pub async fn select_by_visible_text(
        &self,
        locator: Locator<'_>,
        text: &str,
        what: &str,
    ) -> Result<()> {
        let select = self.find_required(locator, what).await?;
        tracing::debug!(target: "navigator", "Selecting '{}' in {}", text, what);
        self.driver.select_by_label(&select, text).await
    }

    pub async fn type_text(&self, locator: Locator<'_>, text: &str, what: &str) -> Result<()> {
        let input = self.find_required(locator, what).await?;
        tracing::debug!(target: "navigator", "Typing into {}", what);
        self.driver.send_keys(&input, text).await?;
        self.settle().await;
        Ok(())
    }

    pub async fn page_screenshot(&self) -> Result<Vec<u8>> {
        self.driver.screenshot().await
    }

    pub async fn element_screenshot(&self, element: &D::Element) -> Result<Vec<u8>> {
        match self.mode {
            ScreenshotMode::Native => self.driver.element_screenshot(element).await,
            ScreenshotMode::CropScaled(scale) => {
                let measured = self
                    .driver
                    .execute(
                        SCROLL_AND_MEASURE_SCRIPT,
                        vec![ScriptArg::Element(element.clone())],
                    )
                    .await?;
                let (rect, viewport) = parse_measurement(&measured)?;
                let png = self.driver.screenshot().await?;
                crop_png(&png, rect, viewport, scale)
            }
        }
    }

    /// Saves the page source and, optionally, a screenshot under `name`.
    /// Failures are logged and never interrupt the run.
    pub async fn checkpoint_with(&self, name: &str, screenshot: bool) {
        match self.driver.source().await {
            Ok(source) => {
                if let Err(e) = self.artifacts.save_page(name, &source) {
                    tracing::warn!(
                        target: "navigator",
                        "Failed to save page source for '{}': {}",
                        name,
                        e
                    );
                }
            }
            Err(e) => {
                tracing::warn!(
                    target: "navigator",
                    "Failed to read page source for '{}': {}",
                    name,
                    e
                );
            }
        }

        if screenshot {
            match self.driver.screenshot().await {
                Ok(png) => {
                    if let Err(e) = self.artifacts.save_screenshot(name, &png) {
                        tracing::warn!(
                            target: "navigator",
                            "Failed to save screenshot for '{}': {}",
                            name,
                            e
                        );
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        target: "navigator",
                        "Failed to take screenshot for '{}': {}",
                        name,
                        e
                    );
                }
            }
        }
    }

    pub async fn checkpoint(&self, name: &str) {
        self.checkpoint_with(name, true).await
    }

    async fn settle(&self) {
        if !self.settle_delay.is_zero() {
            sleep(self.settle_delay).await;
        }
    }
}

fn absent_as_none<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(AppError::ElementNotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

fn parse_measurement(value: &serde_json::Value) -> Result<(ViewportRect, (f64, f64))> {
    let numbers: Vec<f64> = value
        .as_array()
        .map(|items| items.iter().filter_map(|v| v.as_f64()).collect())
        .unwrap_or_default();
    match numbers.as_slice() {
        [x, y, width, height, view_w, view_h] => Ok((
            ViewportRect {
                x: *x,
                y: *y,
                width: *width,
                height: *height,
            },
            (*view_w, *view_h),
        )),
        _ => Err(AppError::PageLayout(format!(
            "Unexpected element measurement: {}",
            value
        ))),
    }
}

/// Crops `png` to `rect`, with CSS pixel coordinates multiplied by `scale`.
/// The element size is clamped to the viewport first, then the crop to the image.
/// An element lying outside the image yields the whole screenshot.
pub fn crop_png(
    png: &[u8],
    rect: ViewportRect,
    viewport: (f64, f64),
    scale: f64,
) -> Result<Vec<u8>> {
    let image = image::load_from_memory(png)?;

    let width = rect.width.min(viewport.0);
    let height = rect.height.min(viewport.1);

    let x = (rect.x.max(0.0) * scale).round() as u32;
    let y = (rect.y.max(0.0) * scale).round() as u32;
    let x = x.min(image.width());
    let y = y.min(image.height());
    let w = ((width * scale).round() as u32).min(image.width() - x);
    let h = ((height * scale).round() as u32).min(image.height() - y);
    if w == 0 || h == 0 {
        tracing::warn!(
            target: "navigator",
            "Element at ({}, {}) has nothing to crop, keeping the full screenshot",
            rect.x,
            rect.y
        );
        return Ok(png.to_vec());
    }

    let cropped = image.crop_imm(x, y, w, h);
    let mut out = Cursor::new(Vec::new());
    cropped.write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};

    fn solid_png(width: u32, height: u32) -> Vec<u8> {
        let img: ImageBuffer<Rgba<u8>, Vec<u8>> =
            ImageBuffer::from_pixel(width, height, Rgba([10, 20, 30, 255]));
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    fn dimensions(png: &[u8]) -> (u32, u32) {
        let img = image::load_from_memory(png).unwrap();
        (img.width(), img.height())
    }

    #[test]
    fn test_crop_scales_coordinates() {
        // an 800x600 viewport rendered at 2x
        let png = solid_png(1600, 1200);
        let rect = ViewportRect {
            x: 100.0,
            y: 50.0,
            width: 300.0,
            height: 200.0,
        };
        let cropped = crop_png(&png, rect, (800.0, 600.0), 2.0).unwrap();
        assert_eq!(dimensions(&cropped), (600, 400));
    }

    #[test]
    fn test_crop_clamps_to_viewport_and_image() {
        let png = solid_png(800, 600);
        let rect = ViewportRect {
            x: 700.0,
            y: 0.0,
            width: 2000.0,
            height: 2000.0,
        };
        let cropped = crop_png(&png, rect, (800.0, 600.0), 1.0).unwrap();
        assert_eq!(dimensions(&cropped), (100, 600));
    }

    #[test]
    fn test_crop_outside_image_keeps_full_screenshot() {
        let png = solid_png(800, 600);
        let at_edge = ViewportRect {
            x: 800.0,
            y: 10.0,
            width: 300.0,
            height: 200.0,
        };
        let cropped = crop_png(&png, at_edge, (800.0, 600.0), 1.0).unwrap();
        assert_eq!(dimensions(&cropped), (800, 600));

        let collapsed = ViewportRect {
            x: 10.0,
            y: 10.0,
            width: 0.0,
            height: 50.0,
        };
        let cropped = crop_png(&png, collapsed, (800.0, 600.0), 1.0).unwrap();
        assert_eq!(dimensions(&cropped), (800, 600));
    }

    #[test]
    fn test_parse_measurement_rejects_garbage() {
        assert!(parse_measurement(&serde_json::json!({"x": 1})).is_err());
        let (rect, viewport) =
            parse_measurement(&serde_json::json!([1, 2.5, 3, 4, 800, 600])).unwrap();
        assert_eq!(rect.y, 2.5);
        assert_eq!(viewport, (800.0, 600.0));
    }
}
