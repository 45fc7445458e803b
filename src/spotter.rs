use anyhow::{anyhow, Result};
use image::RgbaImage;
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::camera::{CameraError, CameraManaging, FlashMode};
use crate::color::{NamedColor, SampledColor};
use crate::color_list::{AddOutcome, ColorList};
use crate::image_ops::crop_center;
use crate::lookup::ColorNamer;
use crate::sampler::{ColorSampler, SamplePoint};
use crate::store::KeyValueStore;

/// A notice the front end should show the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Alert {
    /// Camera access was refused; the user has to change it in system settings.
    PermissionDenied,
    /// Session configuration or capture failed.
    CameraFailure(String),
    AlreadyInList,
}

impl Alert {
    pub fn title(&self) -> &'static str {
        match self {
            Alert::PermissionDenied => "Warning",
            Alert::CameraFailure(_) => "Camera Error",
            Alert::AlreadyInList => "Warning",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Alert::PermissionDenied => "Application doesn't have all permissions to use the camera, please change privacy settings.".to_string(),
            Alert::CameraFailure(detail) => format!(
                "Camera configuration failed. Either your device camera is not available or it is missing permissions ({})",
                detail
            ),
            Alert::AlreadyInList => "Item already in list".to_string(),
        }
    }

    fn from_camera_error(error: &CameraError) -> Self {
        match error {
            CameraError::PermissionDenied => Alert::PermissionDenied,
            other => Alert::CameraFailure(other.to_string()),
        }
    }
}

/// The "current result" fields of one spotting session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpotState {
    pub sampled_color: Option<SampledColor>,
    /// `#RRGGBB` of `sampled_color`.
    pub hex: Option<String>,
    pub color_name: Option<String>,
    /// Last successful lookup, the one that can be saved.
    pub last_named: Option<NamedColor>,
    pub is_loading: bool,
    pub flash_on: bool,
    pub alert: Option<Alert>,
}

/// Capture → sample → name pipeline over a camera and a naming service.
///
/// Calls may overlap; nothing is cancelled and whichever task finishes last
/// writes the result fields.
pub struct Spotter<C: CameraManaging, N: ColorNamer> {
    camera: Arc<RwLock<C>>,
    namer: Arc<N>,
    sampler: ColorSampler,
    crop_side: Option<u32>,
    state: Arc<RwLock<SpotState>>,
}

impl<C: CameraManaging, N: ColorNamer> Clone for Spotter<C, N> {
    fn clone(&self) -> Self {
        Self {
            camera: Arc::clone(&self.camera),
            namer: Arc::clone(&self.namer),
            sampler: self.sampler.clone(),
            crop_side: self.crop_side,
            state: Arc::clone(&self.state),
        }
    }
}

impl<C: CameraManaging, N: ColorNamer> Spotter<C, N> {
    pub fn new(camera: C, namer: N, sampler: ColorSampler) -> Self {
        Self {
            camera: Arc::new(RwLock::new(camera)),
            namer: Arc::new(namer),
            sampler,
            crop_side: None,
            state: Arc::new(RwLock::new(SpotState::default())),
        }
    }

    /// Crop every still to a centered square of at most `side` pixels before
    /// sampling.
    pub fn with_crop(mut self, side: Option<u32>) -> Self {
        self.crop_side = side;
        self
    }

    pub fn camera(&self) -> Arc<RwLock<C>> {
        Arc::clone(&self.camera)
    }

    pub async fn state(&self) -> SpotState {
        self.state.read().await.clone()
    }

    pub async fn dismiss_alert(&self) {
        self.state.write().await.alert = None;
    }

    /// Configures and starts the camera session.
    pub async fn start_session(&self) -> Result<()> {
        let mut camera = self.camera.write().await;
        let result = match camera.configure().await {
            Ok(()) => camera.start(),
            Err(e) => Err(e),
        };
        drop(camera);

        if let Err(e) = result {
            warn!("Camera session could not start: {}", e);
            self.state.write().await.alert = Some(Alert::from_camera_error(&e));
            return Err(e.into());
        }
        Ok(())
    }

    pub async fn stop_session(&self) {
        self.camera.write().await.stop();
    }

    pub async fn switch_camera(&self) -> Result<()> {
        let result = self.camera.write().await.switch_camera().await;
        if let Err(e) = result {
            self.state.write().await.alert = Some(Alert::from_camera_error(&e));
            return Err(e.into());
        }
        Ok(())
    }

    /// Flips the torch and returns the new setting.
    pub async fn toggle_flash(&self) -> bool {
        let flash_on = {
            let mut state = self.state.write().await;
            state.flash_on = !state.flash_on;
            state.flash_on
        };
        let mut camera = self.camera.write().await;
        camera.toggle_torch(flash_on);
        if flash_on && camera.flash_mode() != FlashMode::On {
            debug!("Torch request ignored by camera");
        }
        flash_on
    }

    /// Takes a still, reduces it to one color and looks its name up.
    pub async fn capture(&self) -> Result<SpotState> {
        self.state.write().await.is_loading = true;

        let captured = self.camera.write().await.capture().await;
        let image = match captured {
            Ok(image) => image,
            Err(e) => {
                warn!("Capture failed: {}", e);
                let mut state = self.state.write().await;
                state.is_loading = false;
                state.alert = Some(Alert::from_camera_error(&e));
                return Err(anyhow!(e));
            }
        };

        self.identify_image(image).await
    }

    /// Same as [`Spotter::capture`] for a still obtained elsewhere.
    pub async fn identify_image(&self, image: RgbaImage) -> Result<SpotState> {
        let image = match self.crop_side {
            Some(side) => crop_center(&image, side),
            None => image,
        };
        let point = SamplePoint::center_of(&image);

        let scanned = self.sampler.sample_in_background(image, point).await;
        self.record_sample(scanned).await?;

        self.identify().await;
        Ok(self.state().await)
    }

    /// Stores a finished scan as the current color. A failed scan clears
    /// the loading flag and leaves the result fields alone.
    async fn record_sample(&self, scanned: Result<Option<SampledColor>>) -> Result<()> {
        let mut state = self.state.write().await;
        let color = match scanned {
            Ok(color) => color,
            Err(e) => {
                warn!("Pixel scan failed: {:#}", e);
                state.is_loading = false;
                return Err(e);
            }
        };

        state.sampled_color = color;
        state.hex = color.map(|c| c.to_hex());
        match color {
            Some(color) => info!("Sampled {} with {}", color, self.sampler.strategy()),
            None => info!("Image had no pixels to sample"),
        }
        Ok(())
    }

    /// Sets the current color directly, as if it had just been sampled.
    pub async fn set_hex(&self, hex: &str) -> Result<()> {
        let color = SampledColor::from_hex(hex)
            .ok_or_else(|| anyhow!("Not a 6-digit hex color: {:?}", hex))?;
        let mut state = self.state.write().await;
        state.sampled_color = Some(color);
        state.hex = Some(color.to_hex());
        Ok(())
    }

    /// Looks up the name for the current hex. A failed lookup leaves the
    /// previous name in place.
    pub async fn identify(&self) -> Option<NamedColor> {
        let hex = {
            let mut state = self.state.write().await;
            match state.hex.clone() {
                Some(hex) => {
                    state.is_loading = true;
                    hex
                }
                None => {
                    state.is_loading = false;
                    return None;
                }
            }
        };

        let result = self.namer.lookup(&hex).await;

        let mut state = self.state.write().await;
        state.is_loading = false;
        match result {
            Ok(named) => {
                info!("{} is {:?}", hex, named.name.value);
                state.color_name = Some(named.name.value.clone());
                state.last_named = Some(named.clone());
                Some(named)
            }
            Err(e) => {
                warn!("Color lookup for {} failed: {}", hex, e);
                None
            }
        }
    }

    /// Appends the last named color to `list`. `None` when there is nothing
    /// to save yet.
    pub async fn store_last_color<S: KeyValueStore>(
        &self,
        list: &mut ColorList<S>,
    ) -> Result<Option<AddOutcome>> {
        let Some(named) = self.state.read().await.last_named.clone() else {
            return Ok(None);
        };

        let outcome = list.add(named)?;
        if outcome == AddOutcome::AlreadyInList {
            self.state.write().await.alert = Some(Alert::AlreadyInList);
        }
        Ok(Some(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraPosition, FixtureCamera};
    use crate::lookup::testing::MockNamer;
    use crate::sampler::SamplingStrategy;
    use crate::store::{ItemStore, MemoryStore};
    use image::Rgba;

    fn white_image() -> RgbaImage {
        RgbaImage::from_pixel(20, 20, Rgba([255, 255, 255, 255]))
    }

    fn spotter(namer: MockNamer) -> Spotter<FixtureCamera, MockNamer> {
        Spotter::new(
            FixtureCamera::new(white_image()),
            namer,
            ColorSampler::new(SamplingStrategy::AreaAverage),
        )
    }

    fn empty_list() -> ColorList<MemoryStore> {
        ColorList::load(ItemStore::new(MemoryStore::new(), "items"))
    }

    #[tokio::test]
    async fn test_initial_state() {
        let spotter = spotter(MockNamer::succeeding());
        let state = spotter.state().await;
        assert_eq!(state, SpotState::default());
        assert!(!state.flash_on);
        assert!(!state.is_loading);
    }

    #[tokio::test]
    async fn test_capture_names_white() {
        let spotter = spotter(MockNamer::succeeding());
        spotter.start_session().await.unwrap();

        let state = spotter.capture().await.unwrap();
        assert_eq!(state.sampled_color, Some(SampledColor::opaque(255, 255, 255)));
        assert_eq!(state.hex.as_deref(), Some("#FFFFFF"));
        assert_eq!(state.color_name.as_deref(), Some("white"));
        let named = state.last_named.unwrap();
        assert!(named.name.exact_match_name);
        assert_eq!(named.name.distance, 0);
        assert!(!state.is_loading);
    }

    #[tokio::test]
    async fn test_identify_without_hex_does_nothing() {
        let namer = MockNamer::succeeding();
        let spotter = spotter(namer);

        assert!(spotter.identify().await.is_none());
        let state = spotter.state().await;
        assert!(state.color_name.is_none());
        assert!(!state.is_loading);
        assert_eq!(spotter.namer.calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_lookup_keeps_previous_name() {
        let spotter = spotter(MockNamer::failing());
        spotter.set_hex("#FFFFFF").await.unwrap();
        spotter.state.write().await.color_name = Some("previous".to_string());

        assert!(spotter.identify().await.is_none());
        let state = spotter.state().await;
        assert_eq!(state.color_name.as_deref(), Some("previous"));
        assert!(state.last_named.is_none());
        assert!(!state.is_loading);
        assert_eq!(spotter.namer.calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_lookup_from_nothing_stays_empty() {
        let spotter = spotter(MockNamer::failing());
        spotter.set_hex("FFFFFF").await.unwrap();

        spotter.identify().await;
        let state = spotter.state().await;
        assert!(state.color_name.is_none());
        assert!(!state.is_loading);
    }

    #[tokio::test]
    async fn test_capture_before_session_raises_camera_alert() {
        let spotter = spotter(MockNamer::succeeding());

        assert!(spotter.capture().await.is_err());
        let state = spotter.state().await;
        assert!(matches!(state.alert, Some(Alert::CameraFailure(_))));
        assert_eq!(state.alert.unwrap().title(), "Camera Error");
        assert!(!state.is_loading);
    }

    #[tokio::test]
    async fn test_capture_failure_leaves_result_fields() {
        let spotter = Spotter::new(
            FixtureCamera::new(white_image()).failing_capture(),
            MockNamer::succeeding(),
            ColorSampler::default(),
        );
        spotter.start_session().await.unwrap();
        spotter.set_hex("#00FF00").await.unwrap();

        assert!(spotter.capture().await.is_err());
        let state = spotter.state().await;
        assert_eq!(state.hex.as_deref(), Some("#00FF00"));
        assert!(matches!(state.alert, Some(Alert::CameraFailure(_))));
    }

    #[tokio::test]
    async fn test_failed_scan_clears_loading() {
        let spotter = spotter(MockNamer::succeeding());
        spotter.set_hex("#123456").await.unwrap();
        spotter.state.write().await.is_loading = true;

        let scanned = Err(anyhow!("Pixel scan task panicked"));
        assert!(spotter.record_sample(scanned).await.is_err());

        let state = spotter.state().await;
        assert!(!state.is_loading);
        assert_eq!(state.hex.as_deref(), Some("#123456"));
        assert_eq!(spotter.namer.calls(), 0);
    }

    #[tokio::test]
    async fn test_permission_denied_alert() {
        let spotter = Spotter::new(
            FixtureCamera::new(white_image()).unauthorized(),
            MockNamer::succeeding(),
            ColorSampler::default(),
        );

        assert!(spotter.start_session().await.is_err());
        assert_eq!(spotter.state().await.alert, Some(Alert::PermissionDenied));

        spotter.dismiss_alert().await;
        assert!(spotter.state().await.alert.is_none());
    }

    #[tokio::test]
    async fn test_store_last_color_rejects_duplicates() {
        let spotter = spotter(MockNamer::succeeding());
        let mut list = empty_list();

        assert_eq!(spotter.store_last_color(&mut list).await.unwrap(), None);

        spotter.start_session().await.unwrap();
        spotter.capture().await.unwrap();

        let first = spotter.store_last_color(&mut list).await.unwrap();
        assert_eq!(first, Some(AddOutcome::Added));
        assert_eq!(list.len(), 1);
        assert!(spotter.state().await.alert.is_none());

        let second = spotter.store_last_color(&mut list).await.unwrap();
        assert_eq!(second, Some(AddOutcome::AlreadyInList));
        assert_eq!(list.len(), 1);

        let alert = spotter.state().await.alert.unwrap();
        assert_eq!(alert, Alert::AlreadyInList);
        assert_eq!(alert.message(), "Item already in list");
    }

    #[tokio::test]
    async fn test_switch_camera_and_flash() {
        let spotter = spotter(MockNamer::succeeding());
        let camera = spotter.camera();
        let initial = camera.read().await.position();

        spotter.switch_camera().await.unwrap();
        assert_ne!(camera.read().await.position(), initial);
        assert_eq!(camera.read().await.position(), CameraPosition::Front);

        assert!(spotter.toggle_flash().await);
        assert_eq!(camera.read().await.flash_mode(), FlashMode::On);
        assert!(!spotter.toggle_flash().await);
        assert_eq!(camera.read().await.flash_mode(), FlashMode::Off);
    }

    #[tokio::test]
    async fn test_crop_then_modal_sample() {
        // Red border, blue center: cropping to the middle makes blue the modal color.
        let image = RgbaImage::from_fn(30, 30, |x, y| {
            if (10..20).contains(&x) && (10..20).contains(&y) {
                Rgba([0, 0, 255, 255])
            } else {
                Rgba([255, 0, 0, 255])
            }
        });
        let spotter = Spotter::new(
            FixtureCamera::new(image),
            MockNamer::succeeding(),
            ColorSampler::new(SamplingStrategy::ModalWindow),
        )
        .with_crop(Some(10));
        spotter.start_session().await.unwrap();

        let state = spotter.capture().await.unwrap();
        assert_eq!(state.hex.as_deref(), Some("#0000FF"));
    }

    #[tokio::test]
    async fn test_overlapping_captures_both_complete() {
        let spotter = spotter(MockNamer::succeeding());
        spotter.start_session().await.unwrap();

        let a = tokio::spawn({
            let spotter = spotter.clone();
            async move { spotter.capture().await }
        });
        let b = tokio::spawn({
            let spotter = spotter.clone();
            async move { spotter.capture().await }
        });
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        assert_eq!(spotter.namer.calls(), 2);
        let state = spotter.state().await;
        assert_eq!(state.color_name.as_deref(), Some("white"));
        assert!(!state.is_loading);
    }
}
