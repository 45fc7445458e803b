use async_trait::async_trait;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Where the session is in its configuration lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraStatus {
    /// `configure` has not run yet.
    Unconfigured,
    /// A capture device is selected and ready to start.
    Configured,
    /// The user refused camera access.
    Unauthorized,
    /// No usable capture device was found.
    Failed,
}

/// Which lens the session captures from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraPosition {
    Back,
    Front,
}

impl CameraPosition {
    /// The other lens.
    pub fn flipped(&self) -> Self {
        match self {
            CameraPosition::Back => CameraPosition::Front,
            CameraPosition::Front => CameraPosition::Back,
        }
    }

    /// Index passed to the capture tool's camera selector.
    pub fn index(&self) -> u8 {
        match self {
            CameraPosition::Back => 0,
            CameraPosition::Front => 1,
        }
    }
}

/// Torch state as last accepted by the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashMode {
    Off,
    On,
}

#[derive(Debug, Error)]
pub enum CameraError {
    #[error("camera access was denied")]
    PermissionDenied,
    #[error("camera configuration failed: the camera is unavailable or missing permissions")]
    NotConfigured,
    #[error("camera session is not running")]
    NotRunning,
    #[error("camera unavailable: {0}")]
    Unavailable(String),
    #[error("photo capture failed: {0}")]
    CaptureFailed(String),
    #[error("failed to decode captured photo: {0:#}")]
    Decode(anyhow::Error),
}

/// Camera session lifecycle: configure, start, stop, switch lens, torch,
/// and still capture.
#[async_trait]
pub trait CameraManaging: Send + Sync {
    fn status(&self) -> CameraStatus;
    fn position(&self) -> CameraPosition;
    fn flash_mode(&self) -> FlashMode;
    /// True between a successful `start` and the next `stop`.
    fn is_running(&self) -> bool;

    /// Probes the device. Only acts while unconfigured.
    async fn configure(&mut self) -> Result<(), CameraError>;

    /// Begins the session. Fails unless the camera is configured.
    fn start(&mut self) -> Result<(), CameraError>;

    /// Ends the session. A no-op when it is not running.
    fn stop(&mut self);

    /// Flips between back and front lens and reconfigures the input.
    async fn switch_camera(&mut self) -> Result<(), CameraError>;

    /// Turns the torch on or off. Cameras without a torch keep
    /// [`FlashMode::Off`].
    fn toggle_torch(&mut self, on: bool);

    /// Takes one still. Requires a running session.
    async fn capture(&mut self) -> Result<RgbaImage, CameraError>;
}

/// Camera stand-in that hands out a fixed image.
pub struct FixtureCamera {
    image: RgbaImage,
    status: CameraStatus,
    position: CameraPosition,
    flash_mode: FlashMode,
    running: bool,
    authorized: bool,
    fail_capture: bool,
    position_changes: u32,
}

impl FixtureCamera {
    pub fn new(image: RgbaImage) -> Self {
        Self {
            image,
            status: CameraStatus::Unconfigured,
            position: CameraPosition::Back,
            flash_mode: FlashMode::Off,
            running: false,
            authorized: true,
            fail_capture: false,
            position_changes: 0,
        }
    }

    /// Configuration will report the user refused camera access.
    pub fn unauthorized(mut self) -> Self {
        self.authorized = false;
        self
    }

    /// Every capture will fail after the session starts.
    pub fn failing_capture(mut self) -> Self {
        self.fail_capture = true;
        self
    }

    /// How many times the lens was switched.
    pub fn position_changes(&self) -> u32 {
        self.position_changes
    }
}

#[async_trait]
impl CameraManaging for FixtureCamera {
    fn status(&self) -> CameraStatus {
        self.status
    }

    fn position(&self) -> CameraPosition {
        self.position
    }

    fn flash_mode(&self) -> FlashMode {
        self.flash_mode
    }

    fn is_running(&self) -> bool {
        self.running
    }

    async fn configure(&mut self) -> Result<(), CameraError> {
        if self.status != CameraStatus::Unconfigured {
            return Ok(());
        }
        if !self.authorized {
            self.status = CameraStatus::Unauthorized;
            return Err(CameraError::PermissionDenied);
        }
        self.status = CameraStatus::Configured;
        Ok(())
    }

    fn start(&mut self) -> Result<(), CameraError> {
        match self.status {
            CameraStatus::Configured => {
                self.running = true;
                Ok(())
            }
            _ => Err(CameraError::NotConfigured),
        }
    }

    fn stop(&mut self) {
        self.running = false;
    }

    async fn switch_camera(&mut self) -> Result<(), CameraError> {
        self.position = self.position.flipped();
        self.position_changes += 1;
        Ok(())
    }

    fn toggle_torch(&mut self, on: bool) {
        self.flash_mode = if on { FlashMode::On } else { FlashMode::Off };
    }

    async fn capture(&mut self) -> Result<RgbaImage, CameraError> {
        if !self.running {
            return Err(CameraError::NotRunning);
        }
        if self.fail_capture {
            return Err(CameraError::CaptureFailed("fixture capture failure".to_string()));
        }
        Ok(self.image.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn fixture() -> FixtureCamera {
        FixtureCamera::new(RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 255])))
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let mut camera = fixture();
        assert_eq!(camera.status(), CameraStatus::Unconfigured);
        assert!(matches!(camera.start(), Err(CameraError::NotConfigured)));

        camera.configure().await.unwrap();
        assert_eq!(camera.status(), CameraStatus::Configured);
        assert!(matches!(camera.capture().await, Err(CameraError::NotRunning)));

        camera.start().unwrap();
        let image = camera.capture().await.unwrap();
        assert_eq!(image.dimensions(), (4, 4));

        camera.stop();
        assert!(!camera.is_running());
    }

    #[tokio::test]
    async fn test_unauthorized_configure() {
        let mut camera = fixture().unauthorized();
        assert!(matches!(camera.configure().await, Err(CameraError::PermissionDenied)));
        assert_eq!(camera.status(), CameraStatus::Unauthorized);
        assert!(matches!(camera.start(), Err(CameraError::NotConfigured)));
    }

    #[tokio::test]
    async fn test_switch_and_torch() {
        let mut camera = fixture();
        let initial = camera.position();
        camera.switch_camera().await.unwrap();
        assert_ne!(camera.position(), initial);
        assert_eq!(camera.position_changes(), 1);

        camera.toggle_torch(true);
        assert_eq!(camera.flash_mode(), FlashMode::On);
        camera.toggle_torch(false);
        assert_eq!(camera.flash_mode(), FlashMode::Off);
    }

    #[test]
    fn test_position_index() {
        assert_eq!(CameraPosition::Back.index(), 0);
        assert_eq!(CameraPosition::Front.index(), 1);
        assert_eq!(CameraPosition::Front.flipped(), CameraPosition::Back);
    }
}
