use async_trait::async_trait;
use image::RgbaImage;
use std::path::PathBuf;
use tokio::fs;
use tokio::process::Command;

use crate::camera::{CameraError, CameraManaging, CameraPosition, CameraStatus, FlashMode};
use crate::config::CameraConfig;
use crate::image_ops::ImageLoader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CaptureTool {
    RpicamStill,
    Raspistill,
}

impl CaptureTool {
    fn program(&self) -> &'static str {
        match self {
            CaptureTool::RpicamStill => "rpicam-still",
            CaptureTool::Raspistill => "raspistill",
        }
    }
}

/// Still camera driven through rpicam-still, falling back to the legacy
/// raspistill tool.
pub struct StillCamera {
    /// Capture width in pixels
    width: u32,
    /// Capture height in pixels
    height: u32,
    /// JPEG quality passed to the capture tool (0-100)
    quality: u8,
    /// Lens the next capture uses
    position: CameraPosition,
    status: CameraStatus,
    /// Capture tool found by `configure`
    tool: Option<CaptureTool>,
    running: bool,
    flash_mode: FlashMode,
    /// Scratch file the capture tool writes each still to
    temp_image_path: PathBuf,
    /// Decodes the scratch file
    loader: ImageLoader,
}

impl StillCamera {
    /// Builds an unconfigured camera; nothing touches the hardware until
    /// `configure`.
    pub fn new(config: &CameraConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
            quality: config.quality.min(100),
            position: config.position,
            status: CameraStatus::Unconfigured,
            tool: None,
            running: false,
            flash_mode: FlashMode::Off,
            temp_image_path: std::env::temp_dir()
                .join(format!("colorspotter_capture_{}.jpg", std::process::id())),
            loader: ImageLoader::new(),
        }
    }

    async fn probe_tool() -> Option<CaptureTool> {
        match Command::new("rpicam-still").arg("--help").output().await {
            Ok(_) => {
                log::info!("Camera initialized (using rpicam-still)");
                Some(CaptureTool::RpicamStill)
            }
            Err(e) => {
                log::warn!("rpicam-still not found: {}", e);
                match Command::new("raspistill").arg("-?").output().await {
                    Ok(_) => {
                        log::info!("Camera initialized (using legacy raspistill)");
                        Some(CaptureTool::Raspistill)
                    }
                    Err(e) => {
                        log::error!("Neither rpicam-still nor raspistill found: {}", e);
                        None
                    }
                }
            }
        }
    }

    fn capture_args(&self, tool: CaptureTool) -> Vec<String> {
        let output = self.temp_image_path.to_string_lossy().to_string();
        match tool {
            CaptureTool::RpicamStill => vec![
                "-o".into(), output,
                "--camera".into(), self.position.index().to_string(),
                "--width".into(), self.width.to_string(),
                "--height".into(), self.height.to_string(),
                "--quality".into(), self.quality.to_string(),
                "--immediate".into(),
                "--nopreview".into(),
                "--timeout".into(), "1000".into(),
            ],
            CaptureTool::Raspistill => vec![
                "-o".into(), output,
                "-cs".into(), self.position.index().to_string(),
                "-w".into(), self.width.to_string(),
                "-h".into(), self.height.to_string(),
                "-q".into(), self.quality.to_string(),
                "-t".into(), "1000".into(),
                "-n".into(),
            ],
        }
    }

    async fn run_capture(&self, tool: CaptureTool) -> Result<(), CameraError> {
        let args = self.capture_args(tool);
        log::info!("Capture command: {} {}", tool.program(), args.join(" "));

        let output = Command::new(tool.program())
            .args(&args)
            .output()
            .await
            .map_err(|e| CameraError::CaptureFailed(format!("{}: {}", tool.program(), e)))?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        log::warn!("{} failed with status {}: {}", tool.program(), output.status, stderr.trim());
        if stderr.contains("Permission denied") {
            return Err(CameraError::PermissionDenied);
        }
        Err(CameraError::CaptureFailed(format!(
            "{} exited with {}",
            tool.program(),
            output.status
        )))
    }

    pub fn settings(&self) -> (u32, u32, u8) {
        (self.width, self.height, self.quality)
    }
}

#[async_trait]
impl CameraManaging for StillCamera {
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

        self.tool = Self::probe_tool().await;
        match self.tool {
            Some(_) => {
                self.status = CameraStatus::Configured;
                Ok(())
            }
            None => {
                log::error!("Video device is unavailable");
                Err(CameraError::Unavailable("no still capture tool found".to_string()))
            }
        }
    }

    fn start(&mut self) -> Result<(), CameraError> {
        match self.status {
            CameraStatus::Configured => {
                self.running = true;
                log::info!("Camera session started ({:?} lens)", self.position);
                Ok(())
            }
            _ => Err(CameraError::NotConfigured),
        }
    }

    fn stop(&mut self) {
        if self.running {
            self.running = false;
            log::info!("Camera session stopped");
        }
    }

    async fn switch_camera(&mut self) -> Result<(), CameraError> {
        self.position = self.position.flipped();
        log::info!("Switched to {:?} camera", self.position);

        // Re-probe so a missing lens shows up as unconfigured.
        let was_running = self.running;
        self.status = CameraStatus::Unconfigured;
        self.running = false;
        self.configure().await?;
        if was_running {
            self.start()?;
        }
        Ok(())
    }

    fn toggle_torch(&mut self, on: bool) {
        // Neither capture tool drives a torch LED.
        log::warn!("Torch not available for this device (requested {})", if on { "on" } else { "off" });
    }

    async fn capture(&mut self) -> Result<RgbaImage, CameraError> {
        if !self.running {
            return Err(CameraError::NotRunning);
        }
        let tool = self.tool.ok_or(CameraError::NotConfigured)?;

        if self.temp_image_path.exists() {
            let _ = fs::remove_file(&self.temp_image_path).await;
        }

        let result = match self.run_capture(tool).await {
            Err(CameraError::CaptureFailed(reason)) if tool == CaptureTool::RpicamStill => {
                log::warn!("{}; trying raspistill fallback", reason);
                self.run_capture(CaptureTool::Raspistill).await
            }
            other => other,
        };
        result?;

        let bytes = fs::read(&self.temp_image_path)
            .await
            .map_err(|e| CameraError::CaptureFailed(format!("captured file missing: {}", e)))?;
        let _ = fs::remove_file(&self.temp_image_path).await;

        let image = self.loader.decode(&bytes).map_err(CameraError::Decode)?;
        log::info!("Photo captured: {}x{}", image.width(), image.height());
        Ok(image)
    }
}

impl Drop for StillCamera {
    fn drop(&mut self) {
        if self.temp_image_path.exists() {
            let _ = std::fs::remove_file(&self.temp_image_path);
        }
    }
}
