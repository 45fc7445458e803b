//! Spot a color through the camera, name it through a color naming service,
//! and keep a list of the named colors worth remembering.

pub mod camera;
pub mod camera_controller;
pub mod color;
pub mod color_list;
pub mod config;
pub mod image_ops;
pub mod lookup;
pub mod sampler;
pub mod spotter;
pub mod store;

pub use camera::{CameraManaging, CameraPosition, CameraStatus, FixtureCamera, FlashMode};
pub use camera_controller::StillCamera;
pub use color::{NamedColor, SampledColor};
pub use color_list::{AddOutcome, ColorList};
pub use config::{Config, ConfigBuilder};
pub use lookup::{ColorApiClient, ColorNamer, LookupError};
pub use sampler::{ColorSampler, SamplePoint, SamplingStrategy};
pub use spotter::{Alert, SpotState, Spotter};
pub use store::{FileStore, ItemStore, KeyValueStore, MemoryStore};
