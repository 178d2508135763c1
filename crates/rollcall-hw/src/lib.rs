//! rollcall-hw — Camera capture for the attendance kiosk.
//!
//! V4L2 capture with YUYV and MJPG negotiation, converting everything to
//! RGB frames for the vision pipeline.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, PixelFormat};
pub use frame::Frame;
