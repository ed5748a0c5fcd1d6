//! Native backend implementations
//!
//! Only Vulkan is implemented. Direct3D and OpenGL are reported as unavailable by
//! [`crate::graphics::BackendRegistry`].

pub mod vulkan;
