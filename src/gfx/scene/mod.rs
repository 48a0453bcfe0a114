//! # Scene Management Module
//!
//! The scene holds at most one model, the fallback lights and an optional
//! environment map.
//!
//! ## Key Components
//!
//! - [`Scene`] - Lights, environment and the model group
//! - [`Model`] - Meshes, materials and textures of one loaded asset under a root transform
//! - [`SceneComposer`] - Installs the environment and fits the model to the view
//! - [`Aabb`] - Axis-aligned bounds used for fitting
//! - [`Vertex3D`] - Vertex layout shared by every pipeline

pub mod bounds;
pub mod composer;
pub mod object;
pub mod scene;
pub mod vertex;

// Re-export main types
pub use bounds::Aabb;
pub use composer::{FitReport, SceneComposer};
pub use object::{DrawModel, Mesh, Model, Transform};
pub use scene::{ModelGroup, Scene};
pub use vertex::Vertex3D;
