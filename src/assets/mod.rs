//! Asset loading
//!
//! The viewer loads exactly two assets: an environment panorama and a model.
//! They are loaded one after the other on a worker thread; the model step
//! always runs once the environment step has finished, whatever its outcome.
//! The panorama is prefiltered on the same thread, so the event loop only
//! ever receives a finished [`EnvironmentMap`]. Results travel back to the event loop thread as [`AssetEvent`]s, and only
//! that thread touches the scene.

pub mod hdr;
pub mod model;

use std::path::Path;
use std::thread::JoinHandle;

use winit::event_loop::EventLoopProxy;

use crate::config::AssetPaths;
use crate::error::Result;
use crate::gfx::resources::environment::EnvironmentMap;
use crate::gfx::scene::object::Model;

pub use hdr::{load_environment, EnvironmentImage};
pub use model::{decode_model, load_model};

/// Completion of one load step.
#[derive(Debug)]
pub enum AssetEvent {
    Environment(Result<EnvironmentMap>),
    Model(Result<Model>),
}

/// Where assets come from.
pub trait AssetSource {
    fn load_environment(&self, path: &Path) -> Result<EnvironmentImage>;
    fn load_model(&self, path: &Path) -> Result<Model>;
}

/// Reads assets from the local file system.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileAssets;

impl AssetSource for FileAssets {
    fn load_environment(&self, path: &Path) -> Result<EnvironmentImage> {
        hdr::load_environment(path)
    }

    fn load_model(&self, path: &Path) -> Result<Model> {
        model::load_model(path)
    }
}

/// Loads and prefilters the environment, then loads the model, reporting
/// each result to `sink` in that order.
pub fn load_sequence<S, F>(source: &S, paths: &AssetPaths, mut sink: F)
where
    S: AssetSource + ?Sized,
    F: FnMut(AssetEvent),
{
    log::info!("loading environment {}", paths.environment.display());
    let environment = source
        .load_environment(&paths.environment)
        .map(|image| EnvironmentMap::from_equirect(&image));
    sink(AssetEvent::Environment(environment));

    log::info!("loading model {}", paths.model.display());
    sink(AssetEvent::Model(source.load_model(&paths.model)));
}

/// Runs [`load_sequence`] on a worker thread, forwarding events to the
/// event loop.
pub fn spawn_loader(
    paths: AssetPaths,
    proxy: EventLoopProxy<AssetEvent>,
) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("asset-loader".to_string())
        .spawn(move || {
            load_sequence(&FileAssets, &paths, |event| {
                if proxy.send_event(event).is_err() {
                    log::debug!("event loop closed before assets finished loading");
                }
            });
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ViewerError;
    use crate::gfx::resources::material::Material;
    use std::cell::RefCell;
    use std::path::PathBuf;

    struct FakeAssets {
        environment_ok: bool,
        model_ok: bool,
        calls: RefCell<Vec<PathBuf>>,
    }

    impl FakeAssets {
        fn new(environment_ok: bool, model_ok: bool) -> Self {
            Self {
                environment_ok,
                model_ok,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl AssetSource for FakeAssets {
        fn load_environment(&self, path: &Path) -> Result<EnvironmentImage> {
            self.calls.borrow_mut().push(path.to_path_buf());
            if self.environment_ok {
                Ok(EnvironmentImage {
                    width: 64,
                    height: 32,
                    pixels: vec![[1.0; 3]; 64 * 32],
                })
            } else {
                Err(ViewerError::EnvironmentLoad {
                    path: path.to_path_buf(),
                    source: image::ImageError::IoError(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        "missing",
                    )),
                })
            }
        }

        fn load_model(&self, path: &Path) -> Result<Model> {
            self.calls.borrow_mut().push(path.to_path_buf());
            if self.model_ok {
                Ok(Model::new("fake", Vec::new(), vec![Material::default()]))
            } else {
                Err(ViewerError::EmptyModel {
                    path: path.to_path_buf(),
                })
            }
        }
    }

    fn run(source: &FakeAssets) -> Vec<AssetEvent> {
        let mut events = Vec::new();
        load_sequence(source, &AssetPaths::default(), |event| events.push(event));
        events
    }

    #[test]
    fn test_environment_is_loaded_before_model() {
        let source = FakeAssets::new(true, true);
        let events = run(&source);

        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], AssetEvent::Environment(Ok(_))));
        assert!(matches!(events[1], AssetEvent::Model(Ok(_))));

        let paths = AssetPaths::default();
        assert_eq!(*source.calls.borrow(), vec![paths.environment, paths.model]);
    }

    #[test]
    fn test_environment_arrives_prefiltered() {
        let events = run(&FakeAssets::new(true, false));

        let AssetEvent::Environment(Ok(environment)) = &events[0] else {
            panic!("expected a loaded environment, got {:?}", events[0]);
        };
        let levels = environment.levels();
        assert_eq!(levels[0].width, 64);
        assert_eq!(levels.last().map(|l| l.width), Some(8));
        assert!(environment.irradiance_sh()[0][0] > 0.0);
    }

    #[test]
    fn test_model_is_loaded_after_environment_failure() {
        let events = run(&FakeAssets::new(false, true));

        assert!(matches!(
            events[0],
            AssetEvent::Environment(Err(ViewerError::EnvironmentLoad { .. }))
        ));
        assert!(matches!(events[1], AssetEvent::Model(Ok(_))));
    }

    #[test]
    fn test_both_failures_are_reported() {
        let events = run(&FakeAssets::new(false, false));
        assert!(matches!(events[0], AssetEvent::Environment(Err(_))));
        assert!(matches!(events[1], AssetEvent::Model(Err(_))));
    }
}
