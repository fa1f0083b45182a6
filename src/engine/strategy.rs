// src/engine/strategy.rs
//
// Strategy selection between the deterministic stages and an external
// style-transfer model. The choice is made by the caller before any stage
// runs; a model failure is answered with the full deterministic body.

use crate::error::{Result, StylizeError};
use image::RgbImage;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// External style-transfer collaborator.
///
/// Implementations hold their own style reference. Output may be any
/// non-empty size; the pipeline restores it to the source resolution.
pub trait StyleTransfer: Send + Sync {
    fn transfer(&self, content: &RgbImage) -> Result<RgbImage>;
}

type Loader = dyn Fn() -> Result<Arc<dyn StyleTransfer>> + Send + Sync;

/// Process-wide model handle: loaded on first use, dropped on `teardown`.
///
/// Load failures are not cached; the next `get` tries again.
pub struct ModelHandle {
    loader: Box<Loader>,
    slot: Mutex<Option<Arc<dyn StyleTransfer>>>,
}

impl ModelHandle {
    pub fn new<F>(loader: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn StyleTransfer>> + Send + Sync + 'static,
    {
        Self {
            loader: Box::new(loader),
            slot: Mutex::new(None),
        }
    }

    /// Handle around an already-constructed model. `teardown` drops it for good.
    pub fn with_model(model: Arc<dyn StyleTransfer>) -> Self {
        Self {
            loader: Box::new(torn_down),
            slot: Mutex::new(Some(model)),
        }
    }

    pub fn get(&self) -> Result<Arc<dyn StyleTransfer>> {
        let mut slot = self.slot.lock();
        if let Some(model) = slot.as_ref() {
            return Ok(Arc::clone(model));
        }
        let model = (self.loader)().map_err(as_collaborator_failure)?;
        info!("style transfer model loaded");
        *slot = Some(Arc::clone(&model));
        Ok(model)
    }

    pub fn is_loaded(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Release the model. Returns whether one was loaded.
    pub fn teardown(&self) -> bool {
        let released = self.slot.lock().take().is_some();
        if released {
            debug!("style transfer model released");
        }
        released
    }

    /// Run the model on `content`, rejecting empty output.
    pub fn transfer(&self, content: &RgbImage) -> Result<RgbImage> {
        let model = self.get()?;
        let out = model.transfer(content).map_err(as_collaborator_failure)?;
        if out.width() == 0 || out.height() == 0 {
            return Err(StylizeError::style_transfer_failed(format!(
                "model returned an empty {}x{} image",
                out.width(),
                out.height()
            )));
        }
        Ok(out)
    }
}

fn torn_down() -> Result<Arc<dyn StyleTransfer>> {
    Err(StylizeError::model_unavailable("model was torn down"))
}

fn as_collaborator_failure(err: StylizeError) -> StylizeError {
    if err.is_collaborator_failure() {
        err
    } else {
        StylizeError::style_transfer_failed(err.to_string())
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle")
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

/// Body selected by the caller.
#[derive(Clone, Debug, Default)]
pub enum Strategy {
    #[default]
    Deterministic,
    Neural(Arc<ModelHandle>),
}

/// Body that actually produced the output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppliedStrategy {
    Deterministic,
    Neural,
    /// Model selected but unavailable or failing
    NeuralFallback,
}

impl AppliedStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppliedStrategy::Deterministic => "deterministic",
            AppliedStrategy::Neural => "neural",
            AppliedStrategy::NeuralFallback => "neural-fallback",
        }
    }
}
